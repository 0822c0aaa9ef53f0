//! PlanIt
//!
//! Exact production planner for factory games.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rusqlite::Connection;
use tracing::warn;

use planit::building::{Building, BuildingKind, HOT_AIR};
use planit::catalogue::{Catalogue, RecipeSpec};
use planit::db;
use planit::logging;
use planit::models::{Amount, Resource};
use planit::plan::{self, PlanRequest};
use planit::rational::Rational;
use planit::solver::Solver;
use planit::summary;

#[derive(Parser)]
#[command(name = "planit")]
#[command(about = "Production plan solver for factory games")]
struct Cli {
    /// Path to the SQLite database
    #[arg(short, long, default_value = "planit.db")]
    database: PathBuf,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize empty database with schema
    Init,

    /// Load sample data for testing
    LoadSample,

    /// List all recipes in the catalogue
    ListRecipes,

    /// List all producible resources
    ListResources,

    /// Show details for a specific recipe
    Recipe {
        /// Recipe identifier (e.g. "CR:electrolysis")
        identifier: String,
    },

    /// Show how the recipe graph splits into independent parts
    Subgraphs {
        /// Recipe identifiers to leave out
        #[arg(long)]
        disable: Vec<String>,
    },

    /// Solve a production plan
    Solve {
        /// Wanted outputs as resource=amount (e.g. "element:oxygen=3/2")
        targets: Vec<String>,

        /// Plan file to start from
        #[arg(short, long)]
        plan: Option<PathBuf>,

        /// Resources supplied from outside
        #[arg(long)]
        ignore: Vec<String>,

        /// Recipe identifiers to leave out
        #[arg(long)]
        disable: Vec<String>,

        /// Maximum simplex pivots per target
        #[arg(long)]
        iteration_limit: Option<usize>,

        /// Cost weight of regular recipes
        #[arg(long)]
        recipe_weight: Option<Rational>,

        /// Cost weight of recipes importing pure inputs
        #[arg(long)]
        import_weight: Option<Rational>,

        /// Right-hand side of the cost row
        #[arg(long)]
        tax_budget: Option<Rational>,

        /// Show the dependency tree
        #[arg(short, long)]
        tree: bool,

        /// Write the resulting plan request to a file
        #[arg(long)]
        save: Option<PathBuf>,
    },

    /// List plan files in a folder
    Plans {
        /// Folder to search
        dir: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let conn = Connection::open(&cli.database)
        .with_context(|| format!("Failed to open {}", cli.database.display()))?;
    db::init_schema(&conn)?;

    match cli.command {
        Commands::Init => {
            println!("Database initialized at: {}", cli.database.display());
        }

        Commands::LoadSample => {
            let count = load_sample_data(&conn)?;
            println!("Loaded {} sample recipes", count);
        }

        Commands::ListRecipes => {
            let catalogue = db::load_catalogue(&conn)?;
            if catalogue.is_empty() {
                println!("No recipes in database. Run 'load-sample' first.");
            } else {
                println!("{:<28} {:<28} Conversion", "Identifier", "Name");
                println!("{}", "-".repeat(80));
                for recipe in catalogue.recipes() {
                    println!(
                        "{:<28} {:<28} {} -> {}",
                        recipe.identifier,
                        recipe.name,
                        format_amounts(&catalogue, &recipe.inputs),
                        format_amounts(&catalogue, &recipe.outputs)
                    );
                }
            }
        }

        Commands::ListResources => {
            let resources = db::list_producible_resources(&conn)?;
            if resources.is_empty() {
                println!("No resources in database. Run 'load-sample' first.");
            } else {
                println!("Producible resources:");
                for r in resources {
                    println!("  {}", r);
                }
            }
        }

        Commands::Recipe { identifier } => {
            let catalogue = db::load_catalogue(&conn)?;
            match catalogue.recipe_by_identifier(&identifier) {
                Some(recipe) => {
                    println!("Recipe: {}", recipe.name);
                    println!("  Identifier: {}", recipe.identifier);
                    println!("  Kind: {}", recipe.kind.as_str());
                    println!("  Time: {}", recipe.time);
                    if !recipe.inputs.is_empty() {
                        println!("  Inputs:");
                        for input in &recipe.inputs {
                            println!("    {} x {}", input.amount, catalogue.resource_name(&input.resource));
                        }
                    }
                    println!("  Outputs:");
                    for output in &recipe.outputs {
                        println!("    {} x {}", output.amount, catalogue.resource_name(&output.resource));
                    }
                    for producer in recipe.producers.iter().filter_map(|p| catalogue.producer(*p)) {
                        println!(
                            "  Made in: {} (speed {}, {}W)",
                            producer.name, producer.speed, producer.power_usage
                        );
                    }
                }
                None => println!("Recipe '{}' not found", identifier),
            }
        }

        Commands::Subgraphs { disable } => {
            let catalogue = db::load_catalogue(&conn)?;
            let mut request = PlanRequest::default();
            for identifier in &disable {
                request.disable(identifier);
            }
            let resolved = request.resolve(&catalogue);
            let solver = Solver::new(&catalogue, request.options).with_disabled(resolved.disabled);
            for subgraph in solver.subgraphs() {
                let names: Vec<&str> = subgraph
                    .recipes
                    .iter()
                    .filter_map(|id| catalogue.recipe(*id))
                    .map(|r| r.identifier.as_str())
                    .collect();
                let kind = if subgraph.is_complex() { "complex" } else { "simple" };
                println!("#{} ({}): {}", subgraph.id, kind, names.join(", "));
            }
        }

        Commands::Solve {
            targets,
            plan,
            ignore,
            disable,
            iteration_limit,
            recipe_weight,
            import_weight,
            tax_budget,
            tree,
            save,
        } => {
            let mut request = match &plan {
                Some(path) => PlanRequest::load(path)?,
                None => PlanRequest::default(),
            };
            for target in &targets {
                let (resource, amount) = plan::parse_target(target)?;
                if !request.add_output(resource.clone(), amount) {
                    warn!(resource = %resource, "output listed twice; keeping the first amount");
                }
            }
            for resource in &ignore {
                request.add_input(resource.parse()?);
            }
            for identifier in &disable {
                request.disable(identifier);
            }
            if let Some(limit) = iteration_limit {
                request.options.iteration_limit = limit;
            }
            if let Some(weight) = recipe_weight {
                request.options.recipe_weight = weight;
            }
            if let Some(weight) = import_weight {
                request.options.import_weight = weight;
            }
            if let Some(budget) = tax_budget {
                request.options.tax_budget = budget;
            }

            let catalogue = request.tuned_catalogue(&db::load_catalogue(&conn)?);
            let resolved = request.resolve(&catalogue);
            let solver = Solver::new(&catalogue, request.options.clone()).with_disabled(resolved.disabled);
            let result = solver.solve(&resolved.targets, &resolved.ignore);

            if tree {
                println!("Dependency tree:\n");
                println!(
                    "{}",
                    summary::format_requirement_tree(&result, &catalogue, 0, 0)
                );
            }
            println!("{}", summary::summarize_plan(&result, &catalogue));

            if let Some(path) = save {
                request.save(&path)?;
                println!("Plan saved to {}", path.display());
            }
        }

        Commands::Plans { dir } => {
            let plans = plan::list_plans(&dir)?;
            if plans.is_empty() {
                println!("No plans in {}", dir.display());
            }
            for path in plans {
                match PlanRequest::load(&path) {
                    Ok(request) => println!("{} ({} outputs)", path.display(), request.outputs.len()),
                    Err(err) => println!("{} (unreadable: {})", path.display(), err),
                }
            }
        }
    }

    Ok(())
}

fn format_amounts(catalogue: &Catalogue, amounts: &[Amount]) -> String {
    if amounts.is_empty() {
        return "-".to_string();
    }
    amounts
        .iter()
        .map(|a| format!("{} {}", a.amount, catalogue.resource_name(&a.resource)))
        .collect::<Vec<_>>()
        .join(" + ")
}

fn ratio(numerator: i64, denominator: i64) -> Result<Rational> {
    Ok(Rational::new(numerator, denominator)?)
}

/// Load a small sample catalogue for testing without game data
fn load_sample_data(conn: &Connection) -> Result<usize> {
    db::clear_catalogue(conn)?;

    let electrolyzer = Building::new(
        "Electrolyzer",
        "Electrolyzer",
        BuildingKind::ResourceConverter {
            power_usage: Rational::from(120),
        },
    );
    let sieve = Building::new(
        "WaterPurifier",
        "Water Sieve",
        BuildingKind::ResourceConverter {
            power_usage: Rational::from(120),
        },
    );
    let terrarium = Building::new(
        "AlgaeHabitat",
        "Algae Terrarium",
        BuildingKind::ResourceConverter {
            power_usage: Rational::ZERO,
        },
    );
    let refinery = Building::new(
        "MetalRefinery",
        "Metal Refinery",
        BuildingKind::Crafter {
            speed: Rational::ONE,
            power_usage: Rational::from(1200),
        },
    );
    let furnace = Building::new(
        "BlastFurnace",
        "Blast Furnace",
        BuildingKind::BlastFurnace {
            base_speed: Rational::ONE,
            tower_speed_bonus: ratio(1, 4)?,
            max_towers: 4,
            hot_air_per_minute: Rational::from(56),
            power_usage: Rational::from(240),
        },
    );
    for building in [&electrolyzer, &sieve, &terrarium, &refinery, &furnace] {
        db::upsert_building(conn, building)?;
    }

    let water = Resource::element("water");
    let dirty_water = Resource::element("dirty_water");
    let oxygen = Resource::element("oxygen");
    let hydrogen = Resource::element("hydrogen");
    let sand = Resource::element("sand");
    let toxic_sand = Resource::element("toxic_sand");
    let algae = Resource::element("algae");
    let iron_ore = Resource::item("iron_ore");
    let iron = Resource::item("iron");
    let coal = Resource::item("coal");
    let steel = Resource::item("steel");

    for (resource, name, base) in [
        (&water, "Water", true),
        (&dirty_water, "Polluted Water", false),
        (&oxygen, "Oxygen", false),
        (&hydrogen, "Hydrogen", false),
        (&sand, "Sand", false),
        (&toxic_sand, "Polluted Dirt", false),
        (&algae, "Algae", false),
        (&iron_ore, "Iron Ore", false),
        (&iron, "Iron", false),
        (&coal, "Coal", false),
        (&steel, "Steel", false),
        (&Resource::element(HOT_AIR), "Hot Air", false),
    ] {
        db::upsert_resource(conn, resource, name, base)?;
    }

    let recipes = [
        (
            RecipeSpec::conversion("CR:electrolysis", "Electrolysis")
                .input(water.clone(), Rational::ONE)
                .output(oxygen.clone(), ratio(888, 1000)?)
                .output(hydrogen.clone(), ratio(112, 1000)?),
            &electrolyzer,
        ),
        (
            RecipeSpec::conversion("CR:sieve", "Water Sieve")
                .input(dirty_water.clone(), Rational::from(5))
                .input(sand.clone(), Rational::ONE)
                .output(water.clone(), Rational::from(5))
                .output(toxic_sand.clone(), ratio(1, 5)?),
            &sieve,
        ),
        (
            RecipeSpec::conversion("CR:algae_terrarium", "Algae Terrarium")
                .input(algae.clone(), ratio(3, 100)?)
                .input(water.clone(), ratio(3, 10)?)
                .output(oxygen.clone(), ratio(4, 100)?)
                .output(dirty_water.clone(), ratio(29, 100)?),
            &terrarium,
        ),
        (
            RecipeSpec::conversion("CR:refine_iron", "Refined Iron")
                .input(iron_ore.clone(), Rational::from(100))
                .output(iron.clone(), Rational::from(100))
                .time(Rational::from(40)),
            &refinery,
        ),
        (
            furnace.prepare_recipe(
                RecipeSpec::conversion("BFM:steel", "Steel")
                    .input(iron.clone(), Rational::from(70))
                    .input(coal.clone(), Rational::from(20))
                    .output(steel.clone(), Rational::from(100))
                    .time(Rational::from(60)),
            )?,
            &furnace,
        ),
    ];

    for (spec, building) in &recipes {
        db::insert_recipe(conn, spec, &[building.identifier.as_str()])?;
    }
    Ok(recipes.len())
}
