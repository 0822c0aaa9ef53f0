//! End-to-end solves against small catalogues.

use std::collections::HashSet;

use indexmap::IndexMap;
use planit::accumulator::Accumulator;
use planit::catalogue::{Catalogue, CatalogueBuilder, RecipeSpec};
use planit::error::Diagnostic;
use planit::logging;
use planit::models::{RecipeId, Resource};
use planit::rational::Rational;
use planit::solver::{Solver, SolverOptions};

fn r(n: i64) -> Rational {
    Rational::from(n)
}

fn targets(entries: &[(Resource, i64)]) -> IndexMap<Resource, Rational> {
    entries.iter().map(|(res, amount)| (res.clone(), r(*amount))).collect()
}

fn id(catalogue: &Catalogue, identifier: &str) -> RecipeId {
    catalogue
        .recipe_by_identifier(identifier)
        .expect("recipe should exist")
        .id
}

/// One raw source of X, one conversion 2 X -> 1 Y.
fn two_step() -> Catalogue {
    let mut builder = CatalogueBuilder::new();
    builder
        .add_recipe(RecipeSpec::resource("RR:x", "X").output(Resource::item("x"), r(1)))
        .unwrap();
    builder
        .add_recipe(
            RecipeSpec::conversion("CR:y", "Y")
                .input(Resource::item("x"), r(2))
                .output(Resource::item("y"), r(1)),
        )
        .unwrap();
    builder.build()
}

#[test]
fn test_conversion_chain_rates() {
    logging::init_test();
    let catalogue = two_step();
    let solver = Solver::new(&catalogue, SolverOptions::default());

    let plan = solver.solve(&targets(&[(Resource::item("y"), 5)]), &HashSet::new());

    assert_eq!(plan.get_recipe(id(&catalogue, "CR:y")), r(5));
    assert_eq!(plan.get_recipe(id(&catalogue, "RR:x")), r(10));
    assert!(plan.waste().is_empty(), "no surplus expected");
    assert!(plan.is_satisfied());
    assert_eq!(plan.get_item(&Resource::item("x")), r(10));
}

#[test]
fn test_disabled_conversion_is_unsatisfiable() {
    let catalogue = two_step();
    let disabled: HashSet<RecipeId> = [id(&catalogue, "CR:y")].into_iter().collect();
    let solver = Solver::new(&catalogue, SolverOptions::default()).with_disabled(disabled);

    let plan = solver.solve(&targets(&[(Resource::item("y"), 5)]), &HashSet::new());

    assert!(plan.recipes().is_empty(), "no recipe should run");
    assert_eq!(plan.get_unmet(&Resource::item("y")), r(5));
    assert!(plan
        .diagnostics()
        .iter()
        .any(|d| matches!(d, Diagnostic::InfeasibleTarget { .. })));
}

#[test]
fn test_independent_clusters_do_not_mix() {
    let mut builder = CatalogueBuilder::new();
    builder
        .add_recipe(
            RecipeSpec::conversion("CR:plate", "Plate")
                .input(Resource::item("ore"), r(1))
                .output(Resource::item("plate"), r(1)),
        )
        .unwrap();
    builder
        .add_recipe(
            RecipeSpec::conversion("CR:glass", "Glass")
                .input(Resource::item("sand"), r(2))
                .output(Resource::item("glass"), r(1)),
        )
        .unwrap();
    let catalogue = builder.build();
    let solver = Solver::new(&catalogue, SolverOptions::default());
    assert_eq!(solver.subgraphs().len(), 2);

    let plan = solver.solve(
        &targets(&[(Resource::item("plate"), 3), (Resource::item("glass"), 4)]),
        &HashSet::new(),
    );

    assert_eq!(plan.get_recipe(id(&catalogue, "CR:plate")), r(3));
    assert_eq!(plan.get_recipe(id(&catalogue, "CR:glass")), r(4));
    assert_eq!(plan.get_item(&Resource::item("ore")), r(3));
    assert_eq!(plan.get_item(&Resource::item("sand")), r(8));
    assert_eq!(plan.recipes().len(), 4);

    let glass = plan
        .children(Accumulator::ROOT)
        .find(|(_, node)| node.resource == Resource::item("glass"))
        .map(|(index, _)| index)
        .expect("glass should be in the tree");
    let draws: Vec<&Resource> = plan.children(glass).map(|(_, n)| &n.resource).collect();
    assert_eq!(draws, vec![&Resource::item("sand")]);
}

#[test]
fn test_byproducts_become_waste() {
    let mut builder = CatalogueBuilder::new();
    builder
        .add_recipe(
            RecipeSpec::conversion("CR:electrolysis", "Electrolysis")
                .input(Resource::element("water"), r(1))
                .output(Resource::element("oxygen"), Rational::new(888, 1000).unwrap())
                .output(Resource::element("hydrogen"), Rational::new(112, 1000).unwrap()),
        )
        .unwrap();
    let catalogue = builder.build();
    let solver = Solver::new(&catalogue, SolverOptions::default());

    let wanted: IndexMap<Resource, Rational> = [(Resource::element("oxygen"), Rational::new(111, 125).unwrap())].into();
    let plan = solver.solve(&wanted, &HashSet::new());

    assert_eq!(plan.get_recipe(id(&catalogue, "CR:electrolysis")), r(1));
    assert_eq!(plan.get_item(&Resource::element("water")), r(1));
    assert_eq!(
        plan.get_waste(&Resource::element("hydrogen")),
        Rational::new(14, 125).unwrap()
    );
}

#[test]
fn test_shared_intermediate_is_summed() {
    let mut builder = CatalogueBuilder::new();
    builder
        .add_recipe(
            RecipeSpec::conversion("CR:plate", "Plate")
                .input(Resource::item("ore"), r(1))
                .output(Resource::item("plate"), r(1)),
        )
        .unwrap();
    builder
        .add_recipe(
            RecipeSpec::conversion("CR:gear", "Gear")
                .input(Resource::item("plate"), r(2))
                .output(Resource::item("gear"), r(1)),
        )
        .unwrap();
    builder
        .add_recipe(
            RecipeSpec::conversion("CR:pipe", "Pipe")
                .input(Resource::item("plate"), r(3))
                .output(Resource::item("pipe"), r(2)),
        )
        .unwrap();
    let catalogue = builder.build();
    let solver = Solver::new(&catalogue, SolverOptions::default());

    let plan = solver.solve(
        &targets(&[(Resource::item("gear"), 1), (Resource::item("pipe"), 2)]),
        &HashSet::new(),
    );

    assert_eq!(plan.get_recipe(id(&catalogue, "CR:plate")), r(5));
    assert_eq!(plan.get_item(&Resource::item("ore")), r(5));
    // gear, pipe, then the group holding the ore they share
    let top: Vec<Resource> = plan.children(Accumulator::ROOT).map(|(_, n)| n.resource.clone()).collect();
    assert_eq!(top, vec![Resource::item("gear"), Resource::item("pipe"), Resource::Empty]);
}

/// Electrolysis: 1 water -> 8/9 oxygen + 1/9 hydrogen.
fn electrolysis() -> Catalogue {
    let mut builder = CatalogueBuilder::new();
    builder
        .add_recipe(
            RecipeSpec::conversion("CR:electrolysis", "Electrolysis")
                .input(Resource::element("water"), r(1))
                .output(Resource::element("oxygen"), Rational::new(8, 9).unwrap())
                .output(Resource::element("hydrogen"), Rational::new(1, 9).unwrap()),
        )
        .unwrap();
    builder.build()
}

#[test]
fn test_targets_in_one_subgraph_share_byproducts() {
    let catalogue = electrolysis();
    let solver = Solver::new(&catalogue, SolverOptions::default());
    let wanted = targets(&[(Resource::element("oxygen"), 8), (Resource::element("hydrogen"), 1)]);

    let plan = solver.solve(&wanted, &HashSet::new());

    assert_eq!(plan.get_recipe(id(&catalogue, "CR:electrolysis")), r(9));
    assert_eq!(plan.get_item(&Resource::element("water")), r(9));
    assert!(plan.waste().is_empty(), "unexpected waste {:?}", plan.waste());
    assert!(plan.is_satisfied());

    let (group, _) = plan
        .children(Accumulator::ROOT)
        .find(|(_, node)| !node.resource.is_valid())
        .expect("shared draws should be grouped");
    let shared: Vec<(Resource, Rational)> = plan.children(group).map(|(_, n)| (n.resource.clone(), n.amount)).collect();
    assert_eq!(shared, vec![(Resource::element("water"), r(9))]);
}

#[test]
fn test_uneven_targets_in_one_subgraph_waste_only_the_excess() {
    let catalogue = electrolysis();
    let solver = Solver::new(&catalogue, SolverOptions::default());
    let wanted = targets(&[(Resource::element("oxygen"), 8), (Resource::element("hydrogen"), 2)]);

    let plan = solver.solve(&wanted, &HashSet::new());

    assert_eq!(plan.get_recipe(id(&catalogue, "CR:electrolysis")), r(18));
    assert_eq!(plan.get_waste(&Resource::element("oxygen")), r(8));
    assert_eq!(plan.get_waste(&Resource::element("hydrogen")), Rational::ZERO);
}

#[test]
fn test_solve_is_deterministic() {
    let catalogue = two_step();
    let solver = Solver::new(&catalogue, SolverOptions::default());
    let wanted = targets(&[(Resource::item("y"), 7)]);

    let first = solver.solve(&wanted, &HashSet::new());
    let second = solver.solve(&wanted, &HashSet::new());
    assert_eq!(first, second);
}
