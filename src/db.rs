//! SQLite-backed catalogue storage

use std::collections::HashMap;

use anyhow::{Context, Result};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{Connection, params};
use tracing::warn;

use crate::building::Building;
use crate::catalogue::{Catalogue, CatalogueBuilder, RecipeSpec};
use crate::models::{ProducerId, RecipeKind, Resource};
use crate::rational::Rational;

/// Amounts are stored as exact text (`"8/9"`), never as REAL.
impl ToSql for Rational {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.to_string()))
    }
}

impl FromSql for Rational {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value {
            ValueRef::Integer(n) => Ok(Rational::from(n)),
            _ => value
                .as_str()?
                .parse()
                .map_err(|e| FromSqlError::Other(Box::new(e))),
        }
    }
}

impl ToSql for Resource {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.to_string()))
    }
}

impl FromSql for Resource {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Items and elements, keyed by "item:<key>" / "element:<key>"
        CREATE TABLE IF NOT EXISTS resources (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            base INTEGER NOT NULL DEFAULT 0
        );

        -- Buildings able to run recipes
        CREATE TABLE IF NOT EXISTS producers (
            identifier TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            icon TEXT NOT NULL,
            speed TEXT NOT NULL,
            power_usage TEXT NOT NULL
        );

        -- Raw-resource recipes are derived when the catalogue is built
        CREATE TABLE IF NOT EXISTS recipes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            identifier TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            kind TEXT NOT NULL,
            time TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS recipe_inputs (
            recipe_id INTEGER NOT NULL,
            resource_id TEXT NOT NULL,
            amount TEXT NOT NULL,
            PRIMARY KEY (recipe_id, resource_id)
        );

        CREATE TABLE IF NOT EXISTS recipe_outputs (
            recipe_id INTEGER NOT NULL,
            resource_id TEXT NOT NULL,
            amount TEXT NOT NULL,
            PRIMARY KEY (recipe_id, resource_id)
        );

        CREATE TABLE IF NOT EXISTS recipe_producers (
            recipe_id INTEGER NOT NULL,
            producer_id TEXT NOT NULL,
            PRIMARY KEY (recipe_id, producer_id)
        );

        CREATE INDEX IF NOT EXISTS idx_recipe_outputs_resource ON recipe_outputs(resource_id);
        CREATE INDEX IF NOT EXISTS idx_recipe_inputs_resource ON recipe_inputs(resource_id);
        "#,
    )?;
    Ok(())
}

/// Insert or replace a resource
pub fn upsert_resource(conn: &Connection, resource: &Resource, name: &str, base: bool) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO resources (id, name, base) VALUES (?1, ?2, ?3)",
        params![resource, name, base],
    )?;
    Ok(())
}

/// Insert or replace a producer described by a building
pub fn upsert_building(conn: &Connection, building: &Building) -> Result<()> {
    let speed = building
        .speed()
        .with_context(|| format!("Speed of {} overflows", building.identifier))?;
    conn.execute(
        "INSERT OR REPLACE INTO producers (identifier, name, icon, speed, power_usage)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            building.identifier,
            building.name,
            building.icon,
            speed,
            building.power_usage(),
        ],
    )?;
    Ok(())
}

/// Insert a recipe with its amounts; `producers` are producer identifiers
pub fn insert_recipe(conn: &Connection, recipe: &RecipeSpec, producers: &[&str]) -> Result<i64> {
    conn.execute(
        "INSERT INTO recipes (identifier, name, kind, time) VALUES (?1, ?2, ?3, ?4)",
        params![recipe.identifier, recipe.name, recipe.kind.as_str(), recipe.time],
    )
    .with_context(|| format!("Failed to insert recipe {}", recipe.identifier))?;
    let id = conn.last_insert_rowid();

    for (resource, amount) in &recipe.inputs {
        conn.execute(
            "INSERT INTO recipe_inputs (recipe_id, resource_id, amount) VALUES (?1, ?2, ?3)",
            params![id, resource, amount],
        )?;
    }
    for (resource, amount) in &recipe.outputs {
        conn.execute(
            "INSERT INTO recipe_outputs (recipe_id, resource_id, amount) VALUES (?1, ?2, ?3)",
            params![id, resource, amount],
        )?;
    }
    for producer in producers {
        conn.execute(
            "INSERT INTO recipe_producers (recipe_id, producer_id) VALUES (?1, ?2)",
            params![id, producer],
        )?;
    }
    Ok(id)
}

/// Clear the whole catalogue (for reloading)
pub fn clear_catalogue(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        DELETE FROM recipe_producers;
        DELETE FROM recipe_outputs;
        DELETE FROM recipe_inputs;
        DELETE FROM recipes;
        DELETE FROM producers;
        DELETE FROM resources;
        "#,
    )?;
    Ok(())
}

type Amounts = Vec<(Resource, Rational)>;

fn recipe_amounts(conn: &Connection, table: &str) -> Result<HashMap<i64, Amounts>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT recipe_id, resource_id, amount FROM {} ORDER BY rowid",
        table
    ))?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, i64>(0)?, row.get::<_, Resource>(1)?, row.get::<_, Rational>(2)?))
    })?;

    let mut results: HashMap<i64, Amounts> = HashMap::new();
    for row in rows {
        let (recipe, resource, amount) = row.with_context(|| format!("Bad row in {}", table))?;
        results.entry(recipe).or_default().push((resource, amount));
    }
    Ok(results)
}

/// Build a catalogue from everything stored
pub fn load_catalogue(conn: &Connection) -> Result<Catalogue> {
    let mut builder = CatalogueBuilder::new();

    let mut stmt = conn.prepare("SELECT id, name, base FROM resources ORDER BY rowid")?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, Resource>(0)?, row.get::<_, String>(1)?, row.get::<_, bool>(2)?))
    })?;
    for row in rows {
        let (resource, name, base) = row.context("Bad resource row")?;
        let resource = builder.add_resource(resource, &name);
        if base {
            builder.add_base_resource(resource);
        }
    }

    let mut producers: HashMap<String, ProducerId> = HashMap::new();
    let mut stmt =
        conn.prepare("SELECT identifier, name, icon, speed, power_usage FROM producers ORDER BY rowid")?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, Rational>(3)?,
            row.get::<_, Rational>(4)?,
        ))
    })?;
    for row in rows {
        let (identifier, name, icon, speed, power_usage) = row.context("Bad producer row")?;
        let id = builder.add_producer(&identifier, &name, &icon, speed, power_usage);
        producers.insert(identifier, id);
    }

    let mut inputs = recipe_amounts(conn, "recipe_inputs")?;
    let mut outputs = recipe_amounts(conn, "recipe_outputs")?;

    let mut recipe_producers: HashMap<i64, Vec<String>> = HashMap::new();
    let mut stmt = conn.prepare("SELECT recipe_id, producer_id FROM recipe_producers ORDER BY rowid")?;
    let rows = stmt.query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))?;
    for row in rows {
        let (recipe, producer) = row?;
        recipe_producers.entry(recipe).or_default().push(producer);
    }

    let mut stmt = conn.prepare("SELECT id, identifier, name, kind, time FROM recipes ORDER BY id")?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, Rational>(4)?,
        ))
    })?;
    for row in rows {
        let (id, identifier, name, kind, time) = row.context("Bad recipe row")?;
        let kind: RecipeKind = kind.parse()?;
        let mut spec = RecipeSpec::conversion(&identifier, &name).time(time);
        spec.kind = kind;
        spec.inputs = inputs.remove(&id).unwrap_or_default();
        spec.outputs = outputs.remove(&id).unwrap_or_default();
        for producer in recipe_producers.remove(&id).unwrap_or_default() {
            match producers.get(&producer) {
                Some(pid) => spec = spec.producer(*pid),
                None => warn!(recipe = %identifier, producer = %producer, "unknown producer"),
            }
        }
        builder
            .add_recipe(spec)
            .with_context(|| format!("Invalid recipe {}", identifier))?;
    }

    Ok(builder.build())
}

/// List all unique resources that are outputs
pub fn list_producible_resources(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT o.resource_id, COALESCE(r.name, o.resource_id)
         FROM recipe_outputs o
         LEFT JOIN resources r ON r.id = o.resource_id
         ORDER BY o.resource_id",
    )?;

    let rows = stmt.query_map([], |row| {
        let id: String = row.get(0)?;
        let name: String = row.get(1)?;
        Ok(format!("{} ({})", name, id))
    })?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::building::BuildingKind;

    #[test]
    fn test_catalogue_round_trip() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        let electrolyzer = Building::new(
            "Electrolyzer",
            "Electrolyzer",
            BuildingKind::ResourceConverter {
                power_usage: Rational::from(120),
            },
        );
        upsert_building(&conn, &electrolyzer).unwrap();
        upsert_resource(&conn, &Resource::element("water"), "Water", true).unwrap();
        insert_recipe(
            &conn,
            &RecipeSpec::conversion("CR:electrolysis", "Electrolysis")
                .input(Resource::element("water"), Rational::ONE)
                .output(Resource::element("oxygen"), Rational::new(8, 9).unwrap())
                .output(Resource::element("hydrogen"), Rational::new(1, 9).unwrap()),
            &["Electrolyzer"],
        )
        .unwrap();

        let catalogue = load_catalogue(&conn).unwrap();
        let recipe = catalogue.recipe_by_identifier("CR:electrolysis").unwrap();
        assert_eq!(
            recipe.output_amount(&Resource::element("oxygen")),
            Rational::new(8, 9).unwrap()
        );
        assert_eq!(recipe.producers.len(), 1);
        assert!(catalogue.recipe_by_identifier("RR:water").is_some());
        assert_eq!(catalogue.resource_name(&Resource::element("water")), "Water");

        let producible = list_producible_resources(&conn).unwrap();
        assert_eq!(producible.len(), 2);

        clear_catalogue(&conn).unwrap();
        assert!(load_catalogue(&conn).unwrap().is_empty());
    }
}
