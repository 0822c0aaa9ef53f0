//! Plan request files
//!
//! A plan is a JSON document naming the wanted outputs, the resources the
//! player supplies, recipes to leave out, producer speed overrides and
//! solver options:
//!
//! ```json
//! {
//!   "outputs": { "item:gear": "3/2", "element:oxygen": 0.888 },
//!   "inputs": ["item:plate"],
//!   "disabled": ["CR:gear_alt"],
//!   "tuning": { "BlastFurnace": 3 },
//!   "options": { "iteration_limit": 500 }
//! }
//! ```

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;
use walkdir::WalkDir;

use crate::catalogue::Catalogue;
use crate::error::PlanError;
use crate::matrix_solver::SolverOptions;
use crate::models::{RecipeId, Resource};
use crate::rational::Rational;

static TARGET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*([^=]+?)\s*=\s*(\S+)\s*$").expect("target pattern is valid"));

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanRequest {
    pub outputs: IndexMap<Resource, Rational>,
    pub inputs: Vec<Resource>,
    /// Recipe identifiers.
    pub disabled: Vec<String>,
    /// Producer identifier -> speed.
    pub tuning: IndexMap<String, Rational>,
    pub options: SolverOptions,
}

/// A plan request mapped onto catalogue entities.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedPlan {
    pub targets: IndexMap<Resource, Rational>,
    pub ignore: HashSet<Resource>,
    pub disabled: HashSet<RecipeId>,
}

impl PlanRequest {
    pub fn load(path: &Path) -> Result<Self, PlanError> {
        let content = fs::read_to_string(path).map_err(|source| PlanError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| PlanError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), PlanError> {
        let content = serde_json::to_string_pretty(self).map_err(|source| PlanError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, content).map_err(|source| PlanError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Adds a wanted output; an output already present is left untouched.
    pub fn add_output(&mut self, resource: Resource, amount: Rational) -> bool {
        if self.outputs.contains_key(&resource) {
            return false;
        }
        self.outputs.insert(resource, amount);
        true
    }

    pub fn remove_output(&mut self, resource: &Resource) -> bool {
        self.outputs.shift_remove(resource).is_some()
    }

    pub fn add_input(&mut self, resource: Resource) -> bool {
        if self.inputs.contains(&resource) {
            return false;
        }
        self.inputs.push(resource);
        true
    }

    pub fn remove_input(&mut self, resource: &Resource) -> bool {
        let before = self.inputs.len();
        self.inputs.retain(|r| r != resource);
        self.inputs.len() != before
    }

    pub fn disable(&mut self, identifier: &str) -> bool {
        if self.disabled.iter().any(|d| d == identifier) {
            return false;
        }
        self.disabled.push(identifier.to_string());
        true
    }

    /// Applies the `tuning` block, skipping unknown producers.
    pub fn tuned_catalogue(&self, catalogue: &Catalogue) -> Catalogue {
        let mut tuned = catalogue.clone();
        for (identifier, speed) in &self.tuning {
            match catalogue.producer_by_identifier(identifier) {
                Some(producer) => tuned = tuned.retune(producer.id, *speed),
                None => warn!(producer = %identifier, "tuning for unknown producer skipped"),
            }
        }
        tuned
    }

    /// Maps names onto catalogue entities. Unknown entries are logged and
    /// dropped.
    pub fn resolve(&self, catalogue: &Catalogue) -> ResolvedPlan {
        let mut resolved = ResolvedPlan::default();

        for (resource, amount) in &self.outputs {
            if !catalogue.contains_resource(resource) {
                warn!(resource = %resource, "unknown output skipped");
                continue;
            }
            if amount.is_negative() {
                warn!(resource = %resource, amount = %amount, "negative output skipped");
                continue;
            }
            resolved.targets.insert(resource.clone(), *amount);
        }

        for resource in &self.inputs {
            if catalogue.contains_resource(resource) {
                resolved.ignore.insert(resource.clone());
            } else {
                warn!(resource = %resource, "unknown input skipped");
            }
        }

        for identifier in &self.disabled {
            if let Some(recipe) = catalogue.recipe_by_identifier(identifier) {
                resolved.disabled.insert(recipe.id);
            }
        }
        resolved
    }
}

/// Parses a `resource=amount` command-line target.
///
/// ```
/// use planit::plan::parse_target;
/// use planit::models::Resource;
/// use planit::rational::Rational;
///
/// let (resource, amount) = parse_target("element:oxygen = 3/2").unwrap();
/// assert_eq!(resource, Resource::element("oxygen"));
/// assert_eq!(amount, Rational::new(3, 2).unwrap());
/// ```
pub fn parse_target(text: &str) -> Result<(Resource, Rational), PlanError> {
    let cap = TARGET
        .captures(text)
        .ok_or_else(|| PlanError::InvalidTarget(text.to_string()))?;
    let resource: Resource = cap[1].parse()?;
    let amount: Rational = cap[2].parse()?;
    Ok((resource, amount))
}

/// Finds every `*.json` plan below `dir`, sorted by path.
pub fn list_plans(dir: &Path) -> Result<Vec<PathBuf>, PlanError> {
    let mut plans = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type().is_file() && path.extension().is_some_and(|ext| ext == "json") {
            plans.push(path.to_path_buf());
        }
    }
    plans.sort();
    Ok(plans)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogue::{CatalogueBuilder, RecipeSpec};

    fn catalogue() -> Catalogue {
        let mut builder = CatalogueBuilder::new();
        builder.add_producer("Assembler", "Assembler", "assembler", Rational::ONE, Rational::from(100));
        builder
            .add_recipe(
                RecipeSpec::conversion("CR:gear", "Gear")
                    .input(Resource::item("plate"), Rational::from(2))
                    .output(Resource::item("gear"), Rational::ONE),
            )
            .unwrap();
        builder.build()
    }

    #[test]
    fn test_parse_json_with_mixed_amounts() {
        let request: PlanRequest = serde_json::from_str(
            r#"{ "outputs": { "item:gear": "3/2", "oxygen": 0.888 }, "inputs": ["item:plate"] }"#,
        )
        .unwrap();
        assert_eq!(request.outputs[&Resource::item("gear")], Rational::new(3, 2).unwrap());
        assert_eq!(request.outputs[&Resource::item("oxygen")], Rational::new(111, 125).unwrap());
        assert!(request.disabled.is_empty());
        assert_eq!(request.options, SolverOptions::default());
    }

    #[test]
    fn test_add_output_refuses_duplicates() {
        let mut request = PlanRequest::default();
        assert!(request.add_output(Resource::item("gear"), Rational::ONE));
        assert!(!request.add_output(Resource::item("gear"), Rational::from(5)));
        assert_eq!(request.outputs[&Resource::item("gear")], Rational::ONE);
        assert!(request.remove_output(&Resource::item("gear")));
        assert!(request.add_input(Resource::item("plate")));
        assert!(!request.add_input(Resource::item("plate")));
        assert!(request.remove_input(&Resource::item("plate")));
    }

    #[test]
    fn test_resolve_skips_unknown_entries() {
        let catalogue = catalogue();
        let mut request = PlanRequest::default();
        request.add_output(Resource::item("gear"), Rational::from(2));
        request.add_output(Resource::item("nothing"), Rational::ONE);
        request.add_input(Resource::item("plate"));
        request.disable("CR:gear");
        request.disable("CR:missing");

        let resolved = request.resolve(&catalogue);
        assert_eq!(resolved.targets.len(), 1);
        assert!(resolved.ignore.contains(&Resource::item("plate")));
        assert_eq!(resolved.disabled.len(), 1);
    }

    #[test]
    fn test_tuning_retunes_producers() {
        let catalogue = catalogue();
        let mut request = PlanRequest::default();
        request.tuning.insert("Assembler".to_string(), Rational::from(3));
        request.tuning.insert("Nope".to_string(), Rational::from(3));
        let tuned = request.tuned_catalogue(&catalogue);
        assert_eq!(tuned.producer_by_identifier("Assembler").unwrap().speed, Rational::from(3));
    }

    #[test]
    fn test_parse_target_rejects_garbage() {
        assert!(matches!(parse_target("gear"), Err(PlanError::InvalidTarget(_))));
        assert!(parse_target("gear=abc").is_err());
        assert_eq!(parse_target("gear=2").unwrap().1, Rational::from(2));
    }
}
