//! Recipe catalogue: the read-only snapshot every solve works against.
//!
//! A [`Catalogue`] is built once through [`CatalogueBuilder`] and never
//! mutated afterwards. Retuning a producer yields a new catalogue
//! ([`Catalogue::retune`]); recipes refer to producers by [`ProducerId`] so
//! that is a single table update.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::building::Building;
use crate::error::{PlanError, RationalError};
use crate::models::{Amount, Producer, ProducerId, Recipe, RecipeId, RecipeKind, Resource};
use crate::rational::Rational;

/// Recipe description handed to the builder, before ids are assigned.
///
/// ```
/// use planit::catalogue::RecipeSpec;
/// use planit::models::Resource;
/// use planit::rational::Rational;
///
/// let spec = RecipeSpec::conversion("CR:plate", "Iron Plate")
///     .input(Resource::item("iron_ingot"), Rational::from(2))
///     .output(Resource::item("iron_plate"), Rational::ONE);
/// assert_eq!(spec.inputs.len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RecipeSpec {
    pub identifier: String,
    pub name: String,
    pub kind: RecipeKind,
    pub time: Rational,
    pub inputs: Vec<(Resource, Rational)>,
    pub outputs: Vec<(Resource, Rational)>,
    pub producers: Vec<ProducerId>,
}

impl RecipeSpec {
    pub fn conversion(identifier: &str, name: &str) -> Self {
        Self {
            identifier: identifier.to_string(),
            name: name.to_string(),
            kind: RecipeKind::Conversion,
            time: Rational::ONE,
            inputs: Vec::new(),
            outputs: Vec::new(),
            producers: Vec::new(),
        }
    }

    pub fn resource(identifier: &str, name: &str) -> Self {
        Self {
            kind: RecipeKind::Resource,
            ..Self::conversion(identifier, name)
        }
    }

    pub fn input(mut self, resource: Resource, amount: Rational) -> Self {
        self.inputs.push((resource, amount));
        self
    }

    pub fn output(mut self, resource: Resource, amount: Rational) -> Self {
        self.outputs.push((resource, amount));
        self
    }

    pub fn time(mut self, time: Rational) -> Self {
        self.time = time;
        self
    }

    pub fn producer(mut self, producer: ProducerId) -> Self {
        self.producers.push(producer);
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct Catalogue {
    recipes: Vec<Recipe>,
    by_identifier: HashMap<String, RecipeId>,
    producers: Vec<Producer>,
    producer_by_identifier: HashMap<String, ProducerId>,
    resources: IndexMap<Resource, String>,
    produced_by: HashMap<Resource, Vec<RecipeId>>,
    consumed_by: HashMap<Resource, Vec<RecipeId>>,
}

impl Catalogue {
    pub fn recipes(&self) -> &[Recipe] {
        &self.recipes
    }

    pub fn len(&self) -> usize {
        self.recipes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
    }

    /// Looks up a recipe by dense id. A miss is logged, not raised.
    pub fn recipe(&self, id: RecipeId) -> Option<&Recipe> {
        let recipe = self.recipes.get(id.0 as usize);
        if recipe.is_none() {
            warn!(recipe = %id, "missing recipe");
        }
        recipe
    }

    pub fn recipe_by_identifier(&self, identifier: &str) -> Option<&Recipe> {
        match self.by_identifier.get(identifier) {
            Some(id) => self.recipe(*id),
            None => {
                warn!(identifier, "missing recipe");
                None
            }
        }
    }

    /// Recipes producing `resource`, in catalogue order.
    pub fn recipes_for(&self, resource: &Resource) -> Vec<&Recipe> {
        self.lookup(&self.produced_by, resource)
    }

    /// Recipes consuming `resource`, in catalogue order.
    pub fn uses_for(&self, resource: &Resource) -> Vec<&Recipe> {
        self.lookup(&self.consumed_by, resource)
    }

    /// The recipe used to import `resource` when it is a pure input.
    pub fn default_recipe_for(&self, resource: &Resource) -> Option<&Recipe> {
        self.produced_by
            .get(resource)
            .and_then(|ids| ids.first())
            .and_then(|id| self.recipes.get(id.0 as usize))
    }

    fn lookup(&self, index: &HashMap<Resource, Vec<RecipeId>>, resource: &Resource) -> Vec<&Recipe> {
        index
            .get(resource)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.recipes.get(id.0 as usize))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn producers(&self) -> &[Producer] {
        &self.producers
    }

    pub fn producer(&self, id: ProducerId) -> Option<&Producer> {
        self.producers.get(id.0 as usize)
    }

    pub fn producer_by_identifier(&self, identifier: &str) -> Option<&Producer> {
        self.producer_by_identifier
            .get(identifier)
            .and_then(|id| self.producer(*id))
    }

    pub fn resources(&self) -> impl Iterator<Item = &Resource> {
        self.resources.keys()
    }

    pub fn contains_resource(&self, resource: &Resource) -> bool {
        self.resources.contains_key(resource)
    }

    /// Display name, falling back to the key.
    pub fn resource_name<'a>(&'a self, resource: &'a Resource) -> &'a str {
        self.resources
            .get(resource)
            .map(String::as_str)
            .unwrap_or_else(|| resource.key())
    }

    /// A copy of this catalogue with one producer running at a new speed.
    pub fn retune(&self, producer: ProducerId, speed: Rational) -> Catalogue {
        let mut tuned = self.clone();
        match tuned.producers.get_mut(producer.0 as usize) {
            Some(entry) => entry.speed = speed,
            None => warn!(producer = producer.0, "retune of unknown producer ignored"),
        }
        tuned
    }
}

/// Collects resources, producers and recipes, then freezes them into a
/// [`Catalogue`].
#[derive(Debug, Default)]
pub struct CatalogueBuilder {
    recipes: Vec<Recipe>,
    by_identifier: HashMap<String, RecipeId>,
    producers: Vec<Producer>,
    producer_by_identifier: HashMap<String, ProducerId>,
    resources: IndexMap<Resource, String>,
    base_resources: Vec<Resource>,
}

impl CatalogueBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a resource and its display name; returns the interned value.
    pub fn add_resource(&mut self, resource: Resource, name: &str) -> Resource {
        let (index, _) = self.resources.insert_full(resource, name.to_string());
        self.interned(index)
    }

    fn intern(&mut self, resource: Resource) -> Resource {
        let index = match self.resources.get_index_of(&resource) {
            Some(index) => index,
            None => {
                let name = resource.key().to_string();
                self.resources.insert_full(resource, name).0
            }
        };
        self.interned(index)
    }

    fn interned(&self, index: usize) -> Resource {
        self.resources
            .get_index(index)
            .map(|(resource, _)| resource.clone())
            .unwrap_or_default()
    }

    /// Always give `resource` a raw-resource recipe, even if something
    /// else produces it.
    pub fn add_base_resource(&mut self, resource: Resource) {
        let resource = self.intern(resource);
        if !self.base_resources.contains(&resource) {
            self.base_resources.push(resource);
        }
    }

    pub fn add_producer(
        &mut self,
        identifier: &str,
        name: &str,
        icon: &str,
        speed: Rational,
        power_usage: Rational,
    ) -> ProducerId {
        if let Some(id) = self.producer_by_identifier.get(identifier) {
            return *id;
        }
        let id = ProducerId(self.producers.len() as u32);
        self.producers.push(Producer {
            id,
            identifier: identifier.to_string(),
            name: name.to_string(),
            icon: icon.to_string(),
            speed,
            power_usage,
        });
        self.producer_by_identifier.insert(identifier.to_string(), id);
        id
    }

    pub fn add_building(&mut self, building: &Building) -> Result<ProducerId, RationalError> {
        let speed = building.speed()?;
        Ok(self.add_producer(
            &building.identifier,
            &building.name,
            &building.icon,
            speed,
            building.power_usage(),
        ))
    }

    /// Adds a recipe, summing repeated resources on either side.
    pub fn add_recipe(&mut self, spec: RecipeSpec) -> Result<RecipeId, PlanError> {
        if self.by_identifier.contains_key(&spec.identifier) {
            return Err(PlanError::DuplicateRecipe(spec.identifier));
        }
        let outputs = self.collapse(&spec.identifier, spec.outputs)?;
        let inputs = self.collapse(&spec.identifier, spec.inputs)?;

        let id = RecipeId(self.recipes.len() as u32);
        self.by_identifier.insert(spec.identifier.clone(), id);
        self.recipes.push(Recipe {
            id,
            identifier: spec.identifier,
            name: spec.name,
            kind: spec.kind,
            outputs,
            inputs,
            time: spec.time,
            producers: spec.producers,
        });
        Ok(id)
    }

    fn collapse(
        &mut self,
        recipe: &str,
        amounts: Vec<(Resource, Rational)>,
    ) -> Result<Vec<Amount>, PlanError> {
        let mut summed: IndexMap<Resource, Rational> = IndexMap::new();
        for (resource, amount) in amounts {
            if amount.is_negative() {
                return Err(PlanError::NegativeAmount {
                    recipe: recipe.to_string(),
                    resource: resource.to_string(),
                });
            }
            let resource = self.intern(resource);
            let total = summed.entry(resource).or_insert(Rational::ZERO);
            *total = total.checked_add(amount)?;
        }
        Ok(summed
            .into_iter()
            .map(|(resource, amount)| Amount::new(resource, amount))
            .collect())
    }

    /// Freezes the catalogue. Every resource nothing produces, and every
    /// base resource, gets a raw-resource recipe `RR:<key>` yielding 1 unit. When the key is
    /// already taken the full form `RR:<kind>:<key>` is used.
    pub fn build(mut self) -> Catalogue {
        let produced: HashSet<Resource> = self
            .recipes
            .iter()
            .flat_map(|recipe| recipe.outputs.iter().map(|a| a.resource.clone()))
            .collect();

        let mut raw: Vec<(Resource, String)> = self
            .resources
            .iter()
            .filter(|(resource, _)| resource.is_valid() && !produced.contains(resource))
            .map(|(resource, name)| (resource.clone(), name.clone()))
            .collect();
        for resource in &self.base_resources {
            if !raw.iter().any(|(r, _)| r == resource) {
                let name = self.resources.get(resource).cloned().unwrap_or_default();
                raw.push((resource.clone(), name));
            }
        }

        for (resource, name) in raw {
            // item:iron and element:iron share a key
            let mut identifier = format!("RR:{}", resource.key());
            if self.by_identifier.contains_key(&identifier) {
                identifier = format!("RR:{}", resource);
            }
            let spec = RecipeSpec::resource(&identifier, &name).output(resource, Rational::ONE);
            if let Err(err) = self.add_recipe(spec) {
                warn!(%err, "skipping raw resource recipe");
            }
        }

        let mut produced_by: HashMap<Resource, Vec<RecipeId>> = HashMap::new();
        let mut consumed_by: HashMap<Resource, Vec<RecipeId>> = HashMap::new();
        for recipe in &self.recipes {
            for output in &recipe.outputs {
                produced_by
                    .entry(output.resource.clone())
                    .or_default()
                    .push(recipe.id);
            }
            for input in &recipe.inputs {
                consumed_by
                    .entry(input.resource.clone())
                    .or_default()
                    .push(recipe.id);
            }
        }

        debug!(
            recipes = self.recipes.len(),
            producers = self.producers.len(),
            resources = self.resources.len(),
            "catalogue built"
        );

        Catalogue {
            recipes: self.recipes,
            by_identifier: self.by_identifier,
            producers: self.producers,
            producer_by_identifier: self.producer_by_identifier,
            resources: self.resources,
            produced_by,
            consumed_by,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Catalogue {
        let mut builder = CatalogueBuilder::new();
        builder.add_resource(Resource::item("ore"), "Ore");
        builder
            .add_recipe(
                RecipeSpec::conversion("CR:ingot", "Ingot")
                    .input(Resource::item("ore"), Rational::ONE)
                    .input(Resource::item("ore"), Rational::ONE)
                    .output(Resource::item("ingot"), Rational::ONE),
            )
            .unwrap();
        builder.build()
    }

    #[test]
    fn test_duplicate_amounts_are_summed() {
        let catalogue = sample();
        let ingot = catalogue.recipe_by_identifier("CR:ingot").unwrap();
        assert_eq!(ingot.inputs.len(), 1);
        assert_eq!(ingot.input_amount(&Resource::item("ore")), Rational::from(2));
    }

    #[test]
    fn test_raw_resource_recipes_are_added() {
        let catalogue = sample();
        let raw = catalogue.recipe_by_identifier("RR:ore").unwrap();
        assert!(raw.is_resource());
        assert_eq!(raw.name, "Ore");
        assert_eq!(raw.output_amount(&Resource::item("ore")), Rational::ONE);
        assert!(catalogue.recipe_by_identifier("RR:ingot").is_none());
        assert_eq!(catalogue.len(), 2);
    }

    #[test]
    fn test_lookups() {
        let catalogue = sample();
        let ore = Resource::item("ore");
        assert_eq!(catalogue.recipes_for(&ore).len(), 1);
        assert_eq!(catalogue.uses_for(&ore)[0].identifier, "CR:ingot");
        assert_eq!(catalogue.default_recipe_for(&ore).unwrap().identifier, "RR:ore");
        assert!(catalogue.recipe(RecipeId(99)).is_none());
        assert_eq!(catalogue.resource_name(&ore), "Ore");
        assert_eq!(catalogue.resource_name(&Resource::item("ingot")), "ingot");
    }

    #[test]
    fn test_rejects_bad_recipes() {
        let mut builder = CatalogueBuilder::new();
        builder.add_recipe(RecipeSpec::conversion("CR:a", "A")).unwrap();
        assert!(matches!(
            builder.add_recipe(RecipeSpec::conversion("CR:a", "A")),
            Err(PlanError::DuplicateRecipe(_))
        ));
        assert!(matches!(
            builder.add_recipe(
                RecipeSpec::conversion("CR:b", "B").input(Resource::item("x"), Rational::MINUS_ONE)
            ),
            Err(PlanError::NegativeAmount { .. })
        ));
    }

    #[test]
    fn test_base_resource_gets_raw_recipe_even_when_produced() {
        let mut builder = CatalogueBuilder::new();
        builder
            .add_recipe(RecipeSpec::conversion("CR:water", "Water").output(Resource::element("water"), Rational::ONE))
            .unwrap();
        builder.add_base_resource(Resource::element("water"));
        let catalogue = builder.build();
        assert!(catalogue.recipe_by_identifier("RR:water").is_some());
        assert_eq!(catalogue.recipes_for(&Resource::element("water")).len(), 2);
    }

    #[test]
    fn test_raw_recipes_for_item_and_element_with_same_key() {
        let mut builder = CatalogueBuilder::new();
        builder
            .add_recipe(
                RecipeSpec::conversion("CR:alloy", "Alloy")
                    .input(Resource::item("iron"), Rational::ONE)
                    .input(Resource::element("iron"), Rational::ONE)
                    .output(Resource::item("alloy"), Rational::ONE),
            )
            .unwrap();
        let catalogue = builder.build();
        assert_eq!(catalogue.recipes_for(&Resource::item("iron")).len(), 1);
        assert_eq!(catalogue.recipes_for(&Resource::element("iron")).len(), 1);
        assert!(catalogue.recipe_by_identifier("RR:iron").is_some());
        let element = catalogue.recipe_by_identifier("RR:element:iron").unwrap();
        assert_eq!(element.output_amount(&Resource::element("iron")), Rational::ONE);
    }

    #[test]
    fn test_retune_returns_new_catalogue() {
        let mut builder = CatalogueBuilder::new();
        let id = builder.add_producer("Assembler", "Assembler", "assembler", Rational::ONE, Rational::from(10));
        let catalogue = builder.build();
        let tuned = catalogue.retune(id, Rational::from(2));
        assert_eq!(catalogue.producer(id).unwrap().speed, Rational::ONE);
        assert_eq!(tuned.producer(id).unwrap().speed, Rational::from(2));
    }
}
