//! Connected-component decomposition of the recipe graph.
//!
//! Two recipes are connected when they share any input or output resource.
//! Solving a target only needs the component that produces it.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use tracing::debug;

use crate::catalogue::Catalogue;
use crate::models::{Recipe, RecipeId, Resource};
use crate::rational::Rational;

#[derive(Debug, Clone, PartialEq)]
pub struct SubGraph {
    pub id: u32,
    pub recipes: Vec<RecipeId>,
    /// Summed output amount per resource; an index, not a solve result.
    pub products: IndexMap<Resource, Rational>,
    /// Summed input amount per resource.
    pub ingredients: IndexMap<Resource, Rational>,
}

impl SubGraph {
    fn new(id: u32, recipes: &[&Recipe]) -> Self {
        let mut products: IndexMap<Resource, Rational> = IndexMap::new();
        let mut ingredients: IndexMap<Resource, Rational> = IndexMap::new();
        for recipe in recipes {
            for output in &recipe.outputs {
                let total = products.entry(output.resource.clone()).or_default();
                *total = total.checked_add(output.amount).unwrap_or(*total);
            }
            for input in &recipe.inputs {
                let total = ingredients.entry(input.resource.clone()).or_default();
                *total = total.checked_add(input.amount).unwrap_or(*total);
            }
        }
        Self {
            id,
            recipes: recipes.iter().map(|r| r.id).collect(),
            products,
            ingredients,
        }
    }

    /// More than a single one-product recipe.
    pub fn is_complex(&self) -> bool {
        self.recipes.len() > 1 || self.products.len() > 1
    }

    pub fn produces(&self, resource: &Resource) -> bool {
        self.products.contains_key(resource)
    }

    pub fn consumes(&self, resource: &Resource) -> bool {
        self.ingredients.contains_key(resource)
    }
}

struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl UnionFind {
    fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
            rank: vec![0; len],
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return;
        }
        match self.rank[ra].cmp(&self.rank[rb]) {
            std::cmp::Ordering::Less => self.parent[ra] = rb,
            std::cmp::Ordering::Greater => self.parent[rb] = ra,
            std::cmp::Ordering::Equal => {
                self.parent[rb] = ra;
                self.rank[ra] += 1;
            }
        }
    }
}

/// Splits the enabled recipes into connected components.
///
/// Components are numbered from 0 in the order their first recipe appears
/// in the catalogue, and list their recipes in catalogue order.
pub fn find_subgraphs(catalogue: &Catalogue, disabled: &HashSet<RecipeId>) -> Vec<SubGraph> {
    let enabled: Vec<&Recipe> = catalogue
        .recipes()
        .iter()
        .filter(|recipe| !disabled.contains(&recipe.id))
        .collect();

    let mut sets = UnionFind::new(enabled.len());
    let mut first_touch: HashMap<&Resource, usize> = HashMap::new();
    for (index, recipe) in enabled.iter().enumerate() {
        for resource in recipe.resources() {
            match first_touch.get(resource) {
                Some(&other) => sets.union(index, other),
                None => {
                    first_touch.insert(resource, index);
                }
            }
        }
    }

    let mut components: IndexMap<usize, Vec<&Recipe>> = IndexMap::new();
    for (index, recipe) in enabled.iter().enumerate() {
        let root = sets.find(index);
        components.entry(root).or_default().push(recipe);
    }

    let subgraphs: Vec<SubGraph> = components
        .values()
        .enumerate()
        .map(|(id, recipes)| SubGraph::new(id as u32, recipes))
        .collect();

    debug!(
        recipes = enabled.len(),
        subgraphs = subgraphs.len(),
        "decomposed recipe graph"
    );
    subgraphs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogue::{CatalogueBuilder, RecipeSpec};

    fn item(key: &str) -> Resource {
        Resource::item(key)
    }

    #[test]
    fn test_shared_resource_joins_recipes() {
        let mut builder = CatalogueBuilder::new();
        builder
            .add_recipe(RecipeSpec::conversion("CR:b", "B").input(item("a"), Rational::ONE).output(item("b"), Rational::ONE))
            .unwrap();
        builder
            .add_recipe(RecipeSpec::conversion("CR:c", "C").input(item("b"), Rational::ONE).output(item("c"), Rational::ONE))
            .unwrap();
        builder
            .add_recipe(RecipeSpec::conversion("CR:z", "Z").input(item("y"), Rational::ONE).output(item("z"), Rational::ONE))
            .unwrap();
        let catalogue = builder.build();

        let subgraphs = find_subgraphs(&catalogue, &HashSet::new());
        assert_eq!(subgraphs.len(), 2);
        assert_eq!(subgraphs[0].id, 0);
        // CR:b, CR:c and RR:a
        assert_eq!(subgraphs[0].recipes.len(), 3);
        assert!(subgraphs[0].produces(&item("c")));
        assert!(subgraphs[0].consumes(&item("a")));
        assert!(subgraphs[1].produces(&item("z")));
        assert!(subgraphs[0].is_complex());
    }

    #[test]
    fn test_every_recipe_in_exactly_one_subgraph() {
        let mut builder = CatalogueBuilder::new();
        for i in 0..6 {
            builder
                .add_recipe(
                    RecipeSpec::conversion(&format!("CR:{i}"), "r")
                        .input(item(&format!("in{}", i % 3)), Rational::ONE)
                        .output(item(&format!("out{i}")), Rational::ONE),
                )
                .unwrap();
        }
        let catalogue = builder.build();
        let subgraphs = find_subgraphs(&catalogue, &HashSet::new());

        let mut seen: Vec<RecipeId> = subgraphs.iter().flat_map(|s| s.recipes.clone()).collect();
        seen.sort();
        let all: Vec<RecipeId> = catalogue.recipes().iter().map(|r| r.id).collect();
        assert_eq!(seen, all);
        assert_eq!(subgraphs.len(), 3);
    }

    #[test]
    fn test_products_are_summed() {
        let mut builder = CatalogueBuilder::new();
        builder
            .add_recipe(RecipeSpec::resource("RR:x1", "X").output(item("x"), Rational::ONE))
            .unwrap();
        builder
            .add_recipe(RecipeSpec::resource("RR:x2", "X").output(item("x"), Rational::from(2)))
            .unwrap();
        let catalogue = builder.build();
        let subgraphs = find_subgraphs(&catalogue, &HashSet::new());
        assert_eq!(subgraphs.len(), 1);
        assert_eq!(subgraphs[0].products[&item("x")], Rational::from(3));
        assert!(!subgraphs[0].consumes(&item("x")));
    }
}
