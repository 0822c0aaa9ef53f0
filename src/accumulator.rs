//! Aggregate of partial solves plus the tree explaining where each external
//! draw came from.

use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::catalogue::Catalogue;
use crate::error::Diagnostic;
use crate::models::{RecipeId, Resource};
use crate::rational::Rational;

/// One node of the dependency tree. Children are indices into the owning
/// accumulator's arena.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Required {
    pub resource: Resource,
    pub amount: Rational,
    pub children: Vec<usize>,
}

impl Required {
    fn leaf(resource: Resource, amount: Rational) -> Self {
        Self {
            resource,
            amount,
            children: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Accumulator {
    /// Arena; index 0 is the root.
    nodes: Vec<Required>,
    recipes: IndexMap<RecipeId, Rational>,
    items: IndexMap<Resource, Rational>,
    waste: IndexMap<Resource, Rational>,
    unmet: IndexMap<Resource, Rational>,
    diagnostics: Vec<Diagnostic>,
}

impl Default for Accumulator {
    fn default() -> Self {
        Self::empty()
    }
}

impl Accumulator {
    pub const ROOT: usize = 0;

    pub fn new(resource: Resource, amount: Rational) -> Self {
        Self {
            nodes: vec![Required::leaf(resource, amount)],
            recipes: IndexMap::new(),
            items: IndexMap::new(),
            waste: IndexMap::new(),
            unmet: IndexMap::new(),
            diagnostics: Vec::new(),
        }
    }

    /// An accumulator rooted at the `Empty` sentinel.
    pub fn empty() -> Self {
        Self::new(Resource::Empty, Rational::ZERO)
    }

    pub fn root(&self) -> &Required {
        &self.nodes[Self::ROOT]
    }

    pub fn node(&self, index: usize) -> Option<&Required> {
        self.nodes.get(index)
    }

    pub fn nodes(&self) -> &[Required] {
        &self.nodes
    }

    pub fn children(&self, index: usize) -> impl Iterator<Item = (usize, &Required)> {
        self.nodes
            .get(index)
            .map(|node| node.children.as_slice())
            .unwrap_or_default()
            .iter()
            .filter_map(|&child| self.nodes.get(child).map(|node| (child, node)))
    }

    /// Hangs a new `Required` node under `parent`; returns its index.
    pub fn add_dependency(&mut self, parent: usize, resource: Resource, amount: Rational) -> Option<usize> {
        if !resource.is_valid() || parent >= self.nodes.len() {
            return None;
        }
        let index = self.nodes.len();
        self.nodes.push(Required::leaf(resource, amount));
        self.nodes[parent].children.push(index);
        Some(index)
    }

    /// Hangs an unlabelled node under `parent` for draws shared by several
    /// targets; returns its index.
    pub fn add_group(&mut self, parent: usize) -> Option<usize> {
        if parent >= self.nodes.len() {
            return None;
        }
        let index = self.nodes.len();
        self.nodes.push(Required::leaf(Resource::Empty, Rational::ZERO));
        self.nodes[parent].children.push(index);
        Some(index)
    }

    pub fn add_recipe(&mut self, recipe: RecipeId, rate: Rational) {
        add_into(&mut self.recipes, recipe, rate, &mut self.diagnostics);
    }

    pub fn add_item(&mut self, resource: Resource, amount: Rational) {
        add_into(&mut self.items, resource, amount, &mut self.diagnostics);
    }

    pub fn add_waste(&mut self, resource: Resource, amount: Rational) {
        add_into(&mut self.waste, resource, amount, &mut self.diagnostics);
    }

    pub fn add_unmet(&mut self, resource: Resource, amount: Rational) {
        add_into(&mut self.unmet, resource, amount, &mut self.diagnostics);
    }

    pub fn add_diagnostic(&mut self, diagnostic: Diagnostic) {
        if !self.diagnostics.contains(&diagnostic) {
            self.diagnostics.push(diagnostic);
        }
    }

    /// Recipe rates in first-seen order.
    pub fn recipes(&self) -> &IndexMap<RecipeId, Rational> {
        &self.recipes
    }

    pub fn recipe_order(&self) -> impl Iterator<Item = RecipeId> + '_ {
        self.recipes.keys().copied()
    }

    /// Net external draw per resource.
    pub fn items(&self) -> &IndexMap<Resource, Rational> {
        &self.items
    }

    pub fn waste(&self) -> &IndexMap<Resource, Rational> {
        &self.waste
    }

    pub fn unmet(&self) -> &IndexMap<Resource, Rational> {
        &self.unmet
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn get_recipe(&self, recipe: RecipeId) -> Rational {
        self.recipes.get(&recipe).copied().unwrap_or_default()
    }

    pub fn get_item(&self, resource: &Resource) -> Rational {
        self.items.get(resource).copied().unwrap_or_default()
    }

    pub fn get_waste(&self, resource: &Resource) -> Rational {
        self.waste.get(resource).copied().unwrap_or_default()
    }

    pub fn get_unmet(&self, resource: &Resource) -> Rational {
        self.unmet.get(resource).copied().unwrap_or_default()
    }

    pub fn has_items(&self) -> bool {
        !self.items.is_empty()
    }

    pub fn is_satisfied(&self) -> bool {
        self.unmet.is_empty()
    }

    /// Folds `other` into `self`. With `add_dependency`, `other`'s tree is
    /// grafted under this root; an `Empty` root contributes its children.
    pub fn merge(&mut self, other: &Accumulator, add_dependency: bool) {
        for (recipe, rate) in &other.recipes {
            self.add_recipe(*recipe, *rate);
        }
        for (resource, amount) in &other.items {
            self.add_item(resource.clone(), *amount);
        }
        for (resource, amount) in &other.waste {
            self.add_waste(resource.clone(), *amount);
        }
        for (resource, amount) in &other.unmet {
            self.add_unmet(resource.clone(), *amount);
        }
        for diagnostic in &other.diagnostics {
            self.add_diagnostic(diagnostic.clone());
        }

        if !add_dependency {
            return;
        }
        let grafted: Vec<usize> = if other.root().resource.is_valid() {
            vec![self.graft(other, Self::ROOT)]
        } else {
            other
                .root()
                .children
                .iter()
                .map(|&child| self.graft(other, child))
                .collect()
        };
        self.nodes[Self::ROOT].children.extend(grafted);
    }

    /// Copies the subtree at `index` of `other` into this arena.
    fn graft(&mut self, other: &Accumulator, index: usize) -> usize {
        let source = &other.nodes[index];
        let copy = self.nodes.len();
        self.nodes
            .push(Required::leaf(source.resource.clone(), source.amount));
        for &child in &source.children {
            let grafted = self.graft(other, child);
            self.nodes[copy].children.push(grafted);
        }
        copy
    }

    /// Logs the whole aggregate at debug level.
    pub fn dump(&self, catalogue: &Catalogue) {
        for (recipe, rate) in &self.recipes {
            let name = catalogue
                .recipe(*recipe)
                .map(|r| r.identifier.as_str())
                .unwrap_or("?");
            debug!(recipe = name, rate = %rate, "recipe");
        }
        for (resource, amount) in &self.items {
            debug!(resource = %resource, amount = %amount, "draw");
        }
        for (resource, amount) in &self.waste {
            debug!(resource = %resource, amount = %amount, "waste");
        }
        for (resource, amount) in &self.unmet {
            debug!(resource = %resource, amount = %amount, "unmet");
        }
    }
}

fn add_into<K: std::hash::Hash + Eq>(
    map: &mut IndexMap<K, Rational>,
    key: K,
    amount: Rational,
    diagnostics: &mut Vec<Diagnostic>,
) {
    if amount.is_zero() {
        return;
    }
    let entry = map.entry(key).or_insert(Rational::ZERO);
    match entry.checked_add(amount) {
        Ok(sum) => *entry = sum,
        Err(err) => {
            warn!(%err, "dropping amount that overflows the accumulator");
            if !diagnostics.contains(&Diagnostic::ArithmeticOverflow) {
                diagnostics.push(Diagnostic::ArithmeticOverflow);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(n: i64) -> Rational {
        Rational::from(n)
    }

    fn part(target: &str, recipe: u32, rate: i64, draw: &str, amount: i64) -> Accumulator {
        let mut acc = Accumulator::new(Resource::item(target), r(rate));
        acc.add_recipe(RecipeId(recipe), r(rate));
        acc.add_item(Resource::item(draw), r(amount));
        acc.add_dependency(Accumulator::ROOT, Resource::item(draw), r(amount));
        acc.add_waste(Resource::item("slag"), r(1));
        acc
    }

    #[test]
    fn test_add_sums_keywise() {
        let mut acc = Accumulator::empty();
        acc.add_recipe(RecipeId(1), r(2));
        acc.add_recipe(RecipeId(1), r(3));
        acc.add_item(Resource::item("ore"), r(4));
        assert_eq!(acc.get_recipe(RecipeId(1)), r(5));
        assert_eq!(acc.get_item(&Resource::item("ore")), r(4));
        assert_eq!(acc.get_waste(&Resource::item("ore")), Rational::ZERO);
        assert!(acc.has_items());
    }

    #[test]
    fn test_merge_is_commutative_on_totals() {
        let a = part("plate", 1, 2, "ore", 4);
        let b = part("gear", 2, 3, "ore", 6);

        let mut ab = Accumulator::empty();
        ab.merge(&a, true);
        ab.merge(&b, true);
        let mut ba = Accumulator::empty();
        ba.merge(&b, true);
        ba.merge(&a, true);

        assert_eq!(ab.recipes(), ba.recipes());
        assert_eq!(ab.items(), ba.items());
        assert_eq!(ab.waste(), ba.waste());
        assert_eq!(ab.get_item(&Resource::item("ore")), r(10));
        assert_eq!(ab.recipe_order().collect::<Vec<_>>(), vec![RecipeId(1), RecipeId(2)]);
        assert_eq!(ba.recipe_order().collect::<Vec<_>>(), vec![RecipeId(2), RecipeId(1)]);
    }

    #[test]
    fn test_merge_is_associative_on_totals() {
        let a = part("plate", 1, 2, "ore", 4);
        let b = part("gear", 2, 3, "ore", 6);
        let c = part("wire", 3, 1, "copper", 1);

        let mut left = a.clone();
        left.merge(&b, false);
        left.merge(&c, false);

        let mut bc = b.clone();
        bc.merge(&c, false);
        let mut right = a.clone();
        right.merge(&bc, false);

        assert_eq!(left.recipes(), right.recipes());
        assert_eq!(left.items(), right.items());
        assert_eq!(left.waste(), right.waste());
    }

    #[test]
    fn test_merging_empty_is_noop() {
        let a = part("plate", 1, 2, "ore", 4);
        let mut merged = a.clone();
        merged.merge(&Accumulator::empty(), true);
        assert_eq!(merged, a);
    }

    #[test]
    fn test_dependency_tree_is_grafted() {
        let mut plan = Accumulator::empty();
        plan.merge(&part("plate", 1, 2, "ore", 4), true);
        plan.merge(&part("gear", 2, 3, "ore", 6), true);

        let targets: Vec<&Resource> = plan.children(Accumulator::ROOT).map(|(_, n)| &n.resource).collect();
        assert_eq!(targets, vec![&Resource::item("plate"), &Resource::item("gear")]);

        let (gear, _) = plan.children(Accumulator::ROOT).nth(1).unwrap();
        let draws: Vec<(Resource, Rational)> = plan
            .children(gear)
            .map(|(_, n)| (n.resource.clone(), n.amount))
            .collect();
        assert_eq!(draws, vec![(Resource::item("ore"), r(6))]);
        assert!(!plan.root().resource.is_valid());
    }

    #[test]
    fn test_empty_root_contributes_children() {
        let mut inner = Accumulator::empty();
        inner.add_dependency(Accumulator::ROOT, Resource::item("ore"), r(1));
        let mut outer = Accumulator::empty();
        outer.merge(&inner, true);
        assert_eq!(outer.root().children.len(), 1);
        assert_eq!(outer.nodes().len(), 2);
    }

    #[test]
    fn test_group_node_survives_merge() {
        let mut part = Accumulator::empty();
        part.add_dependency(Accumulator::ROOT, Resource::item("oxygen"), r(8));
        part.add_dependency(Accumulator::ROOT, Resource::item("hydrogen"), r(1));
        let group = part.add_group(Accumulator::ROOT).unwrap();
        part.add_dependency(group, Resource::item("water"), r(9));
        assert_eq!(part.add_group(42), None);

        let mut plan = Accumulator::empty();
        plan.merge(&part, true);
        let top: Vec<Resource> = plan.children(Accumulator::ROOT).map(|(_, n)| n.resource.clone()).collect();
        assert_eq!(top, vec![Resource::item("oxygen"), Resource::item("hydrogen"), Resource::Empty]);
        let (grafted, _) = plan.children(Accumulator::ROOT).nth(2).unwrap();
        let shared: Vec<Rational> = plan.children(grafted).map(|(_, n)| n.amount).collect();
        assert_eq!(shared, vec![r(9)]);
    }

    #[test]
    fn test_invalid_dependency_is_ignored() {
        let mut acc = Accumulator::empty();
        assert_eq!(acc.add_dependency(Accumulator::ROOT, Resource::Empty, r(1)), None);
        assert_eq!(acc.add_dependency(7, Resource::item("ore"), r(1)), None);
        assert!(acc.root().children.is_empty());
    }
}
