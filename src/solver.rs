//! Orchestrates per-subgraph solves over the decomposition.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::accumulator::Accumulator;
use crate::catalogue::Catalogue;
use crate::error::Diagnostic;
use crate::matrix_solver::{MatrixSolver, Solution};
use crate::models::{RecipeId, Resource};
use crate::rational::Rational;
use crate::subgraph::{SubGraph, find_subgraphs};

pub use crate::matrix_solver::SolverOptions;

/// Plans production against one catalogue snapshot.
///
/// The borrow of the catalogue lasts as long as the solver, so the recipes
/// cannot change underneath a solve.
#[derive(Debug, Clone)]
pub struct Solver<'a> {
    catalogue: &'a Catalogue,
    options: SolverOptions,
    disabled: HashSet<RecipeId>,
    subgraphs: Vec<SubGraph>,
    /// Resource -> index of the subgraph producing it.
    producing: HashMap<Resource, usize>,
}

impl<'a> Solver<'a> {
    pub fn new(catalogue: &'a Catalogue, options: SolverOptions) -> Self {
        let mut solver = Self {
            catalogue,
            options,
            disabled: HashSet::new(),
            subgraphs: Vec::new(),
            producing: HashMap::new(),
        };
        solver.find_subgraphs();
        solver
    }

    pub fn with_disabled(mut self, disabled: HashSet<RecipeId>) -> Self {
        self.set_disabled(disabled);
        self
    }

    /// Replaces the disabled set and rebuilds the decomposition.
    pub fn set_disabled(&mut self, disabled: HashSet<RecipeId>) {
        if disabled != self.disabled {
            self.disabled = disabled;
            self.find_subgraphs();
        }
    }

    pub fn disabled(&self) -> &HashSet<RecipeId> {
        &self.disabled
    }

    pub fn options(&self) -> &SolverOptions {
        &self.options
    }

    pub fn catalogue(&self) -> &'a Catalogue {
        self.catalogue
    }

    pub fn find_subgraphs(&mut self) {
        self.subgraphs = find_subgraphs(self.catalogue, &self.disabled);
        self.producing = self
            .subgraphs
            .iter()
            .enumerate()
            .flat_map(|(index, subgraph)| subgraph.products.keys().map(move |r| (r.clone(), index)))
            .collect();
    }

    pub fn subgraphs(&self) -> &[SubGraph] {
        &self.subgraphs
    }

    pub fn subgraph_for(&self, resource: &Resource) -> Option<&SubGraph> {
        self.producing
            .get(resource)
            .and_then(|index| self.subgraphs.get(*index))
    }

    /// Solves the targets one subgraph at a time and merges the results.
    /// Targets sharing a subgraph go into a single LP so they can share
    /// byproducts. Targets in `ignore` are skipped and `ignore` resources
    /// are free to consume.
    pub fn solve(&self, targets: &IndexMap<Resource, Rational>, ignore: &HashSet<Resource>) -> Accumulator {
        let mut steps: Vec<Step> = Vec::new();
        let mut wanted: IndexMap<Resource, Rational> = IndexMap::new();

        for (resource, amount) in targets {
            if ignore.contains(resource) {
                debug!(resource = %resource, "target is supplied externally");
                continue;
            }
            if !resource.is_valid() || amount.is_zero() {
                continue;
            }
            if amount.is_negative() {
                warn!(resource = %resource, amount = %amount, "negative target ignored");
                continue;
            }

            if !self.catalogue.contains_resource(resource) {
                warn!(resource = %resource, "unknown target resource");
                let mut part = Accumulator::new(resource.clone(), *amount);
                part.add_diagnostic(Diagnostic::UnknownResource(resource.clone()));
                part.add_unmet(resource.clone(), *amount);
                steps.push(Step::Rejected(Box::new(part)));
                continue;
            }

            let Some(&index) = self.producing.get(resource) else {
                warn!(resource = %resource, "no enabled recipe produces target");
                let mut part = Accumulator::new(resource.clone(), *amount);
                part.add_diagnostic(Diagnostic::InfeasibleTarget {
                    resource: resource.clone(),
                    unmet: *amount,
                });
                part.add_unmet(resource.clone(), *amount);
                steps.push(Step::Rejected(Box::new(part)));
                continue;
            };

            wanted.insert(resource.clone(), *amount);
            if !steps.iter().any(|step| matches!(step, Step::Subgraph(i) if *i == index)) {
                steps.push(Step::Subgraph(index));
            }
        }

        let mut plan = Accumulator::empty();
        for step in steps {
            match step {
                Step::Rejected(part) => plan.merge(&part, true),
                Step::Subgraph(index) => {
                    let Some(subgraph) = self.subgraphs.get(index) else {
                        continue;
                    };
                    let matrix = MatrixSolver::new(self.catalogue, &subgraph.recipes, &self.options);
                    let slice = matrix.match_targets(&wanted);
                    debug!(subgraph = subgraph.id, targets = slice.len(), "solving subgraph");
                    let solution = matrix.solve(&slice, &self.disabled, ignore);
                    plan.merge(&attribute(&slice, &solution), true);
                }
            }
        }

        plan.dump(self.catalogue);
        plan
    }
}

/// Work for one entry of the plan tree, kept in first-seen target order.
enum Step {
    Rejected(Box<Accumulator>),
    Subgraph(usize),
}

/// A lone target owns its draws. Several targets solved together get their
/// own nodes, and the draws hang under a shared group node beside them.
fn attribute(slice: &IndexMap<Resource, Rational>, solution: &Solution) -> Accumulator {
    if slice.len() == 1 {
        if let Some((resource, amount)) = slice.first() {
            let mut part = Accumulator::new(resource.clone(), *amount);
            fold(&mut part, Accumulator::ROOT, solution);
            return part;
        }
    }

    let mut part = Accumulator::empty();
    for (resource, amount) in slice {
        part.add_dependency(Accumulator::ROOT, resource.clone(), *amount);
    }
    let group = part.add_group(Accumulator::ROOT).unwrap_or(Accumulator::ROOT);
    fold(&mut part, group, solution);
    part
}

fn fold(part: &mut Accumulator, parent: usize, solution: &Solution) {
    for (recipe, rate) in &solution.rates {
        part.add_recipe(*recipe, *rate);
    }
    for (resource, amount) in &solution.waste {
        part.add_waste(resource.clone(), *amount);
    }
    for (resource, amount) in &solution.draws {
        part.add_item(resource.clone(), *amount);
        part.add_dependency(parent, resource.clone(), *amount);
    }
    for (resource, amount) in &solution.unmet {
        part.add_unmet(resource.clone(), *amount);
        part.add_diagnostic(Diagnostic::InfeasibleTarget {
            resource: resource.clone(),
            unmet: *amount,
        });
    }
    for diagnostic in &solution.diagnostics {
        part.add_diagnostic(diagnostic.clone());
    }
}
