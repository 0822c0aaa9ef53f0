//! Linear-program encoding of a recipe set and extraction of recipe rates.
//!
//! The tableau is the dual of "minimise total recipe usage subject to
//! producing every target". Each recipe is a row, each resource a column:
//!
//! ```text
//!              items...        tax   slack per recipe   tax slack   rhs
//! recipe r     +out / -in     -w_r   1 on own column        0        0
//! tax row          0            1          0                1      budget
//! objective    -target          0          0                0        0
//! ```
//!
//! After the simplex run, the objective row holds the recipe rates under
//! the slack columns and the surplus (waste) of each item under its column.

use std::collections::HashSet;

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::catalogue::Catalogue;
use crate::error::{Diagnostic, RationalError};
use crate::models::{Recipe, RecipeId, Resource};
use crate::rational::Rational;
use crate::simplex::{SimplexStatus, Tableau};

/// Tuning knobs for the LP. Weights are per-row cost in the tax column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverOptions {
    pub iteration_limit: usize,
    pub recipe_weight: Rational,
    pub import_weight: Rational,
    pub tax_budget: Rational,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            iteration_limit: 200,
            recipe_weight: Rational::ONE,
            import_weight: Rational::ZERO,
            tax_budget: Rational::ONE,
        }
    }
}

/// Rates and flows for one solve.
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    pub rates: IndexMap<RecipeId, Rational>,
    pub waste: IndexMap<Resource, Rational>,
    /// Supply taken from outside the recipe set.
    pub draws: IndexMap<Resource, Rational>,
    pub unmet: IndexMap<Resource, Rational>,
    pub objective: Rational,
    pub status: SimplexStatus,
    pub iterations: usize,
    pub diagnostics: Vec<Diagnostic>,
}

impl Solution {
    fn empty(status: SimplexStatus) -> Self {
        Self {
            rates: IndexMap::new(),
            waste: IndexMap::new(),
            draws: IndexMap::new(),
            unmet: IndexMap::new(),
            objective: Rational::ZERO,
            status,
            iterations: 0,
            diagnostics: Vec::new(),
        }
    }

    pub fn is_satisfied(&self) -> bool {
        self.unmet.is_empty() && self.status == SimplexStatus::Optimal
    }

    pub fn rate(&self, recipe: RecipeId) -> Rational {
        self.rates.get(&recipe).copied().unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
pub struct MatrixSolver<'a> {
    options: SolverOptions,
    /// Member rows first, then import rows.
    rows: Vec<&'a Recipe>,
    members: usize,
    outputs: IndexSet<Resource>,
    /// Pure inputs with the recipe chosen to import them, if any.
    pure_inputs: IndexMap<Resource, Option<RecipeId>>,
    columns: IndexMap<Resource, usize>,
    base: Tableau,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> MatrixSolver<'a> {
    pub fn new(catalogue: &'a Catalogue, recipe_ids: &[RecipeId], options: &SolverOptions) -> Self {
        let mut diagnostics = Vec::new();
        let mut members: Vec<&'a Recipe> = Vec::new();
        for id in recipe_ids {
            match catalogue.recipe(*id) {
                Some(recipe) if !members.iter().any(|m| m.id == recipe.id) => members.push(recipe),
                Some(_) => {}
                None => diagnostics.push(Diagnostic::UnknownRecipe(*id)),
            }
        }

        let outputs: IndexSet<Resource> = members
            .iter()
            .flat_map(|recipe| recipe.outputs.iter().map(|a| a.resource.clone()))
            .collect();

        let mut pure_inputs: IndexMap<Resource, Option<RecipeId>> = IndexMap::new();
        let mut imports: IndexSet<RecipeId> = IndexSet::new();
        for recipe in &members {
            for input in &recipe.inputs {
                if outputs.contains(&input.resource) || pure_inputs.contains_key(&input.resource) {
                    continue;
                }
                let candidate = catalogue.default_recipe_for(&input.resource).map(|r| r.id);
                if let Some(id) = candidate {
                    imports.insert(id);
                }
                pure_inputs.insert(input.resource.clone(), candidate);
            }
        }

        let member_count = members.len();
        let mut rows = members;
        rows.extend(imports.iter().filter_map(|id| catalogue.recipe(*id)));

        let mut columns: IndexMap<Resource, usize> = IndexMap::new();
        for resource in outputs.iter().chain(
            pure_inputs
                .iter()
                .filter(|(_, import)| import.is_some())
                .map(|(resource, _)| resource),
        ) {
            let next = columns.len();
            columns.entry(resource.clone()).or_insert(next);
        }

        let mut solver = Self {
            options: options.clone(),
            rows,
            members: member_count,
            outputs,
            pure_inputs,
            columns,
            base: Tableau::new(0, 0),
            diagnostics,
        };
        match solver.build_tableau() {
            Ok(base) => solver.base = base,
            Err(err) => {
                warn!(%err, "recipe matrix does not fit exact arithmetic");
                solver.diagnostics.push(Diagnostic::ArithmeticOverflow);
            }
        }
        debug!(
            recipes = solver.members,
            imports = solver.rows.len() - solver.members,
            items = solver.columns.len(),
            "built recipe matrix"
        );
        solver
    }

    fn tax_column(&self) -> usize {
        self.columns.len()
    }

    fn slack_column(&self, row: usize) -> usize {
        self.columns.len() + 1 + row
    }

    fn tax_row(&self) -> usize {
        self.rows.len()
    }

    fn build_tableau(&self) -> Result<Tableau, RationalError> {
        let recipe_rows = self.rows.len();
        let mut tableau = Tableau::new(recipe_rows + 2, self.columns.len() + recipe_rows + 3);

        for (row, recipe) in self.rows.iter().enumerate() {
            let is_member = row < self.members;
            for output in &recipe.outputs {
                if let Some(&col) = self.columns.get(&output.resource) {
                    let value = tableau.get(row, col).checked_add(output.amount)?;
                    tableau.set(row, col, value);
                }
            }
            if is_member {
                for input in &recipe.inputs {
                    if let Some(&col) = self.columns.get(&input.resource) {
                        let value = tableau.get(row, col).checked_sub(input.amount)?;
                        tableau.set(row, col, value);
                    }
                }
            }
            let weight = if is_member {
                self.options.recipe_weight
            } else {
                self.options.import_weight
            };
            tableau.set(row, self.tax_column(), weight.checked_neg()?);
            tableau.set(row, self.slack_column(row), Rational::ONE);
        }

        let tax_row = self.tax_row();
        tableau.set(tax_row, self.tax_column(), Rational::ONE);
        tableau.set(tax_row, self.slack_column(recipe_rows), Rational::ONE);
        Ok(tableau)
    }

    /// Writes the tax budget into the tax row's right-hand side.
    fn set_cost(&self, tableau: &mut Tableau) {
        let rhs = tableau.rhs_column();
        tableau.set(self.tax_row(), rhs, self.options.tax_budget);
    }

    /// Every resource produced by a member recipe, in first-seen order.
    pub fn outputs(&self) -> impl Iterator<Item = &Resource> {
        self.outputs.iter()
    }

    /// Recipes picked to import pure inputs.
    pub fn input_recipes(&self) -> impl Iterator<Item = &'a Recipe> + '_ {
        self.rows[self.members..].iter().copied()
    }

    pub fn members(&self) -> impl Iterator<Item = &'a Recipe> + '_ {
        self.rows[..self.members].iter().copied()
    }

    /// Consumed by members but produced by none of them.
    pub fn pure_inputs(&self) -> impl Iterator<Item = &Resource> {
        self.pure_inputs.keys()
    }

    /// The targets this recipe set can produce.
    pub fn match_targets(&self, targets: &IndexMap<Resource, Rational>) -> IndexMap<Resource, Rational> {
        targets
            .iter()
            .filter(|(resource, _)| self.outputs.contains(*resource))
            .map(|(resource, amount)| (resource.clone(), *amount))
            .collect()
    }

    /// Solves for `targets` with `disabled` recipes forced to zero and
    /// `free` resources available without limit.
    pub fn solve(
        &self,
        targets: &IndexMap<Resource, Rational>,
        disabled: &HashSet<RecipeId>,
        free: &HashSet<Resource>,
    ) -> Solution {
        if self.diagnostics.contains(&Diagnostic::ArithmeticOverflow) {
            return self.overflowed(targets, 0);
        }

        let mut tableau = self.base.clone();
        let objective = tableau.objective_row();
        for (resource, amount) in targets {
            if let Some(&col) = self.columns.get(resource) {
                let Ok(value) = amount.checked_neg() else {
                    return self.overflowed(targets, 0);
                };
                tableau.set(objective, col, value);
            }
        }
        for (row, recipe) in self.rows.iter().enumerate() {
            if disabled.contains(&recipe.id) {
                tableau.clear_row(row);
            }
        }
        for resource in free {
            if let Some(&col) = self.columns.get(resource) {
                tableau.clear_column(col);
            }
        }
        self.set_cost(&mut tableau);

        let outcome = tableau.run(self.options.iteration_limit);
        match outcome.status {
            SimplexStatus::Overflow => return self.overflowed(targets, outcome.iterations),
            SimplexStatus::IterationLimit => {
                warn!(
                    limit = self.options.iteration_limit,
                    "simplex hit the iteration cap\n{}", tableau
                );
            }
            SimplexStatus::Optimal => {}
        }

        match self.extract(&tableau, targets, free) {
            Ok(mut solution) => {
                solution.status = outcome.status;
                solution.iterations = outcome.iterations;
                if outcome.status == SimplexStatus::IterationLimit {
                    solution.diagnostics.push(Diagnostic::IterationLimit {
                        limit: self.options.iteration_limit,
                    });
                }
                debug!(
                    rates = solution.rates.len(),
                    iterations = solution.iterations,
                    objective = %solution.objective,
                    "matrix solved"
                );
                solution
            }
            Err(_) => self.overflowed(targets, outcome.iterations),
        }
    }

    fn extract(
        &self,
        tableau: &Tableau,
        targets: &IndexMap<Resource, Rational>,
        free: &HashSet<Resource>,
    ) -> Result<Solution, RationalError> {
        let objective = tableau.objective_row();
        let mut solution = Solution::empty(SimplexStatus::Optimal);
        solution.diagnostics = self.diagnostics.clone();
        solution.objective = tableau.get(objective, tableau.rhs_column());

        let mut rates: Vec<(usize, &Recipe, Rational)> = Vec::new();
        for (row, recipe) in self.rows.iter().enumerate() {
            let rate = tableau.get(objective, self.slack_column(row));
            if rate.is_positive() {
                add(&mut solution.rates, recipe.id, rate)?;
                rates.push((row, *recipe, rate));
            }
        }

        for resource in &self.outputs {
            if free.contains(resource) {
                continue;
            }
            if let Some(&col) = self.columns.get(resource) {
                let surplus = tableau.get(objective, col);
                if surplus.is_positive() {
                    solution.waste.insert(resource.clone(), surplus);
                }
            }
        }

        let mut net: IndexMap<Resource, Rational> = IndexMap::new();
        for (row, recipe, rate) in rates {
            let is_member = row < self.members;
            for output in &recipe.outputs {
                let produced = rate.checked_mul(output.amount)?;
                let imported = !is_member && self.pure_inputs.contains_key(&output.resource);
                if recipe.is_resource() || imported {
                    add(&mut solution.draws, output.resource.clone(), produced)?;
                }
                if is_member || imported {
                    add(&mut net, output.resource.clone(), produced)?;
                }
            }
            if !is_member {
                continue;
            }
            for input in &recipe.inputs {
                let consumed = rate.checked_mul(input.amount)?;
                add(&mut net, input.resource.clone(), consumed.checked_neg()?)?;
                let unsupplied = matches!(self.pure_inputs.get(&input.resource), Some(None));
                if unsupplied {
                    add(&mut solution.draws, input.resource.clone(), consumed)?;
                }
            }
        }

        let mut free: Vec<&Resource> = free.iter().collect();
        free.sort();
        for resource in free {
            // already counted as unsupplied consumption above
            if matches!(self.pure_inputs.get(resource), Some(None)) {
                continue;
            }
            let balance = net.get(resource).copied().unwrap_or_default();
            if balance.is_negative() {
                add(&mut solution.draws, resource.clone(), balance.checked_neg()?)?;
            }
        }

        for (resource, target) in targets {
            let made = net.get(resource).copied().unwrap_or_default();
            let short = target.checked_sub(made)?;
            if short.is_positive() {
                warn!(resource = %resource, unmet = %short, "target cannot be fully produced");
                solution.unmet.insert(resource.clone(), short);
            }
        }
        Ok(solution)
    }

    fn overflowed(&self, targets: &IndexMap<Resource, Rational>, iterations: usize) -> Solution {
        warn!("solve abandoned after arithmetic overflow");
        let mut solution = Solution::empty(SimplexStatus::Overflow);
        solution.iterations = iterations;
        solution.diagnostics = self.diagnostics.clone();
        if !solution.diagnostics.contains(&Diagnostic::ArithmeticOverflow) {
            solution.diagnostics.push(Diagnostic::ArithmeticOverflow);
        }
        solution.unmet = targets
            .iter()
            .filter(|(_, amount)| amount.is_positive())
            .map(|(resource, amount)| (resource.clone(), *amount))
            .collect();
        solution
    }
}

fn add<K: std::hash::Hash + Eq>(
    map: &mut IndexMap<K, Rational>,
    key: K,
    amount: Rational,
) -> Result<(), RationalError> {
    let entry = map.entry(key).or_insert(Rational::ZERO);
    *entry = entry.checked_add(amount)?;
    Ok(())
}
