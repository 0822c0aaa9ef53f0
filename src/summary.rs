//! Human-readable view of a solved plan

use std::fmt;

use indexmap::IndexMap;

use crate::accumulator::Accumulator;
use crate::catalogue::Catalogue;
use crate::error::Diagnostic;
use crate::models::Resource;
use crate::rational::Rational;

/// One recipe line of a plan.
#[derive(Debug, Clone, PartialEq)]
pub struct RecipeLine {
    pub identifier: String,
    pub name: String,
    pub rate: Rational,
    /// First eligible producer, if the recipe has one.
    pub producer: Option<String>,
    pub count: Option<Rational>,
    pub power: Option<Rational>,
}

/// Summary of a plan, ready for display
#[derive(Debug, Clone, PartialEq)]
pub struct PlanSummary {
    pub recipes: Vec<RecipeLine>,
    pub total_power: Rational,
    pub draws: Vec<(String, Rational)>,
    pub waste: Vec<(String, Rational)>,
    pub unmet: Vec<(String, Rational)>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Producer count is `rate * time / speed`; power is count times usage.
pub fn summarize_plan(plan: &Accumulator, catalogue: &Catalogue) -> PlanSummary {
    let mut recipes = Vec::new();
    let mut total_power = Rational::ZERO;

    for (id, rate) in plan.recipes() {
        let Some(recipe) = catalogue.recipe(*id) else {
            continue;
        };
        let producer = recipe.producers.first().and_then(|p| catalogue.producer(*p));
        let count = producer.and_then(|p| {
            rate.checked_mul(recipe.time)
                .and_then(|work| work.checked_div(p.speed))
                .ok()
        });
        let power = producer
            .zip(count)
            .and_then(|(p, count)| count.checked_mul(p.power_usage).ok());
        if let Some(power) = power {
            total_power = total_power.checked_add(power).unwrap_or(total_power);
        }

        recipes.push(RecipeLine {
            identifier: recipe.identifier.clone(),
            name: recipe.name.clone(),
            rate: *rate,
            producer: producer.map(|p| p.name.clone()),
            count,
            power,
        });
    }

    let named = |map: &IndexMap<Resource, Rational>| -> Vec<(String, Rational)> {
        map.iter()
            .map(|(resource, amount)| (catalogue.resource_name(resource).to_string(), *amount))
            .collect()
    };

    PlanSummary {
        recipes,
        total_power,
        draws: named(plan.items()),
        waste: named(plan.waste()),
        unmet: named(plan.unmet()),
        diagnostics: plan.diagnostics().to_vec(),
    }
}

impl fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Production Plan ===")?;
        writeln!(f)?;

        writeln!(f, "Recipes:")?;
        for line in &self.recipes {
            write!(f, "  {:.3}/s {} [{}]", line.rate, line.name, line.identifier)?;
            if let (Some(producer), Some(count)) = (&line.producer, line.count) {
                write!(f, " -> {:.2}x {}", count, producer)?;
            }
            if let Some(power) = line.power.filter(|p| !p.is_zero()) {
                write!(f, " ({:.0}W)", power)?;
            }
            writeln!(f)?;
        }
        writeln!(f)?;

        writeln!(f, "External inputs:")?;
        for (name, amount) in &self.draws {
            writeln!(f, "  {} @ {:.3}/s", name, amount)?;
        }

        if !self.waste.is_empty() {
            writeln!(f)?;
            writeln!(f, "Surplus:")?;
            for (name, amount) in &self.waste {
                writeln!(f, "  {} @ {:.3}/s", name, amount)?;
            }
        }

        if !self.unmet.is_empty() {
            writeln!(f)?;
            writeln!(f, "Unsatisfied:")?;
            for (name, amount) in &self.unmet {
                writeln!(f, "  {} short by {:.3}/s", name, amount)?;
            }
        }

        writeln!(f)?;
        writeln!(f, "Power: {:.0}W", self.total_power)?;

        for diagnostic in &self.diagnostics {
            writeln!(f, "warning: {}", diagnostic)?;
        }
        Ok(())
    }
}

/// Renders the dependency tree below `index`, one node per line. Group
/// nodes below the root print as `(shared)`.
pub fn format_requirement_tree(plan: &Accumulator, catalogue: &Catalogue, index: usize, indent: usize) -> String {
    let mut output = String::new();
    let prefix = "  ".repeat(indent);

    let Some(node) = plan.node(index) else {
        return output;
    };
    let mut depth = indent;
    if node.resource.is_valid() {
        output.push_str(&format!(
            "{}{} @ {:.3}/s\n",
            prefix,
            catalogue.resource_name(&node.resource),
            node.amount
        ));
        depth += 1;
    } else if index != Accumulator::ROOT {
        output.push_str(&format!("{}(shared)\n", prefix));
        depth += 1;
    }
    for (child, _) in plan.children(index) {
        output.push_str(&format_requirement_tree(plan, catalogue, child, depth));
    }
    output
}
