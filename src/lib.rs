//! Production planning for factory games.
//!
//! Given a recipe [`catalogue`] and a set of wanted outputs, the [`solver`]
//! finds how fast every recipe must run, what has to be supplied from
//! outside, and what surplus is left over. All arithmetic is exact
//! ([`rational`]); each target is solved as a linear program over the
//! connected part of the recipe graph that produces it ([`subgraph`],
//! [`matrix_solver`]) and the partial results are merged into one
//! [`accumulator::Accumulator`].
//!
//! ```
//! use std::collections::HashSet;
//!
//! use indexmap::IndexMap;
//! use planit::catalogue::{CatalogueBuilder, RecipeSpec};
//! use planit::models::Resource;
//! use planit::rational::Rational;
//! use planit::solver::{Solver, SolverOptions};
//!
//! let mut builder = CatalogueBuilder::new();
//! builder
//!     .add_recipe(
//!         RecipeSpec::conversion("CR:plate", "Plate")
//!             .input(Resource::item("ore"), Rational::from(2))
//!             .output(Resource::item("plate"), Rational::ONE),
//!     )
//!     .unwrap();
//! let catalogue = builder.build();
//!
//! let solver = Solver::new(&catalogue, SolverOptions::default());
//! let targets: IndexMap<_, _> = [(Resource::item("plate"), Rational::from(5))].into();
//! let plan = solver.solve(&targets, &HashSet::new());
//! assert_eq!(plan.get_item(&Resource::item("ore")), Rational::from(10));
//! ```

pub mod accumulator;
pub mod building;
pub mod catalogue;
pub mod db;
pub mod error;
pub mod logging;
pub mod matrix_solver;
pub mod models;
pub mod plan;
pub mod rational;
pub mod simplex;
pub mod solver;
pub mod subgraph;
pub mod summary;
