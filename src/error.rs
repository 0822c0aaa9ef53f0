//! Error taxonomy for the planner core.
//!
//! Fatal errors ([`RationalError`], [`PlanError`]) abort the operation that
//! raised them. Anything that happens while solving is a [`Diagnostic`]
//! instead: it is logged, attached to the result, and the solve carries on.

use std::path::PathBuf;

use thiserror::Error;

use crate::models::{RecipeId, Resource};
use crate::rational::Rational;

/// Failures of exact fraction arithmetic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RationalError {
    #[error("denominator may not be zero")]
    DivideByZero,

    #[error("rational value does not fit in 64 bits")]
    Overflow,

    #[error("invalid rational literal '{0}'")]
    Parse(String),
}

/// Errors raised while building catalogues or handling plan requests.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error(transparent)]
    Rational(#[from] RationalError),

    #[error("unknown recipe '{0}'")]
    UnknownRecipe(String),

    #[error("unknown resource '{0}'")]
    UnknownResource(String),

    #[error("no recipe produces '{0}'")]
    InfeasibleTarget(String),

    #[error("recipe '{0}' is already registered")]
    DuplicateRecipe(String),

    #[error("recipe '{recipe}' has a negative amount of {resource}")]
    NegativeAmount { recipe: String, resource: String },

    #[error("invalid target '{0}', expected <resource>=<amount>")]
    InvalidTarget(String),

    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid plan file {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to scan plan folder: {0}")]
    Walk(#[from] walkdir::Error),
}

/// Non-fatal anomalies recorded while solving.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Diagnostic {
    #[error("recipe {0} is not in the catalogue")]
    UnknownRecipe(RecipeId),

    #[error("resource {0} is not in the catalogue")]
    UnknownResource(Resource),

    #[error("{resource} is short by {unmet}")]
    InfeasibleTarget { resource: Resource, unmet: Rational },

    #[error("simplex stopped after {limit} pivots without reaching an optimum")]
    IterationLimit { limit: usize },

    #[error("exact arithmetic overflowed; result is partial")]
    ArithmeticOverflow,
}
