//! # Model Translators
//!
//! Compilation of a [`Model`](crate::model::Model) into the two backend representations:
//! [`sat::SatTranslator`] produces [`Expr`](crate::csp::Expr)essions for the incremental CSP
//! session, [`scop::ScopTranslator`] produces a weighted-linear
//! [`ScopInstance`](crate::scop::ScopInstance) for the local-search solver.
//!
//! Both translators memoize per entity name. Translating the same entity again returns the
//! cached result, translating a different entity under a taken name is an error.

use thiserror::Error;

pub mod sat;
pub mod scop;

pub use sat::SatTranslator;
pub use scop::ScopTranslator;

/// Errors raised during translation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A different entity with the same name was translated before
    #[error("duplicate declaration of `{0}`")]
    DuplicateDeclaration(String),
    /// A constraint references a variable that was not translated first
    #[error("constraint `{constraint}` references undeclared variable `{variable}`")]
    UndeclaredVariable {
        /// The constraint
        constraint: String,
        /// The variable
        variable: String,
    },
    /// The backend has no counterpart for the constraint
    #[error("unsupported constraint `{0}`: {1}")]
    Unsupported(String, &'static str),
    /// No soft constraint was translated, so there is nothing to minimize
    #[error("no objective: no soft constraint has been translated")]
    NoObjective,
    /// The constraint was not translated as a soft constraint
    #[error("`{0}` has no penalty variable")]
    NoPenalty(String),
    /// Assembling the weighted-linear instance failed
    #[error(transparent)]
    Instance(#[from] crate::scop::Error),
}
