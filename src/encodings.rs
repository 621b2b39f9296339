//! # CNF Encodings for Finite-Domain Constraints
//!
//! The encodings the CSP compiler builds on: the order encoding of integer variables and a
//! generalized totalizer for pseudo-Boolean upper bounds.

use thiserror::Error;

use crate::types::{Clause, Lit};

pub mod order;
pub mod pb;

/// Errors from encodings
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The encoding was not built far enough for the requested bound
    #[error("encoding not built for the requested bound")]
    NotEncoded,
    /// A weight or bound does not fit the encoding's arithmetic
    #[error("weight or bound out of range")]
    Overflow,
}

/// Trait for types that collect clauses produced by encodings
pub trait CollectClauses {
    /// Adds one clause
    fn add_clause(&mut self, clause: Clause);

    /// The number of clauses collected so far
    fn n_clauses(&self) -> usize;

    /// Adds a unit clause
    fn add_unit(&mut self, lit: Lit) {
        self.add_clause(vec![lit]);
    }

    /// Adds a binary clause
    fn add_binary(&mut self, lit1: Lit, lit2: Lit) {
        self.add_clause(vec![lit1, lit2]);
    }

    /// Adds a ternary clause
    fn add_ternary(&mut self, lit1: Lit, lit2: Lit, lit3: Lit) {
        self.add_clause(vec![lit1, lit2, lit3]);
    }
}

impl CollectClauses for Vec<Clause> {
    fn add_clause(&mut self, clause: Clause) {
        self.push(clause);
    }

    fn n_clauses(&self) -> usize {
        self.len()
    }
}

/// Trait for encodings that track statistics
pub trait EncodeStats {
    /// Gets the number of clauses in the encoding
    fn n_clauses(&self) -> usize;

    /// Gets the number of variables in the encoding
    fn n_vars(&self) -> u32;
}
