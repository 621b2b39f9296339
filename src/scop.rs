//! # Weighted-Linear Instances
//!
//! Instances for an external weighted local-search solver that works on value-labelled
//! linear terms. A [`ScopInstance`] holds [`ScopVariable`]s with stringified domains and
//! [`ScopConstraint`]s, either linear over `coeff(variable, value)` terms or all-different.
//! [`fio`] writes the text format and parses the solver log, [`external`] runs the solver.

use std::fmt;

use thiserror::Error;

use crate::types::RsHashMap;

pub mod external;
pub mod fio;

pub use external::{LocalSearchOptions, LocalSearchSolver};

/// Errors when assembling an instance
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A variable name is already taken
    #[error("variable `{0}` is already declared")]
    DuplicateVariable(String),
    /// A constraint name is already taken
    #[error("constraint `{0}` is already declared")]
    DuplicateConstraint(String),
    /// A constraint refers to a variable that is not in the instance
    #[error("constraint `{constraint}` references undeclared variable `{variable}`")]
    UndeclaredVariable {
        /// The constraint
        constraint: String,
        /// The variable
        variable: String,
    },
}

/// The weight of a constraint
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Weight {
    /// Must be satisfied, written as `inf`
    Hard,
    /// Violations cost this weight per unit
    Soft(i64),
}

impl Weight {
    /// Converts a model weight, where negative values mark hard constraints
    #[must_use]
    pub fn from_model(weight: i64) -> Weight {
        if weight < 0 {
            Weight::Hard
        } else {
            Weight::Soft(weight)
        }
    }
}

impl fmt::Display for Weight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Weight::Hard => write!(f, "inf"),
            Weight::Soft(w) => write!(f, "{w}"),
        }
    }
}

/// Relations the local-search solver understands
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Relation {
    /// `<=`
    Le,
    /// `>=`
    Ge,
    /// `=`
    Eq,
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Relation::Le => write!(f, "<="),
            Relation::Ge => write!(f, ">="),
            Relation::Eq => write!(f, "="),
        }
    }
}

/// A variable with a domain of value labels
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ScopVariable {
    /// The name
    pub name: String,
    /// The value labels
    pub domain: Vec<String>,
}

/// A term `coeff(variable, value)`, contributing `coeff` iff `variable` takes `value`
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ScopTerm {
    /// The coefficient
    pub coeff: i64,
    /// The variable name
    pub variable: String,
    /// The value label
    pub value: String,
}

impl fmt::Display for ScopTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}, {})", self.coeff, self.variable, self.value)
    }
}

/// A constraint of a weighted-linear instance
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ScopConstraint {
    /// `Σ terms rel rhs`
    Linear {
        /// The name
        name: String,
        /// The weight
        weight: Weight,
        /// The terms
        terms: Vec<ScopTerm>,
        /// The relation
        rel: Relation,
        /// The right hand side
        rhs: i64,
    },
    /// Pairwise distinct values
    AllDifferent {
        /// The name
        name: String,
        /// The weight
        weight: Weight,
        /// The variable names
        variables: Vec<String>,
    },
}

impl ScopConstraint {
    /// The constraint name
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            ScopConstraint::Linear { name, .. } | ScopConstraint::AllDifferent { name, .. } => {
                name
            }
        }
    }

    /// The constraint weight
    #[must_use]
    pub fn weight(&self) -> Weight {
        match self {
            ScopConstraint::Linear { weight, .. }
            | ScopConstraint::AllDifferent { weight, .. } => *weight,
        }
    }

    fn variables(&self) -> Vec<&str> {
        match self {
            ScopConstraint::Linear { terms, .. } => {
                terms.iter().map(|t| t.variable.as_str()).collect()
            }
            ScopConstraint::AllDifferent { variables, .. } => {
                variables.iter().map(String::as_str).collect()
            }
        }
    }
}

/// An ordered registry of variables and constraints with unique names
#[derive(Clone, Debug, Default)]
pub struct ScopInstance {
    variables: Vec<ScopVariable>,
    variable_idx: RsHashMap<String, usize>,
    constraints: Vec<ScopConstraint>,
    constraint_idx: RsHashMap<String, usize>,
}

impl ScopInstance {
    /// Creates an empty instance
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a variable
    ///
    /// # Errors
    ///
    /// [`Error::DuplicateVariable`] if the name is taken.
    pub fn add_variable(&mut self, variable: ScopVariable) -> Result<(), Error> {
        if self.variable_idx.contains_key(&variable.name) {
            return Err(Error::DuplicateVariable(variable.name));
        }
        self.variable_idx
            .insert(variable.name.clone(), self.variables.len());
        self.variables.push(variable);
        Ok(())
    }

    /// Adds a constraint over variables already in the instance
    ///
    /// # Errors
    ///
    /// [`Error::DuplicateConstraint`] or [`Error::UndeclaredVariable`].
    pub fn add_constraint(&mut self, constraint: ScopConstraint) -> Result<(), Error> {
        if self.constraint_idx.contains_key(constraint.name()) {
            return Err(Error::DuplicateConstraint(constraint.name().to_string()));
        }
        if let Some(var) = constraint
            .variables()
            .into_iter()
            .find(|v| !self.variable_idx.contains_key(*v))
        {
            return Err(Error::UndeclaredVariable {
                constraint: constraint.name().to_string(),
                variable: var.to_string(),
            });
        }
        self.constraint_idx
            .insert(constraint.name().to_string(), self.constraints.len());
        self.constraints.push(constraint);
        Ok(())
    }

    /// The variables in insertion order
    #[must_use]
    pub fn variables(&self) -> &[ScopVariable] {
        &self.variables
    }

    /// The constraints in insertion order
    #[must_use]
    pub fn constraints(&self) -> &[ScopConstraint] {
        &self.constraints
    }

    /// Looks up a variable
    #[must_use]
    pub fn variable(&self, name: &str) -> Option<&ScopVariable> {
        self.variable_idx.get(name).map(|&idx| &self.variables[idx])
    }

    /// Looks up a constraint
    #[must_use]
    pub fn constraint(&self, name: &str) -> Option<&ScopConstraint> {
        self.constraint_idx
            .get(name)
            .map(|&idx| &self.constraints[idx])
    }
}
