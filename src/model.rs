//! # Weighted Constraint Model
//!
//! A backend-agnostic model of a weighted constraint satisfaction problem: named variables
//! over finite integer domains and [`Constraint`]s that are either hard or carry a
//! non-negative weight. The [`Model`] is an append-only registry enforcing name uniqueness.
//!
//! ## Example Usage
//!
//! ```
//! # use coptool::model::{Comparator, Domain, LinearConstraint, Model};
//! let mut model = Model::new();
//! let x = model.new_variable("x", Domain::range(0..=3).unwrap()).unwrap();
//! let y = model.new_variable("y", Domain::range(0..=3).unwrap()).unwrap();
//! model
//!     .add_constraint(
//!         LinearConstraint::builder("sum")
//!             .weight(5)
//!             .term(1, &x)
//!             .term(1, &y)
//!             .comparator(Comparator::Ge)
//!             .rhs(4)
//!             .build()
//!             .unwrap(),
//!     )
//!     .unwrap();
//! assert_eq!(model.constraint("sum").unwrap().penalty_upper_bound(), Some(4));
//! ```

use std::collections::BTreeMap;

use thiserror::Error;

use crate::types::RsHashMap;

pub mod constraints;
pub mod domain;
pub mod variable;

pub use constraints::{
    AllDifferentConstraint, Comparator, ConflictPointConstraint, Constraint, LinearConstraint,
    LinearTerm, PredicateTerm, PseudoBooleanConstraint, PseudoBooleanTerm, HARD,
};
pub use domain::Domain;
pub use variable::Variable;

/// Errors raised while building a model
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A name does not match `[A-Za-z][A-Za-z0-9_]*`
    #[error("invalid identifier `{0}`")]
    InvalidName(String),
    /// A domain without values
    #[error("a domain needs at least one value")]
    EmptyDomain,
    /// A variable name is already taken
    #[error("variable `{0}` is already declared")]
    DuplicateVariable(String),
    /// A constraint name is already taken
    #[error("constraint `{0}` is already declared")]
    DuplicateConstraint(String),
    /// A constraint references a variable that is not in the model
    #[error("constraint `{constraint}` references undeclared variable `{variable}`")]
    UndeclaredVariable {
        /// The constraint
        constraint: String,
        /// The variable
        variable: String,
    },
    /// A constant outside the domain of its variable
    #[error("value {value} is not in the domain of `{variable}`")]
    ValueNotInDomain {
        /// The variable
        variable: String,
        /// The value
        value: i64,
    },
    /// Variables of an all-different constraint with different domains
    #[error("all-different constraint `{0}` mixes different domains")]
    DomainMismatch(String),
    /// A builder finished without a comparator
    #[error("constraint `{0}` has no comparator")]
    IncompleteConstraint(String),
    /// Arithmetic of a constraint leaves the `i64` range
    #[error("arithmetic of constraint `{0}` overflows")]
    Overflow(String),
    /// An assignment has no value for a variable
    #[error("no value for variable `{0}`")]
    Unassigned(String),
}

/// The violation of one constraint under an assignment
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Violation {
    /// The constraint name
    pub constraint: String,
    /// The constraint weight
    pub weight: i64,
    /// The violation amount
    pub amount: i64,
}

/// An append-only registry of variables and constraints
#[derive(Clone, Debug, Default)]
pub struct Model {
    variables: Vec<Variable>,
    variable_idx: RsHashMap<String, usize>,
    constraints: Vec<Constraint>,
    constraint_idx: RsHashMap<String, usize>,
}

impl Model {
    /// Creates an empty model
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a variable
    ///
    /// # Errors
    ///
    /// [`Error::DuplicateVariable`] if the name is taken.
    pub fn add_variable(&mut self, variable: Variable) -> Result<(), Error> {
        if self.variable_idx.contains_key(variable.name()) {
            return Err(Error::DuplicateVariable(variable.name().to_string()));
        }
        self.variable_idx
            .insert(variable.name().to_string(), self.variables.len());
        self.variables.push(variable);
        Ok(())
    }

    /// Creates and registers a variable, returning a handle for building constraints
    ///
    /// # Errors
    ///
    /// [`Error::InvalidName`] or [`Error::DuplicateVariable`].
    pub fn new_variable<S: Into<String>>(
        &mut self,
        name: S,
        domain: Domain,
    ) -> Result<Variable, Error> {
        let var = Variable::new(name, domain)?;
        self.add_variable(var.clone())?;
        Ok(var)
    }

    /// Registers a constraint. All referenced variables must be registered already.
    ///
    /// # Errors
    ///
    /// [`Error::DuplicateConstraint`] if the name is taken, [`Error::UndeclaredVariable`] if
    /// a referenced variable is not in the model.
    pub fn add_constraint<C: Into<Constraint>>(&mut self, constraint: C) -> Result<(), Error> {
        let constraint = constraint.into();
        if self.constraint_idx.contains_key(constraint.name()) {
            return Err(Error::DuplicateConstraint(constraint.name().to_string()));
        }
        for var in constraint.variables() {
            if self.variable(var.name()) != Some(var) {
                return Err(Error::UndeclaredVariable {
                    constraint: constraint.name().to_string(),
                    variable: var.name().to_string(),
                });
            }
        }
        self.constraint_idx
            .insert(constraint.name().to_string(), self.constraints.len());
        self.constraints.push(constraint);
        Ok(())
    }

    /// The variables in insertion order
    #[must_use]
    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    /// The constraints in insertion order
    #[must_use]
    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    /// Looks up a variable by name
    #[must_use]
    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variable_idx.get(name).map(|&idx| &self.variables[idx])
    }

    /// Looks up a constraint by name
    #[must_use]
    pub fn constraint(&self, name: &str) -> Option<&Constraint> {
        self.constraint_idx
            .get(name)
            .map(|&idx| &self.constraints[idx])
    }

    /// Iterates over the hard constraints
    pub fn hard_constraints(&self) -> impl Iterator<Item = &Constraint> {
        self.constraints.iter().filter(|c| c.is_hard())
    }

    /// Iterates over the soft constraints
    pub fn soft_constraints(&self) -> impl Iterator<Item = &Constraint> {
        self.constraints.iter().filter(|c| c.is_soft())
    }

    /// Groups the soft constraints into tiers of equal weight, heaviest tier first
    #[must_use]
    pub fn tiers(&self) -> Vec<(i64, Vec<&Constraint>)> {
        let mut tiers: BTreeMap<i64, Vec<&Constraint>> = BTreeMap::new();
        for cons in self.soft_constraints() {
            tiers.entry(cons.weight()).or_default().push(cons);
        }
        tiers.into_iter().rev().collect()
    }

    /// Evaluates all constraints under an assignment given as a lookup function
    ///
    /// # Errors
    ///
    /// [`Error::Unassigned`] if the assignment misses a variable, or [`Error::Overflow`].
    pub fn evaluate<F>(&self, value_of: F) -> Result<Vec<Violation>, Error>
    where
        F: Fn(&str) -> Option<i64>,
    {
        self.constraints
            .iter()
            .map(|c| {
                Ok(Violation {
                    constraint: c.name().to_string(),
                    weight: c.weight(),
                    amount: c.violation(&value_of)?,
                })
            })
            .collect()
    }

    /// The weighted sum of soft violations and the number of violated hard constraints
    /// under an assignment
    ///
    /// # Errors
    ///
    /// [`Error::Unassigned`] if the assignment misses a variable, or [`Error::Overflow`] if
    /// the weighted sum leaves the `i64` range.
    pub fn score<F>(&self, value_of: F) -> Result<(i64, usize), Error>
    where
        F: Fn(&str) -> Option<i64>,
    {
        let violations = self.evaluate(value_of)?;
        let mut soft: i64 = 0;
        for viol in violations.iter().filter(|v| v.weight >= 0) {
            soft = viol
                .weight
                .checked_mul(viol.amount)
                .and_then(|cost| soft.checked_add(cost))
                .ok_or_else(|| Error::Overflow(viol.constraint.clone()))?;
        }
        let hard = violations
            .iter()
            .filter(|v| v.weight < 0 && v.amount > 0)
            .count();
        Ok((soft, hard))
    }
}

#[cfg(test)]
mod tests {
    use super::{Comparator, ConflictPointConstraint, Domain, Error, LinearConstraint, Model};
    use crate::model::Variable;

    #[test]
    fn duplicate_variable() {
        let mut model = Model::new();
        model.new_variable("x", Domain::range(0..=1).unwrap()).unwrap();
        assert_eq!(
            model.new_variable("x", Domain::range(0..=2).unwrap()),
            Err(Error::DuplicateVariable("x".to_string()))
        );
        assert_eq!(model.variables().len(), 1);
    }

    #[test]
    fn duplicate_constraint() {
        let mut model = Model::new();
        let x = model.new_variable("x", Domain::range(0..=1).unwrap()).unwrap();
        let mk = || {
            ConflictPointConstraint::builder("c")
                .term(&x, 1, true)
                .build()
                .unwrap()
        };
        model.add_constraint(mk()).unwrap();
        assert_eq!(
            model.add_constraint(mk()),
            Err(Error::DuplicateConstraint("c".to_string()))
        );
    }

    #[test]
    fn undeclared_variable() {
        let mut model = Model::new();
        let x = Variable::new("x", Domain::range(0..=1).unwrap()).unwrap();
        let c = LinearConstraint::builder("c")
            .term(1, &x)
            .comparator(Comparator::Le)
            .rhs(0)
            .build()
            .unwrap();
        assert_eq!(
            model.add_constraint(c),
            Err(Error::UndeclaredVariable {
                constraint: "c".to_string(),
                variable: "x".to_string()
            })
        );
    }

    #[test]
    fn tiers_heaviest_first() {
        let mut model = Model::new();
        let x = model.new_variable("x", Domain::range(0..=3).unwrap()).unwrap();
        for (name, weight) in [("a", 1), ("b", 10), ("c", 1), ("d", -1), ("e", 5)] {
            model
                .add_constraint(
                    LinearConstraint::builder(name)
                        .weight(weight)
                        .term(1, &x)
                        .comparator(Comparator::Le)
                        .rhs(1)
                        .build()
                        .unwrap(),
                )
                .unwrap();
        }
        let tiers: Vec<(i64, Vec<&str>)> = model
            .tiers()
            .into_iter()
            .map(|(w, cs)| (w, cs.into_iter().map(|c| c.name()).collect()))
            .collect();
        assert_eq!(
            tiers,
            vec![(10, vec!["b"]), (5, vec!["e"]), (1, vec!["a", "c"])]
        );
    }

    #[test]
    fn score() {
        let mut model = Model::new();
        let x = model.new_variable("x", Domain::range(0..=3).unwrap()).unwrap();
        model
            .add_constraint(
                LinearConstraint::builder("soft")
                    .weight(3)
                    .term(1, &x)
                    .comparator(Comparator::Le)
                    .rhs(1)
                    .build()
                    .unwrap(),
            )
            .unwrap();
        model
            .add_constraint(
                LinearConstraint::builder("hard")
                    .term(1, &x)
                    .comparator(Comparator::Ge)
                    .rhs(3)
                    .build()
                    .unwrap(),
            )
            .unwrap();
        assert_eq!(model.score(|_| Some(3)), Ok((6, 0)));
        assert_eq!(model.score(|_| Some(0)), Ok((0, 1)));
    }
}
