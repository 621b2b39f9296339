//! # Constraint Types
//!
//! The four constraint kinds of the model. Every constraint carries a name and a weight:
//! [`HARD`] (`-1`) marks a constraint that must hold, a non-negative weight marks a soft
//! constraint whose violation amount is charged `weight` times.
//!
//! Constraints are created through builders that own their term buffers and hand them over
//! on [`build`](LinearConstraintBuilder::build).

use std::fmt;

use itertools::Itertools;

use super::{variable::check_identifier, Error, Variable};

/// The weight of a hard constraint
pub const HARD: i64 = -1;

/// Comparison operators of linear and pseudo-Boolean constraints
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Comparator {
    /// `=`
    Eq,
    /// `<=`
    Le,
    /// `<`
    Lt,
    /// `>=`
    Ge,
    /// `>`
    Gt,
}

impl Comparator {
    /// Checks whether `lhs op rhs` holds
    #[must_use]
    pub fn holds(self, lhs: i64, rhs: i64) -> bool {
        match self {
            Comparator::Eq => lhs == rhs,
            Comparator::Le => lhs <= rhs,
            Comparator::Lt => lhs < rhs,
            Comparator::Ge => lhs >= rhs,
            Comparator::Gt => lhs > rhs,
        }
    }

    /// The amount by which `lhs op rhs` is violated, `None` if it does not fit an `i64`
    #[must_use]
    pub fn violation(self, lhs: i64, rhs: i64) -> Option<i64> {
        match self {
            Comparator::Eq => lhs.checked_sub(rhs)?.checked_abs(),
            Comparator::Le => excess(lhs, rhs, 0),
            Comparator::Lt => excess(lhs, rhs, 1),
            Comparator::Ge => excess(rhs, lhs, 0),
            Comparator::Gt => excess(rhs, lhs, 1),
        }
    }

    /// The largest violation `lhs op rhs` can incur for `lhs` in `lhs_min..=lhs_max`, `None`
    /// if it does not fit an `i64`
    #[must_use]
    pub fn checked_max_violation(self, rhs: i64, lhs_min: i64, lhs_max: i64) -> Option<i64> {
        match self {
            Comparator::Eq => Some(
                Comparator::Le
                    .violation(lhs_max, rhs)?
                    .max(Comparator::Ge.violation(lhs_min, rhs)?),
            ),
            Comparator::Le | Comparator::Lt => self.violation(lhs_max, rhs),
            Comparator::Ge | Comparator::Gt => self.violation(lhs_min, rhs),
        }
    }

    /// [`Comparator::checked_max_violation`] saturating at [`i64::MAX`]. Built constraints
    /// never saturate.
    #[must_use]
    pub fn max_violation(self, rhs: i64, lhs_min: i64, lhs_max: i64) -> i64 {
        self.checked_max_violation(rhs, lhs_min, lhs_max)
            .unwrap_or(i64::MAX)
    }
}

/// `max(a - b + extra, 0)`
fn excess(a: i64, b: i64, extra: i64) -> Option<i64> {
    Some(a.checked_sub(b)?.checked_add(extra)?.max(0))
}

/// Checks that the left hand side range, the violations of `lhs op rhs` in either direction
/// and the weighted penalty fit an `i64`
fn check_arithmetic(
    name: &str,
    weight: i64,
    rhs: i64,
    bounds: Option<(i64, i64)>,
) -> Result<(), Error> {
    let fits = bounds
        .and_then(|(min, max)| {
            let below = Comparator::Gt.checked_max_violation(rhs, min, max)?;
            let above = Comparator::Lt.checked_max_violation(rhs, min, max)?;
            Comparator::Lt.violation(min, rhs)?;
            Comparator::Gt.violation(max, rhs)?;
            weight.max(0).checked_mul(below.max(above))
        })
        .is_some();
    if fits {
        Ok(())
    } else {
        Err(Error::Overflow(name.to_string()))
    }
}

/// The range of `Σ coeff·x` over the variable domains
fn linear_bounds(terms: &[LinearTerm]) -> Option<(i64, i64)> {
    terms.iter().try_fold((0_i64, 0_i64), |(min, max), t| {
        let dom = t.variable.domain();
        let at_lb = t.coeff.checked_mul(dom.lb())?;
        let at_ub = t.coeff.checked_mul(dom.ub())?;
        Some((
            min.checked_add(at_lb.min(at_ub))?,
            max.checked_add(at_lb.max(at_ub))?,
        ))
    })
}

/// The range of `Σ coeff·[x = v]`
fn pseudo_boolean_bounds(terms: &[PseudoBooleanTerm]) -> Option<(i64, i64)> {
    terms.iter().try_fold((0_i64, 0_i64), |(min, max), t| {
        Some((
            min.checked_add(t.coeff.min(0))?,
            max.checked_add(t.coeff.max(0))?,
        ))
    })
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Comparator::Eq => write!(f, "="),
            Comparator::Le => write!(f, "<="),
            Comparator::Lt => write!(f, "<"),
            Comparator::Ge => write!(f, ">="),
            Comparator::Gt => write!(f, ">"),
        }
    }
}

/// A term `coeff * variable`
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct LinearTerm {
    /// The coefficient
    pub coeff: i64,
    /// The variable
    pub variable: Variable,
}

/// A term `coeff * [variable == value]`
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PseudoBooleanTerm {
    /// The coefficient
    pub coeff: i64,
    /// The variable
    pub variable: Variable,
    /// The value the indicator refers to
    pub value: i64,
}

/// A predicate `variable == value` with a polarity.
///
/// In a [`ConflictPointConstraint`], polarity `true` means the predicate must not hold and
/// polarity `false` means it must hold.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PredicateTerm {
    /// The variable
    pub variable: Variable,
    /// The value
    pub value: i64,
    /// The polarity
    pub polarity: bool,
}

/// `Σ coeff·x op rhs`
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct LinearConstraint {
    name: String,
    weight: i64,
    terms: Vec<LinearTerm>,
    op: Comparator,
    rhs: i64,
}

/// `Σ coeff·[x == value] op rhs`
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PseudoBooleanConstraint {
    name: String,
    weight: i64,
    terms: Vec<PseudoBooleanTerm>,
    op: Comparator,
    rhs: i64,
}

/// Forbids the conjunction of its predicates
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ConflictPointConstraint {
    name: String,
    weight: i64,
    terms: Vec<PredicateTerm>,
}

/// Pairwise distinct values over variables sharing one domain. Always hard in practice,
/// translators reject soft instances.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AllDifferentConstraint {
    name: String,
    weight: i64,
    variables: Vec<Variable>,
}

macro_rules! common_accessors {
    ($ty:ty) => {
        impl $ty {
            /// The constraint name
            #[must_use]
            pub fn name(&self) -> &str {
                &self.name
            }

            /// The weight, [`HARD`] for hard constraints
            #[must_use]
            pub fn weight(&self) -> i64 {
                self.weight
            }

            /// Checks whether the constraint is hard
            #[must_use]
            pub fn is_hard(&self) -> bool {
                self.weight < 0
            }
        }
    };
}

common_accessors!(LinearConstraint);
common_accessors!(PseudoBooleanConstraint);
common_accessors!(ConflictPointConstraint);
common_accessors!(AllDifferentConstraint);

impl LinearConstraint {
    /// Starts building a linear constraint
    pub fn builder<S: Into<String>>(name: S) -> LinearConstraintBuilder {
        LinearConstraintBuilder {
            name: name.into(),
            weight: HARD,
            terms: vec![],
            op: None,
            rhs: 0,
        }
    }

    /// The terms
    #[must_use]
    pub fn terms(&self) -> &[LinearTerm] {
        &self.terms
    }

    /// The comparator
    #[must_use]
    pub fn comparator(&self) -> Comparator {
        self.op
    }

    /// The right hand side
    #[must_use]
    pub fn rhs(&self) -> i64 {
        self.rhs
    }

    /// The smallest value the left hand side can take
    #[must_use]
    pub fn lhs_min(&self) -> i64 {
        linear_bounds(&self.terms).map_or(i64::MIN, |(min, _)| min)
    }

    /// The largest value the left hand side can take
    #[must_use]
    pub fn lhs_max(&self) -> i64 {
        linear_bounds(&self.terms).map_or(i64::MAX, |(_, max)| max)
    }

    /// The largest possible violation, `0` for hard constraints
    #[must_use]
    pub fn penalty_upper_bound(&self) -> i64 {
        if self.is_hard() {
            return 0;
        }
        self.op
            .max_violation(self.rhs, self.lhs_min(), self.lhs_max())
    }
}

impl PseudoBooleanConstraint {
    /// Starts building a pseudo-Boolean constraint
    pub fn builder<S: Into<String>>(name: S) -> PseudoBooleanConstraintBuilder {
        PseudoBooleanConstraintBuilder {
            name: name.into(),
            weight: HARD,
            terms: vec![],
            op: None,
            rhs: 0,
        }
    }

    /// The terms
    #[must_use]
    pub fn terms(&self) -> &[PseudoBooleanTerm] {
        &self.terms
    }

    /// The comparator
    #[must_use]
    pub fn comparator(&self) -> Comparator {
        self.op
    }

    /// The right hand side
    #[must_use]
    pub fn rhs(&self) -> i64 {
        self.rhs
    }

    /// Sum of the negative coefficients
    #[must_use]
    pub fn lhs_min(&self) -> i64 {
        pseudo_boolean_bounds(&self.terms).map_or(i64::MIN, |(min, _)| min)
    }

    /// Sum of the positive coefficients
    #[must_use]
    pub fn lhs_max(&self) -> i64 {
        pseudo_boolean_bounds(&self.terms).map_or(i64::MAX, |(_, max)| max)
    }

    /// The largest possible violation, `0` for hard constraints
    #[must_use]
    pub fn penalty_upper_bound(&self) -> i64 {
        if self.is_hard() {
            return 0;
        }
        self.op
            .max_violation(self.rhs, self.lhs_min(), self.lhs_max())
    }
}

impl ConflictPointConstraint {
    /// Starts building a conflict point constraint
    pub fn builder<S: Into<String>>(name: S) -> ConflictPointConstraintBuilder {
        ConflictPointConstraintBuilder {
            name: name.into(),
            weight: HARD,
            terms: vec![],
        }
    }

    /// The predicate terms
    #[must_use]
    pub fn terms(&self) -> &[PredicateTerm] {
        &self.terms
    }

    /// The number of terms with polarity `false`
    #[must_use]
    pub fn n_negative(&self) -> usize {
        self.terms.iter().filter(|t| !t.polarity).count()
    }

    /// `1` for soft constraints, `0` for hard ones
    #[must_use]
    pub fn penalty_upper_bound(&self) -> i64 {
        if self.is_hard() {
            0
        } else {
            1
        }
    }
}

impl AllDifferentConstraint {
    /// Starts building an all-different constraint
    pub fn builder<S: Into<String>>(name: S) -> AllDifferentConstraintBuilder {
        AllDifferentConstraintBuilder {
            name: name.into(),
            weight: HARD,
            variables: vec![],
        }
    }

    /// The variables
    #[must_use]
    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }
}

/// Builder for [`LinearConstraint`]
#[derive(Clone, Debug)]
pub struct LinearConstraintBuilder {
    name: String,
    weight: i64,
    terms: Vec<LinearTerm>,
    op: Option<Comparator>,
    rhs: i64,
}

/// Builder for [`PseudoBooleanConstraint`]
#[derive(Clone, Debug)]
pub struct PseudoBooleanConstraintBuilder {
    name: String,
    weight: i64,
    terms: Vec<PseudoBooleanTerm>,
    op: Option<Comparator>,
    rhs: i64,
}

/// Builder for [`ConflictPointConstraint`]
#[derive(Clone, Debug)]
pub struct ConflictPointConstraintBuilder {
    name: String,
    weight: i64,
    terms: Vec<PredicateTerm>,
}

/// Builder for [`AllDifferentConstraint`]
#[derive(Clone, Debug)]
pub struct AllDifferentConstraintBuilder {
    name: String,
    weight: i64,
    variables: Vec<Variable>,
}

macro_rules! weight_setter {
    ($ty:ty) => {
        impl $ty {
            /// Sets the weight. Anything below [`HARD`] is treated as hard.
            #[must_use]
            pub fn weight(mut self, weight: i64) -> Self {
                self.weight = weight.max(HARD);
                self
            }

            /// Marks the constraint as hard
            #[must_use]
            pub fn hard(mut self) -> Self {
                self.weight = HARD;
                self
            }
        }
    };
}

weight_setter!(LinearConstraintBuilder);
weight_setter!(PseudoBooleanConstraintBuilder);
weight_setter!(ConflictPointConstraintBuilder);
weight_setter!(AllDifferentConstraintBuilder);

impl LinearConstraintBuilder {
    /// Appends the term `coeff * variable`
    #[must_use]
    pub fn term(mut self, coeff: i64, variable: &Variable) -> Self {
        self.add_term(coeff, variable);
        self
    }

    /// Appends the term `coeff * variable` in place
    pub fn add_term(&mut self, coeff: i64, variable: &Variable) {
        self.terms.push(LinearTerm {
            coeff,
            variable: variable.clone(),
        });
    }

    /// Sets the comparator
    #[must_use]
    pub fn comparator(mut self, op: Comparator) -> Self {
        self.op = Some(op);
        self
    }

    /// Sets the right hand side
    #[must_use]
    pub fn rhs(mut self, rhs: i64) -> Self {
        self.rhs = rhs;
        self
    }

    /// Freezes the constraint
    ///
    /// # Errors
    ///
    /// [`Error::InvalidName`], [`Error::IncompleteConstraint`] if no comparator was set, or
    /// [`Error::Overflow`] if the penalty arithmetic leaves the `i64` range.
    pub fn build(self) -> Result<LinearConstraint, Error> {
        check_identifier(&self.name)?;
        let Some(op) = self.op else {
            return Err(Error::IncompleteConstraint(self.name));
        };
        check_arithmetic(
            &self.name,
            self.weight,
            self.rhs,
            linear_bounds(&self.terms),
        )?;
        Ok(LinearConstraint {
            name: self.name,
            weight: self.weight,
            terms: self.terms,
            op,
            rhs: self.rhs,
        })
    }
}

impl PseudoBooleanConstraintBuilder {
    /// Appends the term `coeff * [variable == value]`
    #[must_use]
    pub fn term(mut self, coeff: i64, variable: &Variable, value: i64) -> Self {
        self.add_term(coeff, variable, value);
        self
    }

    /// Appends the term `coeff * [variable == value]` in place
    pub fn add_term(&mut self, coeff: i64, variable: &Variable, value: i64) {
        self.terms.push(PseudoBooleanTerm {
            coeff,
            variable: variable.clone(),
            value,
        });
    }

    /// Sets the comparator
    #[must_use]
    pub fn comparator(mut self, op: Comparator) -> Self {
        self.op = Some(op);
        self
    }

    /// Sets the right hand side
    #[must_use]
    pub fn rhs(mut self, rhs: i64) -> Self {
        self.rhs = rhs;
        self
    }

    /// Freezes the constraint
    ///
    /// # Errors
    ///
    /// [`Error::InvalidName`], [`Error::IncompleteConstraint`] if no comparator was set,
    /// [`Error::ValueNotInDomain`] for a term value outside its variable's domain, or
    /// [`Error::Overflow`] if the penalty arithmetic leaves the `i64` range.
    pub fn build(self) -> Result<PseudoBooleanConstraint, Error> {
        check_identifier(&self.name)?;
        let Some(op) = self.op else {
            return Err(Error::IncompleteConstraint(self.name));
        };
        if let Some(t) = self
            .terms
            .iter()
            .find(|t| !t.variable.domain().contains(t.value))
        {
            return Err(Error::ValueNotInDomain {
                variable: t.variable.name().to_string(),
                value: t.value,
            });
        }
        check_arithmetic(
            &self.name,
            self.weight,
            self.rhs,
            pseudo_boolean_bounds(&self.terms),
        )?;
        Ok(PseudoBooleanConstraint {
            name: self.name,
            weight: self.weight,
            terms: self.terms,
            op,
            rhs: self.rhs,
        })
    }
}

impl ConflictPointConstraintBuilder {
    /// Appends the predicate `variable == value` with the given polarity
    #[must_use]
    pub fn term(mut self, variable: &Variable, value: i64, polarity: bool) -> Self {
        self.add_term(variable, value, polarity);
        self
    }

    /// Appends a predicate in place
    pub fn add_term(&mut self, variable: &Variable, value: i64, polarity: bool) {
        self.terms.push(PredicateTerm {
            variable: variable.clone(),
            value,
            polarity,
        });
    }

    /// Freezes the constraint
    ///
    /// # Errors
    ///
    /// [`Error::InvalidName`] or [`Error::ValueNotInDomain`].
    pub fn build(self) -> Result<ConflictPointConstraint, Error> {
        check_identifier(&self.name)?;
        if let Some(t) = self
            .terms
            .iter()
            .find(|t| !t.variable.domain().contains(t.value))
        {
            return Err(Error::ValueNotInDomain {
                variable: t.variable.name().to_string(),
                value: t.value,
            });
        }
        Ok(ConflictPointConstraint {
            name: self.name,
            weight: self.weight,
            terms: self.terms,
        })
    }
}

impl AllDifferentConstraintBuilder {
    /// Appends a variable
    #[must_use]
    pub fn variable(mut self, variable: &Variable) -> Self {
        self.variables.push(variable.clone());
        self
    }

    /// Appends several variables
    #[must_use]
    pub fn variables<'v, I: IntoIterator<Item = &'v Variable>>(mut self, vars: I) -> Self {
        self.variables.extend(vars.into_iter().cloned());
        self
    }

    /// Freezes the constraint
    ///
    /// # Errors
    ///
    /// [`Error::InvalidName`] or [`Error::DomainMismatch`] if the variables do not share
    /// one domain.
    pub fn build(self) -> Result<AllDifferentConstraint, Error> {
        check_identifier(&self.name)?;
        if !self.variables.iter().map(Variable::domain).all_equal() {
            return Err(Error::DomainMismatch(self.name));
        }
        Ok(AllDifferentConstraint {
            name: self.name,
            weight: self.weight,
            variables: self.variables,
        })
    }
}

/// Any constraint of the model
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Constraint {
    /// A linear constraint
    Linear(LinearConstraint),
    /// A pseudo-Boolean constraint
    PseudoBoolean(PseudoBooleanConstraint),
    /// A conflict point constraint
    ConflictPoint(ConflictPointConstraint),
    /// An all-different constraint
    AllDifferent(AllDifferentConstraint),
}

impl Constraint {
    /// The constraint name
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Constraint::Linear(c) => c.name(),
            Constraint::PseudoBoolean(c) => c.name(),
            Constraint::ConflictPoint(c) => c.name(),
            Constraint::AllDifferent(c) => c.name(),
        }
    }

    /// The weight, [`HARD`] for hard constraints
    #[must_use]
    pub fn weight(&self) -> i64 {
        match self {
            Constraint::Linear(c) => c.weight(),
            Constraint::PseudoBoolean(c) => c.weight(),
            Constraint::ConflictPoint(c) => c.weight(),
            Constraint::AllDifferent(c) => c.weight(),
        }
    }

    /// Checks whether the constraint is hard
    #[must_use]
    pub fn is_hard(&self) -> bool {
        self.weight() < 0
    }

    /// Checks whether the constraint is soft
    #[must_use]
    pub fn is_soft(&self) -> bool {
        !self.is_hard()
    }

    /// The largest violation the constraint can incur. `None` for all-different
    /// constraints, which have no penalty arithmetic.
    #[must_use]
    pub fn penalty_upper_bound(&self) -> Option<i64> {
        match self {
            Constraint::Linear(c) => Some(c.penalty_upper_bound()),
            Constraint::PseudoBoolean(c) => Some(c.penalty_upper_bound()),
            Constraint::ConflictPoint(c) => Some(c.penalty_upper_bound()),
            Constraint::AllDifferent(_) => None,
        }
    }

    /// The variables referenced by the constraint, possibly with repetitions
    #[must_use]
    pub fn variables(&self) -> Vec<&Variable> {
        match self {
            Constraint::Linear(c) => c.terms.iter().map(|t| &t.variable).collect(),
            Constraint::PseudoBoolean(c) => c.terms.iter().map(|t| &t.variable).collect(),
            Constraint::ConflictPoint(c) => c.terms.iter().map(|t| &t.variable).collect(),
            Constraint::AllDifferent(c) => c.variables.iter().collect(),
        }
    }

    /// The violation amount under an assignment given as a lookup function
    ///
    /// For all-different constraints the amount is the number of clashing pairs.
    ///
    /// # Errors
    ///
    /// [`Error::Unassigned`] if `value_of` misses a referenced variable, or
    /// [`Error::Overflow`] if the left hand side or the amount leaves the `i64` range.
    pub fn violation<F>(&self, value_of: F) -> Result<i64, Error>
    where
        F: Fn(&str) -> Option<i64>,
    {
        let value = |var: &Variable| {
            value_of(var.name()).ok_or_else(|| Error::Unassigned(var.name().to_string()))
        };
        let overflow = || Error::Overflow(self.name().to_string());
        match self {
            Constraint::Linear(c) => {
                let mut lhs: i64 = 0;
                for t in &c.terms {
                    lhs = t
                        .coeff
                        .checked_mul(value(&t.variable)?)
                        .and_then(|prod| lhs.checked_add(prod))
                        .ok_or_else(overflow)?;
                }
                c.op.violation(lhs, c.rhs).ok_or_else(overflow)
            }
            Constraint::PseudoBoolean(c) => {
                let mut lhs: i64 = 0;
                for t in &c.terms {
                    if value(&t.variable)? == t.value {
                        lhs = lhs.checked_add(t.coeff).ok_or_else(overflow)?;
                    }
                }
                c.op.violation(lhs, c.rhs).ok_or_else(overflow)
            }
            Constraint::ConflictPoint(c) => {
                let mut conflict = true;
                for t in &c.terms {
                    let holds = value(&t.variable)? == t.value;
                    conflict &= holds == t.polarity;
                }
                Ok(i64::from(conflict))
            }
            Constraint::AllDifferent(c) => {
                let values = c.variables.iter().map(value).collect::<Result<Vec<_>, _>>()?;
                let clashes = values
                    .iter()
                    .tuple_combinations()
                    .filter(|(a, b)| a == b)
                    .count();
                i64::try_from(clashes).map_err(|_| overflow())
            }
        }
    }
}

impl From<LinearConstraint> for Constraint {
    fn from(value: LinearConstraint) -> Self {
        Constraint::Linear(value)
    }
}

impl From<PseudoBooleanConstraint> for Constraint {
    fn from(value: PseudoBooleanConstraint) -> Self {
        Constraint::PseudoBoolean(value)
    }
}

impl From<ConflictPointConstraint> for Constraint {
    fn from(value: ConflictPointConstraint) -> Self {
        Constraint::ConflictPoint(value)
    }
}

impl From<AllDifferentConstraint> for Constraint {
    fn from(value: AllDifferentConstraint) -> Self {
        Constraint::AllDifferent(value)
    }
}

fn fmt_weight(weight: i64, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if weight < 0 {
        write!(f, "hard")
    } else {
        write!(f, "w={weight}")
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [", self.name())?;
        fmt_weight(self.weight(), f)?;
        write!(f, "]: ")?;
        match self {
            Constraint::Linear(c) => write!(
                f,
                "{} {} {}",
                c.terms
                    .iter()
                    .format_with(" + ", |t, f| f(&format_args!(
                        "{}*{}",
                        t.coeff,
                        t.variable.name()
                    ))),
                c.op,
                c.rhs
            ),
            Constraint::PseudoBoolean(c) => write!(
                f,
                "{} {} {}",
                c.terms
                    .iter()
                    .format_with(" + ", |t, f| f(&format_args!(
                        "{}*[{}={}]",
                        t.coeff,
                        t.variable.name(),
                        t.value
                    ))),
                c.op,
                c.rhs
            ),
            Constraint::ConflictPoint(c) => write!(
                f,
                "not({})",
                c.terms.iter().format_with(" and ", |t, f| {
                    if t.polarity {
                        f(&format_args!("{}={}", t.variable.name(), t.value))
                    } else {
                        f(&format_args!("{}!={}", t.variable.name(), t.value))
                    }
                })
            ),
            Constraint::AllDifferent(c) => write!(
                f,
                "alldiff({})",
                c.variables.iter().map(Variable::name).format(", ")
            ),
        }
    }
}
