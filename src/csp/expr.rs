//! # Constraint Expressions
//!
//! The clause/arithmetic language accepted by [`CspSolver`](super::CspSolver): integer
//! declarations, linear comparisons and Boolean structure over them.

use std::fmt;

use itertools::Itertools;

use crate::model::Comparator;

/// An expression for the CSP session
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Expr {
    /// Declares an integer variable over sorted, distinct values
    Int {
        /// The variable name
        name: String,
        /// The values
        domain: Vec<i64>,
    },
    /// `Σ coeff·var op rhs`
    Linear {
        /// The terms
        terms: Vec<(i64, String)>,
        /// The comparator
        op: Comparator,
        /// The right hand side
        rhs: i64,
    },
    /// Negation
    Not(Box<Expr>),
    /// Conjunction
    And(Vec<Expr>),
    /// Disjunction
    Or(Vec<Expr>),
    /// Implication
    Imp(Box<Expr>, Box<Expr>),
    /// Pairwise distinct values
    AllDifferent(Vec<String>),
    /// An expression carrying a name for traceability
    Labeled {
        /// The label
        label: String,
        /// The expression
        expr: Box<Expr>,
    },
}

impl Expr {
    /// Declares an integer variable over `domain`
    pub fn int<S: Into<String>>(name: S, domain: &[i64]) -> Expr {
        Expr::Int {
            name: name.into(),
            domain: domain.to_vec(),
        }
    }

    /// Declares an integer variable over `lb..=ub`
    pub fn int_range<S: Into<String>>(name: S, lb: i64, ub: i64) -> Expr {
        Expr::Int {
            name: name.into(),
            domain: (lb..=ub).collect(),
        }
    }

    /// `Σ coeff·var op rhs`
    #[must_use]
    pub fn linear(terms: Vec<(i64, String)>, op: Comparator, rhs: i64) -> Expr {
        Expr::Linear { terms, op, rhs }
    }

    /// `var op value`
    pub fn cmp<S: Into<String>>(var: S, op: Comparator, value: i64) -> Expr {
        Expr::Linear {
            terms: vec![(1, var.into())],
            op,
            rhs: value,
        }
    }

    /// `var ≤ value`
    pub fn le<S: Into<String>>(var: S, value: i64) -> Expr {
        Self::cmp(var, Comparator::Le, value)
    }

    /// `var ≥ value`
    pub fn ge<S: Into<String>>(var: S, value: i64) -> Expr {
        Self::cmp(var, Comparator::Ge, value)
    }

    /// `var = value`
    pub fn eq<S: Into<String>>(var: S, value: i64) -> Expr {
        Self::cmp(var, Comparator::Eq, value)
    }

    /// `¬expr`
    #[must_use]
    #[allow(clippy::should_implement_trait)]
    pub fn not(expr: Expr) -> Expr {
        Expr::Not(Box::new(expr))
    }

    /// `premise ⇒ conclusion`
    #[must_use]
    pub fn imp(premise: Expr, conclusion: Expr) -> Expr {
        Expr::Imp(Box::new(premise), Box::new(conclusion))
    }

    /// Attaches a label
    #[must_use]
    pub fn labeled<S: Into<String>>(self, label: S) -> Expr {
        Expr::Labeled {
            label: label.into(),
            expr: Box::new(self),
        }
    }

    /// Strips labels
    #[must_use]
    pub fn unlabeled(&self) -> &Expr {
        match self {
            Expr::Labeled { expr, .. } => expr.unlabeled(),
            other => other,
        }
    }
}

fn fmt_op(op: Comparator) -> &'static str {
    match op {
        Comparator::Eq => "eq",
        Comparator::Le => "le",
        Comparator::Lt => "lt",
        Comparator::Ge => "ge",
        Comparator::Gt => "gt",
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Int { name, domain } => {
                let contiguous = domain.windows(2).all(|w| w[1] == w[0] + 1);
                match (domain.first(), domain.last()) {
                    (Some(lb), Some(ub)) if contiguous => write!(f, "(int {name} {lb} {ub})"),
                    _ => write!(f, "(int {name} ({}))", domain.iter().format(" ")),
                }
            }
            Expr::Linear { terms, op, rhs } => {
                write!(f, "({} ", fmt_op(*op))?;
                match terms.as_slice() {
                    [] => write!(f, "0")?,
                    [(1, var)] => write!(f, "{var}")?,
                    terms => write!(
                        f,
                        "(add {})",
                        terms.iter().format_with(" ", |(c, v), f| f(&format_args!(
                            "(mul {c} {v})"
                        )))
                    )?,
                }
                write!(f, " {rhs})")
            }
            Expr::Not(e) => write!(f, "(not {e})"),
            Expr::And(es) => write!(f, "(and {})", es.iter().format(" ")),
            Expr::Or(es) => write!(f, "(or {})", es.iter().format(" ")),
            Expr::Imp(a, b) => write!(f, "(imp {a} {b})"),
            Expr::AllDifferent(vars) => write!(f, "(alldifferent {})", vars.iter().format(" ")),
            Expr::Labeled { label, expr } => write!(f, "{expr} ; {label}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Expr;
    use crate::model::Comparator;

    #[test]
    fn display() {
        assert_eq!(format!("{}", Expr::int_range("x", 1, 3)), "(int x 1 3)");
        assert_eq!(format!("{}", Expr::int("y", &[1, 4])), "(int y (1 4))");
        assert_eq!(format!("{}", Expr::le("x", 2)), "(le x 2)");
        let sum = Expr::linear(
            vec![(1, "x".to_string()), (-2, "y".to_string())],
            Comparator::Eq,
            0,
        );
        assert_eq!(format!("{sum}"), "(eq (add (mul 1 x) (mul -2 y)) 0)");
        let imp = Expr::imp(Expr::ge("b", 1), Expr::le("x", 2)).labeled("c");
        assert_eq!(format!("{imp}"), "(imp (ge b 1) (le x 2)) ; c");
    }

    #[test]
    fn unlabeled() {
        let e = Expr::le("x", 1).labeled("a").labeled("b");
        assert_eq!(e.unlabeled(), &Expr::le("x", 1));
    }
}
