//! # Order Encoding of Integer Variables
//!
//! An integer variable `x` over `{v_0 < … < v_k}` is represented by literals
//! `p_i ⟺ x ≤ v_i` for `i < k`, linked by the chain clauses `p_i → p_{i+1}`. Bounds on `x`
//! then map to single literals and the value of `x` is `v_0 + Σ (v_{i+1} - v_i)·¬p_i`.
//!
//! ## References
//!
//! - Naoyuki Tamura and Akiko Taga and Satoshi Kitagawa and Mutsunori Banbara: _Compiling
//!   Finite Linear CSP into SAT_, Constraints 2009.

use std::ops::Not;

use super::{CollectClauses, EncodeStats};
use crate::types::{Lit, VarManager};

/// A bound on an order-encoded variable: either a constant or a literal
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Atom {
    /// Always holds
    True,
    /// Never holds
    False,
    /// Holds iff the literal is true
    Lit(Lit),
}

impl Not for Atom {
    type Output = Atom;

    fn not(self) -> Atom {
        match self {
            Atom::True => Atom::False,
            Atom::False => Atom::True,
            Atom::Lit(l) => Atom::Lit(!l),
        }
    }
}

/// An order-encoded integer variable
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderVar {
    values: Vec<i64>,
    lits: Vec<Lit>,
}

impl OrderVar {
    /// Encodes a variable over the sorted, duplicate-free `values`, adding the chain clauses
    /// to `collector`
    ///
    /// # Panics
    ///
    /// If `values` is empty.
    pub fn encode<Col>(values: &[i64], collector: &mut Col, var_manager: &mut VarManager) -> Self
    where
        Col: CollectClauses,
    {
        assert!(!values.is_empty(), "order encoding of an empty domain");
        debug_assert!(values.windows(2).all(|w| w[0] < w[1]));
        let lits: Vec<Lit> = (1..values.len()).map(|_| var_manager.new_lit()).collect();
        for pair in lits.windows(2) {
            collector.add_binary(!pair[0], pair[1]);
        }
        OrderVar {
            values: values.to_vec(),
            lits,
        }
    }

    /// The domain values
    #[must_use]
    pub fn values(&self) -> &[i64] {
        &self.values
    }

    /// The smallest value
    #[must_use]
    pub fn lb(&self) -> i64 {
        self.values[0]
    }

    /// The largest value
    #[must_use]
    pub fn ub(&self) -> i64 {
        self.values[self.values.len() - 1]
    }

    /// The order literals, `lits()[i] ⟺ x ≤ values()[i]`
    #[must_use]
    pub fn lits(&self) -> &[Lit] {
        &self.lits
    }

    /// The atom for `x ≤ value`
    #[must_use]
    pub fn le(&self, value: i64) -> Atom {
        if value < self.lb() {
            return Atom::False;
        }
        if value >= self.ub() {
            return Atom::True;
        }
        // largest domain value not above `value`
        let idx = match self.values.binary_search(&value) {
            Ok(idx) => idx,
            Err(idx) => idx - 1,
        };
        Atom::Lit(self.lits[idx])
    }

    /// The atom for `x ≥ value`
    #[must_use]
    pub fn ge(&self, value: i64) -> Atom {
        !self.le(value - 1)
    }

    /// The value of `x` as a constant plus weighted literals: `x = offset + Σ w·l`
    #[must_use]
    pub fn weighted_lits(&self) -> (i64, Vec<(Lit, i64)>) {
        let terms = self
            .lits
            .iter()
            .zip(self.values.windows(2))
            .map(|(&l, w)| (!l, w[1] - w[0]))
            .collect();
        (self.lb(), terms)
    }

    /// Decodes the value from a literal assignment
    pub fn decode<F: FnMut(Lit) -> bool>(&self, mut is_true: F) -> i64 {
        let idx = self
            .lits
            .iter()
            .position(|&l| is_true(l))
            .unwrap_or(self.lits.len());
        self.values[idx]
    }
}

impl EncodeStats for OrderVar {
    fn n_clauses(&self) -> usize {
        self.lits.len().saturating_sub(1)
    }

    fn n_vars(&self) -> u32 {
        u32::try_from(self.lits.len()).unwrap_or(u32::MAX)
    }
}

/// Defines a fresh literal `e ⟺ x = value` and returns it. Values outside the domain yield
/// [`Atom::False`], single-value domains [`Atom::True`].
pub fn eq_atom<Col>(
    var: &OrderVar,
    value: i64,
    collector: &mut Col,
    var_manager: &mut VarManager,
) -> Atom
where
    Col: CollectClauses,
{
    if var.values.binary_search(&value).is_err() {
        return Atom::False;
    }
    let le = var.le(value);
    let gt = !var.ge(value);
    match (le, gt) {
        (Atom::True, Atom::False) => Atom::True,
        (Atom::Lit(l), Atom::False) => Atom::Lit(l),
        (Atom::True, Atom::Lit(g)) => Atom::Lit(!g),
        (Atom::Lit(l), Atom::Lit(g)) => {
            let e = var_manager.new_lit();
            collector.add_binary(!e, l);
            collector.add_binary(!e, !g);
            collector.add_ternary(e, !l, g);
            Atom::Lit(e)
        }
        _ => Atom::False,
    }
}
