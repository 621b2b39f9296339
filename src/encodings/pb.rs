//! # CNF Encodings for Pseudo-Boolean Constraints
//!
//! Normalisation of integer-weighted pseudo-Boolean constraints into the positive form
//! `Σ w·l ≤ k` and their encoding with the [`GeneralizedTotalizer`].

use std::collections::BTreeMap;

use super::{CollectClauses, Error};
use crate::types::{Lit, Var, VarManager};

pub mod gte;
pub use gte::GeneralizedTotalizer;

/// A pseudo-Boolean upper bound `Σ w·l ≤ k` with positive weights and no variable twice
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Normalized {
    /// Satisfied by every assignment
    Tautology,
    /// Satisfied by no assignment
    Unsat,
    /// A constraint that needs encoding
    Ub {
        /// Literals with positive weights
        lits: Vec<(Lit, usize)>,
        /// The bound
        ub: usize,
    },
}

/// Normalizes `Σ w·l ≤ ub` for arbitrary integer weights. Literals of the same variable are
/// merged, negative weights are turned positive by flipping the literal.
///
/// # Errors
///
/// [`Error::Overflow`] if the arithmetic leaves `i64`.
pub fn normalize_ub<I>(lits: I, ub: i64) -> Result<Normalized, Error>
where
    I: IntoIterator<Item = (Lit, i64)>,
{
    let mut coeffs: BTreeMap<Var, i64> = BTreeMap::new();
    let mut offset: i64 = 0;
    for (lit, w) in lits {
        let coeff = coeffs.entry(lit.var()).or_default();
        if lit.is_pos() {
            *coeff = coeff.checked_add(w).ok_or(Error::Overflow)?;
        } else {
            // w·¬x = w - w·x
            *coeff = coeff.checked_sub(w).ok_or(Error::Overflow)?;
            offset = offset.checked_add(w).ok_or(Error::Overflow)?;
        }
    }
    let mut out = Vec::with_capacity(coeffs.len());
    for (var, coeff) in coeffs {
        match coeff.signum() {
            1 => out.push((var.pos_lit(), coeff)),
            -1 => {
                offset = offset.checked_add(coeff).ok_or(Error::Overflow)?;
                out.push((var.neg_lit(), -coeff));
            }
            _ => (),
        }
    }
    let ub = ub.checked_sub(offset).ok_or(Error::Overflow)?;
    if ub < 0 {
        return Ok(Normalized::Unsat);
    }
    let sum = out
        .iter()
        .try_fold(0_i64, |sum, &(_, w)| sum.checked_add(w))
        .ok_or(Error::Overflow)?;
    if sum <= ub {
        return Ok(Normalized::Tautology);
    }
    let ub = usize::try_from(ub).map_err(|_| Error::Overflow)?;
    let lits = out
        .into_iter()
        .map(|(l, w)| Ok((l, usize::try_from(w).map_err(|_| Error::Overflow)?)))
        .collect::<Result<_, Error>>()?;
    Ok(Normalized::Ub { lits, ub })
}

/// Encodes `Σ w·l ≤ ub` for arbitrary integer weights into `collector`
///
/// # Errors
///
/// [`Error::Overflow`] if the arithmetic leaves `i64`.
pub fn encode_ub_constr<Col, I>(
    lits: I,
    ub: i64,
    collector: &mut Col,
    var_manager: &mut VarManager,
) -> Result<(), Error>
where
    Col: CollectClauses,
    I: IntoIterator<Item = (Lit, i64)>,
{
    match normalize_ub(lits, ub)? {
        Normalized::Tautology => (),
        Normalized::Unsat => collector.add_clause(vec![]),
        Normalized::Ub { lits, ub } => {
            let mut enc: GeneralizedTotalizer = lits.into_iter().collect();
            enc.encode_ub(ub, collector, var_manager);
            for unit in enc.enforce_ub(ub)? {
                collector.add_unit(unit);
            }
        }
    }
    Ok(())
}

/// Encodes `Σ w·l ≥ lb` by bounding the negated literals from above
///
/// # Errors
///
/// [`Error::Overflow`] if the arithmetic leaves `i64`.
pub fn encode_lb_constr<Col, I>(
    lits: I,
    lb: i64,
    collector: &mut Col,
    var_manager: &mut VarManager,
) -> Result<(), Error>
where
    Col: CollectClauses,
    I: IntoIterator<Item = (Lit, i64)>,
{
    // Σ w·l ≥ lb  ⟺  -Σ w·l ≤ -lb
    let negated: Vec<(Lit, i64)> = lits.into_iter().map(|(l, w)| (l, -w)).collect();
    let lb = lb.checked_neg().ok_or(Error::Overflow)?;
    encode_ub_constr(negated, lb, collector, var_manager)
}

#[cfg(test)]
mod tests {
    use super::{normalize_ub, Normalized};
    use crate::lit;

    #[test]
    fn flips_negative_weights() {
        let res = normalize_ub([(lit![0], 2), (lit![1], -3)], 1).unwrap();
        // 2a - 3b ≤ 1  ⟺  2a + 3¬b ≤ 4
        assert_eq!(
            res,
            Normalized::Ub {
                lits: vec![(lit![0], 2), (!lit![1], 3)],
                ub: 4
            }
        );
    }

    #[test]
    fn merges_same_variable() {
        // 2a + 2¬a + b = 2 + b
        let res = normalize_ub([(lit![0], 2), (!lit![0], 2), (lit![1], 1)], 3).unwrap();
        assert_eq!(res, Normalized::Tautology);
        let res = normalize_ub([(lit![0], 2), (!lit![0], 2), (lit![1], 1)], 2).unwrap();
        assert_eq!(
            res,
            Normalized::Ub {
                lits: vec![(lit![1], 1)],
                ub: 0
            }
        );
        let res = normalize_ub([(lit![0], 2), (!lit![0], 2), (lit![1], 1)], 1).unwrap();
        assert_eq!(res, Normalized::Unsat);
    }

    #[test]
    fn drops_zero_weights() {
        let res = normalize_ub([(lit![0], 0), (lit![1], 2), (lit![2], 2)], 3).unwrap();
        assert_eq!(
            res,
            Normalized::Ub {
                lits: vec![(lit![1], 2), (lit![2], 2)],
                ub: 3
            }
        );
    }
}
