//! # Generalized Totalizer Encoding
//!
//! Implementation of the binary adder tree generalized totalizer encoding \[1\] for a single
//! upper bound. Output values of every node are truncated at `ub + 1`, which keeps the number
//! of output literals per node bounded by the right hand side.
//!
//! ## References
//!
//! - \[1\] Saurabh Joshi and Ruben Martins and Vasco Manquinho: _Generalized Totalizer Encoding for Pseudo-Boolean Constraints_, CP 2015.

use std::{cmp, collections::BTreeMap};

use crate::{
    encodings::{CollectClauses, EncodeStats, Error},
    types::{Lit, VarManager},
};

/// Generalized totalizer over positively weighted literals. Only upper bounding is
/// supported, lower bounds are encoded over the negated literals.
#[derive(Default)]
pub struct GeneralizedTotalizer {
    /// Input literals and weights
    in_lits: Vec<(Lit, usize)>,
    /// The root of the tree, if constructed
    root: Option<Node>,
    /// The bound the tree was built for
    encoded_ub: Option<usize>,
    /// The number of variables in the GTE
    n_vars: u32,
    /// The number of clauses in the GTE
    n_clauses: usize,
}

impl GeneralizedTotalizer {
    /// Recursively builds the tree data structure
    fn build_tree(lits: &[(Lit, usize)]) -> Node {
        debug_assert_ne!(lits.len(), 0);

        if lits.len() == 1 {
            return Node::Leaf {
                lit: lits[0].0,
                weight: lits[0].1,
            };
        }

        let split = lits.len() / 2;
        let left = Self::build_tree(&lits[..split]);
        let right = Self::build_tree(&lits[split..]);

        Node::Internal {
            out_lits: BTreeMap::new(),
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Sum of all input weights
    #[must_use]
    pub fn weight_sum(&self) -> usize {
        self.in_lits.iter().map(|&(_, w)| w).sum()
    }

    /// Builds the encoding for the bound `Σ w·l ≤ ub`. Literals heavier than `ub` stay out of
    /// the tree; [`GeneralizedTotalizer::enforce_ub`] forbids them directly.
    pub fn encode_ub<Col>(&mut self, ub: usize, collector: &mut Col, var_manager: &mut VarManager)
    where
        Col: CollectClauses,
    {
        if self.encoded_ub == Some(ub) {
            return;
        }
        let n_vars_before = var_manager.n_used();
        let n_clauses_before = collector.n_clauses();
        let mut tree_lits: Vec<(Lit, usize)> = self
            .in_lits
            .iter()
            .copied()
            .filter(|&(_, w)| w <= ub)
            .collect();
        // Add nodes in sorted fashion to minimize clauses
        tree_lits.sort_by_key(|&(_, w)| w);
        self.root = if tree_lits.is_empty() {
            None
        } else {
            let mut root = Self::build_tree(&tree_lits);
            root.encode_rec(ub + 1, collector, var_manager);
            Some(root)
        };
        self.encoded_ub = Some(ub);
        self.n_vars += var_manager.n_used() - n_vars_before;
        self.n_clauses += collector.n_clauses() - n_clauses_before;
    }

    /// Returns the units enforcing `Σ w·l ≤ ub`
    ///
    /// # Errors
    ///
    /// [`Error::NotEncoded`] if [`GeneralizedTotalizer::encode_ub`] was not called for `ub`.
    pub fn enforce_ub(&self, ub: usize) -> Result<Vec<Lit>, Error> {
        if self.encoded_ub != Some(ub) {
            return Err(Error::NotEncoded);
        }
        let mut units: Vec<Lit> = self
            .in_lits
            .iter()
            .filter(|&&(_, w)| w > ub)
            .map(|&(l, _)| !l)
            .collect();
        if let Some(Node::Internal { out_lits, .. }) = &self.root {
            units.extend(out_lits.range(ub + 1..).map(|(_, &l)| !l));
        }
        Ok(units)
    }
}

impl EncodeStats for GeneralizedTotalizer {
    fn n_clauses(&self) -> usize {
        self.n_clauses
    }

    fn n_vars(&self) -> u32 {
        self.n_vars
    }
}

impl FromIterator<(Lit, usize)> for GeneralizedTotalizer {
    fn from_iter<T: IntoIterator<Item = (Lit, usize)>>(iter: T) -> Self {
        GeneralizedTotalizer {
            in_lits: iter.into_iter().collect(),
            ..Default::default()
        }
    }
}

/// A node of the adder tree. Output literal `out_lits[s]` is implied whenever the weighted
/// sum of the subtree reaches `s`.
enum Node {
    Leaf {
        /// The input literal to the tree
        lit: Lit,
        /// The weight of the input literal
        weight: usize,
    },
    Internal {
        /// The weighted output literals of this node
        out_lits: BTreeMap<usize, Lit>,
        /// The left child
        left: Box<Node>,
        /// The right child
        right: Box<Node>,
    },
}

impl Node {
    /// The output values and literals of this node, truncated at `cap`
    fn outputs(&self, cap: usize) -> Vec<(usize, Lit)> {
        match self {
            Node::Leaf { lit, weight } => vec![(cmp::min(*weight, cap), *lit)],
            Node::Internal { out_lits, .. } => out_lits.iter().map(|(&v, &l)| (v, l)).collect(),
        }
    }

    /// Encodes the subtree with all values truncated at `cap`
    fn encode_rec<Col>(&mut self, cap: usize, collector: &mut Col, var_manager: &mut VarManager)
    where
        Col: CollectClauses,
    {
        let Node::Internal {
            out_lits,
            left,
            right,
        } = self
        else {
            return;
        };
        left.encode_rec(cap, collector, var_manager);
        right.encode_rec(cap, collector, var_manager);
        let left_out = left.outputs(cap);
        let right_out = right.outputs(cap);

        let mut out = |val: usize| {
            *out_lits
                .entry(cmp::min(val, cap))
                .or_insert_with(|| var_manager.new_lit())
        };
        for &(val, lit) in left_out.iter().chain(right_out.iter()) {
            let o = out(val);
            collector.add_binary(!lit, o);
        }
        for &(lval, llit) in &left_out {
            for &(rval, rlit) in &right_out {
                let o = out(lval + rval);
                collector.add_ternary(!llit, !rlit, o);
            }
        }
    }
}
