//! # SAT-Level Types
//!
//! Variables, literals and clauses handed to the incremental SAT kernel, plus the variable
//! manager used by encodings to allocate auxiliary variables.

use core::ops::Not;
use std::fmt;

/// The hash map used throughout the crate
pub type RsHashMap<K, V> = rustc_hash::FxHashMap<K, V>;

/// A Boolean variable, identified by its 0-based index
#[derive(Hash, Eq, PartialEq, PartialOrd, Ord, Clone, Copy)]
pub struct Var {
    idx: u32,
}

impl Var {
    /// Creates a new variable
    #[must_use]
    pub const fn new(idx: u32) -> Var {
        Var { idx }
    }

    /// The positive literal of the variable
    #[must_use]
    pub const fn pos_lit(self) -> Lit {
        Lit::new(self.idx, false)
    }

    /// The negative literal of the variable
    #[must_use]
    pub const fn neg_lit(self) -> Lit {
        Lit::new(self.idx, true)
    }

    /// The variable index
    #[must_use]
    pub fn idx(self) -> usize {
        self.idx as usize
    }

    /// The variable index as `u32`
    #[must_use]
    pub const fn idx32(self) -> u32 {
        self.idx
    }
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x{}", self.idx)
    }
}

impl fmt::Debug for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x{}", self.idx)
    }
}

/// A literal, stored as `2 * var + negated`
#[derive(Hash, Eq, PartialEq, PartialOrd, Ord, Clone, Copy)]
pub struct Lit {
    lidx: u32,
}

impl Lit {
    /// Creates a literal of variable `idx`
    #[must_use]
    pub const fn new(idx: u32, negated: bool) -> Lit {
        Lit {
            lidx: (idx << 1) | negated as u32,
        }
    }

    /// The variable of the literal
    #[must_use]
    pub const fn var(self) -> Var {
        Var::new(self.lidx >> 1)
    }

    /// The variable index
    #[must_use]
    pub fn vidx(self) -> usize {
        (self.lidx >> 1) as usize
    }

    /// The variable index as `u32`
    #[must_use]
    pub const fn vidx32(self) -> u32 {
        self.lidx >> 1
    }

    /// Checks whether the literal is positive
    #[must_use]
    pub const fn is_pos(self) -> bool {
        self.lidx & 1 == 0
    }

    /// Checks whether the literal is negated
    #[must_use]
    pub const fn is_neg(self) -> bool {
        self.lidx & 1 == 1
    }
}

impl Not for Lit {
    type Output = Lit;

    fn not(self) -> Lit {
        Lit {
            lidx: self.lidx ^ 1,
        }
    }
}

impl fmt::Display for Lit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_neg() {
            write!(f, "~{}", self.var())
        } else {
            write!(f, "{}", self.var())
        }
    }
}

impl fmt::Debug for Lit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// A clause, a disjunction of literals
pub type Clause = Vec<Lit>;

/// Creates a [`Var`] from an index
#[macro_export]
macro_rules! var {
    ($v:expr) => {
        $crate::types::Var::new($v)
    };
}

/// Creates a positive [`Lit`] from a variable index
#[macro_export]
macro_rules! lit {
    ($l:expr) => {
        $crate::types::Lit::new($l, false)
    };
}

/// Creates a [`Clause`] from literals
#[macro_export]
macro_rules! clause {
    () => {
        $crate::types::Clause::new()
    };
    ( $($l:expr),* $(,)? ) => {
        vec![$($l),*]
    };
}

/// A value in a partial Boolean assignment
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TernaryVal {
    /// Assigned true
    True,
    /// Assigned false
    False,
    /// Unassigned
    DontCare,
}

impl Not for TernaryVal {
    type Output = TernaryVal;

    fn not(self) -> TernaryVal {
        match self {
            TernaryVal::True => TernaryVal::False,
            TernaryVal::False => TernaryVal::True,
            TernaryVal::DontCare => TernaryVal::DontCare,
        }
    }
}

/// Hands out fresh variables in increasing index order
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VarManager {
    next_var: u32,
}

impl VarManager {
    /// Allocates a fresh variable
    pub fn new_var(&mut self) -> Var {
        let var = Var::new(self.next_var);
        self.next_var += 1;
        var
    }

    /// Allocates a fresh variable and returns its positive literal
    pub fn new_lit(&mut self) -> Lit {
        self.new_var().pos_lit()
    }

    /// The largest variable handed out so far
    #[must_use]
    pub fn max_var(&self) -> Option<Var> {
        self.next_var.checked_sub(1).map(Var::new)
    }

    /// The number of variables handed out so far
    #[must_use]
    pub fn n_used(&self) -> u32 {
        self.next_var
    }
}

#[cfg(test)]
mod tests {
    use super::{TernaryVal, Var, VarManager};

    #[test]
    fn lit_polarity() {
        let l = lit![3];
        assert!(l.is_pos());
        assert!((!l).is_neg());
        assert_eq!(!!l, l);
        assert_eq!(l.var(), var![3]);
        assert_eq!((!l).vidx(), 3);
        assert_eq!(Var::new(3).neg_lit(), !l);
        assert_eq!(format!("{}", !l), "~x3");
    }

    #[test]
    fn ternary_not() {
        assert_eq!(!TernaryVal::True, TernaryVal::False);
        assert_eq!(!TernaryVal::DontCare, TernaryVal::DontCare);
    }

    #[test]
    fn var_manager() {
        let mut vm = VarManager::default();
        assert_eq!(vm.max_var(), None);
        assert_eq!(vm.new_var(), var![0]);
        assert_eq!(vm.new_lit(), lit![1]);
        assert_eq!(vm.max_var(), Some(var![1]));
        assert_eq!(vm.n_used(), 2);
        assert_eq!(clause![lit![0], !lit![1]].len(), 2);
    }
}
