//! # Incremental CSP Session
//!
//! [`CspSolver`] accepts [`Expr`]essions over finite-domain integer variables, compiles them
//! to CNF and drives an incremental SAT solver. Integer variables use the order encoding,
//! linear comparisons over several variables become pseudo-Boolean constraints over the order
//! literals encoded with the generalized totalizer.
//!
//! The session is append-only. Expressions are queued by [`CspSolver::add_expr`] and compiled
//! on [`CspSolver::commit`]; assumptions added with [`CspSolver::add_assumption`] only hold for
//! the next [`CspSolver::solve`] call.
//!
//! ## Example Usage
//!
//! ```
//! # use coptool::{csp::{CspSolver, Expr, Outcome}, model::Comparator, solvers::batsat};
//! let mut csp = CspSolver::new(batsat::Solver::default()).unwrap();
//! csp.add_expr(Expr::int_range("x", 0, 5));
//! csp.add_expr(Expr::int_range("y", 0, 5));
//! csp.add_expr(Expr::linear(
//!     vec![(1, "x".to_string()), (1, "y".to_string())],
//!     Comparator::Eq,
//!     7,
//! ));
//! csp.add_assumption("x", Comparator::Le, 2).unwrap();
//! let Outcome::Sat(sol) = csp.solve(None).unwrap() else { panic!() };
//! assert_eq!(sol.get("x"), Some(2));
//! assert_eq!(sol.get("y"), Some(5));
//! ```

use std::{collections::BTreeMap, fmt, time::Duration};

use anyhow::Context;
use log::debug;
use thiserror::Error;

use crate::{
    encodings::{
        self,
        order::{eq_atom, Atom, OrderVar},
        pb, CollectClauses,
    },
    model::Comparator,
    solvers::{SolveIncremental, SolverResult, SolverStats, Terminate},
    types::{Clause, Lit, RsHashMap, TernaryVal, VarManager},
};

pub mod expr;
pub use expr::Expr;

/// Errors from compiling expressions
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// An expression references a variable that was never declared
    #[error("undeclared variable `{0}`")]
    UndeclaredVariable(String),
    /// A variable is declared twice with different domains
    #[error("variable `{0}` redeclared with a different domain")]
    Redeclared(String),
    /// A declaration without values
    #[error("variable `{0}` has an empty domain")]
    EmptyDomain(String),
    /// An expression form the compiler does not support in that position
    #[error("unsupported expression: {0}")]
    Unsupported(String),
    /// An encoding failure
    #[error(transparent)]
    Encoding(#[from] encodings::Error),
}

/// Values of all integer variables in a model of the session
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Solution {
    values: BTreeMap<String, i64>,
}

impl Solution {
    /// The value of a variable
    #[must_use]
    pub fn get(&self, name: &str) -> Option<i64> {
        self.values.get(name).copied()
    }

    /// Iterates over all variables in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.values.iter().map(|(n, &v)| (n.as_str(), v))
    }

    /// The number of variables
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Checks whether the solution is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl FromIterator<(String, i64)> for Solution {
    fn from_iter<T: IntoIterator<Item = (String, i64)>>(iter: T) -> Self {
        Solution {
            values: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for Solution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, val) in &self.values {
            writeln!(f, "{name} = {val}")?;
        }
        Ok(())
    }
}

/// The outcome of one solve call
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Satisfiable, with the decoded solution
    Sat(Solution),
    /// Unsatisfiable under the assumptions
    Unsat,
    /// Stopped before a verdict
    Interrupted,
}

impl Outcome {
    /// The bare solver result
    #[must_use]
    pub fn result(&self) -> SolverResult {
        match self {
            Outcome::Sat(_) => SolverResult::Sat,
            Outcome::Unsat => SolverResult::Unsat,
            Outcome::Interrupted => SolverResult::Interrupted,
        }
    }
}

/// An incremental CSP session over a SAT solver
pub struct CspSolver<S> {
    sat: S,
    var_manager: VarManager,
    int_vars: RsHashMap<String, OrderVar>,
    eq_atoms: RsHashMap<(String, i64), Atom>,
    pending: Vec<Expr>,
    assumptions: Vec<Lit>,
    true_lit: Lit,
    trivially_unsat: bool,
    n_exprs: usize,
    undo: Undo,
}

/// Entries added by the commit in progress, removed again if it fails
#[derive(Default)]
struct Undo {
    int_vars: Vec<String>,
    eq_atoms: Vec<(String, i64)>,
}

impl<S> CspSolver<S>
where
    S: SolveIncremental + Terminate,
{
    /// Creates a session on top of `sat`
    ///
    /// # Errors
    ///
    /// If the SAT solver rejects the first clause.
    pub fn new(mut sat: S) -> anyhow::Result<Self> {
        let mut var_manager = VarManager::default();
        let true_lit = var_manager.new_lit();
        sat.add_unit(true_lit)?;
        Ok(CspSolver {
            sat,
            var_manager,
            int_vars: RsHashMap::default(),
            eq_atoms: RsHashMap::default(),
            pending: vec![],
            assumptions: vec![],
            true_lit,
            trivially_unsat: false,
            n_exprs: 0,
            undo: Undo::default(),
        })
    }

    /// Queues an expression
    pub fn add_expr(&mut self, expr: Expr) {
        self.pending.push(expr);
    }

    /// Queues several expressions
    pub fn add_exprs<I: IntoIterator<Item = Expr>>(&mut self, exprs: I) {
        self.pending.extend(exprs);
    }

    /// Compiles all queued expressions into the SAT solver
    ///
    /// If one of them fails to compile, none of the queued expressions take effect and the
    /// queue is emptied.
    ///
    /// # Errors
    ///
    /// A [`enum@Error`] for an expression that cannot be compiled, or a solver error.
    pub fn commit(&mut self) -> anyhow::Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let pending = std::mem::take(&mut self.pending);
        let mut cnf: Vec<Clause> = vec![];
        self.undo = Undo::default();
        for expr in &pending {
            if let Err(err) = self.compile(expr, &mut cnf) {
                self.rollback();
                return Err(err).with_context(|| format!("failed to compile `{expr}`"));
            }
        }
        self.undo = Undo::default();
        self.n_exprs += pending.len();
        debug!(
            "compiled {} expressions into {} clauses, {} variables in use",
            pending.len(),
            cnf.len(),
            self.var_manager.n_used()
        );
        self.flush(cnf)
    }

    /// Adds an assumption `var op value` for the next solve call
    ///
    /// # Errors
    ///
    /// [`Error::UndeclaredVariable`], or a failure to commit queued expressions.
    pub fn add_assumption(&mut self, var: &str, op: Comparator, value: i64) -> anyhow::Result<()> {
        self.commit()?;
        let ovar = self
            .int_vars
            .get(var)
            .ok_or_else(|| Error::UndeclaredVariable(var.to_string()))?;
        let atoms = match op {
            Comparator::Le => vec![ovar.le(value)],
            Comparator::Lt => vec![ovar.le(value - 1)],
            Comparator::Ge => vec![ovar.ge(value)],
            Comparator::Gt => vec![ovar.ge(value + 1)],
            Comparator::Eq => vec![ovar.le(value), ovar.ge(value)],
        };
        for atom in atoms {
            match atom {
                Atom::True => (),
                Atom::False => self.assumptions.push(!self.true_lit),
                Atom::Lit(l) => self.assumptions.push(l),
            }
        }
        Ok(())
    }

    /// Solves under the current assumptions, which are cleared afterwards
    ///
    /// # Errors
    ///
    /// A failure to commit queued expressions or a solver error.
    pub fn solve(&mut self, timeout: Option<Duration>) -> anyhow::Result<Outcome> {
        self.commit()?;
        let assumps = std::mem::take(&mut self.assumptions);
        if self.trivially_unsat {
            return Ok(Outcome::Unsat);
        }
        self.sat.set_timeout(timeout);
        let res = self.sat.solve_assumps(&assumps);
        self.sat.set_deadline(None);
        match res? {
            SolverResult::Sat => Ok(Outcome::Sat(self.decode()?)),
            SolverResult::Unsat => Ok(Outcome::Unsat),
            SolverResult::Interrupted => Ok(Outcome::Interrupted),
        }
    }

    /// Checks whether an integer variable is declared and compiled
    #[must_use]
    pub fn is_declared(&self, name: &str) -> bool {
        self.int_vars.contains_key(name)
    }

    /// The number of compiled expressions
    #[must_use]
    pub fn n_exprs(&self) -> usize {
        self.n_exprs
    }

    /// Statistics of the underlying SAT solver
    #[must_use]
    pub fn sat_stats(&self) -> SolverStats {
        self.sat.stats()
    }

    fn decode(&self) -> anyhow::Result<Solution> {
        let mut values = BTreeMap::new();
        for (name, ovar) in &self.int_vars {
            let mut err = None;
            let val = ovar.decode(|l| match self.sat.lit_val(l) {
                Ok(v) => v == TernaryVal::True,
                Err(e) => {
                    err = Some(e);
                    false
                }
            });
            if let Some(e) = err {
                return Err(e);
            }
            values.insert(name.clone(), val);
        }
        Ok(Solution { values })
    }

    /// Forgets the variables and value atoms of a failed commit
    fn rollback(&mut self) {
        let undo = std::mem::take(&mut self.undo);
        for name in &undo.int_vars {
            self.int_vars.remove(name);
        }
        for key in &undo.eq_atoms {
            self.eq_atoms.remove(key);
        }
    }

    fn flush(&mut self, cnf: Vec<Clause>) -> anyhow::Result<()> {
        for clause in cnf {
            if clause.is_empty() {
                self.trivially_unsat = true;
                continue;
            }
            self.sat.add_clause(clause)?;
        }
        Ok(())
    }

    fn int_var(&self, name: &str) -> Result<&OrderVar, Error> {
        self.int_vars
            .get(name)
            .ok_or_else(|| Error::UndeclaredVariable(name.to_string()))
    }

    fn compile(&mut self, expr: &Expr, cnf: &mut Vec<Clause>) -> Result<(), Error> {
        match expr {
            Expr::Int { name, domain } => self.declare(name, domain, cnf),
            Expr::AllDifferent(vars) => self.all_different(vars, cnf),
            Expr::Labeled { expr, .. } => self.compile(expr, cnf),
            _ => self.formula(expr, true, cnf),
        }
    }

    fn declare(&mut self, name: &str, domain: &[i64], cnf: &mut Vec<Clause>) -> Result<(), Error> {
        let mut values = domain.to_vec();
        values.sort_unstable();
        values.dedup();
        if values.is_empty() {
            return Err(Error::EmptyDomain(name.to_string()));
        }
        if let Some(existing) = self.int_vars.get(name) {
            if existing.values() != values.as_slice() {
                return Err(Error::Redeclared(name.to_string()));
            }
            return Ok(());
        }
        let ovar = OrderVar::encode(&values, cnf, &mut self.var_manager);
        self.int_vars.insert(name.to_string(), ovar);
        self.undo.int_vars.push(name.to_string());
        Ok(())
    }

    /// At most one variable takes each value
    fn all_different(&mut self, vars: &[String], cnf: &mut Vec<Clause>) -> Result<(), Error> {
        let mut by_value: BTreeMap<i64, Vec<Atom>> = BTreeMap::new();
        for name in vars {
            let values = self.int_var(name)?.values().to_vec();
            for val in values {
                let atom = self.eq(name, val, cnf)?;
                by_value.entry(val).or_default().push(atom);
            }
        }
        for atoms in by_value.values() {
            for (idx, &a) in atoms.iter().enumerate() {
                for &b in &atoms[idx + 1..] {
                    add_clause(cnf, [!a, !b]);
                }
            }
        }
        Ok(())
    }

    fn eq(&mut self, name: &str, value: i64, cnf: &mut Vec<Clause>) -> Result<Atom, Error> {
        let key = (name.to_string(), value);
        if let Some(&atom) = self.eq_atoms.get(&key) {
            return Ok(atom);
        }
        let ovar = self
            .int_vars
            .get(name)
            .ok_or_else(|| Error::UndeclaredVariable(name.to_string()))?;
        let atom = eq_atom(ovar, value, cnf, &mut self.var_manager);
        self.undo.eq_atoms.push(key.clone());
        self.eq_atoms.insert(key, atom);
        Ok(atom)
    }

    /// Adds `expr` (or its negation if `!pos`) as a top-level constraint
    fn formula(&mut self, expr: &Expr, pos: bool, cnf: &mut Vec<Clause>) -> Result<(), Error> {
        match (expr, pos) {
            (Expr::Labeled { expr, .. }, _) => self.formula(expr, pos, cnf),
            (Expr::Not(e), _) => self.formula(e, !pos, cnf),
            (Expr::And(es), true) | (Expr::Or(es), false) => {
                for e in es {
                    self.formula(e, pos, cnf)?;
                }
                Ok(())
            }
            (Expr::Imp(a, b), false) => {
                self.formula(a, true, cnf)?;
                self.formula(b, false, cnf)
            }
            (Expr::Or(_) | Expr::And(_) | Expr::Imp(..), _) => {
                let mut atoms = vec![];
                self.disjuncts(expr, pos, &mut atoms, cnf)?;
                add_clause(cnf, atoms);
                Ok(())
            }
            (Expr::Linear { terms, op, rhs }, _) => {
                let terms = merge_terms(terms);
                if terms.len() <= 1 {
                    let atom = self.atom(&terms, *op, *rhs, pos, cnf)?;
                    add_clause(cnf, [atom]);
                    return Ok(());
                }
                let op = if pos {
                    *op
                } else {
                    negate(*op).ok_or_else(|| Error::Unsupported(expr.to_string()))?
                };
                self.linear(&terms, op, *rhs, cnf)
            }
            (Expr::Int { .. } | Expr::AllDifferent(_), _) => {
                Err(Error::Unsupported(expr.to_string()))
            }
        }
    }

    /// Collects atoms whose disjunction is implied by `expr` (or its negation)
    fn disjuncts(
        &mut self,
        expr: &Expr,
        pos: bool,
        out: &mut Vec<Atom>,
        cnf: &mut Vec<Clause>,
    ) -> Result<(), Error> {
        match (expr, pos) {
            (Expr::Labeled { expr, .. }, _) => self.disjuncts(expr, pos, out, cnf),
            (Expr::Not(e), _) => self.disjuncts(e, !pos, out, cnf),
            (Expr::Or(es), true) | (Expr::And(es), false) => {
                for e in es {
                    self.disjuncts(e, pos, out, cnf)?;
                }
                Ok(())
            }
            (Expr::Imp(a, b), true) => {
                self.disjuncts(a, false, out, cnf)?;
                self.disjuncts(b, true, out, cnf)
            }
            _ => {
                let atom = self.lit_of(expr, pos, cnf)?;
                out.push(atom);
                Ok(())
            }
        }
    }

    /// Collects atoms whose conjunction is implied by `expr` (or its negation)
    fn conjuncts(
        &mut self,
        expr: &Expr,
        pos: bool,
        out: &mut Vec<Atom>,
        cnf: &mut Vec<Clause>,
    ) -> Result<(), Error> {
        match (expr, pos) {
            (Expr::Labeled { expr, .. }, _) => self.conjuncts(expr, pos, out, cnf),
            (Expr::Not(e), _) => self.conjuncts(e, !pos, out, cnf),
            (Expr::And(es), true) | (Expr::Or(es), false) => {
                for e in es {
                    self.conjuncts(e, pos, out, cnf)?;
                }
                Ok(())
            }
            (Expr::Imp(a, b), false) => {
                self.conjuncts(a, true, out, cnf)?;
                self.conjuncts(b, false, out, cnf)
            }
            _ => {
                let atom = self.lit_of(expr, pos, cnf)?;
                out.push(atom);
                Ok(())
            }
        }
    }

    /// An atom implying `expr` (or its negation), defining fresh literals for nested
    /// connectives
    fn lit_of(&mut self, expr: &Expr, pos: bool, cnf: &mut Vec<Clause>) -> Result<Atom, Error> {
        match (expr, pos) {
            (Expr::Labeled { expr, .. }, _) => self.lit_of(expr, pos, cnf),
            (Expr::Not(e), _) => self.lit_of(e, !pos, cnf),
            (Expr::Linear { terms, op, rhs }, _) => {
                let terms = merge_terms(terms);
                if terms.len() > 1 {
                    return Err(Error::Unsupported(format!("nested {expr}")));
                }
                self.atom(&terms, *op, *rhs, pos, cnf)
            }
            (Expr::And(_), true) | (Expr::Or(_), false) | (Expr::Imp(..), false) => {
                let mut atoms = vec![];
                self.conjuncts(expr, pos, &mut atoms, cnf)?;
                if atoms.contains(&Atom::False) {
                    return Ok(Atom::False);
                }
                atoms.retain(|&a| a != Atom::True);
                match atoms.len() {
                    0 => Ok(Atom::True),
                    1 => Ok(atoms[0]),
                    _ => {
                        let t = self.var_manager.new_lit();
                        for a in atoms {
                            add_clause(cnf, [Atom::Lit(!t), a]);
                        }
                        Ok(Atom::Lit(t))
                    }
                }
            }
            (Expr::Or(_) | Expr::And(_) | Expr::Imp(..), _) => {
                let mut atoms = vec![];
                self.disjuncts(expr, pos, &mut atoms, cnf)?;
                if atoms.contains(&Atom::True) {
                    return Ok(Atom::True);
                }
                atoms.retain(|&a| a != Atom::False);
                match atoms.len() {
                    0 => Ok(Atom::False),
                    1 => Ok(atoms[0]),
                    _ => {
                        let t = self.var_manager.new_lit();
                        let mut clause = vec![Atom::Lit(!t)];
                        clause.extend(atoms);
                        add_clause(cnf, clause);
                        Ok(Atom::Lit(t))
                    }
                }
            }
            (Expr::Int { .. } | Expr::AllDifferent(_), _) => {
                Err(Error::Unsupported(format!("nested {expr}")))
            }
        }
    }

    /// The atom for `coeff·var op rhs` with at most one term
    fn atom(
        &mut self,
        terms: &[(i64, String)],
        op: Comparator,
        rhs: i64,
        pos: bool,
        cnf: &mut Vec<Clause>,
    ) -> Result<Atom, Error> {
        let atom = match terms {
            [] => {
                if op.holds(0, rhs) {
                    Atom::True
                } else {
                    Atom::False
                }
            }
            [(coeff, name)] => {
                let coeff = *coeff;
                // bring into the form `coeff·x ≤ rhs` or `coeff·x = rhs`
                let (coeff, rhs) = match op {
                    Comparator::Le | Comparator::Eq => (coeff, rhs),
                    Comparator::Lt => (coeff, rhs - 1),
                    Comparator::Ge => (-coeff, -rhs),
                    Comparator::Gt => (-coeff, -rhs - 1),
                };
                if op == Comparator::Eq {
                    if rhs % coeff == 0 {
                        self.eq(name, rhs / coeff, cnf)?
                    } else {
                        Atom::False
                    }
                } else {
                    let var = self.int_var(name)?;
                    if coeff > 0 {
                        var.le(div_floor(rhs, coeff))
                    } else {
                        var.ge(div_ceil(rhs, coeff))
                    }
                }
            }
            _ => return Err(Error::Unsupported("multi-term atom".to_string())),
        };
        Ok(if pos { atom } else { !atom })
    }

    /// Encodes `Σ coeff·var op rhs` over the order literals
    fn linear(
        &mut self,
        terms: &[(i64, String)],
        op: Comparator,
        rhs: i64,
        cnf: &mut Vec<Clause>,
    ) -> Result<(), Error> {
        let mut offset = 0_i64;
        let mut lits: Vec<(Lit, i64)> = vec![];
        for (coeff, name) in terms {
            let (lb, weighted) = self.int_var(name)?.weighted_lits();
            offset += coeff * lb;
            lits.extend(weighted.into_iter().map(|(l, w)| (l, coeff * w)));
        }
        let rhs = rhs - offset;
        let vm = &mut self.var_manager;
        match op {
            Comparator::Le => pb::encode_ub_constr(lits, rhs, cnf, vm)?,
            Comparator::Lt => pb::encode_ub_constr(lits, rhs - 1, cnf, vm)?,
            Comparator::Ge => pb::encode_lb_constr(lits, rhs, cnf, vm)?,
            Comparator::Gt => pb::encode_lb_constr(lits, rhs + 1, cnf, vm)?,
            Comparator::Eq => {
                pb::encode_ub_constr(lits.iter().copied(), rhs, cnf, vm)?;
                pb::encode_lb_constr(lits, rhs, cnf, vm)?;
            }
        }
        Ok(())
    }
}

/// Merges terms over the same variable and drops zero coefficients
fn merge_terms(terms: &[(i64, String)]) -> Vec<(i64, String)> {
    let mut merged: Vec<(i64, String)> = Vec::with_capacity(terms.len());
    for (coeff, name) in terms {
        match merged.iter_mut().find(|(_, n)| n == name) {
            Some((c, _)) => *c += coeff,
            None => merged.push((*coeff, name.clone())),
        }
    }
    merged.retain(|(c, _)| *c != 0);
    merged
}

fn negate(op: Comparator) -> Option<Comparator> {
    match op {
        Comparator::Le => Some(Comparator::Gt),
        Comparator::Lt => Some(Comparator::Ge),
        Comparator::Ge => Some(Comparator::Lt),
        Comparator::Gt => Some(Comparator::Le),
        Comparator::Eq => None,
    }
}

/// Adds the disjunction of `atoms`, skipping tautologies
fn add_clause<I: IntoIterator<Item = Atom>>(cnf: &mut Vec<Clause>, atoms: I) {
    let mut clause = vec![];
    for atom in atoms {
        match atom {
            Atom::True => return,
            Atom::False => (),
            Atom::Lit(l) => clause.push(l),
        }
    }
    cnf.add_clause(clause);
}

fn div_floor(a: i64, b: i64) -> i64 {
    let q = a / b;
    if (a % b != 0) && ((a < 0) != (b < 0)) {
        q - 1
    } else {
        q
    }
}

fn div_ceil(a: i64, b: i64) -> i64 {
    let q = a / b;
    if (a % b != 0) && ((a < 0) == (b < 0)) {
        q + 1
    } else {
        q
    }
}
