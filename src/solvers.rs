//! # Interfaces to Incremental SAT Solvers
//!
//! Traits the CSP session drives its SAT kernel through, plus the [`batsat`] backend.

use std::{fmt, time::Duration, time::Instant};

use crate::types::{Clause, Lit, TernaryVal};

pub mod batsat;

/// Return value of a solver call
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SolverResult {
    /// The query is satisfiable
    Sat,
    /// The query is unsatisfiable
    Unsat,
    /// The call stopped before a verdict, e.g. on timeout
    Interrupted,
}

impl fmt::Display for SolverResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolverResult::Sat => write!(f, "SAT"),
            SolverResult::Unsat => write!(f, "UNSAT"),
            SolverResult::Interrupted => write!(f, "INTERRUPTED"),
        }
    }
}

/// States a solver can be in
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SolverState {
    /// Clauses are being added
    #[default]
    Input,
    /// The last call found a model
    Sat,
    /// The last call proved unsatisfiability
    Unsat,
}

/// Statistics of a solver
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct SolverStats {
    /// Calls that returned [`SolverResult::Sat`]
    pub n_sat: usize,
    /// Calls that returned [`SolverResult::Unsat`]
    pub n_unsat: usize,
    /// Calls that returned [`SolverResult::Interrupted`]
    pub n_terminated: usize,
    /// The number of clauses added
    pub n_clauses: usize,
    /// The number of variables in the solver
    pub n_vars: u32,
    /// Average clause length
    pub avg_clause_len: f32,
    /// CPU time spent solving
    pub cpu_solve_time: Duration,
}

impl SolverStats {
    /// The number of solver calls
    #[must_use]
    pub fn n_solves(&self) -> usize {
        self.n_sat + self.n_unsat + self.n_terminated
    }
}

/// Basic SAT solver interface
pub trait Solve {
    /// Gets a signature of the solver implementation
    #[must_use]
    fn signature(&self) -> &'static str;

    /// Adds a clause to the solver
    ///
    /// # Errors
    ///
    /// If the backend rejects the clause.
    fn add_clause(&mut self, clause: Clause) -> anyhow::Result<()>;

    /// Gets the value of a literal in the last model
    ///
    /// # Errors
    ///
    /// If the solver is not in the [`SolverState::Sat`] state.
    fn lit_val(&self, lit: Lit) -> anyhow::Result<TernaryVal>;

    /// Gets the state of the solver
    fn state(&self) -> SolverState;

    /// Gets statistics of the solver
    fn stats(&self) -> SolverStats;

    /// Adds a unit clause
    ///
    /// # Errors
    ///
    /// If the backend rejects the clause.
    fn add_unit(&mut self, lit: Lit) -> anyhow::Result<()> {
        self.add_clause(vec![lit])
    }
}

/// Solvers that can be called repeatedly under assumptions
pub trait SolveIncremental: Solve {
    /// Solves under assumptions, which only hold for this one call
    ///
    /// # Errors
    ///
    /// If the backend fails.
    fn solve_assumps(&mut self, assumps: &[Lit]) -> anyhow::Result<SolverResult>;

    /// Solves without assumptions
    ///
    /// # Errors
    ///
    /// If the backend fails.
    fn solve(&mut self) -> anyhow::Result<SolverResult> {
        self.solve_assumps(&[])
    }
}

/// Solvers whose calls can be stopped at a wall-clock deadline
pub trait Terminate {
    /// Sets the deadline for the following calls, `None` removes it
    fn set_deadline(&mut self, deadline: Option<Instant>);

    /// Sets the deadline `timeout` from now
    fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.set_deadline(timeout.map(|t| Instant::now() + t));
    }
}
