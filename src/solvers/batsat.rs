//! # BatSat Backend
//!
//! Interface to the [BatSat](https://github.com/c-cube/batsat) incremental SAT solver, fully
//! implemented in Rust. Per-call timeouts are realized with a termination callback that
//! BatSat polls during search.

use std::{
    cell::Cell,
    rc::Rc,
    time::{Duration, Instant},
};

use anyhow::Context;
use batsat::{intmap::AsIndex, lbool, Callbacks, SolverInterface};
use cpu_time::ProcessTime;

use super::{Solve, SolveIncremental, SolverResult, SolverState, SolverStats, Terminate};
use crate::types::{Clause, Lit, TernaryVal};

/// Callbacks stopping the search once a deadline has passed
#[derive(Default)]
pub struct DeadlineCallbacks {
    deadline: Rc<Cell<Option<Instant>>>,
}

impl Callbacks for DeadlineCallbacks {
    fn stop(&self) -> bool {
        self.deadline
            .get()
            .is_some_and(|deadline| Instant::now() >= deadline)
    }
}

/// Wrapper around a [`batsat::Solver`] with deadline support
pub struct Solver {
    internal: batsat::Solver<DeadlineCallbacks>,
    deadline: Rc<Cell<Option<Instant>>>,
    state: SolverState,
    n_sat: usize,
    n_unsat: usize,
    n_terminated: usize,
    n_clauses: usize,
    avg_clause_len: f32,
    cpu_time: Duration,
}

impl Default for Solver {
    fn default() -> Self {
        let callbacks = DeadlineCallbacks::default();
        let deadline = Rc::clone(&callbacks.deadline);
        Solver {
            internal: batsat::Solver::new(batsat::SolverOpts::default(), callbacks),
            deadline,
            state: SolverState::Input,
            n_sat: 0,
            n_unsat: 0,
            n_terminated: 0,
            n_clauses: 0,
            avg_clause_len: 0.,
            cpu_time: Duration::ZERO,
        }
    }
}

impl Solver {
    #[allow(clippy::cast_precision_loss)]
    #[inline]
    fn update_avg_clause_len(&mut self, clause: &Clause) {
        self.avg_clause_len = (self.avg_clause_len * (self.n_clauses as f32)
            + clause.len() as f32)
            / (self.n_clauses + 1) as f32;
        self.n_clauses += 1;
    }

    fn to_batsat(&mut self, lit: Lit) -> batsat::Lit {
        // BatSat variables start at 1
        batsat::Lit::new(self.internal.var_of_int(lit.vidx32() + 1), lit.is_pos())
    }

    fn solve_track_stats(&mut self, assumps: &[Lit]) -> SolverResult {
        let a = assumps
            .iter()
            .map(|&l| self.to_batsat(l))
            .collect::<Vec<_>>();

        let start = ProcessTime::now();
        let ret = match self.internal.solve_limited(&a) {
            x if x == lbool::TRUE => {
                self.n_sat += 1;
                self.state = SolverState::Sat;
                SolverResult::Sat
            }
            x if x == lbool::FALSE => {
                self.n_unsat += 1;
                self.state = SolverState::Unsat;
                SolverResult::Unsat
            }
            _ => {
                self.n_terminated += 1;
                self.state = SolverState::Input;
                SolverResult::Interrupted
            }
        };
        self.cpu_time += start.elapsed();
        ret
    }
}

impl Solve for Solver {
    fn signature(&self) -> &'static str {
        "BatSat 0.6.0"
    }

    fn add_clause(&mut self, clause: Clause) -> anyhow::Result<()> {
        self.update_avg_clause_len(&clause);
        self.state = SolverState::Input;
        let mut c: Vec<_> = clause.iter().map(|&l| self.to_batsat(l)).collect();
        // a `false` return marks the formula unsatisfiable, which the next call reports
        self.internal.add_clause_reuse(&mut c);
        Ok(())
    }

    fn lit_val(&self, lit: Lit) -> anyhow::Result<TernaryVal> {
        if self.state != SolverState::Sat {
            anyhow::bail!("no model available in state {:?}", self.state);
        }
        let idx = usize::try_from(lit.vidx32() + 1).context("variable index out of range")?;
        let l = batsat::Lit::new(batsat::Var::from_index(idx), lit.is_pos());
        match self.internal.value_lit(l) {
            x if x == lbool::TRUE => Ok(TernaryVal::True),
            x if x == lbool::FALSE => Ok(TernaryVal::False),
            _ => Ok(TernaryVal::DontCare),
        }
    }

    fn state(&self) -> SolverState {
        self.state
    }

    fn stats(&self) -> SolverStats {
        SolverStats {
            n_sat: self.n_sat,
            n_unsat: self.n_unsat,
            n_terminated: self.n_terminated,
            n_clauses: self.n_clauses,
            n_vars: self.internal.num_vars(),
            avg_clause_len: self.avg_clause_len,
            cpu_solve_time: self.cpu_time,
        }
    }
}

impl SolveIncremental for Solver {
    fn solve_assumps(&mut self, assumps: &[Lit]) -> anyhow::Result<SolverResult> {
        Ok(self.solve_track_stats(assumps))
    }
}

impl Terminate for Solver {
    fn set_deadline(&mut self, deadline: Option<Instant>) {
        self.deadline.set(deadline);
    }
}
