//! # Binary Search on the Objective Bound
//!
//! Keeps the optimum inside the interval `(lb, ub]`, starting from `lb = -1` and the first
//! found objective value as `ub`, and halves the interval with every solve call. Satisfiable
//! midpoints tighten `ub` to the found value, unsatisfiable ones raise `lb` to the midpoint.
//! Both bounds are added permanently.

use log::info;

use crate::{
    csp::Outcome,
    model::{Comparator, Model},
    solvers::{batsat, SolveIncremental, Terminate},
    translate::sat::OBJECTIVE,
};

use super::{value_of, Method, MethodOptions, MethodState, Report, Session};

/// Bisection on the weighted objective
pub struct BinaryMethod<S = batsat::Solver> {
    session: Session<S>,
}

impl BinaryMethod<batsat::Solver> {
    /// Creates the method on the default SAT backend
    ///
    /// # Errors
    ///
    /// If the model has a constraint without SAT translation or the solver session cannot be
    /// set up.
    pub fn new(model: Model, opts: MethodOptions) -> anyhow::Result<Self> {
        Self::with_solver(model, opts, batsat::Solver::default())
    }
}

impl<S> BinaryMethod<S>
where
    S: SolveIncremental + Terminate,
{
    /// Creates the method on a given SAT backend
    ///
    /// # Errors
    ///
    /// If the model has a constraint without SAT translation or the solver session cannot be
    /// set up.
    pub fn with_solver(model: Model, opts: MethodOptions, sat: S) -> anyhow::Result<Self> {
        Ok(BinaryMethod {
            session: Session::new(model, opts, sat)?,
        })
    }
}

impl<S> Method for BinaryMethod<S>
where
    S: SolveIncremental + Terminate,
{
    fn name(&self) -> &'static str {
        "binary"
    }

    fn state(&self) -> MethodState {
        self.session.state()
    }

    fn formulate(&mut self) -> anyhow::Result<()> {
        self.session.expect_state(MethodState::Init)?;
        self.session.add_variables()?;
        self.session.add_constraints(|_| true)?;
        if self.session.has_objective() {
            self.session.add_objective()?;
        }
        self.session.set_state(MethodState::Formulated);
        Ok(())
    }

    fn encode(&mut self) -> anyhow::Result<()> {
        self.session.encode()
    }

    fn search(&mut self) -> anyhow::Result<()> {
        self.session.begin_search()?;
        let Some(sol) = self.session.initial_solve()? else {
            return Ok(());
        };
        if !self.session.has_objective() {
            self.session.record(sol);
            self.session.finish(MethodState::Optimal);
            return Ok(());
        }
        let mut ub = value_of(&sol, OBJECTIVE)?;
        let mut lb = -1;
        info!("found {OBJECTIVE} = {ub}");
        self.session.record(sol);
        while ub - lb > 1 {
            let mid = lb + (ub - lb) / 2;
            info!("searching {OBJECTIVE} <= {mid} within ({lb}, {ub}]");
            self.session.assume(OBJECTIVE, Comparator::Le, mid)?;
            match self.session.invoke()? {
                Outcome::Sat(sol) => {
                    ub = value_of(&sol, OBJECTIVE)?;
                    info!("found {OBJECTIVE} = {ub}");
                    self.session.bind(OBJECTIVE, Comparator::Le, ub);
                    self.session.record(sol);
                }
                Outcome::Unsat => {
                    lb = mid;
                    self.session.bind(OBJECTIVE, Comparator::Gt, lb);
                }
                Outcome::Interrupted => {
                    self.session.finish(MethodState::Timeout);
                    return Ok(());
                }
            }
        }
        info!("{OBJECTIVE} = {ub} is optimal");
        self.session.finish(MethodState::Optimal);
        Ok(())
    }

    fn report(&self) -> Report {
        self.session.report(self.name())
    }
}
