//! # Linear Descent
//!
//! Finds any solution, then repeatedly asks for an objective value one below the best so
//! far. Every improvement is bound permanently, so the first unsatisfiable step proves
//! optimality.

use crate::{
    model::Model,
    solvers::{batsat, SolveIncremental, Terminate},
    translate::sat::OBJECTIVE,
};

use super::{value_of, Descent, Method, MethodOptions, MethodState, Report, Session};

/// Linear descent on the weighted objective
pub struct LinearMethod<S = batsat::Solver> {
    session: Session<S>,
}

impl LinearMethod<batsat::Solver> {
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

impl<S> LinearMethod<S>
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
        Ok(LinearMethod {
            session: Session::new(model, opts, sat)?,
        })
    }
}

impl<S> Method for LinearMethod<S>
where
    S: SolveIncremental + Terminate,
{
    fn name(&self) -> &'static str {
        "linear"
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
        let best = value_of(&sol, OBJECTIVE)?;
        self.session.record(sol);
        let state = match self.session.descend(OBJECTIVE, best)? {
            Descent::Optimal(_) => MethodState::Optimal,
            Descent::Interrupted(_) => MethodState::Timeout,
        };
        self.session.finish(state);
        Ok(())
    }

    fn report(&self) -> Report {
        self.session.report(self.name())
    }
}
