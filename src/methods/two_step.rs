//! # Two-Step Lexicographic Optimization
//!
//! The first step adds only the heaviest soft constraints and minimizes their penalty sum
//! `_P1`. Its best value is bound permanently before the second step adds the remaining
//! soft constraints and minimizes `_P2`, the weighted sum of the per-weight aggregates
//! `_P2_%03d`. The first-step-only variant stops after the first step.

use log::info;

use crate::{
    model::{Comparator, Model},
    solvers::{batsat, SolveIncremental, Terminate},
};

use super::{value_of, Descent, Method, MethodOptions, MethodState, Report, Session};

/// The heavy objective
pub const HEAVY_OBJECTIVE: &str = "_P1";

/// The light objective
pub const LIGHT_OBJECTIVE: &str = "_P2";

/// Lexicographic optimization of the heaviest tier followed by all other tiers
pub struct TwoStepMethod<S = batsat::Solver> {
    session: Session<S>,
    second_step: bool,
    timed_out: bool,
}

impl TwoStepMethod<batsat::Solver> {
    /// Creates the method on the default SAT backend
    ///
    /// # Errors
    ///
    /// If the model has a constraint without SAT translation or the solver session cannot be
    /// set up.
    pub fn new(model: Model, opts: MethodOptions) -> anyhow::Result<Self> {
        Self::with_solver(model, opts, batsat::Solver::default())
    }

    /// Creates the first-step-only variant on the default SAT backend
    ///
    /// # Errors
    ///
    /// If the model has a constraint without SAT translation or the solver session cannot be
    /// set up.
    pub fn first_step(model: Model, opts: MethodOptions) -> anyhow::Result<Self> {
        Self::first_step_with_solver(model, opts, batsat::Solver::default())
    }
}

impl<S> TwoStepMethod<S>
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
        Ok(TwoStepMethod {
            session: Session::new(model, opts, sat)?,
            second_step: true,
            timed_out: false,
        })
    }

    /// Creates the first-step-only variant on a given SAT backend. Only the heaviest tier
    /// is ever added to the solver.
    ///
    /// # Errors
    ///
    /// If the model has a constraint without SAT translation or the solver session cannot be
    /// set up.
    pub fn first_step_with_solver(
        model: Model,
        opts: MethodOptions,
        sat: S,
    ) -> anyhow::Result<Self> {
        let mut method = Self::with_solver(model, opts, sat)?;
        method.second_step = false;
        Ok(method)
    }

    /// Minimizes `obj` starting from a fresh solve and binds its best value. Returns `false`
    /// if the search ended.
    fn step(&mut self, obj: &str) -> anyhow::Result<bool> {
        let Some(sol) = self.session.initial_solve()? else {
            return Ok(false);
        };
        let first = value_of(&sol, obj)?;
        info!("found {obj} = {first}");
        self.session.record(sol);
        let descent = self.session.descend(obj, first)?;
        if let Descent::Interrupted(_) = descent {
            self.timed_out = true;
        }
        self.session.bind(obj, Comparator::Le, descent.value());
        Ok(true)
    }
}

impl<S> Method for TwoStepMethod<S>
where
    S: SolveIncremental + Terminate,
{
    fn name(&self) -> &'static str {
        if self.second_step {
            "two-step"
        } else {
            "first-step"
        }
    }

    fn state(&self) -> MethodState {
        self.session.state()
    }

    fn formulate(&mut self) -> anyhow::Result<()> {
        self.session.expect_state(MethodState::Init)?;
        self.session.add_variables()?;
        let n_hard = self.session.add_constraints(|c| c.is_hard())?;
        info!("{n_hard} hard constraints");
        for (weight, members) in self.session.model().tiers() {
            info!("{} soft constraints of weight {weight}", members.len());
        }
        self.session.set_state(MethodState::Formulated);
        Ok(())
    }

    fn encode(&mut self) -> anyhow::Result<()> {
        self.session.encode()
    }

    fn search(&mut self) -> anyhow::Result<()> {
        self.session.begin_search()?;
        let weights: Vec<i64> = self
            .session
            .model()
            .tiers()
            .iter()
            .map(|(w, _)| *w)
            .collect();
        let Some((&heavy, light)) = weights.split_first() else {
            if let Some(sol) = self.session.initial_solve()? {
                self.session.record(sol);
                self.session.finish(MethodState::Optimal);
            }
            return Ok(());
        };

        info!("first step: weight {heavy}");
        self.session
            .add_constraints(|c| c.is_soft() && c.weight() == heavy)?;
        self.session.add_tier_aggregate(HEAVY_OBJECTIVE, heavy)?;
        if !self.step(HEAVY_OBJECTIVE)? {
            return Ok(());
        }

        if self.second_step {
            info!("second step: weights {light:?}");
            let mut parts = vec![];
            for &weight in light {
                self.session
                    .add_constraints(|c| c.is_soft() && c.weight() == weight)?;
                let name = format!("_P2_{weight:03}");
                let ub = self.session.add_tier_aggregate(&name, weight)?;
                parts.push((weight, name, ub));
            }
            self.session.add_sum(LIGHT_OBJECTIVE, &parts);
            if !self.step(LIGHT_OBJECTIVE)? {
                return Ok(());
            }
        }

        let state = if self.timed_out {
            MethodState::Timeout
        } else {
            MethodState::Optimal
        };
        self.session.finish(state);
        Ok(())
    }

    fn report(&self) -> Report {
        self.session.report(self.name())
    }
}
