//! # Incremental Lexicographic Optimization
//!
//! Processes the soft constraints tier by tier in order of descending weight. Each tier is
//! added to the live session with its penalty sum `_P%03d`, which is minimized by linear
//! descent and then fixed with an equality before the next, lighter, tier is added.

use log::{info, warn};

use crate::{
    csp::Outcome,
    model::{Comparator, Model},
    solvers::{batsat, SolveIncremental, Terminate},
};

use super::{value_of, Descent, Method, MethodOptions, MethodState, Report, Session};

/// Assumptions for the first solve call of the heaviest tier
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WarmStart {
    /// Values the model variables are pinned to
    pub pins: Vec<(String, i64)>,
    /// Upper bound on the penalty sum of the heaviest tier
    pub heavy_bound: i64,
}

/// Tier-by-tier lexicographic optimization
pub struct IncrementalMethod<S = batsat::Solver> {
    session: Session<S>,
    timed_out: bool,
}

impl IncrementalMethod<batsat::Solver> {
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

impl<S> IncrementalMethod<S>
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
        Ok(IncrementalMethod {
            session: Session::new(model, opts, sat)?,
            timed_out: false,
        })
    }

    pub(crate) fn session(&self) -> &Session<S> {
        &self.session
    }

    pub(crate) fn session_mut(&mut self) -> &mut Session<S> {
        &mut self.session
    }

    /// The tier loop. The warm start, if any, only applies to the first solve call.
    pub(crate) fn optimize_tiers(&mut self, mut warm: Option<WarmStart>) -> anyhow::Result<()> {
        let weights: Vec<i64> = self
            .session
            .model()
            .tiers()
            .iter()
            .map(|(w, _)| *w)
            .collect();
        if weights.is_empty() {
            if let Some(sol) = self.session.initial_solve()? {
                self.session.record(sol);
                self.session.finish(MethodState::Optimal);
            }
            return Ok(());
        }
        for (idx, &weight) in weights.iter().enumerate() {
            let n_cons = self
                .session
                .add_constraints(|c| c.is_soft() && c.weight() == weight)?;
            info!(
                "tier {}/{}: {n_cons} constraints of weight {weight}",
                idx + 1,
                weights.len()
            );
            let obj = format!("_P{weight:03}");
            self.session.add_tier_aggregate(&obj, weight)?;
            let outcome = match warm.take() {
                Some(warm) => self.warm_solve(&obj, &warm)?,
                None => self.session.invoke()?,
            };
            let sol = match outcome {
                Outcome::Sat(sol) => sol,
                Outcome::Unsat if idx == 0 => {
                    info!("no feasible solution");
                    self.session.finish(MethodState::Infeasible);
                    return Ok(());
                }
                Outcome::Unsat => {
                    anyhow::bail!("tier of weight {weight} is unsatisfiable under the bounds of heavier tiers")
                }
                Outcome::Interrupted => {
                    info!("timeout before a solution of tier {weight}");
                    self.session.finish(MethodState::Timeout);
                    return Ok(());
                }
            };
            let first = value_of(&sol, &obj)?;
            info!("found {obj} = {first}");
            self.session.record(sol);
            let descent = self.session.descend(&obj, first)?;
            if let Descent::Interrupted(_) = descent {
                self.timed_out = true;
            }
            self.session.bind(&obj, Comparator::Eq, descent.value());
        }
        let state = if self.timed_out {
            MethodState::Timeout
        } else {
            MethodState::Optimal
        };
        self.session.finish(state);
        Ok(())
    }

    fn warm_solve(&mut self, obj: &str, warm: &WarmStart) -> anyhow::Result<Outcome> {
        info!(
            "warm start with {} pinned variables and {obj} <= {}",
            warm.pins.len(),
            warm.heavy_bound
        );
        for (var, val) in &warm.pins {
            self.session.assume(var, Comparator::Eq, *val)?;
        }
        self.session.assume(obj, Comparator::Le, warm.heavy_bound)?;
        match self.session.invoke()? {
            Outcome::Unsat => {
                warn!("warm start is infeasible, solving without it");
                self.session.invoke()
            }
            outcome => Ok(outcome),
        }
    }
}

impl<S> Method for IncrementalMethod<S>
where
    S: SolveIncremental + Terminate,
{
    fn name(&self) -> &'static str {
        "incremental"
    }

    fn state(&self) -> MethodState {
        self.session.state()
    }

    fn formulate(&mut self) -> anyhow::Result<()> {
        self.session.expect_state(MethodState::Init)?;
        self.session.add_variables()?;
        let n_hard = self.session.add_constraints(|c| c.is_hard())?;
        info!("{n_hard} hard constraints");
        self.session.set_state(MethodState::Formulated);
        Ok(())
    }

    fn encode(&mut self) -> anyhow::Result<()> {
        self.session.encode()
    }

    fn search(&mut self) -> anyhow::Result<()> {
        self.session.begin_search()?;
        self.optimize_tiers(None)
    }

    fn report(&self) -> Report {
        self.session.report(self.name())
    }
}
