//! # Hybrid Method
//!
//! Runs the external local-search solver on the whole model first and uses its answer as a
//! warm start for the incremental method: the first solve call of the heaviest tier assumes
//! the local-search assignment and its heaviest-tier violation as a bound. If the local
//! search leaves hard constraints violated, the search starts cold.

use anyhow::Context;
use log::{info, warn};

use crate::{
    model::Model,
    scop::{fio::SolverLog, LocalSearchOptions, LocalSearchSolver},
    solvers::{batsat, SolveIncremental, Terminate},
    translate::ScopTranslator,
};

use super::{
    incremental::{IncrementalMethod, WarmStart},
    Method, MethodOptions, MethodState, Report,
};

/// The incremental method seeded by local search
pub struct HybridMethod<S = batsat::Solver> {
    inner: IncrementalMethod<S>,
}

impl HybridMethod<batsat::Solver> {
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

impl<S> HybridMethod<S>
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
        Ok(HybridMethod {
            inner: IncrementalMethod::with_solver(model, opts, sat)?,
        })
    }

    fn local_search(&self) -> anyhow::Result<SolverLog> {
        let session = self.inner.session();
        let opts = LocalSearchOptions {
            timeout: session.options().warm_start_timeout(),
            ..session.options().local_search.clone()
        };
        let inst = ScopTranslator::new().translate_model(session.model())?;
        info!(
            "running local search for {} s on {} variables and {} constraints",
            opts.timeout,
            inst.variables().len(),
            inst.constraints().len()
        );
        let result = LocalSearchSolver::new(opts)?.solve(&inst)?;
        info!(
            "local search ended with penalty {}/{}",
            result.log.hard_penalty, result.log.soft_penalty
        );
        Ok(result.log)
    }
}

/// Derives the warm start from a local-search log: the solution values of the model
/// variables and the total violation of the heaviest tier. `None` if the log violates hard
/// constraints or the model has no soft constraints.
///
/// # Errors
///
/// If a solution value is not an integer.
pub fn warm_start(model: &Model, log: &SolverLog) -> anyhow::Result<Option<WarmStart>> {
    if log.hard_penalty > 0 {
        warn!(
            "local search violates hard constraints (penalty {}), starting cold",
            log.hard_penalty
        );
        return Ok(None);
    }
    let Some(&(heavy, _)) = model.tiers().first() else {
        return Ok(None);
    };
    let heavy_bound = log
        .violated
        .iter()
        .filter(|(name, _)| {
            model
                .constraint(name)
                .is_some_and(|c| c.is_soft() && c.weight() == heavy)
        })
        .map(|(_, amount)| amount)
        .sum();
    let mut pins = vec![];
    for var in model.variables() {
        let Some(label) = log.solution.get(var.name()) else {
            continue;
        };
        let value = label
            .parse::<i64>()
            .with_context(|| format!("invalid value `{label}` of `{}`", var.name()))?;
        pins.push((var.name().to_string(), value));
    }
    Ok(Some(WarmStart { pins, heavy_bound }))
}

impl<S> Method for HybridMethod<S>
where
    S: SolveIncremental + Terminate,
{
    fn name(&self) -> &'static str {
        "hybrid"
    }

    fn state(&self) -> MethodState {
        self.inner.state()
    }

    fn formulate(&mut self) -> anyhow::Result<()> {
        self.inner.formulate()
    }

    fn encode(&mut self) -> anyhow::Result<()> {
        self.inner.encode()
    }

    fn search(&mut self) -> anyhow::Result<()> {
        self.inner.session_mut().begin_search()?;
        let log = self.local_search()?;
        let warm = warm_start(self.inner.session().model(), &log)?;
        self.inner.optimize_tiers(warm)
    }

    fn report(&self) -> Report {
        self.inner.session().report(self.name())
    }
}
