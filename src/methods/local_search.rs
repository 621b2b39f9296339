//! # Local Search Only
//!
//! Translates the whole model for the external local-search solver, runs it once and
//! reports its best assignment. Local search never proves optimality, so a run ends as
//! `Feasible`, or `Infeasible` if hard constraints remain violated.

use std::time::{Duration, Instant};

use anyhow::Context;
use log::info;

use crate::{
    csp::Solution,
    model::Model,
    scop::{LocalSearchSolver, ScopInstance},
    translate::ScopTranslator,
};

use super::{Method, MethodOptions, MethodState, Report};

/// A single run of the external local-search solver
pub struct LocalSearchMethod {
    model: Model,
    opts: MethodOptions,
    state: MethodState,
    instance: Option<ScopInstance>,
    best: Option<Solution>,
    elapsed: Duration,
}

impl LocalSearchMethod {
    /// Creates the method
    #[must_use]
    pub fn new(model: Model, opts: MethodOptions) -> Self {
        LocalSearchMethod {
            model,
            opts,
            state: MethodState::Init,
            instance: None,
            best: None,
            elapsed: Duration::ZERO,
        }
    }

    /// The translated instance, available after [`Method::formulate`]
    #[must_use]
    pub fn instance(&self) -> Option<&ScopInstance> {
        self.instance.as_ref()
    }

    fn expect_state(&self, expected: MethodState) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.state == expected,
            "expected method state {expected}, found {}",
            self.state
        );
        Ok(())
    }
}

impl Method for LocalSearchMethod {
    fn name(&self) -> &'static str {
        "local-search"
    }

    fn state(&self) -> MethodState {
        self.state
    }

    fn formulate(&mut self) -> anyhow::Result<()> {
        self.expect_state(MethodState::Init)?;
        self.instance = Some(ScopTranslator::new().translate_model(&self.model)?);
        self.state = MethodState::Formulated;
        Ok(())
    }

    fn encode(&mut self) -> anyhow::Result<()> {
        self.expect_state(MethodState::Formulated)?;
        self.state = MethodState::Encoded;
        Ok(())
    }

    fn search(&mut self) -> anyhow::Result<()> {
        self.expect_state(MethodState::Encoded)?;
        let inst = self
            .instance
            .as_ref()
            .context("local-search instance missing")?;
        self.state = MethodState::Searching;
        let start = Instant::now();
        let result = LocalSearchSolver::new(self.opts.local_search.clone())?.solve(inst)?;
        self.elapsed = start.elapsed();
        let log = result.log;
        info!(
            "local search ended with penalty {}/{} after {} iterations",
            log.hard_penalty, log.soft_penalty, log.iterations
        );
        let best = log
            .solution
            .iter()
            .map(|(var, label)| {
                let value = label
                    .parse::<i64>()
                    .with_context(|| format!("invalid value `{label}` of `{var}`"))?;
                Ok((var.clone(), value))
            })
            .collect::<anyhow::Result<Solution>>()?;
        self.best = Some(best);
        self.state = if log.hard_penalty > 0 {
            MethodState::Infeasible
        } else {
            MethodState::Feasible
        };
        Ok(())
    }

    fn report(&self) -> Report {
        let n_solves = usize::from(self.best.is_some());
        Report::new(
            self.name(),
            &self.model,
            self.state,
            self.best.as_ref(),
            n_solves,
            self.elapsed,
        )
    }
}
