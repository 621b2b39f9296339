//! # Optimization Methods
//!
//! Strategies that drive an incremental [`CspSolver`] to an optimal assignment of a
//! [`Model`]. Every method runs the same pipeline, see [`Method::run`]:
//! [`formulate`](Method::formulate) queues declarations and constraints,
//! [`encode`](Method::encode) compiles them, [`search`](Method::search) runs the
//! strategy-specific loop and [`report`](Method::report) summarizes the best assignment.
//!
//! The solver session is append-only. Bounds that should survive a solve call are added as
//! constraints, everything else goes through assumptions that only hold for one call.
//!
//! ## Example Usage
//!
//! ```
//! # use coptool::{
//! #     methods::{LinearMethod, Method, MethodOptions, MethodState},
//! #     model::{Comparator, Domain, LinearConstraint, Model},
//! # };
//! let mut model = Model::new();
//! let x = model.new_variable("x", Domain::range(0..=4).unwrap()).unwrap();
//! model
//!     .add_constraint(
//!         LinearConstraint::builder("big")
//!             .weight(2)
//!             .term(1, &x)
//!             .comparator(Comparator::Ge)
//!             .rhs(3)
//!             .build()
//!             .unwrap(),
//!     )
//!     .unwrap();
//! let mut method = LinearMethod::new(model, MethodOptions::default()).unwrap();
//! let report = method.run().unwrap();
//! assert_eq!(report.status, MethodState::Optimal);
//! assert_eq!(report.objective, Some(0));
//! ```

use std::{
    collections::BTreeMap,
    env, fmt,
    time::{Duration, Instant},
};

use anyhow::Context;
use log::{debug, info, warn};

use crate::{
    csp::{CspSolver, Expr, Outcome, Solution},
    model::{Comparator, Constraint, Model, Violation},
    scop::LocalSearchOptions,
    solvers::{SolveIncremental, SolverStats, Terminate},
    translate::{
        sat::{check_supported, sum_definition},
        SatTranslator,
    },
};

pub mod binary;
pub mod hybrid;
pub mod incremental;
pub mod linear;
pub mod local_search;
pub mod two_step;

pub use binary::BinaryMethod;
pub use hybrid::HybridMethod;
pub use incremental::IncrementalMethod;
pub use linear::LinearMethod;
pub use local_search::LocalSearchMethod;
pub use two_step::TwoStepMethod;

/// The environment variable holding the local-search time budget of the hybrid method
pub const SCOP_TIMEOUT_VAR: &str = "SCOP_TIMEOUT";

/// The local-search time budget in seconds if [`SCOP_TIMEOUT_VAR`] is not set
pub const DEFAULT_SCOP_TIMEOUT: u32 = 60;

/// The life cycle of a method
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MethodState {
    /// Nothing done yet
    Init,
    /// Declarations and constraints are queued
    Formulated,
    /// Queued expressions are compiled
    Encoded,
    /// The search is running
    Searching,
    /// The best assignment is proven optimal
    Optimal,
    /// An assignment without optimality proof was found
    Feasible,
    /// No assignment satisfies the hard constraints
    Infeasible,
    /// A time limit stopped the search
    Timeout,
}

impl MethodState {
    /// Checks whether the method has finished
    #[must_use]
    pub fn is_final(self) -> bool {
        matches!(
            self,
            MethodState::Optimal
                | MethodState::Feasible
                | MethodState::Infeasible
                | MethodState::Timeout
        )
    }
}

impl fmt::Display for MethodState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MethodState::Init => write!(f, "INIT"),
            MethodState::Formulated => write!(f, "FORMULATED"),
            MethodState::Encoded => write!(f, "ENCODED"),
            MethodState::Searching => write!(f, "SEARCHING"),
            MethodState::Optimal => write!(f, "OPTIMAL"),
            MethodState::Feasible => write!(f, "FEASIBLE"),
            MethodState::Infeasible => write!(f, "INFEASIBLE"),
            MethodState::Timeout => write!(f, "TIMEOUT"),
        }
    }
}

/// Options shared by all methods
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MethodOptions {
    /// Time limit of a single solve call
    pub call_timeout: Option<Duration>,
    /// Time limit of the whole search
    pub time_limit: Option<Duration>,
    /// Options of the local-search solver
    pub local_search: LocalSearchOptions,
}

impl MethodOptions {
    /// The local-search time budget for the hybrid warm start in seconds: the configured
    /// timeout, otherwise [`SCOP_TIMEOUT_VAR`], otherwise [`DEFAULT_SCOP_TIMEOUT`]
    #[must_use]
    pub fn warm_start_timeout(&self) -> u32 {
        if self.local_search.timeout > 0 {
            return self.local_search.timeout;
        }
        match env::var(SCOP_TIMEOUT_VAR) {
            Ok(val) => val.trim().parse().unwrap_or_else(|_| {
                warn!("ignoring invalid {SCOP_TIMEOUT_VAR}={val}");
                DEFAULT_SCOP_TIMEOUT
            }),
            Err(_) => DEFAULT_SCOP_TIMEOUT,
        }
    }
}

/// Common interface of all optimization methods
pub trait Method {
    /// A short name used in logs and reports
    fn name(&self) -> &'static str;

    /// The current state
    fn state(&self) -> MethodState;

    /// Queues variable declarations, constraints and objective definitions
    ///
    /// # Errors
    ///
    /// Translation errors, or if called in the wrong state.
    fn formulate(&mut self) -> anyhow::Result<()>;

    /// Compiles the queued expressions
    ///
    /// # Errors
    ///
    /// Compilation errors, or if called in the wrong state.
    fn encode(&mut self) -> anyhow::Result<()>;

    /// Runs the search loop until the method reaches a final state
    ///
    /// # Errors
    ///
    /// Solver or process errors, or if called in the wrong state.
    fn search(&mut self) -> anyhow::Result<()>;

    /// Summarizes the best assignment found so far
    fn report(&self) -> Report;

    /// Runs the whole pipeline and returns the report
    ///
    /// # Errors
    ///
    /// The first error of any step.
    fn run(&mut self) -> anyhow::Result<Report> {
        info!("{}: formulating", self.name());
        self.formulate()?;
        info!("{}: encoding", self.name());
        self.encode()?;
        info!("{}: searching", self.name());
        self.search()?;
        let report = self.report();
        info!(
            "{}: finished with status {} and objective {:?}",
            self.name(),
            report.status,
            report.objective
        );
        Ok(report)
    }
}

/// The summary of a run, with violations recomputed from the model
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Report {
    /// The method name
    pub method: &'static str,
    /// The final state
    pub status: MethodState,
    /// Values of the model variables in the best assignment
    pub assignment: Vec<(String, i64)>,
    /// Violation of every soft constraint
    pub violations: Vec<Violation>,
    /// The number of violated hard constraints
    pub hard_violations: usize,
    /// Total violation per weight, heaviest first
    pub tiers: Vec<(i64, i64)>,
    /// The weighted sum of soft violations, `None` without an assignment
    pub objective: Option<i64>,
    /// The number of solver calls
    pub n_solves: usize,
    /// The time spent searching
    pub elapsed: Duration,
}

impl Report {
    /// Evaluates `best` against `model`
    #[must_use]
    pub fn new(
        method: &'static str,
        model: &Model,
        status: MethodState,
        best: Option<&Solution>,
        n_solves: usize,
        elapsed: Duration,
    ) -> Report {
        let mut report = Report {
            method,
            status,
            assignment: vec![],
            violations: vec![],
            hard_violations: 0,
            tiers: vec![],
            objective: None,
            n_solves,
            elapsed,
        };
        let Some(best) = best else {
            return report;
        };
        report.assignment = model
            .variables()
            .iter()
            .filter_map(|v| best.get(v.name()).map(|val| (v.name().to_string(), val)))
            .collect();
        let violations = match model.evaluate(|name| best.get(name)) {
            Ok(violations) => violations,
            Err(err) => {
                warn!("{method}: cannot evaluate the best assignment: {err}");
                return report;
            }
        };
        let mut tiers: BTreeMap<i64, i64> = BTreeMap::new();
        for viol in violations {
            if viol.weight < 0 {
                if viol.amount > 0 {
                    report.hard_violations += 1;
                }
                continue;
            }
            *tiers.entry(viol.weight).or_default() += viol.amount;
            report.violations.push(viol);
        }
        report.objective = report.violations.iter().try_fold(0_i64, |acc, v| {
            v.weight
                .checked_mul(v.amount)
                .and_then(|cost| acc.checked_add(cost))
        });
        if report.objective.is_none() {
            warn!("{method}: the weighted objective overflows");
        }
        report.tiers = tiers.into_iter().rev().collect();
        report
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "method: {}", self.method)?;
        writeln!(f, "status: {}", self.status)?;
        if self.objective.is_none() {
            return writeln!(f, "no solution found");
        }
        writeln!(f, "solution:")?;
        for (var, val) in &self.assignment {
            writeln!(f, "  {var} = {val}")?;
        }
        writeln!(f, "penalties:")?;
        for viol in &self.violations {
            writeln!(f, "  {} (w={}) = {}", viol.constraint, viol.weight, viol.amount)?;
        }
        writeln!(f, "tiers:")?;
        for (weight, total) in &self.tiers {
            writeln!(f, "  weight {weight}: {total}")?;
        }
        if self.hard_violations > 0 {
            writeln!(f, "violated hard constraints: {}", self.hard_violations)?;
        }
        if let Some(obj) = self.objective {
            writeln!(f, "objective: {obj}")?;
        }
        writeln!(f, "solve count: {}", self.n_solves)?;
        writeln!(f, "elapsed: {} ms", self.elapsed.as_millis())
    }
}

/// The outcome of a linear descent on one objective variable
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Descent {
    /// The value is proven minimal
    Optimal(i64),
    /// The best value found before a timeout
    Interrupted(i64),
}

impl Descent {
    pub(crate) fn value(self) -> i64 {
        match self {
            Descent::Optimal(val) | Descent::Interrupted(val) => val,
        }
    }
}

/// The state shared by all SAT-based methods: the model, its translator and the solver
/// session, plus bookkeeping of solve calls and the best assignment
pub(crate) struct Session<S> {
    model: Model,
    csp: CspSolver<S>,
    translator: SatTranslator,
    opts: MethodOptions,
    state: MethodState,
    n_solves: usize,
    start: Instant,
    elapsed: Option<Duration>,
    best: Option<Solution>,
}

impl<S> Session<S>
where
    S: SolveIncremental + Terminate,
{
    pub(crate) fn new(model: Model, opts: MethodOptions, sat: S) -> anyhow::Result<Self> {
        check_supported(&model)?;
        Ok(Session {
            model,
            csp: CspSolver::new(sat)?,
            translator: SatTranslator::new(),
            opts,
            state: MethodState::Init,
            n_solves: 0,
            start: Instant::now(),
            elapsed: None,
            best: None,
        })
    }

    pub(crate) fn model(&self) -> &Model {
        &self.model
    }

    pub(crate) fn options(&self) -> &MethodOptions {
        &self.opts
    }

    pub(crate) fn state(&self) -> MethodState {
        self.state
    }

    pub(crate) fn has_objective(&self) -> bool {
        self.translator.has_objective()
    }

    pub(crate) fn sat_stats(&self) -> SolverStats {
        self.csp.sat_stats()
    }

    pub(crate) fn expect_state(&self, expected: MethodState) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.state == expected,
            "expected method state {expected}, found {}",
            self.state
        );
        Ok(())
    }

    pub(crate) fn set_state(&mut self, state: MethodState) {
        debug!("method state {} -> {state}", self.state);
        self.state = state;
        if state.is_final() {
            self.elapsed = Some(self.start.elapsed());
        }
    }

    /// Queues all variables of the model
    pub(crate) fn add_variables(&mut self) -> anyhow::Result<()> {
        for var in self.model.variables() {
            let exprs = self.translator.translate_variable(var)?;
            self.csp.add_exprs(exprs.iter().cloned());
        }
        Ok(())
    }

    /// Queues the constraints of the model selected by `pred`
    pub(crate) fn add_constraints<P>(&mut self, pred: P) -> anyhow::Result<usize>
    where
        P: Fn(&Constraint) -> bool,
    {
        let mut count = 0;
        for cons in self.model.constraints().iter().filter(|c| pred(*c)) {
            let exprs = self.translator.translate_constraint(cons)?;
            self.csp.add_exprs(exprs.iter().cloned());
            count += 1;
        }
        Ok(count)
    }

    /// Defines `name` as the unweighted penalty sum of the soft constraints of one weight.
    /// The constraints must be translated already. Returns the upper bound of the sum.
    pub(crate) fn add_tier_aggregate(&mut self, name: &str, weight: i64) -> anyhow::Result<i64> {
        let (exprs, ub) = self.translator.aggregate(
            name,
            self.model
                .constraints()
                .iter()
                .filter(|c| c.is_soft() && c.weight() == weight),
        )?;
        debug!("defining {name} over the tier of weight {weight}, bounded by {ub}");
        self.csp.add_exprs(exprs);
        Ok(ub)
    }

    /// Defines `name` as `Σ w·var` over parts `(w, var, ub)`
    pub(crate) fn add_sum(&mut self, name: &str, parts: &[(i64, String, i64)]) {
        self.csp.add_exprs(sum_definition(name, parts));
    }

    /// Queues the weighted objective over all translated soft constraints
    pub(crate) fn add_objective(&mut self) -> anyhow::Result<()> {
        let exprs = self.translator.translate_objective()?;
        self.csp.add_exprs(exprs);
        Ok(())
    }

    pub(crate) fn encode(&mut self) -> anyhow::Result<()> {
        self.expect_state(MethodState::Formulated)?;
        self.csp.commit()?;
        debug!("{} expressions compiled", self.csp.n_exprs());
        self.set_state(MethodState::Encoded);
        Ok(())
    }

    pub(crate) fn begin_search(&mut self) -> anyhow::Result<()> {
        self.expect_state(MethodState::Encoded)?;
        self.start = Instant::now();
        self.set_state(MethodState::Searching);
        Ok(())
    }

    pub(crate) fn finish(&mut self, state: MethodState) {
        info!(
            "search ended with {state} after {} solve calls",
            self.n_solves
        );
        let stats = self.sat_stats();
        debug!(
            "SAT kernel: {} variables, {} clauses, {:?} solving",
            stats.n_vars, stats.n_clauses, stats.cpu_solve_time
        );
        self.set_state(state);
    }

    /// Adds the permanent constraint `var op value`
    pub(crate) fn bind(&mut self, var: &str, op: Comparator, value: i64) {
        info!("adding bound {var} {op} {value}");
        self.csp.add_expr(Expr::cmp(var, op, value));
    }

    pub(crate) fn assume(&mut self, var: &str, op: Comparator, value: i64) -> anyhow::Result<()> {
        self.csp.add_assumption(var, op, value)
    }

    /// The time limit for the next solve call, `Some(ZERO)` if the search budget is spent
    fn call_timeout(&self) -> Option<Duration> {
        let remaining = self
            .opts
            .time_limit
            .map(|limit| limit.saturating_sub(self.start.elapsed()));
        match (self.opts.call_timeout, remaining) {
            (Some(call), Some(rem)) => Some(call.min(rem)),
            (call, rem) => call.or(rem),
        }
    }

    /// One solve call under the queued assumptions
    pub(crate) fn invoke(&mut self) -> anyhow::Result<Outcome> {
        let timeout = self.call_timeout();
        if timeout == Some(Duration::ZERO) {
            info!("time limit reached");
            return Ok(Outcome::Interrupted);
        }
        self.n_solves += 1;
        debug!("solve call {} with timeout {timeout:?}", self.n_solves);
        let outcome = self.csp.solve(timeout)?;
        debug!("solve call {} returned {}", self.n_solves, outcome.result());
        Ok(outcome)
    }

    /// Solves once, moving to `Infeasible` or `Timeout` if there is no solution
    pub(crate) fn initial_solve(&mut self) -> anyhow::Result<Option<Solution>> {
        match self.invoke()? {
            Outcome::Sat(sol) => Ok(Some(sol)),
            Outcome::Unsat => {
                info!("no feasible solution");
                self.finish(MethodState::Infeasible);
                Ok(None)
            }
            Outcome::Interrupted => {
                info!("timeout before the first solution");
                self.finish(MethodState::Timeout);
                Ok(None)
            }
        }
    }

    pub(crate) fn record(&mut self, sol: Solution) {
        self.best = Some(sol);
    }

    /// Decreases `obj` from `best` one step at a time, permanently bounding it after every
    /// improvement, until a step is unsatisfiable or times out
    pub(crate) fn descend(&mut self, obj: &str, mut best: i64) -> anyhow::Result<Descent> {
        loop {
            if best <= 0 {
                return Ok(Descent::Optimal(best));
            }
            info!("searching {obj} <= {}", best - 1);
            self.assume(obj, Comparator::Le, best - 1)?;
            match self.invoke()? {
                Outcome::Sat(sol) => {
                    best = value_of(&sol, obj)?;
                    info!("found {obj} = {best}");
                    self.bind(obj, Comparator::Le, best);
                    self.record(sol);
                }
                Outcome::Unsat => {
                    info!("{obj} = {best} is optimal");
                    return Ok(Descent::Optimal(best));
                }
                Outcome::Interrupted => {
                    info!("timeout while improving {obj} = {best}");
                    return Ok(Descent::Interrupted(best));
                }
            }
        }
    }

    pub(crate) fn report(&self, method: &'static str) -> Report {
        Report::new(
            method,
            &self.model,
            self.state,
            self.best.as_ref(),
            self.n_solves,
            self.elapsed.unwrap_or_else(|| self.start.elapsed()),
        )
    }
}

/// The value of `var` in `sol`
pub(crate) fn value_of(sol: &Solution, var: &str) -> anyhow::Result<i64> {
    sol.get(var)
        .with_context(|| format!("`{var}` is missing from the solution"))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{MethodOptions, MethodState, Report, DEFAULT_SCOP_TIMEOUT};
    use crate::{
        csp::Solution,
        model::{Comparator, Domain, LinearConstraint, Model},
        scop::LocalSearchOptions,
    };

    fn model() -> Model {
        let mut model = Model::new();
        let x = model.new_variable("x", Domain::range(0..=3).unwrap()).unwrap();
        let y = model.new_variable("y", Domain::range(0..=3).unwrap()).unwrap();
        for (name, weight, rhs) in [("a", 3, 1), ("b", 1, 0), ("c", 3, 0)] {
            model
                .add_constraint(
                    LinearConstraint::builder(name)
                        .weight(weight)
                        .term(1, &x)
                        .term(1, &y)
                        .comparator(Comparator::Le)
                        .rhs(rhs)
                        .build()
                        .unwrap(),
                )
                .unwrap();
        }
        model
            .add_constraint(
                LinearConstraint::builder("h")
                    .term(1, &x)
                    .comparator(Comparator::Ge)
                    .rhs(1)
                    .build()
                    .unwrap(),
            )
            .unwrap();
        model
    }

    #[test]
    fn report_recomputes_violations() {
        let model = model();
        let sol: Solution = [("x".to_string(), 2), ("y".to_string(), 1)]
            .into_iter()
            .collect();
        let report = Report::new(
            "test",
            &model,
            MethodState::Feasible,
            Some(&sol),
            4,
            Duration::from_millis(5),
        );
        assert_eq!(
            report.assignment,
            vec![("x".to_string(), 2), ("y".to_string(), 1)]
        );
        assert_eq!(report.violations.len(), 3);
        assert_eq!(report.hard_violations, 0);
        assert_eq!(report.tiers, vec![(3, 5), (1, 3)]);
        assert_eq!(report.objective, Some(18));
        let text = format!("{report}");
        assert!(text.contains("status: FEASIBLE"));
        assert!(text.contains("  weight 3: 5"));
        assert!(text.contains("objective: 18"));
    }

    #[test]
    fn report_without_solution() {
        let report = Report::new(
            "test",
            &model(),
            MethodState::Infeasible,
            None,
            1,
            Duration::ZERO,
        );
        assert_eq!(report.objective, None);
        assert!(format!("{report}").contains("no solution found"));
    }

    #[test]
    fn hard_violations_counted() {
        let sol: Solution = [("x".to_string(), 0), ("y".to_string(), 0)]
            .into_iter()
            .collect();
        let report = Report::new(
            "test",
            &model(),
            MethodState::Feasible,
            Some(&sol),
            0,
            Duration::ZERO,
        );
        assert_eq!(report.hard_violations, 1);
        assert_eq!(report.objective, Some(0));
    }

    #[test]
    fn configured_warm_start_timeout() {
        let opts = MethodOptions {
            local_search: LocalSearchOptions {
                timeout: 5,
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(opts.warm_start_timeout(), 5);
        assert!(DEFAULT_SCOP_TIMEOUT > 0);
    }

    #[test]
    fn final_states() {
        assert!(MethodState::Optimal.is_final());
        assert!(MethodState::Timeout.is_final());
        assert!(!MethodState::Searching.is_final());
    }
}
