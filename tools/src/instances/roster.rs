//! # Random Nurse Rostering Instances
//!
//! Staff members are assigned one shift or a day off (value 0) per day of the horizon.
//!
//! Hard constraints:
//! - `C02`: forbidden shift successions on consecutive days
//! - `C03`: maximum number of assignments per staff member and shift
//! - `C05`: maximum number of consecutive working days
//! - `C06`: minimum number of consecutive working days
//! - `C09`: fixed days off
//!
//! Soft constraints:
//! - `C11`/`C12`: shift on and off requests
//! - `C13`/`C14`: under and over cover with respect to the preferred number of staff

use std::ops::RangeInclusive;

use anyhow::Context;
use coptool::model::{
    Comparator, ConflictPointConstraint, Domain, Model, PseudoBooleanConstraint, Variable,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Parameters of the random generator
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RosterParams {
    /// The number of staff members
    pub n_staff: usize,
    /// The number of days in the horizon
    pub n_days: usize,
    /// The number of shift types, excluding the day off
    pub n_shifts: usize,
    /// Maximum number of consecutive working days
    pub max_consecutive: usize,
    /// Minimum number of consecutive working days
    pub min_consecutive: usize,
    /// The range of weights of requests
    pub request_weight: RangeInclusive<i64>,
    /// The weight of a missing staff member
    pub under_cover_weight: i64,
    /// The weight of a surplus staff member
    pub over_cover_weight: i64,
}

impl Default for RosterParams {
    fn default() -> Self {
        RosterParams {
            n_staff: 4,
            n_days: 7,
            n_shifts: 2,
            max_consecutive: 4,
            min_consecutive: 2,
            request_weight: 1..=3,
            under_cover_weight: 100,
            over_cover_weight: 1,
        }
    }
}

/// A request to work (or not work) a shift on a day
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Request {
    pub staff: usize,
    pub day: usize,
    pub shift: usize,
    pub weight: i64,
}

/// A generated rostering instance. Shifts are numbered from 1, 0 is the day off.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Roster {
    pub params: RosterParams,
    /// `forbidden[t]` holds the shifts that may not follow shift `t` on the next day
    pub forbidden: Vec<Vec<usize>>,
    /// `max_shifts[i][t]` caps how often staff member `i` works shift `t`
    pub max_shifts: Vec<Vec<usize>>,
    /// Fixed days off per staff member
    pub days_off: Vec<Vec<usize>>,
    pub on_requests: Vec<Request>,
    pub off_requests: Vec<Request>,
    /// `cover[d][t]` is the preferred number of staff on shift `t` of day `d`
    pub cover: Vec<Vec<i64>>,
}

impl Roster {
    /// Generates an instance from a seed
    ///
    /// # Errors
    ///
    /// If the parameters describe an empty instance.
    pub fn random(params: RosterParams, seed: u64) -> anyhow::Result<Self> {
        anyhow::ensure!(
            params.n_staff > 0 && params.n_days > 0 && params.n_shifts > 0,
            "a roster needs staff, days and shifts"
        );
        anyhow::ensure!(
            params.min_consecutive <= params.max_consecutive,
            "minimum consecutive working days exceed the maximum"
        );
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let n_shifts = params.n_shifts;
        let forbidden = (0..=n_shifts)
            .map(|t| {
                if t == 0 {
                    return vec![];
                }
                // a later shift may not be followed by an earlier one
                (1..t).filter(|_| rng.random_bool(0.5)).collect()
            })
            .collect();
        let max_shifts = (0..params.n_staff)
            .map(|_| {
                (0..=n_shifts)
                    .map(|t| {
                        if t == 0 {
                            params.n_days
                        } else {
                            rng.random_range(params.n_days / 2..=params.n_days)
                        }
                    })
                    .collect()
            })
            .collect();
        let days_off = (0..params.n_staff)
            .map(|_| vec![rng.random_range(0..params.n_days)])
            .collect();
        let mut on_requests = vec![];
        let mut off_requests = vec![];
        for staff in 0..params.n_staff {
            for day in 0..params.n_days {
                if !rng.random_bool(0.2) {
                    continue;
                }
                let req = Request {
                    staff,
                    day,
                    shift: rng.random_range(1..=n_shifts),
                    weight: rng.random_range(params.request_weight.clone()),
                };
                if rng.random_bool(0.5) {
                    on_requests.push(req);
                } else {
                    off_requests.push(req);
                }
            }
        }
        let max_cover = i64::try_from(params.n_staff / n_shifts)
            .context("too many staff members")?
            .max(1);
        let cover = (0..params.n_days)
            .map(|_| {
                (0..=n_shifts)
                    .map(|t| if t == 0 { 0 } else { rng.random_range(0..=max_cover) })
                    .collect()
            })
            .collect();
        Ok(Roster {
            params,
            forbidden,
            max_shifts,
            days_off,
            on_requests,
            off_requests,
            cover,
        })
    }

    /// The name of the assignment variable of staff member `staff` on day `day`
    #[must_use]
    pub fn variable_name(staff: usize, day: usize) -> String {
        format!("x_i{staff:02}_d{day:02}")
    }

    /// Builds the model
    ///
    /// # Errors
    ///
    /// If the model cannot be built.
    pub fn model(&self) -> anyhow::Result<Model> {
        let p = &self.params;
        let mut model = Model::new();
        let n_shifts = i64::try_from(p.n_shifts).context("too many shifts")?;
        let mut x: Vec<Vec<Variable>> = Vec::with_capacity(p.n_staff);
        for i in 0..p.n_staff {
            let mut row = Vec::with_capacity(p.n_days);
            for d in 0..p.n_days {
                let domain = Domain::range(0..=n_shifts)?;
                row.push(model.new_variable(Self::variable_name(i, d), domain)?);
            }
            x.push(row);
        }

        for (i, row) in x.iter().enumerate() {
            // C02
            for d in 0..p.n_days.saturating_sub(1) {
                for (t1, nexts) in self.forbidden.iter().enumerate() {
                    for &t2 in nexts {
                        model.add_constraint(
                            ConflictPointConstraint::builder(format!(
                                "C02_i{i:02}_d{d:02}_t{t1:02}_r{t2:02}"
                            ))
                            .term(&row[d], shift_value(t1)?, true)
                            .term(&row[d + 1], shift_value(t2)?, true)
                            .build()?,
                        )?;
                    }
                }
            }
            // C03
            for t in 1..=p.n_shifts {
                let max = self.max_shifts[i][t];
                if max >= p.n_days {
                    continue;
                }
                let mut builder = PseudoBooleanConstraint::builder(format!("C03_i{i:02}_t{t:02}"))
                    .comparator(Comparator::Le)
                    .rhs(i64::try_from(max)?);
                for var in row {
                    builder.add_term(1, var, shift_value(t)?);
                }
                model.add_constraint(builder.build()?)?;
            }
            // C05: every window of max + 1 days holds a day off
            let window = p.max_consecutive + 1;
            for d in 0..(p.n_days + 1).saturating_sub(window) {
                let mut builder = ConflictPointConstraint::builder(format!("C05_i{i:02}_d{d:02}"));
                for var in &row[d..d + window] {
                    builder.add_term(var, 0, false);
                }
                model.add_constraint(builder.build()?)?;
            }
            // C06: no working stretch of s days between two days off, for s below the minimum
            for s in 1..p.min_consecutive {
                for d in 0..p.n_days.saturating_sub(s + 1) {
                    let mut builder =
                        ConflictPointConstraint::builder(format!("C06_i{i:02}_s{s:02}_d{d:02}"))
                            .term(&row[d], 0, true);
                    for var in &row[d + 1..=d + s] {
                        builder.add_term(var, 0, false);
                    }
                    builder.add_term(&row[d + s + 1], 0, true);
                    model.add_constraint(builder.build()?)?;
                }
            }
            // C09
            for &d in &self.days_off[i] {
                model.add_constraint(
                    ConflictPointConstraint::builder(format!("C09_i{i:02}_d{d:02}"))
                        .term(&row[d], 0, false)
                        .build()?,
                )?;
            }
        }

        for req in &self.on_requests {
            let name = format!("C11_i{:02}_d{:02}_t{:02}", req.staff, req.day, req.shift);
            model.add_constraint(
                ConflictPointConstraint::builder(name)
                    .weight(req.weight)
                    .term(&x[req.staff][req.day], shift_value(req.shift)?, false)
                    .build()?,
            )?;
        }
        for req in &self.off_requests {
            let name = format!("C12_i{:02}_d{:02}_t{:02}", req.staff, req.day, req.shift);
            model.add_constraint(
                ConflictPointConstraint::builder(name)
                    .weight(req.weight)
                    .term(&x[req.staff][req.day], shift_value(req.shift)?, true)
                    .build()?,
            )?;
        }

        for (d, cover) in self.cover.iter().enumerate() {
            for t in 1..=p.n_shifts {
                for (prefix, op, weight) in [
                    ("C13", Comparator::Ge, p.under_cover_weight),
                    ("C14", Comparator::Le, p.over_cover_weight),
                ] {
                    if weight == 0 {
                        continue;
                    }
                    let mut builder =
                        PseudoBooleanConstraint::builder(format!("{prefix}_d{d:02}_t{t:02}"))
                            .weight(weight)
                            .comparator(op)
                            .rhs(cover[t]);
                    for row in &x {
                        builder.add_term(1, &row[d], shift_value(t)?);
                    }
                    model.add_constraint(builder.build()?)?;
                }
            }
        }
        Ok(model)
    }
}

fn shift_value(shift: usize) -> anyhow::Result<i64> {
    i64::try_from(shift).context("shift index out of range")
}

#[cfg(test)]
mod tests {
    use super::{Roster, RosterParams};

    #[test]
    fn deterministic() {
        let a = Roster::random(RosterParams::default(), 42).unwrap();
        let b = Roster::random(RosterParams::default(), 42).unwrap();
        assert_eq!(a, b);
        assert_eq!(
            a.model().unwrap().constraints().len(),
            b.model().unwrap().constraints().len()
        );
    }

    #[test]
    fn structure() {
        let roster = Roster::random(RosterParams::default(), 7).unwrap();
        let model = roster.model().unwrap();
        assert_eq!(model.variables().len(), 4 * 7);
        assert!(model.variable(&Roster::variable_name(3, 6)).is_some());
        // one C05 window per staff member for 7 days and at most 4 consecutive days
        let c05 = model
            .constraints()
            .iter()
            .filter(|c| c.name().starts_with("C05"))
            .count();
        assert_eq!(c05, 4 * 3);
        assert!(model.tiers().iter().any(|(w, _)| *w == 100));
        assert!(model.hard_constraints().all(|c| c.name().starts_with("C0")));
    }

    #[test]
    fn day_off_everywhere_is_hard_feasible() {
        let params = RosterParams {
            min_consecutive: 1,
            ..Default::default()
        };
        let roster = Roster::random(params, 3).unwrap();
        let model = roster.model().unwrap();
        let (_, hard) = model.score(|_| Some(0)).unwrap();
        assert_eq!(hard, 0);
    }

    #[test]
    fn empty_parameters() {
        let params = RosterParams {
            n_staff: 0,
            ..Default::default()
        };
        assert!(Roster::random(params, 0).is_err());
    }
}
