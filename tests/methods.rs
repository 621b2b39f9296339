use std::{collections::BTreeMap, time::Duration};

use coptool::{
    methods::{
        BinaryMethod, HybridMethod, IncrementalMethod, LinearMethod, LocalSearchMethod, Method,
        MethodOptions, MethodState, TwoStepMethod,
    },
    model::{
        AllDifferentConstraint, Comparator, ConflictPointConstraint, Domain, LinearConstraint,
        Model, PseudoBooleanConstraint,
    },
    translate,
};

/// Three variables over `0..=2` with hard constraints and soft constraints of weights 4, 2
/// and 1 that pull in different directions
fn mixed_model() -> Model {
    let mut model = Model::new();
    let a = model.new_variable("a", Domain::range(0..=2).unwrap()).unwrap();
    let b = model.new_variable("b", Domain::range(0..=2).unwrap()).unwrap();
    let c = model.new_variable("c", Domain::range(0..=2).unwrap()).unwrap();
    model
        .add_constraint(
            LinearConstraint::builder("enough")
                .term(1, &a)
                .term(1, &b)
                .term(1, &c)
                .comparator(Comparator::Ge)
                .rhs(3)
                .build()
                .unwrap(),
        )
        .unwrap();
    model
        .add_constraint(
            ConflictPointConstraint::builder("not_both_two")
                .term(&a, 2, true)
                .term(&b, 2, true)
                .build()
                .unwrap(),
        )
        .unwrap();
    model
        .add_constraint(
            LinearConstraint::builder("a_below_c")
                .weight(4)
                .term(1, &a)
                .term(-1, &c)
                .comparator(Comparator::Lt)
                .rhs(0)
                .build()
                .unwrap(),
        )
        .unwrap();
    model
        .add_constraint(
            PseudoBooleanConstraint::builder("some_zero")
                .weight(4)
                .term(1, &b, 0)
                .term(1, &c, 0)
                .comparator(Comparator::Ge)
                .rhs(1)
                .build()
                .unwrap(),
        )
        .unwrap();
    model
        .add_constraint(
            LinearConstraint::builder("small_bc")
                .weight(2)
                .term(1, &b)
                .term(1, &c)
                .comparator(Comparator::Le)
                .rhs(1)
                .build()
                .unwrap(),
        )
        .unwrap();
    model
        .add_constraint(
            LinearConstraint::builder("a_is_two")
                .weight(1)
                .term(1, &a)
                .comparator(Comparator::Eq)
                .rhs(2)
                .build()
                .unwrap(),
        )
        .unwrap();
    model
        .add_constraint(
            ConflictPointConstraint::builder("c_two_needs_a")
                .weight(1)
                .term(&c, 2, true)
                .term(&a, 0, true)
                .build()
                .unwrap(),
        )
        .unwrap();
    model
}

/// Tier totals, heaviest first, of every hard-feasible assignment
fn brute_force(model: &Model) -> Vec<Vec<(i64, i64)>> {
    let vars = model.variables();
    let mut results = vec![];
    let mut idx = vec![0; vars.len()];
    loop {
        let assignment: BTreeMap<&str, i64> = vars
            .iter()
            .zip(&idx)
            .map(|(v, &i)| (v.name(), v.domain().values()[i]))
            .collect();
        let violations = model
            .evaluate(|name| assignment.get(name).copied())
            .unwrap();
        if violations.iter().all(|v| v.weight >= 0 || v.amount == 0) {
            let mut tiers: BTreeMap<i64, i64> = BTreeMap::new();
            for viol in violations.iter().filter(|v| v.weight >= 0) {
                *tiers.entry(viol.weight).or_default() += viol.amount;
            }
            results.push(tiers.into_iter().rev().collect());
        }
        // next assignment
        let mut pos = 0;
        loop {
            if pos == vars.len() {
                return results;
            }
            idx[pos] += 1;
            if idx[pos] < vars[pos].domain().size() {
                break;
            }
            idx[pos] = 0;
            pos += 1;
        }
    }
}

fn weighted(tiers: &[(i64, i64)]) -> i64 {
    tiers.iter().map(|(w, t)| w * t).sum()
}

fn totals(tiers: &[(i64, i64)]) -> Vec<i64> {
    tiers.iter().map(|&(_, t)| t).collect()
}

#[test]
fn weighted_sum_methods_agree() {
    let best = brute_force(&mixed_model())
        .iter()
        .map(|tiers| weighted(tiers))
        .min()
        .unwrap();

    let mut linear = LinearMethod::new(mixed_model(), MethodOptions::default()).unwrap();
    let linear = linear.run().unwrap();
    assert_eq!(linear.status, MethodState::Optimal);
    assert_eq!(linear.objective, Some(best));
    assert_eq!(linear.hard_violations, 0);

    let mut binary = BinaryMethod::new(mixed_model(), MethodOptions::default()).unwrap();
    let binary = binary.run().unwrap();
    assert_eq!(binary.status, MethodState::Optimal);
    assert_eq!(binary.objective, Some(best));
    assert_eq!(binary.hard_violations, 0);
}

#[test]
fn incremental_is_lexicographic() {
    let best = brute_force(&mixed_model())
        .iter()
        .map(|tiers| totals(tiers))
        .min()
        .unwrap();

    let mut method = IncrementalMethod::new(mixed_model(), MethodOptions::default()).unwrap();
    let report = method.run().unwrap();
    assert_eq!(report.status, MethodState::Optimal);
    assert_eq!(report.hard_violations, 0);
    assert_eq!(totals(&report.tiers), best);
    assert_eq!(
        report.tiers.iter().map(|&(w, _)| w).collect::<Vec<_>>(),
        vec![4, 2, 1]
    );
}

#[test]
fn two_step_bounds_heaviest_tier() {
    let all = brute_force(&mixed_model());
    let heavy = all.iter().map(|tiers| tiers[0].1).min().unwrap();
    let light = all
        .iter()
        .filter(|tiers| tiers[0].1 == heavy)
        .map(|tiers| weighted(&tiers[1..]))
        .min()
        .unwrap();

    let mut method = TwoStepMethod::new(mixed_model(), MethodOptions::default()).unwrap();
    let report = method.run().unwrap();
    assert_eq!(report.status, MethodState::Optimal);
    assert_eq!(report.tiers[0].1, heavy);
    assert_eq!(weighted(&report.tiers[1..]), light);

    let mut method = TwoStepMethod::first_step(mixed_model(), MethodOptions::default()).unwrap();
    let report = method.run().unwrap();
    assert_eq!(report.status, MethodState::Optimal);
    assert_eq!(report.tiers[0].1, heavy);
    assert_eq!(report.hard_violations, 0);
}

#[test]
fn lexicographic_never_worse_on_heaviest_tier() {
    let mut linear = LinearMethod::new(mixed_model(), MethodOptions::default()).unwrap();
    let linear = linear.run().unwrap();
    let mut incremental = IncrementalMethod::new(mixed_model(), MethodOptions::default()).unwrap();
    let incremental = incremental.run().unwrap();
    assert!(incremental.tiers[0].1 <= linear.tiers[0].1);
    assert!(incremental.objective >= linear.objective);
}

#[test]
fn infeasible_everywhere() {
    let infeasible = || {
        let mut model = mixed_model();
        let a = model.variable("a").unwrap().clone();
        model
            .add_constraint(
                LinearConstraint::builder("too_much")
                    .term(1, &a)
                    .comparator(Comparator::Gt)
                    .rhs(2)
                    .build()
                    .unwrap(),
            )
            .unwrap();
        model
    };
    let opts = MethodOptions::default();
    let mut methods: Vec<Box<dyn Method>> = vec![
        Box::new(LinearMethod::new(infeasible(), opts.clone()).unwrap()),
        Box::new(BinaryMethod::new(infeasible(), opts.clone()).unwrap()),
        Box::new(TwoStepMethod::new(infeasible(), opts.clone()).unwrap()),
        Box::new(TwoStepMethod::first_step(infeasible(), opts.clone()).unwrap()),
        Box::new(IncrementalMethod::new(infeasible(), opts).unwrap()),
    ];
    for method in &mut methods {
        let report = method.run().unwrap();
        assert_eq!(report.status, MethodState::Infeasible, "{}", report.method);
        assert_eq!(report.objective, None);
        assert!(report.assignment.is_empty());
    }
}

#[test]
fn hard_all_different() {
    let mut model = mixed_model();
    let vars = model.variables().to_vec();
    model
        .add_constraint(
            AllDifferentConstraint::builder("distinct")
                .variables(&vars)
                .build()
                .unwrap(),
        )
        .unwrap();
    let opts = MethodOptions::default();
    let mut methods: Vec<Box<dyn Method>> = vec![
        Box::new(LinearMethod::new(model.clone(), opts.clone()).unwrap()),
        Box::new(BinaryMethod::new(model.clone(), opts.clone()).unwrap()),
        Box::new(TwoStepMethod::new(model.clone(), opts.clone()).unwrap()),
        Box::new(IncrementalMethod::new(model.clone(), opts).unwrap()),
    ];
    for method in &mut methods {
        let report = method.run().unwrap();
        assert_eq!(report.status, MethodState::Optimal, "{}", report.method);
        assert_eq!(report.hard_violations, 0, "{}", report.method);
        let mut values: Vec<i64> = report.assignment.iter().map(|&(_, v)| v).collect();
        values.sort_unstable();
        assert_eq!(values, vec![0, 1, 2], "{}", report.method);
    }
}

#[test]
fn soft_all_different_is_rejected() {
    let mut model = mixed_model();
    let vars = model.variables().to_vec();
    model
        .add_constraint(
            AllDifferentConstraint::builder("distinct")
                .weight(3)
                .variables(&vars)
                .build()
                .unwrap(),
        )
        .unwrap();
    let opts = MethodOptions::default();
    let unsupported = |res: anyhow::Result<()>| {
        let err = res.unwrap_err();
        assert_eq!(
            err.downcast_ref::<translate::Error>(),
            Some(&translate::Error::Unsupported(
                "distinct".to_string(),
                "soft all-different"
            ))
        );
    };
    unsupported(LinearMethod::new(model.clone(), opts.clone()).map(|_| ()));
    unsupported(BinaryMethod::new(model.clone(), opts.clone()).map(|_| ()));
    unsupported(TwoStepMethod::new(model.clone(), opts.clone()).map(|_| ()));
    unsupported(TwoStepMethod::first_step(model.clone(), opts.clone()).map(|_| ()));
    unsupported(IncrementalMethod::new(model.clone(), opts.clone()).map(|_| ()));
    unsupported(HybridMethod::new(model.clone(), opts.clone()).map(|_| ()));
    // the weighted-linear encoding supports it natively
    let mut method = LocalSearchMethod::new(model, opts);
    method.formulate().unwrap();
    assert_eq!(method.state(), MethodState::Formulated);
}

#[test]
fn spent_time_limit() {
    let opts = MethodOptions {
        time_limit: Some(Duration::ZERO),
        ..Default::default()
    };
    let mut method = LinearMethod::new(mixed_model(), opts).unwrap();
    let report = method.run().unwrap();
    assert_eq!(report.status, MethodState::Timeout);
    assert_eq!(report.n_solves, 0);
    assert_eq!(report.objective, None);
}

#[test]
fn steps_cannot_repeat() {
    let mut method = IncrementalMethod::new(mixed_model(), MethodOptions::default()).unwrap();
    method.run().unwrap();
    assert!(method.formulate().is_err());
    assert!(method.search().is_err());
}
