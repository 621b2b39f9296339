use coptool::{
    methods::{LinearMethod, Method, MethodOptions, MethodState},
    model::{Comparator, Constraint, Domain, LinearConstraint, Model, PseudoBooleanConstraint},
};
use proptest::prelude::*;

fn comparator() -> impl Strategy<Value = Comparator> {
    prop_oneof![
        Just(Comparator::Eq),
        Just(Comparator::Le),
        Just(Comparator::Lt),
        Just(Comparator::Ge),
        Just(Comparator::Gt),
    ]
}

/// Two variables with domains `lb..=lb+3` and a soft linear constraint over them
fn linear_model(lbs: (i64, i64), coeffs: (i64, i64), op: Comparator, rhs: i64) -> Model {
    let mut model = Model::new();
    let x = model
        .new_variable("x", Domain::range(lbs.0..=lbs.0 + 3).unwrap())
        .unwrap();
    let y = model
        .new_variable("y", Domain::range(lbs.1..=lbs.1 + 3).unwrap())
        .unwrap();
    model
        .add_constraint(
            LinearConstraint::builder("lin")
                .weight(2)
                .term(coeffs.0, &x)
                .term(coeffs.1, &y)
                .comparator(op)
                .rhs(rhs)
                .build()
                .unwrap(),
        )
        .unwrap();
    model
        .add_constraint(
            PseudoBooleanConstraint::builder("pb")
                .weight(1)
                .term(2, &x, lbs.0 + 1)
                .term(-1, &y, lbs.1)
                .comparator(op)
                .rhs(rhs.signum())
                .build()
                .unwrap(),
        )
        .unwrap();
    model
}

fn brute_force_min(model: &Model) -> i64 {
    let x = model.variable("x").unwrap().domain();
    let y = model.variable("y").unwrap().domain();
    x.iter()
        .flat_map(move |vx| y.iter().map(move |vy| (vx, vy)))
        .filter_map(|(vx, vy)| {
            model
                .score(|name| match name {
                    "x" => Some(vx),
                    "y" => Some(vy),
                    _ => None,
                })
                .ok()
        })
        .map(|(soft, _)| soft)
        .min()
        .unwrap()
}

proptest! {
    #[test]
    fn violation_within_bound(
        lbs in (-3i64..=3, -3i64..=3),
        coeffs in (-4i64..=4, -4i64..=4),
        op in comparator(),
        rhs in -20i64..=20,
        offsets in (0i64..=3, 0i64..=3),
    ) {
        let model = linear_model(lbs, coeffs, op, rhs);
        let (vx, vy) = (lbs.0 + offsets.0, lbs.1 + offsets.1);
        for cons in model.constraints() {
            let amount = cons
                .violation(|name| match name {
                    "x" => Some(vx),
                    "y" => Some(vy),
                    _ => None,
                })
                .unwrap();
            prop_assert!(amount >= 0);
            prop_assert!(amount <= cons.penalty_upper_bound().unwrap());
        }
    }

    #[test]
    fn satisfied_iff_no_violation(
        coeffs in (-4i64..=4, -4i64..=4),
        op in comparator(),
        rhs in -10i64..=10,
        vals in (0i64..=3, 0i64..=3),
    ) {
        let model = linear_model((0, 0), coeffs, op, rhs);
        let Some(Constraint::Linear(lin)) = model.constraint("lin") else {
            panic!("missing linear constraint");
        };
        let lhs = coeffs.0 * vals.0 + coeffs.1 * vals.1;
        let amount = model
            .constraint("lin")
            .unwrap()
            .violation(|name| if name == "x" { Some(vals.0) } else { Some(vals.1) })
            .unwrap();
        prop_assert_eq!(amount == 0, lin.comparator().holds(lhs, rhs));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn linear_method_finds_minimum(
        lbs in (-2i64..=2, -2i64..=2),
        coeffs in (-3i64..=3, -3i64..=3),
        op in comparator(),
        rhs in -12i64..=12,
    ) {
        let model = linear_model(lbs, coeffs, op, rhs);
        let best = brute_force_min(&model);
        let mut method = LinearMethod::new(model, MethodOptions::default()).unwrap();
        let report = method.run().unwrap();
        prop_assert_eq!(report.status, MethodState::Optimal);
        prop_assert_eq!(report.objective, Some(best));
    }
}
