//! # Translation for the Incremental CSP Session
//!
//! Every variable `X` is declared over its domain together with one indicator `_X__v` per
//! value `v` and the implications making `_X__v` true exactly when `X = v`. Soft constraints
//! get a penalty variable `_P__name` bounded by the largest possible violation, equality
//! constraints split it into a deficit part `_P1__name` and an excess part `_P2__name`.
//!
//! The objective groups the penalty variables by weight into aggregates `_P%03d` and sums
//! them weighted into `_P`.

use std::collections::BTreeMap;

use crate::{
    csp::Expr,
    model::{
        Comparator, ConflictPointConstraint, Constraint, LinearConstraint, Model,
        PseudoBooleanConstraint, Variable,
    },
    types::RsHashMap,
};

use super::Error;

/// The name of the objective variable
pub const OBJECTIVE: &str = "_P";

/// Checks that every constraint of `model` has a translation. Only hard all-different
/// constraints are supported.
///
/// # Errors
///
/// [`Error::Unsupported`] for the first soft all-different constraint.
pub fn check_supported(model: &Model) -> Result<(), Error> {
    match model
        .constraints()
        .iter()
        .find(|c| matches!(c, Constraint::AllDifferent(_)) && c.is_soft())
    {
        Some(cons) => Err(Error::Unsupported(
            cons.name().to_string(),
            "soft all-different",
        )),
        None => Ok(()),
    }
}

/// The name of the indicator for `var = value`
#[must_use]
pub fn indicator_name(var: &str, value: i64) -> String {
    format!("_{var}__{value}")
}

/// The name of the penalty variable of a constraint
#[must_use]
pub fn penalty_name(constraint: &str) -> String {
    format!("_P__{constraint}")
}

fn split_penalty_name(constraint: &str, part: u8) -> String {
    format!("_P{part}__{constraint}")
}

/// Declares `name` as `Σ w·var` over `[0, Σ w·ub]` for parts `(w, var, ub)`
#[must_use]
pub fn sum_definition(name: &str, parts: &[(i64, String, i64)]) -> Vec<Expr> {
    let ub = parts.iter().map(|(w, _, ub)| w * ub).sum();
    let mut terms = vec![(1, name.to_string())];
    terms.extend(parts.iter().map(|(w, var, _)| (-w, var.clone())));
    vec![
        Expr::int_range(name, 0, ub),
        Expr::linear(terms, Comparator::Eq, 0),
    ]
}

/// A penalty variable of a soft constraint
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PenaltyVariable {
    /// The variable name
    pub name: String,
    /// The largest value
    pub upper_bound: i64,
    /// The weight of the constraint
    pub weight: i64,
}

/// Translates a model into expressions for [`CspSolver`](crate::csp::CspSolver)
#[derive(Debug, Default)]
pub struct SatTranslator {
    variables: RsHashMap<String, (Variable, Vec<Expr>)>,
    constraints: RsHashMap<String, (Constraint, Vec<Expr>)>,
    penalties: Vec<PenaltyVariable>,
    penalty_of: RsHashMap<String, usize>,
}

impl SatTranslator {
    /// Creates a translator
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Translates a variable into its declaration and indicators
    ///
    /// # Errors
    ///
    /// [`Error::DuplicateDeclaration`] if another variable with that name was translated.
    pub fn translate_variable(&mut self, var: &Variable) -> Result<&[Expr], Error> {
        let name = var.name();
        match self.variables.get(name).map(|(v, _)| v == var) {
            Some(false) => return Err(Error::DuplicateDeclaration(name.to_string())),
            Some(true) => (),
            None => {
                let mut exprs = vec![Expr::int(name, var.domain().values())];
                for value in var.domain() {
                    let ind = indicator_name(name, value);
                    exprs.push(Expr::int_range(ind.as_str(), 0, 1));
                    exprs.push(Expr::imp(Expr::ge(ind.as_str(), 1), Expr::le(name, value)));
                    exprs.push(Expr::imp(Expr::ge(ind.as_str(), 1), Expr::ge(name, value)));
                    exprs.push(Expr::imp(
                        Expr::And(vec![Expr::le(name, value), Expr::ge(name, value)]),
                        Expr::ge(ind, 1),
                    ));
                }
                self.variables
                    .insert(name.to_string(), (var.clone(), exprs));
            }
        }
        Ok(self
            .variables
            .get(name)
            .map_or(&[][..], |(_, exprs)| exprs.as_slice()))
    }

    /// Translates a constraint. Soft constraints also get their penalty variables.
    ///
    /// # Errors
    ///
    /// [`Error::DuplicateDeclaration`], [`Error::UndeclaredVariable`] if a referenced variable
    /// was not translated, or [`Error::Unsupported`] for soft all-different constraints.
    pub fn translate_constraint(&mut self, cons: &Constraint) -> Result<&[Expr], Error> {
        let name = cons.name();
        match self.constraints.get(name).map(|(c, _)| c == cons) {
            Some(false) => return Err(Error::DuplicateDeclaration(name.to_string())),
            Some(true) => (),
            None => {
                for var in cons.variables() {
                    if self.variables.get(var.name()).map(|(v, _)| v) != Some(var) {
                        return Err(Error::UndeclaredVariable {
                            constraint: name.to_string(),
                            variable: var.name().to_string(),
                        });
                    }
                }
                let exprs = match cons {
                    Constraint::Linear(c) => self.linear(c),
                    Constraint::PseudoBoolean(c) => self.pseudo_boolean(c),
                    Constraint::ConflictPoint(c) => self.conflict_point(c),
                    Constraint::AllDifferent(c) => {
                        if !c.is_hard() {
                            return Err(Error::Unsupported(
                                name.to_string(),
                                "soft all-different",
                            ));
                        }
                        vec![Expr::AllDifferent(
                            c.variables().iter().map(|v| v.name().to_string()).collect(),
                        )
                        .labeled(name)]
                    }
                };
                self.constraints
                    .insert(name.to_string(), (cons.clone(), exprs));
            }
        }
        Ok(self
            .constraints
            .get(name)
            .map_or(&[][..], |(_, exprs)| exprs.as_slice()))
    }

    fn linear(&mut self, cons: &LinearConstraint) -> Vec<Expr> {
        let terms = cons
            .terms()
            .iter()
            .map(|t| (t.coeff, t.variable.name().to_string()))
            .collect();
        self.comparison(
            cons.name(),
            cons.weight(),
            terms,
            cons.comparator(),
            cons.rhs(),
            (cons.lhs_min(), cons.lhs_max()),
        )
    }

    fn pseudo_boolean(&mut self, cons: &PseudoBooleanConstraint) -> Vec<Expr> {
        let terms = cons
            .terms()
            .iter()
            .map(|t| (t.coeff, indicator_name(t.variable.name(), t.value)))
            .collect();
        self.comparison(
            cons.name(),
            cons.weight(),
            terms,
            cons.comparator(),
            cons.rhs(),
            (cons.lhs_min(), cons.lhs_max()),
        )
    }

    /// `Σ terms op rhs`, with penalty variables moving the left hand side if soft
    fn comparison(
        &mut self,
        name: &str,
        weight: i64,
        mut terms: Vec<(i64, String)>,
        op: Comparator,
        rhs: i64,
        (lhs_min, lhs_max): (i64, i64),
    ) -> Vec<Expr> {
        let mut exprs = vec![];
        if weight >= 0 {
            let pena = penalty_name(name);
            let max_pena = op.max_violation(rhs, lhs_min, lhs_max);
            exprs.push(Expr::int_range(pena.as_str(), 0, max_pena));
            match op {
                Comparator::Eq => {
                    let pena1 = split_penalty_name(name, 1);
                    let pena2 = split_penalty_name(name, 2);
                    exprs.push(Expr::int_range(
                        pena1.as_str(),
                        0,
                        Comparator::Ge.max_violation(rhs, lhs_min, lhs_max),
                    ));
                    exprs.push(Expr::int_range(
                        pena2.as_str(),
                        0,
                        Comparator::Le.max_violation(rhs, lhs_min, lhs_max),
                    ));
                    exprs.push(Expr::linear(
                        vec![(1, pena.clone()), (-1, pena1.clone()), (-1, pena2.clone())],
                        Comparator::Eq,
                        0,
                    ));
                    terms.push((1, pena1));
                    terms.push((-1, pena2));
                }
                Comparator::Le | Comparator::Lt => terms.push((-1, pena.clone())),
                Comparator::Ge | Comparator::Gt => terms.push((1, pena.clone())),
            }
            self.add_penalty(name, pena, max_pena, weight);
        }
        exprs.push(Expr::linear(terms, op, rhs).labeled(name));
        exprs
    }

    /// `¬ind ∨ …` over the predicates, or the penalty if soft
    fn conflict_point(&mut self, cons: &ConflictPointConstraint) -> Vec<Expr> {
        let mut exprs = vec![];
        let mut clause: Vec<Expr> = cons
            .terms()
            .iter()
            .map(|t| {
                let ind = indicator_name(t.variable.name(), t.value);
                if t.polarity {
                    Expr::le(ind, 0)
                } else {
                    Expr::ge(ind, 1)
                }
            })
            .collect();
        if !cons.is_hard() {
            let pena = penalty_name(cons.name());
            exprs.push(Expr::int_range(pena.as_str(), 0, 1));
            clause.push(Expr::ge(pena.as_str(), 1));
            self.add_penalty(cons.name(), pena, 1, cons.weight());
        }
        exprs.push(Expr::Or(clause).labeled(cons.name()));
        exprs
    }

    fn add_penalty(&mut self, constraint: &str, name: String, upper_bound: i64, weight: i64) {
        self.penalty_of
            .insert(constraint.to_string(), self.penalties.len());
        self.penalties.push(PenaltyVariable {
            name,
            upper_bound,
            weight,
        });
    }

    /// Checks whether a soft constraint was translated
    #[must_use]
    pub fn has_objective(&self) -> bool {
        !self.penalties.is_empty()
    }

    /// All penalty variables in translation order
    #[must_use]
    pub fn penalty_variables(&self) -> &[PenaltyVariable] {
        &self.penalties
    }

    /// The penalty variable of a translated soft constraint
    ///
    /// # Errors
    ///
    /// [`Error::NoPenalty`] if the constraint was not translated or is hard.
    pub fn penalty_variable_of(&self, constraint: &str) -> Result<&PenaltyVariable, Error> {
        self.penalty_of
            .get(constraint)
            .map(|&idx| &self.penalties[idx])
            .ok_or_else(|| Error::NoPenalty(constraint.to_string()))
    }

    /// Defines `name` as the unweighted sum of the penalties of `constraints`. Returns the
    /// expressions and the upper bound of the sum.
    ///
    /// # Errors
    ///
    /// [`Error::NoPenalty`] if a constraint was not translated as soft.
    pub fn aggregate<'c, I>(&self, name: &str, constraints: I) -> Result<(Vec<Expr>, i64), Error>
    where
        I: IntoIterator<Item = &'c Constraint>,
    {
        let parts = constraints
            .into_iter()
            .map(|c| {
                let pena = self.penalty_variable_of(c.name())?;
                Ok((1, pena.name.clone(), pena.upper_bound))
            })
            .collect::<Result<Vec<_>, Error>>()?;
        let ub = parts.iter().map(|&(_, _, ub)| ub).sum();
        Ok((sum_definition(name, &parts), ub))
    }

    /// The objective over all penalty variables translated so far: per-weight aggregates
    /// `_P%03d` and their weighted sum [`OBJECTIVE`]
    ///
    /// # Errors
    ///
    /// [`Error::NoObjective`] if no soft constraint was translated.
    pub fn translate_objective(&self) -> Result<Vec<Expr>, Error> {
        if !self.has_objective() {
            return Err(Error::NoObjective);
        }
        let mut groups: BTreeMap<i64, Vec<&PenaltyVariable>> = BTreeMap::new();
        for pena in &self.penalties {
            groups.entry(pena.weight).or_default().push(pena);
        }
        let mut exprs = vec![];
        let mut parts = vec![];
        for (weight, members) in groups {
            let name = format!("_P{weight:03}");
            let members: Vec<_> = members
                .iter()
                .map(|p| (1, p.name.clone(), p.upper_bound))
                .collect();
            let ub = members.iter().map(|&(_, _, ub)| ub).sum();
            exprs.extend(sum_definition(&name, &members));
            parts.push((weight, name, ub));
        }
        exprs.extend(sum_definition(OBJECTIVE, &parts));
        Ok(exprs)
    }

    /// Translates a whole model in one go: variables, all constraints and, if the model has
    /// soft constraints, the objective
    ///
    /// # Errors
    ///
    /// If any variable or constraint fails to translate.
    pub fn translate_model(&mut self, model: &Model) -> Result<Vec<Expr>, Error> {
        let mut exprs = vec![];
        for var in model.variables() {
            exprs.extend_from_slice(self.translate_variable(var)?);
        }
        for cons in model.constraints() {
            exprs.extend_from_slice(self.translate_constraint(cons)?);
        }
        if self.has_objective() {
            exprs.extend(self.translate_objective()?);
        }
        Ok(exprs)
    }
}

#[cfg(test)]
mod tests {
    use super::{check_supported, indicator_name, sum_definition, SatTranslator, OBJECTIVE};
    use crate::{
        csp::{CspSolver, Expr, Outcome},
        solvers::batsat,
        model::{
            AllDifferentConstraint, Comparator, ConflictPointConstraint, Constraint, Domain,
            LinearConstraint, PseudoBooleanConstraint, Variable,
        },
        translate::Error,
    };

    fn vars(n: usize) -> Vec<Variable> {
        (0..n)
            .map(|i| Variable::new(format!("x{i}"), Domain::range(1..=3).unwrap()).unwrap())
            .collect()
    }

    fn declared(n: usize) -> (SatTranslator, Vec<Variable>) {
        let mut tr = SatTranslator::new();
        let vs = vars(n);
        for v in &vs {
            tr.translate_variable(v).unwrap();
        }
        (tr, vs)
    }

    #[test]
    fn variable_indicators() {
        let (mut tr, vs) = declared(1);
        let exprs = tr.translate_variable(&vs[0]).unwrap();
        // declaration plus four expressions per value
        assert_eq!(exprs.len(), 13);
        assert_eq!(exprs[0], Expr::int("x0", &[1, 2, 3]));
        assert_eq!(exprs[1], Expr::int_range("_x0__1", 0, 1));
        assert_eq!(
            exprs[4],
            Expr::imp(
                Expr::And(vec![Expr::le("x0", 1), Expr::ge("x0", 1)]),
                Expr::ge("_x0__1", 1)
            )
        );
    }

    #[test]
    fn duplicate_variable() {
        let (mut tr, _) = declared(1);
        let other = Variable::new("x0", Domain::range(0..=1).unwrap()).unwrap();
        assert_eq!(
            tr.translate_variable(&other),
            Err(Error::DuplicateDeclaration("x0".to_string()))
        );
    }

    #[test]
    fn soft_le_penalty_bound() {
        let (mut tr, vs) = declared(3);
        let cons: Constraint = LinearConstraint::builder("c")
            .weight(100)
            .term(1, &vs[0])
            .term(-2, &vs[1])
            .term(3, &vs[2])
            .comparator(Comparator::Le)
            .rhs(8)
            .build()
            .unwrap()
            .into();
        let exprs = tr.translate_constraint(&cons).unwrap().to_vec();
        assert_eq!(exprs[0], Expr::int_range("_P__c", 0, 2));
        assert_eq!(
            exprs[1],
            Expr::linear(
                vec![
                    (1, "x0".to_string()),
                    (-2, "x1".to_string()),
                    (3, "x2".to_string()),
                    (-1, "_P__c".to_string())
                ],
                Comparator::Le,
                8
            )
            .labeled("c")
        );
        assert_eq!(tr.penalty_variable_of("c").unwrap().upper_bound, 2);
        // memoized
        let again = tr.translate_constraint(&cons).unwrap();
        assert_eq!(again, exprs.as_slice());
        assert_eq!(tr.penalty_variables().len(), 1);
    }

    #[test]
    fn soft_eq_split() {
        let (mut tr, vs) = declared(2);
        let cons: Constraint = LinearConstraint::builder("e")
            .weight(1)
            .term(1, &vs[0])
            .term(1, &vs[1])
            .comparator(Comparator::Eq)
            .rhs(3)
            .build()
            .unwrap()
            .into();
        let exprs = tr.translate_constraint(&cons).unwrap();
        // lhs in [2, 6]: deficit at most 1, excess at most 3
        assert_eq!(exprs[0], Expr::int_range("_P__e", 0, 3));
        assert_eq!(exprs[1], Expr::int_range("_P1__e", 0, 1));
        assert_eq!(exprs[2], Expr::int_range("_P2__e", 0, 3));
        assert_eq!(
            exprs[4],
            Expr::linear(
                vec![
                    (1, "x0".to_string()),
                    (1, "x1".to_string()),
                    (1, "_P1__e".to_string()),
                    (-1, "_P2__e".to_string())
                ],
                Comparator::Eq,
                3
            )
            .labeled("e")
        );
    }

    #[test]
    fn conflict_point_clause() {
        let (mut tr, vs) = declared(3);
        let cons: Constraint = ConflictPointConstraint::builder("cons")
            .term(&vs[0], 1, true)
            .term(&vs[1], 2, true)
            .term(&vs[2], 3, false)
            .build()
            .unwrap()
            .into();
        let exprs = tr.translate_constraint(&cons).unwrap();
        assert_eq!(
            exprs,
            &[Expr::Or(vec![
                Expr::le("_x0__1", 0),
                Expr::le("_x1__2", 0),
                Expr::ge("_x2__3", 1)
            ])
            .labeled("cons")]
        );
        assert!(!tr.has_objective());
        assert!(tr.translate_objective().is_err());
    }

    #[test]
    fn soft_conflict_point_pays_penalty() {
        let (mut tr, vs) = declared(1);
        let cons: Constraint = ConflictPointConstraint::builder("cp")
            .weight(3)
            .term(&vs[0], 2, true)
            .build()
            .unwrap()
            .into();
        let exprs = tr.translate_constraint(&cons).unwrap();
        assert_eq!(exprs[0], Expr::int_range("_P__cp", 0, 1));
        assert_eq!(
            exprs[1],
            Expr::Or(vec![Expr::le("_x0__2", 0), Expr::ge("_P__cp", 1)]).labeled("cp")
        );
    }

    #[test]
    fn pseudo_boolean_uses_indicators() {
        let (mut tr, vs) = declared(2);
        let cons: Constraint = PseudoBooleanConstraint::builder("pb")
            .term(2, &vs[0], 3)
            .term(1, &vs[1], 1)
            .comparator(Comparator::Ge)
            .rhs(1)
            .build()
            .unwrap()
            .into();
        let exprs = tr.translate_constraint(&cons).unwrap();
        assert_eq!(
            exprs,
            &[Expr::linear(
                vec![(2, indicator_name("x0", 3)), (1, indicator_name("x1", 1))],
                Comparator::Ge,
                1
            )
            .labeled("pb")]
        );
    }

    #[test]
    fn undeclared_and_unsupported() {
        let mut tr = SatTranslator::new();
        let vs = vars(2);
        let cons: Constraint = AllDifferentConstraint::builder("ad")
            .variables(&vs)
            .build()
            .unwrap()
            .into();
        assert!(matches!(
            tr.translate_constraint(&cons),
            Err(Error::UndeclaredVariable { .. })
        ));
        for v in &vs {
            tr.translate_variable(v).unwrap();
        }
        assert_eq!(tr.translate_constraint(&cons).unwrap().len(), 1);
        let soft: Constraint = AllDifferentConstraint::builder("ad2")
            .weight(1)
            .variables(&vs)
            .build()
            .unwrap()
            .into();
        assert!(matches!(
            tr.translate_constraint(&soft),
            Err(Error::Unsupported(..))
        ));
    }

    #[test]
    fn all_different_compiles() {
        let mut model = crate::model::Model::new();
        let vs: Vec<Variable> = (0..3)
            .map(|i| {
                model
                    .new_variable(format!("x{i}"), Domain::range(1..=3).unwrap())
                    .unwrap()
            })
            .collect();
        model
            .add_constraint(
                AllDifferentConstraint::builder("ad")
                    .variables(&vs)
                    .build()
                    .unwrap(),
            )
            .unwrap();
        check_supported(&model).unwrap();
        let exprs = SatTranslator::new().translate_model(&model).unwrap();
        let mut csp = CspSolver::new(batsat::Solver::default()).unwrap();
        csp.add_exprs(exprs);
        csp.add_assumption("x0", Comparator::Eq, 2).unwrap();
        let Outcome::Sat(sol) = csp.solve(None).unwrap() else {
            panic!("expected a solution")
        };
        let mut vals: Vec<i64> = (0..3).filter_map(|i| sol.get(&format!("x{i}"))).collect();
        assert_eq!(vals[0], 2);
        vals.sort_unstable();
        assert_eq!(vals, vec![1, 2, 3]);
        // the indicators follow the values
        assert_eq!(sol.get(&indicator_name("x0", 2)), Some(1));

        let soft = AllDifferentConstraint::builder("ad2")
            .weight(1)
            .variables(&vs)
            .build()
            .unwrap();
        model.add_constraint(soft).unwrap();
        assert_eq!(
            check_supported(&model),
            Err(Error::Unsupported("ad2".to_string(), "soft all-different"))
        );
    }

    #[test]
    fn objective_groups_by_weight() {
        let (mut tr, vs) = declared(1);
        for (name, weight) in [("a", 2), ("b", 5), ("c", 2)] {
            let cons: Constraint = LinearConstraint::builder(name)
                .weight(weight)
                .term(1, &vs[0])
                .comparator(Comparator::Le)
                .rhs(1)
                .build()
                .unwrap()
                .into();
            tr.translate_constraint(&cons).unwrap();
        }
        let exprs = tr.translate_objective().unwrap();
        let mut expected = sum_definition(
            "_P002",
            &[(1, "_P__a".to_string(), 2), (1, "_P__c".to_string(), 2)],
        );
        expected.extend(sum_definition("_P005", &[(1, "_P__b".to_string(), 2)]));
        expected.extend(sum_definition(
            OBJECTIVE,
            &[(2, "_P002".to_string(), 4), (5, "_P005".to_string(), 2)],
        ));
        assert_eq!(exprs, expected);
        assert_eq!(expected[4], Expr::int_range("_P", 0, 18));
    }

    #[test]
    fn whole_model() {
        let mut model = crate::model::Model::new();
        let x = model.new_variable("x", Domain::range(0..=2).unwrap()).unwrap();
        model
            .add_constraint(
                LinearConstraint::builder("soft")
                    .weight(3)
                    .term(1, &x)
                    .comparator(Comparator::Ge)
                    .rhs(2)
                    .build()
                    .unwrap(),
            )
            .unwrap();
        let exprs = SatTranslator::new().translate_model(&model).unwrap();
        assert_eq!(exprs[0], Expr::int("x", &[0, 1, 2]));
        assert!(exprs.contains(&Expr::int_range("_P__soft", 0, 2)));
        assert!(exprs.contains(&Expr::int_range(OBJECTIVE, 0, 6)));
    }
}
