//! # Translation for the Local-Search Solver
//!
//! Linear and pseudo-Boolean constraints both become linear constraints over
//! `coeff(variable, value)` terms, a linear term `c·X` expanding into one term `c·v(X, v)` per
//! domain value. Strict comparators are folded into non-strict ones. A conflict point becomes
//! `Σ ±1(X, v) <= size - 1 - #negative`.

use crate::{
    model::{Comparator, Constraint, Model, Variable},
    scop::{Relation, ScopConstraint, ScopInstance, ScopTerm, ScopVariable, Weight},
    types::RsHashMap,
};

use super::Error;

fn fold(op: Comparator, rhs: i64) -> (Relation, i64) {
    match op {
        Comparator::Eq => (Relation::Eq, rhs),
        Comparator::Le => (Relation::Le, rhs),
        Comparator::Lt => (Relation::Le, rhs - 1),
        Comparator::Ge => (Relation::Ge, rhs),
        Comparator::Gt => (Relation::Ge, rhs + 1),
    }
}

fn term(coeff: i64, var: &Variable, value: i64) -> ScopTerm {
    ScopTerm {
        coeff,
        variable: var.name().to_string(),
        value: value.to_string(),
    }
}

/// Translates a model into a [`ScopInstance`]
#[derive(Debug, Default)]
pub struct ScopTranslator {
    variables: RsHashMap<String, (Variable, ScopVariable)>,
    constraints: RsHashMap<String, (Constraint, ScopConstraint)>,
    n_gates: usize,
}

impl ScopTranslator {
    /// Creates a translator
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Translates a variable, stringifying its domain
    ///
    /// # Errors
    ///
    /// [`Error::DuplicateDeclaration`] if another variable with that name was translated.
    pub fn translate_variable(&mut self, var: &Variable) -> Result<ScopVariable, Error> {
        match self.variables.get(var.name()) {
            Some((known, _)) if known != var => {
                Err(Error::DuplicateDeclaration(var.name().to_string()))
            }
            Some((_, translated)) => Ok(translated.clone()),
            None => {
                let translated = ScopVariable {
                    name: var.name().to_string(),
                    domain: var.domain().iter().map(|v| v.to_string()).collect(),
                };
                self.variables
                    .insert(var.name().to_string(), (var.clone(), translated.clone()));
                Ok(translated)
            }
        }
    }

    /// Translates a constraint, translating the variables it references on the way
    ///
    /// # Errors
    ///
    /// [`Error::DuplicateDeclaration`] if another constraint or variable with the same name
    /// was translated.
    pub fn translate_constraint(&mut self, cons: &Constraint) -> Result<ScopConstraint, Error> {
        match self.constraints.get(cons.name()) {
            Some((known, _)) if known != cons => {
                return Err(Error::DuplicateDeclaration(cons.name().to_string()))
            }
            Some((_, translated)) => return Ok(translated.clone()),
            None => (),
        }
        for var in cons.variables() {
            self.translate_variable(var)?;
        }
        let name = cons.name().to_string();
        let weight = Weight::from_model(cons.weight());
        let translated = match cons {
            Constraint::Linear(c) => {
                let (rel, rhs) = fold(c.comparator(), c.rhs());
                let terms = c
                    .terms()
                    .iter()
                    .flat_map(|t| {
                        t.variable
                            .domain()
                            .iter()
                            .map(move |v| term(t.coeff * v, &t.variable, v))
                    })
                    .collect();
                ScopConstraint::Linear {
                    name,
                    weight,
                    terms,
                    rel,
                    rhs,
                }
            }
            Constraint::PseudoBoolean(c) => {
                let (rel, rhs) = fold(c.comparator(), c.rhs());
                let terms = c
                    .terms()
                    .iter()
                    .map(|t| term(t.coeff, &t.variable, t.value))
                    .collect();
                ScopConstraint::Linear {
                    name,
                    weight,
                    terms,
                    rel,
                    rhs,
                }
            }
            Constraint::ConflictPoint(c) => {
                let size = i64::try_from(c.terms().len()).unwrap_or(i64::MAX);
                let n_negative = i64::try_from(c.n_negative()).unwrap_or(i64::MAX);
                let terms = c
                    .terms()
                    .iter()
                    .map(|t| term(if t.polarity { 1 } else { -1 }, &t.variable, t.value))
                    .collect();
                ScopConstraint::Linear {
                    name,
                    weight,
                    terms,
                    rel: Relation::Le,
                    rhs: size - 1 - n_negative,
                }
            }
            Constraint::AllDifferent(c) => ScopConstraint::AllDifferent {
                name,
                weight,
                variables: c.variables().iter().map(|v| v.name().to_string()).collect(),
            },
        };
        self.constraints
            .insert(cons.name().to_string(), (cons.clone(), translated.clone()));
        Ok(translated)
    }

    /// Translates a whole model, variables first, both in insertion order
    ///
    /// # Errors
    ///
    /// Name collisions with entities translated earlier.
    pub fn translate_model(&mut self, model: &Model) -> Result<ScopInstance, Error> {
        let mut inst = ScopInstance::new();
        for var in model.variables() {
            inst.add_variable(self.translate_variable(var)?)?;
        }
        for cons in model.constraints() {
            inst.add_constraint(self.translate_constraint(cons)?)?;
        }
        Ok(inst)
    }

    /// Reifies the conjunction of `terms` into a fresh 0/1 variable `tempNNNN` added to
    /// `inst`, with hard constraints `AND_UB_NNNN` and `AND_LB_NNNN`.
    ///
    /// Each term is expected to contribute 1 when its predicate holds and `offset` is the
    /// value of the left hand side that is not covered by `terms`. With `n = terms.len()`:
    /// `Σ terms - n·t(1) <= n - 1 - offset` forces `t` to 1 if all terms hold and
    /// `Σ terms + n·t(0) >= n - offset` forces all terms to hold if `t` is 1.
    ///
    /// # Errors
    ///
    /// If a term references a variable that is not in `inst` or the generated names are
    /// taken.
    pub fn and_gate(
        &mut self,
        inst: &mut ScopInstance,
        terms: &[ScopTerm],
        offset: i64,
    ) -> Result<String, Error> {
        let id = self.n_gates;
        self.n_gates += 1;
        let n = i64::try_from(terms.len()).unwrap_or(i64::MAX);
        let name = format!("temp{id:04}");
        inst.add_variable(ScopVariable {
            name: name.clone(),
            domain: vec!["0".to_string(), "1".to_string()],
        })?;
        let gate_term = |coeff: i64, value: &str| ScopTerm {
            coeff,
            variable: name.clone(),
            value: value.to_string(),
        };
        let mut ub_terms = terms.to_vec();
        ub_terms.push(gate_term(-n, "1"));
        inst.add_constraint(ScopConstraint::Linear {
            name: format!("AND_UB_{id:04}"),
            weight: Weight::Hard,
            terms: ub_terms,
            rel: Relation::Le,
            rhs: n - 1 - offset,
        })?;
        let mut lb_terms = terms.to_vec();
        lb_terms.push(gate_term(n, "0"));
        inst.add_constraint(ScopConstraint::Linear {
            name: format!("AND_LB_{id:04}"),
            weight: Weight::Hard,
            terms: lb_terms,
            rel: Relation::Ge,
            rhs: n - offset,
        })?;
        Ok(name)
    }
}

#[cfg(test)]
mod tests {
    use super::ScopTranslator;
    use crate::{
        model::{
            AllDifferentConstraint, Comparator, ConflictPointConstraint, Constraint, Domain,
            LinearConstraint, Model, PseudoBooleanConstraint, Variable,
        },
        scop::{Relation, ScopConstraint, ScopTerm, Weight},
        translate::Error,
    };

    fn t(coeff: i64, var: &str, value: &str) -> ScopTerm {
        ScopTerm {
            coeff,
            variable: var.to_string(),
            value: value.to_string(),
        }
    }

    fn var(name: &str) -> Variable {
        Variable::new(name, Domain::new([1, 2]).unwrap()).unwrap()
    }

    #[test]
    fn linear_expands_domain() {
        let (x, y) = (var("x"), var("y"));
        let cons: Constraint = LinearConstraint::builder("c")
            .weight(3)
            .term(2, &x)
            .term(-1, &y)
            .comparator(Comparator::Lt)
            .rhs(2)
            .build()
            .unwrap()
            .into();
        let mut tr = ScopTranslator::new();
        assert_eq!(
            tr.translate_constraint(&cons).unwrap(),
            ScopConstraint::Linear {
                name: "c".to_string(),
                weight: Weight::Soft(3),
                terms: vec![t(2, "x", "1"), t(4, "x", "2"), t(-1, "y", "1"), t(-2, "y", "2")],
                rel: Relation::Le,
                rhs: 1,
            }
        );
        let translated = tr.translate_variable(&x).unwrap();
        assert_eq!(translated.domain, vec!["1", "2"]);
    }

    #[test]
    fn pseudo_boolean_folds_gt() {
        let x = var("x");
        let cons: Constraint = PseudoBooleanConstraint::builder("pb")
            .term(5, &x, 2)
            .comparator(Comparator::Gt)
            .rhs(0)
            .build()
            .unwrap()
            .into();
        let mut tr = ScopTranslator::new();
        assert_eq!(
            tr.translate_constraint(&cons).unwrap(),
            ScopConstraint::Linear {
                name: "pb".to_string(),
                weight: Weight::Hard,
                terms: vec![t(5, "x", "2")],
                rel: Relation::Ge,
                rhs: 1,
            }
        );
    }

    #[test]
    fn conflict_point_inequality() {
        let (x, y, z) = (var("x"), var("y"), var("z"));
        let cons: Constraint = ConflictPointConstraint::builder("cp")
            .weight(1)
            .term(&x, 1, true)
            .term(&y, 2, true)
            .term(&z, 1, false)
            .build()
            .unwrap()
            .into();
        let mut tr = ScopTranslator::new();
        assert_eq!(
            tr.translate_constraint(&cons).unwrap(),
            ScopConstraint::Linear {
                name: "cp".to_string(),
                weight: Weight::Soft(1),
                terms: vec![t(1, "x", "1"), t(1, "y", "2"), t(-1, "z", "1")],
                rel: Relation::Le,
                rhs: 1,
            }
        );
    }

    #[test]
    fn memoized_and_collisions() {
        let x = var("x");
        let mut tr = ScopTranslator::new();
        let first = tr.translate_variable(&x).unwrap();
        assert_eq!(tr.translate_variable(&x).unwrap(), first);
        let other = Variable::new("x", Domain::new([0]).unwrap()).unwrap();
        assert_eq!(
            tr.translate_variable(&other),
            Err(Error::DuplicateDeclaration("x".to_string()))
        );
        let ad: Constraint = AllDifferentConstraint::builder("ad")
            .variable(&other)
            .build()
            .unwrap()
            .into();
        assert!(tr.translate_constraint(&ad).is_err());
    }

    #[test]
    fn whole_model() {
        let mut model = Model::new();
        let x = model.new_variable("x", Domain::new([1, 2]).unwrap()).unwrap();
        let y = model.new_variable("y", Domain::new([1, 2]).unwrap()).unwrap();
        model
            .add_constraint(
                AllDifferentConstraint::builder("ad")
                    .variable(&x)
                    .variable(&y)
                    .build()
                    .unwrap(),
            )
            .unwrap();
        let inst = ScopTranslator::new().translate_model(&model).unwrap();
        assert_eq!(inst.variables().len(), 2);
        assert_eq!(
            inst.constraint("ad"),
            Some(&ScopConstraint::AllDifferent {
                name: "ad".to_string(),
                weight: Weight::Hard,
                variables: vec!["x".to_string(), "y".to_string()],
            })
        );
    }

    #[test]
    fn and_gate_constraints() {
        let mut model = Model::new();
        model.add_variable(var("x")).unwrap();
        model.add_variable(var("y")).unwrap();
        let mut tr = ScopTranslator::new();
        let mut inst = tr.translate_model(&model).unwrap();
        let terms = vec![t(1, "x", "1"), t(1, "y", "2")];
        assert_eq!(tr.and_gate(&mut inst, &terms, 0).unwrap(), "temp0000");
        assert_eq!(
            inst.constraint("AND_UB_0000"),
            Some(&ScopConstraint::Linear {
                name: "AND_UB_0000".to_string(),
                weight: Weight::Hard,
                terms: vec![t(1, "x", "1"), t(1, "y", "2"), t(-2, "temp0000", "1")],
                rel: Relation::Le,
                rhs: 1,
            })
        );
        assert_eq!(
            inst.constraint("AND_LB_0000"),
            Some(&ScopConstraint::Linear {
                name: "AND_LB_0000".to_string(),
                weight: Weight::Hard,
                terms: vec![t(1, "x", "1"), t(1, "y", "2"), t(2, "temp0000", "0")],
                rel: Relation::Ge,
                rhs: 2,
            })
        );
        assert_eq!(tr.and_gate(&mut inst, &terms, 1).unwrap(), "temp0001");
        // unknown variable
        assert!(tr
            .and_gate(&mut inst, &[t(1, "nope", "1")], 0)
            .is_err());
    }
}
