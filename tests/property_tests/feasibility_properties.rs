//! Property-based tests for the feasibility solver.

use linfeas::{ConstraintId, DeltaRational, LinExpr, Solver, VarId};
use num_bigint::BigInt;
use num_rational::BigRational;
use proptest::prelude::*;

const NUM_VARS: usize = 3;

/// Strategy for small constraint coefficients.
fn coeff_strategy() -> impl Strategy<Value = i64> {
    -5i64..=5
}

/// Strategy for right-hand sides.
fn rhs_strategy() -> impl Strategy<Value = i64> {
    -10i64..=10
}

/// The relation of a generated constraint.
#[derive(Clone, Copy, Debug)]
enum Rel {
    Le,
    Lt,
    Ge,
    Eq,
}

fn rel_strategy() -> impl Strategy<Value = Rel> {
    prop_oneof![
        Just(Rel::Le),
        Just(Rel::Lt),
        Just(Rel::Ge),
        Just(Rel::Eq),
    ]
}

/// One generated constraint: coefficients over the variables and an rhs.
fn constraint_strategy() -> impl Strategy<Value = (Vec<i64>, i64, Rel)> {
    (
        prop::collection::vec(coeff_strategy(), NUM_VARS),
        rhs_strategy(),
        rel_strategy(),
    )
}

fn rat(n: i64) -> BigRational {
    BigRational::from_integer(BigInt::from(n))
}

fn dr(n: i64) -> DeltaRational {
    DeltaRational::from_integer(n)
}

fn build_expr(vars: &[VarId], coeffs: &[i64]) -> LinExpr {
    let mut e = LinExpr::new();
    for (&x, &c) in vars.iter().zip(coeffs) {
        e.add_term(x, rat(c));
    }
    e
}

proptest! {
    /// A satisfiable check yields a model satisfying every committed
    /// assertion, with all structural invariants intact.
    #[test]
    fn model_satisfies_all_assertions(
        constraints in prop::collection::vec(constraint_strategy(), 1..8)
    ) {
        let mut solver = Solver::new();
        let vars: Vec<VarId> = (0..NUM_VARS).map(|_| solver.new_var()).collect();

        let mut committed = Vec::new();
        let mut rejected = false;
        for (i, (coeffs, rhs, rel)) in constraints.iter().enumerate() {
            let e = build_expr(&vars, coeffs);
            let r = LinExpr::constant(rat(*rhs));
            let id = ConstraintId::new(i as u64);
            let ok = match rel {
                Rel::Le => solver.new_lt(&e, &r, false, Some(id)),
                Rel::Lt => solver.new_lt(&e, &r, true, Some(id)),
                Rel::Ge => solver.new_gt(&e, &r, false, Some(id)),
                Rel::Eq => solver.new_eq(&e, &r, Some(id)),
            };
            if ok {
                committed.push((e, *rhs, *rel));
            } else {
                rejected = true;
                break;
            }
            prop_assert!(solver.check_invariants().is_ok());
        }

        if rejected {
            prop_assert!(!solver.conflict().is_empty());
            return Ok(());
        }

        if solver.check() {
            prop_assert!(solver.check_invariants().is_ok());
            for (e, rhs, rel) in &committed {
                let v = solver.expr_value(e);
                let r = dr(*rhs);
                match rel {
                    Rel::Le => prop_assert!(v <= r, "{v} </= {r}"),
                    Rel::Lt => prop_assert!(v < r, "{v} </ {r}"),
                    Rel::Ge => prop_assert!(v >= r, "{v} >/= {r}"),
                    Rel::Eq => prop_assert_eq!(v, r),
                }
            }
        } else {
            // conflicts only name constraints the host actually asserted
            for c in solver.conflict() {
                prop_assert!(c.raw() < constraints.len() as u64);
            }
        }
    }

    /// Bounds bracket every variable's value after a satisfiable check.
    #[test]
    fn bounds_bracket_model_values(
        constraints in prop::collection::vec(constraint_strategy(), 1..6)
    ) {
        let mut solver = Solver::new();
        let vars: Vec<VarId> = (0..NUM_VARS).map(|_| solver.new_var()).collect();

        let mut all_committed = true;
        for (i, (coeffs, rhs, rel)) in constraints.iter().enumerate() {
            let e = build_expr(&vars, coeffs);
            let r = LinExpr::constant(rat(*rhs));
            let id = ConstraintId::new(i as u64);
            let ok = match rel {
                Rel::Le => solver.new_lt(&e, &r, false, Some(id)),
                Rel::Lt => solver.new_lt(&e, &r, true, Some(id)),
                Rel::Ge => solver.new_gt(&e, &r, false, Some(id)),
                Rel::Eq => solver.new_eq(&e, &r, Some(id)),
            };
            if !ok {
                all_committed = false;
                break;
            }
        }

        if all_committed && solver.check() {
            for i in 0..solver.num_vars() {
                let x = VarId::new(i as u32);
                if let Some(lb) = solver.lb(x) {
                    prop_assert!(lb <= solver.value(x));
                }
                if let Some(ub) = solver.ub(x) {
                    prop_assert!(solver.value(x) <= ub);
                }
            }
        }
    }

    /// A second check after a satisfiable one performs zero pivots.
    #[test]
    fn check_is_idempotent(
        constraints in prop::collection::vec(constraint_strategy(), 1..6)
    ) {
        let mut solver = Solver::new();
        let vars: Vec<VarId> = (0..NUM_VARS).map(|_| solver.new_var()).collect();

        for (i, (coeffs, rhs, rel)) in constraints.iter().enumerate() {
            let e = build_expr(&vars, coeffs);
            let r = LinExpr::constant(rat(*rhs));
            let id = ConstraintId::new(i as u64);
            let ok = match rel {
                Rel::Le => solver.new_lt(&e, &r, false, Some(id)),
                Rel::Lt => solver.new_lt(&e, &r, true, Some(id)),
                Rel::Ge => solver.new_gt(&e, &r, false, Some(id)),
                Rel::Eq => solver.new_eq(&e, &r, Some(id)),
            };
            if !ok {
                return Ok(());
            }
        }

        if solver.check() {
            let pivots = solver.stats().pivots;
            prop_assert!(solver.check());
            prop_assert_eq!(solver.stats().pivots, pivots);
        }
    }

    /// Slack introduction is idempotent per canonical expression.
    #[test]
    fn slack_memo_is_idempotent(
        coeffs in prop::collection::vec(coeff_strategy(), NUM_VARS)
    ) {
        prop_assume!(coeffs.iter().filter(|&&c| c != 0).count() >= 2);

        let mut solver = Solver::new();
        let vars: Vec<VarId> = (0..NUM_VARS).map(|_| solver.new_var()).collect();
        let e = build_expr(&vars, &coeffs);

        let a = solver.new_slack(&e);
        let n = solver.num_vars();
        let rows = solver.tableau().num_rows();
        let b = solver.new_slack(&e);

        prop_assert_eq!(a, b);
        prop_assert_eq!(solver.num_vars(), n);
        prop_assert_eq!(solver.tableau().num_rows(), rows);
        prop_assert!(solver.check_invariants().is_ok());
    }
}
