//! The incremental feasibility solver.
//!
//! [`Solver`] keeps a tableau in solved form over basic and non-basic
//! variables and restores bound feasibility with Bland-ordered pivoting —
//! the general simplex for SMT. Incoming relations are normalized into
//! bound updates on existing or freshly introduced slack variables, each
//! justified by an opaque [`ConstraintId`] so the host can retract it
//! while backtracking. When no pivot can repair a violated row, the
//! bound-following certificate over that row becomes the conflict set.
//!
//! ## References
//!
//! - Dutertre & de Moura: "A Fast Linear-Arithmetic Solver for DPLL(T)"
//!   (CAV 2006)
//! - Z3's `math/lp/` simplex core

use crate::bounds::VarState;
use crate::expr::LinExpr;
use crate::num::DeltaRational;
use crate::tableau::Tableau;
use crate::{ConstraintId, VarId};
use num_rational::BigRational;
use num_traits::{One, Signed, Zero};
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;
use std::fmt;
use tracing::{debug, trace};

/// A bound update that would cross the variable's opposite bound.
///
/// Carries a sufficient conflicting reason set: the reasons justifying the
/// blocking bound together with the reason for the rejected update.
#[derive(Debug, Clone, thiserror::Error)]
#[error("bound conflict on {var}")]
pub struct BoundConflict {
    /// Variable whose bounds crossed.
    pub var: VarId,
    /// Sufficient conflicting reason set, sorted and deduplicated.
    pub reasons: Vec<ConstraintId>,
}

/// Counters describing solver activity.
#[derive(Clone, Debug, Default)]
pub struct SolverStats {
    /// Pivots performed by `check`.
    pub pivots: u64,
    /// Bound entries recorded.
    pub bound_updates: u64,
    /// Conflicts reported, by failed assertions and failed checks.
    pub conflicts: u64,
    /// `check` invocations.
    pub checks: u64,
    /// Slack requests answered from the memo instead of a fresh variable.
    pub slacks_reused: u64,
    /// Constraints retracted.
    pub retractions: u64,
}

/// Which side of a variable's range a recorded bound constrains.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum BoundSide {
    Lower,
    Upper,
}

/// Location of one recorded bound entry, kept for retraction.
#[derive(Clone, Debug)]
struct BoundRef {
    var: VarId,
    side: BoundSide,
    at: DeltaRational,
}

/// An incremental, backtrackable feasibility solver for conjunctions of
/// linear constraints over the rationals.
///
/// Between calls the solver maintains: every non-basic variable within
/// its bounds, every basic variable's value equal to its row's value, and
/// the watch index in exact agreement with the rows. Basic variables may
/// sit outside their bounds until [`Solver::check`] repairs them.
#[derive(Clone, Debug, Default)]
pub struct Solver {
    vars: Vec<VarState>,
    tableau: Tableau,
    slack_memo: FxHashMap<String, VarId>,
    retract_index: FxHashMap<ConstraintId, Vec<BoundRef>>,
    conflict: Vec<ConstraintId>,
    stats: SolverStats,
}

impl Solver {
    /// Create an empty solver.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of variables created so far, slacks included.
    #[must_use]
    pub fn num_vars(&self) -> usize {
        self.vars.len()
    }

    /// Create a fresh unbounded variable.
    pub fn new_var(&mut self) -> VarId {
        self.new_bounded_var(None, None)
    }

    /// Create a fresh variable with initial bounds.
    ///
    /// The initial value is the lower bound when finite, else the upper
    /// bound when finite, else zero. Initial bounds are recorded as
    /// unjustified, so they survive every retraction. Panics if both
    /// bounds are present and crossed.
    pub fn new_bounded_var(
        &mut self,
        lb: Option<DeltaRational>,
        ub: Option<DeltaRational>,
    ) -> VarId {
        if let (Some(l), Some(u)) = (&lb, &ub) {
            assert!(l <= u, "initial bounds must satisfy lb <= ub");
        }
        let value = lb.clone().or_else(|| ub.clone()).unwrap_or_default();
        self.push_var(value, lb, ub)
    }

    fn push_var(
        &mut self,
        value: DeltaRational,
        lb: Option<DeltaRational>,
        ub: Option<DeltaRational>,
    ) -> VarId {
        let id = VarId::new(self.vars.len() as u32);
        let mut state = VarState::new(value);
        if let Some(l) = lb {
            state.record_lb(l, None);
        }
        if let Some(u) = ub {
            state.record_ub(u, None);
        }
        self.vars.push(state);
        self.tableau.register_var(id);
        id
    }

    /// The current candidate value of `x`.
    #[must_use]
    pub fn value(&self, x: VarId) -> &DeltaRational {
        self.vars[x.index()].value()
    }

    /// The effective lower bound of `x`, if any.
    #[must_use]
    pub fn lb(&self, x: VarId) -> Option<&DeltaRational> {
        self.vars[x.index()].lb()
    }

    /// The effective upper bound of `x`, if any.
    #[must_use]
    pub fn ub(&self, x: VarId) -> Option<&DeltaRational> {
        self.vars[x.index()].ub()
    }

    /// Whether `x` currently owns a tableau row.
    #[must_use]
    pub fn is_basic(&self, x: VarId) -> bool {
        self.tableau.is_basic(x)
    }

    /// Read-only view of the tableau.
    #[must_use]
    pub fn tableau(&self) -> &Tableau {
        &self.tableau
    }

    /// The latest conflict: a sorted set of constraint ids whose joint
    /// presence is infeasible. Valid until the next mutating operation.
    #[must_use]
    pub fn conflict(&self) -> &[ConstraintId] {
        &self.conflict
    }

    /// Activity counters.
    #[must_use]
    pub fn stats(&self) -> &SolverStats {
        &self.stats
    }

    /// The value of `l` under the current variable values.
    #[must_use]
    pub fn expr_value(&self, l: &LinExpr) -> DeltaRational {
        let mut v = DeltaRational::from(l.constant_term().clone());
        for (x, c) in l.iter() {
            v += self.value(x) * c;
        }
        v
    }

    /// The lower bound `l` is entailed to satisfy under the current
    /// variable bounds, or `None` when some contribution is unbounded.
    #[must_use]
    pub fn expr_lb(&self, l: &LinExpr) -> Option<DeltaRational> {
        let mut b = DeltaRational::from(l.constant_term().clone());
        for (x, c) in l.iter() {
            let side = if c.is_positive() {
                self.lb(x)
            } else {
                self.ub(x)
            };
            b += side? * c;
        }
        Some(b)
    }

    /// The upper bound `l` is entailed to satisfy under the current
    /// variable bounds, or `None` when some contribution is unbounded.
    #[must_use]
    pub fn expr_ub(&self, l: &LinExpr) -> Option<DeltaRational> {
        let mut b = DeltaRational::from(l.constant_term().clone());
        for (x, c) in l.iter() {
            let side = if c.is_positive() {
                self.ub(x)
            } else {
                self.lb(x)
            };
            b += side? * c;
        }
        Some(b)
    }

    /// Introduce (or reuse) the slack variable standing for `l`.
    ///
    /// The expression is first rewritten over non-basic variables. Two
    /// calls with the same canonical form return the same id and do not
    /// grow the tableau. The slack starts at `l`'s current value with the
    /// bounds entailed for `l`, recorded unjustified.
    ///
    /// Panics if the normalized expression is constant or carries a
    /// constant term.
    pub fn new_slack(&mut self, l: &LinExpr) -> VarId {
        let mut e = l.clone();
        self.normalize(&mut e);
        assert!(
            e.constant_term().is_zero(),
            "slack expressions must have no constant term"
        );
        assert!(!e.is_empty(), "cannot introduce a slack for a constant");

        let key = e.canonical_key();
        if let Some(&s) = self.slack_memo.get(&key) {
            self.stats.slacks_reused += 1;
            return s;
        }

        let lb = self.expr_lb(&e);
        let ub = self.expr_ub(&e);
        let value = self.expr_value(&e);
        let s = self.push_var(value, lb, ub);
        self.tableau.install_row(s, e);
        self.slack_memo.insert(key, s);
        debug!(slack = %s, "introduced slack variable");
        s
    }

    /// Assert `lhs < rhs` (strict) or `lhs ≤ rhs`.
    ///
    /// Returns `true` when the assertion was committed or is a tautology,
    /// `false` when it is infeasible against the current bounds; in the
    /// latter case [`Solver::conflict`] names the responsible constraints.
    pub fn new_lt(
        &mut self,
        lhs: &LinExpr,
        rhs: &LinExpr,
        strict: bool,
        reason: Option<ConstraintId>,
    ) -> bool {
        self.conflict.clear();
        let mut e = lhs.clone() - rhs.clone();
        self.normalize(&mut e);
        let k = e.take_constant();

        // e + k ⋈ 0 with ⋈ ∈ {<, ≤}
        match e.len() {
            0 => {
                if k.is_negative() || (!strict && k.is_zero()) {
                    true
                } else {
                    trace!(%k, strict, "constant assertion rejected");
                    self.fail(reason.into_iter().collect())
                }
            }
            1 => {
                let (x, c) = {
                    let (x, c) = e.iter().next().expect("single-term expression");
                    (x, c.clone())
                };
                // c·x ⋈ -k, so x is bounded by (-k - [strict]ε) / c
                let bound = &DeltaRational::new(-k, strict_delta(strict)) / &c;
                let res = if c.is_positive() {
                    self.set_ub(x, bound, reason)
                } else {
                    self.set_lb(x, bound, reason)
                };
                self.finish_bound(res)
            }
            _ => {
                let s = self.new_slack(&e);
                let bound = DeltaRational::new(-k, strict_delta(strict));
                let res = self.set_ub(s, bound, reason);
                self.finish_bound(res)
            }
        }
    }

    /// Assert `lhs = rhs`.
    ///
    /// Returns `true` on success, `false` with a populated conflict when
    /// the equality is infeasible against the current bounds.
    pub fn new_eq(&mut self, lhs: &LinExpr, rhs: &LinExpr, reason: Option<ConstraintId>) -> bool {
        self.conflict.clear();
        let mut e = lhs.clone() - rhs.clone();
        self.normalize(&mut e);
        let k = e.take_constant();

        match e.len() {
            0 => {
                if k.is_zero() {
                    true
                } else {
                    trace!(%k, "constant equality rejected");
                    self.fail(reason.into_iter().collect())
                }
            }
            1 => {
                let (x, c) = {
                    let (x, c) = e.iter().next().expect("single-term expression");
                    (x, c.clone())
                };
                let at = &DeltaRational::rational(-k) / &c;
                let res = match self.set_lb(x, at.clone(), reason) {
                    Ok(()) => self.set_ub(x, at, reason),
                    Err(err) => Err(err),
                };
                self.finish_bound(res)
            }
            _ => {
                let s = self.new_slack(&e);
                let at = DeltaRational::rational(-k);
                let res = match self.set_lb(s, at.clone(), reason) {
                    Ok(()) => self.set_ub(s, at, reason),
                    Err(err) => Err(err),
                };
                self.finish_bound(res)
            }
        }
    }

    /// Assert `lhs > rhs` (strict) or `lhs ≥ rhs`.
    pub fn new_gt(
        &mut self,
        lhs: &LinExpr,
        rhs: &LinExpr,
        strict: bool,
        reason: Option<ConstraintId>,
    ) -> bool {
        self.new_lt(rhs, lhs, strict, reason)
    }

    /// Remove every bound entry justified by `reason`.
    ///
    /// Effective bounds return to what they would have been had the
    /// constraint never been asserted. Retracting a constraint that
    /// recorded nothing (for instance a tautology) is a no-op.
    pub fn retract(&mut self, reason: ConstraintId) {
        let Some(refs) = self.retract_index.remove(&reason) else {
            return;
        };
        for r in refs {
            let state = &mut self.vars[r.var.index()];
            match r.side {
                BoundSide::Lower => state.retract_lb(&r.at, reason),
                BoundSide::Upper => state.retract_ub(&r.at, reason),
            }
        }
        self.stats.retractions += 1;
        debug!(%reason, "retracted constraint");
    }

    /// Restore every basic variable into its bounds, or report a conflict.
    ///
    /// Returns `true` when a model exists (readable through
    /// [`Solver::value`]); otherwise `false` with [`Solver::conflict`]
    /// populated by a sufficient set of constraints. Idempotent: a second
    /// call with no intervening assertion performs zero pivots.
    pub fn check(&mut self) -> bool {
        self.conflict.clear();
        self.stats.checks += 1;
        loop {
            let Some((xi, need_raise)) = self.first_violation() else {
                debug!(pivots = self.stats.pivots, "check: feasible");
                return true;
            };
            match self.select_pivot(xi, need_raise) {
                Some(xj) => {
                    let target = if need_raise {
                        self.lb(xi).cloned()
                    } else {
                        self.ub(xi).cloned()
                    }
                    .expect("violated bound must exist");
                    self.pivot_and_update(xi, xj, target);
                }
                None => {
                    self.conflict = self.explain_violation(xi, need_raise);
                    self.stats.conflicts += 1;
                    debug!(row = %xi, "check: infeasible");
                    return false;
                }
            }
        }
    }

    /// Verify the invariants relating values, bounds, rows and watches.
    ///
    /// Checks that rows are constant-free over non-basic variables, that
    /// each basic value equals its row's value, that the watch index is
    /// exact, and that every non-basic variable sits within its bounds.
    /// Intended for tests and debugging.
    pub fn check_invariants(&self) -> Result<(), String> {
        self.tableau.check_consistency()?;
        for (b, row) in self.tableau.rows() {
            let expect = self.expr_value(row);
            if &expect != self.value(b) {
                return Err(format!(
                    "row {b} value mismatch: stored {} vs row {}",
                    self.value(b),
                    expect
                ));
            }
        }
        for i in 0..self.vars.len() {
            let x = VarId::new(i as u32);
            if self.tableau.is_basic(x) {
                continue;
            }
            let st = &self.vars[i];
            if let Some(lb) = st.lb()
                && st.value() < lb
            {
                return Err(format!("non-basic {x} below its lower bound"));
            }
            if let Some(ub) = st.ub()
                && st.value() > ub
            {
                return Err(format!("non-basic {x} above its upper bound"));
            }
        }
        Ok(())
    }

    /// Rewrite `e` over non-basic variables by expanding tableau rows.
    fn normalize(&self, e: &mut LinExpr) {
        loop {
            let basics: SmallVec<[VarId; 8]> = e
                .support()
                .filter(|&x| self.tableau.is_basic(x))
                .collect();
            if basics.is_empty() {
                return;
            }
            for b in basics {
                if let Some(c) = e.remove_term(b) {
                    let row = self.tableau.row(b).expect("basic variable owns a row");
                    e.add_scaled(row, &c);
                }
            }
        }
    }

    /// Record a lower bound on `x`, eagerly repositioning non-basic
    /// variables that fall below it.
    fn set_lb(
        &mut self,
        x: VarId,
        at: DeltaRational,
        reason: Option<ConstraintId>,
    ) -> Result<(), BoundConflict> {
        let crossing = match self.ub(x) {
            Some(ub) => at > *ub,
            None => false,
        };
        if crossing {
            let mut reasons: FxHashSet<ConstraintId> = self.vars[x.index()].ub_reasons().collect();
            reasons.extend(reason);
            return Err(BoundConflict {
                var: x,
                reasons: sorted(reasons),
            });
        }
        self.record(x, BoundSide::Lower, at.clone(), reason);
        if !self.tableau.is_basic(x) && self.vars[x.index()].value < at {
            self.update(x, at);
        }
        Ok(())
    }

    /// Record an upper bound on `x`, eagerly repositioning non-basic
    /// variables that sit above it.
    fn set_ub(
        &mut self,
        x: VarId,
        at: DeltaRational,
        reason: Option<ConstraintId>,
    ) -> Result<(), BoundConflict> {
        let crossing = match self.lb(x) {
            Some(lb) => at < *lb,
            None => false,
        };
        if crossing {
            let mut reasons: FxHashSet<ConstraintId> = self.vars[x.index()].lb_reasons().collect();
            reasons.extend(reason);
            return Err(BoundConflict {
                var: x,
                reasons: sorted(reasons),
            });
        }
        self.record(x, BoundSide::Upper, at.clone(), reason);
        if !self.tableau.is_basic(x) && self.vars[x.index()].value > at {
            self.update(x, at);
        }
        Ok(())
    }

    fn record(
        &mut self,
        x: VarId,
        side: BoundSide,
        at: DeltaRational,
        reason: Option<ConstraintId>,
    ) {
        trace!(var = %x, ?side, bound = %at, "record bound");
        let state = &mut self.vars[x.index()];
        match side {
            BoundSide::Lower => state.record_lb(at.clone(), reason),
            BoundSide::Upper => state.record_ub(at.clone(), reason),
        }
        if let Some(c) = reason {
            self.retract_index
                .entry(c)
                .or_default()
                .push(BoundRef { var: x, side, at });
        }
        self.stats.bound_updates += 1;
    }

    /// Move the non-basic `x` to `v` and push the delta through every row
    /// watching it.
    fn update(&mut self, x: VarId, v: DeltaRational) {
        let delta = v.clone() - self.vars[x.index()].value.clone();
        let watchers: SmallVec<[VarId; 8]> = self.tableau.watchers(x).collect();
        for b in watchers {
            let c = self
                .tableau
                .row(b)
                .and_then(|r| r.coeff(x))
                .cloned()
                .expect("watcher row mentions the variable");
            let bump = &delta * &c;
            self.vars[b.index()].value += bump;
        }
        self.vars[x.index()].value = v;
    }

    /// Set the basic `xi` to `v` by moving the non-basic `xj`, then swap
    /// their roles.
    fn pivot_and_update(&mut self, xi: VarId, xj: VarId, v: DeltaRational) {
        let c = self
            .tableau
            .row(xi)
            .and_then(|r| r.coeff(xj))
            .cloned()
            .expect("pivot pair shares a row");
        let theta = &(v.clone() - self.vars[xi.index()].value.clone()) / &c;

        self.vars[xi.index()].value = v;
        self.vars[xj.index()].value += theta.clone();
        let watchers: SmallVec<[VarId; 8]> = self.tableau.watchers(xj).collect();
        for b in watchers {
            if b == xi {
                continue;
            }
            let a = self
                .tableau
                .row(b)
                .and_then(|r| r.coeff(xj))
                .cloned()
                .expect("watcher row mentions the variable");
            self.vars[b.index()].value += &theta * &a;
        }

        self.tableau.pivot(xi, xj);
        self.stats.pivots += 1;
        trace!(leaving = %xi, entering = %xj, "pivot");
    }

    /// Smallest basic variable whose value violates a bound, with the
    /// direction it must move. Row order is ascending ids: Bland's rule.
    fn first_violation(&self) -> Option<(VarId, bool)> {
        for (b, _) in self.tableau.rows() {
            let st = &self.vars[b.index()];
            if let Some(lb) = st.lb()
                && st.value() < lb
            {
                return Some((b, true));
            }
            if let Some(ub) = st.ub()
                && st.value() > ub
            {
                return Some((b, false));
            }
        }
        None
    }

    /// Smallest non-basic variable in `xi`'s row that admits motion in the
    /// required direction, or `None` when the row is stuck.
    fn select_pivot(&self, xi: VarId, need_raise: bool) -> Option<VarId> {
        let row = self.tableau.row(xi).expect("violating variable is basic");
        for (xj, c) in row.iter() {
            let st = &self.vars[xj.index()];
            let can_raise = st.ub().is_none_or(|ub| st.value() < ub);
            let can_lower = st.lb().is_none_or(|lb| st.value() > lb);
            let pos = c.is_positive();
            let admits = if need_raise {
                (pos && can_raise) || (!pos && can_lower)
            } else {
                (pos && can_lower) || (!pos && can_raise)
            };
            if admits {
                return Some(xj);
            }
        }
        None
    }

    /// The bound-following certificate for a stuck row: the reasons for
    /// the violated bound plus the reasons for the blocking bound of every
    /// variable in the row.
    fn explain_violation(&self, xi: VarId, need_raise: bool) -> Vec<ConstraintId> {
        let st_i = &self.vars[xi.index()];
        let mut reasons: FxHashSet<ConstraintId> = if need_raise {
            st_i.lb_reasons().collect()
        } else {
            st_i.ub_reasons().collect()
        };
        let row = self.tableau.row(xi).expect("violating variable is basic");
        for (xj, c) in row.iter() {
            let st = &self.vars[xj.index()];
            if c.is_positive() == need_raise {
                reasons.extend(st.ub_reasons());
            } else {
                reasons.extend(st.lb_reasons());
            }
        }
        sorted(reasons)
    }

    fn finish_bound(&mut self, res: Result<(), BoundConflict>) -> bool {
        match res {
            Ok(()) => true,
            Err(c) => {
                debug!(var = %c.var, "assertion rejected");
                self.fail(c.reasons)
            }
        }
    }

    fn fail(&mut self, reasons: Vec<ConstraintId>) -> bool {
        self.conflict = reasons;
        self.stats.conflicts += 1;
        false
    }
}

impl fmt::Display for Solver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for i in 0..self.vars.len() {
            let x = VarId::new(i as u32);
            let st = &self.vars[i];
            write!(f, "{x} = {} [", st.value())?;
            match st.lb() {
                Some(lb) => write!(f, "{lb}, ")?,
                None => write!(f, "-inf, ")?,
            }
            match st.ub() {
                Some(ub) => writeln!(f, "{ub}]")?,
                None => writeln!(f, "+inf]")?,
            }
        }
        for (b, row) in self.tableau.rows() {
            writeln!(f, "{b} := {row}")?;
        }
        Ok(())
    }
}

fn strict_delta(strict: bool) -> BigRational {
    if strict {
        -BigRational::one()
    } else {
        BigRational::zero()
    }
}

fn sorted(set: FxHashSet<ConstraintId>) -> Vec<ConstraintId> {
    let mut v: Vec<_> = set.into_iter().collect();
    v.sort_unstable();
    v
}
