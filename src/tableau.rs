//! Sparse simplex tableau in solved form.
//!
//! Every basic variable owns one row `b = Σ cᵢ·xᵢ` over non-basic
//! variables with no constant term. The reverse watch index records, for
//! each variable, the set of rows whose expression mentions it; pivots
//! therefore touch `|watchers(n)|` rows instead of the whole tableau.
//! Rows are kept in an ordered map so the feasibility loop scans them in
//! ascending variable order, which is exactly Bland's rule.

use crate::VarId;
use crate::expr::LinExpr;
use num_rational::BigRational;
use num_traits::Zero;
use rustc_hash::FxHashSet;
use smallvec::SmallVec;
use std::collections::BTreeMap;

/// The tableau: solved-form rows plus the reverse watch index.
#[derive(Clone, Debug, Default)]
pub struct Tableau {
    rows: BTreeMap<VarId, LinExpr>,
    watches: Vec<FxHashSet<VarId>>,
}

impl Tableau {
    /// An empty tableau.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make room in the watch index for variable `x`.
    pub(crate) fn register_var(&mut self, x: VarId) {
        while self.watches.len() <= x.index() {
            self.watches.push(FxHashSet::default());
        }
    }

    /// Whether `x` currently owns a row.
    #[must_use]
    pub fn is_basic(&self, x: VarId) -> bool {
        self.rows.contains_key(&x)
    }

    /// The row owned by `b`, if `b` is basic.
    #[must_use]
    pub fn row(&self, b: VarId) -> Option<&LinExpr> {
        self.rows.get(&b)
    }

    /// Iterate over `(basic, row)` pairs in ascending variable order.
    pub fn rows(&self) -> impl Iterator<Item = (VarId, &LinExpr)> {
        self.rows.iter().map(|(&b, e)| (b, e))
    }

    /// Number of rows.
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// Iterate over the basic variables whose rows mention `x`.
    pub fn watchers(&self, x: VarId) -> impl Iterator<Item = VarId> + '_ {
        self.watches[x.index()].iter().copied()
    }

    /// Install `expr` as the row owned by `b`.
    ///
    /// `b` must be non-basic and `expr` must have no constant term.
    pub(crate) fn install_row(&mut self, b: VarId, expr: LinExpr) {
        debug_assert!(!self.is_basic(b), "install_row target is already basic");
        debug_assert!(
            expr.constant_term().is_zero(),
            "rows must not carry a constant term"
        );
        for (x, _) in expr.iter() {
            self.watches[x.index()].insert(b);
        }
        self.rows.insert(b, expr);
    }

    /// Swap the basic/non-basic roles of `b` and `n`.
    ///
    /// `b` must be basic, `n` non-basic with a nonzero coefficient in
    /// `b`'s row. Every other row mentioning `n` is rewritten in terms of
    /// the new solved form, dropping terms that cancel.
    pub(crate) fn pivot(&mut self, b: VarId, n: VarId) {
        let mut row = self.rows.remove(&b).expect("pivot source must be basic");
        for (x, _) in row.iter() {
            self.watches[x.index()].remove(&b);
        }
        let c = row
            .remove_term(n)
            .expect("pivot target must occur in the source row");

        // b = c·n + rest   becomes   n = (1/c)·b - (1/c)·rest
        let inv = c.recip();
        let mut solved = row;
        solved.scale(&-inv.clone());
        solved.add_term(b, inv);

        let dependents: SmallVec<[VarId; 8]> = self.watches[n.index()].iter().copied().collect();
        for r in dependents {
            let a = self
                .rows
                .get_mut(&r)
                .expect("watch index names a missing row")
                .remove_term(n)
                .expect("watched row does not mention the watched variable");
            self.watches[n.index()].remove(&r);
            self.add_scaled_to_row(r, &solved, &a);
        }

        self.install_row(n, solved);
    }

    /// Add `factor · src` into row `r`, keeping the watch index in step
    /// with terms that appear or cancel.
    fn add_scaled_to_row(&mut self, r: VarId, src: &LinExpr, factor: &BigRational) {
        let row = self.rows.get_mut(&r).expect("target row must exist");
        for (x, c) in src.iter() {
            let had = row.coeff(x).is_some();
            row.add_term(x, factor * c);
            let has = row.coeff(x).is_some();
            if had != has {
                if has {
                    self.watches[x.index()].insert(r);
                } else {
                    self.watches[x.index()].remove(&r);
                }
            }
        }
    }

    /// Verify the structural invariants tying rows and watches together.
    ///
    /// Every row must be constant-free, mention only non-basic variables,
    /// and agree exactly with the watch index. Intended for tests and
    /// debugging.
    pub fn check_consistency(&self) -> Result<(), String> {
        for (&b, row) in &self.rows {
            if !row.constant_term().is_zero() {
                return Err(format!("row {b} carries a constant term"));
            }
            for (x, c) in row.iter() {
                if c.is_zero() {
                    return Err(format!("row {b} stores a zero coefficient for {x}"));
                }
                if self.rows.contains_key(&x) {
                    return Err(format!("row {b} mentions basic variable {x}"));
                }
                if !self.watches[x.index()].contains(&b) {
                    return Err(format!("missing watch {x} -> {b}"));
                }
            }
        }
        for (i, ws) in self.watches.iter().enumerate() {
            let x = VarId::new(i as u32);
            for &b in ws {
                match self.rows.get(&b) {
                    Some(row) if row.coeff(x).is_some() => {}
                    _ => return Err(format!("stale watch {x} -> {b}")),
                }
            }
        }
        Ok(())
    }
}
