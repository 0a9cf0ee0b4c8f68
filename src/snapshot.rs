//! Serializable snapshots of solver state.
//!
//! A snapshot is a read-only rendering of the variables (value plus
//! effective bounds) and the tableau rows, suitable for JSON export or
//! diagnostics. Numeric fields are canonical strings — exact, readable,
//! and stable across platforms — with the `ε` coefficient included only
//! when it is nonzero.

use crate::VarId;
use crate::solver::Solver;
use serde::Serialize;

/// Snapshot of one variable.
#[derive(Clone, Debug, Serialize)]
pub struct VarSnapshot {
    /// Variable id.
    pub id: u32,
    /// Current value.
    pub value: String,
    /// Effective lower bound, absent when unbounded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lb: Option<String>,
    /// Effective upper bound, absent when unbounded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ub: Option<String>,
}

/// Snapshot of one tableau row.
#[derive(Clone, Debug, Serialize)]
pub struct RowSnapshot {
    /// Basic variable owning the row.
    pub basic: u32,
    /// The row expression.
    pub expr: String,
}

/// Full solver state snapshot.
#[derive(Clone, Debug, Serialize)]
pub struct SolverSnapshot {
    /// All variables in id order.
    pub vars: Vec<VarSnapshot>,
    /// All tableau rows in basic-variable order.
    pub rows: Vec<RowSnapshot>,
}

impl SolverSnapshot {
    /// Render the snapshot as a JSON value.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).expect("snapshot serialization is infallible")
    }
}

impl Solver {
    /// Capture a serializable snapshot of the current state.
    #[must_use]
    pub fn snapshot(&self) -> SolverSnapshot {
        let vars = (0..self.num_vars())
            .map(|i| {
                let x = VarId::new(i as u32);
                VarSnapshot {
                    id: x.id(),
                    value: self.value(x).to_string(),
                    lb: self.lb(x).map(ToString::to_string),
                    ub: self.ub(x).map(ToString::to_string),
                }
            })
            .collect();
        let rows = self
            .tableau()
            .rows()
            .map(|(b, expr)| RowSnapshot {
                basic: b.id(),
                expr: expr.to_string(),
            })
            .collect();
        SolverSnapshot { vars, rows }
    }
}
