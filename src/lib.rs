//! Incremental linear rational arithmetic feasibility solver.
//!
//! `linfeas` decides whether a conjunction of linear constraints over
//! rational-valued variables is satisfiable. When it is, every variable
//! carries a model value; when it is not, the solver reports a conflicting
//! subset of the asserted constraints so a host reasoner can backtrack.
//! The engine is the general simplex for SMT (Dutertre & de Moura):
//!
//! - Exact arithmetic throughout: [`num_rational::BigRational`]
//!   coefficients, with bounds extended by an infinitesimal `ε` so strict
//!   inequalities become non-strict ones
//! - Incremental assert/retract keyed by opaque [`ConstraintId`] handles
//! - A sparse tableau in solved form with a reverse watch index, so pivots
//!   touch only the rows that mention the entering variable
//! - Bland-ordered pivoting for guaranteed termination
//!
//! # Examples
//!
//! ```
//! use linfeas::{ConstraintId, LinExpr, Solver};
//! use num_rational::BigRational;
//!
//! let mut solver = Solver::new();
//! let x = solver.new_var();
//!
//! // 2·x + 3 = 7
//! let lhs = LinExpr::term(x, BigRational::from_integer(2.into()))
//!     + LinExpr::constant(BigRational::from_integer(3.into()));
//! let rhs = LinExpr::constant(BigRational::from_integer(7.into()));
//!
//! assert!(solver.new_eq(&lhs, &rhs, Some(ConstraintId::new(0))));
//! assert!(solver.check());
//! assert_eq!(
//!     *solver.value(x).real(),
//!     BigRational::from_integer(2.into()),
//! );
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod bounds;
pub mod expr;
pub mod num;
pub mod snapshot;
pub mod solver;
pub mod tableau;

pub use bounds::{BoundStack, Justification, VarState};
pub use expr::LinExpr;
pub use num::DeltaRational;
pub use snapshot::{RowSnapshot, SolverSnapshot, VarSnapshot};
pub use solver::{BoundConflict, Solver, SolverStats};
pub use tableau::Tableau;

use std::fmt;

/// Identifier of a solver variable.
///
/// Ids are dense: the n-th created variable has id `n`, and the id doubles
/// as an index into the solver's internal stores. Variables are never
/// removed, so an id stays valid for the lifetime of its solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VarId(u32);

impl VarId {
    /// Create a variable id from its raw index.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw id.
    #[must_use]
    pub const fn id(self) -> u32 {
        self.0
    }

    /// Get the id as an index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x{}", self.0)
    }
}

/// Opaque identity of an externally-owned constraint.
///
/// The solver never inspects the id; it stores it to justify bounds and
/// reports it back in conflict sets. The host allocates ids and must keep
/// each one stable until the constraint is retracted or the solver is
/// dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConstraintId(u64);

impl ConstraintId {
    /// Create a constraint id from a raw value.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConstraintId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}
