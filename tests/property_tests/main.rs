//! Property-based test entry point.
//!
//! This suite checks:
//! - Models returned by a satisfiable `check` satisfy every assertion
//! - Bounds always bracket non-basic values and the watch index stays
//!   exact across arbitrary operation sequences
//! - Slack introduction is idempotent per canonical form

mod feasibility_properties;
