//! Precision constants for sketch geometry
//!
//! Exact equality of `f64` values is meaningless for solved geometry;
//! geometric comparisons in the crate go through these tolerances.

use std::f64::consts::PI;

/// Default tolerance for geometric degeneracy checks (1e-9)
pub const EPSILON: f64 = 1e-9;

/// Two times PI
pub const TAU: f64 = 2.0 * PI;
