//! Core module - foundational math and precision handling
//!
//! Vector type aliases, the circumcircle construction used by three-point
//! arcs, and the precision constants geometric comparisons run on.

pub mod math;
pub mod precision;

// Re-export commonly used types
pub use math::{circle_center_from_three_points, Vector2, Vector3};
pub use precision::{EPSILON, TAU};
