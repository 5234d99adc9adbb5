//! Mathematics module - vector aliases and planar geometry helpers
//!
//! Thin layer over nalgebra providing the vector types used by the sketch
//! plane lift and the geometric constructors. The solver itself runs on the
//! crate's own dense matrix kernel (see [`crate::matrix`]).

use nalgebra::{Vector2 as NalVector2, Vector3 as NalVector3};

use super::precision::EPSILON;

/// 2D vector (using nalgebra)
pub type Vector2 = NalVector2<f64>;

/// 3D vector (using nalgebra)
pub type Vector3 = NalVector3<f64>;

/// Find the center of the circle passing through three points.
///
/// Uses the determinant form of the circumcircle equation. Returns `None`
/// when the points are collinear and no such circle exists.
pub fn circle_center_from_three_points(
    p1: &Vector2,
    p2: &Vector2,
    p3: &Vector2,
) -> Option<Vector2> {
    let m11 = p1.x * (p2.y - p3.y) - p1.y * (p2.x - p3.x) + (p2.x * p3.y - p2.y * p3.x);

    if m11.abs() < EPSILON {
        return None;
    }

    let mag1 = p1.x * p1.x + p1.y * p1.y;
    let mag2 = p2.x * p2.x + p2.y * p2.y;
    let mag3 = p3.x * p3.x + p3.y * p3.y;

    let m12 = mag1 * (p2.y - p3.y) - p1.y * (mag2 - mag3) + (mag2 * p3.y - mag3 * p2.y);
    let m13 = mag1 * (p2.x - p3.x) - p1.x * (mag2 - mag3) + (mag2 * p3.x - mag3 * p2.x);

    Some(Vector2::new(0.5 * (m12 / m11), -0.5 * (m13 / m11)))
}
