//! Residual function catalog
//!
//! Every constraint in the sketch reduces to one of the scalar residual
//! functions below. Each function kind evaluates `r(x_local)` over a fixed
//! number of local parameters and exposes its analytic gradient
//! `∇r(x_local)`. The residual is zero exactly when the geometric relation
//! holds, so the merit function can sum weighted squares over them.

use serde::{Deserialize, Serialize};

/// Identifies one residual function and its local parameter layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FunctionKind {
    /// `‖p1 − p2‖ − d` over `(p1s, p1t, p2s, p2t, d)`
    DistancePoint2d,
    /// `cosθ_actual − cosθ` over two line endpoint pairs plus the angle
    AngleLine2dInterior,
    /// `cosθ_actual + cosθ` over two line endpoint pairs plus the angle
    AngleLine2dExterior,
    /// `(t1·t2)² − 1` over two unit tangent vectors `(s1, t1, s2, t2)`
    TangentEdge2d,
    /// `cos²θ_between − 1` over two line endpoint pairs
    ParallelLine2d,
    /// `s_center + r·cosθ` over `(s_center, r, θ)`; an arc endpoint s-coordinate
    Arc2dPointS,
    /// `t_center + r·sinθ` over `(t_center, r, θ)`; an arc endpoint t-coordinate
    Arc2dPointT,
    /// `sinθ` over `(θ)`; s-component of an arc tangent vector
    Arc2dTangentS,
    /// `−cosθ` over `(θ)`; t-component of an arc tangent vector
    Arc2dTangentT,
    /// `(p1s − p2s)/‖p1 − p2‖` over `(p1s, p1t, p2s, p2t)`; line tangent at point 1
    Point2dTangent1S,
    /// `(p1t − p2t)/‖p1 − p2‖` over `(p1s, p1t, p2s, p2t)`
    Point2dTangent1T,
    /// `(p2s − p1s)/‖p1 − p2‖` over `(p1s, p1t, p2s, p2t)`; line tangent at point 2
    Point2dTangent2S,
    /// `(p2t − p1t)/‖p1 − p2‖` over `(p1s, p1t, p2s, p2t)`
    Point2dTangent2T,
    /// `(t_line × (p − p_line1))²/‖t_line‖² − d²` over
    /// `(ps, pt, l1s, l1t, l2s, l2t, d)`
    DistancePointLine2d,
    /// `a − b` over `(a, b)`; horizontal/vertical coordinate equality
    HoriVert2d,
}

impl FunctionKind {
    /// Factory name of this function
    pub fn name(&self) -> &'static str {
        match self {
            FunctionKind::DistancePoint2d => "distance_point_2d",
            FunctionKind::AngleLine2dInterior => "angle_line_2d_interior",
            FunctionKind::AngleLine2dExterior => "angle_line_2d_exterior",
            FunctionKind::TangentEdge2d => "tangent_edge_2d",
            FunctionKind::ParallelLine2d => "parallel_line_2d",
            FunctionKind::Arc2dPointS => "arc2d_point_s",
            FunctionKind::Arc2dPointT => "arc2d_point_t",
            FunctionKind::Arc2dTangentS => "arc2d_tangent_s",
            FunctionKind::Arc2dTangentT => "arc2d_tangent_t",
            FunctionKind::Point2dTangent1S => "point2d_tangent1_s",
            FunctionKind::Point2dTangent1T => "point2d_tangent1_t",
            FunctionKind::Point2dTangent2S => "point2d_tangent2_s",
            FunctionKind::Point2dTangent2T => "point2d_tangent2_t",
            FunctionKind::DistancePointLine2d => "distance_point_line_2d",
            FunctionKind::HoriVert2d => "hori_vert_2d",
        }
    }

    /// Look up a function kind by its factory name
    pub fn from_name(name: &str) -> Option<FunctionKind> {
        match name {
            "distance_point_2d" => Some(FunctionKind::DistancePoint2d),
            "angle_line_2d_interior" => Some(FunctionKind::AngleLine2dInterior),
            "angle_line_2d_exterior" => Some(FunctionKind::AngleLine2dExterior),
            "tangent_edge_2d" => Some(FunctionKind::TangentEdge2d),
            "parallel_line_2d" => Some(FunctionKind::ParallelLine2d),
            "arc2d_point_s" => Some(FunctionKind::Arc2dPointS),
            "arc2d_point_t" => Some(FunctionKind::Arc2dPointT),
            "arc2d_tangent_s" => Some(FunctionKind::Arc2dTangentS),
            "arc2d_tangent_t" => Some(FunctionKind::Arc2dTangentT),
            "point2d_tangent1_s" => Some(FunctionKind::Point2dTangent1S),
            "point2d_tangent1_t" => Some(FunctionKind::Point2dTangent1T),
            "point2d_tangent2_s" => Some(FunctionKind::Point2dTangent2S),
            "point2d_tangent2_t" => Some(FunctionKind::Point2dTangent2T),
            "distance_point_line_2d" => Some(FunctionKind::DistancePointLine2d),
            "hori_vert_2d" => Some(FunctionKind::HoriVert2d),
            _ => None,
        }
    }

    /// Number of local parameters this function consumes
    pub fn arity(&self) -> usize {
        match self {
            FunctionKind::DistancePoint2d => 5,
            FunctionKind::AngleLine2dInterior => 9,
            FunctionKind::AngleLine2dExterior => 9,
            FunctionKind::TangentEdge2d => 4,
            FunctionKind::ParallelLine2d => 8,
            FunctionKind::Arc2dPointS => 3,
            FunctionKind::Arc2dPointT => 3,
            FunctionKind::Arc2dTangentS => 1,
            FunctionKind::Arc2dTangentT => 1,
            FunctionKind::Point2dTangent1S => 4,
            FunctionKind::Point2dTangent1T => 4,
            FunctionKind::Point2dTangent2S => 4,
            FunctionKind::Point2dTangent2T => 4,
            FunctionKind::DistancePointLine2d => 7,
            FunctionKind::HoriVert2d => 2,
        }
    }

    /// Evaluate the residual over the local parameter vector.
    ///
    /// `params` must hold exactly [`Self::arity`] values; slots follow the
    /// layout documented on each variant.
    pub fn value_self(&self, params: &[f64]) -> f64 {
        debug_assert_eq!(params.len(), self.arity());
        match self {
            FunctionKind::DistancePoint2d => {
                let (p1s, p1t, p2s, p2t, distance) =
                    (params[0], params[1], params[2], params[3], params[4]);
                ((p1s - p2s).powi(2) + (p1t - p2t).powi(2)).sqrt() - distance
            }
            FunctionKind::AngleLine2dInterior => {
                let (d1s, d1t, d2s, d2t) = line_pair_deltas(params);
                let angle = params[8];
                let dot = d1s * d2s + d1t * d2t;
                let len1 = (d1s * d1s + d1t * d1t).sqrt();
                let len2 = (d2s * d2s + d2t * d2t).sqrt();
                dot / (len1 * len2) - angle.cos()
            }
            FunctionKind::AngleLine2dExterior => {
                let (d1s, d1t, d2s, d2t) = line_pair_deltas(params);
                let angle = params[8];
                let dot = d1s * d2s + d1t * d2t;
                let len1 = (d1s * d1s + d1t * d1t).sqrt();
                let len2 = (d2s * d2s + d2t * d2t).sqrt();
                dot / (len1 * len2) + angle.cos()
            }
            FunctionKind::TangentEdge2d => {
                let (s1, t1, s2, t2) = (params[0], params[1], params[2], params[3]);
                (s1 * s2 + t1 * t2).powi(2) - 1.0
            }
            FunctionKind::ParallelLine2d => {
                let (d1s, d1t, d2s, d2t) = line_pair_deltas(params);
                let dot = d1s * d2s + d1t * d2t;
                let m1 = d1s * d1s + d1t * d1t;
                let m2 = d2s * d2s + d2t * d2t;
                dot * dot / (m1 * m2) - 1.0
            }
            FunctionKind::Arc2dPointS => {
                let (s_center, radius, theta) = (params[0], params[1], params[2]);
                s_center + radius * theta.cos()
            }
            FunctionKind::Arc2dPointT => {
                let (t_center, radius, theta) = (params[0], params[1], params[2]);
                t_center + radius * theta.sin()
            }
            FunctionKind::Arc2dTangentS => params[0].sin(),
            FunctionKind::Arc2dTangentT => -params[0].cos(),
            FunctionKind::Point2dTangent1S => {
                let (ds, dt) = point_pair_deltas(params);
                ds / (ds * ds + dt * dt).sqrt()
            }
            FunctionKind::Point2dTangent1T => {
                let (ds, dt) = point_pair_deltas(params);
                dt / (ds * ds + dt * dt).sqrt()
            }
            FunctionKind::Point2dTangent2S => {
                let (ds, dt) = point_pair_deltas(params);
                -ds / (ds * ds + dt * dt).sqrt()
            }
            FunctionKind::Point2dTangent2T => {
                let (ds, dt) = point_pair_deltas(params);
                -dt / (ds * ds + dt * dt).sqrt()
            }
            FunctionKind::DistancePointLine2d => {
                let (cross, len_sq, distance) = point_line_terms(params);
                cross * cross / len_sq - distance * distance
            }
            FunctionKind::HoriVert2d => params[0] - params[1],
        }
    }

    /// Evaluate the analytic gradient over the local parameter vector
    pub fn gradient_self(&self, params: &[f64]) -> Vec<f64> {
        debug_assert_eq!(params.len(), self.arity());
        match self {
            FunctionKind::DistancePoint2d => {
                let (p1s, p1t, p2s, p2t) = (params[0], params[1], params[2], params[3]);
                let len = ((p1s - p2s).powi(2) + (p1t - p2t).powi(2)).sqrt();
                vec![
                    (p1s - p2s) / len,
                    (p1t - p2t) / len,
                    (p2s - p1s) / len,
                    (p2t - p1t) / len,
                    -1.0,
                ]
            }
            FunctionKind::AngleLine2dInterior | FunctionKind::AngleLine2dExterior => {
                let (d1s, d1t, d2s, d2t) = line_pair_deltas(params);
                let angle = params[8];
                let dot = d1s * d2s + d1t * d2t;
                let m1 = d1s * d1s + d1t * d1t;
                let m2 = d2s * d2s + d2t * d2t;
                let len1 = m1.sqrt();
                let len2 = m2.sqrt();
                let inv = 1.0 / (len1 * len2);
                let over1 = dot / (m1 * len1 * len2);
                let over2 = dot / (len1 * m2 * len2);
                let angle_term = if matches!(self, FunctionKind::AngleLine2dInterior) {
                    angle.sin()
                } else {
                    -angle.sin()
                };
                vec![
                    d2s * inv - d1s * over1,
                    d2t * inv - d1t * over1,
                    -d2s * inv + d1s * over1,
                    -d2t * inv + d1t * over1,
                    d1s * inv - d2s * over2,
                    d1t * inv - d2t * over2,
                    -d1s * inv + d2s * over2,
                    -d1t * inv + d2t * over2,
                    angle_term,
                ]
            }
            FunctionKind::TangentEdge2d => {
                let (s1, t1, s2, t2) = (params[0], params[1], params[2], params[3]);
                let dot = s1 * s2 + t1 * t2;
                vec![2.0 * s2 * dot, 2.0 * t2 * dot, 2.0 * s1 * dot, 2.0 * t1 * dot]
            }
            FunctionKind::ParallelLine2d => {
                let (d1s, d1t, d2s, d2t) = line_pair_deltas(params);
                let dot = d1s * d2s + d1t * d2t;
                let m1 = d1s * d1s + d1t * d1t;
                let m2 = d2s * d2s + d2t * d2t;
                let lin = 2.0 * dot / (m1 * m2);
                let sq1 = 2.0 * dot * dot / (m1 * m1 * m2);
                let sq2 = 2.0 * dot * dot / (m1 * m2 * m2);
                vec![
                    d2s * lin - d1s * sq1,
                    d2t * lin - d1t * sq1,
                    -d2s * lin + d1s * sq1,
                    -d2t * lin + d1t * sq1,
                    d1s * lin - d2s * sq2,
                    d1t * lin - d2t * sq2,
                    -d1s * lin + d2s * sq2,
                    -d1t * lin + d2t * sq2,
                ]
            }
            FunctionKind::Arc2dPointS => {
                let (radius, theta) = (params[1], params[2]);
                vec![1.0, theta.cos(), -radius * theta.sin()]
            }
            FunctionKind::Arc2dPointT => {
                let (radius, theta) = (params[1], params[2]);
                vec![1.0, theta.sin(), radius * theta.cos()]
            }
            FunctionKind::Arc2dTangentS => vec![params[0].cos()],
            FunctionKind::Arc2dTangentT => vec![params[0].sin()],
            FunctionKind::Point2dTangent1S => {
                let (ds, dt) = point_pair_deltas(params);
                let m = ds * ds + dt * dt;
                let len = m.sqrt();
                let len3 = m * len;
                vec![
                    1.0 / len - ds * ds / len3,
                    -ds * dt / len3,
                    -1.0 / len + ds * ds / len3,
                    ds * dt / len3,
                ]
            }
            FunctionKind::Point2dTangent1T => {
                let (ds, dt) = point_pair_deltas(params);
                let m = ds * ds + dt * dt;
                let len = m.sqrt();
                let len3 = m * len;
                vec![
                    -ds * dt / len3,
                    1.0 / len - dt * dt / len3,
                    ds * dt / len3,
                    -1.0 / len + dt * dt / len3,
                ]
            }
            FunctionKind::Point2dTangent2S => {
                let (ds, dt) = point_pair_deltas(params);
                let m = ds * ds + dt * dt;
                let len = m.sqrt();
                let len3 = m * len;
                vec![
                    -1.0 / len + ds * ds / len3,
                    ds * dt / len3,
                    1.0 / len - ds * ds / len3,
                    -ds * dt / len3,
                ]
            }
            FunctionKind::Point2dTangent2T => {
                let (ds, dt) = point_pair_deltas(params);
                let m = ds * ds + dt * dt;
                let len = m.sqrt();
                let len3 = m * len;
                vec![
                    ds * dt / len3,
                    -1.0 / len + dt * dt / len3,
                    -ds * dt / len3,
                    1.0 / len - dt * dt / len3,
                ]
            }
            FunctionKind::DistancePointLine2d => {
                let (ps, pt, l1s, l1t, l2s, l2t, distance) = (
                    params[0], params[1], params[2], params[3], params[4], params[5], params[6],
                );
                let (cross, len_sq, _) = point_line_terms(params);
                let cross_sq = cross * cross;
                let len_sq_sq = len_sq * len_sq;
                vec![
                    2.0 * (l2t - l1t) * cross / len_sq,
                    2.0 * (l1s - l2s) * cross / len_sq,
                    2.0 * (pt - l2t) * cross / len_sq + 2.0 * (l2s - l1s) * cross_sq / len_sq_sq,
                    2.0 * (l2s - ps) * cross / len_sq + 2.0 * (l2t - l1t) * cross_sq / len_sq_sq,
                    2.0 * (l1t - pt) * cross / len_sq + 2.0 * (l1s - l2s) * cross_sq / len_sq_sq,
                    2.0 * (ps - l1s) * cross / len_sq + 2.0 * (l1t - l2t) * cross_sq / len_sq_sq,
                    -2.0 * distance,
                ]
            }
            FunctionKind::HoriVert2d => vec![1.0, -1.0],
        }
    }
}

/// Endpoint deltas for a pair of lines laid out as
/// `(l1p1s, l1p1t, l1p2s, l1p2t, l2p1s, l2p1t, l2p2s, l2p2t, ...)`
#[inline]
fn line_pair_deltas(params: &[f64]) -> (f64, f64, f64, f64) {
    (
        params[0] - params[2],
        params[1] - params[3],
        params[4] - params[6],
        params[5] - params[7],
    )
}

/// Deltas for a point pair laid out as `(p1s, p1t, p2s, p2t)`
#[inline]
fn point_pair_deltas(params: &[f64]) -> (f64, f64) {
    (params[0] - params[2], params[1] - params[3])
}

/// Shared terms of the point-line distance residual:
/// the cross product of the line tangent with the point offset, the
/// squared line length, and the target distance.
#[inline]
fn point_line_terms(params: &[f64]) -> (f64, f64, f64) {
    let (ps, pt, l1s, l1t, l2s, l2t, distance) = (
        params[0], params[1], params[2], params[3], params[4], params[5], params[6],
    );
    let cross = (l1t - pt) * (l2s - l1s) - (l1s - ps) * (l2t - l1t);
    let len_sq = (l2s - l1s).powi(2) + (l2t - l1t).powi(2);
    (cross, len_sq, distance)
}
