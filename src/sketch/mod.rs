//! Sketch facade
//!
//! A [`Sketch`] is a [`Model`] with a sketch plane and typed constructors
//! for every primitive and constraint the solver understands. The
//! constructors allocate the DOFs, wire up dependent DOFs (arc endpoints,
//! edge tangent vectors), and register everything with the model in one
//! call, so client code works in geometric terms instead of DOF ids.

use std::ops::{Deref, DerefMut};

use crate::core::math::{circle_center_from_three_points, Vector2, Vector3};
use crate::core::precision::TAU;
use crate::constraints::ConstraintKind;
use crate::dof::{Dof, DofId};
use crate::model::{Model, ModelError, Result};
use crate::primitives::{EdgeEnd, EntityId, PlaneGeometry, PrimitiveKind};
use crate::solver::{FunctionKind, SolverFunction};

/// A 2D parametric sketch on a plane
#[derive(Debug)]
pub struct Sketch {
    model: Model,
    plane: EntityId,
}

impl Deref for Sketch {
    type Target = Model;

    fn deref(&self) -> &Model {
        &self.model
    }
}

impl DerefMut for Sketch {
    fn deref_mut(&mut self) -> &mut Model {
        &mut self.model
    }
}

impl Sketch {
    /// Create a sketch on the default XY plane
    pub fn new() -> Result<Self> {
        Self::build(Model::new(), PlaneGeometry::default())
    }

    /// Create a sketch mirrored into a fresh session store
    pub fn with_session_store() -> Result<Self> {
        Self::build(Model::with_session_store(), PlaneGeometry::default())
    }

    /// Create a sketch on a caller-supplied plane
    pub fn on_plane(geometry: PlaneGeometry) -> Result<Self> {
        Self::build(Model::new(), geometry)
    }

    fn build(mut model: Model, geometry: PlaneGeometry) -> Result<Self> {
        let normal = Self::add_vector3d(&mut model, geometry.normal)?;
        let up = Self::add_vector3d(&mut model, geometry.up)?;
        let base = Self::add_point3d(&mut model, geometry.base)?;
        let plane = model.add_primitive(PrimitiveKind::SketchPlane { normal, up, base })?;
        Ok(Self { model, plane })
    }

    fn add_vector3d(model: &mut Model, v: Vector3) -> Result<EntityId> {
        let x = model.add_dof(Dof::independent(v.x, false))?;
        let y = model.add_dof(Dof::independent(v.y, false))?;
        let z = model.add_dof(Dof::independent(v.z, false))?;
        model.add_primitive(PrimitiveKind::Vector3d { x, y, z })
    }

    fn add_point3d(model: &mut Model, p: Vector3) -> Result<EntityId> {
        let x = model.add_dof(Dof::independent(p.x, false))?;
        let y = model.add_dof(Dof::independent(p.y, false))?;
        let z = model.add_dof(Dof::independent(p.z, false))?;
        model.add_primitive(PrimitiveKind::Point3d { x, y, z })
    }

    /// The sketch plane primitive
    pub fn sketch_plane(&self) -> EntityId {
        self.plane
    }

    /// The underlying model
    pub fn model(&self) -> &Model {
        &self.model
    }

    /// The underlying model, mutably
    pub fn model_mut(&mut self) -> &mut Model {
        &mut self.model
    }

    // ------------------------------------------------------------------
    // Primitive constructors
    // ------------------------------------------------------------------

    /// Add a 2D point at `(s, t)`
    pub fn add_point2d(&mut self, s: f64, t: f64, s_free: bool, t_free: bool) -> Result<EntityId> {
        let s_dof = self.model.add_dof(Dof::independent(s, s_free))?;
        let t_dof = self.model.add_dof(Dof::independent(t, t_free))?;
        self.model.add_primitive(PrimitiveKind::Point2d {
            s: s_dof,
            t: t_dof,
            plane: Some(self.plane),
        })
    }

    /// Add a line segment between two existing 2D points
    pub fn add_line2d(&mut self, point1: EntityId, point2: EntityId) -> Result<EntityId> {
        self.point_dofs(point1)?;
        self.point_dofs(point2)?;
        self.model.add_primitive(PrimitiveKind::Line2d {
            point1,
            point2,
            plane: Some(self.plane),
        })
    }

    /// Add a circular arc by center, angles, and radius.
    ///
    /// The arc registers two dependent endpoint points (computed from the
    /// center, radius, and angles) and a center point aliasing the center
    /// DOFs.
    #[allow(clippy::too_many_arguments)]
    pub fn add_arc2d(
        &mut self,
        s_center: f64,
        t_center: f64,
        theta1: f64,
        theta2: f64,
        radius: f64,
        s_center_free: bool,
        t_center_free: bool,
        theta1_free: bool,
        theta2_free: bool,
        radius_free: bool,
    ) -> Result<EntityId> {
        let sc = self.model.add_dof(Dof::independent(s_center, s_center_free))?;
        let tc = self.model.add_dof(Dof::independent(t_center, t_center_free))?;
        let th1 = self.model.add_dof(Dof::independent(theta1, theta1_free))?;
        let th2 = self.model.add_dof(Dof::independent(theta2, theta2_free))?;
        let r = self.model.add_dof(Dof::independent(radius, radius_free))?;

        let point1 = self.add_arc_endpoint(sc, tc, r, th1)?;
        let point2 = self.add_arc_endpoint(sc, tc, r, th2)?;
        let center_point = self.model.add_primitive(PrimitiveKind::Point2d {
            s: sc,
            t: tc,
            plane: Some(self.plane),
        })?;

        self.model.add_primitive(PrimitiveKind::Arc2d {
            s_center: sc,
            t_center: tc,
            theta1: th1,
            theta2: th2,
            radius: r,
            point1,
            point2,
            center_point,
            plane: Some(self.plane),
        })
    }

    /// Dependent endpoint of an arc at angle `theta`
    fn add_arc_endpoint(
        &mut self,
        s_center: DofId,
        t_center: DofId,
        radius: DofId,
        theta: DofId,
    ) -> Result<EntityId> {
        let s_fn =
            SolverFunction::new(FunctionKind::Arc2dPointS, vec![s_center, radius, theta])?;
        let t_fn =
            SolverFunction::new(FunctionKind::Arc2dPointT, vec![t_center, radius, theta])?;
        let s_dof = self.model.add_dof(Dof::dependent(s_fn))?;
        let t_dof = self.model.add_dof(Dof::dependent(t_fn))?;
        self.model.add_primitive(PrimitiveKind::Point2d {
            s: s_dof,
            t: t_dof,
            plane: Some(self.plane),
        })
    }

    /// Add an arc through three points: endpoints first and third, with
    /// the second selecting the swept side.
    ///
    /// Fails without touching the model when the points are collinear.
    #[allow(clippy::too_many_arguments)]
    pub fn add_arc2d_three_point(
        &mut self,
        point1: (f64, f64),
        point2: (f64, f64),
        point3: (f64, f64),
        s_center_free: bool,
        t_center_free: bool,
        theta1_free: bool,
        theta2_free: bool,
        radius_free: bool,
    ) -> Result<EntityId> {
        let p1 = Vector2::new(point1.0, point1.1);
        let p2 = Vector2::new(point2.0, point2.1);
        let p3 = Vector2::new(point3.0, point3.1);

        let center = circle_center_from_three_points(&p1, &p2, &p3).ok_or(
            ModelError::DegenerateGeometry("three collinear points do not define an arc"),
        )?;
        let radius = (p1 - center).norm();

        let mut theta1 = (p1.y - center.y).atan2(p1.x - center.x);
        let theta2 = (p2.y - center.y).atan2(p2.x - center.x);
        let mut theta3 = (p3.y - center.y).atan2(p3.x - center.x);

        // make the middle point land inside the swept interval
        if !((theta2 <= theta3 && theta2 >= theta1) || (theta2 <= theta1 && theta2 >= theta3)) {
            if theta3 < theta1 {
                theta3 += TAU;
            } else {
                theta1 += TAU;
            }
        }

        self.add_arc2d(
            center.x,
            center.y,
            theta1,
            theta3,
            radius,
            s_center_free,
            t_center_free,
            theta1_free,
            theta2_free,
            radius_free,
        )
    }

    /// Add a circle by center and radius, with its dependent center point
    pub fn add_circle2d(
        &mut self,
        s_center: f64,
        t_center: f64,
        radius: f64,
        s_center_free: bool,
        t_center_free: bool,
        radius_free: bool,
    ) -> Result<EntityId> {
        let sc = self.model.add_dof(Dof::independent(s_center, s_center_free))?;
        let tc = self.model.add_dof(Dof::independent(t_center, t_center_free))?;
        let r = self.model.add_dof(Dof::independent(radius, radius_free))?;
        self.add_circle2d_from_dofs(sc, tc, r)
    }

    /// Add a circle over existing DOFs, sharing them with other
    /// primitives (e.g. a circle that follows an arc's center)
    pub fn add_circle2d_from_dofs(
        &mut self,
        s_center: DofId,
        t_center: DofId,
        radius: DofId,
    ) -> Result<EntityId> {
        let center_point = self.model.add_primitive(PrimitiveKind::Point2d {
            s: s_center,
            t: t_center,
            plane: Some(self.plane),
        })?;
        self.model.add_primitive(PrimitiveKind::Circle2d {
            s_center,
            t_center,
            radius,
            center_point,
            plane: Some(self.plane),
        })
    }

    // ------------------------------------------------------------------
    // Constraint constructors
    // ------------------------------------------------------------------

    /// Constrain the distance between two points
    pub fn add_distance_point2d(
        &mut self,
        point1: EntityId,
        point2: EntityId,
        distance: f64,
    ) -> Result<EntityId> {
        let (p1s, p1t) = self.point_dofs(point1)?;
        let (p2s, p2t) = self.point_dofs(point2)?;
        let d = self.model.add_dof(Dof::independent(distance, false))?;
        let function = SolverFunction::new(
            FunctionKind::DistancePoint2d,
            vec![p1s, p1t, p2s, p2t, d],
        )?;
        self.model.add_constraint(
            ConstraintKind::DistancePoint2d {
                point1,
                point2,
                distance: d,
            },
            function,
        )
    }

    /// Constrain two points to their current distance
    pub fn add_distance_point2d_measured(
        &mut self,
        point1: EntityId,
        point2: EntityId,
    ) -> Result<EntityId> {
        let distance = self.measured_distance(point1, point2)?;
        self.add_distance_point2d(point1, point2, distance)
    }

    /// Constrain the distance from a point to an infinite line
    pub fn add_distance_point_line2d(
        &mut self,
        point: EntityId,
        line: EntityId,
        distance: f64,
    ) -> Result<EntityId> {
        let (ps, pt) = self.point_dofs(point)?;
        let (l1s, l1t, l2s, l2t) = self.line_dofs(line)?;
        let d = self.model.add_dof(Dof::independent(distance, false))?;
        let function = SolverFunction::new(
            FunctionKind::DistancePointLine2d,
            vec![ps, pt, l1s, l1t, l2s, l2t, d],
        )?;
        self.model.add_constraint(
            ConstraintKind::DistancePointLine2d {
                point,
                line,
                distance: d,
            },
            function,
        )
    }

    /// Constrain two lines parallel
    pub fn add_parallel_line2d(&mut self, line1: EntityId, line2: EntityId) -> Result<EntityId> {
        let (a1s, a1t, a2s, a2t) = self.line_dofs(line1)?;
        let (b1s, b1t, b2s, b2t) = self.line_dofs(line2)?;
        let function = SolverFunction::new(
            FunctionKind::ParallelLine2d,
            vec![a1s, a1t, a2s, a2t, b1s, b1t, b2s, b2t],
        )?;
        self.model
            .add_constraint(ConstraintKind::ParallelLine2d { line1, line2 }, function)
    }

    /// Constrain a line horizontal (equal t) or vertical (equal s)
    pub fn add_hori_vert_line2d(&mut self, line: EntityId, vertical: bool) -> Result<EntityId> {
        let (p1s, p1t, p2s, p2t) = self.line_dofs(line)?;
        let pair = if vertical { vec![p1s, p2s] } else { vec![p1t, p2t] };
        let function = SolverFunction::new(FunctionKind::HoriVert2d, pair)?;
        self.model
            .add_constraint(ConstraintKind::HoriVertLine2d { line, vertical }, function)
    }

    /// Constrain the angle between two lines (radians)
    pub fn add_angle_line2d(
        &mut self,
        line1: EntityId,
        line2: EntityId,
        angle: f64,
        interior: bool,
    ) -> Result<EntityId> {
        let (a1s, a1t, a2s, a2t) = self.line_dofs(line1)?;
        let (b1s, b1t, b2s, b2t) = self.line_dofs(line2)?;
        let angle_dof = self.model.add_dof(Dof::independent(angle, false))?;
        let kind = if interior {
            FunctionKind::AngleLine2dInterior
        } else {
            FunctionKind::AngleLine2dExterior
        };
        let function = SolverFunction::new(
            kind,
            vec![a1s, a1t, a2s, a2t, b1s, b1t, b2s, b2t, angle_dof],
        )?;
        self.model.add_constraint(
            ConstraintKind::AngleLine2d {
                line1,
                line2,
                angle: angle_dof,
                interior,
            },
            function,
        )
    }

    /// Constrain two lines to their current angle
    pub fn add_angle_line2d_measured(
        &mut self,
        line1: EntityId,
        line2: EntityId,
        interior: bool,
    ) -> Result<EntityId> {
        let angle = self.measured_angle(line1, line2, interior)?;
        self.add_angle_line2d(line1, line2, angle, interior)
    }

    /// Constrain two edges (lines or arcs) tangent where the chosen ends
    /// meet.
    ///
    /// Each edge contributes a dependent unit tangent vector at its end;
    /// the constraint drives the two tangents (anti)parallel.
    pub fn add_tangent_edge2d(
        &mut self,
        edge1: EntityId,
        end1: EdgeEnd,
        edge2: EntityId,
        end2: EdgeEnd,
    ) -> Result<EntityId> {
        let (t1s, t1t) = self.edge_tangent_dofs(edge1, end1)?;
        let (t2s, t2t) = self.edge_tangent_dofs(edge2, end2)?;
        let function =
            SolverFunction::new(FunctionKind::TangentEdge2d, vec![t1s, t1t, t2s, t2t])?;
        self.model.add_constraint(
            ConstraintKind::TangentEdge2d {
                edge1,
                end1,
                edge2,
                end2,
            },
            function,
        )
    }

    /// Dependent unit tangent components of an edge at one of its ends
    fn edge_tangent_dofs(&mut self, edge: EntityId, end: EdgeEnd) -> Result<(DofId, DofId)> {
        let kind = self
            .model
            .primitive(edge)
            .ok_or(ModelError::UnknownEntity(edge))?
            .kind()
            .clone();
        match kind {
            PrimitiveKind::Line2d { point1, point2, .. } => {
                let (p1s, p1t) = self.point_dofs(point1)?;
                let (p2s, p2t) = self.point_dofs(point2)?;
                let (s_kind, t_kind) = match end {
                    EdgeEnd::Start => (FunctionKind::Point2dTangent1S, FunctionKind::Point2dTangent1T),
                    EdgeEnd::End => (FunctionKind::Point2dTangent2S, FunctionKind::Point2dTangent2T),
                };
                let s_fn = SolverFunction::new(s_kind, vec![p1s, p1t, p2s, p2t])?;
                let t_fn = SolverFunction::new(t_kind, vec![p1s, p1t, p2s, p2t])?;
                let s_dof = self.model.add_dof(Dof::dependent(s_fn))?;
                let t_dof = self.model.add_dof(Dof::dependent(t_fn))?;
                Ok((s_dof, t_dof))
            }
            PrimitiveKind::Arc2d { theta1, theta2, .. } => {
                let theta = match end {
                    EdgeEnd::Start => theta1,
                    EdgeEnd::End => theta2,
                };
                let s_fn = SolverFunction::new(FunctionKind::Arc2dTangentS, vec![theta])?;
                let t_fn = SolverFunction::new(FunctionKind::Arc2dTangentT, vec![theta])?;
                let s_dof = self.model.add_dof(Dof::dependent(s_fn))?;
                let t_dof = self.model.add_dof(Dof::dependent(t_fn))?;
                Ok((s_dof, t_dof))
            }
            _ => Err(ModelError::WrongEntityKind(edge)),
        }
    }

    // ------------------------------------------------------------------
    // Measurement helpers
    // ------------------------------------------------------------------

    /// Sketch-plane coordinates of a 2D point
    pub fn point_position(&self, point: EntityId) -> Result<(f64, f64)> {
        let (s, t) = self.point_dofs(point)?;
        Ok((self.model.dof_value(s)?, self.model.dof_value(t)?))
    }

    /// Current distance between two points
    pub fn measured_distance(&self, point1: EntityId, point2: EntityId) -> Result<f64> {
        let (s1, t1) = self.point_position(point1)?;
        let (s2, t2) = self.point_position(point2)?;
        Ok(((s1 - s2).powi(2) + (t1 - t2).powi(2)).sqrt())
    }

    /// Current angle between two lines (radians)
    pub fn measured_angle(&self, line1: EntityId, line2: EntityId, interior: bool) -> Result<f64> {
        let (a1s, a1t, a2s, a2t) = self.line_dofs(line1)?;
        let (b1s, b1t, b2s, b2t) = self.line_dofs(line2)?;
        let d1s = self.model.dof_value(a1s)? - self.model.dof_value(a2s)?;
        let d1t = self.model.dof_value(a1t)? - self.model.dof_value(a2t)?;
        let d2s = self.model.dof_value(b1s)? - self.model.dof_value(b2s)?;
        let d2t = self.model.dof_value(b1t)? - self.model.dof_value(b2t)?;
        let cos_angle = (d1s * d2s + d1t * d2t)
            / ((d1s * d1s + d1t * d1t).sqrt() * (d2s * d2s + d2t * d2t).sqrt());
        let cos_angle = if interior { cos_angle } else { -cos_angle };
        Ok(cos_angle.clamp(-1.0, 1.0).acos())
    }

    /// Lift a 2D point into global coordinates through the sketch plane
    pub fn lift_to_3d(&self, point: EntityId) -> Result<Vector3> {
        let (s, t) = self.point_position(point)?;
        let (normal, up, base) = match self
            .model
            .primitive(self.plane)
            .ok_or(ModelError::UnknownEntity(self.plane))?
            .kind()
        {
            PrimitiveKind::SketchPlane { normal, up, base } => (*normal, *up, *base),
            _ => return Err(ModelError::WrongEntityKind(self.plane)),
        };
        let normal = self.vector3d_value(normal)?;
        let up = self.vector3d_value(up)?;
        let base = self.vector3d_value(base)?;
        let s_axis = up.cross(&normal);
        Ok(base + s_axis * s + up * t)
    }

    fn vector3d_value(&self, id: EntityId) -> Result<Vector3> {
        match self
            .model
            .primitive(id)
            .ok_or(ModelError::UnknownEntity(id))?
            .kind()
        {
            PrimitiveKind::Vector3d { x, y, z } | PrimitiveKind::Point3d { x, y, z } => {
                Ok(Vector3::new(
                    self.model.dof_value(*x)?,
                    self.model.dof_value(*y)?,
                    self.model.dof_value(*z)?,
                ))
            }
            _ => Err(ModelError::WrongEntityKind(id)),
        }
    }

    /// The `(s, t)` DOFs of a 2D point
    pub fn point_dofs(&self, point: EntityId) -> Result<(DofId, DofId)> {
        match self
            .model
            .primitive(point)
            .ok_or(ModelError::UnknownEntity(point))?
            .kind()
        {
            PrimitiveKind::Point2d { s, t, .. } => Ok((*s, *t)),
            _ => Err(ModelError::WrongEntityKind(point)),
        }
    }

    /// The endpoint DOFs of a line as `(p1s, p1t, p2s, p2t)`
    pub fn line_dofs(&self, line: EntityId) -> Result<(DofId, DofId, DofId, DofId)> {
        match self
            .model
            .primitive(line)
            .ok_or(ModelError::UnknownEntity(line))?
            .kind()
        {
            PrimitiveKind::Line2d { point1, point2, .. } => {
                let (p1s, p1t) = self.point_dofs(*point1)?;
                let (p2s, p2t) = self.point_dofs(*point2)?;
                Ok((p1s, p1t, p2s, p2t))
            }
            _ => Err(ModelError::WrongEntityKind(line)),
        }
    }

    /// The endpoint and center point primitives of an arc
    pub fn arc_points(&self, arc: EntityId) -> Result<(EntityId, EntityId, EntityId)> {
        match self
            .model
            .primitive(arc)
            .ok_or(ModelError::UnknownEntity(arc))?
            .kind()
        {
            PrimitiveKind::Arc2d {
                point1,
                point2,
                center_point,
                ..
            } => Ok((*point1, *point2, *center_point)),
            _ => Err(ModelError::WrongEntityKind(arc)),
        }
    }

    /// The center `(s, t)` and radius DOFs of an arc
    pub fn arc_center_dofs(&self, arc: EntityId) -> Result<(DofId, DofId, DofId)> {
        match self
            .model
            .primitive(arc)
            .ok_or(ModelError::UnknownEntity(arc))?
            .kind()
        {
            PrimitiveKind::Arc2d {
                s_center,
                t_center,
                radius,
                ..
            } => Ok((*s_center, *t_center, *radius)),
            _ => Err(ModelError::WrongEntityKind(arc)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    #[test]
    fn test_point_roundtrip() {
        let mut sketch = Sketch::new().unwrap();
        let point = sketch.add_point2d(1.5, -2.0, true, true).unwrap();
        let (s, t) = sketch.point_position(point).unwrap();
        assert_relative_eq!(s, 1.5);
        assert_relative_eq!(t, -2.0);
    }

    #[test]
    fn test_line_requires_points() {
        let mut sketch = Sketch::new().unwrap();
        let p1 = sketch.add_point2d(0.0, 0.0, true, true).unwrap();
        let p2 = sketch.add_point2d(1.0, 0.0, true, true).unwrap();
        let line = sketch.add_line2d(p1, p2).unwrap();
        assert!(matches!(
            sketch.add_line2d(line, p1),
            Err(ModelError::WrongEntityKind(_))
        ));
    }

    #[test]
    fn test_arc_endpoints_follow_definition() {
        let mut sketch = Sketch::new().unwrap();
        let arc = sketch
            .add_arc2d(1.0, 2.0, 0.0, PI / 2.0, 3.0, true, true, true, true, false)
            .unwrap();
        let (point1, point2, center) = sketch.arc_points(arc).unwrap();

        let (s1, t1) = sketch.point_position(point1).unwrap();
        assert_relative_eq!(s1, 4.0, epsilon = 1e-12);
        assert_relative_eq!(t1, 2.0, epsilon = 1e-12);

        let (s2, t2) = sketch.point_position(point2).unwrap();
        assert_relative_eq!(s2, 1.0, epsilon = 1e-12);
        assert_relative_eq!(t2, 5.0, epsilon = 1e-12);

        let (sc, tc) = sketch.point_position(center).unwrap();
        assert_relative_eq!(sc, 1.0);
        assert_relative_eq!(tc, 2.0);
    }

    #[test]
    fn test_three_point_arc() {
        let mut sketch = Sketch::new().unwrap();
        // half circle of radius 5 around the origin
        let arc = sketch
            .add_arc2d_three_point(
                (5.0, 0.0),
                (0.0, 5.0),
                (-5.0, 0.0),
                true,
                true,
                true,
                true,
                true,
            )
            .unwrap();
        let (sc_dof, tc_dof, r_dof) = sketch.arc_center_dofs(arc).unwrap();
        assert_relative_eq!(sketch.dof_value(sc_dof).unwrap(), 0.0, epsilon = 1e-9);
        assert_relative_eq!(sketch.dof_value(tc_dof).unwrap(), 0.0, epsilon = 1e-9);
        assert_relative_eq!(sketch.dof_value(r_dof).unwrap(), 5.0, epsilon = 1e-9);
    }

    #[test]
    fn test_three_point_arc_rejects_collinear() {
        let mut sketch = Sketch::new().unwrap();
        let dofs_before = sketch.dofs().len();
        let primitives_before = sketch.primitive_count();
        let result = sketch.add_arc2d_three_point(
            (0.0, 0.0),
            (1.0, 1.0),
            (2.0, 2.0),
            true,
            true,
            true,
            true,
            true,
        );
        assert!(matches!(result, Err(ModelError::DegenerateGeometry(_))));
        // nothing was mutated before the failure
        assert_eq!(sketch.dofs().len(), dofs_before);
        assert_eq!(sketch.primitive_count(), primitives_before);
    }

    #[test]
    fn test_measured_constraint_constructors() {
        let mut sketch = Sketch::new().unwrap();
        let p1 = sketch.add_point2d(0.0, 0.0, false, false).unwrap();
        let p2 = sketch.add_point2d(3.0, 4.0, true, true).unwrap();
        let constraint = sketch.add_distance_point2d_measured(p1, p2).unwrap();
        let residual = sketch
            .constraint(constraint)
            .unwrap()
            .residual(sketch.dofs())
            .unwrap();
        assert_relative_eq!(residual, 0.0, epsilon = 1e-12);
        assert_relative_eq!(
            sketch
                .constraint(constraint)
                .unwrap()
                .actual(sketch.dofs())
                .unwrap()
                .unwrap(),
            5.0
        );
    }

    #[test]
    fn test_lift_to_3d_default_plane() {
        let mut sketch = Sketch::new().unwrap();
        let point = sketch.add_point2d(2.0, 3.0, true, true).unwrap();
        let lifted = sketch.lift_to_3d(point).unwrap();
        assert_relative_eq!(lifted.x, 2.0);
        assert_relative_eq!(lifted.y, 3.0);
        assert_relative_eq!(lifted.z, 0.0);
    }

    #[test]
    fn test_tangent_edge_wiring() {
        let mut sketch = Sketch::new().unwrap();
        let p1 = sketch.add_point2d(0.0, 0.0, true, true).unwrap();
        let p2 = sketch.add_point2d(1.0, 0.0, true, true).unwrap();
        let line = sketch.add_line2d(p1, p2).unwrap();
        let arc = sketch
            .add_arc2d(2.0, 1.0, PI, 3.0 * PI / 2.0, 1.0, true, true, true, true, false)
            .unwrap();

        let dofs_before = sketch.dofs().len();
        let constraint = sketch
            .add_tangent_edge2d(line, EdgeEnd::End, arc, EdgeEnd::Start)
            .unwrap();
        // four dependent tangent DOFs were created
        assert_eq!(sketch.dofs().len(), dofs_before + 4);
        assert!(sketch.constraint(constraint).is_some());
    }
}
