//! Shared fixtures for the integration tests
#![allow(dead_code)] // each test binary uses a different subset

use draftsolve::{EdgeEnd, EntityId, Sketch};
use std::f64::consts::PI;

/// Install the test logger; repeated calls are fine
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A rectangle constrained to 6 x 12 with one corner pinned at the origin
pub struct Rectangle {
    pub point1: EntityId,
    pub point2: EntityId,
    pub point3: EntityId,
    pub point4: EntityId,
    pub line1: EntityId,
    pub line2: EntityId,
    pub line3: EntityId,
    pub line4: EntityId,
}

/// Four points at the corners of a 10 x 10 square, the loop of lines, and
/// the five constraints that pull it to 6 x 12
pub fn build_rectangle(sketch: &mut Sketch) -> Rectangle {
    let point1 = sketch.add_point2d(0.0, 0.0, false, false).unwrap();
    let point2 = sketch.add_point2d(10.0, 0.0, true, false).unwrap();
    let point3 = sketch.add_point2d(10.0, 10.0, true, true).unwrap();
    let point4 = sketch.add_point2d(0.0, 10.0, true, true).unwrap();

    let line1 = sketch.add_line2d(point1, point2).unwrap();
    let line2 = sketch.add_line2d(point2, point3).unwrap();
    let line3 = sketch.add_line2d(point3, point4).unwrap();
    let line4 = sketch.add_line2d(point4, point1).unwrap();

    sketch.add_distance_point2d(point1, point2, 6.0).unwrap();
    sketch.add_distance_point2d(point2, point3, 12.0).unwrap();
    sketch.add_parallel_line2d(line1, line3).unwrap();
    sketch.add_parallel_line2d(line2, line4).unwrap();
    sketch
        .add_angle_line2d(line1, line2, PI / 2.0, true)
        .unwrap();

    Rectangle {
        point1,
        point2,
        point3,
        point4,
        line1,
        line2,
        line3,
        line4,
    }
}

/// Three rectangle corners closed through an arc fillet
pub struct ArcFillet {
    pub point1: EntityId,
    pub point2: EntityId,
    pub point3: EntityId,
    pub arc: EntityId,
    pub line1: EntityId,
    pub line2: EntityId,
    pub line3: EntityId,
    pub line4: EntityId,
}

/// The arc-fillet sketch: a rectangle whose fourth corner is replaced by
/// an arc, with tangency where the side lines meet the arc's endpoints
pub fn build_arc_fillet(sketch: &mut Sketch) -> ArcFillet {
    let point1 = sketch.add_point2d(0.0, 0.0, false, false).unwrap();
    let point2 = sketch.add_point2d(10.0, 0.0, true, false).unwrap();
    let point3 = sketch.add_point2d(10.0, 10.0, true, true).unwrap();

    let arc = sketch
        .add_arc2d(
            1.5,
            6.0,
            (PI / 2.0) * 0.8,
            PI * 1.2,
            2.0,
            true,
            true,
            true,
            true,
            false,
        )
        .unwrap();
    let (arc_start, arc_end, _center) = sketch.arc_points(arc).unwrap();

    let line1 = sketch.add_line2d(point1, point2).unwrap();
    let line2 = sketch.add_line2d(point2, point3).unwrap();
    let line3 = sketch.add_line2d(point3, arc_start).unwrap();
    let line4 = sketch.add_line2d(arc_end, point1).unwrap();

    sketch.add_distance_point2d(point1, point2, 6.0).unwrap();
    sketch.add_distance_point2d(point2, point3, 12.0).unwrap();
    sketch.add_parallel_line2d(line1, line3).unwrap();
    sketch.add_parallel_line2d(line2, line4).unwrap();
    sketch
        .add_angle_line2d(line1, line2, PI / 2.0, false)
        .unwrap();
    sketch
        .add_tangent_edge2d(line3, EdgeEnd::End, arc, EdgeEnd::Start)
        .unwrap();
    sketch
        .add_tangent_edge2d(line4, EdgeEnd::Start, arc, EdgeEnd::End)
        .unwrap();

    ArcFillet {
        point1,
        point2,
        point3,
        arc,
        line1,
        line2,
        line3,
        line4,
    }
}

/// Largest absolute constraint residual in the sketch
pub fn max_residual(sketch: &Sketch) -> f64 {
    sketch
        .constraints()
        .map(|c| c.residual(sketch.dofs()).unwrap().abs())
        .fold(0.0, f64::max)
}
