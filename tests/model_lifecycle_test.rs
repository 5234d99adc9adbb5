//! Model lifecycle integration tests
//!
//! DOF substitution (merging points) and dependency-driven deletion,
//! checked against the model invariants: no dangling references, no
//! orphaned DOFs.

mod common;

use common::build_rectangle;
use draftsolve::{DofId, Sketch};
use std::collections::BTreeSet;

/// Every DOF in the arena is referenced by some surviving entity, and
/// every referenced DOF exists
fn assert_no_orphan_dofs(sketch: &Sketch) {
    let arena: BTreeSet<DofId> = sketch.dofs().ids().collect();
    let mut referenced = BTreeSet::new();
    for primitive in sketch.primitives() {
        for &dof in primitive.dofs() {
            assert!(arena.contains(&dof), "primitive references a missing DOF");
            referenced.insert(dof);
        }
    }
    for constraint in sketch.constraints() {
        for &dof in constraint.dofs() {
            assert!(arena.contains(&dof), "constraint references a missing DOF");
            referenced.insert(dof);
        }
    }
    assert_eq!(arena, referenced, "arena holds unreferenced DOFs");
}

#[test]
fn test_merge_two_points() {
    let mut sketch = Sketch::new().unwrap();
    let point_a = sketch.add_point2d(1.0, 2.0, true, true).unwrap();
    let point_b = sketch.add_point2d(3.0, 4.0, true, true).unwrap();
    let line = sketch.add_line2d(point_a, point_b).unwrap();

    let (a_s, a_t) = sketch.point_dofs(point_a).unwrap();
    let (b_s, b_t) = sketch.point_dofs(point_b).unwrap();
    let dofs_before: BTreeSet<DofId> = sketch.dofs().ids().collect();

    sketch.replace_dof(b_s, a_s).unwrap();
    sketch.replace_dof(b_t, a_t).unwrap();

    // the DOF set shrank by exactly the two replaced ids
    let dofs_after: BTreeSet<DofId> = sketch.dofs().ids().collect();
    let mut expected = dofs_before;
    expected.remove(&b_s);
    expected.remove(&b_t);
    assert_eq!(dofs_after, expected);

    // the line survives and its endpoints now share DOFs
    assert!(sketch.primitive(line).is_some());
    assert_eq!(sketch.point_dofs(point_b).unwrap(), (a_s, a_t));
    assert_eq!(
        sketch.point_position(point_a).unwrap(),
        sketch.point_position(point_b).unwrap()
    );

    assert_no_orphan_dofs(&sketch);
}

#[test]
fn test_delete_with_cascade() {
    let mut sketch = Sketch::new().unwrap();
    let rect = build_rectangle(&mut sketch);

    // one extra constraint referencing point3
    sketch
        .add_distance_point2d(rect.point1, rect.point3, 15.0)
        .unwrap();
    let constraints_before = sketch.constraint_count();

    sketch.delete_primitive(rect.point3).unwrap();

    // point3 and both lines touching it are gone
    assert!(sketch.primitive(rect.point3).is_none());
    assert!(sketch.primitive(rect.line2).is_none());
    assert!(sketch.primitive(rect.line3).is_none());

    // the two surviving rectangle lines remain
    assert!(sketch.primitive(rect.line1).is_some());
    assert!(sketch.primitive(rect.line4).is_some());

    // every constraint referencing point3 or the dead lines went with them:
    // distance(p2,p3), both parallels, the angle, and the extra distance
    assert_eq!(sketch.constraint_count(), constraints_before - 5);

    // nothing surviving references the deleted entities
    for primitive in sketch.primitives() {
        for dep in primitive.depends_on() {
            assert!(
                sketch.primitive(*dep).is_some(),
                "dangling primitive reference"
            );
        }
    }
    for constraint in sketch.constraints() {
        for dep in constraint.depends_on() {
            assert!(
                sketch.primitive(*dep).is_some(),
                "dangling constraint reference"
            );
        }
    }

    assert_no_orphan_dofs(&sketch);
}

#[test]
fn test_delete_selected_cascades() {
    let mut sketch = Sketch::new().unwrap();
    let rect = build_rectangle(&mut sketch);

    sketch.set_selected(rect.point3, true).unwrap();
    sketch.set_selected(rect.point4, true).unwrap();
    sketch.delete_selected().unwrap();

    assert!(sketch.primitive(rect.point3).is_none());
    assert!(sketch.primitive(rect.point4).is_none());
    // every line touched one of the deleted corners
    for line in [rect.line1, rect.line2, rect.line3, rect.line4] {
        if let Some(primitive) = sketch.primitive(line) {
            for dep in primitive.depends_on() {
                assert!(sketch.primitive(*dep).is_some());
            }
        }
    }
    assert_no_orphan_dofs(&sketch);
}

#[test]
fn test_solve_after_merge() {
    // merging DOFs must leave a solvable model behind
    let mut sketch = Sketch::new().unwrap();
    let anchor = sketch.add_point2d(0.0, 0.0, false, false).unwrap();
    let floating1 = sketch.add_point2d(2.0, 0.5, true, true).unwrap();
    let floating2 = sketch.add_point2d(2.1, 0.4, true, true).unwrap();
    sketch.add_line2d(anchor, floating1).unwrap();
    sketch.add_line2d(anchor, floating2).unwrap();
    sketch.add_distance_point2d(anchor, floating1, 7.0).unwrap();

    // merge the two floating points
    let (f1_s, f1_t) = sketch.point_dofs(floating1).unwrap();
    let (f2_s, f2_t) = sketch.point_dofs(floating2).unwrap();
    sketch.replace_dof(f2_s, f1_s).unwrap();
    sketch.replace_dof(f2_t, f1_t).unwrap();

    sketch.solve().unwrap();
    let distance = sketch.measured_distance(anchor, floating2).unwrap();
    assert!(
        (distance - 7.0).abs() < 1e-6,
        "merged point ignored the constraint: {}",
        distance
    );
}
