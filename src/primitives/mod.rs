//! Geometric primitives
//!
//! Primitives are thin arena entities: a tagged kind carrying the
//! primitive-specific DOF and entity ids, plus the shared dependency
//! bookkeeping every entity needs (the ordered deduplicated set of DOFs it
//! reads, the entities it depends on, and the selection/deletion flags the
//! model drives).
//!
//! Entities hold ids, never references; the model's maps own everything.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::math::Vector3;
use crate::dof::{DofArena, DofId};
use crate::model::selection::SelectionMask;
use crate::solver::FunctionError;

/// Stable identifier shared by primitives and constraint equations
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct EntityId(u64);

impl EntityId {
    /// Wrap a raw id value
    #[inline]
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw id value
    #[inline]
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

/// Which end of an edge participates in an edge-to-edge relation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EdgeEnd {
    /// The edge's first point
    Start,
    /// The edge's second point
    End,
}

/// Primitive-specific data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PrimitiveKind {
    /// Free-standing 3D reference point
    Point3d {
        /// x coordinate DOF
        x: DofId,
        /// y coordinate DOF
        y: DofId,
        /// z coordinate DOF
        z: DofId,
    },
    /// Free-standing 3D vector
    Vector3d {
        /// x component DOF
        x: DofId,
        /// y component DOF
        y: DofId,
        /// z component DOF
        z: DofId,
    },
    /// Plane the 2D sketch lives on, defined by a normal, an in-plane up
    /// direction, and a base point
    SketchPlane {
        /// Plane normal vector primitive
        normal: EntityId,
        /// In-plane up direction vector primitive
        up: EntityId,
        /// Base point primitive
        base: EntityId,
    },
    /// Point in sketch coordinates `(s, t)`
    Point2d {
        /// s coordinate DOF
        s: DofId,
        /// t coordinate DOF
        t: DofId,
        /// Optional owning sketch plane (for the 3D lift)
        plane: Option<EntityId>,
    },
    /// Line segment between two 2D points
    Line2d {
        /// First endpoint primitive
        point1: EntityId,
        /// Second endpoint primitive
        point2: EntityId,
        /// Optional owning sketch plane
        plane: Option<EntityId>,
    },
    /// Circular arc swept counterclockwise from `theta1` to `theta2`
    Arc2d {
        /// Center s coordinate DOF
        s_center: DofId,
        /// Center t coordinate DOF
        t_center: DofId,
        /// Start angle DOF
        theta1: DofId,
        /// End angle DOF
        theta2: DofId,
        /// Radius DOF
        radius: DofId,
        /// Dependent endpoint at `theta1`
        point1: EntityId,
        /// Dependent endpoint at `theta2`
        point2: EntityId,
        /// Center point aliasing the center DOFs
        center_point: EntityId,
        /// Optional owning sketch plane
        plane: Option<EntityId>,
    },
    /// Full circle
    Circle2d {
        /// Center s coordinate DOF
        s_center: DofId,
        /// Center t coordinate DOF
        t_center: DofId,
        /// Radius DOF
        radius: DofId,
        /// Center point aliasing the center DOFs
        center_point: EntityId,
        /// Optional owning sketch plane
        plane: Option<EntityId>,
    },
}

impl PrimitiveKind {
    /// Human-readable kind name
    pub fn name(&self) -> &'static str {
        match self {
            PrimitiveKind::Point3d { .. } => "point3d",
            PrimitiveKind::Vector3d { .. } => "vector3d",
            PrimitiveKind::SketchPlane { .. } => "sketch_plane",
            PrimitiveKind::Point2d { .. } => "point2d",
            PrimitiveKind::Line2d { .. } => "line2d",
            PrimitiveKind::Arc2d { .. } => "arc2d",
            PrimitiveKind::Circle2d { .. } => "circle2d",
        }
    }

    /// The DOFs this kind reads directly (before dependent expansion)
    pub fn direct_dofs(&self) -> Vec<DofId> {
        match self {
            PrimitiveKind::Point3d { x, y, z } | PrimitiveKind::Vector3d { x, y, z } => {
                vec![*x, *y, *z]
            }
            PrimitiveKind::SketchPlane { .. } => Vec::new(),
            PrimitiveKind::Point2d { s, t, .. } => vec![*s, *t],
            PrimitiveKind::Line2d { .. } => Vec::new(),
            PrimitiveKind::Arc2d {
                s_center,
                t_center,
                theta1,
                theta2,
                radius,
                ..
            } => vec![*s_center, *t_center, *theta1, *theta2, *radius],
            PrimitiveKind::Circle2d {
                s_center,
                t_center,
                radius,
                ..
            } => vec![*s_center, *t_center, *radius],
        }
    }

    /// The entities this kind references directly
    pub fn referenced_entities(&self) -> Vec<EntityId> {
        match self {
            PrimitiveKind::Point3d { .. } | PrimitiveKind::Vector3d { .. } => Vec::new(),
            PrimitiveKind::SketchPlane { normal, up, base } => vec![*normal, *up, *base],
            PrimitiveKind::Point2d { plane, .. } => plane.iter().copied().collect(),
            PrimitiveKind::Line2d {
                point1,
                point2,
                plane,
            } => {
                let mut deps = vec![*point1, *point2];
                deps.extend(plane.iter().copied());
                deps
            }
            PrimitiveKind::Arc2d {
                point1,
                point2,
                center_point,
                plane,
                ..
            } => {
                let mut deps = vec![*point1, *point2, *center_point];
                deps.extend(plane.iter().copied());
                deps
            }
            PrimitiveKind::Circle2d {
                center_point,
                plane,
                ..
            } => {
                let mut deps = vec![*center_point];
                deps.extend(plane.iter().copied());
                deps
            }
        }
    }

    /// Rewrite every occurrence of `old` to `new`
    pub fn replace_dof(&mut self, old: DofId, new: DofId) {
        let replace = |dof: &mut DofId| {
            if *dof == old {
                *dof = new;
            }
        };
        match self {
            PrimitiveKind::Point3d { x, y, z } | PrimitiveKind::Vector3d { x, y, z } => {
                replace(x);
                replace(y);
                replace(z);
            }
            PrimitiveKind::SketchPlane { .. } => {}
            PrimitiveKind::Point2d { s, t, .. } => {
                replace(s);
                replace(t);
            }
            PrimitiveKind::Line2d { .. } => {}
            PrimitiveKind::Arc2d {
                s_center,
                t_center,
                theta1,
                theta2,
                radius,
                ..
            } => {
                replace(s_center);
                replace(t_center);
                replace(theta1);
                replace(theta2);
                replace(radius);
            }
            PrimitiveKind::Circle2d {
                s_center,
                t_center,
                radius,
                ..
            } => {
                replace(s_center);
                replace(t_center);
                replace(radius);
            }
        }
    }

    /// Whether this kind is selectable under `mask`
    pub fn selectable_under(&self, mask: SelectionMask) -> bool {
        match mask {
            SelectionMask::All => true,
            SelectionMask::None => false,
            SelectionMask::Points => matches!(self, PrimitiveKind::Point2d { .. }),
            SelectionMask::Edges => {
                matches!(self, PrimitiveKind::Line2d { .. } | PrimitiveKind::Arc2d { .. })
            }
            SelectionMask::Lines => matches!(self, PrimitiveKind::Line2d { .. }),
            SelectionMask::Arcs => matches!(self, PrimitiveKind::Arc2d { .. }),
            SelectionMask::Circles => matches!(self, PrimitiveKind::Circle2d { .. }),
            SelectionMask::PointsAndLines => {
                matches!(self, PrimitiveKind::Point2d { .. } | PrimitiveKind::Line2d { .. })
            }
        }
    }
}

/// A geometric primitive registered in the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Primitive {
    id: EntityId,
    kind: PrimitiveKind,
    dofs: Vec<DofId>,
    depends_on: Vec<EntityId>,
    selected: bool,
    #[serde(skip)]
    flagged_for_deletion: bool,
}

impl Primitive {
    /// Build a primitive, expanding its DOF set through any dependent DOFs
    /// it holds. All referenced DOFs must already exist in `arena`.
    pub fn new(id: EntityId, kind: PrimitiveKind, arena: &DofArena) -> Result<Self, FunctionError> {
        Self::with_inherited_dofs(id, kind, Vec::new(), arena)
    }

    /// Build a primitive whose DOF set also absorbs `inherited` - the DOFs
    /// of the primitives it references (a line carries its endpoints'
    /// DOFs, an arc its generated points', and so on).
    pub fn with_inherited_dofs(
        id: EntityId,
        kind: PrimitiveKind,
        inherited: Vec<DofId>,
        arena: &DofArena,
    ) -> Result<Self, FunctionError> {
        let mut seed = kind.direct_dofs();
        seed.extend(inherited);
        let dofs = expand_dof_set(seed, arena)?;
        let depends_on = dedup_ordered(kind.referenced_entities());
        Ok(Self {
            id,
            kind,
            dofs,
            depends_on,
            selected: false,
            flagged_for_deletion: false,
        })
    }

    /// Stable id
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Primitive-specific data
    pub fn kind(&self) -> &PrimitiveKind {
        &self.kind
    }

    /// Ordered deduplicated DOFs this primitive reads
    pub fn dofs(&self) -> &[DofId] {
        &self.dofs
    }

    /// Ordered deduplicated entities this primitive depends on
    pub fn depends_on(&self) -> &[EntityId] {
        &self.depends_on
    }

    /// Rewrite every reference to `old` so it reads `new`, then re-expand
    /// the DOF set (the replacement may pull in a dependent DOF's inputs)
    pub(crate) fn substitute_dof(
        &mut self,
        old: DofId,
        new: DofId,
        arena: &DofArena,
    ) -> Result<(), FunctionError> {
        self.kind.replace_dof(old, new);
        for dof in &mut self.dofs {
            if *dof == old {
                *dof = new;
            }
        }
        self.dofs = expand_dof_set(std::mem::take(&mut self.dofs), arena)?;
        Ok(())
    }

    /// Whether the primitive is currently selected
    pub fn is_selected(&self) -> bool {
        self.selected
    }

    /// Select or deselect
    pub fn set_selected(&mut self, selected: bool) {
        self.selected = selected;
    }

    /// Clear the selection when the mask excludes this primitive
    pub fn apply_selection_mask(&mut self, mask: SelectionMask) {
        if !self.kind.selectable_under(mask) {
            self.selected = false;
        }
    }

    /// Whether the primitive is flagged for the current delete pass
    pub fn is_flagged_for_deletion(&self) -> bool {
        self.flagged_for_deletion
    }

    /// Flag for deletion
    pub fn flag_for_deletion(&mut self) {
        self.flagged_for_deletion = true;
    }

    /// Remove the deletion flag
    pub fn unflag_for_deletion(&mut self) {
        self.flagged_for_deletion = false;
    }

    /// Flag this primitive when it depends on `entity`.
    /// Returns true when the flag state changed.
    pub fn flag_if_depends_on(&mut self, entity: EntityId) -> bool {
        if self.flagged_for_deletion {
            return false;
        }
        if self.depends_on.contains(&entity) {
            self.flagged_for_deletion = true;
            true
        } else {
            false
        }
    }
}

/// Expand a direct DOF list through dependent DOFs and return it as an
/// ordered deduplicated set
pub(crate) fn expand_dof_set(
    direct: Vec<DofId>,
    arena: &DofArena,
) -> Result<Vec<DofId>, FunctionError> {
    let mut result = Vec::new();
    let mut pending = direct;
    while let Some(id) = pending.pop() {
        let dof = arena.get(id).ok_or(FunctionError::UnknownDof(id))?;
        if !result.contains(&id) {
            result.push(id);
            pending.extend_from_slice(dof.referenced_dofs());
        }
    }
    result.sort();
    Ok(result)
}

fn dedup_ordered(mut entities: Vec<EntityId>) -> Vec<EntityId> {
    entities.sort();
    entities.dedup();
    entities
}

/// Components of a sketch-plane definition, used when constructing the
/// plane's vector and point primitives
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaneGeometry {
    /// Plane normal
    pub normal: Vector3,
    /// In-plane up direction
    pub up: Vector3,
    /// Base point
    pub base: Vector3,
}

impl Default for PlaneGeometry {
    fn default() -> Self {
        Self {
            normal: Vector3::new(0.0, 0.0, 1.0),
            up: Vector3::new(0.0, 1.0, 0.0),
            base: Vector3::new(0.0, 0.0, 0.0),
        }
    }
}
