//! Constraint equations
//!
//! A constraint equation owns one solver function (its residual), a
//! non-negative weight, and the same dependency bookkeeping as a
//! primitive. The merit function sums `weight · residual²` over every
//! registered constraint; a residual of zero means the geometric relation
//! holds exactly.

use serde::{Deserialize, Serialize};

use crate::dof::{DofArena, DofId};
use crate::model::selection::SelectionMask;
use crate::primitives::{expand_dof_set, EdgeEnd, EntityId};
use crate::solver::{FunctionError, SolverFunction};

/// Default weight of a newly created constraint
pub const DEFAULT_WEIGHT: f64 = 1.0;

/// Constraint-specific data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ConstraintKind {
    /// Distance between two 2D points
    DistancePoint2d {
        /// First point primitive
        point1: EntityId,
        /// Second point primitive
        point2: EntityId,
        /// Target distance DOF (fixed)
        distance: DofId,
    },
    /// Distance from a point to an infinite line
    DistancePointLine2d {
        /// The point primitive
        point: EntityId,
        /// The line primitive
        line: EntityId,
        /// Target distance DOF (fixed)
        distance: DofId,
    },
    /// Angle between two lines
    AngleLine2d {
        /// First line primitive
        line1: EntityId,
        /// Second line primitive
        line2: EntityId,
        /// Target angle DOF (fixed, radians)
        angle: DofId,
        /// Interior angle when true, exterior otherwise
        interior: bool,
    },
    /// Two lines constrained parallel
    ParallelLine2d {
        /// First line primitive
        line1: EntityId,
        /// Second line primitive
        line2: EntityId,
    },
    /// A line constrained horizontal or vertical
    HoriVertLine2d {
        /// The line primitive
        line: EntityId,
        /// Vertical when true, horizontal otherwise
        vertical: bool,
    },
    /// Two edges tangent where their chosen endpoints meet
    TangentEdge2d {
        /// First edge primitive (line or arc)
        edge1: EntityId,
        /// Which end of the first edge
        end1: EdgeEnd,
        /// Second edge primitive (line or arc)
        edge2: EntityId,
        /// Which end of the second edge
        end2: EdgeEnd,
    },
}

impl ConstraintKind {
    /// Human-readable kind name
    pub fn name(&self) -> &'static str {
        match self {
            ConstraintKind::DistancePoint2d { .. } => "distance_point2d",
            ConstraintKind::DistancePointLine2d { .. } => "distance_point_line2d",
            ConstraintKind::AngleLine2d { .. } => "angle_line2d",
            ConstraintKind::ParallelLine2d { .. } => "parallel_line2d",
            ConstraintKind::HoriVertLine2d { .. } => "hori_vert_line2d",
            ConstraintKind::TangentEdge2d { .. } => "tangent_edge2d",
        }
    }

    /// The entities this constraint references
    pub fn referenced_entities(&self) -> Vec<EntityId> {
        match self {
            ConstraintKind::DistancePoint2d { point1, point2, .. } => vec![*point1, *point2],
            ConstraintKind::DistancePointLine2d { point, line, .. } => vec![*point, *line],
            ConstraintKind::AngleLine2d { line1, line2, .. }
            | ConstraintKind::ParallelLine2d { line1, line2 } => vec![*line1, *line2],
            ConstraintKind::HoriVertLine2d { line, .. } => vec![*line],
            ConstraintKind::TangentEdge2d { edge1, edge2, .. } => vec![*edge1, *edge2],
        }
    }

    /// Rewrite every occurrence of `old` to `new`
    pub fn replace_dof(&mut self, old: DofId, new: DofId) {
        match self {
            ConstraintKind::DistancePoint2d { distance, .. }
            | ConstraintKind::DistancePointLine2d { distance, .. } => {
                if *distance == old {
                    *distance = new;
                }
            }
            ConstraintKind::AngleLine2d { angle, .. } => {
                if *angle == old {
                    *angle = new;
                }
            }
            ConstraintKind::ParallelLine2d { .. }
            | ConstraintKind::HoriVertLine2d { .. }
            | ConstraintKind::TangentEdge2d { .. } => {}
        }
    }
}

/// A constraint equation registered in the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Constraint {
    id: EntityId,
    kind: ConstraintKind,
    function: SolverFunction,
    weight: f64,
    dofs: Vec<DofId>,
    depends_on: Vec<EntityId>,
    selected: bool,
    #[serde(skip)]
    flagged_for_deletion: bool,
}

impl Constraint {
    /// Build a constraint around its solver function.
    ///
    /// The DOF set is the function's DOF list expanded through any
    /// dependent DOFs; all of them must already exist in `arena`.
    pub fn new(
        id: EntityId,
        kind: ConstraintKind,
        function: SolverFunction,
        arena: &DofArena,
    ) -> Result<Self, FunctionError> {
        Self::with_inherited_dofs(id, kind, function, Vec::new(), arena)
    }

    /// Build a constraint whose DOF set also absorbs `inherited` - the
    /// DOFs of the primitives it references
    pub fn with_inherited_dofs(
        id: EntityId,
        kind: ConstraintKind,
        function: SolverFunction,
        inherited: Vec<DofId>,
        arena: &DofArena,
    ) -> Result<Self, FunctionError> {
        let mut seed = function.dofs().to_vec();
        seed.extend(inherited);
        let dofs = expand_dof_set(seed, arena)?;
        let mut depends_on = kind.referenced_entities();
        depends_on.sort();
        depends_on.dedup();
        Ok(Self {
            id,
            kind,
            function,
            weight: DEFAULT_WEIGHT,
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

    /// Constraint-specific data
    pub fn kind(&self) -> &ConstraintKind {
        &self.kind
    }

    /// The residual solver function
    pub fn solver_function(&self) -> &SolverFunction {
        &self.function
    }

    /// Mutable residual solver function
    pub(crate) fn solver_function_mut(&mut self) -> &mut SolverFunction {
        &mut self.function
    }

    /// Constraint weight in the merit sum
    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// Set the constraint weight (`w ≥ 0`)
    pub fn set_weight(&mut self, weight: f64) {
        self.weight = weight.max(0.0);
    }

    /// Ordered deduplicated DOFs this constraint reads
    pub fn dofs(&self) -> &[DofId] {
        &self.dofs
    }

    /// Ordered deduplicated entities this constraint depends on
    pub fn depends_on(&self) -> &[EntityId] {
        &self.depends_on
    }

    /// Residual at the current DOF values
    pub fn residual(&self, arena: &DofArena) -> Result<f64, FunctionError> {
        self.function.current_value(arena)
    }

    /// The measured geometric quantity this constraint controls, when one
    /// exists: the current distance for distance constraints, the current
    /// angle (radians) for angle constraints. Relational constraints
    /// (parallel, tangent, horizontal/vertical) have no scalar measure.
    pub fn actual(&self, arena: &DofArena) -> Result<Option<f64>, FunctionError> {
        let values: Vec<f64> = {
            let mut values = Vec::with_capacity(self.function.dofs().len());
            for &dof in self.function.dofs() {
                values.push(arena.value_of(dof)?);
            }
            values
        };

        Ok(match self.kind {
            ConstraintKind::DistancePoint2d { .. } => {
                let (p1s, p1t, p2s, p2t) = (values[0], values[1], values[2], values[3]);
                Some(((p1s - p2s).powi(2) + (p1t - p2t).powi(2)).sqrt())
            }
            ConstraintKind::DistancePointLine2d { .. } => {
                let (ps, pt, l1s, l1t, l2s, l2t) = (
                    values[0], values[1], values[2], values[3], values[4], values[5],
                );
                let cross = (l1t - pt) * (l2s - l1s) - (l1s - ps) * (l2t - l1t);
                let length = ((l2s - l1s).powi(2) + (l2t - l1t).powi(2)).sqrt();
                Some((cross / length).abs())
            }
            ConstraintKind::AngleLine2d { interior, .. } => {
                let d1s = values[0] - values[2];
                let d1t = values[1] - values[3];
                let d2s = values[4] - values[6];
                let d2t = values[5] - values[7];
                let cos_actual = (d1s * d2s + d1t * d2t)
                    / ((d1s * d1s + d1t * d1t).sqrt() * (d2s * d2s + d2t * d2t).sqrt());
                let cos_actual = if interior { cos_actual } else { -cos_actual };
                Some(cos_actual.clamp(-1.0, 1.0).acos())
            }
            _ => None,
        })
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
        self.function.replace_dof(old, new);
        for dof in &mut self.dofs {
            if *dof == old {
                *dof = new;
            }
        }
        self.dofs = expand_dof_set(std::mem::take(&mut self.dofs), arena)?;
        Ok(())
    }

    /// Whether the constraint is currently selected
    pub fn is_selected(&self) -> bool {
        self.selected
    }

    /// Select or deselect
    pub fn set_selected(&mut self, selected: bool) {
        self.selected = selected;
    }

    /// Clear the selection when the mask excludes constraints.
    /// Constraints are only selectable under the all-entities mask.
    pub fn apply_selection_mask(&mut self, mask: SelectionMask) {
        if mask != SelectionMask::All {
            self.selected = false;
        }
    }

    /// Whether the constraint is flagged for the current delete pass
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

    /// Flag this constraint when it depends on `entity`.
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
