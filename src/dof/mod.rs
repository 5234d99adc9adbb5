//! Degree-of-freedom store
//!
//! Every scalar parameter of a sketch lives in the [`DofArena`], keyed by a
//! stable [`DofId`]. Primitives and constraints hold ids, never references,
//! so the ownership graph is flat and dependent-DOF evaluation is a walk of
//! an acyclic id graph.
//!
//! A DOF is either *independent* (a stored value plus a free flag) or
//! *dependent* (its value is computed by a solver function over other
//! DOFs). Dependent DOFs are never free and writes to them are ignored.

use std::collections::BTreeMap;
use std::fmt;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::solver::{FunctionError, SolverFunction};

/// Stable identifier of a degree of freedom
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct DofId(u64);

impl DofId {
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

impl fmt::Display for DofId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "d{}", self.0)
    }
}

/// A scalar parameter of the sketch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Dof {
    /// Directly stored value; participates in solves when `free`
    Independent {
        /// Current value
        value: f64,
        /// Whether the solver may move this DOF
        free: bool,
    },
    /// Value computed by a solver function over other DOFs
    Dependent {
        /// The evaluator producing this DOF's value
        function: SolverFunction,
    },
}

impl Dof {
    /// Create an independent DOF
    pub fn independent(value: f64, free: bool) -> Self {
        Dof::Independent { value, free }
    }

    /// Create a dependent DOF computed by `function`
    pub fn dependent(function: SolverFunction) -> Self {
        Dof::Dependent { function }
    }

    /// True for dependent DOFs
    #[inline]
    pub fn is_dependent(&self) -> bool {
        matches!(self, Dof::Dependent { .. })
    }

    /// True for free independent DOFs (dependent DOFs are never free)
    #[inline]
    pub fn is_free(&self) -> bool {
        matches!(self, Dof::Independent { free: true, .. })
    }

    /// Ids of the DOFs this DOF reads (empty for independent DOFs)
    pub fn referenced_dofs(&self) -> &[DofId] {
        match self {
            Dof::Independent { .. } => &[],
            Dof::Dependent { function } => function.dofs(),
        }
    }
}

/// Arena of all DOFs in a model, iterated in ascending id order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DofArena {
    dofs: BTreeMap<DofId, Dof>,
}

/// Solve-time partition of the arena (ascending id within each class)
#[derive(Debug, Clone, Default)]
pub struct DofPartition {
    /// Free independent DOFs - the optimization variables
    pub free: Vec<DofId>,
    /// Current values of the free DOFs
    pub free_values: Vec<f64>,
    /// Fixed independent DOFs
    pub fixed: Vec<DofId>,
    /// Current values of the fixed DOFs
    pub fixed_values: Vec<f64>,
    /// Dependent DOFs - excluded from the optimization variables
    pub dependent: Vec<DofId>,
}

impl DofArena {
    /// Create an empty arena
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of DOFs
    pub fn len(&self) -> usize {
        self.dofs.len()
    }

    /// True if the arena holds no DOFs
    pub fn is_empty(&self) -> bool {
        self.dofs.is_empty()
    }

    /// True if `id` exists
    pub fn contains(&self, id: DofId) -> bool {
        self.dofs.contains_key(&id)
    }

    /// Fetch a DOF
    pub fn get(&self, id: DofId) -> Option<&Dof> {
        self.dofs.get(&id)
    }

    /// Fetch a DOF mutably
    pub fn get_mut(&mut self, id: DofId) -> Option<&mut Dof> {
        self.dofs.get_mut(&id)
    }

    /// Insert a DOF under `id`, returning any previous occupant
    pub fn insert(&mut self, id: DofId, dof: Dof) -> Option<Dof> {
        self.dofs.insert(id, dof)
    }

    /// Remove a DOF
    pub fn remove(&mut self, id: DofId) -> Option<Dof> {
        self.dofs.remove(&id)
    }

    /// Iterate DOFs in ascending id order
    pub fn iter(&self) -> impl Iterator<Item = (DofId, &Dof)> {
        self.dofs.iter().map(|(id, dof)| (*id, dof))
    }

    /// Ids in ascending order
    pub fn ids(&self) -> impl Iterator<Item = DofId> + '_ {
        self.dofs.keys().copied()
    }

    /// Current value of a DOF.
    ///
    /// Dependent DOFs are evaluated through their solver function against
    /// the other DOFs' current values; this read never mutates the arena.
    pub fn value_of(&self, id: DofId) -> Result<f64, FunctionError> {
        match self.dofs.get(&id) {
            None => Err(FunctionError::UnknownDof(id)),
            Some(Dof::Independent { value, .. }) => Ok(*value),
            Some(Dof::Dependent { function }) => function.current_value(self),
        }
    }

    /// Assign a value to an independent DOF.
    ///
    /// Returns `false` without touching anything when `id` is missing or
    /// names a dependent DOF (whose value is computed, not stored).
    pub fn set_value(&mut self, id: DofId, value: f64) -> bool {
        match self.dofs.get_mut(&id) {
            Some(Dof::Independent { value: stored, .. }) => {
                *stored = value;
                true
            }
            Some(Dof::Dependent { .. }) => {
                warn!("ignoring value assignment to dependent DOF {}", id);
                false
            }
            None => {
                warn!("ignoring value assignment to unknown DOF {}", id);
                false
            }
        }
    }

    /// Change the free flag of an independent DOF.
    ///
    /// Dependent DOFs are never free; attempts to change them are ignored.
    pub fn set_free(&mut self, id: DofId, free: bool) -> bool {
        match self.dofs.get_mut(&id) {
            Some(Dof::Independent { free: stored, .. }) => {
                *stored = free;
                true
            }
            Some(Dof::Dependent { .. }) => {
                warn!("ignoring free-flag assignment to dependent DOF {}", id);
                false
            }
            None => {
                warn!("ignoring free-flag assignment to unknown DOF {}", id);
                false
            }
        }
    }

    /// Partition the arena into free / fixed-independent / dependent DOFs,
    /// in ascending id order
    pub fn partition(&self) -> DofPartition {
        let mut partition = DofPartition::default();
        for (id, dof) in self.dofs.iter() {
            match dof {
                Dof::Independent { value, free: true } => {
                    partition.free.push(*id);
                    partition.free_values.push(*value);
                }
                Dof::Independent { value, free: false } => {
                    partition.fixed.push(*id);
                    partition.fixed_values.push(*value);
                }
                Dof::Dependent { .. } => partition.dependent.push(*id),
            }
        }
        partition
    }

    /// Solver function of a dependent DOF
    pub(crate) fn dependent_function(&self, id: DofId) -> Result<&SolverFunction, FunctionError> {
        match self.dofs.get(&id) {
            None => Err(FunctionError::UnknownDof(id)),
            Some(Dof::Independent { .. }) => Err(FunctionError::NotDependent(id)),
            Some(Dof::Dependent { function }) => Ok(function),
        }
    }

    /// Mutable solver function of a dependent DOF
    pub(crate) fn dependent_function_mut(
        &mut self,
        id: DofId,
    ) -> Result<&mut SolverFunction, FunctionError> {
        match self.dofs.get_mut(&id) {
            None => Err(FunctionError::UnknownDof(id)),
            Some(Dof::Independent { .. }) => Err(FunctionError::NotDependent(id)),
            Some(Dof::Dependent { function }) => Ok(function),
        }
    }

    /// True if `id` transitively reads `target` through dependent DOFs.
    /// Used to reject DOF replacements that would close a cycle.
    pub fn depends_transitively(&self, id: DofId, target: DofId) -> bool {
        let mut pending = vec![id];
        let mut visited = Vec::new();
        while let Some(current) = pending.pop() {
            if visited.contains(&current) {
                continue;
            }
            visited.push(current);
            if let Some(dof) = self.dofs.get(&current) {
                for &referenced in dof.referenced_dofs() {
                    if referenced == target {
                        return true;
                    }
                    pending.push(referenced);
                }
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::FunctionKind;
    use approx::assert_relative_eq;

    fn id(raw: u64) -> DofId {
        DofId::from_raw(raw)
    }

    #[test]
    fn test_independent_value_roundtrip() {
        let mut arena = DofArena::new();
        arena.insert(id(1), Dof::independent(2.5, true));
        assert!(arena.set_value(id(1), 7.0));
        assert_relative_eq!(arena.value_of(id(1)).unwrap(), 7.0);
    }

    #[test]
    fn test_dependent_value_matches_function() {
        let mut arena = DofArena::new();
        arena.insert(id(1), Dof::independent(2.0, false)); // s_center
        arena.insert(id(2), Dof::independent(1.5, false)); // radius
        arena.insert(id(3), Dof::independent(0.3, true)); // theta
        let function =
            SolverFunction::new(FunctionKind::Arc2dPointS, vec![id(1), id(2), id(3)]).unwrap();
        let expected = function.current_value(&arena).unwrap();
        arena.insert(id(4), Dof::dependent(function));

        assert_relative_eq!(arena.value_of(id(4)).unwrap(), expected);
        assert_relative_eq!(expected, 2.0 + 1.5 * 0.3_f64.cos());
    }

    #[test]
    fn test_dependent_writes_are_ignored() {
        let mut arena = DofArena::new();
        arena.insert(id(1), Dof::independent(0.4, true));
        let function = SolverFunction::new(FunctionKind::Arc2dTangentS, vec![id(1)]).unwrap();
        arena.insert(id(2), Dof::dependent(function));

        assert!(!arena.set_value(id(2), 99.0));
        assert!(!arena.set_free(id(2), true));
        assert!(!arena.get(id(2)).unwrap().is_free());
        assert_relative_eq!(arena.value_of(id(2)).unwrap(), 0.4_f64.sin());
    }

    #[test]
    fn test_partition_orders_by_ascending_id() {
        let mut arena = DofArena::new();
        arena.insert(id(5), Dof::independent(5.0, true));
        arena.insert(id(2), Dof::independent(2.0, false));
        arena.insert(id(9), Dof::independent(9.0, true));
        arena.insert(id(4), Dof::independent(4.0, false));

        let partition = arena.partition();
        assert_eq!(partition.free, vec![id(5), id(9)]);
        assert_eq!(partition.free_values, vec![5.0, 9.0]);
        assert_eq!(partition.fixed, vec![id(2), id(4)]);
        assert_eq!(partition.fixed_values, vec![2.0, 4.0]);
        assert!(partition.dependent.is_empty());
    }

    #[test]
    fn test_depends_transitively() {
        let mut arena = DofArena::new();
        arena.insert(id(1), Dof::independent(0.0, false));
        arena.insert(id(2), Dof::independent(1.0, false));
        arena.insert(id(3), Dof::independent(0.5, true));
        let inner =
            SolverFunction::new(FunctionKind::Arc2dPointS, vec![id(1), id(2), id(3)]).unwrap();
        arena.insert(id(4), Dof::dependent(inner));
        let outer = SolverFunction::new(FunctionKind::HoriVert2d, vec![id(4), id(2)]).unwrap();
        arena.insert(id(5), Dof::dependent(outer));

        assert!(arena.depends_transitively(id(5), id(3)));
        assert!(arena.depends_transitively(id(4), id(1)));
        assert!(!arena.depends_transitively(id(4), id(5)));
    }
}
