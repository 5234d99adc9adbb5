//! Solver-function algebra
//!
//! A [`SolverFunction`] binds a residual function kind to the DOFs it
//! reads and maps the solver's global parameter vector into the function's
//! local coordinates. Local slots backed by dependent DOFs are overridden
//! by recursively evaluating the dependent DOF's own solver function, and
//! their gradient contribution is chain-ruled into the returned global
//! gradient.
//!
//! The global→local mapping must be defined through
//! [`SolverFunction::define_input_map`] before any evaluation against a
//! parameter vector; evaluation against the current DOF values
//! ([`SolverFunction::current_value`]) needs no map.

pub mod bfgs;
pub mod functions;
pub mod merit;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dof::{DofArena, DofId};
use crate::matrix::DenseMatrix;

pub use bfgs::{
    LineSearch, MeritFunction, MinimizeResult, Minimizer, MinimizerOptions, SolveStatus,
    DEFAULT_GRADIENT_STEP,
};
pub use functions::FunctionKind;
pub use merit::SumOfSquares;

/// Solver-function error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FunctionError {
    /// Factory received the wrong number of DOFs
    #[error("solver function {name} expects {expected} DOFs, got {actual}")]
    BadArity {
        /// Function name
        name: String,
        /// Required DOF count
        expected: usize,
        /// Provided DOF count
        actual: usize,
    },

    /// Factory received an unregistered function name
    #[error("unknown solver function {0:?}")]
    UnknownFunction(String),

    /// `define_input_map` could not resolve a DOF id
    #[error("DOF {0} is missing from the solver input map")]
    MissingDofInMap(DofId),

    /// A referenced DOF does not exist in the arena
    #[error("DOF {0} does not exist in the model")]
    UnknownDof(DofId),

    /// A DOF expected to be dependent is independent
    #[error("DOF {0} is not a dependent DOF")]
    NotDependent(DofId),
}

/// Result type for solver-function operations
pub type Result<T> = std::result::Result<T, FunctionError>;

/// A residual function bound to the DOFs it reads.
///
/// The input map assigns each local slot backed by an independent DOF its
/// index in the global parameter vector; slots backed by dependent DOFs
/// carry no index because their values are computed recursively.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverFunction {
    kind: FunctionKind,
    dofs: Vec<DofId>,
    #[serde(skip)]
    input_map: Vec<Option<usize>>,
}

impl SolverFunction {
    /// Bind `kind` to `dofs`, validating the arity
    pub fn new(kind: FunctionKind, dofs: Vec<DofId>) -> Result<Self> {
        if dofs.len() != kind.arity() {
            return Err(FunctionError::BadArity {
                name: kind.name().to_string(),
                expected: kind.arity(),
                actual: dofs.len(),
            });
        }
        Ok(Self {
            kind,
            dofs,
            input_map: Vec::new(),
        })
    }

    /// Factory: create a solver function by its registered name
    pub fn create(name: &str, dofs: Vec<DofId>) -> Result<Self> {
        let kind = FunctionKind::from_name(name)
            .ok_or_else(|| FunctionError::UnknownFunction(name.to_string()))?;
        Self::new(kind, dofs)
    }

    /// The residual function kind
    pub fn kind(&self) -> FunctionKind {
        self.kind
    }

    /// Factory name of the residual function
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    /// The DOFs this function reads, in local slot order
    pub fn dofs(&self) -> &[DofId] {
        &self.dofs
    }

    /// Number of local parameters
    pub fn arity(&self) -> usize {
        self.kind.arity()
    }

    /// Define the global→local mapping for this function and, recursively,
    /// for the solver functions of every dependent DOF it reads.
    ///
    /// `map` assigns global vector positions to DOF ids; an independent DOF
    /// absent from the map is an error. Must be called before
    /// [`Self::value`] or [`Self::gradient`].
    pub fn define_input_map(
        &mut self,
        map: &BTreeMap<DofId, usize>,
        arena: &mut DofArena,
    ) -> Result<()> {
        let (slots, mut pending) = Self::resolve_slots(&self.dofs, map, arena)?;
        self.input_map = slots;

        // Dependent DOFs define their own transforms; walk the graph
        // iteratively so each arena entry is borrowed on its own.
        let mut visited: Vec<DofId> = Vec::new();
        while let Some(id) = pending.pop() {
            if visited.contains(&id) {
                continue;
            }
            visited.push(id);

            let (slots, children) = {
                let function = arena.dependent_function(id)?;
                Self::resolve_slots(function.dofs(), map, arena)?
            };
            arena.dependent_function_mut(id)?.input_map = slots;
            pending.extend(children);
        }
        Ok(())
    }

    /// Compute the slot table for `dofs`: global indices for independent
    /// DOFs, `None` for dependent ones. Returns the dependent ids alongside.
    fn resolve_slots(
        dofs: &[DofId],
        map: &BTreeMap<DofId, usize>,
        arena: &DofArena,
    ) -> Result<(Vec<Option<usize>>, Vec<DofId>)> {
        let mut slots = Vec::with_capacity(dofs.len());
        let mut dependents = Vec::new();
        for &id in dofs {
            let dof = arena.get(id).ok_or(FunctionError::UnknownDof(id))?;
            if dof.is_dependent() {
                slots.push(None);
                dependents.push(id);
            } else {
                let global = *map.get(&id).ok_or(FunctionError::MissingDofInMap(id))?;
                slots.push(Some(global));
            }
        }
        Ok((slots, dependents))
    }

    /// Project the global parameter vector into local coordinates.
    ///
    /// Slots backed by dependent DOFs are filled by recursively evaluating
    /// the dependent DOF's solver function against the same global vector.
    fn project(&self, x: &DenseMatrix, arena: &DofArena) -> Result<Vec<f64>> {
        let mut local = Vec::with_capacity(self.dofs.len());
        for (slot, &id) in self.dofs.iter().enumerate() {
            let dof = arena.get(id).ok_or(FunctionError::UnknownDof(id))?;
            if dof.is_dependent() {
                let function = arena.dependent_function(id)?;
                local.push(function.value(x, arena)?);
            } else {
                let global = self
                    .input_map
                    .get(slot)
                    .copied()
                    .flatten()
                    .ok_or(FunctionError::MissingDofInMap(id))?;
                local.push(x[(global, 0)]);
            }
        }
        Ok(local)
    }

    /// Residual at the global parameter vector `x`
    pub fn value(&self, x: &DenseMatrix, arena: &DofArena) -> Result<f64> {
        let local = self.project(x, arena)?;
        Ok(self.kind.value_self(&local))
    }

    /// Gradient with respect to the global parameter vector `x`.
    ///
    /// Independent slots scatter their local partials to their global
    /// positions; dependent slots contribute their own global gradient
    /// scaled by the chain-rule factor.
    pub fn gradient(&self, x: &DenseMatrix, arena: &DofArena) -> Result<Vec<f64>> {
        let local = self.project(x, arena)?;
        let local_gradient = self.kind.gradient_self(&local);

        let mut gradient = vec![0.0; x.rows()];
        for (slot, &id) in self.dofs.iter().enumerate() {
            let dof = arena.get(id).ok_or(FunctionError::UnknownDof(id))?;
            if dof.is_dependent() {
                let function = arena.dependent_function(id)?;
                let sub_gradient = function.gradient(x, arena)?;
                for (g, sub) in gradient.iter_mut().zip(sub_gradient.iter()) {
                    *g += local_gradient[slot] * sub;
                }
            } else {
                let global = self
                    .input_map
                    .get(slot)
                    .copied()
                    .flatten()
                    .ok_or(FunctionError::MissingDofInMap(id))?;
                gradient[global] += local_gradient[slot];
            }
        }
        Ok(gradient)
    }

    /// Rewrite every occurrence of `old` in the DOF list to `new`.
    /// Any previously defined input map is dropped; it must be redefined
    /// before the next evaluation against a parameter vector.
    pub(crate) fn replace_dof(&mut self, old: DofId, new: DofId) {
        for dof in &mut self.dofs {
            if *dof == old {
                *dof = new;
            }
        }
        self.input_map.clear();
    }

    /// Residual at the DOFs' current values (no input map required)
    pub fn current_value(&self, arena: &DofArena) -> Result<f64> {
        let mut local = Vec::with_capacity(self.dofs.len());
        for &id in &self.dofs {
            local.push(arena.value_of(id)?);
        }
        Ok(self.kind.value_self(&local))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dof::Dof;
    use approx::assert_relative_eq;

    fn id(raw: u64) -> DofId {
        DofId::from_raw(raw)
    }

    #[test]
    fn test_factory_validates_name_and_arity() {
        assert!(matches!(
            SolverFunction::create("no_such_function", vec![]),
            Err(FunctionError::UnknownFunction(_))
        ));
        assert!(matches!(
            SolverFunction::create("hori_vert_2d", vec![id(1)]),
            Err(FunctionError::BadArity { expected: 2, actual: 1, .. })
        ));
        let f = SolverFunction::create("hori_vert_2d", vec![id(1), id(2)]).unwrap();
        assert_eq!(f.kind(), FunctionKind::HoriVert2d);
        assert_eq!(f.arity(), 2);
    }

    #[test]
    fn test_define_input_map_missing_dof() {
        let mut arena = DofArena::new();
        arena.insert(id(1), Dof::independent(1.0, true));
        arena.insert(id(2), Dof::independent(2.0, true));
        let mut f = SolverFunction::create("hori_vert_2d", vec![id(1), id(2)]).unwrap();

        let mut map = BTreeMap::new();
        map.insert(id(1), 0);
        assert!(matches!(
            f.define_input_map(&map, &mut arena),
            Err(FunctionError::MissingDofInMap(missing)) if missing == id(2)
        ));

        map.insert(id(2), 1);
        f.define_input_map(&map, &mut arena).unwrap();
        let x = DenseMatrix::column_from_slice(&[5.0, 3.0]);
        assert_relative_eq!(f.value(&x, &arena).unwrap(), 2.0);
        assert_eq!(f.gradient(&x, &arena).unwrap(), vec![1.0, -1.0]);
    }

    #[test]
    fn test_dependent_slot_override_and_chain_rule() {
        // DOF 4 is a dependent arc endpoint s = s_center + r cos(theta);
        // a hori_vert function then compares it against DOF 5.
        let mut arena = DofArena::new();
        arena.insert(id(1), Dof::independent(2.0, true)); // s_center
        arena.insert(id(2), Dof::independent(1.0, false)); // radius
        arena.insert(id(3), Dof::independent(0.5, true)); // theta
        let endpoint =
            SolverFunction::new(FunctionKind::Arc2dPointS, vec![id(1), id(2), id(3)]).unwrap();
        arena.insert(id(4), Dof::dependent(endpoint));
        arena.insert(id(5), Dof::independent(0.25, true));

        let mut root = SolverFunction::new(FunctionKind::HoriVert2d, vec![id(4), id(5)]).unwrap();

        // Globals: [s_center, theta, dof5 ; radius] (free then fixed)
        let mut map = BTreeMap::new();
        map.insert(id(1), 0);
        map.insert(id(3), 1);
        map.insert(id(5), 2);
        map.insert(id(2), 3);
        root.define_input_map(&map, &mut arena).unwrap();

        let x = DenseMatrix::column_from_slice(&[2.0, 0.5, 0.25, 1.0]);
        let expected = 2.0 + 0.5_f64.cos() - 0.25;
        assert_relative_eq!(root.value(&x, &arena).unwrap(), expected, epsilon = 1e-14);

        // d r / d s_center = 1, d r / d theta = -r sin(theta),
        // d r / d dof5 = -1, d r / d radius = cos(theta)
        let gradient = root.gradient(&x, &arena).unwrap();
        assert_relative_eq!(gradient[0], 1.0);
        assert_relative_eq!(gradient[1], -(0.5_f64.sin()), epsilon = 1e-14);
        assert_relative_eq!(gradient[2], -1.0);
        assert_relative_eq!(gradient[3], 0.5_f64.cos(), epsilon = 1e-14);
    }

    #[test]
    fn test_current_value_without_input_map() {
        let mut arena = DofArena::new();
        arena.insert(id(1), Dof::independent(4.0, true));
        arena.insert(id(2), Dof::independent(1.5, true));
        let f = SolverFunction::create("hori_vert_2d", vec![id(1), id(2)]).unwrap();
        assert_relative_eq!(f.current_value(&arena).unwrap(), 2.5);
    }
}
