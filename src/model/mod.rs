//! Model container
//!
//! The [`Model`] owns the three entity maps (DOFs, primitives, constraint
//! equations), the two id allocators (one for DOFs, one shared by
//! primitives and constraints), the active selection mask, and the
//! optional session store and display hook. All lifecycle operations -
//! registration, dependency-driven deletion, DOF substitution, and the
//! solve itself - go through here so the model's invariants hold between
//! any two operations.

pub mod selection;

use std::collections::BTreeMap;
use std::fmt;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constraints::{Constraint, ConstraintKind};
use crate::dof::{Dof, DofArena, DofId};
use crate::matrix::DenseMatrix;
use crate::primitives::{EntityId, Primitive, PrimitiveKind};
use crate::solver::{
    FunctionError, Minimizer, MinimizerOptions, SolveStatus, SolverFunction, SumOfSquares,
};
use crate::store::{Mutation, SessionStore, StoreError};

pub use selection::SelectionMask;

/// Model error types
#[derive(Error, Debug)]
pub enum ModelError {
    /// A solver-function operation failed
    #[error(transparent)]
    Function(#[from] FunctionError),

    /// The session store collaborator failed
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A referenced DOF is not registered
    #[error("DOF {0} does not exist in the model")]
    UnknownDof(DofId),

    /// A referenced entity is not registered
    #[error("entity {0} does not exist in the model")]
    UnknownEntity(EntityId),

    /// An entity exists but has the wrong kind for the operation
    #[error("entity {0} is not the expected primitive kind")]
    WrongEntityKind(EntityId),

    /// `replace_dof` called with an unknown source DOF
    #[error("attempt to replace DOF {0}, which is not in the model")]
    ReplaceTargetMissing(DofId),

    /// A DOF substitution would make a dependent DOF read itself
    #[error("replacing DOF {0} with {1} would close a dependent-DOF cycle")]
    CycleInDependentDofs(DofId, DofId),

    /// Degenerate input to a geometric constructor
    #[error("{0}")]
    DegenerateGeometry(&'static str),
}

/// Result type for model operations
pub type Result<T> = std::result::Result<T, ModelError>;

/// Callback surface for display updates; rendering lives outside the core
pub trait DisplayHook {
    /// Called once per primitive on `update_display`
    fn update_primitive(&mut self, primitive: &Primitive);

    /// Called once per constraint on `update_display`
    fn update_constraint(&mut self, constraint: &Constraint);
}

/// Outcome of a `solve` call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolveSummary {
    /// Why the solve stopped
    pub status: SolveStatus,
    /// Outer minimizer iterations
    pub iterations: usize,
    /// Merit evaluations spent
    pub merit_evaluations: usize,
    /// Merit value at the accepted point
    pub final_merit: f64,
}

impl SolveSummary {
    /// Summary of a solve with nothing to do
    fn trivial() -> Self {
        Self {
            status: SolveStatus::Converged,
            iterations: 0,
            merit_evaluations: 0,
            final_merit: 0.0,
        }
    }
}

/// Entity row payload stored in the session store
#[derive(Debug, Clone, Serialize, Deserialize)]
enum EntityRow {
    /// A primitive row
    Primitive(Primitive),
    /// A constraint row
    Constraint(Constraint),
}

/// Container binding DOFs, primitives, and constraints
pub struct Model {
    dofs: DofArena,
    primitives: BTreeMap<EntityId, Primitive>,
    constraints: BTreeMap<EntityId, Constraint>,
    next_dof_id: u64,
    next_entity_id: u64,
    selection_mask: SelectionMask,
    solve_options: MinimizerOptions,
    store: Option<SessionStore>,
    display: Option<Box<dyn DisplayHook>>,
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("dofs", &self.dofs.len())
            .field("primitives", &self.primitives.len())
            .field("constraints", &self.constraints.len())
            .field("selection_mask", &self.selection_mask)
            .finish()
    }
}

impl Default for Model {
    fn default() -> Self {
        Self::new()
    }
}

impl Model {
    /// Create an empty model without persistence
    pub fn new() -> Self {
        Self {
            dofs: DofArena::new(),
            primitives: BTreeMap::new(),
            constraints: BTreeMap::new(),
            next_dof_id: 1,
            next_entity_id: 1,
            selection_mask: SelectionMask::default(),
            solve_options: MinimizerOptions::default(),
            store: None,
            display: None,
        }
    }

    /// Create an empty model mirrored into a fresh session store
    pub fn with_session_store() -> Self {
        let mut model = Self::new();
        model.store = Some(SessionStore::new());
        model
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// The DOF arena
    pub fn dofs(&self) -> &DofArena {
        &self.dofs
    }

    /// Number of registered primitives
    pub fn primitive_count(&self) -> usize {
        self.primitives.len()
    }

    /// Number of registered constraints
    pub fn constraint_count(&self) -> usize {
        self.constraints.len()
    }

    /// Fetch a primitive
    pub fn primitive(&self, id: EntityId) -> Option<&Primitive> {
        self.primitives.get(&id)
    }

    /// Fetch a constraint
    pub fn constraint(&self, id: EntityId) -> Option<&Constraint> {
        self.constraints.get(&id)
    }

    /// Iterate primitives in ascending id order
    pub fn primitives(&self) -> impl Iterator<Item = &Primitive> {
        self.primitives.values()
    }

    /// Iterate constraints in ascending id order
    pub fn constraints(&self) -> impl Iterator<Item = &Constraint> {
        self.constraints.values()
    }

    /// The attached session store, if any
    pub fn session_store(&self) -> Option<&SessionStore> {
        self.store.as_ref()
    }

    /// Minimizer options used by `solve`
    pub fn solve_options(&self) -> &MinimizerOptions {
        &self.solve_options
    }

    /// Replace the minimizer options used by `solve`
    pub fn set_solve_options(&mut self, options: MinimizerOptions) {
        self.solve_options = options;
    }

    /// Install the display hook invoked by `update_display`
    pub fn set_display_hook(&mut self, hook: Box<dyn DisplayHook>) {
        self.display = Some(hook);
    }

    // ------------------------------------------------------------------
    // Id allocation
    // ------------------------------------------------------------------

    fn allocate_dof_id(&mut self) -> DofId {
        let id = DofId::from_raw(self.next_dof_id);
        self.next_dof_id += 1;
        id
    }

    fn allocate_entity_id(&mut self) -> EntityId {
        let id = EntityId::from_raw(self.next_entity_id);
        self.next_entity_id += 1;
        id
    }

    /// Rebind the DOF id allocator (used after loading a model)
    pub fn set_next_dof_id(&mut self, next: u64) {
        self.next_dof_id = next;
    }

    /// Rebind the shared primitive/constraint id allocator
    pub fn set_next_entity_id(&mut self, next: u64) {
        self.next_entity_id = next;
    }

    // ------------------------------------------------------------------
    // DOF operations
    // ------------------------------------------------------------------

    /// Register a DOF, allocating its id.
    ///
    /// A dependent DOF may only reference DOFs that already exist, which
    /// keeps the dependent graph acyclic by construction.
    pub fn add_dof(&mut self, dof: Dof) -> Result<DofId> {
        for &referenced in dof.referenced_dofs() {
            if !self.dofs.contains(referenced) {
                return Err(ModelError::UnknownDof(referenced));
            }
        }
        let id = self.allocate_dof_id();
        let previous = self.dofs.insert(id, dof);
        assert!(previous.is_none(), "duplicate DOF id {}", id);

        let row = serde_json::to_value(self.dofs.get(id)).map_err(StoreError::from)?;
        self.record(vec![Mutation::PutDof { id: id.raw(), row }])?;
        Ok(id)
    }

    /// Current value of a DOF (dependent DOFs are evaluated)
    pub fn dof_value(&self, id: DofId) -> Result<f64> {
        Ok(self.dofs.value_of(id)?)
    }

    /// Assign a value to an independent DOF.
    ///
    /// Writes to dependent or unknown DOFs are logged and ignored; the
    /// return value reports whether anything changed.
    pub fn set_dof_value(&mut self, id: DofId, value: f64) -> bool {
        if !self.dofs.set_value(id, value) {
            return false;
        }
        self.mirror_dof(id);
        true
    }

    /// Change the free flag of an independent DOF
    pub fn set_dof_free(&mut self, id: DofId, free: bool) -> bool {
        if !self.dofs.set_free(id, free) {
            return false;
        }
        self.mirror_dof(id);
        true
    }

    /// Mirror one DOF row into the store after an in-place change
    fn mirror_dof(&mut self, id: DofId) {
        if self.store.is_none() {
            return;
        }
        match serde_json::to_value(self.dofs.get(id)) {
            Ok(row) => {
                if let Err(error) = self.record(vec![Mutation::PutDof { id: id.raw(), row }]) {
                    warn!("failed to mirror DOF {} into the store: {}", id, error);
                }
            }
            Err(error) => warn!("failed to serialize DOF {}: {}", id, error),
        }
    }

    // ------------------------------------------------------------------
    // Entity registration
    // ------------------------------------------------------------------

    /// Register a primitive built from `kind`, allocating its id.
    ///
    /// Every DOF and entity the kind references must already be
    /// registered; registration of already-known DOFs is a no-op, so
    /// sharing DOFs between primitives is the normal case, not an error.
    pub fn add_primitive(&mut self, kind: PrimitiveKind) -> Result<EntityId> {
        let inherited = self.inherited_dofs(&kind.referenced_entities())?;
        let id = self.allocate_entity_id();
        let mut primitive = Primitive::with_inherited_dofs(id, kind, inherited, &self.dofs)?;
        primitive.apply_selection_mask(self.selection_mask);

        let row = serde_json::to_value(EntityRow::Primitive(primitive.clone()))
            .map_err(StoreError::from)?;
        self.primitives.insert(id, primitive);
        self.record(vec![Mutation::PutEntity { id: id.raw(), row }])?;
        debug!("registered primitive {}", id);
        Ok(id)
    }

    /// Register a constraint equation, allocating its id from the same
    /// space as primitives
    pub fn add_constraint(
        &mut self,
        kind: ConstraintKind,
        function: SolverFunction,
    ) -> Result<EntityId> {
        let inherited = self.inherited_dofs(&kind.referenced_entities())?;
        let id = self.allocate_entity_id();
        let mut constraint =
            Constraint::with_inherited_dofs(id, kind, function, inherited, &self.dofs)?;
        constraint.apply_selection_mask(self.selection_mask);

        let row = serde_json::to_value(EntityRow::Constraint(constraint.clone()))
            .map_err(StoreError::from)?;
        self.constraints.insert(id, constraint);
        self.record(vec![Mutation::PutEntity { id: id.raw(), row }])?;
        debug!("registered constraint {}", id);
        Ok(id)
    }

    /// Collect the DOF sets of referenced primitives; an entity depends on
    /// everything its referents read
    fn inherited_dofs(&self, referenced: &[EntityId]) -> Result<Vec<DofId>> {
        let mut inherited = Vec::new();
        for id in referenced {
            let primitive = self
                .primitives
                .get(id)
                .ok_or(ModelError::UnknownEntity(*id))?;
            inherited.extend_from_slice(primitive.dofs());
        }
        Ok(inherited)
    }

    /// Set a constraint's weight in the merit sum
    pub fn set_constraint_weight(&mut self, id: EntityId, weight: f64) -> Result<()> {
        let constraint = self
            .constraints
            .get_mut(&id)
            .ok_or(ModelError::UnknownEntity(id))?;
        constraint.set_weight(weight);
        let row = serde_json::to_value(EntityRow::Constraint(constraint.clone()))
            .map_err(StoreError::from)?;
        self.record(vec![Mutation::PutEntity { id: id.raw(), row }])
    }

    // ------------------------------------------------------------------
    // Deletion
    // ------------------------------------------------------------------

    /// Delete an entity and everything transitively dependent on it, then
    /// garbage-collect DOFs no survivor references
    pub fn delete_primitive(&mut self, id: EntityId) -> Result<()> {
        self.flag_entity(id)?;
        self.flag_dependents();
        self.delete_flagged()
    }

    /// Delete exactly one entity without the dependency cascade.
    ///
    /// The caller is responsible for not leaving dangling references.
    pub fn delete_primitive_no_cascade(&mut self, id: EntityId) -> Result<()> {
        self.flag_entity(id)?;
        self.delete_flagged()
    }

    /// Delete every selected entity, with the usual cascade
    pub fn delete_selected(&mut self) -> Result<()> {
        for primitive in self.primitives.values_mut() {
            if primitive.is_selected() {
                primitive.flag_for_deletion();
            }
        }
        for constraint in self.constraints.values_mut() {
            if constraint.is_selected() {
                constraint.flag_for_deletion();
            }
        }
        self.flag_dependents();
        self.delete_flagged()
    }

    fn flag_entity(&mut self, id: EntityId) -> Result<()> {
        if let Some(primitive) = self.primitives.get_mut(&id) {
            primitive.flag_for_deletion();
            Ok(())
        } else if let Some(constraint) = self.constraints.get_mut(&id) {
            constraint.flag_for_deletion();
            Ok(())
        } else {
            Err(ModelError::UnknownEntity(id))
        }
    }

    /// Propagate deletion flags: anything depending on a flagged entity
    /// gets flagged too, to a fixpoint
    fn flag_dependents(&mut self) {
        loop {
            let flagged: Vec<EntityId> = self
                .primitives
                .values()
                .filter(|p| p.is_flagged_for_deletion())
                .map(|p| p.id())
                .chain(
                    self.constraints
                        .values()
                        .filter(|c| c.is_flagged_for_deletion())
                        .map(|c| c.id()),
                )
                .collect();

            let mut changed = false;
            for &seed in &flagged {
                for primitive in self.primitives.values_mut() {
                    changed |= primitive.flag_if_depends_on(seed);
                }
                for constraint in self.constraints.values_mut() {
                    changed |= constraint.flag_if_depends_on(seed);
                }
            }
            if !changed {
                return;
            }
        }
    }

    /// Erase every flagged entity, then garbage-collect DOFs.
    ///
    /// Flagging and erasing are separate passes so erasure never observes
    /// a dangling reference mid-walk.
    fn delete_flagged(&mut self) -> Result<()> {
        let mut mutations = Vec::new();

        let doomed_primitives: Vec<EntityId> = self
            .primitives
            .values()
            .filter(|p| p.is_flagged_for_deletion())
            .map(|p| p.id())
            .collect();
        for id in doomed_primitives {
            self.primitives.remove(&id);
            mutations.push(Mutation::DeleteEntity { id: id.raw() });
            debug!("erased primitive {}", id);
        }

        let doomed_constraints: Vec<EntityId> = self
            .constraints
            .values()
            .filter(|c| c.is_flagged_for_deletion())
            .map(|c| c.id())
            .collect();
        for id in doomed_constraints {
            self.constraints.remove(&id);
            mutations.push(Mutation::DeleteEntity { id: id.raw() });
            debug!("erased constraint {}", id);
        }

        self.gc_unused_dofs(&mut mutations)?;
        self.record(mutations)
    }

    /// Remove DOFs no surviving primitive or constraint references
    fn gc_unused_dofs(&mut self, mutations: &mut Vec<Mutation>) -> Result<()> {
        let mut referenced: Vec<DofId> = Vec::new();
        for primitive in self.primitives.values() {
            referenced.extend_from_slice(primitive.dofs());
        }
        for constraint in self.constraints.values() {
            referenced.extend_from_slice(constraint.dofs());
        }
        referenced.sort();
        referenced.dedup();

        for &id in &referenced {
            if !self.dofs.contains(id) {
                return Err(ModelError::UnknownDof(id));
            }
        }

        let doomed: Vec<DofId> = self
            .dofs
            .ids()
            .filter(|id| referenced.binary_search(id).is_err())
            .collect();
        for id in doomed {
            self.dofs.remove(id);
            mutations.push(Mutation::DeleteDof { id: id.raw() });
            debug!("garbage-collected DOF {}", id);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // DOF substitution
    // ------------------------------------------------------------------

    /// Rewrite every reference to `old` so it reads `new`, then delete
    /// `old`. This is the building block for merging coincident points.
    ///
    /// `new` must already be registered; replacing with a DOF that
    /// transitively reads `old` is rejected because the rewrite would
    /// close a dependent-DOF cycle.
    pub fn replace_dof(&mut self, old: DofId, new: DofId) -> Result<()> {
        if !self.dofs.contains(old) {
            return Err(ModelError::ReplaceTargetMissing(old));
        }
        if !self.dofs.contains(new) {
            return Err(ModelError::UnknownDof(new));
        }
        if old == new {
            return Ok(());
        }
        if self.dofs.depends_transitively(new, old) {
            return Err(ModelError::CycleInDependentDofs(old, new));
        }

        let mut mutations = Vec::new();

        // Rewrite the solver functions of dependent DOFs first so the
        // entity DOF-set rebuilds below see a consistent arena.
        let dof_ids: Vec<DofId> = self.dofs.ids().collect();
        for id in dof_ids {
            let changed = match self.dofs.get_mut(id) {
                Some(Dof::Dependent { function }) if function.dofs().contains(&old) => {
                    function.replace_dof(old, new);
                    true
                }
                _ => false,
            };
            if changed {
                let row = serde_json::to_value(self.dofs.get(id)).map_err(StoreError::from)?;
                mutations.push(Mutation::PutDof { id: id.raw(), row });
            }
        }

        let primitive_ids: Vec<EntityId> = self.primitives.keys().copied().collect();
        for id in primitive_ids {
            let primitive = self
                .primitives
                .get_mut(&id)
                .ok_or(ModelError::UnknownEntity(id))?;
            if !primitive.dofs().contains(&old) {
                continue;
            }
            primitive.substitute_dof(old, new, &self.dofs)?;
            let row = serde_json::to_value(EntityRow::Primitive(primitive.clone()))
                .map_err(StoreError::from)?;
            mutations.push(Mutation::PutEntity { id: id.raw(), row });
        }

        let constraint_ids: Vec<EntityId> = self.constraints.keys().copied().collect();
        for id in constraint_ids {
            let constraint = self
                .constraints
                .get_mut(&id)
                .ok_or(ModelError::UnknownEntity(id))?;
            if !constraint.dofs().contains(&old) {
                continue;
            }
            constraint.substitute_dof(old, new, &self.dofs)?;
            let row = serde_json::to_value(EntityRow::Constraint(constraint.clone()))
                .map_err(StoreError::from)?;
            mutations.push(Mutation::PutEntity { id: id.raw(), row });
        }

        self.dofs.remove(old);
        mutations.push(Mutation::DeleteDof { id: old.raw() });
        info!("replaced DOF {} with {}", old, new);
        self.record(mutations)
    }

    // ------------------------------------------------------------------
    // Solving
    // ------------------------------------------------------------------

    /// Drive the free DOFs to values that minimize the weighted
    /// sum-of-squared constraint residuals.
    ///
    /// Returns immediately when there is nothing to solve (no constraints
    /// or no free DOFs). The free DOFs always receive the best point the
    /// minimizer saw, whatever the stop status.
    pub fn solve(&mut self) -> Result<SolveSummary> {
        if self.constraints.is_empty() {
            return Ok(SolveSummary::trivial());
        }

        let partition = self.dofs.partition();
        if partition.free.is_empty() {
            return Ok(SolveSummary::trivial());
        }

        // Global parameter order: free values stacked above fixed values
        let mut global_map: BTreeMap<DofId, usize> = BTreeMap::new();
        for (index, id) in partition.free.iter().chain(partition.fixed.iter()).enumerate() {
            global_map.insert(*id, index);
        }

        {
            let Model {
                constraints, dofs, ..
            } = self;
            for constraint in constraints.values_mut() {
                constraint
                    .solver_function_mut()
                    .define_input_map(&global_map, dofs)?;
            }
        }

        let functions: Vec<&SolverFunction> = self
            .constraints
            .values()
            .map(|c| c.solver_function())
            .collect();
        let weights: Vec<f64> = self.constraints.values().map(|c| c.weight()).collect();

        let merit = SumOfSquares::new(
            functions,
            weights,
            &self.dofs,
            partition.free.len(),
            &partition.fixed_values,
        );
        let minimizer = Minimizer::new(self.solve_options);
        let x_init = DenseMatrix::column_from_slice(&partition.free_values);
        let result = minimizer.minimize(&merit, &x_init)?;
        drop(merit);

        let mut mutations = Vec::new();
        for (index, &id) in partition.free.iter().enumerate() {
            self.dofs.set_value(id, result.x[(index, 0)]);
            if self.store.is_some() {
                let row = serde_json::to_value(self.dofs.get(id)).map_err(StoreError::from)?;
                mutations.push(Mutation::PutDof { id: id.raw(), row });
            }
        }
        self.record(mutations)?;

        info!(
            "solve {:?}: {} iterations, {} merit evaluations, merit {:e}",
            result.status, result.iterations, result.merit_evaluations, result.final_merit
        );
        Ok(SolveSummary {
            status: result.status,
            iterations: result.iterations,
            merit_evaluations: result.merit_evaluations,
            final_merit: result.final_merit,
        })
    }

    // ------------------------------------------------------------------
    // Selection and display
    // ------------------------------------------------------------------

    /// Set the active selection mask and propagate it to every entity
    pub fn apply_selection_mask(&mut self, mask: SelectionMask) {
        self.selection_mask = mask;
        for primitive in self.primitives.values_mut() {
            primitive.apply_selection_mask(mask);
        }
        for constraint in self.constraints.values_mut() {
            constraint.apply_selection_mask(mask);
        }
    }

    /// The active selection mask
    pub fn selection_mask(&self) -> SelectionMask {
        self.selection_mask
    }

    /// Select or deselect one entity
    pub fn set_selected(&mut self, id: EntityId, selected: bool) -> Result<()> {
        if let Some(primitive) = self.primitives.get_mut(&id) {
            primitive.set_selected(selected);
            Ok(())
        } else if let Some(constraint) = self.constraints.get_mut(&id) {
            constraint.set_selected(selected);
            Ok(())
        } else {
            Err(ModelError::UnknownEntity(id))
        }
    }

    /// Ids of the currently selected primitives
    pub fn get_selected_primitives(&self) -> Vec<EntityId> {
        self.primitives
            .values()
            .filter(|p| p.is_selected())
            .map(|p| p.id())
            .collect()
    }

    /// Ids of the currently selected constraints
    pub fn get_selected_constraints(&self) -> Vec<EntityId> {
        self.constraints
            .values()
            .filter(|c| c.is_selected())
            .map(|c| c.id())
            .collect()
    }

    /// Fan the display hook out to every primitive and constraint
    pub fn update_display(&mut self) {
        if let Some(mut hook) = self.display.take() {
            for primitive in self.primitives.values() {
                hook.update_primitive(primitive);
            }
            for constraint in self.constraints.values() {
                hook.update_constraint(constraint);
            }
            self.display = Some(hook);
        }
    }

    // ------------------------------------------------------------------
    // Session store
    // ------------------------------------------------------------------

    /// Mirror a batch of mutations into the store as one journal entry
    fn record(&mut self, mutations: Vec<Mutation>) -> Result<()> {
        if mutations.is_empty() {
            return Ok(());
        }
        if let Some(store) = self.store.as_mut() {
            store.begin();
            for mutation in mutations {
                store.apply(mutation);
            }
            store.commit()?;
        }
        Ok(())
    }

    /// Record a named checkpoint in the undo/redo history.
    ///
    /// Returns the checkpoint id, or `None` without a store or before any
    /// journaled operation.
    pub fn mark_stable_point(&mut self, description: &str) -> Option<u64> {
        self.store
            .as_mut()
            .and_then(|store| store.mark_stable_point(description))
    }

    /// Roll back to the previous stable point and resynchronize.
    ///
    /// Returns false when there is nothing to undo.
    pub fn undo(&mut self) -> Result<bool> {
        let undone = match self.store.as_mut() {
            Some(store) => store.undo()?,
            None => false,
        };
        if undone {
            self.sync_from_store()?;
        }
        Ok(undone)
    }

    /// Roll forward to the next stable point and resynchronize.
    ///
    /// Returns false when there is nothing to redo.
    pub fn redo(&mut self) -> Result<bool> {
        let redone = match self.store.as_mut() {
            Some(store) => store.redo()?,
            None => false,
        };
        if redone {
            self.sync_from_store()?;
        }
        Ok(redone)
    }

    /// Rebuild the in-memory maps from the store's row tables and rebind
    /// both id allocators past the highest loaded id
    fn sync_from_store(&mut self) -> Result<()> {
        let store = match self.store.as_ref() {
            Some(store) => store,
            None => return Ok(()),
        };

        let mut dofs = DofArena::new();
        let mut max_dof_id = 0;
        for (&raw, row) in store.dof_rows() {
            let dof: Dof = serde_json::from_value(row.clone()).map_err(StoreError::from)?;
            dofs.insert(DofId::from_raw(raw), dof);
            max_dof_id = max_dof_id.max(raw);
        }

        let mut primitives = BTreeMap::new();
        let mut constraints = BTreeMap::new();
        let mut max_entity_id = 0;
        for (&raw, row) in store.entity_rows() {
            let entity: EntityRow = serde_json::from_value(row.clone()).map_err(StoreError::from)?;
            max_entity_id = max_entity_id.max(raw);
            match entity {
                EntityRow::Primitive(primitive) => {
                    primitives.insert(EntityId::from_raw(raw), primitive);
                }
                EntityRow::Constraint(constraint) => {
                    constraints.insert(EntityId::from_raw(raw), constraint);
                }
            }
        }

        self.dofs = dofs;
        self.primitives = primitives;
        self.constraints = constraints;
        self.next_dof_id = self.next_dof_id.max(max_dof_id + 1);
        self.next_entity_id = self.next_entity_id.max(max_entity_id + 1);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::FunctionKind;
    use approx::assert_relative_eq;

    /// Two free points with a line between them
    fn two_points_and_line(model: &mut Model) -> (EntityId, EntityId, EntityId) {
        let p1s = model.add_dof(Dof::independent(0.0, true)).unwrap();
        let p1t = model.add_dof(Dof::independent(0.0, true)).unwrap();
        let p2s = model.add_dof(Dof::independent(3.0, true)).unwrap();
        let p2t = model.add_dof(Dof::independent(4.0, true)).unwrap();

        let point1 = model
            .add_primitive(PrimitiveKind::Point2d {
                s: p1s,
                t: p1t,
                plane: None,
            })
            .unwrap();
        let point2 = model
            .add_primitive(PrimitiveKind::Point2d {
                s: p2s,
                t: p2t,
                plane: None,
            })
            .unwrap();
        let line = model
            .add_primitive(PrimitiveKind::Line2d {
                point1,
                point2,
                plane: None,
            })
            .unwrap();
        (point1, point2, line)
    }

    fn point_dofs(model: &Model, id: EntityId) -> (DofId, DofId) {
        match model.primitive(id).unwrap().kind() {
            PrimitiveKind::Point2d { s, t, .. } => (*s, *t),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_ids_are_disjoint_spaces() {
        let mut model = Model::new();
        let dof = model.add_dof(Dof::independent(0.0, true)).unwrap();
        let dof2 = model.add_dof(Dof::independent(0.0, true)).unwrap();
        let point = model
            .add_primitive(PrimitiveKind::Point2d {
                s: dof,
                t: dof2,
                plane: None,
            })
            .unwrap();
        assert_eq!(dof.raw(), 1);
        assert_eq!(dof2.raw(), 2);
        assert_eq!(point.raw(), 1);
    }

    #[test]
    fn test_add_primitive_validates_references() {
        let mut model = Model::new();
        let missing_dof = PrimitiveKind::Point2d {
            s: DofId::from_raw(99),
            t: DofId::from_raw(100),
            plane: None,
        };
        assert!(matches!(
            model.add_primitive(missing_dof),
            Err(ModelError::Function(FunctionError::UnknownDof(_)))
        ));

        let missing_entity = PrimitiveKind::Line2d {
            point1: EntityId::from_raw(50),
            point2: EntityId::from_raw(51),
            plane: None,
        };
        assert!(matches!(
            model.add_primitive(missing_entity),
            Err(ModelError::UnknownEntity(_))
        ));
    }

    #[test]
    fn test_cascade_delete_and_dof_gc() {
        let mut model = Model::new();
        let (point1, _point2, line) = two_points_and_line(&mut model);
        assert_eq!(model.primitive_count(), 3);
        assert_eq!(model.dofs().len(), 4);

        model.delete_primitive(point1).unwrap();

        // the line depended on point1, so both are gone
        assert!(model.primitive(point1).is_none());
        assert!(model.primitive(line).is_none());
        assert_eq!(model.primitive_count(), 1);
        // point1's DOFs are garbage-collected, point2's survive
        assert_eq!(model.dofs().len(), 2);
    }

    #[test]
    fn test_delete_cascades_to_constraints() {
        let mut model = Model::new();
        let (point1, point2, _line) = two_points_and_line(&mut model);
        let (p1s, p1t) = point_dofs(&model, point1);
        let (p2s, p2t) = point_dofs(&model, point2);
        let distance = model.add_dof(Dof::independent(5.0, false)).unwrap();
        let function = SolverFunction::new(
            FunctionKind::DistancePoint2d,
            vec![p1s, p1t, p2s, p2t, distance],
        )
        .unwrap();
        let constraint = model
            .add_constraint(
                ConstraintKind::DistancePoint2d {
                    point1,
                    point2,
                    distance,
                },
                function,
            )
            .unwrap();

        model.delete_primitive(point2).unwrap();
        assert!(model.constraint(constraint).is_none());
        assert_eq!(model.primitive_count(), 1);
        // only point1's DOFs remain
        assert_eq!(model.dofs().len(), 2);
    }

    #[test]
    fn test_replace_dof_rewrites_referents() {
        let mut model = Model::new();
        let (point1, point2, line) = two_points_and_line(&mut model);
        let (p1s, _) = point_dofs(&model, point1);
        let (p2s, _) = point_dofs(&model, point2);

        model.replace_dof(p2s, p1s).unwrap();

        assert_eq!(model.dofs().len(), 3);
        let (p2s_after, _) = point_dofs(&model, point2);
        assert_eq!(p2s_after, p1s);
        // the line's DOF set follows its endpoints
        assert!(model.primitive(line).unwrap().dofs().contains(&p1s));
        assert!(!model.primitive(line).unwrap().dofs().contains(&p2s));
    }

    #[test]
    fn test_replace_dof_errors() {
        let mut model = Model::new();
        let known = model.add_dof(Dof::independent(0.0, true)).unwrap();
        let ghost = DofId::from_raw(77);
        assert!(matches!(
            model.replace_dof(ghost, known),
            Err(ModelError::ReplaceTargetMissing(_))
        ));
        assert!(matches!(
            model.replace_dof(known, ghost),
            Err(ModelError::UnknownDof(_))
        ));
    }

    #[test]
    fn test_replace_dof_rejects_cycles() {
        let mut model = Model::new();
        let theta = model.add_dof(Dof::independent(0.4, true)).unwrap();
        let tangent_fn = SolverFunction::new(FunctionKind::Arc2dTangentS, vec![theta]).unwrap();
        let tangent = model.add_dof(Dof::dependent(tangent_fn)).unwrap();

        assert!(matches!(
            model.replace_dof(theta, tangent),
            Err(ModelError::CycleInDependentDofs(_, _))
        ));
    }

    #[test]
    fn test_solve_trivial_cases() {
        let mut model = Model::new();
        // no constraints at all
        let summary = model.solve().unwrap();
        assert_eq!(summary.status, SolveStatus::Converged);
        assert_eq!(summary.iterations, 0);

        // constraints but no free DOFs
        let (point1, point2, _line) = two_points_and_line(&mut model);
        let (p1s, p1t) = point_dofs(&model, point1);
        let (p2s, p2t) = point_dofs(&model, point2);
        for dof in [p1s, p1t, p2s, p2t] {
            model.set_dof_free(dof, false);
        }
        let distance = model.add_dof(Dof::independent(5.0, false)).unwrap();
        let function = SolverFunction::new(
            FunctionKind::DistancePoint2d,
            vec![p1s, p1t, p2s, p2t, distance],
        )
        .unwrap();
        model
            .add_constraint(
                ConstraintKind::DistancePoint2d {
                    point1,
                    point2,
                    distance,
                },
                function,
            )
            .unwrap();
        let summary = model.solve().unwrap();
        assert_eq!(summary.iterations, 0);
    }

    #[test]
    fn test_solve_distance_constraint() {
        let mut model = Model::new();
        let (point1, point2, _line) = two_points_and_line(&mut model);
        let (p1s, p1t) = point_dofs(&model, point1);
        let (p2s, p2t) = point_dofs(&model, point2);
        // pin the first point
        model.set_dof_free(p1s, false);
        model.set_dof_free(p1t, false);

        let distance = model.add_dof(Dof::independent(10.0, false)).unwrap();
        let function = SolverFunction::new(
            FunctionKind::DistancePoint2d,
            vec![p1s, p1t, p2s, p2t, distance],
        )
        .unwrap();
        let constraint_id = model
            .add_constraint(
                ConstraintKind::DistancePoint2d {
                    point1,
                    point2,
                    distance,
                },
                function,
            )
            .unwrap();

        let summary = model.solve().unwrap();
        assert_eq!(summary.status, SolveStatus::Converged);

        let residual = model
            .constraint(constraint_id)
            .unwrap()
            .residual(model.dofs())
            .unwrap();
        assert!(residual.abs() < 1e-6, "residual = {}", residual);

        let s = model.dof_value(p2s).unwrap();
        let t = model.dof_value(p2t).unwrap();
        assert_relative_eq!((s * s + t * t).sqrt(), 10.0, epsilon = 1e-6);
    }

    #[test]
    fn test_selection_mask_propagation() {
        let mut model = Model::new();
        let (point1, _point2, line) = two_points_and_line(&mut model);
        model.set_selected(point1, true).unwrap();
        model.set_selected(line, true).unwrap();

        model.apply_selection_mask(SelectionMask::Points);
        assert_eq!(model.get_selected_primitives(), vec![point1]);

        model.apply_selection_mask(SelectionMask::None);
        assert!(model.get_selected_primitives().is_empty());
    }

    #[test]
    fn test_delete_selected() {
        let mut model = Model::new();
        let (point1, _point2, line) = two_points_and_line(&mut model);
        model.set_selected(point1, true).unwrap();
        model.delete_selected().unwrap();
        assert!(model.primitive(point1).is_none());
        assert!(model.primitive(line).is_none());
        assert_eq!(model.primitive_count(), 1);
    }

    #[test]
    fn test_display_hook_fanout() {
        struct Counter {
            primitives: usize,
            constraints: usize,
        }
        // shared counts observed through a cell
        use std::cell::RefCell;
        use std::rc::Rc;
        struct Hook(Rc<RefCell<Counter>>);
        impl DisplayHook for Hook {
            fn update_primitive(&mut self, _primitive: &Primitive) {
                self.0.borrow_mut().primitives += 1;
            }
            fn update_constraint(&mut self, _constraint: &Constraint) {
                self.0.borrow_mut().constraints += 1;
            }
        }

        let counts = Rc::new(RefCell::new(Counter {
            primitives: 0,
            constraints: 0,
        }));
        let mut model = Model::new();
        two_points_and_line(&mut model);
        model.set_display_hook(Box::new(Hook(counts.clone())));
        model.update_display();
        assert_eq!(counts.borrow().primitives, 3);
        assert_eq!(counts.borrow().constraints, 0);
    }
}
