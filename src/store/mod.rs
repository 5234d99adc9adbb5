//! Session store
//!
//! Reference implementation of the persistence collaborator: an in-memory
//! row store with a replayable undo/redo journal. The model mirrors every
//! mutation here between `begin`/`commit` so one logical operation becomes
//! one atomic journal entry of `(undo, redo)` blobs.
//!
//! Blobs are opaque strings (JSON arrays of row mutations). Undo/redo
//! replays blobs against the row tables between named *stable points* - a
//! monotone id stream of checkpoints with at most one current. Committing
//! a new entry after an undo truncates the forward history, exactly like a
//! linear editor history.

use std::collections::BTreeMap;

use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Store error types
#[derive(Error, Debug)]
pub enum StoreError {
    /// A blob or row payload failed to (de)serialize
    #[error("store serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// `commit` called without a matching `begin`
    #[error("commit without an open batch")]
    NoOpenBatch,
}

/// Result type for store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// One row mutation. Forward and inverse blobs are both lists of these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Mutation {
    /// Insert or overwrite a DOF row
    PutDof {
        /// Row id
        id: u64,
        /// Serialized DOF payload
        row: Value,
    },
    /// Remove a DOF row
    DeleteDof {
        /// Row id
        id: u64,
    },
    /// Insert or overwrite an entity (primitive or constraint) row
    PutEntity {
        /// Row id
        id: u64,
        /// Serialized entity payload
        row: Value,
    },
    /// Remove an entity row
    DeleteEntity {
        /// Row id
        id: u64,
    },
}

/// A named checkpoint in the journal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StablePoint {
    /// Monotone checkpoint id
    pub id: u64,
    /// Journal position the checkpoint captures
    pub position: usize,
    /// Human-readable description
    pub description: String,
}

/// One committed journal entry
#[derive(Debug, Clone, Serialize, Deserialize)]
struct JournalEntry {
    undo: String,
    redo: String,
}

/// In-memory row store with a replayable undo/redo journal
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionStore {
    dof_rows: BTreeMap<u64, Value>,
    entity_rows: BTreeMap<u64, Value>,
    journal: Vec<JournalEntry>,
    /// Number of journal entries currently applied to the tables
    position: usize,
    stable_points: Vec<StablePoint>,
    next_stable_id: u64,
    #[serde(skip)]
    open_batch: Option<OpenBatch>,
}

#[derive(Debug, Clone, Default)]
struct OpenBatch {
    forward: Vec<Mutation>,
    inverse: Vec<Mutation>,
}

impl SessionStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            next_stable_id: 1,
            ..Self::default()
        }
    }

    /// DOF rows keyed by id
    pub fn dof_rows(&self) -> &BTreeMap<u64, Value> {
        &self.dof_rows
    }

    /// Entity rows keyed by id
    pub fn entity_rows(&self) -> &BTreeMap<u64, Value> {
        &self.entity_rows
    }

    /// Number of committed journal entries
    pub fn journal_len(&self) -> usize {
        self.journal.len()
    }

    /// Current journal position (entries applied to the tables)
    pub fn position(&self) -> usize {
        self.position
    }

    /// The recorded stable points, oldest first
    pub fn stable_points(&self) -> &[StablePoint] {
        &self.stable_points
    }

    // ------------------------------------------------------------------
    // Mutation batching
    // ------------------------------------------------------------------

    /// Open a mutation batch. One logical model operation maps to one
    /// begin/commit pair and therefore one journal entry.
    pub fn begin(&mut self) {
        if self.open_batch.is_some() {
            warn!("store batch already open; folding into it");
            return;
        }
        self.open_batch = Some(OpenBatch::default());
    }

    /// Apply a mutation to the tables and record it in the open batch
    /// together with its inverse.
    pub fn apply(&mut self, mutation: Mutation) {
        let inverse = self.apply_to_tables(&mutation);
        if let Some(batch) = self.open_batch.as_mut() {
            batch.forward.push(mutation);
            batch.inverse.push(inverse);
        } else {
            warn!("store mutation outside a batch; it will not be undoable");
        }
    }

    /// Close the batch, committing it to the journal. Commits after an
    /// undo truncate the forward history and any stable points in it.
    pub fn commit(&mut self) -> Result<()> {
        let batch = self.open_batch.take().ok_or(StoreError::NoOpenBatch)?;
        if batch.forward.is_empty() {
            return Ok(());
        }

        if self.position < self.journal.len() {
            self.journal.truncate(self.position);
            self.stable_points
                .retain(|stable| stable.position <= self.position);
        }

        // Undo blobs replay newest-first
        let mut inverse = batch.inverse;
        inverse.reverse();

        self.journal.push(JournalEntry {
            undo: serde_json::to_string(&inverse)?,
            redo: serde_json::to_string(&batch.forward)?,
        });
        self.position = self.journal.len();
        Ok(())
    }

    /// Apply a mutation to the row tables, returning its inverse
    fn apply_to_tables(&mut self, mutation: &Mutation) -> Mutation {
        match mutation {
            Mutation::PutDof { id, row } => {
                let previous = self.dof_rows.insert(*id, row.clone());
                match previous {
                    Some(row) => Mutation::PutDof { id: *id, row },
                    None => Mutation::DeleteDof { id: *id },
                }
            }
            Mutation::DeleteDof { id } => match self.dof_rows.remove(id) {
                Some(row) => Mutation::PutDof { id: *id, row },
                None => Mutation::DeleteDof { id: *id },
            },
            Mutation::PutEntity { id, row } => {
                let previous = self.entity_rows.insert(*id, row.clone());
                match previous {
                    Some(row) => Mutation::PutEntity { id: *id, row },
                    None => Mutation::DeleteEntity { id: *id },
                }
            }
            Mutation::DeleteEntity { id } => match self.entity_rows.remove(id) {
                Some(row) => Mutation::PutEntity { id: *id, row },
                None => Mutation::DeleteEntity { id: *id },
            },
        }
    }

    /// Replay a blob against the tables without recording anything
    fn replay(&mut self, blob: &str) -> Result<()> {
        let mutations: Vec<Mutation> = serde_json::from_str(blob)?;
        for mutation in &mutations {
            self.apply_to_tables(mutation);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Stable points and undo/redo
    // ------------------------------------------------------------------

    /// Record a stable point at the current journal position.
    ///
    /// Returns the checkpoint id. Marking twice at the same position, or
    /// before anything has been journaled, reuses the existing state and
    /// allocates nothing.
    pub fn mark_stable_point(&mut self, description: &str) -> Option<u64> {
        if self.journal.is_empty() {
            return None;
        }
        if let Some(existing) = self
            .stable_points
            .iter()
            .find(|stable| stable.position == self.position)
        {
            return Some(existing.id);
        }
        let id = self.next_stable_id;
        self.next_stable_id += 1;
        self.stable_points.push(StablePoint {
            id,
            position: self.position,
            description: description.to_string(),
        });
        Some(id)
    }

    /// True when an undo target exists
    pub fn is_undo_available(&self) -> bool {
        self.undo_target().is_some()
    }

    /// True when a redo target exists
    pub fn is_redo_available(&self) -> bool {
        self.redo_target().is_some()
    }

    fn undo_target(&self) -> Option<usize> {
        self.stable_points
            .iter()
            .map(|stable| stable.position)
            .filter(|&position| position < self.position)
            .max()
    }

    fn redo_target(&self) -> Option<usize> {
        self.stable_points
            .iter()
            .map(|stable| stable.position)
            .filter(|&position| position > self.position)
            .min()
    }

    /// Roll the tables back to the previous stable point.
    ///
    /// Returns false when no earlier stable point exists.
    pub fn undo(&mut self) -> Result<bool> {
        let target = match self.undo_target() {
            Some(target) => target,
            None => return Ok(false),
        };
        while self.position > target {
            self.position -= 1;
            let blob = self.journal[self.position].undo.clone();
            self.replay(&blob)?;
        }
        Ok(true)
    }

    /// Roll the tables forward to the next stable point.
    ///
    /// Returns false when no later stable point exists.
    pub fn redo(&mut self) -> Result<bool> {
        let target = match self.redo_target() {
            Some(target) => target,
            None => return Ok(false),
        };
        while self.position < target {
            let blob = self.journal[self.position].redo.clone();
            self.replay(&blob)?;
            self.position += 1;
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn put_dof(store: &mut SessionStore, id: u64, value: f64) {
        store.begin();
        store.apply(Mutation::PutDof {
            id,
            row: json!({ "value": value }),
        });
        store.commit().unwrap();
    }

    #[test]
    fn test_batched_mutations_are_one_journal_entry() {
        let mut store = SessionStore::new();
        store.begin();
        store.apply(Mutation::PutDof {
            id: 1,
            row: json!(1.0),
        });
        store.apply(Mutation::PutDof {
            id: 2,
            row: json!(2.0),
        });
        store.commit().unwrap();

        assert_eq!(store.journal_len(), 1);
        assert_eq!(store.dof_rows().len(), 2);
    }

    #[test]
    fn test_undo_redo_roundtrip() {
        let mut store = SessionStore::new();
        put_dof(&mut store, 1, 1.0);
        store.mark_stable_point("one dof");

        put_dof(&mut store, 2, 2.0);
        put_dof(&mut store, 1, 10.0);
        store.mark_stable_point("two dofs");

        assert!(store.undo().unwrap());
        assert_eq!(store.dof_rows().len(), 1);
        assert_eq!(store.dof_rows()[&1], json!({ "value": 1.0 }));

        assert!(store.redo().unwrap());
        assert_eq!(store.dof_rows().len(), 2);
        assert_eq!(store.dof_rows()[&1], json!({ "value": 10.0 }));
    }

    #[test]
    fn test_undo_without_stable_point() {
        let mut store = SessionStore::new();
        put_dof(&mut store, 1, 1.0);
        assert!(!store.undo().unwrap());
    }

    #[test]
    fn test_commit_after_undo_truncates_forward_history() {
        let mut store = SessionStore::new();
        put_dof(&mut store, 1, 1.0);
        store.mark_stable_point("first");
        put_dof(&mut store, 2, 2.0);
        store.mark_stable_point("second");

        assert!(store.undo().unwrap());
        assert!(store.is_redo_available());

        put_dof(&mut store, 3, 3.0);
        assert!(!store.is_redo_available());
        assert_eq!(store.journal_len(), 2);
        assert!(!store.dof_rows().contains_key(&2));
        assert!(store.dof_rows().contains_key(&3));
    }

    #[test]
    fn test_stable_point_ids_are_monotone() {
        let mut store = SessionStore::new();
        put_dof(&mut store, 1, 1.0);
        let first = store.mark_stable_point("a").unwrap();
        put_dof(&mut store, 2, 2.0);
        let second = store.mark_stable_point("b").unwrap();
        assert!(second > first);

        // marking again at the same position reuses the checkpoint
        assert_eq!(store.mark_stable_point("b again"), Some(second));
    }

    #[test]
    fn test_delete_mutation_inverse() {
        let mut store = SessionStore::new();
        put_dof(&mut store, 1, 4.5);
        store.mark_stable_point("present");

        store.begin();
        store.apply(Mutation::DeleteDof { id: 1 });
        store.commit().unwrap();
        store.mark_stable_point("deleted");
        assert!(store.dof_rows().is_empty());

        assert!(store.undo().unwrap());
        assert_eq!(store.dof_rows()[&1], json!({ "value": 4.5 }));
    }
}
