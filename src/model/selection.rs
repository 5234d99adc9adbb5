//! Selection masks
//!
//! A selection mask names the family of entities the user may currently
//! pick. Applying a mask clears the selection of every entity outside the
//! family; the model propagates the active mask to entities as they are
//! registered.

use serde::{Deserialize, Serialize};

/// Families of selectable entities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SelectionMask {
    /// Everything is selectable
    #[default]
    All,
    /// Nothing is selectable
    None,
    /// 2D points only
    Points,
    /// Lines and arcs
    Edges,
    /// Lines only
    Lines,
    /// Arcs only
    Arcs,
    /// Circles only
    Circles,
    /// Points and lines
    PointsAndLines,
}
