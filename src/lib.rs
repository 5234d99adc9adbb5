//! # Draftsolve - Parametric 2D Sketch Engine
//!
//! A geometric constraint solver: the computational heart of a CAD
//! sketcher. Sketch geometry (points, lines, arcs, circles) is defined
//! over scalar degrees of freedom; declarative constraints (distance,
//! angle, parallelism, tangency, ...) become differentiable residual
//! functions, and solving drives the free DOFs to a weighted
//! least-squares fixed point with a BFGS quasi-Newton minimizer.
//!
//! ## Architecture
//!
//! - `core`: math aliases and precision handling
//! - `matrix`: dense matrix kernel used by the minimizer
//! - `dof`: arena of independent and dependent scalar parameters
//! - `solver`: residual functions, merit function, BFGS minimizer
//! - `primitives`: geometric primitives over DOF ids
//! - `constraints`: constraint equations owning residual functions
//! - `model`: the container binding everything, with lifecycle ops
//! - `store`: session store with a replayable undo/redo journal
//! - `sketch`: typed facade for building sketches
//!
//! ## Example
//!
//! ```
//! use draftsolve::sketch::Sketch;
//!
//! let mut sketch = Sketch::new().unwrap();
//! let p1 = sketch.add_point2d(0.0, 0.0, false, false).unwrap();
//! let p2 = sketch.add_point2d(3.0, 1.0, true, true).unwrap();
//! sketch.add_distance_point2d(p1, p2, 5.0).unwrap();
//!
//! let summary = sketch.solve().unwrap();
//! let distance = sketch.measured_distance(p1, p2).unwrap();
//! assert!((distance - 5.0).abs() < 1e-6);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// Core modules - foundational math and precision
pub mod core;

// Dense matrix kernel
pub mod matrix;

// Degree-of-freedom store
pub mod dof;

// Solver functions, merit function, and minimizer
pub mod solver;

// Geometric primitives
pub mod primitives;

// Constraint equations
pub mod constraints;

// Model container
pub mod model;

// Session store (persistence collaborator)
pub mod store;

// Sketch facade
pub mod sketch;

// Re-export commonly used types
pub use constraints::{Constraint, ConstraintKind};
pub use dof::{Dof, DofArena, DofId};
pub use matrix::{DenseMatrix, MatrixError, MultiplyConfig};
pub use model::{DisplayHook, Model, ModelError, SelectionMask, SolveSummary};
pub use primitives::{EdgeEnd, EntityId, PlaneGeometry, Primitive, PrimitiveKind};
pub use sketch::Sketch;
pub use solver::{
    FunctionError, FunctionKind, LineSearch, MeritFunction, Minimizer, MinimizerOptions,
    SolveStatus, SolverFunction,
};
pub use store::{SessionStore, StoreError};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
