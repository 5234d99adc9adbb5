//! Merit function for the constraint solve
//!
//! The objective minimized by the BFGS driver is the weighted sum of
//! squared constraint residuals `M(x_free) = Σ wᵢ rᵢ(x_full)²`, where
//! `x_full` stacks the free values above the fixed values. The gradient is
//! evaluated over the full vector and truncated to the free block before it
//! reaches the minimizer.

use crate::dof::DofArena;
use crate::matrix::DenseMatrix;
use crate::solver::bfgs::MeritFunction;
use crate::solver::{FunctionError, SolverFunction};

/// Weighted sum-of-squares merit over a set of constraint solver functions
pub struct SumOfSquares<'a> {
    functions: Vec<&'a SolverFunction>,
    weights: Vec<f64>,
    arena: &'a DofArena,
    free_count: usize,
    fixed_values: DenseMatrix,
}

impl<'a> SumOfSquares<'a> {
    /// Assemble the merit function.
    ///
    /// Every function must already have its input map defined against the
    /// `[free ; fixed]` global ordering this merit evaluates with.
    ///
    /// # Panics
    ///
    /// Panics when the constraint set is empty, no DOF is free, or the
    /// weight list does not match the function list. These are caller
    /// contract violations; `Model::solve` guards them.
    pub fn new(
        functions: Vec<&'a SolverFunction>,
        weights: Vec<f64>,
        arena: &'a DofArena,
        free_count: usize,
        fixed_values: &[f64],
    ) -> Self {
        assert!(
            !functions.is_empty(),
            "merit function requires at least one constraint"
        );
        assert_eq!(
            functions.len(),
            weights.len(),
            "one weight per constraint function"
        );
        assert!(free_count > 0, "merit function requires free DOFs");

        Self {
            functions,
            weights,
            arena,
            free_count,
            fixed_values: DenseMatrix::column_from_slice(fixed_values),
        }
    }

    /// Stack the fixed values below the free vector
    fn full_vector(&self, x_free: &DenseMatrix) -> DenseMatrix {
        if self.fixed_values.is_empty() {
            return x_free.clone();
        }
        match x_free.combine_as_column(&self.fixed_values) {
            Ok(full) => full,
            // both stacks are column vectors, so combining cannot fail
            Err(_) => x_free.clone(),
        }
    }
}

impl MeritFunction for SumOfSquares<'_> {
    fn dims(&self) -> usize {
        self.free_count
    }

    fn value(&self, x_free: &DenseMatrix) -> Result<f64, FunctionError> {
        let full = self.full_vector(x_free);
        let mut merit = 0.0;
        for (function, weight) in self.functions.iter().zip(self.weights.iter()) {
            let residual = function.value(&full, self.arena)?;
            merit += weight * residual * residual;
        }
        Ok(merit)
    }

    fn gradient(&self, x_free: &DenseMatrix) -> Result<DenseMatrix, FunctionError> {
        let full = self.full_vector(x_free);
        let mut gradient = vec![0.0; full.rows()];
        for (function, weight) in self.functions.iter().zip(self.weights.iter()) {
            let residual = function.value(&full, self.arena)?;
            let function_gradient = function.gradient(&full, self.arena)?;
            let scale = 2.0 * weight * residual;
            for (g, fg) in gradient.iter_mut().zip(function_gradient.iter()) {
                *g += scale * fg;
            }
        }
        // the fixed tail carries no optimization variables
        gradient.truncate(self.free_count);
        Ok(DenseMatrix::column_from_slice(&gradient))
    }
}
