//! BFGS quasi-Newton minimizer
//!
//! The outer loop maintains an inverse-Hessian approximation updated with
//! the classic BFGS rank-two formula and drives a one-dimensional line
//! search along each quasi-Newton direction. Back-tracking (Armijo
//! acceptance with quadratic/cubic step fitting) is the primary line
//! search; golden-section bracketing is the alternate.
//!
//! The driver never fails outright: a line search that cannot find an
//! acceptable step, an exhausted evaluation budget, or the iteration cap
//! all end the solve with the best point seen so far and a status
//! describing why.

use log::debug;
use rand::Rng;

use crate::matrix::DenseMatrix;
use crate::solver::FunctionError;

/// Default central-difference step for [`Minimizer::numerical_gradient`]
pub const DEFAULT_GRADIENT_STEP: f64 = 1.0e-10;

/// Objective evaluated by the minimizer
pub trait MeritFunction {
    /// Number of optimization variables
    fn dims(&self) -> usize;

    /// Merit value at `x`
    fn value(&self, x: &DenseMatrix) -> Result<f64, FunctionError>;

    /// Merit gradient at `x`
    fn gradient(&self, x: &DenseMatrix) -> Result<DenseMatrix, FunctionError>;

    /// Merit value and gradient at `x` in one call
    fn value_and_gradient(&self, x: &DenseMatrix) -> Result<(f64, DenseMatrix), FunctionError> {
        Ok((self.value(x)?, self.gradient(x)?))
    }
}

/// One-dimensional search strategy along the quasi-Newton direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineSearch {
    /// Back-tracking with Armijo acceptance (primary)
    #[default]
    BackTrack,
    /// Golden-section interval reduction (alternate)
    GoldenSection,
}

/// Why the minimizer stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    /// Step length fell below tolerance
    Converged,
    /// Iteration cap reached
    IterationLimit,
    /// Merit-evaluation cap reached
    EvaluationLimit,
    /// Line search found no acceptable step
    LineSearchFailed,
}

/// Minimizer configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinimizerOptions {
    /// Line search strategy
    pub line_search: LineSearch,
    /// Maximum step length; also the golden-section search interval
    pub search_distance: f64,
    /// Convergence tolerance on `λ·‖d‖`
    pub tolerance: f64,
    /// Minimum relative step for back-tracking; golden-section resolution
    pub step_tol: f64,
    /// Maximum outer iterations
    pub max_iterations: usize,
    /// Maximum merit evaluations (0 = unlimited)
    pub max_merit_evals: usize,
    /// Armijo sufficient-decrease parameter
    pub armijo_alpha: f64,
    /// Curvature parameter (reserved for a Wolfe-condition line search)
    pub curvature_beta: f64,
}

impl Default for MinimizerOptions {
    fn default() -> Self {
        Self {
            line_search: LineSearch::BackTrack,
            search_distance: 1000.0,
            tolerance: 1e-10,
            step_tol: 1e-15,
            max_iterations: 500,
            max_merit_evals: 0,
            armijo_alpha: 1e-4,
            curvature_beta: 0.9,
        }
    }
}

/// Outcome of a minimization run
#[derive(Debug, Clone)]
pub struct MinimizeResult {
    /// Best point found (the initial point when nothing improved)
    pub x: DenseMatrix,
    /// Why the run stopped
    pub status: SolveStatus,
    /// Outer iterations performed
    pub iterations: usize,
    /// Merit evaluations spent
    pub merit_evaluations: usize,
    /// Merit value at the returned point
    pub final_merit: f64,
}

/// Result of one back-tracking line search
enum BackTrackOutcome {
    /// Acceptable step found
    Accepted {
        lambda: f64,
        merit: f64,
        gradient: DenseMatrix,
    },
    /// Evaluation budget ran out mid-search; `lambda` is the last trial
    BudgetExhausted { lambda: f64 },
    /// No acceptable step exists above the minimum step length
    NoAcceptableStep,
}

/// BFGS quasi-Newton minimizer
#[derive(Debug, Clone, Default)]
pub struct Minimizer {
    options: MinimizerOptions,
}

impl Minimizer {
    /// Create a minimizer with the given options
    pub fn new(options: MinimizerOptions) -> Self {
        Self { options }
    }

    /// The configured options
    pub fn options(&self) -> &MinimizerOptions {
        &self.options
    }

    /// Minimize `problem` starting from `x_init` (a column vector).
    ///
    /// Returns the best point seen together with the stop status. An `Err`
    /// is only produced when the merit function itself fails to evaluate,
    /// which indicates a wiring bug rather than a numerical condition.
    pub fn minimize(
        &self,
        problem: &dyn MeritFunction,
        x_init: &DenseMatrix,
    ) -> Result<MinimizeResult, FunctionError> {
        let opts = &self.options;
        let mut evals = 0usize;

        if x_init.rows() == 0 {
            return Ok(MinimizeResult {
                x: x_init.clone(),
                status: SolveStatus::Converged,
                iterations: 0,
                merit_evaluations: 0,
                final_merit: 0.0,
            });
        }

        let mut inv_hessian = DenseMatrix::identity(problem.dims());
        let mut x_previous = x_init.clone();
        let (mut previous_merit, mut previous_gradient) = problem.value_and_gradient(x_init)?;
        evals += 1;

        let mut best_x = x_init.clone();
        let mut best_merit = previous_merit;

        if !previous_merit.is_finite() {
            return Ok(MinimizeResult {
                x: best_x,
                status: SolveStatus::LineSearchFailed,
                iterations: 0,
                merit_evaluations: evals,
                final_merit: previous_merit,
            });
        }

        let mut search_dir = previous_gradient.scaled(-1.0);

        for iteration in 0..opts.max_iterations {
            let (lambda, current_merit, current_gradient) = match opts.line_search {
                LineSearch::BackTrack => {
                    match self.back_track(
                        problem,
                        &x_previous,
                        &previous_gradient,
                        previous_merit,
                        &mut search_dir,
                        &mut evals,
                    )? {
                        BackTrackOutcome::Accepted {
                            lambda,
                            merit,
                            gradient,
                        } => (lambda, merit, gradient),
                        BackTrackOutcome::BudgetExhausted { lambda } => {
                            let x_last = step(&x_previous, &search_dir, lambda);
                            let final_merit = problem.value(&x_last)?;
                            return Ok(MinimizeResult {
                                x: x_last,
                                status: SolveStatus::EvaluationLimit,
                                iterations: iteration,
                                merit_evaluations: evals,
                                final_merit,
                            });
                        }
                        BackTrackOutcome::NoAcceptableStep => {
                            debug!("line search found no acceptable step; returning best point");
                            return Ok(MinimizeResult {
                                x: best_x,
                                status: SolveStatus::LineSearchFailed,
                                iterations: iteration,
                                merit_evaluations: evals,
                                final_merit: best_merit,
                            });
                        }
                    }
                }
                LineSearch::GoldenSection => {
                    let (lambda_lower, lambda_upper) =
                        self.golden_section(problem, &search_dir, &x_previous, &mut evals)?;
                    let lambda = 0.5 * (lambda_lower + lambda_upper);
                    let x_trial = step(&x_previous, &search_dir, lambda);
                    let (merit, gradient) = problem.value_and_gradient(&x_trial)?;
                    evals += 1;
                    if !merit.is_finite() {
                        return Ok(MinimizeResult {
                            x: best_x,
                            status: SolveStatus::LineSearchFailed,
                            iterations: iteration,
                            merit_evaluations: evals,
                            final_merit: best_merit,
                        });
                    }
                    (lambda, merit, gradient)
                }
            };

            let x_current = step(&x_previous, &search_dir, lambda);
            if current_merit <= best_merit {
                best_merit = current_merit;
                best_x = x_current.clone();
            }

            debug!(
                "iteration {}: lambda = {:e}, merit = {:e}",
                iteration, lambda, current_merit
            );

            // Convergence test on the actual step length
            let search_magnitude = search_dir.magnitude().unwrap_or(0.0);
            if lambda * search_magnitude < opts.tolerance {
                return Ok(MinimizeResult {
                    x: x_current,
                    status: SolveStatus::Converged,
                    iterations: iteration + 1,
                    merit_evaluations: evals,
                    final_merit: current_merit,
                });
            }

            search_dir = self.next_bfgs_search_dir(
                &x_current,
                &x_previous,
                &current_gradient,
                &previous_gradient,
                &mut inv_hessian,
            );

            // The quasi-Newton direction must still descend; reset otherwise
            let slope = search_dir.dot(&current_gradient).unwrap_or(0.0);
            if slope > 0.0 {
                debug!("search direction went uphill; resetting to steepest descent");
                search_dir = current_gradient.scaled(-1.0);
                let _ = inv_hessian.set_identity();
            }

            previous_gradient = current_gradient;
            previous_merit = current_merit;
            x_previous = x_current;

            if opts.max_merit_evals != 0 && evals > opts.max_merit_evals {
                return Ok(MinimizeResult {
                    x: best_x,
                    status: SolveStatus::EvaluationLimit,
                    iterations: iteration + 1,
                    merit_evaluations: evals,
                    final_merit: best_merit,
                });
            }
        }

        Ok(MinimizeResult {
            x: best_x,
            status: SolveStatus::IterationLimit,
            iterations: opts.max_iterations,
            merit_evaluations: evals,
            final_merit: best_merit,
        })
    }

    /// Compute the next BFGS search direction, updating `inv_hessian`.
    ///
    /// `H' = H + ((σ+τ)/σ²)·p·pᵀ − (1/σ)·(H·y·pᵀ + p·(H·y)ᵀ)` with
    /// `p = x − x_prev`, `y = g − g_prev`, `σ = p·y`, `τ = yᵀ·H·y`.
    /// A zero σ is replaced by a tiny positive value to keep the update
    /// finite.
    fn next_bfgs_search_dir(
        &self,
        current_position: &DenseMatrix,
        previous_position: &DenseMatrix,
        current_gradient: &DenseMatrix,
        previous_gradient: &DenseMatrix,
        inv_hessian: &mut DenseMatrix,
    ) -> DenseMatrix {
        let n = current_position.rows();
        let mut p = vec![0.0; n];
        let mut y = vec![0.0; n];
        for i in 0..n {
            p[i] = current_position[(i, 0)] - previous_position[(i, 0)];
            y[i] = current_gradient[(i, 0)] - previous_gradient[(i, 0)];
        }

        let mut sigma: f64 = p.iter().zip(y.iter()).map(|(a, b)| a * b).sum();
        if sigma == 0.0 {
            sigma = 1.0e-100;
        }

        // h_y = H · y
        let mut h_y = vec![0.0; n];
        for row in 0..n {
            let mut sum = 0.0;
            for col in 0..n {
                sum += inv_hessian[(row, col)] * y[col];
            }
            h_y[row] = sum;
        }
        let tau: f64 = y.iter().zip(h_y.iter()).map(|(a, b)| a * b).sum();

        let pp_scale = (sigma + tau) / (sigma * sigma);
        let inv_sigma = 1.0 / sigma;
        for row in 0..n {
            for col in 0..n {
                inv_hessian[(row, col)] += pp_scale * p[row] * p[col]
                    - inv_sigma * (h_y[row] * p[col] + p[row] * h_y[col]);
            }
        }

        // d = −H' · g
        let mut direction = DenseMatrix::new(n, 1);
        for row in 0..n {
            let mut sum = 0.0;
            for col in 0..n {
                sum += inv_hessian[(row, col)] * current_gradient[(col, 0)];
            }
            direction[(row, 0)] = -sum;
        }
        direction
    }

    /// Back-tracking line search with Armijo acceptance.
    ///
    /// Shortens `search_dir` in place when it exceeds the maximum step.
    /// The first rejected trial is refit with a quadratic in λ, later ones
    /// with a cubic through the last two trials; every shrink is clamped to
    /// `[0.1 λ, 0.5 λ]`.
    fn back_track(
        &self,
        problem: &dyn MeritFunction,
        position: &DenseMatrix,
        gradient: &DenseMatrix,
        initial_merit: f64,
        search_dir: &mut DenseMatrix,
        evals: &mut usize,
    ) -> Result<BackTrackOutcome, FunctionError> {
        let opts = &self.options;
        let n = position.rows();

        let newton_length = search_dir.magnitude().unwrap_or(0.0);
        if newton_length > opts.search_distance {
            debug!("back-track shortened the search vector");
            search_dir.scale_in_place(opts.search_distance / newton_length);
        }

        let init_slope = gradient.dot(search_dir).unwrap_or(0.0);

        // Relative length of the step against the current position
        let mut rel_length = search_dir[(0, 0)] / position[(0, 0)];
        for i in 1..n {
            let term = search_dir[(i, 0)] / position[(i, 0)];
            if term > rel_length {
                rel_length = term;
            }
        }
        let min_lambda = opts.step_tol / rel_length;

        let mut lambda = 1.0;
        let mut lambda_prev = 0.0;
        let mut merit_prev = 0.0;
        let mut first_backtrack_done = false;

        loop {
            if opts.max_merit_evals != 0 && *evals > opts.max_merit_evals {
                return Ok(BackTrackOutcome::BudgetExhausted { lambda });
            }

            let trial = step(position, search_dir, lambda);
            let (merit, trial_gradient) = problem.value_and_gradient(&trial)?;
            *evals += 1;

            if !merit.is_finite() || trial_gradient.as_slice().iter().any(|g| !g.is_finite()) {
                return Ok(BackTrackOutcome::NoAcceptableStep);
            }

            if merit <= initial_merit + opts.armijo_alpha * lambda * init_slope {
                return Ok(BackTrackOutcome::Accepted {
                    lambda,
                    merit,
                    gradient: trial_gradient,
                });
            }

            if lambda < min_lambda {
                return Ok(BackTrackOutcome::NoAcceptableStep);
            }

            let lambda_temp = if !first_backtrack_done {
                first_backtrack_done = true;
                // quadratic fit through (0, m0), slope, and (λ, m)
                -init_slope / (2.0 * (merit - initial_merit - init_slope))
            } else {
                // cubic fit through the last two (λ, m) pairs
                let r1 = merit - initial_merit - lambda * init_slope;
                let r2 = merit_prev - initial_merit - lambda_prev * init_slope;
                let denom = lambda - lambda_prev;
                let a = (r1 / (lambda * lambda) - r2 / (lambda_prev * lambda_prev)) / denom;
                let b = (-lambda_prev * r1 / (lambda * lambda)
                    + lambda * r2 / (lambda_prev * lambda_prev))
                    / denom;
                let mut candidate = if a == 0.0 {
                    -init_slope / (2.0 * b)
                } else {
                    let disc = b * b - 3.0 * a * init_slope;
                    (-b + disc.sqrt()) / (3.0 * a)
                };
                if candidate > 0.5 * lambda {
                    candidate = 0.5 * lambda;
                }
                candidate
            };

            lambda_prev = lambda;
            merit_prev = merit;
            lambda = if lambda_temp <= 0.1 * lambda {
                0.1 * lambda
            } else {
                lambda_temp
            };
        }
    }

    /// Golden-section line search over `[0, search_distance]`.
    ///
    /// Reduces the uncertainty interval by the golden ratio until the
    /// desired fractional reduction is reached, then returns the final
    /// interval bounds.
    fn golden_section(
        &self,
        problem: &dyn MeritFunction,
        search_dir: &DenseMatrix,
        x_ref: &DenseMatrix,
        evals: &mut usize,
    ) -> Result<(f64, f64), FunctionError> {
        let opts = &self.options;
        let gold = 0.5 * (5.0_f64.sqrt() - 1.0);

        // Desired fractional reduction of the uncertainty interval
        let magnitude = search_dir.magnitude().unwrap_or(0.0);
        let fraction = if magnitude > 0.0 {
            opts.step_tol / (magnitude * opts.search_distance)
        } else {
            1.0
        };

        let mut lower_bound = 0.0_f64;
        let mut upper_bound = opts.search_distance;

        let mut lambda_low = upper_bound - gold * (upper_bound - lower_bound);
        let mut lambda_high = lower_bound + gold * (upper_bound - lower_bound);

        let mut merit_low = problem.value(&step(x_ref, search_dir, lambda_low))?;
        *evals += 1;
        let mut merit_high = problem.value(&step(x_ref, search_dir, lambda_high))?;
        *evals += 1;

        // Two seed evaluations are done; each further iteration costs one.
        let additional = (1.0 - 2.078 * fraction.ln()).ceil() as i64 - 2;
        for _ in 0..additional.max(0) {
            if merit_low < merit_high {
                upper_bound = lambda_high;
                lambda_high = lambda_low;
                merit_high = merit_low;
                lambda_low = upper_bound - gold * (upper_bound - lower_bound);
                merit_low = problem.value(&step(x_ref, search_dir, lambda_low))?;
            } else {
                lower_bound = lambda_low;
                lambda_low = lambda_high;
                merit_low = merit_high;
                lambda_high = lower_bound + gold * (upper_bound - lower_bound);
                merit_high = problem.value(&step(x_ref, search_dir, lambda_high))?;
            }
            *evals += 1;
        }

        if merit_low < merit_high {
            Ok((lower_bound, lambda_high))
        } else {
            Ok((lambda_low, upper_bound))
        }
    }

    /// Fletcher-Reeves conjugate-gradient minimization, the alternate
    /// driver to BFGS.
    ///
    /// Each iteration line-searches a normalized conjugate direction with
    /// the golden-section search over `[0, search_distance]`; the
    /// direction resets to steepest descent whenever conjugacy would walk
    /// uphill. Uses the same convergence test and caps as
    /// [`Self::minimize`].
    pub fn conjugate_gradient(
        &self,
        problem: &dyn MeritFunction,
        x_init: &DenseMatrix,
    ) -> Result<MinimizeResult, FunctionError> {
        let opts = &self.options;
        let mut evals = 0usize;

        if x_init.rows() == 0 {
            return Ok(MinimizeResult {
                x: x_init.clone(),
                status: SolveStatus::Converged,
                iterations: 0,
                merit_evaluations: 0,
                final_merit: 0.0,
            });
        }

        let mut x_previous = x_init.clone();
        let mut gradient = problem.gradient(x_init)?;
        let mut search_dir = match gradient.scaled(-1.0).normalized() {
            Ok(dir) => dir,
            // zero gradient: already at a stationary point
            Err(_) => {
                let final_merit = problem.value(x_init)?;
                return Ok(MinimizeResult {
                    x: x_init.clone(),
                    status: SolveStatus::Converged,
                    iterations: 0,
                    merit_evaluations: 1,
                    final_merit,
                });
            }
        };
        let mut gg_previous = gradient.dot(&gradient).unwrap_or(0.0);

        let mut x_best = x_init.clone();
        for iteration in 0..opts.max_iterations {
            let (lambda_lower, lambda_upper) =
                self.golden_section(problem, &search_dir, &x_previous, &mut evals)?;
            let lambda = 0.5 * (lambda_lower + lambda_upper);
            x_best = step(&x_previous, &search_dir, lambda);

            debug!("cg iteration {}: lambda = {:e}", iteration, lambda);

            let magnitude = search_dir.magnitude().unwrap_or(0.0);
            if lambda * magnitude < opts.tolerance {
                let final_merit = problem.value(&x_best)?;
                return Ok(MinimizeResult {
                    x: x_best,
                    status: SolveStatus::Converged,
                    iterations: iteration + 1,
                    merit_evaluations: evals,
                    final_merit,
                });
            }

            gradient = problem.gradient(&x_best)?;
            let gg_current = gradient.dot(&gradient).unwrap_or(0.0);

            // Fletcher-Reeves update, renormalized each iteration; a
            // zero direction means the gradient vanished and we are done
            let mut next_dir = gradient.scaled(-1.0);
            let _ = next_dir.add_in_place(&search_dir.scaled(gg_current / gg_previous));
            search_dir = match next_dir.normalized() {
                Ok(dir) => dir,
                Err(_) => {
                    let final_merit = problem.value(&x_best)?;
                    return Ok(MinimizeResult {
                        x: x_best,
                        status: SolveStatus::Converged,
                        iterations: iteration + 1,
                        merit_evaluations: evals,
                        final_merit,
                    });
                }
            };
            gg_previous = gg_current;

            let slope = search_dir.dot(&gradient).unwrap_or(0.0);
            if slope > 0.0 {
                debug!("conjugate direction went uphill; resetting to steepest descent");
                search_dir = match gradient.scaled(-1.0).normalized() {
                    Ok(dir) => dir,
                    Err(_) => {
                        let final_merit = problem.value(&x_best)?;
                        return Ok(MinimizeResult {
                            x: x_best,
                            status: SolveStatus::Converged,
                            iterations: iteration + 1,
                            merit_evaluations: evals,
                            final_merit,
                        });
                    }
                };
            }

            x_previous = x_best.clone();

            if opts.max_merit_evals != 0 && evals > opts.max_merit_evals {
                let final_merit = problem.value(&x_best)?;
                return Ok(MinimizeResult {
                    x: x_best,
                    status: SolveStatus::EvaluationLimit,
                    iterations: iteration + 1,
                    merit_evaluations: evals,
                    final_merit,
                });
            }
        }

        let final_merit = problem.value(&x_best)?;
        Ok(MinimizeResult {
            x: x_best,
            status: SolveStatus::IterationLimit,
            iterations: opts.max_iterations,
            merit_evaluations: evals,
            final_merit,
        })
    }

    /// Central-difference numerical gradient (testing aid).
    /// Use [`DEFAULT_GRADIENT_STEP`] unless the problem scale demands
    /// otherwise.
    pub fn numerical_gradient(
        problem: &dyn MeritFunction,
        x: &DenseMatrix,
        step_size: f64,
    ) -> Result<DenseMatrix, FunctionError> {
        let n = x.rows();
        let mut gradient = DenseMatrix::new(n, 1);
        for i in 0..n {
            let mut upper = x.clone();
            let mut lower = x.clone();
            upper[(i, 0)] += 0.5 * step_size;
            lower[(i, 0)] -= 0.5 * step_size;
            gradient[(i, 0)] = (problem.value(&upper)? - problem.value(&lower)?) / step_size;
        }
        Ok(gradient)
    }

    /// Monte-Carlo seeding: sample `iterations` points uniformly in the box
    /// `x_init ± x_delta` and return the lowest-merit point seen.
    pub fn monte_carlo_seed(
        problem: &dyn MeritFunction,
        x_init: &DenseMatrix,
        x_delta: &DenseMatrix,
        iterations: usize,
    ) -> Result<DenseMatrix, FunctionError> {
        let n = x_init.rows();
        let mut rng = rand::thread_rng();

        let mut best_x = x_init.clone();
        let mut best_merit = problem.value(x_init)?;

        let mut trial = DenseMatrix::new(n, 1);
        for _ in 0..iterations {
            for i in 0..n {
                let center = x_init[(i, 0)];
                let delta = x_delta[(i, 0)];
                trial[(i, 0)] = rng.gen_range(center - delta..=center + delta);
            }
            let merit = problem.value(&trial)?;
            if merit < best_merit {
                best_merit = merit;
                best_x = trial.clone();
            }
        }
        Ok(best_x)
    }
}

/// `position + search_dir · lambda`
fn step(position: &DenseMatrix, search_dir: &DenseMatrix, lambda: f64) -> DenseMatrix {
    let mut result = position.clone();
    for i in 0..result.rows() {
        result[(i, 0)] += lambda * search_dir[(i, 0)];
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// `M(x) = Σ (x_i − t_i)²` with analytic gradient
    struct Quadratic {
        targets: Vec<f64>,
    }

    impl MeritFunction for Quadratic {
        fn dims(&self) -> usize {
            self.targets.len()
        }

        fn value(&self, x: &DenseMatrix) -> Result<f64, FunctionError> {
            Ok(self
                .targets
                .iter()
                .enumerate()
                .map(|(i, t)| (x[(i, 0)] - t).powi(2))
                .sum())
        }

        fn gradient(&self, x: &DenseMatrix) -> Result<DenseMatrix, FunctionError> {
            let values: Vec<f64> = self
                .targets
                .iter()
                .enumerate()
                .map(|(i, t)| 2.0 * (x[(i, 0)] - t))
                .collect();
            Ok(DenseMatrix::column_from_slice(&values))
        }
    }

    /// Rosenbrock function, the classic narrow-valley stress test
    struct Rosenbrock;

    impl MeritFunction for Rosenbrock {
        fn dims(&self) -> usize {
            2
        }

        fn value(&self, x: &DenseMatrix) -> Result<f64, FunctionError> {
            let (a, b) = (x[(0, 0)], x[(1, 0)]);
            Ok((1.0 - a).powi(2) + 100.0 * (b - a * a).powi(2))
        }

        fn gradient(&self, x: &DenseMatrix) -> Result<DenseMatrix, FunctionError> {
            let (a, b) = (x[(0, 0)], x[(1, 0)]);
            Ok(DenseMatrix::column_from_slice(&[
                -2.0 * (1.0 - a) - 400.0 * a * (b - a * a),
                200.0 * (b - a * a),
            ]))
        }
    }

    #[test]
    fn test_minimize_quadratic() {
        let problem = Quadratic {
            targets: vec![3.0, -2.0, 0.5],
        };
        let minimizer = Minimizer::default();
        let x0 = DenseMatrix::column_from_slice(&[0.0, 0.0, 0.0]);
        let result = minimizer.minimize(&problem, &x0).unwrap();
        assert_eq!(result.status, SolveStatus::Converged);
        assert_relative_eq!(result.x[(0, 0)], 3.0, epsilon = 1e-6);
        assert_relative_eq!(result.x[(1, 0)], -2.0, epsilon = 1e-6);
        assert_relative_eq!(result.x[(2, 0)], 0.5, epsilon = 1e-6);
    }

    #[test]
    fn test_minimize_rosenbrock() {
        let minimizer = Minimizer::default();
        let x0 = DenseMatrix::column_from_slice(&[-1.2, 1.0]);
        let result = minimizer.minimize(&Rosenbrock, &x0).unwrap();
        assert!(result.final_merit < 1e-8, "merit = {}", result.final_merit);
        assert_relative_eq!(result.x[(0, 0)], 1.0, epsilon = 1e-3);
        assert_relative_eq!(result.x[(1, 0)], 1.0, epsilon = 1e-3);
    }

    #[test]
    fn test_already_minimal_converges_immediately() {
        let problem = Quadratic {
            targets: vec![1.0, 2.0],
        };
        let minimizer = Minimizer::default();
        let x0 = DenseMatrix::column_from_slice(&[1.0, 2.0]);
        let result = minimizer.minimize(&problem, &x0).unwrap();
        assert_eq!(result.status, SolveStatus::Converged);
        assert_eq!(result.iterations, 1);
        assert_relative_eq!(result.final_merit, 0.0);
    }

    #[test]
    fn test_evaluation_limit_reported() {
        let minimizer = Minimizer::new(MinimizerOptions {
            max_merit_evals: 3,
            ..MinimizerOptions::default()
        });
        let x0 = DenseMatrix::column_from_slice(&[-1.2, 1.0]);
        let result = minimizer.minimize(&Rosenbrock, &x0).unwrap();
        assert_eq!(result.status, SolveStatus::EvaluationLimit);
        assert!(result.merit_evaluations >= 3);
    }

    #[test]
    fn test_iteration_limit_reported() {
        let minimizer = Minimizer::new(MinimizerOptions {
            max_iterations: 2,
            tolerance: 1e-300,
            ..MinimizerOptions::default()
        });
        let x0 = DenseMatrix::column_from_slice(&[-1.2, 1.0]);
        let result = minimizer.minimize(&Rosenbrock, &x0).unwrap();
        assert_eq!(result.status, SolveStatus::IterationLimit);
        assert_eq!(result.iterations, 2);
    }

    #[test]
    fn test_golden_section_minimizes_quadratic() {
        let problem = Quadratic {
            targets: vec![2.0, -1.0],
        };
        let minimizer = Minimizer::new(MinimizerOptions {
            line_search: LineSearch::GoldenSection,
            search_distance: 10.0,
            max_iterations: 200,
            tolerance: 1e-8,
            ..MinimizerOptions::default()
        });
        let x0 = DenseMatrix::column_from_slice(&[0.0, 0.0]);
        let result = minimizer.minimize(&problem, &x0).unwrap();
        assert!(result.final_merit < 1e-6, "merit = {}", result.final_merit);
    }

    #[test]
    fn test_conjugate_gradient_minimizes_quadratic() {
        let problem = Quadratic {
            targets: vec![3.0, -1.5, 0.25],
        };
        let minimizer = Minimizer::new(MinimizerOptions {
            search_distance: 20.0,
            tolerance: 1e-8,
            max_iterations: 300,
            ..MinimizerOptions::default()
        });
        let x0 = DenseMatrix::column_from_slice(&[0.0, 0.0, 0.0]);
        let result = minimizer.conjugate_gradient(&problem, &x0).unwrap();
        assert!(result.final_merit < 1e-6, "merit = {}", result.final_merit);
        assert_relative_eq!(result.x[(0, 0)], 3.0, epsilon = 1e-3);
        assert_relative_eq!(result.x[(1, 0)], -1.5, epsilon = 1e-3);
    }

    #[test]
    fn test_conjugate_gradient_at_stationary_point() {
        let problem = Quadratic {
            targets: vec![1.0],
        };
        let minimizer = Minimizer::default();
        let x0 = DenseMatrix::column_from_slice(&[1.0]);
        let result = minimizer.conjugate_gradient(&problem, &x0).unwrap();
        assert_eq!(result.status, SolveStatus::Converged);
        assert_eq!(result.iterations, 0);
    }

    #[test]
    fn test_nan_merit_returns_best_so_far() {
        struct Poisoned;
        impl MeritFunction for Poisoned {
            fn dims(&self) -> usize {
                1
            }
            fn value(&self, x: &DenseMatrix) -> Result<f64, FunctionError> {
                let v = x[(0, 0)];
                Ok(if v > 0.5 { f64::NAN } else { (v - 1.0).powi(2) })
            }
            fn gradient(&self, x: &DenseMatrix) -> Result<DenseMatrix, FunctionError> {
                Ok(DenseMatrix::column_from_slice(&[2.0 * (x[(0, 0)] - 1.0)]))
            }
        }
        let minimizer = Minimizer::default();
        let x0 = DenseMatrix::column_from_slice(&[0.0]);
        let result = minimizer.minimize(&Poisoned, &x0).unwrap();
        assert_eq!(result.status, SolveStatus::LineSearchFailed);
        assert!(result.x[(0, 0)].is_finite());
    }

    #[test]
    fn test_numerical_gradient_matches_analytic() {
        let problem = Quadratic {
            targets: vec![1.0, -4.0],
        };
        let x = DenseMatrix::column_from_slice(&[0.3, 2.0]);
        let numerical = Minimizer::numerical_gradient(&problem, &x, 1e-6).unwrap();
        let analytic = problem.gradient(&x).unwrap();
        for i in 0..2 {
            assert_relative_eq!(numerical[(i, 0)], analytic[(i, 0)], epsilon = 1e-6);
        }
    }

    #[test]
    fn test_monte_carlo_seed_improves_merit() {
        let problem = Quadratic {
            targets: vec![5.0],
        };
        let x0 = DenseMatrix::column_from_slice(&[0.0]);
        let delta = DenseMatrix::column_from_slice(&[6.0]);
        let seeded = Minimizer::monte_carlo_seed(&problem, &x0, &delta, 200).unwrap();
        let seeded_merit = problem.value(&seeded).unwrap();
        let initial_merit = problem.value(&x0).unwrap();
        assert!(seeded_merit <= initial_merit);
    }
}
