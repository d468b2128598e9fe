use log::{debug, trace, warn};
use nalgebra::{DMatrix, DVector};
use std::time::Instant;

use crate::error::{Error, Result};

/// Solver configuration
#[derive(Debug, Clone)]
pub struct SolverConfig {
    /// Entries at or below this magnitude are never used as pivots.
    pub pivot_tolerance: f64,
    /// Relative residual above which a solve is reported as unsuccessful.
    /// Scaled by `‖A‖·‖x‖ + ‖b‖`, floored at 1.
    pub residual_tolerance: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig {
            pivot_tolerance: 1e-12,
            residual_tolerance: 1e-9,
        }
    }
}

/// Solver statistics
#[derive(Debug, Clone)]
pub struct SolverStats {
    pub row_swaps: usize,
    pub residual_norm: f64,
    pub solve_time: f64,
    pub success: bool,
}

/// Dense linear system solver (Gaussian elimination with partial pivoting)
pub struct LinearSolver {
    config: SolverConfig,
}

impl LinearSolver {
    /// Create a new solver with default configuration
    pub fn new() -> Self {
        LinearSolver {
            config: SolverConfig::default(),
        }
    }

    /// Create a new solver with custom configuration
    pub fn with_config(config: SolverConfig) -> Self {
        LinearSolver { config }
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Solve the linear system Ax = b. The inputs are left untouched.
    pub fn solve_dense(
        &self,
        matrix: &DMatrix<f64>,
        rhs: &DVector<f64>,
    ) -> Result<(DVector<f64>, SolverStats)> {
        let start_time = Instant::now();

        if matrix.nrows() != matrix.ncols() {
            return Err(Error::DimensionMismatch {
                expected: matrix.nrows(),
                actual: matrix.ncols(),
            });
        }
        if matrix.nrows() != rhs.len() {
            return Err(Error::DimensionMismatch {
                expected: matrix.nrows(),
                actual: rhs.len(),
            });
        }

        let mut a = matrix.clone();
        let mut b = rhs.clone();
        let row_swaps = self.eliminate(&mut a, &mut b)?;
        let solution = back_substitute(&a, &b);

        let residual_norm = (matrix * &solution - rhs).norm();
        let success = residual_norm <= self.residual_limit(matrix, rhs, &solution);
        if !success {
            warn!(
                "Solution residual {:.3e} exceeds tolerance {:.1e}",
                residual_norm, self.config.residual_tolerance
            );
        }
        debug!(
            "Solved {}x{} system, residual norm {:.3e}",
            matrix.nrows(),
            matrix.ncols(),
            residual_norm
        );

        Ok((
            solution,
            SolverStats {
                row_swaps,
                residual_norm,
                solve_time: start_time.elapsed().as_secs_f64(),
                success,
            },
        ))
    }

    /// Largest acceptable residual norm for `Ax = b`.
    fn residual_limit(
        &self,
        matrix: &DMatrix<f64>,
        rhs: &DVector<f64>,
        solution: &DVector<f64>,
    ) -> f64 {
        let scale = matrix.norm() * solution.norm() + rhs.norm();
        self.config.residual_tolerance * scale.max(1.0)
    }

    /// Forward elimination to upper-triangular form. Returns the number of row swaps.
    fn eliminate(&self, a: &mut DMatrix<f64>, b: &mut DVector<f64>) -> Result<usize> {
        let n = b.len();
        let eps = self.config.pivot_tolerance;
        let mut swaps = 0;

        for i in 0..n {
            // first usable pivot at or below the diagonal
            let pivot = (i..n)
                .find(|&j| a[(j, i)].abs() > eps)
                .ok_or(Error::SingularMatrix { column: i })?;

            if pivot != i {
                trace!("Swapping rows {} and {}", i, pivot);
                a.swap_rows(i, pivot);
                b.swap_rows(i, pivot);
                swaps += 1;
            }

            for j in (i + 1)..n {
                if a[(j, i)].abs() > eps {
                    let ratio = a[(j, i)] / a[(i, i)];
                    a[(j, i)] = 0.0;
                    for k in (i + 1)..n {
                        a[(j, k)] -= ratio * a[(i, k)];
                    }
                    b[j] -= ratio * b[i];
                }
            }
        }

        Ok(swaps)
    }
}

impl Default for LinearSolver {
    fn default() -> Self {
        Self::new()
    }
}

fn back_substitute(a: &DMatrix<f64>, b: &DVector<f64>) -> DVector<f64> {
    let n = b.len();
    let mut x = DVector::zeros(n);

    for i in (0..n).rev() {
        let mut num = b[i];
        for j in (i + 1)..n {
            num -= a[(i, j)] * x[j];
        }
        x[i] = num / a[(i, i)];
    }

    x
}

/// Solve `G v = C` with the default configuration.
pub fn solve(matrix: &DMatrix<f64>, rhs: &DVector<f64>) -> Result<DVector<f64>> {
    LinearSolver::new()
        .solve_dense(matrix, rhs)
        .map(|(solution, _)| solution)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{dmatrix, dvector};

    #[test]
    fn test_dense_solver() {
        let solver = LinearSolver::new();

        // Create a simple 2x2 system: [2 1; 1 2] * [x; y] = [3; 3]
        // Solution should be [1; 1]
        let matrix = dmatrix![2.0, 1.0; 1.0, 2.0];
        let rhs = dvector![3.0, 3.0];

        let (solution, stats) = solver.solve_dense(&matrix, &rhs).unwrap();

        assert!((solution[0] - 1.0).abs() < 1e-10);
        assert!((solution[1] - 1.0).abs() < 1e-10);
        assert!(stats.success);
        assert_eq!(stats.row_swaps, 0);
    }

    #[test]
    fn test_zero_leading_entry_needs_swap() {
        // 0x + y = 2
        // 3x + y = 5
        let matrix = dmatrix![0.0, 1.0; 3.0, 1.0];
        let rhs = dvector![2.0, 5.0];

        let (solution, stats) = LinearSolver::new().solve_dense(&matrix, &rhs).unwrap();

        assert!((solution[0] - 1.0).abs() < 1e-12);
        assert!((solution[1] - 2.0).abs() < 1e-12);
        assert_eq!(stats.row_swaps, 1);
    }

    #[test]
    fn test_inputs_are_not_modified() {
        let matrix = dmatrix![0.0, 2.0, 1.0; 1.0, -1.0, 0.0; 2.0, 0.0, 4.0];
        let rhs = dvector![3.0, 0.0, 6.0];
        let (m, r) = (matrix.clone(), rhs.clone());

        let first = solve(&matrix, &rhs).unwrap();
        let second = solve(&matrix, &rhs).unwrap();

        assert_eq!(matrix, m);
        assert_eq!(rhs, r);
        assert_eq!(first, second);
    }

    #[test]
    fn test_singular_matrix() {
        let a = dmatrix![1.0, 2.0; 2.0, 4.0]; // Singular (row 2 = 2 * row 1)
        let b = dvector![1.0, 2.0];

        let result = solve(&a, &b);
        assert!(matches!(result, Err(Error::SingularMatrix { column: 1 })));
    }

    #[test]
    fn test_zero_row_is_singular() {
        let a = dmatrix![2.0, 0.0; 0.0, 0.0];
        let b = dvector![1.0, 1.0];

        assert!(matches!(solve(&a, &b), Err(Error::SingularMatrix { .. })));
    }

    #[test]
    fn test_tiny_entries_are_not_pivots() {
        let a = dmatrix![1e-13, 1.0; 1.0, 1.0];
        let b = dvector![1.0, 2.0];

        let (solution, stats) = LinearSolver::new().solve_dense(&a, &b).unwrap();
        assert_eq!(stats.row_swaps, 1);
        assert!((solution[1] - 1.0).abs() < 1e-9);

        let strict = LinearSolver::with_config(SolverConfig {
            pivot_tolerance: 10.0,
            ..SolverConfig::default()
        });
        assert!(matches!(strict.solve_dense(&a, &b), Err(Error::SingularMatrix { column: 0 })));
    }

    #[test]
    fn test_residual_check_scales_with_magnitudes() {
        // 1 GOhm fed by 1 kA and a 1 mOhm load in series
        let matrix = dmatrix![1e-9 + 1e3, -1e3; -1e3, 1e3 + 1e-9];
        let rhs = dvector![1e3, 0.0];

        let (solution, stats) = LinearSolver::new().solve_dense(&matrix, &rhs).unwrap();

        assert!(solution[0] > 1e11);
        assert!(stats.success);

        let single = LinearSolver::new()
            .solve_dense(&dmatrix![1e-9], &dvector![1e3])
            .unwrap();
        assert!((single.0[0] - 1e12).abs() / 1e12 < 1e-12);
        assert!(single.1.success);
    }

    #[test]
    fn test_residual_limit_floor() {
        let solver = LinearSolver::new();
        let tiny = solver.residual_limit(&dmatrix![1e-6], &dvector![1e-6], &dvector![1.0]);
        assert_eq!(tiny, 1e-9);

        let large = solver.residual_limit(&dmatrix![2.0], &dvector![1e3], &dvector![500.0]);
        assert!((large - 2e3 * 1e-9).abs() < 1e-18);
    }

    #[test]
    fn test_dimension_mismatch() {
        let a = dmatrix![1.0, 2.0; 3.0, 4.0];
        let b = dvector![1.0, 2.0, 3.0];

        let result = solve(&a, &b);
        assert!(matches!(result, Err(Error::DimensionMismatch { .. })));
    }
}
