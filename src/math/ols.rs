//! Least squares and small dense-matrix helpers.
//!
//! Both fitters work on tiny parameter dimensions (intercept, k-1 group
//! columns, a few covariates), so we favour robust decompositions over speed:
//!
//! - SVD for least squares (tall design matrices) and for rank detection
//! - Cholesky for inverting information matrices, with an LU fallback

use nalgebra::{DMatrix, DVector};

/// Relative singular-value cutoff used for rank detection.
pub const RANK_TOL: f64 = 1e-10;

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-10, 1e-8, 1e-6] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Numerical rank of `x` from its singular values.
pub fn matrix_rank(x: &DMatrix<f64>) -> usize {
    if x.nrows() == 0 || x.ncols() == 0 {
        return 0;
    }
    let sv = x.clone().svd(false, false).singular_values;
    let max = sv.iter().copied().fold(0.0_f64, f64::max);
    if max <= 0.0 {
        return 0;
    }
    sv.iter().filter(|&&s| s > RANK_TOL * max).count()
}

/// Inverse of a symmetric positive definite matrix.
pub fn spd_inverse(a: &DMatrix<f64>) -> Option<DMatrix<f64>> {
    let inv = match a.clone().cholesky() {
        Some(chol) => chol.inverse(),
        None => a.clone().try_inverse()?,
    };
    if inv.iter().all(|v| v.is_finite()) {
        Some(inv)
    } else {
        None
    }
}

/// Sum of squared residuals `‖y - Xβ‖²`.
pub fn sse(x: &DMatrix<f64>, y: &DVector<f64>, beta: &DVector<f64>) -> f64 {
    (y - x * beta).norm_squared()
}

/// `x` with the columns in `drop` removed.
pub fn drop_columns(x: &DMatrix<f64>, drop: std::ops::Range<usize>) -> DMatrix<f64> {
    let keep: Vec<usize> = (0..x.ncols()).filter(|c| !drop.contains(c)).collect();
    DMatrix::from_fn(x.nrows(), keep.len(), |r, c| x[(r, keep[c])])
}
