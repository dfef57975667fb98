//! SVD solve for small dense systems.

use nalgebra::{DMatrix, DVector};

/// Truncation thresholds tried in order, strictest first.
const SINGULAR_TOLERANCES: [f64; 3] = [1e-10, 1e-8, 1e-6];

/// Minimum-norm solution of `a · x = b` via SVD.
///
/// The Levenberg–Marquardt step calls this when Cholesky rejects the damped
/// normal matrix `JᵀJ + λ·diag(JᵀJ)`, typically because a collapsed peak left
/// its center and width columns at zero. Singular values below the threshold
/// are dropped, so rank-deficient and non-square `a` are fine.
///
/// `None` when no threshold yields a finite solution.
pub fn solve_svd(a: &DMatrix<f64>, b: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = a.clone().svd(true, true);
    SINGULAR_TOLERANCES
        .iter()
        .filter_map(|&tol| svd.solve(b, tol).ok())
        .find(|x| x.iter().all(|v| v.is_finite()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overdetermined_line() {
        // offset - exponent·log10(f) sampled at f = 1, 10, 100
        let a = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, -1.0, 1.0, -2.0]);
        let b = DVector::from_row_slice(&[2.0, 0.5, -1.0]);

        let x = solve_svd(&a, &b).unwrap();
        assert!((x[0] - 2.0).abs() < 1e-10);
        assert!((x[1] - 1.5).abs() < 1e-10);
    }

    #[test]
    fn zero_column_gets_zero_step() {
        // Normal matrix of a peak whose width column vanished.
        let a = DMatrix::from_row_slice(3, 3, &[4.0, 1.0, 0.0, 1.0, 3.0, 0.0, 0.0, 0.0, 0.0]);
        let b = DVector::from_row_slice(&[5.0, 4.0, 0.0]);

        let x = solve_svd(&a, &b).unwrap();
        assert!((x[0] - 1.0).abs() < 1e-10);
        assert!((x[1] - 1.0).abs() < 1e-10);
        assert!(x[2].abs() < 1e-10);
    }
}
