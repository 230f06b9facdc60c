//! Least-squares building blocks on top of [`nalgebra`].
//!
//! The Gram matrix of a design is inverted after equilibration: every row and
//! column is divided by the square root of its diagonal entry, so the scaled
//! matrix has a unit diagonal and the rank test does not depend on the units
//! of each column.

use nalgebra::{Cholesky, DMatrix, DVector};

/// Pivots of the equilibrated Gram matrix below this value are treated as zero.
///
/// A pivot equals `1 − R²` of that column regressed on the columns before it.
const SINGULAR_TOLERANCE: f64 = 1e-10;

/// Returned when a Gram matrix cannot be inverted.
#[derive(Debug, Clone, PartialEq, derive_more::Display, derive_more::Error)]
#[display("matrix is singular (pivot {pivot:e} in column {column})")]
pub struct SingularMatrixError {
    /// First column that is a linear combination of the columns before it.
    pub column: usize,
    pub pivot: f64,
}

/// Builds a design matrix `[1 | X]` with a leading intercept column.
///
/// # Panics
///
/// Panics if the rows are ragged.
///
/// ```
/// use dealscope_stats::matrix::design_matrix;
///
/// let design = design_matrix(&[vec![2.0, 3.0], vec![4.0, 5.0]]);
/// assert_eq!(design.shape(), (2, 3));
/// assert_eq!(design[(1, 0)], 1.0);
/// assert_eq!(design[(1, 2)], 5.0);
/// ```
#[must_use]
pub fn design_matrix(rows: &[Vec<f64>]) -> DMatrix<f64> {
    let p = rows.first().map_or(0, Vec::len);
    DMatrix::from_fn(rows.len(), p + 1, |r, c| {
        if c == 0 { 1.0 } else { rows[r][c - 1] }
    })
}

/// Computes `(XᵗX)⁻¹` for a design matrix `X`.
///
/// # Examples
///
/// ```
/// use dealscope_stats::matrix::gram_inverse;
/// use nalgebra::DMatrix;
///
/// let x = DMatrix::from_row_slice(3, 2, &[1.0, 2.0, 1.0, 3.0, 1.0, 4.0]);
/// let inv = gram_inverse(&x).unwrap();
/// let identity = x.tr_mul(&x) * inv;
/// assert!((identity[(0, 0)] - 1.0).abs() < 1e-12);
/// assert!(identity[(0, 1)].abs() < 1e-12);
///
/// let collinear = DMatrix::from_row_slice(3, 2, &[1.0, 2.0, 2.0, 4.0, 3.0, 6.0]);
/// assert_eq!(gram_inverse(&collinear).unwrap_err().column, 1);
/// ```
pub fn gram_inverse(design: &DMatrix<f64>) -> Result<DMatrix<f64>, SingularMatrixError> {
    let gram = design.tr_mul(design);
    let n = gram.nrows();

    let scale = gram.diagonal().map(f64::sqrt);
    if let Some(column) = scale.iter().position(|s| !(*s > 0.0 && s.is_finite())) {
        return Err(SingularMatrixError { column, pivot: 0.0 });
    }
    let inv_scale: DVector<f64> = scale.map(f64::recip);
    let scaled = DMatrix::from_fn(n, n, |i, j| gram[(i, j)] * inv_scale[i] * inv_scale[j]);

    for k in 0..n {
        let pivot = leading_pivot(&scaled, k);
        if pivot < SINGULAR_TOLERANCE {
            return Err(SingularMatrixError { column: k, pivot });
        }
    }
    let cholesky = Cholesky::new(scaled).ok_or(SingularMatrixError {
        column: n.saturating_sub(1),
        pivot: 0.0,
    })?;
    let inverse = cholesky.inverse();
    Ok(DMatrix::from_fn(n, n, |i, j| {
        inverse[(i, j)] * inv_scale[i] * inv_scale[j]
    }))
}

/// Squared Cholesky pivot of column `k` within the leading `(k+1)×(k+1)` block.
fn leading_pivot(scaled: &DMatrix<f64>, k: usize) -> f64 {
    let block = scaled.view((0, 0), (k + 1, k + 1)).clone_owned();
    Cholesky::new(block).map_or(0.0, |c| c.l()[(k, k)].powi(2))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_identity(m: &DMatrix<f64>, tolerance: f64) {
        for i in 0..m.nrows() {
            for j in 0..m.ncols() {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!(
                    (m[(i, j)] - expected).abs() < tolerance,
                    "({i}, {j}) = {}",
                    m[(i, j)]
                );
            }
        }
    }

    #[test]
    fn test_inverse_times_gram_is_identity() {
        let x = design_matrix(&[
            vec![2.0, 1.0],
            vec![1.0, 3.0],
            vec![0.0, 1.0],
            vec![4.0, 4.0],
        ]);
        let inv = gram_inverse(&x).unwrap();
        assert_identity(&(x.tr_mul(&x) * inv), 1e-10);
    }

    #[test]
    fn test_mixed_scales_are_invertible() {
        // Dollar amounts next to a 0/1 flag and a small ratio.
        let rows = (0..60)
            .map(|i| {
                let amount = 50_000.0 + 15_000.0 * f64::from(i % 13) + 1_000.0 * f64::from(i % 7);
                vec![amount, f64::from(i % 2), 0.01 * f64::from(i % 5)]
            })
            .collect::<Vec<_>>();
        let x = design_matrix(&rows);
        let inv = gram_inverse(&x).unwrap();
        assert_identity(&(x.tr_mul(&x) * inv), 1e-6);
    }

    #[test]
    fn test_collinear_column_is_reported() {
        let x = design_matrix(&[vec![2.0, 4.0], vec![3.0, 6.0], vec![5.0, 10.0]]);
        let err = gram_inverse(&x).unwrap_err();
        assert_eq!(err.column, 2);
    }

    #[test]
    fn test_zero_column_is_singular() {
        let x = design_matrix(&[vec![0.0], vec![0.0], vec![0.0]]);
        assert_eq!(gram_inverse(&x).unwrap_err().column, 1);
    }
}
