//! A single QR step of the left-to-right MPS sweep.
//!
//! Given the current state matrix, with the accumulated left bond fused to the
//! next physical index as rows, a thin QR decomposition splits off an isometry
//! `Q` (the next site tensor, before reshaping) and a remainder `R` carrying
//! everything to the right of the cut.

use nalgebra as na;
use num_traits::Zero;
use thiserror::Error;
use crate::ComplexScalar;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QRError {
    /// Returned when the input matrix contains a NaN or infinite value.
    #[error("error in QR decomposition: non-finite input at ({row}, {col})")]
    NonFinite { row: usize, col: usize },

    /// Returned when the input matrix has a zero-length dimension.
    #[error("error in QR decomposition: empty {rows}×{cols} input")]
    Empty { rows: usize, cols: usize },

    /// Returned when the decomposition produces non-finite factors.
    #[error("error in QR decomposition: numerical breakdown")]
    Breakdown,
}
use QRError::*;
pub type QRResult<T> = Result<T, QRError>;

/// Data struct holding a thin QR decomposition repurposed for MPS
/// factorization.
///
/// For an `m × n` input, `q` is `m × k` with orthonormal columns and `r` is
/// `k × n` upper-triangular, where `k = min(m, n)`. The gauge is fixed so that
/// the diagonal of `r` is real and non-negative, which makes the decomposition
/// unique for full-rank input.
#[derive(Clone, Debug, PartialEq)]
pub struct QRStep<A>
where A: ComplexScalar
{
    /// Isometry with orthonormal columns.
    pub q: na::DMatrix<A>,
    /// Upper-triangular remainder.
    pub r: na::DMatrix<A>,
    /// Number of columns in `q`, i.e. the new bond dimension.
    pub rank: usize,
}

impl<A> QRStep<A>
where A: ComplexScalar
{
    /// Compute the thin QR decomposition of a matrix.
    ///
    /// Fails if the matrix is empty or contains non-finite values, or if the
    /// resulting factors are not finite.
    pub fn from_decomp(mat: na::DMatrix<A>) -> QRResult<Self> {
        let (rows, cols) = mat.shape();
        if rows == 0 || cols == 0 { return Err(Empty { rows, cols }); }
        if let Some(f) =
            mat.iter().position(|a| !na::ComplexField::is_finite(a))
        {
            return Err(NonFinite { row: f % rows, col: f / rows });
        }

        let qr = mat.qr();
        let mut q = qr.q();
        let mut r = qr.r();
        let rank = q.ncols();
        for j in 0..rank {
            let rjj = r[(j, j)];
            let modulus = na::ComplexField::modulus(rjj);
            if modulus > A::Re::zero() {
                let phase = na::ComplexField::unscale(rjj, modulus);
                let phase_conj = na::ComplexField::conjugate(phase);
                q.column_mut(j).apply(|x| { *x = *x * phase; });
                r.row_mut(j).apply(|x| { *x = *x * phase_conj; });
            }
        }

        let finite =
            q.iter().chain(r.iter())
            .all(|a| na::ComplexField::is_finite(a));
        if !finite { return Err(Breakdown); }
        Ok(Self { q, r, rank })
    }
}

#[cfg(test)]
mod tests {
    use num_complex::Complex64 as C64;
    use super::*;

    fn c(re: f64, im: f64) -> C64 { C64::new(re, im) }

    fn test_matrix(rows: usize, cols: usize) -> na::DMatrix<C64> {
        na::DMatrix::from_fn(rows, cols, |i, j| {
            let x = (i * cols + j) as f64;
            c((1.3 * x + 0.7).sin(), (0.4 * x - 1.1).cos())
        })
    }

    fn check(mat: na::DMatrix<C64>) {
        let (m, n) = mat.shape();
        let QRStep { q, r, rank } = QRStep::from_decomp(mat.clone()).unwrap();
        let k = m.min(n);
        assert_eq!(rank, k);
        assert_eq!(q.shape(), (m, k));
        assert_eq!(r.shape(), (k, n));

        let qhq = q.adjoint() * &q;
        assert!((qhq - na::DMatrix::<C64>::identity(k, k)).norm() < 1e-12);
        assert!((&q * &r - &mat).norm() < 1e-10 * mat.norm());
        for i in 0..k {
            assert!(r[(i, i)].im.abs() < 1e-12);
            assert!(r[(i, i)].re >= 0.0);
            for j in 0..i.min(n) {
                assert!(r[(i, j)].norm() < 1e-12);
            }
        }
    }

    #[test]
    fn tall_square_wide() {
        check(test_matrix(6, 3));
        check(test_matrix(4, 4));
        check(test_matrix(2, 8));
        check(test_matrix(8, 1));
    }

    #[test]
    fn rank_deficient() {
        // |00> + |11> split across the middle: rows are orthogonal but the
        // trailing block is zero
        let mut mat = na::DMatrix::<C64>::zeros(4, 4);
        mat[(0, 0)] = c(0.5, 0.0);
        mat[(3, 3)] = c(0.0, 0.5);
        check(mat);
    }

    #[test]
    fn single_column_remnant_is_the_norm() {
        let mat = na::DMatrix::from_column_slice(2, 1, &[c(0.0, 0.6), c(-0.8, 0.0)]);
        let QRStep { r, .. } = QRStep::from_decomp(mat).unwrap();
        assert!((r[(0, 0)] - c(1.0, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn rejects_bad_input() {
        let mut mat = test_matrix(3, 2);
        mat[(2, 1)] = c(f64::NAN, 0.0);
        assert_eq!(
            QRStep::from_decomp(mat).unwrap_err(),
            NonFinite { row: 2, col: 1 },
        );
        assert_eq!(
            QRStep::<C64>::from_decomp(na::DMatrix::zeros(3, 0)).unwrap_err(),
            Empty { rows: 3, cols: 0 },
        );
    }
}
