//! Row-major reshaping between flat state vectors, matrices, and rank-3 site
//! tensors.
//!
//! `nalgebra` stores matrices in column-major order, while state vectors and
//! site tensors here are always read in row-major ("C") order, with the
//! right-most index varying the fastest. Every conversion in this module is
//! therefore done element-wise through the row-major flat index rather than by
//! reinterpreting storage, so that
//!
//! ```text
//! flat[f] == mat[(f / cols, f % cols)] == site[[a, s, b]]
//!   where f = (a * phys + s) * right + b
//! ```
//!
//! holds for every conversion regardless of how the source is stored.
//!
//! ```
//! use mps_factor::reshape;
//!
//! let flat: Vec<f64> = (0..6).map(|k| k as f64).collect();
//! let m = reshape::from_flat(&flat, 2, 3).unwrap();
//! assert_eq!(m[(0, 2)], 2.0);
//! assert_eq!(m[(1, 0)], 3.0);
//!
//! let m2 = reshape::reshape(&m, 3, 2).unwrap();
//! assert_eq!(m2[(1, 0)], 2.0);
//! assert_eq!(m2[(2, 1)], 5.0);
//!
//! assert!(reshape::from_flat(&flat, 4, 2).is_err());
//! ```

use nalgebra as na;
use ndarray as nd;
use thiserror::Error;
use tracing::trace;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReshapeError {
    /// Returned when the target shape does not hold exactly as many elements as
    /// the source.
    #[error("shape mismatch: cannot reshape {len} elements into shape {shape:?}")]
    ShapeMismatch { shape: Vec<usize>, len: usize },
}
use ReshapeError::*;
pub type ReshapeResult<T> = Result<T, ReshapeError>;

fn check_size(shape: &[usize], len: usize) -> ReshapeResult<()> {
    let size =
        shape.iter()
        .try_fold(1_usize, |acc, dim| acc.checked_mul(*dim));
    if size == Some(len) {
        Ok(())
    } else {
        Err(ShapeMismatch { shape: shape.to_vec(), len })
    }
}

/// Arrange a flat row-major buffer into a `rows × cols` matrix.
///
/// Fails if `rows * cols != data.len()`.
pub fn from_flat<A>(data: &[A], rows: usize, cols: usize)
    -> ReshapeResult<na::DMatrix<A>>
where A: na::Scalar
{
    check_size(&[rows, cols], data.len())?;
    trace!(len = data.len(), rows, cols, "flat -> matrix");
    Ok(na::DMatrix::from_row_slice(rows, cols, data))
}

/// Flatten a matrix into a row-major buffer.
pub fn to_flat<A>(mat: &na::DMatrix<A>) -> Vec<A>
where A: na::Scalar
{
    mat.row_iter()
        .flat_map(|row| row.iter().cloned().collect::<Vec<A>>())
        .collect()
}

/// Reinterpret a matrix as a `rows × cols` matrix with the same row-major
/// element order.
///
/// Fails if `rows * cols` differs from the number of elements in `mat`.
pub fn reshape<A>(mat: &na::DMatrix<A>, rows: usize, cols: usize)
    -> ReshapeResult<na::DMatrix<A>>
where A: na::Scalar
{
    check_size(&[rows, cols], mat.len())?;
    trace!(from = ?mat.shape(), to = ?(rows, cols), "matrix -> matrix");
    let src_cols = mat.ncols();
    Ok(
        na::DMatrix::from_fn(rows, cols, |i, j| {
            let f = i * cols + j;
            mat[(f / src_cols, f % src_cols)].clone()
        })
    )
}

/// Reinterpret a matrix as a rank-3 tensor of shape `(left, phys, right)` with
/// the same row-major element order.
///
/// Fails if `left * phys * right` differs from the number of elements in
/// `mat`.
pub fn into_site<A>(
    mat: &na::DMatrix<A>,
    left: usize,
    phys: usize,
    right: usize,
) -> ReshapeResult<nd::Array3<A>>
where A: na::Scalar
{
    check_size(&[left, phys, right], mat.len())?;
    trace!(from = ?mat.shape(), to = ?(left, phys, right), "matrix -> site");
    let src_cols = mat.ncols();
    Ok(
        nd::Array3::from_shape_fn((left, phys, right), |(a, s, b)| {
            let f = (a * phys + s) * right + b;
            mat[(f / src_cols, f % src_cols)].clone()
        })
    )
}

/// Fuse the left bond and physical axes of a site tensor, returning the
/// `(left * phys) × right` matrix whose columns are the site's isometry
/// vectors.
pub fn site_matrix<A>(site: &nd::Array3<A>) -> na::DMatrix<A>
where A: na::Scalar
{
    let (left, phys, right) = site.dim();
    na::DMatrix::from_fn(left * phys, right, |i, j| {
        site[[i / phys, i % phys, j]].clone()
    })
}
