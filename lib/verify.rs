//! Contraction of an [`MPS`] back into amplitudes, and checks on the result.
//!
//! A single amplitude ⟨*s*<sub>0</sub> ... *s*<sub>*n*–1</sub>∣ψ⟩ is the
//! product of the `left × right` matrices picked out of each site tensor by
//! its physical index:
//!
//! ```text
//! ψ[s0, ..., s(n-1)] = A[0][:, s0, :] . A[1][:, s1, :] . ... . A[n-1][:, s(n-1), :]
//! ```
//!
//! which is a 1×1 matrix because of the unit boundary bonds. The checks here
//! compare every such amplitude against the original state vector, and test
//! that each site tensor is an isometry.
//!
//! ```
//! use num_complex::Complex64 as C64;
//! use mps_factor::{ mps::MPS, verify };
//!
//! let state: Vec<C64> =
//!     (0..27).map(|k| C64::new(k as f64, 1.0 - k as f64)).collect();
//! let norm: f64 = state.iter().map(|a| a.norm_sqr()).sum::<f64>().sqrt();
//! let state: Vec<C64> = state.into_iter().map(|a| a / norm).collect();
//!
//! let mps: MPS<C64> = MPS::from_vector(3, 3, state.clone()).unwrap();
//! let report = verify::verify_exhaustive(&mps, &state, None).unwrap();
//! assert!(report.passed);
//! assert_eq!(report.checked, 27);
//! assert!(verify::is_left_canonical(&mps, None));
//! ```

use itertools::Itertools;
use nalgebra as na;
use ndarray as nd;
use num_traits::{ Float, One, Zero };
use tracing::debug;
use crate::{
    ComplexScalar,
    mps::{ MPS, MPSError, MPSResult, SiteTensor },
    re,
    reshape,
};

/// Default per-entry tolerance for comparisons.
pub const DEFAULT_TOL: f64 = 1e-10;

impl<A> MPS<A>
where A: ComplexScalar
{
    /// Contract the chain along a fixed sequence of physical indices, returning
    /// the corresponding amplitude.
    ///
    /// Fails if `indices` does not have exactly one entry per site, or if any
    /// entry is out of range for its site.
    pub fn amplitude(&self, indices: &[usize]) -> MPSResult<A> {
        if indices.len() != self.n {
            return Err(MPSError::InvalidIndices(
                format!("expected {} indices, got {}", self.n, indices.len())));
        }
        if let Some((k, (s, d))) =
            indices.iter().zip(&self.phys).enumerate()
            .find(|(_, (s, d))| s >= d)
        {
            return Err(MPSError::InvalidIndices(
                format!("index {s} at site {k} is out of range for dimension {d}")));
        }
        let acc: nd::Array2<A> =
            self.data.iter().zip(indices)
            .fold(
                nd::Array2::from_elem((1, 1), A::one()),
                |acc, (g, s)| acc.dot(&g.matrix(*s)),
            );
        Ok(acc[[0, 0]])
    }

    /// Contract the entire chain into a bare state vector in row-major order.
    ///
    /// The result has unit norm; multiply by [`norm`][Self::norm] to recover
    /// the original vector.
    pub fn to_vector(&self) -> nd::Array1<A> {
        // acc rows run over all physical indices seen so far (row-major), acc
        // columns over the current right bond
        let acc: nd::Array2<A> =
            self.data.iter()
            .fold(nd::Array2::from_elem((1, 1), A::one()), |acc, g| {
                let (_, d, r) = g.dims();
                let p = acc.nrows();
                let mut next: nd::Array2<A> = nd::Array2::zeros((p * d, r));
                for s in 0..d {
                    let block = acc.dot(&g.matrix(s));
                    for (i, row) in block.outer_iter().enumerate() {
                        next.row_mut(i * d + s).assign(&row);
                    }
                }
                next
            });
        acc.column(0).to_owned()
    }
}

/// Compute ‖*M*<sup>†</sup>*M* – *I*‖<sub>F</sub>, where *M* is the site tensor
/// with its left bond and physical index fused.
///
/// This vanishes exactly when the site tensor is left-orthonormal.
pub fn orthonormality_error<A>(site: &SiteTensor<A>) -> A::Re
where A: ComplexScalar
{
    let m = reshape::site_matrix(site.array());
    let r = m.ncols();
    let mut gram = m.adjoint() * m;
    gram -= na::DMatrix::<A>::identity(r, r);
    gram.norm()
}

/// Return `true` if every site tensor is left-orthonormal to within `tol`
/// (default [`DEFAULT_TOL`]).
pub fn is_left_canonical<A>(mps: &MPS<A>, tol: Option<A::Re>) -> bool
where A: ComplexScalar
{
    let tol = Float::abs(tol.unwrap_or_else(|| re::<A>(DEFAULT_TOL)));
    mps.sites().iter().all(|g| orthonormality_error(g) <= tol)
}

/// Outcome of an exhaustive comparison between an MPS and a state vector.
#[derive(Clone, Debug, PartialEq)]
pub struct Report<A>
where A: ComplexScalar
{
    /// Number of amplitudes compared.
    pub checked: usize,
    /// Number of amplitudes outside tolerance.
    pub failed: usize,
    /// Largest absolute deviation found.
    pub max_err: A::Re,
    /// Index sequence at which `max_err` occurs.
    pub worst: Vec<usize>,
    /// `true` if every amplitude was within tolerance.
    pub passed: bool,
}

/// Compare every amplitude of an MPS against the state vector it represents.
///
/// Index sequences are visited in row-major order, so that the *k*-th sequence
/// corresponds to `state[k]`. An amplitude passes if its absolute deviation is
/// at most `tol * max(1, |state[k]|)`, i.e. the larger of an absolute and a
/// relative tolerance; `tol` defaults to [`DEFAULT_TOL`].
///
/// Fails if `state` does not have one entry per basis element.
pub fn verify_exhaustive<A>(mps: &MPS<A>, state: &[A], tol: Option<A::Re>)
    -> MPSResult<Report<A>>
where A: ComplexScalar
{
    let tol = Float::abs(tol.unwrap_or_else(|| re::<A>(DEFAULT_TOL)));
    let statelen: usize = mps.phys_dims().iter().product();
    if state.len() != statelen {
        return Err(MPSError::InvalidParameters(
            format!(
                "state vector has length {} but the MPS has {} amplitudes",
                state.len(), statelen,
            )
        ));
    }
    let mut checked: usize = 0;
    let mut failed: usize = 0;
    let mut max_err = A::Re::zero();
    let mut worst: Vec<usize> = vec![0; mps.n()];
    let sequences =
        mps.phys_dims().iter()
        .map(|d| 0..*d)
        .multi_cartesian_product();
    for (indices, expected) in sequences.zip(state) {
        let found = mps.amplitude(&indices)?;
        let err = na::ComplexField::modulus(found - *expected);
        let scale = Float::max(A::Re::one(), na::ComplexField::modulus(*expected));
        if err > tol * scale { failed += 1; }
        if err > max_err {
            max_err = err;
            worst = indices;
        }
        checked += 1;
    }
    debug!(checked, failed, max_err = ?max_err, "exhaustive verification");
    Ok(Report { checked, failed, max_err, worst, passed: failed == 0 })
}

#[cfg(test)]
mod tests {
    use num_complex::Complex64 as C64;
    use super::*;

    fn ghz(n: usize) -> Vec<C64> {
        let len = 1 << n;
        let mut v = vec![C64::from(0.0); len];
        v[0] = C64::from(0.5_f64.sqrt());
        v[len - 1] = C64::from(0.5_f64.sqrt());
        v
    }

    #[test]
    fn ghz_paths() {
        let mps: MPS<C64> = MPS::from_vector(4, 2, ghz(4)).unwrap();
        let h = C64::from(0.5_f64.sqrt());
        assert!((mps.amplitude(&[0, 0, 0, 0]).unwrap() - h).norm() < 1e-12);
        assert!((mps.amplitude(&[1, 1, 1, 1]).unwrap() - h).norm() < 1e-12);
        assert!(mps.amplitude(&[0, 1, 0, 1]).unwrap().norm() < 1e-12);
        assert!(mps.amplitude(&[1, 1, 1, 0]).unwrap().norm() < 1e-12);
    }

    #[test]
    fn to_vector_matches_input() {
        let state: Vec<C64> =
            (0..24)
            .map(|k| C64::new((0.3 * k as f64).sin(), (1.7 * k as f64).cos()))
            .collect();
        let mps: MPS<C64> =
            MPS::from_vector_dims([2, 3, 4], state.clone()).unwrap();
        let norm = mps.norm();
        let vec = mps.to_vector();
        assert_eq!(vec.len(), 24);
        for (a, b) in vec.iter().zip(&state) {
            assert!((*a * norm - *b).norm() < 1e-10);
        }
    }

    #[test]
    fn report_flags_wrong_state() {
        let mps: MPS<C64> = MPS::from_vector(3, 2, ghz(3)).unwrap();
        let mut other = ghz(3);
        other.swap(0, 3);
        let report = verify_exhaustive(&mps, &other, None).unwrap();
        assert!(!report.passed);
        assert_eq!(report.checked, 8);
        assert_eq!(report.failed, 2);
        assert!((report.max_err - 0.5_f64.sqrt()).abs() < 1e-12);

        let good = verify_exhaustive(&mps, &ghz(3), None).unwrap();
        assert!(good.passed);
        assert_eq!(good.failed, 0);
    }

    #[test]
    fn tolerance_scales_with_large_amplitudes() {
        // factored from 2 ∣01⟩, so the MPS itself holds ∣01⟩ and norm 2
        let mut state = vec![C64::from(0.0); 4];
        state[1] = C64::from(2.0);
        let mps: MPS<C64> = MPS::from_vector(2, 2, state).unwrap();
        assert!((mps.norm() - 2.0).abs() < 1e-12);
        let scaled: Vec<C64> =
            mps.to_vector().iter().map(|a| *a * mps.norm()).collect();

        // |1 - 2| = 1 exceeds an absolute 0.6 but not 0.6 * |2|
        let report = verify_exhaustive(&mps, &scaled, Some(0.6)).unwrap();
        assert!(report.passed);
        assert_eq!(report.worst, vec![0, 1]);
        assert!((report.max_err - 1.0).abs() < 1e-12);

        // |1 - 3| = 2 exceeds 0.6 * |3|
        let mut tripled = scaled.clone();
        tripled[1] = C64::from(3.0);
        let report = verify_exhaustive(&mps, &tripled, Some(0.6)).unwrap();
        assert!(!report.passed);
        assert_eq!(report.failed, 1);

        // small entries still fall back to the absolute tolerance
        let mut shifted = scaled;
        shifted[1] = C64::from(1.0);
        shifted[2] = C64::from(0.7);
        let report = verify_exhaustive(&mps, &shifted, Some(0.6)).unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(report.worst, vec![1, 0]);
    }

    #[test]
    fn bad_index_sequences() {
        let mps: MPS<C64> = MPS::from_vector(3, 2, ghz(3)).unwrap();
        assert!(matches!(
            mps.amplitude(&[0, 0]),
            Err(MPSError::InvalidIndices(_)),
        ));
        assert!(matches!(
            mps.amplitude(&[0, 2, 0]),
            Err(MPSError::InvalidIndices(_)),
        ));
        assert!(matches!(
            verify_exhaustive(&mps, &ghz(2), None),
            Err(MPSError::InvalidParameters(_)),
        ));
    }

    #[test]
    fn orthonormality_of_non_isometry() {
        let mut g = nd::Array3::<C64>::zeros((1, 2, 2));
        g[[0, 0, 0]] = C64::from(1.0);
        g[[0, 1, 1]] = C64::from(2.0);
        let site = SiteTensor::new(g);
        assert!((orthonormality_error(&site) - 3.0).abs() < 1e-12);

        let mps: MPS<C64> = MPS::from_vector(3, 2, ghz(3)).unwrap();
        assert!(is_left_canonical(&mps, None));
        assert!(mps.sites().iter().all(|g| orthonormality_error(g) < 1e-12));
    }
}
