//! Matrix product states in left-canonical form, built by sweeping QR
//! decompositions across a dense state vector.
//!
//! Each site tensor `A[k]` has axis signature `[u{k - 1}, s{k}, u{k}]`, where
//! `u{j}` is a bond index and `s{k}` is the physical index of the `k`-th site.
//! Endpoint bonds are fixed with `dim(u{-1}) == dim(u{n - 1}) == 1`. Every
//! tensor, with its left bond and physical index fused into a single row
//! index, has orthonormal columns:
//!
//! ```text
//!  .-- A[k]* --.
//!  |    |      |        |
//!  |    |      | ==     |
//!  |    |      |        |
//!  '-- A[k] ---'
//! ```
//!
//! The factorization proceeds from the left. With `ψ` the state reshaped to
//! `(d0, d1 ... d(n-1))`, each step computes `ψ = Q R`, reshapes `Q` into
//! `A[k]`, and re-fuses the next physical index into the rows of `R` to form
//! the next `ψ`. The final `R` is a non-negative 1×1 remnant equal to the norm
//! of the input, kept as [`MPS::norm`].
//!
//! # Example
//!
//! ```
//! use num_complex::Complex64 as C64;
//! use mps_factor::mps::MPS;
//!
//! let h = C64::from(0.5_f64.sqrt());
//! let z = C64::from(0.0);
//! // (∣00⟩ + ∣11⟩) / √2
//! let bell = [h, z, z, h];
//! let mps: MPS<C64> = MPS::from_vector(2, 2, bell).unwrap();
//!
//! assert_eq!(mps.bond_dims(), vec![2]);
//! assert_eq!(mps.site(0).unwrap().dims(), (1, 2, 2));
//! assert_eq!(mps.site(1).unwrap().dims(), (2, 2, 1));
//! assert!((mps.amplitude(&[1, 1]).unwrap() - h).norm() < 1e-12);
//! assert!(mps.amplitude(&[0, 1]).unwrap().norm() < 1e-12);
//! ```

use std::mem;
use nalgebra as na;
use ndarray as nd;
use num_traits::{ Float, One, Zero };
use thiserror::Error;
use tracing::{ debug, warn };
use crate::{
    ComplexScalar,
    qr::{ QRError, QRStep },
    re,
    reshape::{ self, ReshapeError },
};

#[derive(Debug, Error)]
pub enum MPSError {
    /// Returned when the system description or state vector is unusable before
    /// any computation begins: no sites, a zero-dimensional site, a state
    /// vector of the wrong length, or a state with zero norm.
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    /// Returned when a QR decomposition fails at a given step.
    #[error("numerical decomposition error at step {step}: {source}")]
    Decomposition { step: usize, source: QRError },

    /// Returned when an intermediate reshape fails at a given step.
    #[error("reshape error at step {step}: {source}")]
    Reshape { step: usize, source: ReshapeError },

    /// Returned when the bond dimensions on either side of a cut disagree.
    ///
    /// Cuts are numbered `0..=n`, with cut `k` lying immediately to the left of
    /// site `k`; cuts `0` and `n` are the boundaries, which must have dimension
    /// 1.
    #[error(
        "structural invariant violated at step {step}: \
        bond dimension {left} on the left does not match {right} on the right"
    )]
    Structural { step: usize, left: usize, right: usize },

    /// Returned when the QR decomposition at a given step produces a bond
    /// dimension other than the exact one for that cut.
    #[error(
        "structural invariant violated at step {step}: \
        QR rank {found} differs from exact bond dimension {expected}"
    )]
    RankMismatch { step: usize, found: usize, expected: usize },

    /// Returned when an index sequence passed for contraction has the wrong
    /// length or an out-of-range physical index.
    #[error("invalid index sequence: {0}")]
    InvalidIndices(String),
}
use MPSError::*;
pub type MPSResult<T> = Result<T, MPSError>;

/// A single rank-3 MPS tensor with axis signature `[left bond, physical, right
/// bond]`.
#[derive(Clone, Debug, PartialEq)]
pub struct SiteTensor<A> {
    data: nd::Array3<A>,
}

impl<A> SiteTensor<A> {
    pub(crate) fn new(data: nd::Array3<A>) -> Self { Self { data } }

    /// Return the dimensions `(left, physical, right)`.
    pub fn dims(&self) -> (usize, usize, usize) { self.data.dim() }

    /// Return the left bond dimension.
    pub fn left_dim(&self) -> usize { self.data.dim().0 }

    /// Return the physical dimension.
    pub fn phys_dim(&self) -> usize { self.data.dim().1 }

    /// Return the right bond dimension.
    pub fn right_dim(&self) -> usize { self.data.dim().2 }

    /// Return a reference to the underlying array.
    pub fn array(&self) -> &nd::Array3<A> { &self.data }

    /// Discard the wrapper and return the underlying array.
    pub fn into_array(self) -> nd::Array3<A> { self.data }

    /// Return the `left × right` matrix for a fixed physical index.
    ///
    /// *Panics if `s` is out of bounds.*
    pub fn matrix(&self, s: usize) -> nd::ArrayView2<'_, A> {
        self.data.index_axis(nd::Axis(1), s)
    }
}

/// Compute the bond dimensions of an exact (untruncated) MPS over sites with
/// physical dimensions `phys`.
///
/// The bond between sites `k` and `k + 1` has dimension
/// min(Π<sub>*j* ≤ *k*</sub> *d*<sub>*j*</sub>, Π<sub>*j* > *k*</sub>
/// *d*<sub>*j*</sub>). Boundary bonds (always 1) are not included, so the
/// result has length `phys.len() - 1`.
///
/// ```
/// use mps_factor::mps::exact_bond_dims;
///
/// assert_eq!(exact_bond_dims(&[2; 6]), vec![2, 4, 8, 4, 2]);
/// assert_eq!(exact_bond_dims(&[3, 2, 5]), vec![3, 5]);
/// assert!(exact_bond_dims(&[4]).is_empty());
/// ```
pub fn exact_bond_dims(phys: &[usize]) -> Vec<usize> {
    let n = phys.len();
    let mut left: Vec<usize> = Vec::with_capacity(n);
    let mut acc: usize = 1;
    for d in phys.iter() {
        acc = acc.saturating_mul(*d);
        left.push(acc);
    }
    let mut right: Vec<usize> = vec![1; n];
    acc = 1;
    for (k, d) in phys.iter().enumerate().rev() {
        right[k] = acc;
        acc = acc.saturating_mul(*d);
    }
    left.into_iter().zip(right)
        .take(n.saturating_sub(1))
        .map(|(l, r)| l.min(r))
        .collect()
}

// Check that adjacent bond dimensions agree and that both boundaries are 1.
pub(crate) fn check_chain<A>(sites: &[SiteTensor<A>]) -> MPSResult<()> {
    let n = sites.len();
    let mut left: usize = 1;
    for (k, site) in sites.iter().enumerate() {
        let right = site.left_dim();
        if left != right { return Err(Structural { step: k, left, right }); }
        left = site.right_dim();
    }
    if left != 1 { return Err(Structural { step: n, left, right: 1 }); }
    Ok(())
}

// Check the rank found at step `k` against the exact bond dimension to the
// right of site `k`; the last site always closes on the unit boundary.
pub(crate) fn check_rank(k: usize, found: usize, bonds: &[usize])
    -> MPSResult<()>
{
    let expected = bonds.get(k).copied().unwrap_or(1);
    if found == expected {
        Ok(())
    } else {
        Err(RankMismatch { step: k, found, expected })
    }
}

/// A (pure) matrix product state in left-canonical form.
///
/// Constructed once from a state vector and never mutated afterward.
#[derive(Clone, Debug, PartialEq)]
pub struct MPS<A>
where A: ComplexScalar
{
    // Number of sites.
    pub(crate) n: usize, // ≥ 1
    // Site tensors, each with axis signature
    //   [ u{k - 1}, s{k}, u{k} ]
    pub(crate) data: Vec<SiteTensor<A>>, // length n
    // Physical dimensions.
    pub(crate) phys: Vec<usize>, // length n
    // Norm of the factored state vector; the site tensors themselves always
    // describe a unit-norm state.
    pub(crate) norm: A::Re,
}

impl<A> MPS<A>
where A: ComplexScalar
{
    /// Factor a state vector over `n` sites, each of physical dimension `d`.
    ///
    /// The state must have length *d*<sup>*n*</sup> and be in row-major order,
    /// with the left-most site varying the slowest:
    ///
    /// | Array index | Basis element |
    /// | :---------- | :------------ |
    /// | 0           | ∣00...00⟩     |
    /// | 1           | ∣00...01⟩     |
    /// | 2           | ∣00...10⟩     |
    /// | ...         | ...           |
    /// | *d*<sup>*n*</sup> – 1 | ∣(d-1)...(d-1)⟩ |
    ///
    /// The state is assumed to be normalized. If it isn't, the resulting
    /// tensors describe the normalized state and the original norm is available
    /// from [`norm`][Self::norm].
    ///
    /// Fails with [`InvalidParameters`][MPSError::InvalidParameters] if `n` or
    /// `d` is zero, or the state does not have length *d*<sup>*n*</sup>.
    pub fn from_vector<J>(n: usize, d: usize, state: J) -> MPSResult<Self>
    where J: IntoIterator<Item = A>
    {
        if n < 1 {
            return Err(InvalidParameters(
                "cannot create an MPS for an empty system".into()));
        }
        if d < 1 {
            return Err(InvalidParameters(
                "physical dimension must be at least 1".into()));
        }
        Self::from_vector_dims(vec![d; n], state)
    }

    /// Like [`from_vector`][Self::from_vector], but with a separate physical
    /// dimension for every site.
    ///
    /// The state must have length Π<sub>*k*</sub> *d*<sub>*k*</sub>.
    pub fn from_vector_dims<I, J>(dims: I, state: J) -> MPSResult<Self>
    where
        I: IntoIterator<Item = usize>,
        J: IntoIterator<Item = A>,
    {
        let phys: Vec<usize> = dims.into_iter().collect();
        if phys.is_empty() {
            return Err(InvalidParameters(
                "cannot create an MPS for an empty system".into()));
        }
        if let Some(k) = phys.iter().position(|d| *d == 0) {
            return Err(InvalidParameters(
                format!("site {k} has an unphysical zero-dimensional index")));
        }
        let statelen: usize =
            phys.iter()
            .try_fold(1_usize, |acc, d| acc.checked_mul(*d))
            .ok_or_else(|| InvalidParameters(
                format!("state dimension for {phys:?} overflows")))?;
        let state: Vec<A> = state.into_iter().collect();
        if state.len() != statelen {
            return Err(InvalidParameters(
                format!(
                    "state vector has length {} but dimensions {:?} require {}",
                    state.len(), phys, statelen,
                )
            ));
        }
        if let Some(f) =
            state.iter().position(|a| !na::ComplexField::is_finite(a))
        {
            let cols = statelen / phys[0];
            let source = QRError::NonFinite { row: f / cols, col: f % cols };
            return Err(Decomposition { step: 0, source });
        }
        let norm: A::Re =
            state.iter()
            .map(|a| na::ComplexField::modulus_squared(*a))
            .fold(A::Re::zero(), |acc, x| acc + x);
        let norm = Float::sqrt(norm);
        if norm <= A::Re::zero() {
            return Err(InvalidParameters("state vector has zero norm".into()));
        }
        if Float::abs(norm - A::Re::one()) > re::<A>(1e-10) {
            warn!(norm = ?norm, "state vector is not normalized");
        }

        let n = phys.len();
        if n == 1 {
            // nothing to factor: the lone site is the normalized state itself
            let d = phys[0];
            let scale = A::from_re(Float::recip(norm));
            let g: nd::Array3<A> =
                nd::Array3::from_shape_fn((1, d, 1), |(_, s, _)| state[s] * scale);
            debug!(sites = 1, phys = d, "single-site state; no decomposition");
            let data = vec![SiteTensor::new(g)];
            Ok(Self { n, data, phys, norm })
        } else {
            let (data, norm) = Self::factorize(&phys, state)?;
            Ok(Self { n, data, phys, norm })
        }
    }

    fn factorize(phys: &[usize], state: Vec<A>)
        -> MPSResult<(Vec<SiteTensor<A>>, A::Re)>
    {
        let n = phys.len(); // assume n ≥ 2
        let bonds = exact_bond_dims(phys);
        let mut data: Vec<SiteTensor<A>> = Vec::with_capacity(n);
        let mut udim: usize = 1;
        let mut norm: A::Re = A::Re::zero();
        let statelen = state.len();
        let mut psi: na::DMatrix<A> =
            reshape::from_flat(&state, phys[0], statelen / phys[0])
            .map_err(|source| Reshape { step: 0, source })?;
        for (k, outdim) in phys.iter().copied().enumerate() {
            let (rows, cols) = psi.shape();
            debug!(site = k, rows, cols, "QR step");

            // Q carries the new site, R everything to the right of the cut
            let QRStep { q, r, rank } =
                QRStep::from_decomp(mem::replace(&mut psi, na::DMatrix::zeros(0, 0)))
                .map_err(|source| Decomposition { step: k, source })?;
            check_rank(k, rank, &bonds)?;
            let g =
                reshape::into_site(&q, udim, outdim, rank)
                .map_err(|source| Reshape { step: k, source })?;
            data.push(SiteTensor::new(g));
            debug!(site = k, left = udim, phys = outdim, right = rank, "site done");

            if let Some(nextdim) = phys.get(k + 1) {
                // fuse the next physical index into the rows of R
                psi =
                    reshape::reshape(&r, rank * nextdim, cols / nextdim)
                    .map_err(|source| Reshape { step: k, source })?;
            } else {
                // the 1×1 remnant; its gauge-fixed value is the input norm
                norm = na::ComplexField::modulus(r[(0, 0)]);
            }
            udim = rank;
        }
        check_chain(&data)?;
        Ok((data, norm))
    }
}

impl<A> MPS<A>
where A: ComplexScalar
{
    /// Return the number of sites.
    pub fn n(&self) -> usize { self.n }

    /// Return the physical dimensions of all sites.
    pub fn phys_dims(&self) -> &[usize] { &self.phys }

    /// Return the dimensions `(left, physical, right)` of every site tensor,
    /// left to right.
    pub fn dims(&self) -> Vec<(usize, usize, usize)> {
        self.data.iter().map(|g| g.dims()).collect()
    }

    /// Return the norm of the state vector the MPS was factored from.
    pub fn norm(&self) -> A::Re { self.norm }

    /// Return the dimensions of every interior bond, left to right.
    pub fn bond_dims(&self) -> Vec<usize> {
        self.data.iter().take(self.n - 1).map(|g| g.right_dim()).collect()
    }

    /// Return the dimension of the `k`-th bond (between sites `k` and `k + 1`),
    /// if it exists.
    pub fn bond_dim(&self, k: usize) -> Option<usize> {
        (k < self.n - 1).then(|| self.data[k].right_dim())
    }

    /// Return the maximum interior bond dimension, if there are at least two
    /// sites.
    pub fn max_bond_dim(&self) -> Option<usize> {
        self.bond_dims().into_iter().max()
    }

    /// Return all site tensors, left to right.
    pub fn sites(&self) -> &[SiteTensor<A>] { &self.data }

    /// Return the `k`-th site tensor, if it exists.
    pub fn site(&self, k: usize) -> Option<&SiteTensor<A>> { self.data.get(k) }

    /// Discard everything but the site tensors.
    pub fn into_sites(self) -> Vec<SiteTensor<A>> { self.data }

    /// Check that all bond dimensions chain together with unit boundaries.
    pub fn check_chain(&self) -> MPSResult<()> { check_chain(&self.data) }
}
