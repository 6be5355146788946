//! Exact factorization of dense state vectors into left-canonical matrix
//! product states via a sweep of QR decompositions.
//!
//! An *N*-site state with local dimensions *d*<sub>0</sub>, ...,
//! *d*<sub>*N*–1</sub> is given as a flat vector of Π<sub>*k*</sub>
//! *d*<sub>*k*</sub> amplitudes in row-major order (the left-most site varies
//! the slowest). The state is split site-by-site from the left into a chain of
//! rank-3 tensors `A[k]` with axis signature `[left bond, physical, right
//! bond]`, each an isometry from its right bond into its fused
//! (left bond, physical) index.
//!
//! ```text
//!  A[0] --- A[1] --- ... --- A[n-1]
//!   |        |                 |
//!   s0       s1                s(n-1)
//! ```
//!
//! No truncation is ever performed; bond dimensions are the exact
//! min(Π<sub>*j*≤*k*</sub> *d*<sub>*j*</sub>, Π<sub>*j*>*k*</sub>
//! *d*<sub>*j*</sub>).

use nalgebra as na;
use num_complex::{ ComplexFloat, Complex };
use num_traits::{ Float, Zero };

pub mod reshape;
pub mod qr;
pub mod mps;
pub mod verify;
pub mod batch;

/// Extension trait for [`ComplexFloat`].
pub trait ComplexFloatExt: ComplexFloat {
    /// Convert from `Self::Real`.
    ///
    /// Should adhere to the usual relationship between ordinary complex and
    /// real numbers, i.e. the result should have imaginary part equal to zero.
    fn from_re(x: Self::Real) -> Self;
}

impl<T> ComplexFloatExt for Complex<T>
where
    Complex<T>: ComplexFloat<Real = T>,
    T: Zero + Float,
{
    fn from_re(x: Self::Real) -> Self {
        Self { re: x, im: <Self::Real as Zero>::zero() }
    }
}

/// Convenience trait to identify complex number types that can be used in
/// linear-algebraic operations.
pub trait ComplexScalar
where
    Self:
        ComplexFloat<Real = Self::Re>
        + ComplexFloatExt
        + na::ComplexField<RealField = Self::Re>
{
    /// Type for associated real values.
    type Re: Float + na::RealField;
}

impl<A> ComplexScalar for A
where
    A:
        ComplexFloat<Real = <A as na::ComplexField>::RealField>
        + ComplexFloatExt
        + na::ComplexField,
    <A as na::ComplexField>::RealField: Float,
{
    type Re = <A as na::ComplexField>::RealField;
}

/// Convert an `f64` constant into the real type associated with `A`.
pub(crate) fn re<A>(x: f64) -> A::Re
where A: ComplexScalar
{
    na::convert(x)
}
