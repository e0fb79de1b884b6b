use std::fmt::{Debug, Display};

use num_traits::{Float as NumFloat, FloatConst, FromPrimitive};

/// Primitive floating-point types that can back a tape (`f32`, `f64`).
///
/// Slots, partials and snapshots on the tape are stored as `Self`. The
/// differentiable wrappers ([`Var`](crate::Var), [`Dual`](crate::Dual)) do
/// not implement this trait; they implement [`Scalar`](crate::Scalar).
pub trait Float:
    NumFloat + FloatConst + FromPrimitive + Copy + Send + Sync + Default + Debug + Display + 'static
{
    /// Convert an `f64` literal, rounding if `Self` is narrower.
    fn lit(x: f64) -> Self;
}

impl Float for f32 {
    #[inline]
    fn lit(x: f64) -> f32 {
        x as f32
    }
}

impl Float for f64 {
    #[inline]
    fn lit(x: f64) -> f64 {
        x
    }
}

/// Derivative of `|x|`: `-1`, `0` or `1`, NaN for NaN.
///
/// `signum` alone would report 1 at `+0.0`.
#[inline]
pub(crate) fn abs_derivative<F: NumFloat>(x: F) -> F {
    if x > F::zero() {
        F::one()
    } else if x < F::zero() {
        -F::one()
    } else if x == F::zero() {
        F::zero()
    } else {
        F::nan()
    }
}
