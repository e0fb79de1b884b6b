//! Compound differentiable functions.
//!
//! Each is generic over [`Scalar`], so the same call works on plain floats,
//! tape variables and dual numbers. On [`Var`](crate::Var) every function
//! here records a single node.

use crate::float::Float;
use crate::scalar::Scalar;

/// `x²`.
#[inline]
pub fn square<T: Scalar>(x: T) -> T {
    x.square()
}

/// Logistic sigmoid `1 / (1 + e^-x)`.
#[inline]
pub fn inv_logit<T: Scalar>(x: T) -> T {
    x.inv_logit()
}

/// Alias for [`inv_logit`].
#[inline]
pub fn logistic<T: Scalar>(x: T) -> T {
    x.inv_logit()
}

/// Softplus `ln(1 + e^x)`.
#[inline]
pub fn log1p_exp<T: Scalar>(x: T) -> T {
    x.log1p_exp()
}

/// `ln(e^a + e^b)`.
#[inline]
pub fn log_sum_exp<T: Scalar>(a: T, b: T) -> T {
    a.log_sum_exp(b)
}

/// Positive difference `max(a - b, 0)`.
#[inline]
pub fn fdim<T: Scalar>(a: T, b: T) -> T {
    if a > b {
        a - b
    } else {
        T::zero()
    }
}

pub(crate) fn inv_logit_f<F: Float>(x: F) -> F {
    if x >= F::zero() {
        F::one() / (F::one() + (-x).exp())
    } else {
        let e = x.exp();
        e / (F::one() + e)
    }
}

pub(crate) fn log1p_exp_f<F: Float>(x: F) -> F {
    if x > F::zero() {
        x + (-x).exp().ln_1p()
    } else {
        x.exp().ln_1p()
    }
}

/// Value of `ln(e^a + e^b)` and its partials. Both partials are zero when
/// both arguments are `-inf`.
pub(crate) fn log_sum_exp_partials<F: Float>(a: F, b: F) -> (F, F, F) {
    let m = if a >= b { a } else { b };
    if m == F::neg_infinity() {
        return (m, F::zero(), F::zero());
    }
    let r = m + ((a - m).exp() + (b - m).exp()).ln();
    (r, (a - r).exp(), (b - r).exp())
}
