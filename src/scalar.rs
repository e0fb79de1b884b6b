//! The [`Scalar`] trait for writing AD-generic numeric code.
//!
//! Functions written as `fn f<T: Scalar>(x: T) -> T` work transparently with
//! plain `f64`, `Var<f64>`, `Dual<f64>` and the nested forms
//! `Dual<Var<f64>>`, `Dual<Dual<Var<f64>>>`.

use std::fmt::{Debug, Display};

use num_traits::{FloatConst, FromPrimitive};

use crate::dual::Dual;
use crate::float::Float;
use crate::functions;
use crate::tape::TapeThreadLocal;
use crate::var::Var;

/// The central trait for AD-generic numeric code.
///
/// Besides the `num_traits::Float` surface it carries a few compound
/// functions common in log-density code. Their provided bodies compose
/// primitive operations; [`Var`] and [`Dual`] override them with a single
/// node or a single chain-rule step.
pub trait Scalar:
    num_traits::Float
    + FloatConst
    + FromPrimitive
    + Copy
    + Default
    + Debug
    + Display
    + Send
    + Sync
    + 'static
{
    /// The underlying primitive float type.
    type Float: Float;

    /// Lift a plain float to this scalar (constant, zero derivative).
    fn from_f(val: Self::Float) -> Self;

    /// Extract the primal value, through every level of nesting.
    fn value(&self) -> Self::Float;

    /// Lift an `f64` literal.
    #[inline]
    fn lit(x: f64) -> Self {
        Self::from_f(<Self::Float as Float>::lit(x))
    }

    /// `x²`.
    #[inline]
    fn square(self) -> Self {
        self * self
    }

    /// Logistic sigmoid `1 / (1 + e^-x)`.
    fn inv_logit(self) -> Self {
        if self.value() >= <Self::Float as num_traits::Zero>::zero() {
            (Self::one() + (-self).exp()).recip()
        } else {
            let e = self.exp();
            e / (Self::one() + e)
        }
    }

    /// Softplus `ln(1 + e^x)`, without overflow for large `x`.
    fn log1p_exp(self) -> Self {
        if self.value() > <Self::Float as num_traits::Zero>::zero() {
            self + (-self).exp().ln_1p()
        } else {
            self.exp().ln_1p()
        }
    }

    /// `ln(e^self + e^other)`, shifted by the larger argument.
    fn log_sum_exp(self, other: Self) -> Self {
        let m = if self >= other { self } else { other };
        if m.value() == <Self::Float as num_traits::Float>::neg_infinity() {
            return m;
        }
        m + ((self - m).exp() + (other - m).exp()).ln()
    }
}

impl Scalar for f32 {
    type Float = f32;

    #[inline]
    fn from_f(val: f32) -> Self {
        val
    }

    #[inline]
    fn value(&self) -> f32 {
        *self
    }
}

impl Scalar for f64 {
    type Float = f64;

    #[inline]
    fn from_f(val: f64) -> Self {
        val
    }

    #[inline]
    fn value(&self) -> f64 {
        *self
    }
}

impl<F: Float + TapeThreadLocal> Scalar for Var<F> {
    type Float = F;

    #[inline]
    fn from_f(val: F) -> Self {
        Var::constant(val)
    }

    #[inline]
    fn value(&self) -> F {
        self.value
    }

    #[inline]
    fn square(self) -> Self {
        Var::unary(self, self.value * self.value, F::lit(2.0) * self.value)
    }

    fn inv_logit(self) -> Self {
        let s = functions::inv_logit_f(self.value);
        Var::unary(self, s, s * (F::one() - s))
    }

    fn log1p_exp(self) -> Self {
        Var::unary(
            self,
            functions::log1p_exp_f(self.value),
            functions::inv_logit_f(self.value),
        )
    }

    fn log_sum_exp(self, other: Self) -> Self {
        let (r, da, db) = functions::log_sum_exp_partials(self.value, other.value);
        Var::binary(self, other, r, da, db)
    }
}

impl<T: Scalar> Scalar for Dual<T> {
    type Float = T::Float;

    #[inline]
    fn from_f(val: T::Float) -> Self {
        Dual::constant(T::from_f(val))
    }

    #[inline]
    fn value(&self) -> T::Float {
        self.re.value()
    }

    #[inline]
    fn square(self) -> Self {
        Dual {
            re: self.re.square(),
            eps: T::lit(2.0) * self.re * self.eps,
        }
    }

    fn inv_logit(self) -> Self {
        let s = self.re.inv_logit();
        Dual {
            re: s,
            eps: self.eps * s * (T::one() - s),
        }
    }

    fn log1p_exp(self) -> Self {
        Dual {
            re: self.re.log1p_exp(),
            eps: self.eps * self.re.inv_logit(),
        }
    }

    fn log_sum_exp(self, other: Self) -> Self {
        let re = self.re.log_sum_exp(other.re);
        if re.value() == <T::Float as num_traits::Float>::neg_infinity() {
            return Dual::constant(re);
        }
        Dual {
            re,
            eps: self.eps * (self.re - re).exp() + other.eps * (other.re - re).exp(),
        }
    }
}
