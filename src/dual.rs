use std::fmt::{self, Display};

use crate::float::abs_derivative;
use crate::Scalar;

/// Forward-mode dual number: a value paired with its tangent (derivative).
///
/// `Dual { re, eps }` represents `re + eps·ε` where `ε² = 0`.
///
/// Both components are themselves [`Scalar`]s, so duals nest:
/// `Dual<Var<f64>>` records the tangent computation on the tape
/// (forward-over-reverse) and `Dual<Dual<Var<f64>>>` reaches third
/// derivatives.
#[derive(Clone, Copy, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Dual<T: Scalar> {
    /// Primal (real) value.
    pub re: T,
    /// Tangent (derivative) value.
    pub eps: T,
}

impl<T: Scalar> Display for Dual<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} + {}ε", self.re, self.eps)
    }
}

impl<T: Scalar> Dual<T> {
    /// Create a new dual number.
    #[inline]
    pub fn new(re: T, eps: T) -> Self {
        Dual { re, eps }
    }

    /// Create a constant (zero derivative).
    #[inline]
    pub fn constant(re: T) -> Self {
        Dual { re, eps: T::zero() }
    }

    /// Create a variable (unit derivative) for differentiation.
    #[inline]
    pub fn variable(re: T) -> Self {
        Dual { re, eps: T::one() }
    }

    /// Apply the chain rule: given `f(self.re)` and `f'(self.re)`, produce the dual result.
    #[inline]
    fn chain(self, f_val: T, f_deriv: T) -> Self {
        Dual {
            re: f_val,
            eps: self.eps * f_deriv,
        }
    }

    /// Same primal, zero tangent.
    #[inline]
    fn flat(re: T) -> Self {
        Dual { re, eps: T::zero() }
    }

    // ── Powers ──

    #[inline]
    pub fn recip(self) -> Self {
        let inv = self.re.recip();
        self.chain(inv, -inv * inv)
    }

    #[inline]
    pub fn sqrt(self) -> Self {
        let s = self.re.sqrt();
        self.chain(s, (T::lit(2.0) * s).recip())
    }

    #[inline]
    pub fn cbrt(self) -> Self {
        let c = self.re.cbrt();
        self.chain(c, (T::lit(3.0) * c * c).recip())
    }

    #[inline]
    pub fn powi(self, n: i32) -> Self {
        let val = self.re.powi(n);
        if n == 0 {
            return Dual::flat(val);
        }
        let deriv = T::lit(<f64 as From<i32>>::from(n)) * self.re.powi(n - 1);
        self.chain(val, deriv)
    }

    /// `x^y` with tangent `y·x^(y-1)·dx + x^y·ln(x)·dy`.
    ///
    /// The `dy` term is dropped when the base is not positive, where `ln(x)`
    /// is undefined.
    #[inline]
    pub fn powf(self, n: Self) -> Self {
        let val = self.re.powf(n.re);
        let mut eps = n.re * self.re.powf(n.re - T::one()) * self.eps;
        let base = self.re.value();
        if base > <T::Float as num_traits::Zero>::zero() || num_traits::Float::is_nan(base) {
            eps = eps + val * self.re.ln() * n.eps;
        }
        Dual { re: val, eps }
    }

    // ── Exp/Log ──

    #[inline]
    pub fn exp(self) -> Self {
        let e = self.re.exp();
        self.chain(e, e)
    }

    #[inline]
    pub fn exp2(self) -> Self {
        let e = self.re.exp2();
        self.chain(e, e * T::LN_2())
    }

    #[inline]
    pub fn exp_m1(self) -> Self {
        self.chain(self.re.exp_m1(), self.re.exp())
    }

    #[inline]
    pub fn ln(self) -> Self {
        self.chain(self.re.ln(), self.re.recip())
    }

    #[inline]
    pub fn log2(self) -> Self {
        self.chain(self.re.log2(), (self.re * T::LN_2()).recip())
    }

    #[inline]
    pub fn log10(self) -> Self {
        self.chain(self.re.log10(), (self.re * T::LN_10()).recip())
    }

    #[inline]
    pub fn ln_1p(self) -> Self {
        self.chain(self.re.ln_1p(), (T::one() + self.re).recip())
    }

    #[inline]
    pub fn log(self, base: Self) -> Self {
        self.ln() / base.ln()
    }

    // ── Trig ──

    #[inline]
    pub fn sin(self) -> Self {
        self.chain(self.re.sin(), self.re.cos())
    }

    #[inline]
    pub fn cos(self) -> Self {
        self.chain(self.re.cos(), -self.re.sin())
    }

    #[inline]
    pub fn tan(self) -> Self {
        let c = self.re.cos();
        self.chain(self.re.tan(), (c * c).recip())
    }

    #[inline]
    pub fn sin_cos(self) -> (Self, Self) {
        let (s, c) = self.re.sin_cos();
        (
            Dual {
                re: s,
                eps: self.eps * c,
            },
            Dual {
                re: c,
                eps: self.eps * (-s),
            },
        )
    }

    #[inline]
    pub fn asin(self) -> Self {
        self.chain(
            self.re.asin(),
            (T::one() - self.re * self.re).sqrt().recip(),
        )
    }

    #[inline]
    pub fn acos(self) -> Self {
        self.chain(
            self.re.acos(),
            -(T::one() - self.re * self.re).sqrt().recip(),
        )
    }

    #[inline]
    pub fn atan(self) -> Self {
        self.chain(self.re.atan(), (T::one() + self.re * self.re).recip())
    }

    #[inline]
    pub fn atan2(self, other: Self) -> Self {
        // d atan2(y, x) = (x dy - y dx) / (x² + y²)
        let denom = self.re * self.re + other.re * other.re;
        Dual {
            re: self.re.atan2(other.re),
            eps: (other.re * self.eps - self.re * other.eps) / denom,
        }
    }

    // ── Hyperbolic ──

    #[inline]
    pub fn sinh(self) -> Self {
        self.chain(self.re.sinh(), self.re.cosh())
    }

    #[inline]
    pub fn cosh(self) -> Self {
        self.chain(self.re.cosh(), self.re.sinh())
    }

    #[inline]
    pub fn tanh(self) -> Self {
        let t = self.re.tanh();
        self.chain(t, T::one() - t * t)
    }

    #[inline]
    pub fn asinh(self) -> Self {
        self.chain(
            self.re.asinh(),
            (self.re * self.re + T::one()).sqrt().recip(),
        )
    }

    #[inline]
    pub fn acosh(self) -> Self {
        self.chain(
            self.re.acosh(),
            (self.re * self.re - T::one()).sqrt().recip(),
        )
    }

    #[inline]
    pub fn atanh(self) -> Self {
        self.chain(self.re.atanh(), (T::one() - self.re * self.re).recip())
    }

    // ── Misc ──

    /// `|x|` with derivative 0 at `x = 0`.
    #[inline]
    pub fn abs(self) -> Self {
        let d = abs_derivative(self.re.value());
        self.chain(self.re.abs(), T::from_f(d))
    }

    #[inline]
    pub fn signum(self) -> Self {
        Dual::flat(self.re.signum())
    }

    #[inline]
    pub fn floor(self) -> Self {
        Dual::flat(self.re.floor())
    }

    #[inline]
    pub fn ceil(self) -> Self {
        Dual::flat(self.re.ceil())
    }

    #[inline]
    pub fn round(self) -> Self {
        Dual::flat(self.re.round())
    }

    #[inline]
    pub fn trunc(self) -> Self {
        Dual::flat(self.re.trunc())
    }

    #[inline]
    pub fn fract(self) -> Self {
        Dual {
            re: self.re.fract(),
            eps: self.eps,
        }
    }

    #[inline]
    pub fn mul_add(self, a: Self, b: Self) -> Self {
        // d(x*a + b) = a*dx + x*da + db
        Dual {
            re: self.re.mul_add(a.re, b.re),
            eps: self.eps * a.re + self.re * a.eps + b.eps,
        }
    }

    #[inline]
    pub fn hypot(self, other: Self) -> Self {
        let h = self.re.hypot(other.re);
        Dual {
            re: h,
            eps: (self.re * self.eps + other.re * other.eps) / h,
        }
    }

    #[inline]
    pub fn max(self, other: Self) -> Self {
        if self.re >= other.re || other.re.is_nan() {
            self
        } else {
            other
        }
    }

    #[inline]
    pub fn min(self, other: Self) -> Self {
        if self.re <= other.re || other.re.is_nan() {
            self
        } else {
            other
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn abs_at_zero_has_zero_tangent() {
        let d = Dual::variable(0.0_f64).abs();
        assert_eq!(d.re, 0.0);
        assert_eq!(d.eps, 0.0);
        assert_eq!(Dual::variable(-2.0_f64).abs().eps, -1.0);
    }

    #[test]
    fn rounding_has_zero_tangent() {
        let x = Dual::variable(2.7_f64);
        assert_eq!(x.floor().eps, 0.0);
        assert_eq!(x.ceil().eps, 0.0);
        assert_eq!(x.round().eps, 0.0);
        assert_eq!(x.trunc().eps, 0.0);
        assert_eq!(x.signum().eps, 0.0);
    }

    #[test]
    fn powf_with_negative_base_and_constant_exponent() {
        let x = Dual::variable(-2.0_f64);
        let y = x.powf(Dual::constant(3.0));
        assert_relative_eq!(y.re, -8.0);
        assert_relative_eq!(y.eps, 12.0);
    }

    #[test]
    fn nested_dual_gives_second_derivative() {
        // f(x) = x³, f'' = 6x.
        let x = Dual::new(Dual::variable(2.0_f64), Dual::constant(1.0));
        let y = x * x * x;
        assert_relative_eq!(y.re.re, 8.0);
        assert_relative_eq!(y.re.eps, 12.0);
        assert_relative_eq!(y.eps.re, 12.0);
        assert_relative_eq!(y.eps.eps, 12.0);
    }
}
