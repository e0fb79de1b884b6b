use std::num::FpCategory;

use num_traits::{
    Float as NumFloat, FloatConst, FromPrimitive, Num, NumCast, One, Signed, ToPrimitive, Zero,
};

use crate::float::{abs_derivative, Float};
use crate::tape::TapeThreadLocal;
use crate::var::Var;

impl<F: Float + TapeThreadLocal> Zero for Var<F> {
    #[inline]
    fn zero() -> Self {
        Var::constant(F::zero())
    }
    #[inline]
    fn is_zero(&self) -> bool {
        self.value.is_zero()
    }
}

impl<F: Float + TapeThreadLocal> One for Var<F> {
    #[inline]
    fn one() -> Self {
        Var::constant(F::one())
    }
}

impl<F: Float + TapeThreadLocal> Num for Var<F> {
    type FromStrRadixErr = F::FromStrRadixErr;
    fn from_str_radix(str: &str, radix: u32) -> Result<Self, Self::FromStrRadixErr> {
        F::from_str_radix(str, radix).map(Var::constant)
    }
}

impl<F: Float> FromPrimitive for Var<F> {
    #[inline]
    fn from_i64(n: i64) -> Option<Self> {
        F::from_i64(n).map(Var::constant)
    }
    #[inline]
    fn from_u64(n: u64) -> Option<Self> {
        F::from_u64(n).map(Var::constant)
    }
    #[inline]
    fn from_f32(n: f32) -> Option<Self> {
        F::from_f32(n).map(Var::constant)
    }
    #[inline]
    fn from_f64(n: f64) -> Option<Self> {
        F::from_f64(n).map(Var::constant)
    }
}

impl<F: Float> ToPrimitive for Var<F> {
    #[inline]
    fn to_i64(&self) -> Option<i64> {
        self.value.to_i64()
    }
    #[inline]
    fn to_u64(&self) -> Option<u64> {
        self.value.to_u64()
    }
    #[inline]
    fn to_f32(&self) -> Option<f32> {
        self.value.to_f32()
    }
    #[inline]
    fn to_f64(&self) -> Option<f64> {
        self.value.to_f64()
    }
}

impl<F: Float + TapeThreadLocal> NumCast for Var<F> {
    #[inline]
    fn from<T: ToPrimitive>(n: T) -> Option<Self> {
        <F as NumCast>::from(n).map(Var::constant)
    }
}

impl<F: Float + TapeThreadLocal> Signed for Var<F> {
    #[inline]
    fn abs(&self) -> Self {
        NumFloat::abs(*self)
    }
    #[inline]
    fn abs_sub(&self, other: &Self) -> Self {
        if self.value > other.value {
            *self - *other
        } else {
            Self::zero()
        }
    }
    #[inline]
    fn signum(&self) -> Self {
        NumFloat::signum(*self)
    }
    #[inline]
    fn is_positive(&self) -> bool {
        self.value.is_sign_positive()
    }
    #[inline]
    fn is_negative(&self) -> bool {
        self.value.is_sign_negative()
    }
}

impl<F: Float + TapeThreadLocal> FloatConst for Var<F> {
    fn E() -> Self { Var::constant(F::E()) }
    fn FRAC_1_PI() -> Self { Var::constant(F::FRAC_1_PI()) }
    fn FRAC_1_SQRT_2() -> Self { Var::constant(F::FRAC_1_SQRT_2()) }
    fn FRAC_2_PI() -> Self { Var::constant(F::FRAC_2_PI()) }
    fn FRAC_2_SQRT_PI() -> Self { Var::constant(F::FRAC_2_SQRT_PI()) }
    fn FRAC_PI_2() -> Self { Var::constant(F::FRAC_PI_2()) }
    fn FRAC_PI_3() -> Self { Var::constant(F::FRAC_PI_3()) }
    fn FRAC_PI_4() -> Self { Var::constant(F::FRAC_PI_4()) }
    fn FRAC_PI_6() -> Self { Var::constant(F::FRAC_PI_6()) }
    fn FRAC_PI_8() -> Self { Var::constant(F::FRAC_PI_8()) }
    fn LN_10() -> Self { Var::constant(F::LN_10()) }
    fn LN_2() -> Self { Var::constant(F::LN_2()) }
    fn LOG10_E() -> Self { Var::constant(F::LOG10_E()) }
    fn LOG2_E() -> Self { Var::constant(F::LOG2_E()) }
    fn PI() -> Self { Var::constant(F::PI()) }
    fn SQRT_2() -> Self { Var::constant(F::SQRT_2()) }
    fn TAU() -> Self { Var::constant(F::TAU()) }
    fn LOG10_2() -> Self { Var::constant(F::LOG10_2()) }
    fn LOG2_10() -> Self { Var::constant(F::LOG2_10()) }
}

impl<F: Float + TapeThreadLocal> NumFloat for Var<F> {
    fn nan() -> Self { Var::constant(F::nan()) }
    fn infinity() -> Self { Var::constant(F::infinity()) }
    fn neg_infinity() -> Self { Var::constant(F::neg_infinity()) }
    fn neg_zero() -> Self { Var::constant(F::neg_zero()) }

    fn min_value() -> Self { Var::constant(F::min_value()) }
    fn min_positive_value() -> Self { Var::constant(F::min_positive_value()) }
    fn max_value() -> Self { Var::constant(F::max_value()) }
    fn epsilon() -> Self { Var::constant(F::epsilon()) }

    fn is_nan(self) -> bool { self.value.is_nan() }
    fn is_infinite(self) -> bool { self.value.is_infinite() }
    fn is_finite(self) -> bool { self.value.is_finite() }
    fn is_normal(self) -> bool { self.value.is_normal() }
    fn is_sign_positive(self) -> bool { self.value.is_sign_positive() }
    fn is_sign_negative(self) -> bool { self.value.is_sign_negative() }
    fn classify(self) -> FpCategory { self.value.classify() }

    // Piecewise constant: recorded with a zero partial so a NaN adjoint
    // arriving here still reaches the operand.
    fn floor(self) -> Self { Var::unary(self, self.value.floor(), F::zero()) }
    fn ceil(self) -> Self { Var::unary(self, self.value.ceil(), F::zero()) }
    fn round(self) -> Self { Var::unary(self, self.value.round(), F::zero()) }
    fn trunc(self) -> Self { Var::unary(self, self.value.trunc(), F::zero()) }
    fn signum(self) -> Self { Var::unary(self, self.value.signum(), F::zero()) }

    fn fract(self) -> Self {
        Var::unary(self, self.value.fract(), F::one())
    }

    fn abs(self) -> Self {
        Var::unary(self, self.value.abs(), abs_derivative(self.value))
    }

    fn mul_add(self, a: Self, b: Self) -> Self {
        // d(x*a + b) = (a, x, 1)
        Var::ternary(
            self,
            a,
            b,
            self.value.mul_add(a.value, b.value),
            a.value,
            self.value,
            F::one(),
        )
    }

    fn recip(self) -> Self {
        let inv = F::one() / self.value;
        Var::unary(self, inv, -inv * inv)
    }

    fn powi(self, n: i32) -> Self {
        let val = self.value.powi(n);
        let deriv = if n == 0 {
            F::zero()
        } else {
            F::lit(<f64 as From<i32>>::from(n)) * self.value.powi(n - 1)
        };
        Var::unary(self, val, deriv)
    }

    fn powf(self, n: Self) -> Self {
        let val = self.value.powf(n.value);
        let dx = if n.value.is_zero() {
            F::zero()
        } else {
            n.value * self.value.powf(n.value - F::one())
        };
        // Only evaluate ln(x) when the exponent is live: it is NaN for x < 0.
        let dy = if n.is_constant() {
            F::zero()
        } else {
            val * self.value.ln()
        };
        Var::binary(self, n, val, dx, dy)
    }

    fn sqrt(self) -> Self {
        let s = self.value.sqrt();
        Var::unary(self, s, F::one() / (F::lit(2.0) * s))
    }

    fn cbrt(self) -> Self {
        let c = self.value.cbrt();
        Var::unary(self, c, F::one() / (F::lit(3.0) * c * c))
    }

    fn exp(self) -> Self {
        let e = self.value.exp();
        Var::unary(self, e, e)
    }

    fn exp2(self) -> Self {
        let e = self.value.exp2();
        Var::unary(self, e, e * F::LN_2())
    }

    fn exp_m1(self) -> Self {
        Var::unary(self, self.value.exp_m1(), self.value.exp())
    }

    fn ln(self) -> Self {
        Var::unary(self, self.value.ln(), F::one() / self.value)
    }

    fn log2(self) -> Self {
        Var::unary(self, self.value.log2(), F::one() / (self.value * F::LN_2()))
    }

    fn log10(self) -> Self {
        Var::unary(self, self.value.log10(), F::one() / (self.value * F::LN_10()))
    }

    fn ln_1p(self) -> Self {
        Var::unary(self, self.value.ln_1p(), F::one() / (F::one() + self.value))
    }

    fn log(self, base: Self) -> Self {
        // log_b(x) = ln x / ln b
        let ln_x = self.value.ln();
        let ln_b = base.value.ln();
        let val = ln_x / ln_b;
        let dx = F::one() / (self.value * ln_b);
        let db = -val / (base.value * ln_b);
        Var::binary(self, base, val, dx, db)
    }

    fn sin(self) -> Self {
        Var::unary(self, self.value.sin(), self.value.cos())
    }

    fn cos(self) -> Self {
        Var::unary(self, self.value.cos(), -self.value.sin())
    }

    fn tan(self) -> Self {
        let c = self.value.cos();
        Var::unary(self, self.value.tan(), F::one() / (c * c))
    }

    fn sin_cos(self) -> (Self, Self) {
        let (s, c) = self.value.sin_cos();
        (Var::unary(self, s, c), Var::unary(self, c, -s))
    }

    fn asin(self) -> Self {
        Var::unary(
            self,
            self.value.asin(),
            F::one() / (F::one() - self.value * self.value).sqrt(),
        )
    }

    fn acos(self) -> Self {
        Var::unary(
            self,
            self.value.acos(),
            -F::one() / (F::one() - self.value * self.value).sqrt(),
        )
    }

    fn atan(self) -> Self {
        Var::unary(
            self,
            self.value.atan(),
            F::one() / (F::one() + self.value * self.value),
        )
    }

    fn atan2(self, other: Self) -> Self {
        let denom = self.value * self.value + other.value * other.value;
        let dy = other.value / denom;
        let dx = -self.value / denom;
        Var::binary(self, other, self.value.atan2(other.value), dy, dx)
    }

    fn sinh(self) -> Self {
        Var::unary(self, self.value.sinh(), self.value.cosh())
    }

    fn cosh(self) -> Self {
        Var::unary(self, self.value.cosh(), self.value.sinh())
    }

    fn tanh(self) -> Self {
        let t = self.value.tanh();
        Var::unary(self, t, F::one() - t * t)
    }

    fn asinh(self) -> Self {
        Var::unary(
            self,
            self.value.asinh(),
            F::one() / (self.value * self.value + F::one()).sqrt(),
        )
    }

    fn acosh(self) -> Self {
        Var::unary(
            self,
            self.value.acosh(),
            F::one() / (self.value * self.value - F::one()).sqrt(),
        )
    }

    fn atanh(self) -> Self {
        Var::unary(
            self,
            self.value.atanh(),
            F::one() / (F::one() - self.value * self.value),
        )
    }

    fn hypot(self, other: Self) -> Self {
        let h = self.value.hypot(other.value);
        Var::binary(self, other, h, self.value / h, other.value / h)
    }

    fn max(self, other: Self) -> Self {
        if self.value >= other.value || other.value.is_nan() {
            Var::unary(self, self.value, F::one())
        } else {
            Var::unary(other, other.value, F::one())
        }
    }

    fn min(self, other: Self) -> Self {
        if self.value <= other.value || other.value.is_nan() {
            Var::unary(self, self.value, F::one())
        } else {
            Var::unary(other, other.value, F::one())
        }
    }

    fn abs_sub(self, other: Self) -> Self {
        if self.value > other.value {
            self - other
        } else {
            Self::zero()
        }
    }

    fn integer_decode(self) -> (u64, i16, i8) {
        self.value.integer_decode()
    }

    fn to_degrees(self) -> Self {
        let factor = F::lit(180.0) / F::PI();
        Var::unary(self, self.value.to_degrees(), factor)
    }

    fn to_radians(self) -> Self {
        let factor = F::PI() / F::lit(180.0);
        Var::unary(self, self.value.to_radians(), factor)
    }
}
