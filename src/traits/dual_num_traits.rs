use std::num::FpCategory;

use num_traits::{
    Float as NumFloat, FloatConst, FromPrimitive, Num, NumCast, One, Signed, ToPrimitive, Zero,
};

use crate::dual::Dual;
use crate::scalar::Scalar;

impl<T: Scalar> Zero for Dual<T> {
    #[inline]
    fn zero() -> Self {
        Dual::constant(T::zero())
    }
    #[inline]
    fn is_zero(&self) -> bool {
        self.re.is_zero()
    }
}

impl<T: Scalar> One for Dual<T> {
    #[inline]
    fn one() -> Self {
        Dual::constant(T::one())
    }
}

impl<T: Scalar> Num for Dual<T> {
    type FromStrRadixErr = T::FromStrRadixErr;
    fn from_str_radix(str: &str, radix: u32) -> Result<Self, Self::FromStrRadixErr> {
        T::from_str_radix(str, radix).map(Dual::constant)
    }
}

impl<T: Scalar> FromPrimitive for Dual<T> {
    #[inline]
    fn from_i64(n: i64) -> Option<Self> {
        T::from_i64(n).map(Dual::constant)
    }
    #[inline]
    fn from_u64(n: u64) -> Option<Self> {
        T::from_u64(n).map(Dual::constant)
    }
    #[inline]
    fn from_f32(n: f32) -> Option<Self> {
        T::from_f32(n).map(Dual::constant)
    }
    #[inline]
    fn from_f64(n: f64) -> Option<Self> {
        T::from_f64(n).map(Dual::constant)
    }
}

impl<T: Scalar> ToPrimitive for Dual<T> {
    #[inline]
    fn to_i64(&self) -> Option<i64> {
        self.re.to_i64()
    }
    #[inline]
    fn to_u64(&self) -> Option<u64> {
        self.re.to_u64()
    }
    #[inline]
    fn to_f32(&self) -> Option<f32> {
        self.re.to_f32()
    }
    #[inline]
    fn to_f64(&self) -> Option<f64> {
        self.re.to_f64()
    }
}

impl<T: Scalar> NumCast for Dual<T> {
    #[inline]
    fn from<N: ToPrimitive>(n: N) -> Option<Self> {
        <T as NumCast>::from(n).map(Dual::constant)
    }
}

impl<T: Scalar> Signed for Dual<T> {
    #[inline]
    fn abs(&self) -> Self {
        Dual::abs(*self)
    }
    #[inline]
    fn abs_sub(&self, other: &Self) -> Self {
        if self.re > other.re {
            *self - *other
        } else {
            Self::zero()
        }
    }
    #[inline]
    fn signum(&self) -> Self {
        Dual::signum(*self)
    }
    #[inline]
    fn is_positive(&self) -> bool {
        self.re.is_sign_positive()
    }
    #[inline]
    fn is_negative(&self) -> bool {
        self.re.is_sign_negative()
    }
}

impl<T: Scalar> FloatConst for Dual<T> {
    fn E() -> Self { Dual::constant(T::E()) }
    fn FRAC_1_PI() -> Self { Dual::constant(T::FRAC_1_PI()) }
    fn FRAC_1_SQRT_2() -> Self { Dual::constant(T::FRAC_1_SQRT_2()) }
    fn FRAC_2_PI() -> Self { Dual::constant(T::FRAC_2_PI()) }
    fn FRAC_2_SQRT_PI() -> Self { Dual::constant(T::FRAC_2_SQRT_PI()) }
    fn FRAC_PI_2() -> Self { Dual::constant(T::FRAC_PI_2()) }
    fn FRAC_PI_3() -> Self { Dual::constant(T::FRAC_PI_3()) }
    fn FRAC_PI_4() -> Self { Dual::constant(T::FRAC_PI_4()) }
    fn FRAC_PI_6() -> Self { Dual::constant(T::FRAC_PI_6()) }
    fn FRAC_PI_8() -> Self { Dual::constant(T::FRAC_PI_8()) }
    fn LN_10() -> Self { Dual::constant(T::LN_10()) }
    fn LN_2() -> Self { Dual::constant(T::LN_2()) }
    fn LOG10_E() -> Self { Dual::constant(T::LOG10_E()) }
    fn LOG2_E() -> Self { Dual::constant(T::LOG2_E()) }
    fn PI() -> Self { Dual::constant(T::PI()) }
    fn SQRT_2() -> Self { Dual::constant(T::SQRT_2()) }
    fn TAU() -> Self { Dual::constant(T::TAU()) }
    fn LOG10_2() -> Self { Dual::constant(T::LOG10_2()) }
    fn LOG2_10() -> Self { Dual::constant(T::LOG2_10()) }
}

impl<T: Scalar> NumFloat for Dual<T> {
    fn nan() -> Self { Dual::constant(T::nan()) }
    fn infinity() -> Self { Dual::constant(T::infinity()) }
    fn neg_infinity() -> Self { Dual::constant(T::neg_infinity()) }
    fn neg_zero() -> Self { Dual::constant(T::neg_zero()) }

    fn min_value() -> Self { Dual::constant(T::min_value()) }
    fn min_positive_value() -> Self { Dual::constant(T::min_positive_value()) }
    fn max_value() -> Self { Dual::constant(T::max_value()) }
    fn epsilon() -> Self { Dual::constant(T::epsilon()) }

    fn is_nan(self) -> bool { self.re.is_nan() }
    fn is_infinite(self) -> bool { self.re.is_infinite() }
    fn is_finite(self) -> bool { self.re.is_finite() }
    fn is_normal(self) -> bool { self.re.is_normal() }
    fn is_sign_positive(self) -> bool { self.re.is_sign_positive() }
    fn is_sign_negative(self) -> bool { self.re.is_sign_negative() }
    fn classify(self) -> FpCategory { self.re.classify() }

    fn floor(self) -> Self { Dual::floor(self) }
    fn ceil(self) -> Self { Dual::ceil(self) }
    fn round(self) -> Self { Dual::round(self) }
    fn trunc(self) -> Self { Dual::trunc(self) }
    fn fract(self) -> Self { Dual::fract(self) }
    fn abs(self) -> Self { Dual::abs(self) }
    fn signum(self) -> Self { Dual::signum(self) }

    fn mul_add(self, a: Self, b: Self) -> Self { Dual::mul_add(self, a, b) }

    fn recip(self) -> Self { Dual::recip(self) }
    fn powi(self, n: i32) -> Self { Dual::powi(self, n) }
    fn powf(self, n: Self) -> Self { Dual::powf(self, n) }
    fn sqrt(self) -> Self { Dual::sqrt(self) }
    fn cbrt(self) -> Self { Dual::cbrt(self) }

    fn exp(self) -> Self { Dual::exp(self) }
    fn exp2(self) -> Self { Dual::exp2(self) }
    fn exp_m1(self) -> Self { Dual::exp_m1(self) }
    fn ln(self) -> Self { Dual::ln(self) }
    fn log2(self) -> Self { Dual::log2(self) }
    fn log10(self) -> Self { Dual::log10(self) }
    fn ln_1p(self) -> Self { Dual::ln_1p(self) }
    fn log(self, base: Self) -> Self { Dual::log(self, base) }

    fn sin(self) -> Self { Dual::sin(self) }
    fn cos(self) -> Self { Dual::cos(self) }
    fn tan(self) -> Self { Dual::tan(self) }
    fn sin_cos(self) -> (Self, Self) { Dual::sin_cos(self) }
    fn asin(self) -> Self { Dual::asin(self) }
    fn acos(self) -> Self { Dual::acos(self) }
    fn atan(self) -> Self { Dual::atan(self) }
    fn atan2(self, other: Self) -> Self { Dual::atan2(self, other) }

    fn sinh(self) -> Self { Dual::sinh(self) }
    fn cosh(self) -> Self { Dual::cosh(self) }
    fn tanh(self) -> Self { Dual::tanh(self) }
    fn asinh(self) -> Self { Dual::asinh(self) }
    fn acosh(self) -> Self { Dual::acosh(self) }
    fn atanh(self) -> Self { Dual::atanh(self) }

    fn hypot(self, other: Self) -> Self { Dual::hypot(self, other) }

    fn max(self, other: Self) -> Self { Dual::max(self, other) }
    fn min(self, other: Self) -> Self { Dual::min(self, other) }

    fn abs_sub(self, other: Self) -> Self {
        if self.re > other.re { self - other } else { Self::zero() }
    }

    fn integer_decode(self) -> (u64, i16, i8) { self.re.integer_decode() }

    fn to_degrees(self) -> Self {
        let factor = T::lit(180.0) / T::PI();
        Dual { re: self.re.to_degrees(), eps: self.eps * factor }
    }

    fn to_radians(self) -> Self {
        let factor = T::PI() / T::lit(180.0);
        Dual { re: self.re.to_radians(), eps: self.eps * factor }
    }
}
