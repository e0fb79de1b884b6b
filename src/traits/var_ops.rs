use std::ops::{
    Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Rem, RemAssign, Sub, SubAssign,
};

use crate::float::Float;
use crate::tape::TapeThreadLocal;
use crate::var::Var;

// ──────────────────────────────────────────────
//  Var<F> ∘ Var<F>
// ──────────────────────────────────────────────

impl<F: Float + TapeThreadLocal> Add for Var<F> {
    type Output = Self;
    #[inline]
    fn add(self, rhs: Self) -> Self {
        Var::binary(self, rhs, self.value + rhs.value, F::one(), F::one())
    }
}

impl<F: Float + TapeThreadLocal> Sub for Var<F> {
    type Output = Self;
    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Var::binary(self, rhs, self.value - rhs.value, F::one(), -F::one())
    }
}

impl<F: Float + TapeThreadLocal> Mul for Var<F> {
    type Output = Self;
    #[inline]
    fn mul(self, rhs: Self) -> Self {
        Var::binary(self, rhs, self.value * rhs.value, rhs.value, self.value)
    }
}

impl<F: Float + TapeThreadLocal> Div for Var<F> {
    type Output = Self;
    #[inline]
    fn div(self, rhs: Self) -> Self {
        let value = self.value / rhs.value;
        Var::binary(self, rhs, value, F::one() / rhs.value, -value / rhs.value)
    }
}

impl<F: Float + TapeThreadLocal> Neg for Var<F> {
    type Output = Self;
    #[inline]
    fn neg(self) -> Self {
        Var::unary(self, -self.value, -F::one())
    }
}

impl<F: Float + TapeThreadLocal> Rem for Var<F> {
    type Output = Self;
    /// `a % b = a - trunc(a / b) * b`, so the partials are `1` and
    /// `-trunc(a / b)`.
    #[inline]
    fn rem(self, rhs: Self) -> Self {
        let q = (self.value / rhs.value).trunc();
        Var::binary(self, rhs, self.value % rhs.value, F::one(), -q)
    }
}

impl<F: Float + TapeThreadLocal> AddAssign for Var<F> {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl<F: Float + TapeThreadLocal> SubAssign for Var<F> {
    #[inline]
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl<F: Float + TapeThreadLocal> MulAssign for Var<F> {
    #[inline]
    fn mul_assign(&mut self, rhs: Self) {
        *self = *self * rhs;
    }
}

impl<F: Float + TapeThreadLocal> DivAssign for Var<F> {
    #[inline]
    fn div_assign(&mut self, rhs: Self) {
        *self = *self / rhs;
    }
}

impl<F: Float + TapeThreadLocal> RemAssign for Var<F> {
    #[inline]
    fn rem_assign(&mut self, rhs: Self) {
        *self = *self % rhs;
    }
}

// ──────────────────────────────────────────────
//  Var<F> ∘ F and F ∘ Var<F>
// ──────────────────────────────────────────────

// Plain numbers never get a slot, so every mixed operation is unary.
macro_rules! impl_var_scalar_ops {
    ($f:ty) => {
        impl Add<$f> for Var<$f> {
            type Output = Var<$f>;
            #[inline]
            fn add(self, rhs: $f) -> Var<$f> {
                Var::unary(self, self.value + rhs, 1.0)
            }
        }

        impl Add<Var<$f>> for $f {
            type Output = Var<$f>;
            #[inline]
            fn add(self, rhs: Var<$f>) -> Var<$f> {
                Var::unary(rhs, self + rhs.value, 1.0)
            }
        }

        impl Sub<$f> for Var<$f> {
            type Output = Var<$f>;
            #[inline]
            fn sub(self, rhs: $f) -> Var<$f> {
                Var::unary(self, self.value - rhs, 1.0)
            }
        }

        impl Sub<Var<$f>> for $f {
            type Output = Var<$f>;
            #[inline]
            fn sub(self, rhs: Var<$f>) -> Var<$f> {
                Var::unary(rhs, self - rhs.value, -1.0)
            }
        }

        impl Mul<$f> for Var<$f> {
            type Output = Var<$f>;
            #[inline]
            fn mul(self, rhs: $f) -> Var<$f> {
                Var::unary(self, self.value * rhs, rhs)
            }
        }

        impl Mul<Var<$f>> for $f {
            type Output = Var<$f>;
            #[inline]
            fn mul(self, rhs: Var<$f>) -> Var<$f> {
                Var::unary(rhs, self * rhs.value, self)
            }
        }

        impl Div<$f> for Var<$f> {
            type Output = Var<$f>;
            #[inline]
            fn div(self, rhs: $f) -> Var<$f> {
                Var::unary(self, self.value / rhs, 1.0 / rhs)
            }
        }

        impl Div<Var<$f>> for $f {
            type Output = Var<$f>;
            #[inline]
            fn div(self, rhs: Var<$f>) -> Var<$f> {
                let value = self / rhs.value;
                Var::unary(rhs, value, -value / rhs.value)
            }
        }

        impl Rem<$f> for Var<$f> {
            type Output = Var<$f>;
            #[inline]
            fn rem(self, rhs: $f) -> Var<$f> {
                Var::unary(self, self.value % rhs, 1.0)
            }
        }

        impl Rem<Var<$f>> for $f {
            type Output = Var<$f>;
            #[inline]
            fn rem(self, rhs: Var<$f>) -> Var<$f> {
                let q = (self / rhs.value).trunc();
                Var::unary(rhs, self % rhs.value, -q)
            }
        }

        impl AddAssign<$f> for Var<$f> {
            #[inline]
            fn add_assign(&mut self, rhs: $f) {
                *self = *self + rhs;
            }
        }

        impl SubAssign<$f> for Var<$f> {
            #[inline]
            fn sub_assign(&mut self, rhs: $f) {
                *self = *self - rhs;
            }
        }

        impl MulAssign<$f> for Var<$f> {
            #[inline]
            fn mul_assign(&mut self, rhs: $f) {
                *self = *self * rhs;
            }
        }

        impl DivAssign<$f> for Var<$f> {
            #[inline]
            fn div_assign(&mut self, rhs: $f) {
                *self = *self / rhs;
            }
        }

        impl RemAssign<$f> for Var<$f> {
            #[inline]
            fn rem_assign(&mut self, rhs: $f) {
                *self = *self % rhs;
            }
        }

        impl PartialEq<$f> for Var<$f> {
            #[inline]
            fn eq(&self, other: &$f) -> bool {
                self.value == *other
            }
        }

        impl PartialEq<Var<$f>> for $f {
            #[inline]
            fn eq(&self, other: &Var<$f>) -> bool {
                *self == other.value
            }
        }

        impl PartialOrd<$f> for Var<$f> {
            #[inline]
            fn partial_cmp(&self, other: &$f) -> Option<std::cmp::Ordering> {
                self.value.partial_cmp(other)
            }
        }

        impl PartialOrd<Var<$f>> for $f {
            #[inline]
            fn partial_cmp(&self, other: &Var<$f>) -> Option<std::cmp::Ordering> {
                self.partial_cmp(&other.value)
            }
        }
    };
}

impl_var_scalar_ops!(f32);
impl_var_scalar_ops!(f64);

// Comparisons look at forward values only and never touch the tape.

impl<F: Float> PartialEq for Var<F> {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<F: Float> PartialOrd for Var<F> {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        self.value.partial_cmp(&other.value)
    }
}
