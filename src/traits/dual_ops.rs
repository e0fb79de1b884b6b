use std::ops::{
    Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Rem, RemAssign, Sub, SubAssign,
};

use crate::dual::Dual;
use crate::scalar::Scalar;

// ──────────────────────────────────────────────
//  Dual<T> ∘ Dual<T>
// ──────────────────────────────────────────────

impl<T: Scalar> Add for Dual<T> {
    type Output = Self;
    #[inline]
    fn add(self, rhs: Self) -> Self {
        Dual {
            re: self.re + rhs.re,
            eps: self.eps + rhs.eps,
        }
    }
}

impl<T: Scalar> Sub for Dual<T> {
    type Output = Self;
    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Dual {
            re: self.re - rhs.re,
            eps: self.eps - rhs.eps,
        }
    }
}

impl<T: Scalar> Mul for Dual<T> {
    type Output = Self;
    #[inline]
    fn mul(self, rhs: Self) -> Self {
        Dual {
            re: self.re * rhs.re,
            eps: self.re * rhs.eps + self.eps * rhs.re,
        }
    }
}

impl<T: Scalar> Div for Dual<T> {
    type Output = Self;
    #[inline]
    fn div(self, rhs: Self) -> Self {
        let re = self.re / rhs.re;
        Dual {
            re,
            eps: (self.eps - re * rhs.eps) / rhs.re,
        }
    }
}

impl<T: Scalar> Neg for Dual<T> {
    type Output = Self;
    #[inline]
    fn neg(self) -> Self {
        Dual {
            re: -self.re,
            eps: -self.eps,
        }
    }
}

impl<T: Scalar> Rem for Dual<T> {
    type Output = Self;
    #[inline]
    fn rem(self, rhs: Self) -> Self {
        let q = (self.re / rhs.re).trunc();
        Dual {
            re: self.re % rhs.re,
            eps: self.eps - q * rhs.eps,
        }
    }
}

impl<T: Scalar> AddAssign for Dual<T> {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl<T: Scalar> SubAssign for Dual<T> {
    #[inline]
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl<T: Scalar> MulAssign for Dual<T> {
    #[inline]
    fn mul_assign(&mut self, rhs: Self) {
        *self = *self * rhs;
    }
}

impl<T: Scalar> DivAssign for Dual<T> {
    #[inline]
    fn div_assign(&mut self, rhs: Self) {
        *self = *self / rhs;
    }
}

impl<T: Scalar> RemAssign for Dual<T> {
    #[inline]
    fn rem_assign(&mut self, rhs: Self) {
        *self = *self % rhs;
    }
}

// ──────────────────────────────────────────────
//  Dual<T> ∘ primitive, at any nesting depth
// ──────────────────────────────────────────────

// The plain number is lifted with `from_f`, so on a tape-backed `T` it adds
// no operand to the recorded node.
macro_rules! impl_dual_scalar_ops {
    ($f:ty) => {
        impl<T: Scalar<Float = $f>> Add<$f> for Dual<T> {
            type Output = Dual<T>;
            #[inline]
            fn add(self, rhs: $f) -> Dual<T> {
                Dual {
                    re: self.re + T::from_f(rhs),
                    eps: self.eps,
                }
            }
        }

        impl<T: Scalar<Float = $f>> Add<Dual<T>> for $f {
            type Output = Dual<T>;
            #[inline]
            fn add(self, rhs: Dual<T>) -> Dual<T> {
                Dual {
                    re: T::from_f(self) + rhs.re,
                    eps: rhs.eps,
                }
            }
        }

        impl<T: Scalar<Float = $f>> Sub<$f> for Dual<T> {
            type Output = Dual<T>;
            #[inline]
            fn sub(self, rhs: $f) -> Dual<T> {
                Dual {
                    re: self.re - T::from_f(rhs),
                    eps: self.eps,
                }
            }
        }

        impl<T: Scalar<Float = $f>> Sub<Dual<T>> for $f {
            type Output = Dual<T>;
            #[inline]
            fn sub(self, rhs: Dual<T>) -> Dual<T> {
                Dual {
                    re: T::from_f(self) - rhs.re,
                    eps: -rhs.eps,
                }
            }
        }

        impl<T: Scalar<Float = $f>> Mul<$f> for Dual<T> {
            type Output = Dual<T>;
            #[inline]
            fn mul(self, rhs: $f) -> Dual<T> {
                let k = T::from_f(rhs);
                Dual {
                    re: self.re * k,
                    eps: self.eps * k,
                }
            }
        }

        impl<T: Scalar<Float = $f>> Mul<Dual<T>> for $f {
            type Output = Dual<T>;
            #[inline]
            fn mul(self, rhs: Dual<T>) -> Dual<T> {
                let k = T::from_f(self);
                Dual {
                    re: k * rhs.re,
                    eps: k * rhs.eps,
                }
            }
        }

        impl<T: Scalar<Float = $f>> Div<$f> for Dual<T> {
            type Output = Dual<T>;
            #[inline]
            fn div(self, rhs: $f) -> Dual<T> {
                let k = T::from_f(rhs);
                Dual {
                    re: self.re / k,
                    eps: self.eps / k,
                }
            }
        }

        impl<T: Scalar<Float = $f>> Div<Dual<T>> for $f {
            type Output = Dual<T>;
            #[inline]
            fn div(self, rhs: Dual<T>) -> Dual<T> {
                let re = T::from_f(self) / rhs.re;
                Dual {
                    re,
                    eps: -re * rhs.eps / rhs.re,
                }
            }
        }

        impl<T: Scalar<Float = $f>> Rem<$f> for Dual<T> {
            type Output = Dual<T>;
            #[inline]
            fn rem(self, rhs: $f) -> Dual<T> {
                Dual {
                    re: self.re % T::from_f(rhs),
                    eps: self.eps,
                }
            }
        }

        impl<T: Scalar<Float = $f>> Rem<Dual<T>> for $f {
            type Output = Dual<T>;
            #[inline]
            fn rem(self, rhs: Dual<T>) -> Dual<T> {
                let a = T::from_f(self);
                let q = (a / rhs.re).trunc();
                Dual {
                    re: a % rhs.re,
                    eps: -q * rhs.eps,
                }
            }
        }

        impl<T: Scalar<Float = $f>> AddAssign<$f> for Dual<T> {
            #[inline]
            fn add_assign(&mut self, rhs: $f) {
                *self = *self + rhs;
            }
        }

        impl<T: Scalar<Float = $f>> SubAssign<$f> for Dual<T> {
            #[inline]
            fn sub_assign(&mut self, rhs: $f) {
                *self = *self - rhs;
            }
        }

        impl<T: Scalar<Float = $f>> MulAssign<$f> for Dual<T> {
            #[inline]
            fn mul_assign(&mut self, rhs: $f) {
                *self = *self * rhs;
            }
        }

        impl<T: Scalar<Float = $f>> DivAssign<$f> for Dual<T> {
            #[inline]
            fn div_assign(&mut self, rhs: $f) {
                *self = *self / rhs;
            }
        }

        impl<T: Scalar<Float = $f>> PartialEq<$f> for Dual<T> {
            #[inline]
            fn eq(&self, other: &$f) -> bool {
                self.value() == *other
            }
        }

        impl<T: Scalar<Float = $f>> PartialEq<Dual<T>> for $f {
            #[inline]
            fn eq(&self, other: &Dual<T>) -> bool {
                *self == other.value()
            }
        }

        impl<T: Scalar<Float = $f>> PartialOrd<$f> for Dual<T> {
            #[inline]
            fn partial_cmp(&self, other: &$f) -> Option<std::cmp::Ordering> {
                self.value().partial_cmp(other)
            }
        }

        impl<T: Scalar<Float = $f>> PartialOrd<Dual<T>> for $f {
            #[inline]
            fn partial_cmp(&self, other: &Dual<T>) -> Option<std::cmp::Ordering> {
                self.partial_cmp(&other.value())
            }
        }
    };
}

impl_dual_scalar_ops!(f32);
impl_dual_scalar_ops!(f64);

impl<T: Scalar> PartialEq for Dual<T> {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.re == other.re
    }
}

impl<T: Scalar> PartialOrd for Dual<T> {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        self.re.partial_cmp(&other.re)
    }
}
