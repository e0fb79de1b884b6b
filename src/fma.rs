//! Fused multiply-add over every mix of handles and plain numbers.
//!
//! `fma(x, y, z) = x·y + z` rounded once, with partials `(y, x, 1)`. A plain
//! number in any position contributes no operand, so the recorded node is
//! ternary, binary or unary depending on the argument types at the call site,
//! and nothing at all is recorded when every argument is a number.

use crate::dual::Dual;
use crate::float::Float;
use crate::scalar::Scalar;
use crate::tape::TapeThreadLocal;
use crate::var::Var;

/// `self · y + z` with a single rounding.
pub trait Fma<Y, Z> {
    type Output;
    fn fma(self, y: Y, z: Z) -> Self::Output;
}

/// Free-function form of [`Fma::fma`].
///
/// ```
/// use numbat::{fma, Tape, TapeGuard, Var};
///
/// let mut tape = Tape::<f64>::new();
/// let _guard = TapeGuard::new(&mut tape);
/// let x = Var::<f64>::new(2.0);
/// let z = Var::<f64>::new(1.0);
/// let r = fma(x, 3.0, z);
/// assert_eq!(r.value(), 7.0);
/// assert_eq!(numbat::gradient(r, &[x, z]), vec![3.0, 1.0]);
/// ```
#[inline]
pub fn fma<X: Fma<Y, Z>, Y, Z>(x: X, y: Y, z: Z) -> X::Output {
    x.fma(y, z)
}

#[inline]
fn record<F: Float + TapeThreadLocal>(x: Var<F>, y: Var<F>, z: Var<F>) -> Var<F> {
    Var::ternary(
        x,
        y,
        z,
        x.value.mul_add(y.value, z.value),
        y.value,
        x.value,
        F::one(),
    )
}

macro_rules! impl_fma {
    (@one $f:ty, $x:ty, $y:ty, $z:ty) => {
        impl Fma<$y, $z> for $x {
            type Output = Var<$f>;
            #[inline]
            fn fma(self, y: $y, z: $z) -> Var<$f> {
                record(
                    <$x as Lift<$f>>::lift(self),
                    <$y as Lift<$f>>::lift(y),
                    <$z as Lift<$f>>::lift(z),
                )
            }
        }
    };
    ($f:ty) => {
        impl_fma!(@one $f, Var<$f>, Var<$f>, Var<$f>);
        impl_fma!(@one $f, Var<$f>, Var<$f>, $f);
        impl_fma!(@one $f, Var<$f>, $f, Var<$f>);
        impl_fma!(@one $f, Var<$f>, $f, $f);
        impl_fma!(@one $f, $f, Var<$f>, Var<$f>);
        impl_fma!(@one $f, $f, Var<$f>, $f);
        impl_fma!(@one $f, $f, $f, Var<$f>);
    };
}

/// Lift a handle or number to a handle; numbers become constants.
trait Lift<F: Float> {
    fn lift(self) -> Var<F>;
}

impl<F: Float> Lift<F> for Var<F> {
    #[inline]
    fn lift(self) -> Var<F> {
        self
    }
}

impl Lift<f32> for f32 {
    #[inline]
    fn lift(self) -> Var<f32> {
        Var::constant(self)
    }
}

impl Lift<f64> for f64 {
    #[inline]
    fn lift(self) -> Var<f64> {
        Var::constant(self)
    }
}

impl_fma!(f32);
impl_fma!(f64);

impl Fma<f32, f32> for f32 {
    type Output = f32;
    #[inline]
    fn fma(self, y: f32, z: f32) -> f32 {
        self.mul_add(y, z)
    }
}

impl Fma<f64, f64> for f64 {
    type Output = f64;
    #[inline]
    fn fma(self, y: f64, z: f64) -> f64 {
        self.mul_add(y, z)
    }
}

impl<T: Scalar> Fma<Dual<T>, Dual<T>> for Dual<T> {
    type Output = Dual<T>;
    #[inline]
    fn fma(self, y: Dual<T>, z: Dual<T>) -> Dual<T> {
        self.mul_add(y, z)
    }
}
