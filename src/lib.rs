//! Tape-based automatic differentiation.
//!
//! Reverse mode records every operation on [`Var`] handles onto a
//! thread-local, arena-backed [`Tape`]; forward mode propagates tangents
//! through [`Dual`] numbers. Nesting `Dual` over `Var` yields Hessians and
//! third derivatives.
//!
//! ```
//! use numbat::{Tape, TapeGuard, Var};
//!
//! let mut tape = Tape::<f64>::new();
//! let _guard = TapeGuard::new(&mut tape);
//! let x = Var::<f64>::new(2.5);
//! let y = x * x + 3.0 * x;
//! assert_eq!(y.value(), 13.75);
//! assert_eq!(numbat::gradient(y, &[x]), vec![8.0]);
//! ```

pub mod api;
pub mod arena;
pub mod dual;
pub mod error;
pub mod float;
pub mod fma;
pub mod functions;
pub mod node;
pub mod scalar;
pub mod tape;
mod traits;
pub mod var;
pub mod vector;

pub use api::{
    derivative, finite_diff_gradient, grad, grad_hessian, gradient, hessian, hvp, jacobian, jvp,
    third_derivative, value_and_gradient, vjp, Evaluator, ThirdOrder,
};
#[cfg(feature = "parallel")]
pub use api::par_gradients;
pub use dual::Dual;
pub use error::{Error, Result};
pub use float::Float;
pub use fma::{fma, Fma};
pub use scalar::Scalar;
pub use tape::{NestedGuard, Tape, TapeConfig, TapeGuard, TapeStats};
pub use var::{precomputed_gradients, Var};
pub use vector::VarVec;

/// Type alias for forward-mode dual numbers over `f64`.
pub type Dual64 = Dual<f64>;
/// Type alias for forward-mode dual numbers over `f32`.
pub type Dual32 = Dual<f32>;
/// Type alias for reverse-mode variables over `f64`.
pub type Var64 = Var<f64>;
/// Type alias for reverse-mode variables over `f32`.
pub type Var32 = Var<f32>;
