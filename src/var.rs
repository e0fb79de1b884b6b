use std::fmt::{self, Display};

use crate::node::CONSTANT;
use crate::tape::{self, Tape, TapeThreadLocal};
use crate::Float;

/// Reverse-mode differentiable scalar.
///
/// A value and a slot index on the thread's active [`Tape`]. `Copy` because
/// the tape owns the node; any number of handles may alias one slot.
///
/// `value` is the forward value at the time the handle was taken. A handle
/// whose index is [`CONSTANT`] is a lifted plain number: it is never recorded
/// and contributes no operand to the nodes it feeds.
///
/// Compound assignment (`x += y`) rebinds `x` to a new node. Expressions built
/// from the old `x` keep referring to the old node.
#[derive(Clone, Copy, Debug)]
pub struct Var<F: Float> {
    pub(crate) value: F,
    pub(crate) index: u32,
}

impl<F: Float> Var<F> {
    /// Create a constant (not tracked on the tape).
    #[inline]
    pub fn constant(value: F) -> Self {
        Var {
            value,
            index: CONSTANT,
        }
    }

    /// Wrap an existing slot. Typically only used by the API layer and tests.
    #[inline]
    pub fn from_tape(value: F, index: u32) -> Self {
        Var { value, index }
    }

    /// Forward value.
    #[inline]
    pub fn value(&self) -> F {
        self.value
    }

    /// Slot index on the tape, or [`CONSTANT`].
    #[inline]
    pub fn index(&self) -> u32 {
        self.index
    }

    #[inline]
    pub fn is_constant(&self) -> bool {
        self.index == CONSTANT
    }
}

impl<F: Float + TapeThreadLocal> Var<F> {
    /// Register an independent input on the active tape.
    ///
    /// # Panics
    ///
    /// Panics if no tape is active on this thread.
    #[inline]
    pub fn new(value: F) -> Self {
        let index = tape::with_active_tape(|t: &mut Tape<F>| t.new_variable(value));
        Var { value, index }
    }

    /// Adjoint left on this handle's slot by the last backward sweep.
    pub fn adjoint(&self) -> F {
        if self.is_constant() {
            return F::zero();
        }
        tape::with_active_tape(|t: &mut Tape<F>| t.adjoint(self.index))
    }

    /// Record `value = f(x)` with `df/dx = dx`.
    #[inline]
    pub(crate) fn unary(x: Self, value: F, dx: F) -> Self {
        if x.is_constant() {
            return Var::constant(value);
        }
        let index = tape::with_active_tape(|t: &mut Tape<F>| t.push_unary(value, x.index, dx));
        Var { value, index }
    }

    /// Record `value = f(x, y)` with partials `dx`, `dy`.
    #[inline]
    pub(crate) fn binary(x: Self, y: Self, value: F, dx: F, dy: F) -> Self {
        if x.is_constant() && y.is_constant() {
            return Var::constant(value);
        }
        let index = tape::with_active_tape(|t: &mut Tape<F>| {
            t.push_binary(value, x.index, dx, y.index, dy)
        });
        Var { value, index }
    }

    /// Record `value = f(x, y, z)` with partials `dx`, `dy`, `dz`.
    #[inline]
    pub(crate) fn ternary(x: Self, y: Self, z: Self, value: F, dx: F, dy: F, dz: F) -> Self {
        if x.is_constant() && y.is_constant() && z.is_constant() {
            return Var::constant(value);
        }
        let index = tape::with_active_tape(|t: &mut Tape<F>| {
            t.push_ternary(value, x.index, dx, y.index, dy, z.index, dz)
        });
        Var { value, index }
    }

    /// Build one node from caller-supplied partials: `value` with
    /// `d value / d operands[i] = partials[i]`.
    ///
    /// This is the hook for density and reduction code that knows its
    /// gradient in closed form and wants a single tape entry for it.
    ///
    /// # Panics
    ///
    /// Panics if the slices differ in length.
    pub fn from_partials(value: F, operands: &[Var<F>], partials: &[F]) -> Self {
        assert_eq!(
            operands.len(),
            partials.len(),
            "operands and partials must have the same length"
        );
        if operands.iter().all(Var::is_constant) {
            return Var::constant(value);
        }
        let indices: Vec<u32> = operands.iter().map(|v| v.index).collect();
        let index =
            tape::with_active_tape(|t: &mut Tape<F>| t.push_nary(value, &indices, partials, &[]));
        Var { value, index }
    }
}

/// Free-function form of [`Var::from_partials`].
pub fn precomputed_gradients<F: Float + TapeThreadLocal>(
    value: F,
    operands: &[Var<F>],
    partials: &[F],
) -> Var<F> {
    Var::from_partials(value, operands, partials)
}

impl<F: Float> Display for Var<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl<F: Float> Default for Var<F> {
    fn default() -> Self {
        Var::constant(F::zero())
    }
}
