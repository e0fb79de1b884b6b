//! Closure-based drivers.
//!
//! Each reverse-mode driver builds a fresh tape (or reuses the one owned by
//! an [`Evaluator`]), activates it for the duration of the closure and reads
//! the adjoints back. Higher orders nest [`Dual`] over [`Var`] and sweep once
//! per direction inside a nested context, so every direction starts from the
//! same recorded inputs.

use crate::dual::Dual;
use crate::float::Float;
use crate::scalar::Scalar;
use crate::tape::{self, NestedGuard, Tape, TapeConfig, TapeGuard, TapeStats, TapeThreadLocal};
use crate::var::Var;

/// Gradient of `output` with respect to `inputs` on the active tape.
///
/// Sweeps only the innermost open context. Constant inputs get 0.
pub fn gradient<F: Float + TapeThreadLocal>(output: Var<F>, inputs: &[Var<F>]) -> Vec<F> {
    let indices: Vec<u32> = inputs.iter().map(|v| v.index).collect();
    tape::with_active_tape(|t: &mut Tape<F>| t.gradient(output.index, &indices))
}

fn record_inputs<F: Float + TapeThreadLocal>(tape: &mut Tape<F>, x: &[F]) -> Vec<Var<F>> {
    let span = tape.new_variables(x);
    span.indices()
        .zip(x)
        .map(|(i, &v)| Var::from_tape(v, i))
        .collect()
}

/// Compute the gradient of a scalar function `f : R^n → R` using reverse mode.
///
/// ```
/// let g = numbat::grad(|x: &[numbat::Var<f64>]| {
///     x[0] * x[0] + x[1] * x[1]
/// }, &[3.0, 4.0]);
/// assert!((g[0] - 6.0).abs() < 1e-10);
/// assert!((g[1] - 8.0).abs() < 1e-10);
/// ```
pub fn grad<F: Float + TapeThreadLocal>(f: impl FnOnce(&[Var<F>]) -> Var<F>, x: &[F]) -> Vec<F> {
    value_and_gradient(f, x).1
}

/// `(f(x), ∇f(x))` in one forward and one reverse pass.
pub fn value_and_gradient<F: Float + TapeThreadLocal>(
    f: impl FnOnce(&[Var<F>]) -> Var<F>,
    x: &[F],
) -> (F, Vec<F>) {
    let mut tape = Tape::with_capacity(x.len() * 10);
    let inputs = record_inputs(&mut tape, x);
    let _guard = TapeGuard::new(&mut tape);
    let output = f(&inputs);
    (output.value, gradient(output, &inputs))
}

/// Vector-Jacobian product (reverse mode): `(f(x), wᵀ·J)`.
///
/// The weighted outputs are folded into one node and swept once.
pub fn vjp<F: Float + TapeThreadLocal>(
    f: impl FnOnce(&[Var<F>]) -> Vec<Var<F>>,
    x: &[F],
    w: &[F],
) -> (Vec<F>, Vec<F>) {
    let mut tape = Tape::with_capacity(x.len() * 10);
    let inputs = record_inputs(&mut tape, x);
    let _guard = TapeGuard::new(&mut tape);
    let outputs = f(&inputs);

    assert_eq!(
        outputs.len(),
        w.len(),
        "output length must match weight vector length"
    );

    let values: Vec<F> = outputs.iter().map(|r| r.value).collect();
    let total = values
        .iter()
        .zip(w)
        .fold(F::zero(), |acc, (&y, &wi)| acc + wi * y);
    let seed = Var::from_partials(total, &outputs, w);
    (values, gradient(seed, &inputs))
}

/// Derivative of a univariate function in forward mode: `(f(x), f'(x))`.
pub fn derivative<T: Scalar>(f: impl FnOnce(Dual<T>) -> Dual<T>, x: T) -> (T, T) {
    let y = f(Dual::variable(x));
    (y.re, y.eps)
}

/// Jacobian-vector product (forward mode): `(f(x), J·v)`.
///
/// Evaluates `f` at `x` and computes the directional derivative in direction `v`.
pub fn jvp<T: Scalar>(
    f: impl Fn(&[Dual<T>]) -> Vec<Dual<T>>,
    x: &[T],
    v: &[T],
) -> (Vec<T>, Vec<T>) {
    assert_eq!(x.len(), v.len(), "x and v must have the same length");
    let inputs: Vec<Dual<T>> = x
        .iter()
        .zip(v.iter())
        .map(|(&xi, &vi)| Dual::new(xi, vi))
        .collect();
    let outputs = f(&inputs);
    let values = outputs.iter().map(|d| d.re).collect();
    let tangents = outputs.iter().map(|d| d.eps).collect();
    (values, tangents)
}

/// Compute the full Jacobian of `f : R^n → R^m` using forward mode.
///
/// Returns `(f(x), J)` where `J[i][j] = ∂f_i/∂x_j`.
pub fn jacobian<T: Scalar>(
    f: impl Fn(&[Dual<T>]) -> Vec<Dual<T>>,
    x: &[T],
) -> (Vec<T>, Vec<Vec<T>>) {
    let n = x.len();

    let const_inputs: Vec<Dual<T>> = x.iter().map(|&xi| Dual::constant(xi)).collect();
    let const_outputs = f(&const_inputs);
    let m = const_outputs.len();
    let values: Vec<T> = const_outputs.iter().map(|d| d.re).collect();

    // One forward pass per input variable.
    let mut jac = vec![vec![T::zero(); n]; m];
    for j in 0..n {
        let inputs: Vec<Dual<T>> = x
            .iter()
            .enumerate()
            .map(|(k, &xi)| {
                if k == j {
                    Dual::variable(xi)
                } else {
                    Dual::constant(xi)
                }
            })
            .collect();
        let outputs = f(&inputs);
        for (row, out) in jac.iter_mut().zip(outputs.iter()) {
            row[j] = out.eps;
        }
    }

    (values, jac)
}

/// Unit vector `e_j` of length `n`, lifted to `T`.
fn unit<T: Scalar>(n: usize, j: usize) -> impl Iterator<Item = T> {
    (0..n).map(move |i| if i == j { T::one() } else { T::zero() })
}

/// Hessian-vector product via forward-over-reverse.
///
/// Returns `(f(x), ∇f(x), H·v)`.
pub fn hvp<F: Float + TapeThreadLocal>(
    f: impl FnOnce(&[Dual<Var<F>>]) -> Dual<Var<F>>,
    x: &[F],
    v: &[F],
) -> (F, Vec<F>, Vec<F>) {
    assert_eq!(x.len(), v.len(), "x and v must have the same length");
    let mut tape = Tape::with_capacity(x.len() * 20);
    let vars = record_inputs(&mut tape, x);
    let _guard = TapeGuard::new(&mut tape);

    let inputs: Vec<Dual<Var<F>>> = vars
        .iter()
        .zip(v)
        .map(|(&xi, &vi)| Dual::new(xi, Var::constant(vi)))
        .collect();
    let out = f(&inputs);
    let g = gradient(out.re, &vars);
    let hv = gradient(out.eps, &vars);
    (out.re.value, g, hv)
}

/// Full Hessian via forward-over-reverse.
///
/// One forward pass with tangent `e_j` and one reverse sweep of the tangent
/// per column, each in its own nested context.
///
/// Returns `(f(x), ∇f(x), H)` where `H[i][j] = ∂²f/∂x_i∂x_j`.
pub fn hessian<F: Float + TapeThreadLocal>(
    f: impl Fn(&[Dual<Var<F>>]) -> Dual<Var<F>>,
    x: &[F],
) -> (F, Vec<F>, Vec<Vec<F>>) {
    let n = x.len();
    let mut tape = Tape::with_capacity(n * 20);
    let vars = record_inputs(&mut tape, x);
    let _guard = TapeGuard::new(&mut tape);

    let mut value = F::zero();
    let mut grad = vec![F::zero(); n];
    let mut hess = vec![vec![F::zero(); n]; n];
    for j in 0..n.max(1) {
        let _nested = NestedGuard::<F>::new();
        let inputs: Vec<Dual<Var<F>>> = vars
            .iter()
            .zip(unit::<Var<F>>(n, j))
            .map(|(&xi, e)| Dual::new(xi, e))
            .collect();
        let out = f(&inputs);
        if j == 0 {
            value = out.re.value;
            grad = gradient(out.re, &vars);
        }
        if n > 0 {
            hess[j] = gradient(out.eps, &vars);
        }
    }
    (value, grad, hess)
}

/// Derivatives through third order of `f : R^n → R`.
#[derive(Clone, Debug, PartialEq)]
pub struct ThirdOrder<F> {
    pub value: F,
    pub gradient: Vec<F>,
    /// `hessian[i][j] = ∂²f/∂x_i∂x_j`.
    pub hessian: Vec<Vec<F>>,
    /// `third[i][j][k] = ∂³f/∂x_i∂x_j∂x_k`.
    pub third: Vec<Vec<Vec<F>>>,
}

/// Value, gradient, Hessian and the gradient of the Hessian, via
/// `Dual<Dual<Var>>`.
///
/// Each pair `j ≤ k` is one forward pass seeding the inner tangent with
/// `e_j` and the outer with `e_k`, followed by one reverse sweep of the
/// second-order channel. Symmetric entries are mirrored.
pub fn grad_hessian<F: Float + TapeThreadLocal>(
    f: impl Fn(&[Dual<Dual<Var<F>>>]) -> Dual<Dual<Var<F>>>,
    x: &[F],
) -> ThirdOrder<F> {
    let n = x.len();
    let mut tape = Tape::with_capacity(n * n * 40);
    let vars = record_inputs(&mut tape, x);
    let _guard = TapeGuard::new(&mut tape);

    let mut result = ThirdOrder {
        value: F::zero(),
        gradient: vec![F::zero(); n],
        hessian: vec![vec![F::zero(); n]; n],
        third: vec![vec![vec![F::zero(); n]; n]; n],
    };

    if n == 0 {
        result.value = f(&[]).re.re.value;
        return result;
    }

    for j in 0..n {
        for k in j..n {
            let _nested = NestedGuard::<F>::new();
            let inputs: Vec<Dual<Dual<Var<F>>>> = vars
                .iter()
                .zip(unit::<Var<F>>(n, j).zip(unit::<Var<F>>(n, k)))
                .map(|(&xi, (ej, ek))| Dual::new(Dual::new(xi, ej), Dual::constant(ek)))
                .collect();
            let out = f(&inputs);
            if j == 0 && k == 0 {
                result.value = out.re.re.value;
                result.gradient = gradient(out.re.re, &vars);
            }
            let second = out.eps.eps;
            result.hessian[j][k] = second.value;
            result.hessian[k][j] = second.value;
            let d3 = gradient(second, &vars);
            for (i, &d) in d3.iter().enumerate() {
                result.third[i][j][k] = d;
                result.third[i][k][j] = d;
            }
        }
    }
    result
}

/// `(f(x), f'(x), f''(x), f'''(x))` of a univariate function.
///
/// ```
/// let (v, d1, d2, d3) = numbat::third_derivative(|x| x.ln(), 2.0_f64);
/// assert!((v - 2.0_f64.ln()).abs() < 1e-12);
/// assert!((d1 - 0.5).abs() < 1e-12);
/// assert!((d2 + 0.25).abs() < 1e-12);
/// assert!((d3 - 0.25).abs() < 1e-12);
/// ```
pub fn third_derivative<F: Float + TapeThreadLocal>(
    f: impl FnOnce(Dual<Dual<Var<F>>>) -> Dual<Dual<Var<F>>>,
    x: F,
) -> (F, F, F, F) {
    let mut tape = Tape::with_capacity(64);
    let var = tape.new_variable(x);
    let var = Var::from_tape(x, var);
    let _guard = TapeGuard::new(&mut tape);

    let input = Dual::new(
        Dual::new(var, Var::constant(F::one())),
        Dual::constant(Var::constant(F::one())),
    );
    let out = f(input);
    let d3 = gradient(out.eps.eps, &[var]);
    (out.re.re.value, out.re.eps.value, out.eps.eps.value, d3[0])
}

/// Central finite-difference gradient, for checking.
pub fn finite_diff_gradient<F: Float>(f: impl Fn(&[F]) -> F, x: &[F], h: F) -> Vec<F> {
    let two = F::lit(2.0);
    let mut xp = x.to_vec();
    (0..x.len())
        .map(|i| {
            xp[i] = x[i] + h;
            let fp = f(&xp);
            xp[i] = x[i] - h;
            let fm = f(&xp);
            xp[i] = x[i];
            (fp - fm) / (two * h)
        })
        .collect()
}

/// Repeated gradient evaluations on one long-lived tape.
///
/// The tape is rewound at the start of every evaluation, so memory use is
/// bounded by the largest single evaluation and the arena blocks are reused.
pub struct Evaluator<F: Float> {
    tape: Tape<F>,
    evaluations: u64,
}

impl<F: Float + TapeThreadLocal> Default for Evaluator<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: Float + TapeThreadLocal> Evaluator<F> {
    pub fn new() -> Self {
        Self::with_config(TapeConfig::default())
    }

    pub fn with_config(config: TapeConfig) -> Self {
        Evaluator {
            tape: Tape::with_config(config),
            evaluations: 0,
        }
    }

    /// `(f(x), ∇f(x))`, discarding whatever the previous evaluation recorded.
    pub fn value_and_gradient(
        &mut self,
        f: impl FnOnce(&[Var<F>]) -> Var<F>,
        x: &[F],
    ) -> (F, Vec<F>) {
        self.tape.rewind();
        self.evaluations += 1;
        let inputs = record_inputs(&mut self.tape, x);
        let guard = TapeGuard::new(&mut self.tape);
        let output = f(&inputs);
        let g = gradient(output, &inputs);
        drop(guard);
        tracing::trace!(
            evaluation = self.evaluations,
            nodes = self.tape.len(),
            "evaluated gradient"
        );
        (output.value, g)
    }

    /// Number of completed evaluations.
    pub fn evaluations(&self) -> u64 {
        self.evaluations
    }

    /// Occupancy of the tape after the last evaluation.
    pub fn stats(&self) -> TapeStats {
        self.tape.stats()
    }
}

/// `(f(x), ∇f(x))` at every point, in parallel.
///
/// Each rayon worker keeps its own [`Evaluator`], so no tape is shared
/// between threads.
#[cfg(feature = "parallel")]
pub fn par_gradients<F, Func>(f: Func, points: &[Vec<F>]) -> Vec<(F, Vec<F>)>
where
    F: Float + TapeThreadLocal,
    Func: Fn(&[Var<F>]) -> Var<F> + Sync,
{
    use rayon::prelude::*;

    points
        .par_iter()
        .map_init(Evaluator::<F>::new, |eval, x| eval.value_and_gradient(&f, x))
        .collect()
}
