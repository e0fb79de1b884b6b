use approx::assert_relative_eq;
use numbat::api::finite_diff_gradient;
use numbat::functions::{inv_logit, log1p_exp, log_sum_exp, square};
use numbat::{derivative, grad, Dual, Scalar, Var};
use num_traits::Float;

type Unary = (
    &'static str,
    fn(Var<f64>) -> Var<f64>,
    fn(Dual<f64>) -> Dual<f64>,
    fn(f64) -> f64,
    f64,
);

fn u(
    name: &'static str,
    f_var: fn(Var<f64>) -> Var<f64>,
    f_dual: fn(Dual<f64>) -> Dual<f64>,
    f_f64: fn(f64) -> f64,
    x: f64,
) -> Unary {
    (name, f_var, f_dual, f_f64, x)
}

fn unary_table() -> Vec<Unary> {
    vec![
        u("neg", |x| -x, |x| -x, |x| -x, 0.7),
        u("recip", |x| x.recip(), |x| x.recip(), |x| x.recip(), 1.3),
        u("powi", |x| x.powi(3), |x| x.powi(3), |x| x.powi(3), 1.1),
        u("powi_neg", |x| x.powi(-2), |x| x.powi(-2), |x| x.powi(-2), 0.8),
        u("sqrt", |x| x.sqrt(), |x| x.sqrt(), |x| x.sqrt(), 2.0),
        u("cbrt", |x| x.cbrt(), |x| x.cbrt(), |x| x.cbrt(), 2.0),
        u("exp", |x| x.exp(), |x| x.exp(), |x| x.exp(), 0.5),
        u("exp2", |x| x.exp2(), |x| x.exp2(), |x| x.exp2(), 0.5),
        u("exp_m1", |x| x.exp_m1(), |x| x.exp_m1(), |x| x.exp_m1(), 0.5),
        u("ln", |x| x.ln(), |x| x.ln(), |x| x.ln(), 1.7),
        u("log2", |x| x.log2(), |x| x.log2(), |x| x.log2(), 1.7),
        u("log10", |x| x.log10(), |x| x.log10(), |x| x.log10(), 1.7),
        u("ln_1p", |x| x.ln_1p(), |x| x.ln_1p(), |x| x.ln_1p(), 0.3),
        u("sin", |x| x.sin(), |x| x.sin(), |x| x.sin(), 0.9),
        u("cos", |x| x.cos(), |x| x.cos(), |x| x.cos(), 0.9),
        u("tan", |x| x.tan(), |x| x.tan(), |x| x.tan(), 0.9),
        u("asin", |x| x.asin(), |x| x.asin(), |x| x.asin(), 0.4),
        u("acos", |x| x.acos(), |x| x.acos(), |x| x.acos(), 0.4),
        u("atan", |x| x.atan(), |x| x.atan(), |x| x.atan(), 0.4),
        u("sinh", |x| x.sinh(), |x| x.sinh(), |x| x.sinh(), 0.6),
        u("cosh", |x| x.cosh(), |x| x.cosh(), |x| x.cosh(), 0.6),
        u("tanh", |x| x.tanh(), |x| x.tanh(), |x| x.tanh(), 0.6),
        u("asinh", |x| x.asinh(), |x| x.asinh(), |x| x.asinh(), 0.6),
        u("acosh", |x| x.acosh(), |x| x.acosh(), |x| x.acosh(), 1.6),
        u("atanh", |x| x.atanh(), |x| x.atanh(), |x| x.atanh(), 0.6),
        u("fract", |x| x.fract(), |x| x.fract(), |x| x.fract(), 2.3),
        u("to_degrees", |x| x.to_degrees(), |x| x.to_degrees(), |x| x.to_degrees(), 0.3),
        u("to_radians", |x| x.to_radians(), |x| x.to_radians(), |x| x.to_radians(), 30.0),
        u("square", |x| square(x), |x| square(x), |x| x * x, -1.2),
        u("inv_logit", |x| inv_logit(x), |x| inv_logit(x), |x| 1.0 / (1.0 + (-x).exp()), -0.8),
        u("log1p_exp", |x| log1p_exp(x), |x| log1p_exp(x), |x| x.exp().ln_1p(), 1.4),
        u("log1p_exp_neg", |x| log1p_exp(x), |x| log1p_exp(x), |x| x.exp().ln_1p(), -1.4),
    ]
}

fn fd(f: fn(f64) -> f64, x: f64) -> f64 {
    finite_diff_gradient(|v: &[f64]| f(v[0]), &[x], 1e-6)[0]
}

#[test]
fn reverse_partials_match_finite_differences() {
    for (name, f_var, _, f_f64, x) in unary_table() {
        let g = grad(|v| f_var(v[0]), &[x])[0];
        let expected = fd(f_f64, x);
        assert!(
            (g - expected).abs() <= 1e-6 * expected.abs().max(1.0),
            "{name}: reverse={g}, fd={expected}"
        );
    }
}

#[test]
fn forward_tangents_match_reverse() {
    for (name, f_var, f_dual, _, x) in unary_table() {
        let g = grad(|v| f_var(v[0]), &[x])[0];
        let (value, d) = derivative(f_dual, x);
        assert_relative_eq!(value, f_dual(Dual::constant(x)).re);
        assert!(
            (g - d).abs() <= 1e-12 * g.abs().max(1.0),
            "{name}: reverse={g}, forward={d}"
        );
    }
}

type Binary = (
    &'static str,
    fn(Var<f64>, Var<f64>) -> Var<f64>,
    fn(f64, f64) -> f64,
    [f64; 2],
);

fn b(
    name: &'static str,
    f_var: fn(Var<f64>, Var<f64>) -> Var<f64>,
    f_f64: fn(f64, f64) -> f64,
    x: [f64; 2],
) -> Binary {
    (name, f_var, f_f64, x)
}

fn binary_table() -> Vec<Binary> {
    vec![
        b("add", |a, b| a + b, |a, b| a + b, [0.3, 1.2]),
        b("sub", |a, b| a - b, |a, b| a - b, [0.3, 1.2]),
        b("mul", |a, b| a * b, |a, b| a * b, [0.3, 1.2]),
        b("div", |a, b| a / b, |a, b| a / b, [0.3, 1.2]),
        b("rem", |a, b| a % b, |a, b| a % b, [5.3, 1.2]),
        b("powf", |a, b| a.powf(b), |a, b| a.powf(b), [1.3, 2.2]),
        b("atan2", |a, b| a.atan2(b), |a, b| a.atan2(b), [0.3, -1.2]),
        b("hypot", |a, b| a.hypot(b), |a, b| a.hypot(b), [0.3, 1.2]),
        b("log", |a, b| a.log(b), |a, b| a.log(b), [3.0, 2.5]),
        b("log_sum_exp", |a, b| log_sum_exp(a, b), |a, b| (a.exp() + b.exp()).ln(), [0.3, 1.2]),
        b("mul_add", |a, b| a.mul_add(b, a), |a, b| a.mul_add(b, a), [0.3, 1.2]),
    ]
}

#[test]
fn binary_partials_match_finite_differences() {
    for (name, f_var, f_f64, x) in binary_table() {
        let g = grad(|v| f_var(v[0], v[1]), &x);
        let expected = finite_diff_gradient(|v: &[f64]| f_f64(v[0], v[1]), &x, 1e-6);
        for (gi, ei) in g.iter().zip(&expected) {
            assert!(
                (gi - ei).abs() <= 1e-6 * ei.abs().max(1.0),
                "{name}: reverse={g:?}, fd={expected:?}"
            );
        }
    }
}

/// Rosenbrock function, generic over scalar type.
fn rosenbrock<T: Scalar>(x: &[T]) -> T {
    let one = T::lit(1.0);
    let hundred = T::lit(100.0);
    let mut sum = T::zero();
    for i in 0..x.len() - 1 {
        let t1 = one - x[i];
        let t2 = x[i + 1] - x[i] * x[i];
        sum = sum + t1 * t1 + hundred * t2 * t2;
    }
    sum
}

/// Beale function.
fn beale<T: Scalar>(x: &[T]) -> T {
    let (x0, x1) = (x[0], x[1]);
    let t1 = T::lit(1.5) - x0 + x0 * x1;
    let t2 = T::lit(2.25) - x0 + x0 * x1 * x1;
    let t3 = T::lit(2.625) - x0 + x0 * x1 * x1 * x1;
    t1 * t1 + t2 * t2 + t3 * t3
}

#[test]
fn composite_functions_against_finite_differences() {
    let x = [0.8_f64, -1.3, 2.1, 0.4];
    let g = grad(|v| rosenbrock(v), &x);
    let expected = finite_diff_gradient(rosenbrock::<f64>, &x, 1e-6);
    for (gi, ei) in g.iter().zip(&expected) {
        assert_relative_eq!(gi, ei, max_relative = 1e-6);
    }

    let x = [1.2_f64, 0.7];
    let g = grad(|v| beale(v), &x);
    let expected = finite_diff_gradient(beale::<f64>, &x, 1e-6);
    for (gi, ei) in g.iter().zip(&expected) {
        assert_relative_eq!(gi, ei, max_relative = 1e-6);
    }
}
