#![allow(dead_code)]

use numbat::Scalar;

// ─── Rosenbrock ────────────────────────────────────────────────────────────

pub fn rosenbrock<T: Scalar>(x: &[T]) -> T {
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

pub fn rosenbrock_f64(x: &[f64]) -> f64 {
    let mut sum = 0.0;
    for i in 0..x.len() - 1 {
        let t1 = 1.0 - x[i];
        let t2 = x[i + 1] - x[i] * x[i];
        sum += t1 * t1 + 100.0 * t2 * t2;
    }
    sum
}

// ─── Rastrigin ─────────────────────────────────────────────────────────────
// f(x) = 10n + Σ[x_i² - 10·cos(2π·x_i)]

pub fn rastrigin<T: Scalar>(x: &[T]) -> T {
    let ten = T::lit(10.0);
    let two_pi = T::lit(2.0 * std::f64::consts::PI);
    let mut sum = ten * T::lit(x.len() as f64);
    for &xi in x {
        sum = sum + xi * xi - ten * (two_pi * xi).cos();
    }
    sum
}

// ─── Logistic regression log-likelihood ────────────────────────────────────
// Σ_i [y_i η_i - log(1 + e^{η_i})], η_i = Σ_j β_j a_ij, fixed design.

pub fn logistic_ll<T: Scalar>(beta: &[T]) -> T {
    let n_obs = 32;
    let mut sum = T::zero();
    for i in 0..n_obs {
        let mut eta = T::zero();
        for (j, &b) in beta.iter().enumerate() {
            let a = ((i * beta.len() + j + 1) as f64).sin();
            eta = eta + b * T::lit(a);
        }
        let y = if i % 3 == 0 { 1.0 } else { 0.0 };
        sum = sum + eta * T::lit(y) - eta.log1p_exp();
    }
    sum
}

pub fn make_input(n: usize) -> Vec<f64> {
    (0..n).map(|i| 0.5 + 0.01 * i as f64).collect()
}

pub fn make_direction(n: usize) -> Vec<f64> {
    (0..n).map(|i| 0.1 * (i + 1) as f64).collect()
}
