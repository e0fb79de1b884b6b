use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use numbat::{grad_hessian, hessian, hvp, third_derivative};

#[path = "common/mod.rs"]
mod common;
use common::*;

fn bench_hessian(c: &mut Criterion) {
    let mut group = c.benchmark_group("hessian");
    for n in [2, 5, 10, 20] {
        let x = make_input(n);

        group.bench_with_input(BenchmarkId::new("rosenbrock", n), &x, |b, x| {
            b.iter(|| black_box(hessian(|v| rosenbrock(v), black_box(x))))
        });

        group.bench_with_input(BenchmarkId::new("logistic_ll", n), &x, |b, x| {
            b.iter(|| black_box(hessian(|v| logistic_ll(v), black_box(x))))
        });
    }
    group.finish();
}

fn bench_hvp(c: &mut Criterion) {
    let mut group = c.benchmark_group("hvp");
    for n in [10, 100, 1000] {
        let x = make_input(n);
        let v = make_direction(n);

        group.bench_with_input(BenchmarkId::new("rosenbrock", n), &x, |b, x| {
            b.iter(|| black_box(hvp(|d| rosenbrock(d), black_box(x), &v)))
        });
    }
    group.finish();
}

fn bench_third_order(c: &mut Criterion) {
    let mut group = c.benchmark_group("third_order");
    for n in [2, 5, 10] {
        let x = make_input(n);

        group.bench_with_input(BenchmarkId::new("grad_hessian", n), &x, |b, x| {
            b.iter(|| black_box(grad_hessian(|v| rastrigin(v), black_box(x))))
        });
    }
    group.finish();

    c.bench_function("third_derivative_univariate", |b| {
        b.iter(|| black_box(third_derivative(|x| (x * x).sin(), black_box(0.4_f64))))
    });
}

criterion_group!(benches, bench_hessian, bench_hvp, bench_third_order);
criterion_main!(benches);
