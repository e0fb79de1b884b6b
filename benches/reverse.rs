use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use numbat::{finite_diff_gradient, grad, Evaluator, Tape, TapeGuard, VarVec};

#[path = "common/mod.rs"]
mod common;
use common::*;

fn bench_reverse_gradient(c: &mut Criterion) {
    let mut group = c.benchmark_group("reverse_gradient");
    for n in [2, 10, 100, 1000] {
        let x = make_input(n);

        group.bench_with_input(BenchmarkId::new("f64_eval", n), &x, |b, x| {
            b.iter(|| black_box(rosenbrock_f64(black_box(x))))
        });

        group.bench_with_input(BenchmarkId::new("rosenbrock_rev", n), &x, |b, x| {
            b.iter(|| black_box(grad(|v| rosenbrock(v), black_box(x))))
        });

        group.bench_with_input(BenchmarkId::new("rosenbrock_fd", n), &x, |b, x| {
            b.iter(|| black_box(finite_diff_gradient(rosenbrock_f64, x, 1e-7)))
        });

        group.bench_with_input(BenchmarkId::new("rastrigin_rev", n), &x, |b, x| {
            b.iter(|| black_box(grad(|v| rastrigin(v), black_box(x))))
        });
    }
    group.finish();
}

fn bench_tape_reuse(c: &mut Criterion) {
    let mut group = c.benchmark_group("tape_reuse");
    for n in [10, 100, 1000] {
        let x = make_input(n);

        group.bench_with_input(BenchmarkId::new("fresh_tape", n), &x, |b, x| {
            b.iter(|| black_box(grad(|v| rosenbrock(v), black_box(x))))
        });

        group.bench_with_input(BenchmarkId::new("evaluator", n), &x, |b, x| {
            let mut eval = Evaluator::<f64>::new();
            b.iter(|| black_box(eval.value_and_gradient(|v| rosenbrock(v), black_box(x))))
        });
    }
    group.finish();
}

fn bench_vector_reductions(c: &mut Criterion) {
    let mut group = c.benchmark_group("vector_reductions");
    for n in [10, 100, 1000] {
        let x = make_input(n);
        let w = make_direction(n);

        group.bench_with_input(BenchmarkId::new("dot_scalar_ops", n), &x, |b, x| {
            b.iter(|| {
                black_box(grad(
                    |v| {
                        v.iter()
                            .zip(&w)
                            .fold(numbat::Var::constant(0.0), |acc, (&vi, &wi)| acc + vi * wi)
                    },
                    black_box(x),
                ))
            })
        });

        group.bench_with_input(BenchmarkId::new("dot_one_node", n), &x, |b, x| {
            b.iter(|| {
                let mut tape = Tape::<f64>::new();
                let _guard = TapeGuard::new(&mut tape);
                let v = VarVec::new(black_box(x));
                let y = v.dot(&w).unwrap();
                numbat::tape::with_active_tape(|t: &mut Tape<f64>| t.reverse(y.index()));
                black_box(v.adjoints())
            })
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_reverse_gradient,
    bench_tape_reuse,
    bench_vector_reductions
);
criterion_main!(benches);
