#![cfg(feature = "parallel")]

use numbat::{par_gradients, value_and_gradient, Scalar, Var};

fn trig_mix<T: Scalar>(x: &[T]) -> T {
    x[0].sin() * x[1].cos() + x[2].exp()
}

#[test]
fn par_gradients_match_serial() {
    let points: Vec<Vec<f64>> = (0..64)
        .map(|k| {
            let t = k as f64 / 16.0;
            vec![t, 1.0 - t, t * t]
        })
        .collect();

    let parallel = par_gradients(|v: &[Var<f64>]| trig_mix(v), &points);
    assert_eq!(parallel.len(), points.len());
    for (x, (v, g)) in points.iter().zip(&parallel) {
        let (v_serial, g_serial) = value_and_gradient(|v| trig_mix(v), x);
        assert_eq!(*v, v_serial);
        assert_eq!(*g, g_serial);
    }
}

#[test]
fn par_gradients_of_no_points() {
    let points: Vec<Vec<f64>> = Vec::new();
    let out = par_gradients(|v: &[Var<f64>]| v[0], &points);
    assert!(out.is_empty());
}
