//! Differentiable arrays with batched in-place assignment.
//!
//! A [`VarVec`] is a run of contiguous slots on the active tape. Reading an
//! element records a unit-partial read node with its own slot, so the handle
//! keeps referring to the value it saw even after the cell is overwritten,
//! and gradients of anything computed from it flow back to whatever the cell
//! held at read time. Writing elements with [`VarVec::assign`] mutates the
//! cells in place and records a single
//! [`Node::Assign`](crate::node::Node::Assign) entry for the whole batch.

use crate::error::{Error, Result};
use crate::float::Float;
use crate::functions::log_sum_exp_partials;
use crate::node::CONSTANT;
use crate::tape::{self, Tape, TapeThreadLocal};
use crate::var::Var;

/// Handle to a differentiable array on the active tape.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VarVec<F: Float> {
    start: u32,
    len: u32,
    _marker: std::marker::PhantomData<F>,
}

impl<F: Float + TapeThreadLocal> VarVec<F> {
    /// Register `values` as independent inputs.
    pub fn new(values: &[F]) -> Self {
        let span = tape::with_active_tape(|t: &mut Tape<F>| t.new_variables(values));
        VarVec {
            start: span.start,
            len: values.len() as u32,
            _marker: std::marker::PhantomData,
        }
    }

    /// Build an array from existing handles. Each cell passes its adjoint on
    /// to the handle it was built from.
    pub fn from_vars(vars: &[Var<F>]) -> Self {
        let operands: Vec<u32> = vars.iter().map(|v| v.index).collect();
        let values: Vec<F> = vars.iter().map(|v| v.value).collect();
        let span = tape::with_active_tape(|t: &mut Tape<F>| t.push_gather(&operands, &values));
        VarVec {
            start: span.start,
            len: vars.len() as u32,
            _marker: std::marker::PhantomData,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    fn check(&self, index: usize) -> Result<u32> {
        if index < self.len() {
            Ok(self.start + index as u32)
        } else {
            Err(Error::IndexOutOfRange {
                index,
                len: self.len(),
            })
        }
    }

    fn cells(&self) -> Vec<u32> {
        (self.start..self.start + self.len).collect()
    }

    /// Read cell `index` into a handle of its own.
    pub fn get(&self, index: usize) -> Result<Var<F>> {
        let cell = self.check(index)?;
        Ok(tape::with_active_tape(|t: &mut Tape<F>| read(t, cell)))
    }

    /// Current forward value of cell `index`.
    pub fn value(&self, index: usize) -> Result<F> {
        let slot = self.check(index)?;
        Ok(tape::with_active_tape(|t: &mut Tape<F>| t.value(slot)))
    }

    /// Current forward values of every cell.
    pub fn values(&self) -> Vec<F> {
        tape::with_active_tape(|t: &mut Tape<F>| {
            (self.start..self.start + self.len).map(|i| t.value(i)).collect()
        })
    }

    /// Adjoints left on the cells by the last backward sweep.
    pub fn adjoints(&self) -> Vec<F> {
        tape::with_active_tape(|t: &mut Tape<F>| {
            (self.start..self.start + self.len).map(|i| t.adjoint(i)).collect()
        })
    }

    /// Read every cell, in order.
    pub fn to_vars(&self) -> Vec<Var<F>> {
        tape::with_active_tape(|t: &mut Tape<F>| {
            (self.start..self.start + self.len)
                .map(|cell| read(t, cell))
                .collect()
        })
    }

    /// Overwrite cells `indices[k]` with `sources[k]` as one batched update.
    ///
    /// Every index is validated before anything is written or recorded. When
    /// an index repeats, the last write wins and the earlier sources receive
    /// no adjoint from that cell. All sources are read before any cell is
    /// written, so a batch may permute its own cells.
    ///
    /// In the backward sweep the update restores the overwritten values,
    /// moves each cell's adjoint onto its source and zeroes the cell.
    pub fn assign(&self, indices: &[usize], sources: &[Var<F>]) -> Result<()> {
        if indices.len() != sources.len() {
            return Err(Error::DimensionMismatch {
                expected: indices.len(),
                actual: sources.len(),
            });
        }
        let mut order = Vec::with_capacity(indices.len());
        for (k, &index) in indices.iter().enumerate() {
            self.check(index)?;
            order.push(k);
        }
        if order.is_empty() {
            return Ok(());
        }

        // Stable sort keeps call order within a run of equal indices, so the
        // last entry of each run is the winning write.
        order.sort_by_key(|&k| indices[k]);
        let mut cells = Vec::with_capacity(order.len());
        let mut src = Vec::with_capacity(order.len());
        let mut values = Vec::with_capacity(order.len());
        for (pos, &k) in order.iter().enumerate() {
            let superseded = order
                .get(pos + 1)
                .is_some_and(|&next| indices[next] == indices[k]);
            if superseded {
                continue;
            }
            cells.push(self.start + indices[k] as u32);
            src.push(sources[k].index);
            values.push(sources[k].value);
        }

        tracing::trace!(
            requested = indices.len(),
            written = cells.len(),
            "batched assignment"
        );
        tape::with_active_tape(|t: &mut Tape<F>| t.push_assign(&cells, &src, &values));
        Ok(())
    }

    /// Overwrite the contiguous block starting at `offset` with `sources`.
    pub fn assign_block(&self, offset: usize, sources: &[Var<F>]) -> Result<()> {
        let end = match offset.checked_add(sources.len()) {
            Some(end) if end <= self.len() => end,
            Some(end) => {
                return Err(Error::IndexOutOfRange {
                    index: end - 1,
                    len: self.len(),
                })
            }
            None => {
                return Err(Error::IndexOutOfRange {
                    index: offset,
                    len: self.len(),
                })
            }
        };
        let indices: Vec<usize> = (offset..end).collect();
        self.assign(&indices, sources)
    }

    // ── Reductions ──
    //
    // Each reduction records one n-ary node over the cells.

    /// `Σ x_i`.
    pub fn sum(&self) -> Var<F> {
        let values = self.values();
        let total = values.iter().fold(F::zero(), |acc, &x| acc + x);
        let partials = vec![F::one(); values.len()];
        self.reduce(total, &partials, &[])
    }

    /// `Σ w_i x_i`.
    pub fn dot(&self, weights: &[F]) -> Result<Var<F>> {
        self.check_len(weights.len())?;
        let total = self.weighted(weights);
        Ok(self.reduce(total, weights, &[]))
    }

    /// `Σ w_i x_i + b`.
    pub fn dot_add(&self, weights: &[F], intercept: Var<F>) -> Result<Var<F>> {
        self.check_len(weights.len())?;
        let total = self.weighted(weights) + intercept.value;
        Ok(self.reduce(total, weights, &[(intercept, F::one())]))
    }

    /// `s · Σ x_i`.
    pub fn scaled_sum(&self, scale: Var<F>) -> Var<F> {
        let values = self.values();
        let total = values.iter().fold(F::zero(), |acc, &x| acc + x);
        let partials = vec![scale.value; values.len()];
        self.reduce(scale.value * total, &partials, &[(scale, total)])
    }

    /// `Σ ((x_i - μ) / σ)²`.
    pub fn sum_sq_standardized(&self, mu: Var<F>, sigma: Var<F>) -> Var<F> {
        let values = self.values();
        let inv = F::one() / sigma.value;
        let two = F::lit(2.0);
        let mut total = F::zero();
        let mut partials = Vec::with_capacity(values.len());
        let mut d_mu = F::zero();
        for &x in &values {
            let z = (x - mu.value) * inv;
            total = total + z * z;
            let d = two * z * inv;
            partials.push(d);
            d_mu = d_mu - d;
        }
        let d_sigma = -two * total * inv;
        self.reduce(total, &partials, &[(mu, d_mu), (sigma, d_sigma)])
    }

    /// `ln Σ e^{x_i}`, shifted by the maximum. `-inf` for an empty array.
    pub fn log_sum_exp(&self) -> Var<F> {
        let values = self.values();
        let m = values.iter().fold(F::neg_infinity(), |acc, &x| acc.max(x));
        if m == F::neg_infinity() {
            let partials = vec![F::zero(); values.len()];
            return self.reduce(m, &partials, &[]);
        }
        if values.len() == 2 {
            let (r, da, db) = log_sum_exp_partials(values[0], values[1]);
            return self.reduce(r, &[da, db], &[]);
        }
        let s = values.iter().fold(F::zero(), |acc, &x| acc + (x - m).exp());
        let r = m + s.ln();
        let partials: Vec<F> = values.iter().map(|&x| (x - r).exp()).collect();
        self.reduce(r, &partials, &[])
    }

    fn check_len(&self, n: usize) -> Result<()> {
        if n == self.len() {
            Ok(())
        } else {
            Err(Error::DimensionMismatch {
                expected: self.len(),
                actual: n,
            })
        }
    }

    fn weighted(&self, weights: &[F]) -> F {
        self.values()
            .iter()
            .zip(weights)
            .fold(F::zero(), |acc, (&x, &w)| acc + w * x)
    }

    fn reduce(&self, value: F, partials: &[F], extra: &[(Var<F>, F)]) -> Var<F> {
        let cells = self.cells();
        let extra: Vec<(u32, F)> = extra.iter().map(|&(v, d)| (v.index, d)).collect();
        let index =
            tape::with_active_tape(|t: &mut Tape<F>| t.push_nary(value, &cells, partials, &extra));
        if index == CONSTANT {
            Var::constant(value)
        } else {
            Var::from_tape(value, index)
        }
    }
}

fn read<F: Float>(tape: &mut Tape<F>, cell: u32) -> Var<F> {
    let value = tape.value(cell);
    Var::from_tape(value, tape.push_unary(value, cell, F::one()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tape::TapeGuard;
    use approx::assert_relative_eq;

    #[test]
    fn out_of_range_is_rejected_before_recording() {
        let mut tape = Tape::<f64>::new();
        let _guard = TapeGuard::new(&mut tape);
        let v = VarVec::<f64>::new(&[1.0, 2.0]);
        let x = Var::<f64>::new(5.0);
        let before = tape::with_active_tape(|t: &mut Tape<f64>| t.stats());

        let err = v.assign(&[0, 2], &[x, x]).unwrap_err();
        assert_eq!(err, Error::IndexOutOfRange { index: 2, len: 2 });
        let err = v.assign(&[0], &[x, x]).unwrap_err();
        assert_eq!(
            err,
            Error::DimensionMismatch {
                expected: 1,
                actual: 2
            }
        );
        assert!(v.get(2).is_err());

        let after = tape::with_active_tape(|t: &mut Tape<f64>| t.stats());
        assert_eq!(before, after);
        assert_eq!(v.values(), vec![1.0, 2.0]);
    }

    #[test]
    fn duplicate_indices_last_write_wins() {
        let mut tape = Tape::<f64>::new();
        let _guard = TapeGuard::new(&mut tape);
        let v = VarVec::<f64>::new(&[0.0, 0.0]);
        let a = Var::<f64>::new(10.0);
        let b = Var::<f64>::new(20.0);
        let c = Var::<f64>::new(30.0);
        v.assign(&[0, 1, 0], &[a, b, c]).unwrap();
        assert_eq!(v.values(), vec![30.0, 20.0]);

        let y = v.get(0).unwrap() * 2.0 + v.get(1).unwrap();
        let g = crate::api::gradient(y, &[a, b, c]);
        assert_eq!(g, vec![0.0, 1.0, 2.0]);
        // Forward state survives the sweep.
        assert_eq!(v.values(), vec![30.0, 20.0]);
        // The overwritten cells no longer depend on the original leaves.
        assert_eq!(v.adjoints(), vec![0.0, 0.0]);
    }

    #[test]
    fn swap_in_one_batch() {
        let mut tape = Tape::<f64>::new();
        let _guard = TapeGuard::new(&mut tape);
        let v = VarVec::<f64>::new(&[1.0, 2.0]);
        let x0 = v.get(0).unwrap();
        let x1 = v.get(1).unwrap();
        v.assign(&[0, 1], &[x1, x0]).unwrap();
        assert_eq!(v.values(), vec![2.0, 1.0]);

        // y = 10 * v[0] + v[1] = 10 * x1 + x0
        let y = v.get(0).unwrap() * 10.0 + v.get(1).unwrap();
        assert_relative_eq!(y.value(), 21.0);
        tape::with_active_tape(|t: &mut Tape<f64>| t.reverse(y.index()));
        assert_eq!(v.adjoints(), vec![1.0, 10.0]);
    }

    #[test]
    fn reductions_record_one_node() {
        let mut tape = Tape::<f64>::new();
        let _guard = TapeGuard::new(&mut tape);
        let v = VarVec::<f64>::new(&[1.0, 2.0, 3.0]);
        let mu = Var::<f64>::new(2.0);
        let sigma = Var::<f64>::new(2.0);
        let n0 = tape::with_active_tape(|t: &mut Tape<f64>| t.len());
        let y = v.sum_sq_standardized(mu, sigma);
        let n1 = tape::with_active_tape(|t: &mut Tape<f64>| t.len());
        assert_eq!(n1 - n0, 1);
        // ((-1)² + 0 + 1²) / 4
        assert_relative_eq!(y.value(), 0.5);

        let g = crate::api::gradient(y, &[mu, sigma]);
        assert_relative_eq!(g[0], 0.0);
        assert_relative_eq!(g[1], -0.5);
        assert_eq!(v.adjoints(), vec![-0.5, 0.0, 0.5]);
    }

    #[test]
    fn dot_add_and_scaled_sum() {
        let mut tape = Tape::<f64>::new();
        let _guard = TapeGuard::new(&mut tape);
        let v = VarVec::<f64>::new(&[1.0, 2.0]);
        let b = Var::<f64>::new(0.5);
        let y = v.dot_add(&[3.0, 4.0], b).unwrap();
        assert_relative_eq!(y.value(), 11.5);
        assert_eq!(crate::api::gradient(y, &[b]), vec![1.0]);
        assert_eq!(v.adjoints(), vec![3.0, 4.0]);

        let s = Var::<f64>::new(3.0);
        let z = v.scaled_sum(s);
        assert_relative_eq!(z.value(), 9.0);
        assert_eq!(crate::api::gradient(z, &[s]), vec![3.0]);
        assert_eq!(v.adjoints(), vec![3.0, 3.0]);

        assert!(v.dot(&[1.0]).is_err());
    }

    #[test]
    fn log_sum_exp_partials_are_softmax() {
        let mut tape = Tape::<f64>::new();
        let _guard = TapeGuard::new(&mut tape);
        let xs = [0.5, 1.0, -2.0];
        let v = VarVec::<f64>::new(&xs);
        let y = v.log_sum_exp();
        let z: f64 = xs.iter().map(|x| x.exp()).sum();
        assert_relative_eq!(y.value(), z.ln(), max_relative = 1e-14);
        tape::with_active_tape(|t: &mut Tape<f64>| t.reverse(y.index()));
        for (a, x) in v.adjoints().iter().zip(xs) {
            assert_relative_eq!(*a, x.exp() / z, max_relative = 1e-12);
        }
    }

    #[test]
    fn gather_forwards_adjoints_to_sources() {
        let mut tape = Tape::<f64>::new();
        let _guard = TapeGuard::new(&mut tape);
        let a = Var::<f64>::new(2.0);
        let b = Var::<f64>::new(3.0);
        let v = VarVec::from_vars(&[a, Var::constant(7.0), b * b]);
        assert_eq!(v.values(), vec![2.0, 7.0, 9.0]);
        let y = v.sum();
        assert_eq!(crate::api::gradient(y, &[a, b]), vec![1.0, 6.0]);
    }
}
