//! Tape entries and their backward effects.
//!
//! A [`Node`] never owns its operands: every reference is an index into the
//! slot arena, and variable-length operand/partial lists live in the index and
//! real arenas of [`Storage`]. Nodes are plain `Copy` data, so a rewind
//! discards them without running anything.

use crate::arena::{Arena, Span};
use crate::Float;

/// Sentinel slot index for a lifted plain number (never on the tape).
pub const CONSTANT: u32 = u32::MAX;

/// Forward value and accumulated adjoint of one scalar cell.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Slot<F> {
    pub value: F,
    pub adjoint: F,
}

impl<F: Float> Slot<F> {
    #[inline]
    pub fn new(value: F) -> Self {
        Slot {
            value,
            adjoint: F::zero(),
        }
    }
}

/// Arena-backed storage the nodes point into.
pub struct Storage<F: Float> {
    /// Value/adjoint cells, one per scalar node or array element.
    pub slots: Arena<Slot<F>>,
    /// Operand slot lists (n-ary, gather, assign).
    pub indices: Arena<u32>,
    /// Partials and value snapshots.
    pub reals: Arena<F>,
}

impl<F: Float> Storage<F> {
    pub fn with_block_sizes(slot_block: usize, array_block: usize) -> Self {
        Storage {
            slots: Arena::with_block_size(slot_block),
            indices: Arena::with_block_size(array_block),
            reals: Arena::with_block_size(array_block),
        }
    }

    #[inline]
    fn accumulate(&mut self, index: u32, delta: F) {
        let slot = self.slots.get_mut(index);
        slot.adjoint = slot.adjoint + delta;
    }

    #[inline]
    fn adjoint(&self, index: u32) -> F {
        self.slots.get(index).adjoint
    }
}

/// One recorded elementary operation.
///
/// Operand lists never contain [`CONSTANT`] except in `Gather` and `Assign`,
/// where positions matter and constant sources are skipped during the sweep.
#[derive(Clone, Copy, Debug)]
pub enum Node<F> {
    /// Independent input(s). `out` covers one slot for a scalar, `n` for an array.
    Leaf { out: Span },
    Unary {
        out: u32,
        a: u32,
        da: F,
    },
    Binary {
        out: u32,
        a: u32,
        b: u32,
        da: F,
        db: F,
    },
    Ternary {
        out: u32,
        a: u32,
        b: u32,
        c: u32,
        da: F,
        db: F,
        dc: F,
    },
    /// `operands`/`partials` are parallel spans of length N; `extra` holds up
    /// to two further scalar operands (`num_extra` of them are live).
    Nary {
        out: u32,
        operands: Span,
        partials: Span,
        extra: [(u32, F); 2],
        num_extra: u8,
    },
    /// Array built from scalar handles: cell `i` of `out` forwards its adjoint
    /// to `operands[i]`.
    Gather { out: Span, operands: Span },
    /// Batched in-place assignment into array cells.
    ///
    /// `cells`/`sources` index the slot arena, `old`/`new` the real arena; all
    /// four spans have the same length and are free of duplicate cells.
    Assign {
        cells: Span,
        sources: Span,
        old: Span,
        new: Span,
    },
}

impl<F: Float> Default for Node<F> {
    fn default() -> Self {
        Node::Leaf { out: Span::EMPTY }
    }
}

impl<F: Float> Node<F> {
    /// Push this node's adjoint contribution back to its operands.
    ///
    /// `scratch` is reused across calls by the batched assignment, which must
    /// read every cell adjoint before moving any of them.
    pub fn propagate(&self, store: &mut Storage<F>, scratch: &mut Vec<F>) {
        match *self {
            Node::Leaf { .. } => {}
            Node::Unary { out, a, da } => {
                let adj = store.adjoint(out);
                store.accumulate(a, adj * da);
            }
            Node::Binary { out, a, b, da, db } => {
                let adj = store.adjoint(out);
                store.accumulate(a, adj * da);
                store.accumulate(b, adj * db);
            }
            Node::Ternary {
                out,
                a,
                b,
                c,
                da,
                db,
                dc,
            } => {
                let adj = store.adjoint(out);
                store.accumulate(a, adj * da);
                store.accumulate(b, adj * db);
                store.accumulate(c, adj * dc);
            }
            Node::Nary {
                out,
                operands,
                partials,
                extra,
                num_extra,
            } => {
                let adj = store.adjoint(out);
                let Storage {
                    slots,
                    indices,
                    reals,
                } = store;
                for (&i, &d) in indices.slice(operands).iter().zip(reals.slice(partials)) {
                    let slot = slots.get_mut(i);
                    slot.adjoint = slot.adjoint + adj * d;
                }
                for &(i, d) in &extra[..num_extra as usize] {
                    store.accumulate(i, adj * d);
                }
            }
            Node::Gather { out, operands } => {
                let Storage { slots, indices, .. } = store;
                for (cell, &src) in out.indices().zip(indices.slice(operands)) {
                    if src == CONSTANT {
                        continue;
                    }
                    let adj = slots.get(cell).adjoint;
                    let slot = slots.get_mut(src);
                    slot.adjoint = slot.adjoint + adj;
                }
            }
            Node::Assign {
                cells,
                sources,
                old,
                ..
            } => {
                let Storage {
                    slots,
                    indices,
                    reals,
                } = store;
                let cells = indices.slice(cells);
                // Sources may alias other cells of the same assignment, so
                // take every cell adjoint before handing any of them on.
                scratch.clear();
                for (&cell, &prev) in cells.iter().zip(reals.slice(old)) {
                    let slot = slots.get_mut(cell);
                    scratch.push(slot.adjoint);
                    slot.adjoint = F::zero();
                    slot.value = prev;
                }
                for (&src, &adj) in indices.slice(sources).iter().zip(scratch.iter()) {
                    if src != CONSTANT {
                        let slot = slots.get_mut(src);
                        slot.adjoint = slot.adjoint + adj;
                    }
                }
            }
        }
    }

    /// Put back the values a batched assignment overwrote, leaving adjoints
    /// alone. Other node kinds have nothing to undo.
    pub fn restore(&self, store: &mut Storage<F>) {
        if let Node::Assign { cells, old, .. } = *self {
            let Storage {
                slots,
                indices,
                reals,
            } = store;
            for (&cell, &value) in indices.slice(cells).iter().zip(reals.slice(old)) {
                slots.get_mut(cell).value = value;
            }
        }
    }

    /// Re-apply the forward effect of a batched assignment after a sweep
    /// restored the overwritten values. Other node kinds have no forward side
    /// effect.
    pub fn replay(&self, store: &mut Storage<F>) {
        if let Node::Assign { cells, new, .. } = *self {
            let Storage {
                slots,
                indices,
                reals,
            } = store;
            for (&cell, &value) in indices.slice(cells).iter().zip(reals.slice(new)) {
                slots.get_mut(cell).value = value;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage() -> Storage<f64> {
        Storage::with_block_sizes(8, 8)
    }

    #[test]
    fn binary_accumulates_scaled_adjoint() {
        let mut store = storage();
        let a = store.slots.alloc(Slot::new(3.0));
        let b = store.slots.alloc(Slot::new(4.0));
        let out = store.slots.alloc(Slot::new(12.0));
        store.slots.get_mut(out).adjoint = 2.0;

        let node = Node::Binary {
            out,
            a,
            b,
            da: 4.0,
            db: 3.0,
        };
        node.propagate(&mut store, &mut Vec::new());
        assert_eq!(store.slots.get(a).adjoint, 8.0);
        assert_eq!(store.slots.get(b).adjoint, 6.0);
    }

    #[test]
    fn zero_adjoint_still_propagates_nan() {
        let mut store = storage();
        let a = store.slots.alloc(Slot::new(0.0));
        let out = store.slots.alloc(Slot::new(0.0));
        let node = Node::Unary {
            out,
            a,
            da: f64::INFINITY,
        };
        node.propagate(&mut store, &mut Vec::new());
        assert!(store.slots.get(a).adjoint.is_nan());
    }

    #[test]
    fn nary_visits_array_then_extras() {
        let mut store = storage();
        let xs: Vec<u32> = (0..3).map(|i| store.slots.alloc(Slot::new(i as f64))).collect();
        let s = store.slots.alloc(Slot::new(1.0));
        let out = store.slots.alloc(Slot::new(0.0));
        store.slots.get_mut(out).adjoint = 1.0;

        let operands = store.indices.alloc_slice(&xs);
        let partials = store.reals.alloc_slice(&[1.0, 2.0, 3.0]);
        let node = Node::Nary {
            out,
            operands,
            partials,
            extra: [(s, 5.0), (CONSTANT, 0.0)],
            num_extra: 1,
        };
        node.propagate(&mut store, &mut Vec::new());
        let adj: Vec<f64> = xs.iter().map(|&i| store.slots.get(i).adjoint).collect();
        assert_eq!(adj, vec![1.0, 2.0, 3.0]);
        assert_eq!(store.slots.get(s).adjoint, 5.0);
    }

    #[test]
    fn assign_restores_moves_and_zeroes() {
        let mut store = storage();
        let src = store.slots.alloc(Slot::new(9.0));
        let cell = store.slots.alloc(Slot::new(9.0));
        store.slots.get_mut(cell).adjoint = 4.0;

        let cells = store.indices.alloc_slice(&[cell]);
        let sources = store.indices.alloc_slice(&[src]);
        let old = store.reals.alloc_slice(&[1.0]);
        let new = store.reals.alloc_slice(&[9.0]);
        let node = Node::Assign {
            cells,
            sources,
            old,
            new,
        };

        node.propagate(&mut store, &mut Vec::new());
        assert_eq!(store.slots.get(cell).value, 1.0);
        assert_eq!(store.slots.get(cell).adjoint, 0.0);
        assert_eq!(store.slots.get(src).adjoint, 4.0);

        node.replay(&mut store);
        assert_eq!(store.slots.get(cell).value, 9.0);

        store.slots.get_mut(cell).adjoint = 2.5;
        node.restore(&mut store);
        assert_eq!(store.slots.get(cell).value, 1.0);
        assert_eq!(store.slots.get(cell).adjoint, 2.5);
    }

    #[test]
    fn assign_swap_routes_adjoints_crosswise() {
        // cells c0, c1 swapped: c0 <- c1, c1 <- c0.
        let mut store = storage();
        let c0 = store.slots.alloc(Slot::new(2.0));
        let c1 = store.slots.alloc(Slot::new(1.0));
        store.slots.get_mut(c0).adjoint = 10.0;
        store.slots.get_mut(c1).adjoint = 1.0;

        let cells = store.indices.alloc_slice(&[c0, c1]);
        let sources = store.indices.alloc_slice(&[c1, c0]);
        let old = store.reals.alloc_slice(&[1.0, 2.0]);
        let new = store.reals.alloc_slice(&[2.0, 1.0]);
        Node::Assign {
            cells,
            sources,
            old,
            new,
        }
        .propagate(&mut store, &mut Vec::new());

        assert_eq!(store.slots.get(c0).adjoint, 1.0);
        assert_eq!(store.slots.get(c1).adjoint, 10.0);
        assert_eq!(store.slots.get(c0).value, 1.0);
        assert_eq!(store.slots.get(c1).value, 2.0);
    }
}
