//! Arena-backed reverse-mode tape with nested segments.
//!
//! Every differentiable operation appends one [`Node`] to the active segment
//! and, for scalar results, one [`Slot`] holding its value and adjoint. The
//! backward sweep walks the active segment in reverse construction order.
//! Memory is only reclaimed in bulk, by [`Tape::end_nested`] or
//! [`Tape::rewind`].
//!
//! Operations find their tape through a thread-local pointer installed by a
//! [`TapeGuard`], so each thread records onto its own tape.

use std::cell::Cell;
use std::marker::PhantomData;

use crate::arena::{Arena, ArenaMark, Span, DEFAULT_BLOCK_SIZE};
use crate::node::{Node, Slot, Storage, CONSTANT};
use crate::Float;

/// Block sizes for a fresh [`Tape`].
///
/// Each arena starts with a block of the given number of elements and doubles
/// the block size every time it runs out.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TapeConfig {
    /// First block of the node arena.
    pub node_block: usize,
    /// First block of the value/adjoint slot arena.
    pub slot_block: usize,
    /// First block of the operand-index and partial arenas.
    pub array_block: usize,
}

impl Default for TapeConfig {
    fn default() -> Self {
        TapeConfig {
            node_block: DEFAULT_BLOCK_SIZE,
            slot_block: DEFAULT_BLOCK_SIZE,
            array_block: DEFAULT_BLOCK_SIZE,
        }
    }
}

/// Snapshot of tape occupancy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TapeStats {
    pub nodes: usize,
    pub slots: usize,
    pub indices: usize,
    pub reals: usize,
    /// Total elements reserved across all arenas.
    pub capacity: usize,
    pub depth: usize,
}

/// Arena positions at the start of a segment.
#[derive(Clone, Copy, Debug)]
struct Segment {
    nodes: ArenaMark,
    assigns: ArenaMark,
    slots: ArenaMark,
    indices: ArenaMark,
    reals: ArenaMark,
}

/// Reverse-mode tape.
pub struct Tape<F: Float> {
    nodes: Arena<Node<F>>,
    /// Node ids of batched assignments, replayed after each sweep.
    assigns: Arena<u32>,
    store: Storage<F>,
    /// `segments[0]` is the root segment; the last entry is active.
    segments: Vec<Segment>,
    scratch: Vec<F>,
}

impl<F: Float> Default for Tape<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: Float> Tape<F> {
    /// Create an empty tape with default block sizes.
    pub fn new() -> Self {
        Self::with_config(TapeConfig::default())
    }

    /// Create a tape sized for roughly `est_ops` operations.
    pub fn with_capacity(est_ops: usize) -> Self {
        let est_ops = est_ops.max(16);
        Self::with_config(TapeConfig {
            node_block: est_ops,
            slot_block: est_ops,
            array_block: est_ops * 2,
        })
    }

    pub fn with_config(config: TapeConfig) -> Self {
        let mut tape = Tape {
            nodes: Arena::with_block_size(config.node_block),
            assigns: Arena::with_block_size(64),
            store: Storage::with_block_sizes(config.slot_block, config.array_block),
            segments: Vec::new(),
            scratch: Vec::new(),
        };
        let root = tape.current_marks();
        tape.segments.push(root);
        tape
    }

    fn current_marks(&self) -> Segment {
        Segment {
            nodes: self.nodes.mark(),
            assigns: self.assigns.mark(),
            slots: self.store.slots.mark(),
            indices: self.store.indices.mark(),
            reals: self.store.reals.mark(),
        }
    }

    #[inline]
    fn active(&self) -> Segment {
        // The root segment is never popped.
        self.segments[self.segments.len() - 1]
    }

    /// Total number of recorded nodes across all segments.
    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of value/adjoint slots in use.
    #[inline]
    pub fn num_slots(&self) -> usize {
        self.store.slots.len()
    }

    /// Number of nested contexts currently open (0 at the root).
    #[inline]
    pub fn nesting_depth(&self) -> usize {
        self.segments.len() - 1
    }

    /// Most recently recorded node, if any.
    pub fn last_node(&self) -> Option<Node<F>> {
        let n = self.nodes.len();
        (n > 0).then(|| self.nodes.get(n as u32 - 1))
    }

    pub fn stats(&self) -> TapeStats {
        TapeStats {
            nodes: self.nodes.len(),
            slots: self.store.slots.len(),
            indices: self.store.indices.len(),
            reals: self.store.reals.len(),
            capacity: self.nodes.capacity()
                + self.store.slots.capacity()
                + self.store.indices.capacity()
                + self.store.reals.capacity(),
            depth: self.nesting_depth(),
        }
    }

    // ── Recording ──

    #[inline]
    fn push_slot(&mut self, value: F) -> u32 {
        self.store.slots.alloc(Slot::new(value))
    }

    /// Register an independent scalar input and return its slot.
    #[inline]
    pub fn new_variable(&mut self, value: F) -> u32 {
        let out = self.push_slot(value);
        self.nodes.alloc(Node::Leaf {
            out: Span { start: out, len: 1 },
        });
        out
    }

    /// Register `values.len()` independent inputs in contiguous slots.
    pub fn new_variables(&mut self, values: &[F]) -> Span {
        let out = self.store.slots.alloc_fill(values.len(), Slot::default());
        for (slot, &value) in self.store.slots.slice_mut(out).iter_mut().zip(values) {
            *slot = Slot::new(value);
        }
        if !out.is_empty() {
            self.nodes.alloc(Node::Leaf { out });
        }
        out
    }

    /// Record `value = f(a)` with partial `da`.
    ///
    /// Returns [`CONSTANT`] (and records nothing) when `a` is constant.
    #[inline]
    pub fn push_unary(&mut self, value: F, a: u32, da: F) -> u32 {
        if a == CONSTANT {
            return CONSTANT;
        }
        let out = self.push_slot(value);
        self.nodes.alloc(Node::Unary { out, a, da });
        out
    }

    /// Record a binary operation. Constant operands are dropped, so the node
    /// may shrink to unary or vanish entirely.
    #[inline]
    pub fn push_binary(&mut self, value: F, a: u32, da: F, b: u32, db: F) -> u32 {
        match (a == CONSTANT, b == CONSTANT) {
            (true, true) => CONSTANT,
            (false, true) => self.push_unary(value, a, da),
            (true, false) => self.push_unary(value, b, db),
            (false, false) => {
                let out = self.push_slot(value);
                self.nodes.alloc(Node::Binary { out, a, b, da, db });
                out
            }
        }
    }

    /// Record a ternary operation, dropping constant operands.
    #[allow(clippy::too_many_arguments)]
    pub fn push_ternary(&mut self, value: F, a: u32, da: F, b: u32, db: F, c: u32, dc: F) -> u32 {
        if a == CONSTANT {
            return self.push_binary(value, b, db, c, dc);
        }
        if b == CONSTANT {
            return self.push_binary(value, a, da, c, dc);
        }
        if c == CONSTANT {
            return self.push_binary(value, a, da, b, db);
        }
        let out = self.push_slot(value);
        self.nodes.alloc(Node::Ternary {
            out,
            a,
            b,
            c,
            da,
            db,
            dc,
        });
        out
    }

    /// Record an operation over a list of operands plus up to two extra
    /// scalar operands, each with a precomputed partial.
    ///
    /// # Panics
    ///
    /// Panics if `operands` and `partials` differ in length or `extra` has
    /// more than two entries.
    pub fn push_nary(&mut self, value: F, operands: &[u32], partials: &[F], extra: &[(u32, F)]) -> u32 {
        assert_eq!(
            operands.len(),
            partials.len(),
            "operands and partials must have the same length"
        );
        assert!(extra.len() <= 2, "at most two extra operands");

        let live = operands.iter().filter(|&&i| i != CONSTANT).count();
        let mut extras = [(CONSTANT, F::zero()); 2];
        let mut num_extra = 0u8;
        for &(i, d) in extra.iter().filter(|(i, _)| *i != CONSTANT) {
            extras[num_extra as usize] = (i, d);
            num_extra += 1;
        }
        if live == 0 && num_extra == 0 {
            return CONSTANT;
        }

        let ops = self.store.indices.alloc_fill(live, CONSTANT);
        let pars = self.store.reals.alloc_fill(live, F::zero());
        let mut k = 0;
        for (&i, &d) in operands.iter().zip(partials) {
            if i != CONSTANT {
                *self.store.indices.get_mut(ops.start + k) = i;
                *self.store.reals.get_mut(pars.start + k) = d;
                k += 1;
            }
        }

        let out = self.push_slot(value);
        self.nodes.alloc(Node::Nary {
            out,
            operands: ops,
            partials: pars,
            extra: extras,
            num_extra,
        });
        out
    }

    /// Record an array whose cells take their values (and pass their
    /// adjoints on to) `operands`. Constant operands are kept positionally and
    /// skipped by the sweep.
    pub fn push_gather(&mut self, operands: &[u32], values: &[F]) -> Span {
        assert_eq!(operands.len(), values.len());
        if operands.iter().all(|&i| i == CONSTANT) {
            return self.new_variables(values);
        }
        let out = self.store.slots.alloc_fill(values.len(), Slot::default());
        for (slot, &value) in self.store.slots.slice_mut(out).iter_mut().zip(values) {
            *slot = Slot::new(value);
        }
        let ops = self.store.indices.alloc_slice(operands);
        self.nodes.alloc(Node::Gather { out, operands: ops });
        out
    }

    /// Overwrite `cells` with `values` in place and record one batched entry
    /// that undoes it during the sweep.
    ///
    /// The caller guarantees `cells` is free of duplicates and that all three
    /// slices have the same length.
    pub fn push_assign(&mut self, cells: &[u32], sources: &[u32], values: &[F]) {
        debug_assert!(cells.len() == sources.len() && cells.len() == values.len());
        if cells.is_empty() {
            return;
        }
        let cell_span = self.store.indices.alloc_slice(cells);
        let source_span = self.store.indices.alloc_slice(sources);
        let old = self.store.reals.alloc_fill(cells.len(), F::zero());
        for (k, &cell) in cells.iter().enumerate() {
            *self.store.reals.get_mut(old.start + k as u32) = self.store.slots.get(cell).value;
        }
        let new = self.store.reals.alloc_slice(values);
        for (&cell, &value) in cells.iter().zip(values) {
            self.store.slots.get_mut(cell).value = value;
        }

        let id = self.nodes.alloc(Node::Assign {
            cells: cell_span,
            sources: source_span,
            old,
            new,
        });
        self.assigns.alloc(id);
    }

    // ── Slot access ──

    /// Current forward value of `index` (zero for [`CONSTANT`]).
    #[inline]
    pub fn value(&self, index: u32) -> F {
        if index == CONSTANT {
            F::zero()
        } else {
            self.store.slots.get(index).value
        }
    }

    /// Adjoint accumulated at `index` by the last sweep.
    #[inline]
    pub fn adjoint(&self, index: u32) -> F {
        if index == CONSTANT {
            F::zero()
        } else {
            self.store.slots.get(index).adjoint
        }
    }

    /// Values of a contiguous slot run.
    pub fn values(&self, span: Span) -> Vec<F> {
        self.store.slots.slice(span).iter().map(|s| s.value).collect()
    }

    /// Adjoints of a contiguous slot run.
    pub fn adjoints(&self, span: Span) -> Vec<F> {
        self.store.slots.slice(span).iter().map(|s| s.adjoint).collect()
    }

    // ── Backward pass ──

    /// Zero every adjoint owned by the active segment.
    pub fn zero_adjoints(&mut self) {
        let seg = self.active();
        self.store
            .slots
            .for_each_since(seg.slots, |slot| slot.adjoint = F::zero());
    }

    /// Seed `output` with 1 and sweep the active segment in reverse.
    ///
    /// Afterwards every slot's adjoint holds d(output)/d(slot) restricted to
    /// paths recorded in the active segment. Batched assignments are replayed
    /// once the sweep is done, leaving forward values as they were before the
    /// call.
    pub fn reverse(&mut self, output: u32) {
        self.zero_adjoints();
        if output == CONSTANT {
            return;
        }
        self.store.slots.get_mut(output).adjoint = F::one();

        let seg = self.active();
        let start = seg.nodes.position() as u32;
        let end = self.nodes.len() as u32;
        tracing::trace!(nodes = end - start, depth = self.nesting_depth(), "reverse sweep");
        for i in (start..end).rev() {
            let node = self.nodes.get(i);
            node.propagate(&mut self.store, &mut self.scratch);
        }

        let first = seg.assigns.position() as u32;
        for k in first..self.assigns.len() as u32 {
            let node = self.nodes.get(self.assigns.get(k));
            node.replay(&mut self.store);
        }
    }

    /// Gradient of `output` with respect to `inputs`.
    ///
    /// Inputs may belong to an enclosing segment; their adjoints are cleared
    /// before the sweep so only paths through the active segment count.
    pub fn gradient(&mut self, output: u32, inputs: &[u32]) -> Vec<F> {
        for &i in inputs {
            if i != CONSTANT {
                self.store.slots.get_mut(i).adjoint = F::zero();
            }
        }
        self.reverse(output);
        inputs.iter().map(|&i| self.adjoint(i)).collect()
    }

    // ── Nesting and rewind ──

    /// Open a nested context. Nodes recorded from now on belong to a new
    /// segment that sweeps and rewinds independently of its parents.
    pub fn begin_nested(&mut self) {
        let marks = self.current_marks();
        self.segments.push(marks);
        tracing::debug!(depth = self.nesting_depth(), "begin nested context");
    }

    /// Discard the innermost nested context and reactivate its parent.
    ///
    /// Array cells overwritten by assignments inside the context get their
    /// previous values back, so the parent sees the state it recorded.
    ///
    /// # Panics
    ///
    /// Panics if no nested context is open.
    pub fn end_nested(&mut self) {
        assert!(self.segments.len() > 1, "end_nested without begin_nested");
        if let Some(seg) = self.segments.pop() {
            let first = seg.assigns.position() as u32;
            for k in (first..self.assigns.len() as u32).rev() {
                let node = self.nodes.get(self.assigns.get(k));
                node.restore(&mut self.store);
            }
            self.rewind_to(seg);
        }
        tracing::debug!(depth = self.nesting_depth(), "end nested context");
    }

    fn rewind_to(&mut self, seg: Segment) {
        self.nodes.rewind(seg.nodes);
        self.assigns.rewind(seg.assigns);
        self.store.slots.rewind(seg.slots);
        self.store.indices.rewind(seg.indices);
        self.store.reals.rewind(seg.reals);
    }

    /// Discard every node, slot and nested context, keeping the arena blocks
    /// for the next evaluation.
    ///
    /// Handles created before the rewind must not be used afterwards.
    pub fn rewind(&mut self) {
        let root = self.segments[0];
        self.segments.truncate(1);
        self.rewind_to(root);
        tracing::debug!(capacity = self.stats().capacity, "tape rewound");
    }
}

// Thread-local active tape pointer.
thread_local! {
    static TAPE_F32: Cell<*mut Tape<f32>> = const { Cell::new(std::ptr::null_mut()) };
    static TAPE_F64: Cell<*mut Tape<f64>> = const { Cell::new(std::ptr::null_mut()) };
}

/// Selects the thread-local tape slot for a float type.
pub trait TapeThreadLocal: Float {
    fn cell() -> &'static std::thread::LocalKey<Cell<*mut Tape<Self>>>;
}

impl TapeThreadLocal for f32 {
    fn cell() -> &'static std::thread::LocalKey<Cell<*mut Tape<Self>>> {
        &TAPE_F32
    }
}

impl TapeThreadLocal for f64 {
    fn cell() -> &'static std::thread::LocalKey<Cell<*mut Tape<Self>>> {
        &TAPE_F64
    }
}

/// Whether a tape of this float type is active on the current thread.
pub fn has_active_tape<F: TapeThreadLocal>() -> bool {
    F::cell().with(|cell| !cell.get().is_null())
}

/// Access the active tape for the current thread. Panics if no tape is active.
///
/// `f` must not itself call back into `with_active_tape`.
#[inline]
pub fn with_active_tape<F: TapeThreadLocal, R>(f: impl FnOnce(&mut Tape<F>) -> R) -> R {
    F::cell().with(|cell| {
        let ptr = cell.get();
        assert!(
            !ptr.is_null(),
            "No active tape. Activate one with TapeGuard or use numbat::grad()."
        );
        // SAFETY: TapeGuard keeps the pointee alive for the guard's scope,
        // and the thread-local makes this the only live reference on this
        // thread for the duration of the closure.
        let tape = unsafe { &mut *ptr };
        f(tape)
    })
}

/// RAII guard that makes a tape the thread-local active tape and restores the
/// previous one on drop.
pub struct TapeGuard<F: TapeThreadLocal> {
    prev: *mut Tape<F>,
}

impl<F: TapeThreadLocal> TapeGuard<F> {
    pub fn new(tape: &mut Tape<F>) -> Self {
        let prev = F::cell().with(|cell| {
            let prev = cell.get();
            cell.set(tape as *mut Tape<F>);
            prev
        });
        TapeGuard { prev }
    }
}

impl<F: TapeThreadLocal> Drop for TapeGuard<F> {
    fn drop(&mut self) {
        F::cell().with(|cell| {
            cell.set(self.prev);
        });
    }
}

/// Open a nested context on the active tape.
pub fn begin_nested<F: TapeThreadLocal>() {
    with_active_tape(|t: &mut Tape<F>| t.begin_nested());
}

/// Close the innermost nested context on the active tape.
pub fn end_nested<F: TapeThreadLocal>() {
    with_active_tape(|t: &mut Tape<F>| t.end_nested());
}

/// Rewind the active tape completely.
pub fn rewind_active<F: TapeThreadLocal>() {
    with_active_tape(|t: &mut Tape<F>| t.rewind());
}

/// Nested context on the active tape that closes itself on drop.
///
/// ```
/// use numbat::tape::{NestedGuard, Tape, TapeGuard};
/// use numbat::Var;
///
/// let mut tape = Tape::<f64>::new();
/// let _guard = TapeGuard::new(&mut tape);
/// let x = Var::new(3.0);
/// {
///     let _nested = NestedGuard::<f64>::new();
///     let y = x * x;
///     assert_eq!(numbat::gradient(y, &[x]), vec![6.0]);
/// }
/// ```
pub struct NestedGuard<F: TapeThreadLocal> {
    _marker: PhantomData<*mut Tape<F>>,
}

impl<F: TapeThreadLocal> NestedGuard<F> {
    pub fn new() -> Self {
        begin_nested::<F>();
        NestedGuard {
            _marker: PhantomData,
        }
    }
}

impl<F: TapeThreadLocal> Default for NestedGuard<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: TapeThreadLocal> Drop for NestedGuard<F> {
    fn drop(&mut self) {
        end_nested::<F>();
    }
}
