//! Chunked bump arena with mark/rewind.
//!
//! Block `k` holds `base << k` elements, so a global element index resolves to
//! its block in O(1) and elements never move once written. Nothing is freed
//! individually: [`Arena::rewind`] drops everything past a mark in one step and
//! keeps the blocks around for the next evaluation.

/// Default number of elements in the first block.
pub const DEFAULT_BLOCK_SIZE: usize = 1 << 10;

/// A contiguous run of arena elements.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Span {
    pub start: u32,
    pub len: u32,
}

impl Span {
    /// The empty span.
    pub const EMPTY: Span = Span { start: 0, len: 0 };

    #[inline]
    pub fn len(&self) -> usize {
        self.len as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Global indices covered by this span.
    #[inline]
    pub fn indices(&self) -> std::ops::Range<u32> {
        self.start..self.start + self.len
    }
}

/// Saved arena length, restored by [`Arena::rewind`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ArenaMark {
    len: u32,
}

impl ArenaMark {
    /// Global index of the first element allocated after this mark.
    #[inline]
    pub fn position(&self) -> usize {
        self.len as usize
    }
}

/// Bump allocator over `Copy` elements.
pub struct Arena<T: Copy + Default> {
    blocks: Vec<Vec<T>>,
    base: usize,
    len: usize,
}

impl<T: Copy + Default> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Copy + Default> Arena<T> {
    /// Create an empty arena with [`DEFAULT_BLOCK_SIZE`].
    pub fn new() -> Self {
        Self::with_block_size(DEFAULT_BLOCK_SIZE)
    }

    /// Create an empty arena whose first block holds `base` elements.
    ///
    /// `base` is rounded up to at least 1. No memory is reserved until the
    /// first allocation.
    pub fn with_block_size(base: usize) -> Self {
        Arena {
            blocks: Vec::new(),
            base: base.max(1),
            len: 0,
        }
    }

    /// Number of live elements (including padding skipped by slice allocation).
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of blocks opened so far (kept across rewinds).
    #[inline]
    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// Total element capacity of all opened blocks.
    pub fn capacity(&self) -> usize {
        self.block_start(self.blocks.len())
    }

    /// Global index of the first element of block `k`.
    #[inline]
    fn block_start(&self, k: usize) -> usize {
        self.base * ((1usize << k) - 1)
    }

    #[inline]
    fn block_capacity(&self, k: usize) -> usize {
        self.base << k
    }

    /// Resolve a global index to `(block, offset)`.
    #[inline]
    fn locate(&self, index: usize) -> (usize, usize) {
        let q = index / self.base + 1;
        let k = (usize::BITS - 1 - q.leading_zeros()) as usize;
        (k, index - self.block_start(k))
    }

    /// Make sure block `k` exists, opening (or reusing) blocks as needed.
    fn ensure_block(&mut self, k: usize) {
        while self.blocks.len() <= k {
            let cap = self.block_capacity(self.blocks.len());
            tracing::trace!(
                block = self.blocks.len(),
                capacity = cap,
                "arena opened a new block"
            );
            self.blocks.push(Vec::with_capacity(cap));
        }
    }

    /// Append `n` copies of `fill` at the current cursor without crossing a
    /// block boundary. The caller guarantees `n` fits in the current block.
    fn push_within_block(&mut self, n: usize, fill: T) {
        let (k, offset) = self.locate(self.len);
        self.ensure_block(k);
        let block = &mut self.blocks[k];
        debug_assert_eq!(block.len(), offset);
        block.resize(offset + n, fill);
        self.len += n;
    }

    /// Skip to a block able to hold `n` contiguous elements, padding the tail
    /// of every block passed over with `T::default()`.
    fn reserve_contiguous(&mut self, n: usize) {
        loop {
            let (k, offset) = self.locate(self.len);
            let room = self.block_capacity(k) - offset;
            if room >= n {
                return;
            }
            self.push_within_block(room, T::default());
        }
    }

    /// Allocate a single element and return its global index.
    #[inline]
    pub fn alloc(&mut self, value: T) -> u32 {
        let index = slot_index(self.len);
        self.push_within_block(1, value);
        index
    }

    /// Allocate `n` contiguous copies of `value`.
    pub fn alloc_fill(&mut self, n: usize, value: T) -> Span {
        if n == 0 {
            return Span::EMPTY;
        }
        self.reserve_contiguous(n);
        let start = slot_index(self.len);
        let last = slot_index(self.len + (n - 1));
        self.push_within_block(n, value);
        Span {
            start,
            len: last - start + 1,
        }
    }

    /// Copy `values` into a contiguous run of the arena.
    pub fn alloc_slice(&mut self, values: &[T]) -> Span {
        let span = self.alloc_fill(values.len(), T::default());
        self.slice_mut(span).copy_from_slice(values);
        span
    }

    #[inline]
    pub fn get(&self, index: u32) -> T {
        let (k, offset) = self.locate(index as usize);
        self.blocks[k][offset]
    }

    #[inline]
    pub fn get_mut(&mut self, index: u32) -> &mut T {
        let (k, offset) = self.locate(index as usize);
        &mut self.blocks[k][offset]
    }

    /// Borrow the elements of `span`.
    #[inline]
    pub fn slice(&self, span: Span) -> &[T] {
        if span.is_empty() {
            return &[];
        }
        let (k, offset) = self.locate(span.start as usize);
        &self.blocks[k][offset..offset + span.len()]
    }

    /// Mutably borrow the elements of `span`.
    #[inline]
    pub fn slice_mut(&mut self, span: Span) -> &mut [T] {
        if span.is_empty() {
            return &mut [];
        }
        let (k, offset) = self.locate(span.start as usize);
        &mut self.blocks[k][offset..offset + span.len()]
    }

    /// Visit every live element allocated since `mark`, in index order.
    pub fn for_each_since(&mut self, mark: ArenaMark, mut f: impl FnMut(&mut T)) {
        let start = mark.position();
        if start >= self.len {
            return;
        }
        let (k0, offset) = self.locate(start);
        for (k, block) in self.blocks.iter_mut().enumerate().skip(k0) {
            let from = if k == k0 { offset } else { 0 };
            for item in &mut block[from..] {
                f(item);
            }
        }
    }

    /// Capture the current cursor.
    #[inline]
    pub fn mark(&self) -> ArenaMark {
        let len = match u32::try_from(self.len) {
            Ok(len) => len,
            Err(_) => panic!("arena exhausted: {} elements exceed the u32 index space", self.len),
        };
        ArenaMark { len }
    }

    /// Invalidate everything allocated since `mark`.
    ///
    /// Elements are `Copy`, so no cleanup runs. Blocks stay allocated.
    pub fn rewind(&mut self, mark: ArenaMark) {
        let target = mark.len as usize;
        if target >= self.len {
            return;
        }
        let (k, offset) = self.locate(target);
        if let Some(block) = self.blocks.get_mut(k) {
            block.truncate(offset);
        }
        for block in self.blocks.iter_mut().skip(k + 1) {
            block.clear();
        }
        self.len = target;
    }

    /// Rewind to empty.
    pub fn clear(&mut self) {
        self.rewind(ArenaMark { len: 0 });
    }
}

/// Global index for arena position `pos`.
///
/// `u32::MAX` is the constant sentinel of the tape, so the usable index space
/// ends one short of it. Running past it is fatal.
#[inline]
fn slot_index(pos: usize) -> u32 {
    match u32::try_from(pos) {
        Ok(index) if index != u32::MAX => index,
        _ => panic!("arena exhausted: position {pos} exceeds the u32 index space"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locate_follows_geometric_blocks() {
        let arena: Arena<u32> = Arena::with_block_size(4);
        assert_eq!(arena.locate(0), (0, 0));
        assert_eq!(arena.locate(3), (0, 3));
        assert_eq!(arena.locate(4), (1, 0));
        assert_eq!(arena.locate(11), (1, 7));
        assert_eq!(arena.locate(12), (2, 0));
        assert_eq!(arena.locate(27), (2, 15));
        assert_eq!(arena.locate(28), (3, 0));
    }

    #[test]
    fn elements_survive_growth() {
        let mut arena: Arena<u32> = Arena::with_block_size(2);
        let ids: Vec<u32> = (0..100).map(|i| arena.alloc(i * 3)).collect();
        for (i, &id) in ids.iter().enumerate() {
            assert_eq!(arena.get(id), i as u32 * 3);
        }
        assert!(arena.num_blocks() >= 5);
    }

    #[test]
    fn slices_are_contiguous_across_block_boundaries() {
        let mut arena: Arena<f64> = Arena::with_block_size(4);
        arena.alloc(1.0);
        arena.alloc(2.0);
        // Only two elements left in block 0, so this must start in block 1.
        let span = arena.alloc_slice(&[1.0, 2.0, 3.0]);
        assert_eq!(span.start, 4);
        assert_eq!(arena.slice(span), &[1.0, 2.0, 3.0]);
        // Padding was inserted.
        assert_eq!(arena.len(), 7);
    }

    #[test]
    fn oversized_slice_skips_to_large_enough_block() {
        let mut arena: Arena<u32> = Arena::with_block_size(2);
        let span = arena.alloc_fill(10, 7);
        assert!(arena.slice(span).iter().all(|&v| v == 7));
        let (k, _) = arena.locate(span.start as usize);
        assert!(arena.block_capacity(k) >= 10);
    }

    #[test]
    fn rewind_discards_and_reuses_blocks() {
        let mut arena: Arena<u32> = Arena::with_block_size(2);
        arena.alloc(1);
        let mark = arena.mark();
        for i in 0..20 {
            arena.alloc(i);
        }
        let blocks = arena.num_blocks();
        arena.rewind(mark);
        assert_eq!(arena.len(), 1);
        assert_eq!(arena.get(0), 1);
        assert_eq!(arena.num_blocks(), blocks);

        let id = arena.alloc(42);
        assert_eq!(id, 1);
        assert_eq!(arena.get(id), 42);
    }

    #[test]
    fn rewind_forward_is_a_no_op() {
        let mut arena: Arena<u32> = Arena::new();
        let early = arena.mark();
        arena.alloc(5);
        let late = arena.mark();
        arena.rewind(early);
        arena.rewind(late);
        assert!(arena.is_empty());
    }

    #[test]
    fn for_each_since_spans_blocks() {
        let mut arena: Arena<u32> = Arena::with_block_size(2);
        arena.alloc(100);
        let mark = arena.mark();
        for i in 0..9 {
            arena.alloc(i);
        }
        arena.for_each_since(mark, |v| *v += 1);
        assert_eq!(arena.get(0), 100);
        let tail: Vec<u32> = (1..10).map(|i| arena.get(i)).collect();
        assert_eq!(tail, (1..10).collect::<Vec<u32>>());
    }

    #[test]
    fn empty_slice_allocates_nothing() {
        let mut arena: Arena<u32> = Arena::new();
        let span = arena.alloc_slice(&[]);
        assert!(span.is_empty());
        assert!(arena.slice(span).is_empty());
        assert_eq!(arena.len(), 0);
    }

    #[test]
    fn slot_index_stops_short_of_the_sentinel() {
        assert_eq!(slot_index(0), 0);
        assert_eq!(slot_index(u32::MAX as usize - 1), u32::MAX - 1);
    }

    #[test]
    #[should_panic(expected = "arena exhausted")]
    fn sentinel_position_is_fatal() {
        slot_index(u32::MAX as usize);
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    #[should_panic(expected = "arena exhausted")]
    fn position_past_u32_is_fatal() {
        slot_index(u32::MAX as usize + 7);
    }
}
