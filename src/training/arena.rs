//! Fixed-size histogram arena.
//!
//! One contiguous allocation holds every histogram slot a depth-first build
//! can need: `max_depth + 1` slots of `hist_size` accumulators each. Slots
//! are identified by their starting offset into the backing array; a LIFO
//! free list makes allocation and release O(1). The arena never resizes —
//! if it runs dry the depth accounting is wrong, which is a bug, not a
//! recoverable condition.

use super::stats::GradStats;

/// Pool of histogram slots addressed by offsets into one flat allocation.
#[derive(Debug)]
pub struct HistogramArena<S> {
    stats: Vec<S>,
    free: Vec<usize>,
    hist_size: usize,
    capacity: usize,
}

impl<S: GradStats> HistogramArena<S> {
    /// Create an arena of `slots` histograms of `hist_size` accumulators.
    pub fn new(slots: usize, hist_size: usize, value_size: usize) -> Self {
        Self {
            stats: vec![S::with_size(value_size); slots * hist_size],
            free: (0..slots).map(|i| i * hist_size).collect(),
            hist_size,
            capacity: slots,
        }
    }

    /// Pop a free slot and return its offset.
    ///
    /// # Panics
    /// Panics if no slot is free; the arena is sized so a depth-first build
    /// can never exhaust it.
    pub fn alloc(&mut self) -> usize {
        assert!(!self.free.is_empty(), "histogram arena exhausted");
        self.free.pop().unwrap()
    }

    /// Return a slot to the free list.
    pub fn release(&mut self, offset: usize) {
        debug_assert_eq!(offset % self.hist_size.max(1), 0);
        debug_assert!(self.free.len() < self.capacity);
        self.free.push(offset);
    }

    /// Immutable view of one slot.
    #[inline]
    pub fn slot(&self, offset: usize) -> &[S] {
        &self.stats[offset..offset + self.hist_size]
    }

    /// Mutable view of one slot.
    #[inline]
    pub fn slot_mut(&mut self, offset: usize) -> &mut [S] {
        &mut self.stats[offset..offset + self.hist_size]
    }

    /// Mutable view of slot `target` together with an immutable view of slot
    /// `other`.
    ///
    /// Slot offsets are multiples of `hist_size`, so two distinct slots can
    /// never overlap: splitting the backing array at the higher offset
    /// yields both.
    pub fn slot_pair_mut(&mut self, target: usize, other: usize) -> (&mut [S], &[S]) {
        assert_ne!(target, other, "slot offsets must differ");
        debug_assert!(target % self.hist_size.max(1) == 0 && other % self.hist_size.max(1) == 0);
        let len = self.hist_size;
        let low = target.min(other);
        let (head, tail) = self.stats.split_at_mut(target.max(other));
        if target < other {
            (&mut head[low..low + len], &tail[..len])
        } else {
            (&mut tail[..len], &head[low..low + len])
        }
    }

    /// Accumulators per slot.
    #[inline]
    pub fn hist_size(&self) -> usize {
        self.hist_size
    }

    /// Total number of slots.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Offsets currently on the free list, in LIFO order.
    #[inline]
    pub fn free_offsets(&self) -> &[usize] {
        &self.free
    }
}
