//! Free-list allocator with coalescing.
//!
//! No power-of-two rounding: requests are satisfied exactly, first-fit in
//! ascending offset order. Freed ranges merge immediately with free
//! neighbours, so the free set never contains two adjacent ranges. Exact
//! fits avoid internal fragmentation at the cost of a list scan per
//! allocation and possible external fragmentation.

use std::collections::HashMap;

use crate::traits::RangeAllocator;

/// One free range `[offset, offset + length)`.
#[derive(Debug, Clone, Copy)]
struct FreeRange {
    offset: usize,
    length: usize,
}

/// First-fit free-list allocator over `[0, capacity)`.
///
/// ```
/// use rangealloc::FreeListAllocator;
///
/// let mut list = FreeListAllocator::new(8);
/// assert_eq!(list.allocate(3), Some(0)); // no rounding
/// assert_eq!(list.allocate(5), Some(3));
/// list.destroy(0);
/// assert_eq!(list.allocate(2), Some(0));
/// ```
#[derive(Debug, Clone)]
pub struct FreeListAllocator {
    capacity: usize,
    /// Free ranges sorted by offset; disjoint and never adjacent.
    free: Vec<FreeRange>,
    /// Outstanding allocations, offset -> length.
    used: HashMap<usize, usize>,
}

impl FreeListAllocator {
    /// Create an allocator over `[0, capacity)`.
    pub fn new(capacity: usize) -> Self {
        let mut free = Vec::new();
        if capacity > 0 {
            free.push(FreeRange {
                offset: 0,
                length: capacity,
            });
        }
        Self {
            capacity,
            free,
            used: HashMap::new(),
        }
    }

    /// Total capacity in slots.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Reserve exactly `size` slots at the lowest-offset fitting range.
    pub fn allocate(&mut self, size: usize) -> Option<usize> {
        if size == 0 || size > self.capacity {
            return None;
        }
        let pos = self.free.iter().position(|r| r.length >= size)?;
        let offset = self.free[pos].offset;
        if self.free[pos].length == size {
            self.free.remove(pos);
        } else {
            self.free[pos].offset += size;
            self.free[pos].length -= size;
        }
        self.used.insert(offset, size);
        Some(offset)
    }

    /// Free the range starting at `offset`, coalescing with free
    /// neighbours.
    ///
    /// # Panics
    ///
    /// Panics if `offset` is not the start of an outstanding allocation.
    pub fn destroy(&mut self, offset: usize) {
        let length = match self.used.remove(&offset) {
            Some(length) => length,
            None => panic!("free-list destroy: offset {offset} is not allocated"),
        };
        let pos = self.free.partition_point(|r| r.offset < offset);
        let merge_prev =
            pos > 0 && self.free[pos - 1].offset + self.free[pos - 1].length == offset;
        let merge_next = pos < self.free.len() && offset + length == self.free[pos].offset;
        match (merge_prev, merge_next) {
            (true, true) => {
                let next_length = self.free[pos].length;
                self.free[pos - 1].length += length + next_length;
                self.free.remove(pos);
            }
            (true, false) => self.free[pos - 1].length += length,
            (false, true) => {
                self.free[pos].offset = offset;
                self.free[pos].length += length;
            }
            (false, false) => self.free.insert(pos, FreeRange { offset, length }),
        }
    }

    /// Number of outstanding allocations.
    pub fn live_allocations(&self) -> usize {
        self.used.len()
    }

    /// True when nothing is currently allocated.
    pub fn is_empty(&self) -> bool {
        self.used.is_empty()
    }
}

impl RangeAllocator for FreeListAllocator {
    fn allocate(&mut self, size: usize) -> Option<usize> {
        FreeListAllocator::allocate(self, size)
    }

    fn destroy(&mut self, offset: usize) {
        FreeListAllocator::destroy(self, offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_invariants(list: &FreeListAllocator) {
        for pair in list.free.windows(2) {
            assert!(
                pair[0].offset + pair[0].length < pair[1].offset,
                "adjacent free ranges were not coalesced"
            );
        }
    }

    #[test]
    fn test_sequential_fill() {
        let mut list = FreeListAllocator::new(2);
        assert_eq!(list.allocate(1), Some(0));
        assert_eq!(list.allocate(1), Some(1));
        assert_eq!(list.allocate(1), None);
    }

    #[test]
    fn test_coalesce_middle_runs() {
        let mut list = FreeListAllocator::new(16);
        let offsets: Vec<usize> = (0..6).map(|_| list.allocate(1).unwrap()).collect();
        assert_eq!(offsets, vec![0, 1, 2, 3, 4, 5]);

        for offset in [1, 2, 3, 4] {
            list.destroy(offset);
            assert_invariants(&list);
        }
        // The four freed units merged into one range at offset 1.
        assert_eq!(list.allocate(4), Some(1));
    }

    #[test]
    fn test_exact_fit_reuse() {
        let mut list = FreeListAllocator::new(8);
        assert_eq!(list.allocate(2), Some(0));
        assert_eq!(list.allocate(3), Some(2));
        list.destroy(0);
        assert_eq!(list.allocate(1), Some(0));
        list.destroy(2);
        assert_invariants(&list);
        // [1, 6) is free after coalescing with the tail of the first block.
        assert_eq!(list.allocate(5), Some(1));
    }

    #[test]
    fn test_over_allocate() {
        let mut list = FreeListAllocator::new(4);
        assert_eq!(list.allocate(2), Some(0));
        assert_eq!(list.allocate(3), None);
        list.destroy(0);
        assert_eq!(list.allocate(4), Some(0));
    }

    #[test]
    fn test_fragmentation_first_fit() {
        let mut list = FreeListAllocator::new(10);
        assert_eq!(list.allocate(3), Some(0));
        assert_eq!(list.allocate(2), Some(3));
        assert_eq!(list.allocate(4), Some(5));
        list.destroy(3);
        // The hole at 3 is the first fit for a 2-unit request.
        assert_eq!(list.allocate(2), Some(3));
        assert_eq!(list.allocate(1), Some(9));
        assert_eq!(list.allocate(1), None);
    }

    #[test]
    fn test_capacity_one() {
        let mut list = FreeListAllocator::new(1);
        assert_eq!(list.allocate(1), Some(0));
        assert_eq!(list.allocate(1), None);
        list.destroy(0);
        assert_eq!(list.allocate(1), Some(0));
    }

    #[test]
    fn test_zero_size_rejected() {
        let mut list = FreeListAllocator::new(4);
        assert_eq!(list.allocate(0), None);
    }

    #[test]
    #[should_panic(expected = "not allocated")]
    fn test_destroy_unknown_offset_panics() {
        let mut list = FreeListAllocator::new(4);
        list.allocate(2).unwrap();
        list.destroy(1);
    }

    #[test]
    fn test_coalescing_is_maximal_under_churn() {
        let mut list = FreeListAllocator::new(64);
        let mut live: Vec<usize> = Vec::new();
        let mut state: u64 = 0x853C49E6748FEA9B;
        let mut next = move || {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            (state >> 33) as usize
        };

        for _ in 0..500 {
            if next() % 3 != 0 || live.is_empty() {
                let size = 1 + next() % 7;
                if let Some(offset) = list.allocate(size) {
                    live.push(offset);
                }
            } else {
                let victim = next() % live.len();
                list.destroy(live.swap_remove(victim));
            }
            assert_invariants(&list);
        }
        for offset in live {
            list.destroy(offset);
        }
        assert_invariants(&list);
        // Fully freed: one maximal range covering everything.
        assert_eq!(list.free.len(), 1);
        assert_eq!(list.allocate(64), Some(0));
    }
}
