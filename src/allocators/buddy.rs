//! Binary buddy allocator.
//!
//! Manages one address space of `capacity` unit slots through an implicit
//! binary tree of power-of-two blocks. Requests round up to the next power
//! of two; freeing a block merges it with its buddy whenever the buddy is
//! also free, so any maximal free block is represented by exactly one
//! `Unused` node.

use crate::traits::{BufferProvider, RangeAllocator};

/// State of one tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeState {
    /// Free and unsplit.
    Unused,
    /// Handed out whole to a caller.
    Used,
    /// Has children with mixed state.
    Split,
    /// This node and all descendants have zero free capacity.
    Full,
}

/// Buddy allocator over `[0, capacity)`.
///
/// The tree spans the smallest power of two `P >= capacity`; blocks that
/// would land in the padding region `[capacity, P)` never satisfy
/// allocations. Search is left-first, so the lowest fitting offset wins:
/// freeing offset 0 and allocating the same size again always lands back
/// at offset 0.
///
/// ```
/// use rangealloc::BuddyAllocator;
///
/// let mut buddy = BuddyAllocator::new(8);
/// assert_eq!(buddy.allocate(3), Some(0)); // rounds up to 4
/// assert_eq!(buddy.allocate(4), Some(4));
/// assert_eq!(buddy.allocate(1), None);
/// buddy.destroy(0);
/// assert_eq!(buddy.allocate(1), Some(0));
/// ```
#[derive(Debug, Clone)]
pub struct BuddyAllocator {
    tree: Vec<NodeState>,
    capacity: usize,
}

impl BuddyAllocator {
    /// Create an allocator over `[0, capacity)`.
    pub fn new(capacity: usize) -> Self {
        // Full binary tree over the next power of two.
        let virt = capacity.next_power_of_two();
        Self {
            tree: vec![NodeState::Unused; 2 * virt - 1],
            capacity,
        }
    }

    /// Total capacity in slots.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Reserve `size` slots (rounded up to a power of two internally).
    ///
    /// A zero-size request is treated as a request for one slot. Returns
    /// `None` when no block of the rounded size fits within capacity.
    pub fn allocate(&mut self, size: usize) -> Option<usize> {
        let request = size.max(1);
        let block = request.next_power_of_two();
        let virt = self.capacity.next_power_of_two();
        let mut node_len = virt;
        if block > node_len {
            return None;
        }

        let mut node: isize = 0;
        while node >= 0 {
            let idx = node as usize;
            if block == node_len {
                if self.tree[idx] == NodeState::Unused {
                    let offset = (idx + 1) * node_len - virt;
                    // Blocks poking into the padding region are unusable.
                    if offset + request > self.capacity {
                        return None;
                    }
                    self.tree[idx] = NodeState::Used;
                    self.mark_ancestors_full(idx);
                    return Some(offset);
                }
            } else {
                if self.tree[idx] == NodeState::Unused {
                    self.tree[idx] = NodeState::Split;
                    self.tree[2 * idx + 1] = NodeState::Unused;
                    self.tree[2 * idx + 2] = NodeState::Unused;
                }
                if self.tree[idx] == NodeState::Split {
                    // Left-first descent keeps offsets low.
                    node = node * 2 + 1;
                    node_len /= 2;
                    continue;
                }
            }
            // No room under this node. Left children move to their right
            // sibling; right children climb until they can.
            if node % 2 != 0 {
                node += 1;
                continue;
            }
            loop {
                node_len *= 2;
                node = (node + 1) / 2 - 1;
                if node < 0 {
                    return None;
                }
                if node % 2 != 0 {
                    node += 1;
                    break;
                }
            }
        }
        None
    }

    /// Free the block starting at `offset`, merging with its buddy where
    /// possible.
    ///
    /// # Panics
    ///
    /// Panics if `offset` is out of range or does not match the start of an
    /// outstanding allocation.
    pub fn destroy(&mut self, offset: usize) {
        assert!(
            offset < self.capacity,
            "buddy destroy: offset {offset} out of range (capacity {})",
            self.capacity
        );
        let mut node_len = self.capacity.next_power_of_two();
        let mut node: usize = 0;
        let mut left: usize = 0;
        loop {
            match self.tree[node] {
                NodeState::Used => {
                    assert!(
                        offset == left,
                        "buddy destroy: offset {offset} is not an allocation boundary"
                    );
                    self.merge(node);
                    return;
                }
                NodeState::Unused => {
                    panic!("buddy destroy: offset {offset} is not allocated");
                }
                NodeState::Split | NodeState::Full => {
                    node_len /= 2;
                    if offset < left + node_len {
                        node = node * 2 + 1;
                    } else {
                        left += node_len;
                        node = node * 2 + 2;
                    }
                }
            }
        }
    }

    /// Walk up from a freshly used node, marking each ancestor `Full` while
    /// its other child is also fully allocated.
    fn mark_ancestors_full(&mut self, index: usize) {
        let mut now = index as isize;
        loop {
            let buddy = now - 1 + if now % 2 == 0 { 0 } else { 2 };
            if buddy > 0
                && matches!(
                    self.tree[buddy as usize],
                    NodeState::Used | NodeState::Full
                )
            {
                now = (now + 1) / 2 - 1;
                self.tree[now as usize] = NodeState::Full;
            } else {
                break;
            }
        }
    }

    /// Free `index` and merge upward while its buddy is also free. Once a
    /// buddy blocks the merge, the merged node becomes `Unused` and the
    /// remaining ancestors downgrade from `Full` to `Split`.
    fn merge(&mut self, index: usize) {
        let mut now = index as isize;
        loop {
            let buddy = now - 1 + if now % 2 == 0 { 0 } else { 2 };
            if buddy < 0 || self.tree[buddy as usize] != NodeState::Unused {
                self.tree[now as usize] = NodeState::Unused;
                loop {
                    now = (now + 1) / 2 - 1;
                    if now >= 0 && self.tree[now as usize] == NodeState::Full {
                        self.tree[now as usize] = NodeState::Split;
                    } else {
                        return;
                    }
                }
            }
            now = (now + 1) / 2 - 1;
        }
    }
}

impl RangeAllocator for BuddyAllocator {
    fn allocate(&mut self, size: usize) -> Option<usize> {
        BuddyAllocator::allocate(self, size)
    }

    fn destroy(&mut self, offset: usize) {
        BuddyAllocator::destroy(self, offset)
    }
}

/// A buddy allocator can also serve as the buffer source behind a
/// [`LinearAllocator`](crate::LinearAllocator): acquired handles are block
/// offsets within the buddy space.
impl BufferProvider for BuddyAllocator {
    type Handle = usize;

    fn acquire(&mut self, size: usize) -> Option<usize> {
        self.allocate(size)
    }

    fn release(&mut self, offset: usize) {
        self.destroy(offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tiny_capacity() {
        let mut buddy = BuddyAllocator::new(2);
        assert_eq!(buddy.allocate(114514), None);
        assert_eq!(buddy.allocate(1), Some(0));
        assert_eq!(buddy.allocate(1), Some(1));
        assert_eq!(buddy.allocate(1), None);
    }

    #[test]
    fn test_whole_space() {
        let mut buddy = BuddyAllocator::new(2);
        assert_eq!(buddy.allocate(2), Some(0));
        assert_eq!(buddy.allocate(1), None);
    }

    #[test]
    fn test_capacity_one() {
        let mut buddy = BuddyAllocator::new(1);
        assert_eq!(buddy.allocate(1), Some(0));
        assert_eq!(buddy.allocate(1), None);
    }

    #[test]
    fn test_non_power_of_two_exact() {
        let mut buddy = BuddyAllocator::new(3);
        assert_eq!(buddy.allocate(3), Some(0));
        assert_eq!(buddy.allocate(1), None);
    }

    #[test]
    fn test_padding_region_partially_usable() {
        // Capacity 5 over a virtual tree of 8: a 4-block at 0, then one
        // unit at 4; the rest is padding and never handed out.
        let mut buddy = BuddyAllocator::new(5);
        assert_eq!(buddy.allocate(3), Some(0));
        assert_eq!(buddy.allocate(1), Some(4));
        assert_eq!(buddy.allocate(1), None);
    }

    #[test]
    fn test_rounding_wastes_tail() {
        let mut buddy = BuddyAllocator::new(31);
        assert_eq!(buddy.allocate(17), Some(0)); // rounds to 32, spans everything
        assert_eq!(buddy.allocate(14), None);
    }

    #[test]
    fn test_sub_block_packing() {
        let mut buddy = BuddyAllocator::new(8);
        assert_eq!(buddy.allocate(4), Some(0));
        assert_eq!(buddy.allocate(1), Some(4));
        assert_eq!(buddy.allocate(2), Some(6));
    }

    #[test]
    fn test_split_and_merge() {
        let mut buddy = BuddyAllocator::new(8);
        assert_eq!(buddy.allocate(4), Some(0));
        buddy.destroy(0);
        assert_eq!(buddy.allocate(2), Some(0));
        assert_eq!(buddy.allocate(2), Some(2));
        assert_eq!(buddy.allocate(4), Some(4));
        buddy.destroy(2);
        assert_eq!(buddy.allocate(1), Some(2));
        assert_eq!(buddy.allocate(1), Some(3));
    }

    #[test]
    fn test_merge_restores_full_block() {
        let mut buddy = BuddyAllocator::new(8);
        let a = buddy.allocate(2).unwrap();
        let b = buddy.allocate(2).unwrap();
        let c = buddy.allocate(4).unwrap();
        buddy.destroy(a);
        buddy.destroy(b);
        buddy.destroy(c);
        // Everything merged back: the whole space is one block again.
        assert_eq!(buddy.allocate(8), Some(0));
    }

    #[test]
    fn test_round_trip_determinism() {
        let mut buddy = BuddyAllocator::new(16);
        for _ in 0..32 {
            let offset = buddy.allocate(4).unwrap();
            assert_eq!(offset, 0);
            buddy.destroy(offset);
        }
    }

    #[test]
    fn test_zero_size_treated_as_one() {
        let mut buddy = BuddyAllocator::new(2);
        assert_eq!(buddy.allocate(0), Some(0));
        assert_eq!(buddy.allocate(0), Some(1));
        assert_eq!(buddy.allocate(0), None);
    }

    #[test]
    fn test_zero_capacity_never_allocates() {
        let mut buddy = BuddyAllocator::new(0);
        assert_eq!(buddy.allocate(1), None);
    }

    #[test]
    #[should_panic(expected = "not allocated")]
    fn test_destroy_free_offset_panics() {
        let mut buddy = BuddyAllocator::new(8);
        buddy.destroy(0);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_destroy_out_of_range_panics() {
        let mut buddy = BuddyAllocator::new(8);
        buddy.allocate(8).unwrap();
        buddy.destroy(9);
    }

    #[test]
    #[should_panic(expected = "allocation boundary")]
    fn test_destroy_interior_offset_panics() {
        let mut buddy = BuddyAllocator::new(8);
        buddy.allocate(4).unwrap();
        buddy.destroy(2);
    }

    #[test]
    fn test_used_ranges_stay_disjoint() {
        // Mixed allocate/destroy driven by a small LCG; every outstanding
        // range must stay disjoint and inside [0, capacity).
        let capacity = 64;
        let mut buddy = BuddyAllocator::new(capacity);
        let mut live: Vec<(usize, usize)> = Vec::new();
        let mut state: u64 = 0x9E3779B97F4A7C15;
        let mut next = move || {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            (state >> 33) as usize
        };

        for _ in 0..500 {
            if next() % 3 != 0 || live.is_empty() {
                let size = 1 << (next() % 5); // 1..=16
                if let Some(offset) = buddy.allocate(size) {
                    assert!(offset + size <= capacity);
                    for &(o, s) in &live {
                        assert!(offset + size <= o || o + s <= offset);
                    }
                    live.push((offset, size));
                }
            } else {
                let victim = next() % live.len();
                let (offset, _) = live.swap_remove(victim);
                buddy.destroy(offset);
            }
        }
    }
}
