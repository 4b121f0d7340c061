//! Heap pool manager.
//!
//! [`BlockAllocator`] hides the cost of creating and destroying real
//! backing heaps behind a pool of `(heap, sub-allocator)` records. Requests
//! route to existing heaps first-fit in creation order; on a miss a new
//! heap sized `max(basic_size, size)` is created through the injected
//! [`HeapFactory`]. A heap whose sub-allocator drains to empty turns idle
//! instead of dying immediately; only when the idle count exceeds
//! `destroy_threshold` are the oldest idle heaps evicted. A threshold of
//! one lets a transiently empty heap survive an allocate/free cycle that
//! would otherwise churn a real GPU object through the driver every frame.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::traits::{HeapFactory, RangeAllocator};
use crate::util::size::format_bytes;

/// Distinguishes pools so a foreign allocation can never resolve here.
static NEXT_POOL_ID: AtomicU32 = AtomicU32::new(0);

/// Stable identifier for a heap owned by a [`BlockAllocator`].
///
/// A pool token plus an index/generation pair into the pool's slot table.
/// Slots are recycled after eviction with a bumped generation, so a stale
/// id can never resolve to the wrong heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HeapId {
    pool: u32,
    index: u32,
    generation: u32,
}

impl HeapId {
    /// Raw slot index (for debugging).
    pub fn raw_index(&self) -> u32 {
        self.index
    }

    /// Generation counter (for debugging).
    pub fn raw_generation(&self) -> u32 {
        self.generation
    }
}

/// Handle to a range carved out of a pooled heap.
///
/// `heap` is a non-owning back-reference used to route
/// [`BlockAllocator::destroy`] to the right sub-allocator; it stays valid
/// until the matching `destroy`, a pool [`reset`](BlockAllocator::reset),
/// or the pool itself going away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockAllocation {
    /// Owning heap.
    pub heap: HeapId,
    /// Starting offset within the heap.
    pub offset: usize,
    /// Requested length.
    pub size: usize,
}

/// Counters describing the current pool state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockAllocatorStats {
    /// Live heaps, idle ones included.
    pub heap_count: usize,
    /// Heaps with zero outstanding allocations.
    pub idle_heap_count: usize,
    /// Outstanding allocations across all heaps.
    pub live_allocations: usize,
    /// Total slots reserved by live heaps.
    pub reserved: usize,
}

/// One pooled heap and the sub-allocator scoped to it.
struct HeapRecord<H, S> {
    heap: H,
    sub: S,
    capacity: usize,
    live_allocs: usize,
    idle: bool,
}

/// Stable slot: the record may come and go, the generation only grows.
struct Slot<H, S> {
    record: Option<HeapRecord<H, S>>,
    generation: u32,
}

/// Pool of backing heaps, each managed by one sub-allocator.
///
/// ```
/// use rangealloc::{BlockAllocator, BuddyAllocator, HeapFactory};
///
/// struct Descriptors;
/// impl HeapFactory for Descriptors {
///     type Heap = Vec<u64>; // stand-in for a descriptor heap
///     type Sub = BuddyAllocator;
///     fn create_heap(&mut self, size: usize) -> Option<Vec<u64>> {
///         Some(vec![0; size])
///     }
///     fn create_sub_allocator(&mut self, size: usize) -> BuddyAllocator {
///         BuddyAllocator::new(size)
///     }
/// }
///
/// let mut pool = BlockAllocator::new(Descriptors, 256, 1);
/// let a = pool.allocate(64).unwrap();
/// assert_eq!(a.offset, 0);
/// assert!(pool.heap_handle(a.heap).is_some());
/// pool.destroy(a);
/// assert_eq!(pool.idle_heap_count(), 1); // kept warm for the next request
/// ```
pub struct BlockAllocator<F: HeapFactory> {
    factory: F,
    pool_id: u32,
    slots: Vec<Slot<F::Heap, F::Sub>>,
    /// Live slot indices in heap creation order.
    order: Vec<u32>,
    /// Recycled slot indices.
    free_slots: Vec<u32>,
    basic_size: usize,
    destroy_threshold: usize,
    idle_count: usize,
}

impl<F: HeapFactory> BlockAllocator<F> {
    /// Create a pool.
    ///
    /// `basic_size` is the default capacity for new heaps (requests larger
    /// than it get a heap of their own size); `destroy_threshold` is the
    /// number of simultaneously idle heaps tolerated before eviction.
    pub fn new(factory: F, basic_size: usize, destroy_threshold: usize) -> Self {
        Self {
            factory,
            pool_id: NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed),
            slots: Vec::new(),
            order: Vec::new(),
            free_slots: Vec::new(),
            basic_size,
            destroy_threshold,
            idle_count: 0,
        }
    }

    /// Reserve `size` slots from the first heap that can hold them, or
    /// from a newly created heap.
    ///
    /// Returns `None` for zero-size requests and when heap creation fails;
    /// a failed creation leaves no record behind.
    pub fn allocate(&mut self, size: usize) -> Option<BlockAllocation> {
        if size == 0 {
            return None;
        }
        for &index in &self.order {
            let slot = &mut self.slots[index as usize];
            let record = slot.record.as_mut().expect("ordered slot is live");
            if let Some(offset) = record.sub.allocate(size) {
                if record.idle {
                    record.idle = false;
                    self.idle_count -= 1;
                }
                record.live_allocs += 1;
                return Some(BlockAllocation {
                    heap: HeapId {
                        pool: self.pool_id,
                        index,
                        generation: slot.generation,
                    },
                    offset,
                    size,
                });
            }
        }

        let capacity = size.max(self.basic_size);
        let heap = self.factory.create_heap(capacity)?;
        let mut sub = self.factory.create_sub_allocator(capacity);
        let offset = match sub.allocate(size) {
            Some(offset) => offset,
            // A fresh sub-allocator sized for the request cannot refuse it.
            None => panic!(
                "fresh sub-allocator of capacity {capacity} rejected a request of {size}"
            ),
        };
        let record = HeapRecord {
            heap,
            sub,
            capacity,
            live_allocs: 1,
            idle: false,
        };
        let index = self.insert_record(record);
        log::debug!(
            "block pool: created heap #{index} ({})",
            format_bytes(capacity)
        );
        Some(BlockAllocation {
            heap: HeapId {
                pool: self.pool_id,
                index,
                generation: self.slots[index as usize].generation,
            },
            offset,
            size,
        })
    }

    /// Return an allocation to its owning heap.
    ///
    /// If the heap drains to empty it is marked idle; idle heaps beyond
    /// `destroy_threshold` are evicted oldest-first, dropping the backing
    /// heap object.
    ///
    /// # Panics
    ///
    /// Panics if the allocation does not belong to this pool, references an
    /// evicted heap, or names an offset that is not outstanding. All of
    /// these are caller logic errors; ignoring them would corrupt the pool.
    pub fn destroy(&mut self, allocation: BlockAllocation) {
        let HeapId {
            pool,
            index,
            generation,
        } = allocation.heap;
        if pool != self.pool_id {
            panic!("block destroy: allocation does not belong to this pool");
        }
        let record = match self.slots.get_mut(index as usize) {
            Some(slot) if slot.generation == generation => match slot.record.as_mut() {
                Some(record) => record,
                None => panic!("block destroy: heap #{index} was already evicted"),
            },
            _ => panic!("block destroy: allocation does not belong to this pool"),
        };
        record.sub.destroy(allocation.offset);
        debug_assert!(record.live_allocs > 0);
        record.live_allocs -= 1;
        if record.live_allocs == 0 && !record.idle {
            record.idle = true;
            self.idle_count += 1;
        }
        self.evict_excess_idle();
    }

    /// Rebuild every heap's sub-allocator, invalidating all outstanding
    /// allocations, then evict idle heaps down to the threshold.
    ///
    /// Backing heaps survive (up to the threshold) so the next allocations
    /// reuse them without a round-trip through the factory.
    pub fn reset(&mut self) {
        for &index in &self.order {
            let slot = &mut self.slots[index as usize];
            slot.generation = slot.generation.wrapping_add(1);
            let record = slot.record.as_mut().expect("ordered slot is live");
            record.sub = self.factory.create_sub_allocator(record.capacity);
            record.live_allocs = 0;
            record.idle = true;
        }
        self.idle_count = self.order.len();
        log::debug!("block pool: reset, {} heaps idle", self.idle_count);
        self.evict_excess_idle();
    }

    /// Resolve a heap id to the backing heap object.
    ///
    /// Returns `None` for stale or foreign ids. The reference is
    /// non-owning; do not hold it across calls that can evict the heap.
    pub fn heap_handle(&self, id: HeapId) -> Option<&F::Heap> {
        if id.pool != self.pool_id {
            return None;
        }
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.record.as_ref().map(|r| &r.heap)
    }

    /// Number of live heaps (idle ones included).
    pub fn heap_count(&self) -> usize {
        self.order.len()
    }

    /// Number of heaps with zero outstanding allocations.
    pub fn idle_heap_count(&self) -> usize {
        self.idle_count
    }

    /// Snapshot of the pool counters.
    pub fn stats(&self) -> BlockAllocatorStats {
        let mut stats = BlockAllocatorStats {
            heap_count: self.order.len(),
            idle_heap_count: self.idle_count,
            ..Default::default()
        };
        for &index in &self.order {
            if let Some(record) = self.slots[index as usize].record.as_ref() {
                stats.live_allocations += record.live_allocs;
                stats.reserved += record.capacity;
            }
        }
        stats
    }

    fn insert_record(&mut self, record: HeapRecord<F::Heap, F::Sub>) -> u32 {
        let index = if let Some(index) = self.free_slots.pop() {
            self.slots[index as usize].record = Some(record);
            index
        } else {
            self.slots.push(Slot {
                record: Some(record),
                generation: 0,
            });
            (self.slots.len() - 1) as u32
        };
        self.order.push(index);
        index
    }

    /// Evict oldest idle heaps until the idle count equals the threshold.
    fn evict_excess_idle(&mut self) {
        while self.idle_count > self.destroy_threshold {
            let pos = self
                .order
                .iter()
                .position(|&i| {
                    self.slots[i as usize]
                        .record
                        .as_ref()
                        .map_or(false, |r| r.idle)
                })
                .expect("idle count tracks idle records");
            let index = self.order.remove(pos);
            let slot = &mut self.slots[index as usize];
            let record = slot.record.take().expect("ordered slot is live");
            slot.generation = slot.generation.wrapping_add(1);
            self.free_slots.push(index);
            self.idle_count -= 1;
            log::debug!(
                "block pool: evicted idle heap #{index} ({})",
                format_bytes(record.capacity)
            );
            // Dropping the record tears the backing heap down.
        }
    }
}
