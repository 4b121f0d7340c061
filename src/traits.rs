//! Allocator trait seams.
//!
//! This module defines the interfaces between the sub-allocators and the
//! backend code that owns the real resources, WITHOUT pulling in any
//! backend-specific dependencies. Composites like [`BlockAllocator`] and
//! [`LinearAllocator`] depend on these traits, not on implementations.
//!
//! [`BlockAllocator`]: crate::BlockAllocator
//! [`LinearAllocator`]: crate::LinearAllocator

/// A sub-allocator over a fixed-capacity address space of unit-sized slots.
///
/// Callers decide what a slot means: bytes in a GPU heap, indices in a
/// descriptor heap, entries in an upload ring. Implemented by
/// [`BuddyAllocator`](crate::BuddyAllocator) and
/// [`FreeListAllocator`](crate::FreeListAllocator).
pub trait RangeAllocator {
    /// Reserve `size` slots and return the starting offset.
    ///
    /// Returns `None` when no fitting free range exists. Exhaustion is an
    /// ordinary outcome, never a panic; the caller decides whether to grow,
    /// fall back, or fail.
    fn allocate(&mut self, size: usize) -> Option<usize>;

    /// Return the range starting at `offset` to the allocator.
    ///
    /// # Panics
    ///
    /// Panics if `offset` is not the start of an outstanding allocation.
    /// Passing a bad offset is a memory-safety bug in the caller, not a
    /// recoverable condition.
    fn destroy(&mut self, offset: usize);
}

/// Factory for backing heaps and the sub-allocators that manage them.
///
/// Supplied by the backend to a [`BlockAllocator`](crate::BlockAllocator).
/// A "heap" here is any opaque fixed-capacity resource: a GPU memory heap,
/// a descriptor heap, an upload buffer.
pub trait HeapFactory {
    /// The backing resource type. Owned by the pool once created; dropped
    /// on eviction.
    type Heap;

    /// The sub-allocator scoped to one heap's capacity.
    type Sub: RangeAllocator;

    /// Create a backing heap with at least `size` slots.
    ///
    /// Returns `None` on backend failure (e.g. device out of memory). The
    /// pool propagates the failure without adding any record.
    fn create_heap(&mut self, size: usize) -> Option<Self::Heap>;

    /// Create a fresh sub-allocator covering `[0, size)`.
    fn create_sub_allocator(&mut self, size: usize) -> Self::Sub;
}

/// Source of backing buffers for a [`LinearAllocator`](crate::LinearAllocator).
///
/// Handles are cloned into the views handed out to callers, so they should
/// be cheap to copy (an index, a pointer-sized id, an `Rc`).
pub trait BufferProvider {
    /// Opaque buffer handle.
    type Handle: Clone;

    /// Acquire a buffer with at least `size` slots, or `None` on failure.
    fn acquire(&mut self, size: usize) -> Option<Self::Handle>;

    /// Release a buffer previously returned by [`acquire`](Self::acquire).
    fn release(&mut self, handle: Self::Handle);
}
