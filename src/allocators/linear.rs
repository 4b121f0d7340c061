//! Linear (bump) allocator over a growing sequence of backing buffers.
//!
//! Buffers come from an injected [`BufferProvider`]; when the current
//! buffer runs out, a new one is acquired at `max(size, capacity * growth)`.
//! There is no per-allocation free: [`LinearAllocator::clear`] rewinds all
//! cursors for cheap cross-frame reuse, [`LinearAllocator::reset`] returns
//! the buffers to the provider and reverts to the initial capacity.

use crate::traits::BufferProvider;

/// Default growth factor for successive buffers.
const DEFAULT_GROWTH: f64 = 1.5;

/// One backing buffer and its bump cursor.
#[derive(Debug)]
struct Buffer<H> {
    handle: H,
    capacity: usize,
    count: usize,
}

/// A slice of a backing buffer handed to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinearView<H> {
    /// Handle of the buffer the range lives in.
    pub handle: H,
    /// Starting offset within that buffer.
    pub offset: usize,
}

/// Bump allocator for transient per-frame data (upload rings, staging
/// descriptors).
///
/// ```
/// use rangealloc::{BufferProvider, LinearAllocator};
///
/// struct Ids(u32);
/// impl BufferProvider for Ids {
///     type Handle = u32;
///     fn acquire(&mut self, _size: usize) -> Option<u32> {
///         self.0 += 1;
///         Some(self.0)
///     }
///     fn release(&mut self, _handle: u32) {}
/// }
///
/// let mut linear = LinearAllocator::new(Ids(0), 256);
/// let a = linear.allocate(100, 4).unwrap();
/// let b = linear.allocate(100, 4).unwrap();
/// assert_eq!(a.handle, b.handle);
/// assert_eq!((a.offset, b.offset), (0, 100));
/// linear.clear(); // keep buffers, rewind cursors
/// assert_eq!(linear.allocate(8, 1).unwrap().offset, 0);
/// ```
#[derive(Debug)]
pub struct LinearAllocator<P: BufferProvider> {
    provider: P,
    buffers: Vec<Buffer<P::Handle>>,
    /// Buffer the next bump attempt starts from.
    current: usize,
    /// Capacity the next acquisition grows from.
    capacity: usize,
    initial_capacity: usize,
    growth: f64,
}

impl<P: BufferProvider> LinearAllocator<P> {
    /// Create an allocator that acquires its first buffer at `capacity`.
    pub fn new(provider: P, capacity: usize) -> Self {
        Self::with_growth(provider, capacity, DEFAULT_GROWTH)
    }

    /// Create an allocator with an explicit growth factor (must be >= 1).
    pub fn with_growth(provider: P, capacity: usize, growth: f64) -> Self {
        debug_assert!(growth >= 1.0, "growth factor must not shrink");
        Self {
            provider,
            buffers: Vec::new(),
            current: 0,
            capacity,
            initial_capacity: capacity,
            growth,
        }
    }

    /// Bump-allocate `size` slots aligned to `align` (a power of two).
    ///
    /// Acquires a new backing buffer when the current one cannot fit the
    /// request; provider failure propagates as `None`.
    pub fn allocate(&mut self, size: usize, align: usize) -> Option<LinearView<P::Handle>> {
        debug_assert!(align.is_power_of_two(), "alignment must be a power of two");
        if size == 0 {
            return None;
        }
        while self.current < self.buffers.len() {
            let buffer = &mut self.buffers[self.current];
            let aligned = (buffer.count + align - 1) & !(align - 1);
            if aligned + size <= buffer.capacity {
                buffer.count = aligned + size;
                return Some(LinearView {
                    handle: buffer.handle.clone(),
                    offset: aligned,
                });
            }
            self.current += 1;
        }

        let request = if self.buffers.is_empty() {
            size.max(self.capacity)
        } else {
            size.max((self.capacity as f64 * self.growth).ceil() as usize)
        };
        let handle = self.provider.acquire(request)?;
        self.capacity = request;
        self.current = self.buffers.len();
        self.buffers.push(Buffer {
            handle: handle.clone(),
            capacity: request,
            count: size,
        });
        Some(LinearView { handle, offset: 0 })
    }

    /// Rewind every buffer's cursor to zero, keeping the backing buffers.
    ///
    /// Cheap bulk reclaim for the per-frame case; previously returned views
    /// must no longer be used.
    pub fn clear(&mut self) {
        for buffer in &mut self.buffers {
            buffer.count = 0;
        }
        self.current = 0;
    }

    /// Release every buffer back to the provider and revert to the initial
    /// capacity.
    pub fn reset(&mut self) {
        for buffer in self.buffers.drain(..) {
            self.provider.release(buffer.handle);
        }
        self.current = 0;
        self.capacity = self.initial_capacity;
    }

    /// Number of backing buffers currently held.
    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    /// Total slots across all held buffers.
    pub fn total_capacity(&self) -> usize {
        self.buffers.iter().map(|b| b.capacity).sum()
    }
}

impl<P: BufferProvider> Drop for LinearAllocator<P> {
    fn drop(&mut self) {
        self.reset();
    }
}
