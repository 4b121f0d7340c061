//! # rangealloc
//!
//! Range sub-allocation and heap pooling for GPU resource backends.
//!
//! GPU backends constantly carve fixed-capacity address spaces into
//! ranges: bytes in a memory heap, indices in a descriptor heap, offsets
//! in an upload buffer. Creating and destroying the backing objects is
//! expensive (a driver call per heap), so the carving needs to happen in
//! process, over plain integers, with the backend only asked for a new
//! heap when the pool genuinely runs out.
//!
//! ## Allocators
//!
//! - [`BuddyAllocator`]: power-of-two blocks, cheap merge on free
//! - [`FreeListAllocator`]: exact-fit ranges, coalescing free list
//! - [`BlockAllocator`]: pool of heaps, each managed by one sub-allocator,
//!   with idle-heap retention (`destroy_threshold`)
//! - [`LinearAllocator`]: bump allocation over provider-acquired buffers,
//!   bulk reclaim via `clear`/`reset`
//!
//! Backends plug in through the [`HeapFactory`] and [`BufferProvider`]
//! traits; the allocators never touch a real resource themselves.
//!
//! ## Quick start
//!
//! ```
//! use rangealloc::{BlockAllocator, BuddyAllocator, HeapFactory};
//!
//! // The factory creates the real backend objects (here: a stand-in).
//! struct RtvHeaps;
//! impl HeapFactory for RtvHeaps {
//!     type Heap = Vec<u64>;
//!     type Sub = BuddyAllocator;
//!     fn create_heap(&mut self, size: usize) -> Option<Vec<u64>> {
//!         Some(vec![0; size])
//!     }
//!     fn create_sub_allocator(&mut self, size: usize) -> BuddyAllocator {
//!         BuddyAllocator::new(size)
//!     }
//! }
//!
//! // One pool per resource class; keep one empty heap warm.
//! let mut rtv_pool = BlockAllocator::new(RtvHeaps, 256, 1);
//!
//! let view = rtv_pool.allocate(16).unwrap();
//! let heap = rtv_pool.heap_handle(view.heap).unwrap();
//! assert_eq!(heap.len(), 256);
//! rtv_pool.destroy(view);
//! ```
//!
//! ## Threading
//!
//! All allocators are single-threaded value types: no internal locking, no
//! blocking. Share one per logical owner (per frame-in-flight, per worker)
//! or wrap in your own mutex.

pub mod allocators;
pub mod traits;

mod util;

// Re-export the public API at the crate root.
pub use allocators::block::{BlockAllocation, BlockAllocator, BlockAllocatorStats, HeapId};
pub use allocators::buddy::BuddyAllocator;
pub use allocators::freelist::FreeListAllocator;
pub use allocators::linear::{LinearAllocator, LinearView};
pub use traits::{BufferProvider, HeapFactory, RangeAllocator};

// Size helpers, convenient for factory code and logs.
pub use util::size::{format_bytes, kb, mb};
