//! Allocator implementations.

pub mod block;
pub mod buddy;
pub mod freelist;
pub mod linear;
