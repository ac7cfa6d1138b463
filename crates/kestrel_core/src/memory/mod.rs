//! # Memory Management
//!
//! Block-based storage for object and component pools.
//!
//! ## Design Philosophy
//!
//! Pools never reallocate what they already hold:
//! - Growth checks out another fixed-size block from the world's allocator
//! - Elements keep their address while they live
//! - The allocator bounds the total footprint of a world

mod block;
mod storage;

pub use block::{BlockAllocator, BlockId};
pub use storage::BlockStorage;
