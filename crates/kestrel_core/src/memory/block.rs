//! # Block Allocator
//!
//! Hands out fixed-size blocks against a bounded arena budget.
//!
//! Every pool in a world (the object array, each component manager) grows by
//! checking out whole blocks from the world's allocator. Blocks are returned
//! to a free pool on release and handed out again later; a block that is
//! checked out is never handed out a second time.
//!
//! The allocator owns the budget, not the bytes. Each storage holds its own
//! typed block memory, since reinterpreting a shared raw byte block as `T`
//! would need `unsafe`. A released block id comes back with fresh memory.

use tracing::warn;

use crate::error::{WorldError, WorldResult};

/// Identifier of a checked-out block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(u32);

impl BlockId {
    /// Returns the raw block index inside the arena.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0
    }
}

/// Fixed-size block allocator.
///
/// # Thread Safety
///
/// Not synchronized. A world owns exactly one allocator and mutates it from
/// the thread driving that world.
///
/// # Example
///
/// ```rust,ignore
/// let mut allocator = BlockAllocator::new(4096, 1024);
///
/// let block = allocator.allocate_block()?;
/// // ... back some storage with it ...
/// allocator.release_block(block);
/// ```
#[derive(Debug)]
pub struct BlockAllocator {
    /// Size of one block in bytes.
    block_size: usize,
    /// Maximum number of blocks.
    capacity: usize,
    /// Checked-out state per block index ever created.
    checked_out: Vec<bool>,
    /// Released block indices available for reuse.
    free_pool: Vec<u32>,
    /// Number of blocks currently checked out.
    in_use: usize,
}

impl BlockAllocator {
    /// Creates an allocator with `capacity` blocks of `block_size` bytes.
    ///
    /// No block is created up front; the arena grows on demand up to
    /// `capacity`.
    #[must_use]
    pub fn new(block_size: usize, capacity: usize) -> Self {
        Self {
            block_size,
            capacity,
            checked_out: Vec::new(),
            free_pool: Vec::new(),
            in_use: 0,
        }
    }

    /// Returns the fixed block size in bytes.
    #[inline]
    #[must_use]
    pub const fn block_size(&self) -> usize {
        self.block_size
    }

    /// Returns the maximum number of blocks.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of blocks currently checked out.
    #[inline]
    #[must_use]
    pub const fn blocks_in_use(&self) -> usize {
        self.in_use
    }

    /// Returns how many more blocks can be checked out.
    #[inline]
    #[must_use]
    pub const fn free_blocks(&self) -> usize {
        self.capacity - self.in_use
    }

    /// Returns the bytes covered by checked-out blocks.
    #[inline]
    #[must_use]
    pub const fn bytes_in_use(&self) -> usize {
        self.in_use * self.block_size
    }

    /// Returns `true` if `block` is currently checked out.
    #[inline]
    #[must_use]
    pub fn is_checked_out(&self, block: BlockId) -> bool {
        self.checked_out
            .get(block.0 as usize)
            .copied()
            .unwrap_or(false)
    }

    /// Checks out a block.
    ///
    /// Released blocks are reused before the arena grows.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::OutOfMemory`] when all `capacity` blocks are
    /// checked out.
    pub fn allocate_block(&mut self) -> WorldResult<BlockId> {
        if let Some(index) = self.free_pool.pop() {
            self.checked_out[index as usize] = true;
            self.in_use += 1;
            return Ok(BlockId(index));
        }

        if self.checked_out.len() >= self.capacity {
            warn!(
                capacity = self.capacity,
                block_size = self.block_size,
                "block arena exhausted"
            );
            return Err(WorldError::OutOfMemory {
                pool: "blocks",
                capacity: self.capacity,
            });
        }

        // Arena is bounded by `capacity`, which the config keeps well below u32::MAX.
        let index = u32::try_from(self.checked_out.len()).map_err(|_| WorldError::OutOfMemory {
            pool: "blocks",
            capacity: self.capacity,
        })?;
        self.checked_out.push(true);
        self.in_use += 1;
        Ok(BlockId(index))
    }

    /// Returns a block to the free pool.
    ///
    /// # Returns
    ///
    /// `false` if the block was not checked out (double release or a block
    /// from another allocator).
    pub fn release_block(&mut self, block: BlockId) -> bool {
        match self.checked_out.get_mut(block.0 as usize) {
            Some(state) if *state => {
                *state = false;
                self.free_pool.push(block.0);
                self.in_use -= 1;
                true
            }
            _ => false,
        }
    }
}
