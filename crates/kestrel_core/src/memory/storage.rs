//! # Block Storage
//!
//! An index-addressed element pool backed by allocator blocks.
//!
//! ```text
//!   index:   0 1 2 3 | 4 5 6 7 | 8 9 . .
//!           [block 0] [block 1] [block 2]      (elements_per_block = 4)
//! ```
//!
//! Each block is one boxed slice. Growing appends a block and never touches
//! the existing ones, so an element's address is stable for as long as it
//! lives in the pool.

use std::mem;

use super::block::{BlockAllocator, BlockId};
use crate::error::WorldResult;

struct StorageBlock<T> {
    id: BlockId,
    slots: Box<[Option<T>]>,
    occupied: usize,
}

/// Block-backed storage for elements of type `T`.
///
/// # Example
///
/// ```rust,ignore
/// let mut allocator = BlockAllocator::new(4096, 64);
/// let mut storage: BlockStorage<Transform> = BlockStorage::new(allocator.block_size());
///
/// storage.insert(0, Transform::IDENTITY, &mut allocator)?;
/// let t = storage.get(0);
/// ```
pub struct BlockStorage<T> {
    blocks: Vec<StorageBlock<T>>,
    elements_per_block: usize,
    len: usize,
}

impl<T> BlockStorage<T> {
    /// Creates empty storage sized for blocks of `block_size` bytes.
    ///
    /// A block holds at least one element, even when a single element is
    /// larger than a block.
    #[must_use]
    pub fn new(block_size: usize) -> Self {
        let slot_size = mem::size_of::<Option<T>>().max(1);
        Self {
            blocks: Vec::new(),
            elements_per_block: (block_size / slot_size).max(1),
            len: 0,
        }
    }

    /// Returns how many elements one block holds.
    #[inline]
    #[must_use]
    pub const fn elements_per_block(&self) -> usize {
        self.elements_per_block
    }

    /// Returns the number of blocks currently backing the storage.
    #[inline]
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Returns the number of addressable slots.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.blocks.len() * self.elements_per_block
    }

    /// Returns the number of occupied slots.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if no slot is occupied.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    const fn locate(&self, index: usize) -> (usize, usize) {
        (index / self.elements_per_block, index % self.elements_per_block)
    }

    /// Stores `value` at `index`, growing by whole blocks as needed.
    ///
    /// # Returns
    ///
    /// The value previously stored at `index`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`crate::WorldError::OutOfMemory`] if the allocator cannot supply
    /// a block. Blocks checked out before the failure stay in the storage.
    pub fn insert(
        &mut self,
        index: usize,
        value: T,
        allocator: &mut BlockAllocator,
    ) -> WorldResult<Option<T>> {
        let (block, offset) = self.locate(index);
        while self.blocks.len() <= block {
            let id = allocator.allocate_block()?;
            let slots = (0..self.elements_per_block).map(|_| None).collect();
            self.blocks.push(StorageBlock {
                id,
                slots,
                occupied: 0,
            });
        }

        let block = &mut self.blocks[block];
        let previous = block.slots[offset].replace(value);
        if previous.is_none() {
            block.occupied += 1;
            self.len += 1;
        }
        Ok(previous)
    }

    /// Gets the element at `index`.
    #[inline]
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&T> {
        let (block, offset) = self.locate(index);
        self.blocks.get(block)?.slots[offset].as_ref()
    }

    /// Gets the element at `index` mutably.
    #[inline]
    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        let (block, offset) = self.locate(index);
        self.blocks.get_mut(block)?.slots[offset].as_mut()
    }

    /// Takes the element out of `index`, leaving the slot empty.
    pub fn remove(&mut self, index: usize) -> Option<T> {
        let (block, offset) = self.locate(index);
        let block = self.blocks.get_mut(block)?;
        let value = block.slots[offset].take()?;
        block.occupied -= 1;
        self.len -= 1;
        Some(value)
    }

    /// Iterates over occupied slots with their indices.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &T)> {
        let per_block = self.elements_per_block;
        self.blocks.iter().enumerate().flat_map(move |(b, block)| {
            block
                .slots
                .iter()
                .enumerate()
                .filter_map(move |(o, slot)| slot.as_ref().map(|v| (b * per_block + o, v)))
        })
    }

    /// Iterates mutably over occupied slots with their indices.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (usize, &mut T)> {
        let per_block = self.elements_per_block;
        self.blocks.iter_mut().enumerate().flat_map(move |(b, block)| {
            block
                .slots
                .iter_mut()
                .enumerate()
                .filter_map(move |(o, slot)| slot.as_mut().map(|v| (b * per_block + o, v)))
        })
    }

    /// Releases trailing blocks that hold no element.
    ///
    /// # Returns
    ///
    /// Number of blocks handed back to the allocator.
    pub fn trim(&mut self, allocator: &mut BlockAllocator) -> usize {
        let mut released = 0;
        while self.blocks.last().is_some_and(|block| block.occupied == 0) {
            if let Some(block) = self.blocks.pop() {
                allocator.release_block(block.id);
                released += 1;
            }
        }
        released
    }

    /// Drops every element and hands every block back to the allocator.
    pub fn release_all(&mut self, allocator: &mut BlockAllocator) {
        for block in self.blocks.drain(..) {
            allocator.release_block(block.id);
        }
        self.len = 0;
    }
}
