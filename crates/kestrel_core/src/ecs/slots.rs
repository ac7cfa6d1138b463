//! Generation and free-list bookkeeping shared by the object store and the
//! component managers.
//!
//! Freed indices are reused lowest-first so live data stays packed at the
//! front of the block storage. A fresh slot starts at generation 1 and the
//! generation only moves when a freed slot is handed out again.

use std::collections::BTreeSet;

use super::handle::next_generation;

/// Outcome of checking an (index, generation) pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SlotState {
    /// The slot is alive with that generation.
    Live,
    /// The slot exists but is dead or carries another generation.
    Stale,
    /// The index was never handed out.
    OutOfRange,
}

#[derive(Debug)]
pub(crate) struct SlotTable {
    generations: Vec<u32>,
    alive: Vec<bool>,
    free: BTreeSet<u32>,
    generation_bits: u32,
    max_slots: u32,
    live: usize,
}

impl SlotTable {
    pub(crate) fn new(generation_bits: u32, max_slots: u32) -> Self {
        Self {
            generations: Vec::new(),
            alive: Vec::new(),
            free: BTreeSet::new(),
            generation_bits,
            max_slots,
            live: 0,
        }
    }

    /// Number of live slots.
    #[inline]
    pub(crate) const fn live(&self) -> usize {
        self.live
    }

    #[inline]
    pub(crate) const fn max_slots(&self) -> u32 {
        self.max_slots
    }

    /// Hands out a slot: the lowest free index, else a new one.
    ///
    /// Returns `(index, generation)`, or `None` once the index space is
    /// exhausted.
    pub(crate) fn allocate(&mut self) -> Option<(u32, u32)> {
        if let Some(index) = self.free.pop_first() {
            let slot = index as usize;
            let generation = next_generation(self.generations[slot], self.generation_bits);
            self.generations[slot] = generation;
            self.alive[slot] = true;
            self.live += 1;
            return Some((index, generation));
        }

        let index = u32::try_from(self.generations.len()).ok()?;
        if index >= self.max_slots {
            return None;
        }
        self.generations.push(1);
        self.alive.push(true);
        self.live += 1;
        Some((index, 1))
    }

    /// Frees a live slot. Returns `false` for stale pairs.
    pub(crate) fn free(&mut self, index: u32, generation: u32) -> bool {
        if self.state(index, generation) != SlotState::Live {
            return false;
        }
        self.alive[index as usize] = false;
        self.free.insert(index);
        self.live -= 1;
        true
    }

    pub(crate) fn state(&self, index: u32, generation: u32) -> SlotState {
        let slot = index as usize;
        match (self.generations.get(slot), self.alive.get(slot)) {
            (Some(&current), Some(&true)) if current == generation => SlotState::Live,
            (Some(_), Some(_)) => SlotState::Stale,
            _ => SlotState::OutOfRange,
        }
    }

    /// Current generation of a slot, live or not.
    #[cfg(test)]
    pub(crate) fn generation(&self, index: u32) -> Option<u32> {
        self.generations.get(index as usize).copied()
    }
}
