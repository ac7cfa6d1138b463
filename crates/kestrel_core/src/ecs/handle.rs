//! # Handles
//!
//! Objects and components are never referenced by pointer. Callers hold a
//! handle: a packed id made of a slot index, a generation counter and the
//! index of the owning world.
//!
//! - Object ids pack `index:20 | generation:6 | world:6` into a `u32`
//! - Component ids pack `index:24 | generation:8` into a `u32`, plus a
//!   `type_id:u16` and `world_index:u16`
//!
//! A handle never dereferences anything. Resolution (and stale detection)
//! is the job of the object store or the owning component manager.

use std::fmt;
use std::hash::{Hash, Hasher};

use bytemuck::{Pod, Zeroable};

/// Bits used for the instance index of an object id.
pub const OBJECT_INDEX_BITS: u32 = 20;
/// Bits used for the generation of an object id.
pub const OBJECT_GENERATION_BITS: u32 = 6;
/// Bits used for the world index of an object id.
pub const OBJECT_WORLD_BITS: u32 = 6;

/// Bits used for the instance index of a component id.
pub const COMPONENT_INDEX_BITS: u32 = 24;
/// Bits used for the generation of a component id.
pub const COMPONENT_GENERATION_BITS: u32 = 8;

/// Maximum number of worlds addressable by an object id.
pub const MAX_WORLDS: u32 = 1 << OBJECT_WORLD_BITS;

#[inline]
const fn mask(bits: u32) -> u32 {
    (1u32 << bits) - 1
}

/// Returns the generation that follows `generation` in a counter of `bits`
/// width. Zero is skipped so that a live slot never carries generation 0.
#[inline]
#[must_use]
pub(crate) const fn next_generation(generation: u32, bits: u32) -> u32 {
    let next = generation.wrapping_add(1) & mask(bits);
    if next == 0 {
        1
    } else {
        next
    }
}

/// Knuth multiplicative hash over the raw id bits.
#[inline]
const fn multiplicative_hash(bits: u32) -> u32 {
    bits.wrapping_mul(2_654_435_761)
}

// =============================================================================
// OBJECT IDS
// =============================================================================

/// Packed id of a game object slot.
///
/// The all-zero value is the invalid id: live slots always carry a non-zero
/// generation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
#[repr(transparent)]
pub struct ObjectId(u32);

impl ObjectId {
    /// The invalid object id.
    pub const INVALID: Self = Self(0);

    /// Number of instance indices an object id can address.
    pub const MAX_INSTANCES: u32 = 1 << OBJECT_INDEX_BITS;

    /// Creates an id from its parts. Each part is truncated to its bit width.
    #[inline]
    #[must_use]
    pub const fn new(instance_index: u32, generation: u32, world_index: u32) -> Self {
        Self(
            (instance_index & mask(OBJECT_INDEX_BITS))
                | ((generation & mask(OBJECT_GENERATION_BITS)) << OBJECT_INDEX_BITS)
                | ((world_index & mask(OBJECT_WORLD_BITS))
                    << (OBJECT_INDEX_BITS + OBJECT_GENERATION_BITS)),
        )
    }

    /// Reinterprets raw bits as an id.
    #[inline]
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Returns the raw packed bits.
    #[inline]
    #[must_use]
    pub const fn to_bits(self) -> u32 {
        self.0
    }

    /// Returns the slot index.
    #[inline]
    #[must_use]
    pub const fn instance_index(self) -> u32 {
        self.0 & mask(OBJECT_INDEX_BITS)
    }

    /// Returns the generation counter.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        (self.0 >> OBJECT_INDEX_BITS) & mask(OBJECT_GENERATION_BITS)
    }

    /// Returns the index of the world that issued this id.
    #[inline]
    #[must_use]
    pub const fn world_index(self) -> u32 {
        (self.0 >> (OBJECT_INDEX_BITS + OBJECT_GENERATION_BITS)) & mask(OBJECT_WORLD_BITS)
    }

    /// Returns `true` if the id carries a generation, i.e. was issued by a world.
    #[inline]
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.generation() != 0
    }
}

/// Handle to a game object.
///
/// Never store a reference to a game object across frames. Store the handle
/// and resolve it through the world each time; the object may have been
/// destroyed in the meantime.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[repr(transparent)]
pub struct ObjectHandle(ObjectId);

impl ObjectHandle {
    /// The invalid handle. Never resolves.
    pub const INVALID: Self = Self(ObjectId::INVALID);

    /// Wraps an id.
    #[inline]
    #[must_use]
    pub const fn new(id: ObjectId) -> Self {
        Self(id)
    }

    /// Returns the wrapped id.
    #[inline]
    #[must_use]
    pub const fn id(self) -> ObjectId {
        self.0
    }

    /// Returns `true` unless this is the invalid handle.
    ///
    /// A valid handle may still be stale; only the world can tell.
    #[inline]
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0.is_valid()
    }

    /// Deterministic 32-bit hash of the id bits.
    #[inline]
    #[must_use]
    pub const fn hash32(self) -> u32 {
        multiplicative_hash(self.0.to_bits())
    }
}

impl Hash for ObjectHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u32(self.hash32());
    }
}

impl fmt::Display for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "object#{}v{}@w{}",
            self.0.instance_index(),
            self.0.generation(),
            self.0.world_index()
        )
    }
}

// =============================================================================
// COMPONENT IDS
// =============================================================================

/// Packed id of a component slot inside one component manager.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
#[repr(C)]
pub struct ComponentId {
    instance: u32,
    type_id: u16,
    world_index: u16,
}

impl ComponentId {
    /// The invalid component id.
    pub const INVALID: Self = Self {
        instance: 0,
        type_id: 0,
        world_index: 0,
    };

    /// Number of instance indices a component id can address.
    pub const MAX_INSTANCES: u32 = 1 << COMPONENT_INDEX_BITS;

    /// Creates an id from its parts. Index and generation are truncated to
    /// their bit widths.
    #[inline]
    #[must_use]
    pub const fn new(instance_index: u32, generation: u32, type_id: u16, world_index: u16) -> Self {
        Self {
            instance: (instance_index & mask(COMPONENT_INDEX_BITS))
                | ((generation & mask(COMPONENT_GENERATION_BITS)) << COMPONENT_INDEX_BITS),
            type_id,
            world_index,
        }
    }

    /// Returns the slot index inside the owning manager.
    #[inline]
    #[must_use]
    pub const fn instance_index(self) -> u32 {
        self.instance & mask(COMPONENT_INDEX_BITS)
    }

    /// Returns the generation counter.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        (self.instance >> COMPONENT_INDEX_BITS) & mask(COMPONENT_GENERATION_BITS)
    }

    /// Returns the dense id of the component type (and of its manager).
    #[inline]
    #[must_use]
    pub const fn type_id(self) -> u16 {
        self.type_id
    }

    /// Returns the index of the world that issued this id.
    #[inline]
    #[must_use]
    pub const fn world_index(self) -> u16 {
        self.world_index
    }

    /// Returns `true` if the id carries a generation.
    #[inline]
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.generation() != 0
    }

    /// Packs all fields into a single `u64`.
    #[inline]
    #[must_use]
    pub const fn to_bits(self) -> u64 {
        (self.instance as u64) | ((self.type_id as u64) << 32) | ((self.world_index as u64) << 48)
    }
}

/// Handle to a component.
///
/// Same rules as [`ObjectHandle`]: resolve through the world or the owning
/// manager, never keep the reference.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct ComponentHandle(ComponentId);

impl ComponentHandle {
    /// The invalid handle. Never resolves.
    pub const INVALID: Self = Self(ComponentId::INVALID);

    /// Wraps an id.
    #[inline]
    #[must_use]
    pub const fn new(id: ComponentId) -> Self {
        Self(id)
    }

    /// Returns the wrapped id.
    #[inline]
    #[must_use]
    pub const fn id(self) -> ComponentId {
        self.0
    }

    /// Returns the dense type id of the component.
    #[inline]
    #[must_use]
    pub const fn type_id(self) -> u16 {
        self.0.type_id()
    }

    /// Returns `true` unless this is the invalid handle.
    #[inline]
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0.is_valid()
    }
}

impl fmt::Display for ComponentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "component#{}v{}:t{}@w{}",
            self.0.instance_index(),
            self.0.generation(),
            self.0.type_id(),
            self.0.world_index()
        )
    }
}
