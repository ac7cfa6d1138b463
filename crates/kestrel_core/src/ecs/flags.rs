//! # Object Flags
//!
//! Per-object and per-component state bits, plus the small enums that drive
//! component teardown and graph visits.

use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};

/// Internal flags of game objects and components.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct ObjectFlags(u32);

impl ObjectFlags {
    /// No flag set.
    pub const NONE: Self = Self(0);
    /// The object may move or be re-parented at runtime.
    pub const DYNAMIC: Self = Self(1 << 0);
    /// Takes part in update and extraction.
    pub const ACTIVE: Self = Self(1 << 1);
    /// Initialization callbacks have run.
    pub const INITIALIZED: Self = Self(1 << 2);
    /// Initialization callbacks are running right now.
    pub const INITIALIZING: Self = Self(1 << 3);
    /// Simulation-start callbacks have run.
    pub const SIMULATION_STARTED: Self = Self(1 << 4);
    /// Simulation-start callbacks are running right now.
    pub const SIMULATION_STARTING: Self = Self(1 << 5);
    /// Components only: unmatched messages go to the catch-all handler.
    pub const UNHANDLED_MESSAGE_HANDLER: Self = Self(1 << 6);

    /// State of a freshly created object.
    pub const DEFAULT: Self = Self(Self::DYNAMIC.0 | Self::ACTIVE.0);

    const NAMES: [(Self, &'static str); 7] = [
        (Self::DYNAMIC, "DYNAMIC"),
        (Self::ACTIVE, "ACTIVE"),
        (Self::INITIALIZED, "INITIALIZED"),
        (Self::INITIALIZING, "INITIALIZING"),
        (Self::SIMULATION_STARTED, "SIMULATION_STARTED"),
        (Self::SIMULATION_STARTING, "SIMULATION_STARTING"),
        (Self::UNHANDLED_MESSAGE_HANDLER, "UNHANDLED_MESSAGE_HANDLER"),
    ];

    /// Returns the raw bits.
    #[inline]
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Returns `true` if every bit of `other` is set.
    #[inline]
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns `true` if any bit of `other` is set.
    #[inline]
    #[must_use]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// Sets the bits of `other`.
    #[inline]
    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    /// Clears the bits of `other`.
    #[inline]
    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }

    /// Sets or clears the bits of `other`.
    #[inline]
    pub fn set(&mut self, other: Self, value: bool) {
        if value {
            self.insert(other);
        } else {
            self.remove(other);
        }
    }
}

impl Default for ObjectFlags {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl BitOr for ObjectFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for ObjectFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for ObjectFlags {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl fmt::Debug for ObjectFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == 0 {
            return f.write_str("NONE");
        }
        let mut first = true;
        for (flag, name) in Self::NAMES {
            if self.contains(flag) {
                if !first {
                    f.write_str(" | ")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        Ok(())
    }
}

/// What a component asks the world to do once it is finished with its
/// main purpose.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum OnComponentFinishedAction {
    /// Nothing.
    #[default]
    None,
    /// Delete the component.
    DeleteComponent,
    /// Delete the owning object, and with it the component.
    DeleteEntity,
}

/// Return value of visitor callbacks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VisitorExecution {
    /// Keep visiting.
    Continue,
    /// Stop the walk.
    Stop,
}
