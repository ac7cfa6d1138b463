//! # World Error Types
//!
//! All errors that can occur while manipulating a world.
//!
//! Stale handles and dead routing targets are expected during normal play
//! (objects die while messages are in flight). The world absorbs those
//! silently on its own paths; they only surface through the explicit
//! `resolve*` style calls.

use thiserror::Error;

use crate::ecs::{ComponentHandle, ObjectHandle};

/// A handle of either kind, for error reporting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnyHandle {
    /// A game object handle.
    Object(ObjectHandle),
    /// A component handle.
    Component(ComponentHandle),
}

impl std::fmt::Display for AnyHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Object(handle) => handle.fmt(f),
            Self::Component(handle) => handle.fmt(f),
        }
    }
}

impl From<ObjectHandle> for AnyHandle {
    fn from(handle: ObjectHandle) -> Self {
        Self::Object(handle)
    }
}

impl From<ComponentHandle> for AnyHandle {
    fn from(handle: ComponentHandle) -> Self {
        Self::Component(handle)
    }
}

/// Errors that can occur in the world runtime.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorldError {
    /// Generation mismatch, dead slot, or a handle issued by another world.
    #[error("stale handle: {0}")]
    StaleHandle(AnyHandle),

    /// The slot never existed (index out of range, invalid handle, or a
    /// component type that was never registered).
    #[error("not found: {0}")]
    NotFound(AnyHandle),

    /// Re-parenting would have created a loop in the object forest.
    #[error("cycle rejected: {parent} is {child} or one of its descendants")]
    CycleRejected {
        /// The object that was being re-parented.
        child: ObjectHandle,
        /// The requested new parent.
        parent: ObjectHandle,
    },

    /// A pool could not grow.
    #[error("out of memory: {pool} pool exhausted at capacity {capacity}")]
    OutOfMemory {
        /// Which pool ran dry ("blocks", "objects", "components").
        pool: &'static str,
        /// The capacity that was hit.
        capacity: usize,
    },

    /// The message target resolved to nothing at delivery time.
    #[error("invalid routing target: {0}")]
    InvalidRoutingTarget(ObjectHandle),

    /// Every world index is in use.
    #[error("too many worlds: at most {max} may exist at once")]
    TooManyWorlds {
        /// Maximum number of concurrently registered worlds.
        max: u32,
    },

    /// The world configuration could not be parsed or is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl WorldError {
    /// Returns `true` for the failures that only reflect normal gameplay
    /// churn (stale handles, dead routing targets).
    #[must_use]
    pub const fn is_churn(&self) -> bool {
        matches!(self, Self::StaleHandle(_) | Self::InvalidRoutingTarget(_))
    }
}

/// Result type for world operations.
pub type WorldResult<T> = Result<T, WorldError>;
