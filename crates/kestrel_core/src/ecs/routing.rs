//! # Message Routing
//!
//! Turns a (target, mode) pair into the ordered list of objects a message
//! visits.

use super::handle::ObjectHandle;
use super::object::ObjectStore;
use crate::error::{WorldError, WorldResult};

/// Which objects a message visits, starting from its target.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum MessageRouting {
    /// The target's object-level handlers only.
    ToObjectOnly,
    /// The target and every component it owns.
    #[default]
    ToComponents,
    /// The target, then each ancestor up to the root.
    ToAllParents,
    /// The target, then its descendants depth-first, pre-order.
    ToChildren,
    /// The target's root, then that root's whole tree.
    ToSubTree,
}

impl MessageRouting {
    /// Returns `false` only for [`MessageRouting::ToObjectOnly`].
    #[inline]
    #[must_use]
    pub const fn includes_components(self) -> bool {
        !matches!(self, Self::ToObjectOnly)
    }
}

/// Objects visited by a message sent to `target` with `routing`.
///
/// # Errors
///
/// Returns [`WorldError::InvalidRoutingTarget`] if `target` does not
/// resolve.
pub(crate) fn delivery_set(
    store: &ObjectStore,
    target: ObjectHandle,
    routing: MessageRouting,
) -> WorldResult<Vec<ObjectHandle>> {
    if !store.contains(target) {
        return Err(WorldError::InvalidRoutingTarget(target));
    }

    Ok(match routing {
        MessageRouting::ToObjectOnly | MessageRouting::ToComponents => vec![target],
        MessageRouting::ToAllParents => store.ancestors(target),
        MessageRouting::ToChildren => store.subtree(target),
        MessageRouting::ToSubTree => store.subtree(store.root_of(target)),
    })
}
