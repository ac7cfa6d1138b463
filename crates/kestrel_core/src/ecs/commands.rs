//! # Commands
//!
//! Structural world mutations recorded while the world is borrowed by a
//! callback.
//!
//! Component callbacks and message handlers only see a
//! [`ComponentContext`](super::ComponentContext). Anything that would
//! reshape the world (deleting objects, adding components, sending further
//! messages) is written here instead and applied by the world, in recording
//! order, as soon as the callback returns.

use std::fmt;

use super::component::Component;
use super::flags::OnComponentFinishedAction;
use super::handle::{ComponentHandle, ObjectHandle};
use super::message::{Message, MessageQueuePhase, QueuedTarget};
use super::object::ChildPolicy;
use super::routing::MessageRouting;
use super::world::World;

type DeferredFn = Box<dyn FnOnce(&mut World) + Send>;

/// A deferred world mutation.
pub(crate) enum Command {
    /// Deliver right after the callback returns.
    Send {
        target: QueuedTarget,
        message: Box<dyn Message>,
    },
    /// Park in a phase queue.
    Post {
        target: QueuedTarget,
        message: Box<dyn Message>,
        phase: MessageQueuePhase,
    },
    DeleteObject {
        object: ObjectHandle,
        policy: ChildPolicy,
    },
    DeleteComponent(ComponentHandle),
    ComponentFinished {
        component: ComponentHandle,
        action: OnComponentFinishedAction,
    },
    SetActive {
        object: ObjectHandle,
        active: bool,
    },
    Deferred(DeferredFn),
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Send { target, message } => f
                .debug_struct("Send")
                .field("target", target)
                .field("message", &(**message).type_name())
                .finish(),
            Self::Post {
                target,
                message,
                phase,
            } => f
                .debug_struct("Post")
                .field("target", target)
                .field("message", &(**message).type_name())
                .field("phase", phase)
                .finish(),
            Self::DeleteObject { object, policy } => f
                .debug_struct("DeleteObject")
                .field("object", object)
                .field("policy", policy)
                .finish(),
            Self::DeleteComponent(component) => {
                f.debug_tuple("DeleteComponent").field(component).finish()
            }
            Self::ComponentFinished { component, action } => f
                .debug_struct("ComponentFinished")
                .field("component", component)
                .field("action", action)
                .finish(),
            Self::SetActive { object, active } => f
                .debug_struct("SetActive")
                .field("object", object)
                .field("active", active)
                .finish(),
            Self::Deferred(_) => f.write_str("Deferred"),
        }
    }
}

/// Ordered list of deferred world mutations.
#[derive(Debug, Default)]
pub struct CommandBuffer {
    commands: Vec<Command>,
}

impl CommandBuffer {
    /// Creates an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of recorded commands.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Returns `true` if nothing was recorded.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Sends `message` to `target` as soon as the current callback returns.
    pub fn send_message<M: Message>(
        &mut self,
        target: ObjectHandle,
        message: M,
        routing: MessageRouting,
    ) {
        self.commands.push(Command::Send {
            target: QueuedTarget::Object {
                handle: target,
                routing,
            },
            message: Box::new(message),
        });
    }

    /// Queues `message` for `target` until `phase` is flushed.
    pub fn post_message<M: Message>(
        &mut self,
        target: ObjectHandle,
        message: M,
        routing: MessageRouting,
        phase: MessageQueuePhase,
    ) {
        self.commands.push(Command::Post {
            target: QueuedTarget::Object {
                handle: target,
                routing,
            },
            message: Box::new(message),
            phase,
        });
    }

    /// Queues `message` for a single component until `phase` is flushed.
    pub fn post_to_component<M: Message>(
        &mut self,
        target: ComponentHandle,
        message: M,
        phase: MessageQueuePhase,
    ) {
        self.commands.push(Command::Post {
            target: QueuedTarget::Component(target),
            message: Box::new(message),
            phase,
        });
    }

    /// Destroys `object` and its subtree.
    pub fn delete_object(&mut self, object: ObjectHandle) {
        self.delete_object_with(object, ChildPolicy::Destroy);
    }

    /// Destroys `object`, handling its children according to `policy`.
    pub fn delete_object_with(&mut self, object: ObjectHandle, policy: ChildPolicy) {
        self.commands.push(Command::DeleteObject { object, policy });
    }

    /// Deletes a single component.
    pub fn delete_component(&mut self, component: ComponentHandle) {
        self.commands.push(Command::DeleteComponent(component));
    }

    /// Reports that `component` is done, letting the world apply `action`.
    pub fn component_finished(
        &mut self,
        component: ComponentHandle,
        action: OnComponentFinishedAction,
    ) {
        self.commands
            .push(Command::ComponentFinished { component, action });
    }

    /// Sets or clears the `ACTIVE` flag of `object`.
    pub fn set_active(&mut self, object: ObjectHandle, active: bool) {
        self.commands.push(Command::SetActive { object, active });
    }

    /// Attaches `value` to `owner`. Failures (dead owner, exhausted pool)
    /// are dropped.
    pub fn add_component<T: Component>(&mut self, owner: ObjectHandle, value: T) {
        self.defer(move |world: &mut World| {
            if let Err(err) = world.create_component(owner, value) {
                tracing::trace!("Deferred component for {} dropped: {}", owner, err);
            }
        });
    }

    /// Runs an arbitrary closure against the world.
    pub fn defer<F>(&mut self, f: F)
    where
        F: FnOnce(&mut World) + Send + 'static,
    {
        self.commands.push(Command::Deferred(Box::new(f)));
    }

    pub(crate) fn take(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.commands)
    }
}
