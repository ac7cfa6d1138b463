//! # Messages
//!
//! Any `Clone + Send + Sync + Debug` value is a message. Receivers register
//! typed handlers per message type; the world looks the handler up by the
//! message's `TypeId` at delivery time.
//!
//! Messages are either delivered immediately or parked in one of the
//! phase queues until the world reaches that phase of the frame:
//!
//! ```text
//!  update():  init → NextFrame → AfterInitialized → sim start → update
//!             → PostAsync → PostTransform
//! ```

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;

use super::commands::CommandBuffer;
use super::handle::{ComponentHandle, ObjectHandle};
use super::routing::MessageRouting;

/// A value that can be routed through the object graph.
///
/// Implemented for every `Clone + Send + Sync + Debug + 'static` type.
pub trait Message: Any + Send + Sync + fmt::Debug {
    /// Upcast for downcasting to the concrete message type.
    fn as_any(&self) -> &dyn Any;

    /// Clones the message into a box, for queued delivery.
    fn clone_boxed(&self) -> Box<dyn Message>;

    /// Name of the concrete message type, for logs.
    fn type_name(&self) -> &'static str;
}

impl<M> Message for M
where
    M: Any + Clone + Send + Sync + fmt::Debug,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn clone_boxed(&self) -> Box<dyn Message> {
        Box::new(self.clone())
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<M>()
    }
}

/// Deletes the receiving object (and its subtree) once the current
/// delivery has finished. Handled at object level.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MsgDeleteGameObject;

/// Sets or clears the `ACTIVE` flag of the receiving object. Handled at
/// object level.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MsgSetActive {
    /// New activation state.
    pub active: bool,
}

/// Frame in which a queued message is delivered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MessageQueuePhase {
    /// After the component update pass of the current frame.
    PostAsync,
    /// After `PostAsync`, once transforms are final.
    PostTransform,
    /// In the next frame, once the initialization pass is done.
    NextFrame,
    /// In the next frame, right after `NextFrame`.
    AfterInitialized,
}

impl MessageQueuePhase {
    /// Number of phases.
    pub const COUNT: usize = 4;

    /// All phases in declaration order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::PostAsync,
        Self::PostTransform,
        Self::NextFrame,
        Self::AfterInitialized,
    ];

    #[inline]
    pub(crate) const fn index(self) -> usize {
        match self {
            Self::PostAsync => 0,
            Self::PostTransform => 1,
            Self::NextFrame => 2,
            Self::AfterInitialized => 3,
        }
    }
}

/// A message parked until its phase is flushed.
#[derive(Debug)]
pub(crate) struct QueuedMessage {
    pub(crate) target: QueuedTarget,
    pub(crate) message: Box<dyn Message>,
}

#[derive(Clone, Copy, Debug)]
pub(crate) enum QueuedTarget {
    Object {
        handle: ObjectHandle,
        routing: MessageRouting,
    },
    Component(ComponentHandle),
}

/// One queue per phase.
#[derive(Debug, Default)]
pub(crate) struct MessageQueues {
    queues: [Vec<QueuedMessage>; MessageQueuePhase::COUNT],
}

impl MessageQueues {
    pub(crate) fn push(&mut self, phase: MessageQueuePhase, message: QueuedMessage) {
        self.queues[phase.index()].push(message);
    }

    /// Takes everything queued for `phase`. Messages posted while the batch
    /// is being delivered land in the fresh queue and wait a full cycle.
    pub(crate) fn take(&mut self, phase: MessageQueuePhase) -> Vec<QueuedMessage> {
        std::mem::take(&mut self.queues[phase.index()])
    }

    pub(crate) fn len(&self, phase: MessageQueuePhase) -> usize {
        self.queues[phase.index()].len()
    }
}

/// Per-frame values handed to callbacks.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FrameInfo {
    /// Number of completed frames.
    pub frame: u64,
    /// Time step of the current frame in seconds.
    pub delta_seconds: f32,
}

/// What a callback may see and request while the world is borrowed.
///
/// Structural changes go through [`ComponentContext::commands`] and are
/// applied by the world once the callback returns.
pub struct ComponentContext<'a> {
    owner: ObjectHandle,
    component: Option<ComponentHandle>,
    frame: FrameInfo,
    commands: &'a mut CommandBuffer,
}

impl<'a> ComponentContext<'a> {
    pub(crate) fn new(
        owner: ObjectHandle,
        component: Option<ComponentHandle>,
        frame: FrameInfo,
        commands: &'a mut CommandBuffer,
    ) -> Self {
        Self {
            owner,
            component,
            frame,
            commands,
        }
    }

    /// The object being visited (the owner, for component callbacks).
    #[inline]
    #[must_use]
    pub const fn owner(&self) -> ObjectHandle {
        self.owner
    }

    /// The component being called, `None` for object-level handlers.
    #[inline]
    #[must_use]
    pub const fn component(&self) -> Option<ComponentHandle> {
        self.component
    }

    /// Frame counter and time step.
    #[inline]
    #[must_use]
    pub const fn frame(&self) -> FrameInfo {
        self.frame
    }

    /// Deferred world mutations.
    #[inline]
    pub fn commands(&mut self) -> &mut CommandBuffer {
        &mut *self.commands
    }
}

type ErasedHandler<T> =
    Box<dyn Fn(&mut T, &dyn Message, &mut ComponentContext<'_>) + Send + Sync>;

/// Typed message handlers of one receiver type, keyed by message type.
pub struct MessageHandlers<T> {
    handlers: HashMap<TypeId, ErasedHandler<T>>,
}

impl<T: 'static> MessageHandlers<T> {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Registers the handler for messages of type `M`, replacing any
    /// previous one.
    pub fn on<M, F>(&mut self, handler: F) -> &mut Self
    where
        M: Message,
        F: Fn(&mut T, &M, &mut ComponentContext<'_>) + Send + Sync + 'static,
    {
        self.handlers.insert(
            TypeId::of::<M>(),
            Box::new(
                move |receiver: &mut T, message: &dyn Message, ctx: &mut ComponentContext<'_>| {
                    if let Some(message) = message.as_any().downcast_ref::<M>() {
                        handler(receiver, message, ctx);
                    }
                },
            ),
        );
        self
    }

    /// Returns `true` if a handler for `M` is registered.
    #[must_use]
    pub fn handles<M: Message>(&self) -> bool {
        self.handlers.contains_key(&TypeId::of::<M>())
    }

    /// Number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns `true` if no handler is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Runs the handler matching the message's concrete type.
    ///
    /// Returns `false` if none is registered.
    pub(crate) fn dispatch(
        &self,
        receiver: &mut T,
        message: &dyn Message,
        ctx: &mut ComponentContext<'_>,
    ) -> bool {
        match self.handlers.get(&message.as_any().type_id()) {
            Some(handler) => {
                handler(receiver, message, ctx);
                true
            }
            None => false,
        }
    }
}

impl<T: 'static> Default for MessageHandlers<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for MessageHandlers<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageHandlers")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug)]
    struct Ping(u32);

    #[derive(Clone, Debug)]
    struct Pong;

    #[test]
    fn test_dispatch_by_concrete_type() {
        let mut handlers: MessageHandlers<u32> = MessageHandlers::new();
        handlers.on(|total: &mut u32, ping: &Ping, _ctx: &mut ComponentContext<'_>| {
            *total += ping.0;
        });

        let mut commands = CommandBuffer::new();
        let mut ctx = ComponentContext::new(
            ObjectHandle::INVALID,
            None,
            FrameInfo::default(),
            &mut commands,
        );
        let mut total = 0;

        assert!(handlers.dispatch(&mut total, &Ping(5), &mut ctx));
        assert!(!handlers.dispatch(&mut total, &Pong, &mut ctx));
        assert_eq!(total, 5);
        assert!(handlers.handles::<Ping>());
        assert!(!handlers.handles::<Pong>());
    }

    #[test]
    fn test_boxed_clone_keeps_type() {
        let boxed: Box<dyn Message> = Ping(9).clone_boxed();
        let ping = boxed.as_any().downcast_ref::<Ping>().unwrap();
        assert_eq!(ping.0, 9);
        assert!(boxed.type_name().ends_with("Ping"));
    }

    #[test]
    fn test_queues_take_resets_phase() {
        let mut queues = MessageQueues::default();
        queues.push(
            MessageQueuePhase::NextFrame,
            QueuedMessage {
                target: QueuedTarget::Component(ComponentHandle::INVALID),
                message: Box::new(Pong),
            },
        );
        assert_eq!(queues.len(MessageQueuePhase::NextFrame), 1);
        assert_eq!(queues.len(MessageQueuePhase::PostAsync), 0);

        let batch = queues.take(MessageQueuePhase::NextFrame);
        assert_eq!(batch.len(), 1);
        assert_eq!(queues.len(MessageQueuePhase::NextFrame), 0);
    }
}
