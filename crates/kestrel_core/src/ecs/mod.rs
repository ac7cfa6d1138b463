//! # Entity Component System
//!
//! Game objects, components and the messages that flow between them.
//!
//! ## Design Philosophy
//!
//! - Objects and components are addressed by generation-checked handles,
//!   never by pointer
//! - Storage grows in fixed-size blocks and never moves live data
//! - Objects form a forest; messages are routed over it
//! - Callbacks record structural changes into a command buffer instead of
//!   mutating the world they are called from

mod commands;
mod component;
mod flags;
mod handle;
mod message;
mod object;
mod registry;
mod routing;
mod slots;
mod world;

pub use commands::CommandBuffer;
pub use component::{Component, ComponentManager};
pub use flags::{ObjectFlags, OnComponentFinishedAction, VisitorExecution};
pub use handle::{
    ComponentHandle, ComponentId, ObjectHandle, ObjectId, COMPONENT_GENERATION_BITS,
    COMPONENT_INDEX_BITS, MAX_WORLDS, OBJECT_GENERATION_BITS, OBJECT_INDEX_BITS,
    OBJECT_WORLD_BITS,
};
pub use message::{
    ComponentContext, FrameInfo, Message, MessageHandlers, MessageQueuePhase,
    MsgDeleteGameObject, MsgSetActive,
};
pub use object::{ChildPolicy, GameObject, GameObjectDesc, ObjectStore};
pub use registry::{SharedWorld, WorldRegistry};
pub use routing::MessageRouting;
pub use world::{FrameStats, World};
