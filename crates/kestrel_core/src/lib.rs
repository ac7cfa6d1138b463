//! # KESTREL Core
//!
//! Entity/component world runtime designed for:
//! - Large, constantly changing populations of game objects
//! - Handles that detect use-after-free instead of dangling
//! - Bounded, block-based memory per world
//!
//! ## Architecture Rules
//!
//! 1. **No raw references across frames** - Everything is addressed by
//!    generation-checked handles
//! 2. **No moves of live data** - Pools grow by whole blocks
//! 3. **No mutation from inside callbacks** - Structural changes are
//!    recorded as commands and applied afterwards
//!
//! ## Example
//!
//! ```rust,ignore
//! use kestrel_core::{GameObjectDesc, MessageRouting, World, WorldConfig};
//!
//! let mut world = World::new(WorldConfig::named("arena"))?;
//! let player = world.create_object(GameObjectDesc::new().with_name("player"))?;
//! world.create_component(player, Health(100))?;
//!
//! world.send_message(player, &Damage(10), MessageRouting::ToComponents);
//! let stats = world.update(1.0 / 60.0);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod debug;
pub mod ecs;
pub mod error;
pub mod memory;
pub mod sync;

pub use config::WorldConfig;
pub use debug::DebugDraw;
pub use ecs::{
    ChildPolicy, CommandBuffer, Component, ComponentContext, ComponentHandle, ComponentId,
    ComponentManager, FrameInfo, FrameStats, GameObject, GameObjectDesc, Message,
    MessageHandlers, MessageQueuePhase, MessageRouting, MsgDeleteGameObject, MsgSetActive,
    ObjectFlags, ObjectHandle, ObjectId, OnComponentFinishedAction, SharedWorld,
    VisitorExecution, World, WorldRegistry,
};
pub use error::{AnyHandle, WorldError, WorldResult};
pub use memory::{BlockAllocator, BlockId, BlockStorage};
pub use sync::FrameDataBuffer;
