//! # World Registry
//!
//! Hands out world indices and keeps every live world behind one
//! coordinating lock.
//!
//! ```text
//!  WorldRegistry
//!   slot 0  ─► Arc<RwLock<World>>   readers: resolve / query
//!   slot 1  ─► (free)               writer:  create / destroy / update
//!   ...
//!   slot 63
//! ```
//!
//! The world index is baked into every handle, so there can be at most
//! [`MAX_WORLDS`] worlds alive at once.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::debug;

use super::handle::MAX_WORLDS;
use super::world::World;
use crate::config::WorldConfig;
use crate::error::{WorldError, WorldResult};

/// A world shared between threads. Read guards for queries, the write
/// guard for anything structural.
pub type SharedWorld = Arc<RwLock<World>>;

/// Table of live worlds, indexed by world index.
pub struct WorldRegistry {
    worlds: Mutex<Vec<Option<SharedWorld>>>,
}

impl WorldRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            worlds: Mutex::new(Vec::new()),
        }
    }

    /// Creates a world under the lowest free index.
    ///
    /// # Errors
    ///
    /// - [`WorldError::TooManyWorlds`] if all indices are taken
    /// - [`WorldError::InvalidConfig`] if the configuration does not validate
    pub fn register(&self, config: WorldConfig) -> WorldResult<SharedWorld> {
        let mut worlds = self.worlds.lock();
        let index = match worlds.iter().position(Option::is_none) {
            Some(index) => index,
            None if worlds.len() < MAX_WORLDS as usize => {
                worlds.push(None);
                worlds.len() - 1
            }
            None => return Err(WorldError::TooManyWorlds { max: MAX_WORLDS }),
        };

        // Bounded by MAX_WORLDS above.
        let world = World::with_index(index as u32, config)?;
        let shared = Arc::new(RwLock::new(world));
        worlds[index] = Some(Arc::clone(&shared));
        debug!("Registered world {}", index);
        Ok(shared)
    }

    /// The world registered under `index`.
    #[must_use]
    pub fn get(&self, index: u32) -> Option<SharedWorld> {
        self.worlds.lock().get(index as usize)?.clone()
    }

    /// Removes the world under `index`, freeing the index for reuse.
    ///
    /// The world itself is dropped once the last `SharedWorld` clone goes.
    pub fn unregister(&self, index: u32) -> Option<SharedWorld> {
        let removed = self.worlds.lock().get_mut(index as usize)?.take();
        if removed.is_some() {
            debug!("Unregistered world {}", index);
        }
        removed
    }

    /// Number of registered worlds.
    #[must_use]
    pub fn len(&self) -> usize {
        self.worlds.lock().iter().filter(|slot| slot.is_some()).count()
    }

    /// Returns `true` if no world is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for WorldRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::GameObjectDesc;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_world_is_send_and_sync() {
        assert_send_sync::<World>();
        assert_send_sync::<WorldRegistry>();
    }

    #[test]
    fn test_indices_are_reused() {
        let registry = WorldRegistry::new();
        let first = registry.register(WorldConfig::named("a")).unwrap();
        let second = registry.register(WorldConfig::named("b")).unwrap();
        assert_eq!(first.read().index(), 0);
        assert_eq!(second.read().index(), 1);

        assert!(registry.unregister(0).is_some());
        assert!(registry.get(0).is_none());
        assert_eq!(registry.len(), 1);

        let third = registry.register(WorldConfig::named("c")).unwrap();
        assert_eq!(third.read().index(), 0);
    }

    #[test]
    fn test_capacity_is_bounded() {
        let registry = WorldRegistry::new();
        let config = WorldConfig {
            max_blocks: 1,
            ..WorldConfig::default()
        };
        for _ in 0..MAX_WORLDS {
            registry.register(config.clone()).unwrap();
        }
        assert_eq!(
            registry.register(config).unwrap_err(),
            WorldError::TooManyWorlds { max: MAX_WORLDS }
        );
    }

    #[test]
    fn test_handles_carry_world_index() {
        let registry = WorldRegistry::new();
        registry.register(WorldConfig::named("a")).unwrap();
        let world = registry.register(WorldConfig::named("b")).unwrap();

        let handle = world.write().create_object(GameObjectDesc::new()).unwrap();
        assert_eq!(handle.id().world_index(), 1);

        let other = registry.get(0).unwrap();
        assert!(!other.read().is_valid_object(handle));
    }
}
