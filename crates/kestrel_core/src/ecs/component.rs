//! # Components & Component Managers
//!
//! A component is plain data plus optional callbacks, attached to exactly
//! one game object. Every component type gets its own manager, which owns
//! the typed storage and the message handler table of that type.
//!
//! ## Design
//!
//! - Storage is block-backed, so components never move while alive
//! - Handles carry the dense type id of their manager, so the world routes
//!   a bare [`ComponentHandle`] to the right manager without knowing `T`
//! - Lifecycle callbacks all default to no-ops

use std::any::Any;

use super::commands::CommandBuffer;
use super::flags::ObjectFlags;
use super::handle::{ComponentHandle, ComponentId, ObjectHandle, COMPONENT_GENERATION_BITS};
use super::message::{ComponentContext, FrameInfo, Message, MessageHandlers};
use super::object::ObjectStore;
use super::slots::{SlotState, SlotTable};
use crate::error::{WorldError, WorldResult};
use crate::memory::{BlockAllocator, BlockStorage};

/// Behavior shared by all component types.
///
/// # Example
///
/// ```rust,ignore
/// #[derive(Default)]
/// struct Health(u32);
///
/// impl Component for Health {
///     fn register_handlers(handlers: &mut MessageHandlers<Self>) {
///         handlers.on(|health: &mut Health, hit: &Damage, _ctx: &mut ComponentContext<'_>| {
///             health.0 = health.0.saturating_sub(hit.0);
///         });
///     }
/// }
/// ```
pub trait Component: Send + Sync + Sized + 'static {
    /// Sets `UNHANDLED_MESSAGE_HANDLER` on every new instance, so messages
    /// without a typed handler reach [`Component::on_unhandled_message`].
    const HANDLES_UNHANDLED_MESSAGES: bool = false;

    /// Registers the typed message handlers of this type. Called once, when
    /// the type is first used in a world.
    fn register_handlers(_handlers: &mut MessageHandlers<Self>) {}

    /// Runs once, during the first update after creation.
    fn initialize(&mut self, _ctx: &mut ComponentContext<'_>) {}

    /// Runs once per lifetime, the first time simulation runs after
    /// initialization.
    fn on_simulation_started(&mut self, _ctx: &mut ComponentContext<'_>) {}

    /// Runs every simulated frame while the component and its owner are
    /// active.
    fn update(&mut self, _ctx: &mut ComponentContext<'_>) {}

    /// Runs right before an initialized component is deleted.
    fn on_deinitialize(&mut self) {}

    /// Catch-all for messages without a typed handler.
    fn on_unhandled_message(&mut self, _message: &dyn Message, _ctx: &mut ComponentContext<'_>) {}
}

/// A component plus its bookkeeping.
struct ComponentSlot<T> {
    handle: ComponentHandle,
    owner: ObjectHandle,
    flags: ObjectFlags,
    value: T,
}

/// Storage and handlers for one component type.
pub struct ComponentManager<T: Component> {
    type_id: u16,
    world_index: u16,
    slots: SlotTable,
    storage: BlockStorage<ComponentSlot<T>>,
    handlers: MessageHandlers<T>,
}

impl<T: Component> ComponentManager<T> {
    pub(crate) fn new(type_id: u16, world_index: u16, block_size: usize) -> Self {
        let mut handlers = MessageHandlers::new();
        T::register_handlers(&mut handlers);
        Self {
            type_id,
            world_index,
            slots: SlotTable::new(COMPONENT_GENERATION_BITS, ComponentId::MAX_INSTANCES),
            storage: BlockStorage::new(block_size),
            handlers,
        }
    }

    /// Dense type id of this manager within its world.
    #[inline]
    #[must_use]
    pub const fn type_id(&self) -> u16 {
        self.type_id
    }

    /// Number of live components.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.slots.live()
    }

    /// Returns `true` if no component is alive.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.slots.live() == 0
    }

    /// Typed handlers registered for `T`.
    #[inline]
    #[must_use]
    pub const fn handlers(&self) -> &MessageHandlers<T> {
        &self.handlers
    }

    /// Stores a new component owned by `owner`.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::OutOfMemory`] if the index space or the block
    /// arena is exhausted.
    pub(crate) fn create(
        &mut self,
        owner: ObjectHandle,
        value: T,
        allocator: &mut BlockAllocator,
    ) -> WorldResult<ComponentHandle> {
        let (index, generation) = self.slots.allocate().ok_or(WorldError::OutOfMemory {
            pool: "components",
            capacity: self.slots.max_slots() as usize,
        })?;
        let handle = ComponentHandle::new(ComponentId::new(
            index,
            generation,
            self.type_id,
            self.world_index,
        ));

        let mut flags = ObjectFlags::DEFAULT;
        flags.set(ObjectFlags::UNHANDLED_MESSAGE_HANDLER, T::HANDLES_UNHANDLED_MESSAGES);

        let slot = ComponentSlot {
            handle,
            owner,
            flags,
            value,
        };
        if let Err(err) = self.storage.insert(index as usize, slot, allocator) {
            self.slots.free(index, generation);
            return Err(err);
        }
        Ok(handle)
    }

    fn check(&self, handle: ComponentHandle) -> WorldResult<usize> {
        if !handle.is_valid() {
            return Err(WorldError::NotFound(handle.into()));
        }
        let id = handle.id();
        if id.type_id() != self.type_id || id.world_index() != self.world_index {
            return Err(WorldError::StaleHandle(handle.into()));
        }
        match self.slots.state(id.instance_index(), id.generation()) {
            SlotState::Live => Ok(id.instance_index() as usize),
            SlotState::Stale => Err(WorldError::StaleHandle(handle.into())),
            SlotState::OutOfRange => Err(WorldError::NotFound(handle.into())),
        }
    }

    #[inline]
    fn slot(&self, handle: ComponentHandle) -> Option<&ComponentSlot<T>> {
        let index = self.check(handle).ok()?;
        self.storage.get(index)
    }

    #[inline]
    fn slot_mut(&mut self, handle: ComponentHandle) -> Option<&mut ComponentSlot<T>> {
        let index = self.check(handle).ok()?;
        self.storage.get_mut(index)
    }

    /// Resolves a handle to the component value.
    ///
    /// # Errors
    ///
    /// [`WorldError::StaleHandle`] for dead slots and handles of another type
    /// or world, [`WorldError::NotFound`] for indices never handed out.
    pub fn resolve(&self, handle: ComponentHandle) -> WorldResult<&T> {
        let index = self.check(handle)?;
        self.storage
            .get(index)
            .map(|slot| &slot.value)
            .ok_or(WorldError::StaleHandle(handle.into()))
    }

    /// Returns the component, or `None` for stale handles.
    #[inline]
    #[must_use]
    pub fn try_get(&self, handle: ComponentHandle) -> Option<&T> {
        self.slot(handle).map(|slot| &slot.value)
    }

    /// Returns the component mutably, or `None` for stale handles.
    #[inline]
    pub fn try_get_mut(&mut self, handle: ComponentHandle) -> Option<&mut T> {
        self.slot_mut(handle).map(|slot| &mut slot.value)
    }

    /// Owning object of a live component.
    #[inline]
    #[must_use]
    pub fn owner_of(&self, handle: ComponentHandle) -> Option<ObjectHandle> {
        self.slot(handle).map(|slot| slot.owner)
    }

    /// Flags of a live component.
    #[inline]
    #[must_use]
    pub fn flags(&self, handle: ComponentHandle) -> Option<ObjectFlags> {
        self.slot(handle).map(|slot| slot.flags)
    }

    /// Iterates over live components in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (ComponentHandle, &T)> {
        self.storage.iter().map(|(_, slot)| (slot.handle, &slot.value))
    }

    /// Iterates mutably over live components in slot order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (ComponentHandle, &mut T)> {
        self.storage
            .iter_mut()
            .map(|(_, slot)| (slot.handle, &mut slot.value))
    }

    /// Removes a component, running `on_deinitialize` if it was initialized.
    ///
    /// Returns the value and its former owner, `None` for stale handles.
    pub(crate) fn remove(&mut self, handle: ComponentHandle) -> Option<(ObjectHandle, T)> {
        let index = self.check(handle).ok()?;
        let id = handle.id();
        self.slots.free(id.instance_index(), id.generation());
        let mut slot = self.storage.remove(index)?;
        if slot.flags.contains(ObjectFlags::INITIALIZED) {
            slot.value.on_deinitialize();
        }
        Some((slot.owner, slot.value))
    }
}

/// Type-erased view of a [`ComponentManager`], indexed by dense type id.
pub(crate) trait ComponentManagerBase: Send + Sync {
    fn type_name(&self) -> &'static str;

    fn len(&self) -> usize;

    fn contains(&self, handle: ComponentHandle) -> bool;

    fn owner_of(&self, handle: ComponentHandle) -> Option<ObjectHandle>;

    fn flags(&self, handle: ComponentHandle) -> Option<ObjectFlags>;

    fn set_active(&mut self, handle: ComponentHandle, active: bool) -> bool;

    /// Typed handler first, then the catch-all if the flag is set.
    ///
    /// Returns `true` if anything handled the message.
    fn deliver(
        &mut self,
        handle: ComponentHandle,
        message: &dyn Message,
        frame: FrameInfo,
        commands: &mut CommandBuffer,
    ) -> bool;

    /// Runs `initialize` once. Returns `false` if the component is gone or
    /// already initialized.
    fn initialize(
        &mut self,
        handle: ComponentHandle,
        frame: FrameInfo,
        commands: &mut CommandBuffer,
    ) -> bool;

    /// Runs `on_simulation_started` once. Returns `false` if the component
    /// is gone, not initialized yet, or already started.
    fn start_simulation(
        &mut self,
        handle: ComponentHandle,
        frame: FrameInfo,
        commands: &mut CommandBuffer,
    ) -> bool;

    /// Updates every initialized, active component of an active owner.
    fn update_all(
        &mut self,
        objects: &ObjectStore,
        frame: FrameInfo,
        commands: &mut CommandBuffer,
    ) -> usize;

    /// Deletes a component. Returns its former owner.
    fn delete(&mut self, handle: ComponentHandle) -> Option<ObjectHandle>;

    fn trim(&mut self, allocator: &mut BlockAllocator) -> usize;

    fn release_all(&mut self, allocator: &mut BlockAllocator);

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Component> ComponentManagerBase for ComponentManager<T> {
    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn len(&self) -> usize {
        self.slots.live()
    }

    fn contains(&self, handle: ComponentHandle) -> bool {
        self.check(handle).is_ok()
    }

    fn owner_of(&self, handle: ComponentHandle) -> Option<ObjectHandle> {
        ComponentManager::owner_of(self, handle)
    }

    fn flags(&self, handle: ComponentHandle) -> Option<ObjectFlags> {
        ComponentManager::flags(self, handle)
    }

    fn set_active(&mut self, handle: ComponentHandle, active: bool) -> bool {
        match self.slot_mut(handle) {
            Some(slot) => {
                slot.flags.set(ObjectFlags::ACTIVE, active);
                true
            }
            None => false,
        }
    }

    fn deliver(
        &mut self,
        handle: ComponentHandle,
        message: &dyn Message,
        frame: FrameInfo,
        commands: &mut CommandBuffer,
    ) -> bool {
        let Ok(index) = self.check(handle) else {
            return false;
        };
        let Some(slot) = self.storage.get_mut(index) else {
            return false;
        };

        let mut ctx = ComponentContext::new(slot.owner, Some(handle), frame, commands);
        if self.handlers.dispatch(&mut slot.value, message, &mut ctx) {
            return true;
        }
        if slot.flags.contains(ObjectFlags::UNHANDLED_MESSAGE_HANDLER) {
            slot.value.on_unhandled_message(message, &mut ctx);
            return true;
        }
        false
    }

    fn initialize(
        &mut self,
        handle: ComponentHandle,
        frame: FrameInfo,
        commands: &mut CommandBuffer,
    ) -> bool {
        let Some(slot) = self.slot_mut(handle) else {
            return false;
        };
        if slot
            .flags
            .intersects(ObjectFlags::INITIALIZED | ObjectFlags::INITIALIZING)
        {
            return false;
        }

        slot.flags.insert(ObjectFlags::INITIALIZING);
        let mut ctx = ComponentContext::new(slot.owner, Some(handle), frame, commands);
        slot.value.initialize(&mut ctx);
        slot.flags.remove(ObjectFlags::INITIALIZING);
        slot.flags.insert(ObjectFlags::INITIALIZED);
        true
    }

    fn start_simulation(
        &mut self,
        handle: ComponentHandle,
        frame: FrameInfo,
        commands: &mut CommandBuffer,
    ) -> bool {
        let Some(slot) = self.slot_mut(handle) else {
            return false;
        };
        if !slot.flags.contains(ObjectFlags::INITIALIZED)
            || slot
                .flags
                .intersects(ObjectFlags::SIMULATION_STARTED | ObjectFlags::SIMULATION_STARTING)
        {
            return false;
        }

        slot.flags.insert(ObjectFlags::SIMULATION_STARTING);
        let mut ctx = ComponentContext::new(slot.owner, Some(handle), frame, commands);
        slot.value.on_simulation_started(&mut ctx);
        slot.flags.remove(ObjectFlags::SIMULATION_STARTING);
        slot.flags.insert(ObjectFlags::SIMULATION_STARTED);
        true
    }

    fn update_all(
        &mut self,
        objects: &ObjectStore,
        frame: FrameInfo,
        commands: &mut CommandBuffer,
    ) -> usize {
        let mut updated = 0;
        for (_, slot) in self.storage.iter_mut() {
            if !slot
                .flags
                .contains(ObjectFlags::INITIALIZED | ObjectFlags::ACTIVE)
            {
                continue;
            }
            if !objects.try_get(slot.owner).is_some_and(|o| o.is_active()) {
                continue;
            }
            let mut ctx = ComponentContext::new(slot.owner, Some(slot.handle), frame, &mut *commands);
            slot.value.update(&mut ctx);
            updated += 1;
        }
        updated
    }

    fn delete(&mut self, handle: ComponentHandle) -> Option<ObjectHandle> {
        self.remove(handle).map(|(owner, _)| owner)
    }

    fn trim(&mut self, allocator: &mut BlockAllocator) -> usize {
        self.storage.trim(allocator)
    }

    fn release_all(&mut self, allocator: &mut BlockAllocator) {
        self.storage.release_all(allocator);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
