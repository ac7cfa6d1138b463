//! # World
//!
//! The world owns one object store, one component manager per registered
//! component type, the message queues and the block allocator that backs
//! all of them.
//!
//! ## Frame Pipeline
//!
//! ```text
//! update(dt)
//!   1. initialize pending objects and components (repeats until none left)
//!   2. flush NextFrame
//!   3. flush AfterInitialized
//!   4. start simulation of initialized components   (simulation only)
//!   5. update active components                     (simulation only)
//!   6. flush PostAsync
//!   7. flush PostTransform
//! ```
//!
//! Callbacks never see `&mut World`. They record into a
//! [`CommandBuffer`], which the world applies once the callback returns.

use std::any::TypeId;
use std::collections::HashMap;

use tracing::{debug, trace};

use super::commands::{Command, CommandBuffer};
use super::component::{Component, ComponentManager, ComponentManagerBase};
use super::flags::{ObjectFlags, OnComponentFinishedAction, VisitorExecution};
use super::handle::{ComponentHandle, ObjectHandle, MAX_WORLDS};
use super::message::{
    ComponentContext, FrameInfo, Message, MessageHandlers, MessageQueuePhase, MessageQueues,
    MsgDeleteGameObject, MsgSetActive, QueuedMessage, QueuedTarget,
};
use super::object::{ChildPolicy, GameObject, GameObjectDesc, ObjectStore};
use super::routing::{delivery_set, MessageRouting};
use crate::config::WorldConfig;
use crate::error::{WorldError, WorldResult};
use crate::memory::BlockAllocator;

// ============================================================================
// FRAME STATISTICS
// ============================================================================

/// What one call to [`World::update`] did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Frame number the update ran as.
    pub frame: u64,
    /// Queued messages that reached a live target, per phase.
    pub delivered: [usize; MessageQueuePhase::COUNT],
    /// Objects that became initialized.
    pub objects_initialized: usize,
    /// Components whose `initialize` ran.
    pub components_initialized: usize,
    /// Components whose `on_simulation_started` ran.
    pub simulation_started: usize,
    /// Component `update` calls.
    pub components_updated: usize,
    /// Deferred deletions applied since the previous update.
    pub deletions: usize,
}

impl FrameStats {
    /// Queued messages delivered during `phase`.
    #[inline]
    #[must_use]
    pub const fn delivered(&self, phase: MessageQueuePhase) -> usize {
        self.delivered[phase.index()]
    }
}

// ============================================================================
// WORLD
// ============================================================================

/// A self-contained population of game objects and components.
///
/// # Example
///
/// ```rust,ignore
/// let mut world = World::new(WorldConfig::named("arena"))?;
/// let player = world.create_object(GameObjectDesc::new().with_name("player"))?;
/// let health = world.create_component(player, Health(100))?;
///
/// world.send_message(player, &Damage(10), MessageRouting::ToComponents);
/// world.update(1.0 / 60.0);
/// ```
pub struct World {
    index: u32,
    config: WorldConfig,
    allocator: BlockAllocator,
    objects: ObjectStore,
    managers: Vec<Box<dyn ComponentManagerBase>>,
    manager_lookup: HashMap<TypeId, u16>,
    object_handlers: MessageHandlers<GameObject>,
    queues: MessageQueues,
    pending_objects: Vec<ObjectHandle>,
    pending_components: Vec<ComponentHandle>,
    pending_simulation_objects: Vec<ObjectHandle>,
    pending_simulation: Vec<ComponentHandle>,
    simulation_enabled: bool,
    frame: FrameInfo,
    deletions: usize,
}

impl World {
    /// Creates a world with index 0.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::InvalidConfig`] if the configuration does not
    /// validate.
    pub fn new(config: WorldConfig) -> WorldResult<Self> {
        Self::with_index(0, config)
    }

    /// Creates a world whose handles carry `index`.
    ///
    /// # Errors
    ///
    /// - [`WorldError::TooManyWorlds`] if `index` does not fit the handle's
    ///   world bits
    /// - [`WorldError::InvalidConfig`] if the configuration does not validate
    pub fn with_index(index: u32, config: WorldConfig) -> WorldResult<Self> {
        if index >= MAX_WORLDS {
            return Err(WorldError::TooManyWorlds { max: MAX_WORLDS });
        }
        config.validate()?;

        let mut object_handlers = MessageHandlers::new();
        object_handlers
            .on(|_: &mut GameObject, _: &MsgDeleteGameObject, ctx: &mut ComponentContext<'_>| {
                let owner = ctx.owner();
                ctx.commands().delete_object(owner);
            })
            .on(|object: &mut GameObject, msg: &MsgSetActive, _: &mut ComponentContext<'_>| {
                object.set_active(msg.active);
            });

        debug!(
            "World '{}' created (index {}, {} blocks of {} bytes)",
            config.name, index, config.max_blocks, config.block_size
        );

        Ok(Self {
            index,
            allocator: BlockAllocator::new(config.block_size, config.max_blocks),
            objects: ObjectStore::new(index, config.block_size),
            managers: Vec::new(),
            manager_lookup: HashMap::new(),
            object_handlers,
            queues: MessageQueues::default(),
            pending_objects: Vec::new(),
            pending_components: Vec::new(),
            pending_simulation_objects: Vec::new(),
            pending_simulation: Vec::new(),
            simulation_enabled: config.simulation_enabled,
            frame: FrameInfo::default(),
            deletions: 0,
            config,
        })
    }

    /// Index embedded in every handle this world issues.
    #[inline]
    #[must_use]
    pub const fn index(&self) -> u32 {
        self.index
    }

    /// World name from the configuration.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Configuration the world was created with.
    #[inline]
    #[must_use]
    pub const fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Number of completed updates.
    #[inline]
    #[must_use]
    pub const fn frame(&self) -> u64 {
        self.frame.frame
    }

    /// Block accounting of this world.
    #[inline]
    #[must_use]
    pub const fn allocator(&self) -> &BlockAllocator {
        &self.allocator
    }

    // ------------------------------------------------------------------------
    // Objects
    // ------------------------------------------------------------------------

    /// Creates a game object. It is initialized during the next update.
    ///
    /// # Errors
    ///
    /// - [`WorldError::StaleHandle`] / [`WorldError::NotFound`] if the
    ///   descriptor names a dead or foreign parent
    /// - [`WorldError::OutOfMemory`] if the object pool cannot grow
    pub fn create_object(&mut self, desc: GameObjectDesc) -> WorldResult<ObjectHandle> {
        let blocks = self.objects.block_count();
        let handle = self.objects.create(desc, &mut self.allocator)?;
        if self.objects.block_count() > blocks {
            debug!(
                "World '{}' object storage grew to {} blocks",
                self.config.name,
                self.objects.block_count()
            );
        }
        self.pending_objects.push(handle);
        trace!("Created {}", handle);
        Ok(handle)
    }

    /// Destroys `handle` and its whole subtree.
    ///
    /// # Returns
    ///
    /// `false` if the handle was already stale.
    pub fn destroy_object(&mut self, handle: ObjectHandle) -> bool {
        self.destroy_object_with(handle, ChildPolicy::Destroy)
    }

    /// Destroys `handle`, handling its children according to `policy`.
    ///
    /// Every owned component is deleted through its manager and every
    /// destroyed handle stops resolving immediately.
    ///
    /// # Returns
    ///
    /// `false` if the handle was already stale.
    pub fn destroy_object_with(&mut self, handle: ObjectHandle, policy: ChildPolicy) -> bool {
        let Some(object) = self.objects.try_get(handle) else {
            trace!("Ignoring destroy of stale {}", handle);
            return false;
        };
        let parent = object.parent();
        let children = object.children().to_vec();

        match policy {
            ChildPolicy::Destroy => {
                // Leaves first, so every unlink finds a live parent.
                let doomed = self.objects.subtree(handle);
                for object in doomed.into_iter().rev() {
                    self.destroy_single(object);
                }
            }
            ChildPolicy::Reparent => {
                for child in children {
                    if let Err(err) = self.objects.set_parent(child, parent) {
                        trace!("Reparenting {} failed: {}", child, err);
                    }
                }
                self.destroy_single(handle);
            }
        }
        true
    }

    fn destroy_single(&mut self, handle: ObjectHandle) {
        let components = self
            .objects
            .try_get(handle)
            .map(|object| object.components().to_vec())
            .unwrap_or_default();
        for component in components {
            if let Some(manager) = self.managers.get_mut(usize::from(component.type_id())) {
                manager.delete(component);
            }
        }
        if self.objects.remove(handle).is_some() {
            trace!("Destroyed {}", handle);
        }
    }

    /// Resolves an object handle.
    ///
    /// # Errors
    ///
    /// [`WorldError::NotFound`] for handles that never existed,
    /// [`WorldError::StaleHandle`] for dead or foreign ones.
    pub fn resolve_object(&self, handle: ObjectHandle) -> WorldResult<&GameObject> {
        self.objects.resolve(handle)
    }

    /// Resolves an object handle, `None` if it is stale.
    #[inline]
    #[must_use]
    pub fn try_get_object(&self, handle: ObjectHandle) -> Option<&GameObject> {
        self.objects.try_get(handle)
    }

    /// Returns `true` if the handle resolves in this world.
    #[inline]
    #[must_use]
    pub fn is_valid_object(&self, handle: ObjectHandle) -> bool {
        self.objects.contains(handle)
    }

    /// Number of live objects.
    #[inline]
    #[must_use]
    pub const fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// All live objects in slot order.
    pub fn objects(&self) -> impl Iterator<Item = &GameObject> {
        self.objects.iter()
    }

    /// The object store, for graph queries.
    #[inline]
    #[must_use]
    pub const fn object_store(&self) -> &ObjectStore {
        &self.objects
    }

    /// Re-links `child` under `parent` (`None` makes it a root).
    ///
    /// # Errors
    ///
    /// - [`WorldError::CycleRejected`] if `parent` is `child` or below it
    /// - [`WorldError::StaleHandle`] / [`WorldError::NotFound`] if either
    ///   handle does not resolve in this world
    pub fn set_parent(
        &mut self,
        child: ObjectHandle,
        parent: Option<ObjectHandle>,
    ) -> WorldResult<()> {
        self.objects.set_parent(child, parent)
    }

    /// Sets or clears the `ACTIVE` flag of an object. Components of
    /// inactive objects are skipped by the update pass.
    ///
    /// # Errors
    ///
    /// Fails like [`World::resolve_object`].
    pub fn set_active(&mut self, handle: ObjectHandle, active: bool) -> WorldResult<()> {
        self.objects.resolve_mut(handle)?.set_active(active);
        Ok(())
    }

    /// First live object (in slot order) with the given name.
    #[must_use]
    pub fn find_object_by_name(&self, name: &str) -> Option<ObjectHandle> {
        self.objects
            .iter()
            .find(|object| object.name() == Some(name))
            .map(GameObject::handle)
    }

    /// Visits `root` and its descendants depth-first, pre-order.
    pub fn traverse<F>(&self, root: ObjectHandle, visitor: F) -> VisitorExecution
    where
        F: FnMut(&GameObject) -> VisitorExecution,
    {
        self.objects.traverse(root, visitor)
    }

    /// Registers an object-level handler for messages of type `M`,
    /// replacing any previous one (including the built-in ones).
    pub fn on_object_message<M, F>(&mut self, handler: F)
    where
        M: Message,
        F: Fn(&mut GameObject, &M, &mut ComponentContext<'_>) + Send + Sync + 'static,
    {
        self.object_handlers.on(handler);
    }

    // ------------------------------------------------------------------------
    // Components
    // ------------------------------------------------------------------------

    /// Returns the dense type id of `T`, registering its manager on first
    /// use. Ids follow registration order.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::OutOfMemory`] once the type id space is full.
    pub fn register_component_type<T: Component>(&mut self) -> WorldResult<u16> {
        if let Some(&type_id) = self.manager_lookup.get(&TypeId::of::<T>()) {
            return Ok(type_id);
        }

        let type_id = u16::try_from(self.managers.len()).map_err(|_| WorldError::OutOfMemory {
            pool: "component types",
            capacity: usize::from(u16::MAX),
        })?;
        // World indices are below 64, so they always fit.
        let world_index = self.index as u16;
        self.managers.push(Box::new(ComponentManager::<T>::new(
            type_id,
            world_index,
            self.config.block_size,
        )));
        self.manager_lookup.insert(TypeId::of::<T>(), type_id);

        debug!(
            "World '{}' registered component type {} as {}",
            self.config.name,
            std::any::type_name::<T>(),
            type_id
        );
        Ok(type_id)
    }

    /// Attaches `value` to `owner`. It is initialized during the next
    /// update.
    ///
    /// # Errors
    ///
    /// - [`WorldError::StaleHandle`] / [`WorldError::NotFound`] for a dead
    ///   owner
    /// - [`WorldError::OutOfMemory`] if the manager cannot grow
    pub fn create_component<T: Component>(
        &mut self,
        owner: ObjectHandle,
        value: T,
    ) -> WorldResult<ComponentHandle> {
        self.objects.resolve(owner)?;
        let type_id = self.register_component_type::<T>()?;

        let Some(manager) = self
            .managers
            .get_mut(usize::from(type_id))
            .and_then(|m| m.as_any_mut().downcast_mut::<ComponentManager<T>>())
        else {
            return Err(WorldError::NotFound(owner.into()));
        };
        let handle = manager.create(owner, value, &mut self.allocator)?;

        if let Some(object) = self.objects.try_get_mut(owner) {
            object.attach_component(handle);
        }
        self.pending_components.push(handle);
        trace!("Attached {} to {}", handle, owner);
        Ok(handle)
    }

    /// Deletes a component. Runs `on_deinitialize` if it was initialized.
    ///
    /// # Returns
    ///
    /// `false` if the handle was already stale.
    pub fn delete_component(&mut self, handle: ComponentHandle) -> bool {
        let Some(owner) = self
            .managers
            .get_mut(usize::from(handle.type_id()))
            .and_then(|manager| manager.delete(handle))
        else {
            trace!("Ignoring delete of stale {}", handle);
            return false;
        };
        if let Some(object) = self.objects.try_get_mut(owner) {
            object.detach_component(handle);
        }
        true
    }

    /// Applies what a component asked for once it is finished.
    pub fn handle_component_finished(
        &mut self,
        handle: ComponentHandle,
        action: OnComponentFinishedAction,
    ) {
        match action {
            OnComponentFinishedAction::None => {}
            OnComponentFinishedAction::DeleteComponent => {
                if self.delete_component(handle) {
                    self.deletions += 1;
                }
            }
            OnComponentFinishedAction::DeleteEntity => {
                if let Some(owner) = self.owner_of_component(handle) {
                    if self.destroy_object(owner) {
                        self.deletions += 1;
                    }
                }
            }
        }
    }

    /// The manager of `T`, if the type was registered.
    #[must_use]
    pub fn component_manager<T: Component>(&self) -> Option<&ComponentManager<T>> {
        let type_id = *self.manager_lookup.get(&TypeId::of::<T>())?;
        self.managers
            .get(usize::from(type_id))?
            .as_any()
            .downcast_ref::<ComponentManager<T>>()
    }

    /// The manager of `T` mutably, if the type was registered.
    pub fn component_manager_mut<T: Component>(&mut self) -> Option<&mut ComponentManager<T>> {
        let type_id = *self.manager_lookup.get(&TypeId::of::<T>())?;
        self.managers
            .get_mut(usize::from(type_id))?
            .as_any_mut()
            .downcast_mut::<ComponentManager<T>>()
    }

    /// Resolves a component handle, `None` if it is stale or of another
    /// type.
    #[must_use]
    pub fn try_get_component<T: Component>(&self, handle: ComponentHandle) -> Option<&T> {
        self.component_manager::<T>()?.try_get(handle)
    }

    /// Resolves a component handle mutably.
    pub fn try_get_component_mut<T: Component>(
        &mut self,
        handle: ComponentHandle,
    ) -> Option<&mut T> {
        self.component_manager_mut::<T>()?.try_get_mut(handle)
    }

    /// Owner of a live component.
    #[must_use]
    pub fn owner_of_component(&self, handle: ComponentHandle) -> Option<ObjectHandle> {
        self.managers
            .get(usize::from(handle.type_id()))?
            .owner_of(handle)
    }

    /// Flags of a live component.
    #[must_use]
    pub fn component_flags(&self, handle: ComponentHandle) -> Option<ObjectFlags> {
        self.managers
            .get(usize::from(handle.type_id()))?
            .flags(handle)
    }

    /// Sets or clears the `ACTIVE` flag of a component.
    ///
    /// # Returns
    ///
    /// `false` if the handle was stale.
    pub fn set_component_active(&mut self, handle: ComponentHandle, active: bool) -> bool {
        self.managers
            .get_mut(usize::from(handle.type_id()))
            .is_some_and(|manager| manager.set_active(handle, active))
    }

    /// Components owned by `owner`, empty for stale handles.
    #[must_use]
    pub fn components_of(&self, owner: ObjectHandle) -> &[ComponentHandle] {
        self.objects
            .try_get(owner)
            .map_or(&[][..], GameObject::components)
    }

    /// Returns `true` if the handle resolves in this world.
    #[must_use]
    pub fn is_valid_component(&self, handle: ComponentHandle) -> bool {
        self.managers
            .get(usize::from(handle.type_id()))
            .is_some_and(|manager| manager.contains(handle))
    }

    /// Number of live components over all types.
    #[must_use]
    pub fn component_count(&self) -> usize {
        self.managers.iter().map(|manager| manager.len()).sum()
    }

    // ------------------------------------------------------------------------
    // Messages
    // ------------------------------------------------------------------------

    /// Delivers `message` right away.
    ///
    /// # Returns
    ///
    /// How many receivers handled it. A dead target delivers to nobody.
    pub fn send_message<M: Message>(
        &mut self,
        target: ObjectHandle,
        message: &M,
        routing: MessageRouting,
    ) -> usize {
        self.deliver_routed(target, message, routing).unwrap_or(0)
    }

    /// Delivers `message` to a single component right away.
    ///
    /// # Returns
    ///
    /// `false` if the component is stale or nothing handled the message.
    pub fn send_message_to_component<M: Message>(
        &mut self,
        target: ComponentHandle,
        message: &M,
    ) -> bool {
        self.deliver_to_component(target, message).unwrap_or(false)
    }

    /// Queues `message` until `phase` is flushed. The target is checked at
    /// flush time.
    pub fn post_message<M: Message>(
        &mut self,
        target: ObjectHandle,
        message: M,
        routing: MessageRouting,
        phase: MessageQueuePhase,
    ) {
        self.queues.push(
            phase,
            QueuedMessage {
                target: QueuedTarget::Object {
                    handle: target,
                    routing,
                },
                message: Box::new(message),
            },
        );
    }

    /// Queues `message` for a single component until `phase` is flushed.
    pub fn post_message_to_component<M: Message>(
        &mut self,
        target: ComponentHandle,
        message: M,
        phase: MessageQueuePhase,
    ) {
        self.queues.push(
            phase,
            QueuedMessage {
                target: QueuedTarget::Component(target),
                message: Box::new(message),
            },
        );
    }

    /// Messages waiting for `phase`.
    #[must_use]
    pub fn pending_message_count(&self, phase: MessageQueuePhase) -> usize {
        self.queues.len(phase)
    }

    /// Routes one message. `None` if the target is dead.
    fn deliver_routed(
        &mut self,
        target: ObjectHandle,
        message: &dyn Message,
        routing: MessageRouting,
    ) -> Option<usize> {
        let receivers = match delivery_set(&self.objects, target, routing) {
            Ok(receivers) => receivers,
            Err(err) => {
                trace!("Dropped {}: {}", message.type_name(), err);
                return None;
            }
        };

        let mut commands = CommandBuffer::new();
        let delivered: usize = receivers
            .into_iter()
            .map(|object| {
                self.deliver_to_object(object, message, routing.includes_components(), &mut commands)
            })
            .sum();
        self.apply_commands(commands);
        Some(delivered)
    }

    fn deliver_to_object(
        &mut self,
        handle: ObjectHandle,
        message: &dyn Message,
        include_components: bool,
        commands: &mut CommandBuffer,
    ) -> usize {
        let frame = self.frame;
        let Some(object) = self.objects.try_get_mut(handle) else {
            return 0;
        };

        let mut delivered = 0;
        let mut ctx = ComponentContext::new(handle, None, frame, commands);
        if self.object_handlers.dispatch(object, message, &mut ctx) {
            delivered += 1;
        }
        if !include_components {
            return delivered;
        }

        let mut components = object.components().to_vec();
        components.sort_by_key(|component| component.type_id());
        for component in components {
            if let Some(manager) = self.managers.get_mut(usize::from(component.type_id())) {
                if manager.deliver(component, message, frame, commands) {
                    delivered += 1;
                }
            }
        }
        delivered
    }

    /// `None` if the component is dead.
    fn deliver_to_component(
        &mut self,
        target: ComponentHandle,
        message: &dyn Message,
    ) -> Option<bool> {
        let frame = self.frame;
        let Some(manager) = self
            .managers
            .get_mut(usize::from(target.type_id()))
            .filter(|manager| manager.contains(target))
        else {
            trace!("Dropped {} for stale {}", message.type_name(), target);
            return None;
        };

        let mut commands = CommandBuffer::new();
        let handled = manager.deliver(target, message, frame, &mut commands);
        self.apply_commands(commands);
        Some(handled)
    }

    /// Delivers and discards everything queued for `phase`.
    ///
    /// Returns how many messages reached a live target.
    fn flush_queue(&mut self, phase: MessageQueuePhase) -> usize {
        let batch = self.queues.take(phase);
        let mut delivered = 0;
        for queued in batch {
            let reached = match queued.target {
                QueuedTarget::Object { handle, routing } => {
                    self.deliver_routed(handle, &*queued.message, routing).is_some()
                }
                QueuedTarget::Component(component) => {
                    self.deliver_to_component(component, &*queued.message).is_some()
                }
            };
            if reached {
                delivered += 1;
            }
        }
        delivered
    }

    // ------------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------------

    /// Applies recorded commands in order.
    pub fn apply_commands(&mut self, mut commands: CommandBuffer) {
        for command in commands.take() {
            match command {
                Command::Send { target, message } => match target {
                    QueuedTarget::Object { handle, routing } => {
                        self.deliver_routed(handle, &*message, routing);
                    }
                    QueuedTarget::Component(component) => {
                        self.deliver_to_component(component, &*message);
                    }
                },
                Command::Post {
                    target,
                    message,
                    phase,
                } => self.queues.push(phase, QueuedMessage { target, message }),
                Command::DeleteObject { object, policy } => {
                    if self.destroy_object_with(object, policy) {
                        self.deletions += 1;
                    }
                }
                Command::DeleteComponent(component) => {
                    if self.delete_component(component) {
                        self.deletions += 1;
                    }
                }
                Command::ComponentFinished { component, action } => {
                    self.handle_component_finished(component, action);
                }
                Command::SetActive { object, active } => {
                    if let Err(err) = self.set_active(object, active) {
                        trace!("Ignoring activation of {}: {}", object, err);
                    }
                }
                Command::Deferred(f) => f(self),
            }
        }
    }

    // ------------------------------------------------------------------------
    // Frame
    // ------------------------------------------------------------------------

    /// Returns `true` while simulation callbacks run.
    #[inline]
    #[must_use]
    pub const fn is_simulation_enabled(&self) -> bool {
        self.simulation_enabled
    }

    /// Enables or pauses simulation. Components initialized while paused
    /// start simulating on the first update after it is enabled again.
    pub fn set_simulation_enabled(&mut self, enabled: bool) {
        if self.simulation_enabled != enabled {
            debug!(
                "World '{}' simulation {}",
                self.config.name,
                if enabled { "enabled" } else { "paused" }
            );
        }
        self.simulation_enabled = enabled;
    }

    /// Runs one frame.
    pub fn update(&mut self, delta_seconds: f32) -> FrameStats {
        self.frame.delta_seconds = delta_seconds;
        let mut stats = FrameStats {
            frame: self.frame.frame,
            ..FrameStats::default()
        };

        self.initialize_pending(&mut stats);

        // Both queues wait for the initialization pass.
        stats.delivered[MessageQueuePhase::NextFrame.index()] =
            self.flush_queue(MessageQueuePhase::NextFrame);
        stats.delivered[MessageQueuePhase::AfterInitialized.index()] =
            self.flush_queue(MessageQueuePhase::AfterInitialized);

        if self.simulation_enabled {
            self.start_pending_simulation(&mut stats);
            stats.components_updated = self.update_components();
        }

        stats.delivered[MessageQueuePhase::PostAsync.index()] =
            self.flush_queue(MessageQueuePhase::PostAsync);
        stats.delivered[MessageQueuePhase::PostTransform.index()] =
            self.flush_queue(MessageQueuePhase::PostTransform);

        stats.deletions = std::mem::take(&mut self.deletions);
        self.frame.frame += 1;
        stats
    }

    /// Initializes pending objects, then pending components, until
    /// initialization stops creating new work.
    fn initialize_pending(&mut self, stats: &mut FrameStats) {
        loop {
            let objects = std::mem::take(&mut self.pending_objects);
            let components = std::mem::take(&mut self.pending_components);
            if objects.is_empty() && components.is_empty() {
                break;
            }

            let mut initializing = Vec::with_capacity(objects.len());
            for handle in objects {
                if let Some(object) = self.objects.try_get_mut(handle) {
                    let flags = object.flags_mut();
                    if !flags.intersects(ObjectFlags::INITIALIZED | ObjectFlags::INITIALIZING) {
                        flags.insert(ObjectFlags::INITIALIZING);
                        initializing.push(handle);
                    }
                }
            }

            for component in components {
                let frame = self.frame;
                let mut commands = CommandBuffer::new();
                let initialized = self
                    .managers
                    .get_mut(usize::from(component.type_id()))
                    .is_some_and(|manager| manager.initialize(component, frame, &mut commands));
                if initialized {
                    stats.components_initialized += 1;
                    self.pending_simulation.push(component);
                }
                self.apply_commands(commands);
            }

            for handle in initializing {
                if let Some(object) = self.objects.try_get_mut(handle) {
                    let flags = object.flags_mut();
                    flags.remove(ObjectFlags::INITIALIZING);
                    flags.insert(ObjectFlags::INITIALIZED);
                    stats.objects_initialized += 1;
                    self.pending_simulation_objects.push(handle);
                }
            }
        }
    }

    fn start_pending_simulation(&mut self, stats: &mut FrameStats) {
        let objects = std::mem::take(&mut self.pending_simulation_objects);
        for &handle in &objects {
            if let Some(object) = self.objects.try_get_mut(handle) {
                object.flags_mut().insert(ObjectFlags::SIMULATION_STARTING);
            }
        }

        for component in std::mem::take(&mut self.pending_simulation) {
            let frame = self.frame;
            let mut commands = CommandBuffer::new();
            let started = self
                .managers
                .get_mut(usize::from(component.type_id()))
                .is_some_and(|manager| manager.start_simulation(component, frame, &mut commands));
            if started {
                stats.simulation_started += 1;
            }
            self.apply_commands(commands);
        }

        for handle in objects {
            if let Some(object) = self.objects.try_get_mut(handle) {
                let flags = object.flags_mut();
                flags.remove(ObjectFlags::SIMULATION_STARTING);
                flags.insert(ObjectFlags::SIMULATION_STARTED);
            }
        }
    }

    fn update_components(&mut self) -> usize {
        let frame = self.frame;
        let mut updated = 0;
        for type_index in 0..self.managers.len() {
            let mut commands = CommandBuffer::new();
            if let Some(manager) = self.managers.get_mut(type_index) {
                updated += manager.update_all(&self.objects, frame, &mut commands);
            }
            self.apply_commands(commands);
        }
        updated
    }

    /// Hands trailing empty blocks of every pool back to the allocator.
    ///
    /// # Returns
    ///
    /// Number of blocks released.
    pub fn trim_storage(&mut self) -> usize {
        let mut released = self.objects.trim(&mut self.allocator);
        for manager in &mut self.managers {
            released += manager.trim(&mut self.allocator);
        }
        if released > 0 {
            debug!(
                "World '{}' released {} blocks ({} in use)",
                self.config.name,
                released,
                self.allocator.blocks_in_use()
            );
        }
        released
    }
}

impl Drop for World {
    fn drop(&mut self) {
        debug!(
            "World '{}' destroyed ({} objects, {} components)",
            self.config.name,
            self.objects.len(),
            self.component_count()
        );
        for manager in &mut self.managers {
            manager.release_all(&mut self.allocator);
        }
        self.objects.release_all(&mut self.allocator);
    }
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("index", &self.index)
            .field("name", &self.config.name)
            .field("objects", &self.objects.len())
            .field(
                "component_types",
                &self
                    .managers
                    .iter()
                    .map(|manager| manager.type_name())
                    .collect::<Vec<_>>(),
            )
            .field("frame", &self.frame.frame)
            .finish()
    }
}
