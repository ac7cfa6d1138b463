//! # Game Object Store
//!
//! Owns the object slots of one world and the parent/child forest.
//!
//! The store only knows about objects. Deleting the components an object
//! owns is the world's job, because only the world holds the managers.

use super::flags::{ObjectFlags, VisitorExecution};
use super::handle::{
    ComponentHandle, ObjectHandle, ObjectId, OBJECT_GENERATION_BITS,
};
use super::slots::{SlotState, SlotTable};
use crate::error::{WorldError, WorldResult};
use crate::memory::{BlockAllocator, BlockStorage};

/// Construction parameters of a game object.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GameObjectDesc {
    /// Optional name, for lookup and tooling.
    pub name: Option<String>,
    /// Optional parent. Must be alive and belong to the same world.
    pub parent: Option<ObjectHandle>,
    /// Initial flags. Only `DYNAMIC` and `ACTIVE` are taken from here.
    pub flags: ObjectFlags,
}

impl GameObjectDesc {
    /// Default descriptor: unnamed, no parent, `DYNAMIC | ACTIVE`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the parent.
    #[must_use]
    pub fn with_parent(mut self, parent: ObjectHandle) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Creates the object without the `DYNAMIC` flag.
    #[must_use]
    pub fn static_object(mut self) -> Self {
        self.flags.remove(ObjectFlags::DYNAMIC);
        self
    }

    /// Creates the object without the `ACTIVE` flag.
    #[must_use]
    pub fn inactive(mut self) -> Self {
        self.flags.remove(ObjectFlags::ACTIVE);
        self
    }
}

/// What happens to the children of a destroyed object.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ChildPolicy {
    /// Destroy the whole subtree.
    #[default]
    Destroy,
    /// Hand the children to the destroyed object's parent (or make them
    /// roots).
    Reparent,
}

/// A game object record.
#[derive(Debug)]
pub struct GameObject {
    handle: ObjectHandle,
    flags: ObjectFlags,
    name: Option<String>,
    parent: Option<ObjectHandle>,
    children: Vec<ObjectHandle>,
    components: Vec<ComponentHandle>,
}

impl GameObject {
    /// This object's own handle.
    #[inline]
    #[must_use]
    pub const fn handle(&self) -> ObjectHandle {
        self.handle
    }

    /// Current flags.
    #[inline]
    #[must_use]
    pub const fn flags(&self) -> ObjectFlags {
        self.flags
    }

    /// Name given at creation.
    #[inline]
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Parent, if any.
    #[inline]
    #[must_use]
    pub const fn parent(&self) -> Option<ObjectHandle> {
        self.parent
    }

    /// Children in attach order.
    #[inline]
    #[must_use]
    pub fn children(&self) -> &[ObjectHandle] {
        &self.children
    }

    /// Owned components in attach order.
    #[inline]
    #[must_use]
    pub fn components(&self) -> &[ComponentHandle] {
        &self.components
    }

    /// Shorthand for the `ACTIVE` flag.
    #[inline]
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.flags.contains(ObjectFlags::ACTIVE)
    }

    /// Shorthand for the `DYNAMIC` flag.
    #[inline]
    #[must_use]
    pub const fn is_dynamic(&self) -> bool {
        self.flags.contains(ObjectFlags::DYNAMIC)
    }

    /// Shorthand for the `INITIALIZED` flag.
    #[inline]
    #[must_use]
    pub const fn is_initialized(&self) -> bool {
        self.flags.contains(ObjectFlags::INITIALIZED)
    }

    /// Sets or clears the `ACTIVE` flag.
    #[inline]
    pub fn set_active(&mut self, active: bool) {
        self.flags.set(ObjectFlags::ACTIVE, active);
    }

    #[inline]
    pub(crate) fn flags_mut(&mut self) -> &mut ObjectFlags {
        &mut self.flags
    }

    pub(crate) fn attach_component(&mut self, component: ComponentHandle) {
        self.components.push(component);
    }

    pub(crate) fn detach_component(&mut self, component: ComponentHandle) {
        self.components.retain(|c| *c != component);
    }
}

/// Object slots of one world.
pub struct ObjectStore {
    world_index: u32,
    slots: SlotTable,
    storage: BlockStorage<GameObject>,
}

impl ObjectStore {
    pub(crate) fn new(world_index: u32, block_size: usize) -> Self {
        Self {
            world_index,
            slots: SlotTable::new(OBJECT_GENERATION_BITS, ObjectId::MAX_INSTANCES),
            storage: BlockStorage::new(block_size),
        }
    }

    /// Index of the owning world.
    #[inline]
    #[must_use]
    pub const fn world_index(&self) -> u32 {
        self.world_index
    }

    /// Number of live objects.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.slots.live()
    }

    /// Returns `true` if no object is alive.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.slots.live() == 0
    }

    /// Number of blocks backing the object array.
    #[inline]
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.storage.block_count()
    }

    /// Creates an object.
    ///
    /// # Errors
    ///
    /// - [`WorldError::StaleHandle`] / [`WorldError::NotFound`] if the
    ///   requested parent does not resolve
    /// - [`WorldError::OutOfMemory`] if the index space or the block arena is
    ///   exhausted
    pub(crate) fn create(
        &mut self,
        desc: GameObjectDesc,
        allocator: &mut BlockAllocator,
    ) -> WorldResult<ObjectHandle> {
        if let Some(parent) = desc.parent {
            self.resolve(parent)?;
        }

        let (index, generation) = self.slots.allocate().ok_or(WorldError::OutOfMemory {
            pool: "objects",
            capacity: self.slots.max_slots() as usize,
        })?;
        let handle = ObjectHandle::new(ObjectId::new(index, generation, self.world_index));

        let mut flags = ObjectFlags::NONE;
        flags.set(ObjectFlags::DYNAMIC, desc.flags.contains(ObjectFlags::DYNAMIC));
        flags.set(ObjectFlags::ACTIVE, desc.flags.contains(ObjectFlags::ACTIVE));

        let object = GameObject {
            handle,
            flags,
            name: desc.name,
            parent: desc.parent,
            children: Vec::new(),
            components: Vec::new(),
        };

        if let Err(err) = self.storage.insert(index as usize, object, allocator) {
            self.slots.free(index, generation);
            return Err(err);
        }

        if let Some(parent) = desc.parent.and_then(|p| self.try_get_mut(p)) {
            parent.children.push(handle);
        }

        Ok(handle)
    }

    /// Resolves a handle, telling stale handles apart from unknown ones.
    ///
    /// # Errors
    ///
    /// - [`WorldError::NotFound`] for the invalid handle or an index that was
    ///   never handed out
    /// - [`WorldError::StaleHandle`] for a dead slot, a generation mismatch or
    ///   a handle issued by another world
    pub fn resolve(&self, handle: ObjectHandle) -> WorldResult<&GameObject> {
        let index = self.check(handle)?;
        self.storage
            .get(index)
            .ok_or(WorldError::StaleHandle(handle.into()))
    }

    fn check(&self, handle: ObjectHandle) -> WorldResult<usize> {
        if !handle.is_valid() {
            return Err(WorldError::NotFound(handle.into()));
        }
        let id = handle.id();
        if id.world_index() != self.world_index {
            return Err(WorldError::StaleHandle(handle.into()));
        }
        match self.slots.state(id.instance_index(), id.generation()) {
            SlotState::Live => Ok(id.instance_index() as usize),
            SlotState::Stale => Err(WorldError::StaleHandle(handle.into())),
            SlotState::OutOfRange => Err(WorldError::NotFound(handle.into())),
        }
    }

    /// Resolves a handle. Valid only until the next structural change.
    #[inline]
    #[must_use]
    pub fn try_get(&self, handle: ObjectHandle) -> Option<&GameObject> {
        self.resolve(handle).ok()
    }

    pub(crate) fn resolve_mut(&mut self, handle: ObjectHandle) -> WorldResult<&mut GameObject> {
        let index = self.check(handle)?;
        self.storage
            .get_mut(index)
            .ok_or(WorldError::StaleHandle(handle.into()))
    }

    #[inline]
    pub(crate) fn try_get_mut(&mut self, handle: ObjectHandle) -> Option<&mut GameObject> {
        let index = self.check(handle).ok()?;
        self.storage.get_mut(index)
    }

    /// Returns `true` if the handle resolves.
    #[inline]
    #[must_use]
    pub fn contains(&self, handle: ObjectHandle) -> bool {
        self.check(handle).is_ok()
    }

    /// Returns `true` if `ancestor` is `handle` or one of its ancestors.
    #[must_use]
    pub fn is_descendant_of(&self, handle: ObjectHandle, ancestor: ObjectHandle) -> bool {
        let mut current = Some(handle);
        while let Some(h) = current {
            if h == ancestor {
                return true;
            }
            current = self.try_get(h).and_then(GameObject::parent);
        }
        false
    }

    /// Re-links `child` under `parent`, or makes it a root for `None`.
    ///
    /// # Errors
    ///
    /// - [`WorldError::StaleHandle`] / [`WorldError::NotFound`] if either
    ///   handle does not resolve (including cross-world handles)
    /// - [`WorldError::CycleRejected`] if `parent` is `child` or one of its
    ///   descendants
    ///
    /// The forest is untouched on error.
    pub(crate) fn set_parent(
        &mut self,
        child: ObjectHandle,
        parent: Option<ObjectHandle>,
    ) -> WorldResult<()> {
        let old_parent = self.resolve(child)?.parent;
        if let Some(parent) = parent {
            self.resolve(parent)?;
            if self.is_descendant_of(parent, child) {
                return Err(WorldError::CycleRejected { child, parent });
            }
        }
        if old_parent == parent {
            return Ok(());
        }

        if let Some(old) = old_parent.and_then(|p| self.try_get_mut(p)) {
            old.children.retain(|c| *c != child);
        }
        if let Some(new) = parent.and_then(|p| self.try_get_mut(p)) {
            new.children.push(child);
        }
        if let Some(object) = self.try_get_mut(child) {
            object.parent = parent;
        }
        Ok(())
    }

    /// Removes a single object: unlinks it from its parent and frees the
    /// slot. Children and components are left to the caller.
    pub(crate) fn remove(&mut self, handle: ObjectHandle) -> Option<GameObject> {
        let index = self.check(handle).ok()?;
        let parent = self.storage.get(index).and_then(GameObject::parent);
        if let Some(parent) = parent.and_then(|p| self.try_get_mut(p)) {
            parent.children.retain(|c| *c != handle);
        }

        let id = handle.id();
        self.slots.free(id.instance_index(), id.generation());
        self.storage.remove(index)
    }

    /// Topmost ancestor of `handle` (itself for roots).
    #[must_use]
    pub fn root_of(&self, handle: ObjectHandle) -> ObjectHandle {
        let mut root = handle;
        while let Some(parent) = self.try_get(root).and_then(GameObject::parent) {
            root = parent;
        }
        root
    }

    /// `handle` followed by each ancestor up to the root.
    #[must_use]
    pub fn ancestors(&self, handle: ObjectHandle) -> Vec<ObjectHandle> {
        let mut chain = Vec::new();
        let mut current = self.try_get(handle);
        while let Some(object) = current {
            chain.push(object.handle);
            current = object.parent.and_then(|p| self.try_get(p));
        }
        chain
    }

    /// `root` and all its descendants, depth-first pre-order.
    #[must_use]
    pub fn subtree(&self, root: ObjectHandle) -> Vec<ObjectHandle> {
        let mut out = Vec::new();
        self.traverse(root, |object| {
            out.push(object.handle);
            VisitorExecution::Continue
        });
        out
    }

    /// Visits `root` and its descendants depth-first, pre-order.
    ///
    /// # Returns
    ///
    /// `VisitorExecution::Stop` if the visitor stopped the walk.
    pub fn traverse<F>(&self, root: ObjectHandle, mut visitor: F) -> VisitorExecution
    where
        F: FnMut(&GameObject) -> VisitorExecution,
    {
        let mut stack = vec![root];
        while let Some(handle) = stack.pop() {
            let Some(object) = self.try_get(handle) else {
                continue;
            };
            if visitor(object) == VisitorExecution::Stop {
                return VisitorExecution::Stop;
            }
            stack.extend(object.children.iter().rev());
        }
        VisitorExecution::Continue
    }

    /// Iterates over all live objects in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &GameObject> {
        self.storage.iter().map(|(_, object)| object)
    }

    /// Releases trailing empty blocks back to the allocator.
    pub(crate) fn trim(&mut self, allocator: &mut BlockAllocator) -> usize {
        self.storage.trim(allocator)
    }

    /// Removes every object and hands every block back to the allocator.
    pub(crate) fn release_all(&mut self, allocator: &mut BlockAllocator) {
        let handles: Vec<ObjectHandle> = self.iter().map(GameObject::handle).collect();
        for handle in handles {
            self.remove(handle);
        }
        self.storage.release_all(allocator);
    }
}
