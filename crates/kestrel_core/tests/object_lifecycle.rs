//! # Object Lifecycle Verification Tests
//!
//! Verifies handle validity across the whole life of objects and
//! components:
//!
//! 1. **Handles**: resolve until destroyed, never afterwards
//! 2. **Generations**: bump on reuse, wrap without ever reaching zero
//! 3. **Forest**: cycles rejected, subtree deletes are transitive
//! 4. **Memory**: block budget enforced and recoverable
//!
//! Run with: cargo test --test object_lifecycle

use std::sync::Arc;

use kestrel_core::{
    ChildPolicy, Component, ComponentContext, GameObjectDesc, ObjectFlags, ObjectHandle,
    VisitorExecution, World, WorldConfig, WorldError,
};
use parking_lot::Mutex;

#[derive(Debug, Default)]
struct Health(u32);

impl Component for Health {}

#[derive(Debug, Default)]
struct Armor(u32);

impl Component for Armor {}

fn world() -> World {
    World::new(WorldConfig::named("lifecycle")).unwrap()
}

// ============================================================================
// HANDLES
// ============================================================================

#[test]
fn verify_handle_resolves_until_destroy() {
    let mut world = world();
    let handle = world.create_object(GameObjectDesc::new()).unwrap();

    for _ in 0..3 {
        world.update(0.016);
        assert!(world.is_valid_object(handle));
    }

    assert!(world.destroy_object(handle));
    assert!(!world.is_valid_object(handle));
    assert!(matches!(
        world.resolve_object(handle),
        Err(WorldError::StaleHandle(_))
    ));

    // The slot is reused, the old handle stays dead.
    let reused = world.create_object(GameObjectDesc::new()).unwrap();
    assert_eq!(reused.id().instance_index(), handle.id().instance_index());
    assert!(!world.is_valid_object(handle));
    assert!(world.is_valid_object(reused));
}

#[test]
fn verify_destroy_reuse_bumps_generation() {
    let mut world = world();
    let o1 = world.create_object(GameObjectDesc::new()).unwrap();
    let c1 = world.create_component(o1, Health(10)).unwrap();

    world.destroy_object(o1);
    assert!(world.try_get_object(o1).is_none());
    assert!(world.try_get_component::<Health>(c1).is_none());

    let o2 = world.create_object(GameObjectDesc::new()).unwrap();
    assert_eq!(o2.id().instance_index(), o1.id().instance_index());
    assert_eq!(o2.id().generation(), o1.id().generation() + 1);
    assert_ne!(o1, o2);
}

#[test]
fn verify_generation_wraps_without_zero() {
    let mut world = world();
    let mut previous = world.create_object(GameObjectDesc::new()).unwrap();
    world.destroy_object(previous);

    // 6 generation bits: 200 reuses wrap around several times.
    for _ in 0..200 {
        let handle = world.create_object(GameObjectDesc::new()).unwrap();
        assert_eq!(handle.id().instance_index(), previous.id().instance_index());
        assert_ne!(handle.id().generation(), 0);
        assert_ne!(handle.id().generation(), previous.id().generation());
        assert!(handle.is_valid());
        assert!(!world.is_valid_object(previous));

        world.destroy_object(handle);
        previous = handle;
    }
}

#[test]
fn verify_handles_are_world_scoped() {
    let mut first = World::with_index(0, WorldConfig::named("first")).unwrap();
    let mut second = World::with_index(1, WorldConfig::named("second")).unwrap();

    let a = first.create_object(GameObjectDesc::new()).unwrap();
    let b = second.create_object(GameObjectDesc::new()).unwrap();
    assert_eq!(a.id().instance_index(), b.id().instance_index());

    assert!(!first.is_valid_object(b));
    assert!(matches!(
        first.resolve_object(b),
        Err(WorldError::StaleHandle(_))
    ));
    assert!(matches!(
        first.set_parent(a, Some(b)),
        Err(WorldError::StaleHandle(_))
    ));
}

#[test]
fn verify_invalid_handle_is_not_found() {
    let world = world();
    assert!(!ObjectHandle::INVALID.is_valid());
    assert!(matches!(
        world.resolve_object(ObjectHandle::default()),
        Err(WorldError::NotFound(_))
    ));
}

// ============================================================================
// FOREST
// ============================================================================

#[test]
fn verify_cycle_rejected_leaves_forest_unchanged() {
    let mut world = world();
    let a = world.create_object(GameObjectDesc::new()).unwrap();
    let b = world
        .create_object(GameObjectDesc::new().with_parent(a))
        .unwrap();
    let c = world
        .create_object(GameObjectDesc::new().with_parent(b))
        .unwrap();

    assert_eq!(
        world.set_parent(a, Some(c)),
        Err(WorldError::CycleRejected { child: a, parent: c })
    );
    assert_eq!(world.try_get_object(a).unwrap().parent(), None);
    assert_eq!(world.try_get_object(a).unwrap().children(), &[b]);
    assert_eq!(world.try_get_object(b).unwrap().children(), &[c]);
    assert_eq!(world.try_get_object(c).unwrap().parent(), Some(b));
}

#[test]
fn verify_subtree_destroy_invalidates_everything() {
    let mut world = world();
    let root = world.create_object(GameObjectDesc::new()).unwrap();
    let mid = world
        .create_object(GameObjectDesc::new().with_parent(root))
        .unwrap();
    let leaf = world
        .create_object(GameObjectDesc::new().with_parent(mid))
        .unwrap();
    let survivor = world
        .create_object(GameObjectDesc::new().with_parent(root))
        .unwrap();

    let mid_health = world.create_component(mid, Health(5)).unwrap();
    let leaf_armor = world.create_component(leaf, Armor(3)).unwrap();
    let survivor_armor = world.create_component(survivor, Armor(1)).unwrap();
    world.update(0.016);

    assert!(world.destroy_object(mid));

    assert!(!world.is_valid_object(mid));
    assert!(!world.is_valid_object(leaf));
    assert!(!world.is_valid_component(mid_health));
    assert!(!world.is_valid_component(leaf_armor));

    assert!(world.is_valid_object(survivor));
    assert_eq!(
        world.try_get_component::<Armor>(survivor_armor).map(|armor| armor.0),
        Some(1)
    );
    assert_eq!(world.try_get_object(root).unwrap().children(), &[survivor]);
    assert_eq!(world.object_count(), 2);
    assert_eq!(world.component_count(), 1);
}

#[test]
fn verify_reparent_policy() {
    let mut world = world();
    let root = world.create_object(GameObjectDesc::new()).unwrap();
    let mid = world
        .create_object(GameObjectDesc::new().with_parent(root))
        .unwrap();
    let left = world
        .create_object(GameObjectDesc::new().with_parent(mid))
        .unwrap();
    let right = world
        .create_object(GameObjectDesc::new().with_parent(mid))
        .unwrap();

    world.destroy_object_with(mid, ChildPolicy::Reparent);

    assert_eq!(world.try_get_object(root).unwrap().children(), &[left, right]);
    assert_eq!(world.try_get_object(left).unwrap().parent(), Some(root));

    // Reparenting a root's children makes them roots.
    world.destroy_object_with(root, ChildPolicy::Reparent);
    assert_eq!(world.try_get_object(left).unwrap().parent(), None);
    assert_eq!(world.try_get_object(right).unwrap().parent(), None);
}

#[test]
fn verify_traverse_and_lookup() {
    let mut world = world();
    let root = world
        .create_object(GameObjectDesc::new().with_name("root"))
        .unwrap();
    let child = world
        .create_object(GameObjectDesc::new().with_name("child").with_parent(root))
        .unwrap();
    world
        .create_object(GameObjectDesc::new().with_name("grandchild").with_parent(child))
        .unwrap();

    let mut names = Vec::new();
    let result = world.traverse(root, |object| {
        names.push(object.name().unwrap_or_default().to_owned());
        VisitorExecution::Continue
    });
    assert_eq!(result, VisitorExecution::Continue);
    assert_eq!(names, ["root", "child", "grandchild"]);

    assert_eq!(world.find_object_by_name("child"), Some(child));
    assert_eq!(world.objects().count(), 3);
}

// ============================================================================
// LIFECYCLE FLAGS
// ============================================================================

#[test]
fn verify_initialization_happens_once() {
    let mut world = world();
    let object = world.create_object(GameObjectDesc::new()).unwrap();
    let health = world.create_component(object, Health(1)).unwrap();
    assert_eq!(world.try_get_component::<Health>(health).unwrap().0, 1);

    let flags = world.try_get_object(object).unwrap().flags();
    assert_eq!(flags, ObjectFlags::DEFAULT);

    let stats = world.update(0.016);
    assert_eq!(stats.objects_initialized, 1);
    assert_eq!(stats.components_initialized, 1);

    let stats = world.update(0.016);
    assert_eq!(stats.objects_initialized, 0);
    assert_eq!(stats.components_initialized, 0);

    let flags = world.component_flags(health).unwrap();
    assert!(flags.contains(ObjectFlags::INITIALIZED | ObjectFlags::SIMULATION_STARTED));
    assert!(!flags.intersects(ObjectFlags::INITIALIZING | ObjectFlags::SIMULATION_STARTING));
}

type TeardownLog = Arc<Mutex<Vec<&'static str>>>;

/// Logs its tag on teardown, counts its updates.
struct Tracked {
    tag: &'static str,
    updates: u32,
    teardown: TeardownLog,
}

impl Tracked {
    fn new(tag: &'static str, teardown: &TeardownLog) -> Self {
        Self {
            tag,
            updates: 0,
            teardown: Arc::clone(teardown),
        }
    }
}

impl Component for Tracked {
    fn update(&mut self, _ctx: &mut ComponentContext<'_>) {
        self.updates += 1;
    }

    fn on_deinitialize(&mut self) {
        self.teardown.lock().push(self.tag);
    }
}

#[test]
fn verify_deinitialize_runs_once_for_initialized_components() {
    let mut world = world();
    let teardown = TeardownLog::default();
    let parent = world.create_object(GameObjectDesc::new()).unwrap();
    let child = world
        .create_object(GameObjectDesc::new().with_parent(parent))
        .unwrap();
    world
        .create_component(parent, Tracked::new("parent", &teardown))
        .unwrap();
    world
        .create_component(child, Tracked::new("child", &teardown))
        .unwrap();
    world.update(0.016);

    // Never initialized, so it must not be torn down.
    world
        .create_component(child, Tracked::new("late", &teardown))
        .unwrap();

    assert!(world.destroy_object(parent));
    let mut seen = teardown.lock().clone();
    seen.sort_unstable();
    assert_eq!(seen, vec!["child", "parent"]);

    assert!(!world.destroy_object(parent));
    world.update(0.016);
    assert_eq!(teardown.lock().len(), 2);
}

#[test]
fn verify_inactive_component_skips_update() {
    let mut world = world();
    let teardown = TeardownLog::default();
    let object = world.create_object(GameObjectDesc::new()).unwrap();
    let tracked = world
        .create_component(object, Tracked::new("tracked", &teardown))
        .unwrap();

    world.update(0.016);
    assert_eq!(world.try_get_component::<Tracked>(tracked).unwrap().updates, 1);

    assert!(world.set_component_active(tracked, false));
    assert!(!world
        .component_flags(tracked)
        .unwrap()
        .contains(ObjectFlags::ACTIVE));
    world.update(0.016);
    world.update(0.016);
    assert_eq!(world.try_get_component::<Tracked>(tracked).unwrap().updates, 1);

    assert!(world.set_component_active(tracked, true));
    world.update(0.016);
    assert_eq!(world.try_get_component::<Tracked>(tracked).unwrap().updates, 2);

    assert!(world.delete_component(tracked));
    assert!(!world.set_component_active(tracked, true));
}

// ============================================================================
// MEMORY
// ============================================================================

#[test]
fn verify_block_budget_is_enforced() {
    let config = WorldConfig::from_toml_str(
        r#"
        name = "tiny"
        block_size = 64
        max_blocks = 2
        "#,
    )
    .unwrap();
    let mut world = World::new(config).unwrap();

    let mut handles = Vec::new();
    let err = loop {
        match world.create_object(GameObjectDesc::new()) {
            Ok(handle) => handles.push(handle),
            Err(err) => break err,
        }
    };
    assert!(matches!(err, WorldError::OutOfMemory { .. }));
    assert!(!handles.is_empty());
    assert_eq!(world.object_count(), handles.len());
    assert_eq!(world.allocator().free_blocks(), 0);

    // A failed create leaves no half-made object behind.
    assert!(world.destroy_object(handles[0]));
    assert!(world.create_object(GameObjectDesc::new()).is_ok());
}
