//! # Message Routing Verification Tests
//!
//! Verifies delivery order over the object forest and the phase queues:
//!
//! 1. **Routing**: parents, children and subtree walk in the documented order
//! 2. **Components**: visited in type registration order, catch-all honored
//! 3. **Phases**: queued messages arrive exactly once, in the right phase
//! 4. **Commands**: handlers reshape the world only after delivery
//!
//! Run with: cargo test --test message_routing

use std::sync::Arc;

use kestrel_core::{
    Component, ComponentContext, GameObject, GameObjectDesc, Message, MessageHandlers,
    MessageQueuePhase, MessageRouting, ObjectHandle, OnComponentFinishedAction, World,
    WorldConfig,
};
use parking_lot::Mutex;

#[derive(Clone, Debug)]
struct Probe;

#[derive(Clone, Debug)]
struct Tick;

#[derive(Clone, Debug)]
struct Unknown;

#[derive(Clone, Debug)]
struct Expire;

type Log<T> = Arc<Mutex<Vec<T>>>;

fn world() -> World {
    World::new(WorldConfig::named("routing")).unwrap()
}

/// Records which objects received a `Probe` at object level.
fn log_object_probes(world: &mut World) -> Log<ObjectHandle> {
    let log: Log<ObjectHandle> = Arc::default();
    let sink = Arc::clone(&log);
    world.on_object_message(
        move |object: &mut GameObject, _: &Probe, _: &mut ComponentContext<'_>| {
            sink.lock().push(object.handle());
        },
    );
    log
}

struct Chain {
    root: ObjectHandle,
    mid: ObjectHandle,
    leaf: ObjectHandle,
}

fn chain(world: &mut World) -> Chain {
    let root = world.create_object(GameObjectDesc::new()).unwrap();
    let mid = world
        .create_object(GameObjectDesc::new().with_parent(root))
        .unwrap();
    let leaf = world
        .create_object(GameObjectDesc::new().with_parent(mid))
        .unwrap();
    Chain { root, mid, leaf }
}

// ============================================================================
// ROUTING MODES
// ============================================================================

#[test]
fn verify_to_all_parents_walks_up() {
    let mut world = world();
    let log = log_object_probes(&mut world);
    let c = chain(&mut world);

    world.send_message(c.leaf, &Probe, MessageRouting::ToAllParents);
    assert_eq!(*log.lock(), vec![c.leaf, c.mid, c.root]);
}

#[test]
fn verify_to_subtree_starts_at_root() {
    let mut world = world();
    let log = log_object_probes(&mut world);
    let c = chain(&mut world);

    world.send_message(c.mid, &Probe, MessageRouting::ToSubTree);
    assert_eq!(*log.lock(), vec![c.root, c.mid, c.leaf]);
}

#[test]
fn verify_to_children_is_preorder() {
    let mut world = world();
    let log = log_object_probes(&mut world);
    let c = chain(&mut world);
    let sibling = world
        .create_object(GameObjectDesc::new().with_parent(c.root))
        .unwrap();

    world.send_message(c.root, &Probe, MessageRouting::ToChildren);
    assert_eq!(*log.lock(), vec![c.root, c.mid, c.leaf, sibling]);

    log.lock().clear();
    world.send_message(c.mid, &Probe, MessageRouting::ToObjectOnly);
    assert_eq!(*log.lock(), vec![c.mid]);
}

#[test]
fn verify_dead_target_delivers_nothing() {
    let mut world = world();
    let log = log_object_probes(&mut world);
    let c = chain(&mut world);
    world.destroy_object(c.root);

    assert_eq!(world.send_message(c.leaf, &Probe, MessageRouting::ToAllParents), 0);
    assert!(log.lock().is_empty());
}

// ============================================================================
// COMPONENT DISPATCH
// ============================================================================

struct Labelled {
    label: &'static str,
    log: Log<&'static str>,
}

impl Component for Labelled {
    fn register_handlers(handlers: &mut MessageHandlers<Self>) {
        handlers.on(|this: &mut Labelled, _: &Probe, _: &mut ComponentContext<'_>| {
            this.log.lock().push(this.label);
        });
    }
}

struct Other {
    log: Log<&'static str>,
}

impl Component for Other {
    fn register_handlers(handlers: &mut MessageHandlers<Self>) {
        handlers.on(|this: &mut Other, _: &Probe, _: &mut ComponentContext<'_>| {
            this.log.lock().push("other");
        });
    }
}

#[test]
fn verify_components_follow_registration_order() {
    let mut world = world();
    world.register_component_type::<Labelled>().unwrap();
    world.register_component_type::<Other>().unwrap();

    let log: Log<&'static str> = Arc::default();
    let object = world.create_object(GameObjectDesc::new()).unwrap();
    world
        .create_component(object, Other { log: Arc::clone(&log) })
        .unwrap();
    world
        .create_component(object, Labelled { label: "first", log: Arc::clone(&log) })
        .unwrap();
    world
        .create_component(object, Labelled { label: "second", log: Arc::clone(&log) })
        .unwrap();

    let handled = world.send_message(object, &Probe, MessageRouting::ToComponents);
    assert_eq!(handled, 3);
    assert_eq!(*log.lock(), vec!["first", "second", "other"]);

    log.lock().clear();
    world.send_message(object, &Probe, MessageRouting::ToObjectOnly);
    assert!(log.lock().is_empty());
}

#[derive(Default)]
struct CatchAll {
    unhandled: Vec<&'static str>,
}

impl Component for CatchAll {
    const HANDLES_UNHANDLED_MESSAGES: bool = true;

    fn on_unhandled_message(&mut self, message: &dyn Message, _ctx: &mut ComponentContext<'_>) {
        self.unhandled.push(message.type_name());
    }
}

#[test]
fn verify_unhandled_messages_reach_catch_all() {
    let mut world = world();
    let object = world.create_object(GameObjectDesc::new()).unwrap();
    let catch_all = world.create_component(object, CatchAll::default()).unwrap();

    assert_eq!(world.send_message(object, &Unknown, MessageRouting::ToComponents), 1);
    assert!(world.send_message_to_component(catch_all, &Tick));

    let seen = &world.try_get_component::<CatchAll>(catch_all).unwrap().unhandled;
    assert_eq!(seen.len(), 2);
    assert!(seen[0].ends_with("Unknown"));
    assert!(seen[1].ends_with("Tick"));
}

// ============================================================================
// PHASE QUEUES
// ============================================================================

#[derive(Default)]
struct Sink {
    ready: bool,
    probes: u32,
    ticks: u32,
    probe_saw_ready: Vec<bool>,
}

impl Component for Sink {
    fn register_handlers(handlers: &mut MessageHandlers<Self>) {
        handlers
            .on(|sink: &mut Sink, _: &Probe, _: &mut ComponentContext<'_>| {
                sink.probes += 1;
                sink.probe_saw_ready.push(sink.ready);
            })
            .on(|sink: &mut Sink, _: &Tick, _: &mut ComponentContext<'_>| {
                sink.ticks += 1;
            });
    }

    fn initialize(&mut self, _ctx: &mut ComponentContext<'_>) {
        self.ready = true;
    }
}

#[derive(Default)]
struct Poster {
    posted: bool,
}

impl Component for Poster {
    fn update(&mut self, ctx: &mut ComponentContext<'_>) {
        if self.posted {
            return;
        }
        self.posted = true;
        let owner = ctx.owner();
        ctx.commands().post_message(
            owner,
            Probe,
            MessageRouting::ToComponents,
            MessageQueuePhase::NextFrame,
        );
        ctx.commands().post_message(
            owner,
            Tick,
            MessageRouting::ToComponents,
            MessageQueuePhase::PostAsync,
        );
    }
}

#[test]
fn verify_next_frame_waits_for_next_frame() {
    let mut world = world();
    let object = world.create_object(GameObjectDesc::new()).unwrap();
    world.create_component(object, Poster::default()).unwrap();
    let sink = world.create_component(object, Sink::default()).unwrap();

    let stats = world.update(0.016);
    let state = world.try_get_component::<Sink>(sink).unwrap();
    assert_eq!(state.ticks, 1, "PostAsync is flushed in the same frame");
    assert_eq!(state.probes, 0, "NextFrame must not leak into this frame");
    assert_eq!(stats.delivered(MessageQueuePhase::PostAsync), 1);
    assert_eq!(world.pending_message_count(MessageQueuePhase::NextFrame), 1);

    let stats = world.update(0.016);
    assert_eq!(stats.delivered(MessageQueuePhase::NextFrame), 1);
    assert_eq!(world.try_get_component::<Sink>(sink).unwrap().probes, 1);

    world.update(0.016);
    assert_eq!(world.try_get_component::<Sink>(sink).unwrap().probes, 1);
    assert_eq!(world.pending_message_count(MessageQueuePhase::NextFrame), 0);
}

#[test]
fn verify_queued_phases_wait_for_initialization() {
    let mut world = world();
    let object = world.create_object(GameObjectDesc::new()).unwrap();
    let sink = world.create_component(object, Sink::default()).unwrap();

    world.post_message(
        object,
        Probe,
        MessageRouting::ToComponents,
        MessageQueuePhase::NextFrame,
    );
    world.post_message(
        object,
        Probe,
        MessageRouting::ToComponents,
        MessageQueuePhase::AfterInitialized,
    );

    let stats = world.update(0.016);
    assert_eq!(stats.delivered(MessageQueuePhase::NextFrame), 1);
    assert_eq!(stats.delivered(MessageQueuePhase::AfterInitialized), 1);

    let state = world.try_get_component::<Sink>(sink).unwrap();
    assert_eq!(state.probe_saw_ready, vec![true, true]);
}

#[test]
fn verify_stale_queued_target_is_dropped() {
    let mut world = world();
    let object = world.create_object(GameObjectDesc::new()).unwrap();
    let sink = world.create_component(object, Sink::default()).unwrap();

    world.post_message(
        object,
        Tick,
        MessageRouting::ToComponents,
        MessageQueuePhase::PostTransform,
    );
    world.post_message_to_component(sink, Tick, MessageQueuePhase::PostAsync);
    world.destroy_object(object);

    let stats = world.update(0.016);
    assert_eq!(stats.delivered(MessageQueuePhase::PostAsync), 0);
    assert_eq!(stats.delivered(MessageQueuePhase::PostTransform), 0);
    assert_eq!(world.pending_message_count(MessageQueuePhase::PostTransform), 0);
}

// ============================================================================
// COMMANDS FROM HANDLERS
// ============================================================================

struct Fuse;

impl Component for Fuse {
    fn register_handlers(handlers: &mut MessageHandlers<Self>) {
        handlers.on(|_: &mut Fuse, _: &Expire, ctx: &mut ComponentContext<'_>| {
            if let Some(component) = ctx.component() {
                ctx.commands()
                    .component_finished(component, OnComponentFinishedAction::DeleteEntity);
            }
        });
    }
}

#[test]
fn verify_finished_component_deletes_owner_after_delivery() {
    let mut world = world();
    let c = chain(&mut world);
    world.create_component(c.mid, Fuse).unwrap();
    let leaf_fuse = world.create_component(c.leaf, Fuse).unwrap();

    // Both fuses are reached even though the first one deletes the subtree
    // holding the second.
    let handled = world.send_message(c.mid, &Expire, MessageRouting::ToChildren);
    assert_eq!(handled, 2);

    assert!(world.is_valid_object(c.root));
    assert!(!world.is_valid_object(c.mid));
    assert!(!world.is_valid_object(c.leaf));
    assert!(!world.is_valid_component(leaf_fuse));
    assert_eq!(world.update(0.016).deletions, 1);
}

#[test]
fn verify_deferred_component_creation() {
    #[derive(Default)]
    struct Spawner;

    impl Component for Spawner {
        fn initialize(&mut self, ctx: &mut ComponentContext<'_>) {
            let owner = ctx.owner();
            ctx.commands().add_component(owner, Sink::default());
        }
    }

    let mut world = world();
    let object = world.create_object(GameObjectDesc::new()).unwrap();
    world.create_component(object, Spawner).unwrap();

    // The spawned component is initialized in the same pass.
    let stats = world.update(0.016);
    assert_eq!(stats.components_initialized, 2);
    assert_eq!(world.components_of(object).len(), 2);
}
