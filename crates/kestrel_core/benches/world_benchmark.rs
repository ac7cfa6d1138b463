//! # World Performance Benchmark
//!
//! Object and component churn against block-backed storage:
//! - Creating and destroying 100K objects
//! - Handle resolution, live and stale
//! - Full update pass over 100K components
//!
//! Run with: `cargo bench --package kestrel_core --bench world_benchmark`

#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use kestrel_core::{Component, ComponentContext, GameObjectDesc, ObjectHandle, World, WorldConfig};

/// Object count for the large benchmarks.
const OBJECT_COUNT: usize = 100_000;

#[derive(Default)]
struct Velocity {
    value: [f32; 3],
    position: [f32; 3],
}

impl Component for Velocity {
    fn update(&mut self, ctx: &mut ComponentContext<'_>) {
        let dt = ctx.frame().delta_seconds;
        for (position, velocity) in self.position.iter_mut().zip(self.value) {
            *position += velocity * dt;
        }
    }
}

fn populated_world(count: usize) -> (World, Vec<ObjectHandle>) {
    let mut world = World::new(WorldConfig::named("bench")).unwrap();
    let handles = (0..count)
        .map(|_| world.create_object(GameObjectDesc::new()).unwrap())
        .collect();
    (world, handles)
}

/// Benchmark: Create N objects in a fresh world.
fn bench_create_objects(c: &mut Criterion) {
    let mut group = c.benchmark_group("create_objects");

    for count in [1_000, 10_000, OBJECT_COUNT] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter(|| {
                let (world, _) = populated_world(count);
                black_box(world.object_count())
            });
        });
    }

    group.finish();
}

/// Benchmark: Destroy and recreate 10K objects (slot reuse path).
fn bench_churn(c: &mut Criterion) {
    let (mut world, mut handles) = populated_world(OBJECT_COUNT);

    c.bench_function("churn_10K_of_100K", |b| {
        b.iter(|| {
            for handle in handles.iter_mut().take(10_000) {
                world.destroy_object(*handle);
                *handle = world.create_object(GameObjectDesc::new()).unwrap();
            }
            black_box(world.object_count())
        });
    });
}

/// Benchmark: Handle resolution, live versus stale.
fn bench_resolve(c: &mut Criterion) {
    let (mut world, handles) = populated_world(OBJECT_COUNT);
    let stale: Vec<ObjectHandle> = handles.iter().step_by(2).copied().collect();
    for handle in &stale {
        world.destroy_object(*handle);
    }
    let live: Vec<ObjectHandle> = handles.iter().skip(1).step_by(2).copied().collect();

    let mut group = c.benchmark_group("resolve");

    group.bench_function("live_50K", |b| {
        b.iter(|| live.iter().filter(|h| world.is_valid_object(**h)).count());
    });

    group.bench_function("stale_50K", |b| {
        b.iter(|| stale.iter().filter(|h| world.is_valid_object(**h)).count());
    });

    group.finish();
}

/// Benchmark: One frame with 100K updating components.
fn bench_update(c: &mut Criterion) {
    let (mut world, handles) = populated_world(OBJECT_COUNT);
    for handle in &handles {
        world
            .create_component(
                *handle,
                Velocity {
                    value: [0.1, 0.2, 0.3],
                    ..Velocity::default()
                },
            )
            .unwrap();
    }
    // Pay for initialization outside the measurement.
    world.update(0.016);

    c.bench_function("update_100K_components", |b| {
        b.iter(|| black_box(world.update(0.016).components_updated));
    });
}

criterion_group!(
    benches,
    bench_create_objects,
    bench_churn,
    bench_resolve,
    bench_update,
);

criterion_main!(benches);
