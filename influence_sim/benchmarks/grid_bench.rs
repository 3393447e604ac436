use bevy::prelude::*;
use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use influence_sim::{
    build_headless_app_with_config, collect_pending, run_tick, ChannelStrength, Contribution,
    GridConfig, InfluenceConfig, InfluenceEmitter, InfluenceSource, SparseGrid,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

fn bench_config(max_cells_per_step: usize) -> GridConfig {
    GridConfig {
        label: "bench".to_string(),
        cell_size: 100.0,
        channel_count: 2,
        propagation_rate: 0.1,
        decay_rate: 0.01,
        decay_interval_seconds: 0.0,
        max_cells_per_step,
        is_2d: true,
        semi_static: false,
    }
}

fn filled_grid(side: i32, max_cells_per_step: usize) -> SparseGrid {
    let mut grid = SparseGrid::new(bench_config(max_cells_per_step));
    for x in 0..side {
        for y in 0..side {
            grid.add_influence(IVec3::new(x, y, 0), 0, 0.8, InfluenceSource::Static);
        }
    }
    grid
}

fn bench_maintenance(c: &mut Criterion) {
    let mut group = c.benchmark_group("maintenance");

    for side in [16i32, 32, 64] {
        group.bench_with_input(BenchmarkId::new("propagate_step", side), &side, |b, &side| {
            b.iter_batched(
                || filled_grid(side, 256),
                |mut grid| grid.propagate_step(256),
                BatchSize::SmallInput,
            )
        });
        group.bench_with_input(BenchmarkId::new("decay_step", side), &side, |b, &side| {
            b.iter_batched(
                || filled_grid(side, 256),
                |mut grid| grid.decay_step(256),
                BatchSize::SmallInput,
            )
        });
        group.bench_with_input(
            BenchmarkId::new("update_semi_static", side),
            &side,
            |b, &side| {
                b.iter_batched(
                    || filled_grid(side, 256),
                    |mut grid| grid.update_semi_static(),
                    BatchSize::SmallInput,
                )
            },
        );
    }

    group.finish();
}

fn bench_collection(c: &mut Criterion) {
    let mut group = c.benchmark_group("collection");
    let config = bench_config(64);
    let channels = [
        ChannelStrength {
            channel: 0,
            strength: 0.6,
        },
        ChannelStrength {
            channel: 1,
            strength: 0.3,
        },
    ];

    for sources in [128usize, 1024, 4096] {
        let mut rng = ChaCha8Rng::seed_from_u64(sources as u64);
        let contributions: Vec<Contribution<'_>> = (0..sources)
            .map(|index| Contribution {
                source: InfluenceSource::Entity(Entity::from_raw(index as u32)),
                position: Vec3::new(
                    rng.gen_range(-5_000.0..5_000.0),
                    rng.gen_range(-5_000.0..5_000.0),
                    0.0,
                ),
                channels: &channels,
                radius: 300.0,
            })
            .collect();

        group.bench_with_input(
            BenchmarkId::new("collect_pending", sources),
            &contributions,
            |b, contributions| b.iter(|| collect_pending(&config, contributions)),
        );
    }

    group.finish();
}

fn bench_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("tick");

    for emitters in [64usize, 512] {
        group.bench_with_input(BenchmarkId::new("emitters", emitters), &emitters, |b, &n| {
            b.iter_batched(
                || {
                    let mut app = build_headless_app_with_config(InfluenceConfig {
                        grids: vec![bench_config(128)],
                        ..InfluenceConfig::default()
                    });
                    let mut rng = ChaCha8Rng::seed_from_u64(n as u64);
                    for _ in 0..n {
                        let position = Vec3::new(
                            rng.gen_range(-5_000.0..5_000.0),
                            rng.gen_range(-5_000.0..5_000.0),
                            0.0,
                        );
                        app.world.spawn((
                            Transform::from_translation(position),
                            InfluenceEmitter::point(0, 0, 0.5).with_radius(250.0),
                        ));
                    }
                    app
                },
                |mut app| run_tick(&mut app, std::time::Duration::from_millis(100)),
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

criterion_group!(grid_benches, bench_maintenance, bench_collection, bench_tick);
criterion_main!(grid_benches);
