use std::env;
use std::time::Duration;

use bevy::prelude::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{info, warn};

use influence_sim::{
    build_headless_app, run_tick, InfluenceConfigHandle, InfluenceEmitter, InfluenceMaps,
    InfluenceMetrics, InfluenceVolume, RefreshSemiStaticGrid, VolumeShape,
};

const DEFAULT_TICKS: u32 = 120;
const EMITTER_COUNT: usize = 64;
const WORLD_HALF_EXTENT: f32 = 10_000.0;
const STEP: Duration = Duration::from_millis(100);
const SEED: u64 = 0x5eed;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let ticks = match env::args().nth(1) {
        Some(arg) => arg.parse::<u32>().unwrap_or_else(|err| {
            warn!(
                target: "influence::probe",
                %arg,
                error = %err,
                default = DEFAULT_TICKS,
                "probe.invalid_tick_count"
            );
            DEFAULT_TICKS
        }),
        None => DEFAULT_TICKS,
    };

    let mut app = build_headless_app();
    let config = app.world.resource::<InfluenceConfigHandle>().get();

    let mut profile_names: Vec<&String> = config.emitter_profiles.keys().collect();
    profile_names.sort();
    if profile_names.is_empty() {
        warn!(target: "influence::probe", "probe.no_emitter_profiles");
    }

    let mut rng = ChaCha8Rng::seed_from_u64(SEED);
    let mut emitters = Vec::with_capacity(EMITTER_COUNT);
    for _ in 0..EMITTER_COUNT {
        let Some(name) = profile_names.get(rng.gen_range(0..profile_names.len().max(1))) else {
            break;
        };
        let Some(profile) = config.emitter_profile(name) else {
            continue;
        };
        let position = Vec3::new(
            rng.gen_range(-WORLD_HALF_EXTENT..WORLD_HALF_EXTENT),
            rng.gen_range(-WORLD_HALF_EXTENT..WORLD_HALF_EXTENT),
            0.0,
        );
        let entity = app
            .world
            .spawn((Transform::from_translation(position), profile.to_emitter()))
            .id();
        emitters.push(entity);
    }

    let semi_static_grid = config.grids.iter().position(|grid| grid.semi_static);
    if let Some(grid) = semi_static_grid {
        app.world.spawn((
            Transform::from_xyz(0.0, 0.0, 0.0),
            InfluenceVolume {
                grid,
                channel: 0,
                strength: 0.75,
                shape: VolumeShape::Sphere { radius: 6_000.0 },
            },
        ));
    }

    info!(
        target: "influence::probe",
        ticks,
        emitters = emitters.len(),
        grids = config.grids.len(),
        "probe.started"
    );

    for tick in 0..ticks {
        if let Some(grid) = semi_static_grid {
            if tick % 30 == 0 {
                app.world.send_event(RefreshSemiStaticGrid { grid });
            }
        }

        for entity in &emitters {
            if let Some(mut transform) = app.world.get_mut::<Transform>(*entity) {
                transform.translation.x += rng.gen_range(-50.0..50.0);
                transform.translation.y += rng.gen_range(-50.0..50.0);
            }
        }

        if tick == ticks / 2 {
            for entity in emitters.drain(..emitters.len() / 2) {
                app.world.despawn(entity);
            }
        }

        run_tick(&mut app, STEP);
    }

    let maps = app.world.resource::<InfluenceMaps>();
    for sample in [Vec3::ZERO, Vec3::new(2_500.0, -2_500.0, 0.0)] {
        for (index, grid) in maps.grids().iter().enumerate() {
            for channel in 0..grid.config().channel_count {
                info!(
                    target: "influence::probe",
                    grid = %grid.config().label,
                    channel,
                    x = sample.x,
                    y = sample.y,
                    point = maps.query_influence(index, sample, channel),
                    area = maps.query_influence_in_radius(index, sample, 3_000.0, channel),
                    "probe.sample"
                );
            }
        }
    }

    let metrics = app.world.resource::<InfluenceMetrics>();
    for (index, grid) in metrics.grids.iter().enumerate() {
        info!(
            target: "influence::probe",
            grid = index,
            tick = metrics.tick,
            occupied_cells = grid.occupied_cells,
            entries = grid.entries,
            pending_last_tick = grid.pending_last_tick,
            "probe.metrics"
        );
    }

    let remaining: usize = emitters
        .iter()
        .filter(|entity| app.world.get::<InfluenceEmitter>(**entity).is_some())
        .count();
    info!(target: "influence::probe", remaining, "probe.finished");
}
