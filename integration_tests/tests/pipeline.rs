mod common;

use std::sync::{Arc, Mutex};

use bevy::prelude::*;
use influence_sim::{
    run_tick, DebugCell, InfluenceConfigMetadata, InfluenceDebugObserver, InfluenceDebugSettings,
    InfluenceMaps, InfluenceMetrics,
};

use common::{fixture_config, fixture_path, spawn_profile, test_app, STEP};

#[test]
fn plugin_loads_fixture_config() {
    let app = test_app();
    let metadata = app.world.resource::<InfluenceConfigMetadata>();
    assert_eq!(metadata.path(), Some(&fixture_path()));

    let maps = app.world.resource::<InfluenceMaps>();
    let expected = fixture_config().expect("fixture parses");
    assert_eq!(maps.grid_count(), expected.grids.len());
    assert_eq!(maps.grid(0).config(), &expected.grids[0]);
    assert!(maps.grid(1).config().semi_static);
}

#[test]
fn emitter_footprint_decays_each_tick() {
    let mut app = test_app();
    spawn_profile(&mut app, "Scout", Vec3::new(50.0, 50.0, 0.0));

    run_tick(&mut app, STEP);

    let maps = app.world.resource::<InfluenceMaps>();
    // Center and the four edge neighbours survive; diagonal falloff is spent by decay.
    assert_eq!(maps.grid(0).len(), 5);
    let center = maps.query_influence(0, Vec3::new(50.0, 50.0, 0.0), 0);
    assert!((center - 0.9).abs() < 1e-5);
    let edge = maps.query_influence(0, Vec3::new(150.0, 50.0, 0.0), 0);
    assert!((edge - (1.0 / 3.0 - 0.1)).abs() < 1e-4);
    assert_eq!(maps.query_influence(0, Vec3::new(150.0, 150.0, 0.0), 0), 0.0);
    assert_eq!(maps.query_influence(0, Vec3::new(50.0, 50.0, 0.0), 1), 0.0);

    let metrics = app.world.resource::<InfluenceMetrics>();
    assert_eq!(metrics.tick, 1);
    let grid = metrics.grid(0).expect("grid metrics");
    assert_eq!(grid.pending_last_tick, 9);
    assert_eq!(grid.occupied_cells, 5);
    assert_eq!(grid.entries, 5);
}

#[test]
fn point_emitters_saturate_at_the_cap() {
    let mut app = test_app();
    spawn_profile(&mut app, "Marker", Vec3::new(250.0, 250.0, 0.0));

    for _ in 0..5 {
        run_tick(&mut app, STEP);
    }

    // 0.6 per tick stacks to the 1.0 cap before each decay pass.
    let maps = app.world.resource::<InfluenceMaps>();
    let total = maps.query_influence(0, Vec3::new(250.0, 250.0, 0.0), 1);
    assert!((total - 0.9).abs() < 1e-5);
    assert_eq!(maps.grid(0).len(), 1);
}

#[test]
fn debug_observer_sees_occupied_cells() {
    let mut app = test_app();
    let seen: Arc<Mutex<Vec<DebugCell>>> = Arc::default();
    let sink = Arc::clone(&seen);
    app.insert_resource(InfluenceDebugSettings { enabled: true })
        .insert_resource(InfluenceDebugObserver::new(move |cell: &DebugCell| {
            sink.lock().expect("observer sink").push(*cell);
        }));
    spawn_profile(&mut app, "Marker", Vec3::new(250.0, 250.0, 0.0));

    run_tick(&mut app, STEP);

    let seen = seen.lock().expect("observer sink");
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].grid, 0);
    assert_eq!(seen[0].coord, IVec3::new(2, 2, 0));
    assert_eq!(seen[0].center, Vec3::new(250.0, 250.0, 0.0));
    assert!((seen[0].intensity - 0.5).abs() < 1e-5);
}
