//! ECS systems driving the influence grids.
//!
//! Runs in [`InfluenceSet`] order every frame:
//! 1. `evict_removed_emitters` - drop entries of emitters that went away
//! 2. `sync_influence_volumes` - paint, move, or clear static volumes
//! 3. `refresh_semi_static_grids` - on-demand full passes requested by events
//! 4. `accumulate_influence` - collect, merge, and decay this tick's contributions
//! 5. `collect_metrics` and `report_debug_cells`

use bevy::prelude::*;
use bevy::utils::{HashMap, HashSet};

use crate::{
    cell::InfluenceSource,
    collection::Contribution,
    components::{InfluenceEmitter, InfluenceVolume},
    debug::{debug_cells, InfluenceDebugObserver, InfluenceDebugSettings},
    maps::InfluenceMaps,
    metrics::InfluenceMetrics,
};

#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InfluenceSet {
    Evict,
    Static,
    Accumulate,
    Report,
}

/// Requests a full propagation and decay pass on a semi-static grid.
#[derive(Event, Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshSemiStaticGrid {
    pub grid: usize,
}

/// Cells each live volume last wrote to, so they can be cleared on change or removal.
///
/// Volumes overlapping on the same grid and channel share the cell's single
/// static entry: the last write wins, and clearing either footprint removes it.
#[derive(Resource, Debug, Clone, Default)]
pub struct AppliedVolumes {
    footprints: HashMap<Entity, VolumeFootprint>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VolumeFootprint {
    pub grid: usize,
    pub channel: usize,
    pub cells: Vec<IVec3>,
}

impl AppliedVolumes {
    pub fn footprint(&self, entity: Entity) -> Option<&VolumeFootprint> {
        self.footprints.get(&entity)
    }

    pub fn len(&self) -> usize {
        self.footprints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.footprints.is_empty()
    }
}

pub fn evict_removed_emitters(
    mut removed: RemovedComponents<InfluenceEmitter>,
    mut maps: ResMut<InfluenceMaps>,
) {
    for entity in removed.read() {
        let evicted = maps.remove_source_everywhere(InfluenceSource::Entity(entity));
        tracing::debug!(
            target: "influence::systems",
            ?entity,
            evicted,
            "influence.emitter_evicted"
        );
    }
}

pub fn sync_influence_volumes(
    mut maps: ResMut<InfluenceMaps>,
    mut applied: ResMut<AppliedVolumes>,
    mut removed: RemovedComponents<InfluenceVolume>,
    changed: Query<
        (Entity, &Transform, &InfluenceVolume),
        Or<(Changed<InfluenceVolume>, Changed<Transform>)>,
    >,
) {
    for entity in removed.read() {
        if let Some(footprint) = applied.footprints.remove(&entity) {
            maps.clear_static_footprint(footprint.grid, footprint.channel, &footprint.cells);
            tracing::debug!(
                target: "influence::systems",
                ?entity,
                grid = footprint.grid,
                cells = footprint.cells.len(),
                "influence.volume_removed"
            );
        }
    }

    for (entity, transform, volume) in changed.iter() {
        if let Some(previous) = applied.footprints.remove(&entity) {
            maps.clear_static_footprint(previous.grid, previous.channel, &previous.cells);
        }

        let region = volume.region(transform.translation);
        let cells = maps.apply_static_region(volume.grid, &region, volume.channel, volume.strength);
        tracing::debug!(
            target: "influence::systems",
            ?entity,
            grid = volume.grid,
            channel = volume.channel,
            strength = volume.strength,
            cells = cells.len(),
            "influence.volume_applied"
        );
        applied.footprints.insert(
            entity,
            VolumeFootprint {
                grid: volume.grid,
                channel: volume.channel,
                cells,
            },
        );
    }
}

pub fn refresh_semi_static_grids(
    mut requests: EventReader<RefreshSemiStaticGrid>,
    mut maps: ResMut<InfluenceMaps>,
) {
    let mut refreshed = HashSet::new();
    for request in requests.read() {
        if !refreshed.insert(request.grid) {
            continue;
        }
        match maps.update_semi_static_grid(request.grid) {
            Some((propagated, decayed)) => tracing::info!(
                target: "influence::systems",
                grid = request.grid,
                propagated,
                decayed,
                "influence.semi_static_refreshed"
            ),
            None => tracing::warn!(
                target: "influence::systems",
                grid = request.grid,
                "influence.semi_static_refresh_ignored reason=dynamic_grid"
            ),
        }
    }
}

/// Per-tick contribution pipeline: gather every emitter, then collect, merge,
/// and decay each grid in turn.
pub fn accumulate_influence(
    time: Res<Time>,
    mut maps: ResMut<InfluenceMaps>,
    mut metrics: ResMut<InfluenceMetrics>,
    emitters: Query<(Entity, &Transform, &InfluenceEmitter)>,
) {
    let grid_count = maps.grid_count();
    let mut per_grid: Vec<Vec<Contribution<'_>>> = vec![Vec::new(); grid_count];

    for (entity, transform, emitter) in emitters.iter() {
        assert!(
            emitter.grid < grid_count,
            "influence emitter {entity:?} targets grid {} but only {grid_count} grids are configured",
            emitter.grid
        );
        per_grid[emitter.grid].push(Contribution {
            source: InfluenceSource::Entity(entity),
            position: transform.translation,
            channels: &emitter.channels,
            radius: emitter.radius,
        });
    }

    let delta_seconds = time.delta_seconds();
    for (index, contributions) in per_grid.iter().enumerate() {
        let report = maps.apply_contributions(index, contributions, delta_seconds);
        metrics.record_tick(index, report);
        tracing::trace!(
            target: "influence::systems",
            grid = index,
            sources = contributions.len(),
            pending = report.pending,
            decayed_cells = report.decayed_cells,
            "influence.tick_applied"
        );
    }
}

pub fn report_debug_cells(
    settings: Res<InfluenceDebugSettings>,
    observer: Option<Res<InfluenceDebugObserver>>,
    maps: Res<InfluenceMaps>,
) {
    if !settings.enabled {
        return;
    }
    let Some(observer) = observer else {
        return;
    };

    for (index, grid) in maps.grids().iter().enumerate() {
        for cell in debug_cells(index, grid) {
            observer.notify(&cell);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::VolumeShape;
    use crate::config::{GridConfig, InfluenceConfig};
    use bevy::ecs::system::RunSystemOnce;
    use std::time::Duration;

    fn world_with_maps(grids: Vec<GridConfig>) -> World {
        let mut world = World::new();
        world.insert_resource(InfluenceMaps::from_config(&InfluenceConfig {
            grids,
            ..InfluenceConfig::default()
        }));
        world.insert_resource(InfluenceMetrics::default());
        world.insert_resource(AppliedVolumes::default());
        world.init_resource::<Time>();
        world
    }

    fn grid(semi_static: bool) -> GridConfig {
        GridConfig {
            cell_size: 100.0,
            channel_count: 1,
            propagation_rate: 0.0,
            decay_rate: 0.1,
            decay_interval_seconds: 0.0,
            max_cells_per_step: 16,
            is_2d: true,
            semi_static,
            ..GridConfig::default()
        }
    }

    #[test]
    fn emitters_write_into_their_grid() {
        let mut world = world_with_maps(vec![grid(false), grid(true)]);
        let entity = world
            .spawn((
                Transform::from_xyz(50.0, 50.0, 0.0),
                InfluenceEmitter::point(1, 0, 0.8),
            ))
            .id();

        world.run_system_once(accumulate_influence);

        let maps = world.resource::<InfluenceMaps>();
        assert!(maps.grid(0).is_empty());
        let strongest = maps
            .strongest_source(1, Vec3::new(50.0, 50.0, 0.0), 0)
            .expect("entry written");
        assert_eq!(strongest.source, InfluenceSource::Entity(entity));
        assert_eq!(strongest.strength, 0.8);

        let metrics = world.resource::<InfluenceMetrics>();
        assert_eq!(metrics.grid(1).unwrap().pending_last_tick, 1);
    }

    #[test]
    fn repeated_ticks_stack_up_to_the_cap_then_decay() {
        let mut world = world_with_maps(vec![grid(false)]);
        world.spawn((
            Transform::from_xyz(50.0, 50.0, 0.0),
            InfluenceEmitter::point(0, 0, 0.6),
        ));
        world
            .resource_mut::<Time>()
            .advance_by(Duration::from_millis(100));

        // 0.6, decayed to 0.5.
        world.run_system_once(accumulate_influence);
        let first = world
            .resource::<InfluenceMaps>()
            .query_influence(0, Vec3::new(50.0, 50.0, 0.0), 0);
        assert!((first - 0.5).abs() < 1e-5);

        // 0.5 + 0.6 clamps to 1.0, decayed to 0.9.
        world.run_system_once(accumulate_influence);
        let second = world
            .resource::<InfluenceMaps>()
            .query_influence(0, Vec3::new(50.0, 50.0, 0.0), 0);
        assert!((second - 0.9).abs() < 1e-5);
    }

    #[test]
    #[should_panic(expected = "targets grid 3")]
    fn emitter_on_missing_grid_panics() {
        let mut world = world_with_maps(vec![grid(false)]);
        world.spawn((Transform::default(), InfluenceEmitter::point(3, 0, 1.0)));
        world.run_system_once(accumulate_influence);
    }

    #[test]
    fn volumes_are_applied_moved_and_cleared() {
        let mut world = world_with_maps(vec![grid(true)]);
        let volume = world
            .spawn((
                Transform::from_xyz(50.0, 50.0, 0.0),
                InfluenceVolume {
                    grid: 0,
                    channel: 0,
                    strength: 0.5,
                    shape: VolumeShape::Box {
                        half_extents: Vec3::splat(10.0),
                    },
                },
            ))
            .id();

        world.run_system_once(sync_influence_volumes);
        {
            let maps = world.resource::<InfluenceMaps>();
            assert_eq!(maps.grid(0).len(), 1);
            assert_eq!(maps.query_influence(0, Vec3::new(50.0, 50.0, 0.0), 0), 0.5);
        }

        world.get_mut::<Transform>(volume).unwrap().translation = Vec3::new(450.0, 50.0, 0.0);
        world.run_system_once(sync_influence_volumes);
        {
            let maps = world.resource::<InfluenceMaps>();
            assert_eq!(maps.grid(0).len(), 1);
            assert_eq!(maps.query_influence(0, Vec3::new(50.0, 50.0, 0.0), 0), 0.0);
            assert_eq!(maps.query_influence(0, Vec3::new(450.0, 50.0, 0.0), 0), 0.5);
        }

        world.despawn(volume);
        world.run_system_once(sync_influence_volumes);
        assert!(world.resource::<InfluenceMaps>().grid(0).is_empty());
        assert!(world.resource::<AppliedVolumes>().is_empty());
    }

    #[test]
    fn duplicate_refresh_requests_collapse() {
        let mut world = world_with_maps(vec![grid(true)]);
        world.init_resource::<Events<RefreshSemiStaticGrid>>();
        world
            .resource_mut::<InfluenceMaps>()
            .set_cell_influence(0, IVec3::ZERO, 0, 1.0);

        {
            let mut events = world.resource_mut::<Events<RefreshSemiStaticGrid>>();
            events.send(RefreshSemiStaticGrid { grid: 0 });
            events.send(RefreshSemiStaticGrid { grid: 0 });
        }
        world.run_system_once(refresh_semi_static_grids);

        let total = world
            .resource::<InfluenceMaps>()
            .query_influence(0, Vec3::new(50.0, 50.0, 0.0), 0);
        assert!((total - 0.9).abs() < 1e-5);
    }
}
