//! Sparse, multi-channel influence maps for agent decision making.
//!
//! Entities carrying an [`InfluenceEmitter`] write decaying influence into one
//! of several configured [`SparseGrid`]s every tick; [`InfluenceVolume`]s paint
//! long-lived static influence. Consumers read the resulting fields through
//! [`InfluenceMaps`].

use std::time::Duration;

use bevy::prelude::*;

mod cell;
mod collection;
mod components;
pub mod config;
pub mod debug;
mod footprint;
pub mod grid;
pub mod maps;
pub mod metrics;
pub mod systems;

pub use cell::{InfluenceCell, InfluenceEntry, InfluenceSource};
pub use collection::{collect_pending, Contribution, PendingInfluence};
pub use components::{
    ChannelStrength, InfluenceEmitter, InfluenceVolume, StaticRegion, VolumeShape,
};
pub use config::{
    load_influence_config_from_env, EmitterProfile, GridConfig, InfluenceConfig,
    InfluenceConfigError, InfluenceConfigHandle, InfluenceConfigMetadata,
    BUILTIN_INFLUENCE_CONFIG,
};
pub use debug::{DebugCell, InfluenceDebugObserver, InfluenceDebugSettings};
pub use grid::{SparseGrid, BATCH_STRENGTH_CAP, INFLUENCE_EPSILON};
pub use maps::{InfluenceMaps, TickReport};
pub use metrics::{GridMetrics, InfluenceMetrics};
pub use systems::{AppliedVolumes, InfluenceSet, RefreshSemiStaticGrid, VolumeFootprint};

/// Installs the influence resources, events and per-frame systems.
///
/// A pre-inserted [`InfluenceConfigHandle`] is used as-is; otherwise the
/// configuration is loaded from the environment, falling back to the built-in
/// grids.
#[derive(Default)]
pub struct InfluencePlugin;

impl Plugin for InfluencePlugin {
    fn build(&self, app: &mut App) {
        let existing = app
            .world
            .get_resource::<InfluenceConfigHandle>()
            .map(InfluenceConfigHandle::get);
        let config = match existing {
            Some(config) => config,
            None => {
                let (config, metadata) = load_influence_config_from_env();
                app.insert_resource(InfluenceConfigHandle::new(config.clone()))
                    .insert_resource(metadata);
                config
            }
        };

        app.init_resource::<InfluenceConfigMetadata>()
            .insert_resource(InfluenceMaps::from_config(&config))
            .insert_resource(InfluenceMetrics::default())
            .insert_resource(AppliedVolumes::default())
            .insert_resource(InfluenceDebugSettings::from_env())
            .add_event::<RefreshSemiStaticGrid>()
            .configure_sets(
                Update,
                (
                    InfluenceSet::Evict,
                    InfluenceSet::Static,
                    InfluenceSet::Accumulate,
                    InfluenceSet::Report,
                )
                    .chain(),
            )
            .add_systems(
                Update,
                (
                    systems::evict_removed_emitters.in_set(InfluenceSet::Evict),
                    (
                        systems::sync_influence_volumes,
                        systems::refresh_semi_static_grids,
                    )
                        .chain()
                        .in_set(InfluenceSet::Static),
                    systems::accumulate_influence.in_set(InfluenceSet::Accumulate),
                    (metrics::collect_metrics, systems::report_debug_cells)
                        .chain()
                        .in_set(InfluenceSet::Report),
                ),
            );

        tracing::info!(
            target: "influence::systems",
            grids = config.grids.len(),
            profiles = config.emitter_profiles.len(),
            "influence.plugin_ready"
        );
    }
}

/// Build an app with the influence plugin and a manually driven clock.
///
/// No time plugin is installed; [`run_tick`] advances [`Time`] by an explicit
/// step so runs are reproducible.
pub fn build_headless_app() -> App {
    let mut app = App::new();
    app.init_resource::<Time>().add_plugins(InfluencePlugin);
    app
}

/// Like [`build_headless_app`] but with an explicit configuration.
pub fn build_headless_app_with_config(config: InfluenceConfig) -> App {
    let mut app = App::new();
    app.init_resource::<Time>()
        .insert_resource(InfluenceConfigHandle::new(std::sync::Arc::new(config)))
        .add_plugins(InfluencePlugin);
    app
}

/// Advance the clock by `step` and run one frame of the influence pipeline.
pub fn run_tick(app: &mut App, step: Duration) {
    app.world.resource_mut::<Time>().advance_by(step);
    app.update();
}
