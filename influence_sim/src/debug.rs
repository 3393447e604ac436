//! Optional side channel for visualising grid contents.
//!
//! Nothing in the engine depends on this; an overlay or logger registers an
//! [`InfluenceDebugObserver`] and flips [`InfluenceDebugSettings::enabled`].

use std::{env, fmt, sync::Arc};

use bevy::math::{IVec3, Vec3};
use bevy::prelude::Resource;

use crate::grid::SparseGrid;

pub const DEBUG_DRAW_ENV: &str = "INFLUENCE_DEBUG_DRAW";

/// One occupied cell as reported to an observer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DebugCell {
    pub grid: usize,
    pub coord: IVec3,
    pub center: Vec3,
    /// Sum over every channel and source.
    pub total_strength: f32,
    /// `total_strength` clamped to `[0, 1]`, suitable for colour ramps.
    pub intensity: f32,
}

#[derive(Resource, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InfluenceDebugSettings {
    pub enabled: bool,
}

impl InfluenceDebugSettings {
    /// Reads `INFLUENCE_DEBUG_DRAW`; `1`, `true`, and `on` enable reporting.
    pub fn from_env() -> Self {
        let enabled = env::var(DEBUG_DRAW_ENV)
            .map(|value| parse_toggle(&value))
            .unwrap_or(false);
        Self { enabled }
    }
}

fn parse_toggle(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "on"
    )
}

/// Callback invoked once per occupied cell each frame while debug reporting is enabled.
#[derive(Resource, Clone)]
pub struct InfluenceDebugObserver(Arc<dyn Fn(&DebugCell) + Send + Sync>);

impl InfluenceDebugObserver {
    pub fn new(callback: impl Fn(&DebugCell) + Send + Sync + 'static) -> Self {
        Self(Arc::new(callback))
    }

    pub fn notify(&self, cell: &DebugCell) {
        (self.0)(cell);
    }
}

impl fmt::Debug for InfluenceDebugObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("InfluenceDebugObserver(..)")
    }
}

/// Occupied cells of a grid in ascending coordinate order. Flat grids report
/// their cells at z = 0.
pub fn debug_cells(grid_index: usize, grid: &SparseGrid) -> Vec<DebugCell> {
    let config = grid.config();
    grid.occupied_coords()
        .into_iter()
        .filter_map(|coord| {
            let cell = grid.cell(coord)?;
            let total_strength = cell.combined_influence();
            Some(DebugCell {
                grid: grid_index,
                coord,
                center: config.cell_center(coord, 0.0),
                total_strength,
                intensity: total_strength.clamp(0.0, 1.0),
            })
        })
        .collect()
}
