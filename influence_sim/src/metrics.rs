use bevy::prelude::*;

use crate::maps::{InfluenceMaps, TickReport};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GridMetrics {
    pub occupied_cells: usize,
    pub entries: usize,
    pub pending_last_tick: usize,
    pub decayed_last_tick: usize,
}

#[derive(Resource, Default, Debug, Clone)]
pub struct InfluenceMetrics {
    pub tick: u64,
    pub grids: Vec<GridMetrics>,
}

impl InfluenceMetrics {
    pub fn grid(&self, index: usize) -> Option<&GridMetrics> {
        self.grids.get(index)
    }

    pub(crate) fn record_tick(&mut self, index: usize, report: TickReport) {
        if self.grids.len() <= index {
            self.grids.resize(index + 1, GridMetrics::default());
        }
        let grid = &mut self.grids[index];
        grid.pending_last_tick = report.pending;
        grid.decayed_last_tick = report.decayed_cells;
    }

    pub fn total_occupied_cells(&self) -> usize {
        self.grids.iter().map(|grid| grid.occupied_cells).sum()
    }
}

pub fn collect_metrics(maps: Res<InfluenceMaps>, mut metrics: ResMut<InfluenceMetrics>) {
    metrics.tick += 1;
    if metrics.grids.len() != maps.grid_count() {
        metrics
            .grids
            .resize(maps.grid_count(), GridMetrics::default());
    }

    for (grid, stats) in maps.grids().iter().zip(metrics.grids.iter_mut()) {
        stats.occupied_cells = grid.len();
        stats.entries = grid.entry_count();
    }

    tracing::trace!(
        target: "influence::metrics",
        tick = metrics.tick,
        occupied_cells = metrics.total_occupied_cells(),
        "influence.metrics.collected"
    );
}
