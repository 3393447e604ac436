//! World-owned collection of influence grids.
//!
//! Grids are built once from configuration and addressed by their position in
//! the configured list for the lifetime of the resource. Every operation checks
//! the grid index first; a bad index is a caller bug and panics.

use bevy::math::{IVec3, Vec3};
use bevy::prelude::Resource;

use crate::{
    cell::{InfluenceEntry, InfluenceSource},
    collection::{collect_pending, Contribution},
    components::{StaticRegion, VolumeShape},
    config::InfluenceConfig,
    footprint::{cells_in_box, cells_within_radius},
    grid::SparseGrid,
};

/// Outcome of feeding one tick of contributions into a grid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub pending: usize,
    pub decayed_cells: usize,
}

#[derive(Resource, Debug, Clone, Default)]
pub struct InfluenceMaps {
    grids: Vec<SparseGrid>,
}

impl InfluenceMaps {
    pub fn from_config(config: &InfluenceConfig) -> Self {
        let grids = config
            .grids
            .iter()
            .map(|grid| {
                assert!(
                    grid.channel_count >= 1,
                    "influence grid `{}` needs at least one channel",
                    grid.label
                );
                SparseGrid::new(grid.clone())
            })
            .collect();
        Self { grids }
    }

    pub fn grid_count(&self) -> usize {
        self.grids.len()
    }

    pub fn grids(&self) -> &[SparseGrid] {
        &self.grids
    }

    pub fn grid(&self, index: usize) -> &SparseGrid {
        self.check_grid(index);
        &self.grids[index]
    }

    pub fn grid_mut(&mut self, index: usize) -> &mut SparseGrid {
        self.check_grid(index);
        &mut self.grids[index]
    }

    #[inline]
    fn check_grid(&self, index: usize) {
        assert!(
            index < self.grids.len(),
            "influence grid index {index} out of range ({} grids configured)",
            self.grids.len()
        );
    }

    pub fn add_influence(
        &mut self,
        grid: usize,
        position: Vec3,
        channel: usize,
        strength: f32,
        source: InfluenceSource,
    ) {
        let grid = self.grid_mut(grid);
        let coord = grid.world_to_grid(position);
        grid.add_influence(coord, channel, strength, source);
    }

    pub fn remove_influence_by_source(&mut self, grid: usize, source: InfluenceSource) -> usize {
        self.grid_mut(grid).remove_influence_by_source(source)
    }

    /// Evict a source from every grid. Returns the number of entries removed.
    pub fn remove_source_everywhere(&mut self, source: InfluenceSource) -> usize {
        self.grids
            .iter_mut()
            .map(|grid| grid.remove_influence_by_source(source))
            .sum()
    }

    pub fn query_influence(&self, grid: usize, position: Vec3, channel: usize) -> f32 {
        self.grid(grid).query_influence(position, channel)
    }

    pub fn query_influence_in_radius(
        &self,
        grid: usize,
        center: Vec3,
        radius: f32,
        channel: usize,
    ) -> f32 {
        self.grid(grid)
            .query_influence_in_radius(center, radius, channel)
    }

    pub fn strongest_source(
        &self,
        grid: usize,
        position: Vec3,
        channel: usize,
    ) -> Option<InfluenceEntry> {
        self.grid(grid).strongest_source(position, channel)
    }

    pub fn set_cell_influence(&mut self, grid: usize, coord: IVec3, channel: usize, strength: f32) {
        self.grid_mut(grid).set_cell_influence(coord, channel, strength);
    }

    /// Run the on-demand full maintenance pass. Grids that are maintained every
    /// tick ignore the request and report `None`.
    pub fn update_semi_static_grid(&mut self, grid: usize) -> Option<(usize, usize)> {
        let grid = self.grid_mut(grid);
        if !grid.config().semi_static {
            return None;
        }
        Some(grid.update_semi_static())
    }

    /// Collect, merge, and decay one tick of contributions for a grid.
    ///
    /// Collection reads only the grid's configuration and runs in parallel; the
    /// merge happens afterwards in a single batch. Semi-static grids skip the
    /// decay clock.
    pub fn apply_contributions(
        &mut self,
        grid: usize,
        contributions: &[Contribution<'_>],
        delta_seconds: f32,
    ) -> TickReport {
        let grid = self.grid_mut(grid);
        let pending = collect_pending(grid.config(), contributions);
        grid.add_influence_batch(&pending);

        let decayed_cells = if grid.config().semi_static {
            0
        } else {
            grid.tick_decay(delta_seconds)
        };

        TickReport {
            pending: pending.len(),
            decayed_cells,
        }
    }

    /// Paint static influence into every cell a region covers and return the
    /// covered cells so the caller can clear them later.
    pub fn apply_static_region(
        &mut self,
        grid: usize,
        region: &StaticRegion,
        channel: usize,
        strength: f32,
    ) -> Vec<IVec3> {
        let grid = self.grid_mut(grid);
        let config = grid.config();
        let cells: Vec<IVec3> = match region.shape {
            VolumeShape::Box { half_extents } => cells_in_box(
                config,
                region.center - half_extents,
                region.center + half_extents,
            )
            .collect(),
            VolumeShape::Sphere { radius } => cells_within_radius(config, region.center, radius)
                .map(|(coord, _)| coord)
                .collect(),
        };

        for coord in &cells {
            grid.set_cell_influence(*coord, channel, strength);
        }
        cells
    }

    /// Remove the static entries previously written to `cells`.
    pub fn clear_static_footprint(&mut self, grid: usize, channel: usize, cells: &[IVec3]) {
        let grid = self.grid_mut(grid);
        for coord in cells {
            grid.set_cell_influence(*coord, channel, 0.0);
        }
    }

    pub fn clear(&mut self) {
        for grid in &mut self.grids {
            grid.clear();
        }
    }
}
