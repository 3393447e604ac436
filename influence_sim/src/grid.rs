//! Sparse multi-channel influence grid.
//!
//! Cells are created lazily on first contribution and removed as soon as their
//! last entry disappears, so the map only ever holds occupied cells. Propagation
//! and decay are amortized: each call handles a bounded slice of the occupied
//! cells and resumes from a cursor on the next call.

use bevy::math::{IVec3, Vec3};
use bevy::utils::HashMap;

use crate::{
    cell::{InfluenceCell, InfluenceEntry, InfluenceSource},
    collection::PendingInfluence,
    config::GridConfig,
    footprint::cells_within_radius,
};

/// Strengths at or below this are treated as gone.
pub const INFLUENCE_EPSILON: f32 = 1.0e-4;

/// Upper bound for a single source's accumulated strength in a batch merge.
pub const BATCH_STRENGTH_CAP: f32 = 1.0;

const NEIGHBORS_2D: [IVec3; 4] = [
    IVec3::new(1, 0, 0),
    IVec3::new(-1, 0, 0),
    IVec3::new(0, 1, 0),
    IVec3::new(0, -1, 0),
];

const NEIGHBORS_3D: [IVec3; 6] = [
    IVec3::new(1, 0, 0),
    IVec3::new(-1, 0, 0),
    IVec3::new(0, 1, 0),
    IVec3::new(0, -1, 0),
    IVec3::new(0, 0, 1),
    IVec3::new(0, 0, -1),
];

#[derive(Debug, Clone, Copy)]
struct Spread {
    channel: usize,
    source: InfluenceSource,
    strength: f32,
}

#[derive(Debug, Clone)]
pub struct SparseGrid {
    config: GridConfig,
    cells: HashMap<IVec3, InfluenceCell>,
    propagation_cursor: usize,
    decay_cursor: usize,
    decay_accumulator: f32,
}

impl SparseGrid {
    pub fn new(config: GridConfig) -> Self {
        Self {
            config,
            cells: HashMap::default(),
            propagation_cursor: 0,
            decay_cursor: 0,
            decay_accumulator: 0.0,
        }
    }

    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    /// Number of occupied cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn entry_count(&self) -> usize {
        self.cells.values().map(InfluenceCell::entry_count).sum()
    }

    pub fn cell(&self, coord: IVec3) -> Option<&InfluenceCell> {
        self.cells.get(&coord)
    }

    pub fn iter(&self) -> impl Iterator<Item = (IVec3, &InfluenceCell)> {
        self.cells.iter().map(|(coord, cell)| (*coord, cell))
    }

    /// Occupied coordinates in ascending `(x, y, z)` order.
    ///
    /// Maintenance cursors index into this sequence, so it must not depend on
    /// hash iteration order.
    pub fn occupied_coords(&self) -> Vec<IVec3> {
        let mut coords: Vec<IVec3> = self.cells.keys().copied().collect();
        coords.sort_unstable_by_key(|coord| (coord.x, coord.y, coord.z));
        coords
    }

    pub fn propagation_cursor(&self) -> usize {
        self.propagation_cursor
    }

    pub fn decay_cursor(&self) -> usize {
        self.decay_cursor
    }

    #[inline]
    pub fn world_to_grid(&self, position: Vec3) -> IVec3 {
        self.config.world_to_grid(position)
    }

    fn find_or_add_cell(&mut self, coord: IVec3) -> &mut InfluenceCell {
        let channel_count = self.config.channel_count;
        let cell = self.cells.entry(coord).or_default();
        cell.init(channel_count);
        cell
    }

    #[inline]
    fn check_channel(&self, channel: usize) {
        assert!(
            channel < self.config.channel_count,
            "influence channel {channel} out of range for grid `{}` ({} channels)",
            self.config.label,
            self.config.channel_count
        );
    }

    /// Record a source's current presence in a cell, replacing any earlier
    /// strength that source left in the same channel.
    pub fn add_influence(
        &mut self,
        coord: IVec3,
        channel: usize,
        strength: f32,
        source: InfluenceSource,
    ) {
        self.check_channel(channel);
        let entries = self.find_or_add_cell(coord).entries_mut(channel);
        match entries.iter_mut().find(|entry| entry.source == source) {
            Some(entry) => entry.strength = strength,
            None => entries.push(InfluenceEntry::new(source, strength)),
        }
    }

    /// Merge a tick's worth of contributions.
    ///
    /// Records for a source that already has an entry in the cell stack onto it,
    /// capped at [`BATCH_STRENGTH_CAP`]. The cap is per source; a cell's total
    /// across sources is never clamped.
    pub fn add_influence_batch(&mut self, batch: &[PendingInfluence]) {
        for pending in batch {
            self.check_channel(pending.channel);
            let entries = self
                .find_or_add_cell(pending.coord)
                .entries_mut(pending.channel);
            match entries
                .iter_mut()
                .find(|entry| entry.source == pending.source)
            {
                Some(entry) => {
                    entry.strength = (entry.strength + pending.strength).min(BATCH_STRENGTH_CAP);
                }
                None => entries.push(InfluenceEntry::new(pending.source, pending.strength)),
            }
        }
    }

    /// Drop every entry contributed by `source`. Returns the number of entries removed.
    pub fn remove_influence_by_source(&mut self, source: InfluenceSource) -> usize {
        let mut removed = 0;
        self.cells.retain(|_, cell| {
            for entries in cell.channels_mut() {
                let before = entries.len();
                entries.retain(|entry| entry.source != source);
                removed += before - entries.len();
            }
            !cell.is_empty()
        });
        removed
    }

    /// Write the static-volume contribution for a cell.
    ///
    /// A strength of exactly zero removes the static entry instead of storing it,
    /// and a cell is only created when there is a positive strength to store.
    pub fn set_cell_influence(&mut self, coord: IVec3, channel: usize, strength: f32) {
        self.check_channel(channel);

        if strength == 0.0 {
            if let Some(cell) = self.cells.get_mut(&coord) {
                cell.entries_mut(channel)
                    .retain(|entry| !entry.source.is_static());
                if cell.is_empty() {
                    self.cells.remove(&coord);
                }
            }
            return;
        }

        if let Some(entry) = self.cells.get_mut(&coord).and_then(|cell| {
            cell.entries_mut(channel)
                .iter_mut()
                .find(|entry| entry.source.is_static())
        }) {
            entry.strength = strength;
            return;
        }

        if strength > 0.0 {
            self.find_or_add_cell(coord)
                .entries_mut(channel)
                .push(InfluenceEntry::new(InfluenceSource::Static, strength));
        }
    }

    pub fn query_influence(&self, position: Vec3, channel: usize) -> f32 {
        self.check_channel(channel);
        self.cells
            .get(&self.world_to_grid(position))
            .map_or(0.0, |cell| cell.total_influence(channel))
    }

    /// Sum of every cell whose center lies within `radius` of `center`.
    ///
    /// Boundary cells are counted whole or not at all depending on where their
    /// center falls. A non-positive radius reads the single cell under `center`.
    pub fn query_influence_in_radius(&self, center: Vec3, radius: f32, channel: usize) -> f32 {
        self.check_channel(channel);
        if radius <= 0.0 {
            return self.query_influence(center, channel);
        }

        cells_within_radius(&self.config, center, radius)
            .filter_map(|(coord, _)| self.cells.get(&coord))
            .map(|cell| cell.total_influence(channel))
            .sum()
    }

    pub fn strongest_source(&self, position: Vec3, channel: usize) -> Option<InfluenceEntry> {
        self.check_channel(channel);
        self.cells
            .get(&self.world_to_grid(position))
            .and_then(|cell| cell.strongest_source(channel).copied())
    }

    /// Spread a fraction of each entry into the adjacent cells of up to
    /// `max_cells` occupied cells. Returns how many cells were processed.
    ///
    /// Spread amounts are staged before any cell is written, so a cell processed
    /// in this step always reads its pre-step entries. Origin entries are left
    /// untouched.
    pub fn propagate_step(&mut self, max_cells: usize) -> usize {
        let rate = self.config.propagation_rate;
        if self.cells.is_empty() || rate <= 0.0 {
            return 0;
        }

        let coords = self.occupied_coords();
        let total = coords.len();
        if self.propagation_cursor >= total {
            self.propagation_cursor = 0;
        }
        let start = self.propagation_cursor;
        let end = start.saturating_add(max_cells).min(total);

        let offsets: &[IVec3] = if self.config.is_2d {
            &NEIGHBORS_2D
        } else {
            &NEIGHBORS_3D
        };

        let mut staged: HashMap<IVec3, Vec<Spread>> = HashMap::default();
        for coord in &coords[start..end] {
            let Some(cell) = self.cells.get(coord) else {
                continue;
            };
            for (channel, entries) in cell.channels().enumerate() {
                for entry in entries {
                    let amount = entry.strength * rate;
                    if amount <= INFLUENCE_EPSILON {
                        continue;
                    }
                    for offset in offsets {
                        let bucket = staged.entry(*coord + *offset).or_default();
                        match bucket
                            .iter_mut()
                            .find(|spread| spread.channel == channel && spread.source == entry.source)
                        {
                            Some(spread) => spread.strength += amount,
                            None => bucket.push(Spread {
                                channel,
                                source: entry.source,
                                strength: amount,
                            }),
                        }
                    }
                }
            }
        }

        self.propagation_cursor = if end >= total { 0 } else { end };

        for (coord, spreads) in staged {
            let cell = self.find_or_add_cell(coord);
            for spread in spreads {
                let entries = cell.entries_mut(spread.channel);
                match entries
                    .iter_mut()
                    .find(|entry| entry.source == spread.source)
                {
                    Some(entry) => entry.strength += spread.strength,
                    None => entries.push(InfluenceEntry::new(spread.source, spread.strength)),
                }
            }
        }

        end - start
    }

    /// Subtract the decay rate from every entry of up to `max_cells` occupied
    /// cells, dropping spent entries and the cells they leave empty. Returns how
    /// many cells were processed.
    pub fn decay_step(&mut self, max_cells: usize) -> usize {
        let rate = self.config.decay_rate;
        if self.cells.is_empty() || rate <= 0.0 {
            return 0;
        }

        let coords = self.occupied_coords();
        let total = coords.len();
        if self.decay_cursor >= total {
            self.decay_cursor = 0;
        }
        let start = self.decay_cursor;
        let end = start.saturating_add(max_cells).min(total);

        let mut emptied = Vec::new();
        for coord in &coords[start..end] {
            let Some(cell) = self.cells.get_mut(coord) else {
                continue;
            };
            for entries in cell.channels_mut() {
                entries.retain_mut(|entry| {
                    entry.strength -= rate;
                    entry.strength > INFLUENCE_EPSILON
                });
            }
            if cell.is_empty() {
                emptied.push(*coord);
            }
        }

        self.decay_cursor = if end >= total { 0 } else { end };

        for coord in emptied {
            self.cells.remove(&coord);
        }

        end - start
    }

    /// Advance the decay clock, running one amortized decay pass each time the
    /// configured interval elapses. Returns the number of cells decayed.
    pub fn tick_decay(&mut self, delta_seconds: f32) -> usize {
        if self.config.decay_rate <= 0.0 {
            return 0;
        }

        self.decay_accumulator += delta_seconds;
        if self.decay_accumulator < self.config.decay_interval_seconds {
            return 0;
        }
        self.decay_accumulator = 0.0;

        self.decay_step(self.config.max_cells_per_step)
    }

    /// Full propagation and decay pass over every occupied cell, for grids whose
    /// maintenance is driven on demand. Returns `(propagated, decayed)` cell counts.
    ///
    /// Decay covers the cell count after propagation, so cells created by this
    /// pass's spread are decayed in the same call.
    pub fn update_semi_static(&mut self) -> (usize, usize) {
        let propagated = self.propagate_step(self.cells.len());
        let decayed = self.decay_step(self.cells.len());
        tracing::debug!(
            target: "influence::grid",
            grid = %self.config.label,
            propagated,
            decayed,
            cells = self.cells.len(),
            "influence.semi_static_pass"
        );
        (propagated, decayed)
    }

    pub fn clear(&mut self) {
        self.cells.clear();
        self.propagation_cursor = 0;
        self.decay_cursor = 0;
        self.decay_accumulator = 0.0;
    }
}
