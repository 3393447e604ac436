//! Per-tick contribution collection.
//!
//! Collection turns the current set of sources into [`PendingInfluence`] records
//! without touching any grid, which is what lets it fan out across threads. The
//! records are merged afterwards in one exclusive batch.

use bevy::math::{IVec3, Vec3};
use rayon::prelude::*;

use crate::{
    cell::InfluenceSource,
    components::ChannelStrength,
    config::GridConfig,
    footprint::{cells_within_radius, linear_falloff},
};

/// A single contribution waiting to be merged into a grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingInfluence {
    pub coord: IVec3,
    pub channel: usize,
    pub strength: f32,
    pub source: InfluenceSource,
}

/// One source's presence for the current tick.
#[derive(Debug, Clone, Copy)]
pub struct Contribution<'a> {
    pub source: InfluenceSource,
    pub position: Vec3,
    pub channels: &'a [ChannelStrength],
    /// Zero (or less) contributes to the source's own cell only.
    pub radius: f32,
}

/// Expand one contribution into pending records, appending them to `out`.
pub fn collect_contribution(
    config: &GridConfig,
    contribution: &Contribution<'_>,
    out: &mut Vec<PendingInfluence>,
) {
    let radius = contribution.radius;
    for entry in contribution.channels {
        assert!(
            entry.channel < config.channel_count,
            "influence channel {} out of range for grid `{}` ({} channels)",
            entry.channel,
            config.label,
            config.channel_count
        );

        if radius <= 0.0 {
            out.push(PendingInfluence {
                coord: config.world_to_grid(contribution.position),
                channel: entry.channel,
                strength: entry.strength,
                source: contribution.source,
            });
            continue;
        }

        out.extend(
            cells_within_radius(config, contribution.position, radius).map(
                |(coord, distance_sq)| PendingInfluence {
                    coord,
                    channel: entry.channel,
                    strength: entry.strength * linear_falloff(distance_sq.sqrt(), radius),
                    source: contribution.source,
                },
            ),
        );
    }
}

/// Collect every contribution in parallel. Output order follows input order, so
/// identical inputs always produce identical batches.
pub fn collect_pending(
    config: &GridConfig,
    contributions: &[Contribution<'_>],
) -> Vec<PendingInfluence> {
    contributions
        .par_iter()
        .flat_map_iter(|contribution| {
            let mut pending = Vec::new();
            collect_contribution(config, contribution, &mut pending);
            pending
        })
        .collect()
}
