//! Cell enumeration and falloff math shared by queries, contribution collection,
//! and static volumes.
//!
//! Every routine here decides membership by cell center: a cell counts as inside a
//! radius when its center does, never by partial overlap.

use bevy::math::{IVec3, Vec3};

use crate::config::GridConfig;

/// Every cell coordinate in the bounding box spanned by two world positions.
/// Flat grids collapse the box to the z = 0 layer.
pub fn cells_in_box(config: &GridConfig, min: Vec3, max: Vec3) -> impl Iterator<Item = IVec3> {
    let lo = config.world_to_grid(min);
    let hi = config.world_to_grid(max);
    let (z_lo, z_hi) = if config.is_2d { (0, 0) } else { (lo.z, hi.z) };

    (lo.x..=hi.x).flat_map(move |x| {
        (lo.y..=hi.y).flat_map(move |y| (z_lo..=z_hi).map(move |z| IVec3::new(x, y, z)))
    })
}

/// Cells whose center lies within `radius` of `center`, paired with the squared
/// distance to that center.
pub fn cells_within_radius(
    config: &GridConfig,
    center: Vec3,
    radius: f32,
) -> impl Iterator<Item = (IVec3, f32)> + '_ {
    let radius_sq = radius * radius;
    let extent = Vec3::splat(radius.max(0.0));

    cells_in_box(config, center - extent, center + extent).filter_map(move |coord| {
        let distance_sq = config
            .cell_center(coord, center.z)
            .distance_squared(center);
        (distance_sq <= radius_sq).then_some((coord, distance_sq))
    })
}

/// Linear falloff from full strength at the source to zero at `radius`.
#[inline]
pub fn linear_falloff(distance: f32, radius: f32) -> f32 {
    if radius <= 0.0 {
        return 1.0;
    }
    (1.0 - distance / radius).max(0.0)
}
