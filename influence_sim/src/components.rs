use bevy::prelude::*;
use serde::Deserialize;

/// Base strength a source writes into one channel.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ChannelStrength {
    pub channel: usize,
    pub strength: f32,
}

/// Marks an entity as a live influence source on one grid.
///
/// Its `Transform` translation is sampled every tick. Removing the component or
/// despawning the entity evicts its entries from every grid.
#[derive(Component, Debug, Clone, PartialEq)]
pub struct InfluenceEmitter {
    pub grid: usize,
    pub channels: Vec<ChannelStrength>,
    /// Falloff radius in world units. Zero writes only the entity's own cell.
    pub radius: f32,
}

impl InfluenceEmitter {
    pub fn point(grid: usize, channel: usize, strength: f32) -> Self {
        Self {
            grid,
            channels: vec![ChannelStrength { channel, strength }],
            radius: 0.0,
        }
    }

    pub fn with_radius(mut self, radius: f32) -> Self {
        self.radius = radius;
        self
    }

    pub fn with_channel(mut self, channel: usize, strength: f32) -> Self {
        self.channels.push(ChannelStrength { channel, strength });
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VolumeShape {
    Box { half_extents: Vec3 },
    Sphere { radius: f32 },
}

impl Default for VolumeShape {
    fn default() -> Self {
        VolumeShape::Box {
            half_extents: Vec3::splat(500.0),
        }
    }
}

/// A shape positioned in world space whose covered cells receive static influence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StaticRegion {
    pub center: Vec3,
    pub shape: VolumeShape,
}

/// Static influence painted into every cell a shape covers while the entity exists.
#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct InfluenceVolume {
    pub grid: usize,
    pub channel: usize,
    pub strength: f32,
    pub shape: VolumeShape,
}

impl Default for InfluenceVolume {
    fn default() -> Self {
        Self {
            grid: 0,
            channel: 0,
            strength: 1.0,
            shape: VolumeShape::default(),
        }
    }
}

impl InfluenceVolume {
    pub fn region(&self, center: Vec3) -> StaticRegion {
        StaticRegion {
            center,
            shape: self.shape,
        }
    }
}
