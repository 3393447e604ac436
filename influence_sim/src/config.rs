//! Configuration for the influence map grids.
//!
//! Loaded from `influence_config.json` with support for environment variable overrides.
//! The order of `grids` is significant: a grid's position in the list is the stable
//! handle every other API uses to address it.

use std::{
    collections::HashMap,
    env, fs, io,
    path::{Path, PathBuf},
    sync::Arc,
};

use bevy::math::{IVec3, Vec3};
use bevy::prelude::Resource;
use serde::Deserialize;
use thiserror::Error;

use crate::components::{ChannelStrength, InfluenceEmitter};

pub const BUILTIN_INFLUENCE_CONFIG: &str = include_str!("data/influence_config.json");

/// Root configuration for every influence grid owned by the simulation.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InfluenceConfig {
    pub grids: Vec<GridConfig>,
    pub emitter_profiles: HashMap<String, EmitterProfile>,
}

impl Default for InfluenceConfig {
    fn default() -> Self {
        Self {
            grids: vec![GridConfig::default()],
            emitter_profiles: HashMap::new(),
        }
    }
}

impl InfluenceConfig {
    pub fn builtin() -> Arc<Self> {
        Arc::new(
            InfluenceConfig::from_json_str(BUILTIN_INFLUENCE_CONFIG)
                .expect("builtin influence config should parse"),
        )
    }

    pub fn from_json_str(json: &str) -> Result<Self, InfluenceConfigError> {
        let config: InfluenceConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, InfluenceConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| InfluenceConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        InfluenceConfig::from_json_str(&contents)
    }

    /// Check every grid and profile against the documented ranges.
    pub fn validate(&self) -> Result<(), InfluenceConfigError> {
        for (index, grid) in self.grids.iter().enumerate() {
            grid.validate()
                .map_err(|reason| InfluenceConfigError::InvalidGrid { index, reason })?;
        }

        for (name, profile) in &self.emitter_profiles {
            let Some(grid) = self.grids.get(profile.grid) else {
                return Err(InfluenceConfigError::InvalidProfile {
                    name: name.clone(),
                    reason: format!(
                        "grid index {} out of range ({} grids configured)",
                        profile.grid,
                        self.grids.len()
                    ),
                });
            };
            if let Some(bad) = profile
                .channels
                .iter()
                .find(|entry| entry.channel >= grid.channel_count)
            {
                return Err(InfluenceConfigError::InvalidProfile {
                    name: name.clone(),
                    reason: format!(
                        "channel {} out of range for grid {} ({} channels)",
                        bad.channel, profile.grid, grid.channel_count
                    ),
                });
            }
        }

        Ok(())
    }

    pub fn grid(&self, index: usize) -> Option<&GridConfig> {
        self.grids.get(index)
    }

    pub fn emitter_profile(&self, name: &str) -> Option<&EmitterProfile> {
        self.emitter_profiles.get(name)
    }
}

/// Immutable settings for a single sparse influence grid.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub label: String,
    pub cell_size: f32,
    pub channel_count: usize,
    pub propagation_rate: f32,
    pub decay_rate: f32,
    /// Seconds between decay passes. Zero decays on every tick.
    pub decay_interval_seconds: f32,
    pub max_cells_per_step: usize,
    pub is_2d: bool,
    pub semi_static: bool,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            label: "default".to_string(),
            cell_size: 1000.0,
            channel_count: 1,
            propagation_rate: 0.1,
            decay_rate: 0.05,
            decay_interval_seconds: 0.5,
            max_cells_per_step: 64,
            is_2d: true,
            semi_static: false,
        }
    }
}

impl GridConfig {
    fn validate(&self) -> Result<(), String> {
        if self.cell_size.is_nan() || self.cell_size <= 0.0 || self.cell_size.is_infinite() {
            return Err(format!("cell_size must be positive, got {}", self.cell_size));
        }
        if self.channel_count == 0 {
            return Err("channel_count must be at least 1".to_string());
        }
        if !(0.0..=1.0).contains(&self.propagation_rate) {
            return Err(format!(
                "propagation_rate must be within [0, 1], got {}",
                self.propagation_rate
            ));
        }
        if !(0.0..=1.0).contains(&self.decay_rate) {
            return Err(format!(
                "decay_rate must be within [0, 1], got {}",
                self.decay_rate
            ));
        }
        if self.decay_interval_seconds.is_nan() || self.decay_interval_seconds < 0.0 {
            return Err(format!(
                "decay_interval_seconds must be non-negative, got {}",
                self.decay_interval_seconds
            ));
        }
        if self.max_cells_per_step == 0 {
            return Err("max_cells_per_step must be at least 1".to_string());
        }
        Ok(())
    }

    /// Map a world position to the coordinate of the cell containing it.
    #[inline]
    pub fn world_to_grid(&self, position: Vec3) -> IVec3 {
        let inv_cell = 1.0 / self.cell_size;
        IVec3::new(
            (position.x * inv_cell).floor() as i32,
            (position.y * inv_cell).floor() as i32,
            if self.is_2d {
                0
            } else {
                (position.z * inv_cell).floor() as i32
            },
        )
    }

    /// World-space center of a cell. Flat grids have no vertical extent, so the
    /// caller's reference height is used for z.
    #[inline]
    pub fn cell_center(&self, coord: IVec3, reference_z: f32) -> Vec3 {
        let half = self.cell_size * 0.5;
        Vec3::new(
            coord.x as f32 * self.cell_size + half,
            coord.y as f32 * self.cell_size + half,
            if self.is_2d {
                reference_z
            } else {
                coord.z as f32 * self.cell_size + half
            },
        )
    }
}

/// Named emitter preset: which grid a source writes to and how strongly.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EmitterProfile {
    pub grid: usize,
    pub channels: Vec<ChannelStrength>,
    pub radius: f32,
}

impl Default for EmitterProfile {
    fn default() -> Self {
        Self {
            grid: 0,
            channels: vec![ChannelStrength {
                channel: 0,
                strength: 1.0,
            }],
            radius: 0.0,
        }
    }
}

impl EmitterProfile {
    pub fn to_emitter(&self) -> InfluenceEmitter {
        InfluenceEmitter {
            grid: self.grid,
            channels: self.channels.clone(),
            radius: self.radius,
        }
    }
}

#[derive(Debug, Error)]
pub enum InfluenceConfigError {
    #[error("failed to parse influence config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read influence config from {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid influence grid {index}: {reason}")]
    InvalidGrid { index: usize, reason: String },
    #[error("invalid emitter profile `{name}`: {reason}")]
    InvalidProfile { name: String, reason: String },
}

/// Handle for accessing the influence configuration.
#[derive(Resource, Debug, Clone)]
pub struct InfluenceConfigHandle(pub Arc<InfluenceConfig>);

impl InfluenceConfigHandle {
    pub fn new(config: Arc<InfluenceConfig>) -> Self {
        Self(config)
    }

    pub fn get(&self) -> Arc<InfluenceConfig> {
        Arc::clone(&self.0)
    }
}

/// Metadata about the influence configuration source.
#[derive(Resource, Debug, Clone, Default)]
pub struct InfluenceConfigMetadata {
    path: Option<PathBuf>,
}

impl InfluenceConfigMetadata {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    pub fn path(&self) -> Option<&PathBuf> {
        self.path.as_ref()
    }
}

/// Load influence configuration from environment or default path.
pub fn load_influence_config_from_env() -> (Arc<InfluenceConfig>, InfluenceConfigMetadata) {
    let override_path = env::var("INFLUENCE_CONFIG_PATH").ok().map(PathBuf::from);
    let path = override_path.unwrap_or_else(|| {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("src/data/influence_config.json")
    });

    match InfluenceConfig::from_file(&path) {
        Ok(config) => {
            tracing::info!(
                target: "influence::config",
                path = %path.display(),
                grids = config.grids.len(),
                "influence_config.loaded=file"
            );
            return (Arc::new(config), InfluenceConfigMetadata::new(Some(path)));
        }
        Err(err) => {
            tracing::warn!(
                target: "influence::config",
                path = %path.display(),
                error = %err,
                "influence_config.load_failed"
            );
        }
    }

    let config = InfluenceConfig::builtin();
    tracing::info!(
        target: "influence::config",
        grids = config.grids.len(),
        "influence_config.loaded=builtin"
    );
    (config, InfluenceConfigMetadata::new(None))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_config_parses() {
        let config = InfluenceConfig::builtin();
        assert!(!config.grids.is_empty());
        assert!(config.emitter_profile("Patrol").is_some());
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config = InfluenceConfig::from_json_str(r#"{ "grids": [ { "cell_size": 250.0 } ] }"#)
            .expect("partial grid config should parse");
        let grid = &config.grids[0];
        assert_eq!(grid.cell_size, 250.0);
        assert_eq!(grid.channel_count, 1);
        assert_eq!(grid.max_cells_per_step, 64);
        assert!(grid.is_2d);
        assert!(!grid.semi_static);
    }

    #[test]
    fn rejects_out_of_range_grid_settings() {
        let err = InfluenceConfig::from_json_str(r#"{ "grids": [ {}, { "decay_rate": 1.5 } ] }"#)
            .unwrap_err();
        match err {
            InfluenceConfigError::InvalidGrid { index, .. } => assert_eq!(index, 1),
            other => panic!("unexpected error: {other}"),
        }

        let err = InfluenceConfig::from_json_str(r#"{ "grids": [ { "channel_count": 0 } ] }"#)
            .unwrap_err();
        assert!(matches!(err, InfluenceConfigError::InvalidGrid { index: 0, .. }));

        let err = InfluenceConfig::from_json_str(r#"{ "grids": [ { "cell_size": 0.0 } ] }"#)
            .unwrap_err();
        assert!(matches!(err, InfluenceConfigError::InvalidGrid { index: 0, .. }));
    }

    #[test]
    fn rejects_profiles_pointing_at_missing_channels() {
        let json = r#"{
            "grids": [ { "channel_count": 2 } ],
            "emitter_profiles": {
                "Broken": { "grid": 0, "channels": [ { "channel": 2, "strength": 1.0 } ] }
            }
        }"#;
        let err = InfluenceConfig::from_json_str(json).unwrap_err();
        assert!(matches!(err, InfluenceConfigError::InvalidProfile { .. }));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = InfluenceConfig::from_file(Path::new("/nonexistent/influence.json")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/influence.json"));
    }

    #[test]
    fn world_to_grid_floors_each_axis() {
        let grid = GridConfig {
            cell_size: 100.0,
            is_2d: false,
            ..GridConfig::default()
        };
        assert_eq!(grid.world_to_grid(Vec3::new(50.0, 150.0, 250.0)), IVec3::new(0, 1, 2));
        assert_eq!(grid.world_to_grid(Vec3::new(-1.0, -100.0, -101.0)), IVec3::new(-1, -1, -2));
        assert_eq!(
            grid.world_to_grid(Vec3::new(10.0, 10.0, 10.0)),
            grid.world_to_grid(Vec3::new(99.0, 99.9, 0.1))
        );
    }

    #[test]
    fn flat_grids_ignore_height() {
        let grid = GridConfig {
            cell_size: 100.0,
            ..GridConfig::default()
        };
        assert_eq!(grid.world_to_grid(Vec3::new(50.0, 50.0, 9000.0)).z, 0);
        assert_eq!(grid.world_to_grid(Vec3::new(50.0, 50.0, -9000.0)).z, 0);
        assert_eq!(grid.cell_center(IVec3::new(1, 2, 0), 42.0), Vec3::new(150.0, 250.0, 42.0));
    }
}
