#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Once;
use std::time::Duration;

use bevy::prelude::*;
use influence_sim::{build_headless_app, InfluenceConfig, InfluenceEmitter};

pub const STEP: Duration = Duration::from_millis(100);

static INIT: Once = Once::new();

pub fn fixture_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("test_influence_config.json")
}

pub fn ensure_test_config() {
    INIT.call_once(|| {
        let config_path = fixture_path();

        debug_assert!(
            config_path.exists(),
            "missing test influence config at {}",
            config_path.display()
        );

        std::env::set_var("INFLUENCE_CONFIG_PATH", &config_path);
    });
}

pub fn fixture_config() -> anyhow::Result<InfluenceConfig> {
    let raw = std::fs::read_to_string(fixture_path())?;
    let value: serde_json::Value = serde_json::from_str(&raw)?;
    anyhow::ensure!(value.get("grids").is_some(), "fixture has no grids");
    Ok(InfluenceConfig::from_json_str(&raw)?)
}

pub fn test_app() -> App {
    ensure_test_config();
    build_headless_app()
}

pub fn spawn_profile(app: &mut App, profile: &str, position: Vec3) -> Entity {
    let emitter: InfluenceEmitter = {
        let config = app
            .world
            .resource::<influence_sim::InfluenceConfigHandle>()
            .get();
        config
            .emitter_profile(profile)
            .unwrap_or_else(|| panic!("fixture profile `{profile}` missing"))
            .to_emitter()
    };
    app.world
        .spawn((Transform::from_translation(position), emitter))
        .id()
}
