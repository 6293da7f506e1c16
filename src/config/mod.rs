//! Configuration layer: built-in defaults, optionally overridden from RON.
//!
//! `ConfigPlugin` inserts a [`FarmViewConfig`] before anything else starts.
//! If `assets/config/farm_view.ron` exists it replaces the defaults; a
//! missing file is normal, a malformed one is logged and ignored.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::shared::*;

pub const CONFIG_PATH: &str = "assets/config/farm_view.ron";

/// Tunables for the farm view.
#[derive(Resource, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FarmViewConfig {
    /// Asset path of the Tiled map document.
    pub map_path: String,
    /// Base URL the garden-state endpoint hangs off.
    pub api_base: String,
    /// Fixed render scale of the scene root.
    pub scale: f32,
    pub flower_base_scale: f32,
    pub flower_jitter_min: f32,
    pub flower_jitter_max: f32,
}

impl Default for FarmViewConfig {
    fn default() -> Self {
        Self {
            map_path: DEFAULT_MAP_PATH.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            scale: DEFAULT_SCALE,
            flower_base_scale: BASE_FLOWER_SCALE,
            flower_jitter_min: FLOWER_JITTER_MIN,
            flower_jitter_max: FLOWER_JITTER_MAX,
        }
    }
}

impl FarmViewConfig {
    /// Parse a RON config body. Fields left out keep their defaults.
    pub fn from_ron(text: &str) -> Result<Self, ron::error::SpannedError> {
        let mut config: FarmViewConfig = ron::from_str(text)?;
        config.sanitize();
        Ok(config)
    }

    /// Reject values that would break the viewport or flower math.
    fn sanitize(&mut self) {
        let defaults = FarmViewConfig::default();
        if !(self.scale.is_finite() && self.scale > 0.0) {
            warn!("[Config] scale {} is not positive; using {}", self.scale, defaults.scale);
            self.scale = defaults.scale;
        }
        if !(self.flower_jitter_min.is_finite()
            && self.flower_jitter_max.is_finite()
            && self.flower_jitter_min < self.flower_jitter_max)
        {
            warn!(
                "[Config] flower jitter range {}..{} is empty; using defaults",
                self.flower_jitter_min, self.flower_jitter_max
            );
            self.flower_jitter_min = defaults.flower_jitter_min;
            self.flower_jitter_max = defaults.flower_jitter_max;
        }
    }

    pub fn garden_state_url(&self) -> String {
        format!("{}/mood/garden/state", self.api_base.trim_end_matches('/'))
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn read_config_file(path: &Path) -> Option<String> {
    std::fs::read_to_string(path).ok()
}

#[cfg(target_arch = "wasm32")]
fn read_config_file(_path: &Path) -> Option<String> {
    None
}

/// Load the config from `path`, falling back to defaults.
pub fn load_config(path: &Path) -> FarmViewConfig {
    let Some(text) = read_config_file(path) else {
        return FarmViewConfig::default();
    };
    match FarmViewConfig::from_ron(&text) {
        Ok(config) => {
            info!("[Config] loaded {}", path.display());
            config
        }
        Err(e) => {
            warn!("[Config] ignoring malformed {}: {}", path.display(), e);
            FarmViewConfig::default()
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// PLUGIN
// ═══════════════════════════════════════════════════════════════════════

pub struct ConfigPlugin {
    pub path: PathBuf,
}

impl Default for ConfigPlugin {
    fn default() -> Self {
        Self {
            path: PathBuf::from(CONFIG_PATH),
        }
    }
}

impl Plugin for ConfigPlugin {
    fn build(&self, app: &mut App) {
        if !app.world().contains_resource::<FarmViewConfig>() {
            app.insert_resource(load_config(&self.path));
        }
    }
}
