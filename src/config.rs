//! Runtime configuration.
//!
//! Every field has a default, so an absent or partial TOML file is valid.
//! Optimization size thresholds are constants in
//! [`crate::storage::scanner`] and deliberately not configurable.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{LabError, LabResult};

/// Recompression parameters of the optimization pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizeSettings {
    /// JPEG quality, 1-100.
    pub jpeg_quality: u8,
    /// Longest edge after downscaling; 0 keeps the original size.
    pub max_dimension: u32,
}

impl Default for OptimizeSettings {
    fn default() -> Self {
        Self {
            jpeg_quality: 80,
            max_dimension: 1920,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabConfig {
    /// Root of the directory-backed stores.
    pub store_dir: PathBuf,
    /// Pause after an optimization pass before the rescan.
    pub settle_delay_ms: u64,
    /// Minimum time between two autosaves of a dirty project.
    pub autosave_debounce_ms: u64,
    /// Default tracing filter when RUST_LOG is unset.
    pub log_filter: String,
    pub optimize: OptimizeSettings,
}

impl Default for LabConfig {
    fn default() -> Self {
        Self {
            store_dir: PathBuf::from("idealab-data"),
            settle_delay_ms: 500,
            autosave_debounce_ms: 1000,
            log_filter: "info".to_string(),
            optimize: OptimizeSettings::default(),
        }
    }
}

impl LabConfig {
    /// Parses a TOML document.
    pub fn from_toml(content: &str) -> LabResult<Self> {
        let config: LabConfig =
            toml::from_str(content).map_err(|e| LabError::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a TOML file.
    pub fn load(path: &Path) -> LabResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| LabError::config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_toml(&content)
    }

    pub fn validate(&self) -> LabResult<()> {
        if !(1..=100).contains(&self.optimize.jpeg_quality) {
            return Err(LabError::config(format!(
                "optimize.jpeg_quality must be 1-100, got {}",
                self.optimize.jpeg_quality
            )));
        }
        Ok(())
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn autosave_debounce(&self) -> Duration {
        Duration::from_millis(self.autosave_debounce_ms)
    }
}
