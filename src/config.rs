//! Simulator configuration.
//!
//! Loaded from a JSON file; every field is optional and falls back to its
//! default.
//!
//! ```json
//! { "memory_size": 64, "step_interval_ms": 800, "speed": 2.0, "log_filter": "debug" }
//! ```

use std::path::Path;
use std::time::Duration;
use serde::{Serialize, Deserialize};
use thiserror::Error;
use crate::cpu::memory::{DEFAULT_MEMORY_SIZE, MAX_MEMORY_CELLS};

/// Slowest allowed playback multiplier.
pub const MIN_SPEED: f64 = 0.25;
/// Fastest allowed playback multiplier.
pub const MAX_SPEED: f64 = 8.0;

/// Simulator settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Initial number of memory cells.
    pub memory_size: usize,
    /// Delay between steps during playback at 1x speed.
    pub step_interval_ms: u64,
    /// Playback speed multiplier.
    pub speed: f64,
    /// Default `tracing` filter when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            memory_size: DEFAULT_MEMORY_SIZE,
            step_interval_ms: 800,
            speed: 1.0,
            log_filter: "warn".to_string(),
        }
    }
}

impl SimConfig {
    /// Load and validate a config file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_json(&text)
    }

    /// Parse and validate config JSON.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: SimConfig = serde_json::from_str(text)
            .map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check ranges. Speed outside the allowed range is an error here;
    /// [`SimConfig::set_speed`] clamps instead.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.memory_size == 0 || self.memory_size > MAX_MEMORY_CELLS {
            return Err(ConfigError::Invalid(format!(
                "memory_size must be between 1 and {}, got {}",
                MAX_MEMORY_CELLS, self.memory_size
            )));
        }
        if !(MIN_SPEED..=MAX_SPEED).contains(&self.speed) {
            return Err(ConfigError::Invalid(format!(
                "speed must be between {} and {}, got {}",
                MIN_SPEED, MAX_SPEED, self.speed
            )));
        }
        Ok(())
    }

    /// Set the playback speed, clamped to the allowed range.
    pub fn set_speed(&mut self, speed: f64) {
        self.speed = if speed.is_nan() { 1.0 } else { speed.clamp(MIN_SPEED, MAX_SPEED) };
    }

    /// Delay between steps at the current speed.
    pub fn effective_interval(&self) -> Duration {
        Duration::from_millis((self.step_interval_ms as f64 / self.speed).round() as u64)
    }
}

/// Errors that can occur while loading configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}
