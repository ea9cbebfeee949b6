//! Engine configuration: frame rate, drift tolerance, tick limits.
//!
//! Loaded from TOML; every field has a default so a partial file (or none at
//! all) yields a working engine.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::Rational;

/// Top-level playback engine configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Nominal frame rate used for frame stepping and the drift threshold.
    pub fps: Rational,
    /// Drift tolerated before a media handle is force-seeked, in frames.
    pub drift_threshold_frames: f64,
    /// While reversing, handles are re-seeked once they differ by more than this.
    pub reverse_seek_epsilon_ms: f64,
    /// Optional upper bound on a single tick's delta. Unset means ticks use
    /// the full elapsed time, however slow the host repaints.
    pub max_tick_delta_ms: Option<f64>,
    pub initial_speed: f64,
    pub initial_looping: bool,
    /// Whether newly registered mesh clocks wrap at their boundaries.
    pub mesh_looping: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fps: Rational::FPS_30,
            drift_threshold_frames: 1.0,
            reverse_seek_epsilon_ms: 0.5,
            max_tick_delta_ms: None,
            initial_speed: 1.0,
            initial_looping: false,
            mesh_looping: true,
        }
    }
}

impl EngineConfig {
    /// Load and validate a TOML config file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate config from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Drift threshold in milliseconds (`drift_threshold_frames` native frames).
    pub fn drift_threshold_ms(&self) -> f64 {
        self.drift_threshold_frames * self.fps.frame_interval_ms()
    }

    pub fn frame_interval_ms(&self) -> f64 {
        self.fps.frame_interval_ms()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fps.num == 0 || self.fps.den == 0 {
            return Err(ConfigError::Invalid {
                field: "fps",
                reason: format!("{} is not a positive frame rate", self.fps),
            });
        }
        check_non_negative("drift_threshold_frames", self.drift_threshold_frames)?;
        check_non_negative("reverse_seek_epsilon_ms", self.reverse_seek_epsilon_ms)?;
        if let Some(cap) = self.max_tick_delta_ms {
            if !(cap.is_finite() && cap > 0.0) {
                return Err(ConfigError::Invalid {
                    field: "max_tick_delta_ms",
                    reason: format!("{cap} must be a positive number"),
                });
            }
        }
        if !self.initial_speed.is_finite() || self.initial_speed == 0.0 {
            return Err(ConfigError::Invalid {
                field: "initial_speed",
                reason: format!("{} must be finite and non-zero", self.initial_speed),
            });
        }
        Ok(())
    }
}

fn check_non_negative(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            field,
            reason: format!("{value} must be a finite, non-negative number"),
        })
    }
}
