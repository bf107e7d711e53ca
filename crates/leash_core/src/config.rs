//! Leash configuration
//!
//! Loaded from TOML, e.g.
//!
//! ```toml
//! max_animation_duration_ms = 10000
//! animation_scale = 1.0
//! target_fps = 120
//! max_surfaces = 4096
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Platform ceiling for a single leash animation
pub const MAX_ANIMATION_DURATION_MS: u64 = 10_000;

/// Configuration shared by the compositor and the animation engine
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeashConfig {
    /// Upper bound applied to every requested animation duration (ms).
    pub max_animation_duration_ms: u64,
    /// Global animation-speed multiplier. 0 finishes animations immediately.
    pub animation_scale: f32,
    /// Sampling rate of the background animation thread.
    pub target_fps: u32,
    /// Optional ceiling on live surfaces; allocations past it fail.
    pub max_surfaces: Option<usize>,
}

impl Default for LeashConfig {
    fn default() -> Self {
        Self::standard()
    }
}

impl LeashConfig {
    /// Standard configuration for general use.
    pub fn standard() -> Self {
        Self {
            max_animation_duration_ms: MAX_ANIMATION_DURATION_MS,
            animation_scale: 1.0,
            target_fps: 120,
            max_surfaces: None,
        }
    }

    /// Testing configuration: animations finish without waiting.
    pub fn testing() -> Self {
        Self {
            animation_scale: 0.0,
            ..Self::standard()
        }
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: LeashConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        tracing::debug!("loaded leash config from {}", path.display());
        Ok(config)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.animation_scale.is_finite() || self.animation_scale < 0.0 {
            return Err(ConfigError::Invalid {
                field: "animation_scale",
                reason: format!("must be a finite value >= 0, got {}", self.animation_scale),
            });
        }
        if self.target_fps == 0 {
            return Err(ConfigError::Invalid {
                field: "target_fps",
                reason: "must be positive".to_string(),
            });
        }
        if self.max_animation_duration_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "max_animation_duration_ms",
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }

    pub fn max_animation_duration(&self) -> Duration {
        Duration::from_millis(self.max_animation_duration_ms)
    }

    /// Set the global animation-speed multiplier.
    pub fn with_animation_scale(mut self, scale: f32) -> Self {
        self.animation_scale = scale;
        self
    }

    /// Set the animation duration ceiling.
    pub fn with_max_animation_duration(mut self, max: Duration) -> Self {
        self.max_animation_duration_ms = max.as_millis() as u64;
        self
    }

    /// Set the background sampling rate.
    pub fn with_target_fps(mut self, fps: u32) -> Self {
        self.target_fps = fps;
        self
    }

    /// Cap the number of live surfaces.
    pub fn with_max_surfaces(mut self, max: usize) -> Self {
        self.max_surfaces = Some(max);
        self
    }
}
