//! Runtime configuration
//!
//! Trellis reads an optional `trellis.toml`. Every section and key is
//! optional; missing keys take the defaults below.
//!
//! ```toml
//! [properties]
//! max_trailing_notifications = 1
//!
//! [animation]
//! automatic_duration_ms = 1000.0
//! max_frame_delta_ms = 250.0
//!
//! [visual_states]
//! generated_transitions = true
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::ConfigError;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct TrellisConfig {
    #[serde(default)]
    pub properties: PropertyConfig,
    #[serde(default)]
    pub animation: AnimationConfig,
    #[serde(default)]
    pub visual_states: VisualStateConfig,
}

impl TrellisConfig {
    /// Parse from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Load from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!("loaded trellis config from {}", path.display());
        Ok(config)
    }
}

/// Property system settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PropertyConfig {
    /// Trailing notifications a slot may emit while it is already notifying
    #[serde(default = "default_max_trailing_notifications")]
    pub max_trailing_notifications: u32,
}

fn default_max_trailing_notifications() -> u32 {
    1
}

impl Default for PropertyConfig {
    fn default() -> Self {
        Self {
            max_trailing_notifications: default_max_trailing_notifications(),
        }
    }
}

/// Animation engine settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AnimationConfig {
    /// Simple duration of an `Automatic` from/to animation
    #[serde(default = "default_automatic_duration_ms")]
    pub automatic_duration_ms: f64,
    /// Frame deltas above this are clamped before ticking
    #[serde(default = "default_max_frame_delta_ms")]
    pub max_frame_delta_ms: f64,
}

fn default_automatic_duration_ms() -> f64 {
    1000.0
}

fn default_max_frame_delta_ms() -> f64 {
    250.0
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            automatic_duration_ms: default_automatic_duration_ms(),
            max_frame_delta_ms: default_max_frame_delta_ms(),
        }
    }
}

/// Visual state manager settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct VisualStateConfig {
    /// Synthesize a transition when a `VisualTransition` has no storyboard
    #[serde(default = "default_generated_transitions")]
    pub generated_transitions: bool,
}

fn default_generated_transitions() -> bool {
    true
}

impl Default for VisualStateConfig {
    fn default() -> Self {
        Self {
            generated_transitions: default_generated_transitions(),
        }
    }
}
