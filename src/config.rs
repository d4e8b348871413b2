//! Engine configuration
//!
//! Every field has a default, so a config file only needs the values it
//! changes. Load with [`EngineConfig::from_json_file`]; the result is
//! validated before it is returned.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ToneError};
use crate::graph::GraphSettings;
use crate::params::random::DEFAULT_COOLDOWN_SECS;
use crate::params::Field;

/// Randomizer behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RandomizerConfig {
    /// Seconds before another generation is accepted
    pub cooldown_secs: f64,
    /// Fields left untouched by generation
    pub locked: Vec<Field>,
    /// Fixed seed for reproducible runs; entropy when absent
    pub seed: Option<u64>,
}

impl Default for RandomizerConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: DEFAULT_COOLDOWN_SECS,
            locked: Vec::new(),
            seed: None,
        }
    }
}

/// Top-level configuration of an [`AudioEngine`](crate::AudioEngine)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Time constant of parameter smoothing in the live graph, seconds
    pub smoothing_secs: f64,
    /// Sample rate of the live context
    pub live_sample_rate: u32,
    pub graph: GraphSettings,
    pub randomizer: RandomizerConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            smoothing_secs: 0.016,
            live_sample_rate: 48000,
            graph: GraphSettings::default(),
            randomizer: RandomizerConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON config
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.smoothing_secs >= 0.0 && self.smoothing_secs.is_finite()) {
            return Err(ToneError::Config {
                reason: format!("smoothing_secs must be >= 0, got {}", self.smoothing_secs),
            });
        }
        if !(8000..=192_000).contains(&self.live_sample_rate) {
            return Err(ToneError::Config {
                reason: format!("live_sample_rate must be 8000-192000 Hz, got {}", self.live_sample_rate),
            });
        }
        if !(self.randomizer.cooldown_secs >= 0.0 && self.randomizer.cooldown_secs.is_finite()) {
            return Err(ToneError::Config {
                reason: format!("randomizer cooldown must be >= 0, got {}", self.randomizer.cooldown_secs),
            });
        }
        self.graph.validate()
    }
}
