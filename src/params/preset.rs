//! Preset catalogs
//!
//! Catalog content is opaque to the engine: a preset is just a named parameter
//! vector. Catalogs are loaded from JSON.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::state::AudioState;
use crate::error::{Result, ToneError};

/// Grouping used by front ends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PresetCategory {
    Amp,
    #[default]
    Effect,
}

/// A named parameter vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub category: PresetCategory,
    pub state: AudioState,
}

/// Ordered collection of presets
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PresetCatalog {
    presets: Vec<Preset>,
}

impl PresetCatalog {
    pub fn new(presets: Vec<Preset>) -> Self {
        Self { presets }
    }

    /// Parse a catalog: either `{"presets": [...]}` or a bare array
    pub fn from_json_str(json: &str) -> Result<Self> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Wire {
            Wrapped { presets: Vec<Preset> },
            Bare(Vec<Preset>),
        }

        let presets = match serde_json::from_str::<Wire>(json)? {
            Wire::Wrapped { presets } | Wire::Bare(presets) => presets,
        };
        Ok(Self::new(presets))
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn get(&self, id: &str) -> Result<&Preset> {
        self.presets
            .iter()
            .find(|p| p.id == id)
            .ok_or_else(|| ToneError::PresetNotFound { id: id.to_string() })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Preset> {
        self.presets.iter()
    }

    pub fn len(&self) -> usize {
        self.presets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }
}
