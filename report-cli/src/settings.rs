//! Report settings
//!
//! Settings come from an optional JSON file. A missing file means defaults;
//! a file that does not parse is logged and replaced by defaults.

use anyhow::{Context, Result};
use doc_template::{FileImageProvider, RenderOptions, SizeRule};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level settings container
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReportSettings {
    /// Parser and renderer options
    pub render: RenderOptions,
    /// Image lookup and sizing
    pub images: ImageSettings,
}

/// Image lookup and sizing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ImageSettings {
    /// Directory image references are relative to. Defaults to the data
    /// file's directory.
    pub base_dir: Option<PathBuf>,
    pub default_width: u32,
    pub default_height: u32,
    /// Checked in order; the first rule whose text occurs in the reference wins
    pub rules: Vec<SizeRule>,
}

impl Default for ImageSettings {
    fn default() -> Self {
        Self {
            base_dir: None,
            default_width: 250,
            default_height: 250,
            rules: vec![SizeRule::new("chart", 600, 360)],
        }
    }
}

impl ImageSettings {
    /// Build a file provider, resolving against `fallback_dir` when no base
    /// directory is configured
    pub fn provider(&self, fallback_dir: &Path) -> FileImageProvider {
        let base_dir = self.base_dir.clone().unwrap_or_else(|| fallback_dir.to_path_buf());
        FileImageProvider::new(base_dir)
            .with_default_size(self.default_width, self.default_height)
            .with_rules(self.rules.iter().cloned())
    }
}

impl ReportSettings {
    /// Load settings from disk, or return defaults if the file doesn't exist
    pub fn load_sync(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "settings file not found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file: {}", path.display()))?;
        match serde_json::from_str::<ReportSettings>(&content) {
            Ok(settings) => Ok(settings),
            Err(e) => {
                tracing::warn!("Failed to parse settings file, using defaults: {}", e);
                Ok(Self::default())
            }
        }
    }
}
