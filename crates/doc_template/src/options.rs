//! Render options

use serde::{Deserialize, Serialize};

/// Tag delimiters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Delimiters {
    pub start: String,
    pub end: String,
}

impl Default for Delimiters {
    fn default() -> Self {
        Self {
            start: "{".to_string(),
            end: "}".to_string(),
        }
    }
}

/// What to do when a tag path does not resolve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingPolicy {
    /// Substitute nothing, report nothing
    Empty,
    /// Substitute nothing and report a warning record
    #[default]
    Warn,
    /// Collect records over the whole render, then fail
    Strict,
}

/// Image placement options
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageOptions {
    /// Treat every `%` image alone in its paragraph as a centered block image
    pub centered: bool,
}

/// Options for parsing and rendering a template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    pub delimiters: Delimiters,
    /// Repeat whole paragraphs for loops whose markers sit alone in a paragraph
    pub paragraph_loop: bool,
    /// Turn newlines in substituted values into line breaks
    pub linebreaks: bool,
    pub missing: MissingPolicy,
    pub image: ImageOptions,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            delimiters: Delimiters::default(),
            paragraph_loop: true,
            linebreaks: true,
            missing: MissingPolicy::default(),
            image: ImageOptions::default(),
        }
    }
}

impl RenderOptions {
    pub fn with_missing(mut self, missing: MissingPolicy) -> Self {
        self.missing = missing;
        self
    }

    pub fn with_paragraph_loop(mut self, enabled: bool) -> Self {
        self.paragraph_loop = enabled;
        self
    }

    pub fn with_delimiters(mut self, start: &str, end: &str) -> Self {
        self.delimiters = Delimiters {
            start: start.to_string(),
            end: end.to_string(),
        };
        self
    }
}
