//! Image providers
//!
//! An [`ImageProvider`] turns the reference found in the context into image
//! bytes and a display size. The engine never touches the filesystem itself.

use crate::error::ProviderError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

/// Source of image bytes and display sizes
pub trait ImageProvider {
    /// Raw image bytes for a reference
    fn fetch(&self, reference: &str) -> Result<Vec<u8>, ProviderError>;

    /// Display size in pixels as (width, height)
    fn size(&self, reference: &str) -> Result<(u32, u32), ProviderError>;
}

/// Error types for the bundled providers
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("Image file not found: {0}")]
    NotFound(String),

    #[error("Failed to read image {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Size applied to references containing a substring
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeRule {
    pub contains: String,
    pub width: u32,
    pub height: u32,
}

impl SizeRule {
    pub fn new(contains: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            contains: contains.into(),
            width,
            height,
        }
    }

    fn matches(&self, reference: &str) -> bool {
        reference.to_lowercase().contains(&self.contains.to_lowercase())
    }
}

/// Default display size in pixels
pub const DEFAULT_IMAGE_SIZE: (u32, u32) = (250, 250);

/// Reads images from disk relative to a base directory
#[derive(Debug, Clone)]
pub struct FileImageProvider {
    base_dir: PathBuf,
    default_size: (u32, u32),
    rules: Vec<SizeRule>,
}

impl FileImageProvider {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            default_size: DEFAULT_IMAGE_SIZE,
            rules: Vec::new(),
        }
    }

    pub fn with_default_size(mut self, width: u32, height: u32) -> Self {
        self.default_size = (width, height);
        self
    }

    /// Add a sizing rule; the first matching rule wins
    pub fn with_rule(mut self, rule: SizeRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn with_rules(mut self, rules: impl IntoIterator<Item = SizeRule>) -> Self {
        self.rules.extend(rules);
        self
    }

    fn resolve(&self, reference: &str) -> PathBuf {
        self.base_dir.join(reference)
    }
}

impl ImageProvider for FileImageProvider {
    fn fetch(&self, reference: &str) -> Result<Vec<u8>, ProviderError> {
        let path = self.resolve(reference);
        if !path.is_file() {
            return Err(ImageError::NotFound(path.display().to_string()).into());
        }
        tracing::debug!(path = %path.display(), "reading image");
        std::fs::read(&path).map_err(|source| {
            ImageError::Read {
                path: path.display().to_string(),
                source,
            }
            .into()
        })
    }

    fn size(&self, reference: &str) -> Result<(u32, u32), ProviderError> {
        Ok(self
            .rules
            .iter()
            .find(|rule| rule.matches(reference))
            .map(|rule| (rule.width, rule.height))
            .unwrap_or(self.default_size))
    }
}

/// Serves registered images from memory
#[derive(Debug, Clone, Default)]
pub struct MemoryImageProvider {
    images: HashMap<String, (Vec<u8>, (u32, u32))>,
}

impl MemoryImageProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, reference: impl Into<String>, data: Vec<u8>, size: (u32, u32)) {
        self.images.insert(reference.into(), (data, size));
    }

    pub fn with_image(mut self, reference: impl Into<String>, data: Vec<u8>, size: (u32, u32)) -> Self {
        self.insert(reference, data, size);
        self
    }

    fn get(&self, reference: &str) -> Result<&(Vec<u8>, (u32, u32)), ImageError> {
        self.images
            .get(reference)
            .ok_or_else(|| ImageError::NotFound(reference.to_string()))
    }
}

impl ImageProvider for MemoryImageProvider {
    fn fetch(&self, reference: &str) -> Result<Vec<u8>, ProviderError> {
        Ok(self.get(reference)?.0.clone())
    }

    fn size(&self, reference: &str) -> Result<(u32, u32), ProviderError> {
        Ok(self.get(reference)?.1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const PNG: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

    #[test]
    fn test_file_provider_reads_relative_to_base() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("logo.png"), PNG).unwrap();

        let provider = FileImageProvider::new(temp_dir.path());
        assert_eq!(provider.fetch("logo.png").unwrap(), PNG);
    }

    #[test]
    fn test_file_provider_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let provider = FileImageProvider::new(temp_dir.path());
        let err = provider.fetch("missing.png").unwrap_err();
        assert!(err.to_string().starts_with("Image file not found"));
    }

    #[test]
    fn test_size_rules() {
        let provider = FileImageProvider::new(".")
            .with_rule(SizeRule::new("chart", 600, 360))
            .with_default_size(200, 100);

        assert_eq!(provider.size("charts/Sales_Chart.png").unwrap(), (600, 360));
        assert_eq!(provider.size("logo.png").unwrap(), (200, 100));
    }

    #[test]
    fn test_memory_provider() {
        let provider = MemoryImageProvider::new().with_image("logo", PNG.to_vec(), (10, 20));
        assert_eq!(provider.fetch("logo").unwrap(), PNG);
        assert_eq!(provider.size("logo").unwrap(), (10, 20));
        assert!(provider.fetch("other").is_err());
    }
}
