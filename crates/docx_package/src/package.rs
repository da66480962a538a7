//! ZIP archive reading and writing
//!
//! A [`Package`] keeps every archive entry in its original order. Updates
//! return a new package; entry data is shared between the old and the new
//! value, so an update only copies the entry list.

use crate::error::{PackageError, PackageResult};
use std::collections::HashSet;
use std::io::{Cursor, Read, Write};
use std::sync::Arc;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipArchive, ZipWriter};

/// A single named entry of a package
#[derive(Debug, Clone)]
pub struct Entry {
    name: String,
    data: Arc<[u8]>,
    compression: CompressionMethod,
}

impl Entry {
    fn new(name: impl Into<String>, data: Vec<u8>, compression: CompressionMethod) -> Self {
        Self {
            name: name.into(),
            data: Arc::from(data),
            compression,
        }
    }

    /// Entry path inside the archive
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Uncompressed entry bytes
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// An ordered set of uniquely named binary entries
#[derive(Debug, Clone, Default)]
pub struct Package {
    entries: Vec<Entry>,
}

impl PartialEq for Package {
    fn eq(&self, other: &Self) -> bool {
        self.entries.len() == other.entries.len()
            && self
                .entries
                .iter()
                .zip(&other.entries)
                .all(|(a, b)| a.name == b.name && a.data == b.data)
    }
}

impl Eq for Package {}

impl Package {
    /// Create an empty package
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a package from archive bytes
    pub fn open(bytes: &[u8]) -> PackageResult<Self> {
        let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(corrupt)?;
        let mut entries = Vec::with_capacity(archive.len());
        let mut seen = HashSet::new();

        for i in 0..archive.len() {
            let mut file = archive.by_index(i).map_err(corrupt)?;
            if file.is_dir() {
                continue;
            }

            let name = file.name().to_string();
            if !seen.insert(name.clone()) {
                return Err(PackageError::CorruptContainer(format!(
                    "duplicate entry name: {}",
                    name
                )));
            }

            // Entries written back keep Stored if they were stored
            let compression = match file.compression() {
                CompressionMethod::Stored => CompressionMethod::Stored,
                _ => CompressionMethod::Deflated,
            };

            let declared = file.size();
            let mut data = Vec::new();
            file.read_to_end(&mut data)
                .map_err(|e| PackageError::CorruptContainer(format!("{}: {}", name, e)))?;
            if data.len() as u64 != declared {
                return Err(PackageError::CorruptContainer(format!(
                    "{}: header declares {} bytes, entry holds {}",
                    name,
                    declared,
                    data.len()
                )));
            }

            entries.push(Entry::new(name, data, compression));
        }

        tracing::debug!("Opened package with {} entries", entries.len());
        Ok(Self { entries })
    }

    /// Get the bytes of an entry
    pub fn get_entry(&self, path: &str) -> PackageResult<&[u8]> {
        self.entries
            .iter()
            .find(|e| e.name == path)
            .map(|e| e.data())
            .ok_or_else(|| PackageError::EntryNotFound(path.to_string()))
    }

    /// Get an entry as UTF-8 text
    pub fn get_entry_str(&self, path: &str) -> PackageResult<&str> {
        let bytes = self.get_entry(path)?;
        std::str::from_utf8(bytes).map_err(|source| PackageError::Utf8 {
            part: path.to_string(),
            source,
        })
    }

    /// Return a new package with `path` set to `data`.
    ///
    /// An existing entry is replaced in place and keeps its position; a new
    /// entry is appended. No other entry is touched.
    pub fn with_entry(&self, path: &str, data: impl Into<Vec<u8>>) -> Package {
        let mut entries = self.entries.clone();
        let data = data.into();

        match entries.iter_mut().find(|e| e.name == path) {
            Some(existing) => {
                existing.data = Arc::from(data);
            }
            None => entries.push(Entry::new(path, data, CompressionMethod::Deflated)),
        }

        Package { entries }
    }

    /// Check if an entry exists
    pub fn contains(&self, path: &str) -> bool {
        self.entries.iter().any(|e| e.name == path)
    }

    /// Entry names in archive order
    pub fn entry_names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    /// All entries in archive order
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the package has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write the package as a ZIP archive
    pub fn serialize(&self) -> PackageResult<Vec<u8>> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));

        for entry in &self.entries {
            // Fixed timestamp keeps the output independent of the clock
            let options = SimpleFileOptions::default()
                .compression_method(entry.compression)
                .last_modified_time(DateTime::default());

            zip.start_file(entry.name.as_str(), options)?;
            zip.write_all(&entry.data)?;
        }

        let cursor = zip.finish()?;
        let bytes = cursor.into_inner();
        tracing::debug!(
            "Serialized package with {} entries ({} bytes)",
            self.entries.len(),
            bytes.len()
        );
        Ok(bytes)
    }
}

fn corrupt(err: zip::result::ZipError) -> PackageError {
    PackageError::CorruptContainer(err.to_string())
}
