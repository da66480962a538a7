//! Relationships (.rels) file parsing and generation
//!
//! Parts reference images, hyperlinks and other parts through relationships.
//! The relationships of `word/document.xml` live in
//! `word/_rels/document.xml.rels`.

use crate::error::{PackageError, PackageResult};
use crate::{namespaces, xml};
use quick_xml::events::Event;

/// A single relationship in a .rels file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    /// Unique ID within the rels file (e.g., "rId1")
    pub id: String,
    /// Relationship type URI
    pub rel_type: String,
    /// Target path (relative to the source part)
    pub target: String,
    /// Target mode (Internal or External)
    pub target_mode: TargetMode,
}

/// Target mode for relationships
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TargetMode {
    /// Internal target within the package
    #[default]
    Internal,
    /// External target (URL)
    External,
}

/// Collection of relationships from a .rels file, in document order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationships {
    relationships: Vec<Relationship>,
    /// Counter for generating new IDs
    next_id: u64,
}

impl Default for Relationships {
    fn default() -> Self {
        Self::new()
    }
}

impl Relationships {
    /// Create a new empty relationships collection
    pub fn new() -> Self {
        Self {
            relationships: Vec::new(),
            next_id: 1,
        }
    }

    /// Parse a .rels file from its XML content
    pub fn parse(content: &str) -> PackageResult<Self> {
        let mut result = Self::new();
        let mut reader = xml::reader_from_str(content);
        let mut max_id = 0u64;

        loop {
            match reader.read_event() {
                Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e)) => {
                    let name = e.name();
                    if xml::matches_element(name.as_ref(), "Relationship") {
                        let id = xml::get_attribute(e, b"Id")
                            .ok_or_else(|| PackageError::InvalidStructure("Relationship missing Id".into()))?;
                        let rel_type = xml::get_attribute(e, b"Type")
                            .ok_or_else(|| PackageError::InvalidStructure("Relationship missing Type".into()))?;
                        let target = xml::get_attribute(e, b"Target")
                            .ok_or_else(|| PackageError::InvalidStructure("Relationship missing Target".into()))?;
                        let target_mode = xml::get_attribute(e, b"TargetMode")
                            .map(|m| if m == "External" { TargetMode::External } else { TargetMode::Internal })
                            .unwrap_or_default();

                        if let Some(num) = id.strip_prefix("rId").and_then(|n| n.parse::<u64>().ok()) {
                            max_id = max_id.max(num);
                        }

                        result.relationships.push(Relationship {
                            id,
                            rel_type,
                            target,
                            target_mode,
                        });
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(PackageError::from(e)),
                _ => {}
            }
        }

        result.next_id = max_id
            .checked_add(1)
            .ok_or_else(|| PackageError::InvalidStructure(format!("Relationship id out of range: rId{}", max_id)))?;
        Ok(result)
    }

    /// Add a relationship and return its ID
    pub fn add(&mut self, rel_type: &str, target: &str, target_mode: TargetMode) -> String {
        let mut id = format!("rId{}", self.next_id);
        while self.contains(&id) {
            self.next_id = self.next_id.saturating_add(1);
            id = format!("rId{}", self.next_id);
        }
        self.next_id = self.next_id.saturating_add(1);

        self.relationships.push(Relationship {
            id: id.clone(),
            rel_type: rel_type.to_string(),
            target: target.to_string(),
            target_mode,
        });

        id
    }

    /// Get a relationship by ID
    pub fn get(&self, id: &str) -> Option<&Relationship> {
        self.relationships.iter().find(|r| r.id == id)
    }

    /// Get the first relationship of a type
    pub fn get_by_type(&self, rel_type: &str) -> Option<&Relationship> {
        self.relationships.iter().find(|r| r.rel_type == rel_type)
    }

    /// Get all relationships of a given type
    pub fn get_all_by_type(&self, rel_type: &str) -> Vec<&Relationship> {
        self.relationships
            .iter()
            .filter(|r| r.rel_type == rel_type)
            .collect()
    }

    /// Check if a relationship exists
    pub fn contains(&self, id: &str) -> bool {
        self.relationships.iter().any(|r| r.id == id)
    }

    /// Number of relationships
    pub fn len(&self) -> usize {
        self.relationships.len()
    }

    /// Whether there are no relationships
    pub fn is_empty(&self) -> bool {
        self.relationships.is_empty()
    }

    /// Iterate over all relationships in document order
    pub fn iter(&self) -> impl Iterator<Item = &Relationship> {
        self.relationships.iter()
    }

    /// Generate XML content for the .rels file
    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        out.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
        out.push('\n');
        out.push_str(&format!(r#"<Relationships xmlns="{}">"#, namespaces::PKG_REL));

        for rel in &self.relationships {
            out.push_str(&format!(
                r#"<Relationship Id="{}" Type="{}" Target="{}""#,
                xml::escape(&rel.id),
                xml::escape(&rel.rel_type),
                xml::escape(&rel.target)
            ));
            if rel.target_mode == TargetMode::External {
                out.push_str(r#" TargetMode="External""#);
            }
            out.push_str("/>");
        }

        out.push_str("</Relationships>");
        out
    }
}

/// Path of the .rels part that belongs to `part`.
///
/// `word/document.xml` -> `word/_rels/document.xml.rels`
pub fn rels_path_for(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{}/_rels/{}.rels", dir, file),
        None => format!("_rels/{}.rels", part),
    }
}

/// Resolve an internal relationship target against its source part.
///
/// `("word/document.xml", "media/image1.png")` -> `word/media/image1.png`
pub fn resolve_target(source_part: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }

    let mut segments: Vec<&str> = match source_part.rsplit_once('/') {
        Some((dir, _)) => dir.split('/').collect(),
        None => Vec::new(),
    };

    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    segments.join("/")
}
