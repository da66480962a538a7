//! [Content_Types].xml parsing and generation
//!
//! This part defines the content types for all parts in the package.
//! Entries keep their document order so that regenerating the part after
//! adding an image extension only appends to it.

use crate::{content_type_values, namespaces};
use crate::error::{PackageError, PackageResult};
use crate::xml;
use quick_xml::events::Event;

/// Represents the content types in a package
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentTypes {
    /// Default content types by extension (e.g., "xml" -> "application/xml")
    defaults: Vec<(String, String)>,
    /// Override content types by part name (e.g., "/word/document.xml" -> "...")
    overrides: Vec<(String, String)>,
}

impl ContentTypes {
    /// Create content types with the defaults every package needs
    pub fn new() -> Self {
        let mut ct = Self::default();
        ct.ensure_default("rels", content_type_values::RELATIONSHIPS);
        ct.ensure_default("xml", content_type_values::XML);
        ct
    }

    /// Parse [Content_Types].xml from its content
    pub fn parse(content: &str) -> PackageResult<Self> {
        let mut result = Self::default();
        let mut reader = xml::reader_from_str(content);

        loop {
            match reader.read_event() {
                Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e)) => {
                    let name = e.name();
                    if xml::matches_element(name.as_ref(), "Default") {
                        if let (Some(ext), Some(ct)) = (
                            xml::get_attribute(e, b"Extension"),
                            xml::get_attribute(e, b"ContentType"),
                        ) {
                            result.defaults.push((ext, ct));
                        }
                    } else if xml::matches_element(name.as_ref(), "Override") {
                        if let (Some(part), Some(ct)) = (
                            xml::get_attribute(e, b"PartName"),
                            xml::get_attribute(e, b"ContentType"),
                        ) {
                            result.overrides.push((part, ct));
                        }
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(PackageError::from(e)),
                _ => {}
            }
        }

        Ok(result)
    }

    /// Get the content type for a given part path
    pub fn get_content_type(&self, path: &str) -> Option<&str> {
        let normalized = normalize_part_name(path);
        if let Some((_, ct)) = self.overrides.iter().find(|(p, _)| *p == normalized) {
            return Some(ct);
        }

        let ext = path.rsplit_once('.').map(|(_, ext)| ext)?;
        self.default_for(ext)
    }

    /// Default content type registered for an extension (case-insensitive)
    pub fn default_for(&self, extension: &str) -> Option<&str> {
        self.defaults
            .iter()
            .find(|(ext, _)| ext.eq_ignore_ascii_case(extension))
            .map(|(_, ct)| ct.as_str())
    }

    /// Register a default for an extension unless one exists.
    /// Returns true if the part changed.
    pub fn ensure_default(&mut self, extension: &str, content_type: &str) -> bool {
        if self.default_for(extension).is_some() {
            return false;
        }
        self.defaults.push((extension.to_string(), content_type.to_string()));
        true
    }

    /// Add or replace an override for a specific part
    pub fn add_override(&mut self, part_name: &str, content_type: &str) {
        let normalized = normalize_part_name(part_name);
        match self.overrides.iter_mut().find(|(p, _)| *p == normalized) {
            Some(entry) => entry.1 = content_type.to_string(),
            None => self.overrides.push((normalized, content_type.to_string())),
        }
    }

    /// Generate XML content for [Content_Types].xml
    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        out.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
        out.push('\n');
        out.push_str(&format!(r#"<Types xmlns="{}">"#, namespaces::CT));

        for (ext, ct) in &self.defaults {
            out.push_str(&format!(
                r#"<Default Extension="{}" ContentType="{}"/>"#,
                xml::escape(ext),
                xml::escape(ct)
            ));
        }

        for (part, ct) in &self.overrides {
            out.push_str(&format!(
                r#"<Override PartName="{}" ContentType="{}"/>"#,
                xml::escape(part),
                xml::escape(ct)
            ));
        }

        out.push_str("</Types>");
        out
    }
}

fn normalize_part_name(part_name: &str) -> String {
    if part_name.starts_with('/') {
        part_name.to_string()
    } else {
        format!("/{}", part_name)
    }
}
