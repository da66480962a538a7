//! DOCX Package
//!
//! This crate reads and writes the zip-based container that holds a Word
//! document. A DOCX file is a ZIP archive of XML parts and binary assets:
//!
//! - `[Content_Types].xml` - Content type definitions
//! - `_rels/.rels` - Root relationships
//! - `word/document.xml` - Main document content
//! - `word/_rels/document.xml.rels` - Document relationships
//! - `word/media/` - Embedded images
//!
//! The [`Package`] type is an ordered, immutable-update view over the
//! archive entries. Untouched entries survive a read/write cycle
//! byte-identical. [`ContentTypes`] and [`Relationships`] parse and
//! regenerate the two bookkeeping parts that must change when an image is
//! inserted, and [`media`] builds the drawing markup that references it.
//!
//! # Example
//!
//! ```rust
//! use docx_package::Package;
//!
//! let package = Package::new()
//!     .with_entry("word/document.xml", b"<w:document/>".to_vec());
//! let bytes = package.serialize().unwrap();
//!
//! let reopened = Package::open(&bytes).unwrap();
//! assert_eq!(reopened.get_entry("word/document.xml").unwrap(), b"<w:document/>");
//! ```

mod content_types;
mod error;
mod package;
mod relationships;
pub mod media;
pub mod xml;

pub use content_types::ContentTypes;
pub use error::{PackageError, PackageResult};
pub use media::ImageFormat;
pub use package::{Entry, Package};
pub use relationships::{rels_path_for, resolve_target, Relationship, Relationships, TargetMode};

/// Well-known part names
pub mod part_names {
    pub const CONTENT_TYPES: &str = "[Content_Types].xml";
    pub const ROOT_RELS: &str = "_rels/.rels";
    pub const MAIN_DOCUMENT: &str = "word/document.xml";
}

/// Relationship types used when templating
pub mod relationship_types {
    pub const DOCUMENT: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
    pub const IMAGE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";
    pub const STYLES: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles";
}

/// Namespaces of the package bookkeeping parts
pub mod namespaces {
    /// Package relationships namespace
    pub const PKG_REL: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
    /// Content types namespace
    pub const CT: &str = "http://schemas.openxmlformats.org/package/2006/content-types";
}

/// Content types for package parts
pub mod content_type_values {
    pub const RELATIONSHIPS: &str = "application/vnd.openxmlformats-package.relationships+xml";
    pub const XML: &str = "application/xml";
}
