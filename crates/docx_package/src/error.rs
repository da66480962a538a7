//! Error types for package operations

use thiserror::Error;

/// Errors that can occur while reading or writing a document package
#[derive(Debug, Error)]
pub enum PackageError {
    /// The byte stream is not a readable compressed archive
    #[error("Corrupt container: {0}")]
    CorruptContainer(String),

    /// A requested entry does not exist in the package
    #[error("Entry not found: {0}")]
    EntryNotFound(String),

    /// ZIP archive error while writing
    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// IO error while writing
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// XML parsing error in a bookkeeping part
    #[error("XML parsing error: {0}")]
    XmlParse(String),

    /// Invalid package structure
    #[error("Invalid package structure: {0}")]
    InvalidStructure(String),

    /// A text part is not valid UTF-8
    #[error("UTF-8 encoding error in {part}: {source}")]
    Utf8 {
        part: String,
        #[source]
        source: std::str::Utf8Error,
    },
}

impl From<quick_xml::Error> for PackageError {
    fn from(err: quick_xml::Error) -> Self {
        PackageError::XmlParse(err.to_string())
    }
}

impl From<quick_xml::events::attributes::AttrError> for PackageError {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        PackageError::XmlParse(format!("Attribute error: {}", err))
    }
}

/// Result type for package operations
pub type PackageResult<T> = std::result::Result<T, PackageError>;
