//! Error types for template parsing and rendering

use docx_package::PackageError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Error type returned by image providers
pub type ProviderError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur while parsing or rendering a template
#[derive(Debug, Error)]
pub enum TemplateError {
    /// Package could not be read or written
    #[error(transparent)]
    Package(#[from] PackageError),

    /// A text part is not well-formed XML
    #[error("Malformed XML: {0}")]
    Xml(String),

    /// Malformed tag marker
    #[error("Tag syntax error at offset {offset}: {message}")]
    TagSyntax { offset: usize, message: String },

    /// Loop open/close markers do not pair up
    #[error("Unmatched loop tag `{path}` at offset {offset}: {message}")]
    UnmatchedLoopTag {
        path: String,
        offset: usize,
        message: String,
    },

    /// A tag path did not resolve in the context
    #[error("Missing variable `{path}` at offset {offset}")]
    MissingVariable { path: String, offset: usize },

    /// A loop tag resolved to something that is not a sequence
    #[error("Value of `{path}` at offset {offset} is not iterable (found {found})")]
    TypeNotIterable {
        path: String,
        offset: usize,
        found: &'static str,
    },

    /// The image provider failed or returned unusable data
    #[error("Could not resolve image `{path}` at offset {offset}: {cause}")]
    ImageResolution {
        path: String,
        offset: usize,
        #[source]
        cause: ProviderError,
    },

    /// Missing variables collected under the strict policy
    #[error("{} missing variable(s)", .0.len())]
    MissingVariables(Vec<ErrorRecord>),
}

impl From<quick_xml::Error> for TemplateError {
    fn from(err: quick_xml::Error) -> Self {
        TemplateError::Xml(err.to_string())
    }
}

/// Result type for template operations
pub type TemplateResult<T> = std::result::Result<T, TemplateError>;

/// Classification of an error record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    CorruptContainer,
    EntryNotFound,
    TagSyntax,
    UnmatchedLoopTag,
    MissingVariable,
    TypeNotIterable,
    ImageResolution,
}

impl ErrorKind {
    /// Whether rendering can still produce a document after this error
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ErrorKind::MissingVariable)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::CorruptContainer => "corrupt_container",
            ErrorKind::EntryNotFound => "entry_not_found",
            ErrorKind::TagSyntax => "tag_syntax",
            ErrorKind::UnmatchedLoopTag => "unmatched_loop_tag",
            ErrorKind::MissingVariable => "missing_variable",
            ErrorKind::TypeNotIterable => "type_not_iterable",
            ErrorKind::ImageResolution => "image_resolution",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured error report entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub kind: ErrorKind,
    /// Tag path the error refers to
    pub tag_path: Option<String>,
    /// Package part the error was found in
    pub part: Option<String>,
    /// Offset into the part's logical text
    pub offset: Option<usize>,
    pub cause: Option<String>,
}

impl ErrorRecord {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            tag_path: None,
            part: None,
            offset: None,
            cause: None,
        }
    }

    pub fn missing_variable(path: impl Into<String>, offset: usize) -> Self {
        Self {
            tag_path: Some(path.into()),
            offset: Some(offset),
            ..Self::new(ErrorKind::MissingVariable)
        }
    }

    pub fn with_part(mut self, part: impl Into<String>) -> Self {
        self.part = Some(part.into());
        self
    }

    fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.cause = Some(cause.into());
        self
    }
}

impl fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.kind)?;
        if let Some(ref part) = self.part {
            write!(f, " {}", part)?;
        }
        if let Some(offset) = self.offset {
            write!(f, " @{}", offset)?;
        }
        if let Some(ref path) = self.tag_path {
            write!(f, " `{}`", path)?;
        }
        if let Some(ref cause) = self.cause {
            write!(f, ": {}", cause)?;
        }
        Ok(())
    }
}

impl TemplateError {
    /// Convert into report records
    pub fn into_records(self) -> Vec<ErrorRecord> {
        let record = match self {
            TemplateError::MissingVariables(records) => return records,
            TemplateError::Package(PackageError::EntryNotFound(path)) => {
                ErrorRecord::new(ErrorKind::EntryNotFound).with_cause(path)
            }
            TemplateError::Package(err) => {
                ErrorRecord::new(ErrorKind::CorruptContainer).with_cause(err.to_string())
            }
            TemplateError::Xml(message) => {
                ErrorRecord::new(ErrorKind::CorruptContainer).with_cause(message)
            }
            TemplateError::TagSyntax { offset, message } => ErrorRecord {
                offset: Some(offset),
                ..ErrorRecord::new(ErrorKind::TagSyntax).with_cause(message)
            },
            TemplateError::UnmatchedLoopTag { path, offset, message } => ErrorRecord {
                tag_path: Some(path),
                offset: Some(offset),
                ..ErrorRecord::new(ErrorKind::UnmatchedLoopTag).with_cause(message)
            },
            TemplateError::MissingVariable { path, offset } => ErrorRecord::missing_variable(path, offset),
            TemplateError::TypeNotIterable { path, offset, found } => ErrorRecord {
                tag_path: Some(path),
                offset: Some(offset),
                ..ErrorRecord::new(ErrorKind::TypeNotIterable).with_cause(format!("found {}", found))
            },
            TemplateError::ImageResolution { path, offset, cause } => ErrorRecord {
                tag_path: Some(path),
                offset: Some(offset),
                ..ErrorRecord::new(ErrorKind::ImageResolution).with_cause(cause.to_string())
            },
        };
        vec![record]
    }
}

/// Rendering failed; no output was produced
#[derive(Debug, Clone, Error)]
#[error("document generation failed with {} error(s)", .errors.len())]
pub struct RenderFailure {
    /// Every cause, in the order found. Never empty.
    pub errors: Vec<ErrorRecord>,
}

impl RenderFailure {
    pub(crate) fn from_error(err: TemplateError, part: Option<&str>) -> Self {
        let errors = err
            .into_records()
            .into_iter()
            .map(|r| match (part, r.part.is_none()) {
                (Some(p), true) => r.with_part(p),
                _ => r,
            })
            .collect();
        Self { errors }
    }
}
