//! DOCX Templates
//!
//! Fills placeholder tags in Word documents with structured data:
//!
//! - `{name}` - text substitution, with dotted paths (`{company.name}`)
//! - `{#items}...{/items}` - repeat a region once per element (`{/}` closes
//!   the innermost region)
//! - `{^items}...{/items}` - render a region only when the value is empty
//! - `{%logo}` - inline image, `{%%chart}` - centered image paragraph
//!
//! Tags may be split over several runs by Word's editor; the parser reads
//! the text of each paragraph as one string and puts the result back into
//! the original runs. A loop whose markers sit in different cells of one
//! table row repeats the row, and a loop whose markers each fill their own
//! paragraph repeats the paragraphs in between.
//!
//! # Example
//!
//! ```rust
//! use doc_template::{Context, MemoryImageProvider, RenderOptions, Template};
//! use doc_template::engine::{render, CollectingSink};
//!
//! let options = RenderOptions::default();
//! let template = Template::parse_text("Hello {name}!", &options).unwrap();
//! let context = Context::new().with("name", "Ali");
//!
//! let fragment = render(
//!     &template,
//!     &context,
//!     &MemoryImageProvider::new(),
//!     &mut CollectingSink::new(),
//!     &options,
//! )
//! .unwrap();
//! assert_eq!(fragment.text, "Hello Ali!");
//! ```

pub mod ast;
pub mod context;
pub mod docx;
pub mod engine;
pub mod error;
pub mod image;
pub mod options;

mod lexer;
mod parser;
mod wordml;

pub use ast::{Markup, Node, Tag, TagPath, Template};
pub use context::{Context, ContextError, ImageRef, Scope, Value};
pub use docx::{DocxTemplate, Generated};
pub use engine::{CollectingSink, EmbeddedImage, MediaRef, MediaSink, RenderedFragment, Renderer};
pub use error::{ErrorKind, ErrorRecord, ProviderError, RenderFailure, TemplateError, TemplateResult};
pub use image::{FileImageProvider, ImageError, ImageProvider, MemoryImageProvider, SizeRule};
pub use options::{Delimiters, ImageOptions, MissingPolicy, RenderOptions};
