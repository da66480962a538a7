//! Parsed template tree

use std::fmt;

/// Dotted path naming a context value (`company.name`)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TagPath {
    raw: String,
    segments: Vec<String>,
}

impl TagPath {
    /// Parse a dotted path; `.` alone names the current loop element
    pub fn parse(raw: &str) -> Result<Self, String> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err("missing name".to_string());
        }
        if raw == "." {
            return Ok(Self {
                raw: raw.to_string(),
                segments: vec![raw.to_string()],
            });
        }

        let mut segments = Vec::new();
        for segment in raw.split('.') {
            let segment = segment.trim();
            if segment.is_empty() {
                return Err(format!("empty path segment in `{}`", raw));
            }
            if let Some(c) = segment.chars().find(|c| !is_name_char(*c)) {
                return Err(format!("invalid character `{}` in tag name `{}`", c, raw));
            }
            segments.push(segment.to_string());
        }

        Ok(Self {
            raw: segments.join("."),
            segments,
        })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

/// Characters allowed in a path segment
fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-'
}

impl fmt::Display for TagPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// A tag occurrence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub path: TagPath,
    /// Byte offset of the opening delimiter in the part's logical text
    pub offset: usize,
}

/// Template tree node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Text copied verbatim (raw XML for WordprocessingML parts)
    Literal(String),
    ScalarTag(Tag),
    LoopTag { tag: Tag, body: Vec<Node> },
    /// Rendered once when the value is missing or empty
    InvertedTag { tag: Tag, body: Vec<Node> },
    /// `block` images replace their whole paragraph
    ImageTag { tag: Tag, block: bool },
}

/// Kind of text a template was parsed from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Markup {
    PlainText,
    WordprocessingMl,
}

/// A parsed template. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    pub(crate) nodes: Vec<Node>,
    pub(crate) markup: Markup,
    /// Highest `wp:docPr` id already used by the part
    pub(crate) max_drawing_id: u32,
}

impl Template {
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn markup(&self) -> Markup {
        self.markup
    }

    pub fn max_drawing_id(&self) -> u32 {
        self.max_drawing_id
    }

    /// Whether the template contains no tags at all
    pub fn is_static(&self) -> bool {
        self.nodes.iter().all(|n| matches!(n, Node::Literal(_)))
    }

    /// All tags, depth-first in document order
    pub fn tags(&self) -> Vec<&Tag> {
        fn walk<'a>(nodes: &'a [Node], out: &mut Vec<&'a Tag>) {
            for node in nodes {
                match node {
                    Node::Literal(_) => {}
                    Node::ScalarTag(tag) | Node::ImageTag { tag, .. } => out.push(tag),
                    Node::LoopTag { tag, body } | Node::InvertedTag { tag, body } => {
                        out.push(tag);
                        walk(body, out);
                    }
                }
            }
        }

        let mut out = Vec::new();
        walk(&self.nodes, &mut out);
        out
    }
}
