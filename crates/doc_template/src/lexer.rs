//! Tag scanner
//!
//! Splits a logical string into text and tag fragments. Positions are byte
//! indices into the scanned string; callers relocate offsets when the string
//! is a concatenation of several runs.

use crate::ast::TagPath;
use crate::error::{TemplateError, TemplateResult};
use crate::options::Delimiters;

/// Marker that follows the opening delimiter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TagKind {
    Scalar,
    /// `#`
    LoopOpen,
    /// `^`
    InvertedOpen,
    /// `/`, with or without a name
    Close,
    /// `%`
    Image,
    /// `%%`
    CenteredImage,
}

impl TagKind {
    pub(crate) fn is_open(&self) -> bool {
        matches!(self, TagKind::LoopOpen | TagKind::InvertedOpen)
    }
}

/// A tag as found in the text
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RawTag {
    pub kind: TagKind,
    /// `None` only for a bare close marker
    pub path: Option<TagPath>,
    /// Start of the opening delimiter
    pub start: usize,
    /// End of the closing delimiter
    pub end: usize,
    /// Reported offset; equals `start` until relocated
    pub offset: usize,
}

impl RawTag {
    pub(crate) fn path_str(&self) -> &str {
        self.path.as_ref().map(|p| p.as_str()).unwrap_or("")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Fragment {
    Text { start: usize, end: usize },
    Tag(RawTag),
}

fn syntax_error(offset: usize, message: impl Into<String>) -> TemplateError {
    TemplateError::TagSyntax {
        offset,
        message: message.into(),
    }
}

/// Scan `text` into fragments covering it completely, in order
pub(crate) fn scan(text: &str, delimiters: &Delimiters) -> TemplateResult<Vec<Fragment>> {
    let open = delimiters.start.as_str();
    let close = delimiters.end.as_str();
    if open.is_empty() || close.is_empty() {
        return Err(syntax_error(0, "tag delimiters must not be empty"));
    }

    let mut fragments = Vec::new();
    let mut pos = 0;

    while pos < text.len() {
        let next_open = text[pos..].find(open).map(|i| pos + i);
        let next_close = text[pos..].find(close).map(|i| pos + i);

        if let Some(c) = next_close {
            if next_open.map_or(true, |o| c < o) {
                return Err(syntax_error(c, format!("unopened tag: `{}` without `{}`", close, open)));
            }
        }

        let Some(start) = next_open else {
            fragments.push(Fragment::Text { start: pos, end: text.len() });
            break;
        };

        if start > pos {
            fragments.push(Fragment::Text { start: pos, end: start });
        }

        let inner_start = start + open.len();
        let inner_end = text[inner_start..]
            .find(close)
            .map(|i| inner_start + i)
            .ok_or_else(|| syntax_error(start, format!("unclosed tag: `{}` without `{}`", open, close)))?;

        if let Some(i) = text[inner_start..inner_end].find(open) {
            return Err(syntax_error(
                inner_start + i,
                format!("unclosed tag: `{}` found inside a tag", open),
            ));
        }

        let end = inner_end + close.len();
        let (kind, path) = parse_tag(&text[inner_start..inner_end]).map_err(|m| syntax_error(start, m))?;
        fragments.push(Fragment::Tag(RawTag {
            kind,
            path,
            start,
            end,
            offset: start,
        }));
        pos = end;
    }

    Ok(fragments)
}

fn parse_tag(inner: &str) -> Result<(TagKind, Option<TagPath>), String> {
    let inner = inner.trim();
    if inner.is_empty() {
        return Err("empty tag".to_string());
    }

    let (kind, rest) = if let Some(rest) = inner.strip_prefix("%%") {
        (TagKind::CenteredImage, rest)
    } else if let Some(rest) = inner.strip_prefix('%') {
        (TagKind::Image, rest)
    } else if let Some(rest) = inner.strip_prefix('#') {
        (TagKind::LoopOpen, rest)
    } else if let Some(rest) = inner.strip_prefix('^') {
        (TagKind::InvertedOpen, rest)
    } else if let Some(rest) = inner.strip_prefix('/') {
        (TagKind::Close, rest)
    } else {
        (TagKind::Scalar, inner)
    };

    if kind == TagKind::Close && rest.trim().is_empty() {
        return Ok((kind, None));
    }
    if rest.trim().is_empty() {
        return Err(format!("tag `{}` has no name", inner));
    }

    TagPath::parse(rest).map(|p| (kind, Some(p)))
}

/// Pair region open markers with their close markers.
///
/// Returns `(open, close)` index pairs into `tags`, ordered by open index.
pub(crate) fn pair_regions(tags: &[&RawTag]) -> TemplateResult<Vec<(usize, usize)>> {
    let mut stack: Vec<usize> = Vec::new();
    let mut pairs = Vec::new();

    for (i, tag) in tags.iter().enumerate() {
        if tag.kind.is_open() {
            stack.push(i);
        } else if tag.kind == TagKind::Close {
            let Some(open) = stack.pop() else {
                return Err(TemplateError::UnmatchedLoopTag {
                    path: tag.path_str().to_string(),
                    offset: tag.offset,
                    message: "close tag without a matching open tag".to_string(),
                });
            };
            if let Some(ref path) = tag.path {
                if Some(path) != tags[open].path.as_ref() {
                    return Err(TemplateError::UnmatchedLoopTag {
                        path: path.to_string(),
                        offset: tag.offset,
                        message: format!(
                            "close tag does not match open tag `{}` at offset {}",
                            tags[open].path_str(),
                            tags[open].offset
                        ),
                    });
                }
            }
            pairs.push((open, i));
        }
    }

    if let Some(&open) = stack.first() {
        return Err(TemplateError::UnmatchedLoopTag {
            path: tags[open].path_str().to_string(),
            offset: tags[open].offset,
            message: "open tag is never closed".to_string(),
        });
    }

    pairs.sort_unstable();
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan_default(text: &str) -> TemplateResult<Vec<Fragment>> {
        scan(text, &Delimiters::default())
    }

    fn tags(fragments: &[Fragment]) -> Vec<&RawTag> {
        fragments
            .iter()
            .filter_map(|f| match f {
                Fragment::Tag(t) => Some(t),
                Fragment::Text { .. } => None,
            })
            .collect()
    }

    fn syntax_offset(result: TemplateResult<Vec<Fragment>>) -> usize {
        match result {
            Err(TemplateError::TagSyntax { offset, .. }) => offset,
            other => panic!("expected tag syntax error, got {:?}", other),
        }
    }

    #[test]
    fn test_scan_mixed() {
        let fragments = scan_default("Hello {name}, {#items}{item}{/items}!").unwrap();
        assert_eq!(fragments[0], Fragment::Text { start: 0, end: 6 });

        let tags = tags(&fragments);
        assert_eq!(tags.len(), 4);
        assert_eq!(tags[0].kind, TagKind::Scalar);
        assert_eq!(tags[0].path_str(), "name");
        assert_eq!((tags[0].start, tags[0].end), (6, 12));
        assert_eq!(tags[1].kind, TagKind::LoopOpen);
        assert_eq!(tags[3].kind, TagKind::Close);
        assert_eq!(tags[3].path_str(), "items");
        assert!(matches!(fragments.last(), Some(Fragment::Text { .. })));
    }

    #[test]
    fn test_scan_markers() {
        let fragments = scan_default("{%logo}{%%chart}{^rows}{/}{ a.b }").unwrap();
        let tags = tags(&fragments);
        assert_eq!(tags[0].kind, TagKind::Image);
        assert_eq!(tags[1].kind, TagKind::CenteredImage);
        assert_eq!(tags[1].path_str(), "chart");
        assert_eq!(tags[2].kind, TagKind::InvertedOpen);
        assert_eq!(tags[3].kind, TagKind::Close);
        assert_eq!(tags[3].path, None);
        assert_eq!(tags[4].path_str(), "a.b");
    }

    #[test]
    fn test_scan_syntax_errors() {
        assert_eq!(syntax_offset(scan_default("ab {}")), 3);
        assert_eq!(syntax_offset(scan_default("ab {  }")), 3);
        assert_eq!(syntax_offset(scan_default("x {#}")), 2);
        assert_eq!(syntax_offset(scan_default("x {a..b}")), 2);
        assert_eq!(syntax_offset(scan_default("hello {name")), 6);
        assert_eq!(syntax_offset(scan_default("{a {b}")), 3);
        assert_eq!(syntax_offset(scan_default("oops} {a}")), 4);
    }

    #[test]
    fn test_scan_rejects_unknown_markers() {
        assert_eq!(syntax_offset(scan_default("x {@raw}")), 2);
        assert_eq!(syntax_offset(scan_default("{$x}")), 0);
        assert_eq!(syntax_offset(scan_default("ab {!x}")), 3);
        assert_eq!(syntax_offset(scan_default("Dear {first name}")), 5);
        assert_eq!(syntax_offset(scan_default("{#a b}{/}")), 0);
        assert_eq!(syntax_offset(scan_default("{%%logo?}")), 0);
    }

    #[test]
    fn test_custom_delimiters() {
        let delimiters = Delimiters {
            start: "[[".into(),
            end: "]]".into(),
        };
        let fragments = scan("a {b} [[c]]", &delimiters).unwrap();
        let tags = tags(&fragments);
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].path_str(), "c");
        assert_eq!(tags[0].start, 6);
    }

    #[test]
    fn test_pair_regions() {
        let fragments = scan_default("{#a}{#b}{/b}{/}").unwrap();
        let pairs = pair_regions(&tags(&fragments)).unwrap();
        assert_eq!(pairs, vec![(0, 3), (1, 2)]);
    }

    #[test]
    fn test_pair_regions_errors() {
        let unmatched = |text: &str| {
            let fragments = scan_default(text).unwrap();
            match pair_regions(&tags(&fragments)) {
                Err(TemplateError::UnmatchedLoopTag { path, offset, .. }) => (path, offset),
                other => panic!("expected unmatched loop tag, got {:?}", other),
            }
        };

        assert_eq!(unmatched("{#a}text"), ("a".to_string(), 0));
        assert_eq!(unmatched("text{/a}"), ("a".to_string(), 4));
        assert_eq!(unmatched("{#a}{/b}"), ("b".to_string(), 4));
    }
}
