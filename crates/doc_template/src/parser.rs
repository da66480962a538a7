//! Template parser
//!
//! Builds the node tree from scanned fragments. Plain strings are scanned
//! directly; WordprocessingML parts go through [`crate::wordml`] first.

use crate::ast::{Markup, Node, Tag, Template};
use crate::error::{TemplateError, TemplateResult};
use crate::lexer::{self, Fragment, RawTag, TagKind};
use crate::options::RenderOptions;
use crate::wordml::{self, Piece};

impl Template {
    /// Parse a plain-text template
    pub fn parse_text(text: &str, options: &RenderOptions) -> TemplateResult<Self> {
        let pieces = lexer::scan(text, &options.delimiters)?
            .into_iter()
            .map(|fragment| match fragment {
                Fragment::Text { start, end } => Piece::Xml(text[start..end].to_string()),
                Fragment::Tag(tag) => Piece::Tag { tag, block: false },
            })
            .collect();
        let nodes = build_tree(pieces)?;

        Ok(Self {
            nodes,
            markup: Markup::PlainText,
            max_drawing_id: 0,
        })
    }

    /// Parse a WordprocessingML part (`word/document.xml`, headers, footers)
    pub fn parse_xml(content: &str, options: &RenderOptions) -> TemplateResult<Self> {
        let tokenized = wordml::tokenize(content, options)?;
        let nodes = build_tree(tokenized.pieces)?;

        Ok(Self {
            nodes,
            markup: Markup::WordprocessingMl,
            max_drawing_id: tokenized.max_drawing_id,
        })
    }
}

struct OpenRegion {
    raw: RawTag,
    body: Vec<Node>,
}

fn to_tag(raw: &RawTag) -> TemplateResult<Tag> {
    match raw.path {
        Some(ref path) => Ok(Tag {
            path: path.clone(),
            offset: raw.offset,
        }),
        None => Err(TemplateError::TagSyntax {
            offset: raw.offset,
            message: "tag has no name".to_string(),
        }),
    }
}

fn build_tree(pieces: Vec<Piece>) -> TemplateResult<Vec<Node>> {
    {
        let raw: Vec<&RawTag> = pieces
            .iter()
            .filter_map(|p| match p {
                Piece::Tag { tag, .. } => Some(tag),
                Piece::Xml(_) => None,
            })
            .collect();
        lexer::pair_regions(&raw)?;
    }

    let mut root: Vec<Node> = Vec::new();
    let mut stack: Vec<OpenRegion> = Vec::new();

    for piece in pieces {
        let node = match piece {
            Piece::Xml(text) => {
                if text.is_empty() {
                    continue;
                }
                Node::Literal(text)
            }
            Piece::Tag { tag: raw, block } => match raw.kind {
                TagKind::Scalar => Node::ScalarTag(to_tag(&raw)?),
                TagKind::Image | TagKind::CenteredImage => Node::ImageTag {
                    tag: to_tag(&raw)?,
                    block,
                },
                TagKind::LoopOpen | TagKind::InvertedOpen => {
                    stack.push(OpenRegion { raw, body: Vec::new() });
                    continue;
                }
                TagKind::Close => {
                    let region = stack.pop().ok_or_else(|| TemplateError::UnmatchedLoopTag {
                        path: raw.path_str().to_string(),
                        offset: raw.offset,
                        message: "close tag without a matching open tag".to_string(),
                    })?;
                    let tag = to_tag(&region.raw)?;
                    if region.raw.kind == TagKind::InvertedOpen {
                        Node::InvertedTag { tag, body: region.body }
                    } else {
                        Node::LoopTag { tag, body: region.body }
                    }
                }
            },
        };

        match stack.last_mut() {
            Some(region) => region.body.push(node),
            None => root.push(node),
        }
    }

    if let Some(region) = stack.first() {
        return Err(TemplateError::UnmatchedLoopTag {
            path: region.raw.path_str().to_string(),
            offset: region.raw.offset,
            message: "open tag is never closed".to_string(),
        });
    }

    Ok(root)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> TemplateResult<Template> {
        Template::parse_text(text, &RenderOptions::default())
    }

    #[test]
    fn test_parse_scenario() {
        let template = parse("Hello {name}, you have {#items}{item} - {qty}; {/items}").unwrap();
        let nodes = template.nodes();
        assert_eq!(nodes.len(), 4);
        assert_eq!(nodes[0], Node::Literal("Hello ".into()));
        assert!(matches!(&nodes[1], Node::ScalarTag(t) if t.path.as_str() == "name" && t.offset == 6));
        assert_eq!(nodes[2], Node::Literal(", you have ".into()));
        match &nodes[3] {
            Node::LoopTag { tag, body } => {
                assert_eq!(tag.path.as_str(), "items");
                assert_eq!(body.len(), 4);
                assert!(matches!(&body[1], Node::Literal(s) if s == " - "));
            }
            other => panic!("expected loop, got {:?}", other),
        }
        assert_eq!(template.markup(), Markup::PlainText);
    }

    #[test]
    fn test_parse_nested_and_inverted() {
        let template = parse("{#a}{#b}x{/b}{/a}{^a}none{/}").unwrap();
        match &template.nodes()[0] {
            Node::LoopTag { body, .. } => assert!(matches!(&body[0], Node::LoopTag { .. })),
            other => panic!("expected loop, got {:?}", other),
        }
        assert!(matches!(&template.nodes()[1], Node::InvertedTag { body, .. } if body.len() == 1));
    }

    #[test]
    fn test_parse_image_tag() {
        let template = parse("{%logo}").unwrap();
        assert!(matches!(&template.nodes()[0], Node::ImageTag { block: false, .. }));
    }

    #[test]
    fn test_unmatched_errors() {
        assert!(matches!(parse("{#items}"), Err(TemplateError::UnmatchedLoopTag { .. })));
        assert!(matches!(parse("{/items}"), Err(TemplateError::UnmatchedLoopTag { .. })));
        assert!(matches!(
            parse("{#items}{/rows}"),
            Err(TemplateError::UnmatchedLoopTag { offset: 8, .. })
        ));
    }

    #[test]
    fn test_static_template() {
        let template = parse("no tags here").unwrap();
        assert!(template.is_static());
        assert!(parse("").unwrap().nodes().is_empty());
    }

    #[test]
    fn test_parse_xml_keeps_drawing_ids() {
        let content = r#"<w:body><w:p><w:r><w:t>{title}</w:t></w:r><w:r><w:drawing><wp:docPr id="4"/></w:drawing></w:r></w:p></w:body>"#;
        let template = Template::parse_xml(content, &RenderOptions::default()).unwrap();
        assert_eq!(template.markup(), Markup::WordprocessingMl);
        assert_eq!(template.max_drawing_id(), 4);
        assert_eq!(template.tags().len(), 1);
    }
}
