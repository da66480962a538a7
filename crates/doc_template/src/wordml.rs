//! WordprocessingML tokenizer
//!
//! Word splits visible text over many runs, so a tag typed as `{name}` can
//! end up as `<w:t>{na</w:t>` and `<w:t>me}</w:t>`. Text inside `<w:t>`
//! elements is decoded and concatenated per paragraph, scanned for tags, and
//! redistributed back to the runs: a tag is anchored in the run where it
//! starts and its remaining characters are removed from the following runs.
//! Runs that no tag touches keep their original markup.
//!
//! A second pass widens loop regions to whole table rows or paragraphs and
//! turns centered image tags into block images.

use crate::error::{TemplateError, TemplateResult};
use crate::lexer::{self, Fragment, RawTag, TagKind};
use crate::options::RenderOptions;
use docx_package::xml;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::{HashMap, HashSet};

/// Tokenizer output, in document order
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Piece {
    Xml(String),
    Tag { tag: RawTag, block: bool },
}

#[derive(Debug)]
pub(crate) struct Tokenized {
    pub pieces: Vec<Piece>,
    pub max_drawing_id: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Structure {
    Paragraph,
    Row,
}

enum Item<'a> {
    Xml(&'a str),
    Boundary {
        raw: &'a str,
        structure: Structure,
        id: usize,
        open: bool,
        /// Element names enclosing the structure
        outer: Vec<String>,
    },
    Span(usize),
}

/// A `<w:t>` element
struct TextSpan<'a> {
    open_tag: &'a str,
    raw_text: &'a str,
    close_tag: &'a str,
    /// Decoded content
    text: String,
    paragraph: Option<usize>,
    cell: Option<usize>,
    row: Option<usize>,
    stack: Vec<String>,
    /// Offset of the content in the part's logical text
    global_start: usize,
}

struct OpenSpan<'a> {
    open_tag: &'a str,
    content_start: usize,
    text: String,
    paragraph: Option<usize>,
    cell: Option<usize>,
    row: Option<usize>,
    stack: Vec<String>,
}

#[derive(Debug, Clone, Copy)]
struct Site {
    paragraph: Option<usize>,
    cell: Option<usize>,
    row: Option<usize>,
    /// The tag is the only text of its paragraph
    alone: bool,
}

#[derive(Debug, Clone)]
struct TagToken {
    tag: RawTag,
    site: Site,
    stack: Vec<String>,
    block: bool,
}

impl TagToken {
    fn moved_to(&self, bounds: &Bounds) -> Token {
        Token::Tag(TagToken {
            stack: bounds.outer.clone(),
            ..self.clone()
        })
    }
}

enum Token {
    Xml(String),
    Tag(TagToken),
}

/// Token indices of a structure's start and end tags
struct Bounds {
    start: usize,
    end: usize,
    outer: Vec<String>,
}

enum SpanPiece {
    Text(String),
    Tag(RawTag, bool),
}

struct Walk<'a> {
    items: Vec<Item<'a>>,
    spans: Vec<TextSpan<'a>>,
    max_drawing_id: u32,
}

/// Tokenize a WordprocessingML part
pub(crate) fn tokenize(content: &str, options: &RenderOptions) -> TemplateResult<Tokenized> {
    let walk = walk(content)?;
    let rewrites = redistribute(&walk.spans, options)?;
    let (tokens, paragraphs, rows) = assemble(walk.items, &walk.spans, rewrites);
    let tokens = expand(tokens, &paragraphs, &rows, options)?;
    check_balance(&tokens)?;

    let mut pieces: Vec<Piece> = Vec::new();
    for token in tokens {
        match token {
            Token::Xml(s) => match pieces.last_mut() {
                Some(Piece::Xml(prev)) => prev.push_str(&s),
                _ => pieces.push(Piece::Xml(s)),
            },
            Token::Tag(t) => pieces.push(Piece::Tag {
                tag: t.tag,
                block: t.block,
            }),
        }
    }

    Ok(Tokenized {
        pieces,
        max_drawing_id: walk.max_drawing_id,
    })
}

fn element_name(name: &[u8]) -> String {
    String::from_utf8_lossy(name).into_owned()
}

/// Partition the part into raw items, collecting text spans
fn walk(content: &str) -> TemplateResult<Walk<'_>> {
    let mut reader = Reader::from_str(content);

    let mut items = Vec::new();
    let mut spans: Vec<TextSpan> = Vec::new();
    let mut stack: Vec<String> = Vec::new();
    let mut paragraphs: Vec<usize> = Vec::new();
    let mut rows: Vec<usize> = Vec::new();
    let mut cells: Vec<usize> = Vec::new();
    let (mut next_paragraph, mut next_row, mut next_cell) = (0usize, 0usize, 0usize);
    let mut max_drawing_id = 0u32;
    let mut current: Option<OpenSpan> = None;
    let mut global = 0usize;
    let mut prev = 0usize;

    loop {
        let event = reader.read_event()?;
        let now = reader.buffer_position() as usize;
        let start = prev;
        let raw = &content[start..now];
        prev = now;

        if let Some(open) = current.as_mut() {
            match event {
                Event::Text(ref t) => open.text.push_str(&t.unescape()?),
                Event::CData(ref c) => open.text.push_str(&String::from_utf8_lossy(c)),
                Event::End(ref e) if e.name().as_ref() == b"w:t" => {
                    if let Some(open) = current.take() {
                        stack.pop();
                        let len = open.text.len();
                        spans.push(TextSpan {
                            open_tag: open.open_tag,
                            raw_text: &content[open.content_start..start],
                            close_tag: raw,
                            text: open.text,
                            paragraph: open.paragraph,
                            cell: open.cell,
                            row: open.row,
                            stack: open.stack,
                            global_start: global,
                        });
                        global += len;
                        items.push(Item::Span(spans.len() - 1));
                    }
                }
                Event::Eof => return Err(TemplateError::Xml("unexpected end of part inside <w:t>".into())),
                _ => {}
            }
            continue;
        }

        match event {
            Event::Start(ref e) => {
                let name = e.name();
                if xml::matches_element(name.as_ref(), "docPr") {
                    max_drawing_id = max_drawing_id.max(drawing_id(e));
                }
                match name.as_ref() {
                    b"w:t" => {
                        stack.push(element_name(name.as_ref()));
                        current = Some(OpenSpan {
                            open_tag: raw,
                            content_start: now,
                            text: String::new(),
                            paragraph: paragraphs.last().copied(),
                            cell: cells.last().copied(),
                            row: rows.last().copied(),
                            stack: stack.clone(),
                        });
                        continue;
                    }
                    b"w:p" | b"w:tr" => {
                        let (structure, id) = if name.as_ref() == b"w:p" {
                            next_paragraph += 1;
                            paragraphs.push(next_paragraph);
                            (Structure::Paragraph, next_paragraph)
                        } else {
                            next_row += 1;
                            rows.push(next_row);
                            (Structure::Row, next_row)
                        };
                        items.push(Item::Boundary {
                            raw,
                            structure,
                            id,
                            open: true,
                            outer: stack.clone(),
                        });
                    }
                    b"w:tc" => {
                        next_cell += 1;
                        cells.push(next_cell);
                        items.push(Item::Xml(raw));
                    }
                    _ => items.push(Item::Xml(raw)),
                }
                stack.push(element_name(name.as_ref()));
            }
            Event::End(ref e) => {
                stack.pop();
                let closed = match e.name().as_ref() {
                    b"w:p" => paragraphs.pop().map(|id| (Structure::Paragraph, id)),
                    b"w:tr" => rows.pop().map(|id| (Structure::Row, id)),
                    b"w:tc" => {
                        cells.pop();
                        None
                    }
                    _ => None,
                };
                match closed {
                    Some((structure, id)) => items.push(Item::Boundary {
                        raw,
                        structure,
                        id,
                        open: false,
                        outer: Vec::new(),
                    }),
                    None => items.push(Item::Xml(raw)),
                }
            }
            Event::Empty(ref e) => {
                if xml::matches_element(e.name().as_ref(), "docPr") {
                    max_drawing_id = max_drawing_id.max(drawing_id(e));
                }
                items.push(Item::Xml(raw));
            }
            Event::Eof => break,
            _ => items.push(Item::Xml(raw)),
        }
    }

    Ok(Walk {
        items,
        spans,
        max_drawing_id,
    })
}

fn drawing_id(e: &quick_xml::events::BytesStart) -> u32 {
    xml::get_attribute(e, b"id")
        .and_then(|id| id.parse().ok())
        .unwrap_or(0)
}

/// Scan each paragraph's text and compute the new content of every span a
/// tag touches
fn redistribute(spans: &[TextSpan], options: &RenderOptions) -> TemplateResult<HashMap<usize, Vec<SpanPiece>>> {
    let mut groups: Vec<Vec<usize>> = Vec::new();
    let mut by_paragraph: HashMap<usize, usize> = HashMap::new();
    for (i, span) in spans.iter().enumerate() {
        match span.paragraph {
            Some(p) => {
                let g = *by_paragraph.entry(p).or_insert_with(|| {
                    groups.push(Vec::new());
                    groups.len() - 1
                });
                groups[g].push(i);
            }
            None => groups.push(vec![i]),
        }
    }

    let delimiters = &options.delimiters;
    let mut rewrites = HashMap::new();

    for group in &groups {
        let mut text = String::new();
        let mut bounds = Vec::with_capacity(group.len());
        for &i in group {
            let start = text.len();
            text.push_str(&spans[i].text);
            bounds.push((start, text.len()));
        }

        if !text.contains(delimiters.start.as_str()) && !text.contains(delimiters.end.as_str()) {
            continue;
        }

        let locate = |pos: usize| bounds.iter().position(|&(s, e)| s <= pos && pos < e);
        let to_global = |pos: usize| match locate(pos) {
            Some(j) => spans[group[j]].global_start + pos - bounds[j].0,
            None => group
                .last()
                .map(|&i| spans[i].global_start + spans[i].text.len())
                .unwrap_or(0),
        };

        let fragments = lexer::scan(&text, delimiters).map_err(|err| match err {
            TemplateError::TagSyntax { offset, message } => TemplateError::TagSyntax {
                offset: to_global(offset),
                message,
            },
            other => other,
        })?;

        let mut pieces: Vec<Vec<SpanPiece>> = (0..group.len()).map(|_| Vec::new()).collect();
        for fragment in fragments {
            match fragment {
                Fragment::Text { start, end } => {
                    for (j, &(s, e)) in bounds.iter().enumerate() {
                        let (a, b) = (start.max(s), end.min(e));
                        if a < b {
                            pieces[j].push(SpanPiece::Text(text[a..b].to_string()));
                        }
                    }
                }
                Fragment::Tag(mut tag) => {
                    let Some(j) = locate(tag.start) else { continue };
                    tag.offset = to_global(tag.start);
                    let alone = text.trim() == &text[tag.start..tag.end];
                    pieces[j].push(SpanPiece::Tag(tag, alone));
                }
            }
        }

        for (j, &i) in group.iter().enumerate() {
            let untouched = match pieces[j].as_slice() {
                [] => spans[i].text.is_empty(),
                [SpanPiece::Text(t)] => *t == spans[i].text,
                _ => false,
            };
            if !untouched {
                rewrites.insert(i, std::mem::take(&mut pieces[j]));
            }
        }
    }

    Ok(rewrites)
}

fn preserve_space(open_tag: &str) -> String {
    if open_tag.contains("xml:space") {
        return open_tag.to_string();
    }
    match open_tag.strip_suffix('>') {
        Some(head) => format!(r#"{} xml:space="preserve">"#, head),
        None => open_tag.to_string(),
    }
}

type BoundsMap = HashMap<usize, Bounds>;

/// Turn items into tokens, recording where paragraphs and rows start and end
fn assemble(
    items: Vec<Item>,
    spans: &[TextSpan],
    mut rewrites: HashMap<usize, Vec<SpanPiece>>,
) -> (Vec<Token>, BoundsMap, BoundsMap) {
    let mut tokens = Vec::new();
    let mut paragraphs = BoundsMap::new();
    let mut rows = BoundsMap::new();

    for item in items {
        match item {
            Item::Xml(s) => tokens.push(Token::Xml(s.to_string())),
            Item::Boundary {
                raw,
                structure,
                id,
                open,
                outer,
            } => {
                let map = match structure {
                    Structure::Paragraph => &mut paragraphs,
                    Structure::Row => &mut rows,
                };
                if open {
                    map.insert(
                        id,
                        Bounds {
                            start: tokens.len(),
                            end: tokens.len(),
                            outer,
                        },
                    );
                } else if let Some(bounds) = map.get_mut(&id) {
                    bounds.end = tokens.len();
                }
                tokens.push(Token::Xml(raw.to_string()));
            }
            Item::Span(i) => {
                let span = &spans[i];
                match rewrites.remove(&i) {
                    None => tokens.push(Token::Xml(format!("{}{}{}", span.open_tag, span.raw_text, span.close_tag))),
                    Some(pieces) => {
                        tokens.push(Token::Xml(preserve_space(span.open_tag)));
                        for piece in pieces {
                            match piece {
                                SpanPiece::Text(t) => tokens.push(Token::Xml(xml::escape(&t))),
                                SpanPiece::Tag(tag, alone) => tokens.push(Token::Tag(TagToken {
                                    tag,
                                    site: Site {
                                        paragraph: span.paragraph,
                                        cell: span.cell,
                                        row: span.row,
                                        alone,
                                    },
                                    stack: span.stack.clone(),
                                    block: false,
                                })),
                            }
                        }
                        tokens.push(Token::Xml(span.close_tag.to_string()));
                    }
                }
            }
        }
    }

    (tokens, paragraphs, rows)
}

fn tag_indices(tokens: &[Token]) -> Vec<usize> {
    tokens
        .iter()
        .enumerate()
        .filter_map(|(i, t)| matches!(t, Token::Tag(_)).then_some(i))
        .collect()
}

fn tag_at(tokens: &[Token], i: usize) -> Option<&TagToken> {
    match tokens.get(i) {
        Some(Token::Tag(t)) => Some(t),
        _ => None,
    }
}

/// Widen loops to rows and paragraphs, and place block images
fn expand(tokens: Vec<Token>, paragraphs: &BoundsMap, rows: &BoundsMap, options: &RenderOptions) -> TemplateResult<Vec<Token>> {
    let indices = tag_indices(&tokens);
    let raw: Vec<&RawTag> = indices
        .iter()
        .filter_map(|&i| tag_at(&tokens, i))
        .map(|t| &t.tag)
        .collect();
    let pairs = lexer::pair_regions(&raw)?;

    let mut removed = vec![false; tokens.len()];
    let mut before: HashMap<usize, Vec<Token>> = HashMap::new();
    let mut after: HashMap<usize, Vec<Token>> = HashMap::new();
    let mut claimed_rows = HashSet::new();
    let mut dropped: Vec<&Bounds> = Vec::new();

    for (o, c) in pairs {
        let (oi, ci) = (indices[o], indices[c]);
        let (Some(open), Some(close)) = (tag_at(&tokens, oi), tag_at(&tokens, ci)) else {
            continue;
        };

        // Open and close in different cells of one row repeat the row
        if let (Some(row), Some(close_row)) = (open.site.row, close.site.row) {
            if row == close_row && open.site.cell != close.site.cell {
                if let Some(bounds) = rows.get(&row) {
                    if !claimed_rows.insert(row) {
                        return Err(TemplateError::UnmatchedLoopTag {
                            path: open.tag.path_str().to_string(),
                            offset: open.tag.offset,
                            message: "table row is already repeated by another loop".to_string(),
                        });
                    }
                    removed[oi] = true;
                    removed[ci] = true;
                    before.entry(bounds.start).or_default().push(open.moved_to(bounds));
                    after.entry(bounds.end).or_default().insert(0, close.moved_to(bounds));
                }
                continue;
            }
        }

        if !(options.paragraph_loop && open.site.alone && close.site.alone) {
            continue;
        }
        let (Some(po), Some(pc)) = (open.site.paragraph, close.site.paragraph) else {
            continue;
        };
        if po == pc {
            continue;
        }
        if let (Some(open_bounds), Some(close_bounds)) = (paragraphs.get(&po), paragraphs.get(&pc)) {
            for (tag, bounds) in [(open, open_bounds), (close, close_bounds)] {
                removed[bounds.start..=bounds.end].iter_mut().for_each(|r| *r = true);
                before.entry(bounds.start).or_default().push(tag.moved_to(bounds));
                dropped.push(bounds);
            }
        }
    }

    for &i in &indices {
        let Some(t) = tag_at(&tokens, i) else { continue };
        let centered = t.tag.kind == TagKind::CenteredImage || (t.tag.kind == TagKind::Image && options.image.centered);
        if !(centered && t.site.alone) {
            continue;
        }
        if let Some(bounds) = t.site.paragraph.and_then(|p| paragraphs.get(&p)) {
            removed[bounds.start..=bounds.end].iter_mut().for_each(|r| *r = true);
            let block = TagToken {
                block: true,
                stack: bounds.outer.clone(),
                ..t.clone()
            };
            before.entry(bounds.start).or_default().push(Token::Tag(block));
            dropped.push(bounds);
        }
    }

    // A table cell must keep at least one paragraph
    for bounds in dropped {
        if bounds.outer.last().map(String::as_str) == Some("w:tc") && ends_cell(&tokens, &removed, &before, bounds.end) {
            after.entry(bounds.end).or_default().push(Token::Xml("<w:p/>".to_string()));
        }
    }

    let mut out = Vec::with_capacity(tokens.len());
    for (i, token) in tokens.into_iter().enumerate() {
        if let Some(list) = before.remove(&i) {
            out.extend(list);
        }
        if !removed[i] {
            out.push(token);
        }
        if let Some(list) = after.remove(&i) {
            out.extend(list);
        }
    }
    Ok(out)
}

/// Whether nothing but whitespace and dropped markup follows `end` before
/// the enclosing cell closes
fn ends_cell(tokens: &[Token], removed: &[bool], before: &HashMap<usize, Vec<Token>>, end: usize) -> bool {
    for (i, token) in tokens.iter().enumerate().skip(end + 1) {
        if before.contains_key(&i) {
            return false;
        }
        if removed[i] {
            continue;
        }
        match token {
            Token::Xml(s) if s.trim().is_empty() => continue,
            Token::Xml(s) => return s.trim_start().starts_with("</w:tc>"),
            Token::Tag(_) => return false,
        }
    }
    false
}

/// A repeated region must close every element it opens
fn check_balance(tokens: &[Token]) -> TemplateResult<()> {
    let tags: Vec<&TagToken> = tokens
        .iter()
        .filter_map(|t| match t {
            Token::Tag(t) => Some(t),
            Token::Xml(_) => None,
        })
        .collect();
    let raw: Vec<&RawTag> = tags.iter().map(|t| &t.tag).collect();

    for (o, c) in lexer::pair_regions(&raw)? {
        if tags[o].stack != tags[c].stack {
            return Err(TemplateError::UnmatchedLoopTag {
                path: tags[o].tag.path_str().to_string(),
                offset: tags[o].tag.offset,
                message: format!(
                    "open and close tags are in different document structures (close at offset {})",
                    tags[c].tag.offset
                ),
            });
        }
    }
    Ok(())
}
