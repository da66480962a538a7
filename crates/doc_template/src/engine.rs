//! Substitution engine
//!
//! Walks a parsed [`Template`] against a [`Context`]. Missing variables are
//! collected as records and rendering continues; a loop over a non-sequence
//! or an image the provider cannot resolve aborts the render.

use crate::ast::{Markup, Node, Tag, Template};
use crate::context::{Context, Scope, Value};
use crate::error::{ErrorRecord, TemplateError, TemplateResult};
use crate::image::ImageProvider;
use crate::options::{MissingPolicy, RenderOptions};
use docx_package::media::{self, ImageFormat};
use docx_package::xml;

/// An image resolved while rendering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedImage {
    pub reference: String,
    pub data: Vec<u8>,
    pub format: ImageFormat,
    pub width_px: u32,
    pub height_px: u32,
}

/// Where an embedded image ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRef {
    /// Relationship id used by `r:embed`
    pub rel_id: String,
    /// Unique `wp:docPr` id
    pub drawing_id: u32,
}

/// Receives embedded images in exchange for a relationship id
pub trait MediaSink {
    fn embed(&mut self, image: EmbeddedImage) -> MediaRef;
}

/// Keeps embedded images in memory, numbering them sequentially
#[derive(Debug, Clone, Default)]
pub struct CollectingSink {
    images: Vec<EmbeddedImage>,
    first_drawing_id: u32,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start drawing ids after `max_drawing_id`
    pub fn after(max_drawing_id: u32) -> Self {
        Self {
            images: Vec::new(),
            first_drawing_id: max_drawing_id,
        }
    }

    pub fn images(&self) -> &[EmbeddedImage] {
        &self.images
    }

    pub fn into_images(self) -> Vec<EmbeddedImage> {
        self.images
    }
}

impl MediaSink for CollectingSink {
    fn embed(&mut self, image: EmbeddedImage) -> MediaRef {
        self.images.push(image);
        let n = self.images.len() as u32;
        MediaRef {
            rel_id: format!("rId{}", n),
            drawing_id: self.first_drawing_id + n,
        }
    }
}

/// Rendered text plus the missing-variable records found on the way
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderedFragment {
    pub text: String,
    pub warnings: Vec<ErrorRecord>,
}

/// Renders templates against contexts
pub struct Renderer<'a> {
    options: &'a RenderOptions,
    images: &'a dyn ImageProvider,
}

struct RenderState<'s> {
    out: String,
    warnings: Vec<ErrorRecord>,
    markup: Markup,
    sink: &'s mut dyn MediaSink,
}

impl<'a> Renderer<'a> {
    pub fn new(options: &'a RenderOptions, images: &'a dyn ImageProvider) -> Self {
        Self { options, images }
    }

    /// Render and apply the missing-variable policy
    pub fn render(&self, template: &Template, context: &Context, sink: &mut dyn MediaSink) -> TemplateResult<RenderedFragment> {
        let fragment = self.render_fragment(template, context, sink)?;
        if self.options.missing == MissingPolicy::Strict && !fragment.warnings.is_empty() {
            return Err(TemplateError::MissingVariables(fragment.warnings));
        }
        Ok(fragment)
    }

    /// Render, returning missing-variable records without failing on them
    pub fn render_fragment(
        &self,
        template: &Template,
        context: &Context,
        sink: &mut dyn MediaSink,
    ) -> TemplateResult<RenderedFragment> {
        let mut state = RenderState {
            out: String::new(),
            warnings: Vec::new(),
            markup: template.markup(),
            sink,
        };
        let mut scope = Scope::new(context);
        self.render_nodes(template.nodes(), &mut scope, &mut state)?;

        Ok(RenderedFragment {
            text: state.out,
            warnings: state.warnings,
        })
    }

    fn render_nodes<'c>(&self, nodes: &[Node], scope: &mut Scope<'c>, state: &mut RenderState<'_>) -> TemplateResult<()> {
        for node in nodes {
            match node {
                Node::Literal(text) => state.out.push_str(text),
                Node::ScalarTag(tag) => self.render_scalar(tag, scope, state),
                Node::LoopTag { tag, body } => match scope.lookup(&tag.path) {
                    None => self.missing(tag, state),
                    Some(Value::List(items)) => {
                        for item in items {
                            scope.push(item);
                            let result = self.render_nodes(body, scope, state);
                            scope.pop();
                            result?;
                        }
                    }
                    Some(other) => {
                        return Err(TemplateError::TypeNotIterable {
                            path: tag.path.to_string(),
                            offset: tag.offset,
                            found: other.type_name(),
                        })
                    }
                },
                Node::InvertedTag { tag, body } => {
                    if scope.lookup(&tag.path).map_or(true, Value::is_falsy) {
                        self.render_nodes(body, scope, state)?;
                    }
                }
                Node::ImageTag { tag, block } => self.render_image(tag, *block, scope, state)?,
            }
        }
        Ok(())
    }

    fn missing(&self, tag: &Tag, state: &mut RenderState<'_>) {
        if self.options.missing == MissingPolicy::Empty {
            return;
        }
        tracing::warn!(path = %tag.path, offset = tag.offset, "missing variable");
        state
            .warnings
            .push(ErrorRecord::missing_variable(tag.path.as_str(), tag.offset));
    }

    fn render_scalar(&self, tag: &Tag, scope: &Scope<'_>, state: &mut RenderState<'_>) {
        let Some(value) = scope.lookup(&tag.path) else {
            self.missing(tag, state);
            return;
        };
        let Some(text) = value.to_scalar_string() else {
            tracing::warn!(path = %tag.path, kind = value.type_name(), "non-scalar value in a text tag");
            return;
        };

        match state.markup {
            Markup::PlainText => state.out.push_str(&text),
            Markup::WordprocessingMl => {
                let escaped = xml::escape(&text);
                if self.options.linebreaks && escaped.contains('\n') {
                    let normalized = escaped.replace("\r\n", "\n");
                    state
                        .out
                        .push_str(&normalized.replace('\n', r#"</w:t><w:br/><w:t xml:space="preserve">"#));
                } else {
                    state.out.push_str(&escaped);
                }
            }
        }
    }

    fn render_image(&self, tag: &Tag, block: bool, scope: &Scope<'_>, state: &mut RenderState<'_>) -> TemplateResult<()> {
        let unresolved = |cause: crate::error::ProviderError| TemplateError::ImageResolution {
            path: tag.path.to_string(),
            offset: tag.offset,
            cause,
        };

        let reference = match scope.lookup(&tag.path) {
            None => {
                self.missing(tag, state);
                return Ok(());
            }
            Some(Value::Null) => return Ok(()),
            Some(Value::Image(r)) => r.as_str(),
            Some(Value::Text(s)) => s.as_str(),
            Some(other) => {
                return Err(unresolved(
                    format!("expected an image reference, found {}", other.type_name()).into(),
                ))
            }
        };
        if reference.is_empty() {
            return Ok(());
        }

        let data = self.images.fetch(reference).map_err(unresolved)?;
        let format = ImageFormat::from_bytes(&data);
        if !format.is_supported() {
            return Err(unresolved(format!("unsupported image data for `{}`", reference).into()));
        }
        let (width_px, height_px) = self.images.size(reference).map_err(unresolved)?;

        let media = state.sink.embed(EmbeddedImage {
            reference: reference.to_string(),
            data,
            format,
            width_px,
            height_px,
        });
        tracing::debug!(reference, rel_id = %media.rel_id, "embedded image");

        if state.markup == Markup::PlainText {
            return Ok(());
        }

        let drawing = media::inline_drawing_xml(
            &media.rel_id,
            media.drawing_id,
            media::pixels_to_emu(width_px),
            media::pixels_to_emu(height_px),
            &image_name(reference),
        );
        if block {
            state.out.push_str(r#"<w:p><w:pPr><w:jc w:val="center"/></w:pPr><w:r>"#);
            state.out.push_str(&drawing);
            state.out.push_str("</w:r></w:p>");
        } else {
            state.out.push_str("</w:t>");
            state.out.push_str(&drawing);
            state.out.push_str(r#"<w:t xml:space="preserve">"#);
        }
        Ok(())
    }
}

fn image_name(reference: &str) -> String {
    reference
        .rsplit(&['/', '\\'][..])
        .next()
        .unwrap_or(reference)
        .to_string()
}

/// Render a template with a one-off [`Renderer`]
pub fn render(
    template: &Template,
    context: &Context,
    images: &dyn ImageProvider,
    sink: &mut dyn MediaSink,
    options: &RenderOptions,
) -> TemplateResult<RenderedFragment> {
    Renderer::new(options, images).render(template, context, sink)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ImageRef;
    use crate::error::ErrorKind;
    use crate::image::MemoryImageProvider;

    const PNG: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

    fn scenario_context(items: Vec<Context>) -> Context {
        Context::new().with("name", "Ali").with("items", items)
    }

    fn item(name: &str, qty: i64) -> Context {
        Context::new().with("item", name).with("qty", qty)
    }

    fn render_text(text: &str, context: &Context) -> TemplateResult<RenderedFragment> {
        let options = RenderOptions::default();
        let template = Template::parse_text(text, &options)?;
        render(&template, context, &MemoryImageProvider::new(), &mut CollectingSink::new(), &options)
    }

    const SCENARIO: &str = "Hello {name}, you have {#items}{item} - {qty}; {/items}";

    #[test]
    fn test_scenario_loop() {
        let ctx = scenario_context(vec![item("A", 2), item("B", 1)]);
        let fragment = render_text(SCENARIO, &ctx).unwrap();
        assert_eq!(fragment.text, "Hello Ali, you have A - 2; B - 1; ");
        assert!(fragment.warnings.is_empty());
    }

    #[test]
    fn test_scenario_empty_loop() {
        let ctx = scenario_context(vec![]);
        assert_eq!(render_text(SCENARIO, &ctx).unwrap().text, "Hello Ali, you have ");
    }

    #[test]
    fn test_missing_variable_is_recorded() {
        let fragment = render_text("Dear {title} {name}", &Context::new().with("name", "Ali")).unwrap();
        assert_eq!(fragment.text, "Dear  Ali");
        assert_eq!(fragment.warnings.len(), 1);
        assert_eq!(fragment.warnings[0].kind, ErrorKind::MissingVariable);
        assert_eq!(fragment.warnings[0].tag_path.as_deref(), Some("title"));
        assert_eq!(fragment.warnings[0].offset, Some(5));
    }

    #[test]
    fn test_missing_policy_empty_and_strict() {
        let template = Template::parse_text("{a}{b}", &RenderOptions::default()).unwrap();
        let images = MemoryImageProvider::new();

        let empty = RenderOptions::default().with_missing(MissingPolicy::Empty);
        let fragment = render(&template, &Context::new(), &images, &mut CollectingSink::new(), &empty).unwrap();
        assert!(fragment.warnings.is_empty());

        let strict = RenderOptions::default().with_missing(MissingPolicy::Strict);
        match render(&template, &Context::new(), &images, &mut CollectingSink::new(), &strict) {
            Err(TemplateError::MissingVariables(records)) => assert_eq!(records.len(), 2),
            other => panic!("expected missing variables, got {:?}", other),
        }
    }

    #[test]
    fn test_loop_over_scalar_is_not_iterable() {
        let ctx = Context::new().with("items", "oops");
        assert!(matches!(
            render_text("{#items}x{/items}", &ctx),
            Err(TemplateError::TypeNotIterable { found: "text", .. })
        ));
    }

    #[test]
    fn test_nested_scope_shadowing() {
        let ctx = Context::new()
            .with("name", "outer")
            .with("unit", "kg")
            .with("items", vec![Context::new().with("name", "inner")]);
        let fragment = render_text("{#items}{name} {unit}{/items} {name}", &ctx).unwrap();
        assert_eq!(fragment.text, "inner kg outer");
    }

    #[test]
    fn test_inverted_section() {
        let ctx = Context::new().with("items", Vec::<Context>::new()).with("flag", true);
        let fragment = render_text("{^items}none{/items}{^flag}off{/flag}{^missing}?{/}", &ctx).unwrap();
        assert_eq!(fragment.text, "none?");
        assert!(fragment.warnings.is_empty());
    }

    #[test]
    fn test_idempotent() {
        let ctx = scenario_context(vec![item("A", 2)]);
        let first = render_text(SCENARIO, &ctx).unwrap();
        let second = render_text(SCENARIO, &ctx).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_xml_escaping_and_linebreaks() {
        let options = RenderOptions::default();
        let template = Template::parse_xml("<w:p><w:r><w:t>{note}</w:t></w:r></w:p>", &options).unwrap();
        let ctx = Context::new().with("note", "a < b\nc");
        let fragment = render(&template, &ctx, &MemoryImageProvider::new(), &mut CollectingSink::new(), &options).unwrap();
        assert_eq!(
            fragment.text,
            r#"<w:p><w:r><w:t xml:space="preserve">a &lt; b</w:t><w:br/><w:t xml:space="preserve">c</w:t></w:r></w:p>"#
        );
    }

    #[test]
    fn test_image_provider_failure_aborts() {
        let ctx = Context::new().with("logo", ImageRef::new("missing.png"));
        match render_text("Logo: {%logo}", &ctx) {
            Err(err) => {
                let records = err.into_records();
                assert_eq!(records.len(), 1);
                assert_eq!(records[0].kind, ErrorKind::ImageResolution);
                assert!(records[0].cause.as_deref().unwrap().contains("not found"));
            }
            Ok(fragment) => panic!("expected failure, got {:?}", fragment),
        }
    }

    #[test]
    fn test_unsupported_image_bytes() {
        let options = RenderOptions::default();
        let template = Template::parse_text("{%logo}", &options).unwrap();
        let images = MemoryImageProvider::new().with_image("logo", b"not an image".to_vec(), (1, 1));
        let ctx = Context::new().with("logo", "logo");
        assert!(matches!(
            render(&template, &ctx, &images, &mut CollectingSink::new(), &options),
            Err(TemplateError::ImageResolution { .. })
        ));
    }

    #[test]
    fn test_inline_image_markup() {
        let options = RenderOptions::default();
        let template = Template::parse_xml("<w:p><w:r><w:t>{%logo}</w:t></w:r></w:p>", &options).unwrap();
        let images = MemoryImageProvider::new().with_image("img/logo.png", PNG.to_vec(), (96, 48));
        let ctx = Context::new().with("logo", ImageRef::new("img/logo.png"));
        let mut sink = CollectingSink::after(3);

        let fragment = render(&template, &ctx, &images, &mut sink, &options).unwrap();
        assert!(fragment.text.contains(r#"</w:t><w:drawing>"#));
        assert!(fragment.text.contains(r#"<wp:extent cx="914400" cy="457200"/>"#));
        assert!(fragment.text.contains(r#"<wp:docPr id="4" name="logo.png""#));
        assert_eq!(sink.images().len(), 1);
        assert_eq!(sink.images()[0].format, ImageFormat::Png);
    }

    #[test]
    fn test_block_image_markup() {
        let options = RenderOptions::default();
        let template = Template::parse_xml("<w:body><w:p><w:r><w:t>{%%chart}</w:t></w:r></w:p></w:body>", &options).unwrap();
        let images = MemoryImageProvider::new().with_image("chart", PNG.to_vec(), (600, 360));
        let ctx = Context::new().with("chart", "chart");

        let fragment = render(&template, &ctx, &images, &mut CollectingSink::new(), &options).unwrap();
        assert!(fragment
            .text
            .starts_with(r#"<w:body><w:p><w:pPr><w:jc w:val="center"/></w:pPr><w:r><w:drawing>"#));
        assert!(fragment.text.ends_with("</w:drawing></w:r></w:p></w:body>"));
    }

    #[test]
    fn test_current_item_path() {
        let ctx = Context::from_json(serde_json::json!({"tags": ["x", "y"]})).unwrap();
        assert_eq!(render_text("{#tags}[{.}]{/tags}", &ctx).unwrap().text, "[x][y]");
    }
}
