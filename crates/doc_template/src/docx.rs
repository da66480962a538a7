//! DOCX report generation
//!
//! [`DocxTemplate`] parses every templatable part of a package up front, then
//! renders them against a context. Embedded images become media parts with
//! relationships and content-type defaults. A render either yields a
//! complete document or the list of everything that went wrong.

use crate::ast::{Tag, Template};
use crate::context::Context;
use crate::engine::{EmbeddedImage, MediaRef, MediaSink, Renderer};
use crate::error::{ErrorRecord, RenderFailure, TemplateError};
use crate::image::ImageProvider;
use crate::options::{MissingPolicy, RenderOptions};
use docx_package::media::{self, ImageFormat, MEDIA_DIR};
use docx_package::{
    part_names, relationship_types, rels_path_for, resolve_target, ContentTypes, Package, PackageError,
    PackageResult, Relationships, TargetMode,
};
use std::collections::{HashMap, HashSet};

/// Output of a successful render
#[derive(Debug, Clone)]
pub struct Generated {
    /// Serialized package
    pub bytes: Vec<u8>,
    /// Missing variables, with the part they were found in
    pub warnings: Vec<ErrorRecord>,
}

#[derive(Debug, Clone)]
struct TemplatePart {
    name: String,
    template: Template,
}

/// A parsed DOCX template
#[derive(Debug, Clone)]
pub struct DocxTemplate {
    package: Package,
    options: RenderOptions,
    parts: Vec<TemplatePart>,
}

impl DocxTemplate {
    /// Open a package and parse its templatable parts
    pub fn from_bytes(bytes: &[u8], options: RenderOptions) -> Result<Self, RenderFailure> {
        let package = Package::open(bytes).map_err(|e| RenderFailure::from_error(e.into(), None))?;
        Self::from_package(package, options)
    }

    /// Parse the templatable parts of an opened package. Errors from all
    /// parts are reported together.
    pub fn from_package(package: Package, options: RenderOptions) -> Result<Self, RenderFailure> {
        let main_part = main_document_part(&package).map_err(|e| RenderFailure::from_error(e.into(), None))?;
        if !package.contains(&main_part) {
            return Err(RenderFailure::from_error(
                PackageError::EntryNotFound(main_part).into(),
                None,
            ));
        }

        let mut parts = Vec::new();
        let mut errors = Vec::new();
        for name in templatable_parts(&package, &main_part) {
            let parsed = package
                .get_entry_str(&name)
                .map_err(TemplateError::from)
                .and_then(|content| Template::parse_xml(content, &options));
            match parsed {
                Ok(template) => parts.push(TemplatePart { name, template }),
                Err(err) => errors.extend(RenderFailure::from_error(err, Some(&name)).errors),
            }
        }

        if !errors.is_empty() {
            tracing::debug!(errors = errors.len(), "template rejected");
            return Err(RenderFailure { errors });
        }

        tracing::debug!(main = %main_part, parts = parts.len(), "parsed template");
        Ok(Self {
            package,
            options,
            parts,
        })
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    pub fn package(&self) -> &Package {
        &self.package
    }

    /// Names of the parsed parts, main document first
    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().map(|p| p.name.as_str())
    }

    pub fn template(&self, part: &str) -> Option<&Template> {
        self.parts.iter().find(|p| p.name == part).map(|p| &p.template)
    }

    /// Every tag with the part it belongs to
    pub fn tags(&self) -> Vec<(&str, &Tag)> {
        self.parts
            .iter()
            .flat_map(|p| p.template.tags().into_iter().map(move |t| (p.name.as_str(), t)))
            .collect()
    }

    /// Render the document. Nothing is produced unless every part renders.
    pub fn render(&self, context: &Context, images: &dyn ImageProvider) -> Result<Generated, RenderFailure> {
        let renderer = Renderer::new(&self.options, images);
        let max_drawing_id = self
            .parts
            .iter()
            .map(|p| p.template.max_drawing_id())
            .max()
            .unwrap_or(0);
        let mut allocator = MediaAllocator::new(&self.package, max_drawing_id);
        let mut package = self.package.clone();
        let mut content_types: Option<ContentTypes> = None;
        let mut warnings = Vec::new();

        for part in &self.parts {
            let fail = |err: TemplateError| RenderFailure::from_error(err, Some(&part.name));
            let rels_path = rels_path_for(&part.name);
            let rels = load_relationships(&package, &rels_path).map_err(|e| fail(e.into()))?;

            let mut sink = PartMedia {
                part: &part.name,
                rels,
                allocator: &mut allocator,
                embedded: HashMap::new(),
                media: Vec::new(),
            };
            let fragment = renderer
                .render_fragment(&part.template, context, &mut sink)
                .map_err(fail)?;

            warnings.extend(fragment.warnings.into_iter().map(|w| w.with_part(part.name.as_str())));
            package = package.with_entry(&part.name, fragment.text);

            if !sink.media.is_empty() {
                if content_types.is_none() {
                    content_types = Some(load_content_types(&package).map_err(|e| fail(e.into()))?);
                }
                let ct = content_types.get_or_insert_with(ContentTypes::new);
                tracing::debug!(part = %part.name, images = sink.media.len(), "adding media parts");
                for (entry, format, data) in sink.media {
                    ct.ensure_default(format.extension(), format.mime_type());
                    package = package.with_entry(&entry, data);
                }
                package = package.with_entry(&rels_path, sink.rels.to_xml());
            }
            tracing::debug!(part = %part.name, "rendered part");
        }

        if self.options.missing == MissingPolicy::Strict && !warnings.is_empty() {
            return Err(RenderFailure { errors: warnings });
        }

        if let Some(ct) = content_types {
            package = package.with_entry(part_names::CONTENT_TYPES, ct.to_xml());
        }

        let bytes = package
            .serialize()
            .map_err(|e| RenderFailure::from_error(e.into(), None))?;
        tracing::info!(
            parts = self.parts.len(),
            warnings = warnings.len(),
            bytes = bytes.len(),
            "document generated"
        );

        Ok(Generated { bytes, warnings })
    }
}

/// Main document part, found through the root relationships
fn main_document_part(package: &Package) -> PackageResult<String> {
    if package.contains(part_names::ROOT_RELS) {
        let rels = Relationships::parse(package.get_entry_str(part_names::ROOT_RELS)?)?;
        if let Some(rel) = rels.get_by_type(relationship_types::DOCUMENT) {
            return Ok(resolve_target("", &rel.target));
        }
    }
    Ok(part_names::MAIN_DOCUMENT.to_string())
}

fn is_templatable_name(file: &str) -> bool {
    let Some(stem) = file.strip_suffix(".xml") else {
        return false;
    };
    stem.starts_with("header") || stem.starts_with("footer") || stem == "footnotes" || stem == "endnotes"
}

/// The main part first, then headers, footers and notes next to it
fn templatable_parts(package: &Package, main_part: &str) -> Vec<String> {
    let dir = main_part.rsplit_once('/').map(|(d, _)| d);
    let mut parts = vec![main_part.to_string()];

    for name in package.entry_names() {
        let file = match dir {
            Some(d) => name.strip_prefix(d).and_then(|rest| rest.strip_prefix('/')),
            None => Some(name),
        };
        let Some(file) = file else { continue };
        if name != main_part && !file.contains('/') && is_templatable_name(file) {
            parts.push(name.to_string());
        }
    }
    parts
}

fn load_relationships(package: &Package, path: &str) -> PackageResult<Relationships> {
    if package.contains(path) {
        Relationships::parse(package.get_entry_str(path)?)
    } else {
        Ok(Relationships::new())
    }
}

fn load_content_types(package: &Package) -> PackageResult<ContentTypes> {
    if package.contains(part_names::CONTENT_TYPES) {
        ContentTypes::parse(package.get_entry_str(part_names::CONTENT_TYPES)?)
    } else {
        Ok(ContentTypes::new())
    }
}

/// Allocates media names and drawing ids across the whole document
struct MediaAllocator {
    taken: HashSet<String>,
    next_index: u32,
    next_drawing_id: u32,
}

impl MediaAllocator {
    fn new(package: &Package, max_drawing_id: u32) -> Self {
        Self {
            taken: package.entry_names().map(str::to_string).collect(),
            next_index: 1,
            next_drawing_id: max_drawing_id + 1,
        }
    }

    /// Returns the package entry name and the target relative to `part`
    fn media_path(&mut self, part: &str, format: ImageFormat) -> (String, String) {
        let dir = part.rsplit_once('/').map(|(d, _)| d);
        loop {
            let target = format!("{}/{}", MEDIA_DIR, media::media_file_name(self.next_index, format));
            self.next_index += 1;
            let entry = match dir {
                Some(d) => format!("{}/{}", d, target),
                None => target.clone(),
            };
            if self.taken.insert(entry.clone()) {
                return (entry, target);
            }
        }
    }

    fn next_drawing_id(&mut self) -> u32 {
        let id = self.next_drawing_id;
        self.next_drawing_id += 1;
        id
    }
}

/// Media sink for one part: new images go into the part's relationships
struct PartMedia<'p> {
    part: &'p str,
    rels: Relationships,
    allocator: &'p mut MediaAllocator,
    /// Reference to relationship id, so a repeated image is stored once
    embedded: HashMap<String, String>,
    media: Vec<(String, ImageFormat, Vec<u8>)>,
}

impl MediaSink for PartMedia<'_> {
    fn embed(&mut self, image: EmbeddedImage) -> MediaRef {
        let drawing_id = self.allocator.next_drawing_id();
        if let Some(rel_id) = self.embedded.get(&image.reference) {
            return MediaRef {
                rel_id: rel_id.clone(),
                drawing_id,
            };
        }

        let (entry, target) = self.allocator.media_path(self.part, image.format);
        let rel_id = self.rels.add(relationship_types::IMAGE, &target, TargetMode::Internal);
        self.embedded.insert(image.reference, rel_id.clone());
        self.media.push((entry, image.format, image.data));

        MediaRef { rel_id, drawing_id }
    }
}
