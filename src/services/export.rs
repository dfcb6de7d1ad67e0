//! EPUB rendering of a finished story.
//!
//! The cover gets its own document with the title over the cover art. Each
//! page becomes one XHTML document with its text followed by its illustration.

use std::sync::LazyLock;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use epub_builder::{EpubBuilder, EpubContent, ReferenceType, ZipLibrary};
use regex::Regex;
use thiserror::Error;

use crate::models::{InlineImage, Story};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("image for {slot} is not an inline data URI")]
    UnsupportedImage { slot: String },

    #[error("image for {slot} is not valid base64: {reason}")]
    ImageDecode { slot: String, reason: String },

    #[error("failed to build EPUB: {0}")]
    Epub(String),
}

fn epub_error(e: impl std::fmt::Display) -> ExportError {
    ExportError::Epub(e.to_string())
}

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s").expect("valid regex"));

/// `El Robot Perdido` becomes `El-Robot-Perdido.epub`. Every whitespace
/// character becomes one `-`. Characters that are unsafe in a file name or a
/// quoted header value are dropped.
pub fn export_file_name(title: &str) -> String {
    let stem = WHITESPACE.replace_all(title, "-");
    let stem: String = stem
        .chars()
        .filter(|c| !matches!(c, '/' | '\\' | '"' | ':' | '*' | '?' | '<' | '>' | '|'))
        .collect();
    if stem.is_empty() {
        "historia.epub".to_string()
    } else {
        format!("{}.epub", stem)
    }
}

struct DecodedImage {
    path: String,
    mime_type: String,
    bytes: Vec<u8>,
}

fn decode_image(slot: &str, file_stem: &str, data_uri: &str) -> Result<DecodedImage, ExportError> {
    let image = InlineImage::from_data_uri(data_uri).ok_or_else(|| ExportError::UnsupportedImage {
        slot: slot.to_string(),
    })?;
    let bytes = STANDARD
        .decode(image.base64.as_bytes())
        .map_err(|e| ExportError::ImageDecode {
            slot: slot.to_string(),
            reason: e.to_string(),
        })?;

    Ok(DecodedImage {
        path: format!("images/{}.{}", file_stem, image.extension()),
        mime_type: image.mime_type,
        bytes,
    })
}

fn xhtml_document(title: &str, body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml" xml:lang="es">
<head>
  <meta charset="utf-8"/>
  <title>{}</title>
</head>
<body>
{}
</body>
</html>
"#,
        html_escape::encode_text(title),
        body
    )
}

fn paragraphs(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| format!("  <p>{}</p>\n", html_escape::encode_text(line)))
        .collect()
}

/// Renders the story as an EPUB archive.
pub fn export_epub(story: &Story) -> Result<Vec<u8>, ExportError> {
    // Decode everything up front so a bad image fails before any archive work.
    let cover = decode_image("the cover", "cover", &story.cover_image_url)?;
    let page_images = story
        .pages
        .iter()
        .enumerate()
        .map(|(i, page)| {
            decode_image(
                &format!("page {}", i + 1),
                &format!("page_{}", i + 1),
                &page.image_url,
            )
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut builder = EpubBuilder::new(ZipLibrary::new().map_err(epub_error)?).map_err(epub_error)?;
    builder
        .metadata("title", story.title.as_str())
        .map_err(epub_error)?;
    builder.metadata("lang", "es").map_err(epub_error)?;

    builder
        .add_cover_image(cover.path.as_str(), cover.bytes.as_slice(), cover.mime_type.as_str())
        .map_err(epub_error)?;

    let cover_body = format!(
        "  <h1>{}</h1>\n  <img src=\"{}\" alt=\"\"/>\n",
        html_escape::encode_text(&story.title),
        cover.path
    );
    let cover_xhtml = xhtml_document(&story.title, &cover_body);
    builder
        .add_content(
            EpubContent::new("cover.xhtml", cover_xhtml.as_bytes())
                .title(story.title.as_str())
                .reftype(ReferenceType::Cover),
        )
        .map_err(epub_error)?;

    for (i, (page, image)) in story.pages.iter().zip(&page_images).enumerate() {
        let number = i + 1;
        builder
            .add_resource(image.path.as_str(), image.bytes.as_slice(), image.mime_type.as_str())
            .map_err(epub_error)?;

        let heading = format!("Página {}", number);
        let body = format!(
            "{}  <img src=\"{}\" alt=\"\"/>\n",
            paragraphs(&page.text),
            image.path
        );
        let xhtml = xhtml_document(&heading, &body);
        builder
            .add_content(
                EpubContent::new(format!("page_{}.xhtml", number), xhtml.as_bytes())
                    .title(heading.as_str())
                    .reftype(ReferenceType::Text),
            )
            .map_err(epub_error)?;
    }

    let mut out = Vec::new();
    builder.generate(&mut out).map_err(epub_error)?;

    tracing::debug!(
        "Exported {:?} as EPUB ({} pages, {} bytes)",
        story.title,
        story.pages.len(),
        out.len()
    );
    Ok(out)
}
