//! Content-type classification: is this payload a document or an image?
//!
//! Magic bytes are authoritative because a wrong extension cannot fake them.
//! Hints still matter in one direction: a truncated or slightly corrupt PDF
//! may have lost its `%PDF-` header position but is still worth handing to
//! pdfium when the caller or server labelled it as a PDF. Whether hints may
//! do that is controlled by [`SniffPolicy`].

use crate::config::SniffPolicy;
use crate::pipeline::input::FetchedPayload;
use crate::pipeline::source::SourceKind;
use image::ImageFormat;
use serde::Serialize;

/// The marker every PDF starts with.
pub const PDF_MAGIC: &[u8; 5] = b"%PDF-";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Document,
    Image,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Document => "document",
            ContentKind::Image => "image",
        }
    }
}

/// Secondary signals about what a payload contains.
#[derive(Debug, Clone, Default)]
pub struct ContentHints<'a> {
    /// File extension with leading dot, e.g. `.pdf`.
    pub extension: Option<&'a str>,
    /// MIME type from a data-URI, HTTP header, or caller `mime_type_hint`.
    pub declared_mime: Option<&'a str>,
    /// Suffix of the URL's last path segment.
    pub url_suffix: Option<&'a str>,
}

impl<'a> ContentHints<'a> {
    /// Hints carried by a payload, optionally overridden by a caller hint.
    pub fn from_payload(payload: &'a FetchedPayload, mime_type_hint: Option<&'a str>) -> Self {
        let extension = payload.extension.as_deref();
        let (extension, url_suffix) = match payload.source {
            SourceKind::Url => (None, extension),
            _ => (extension, None),
        };
        Self {
            extension,
            declared_mime: mime_type_hint.or(payload.declared_mime.as_deref()),
            url_suffix,
        }
    }
}

/// Decide whether `bytes` should go to the document renderer.
pub fn classify_content(bytes: &[u8], hints: &ContentHints<'_>, policy: SniffPolicy) -> ContentKind {
    if has_pdf_magic(bytes) {
        return ContentKind::Document;
    }
    if policy == SniffPolicy::MagicOnly {
        return ContentKind::Image;
    }

    let mime_says_pdf = hints
        .declared_mime
        .is_some_and(|m| m.to_ascii_lowercase().contains("pdf"));
    let suffix_says_pdf = [hints.extension, hints.url_suffix]
        .into_iter()
        .flatten()
        .any(|s| s.eq_ignore_ascii_case(".pdf"));

    if mime_says_pdf || suffix_says_pdf {
        ContentKind::Document
    } else {
        ContentKind::Image
    }
}

pub fn has_pdf_magic(bytes: &[u8]) -> bool {
    bytes.starts_with(PDF_MAGIC)
}

/// Identify a raster format from its signature.
///
/// The common formats are matched explicitly; anything else goes through
/// `image::guess_format`.
pub fn detect_image_format(bytes: &[u8]) -> Option<ImageFormat> {
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some(ImageFormat::Jpeg);
    }
    if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        return Some(ImageFormat::Png);
    }
    if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        return Some(ImageFormat::Gif);
    }
    if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        return Some(ImageFormat::WebP);
    }
    if bytes.starts_with(b"BM") {
        return Some(ImageFormat::Bmp);
    }
    if bytes.starts_with(&[0x49, 0x49, 0x2A, 0x00]) || bytes.starts_with(&[0x4D, 0x4D, 0x00, 0x2A]) {
        return Some(ImageFormat::Tiff);
    }
    image::guess_format(bytes).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_SIG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];

    #[test]
    fn magic_bytes_win_over_hints() {
        let hints = ContentHints {
            extension: Some(".png"),
            declared_mime: Some("image/png"),
            url_suffix: None,
        };
        assert_eq!(
            classify_content(b"%PDF-1.7\n...", &hints, SniffPolicy::HintsMayPromote),
            ContentKind::Document
        );
    }

    #[test]
    fn pdf_mime_hint_promotes_unknown_bytes() {
        let hints = ContentHints {
            declared_mime: Some("Application/PDF"),
            ..Default::default()
        };
        assert_eq!(
            classify_content(b"garbage", &hints, SniffPolicy::HintsMayPromote),
            ContentKind::Document
        );
    }

    #[test]
    fn pdf_extension_or_url_suffix_promotes() {
        let by_ext = ContentHints {
            extension: Some(".PDF"),
            ..Default::default()
        };
        let by_url = ContentHints {
            url_suffix: Some(".pdf"),
            ..Default::default()
        };
        for hints in [by_ext, by_url] {
            assert_eq!(
                classify_content(PNG_SIG, &hints, SniffPolicy::HintsMayPromote),
                ContentKind::Document
            );
        }
    }

    #[test]
    fn magic_only_policy_ignores_hints() {
        let hints = ContentHints {
            extension: Some(".pdf"),
            declared_mime: Some("application/pdf"),
            url_suffix: Some(".pdf"),
        };
        assert_eq!(
            classify_content(PNG_SIG, &hints, SniffPolicy::MagicOnly),
            ContentKind::Image
        );
        assert_eq!(
            classify_content(b"%PDF-1.4", &hints, SniffPolicy::MagicOnly),
            ContentKind::Document
        );
    }

    #[test]
    fn no_hints_means_image() {
        assert_eq!(
            classify_content(PNG_SIG, &ContentHints::default(), SniffPolicy::HintsMayPromote),
            ContentKind::Image
        );
        assert_eq!(
            classify_content(b"", &ContentHints::default(), SniffPolicy::HintsMayPromote),
            ContentKind::Image
        );
    }

    #[test]
    fn short_pdf_prefix_is_not_magic() {
        assert!(!has_pdf_magic(b"%PDF"));
        assert!(has_pdf_magic(b"%PDF-"));
    }

    #[test]
    fn detects_common_formats() {
        assert_eq!(detect_image_format(PNG_SIG), Some(ImageFormat::Png));
        assert_eq!(detect_image_format(&[0xFF, 0xD8, 0xFF, 0xE0]), Some(ImageFormat::Jpeg));
        assert_eq!(detect_image_format(b"GIF89a......"), Some(ImageFormat::Gif));
        assert_eq!(detect_image_format(b"RIFF\0\0\0\0WEBPVP8 "), Some(ImageFormat::WebP));
        assert_eq!(detect_image_format(b"plain text"), None);
    }
}
