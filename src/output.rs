//! Tool result types returned to the calling host.
//!
//! The wire shape is the usual tool-call envelope: a list of typed content
//! parts plus an `isError` flag. A successful call carries exactly two
//! parts, a JSON metadata text block and the image itself; a failed call
//! carries a single `Error: …` text block.
//!
//! ```json
//! {"content":[{"type":"text","text":"{\"width\":512,...}"},
//!             {"type":"image","data":"iVBORw0…","mimeType":"image/png"}],
//!  "isError":false}
//! ```

use crate::error::VisualError;
use crate::pipeline::content::ContentKind;
use crate::pipeline::encode::EncodedImage;
use crate::pipeline::region::PixelRect;
use crate::pipeline::source::SourceKind;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

// ── Wire types ───────────────────────────────────────────────────────────

/// One typed block of tool output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentPart {
    Text {
        text: String,
    },
    Image {
        /// Standard base64, padded.
        data: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
}

/// What every tool entry point returns. Never an `Err`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub content: Vec<ContentPart>,
    #[serde(rename = "isError")]
    pub is_error: bool,
}

impl ToolResult {
    /// Single `Error: <message>` text block with `is_error` set.
    pub fn error(err: &VisualError) -> Self {
        Self {
            content: vec![ContentPart::Text {
                text: format!("Error: {err}"),
            }],
            is_error: true,
        }
    }

    /// Text of the first text part.
    pub fn text(&self) -> Option<&str> {
        self.content.iter().find_map(|p| match p {
            ContentPart::Text { text } => Some(text.as_str()),
            _ => None,
        })
    }

    /// `(base64 data, mime type)` of the image part, if present.
    pub fn image(&self) -> Option<(&str, &str)> {
        self.content.iter().find_map(|p| match p {
            ContentPart::Image { data, mime_type } => Some((data.as_str(), mime_type.as_str())),
            _ => None,
        })
    }

    /// Decode the image part back to raw bytes.
    pub fn image_bytes(&self) -> Option<Vec<u8>> {
        self.image().and_then(|(data, _)| STANDARD.decode(data).ok())
    }

    /// Parse the metadata block of a successful result.
    pub fn metadata(&self) -> Option<ImageMetadata> {
        if self.is_error {
            return None;
        }
        self.text().and_then(|t| serde_json::from_str(t).ok())
    }
}

// ── Metadata ─────────────────────────────────────────────────────────────

/// Page details attached to rendered documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageInfo {
    pub page: u32,
    pub total_pages: u32,
    pub dpi: u32,
}

/// Everything the assembler needs besides the encoded bytes.
#[derive(Debug, Clone)]
pub struct Provenance {
    pub source: SourceKind,
    pub content: ContentKind,
    /// Pixel size before crop and resize.
    pub original_width: u32,
    pub original_height: u32,
    /// Whether the caller asked for a region at all.
    pub region_requested: bool,
    /// The rectangle actually applied after clamping.
    pub region: Option<PixelRect>,
    pub document: Option<PageInfo>,
}

impl Provenance {
    pub fn original_pixels(&self) -> u64 {
        u64::from(self.original_width) * u64::from(self.original_height)
    }
}

/// The JSON object carried in the first text block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageMetadata {
    pub width: u32,
    pub height: u32,
    pub format: String,
    pub mime_type: String,
    pub size_bytes: usize,
    pub source_type: String,
    pub content_type: String,
    pub original_width: u32,
    pub original_height: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<RegionMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_pages: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dpi: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionMetadata {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

impl From<PixelRect> for RegionMetadata {
    fn from(r: PixelRect) -> Self {
        Self {
            left: r.left,
            top: r.top,
            width: r.width,
            height: r.height,
        }
    }
}

fn large_image_note(width: u32, height: u32) -> String {
    format!(
        "The original image is large ({width}x{height}) and was scaled down. \
Pass a `region` to view a specific area at higher detail."
    )
}

/// Build the success result for an encoded image.
///
/// `large_image_pixels` is the threshold above which an uncropped image
/// gets a `note` suggesting a region.
pub fn assemble(encoded: &EncodedImage, provenance: &Provenance, large_image_pixels: u64) -> ToolResult {
    let note = (!provenance.region_requested && provenance.original_pixels() > large_image_pixels)
        .then(|| large_image_note(provenance.original_width, provenance.original_height));

    let metadata = ImageMetadata {
        width: encoded.width,
        height: encoded.height,
        format: encoded.format_name().to_string(),
        mime_type: encoded.mime_type().to_string(),
        size_bytes: encoded.size_bytes(),
        source_type: provenance.source.as_str().to_string(),
        content_type: provenance.content.as_str().to_string(),
        original_width: provenance.original_width,
        original_height: provenance.original_height,
        region: provenance.region.map(RegionMetadata::from),
        page: provenance.document.map(|d| d.page),
        total_pages: provenance.document.map(|d| d.total_pages),
        dpi: provenance.document.map(|d| d.dpi),
        note,
    };

    let text = match serde_json::to_string_pretty(&metadata) {
        Ok(json) => json,
        Err(e) => return ToolResult::error(&VisualError::Unknown(e.to_string())),
    };

    ToolResult {
        content: vec![
            ContentPart::Text { text },
            ContentPart::Image {
                data: STANDARD.encode(&encoded.bytes),
                mime_type: encoded.mime_type().to_string(),
            },
        ],
        is_error: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::ImageFormat;

    fn encoded() -> EncodedImage {
        EncodedImage {
            bytes: vec![0xde, 0xad, 0xbe, 0xef],
            format: ImageFormat::Png,
            width: 512,
            height: 256,
        }
    }

    fn provenance(w: u32, h: u32, region_requested: bool) -> Provenance {
        Provenance {
            source: SourceKind::FilePath,
            content: ContentKind::Image,
            original_width: w,
            original_height: h,
            region_requested,
            region: None,
            document: None,
        }
    }

    #[test]
    fn success_has_text_then_image() {
        let result = assemble(&encoded(), &provenance(800, 400, false), 2_000_000);
        assert!(!result.is_error);
        assert_eq!(result.content.len(), 2);
        assert!(matches!(result.content[0], ContentPart::Text { .. }));
        let (data, mime) = result.image().unwrap();
        assert_eq!(data, "3q2+7w==");
        assert_eq!(mime, "image/png");
        assert_eq!(result.image_bytes().unwrap(), vec![0xde, 0xad, 0xbe, 0xef]);
    }

    #[test]
    fn metadata_carries_dimensions_and_provenance() {
        let meta = assemble(&encoded(), &provenance(800, 400, false), 2_000_000)
            .metadata()
            .unwrap();
        assert_eq!((meta.width, meta.height), (512, 256));
        assert_eq!((meta.original_width, meta.original_height), (800, 400));
        assert_eq!(meta.format, "png");
        assert_eq!(meta.mime_type, "image/png");
        assert_eq!(meta.size_bytes, 4);
        assert_eq!(meta.source_type, "file");
        assert_eq!(meta.content_type, "image");
        assert!(meta.page.is_none());
        assert!(meta.note.is_none());
    }

    #[test]
    fn metadata_uses_camel_case_keys() {
        let result = assemble(&encoded(), &provenance(10, 10, false), 2_000_000);
        let raw: serde_json::Value = serde_json::from_str(result.text().unwrap()).unwrap();
        for key in ["mimeType", "sizeBytes", "sourceType", "contentType", "originalWidth"] {
            assert!(raw.get(key).is_some(), "missing {key}");
        }
        assert!(raw.get("totalPages").is_none());
    }

    #[test]
    fn large_uncropped_image_gets_note() {
        let meta = assemble(&encoded(), &provenance(4000, 3000, false), 2_000_000)
            .metadata()
            .unwrap();
        assert!(meta.note.unwrap().contains("region"));
    }

    #[test]
    fn no_note_when_region_given() {
        let meta = assemble(&encoded(), &provenance(4000, 3000, true), 2_000_000)
            .metadata()
            .unwrap();
        assert!(meta.note.is_none());
    }

    #[test]
    fn document_fields_present_for_pages() {
        let mut p = provenance(1240, 1754, false);
        p.content = ContentKind::Document;
        p.document = Some(PageInfo {
            page: 2,
            total_pages: 5,
            dpi: 150,
        });
        let meta = assemble(&encoded(), &p, 2_000_000).metadata().unwrap();
        assert_eq!(meta.content_type, "document");
        assert_eq!((meta.page, meta.total_pages, meta.dpi), (Some(2), Some(5), Some(150)));
        // 1240 * 1754 > 2M
        assert!(meta.note.is_some());
    }

    #[test]
    fn error_shape() {
        let result = ToolResult::error(&VisualError::PageOutOfRange { page: 9, total: 2 });
        assert!(result.is_error);
        assert_eq!(result.content.len(), 1);
        assert!(result.text().unwrap().starts_with("Error: Page 9 is out of range"));
        assert!(result.metadata().is_none());
        assert!(result.image().is_none());
    }

    #[test]
    fn wire_json_shape() {
        let json = serde_json::to_value(assemble(&encoded(), &provenance(1, 1, false), 2_000_000)).unwrap();
        assert_eq!(json["isError"], false);
        assert_eq!(json["content"][0]["type"], "text");
        assert_eq!(json["content"][1]["type"], "image");
        assert_eq!(json["content"][1]["mimeType"], "image/png");
    }
}
