//! Tool entry points.
//!
//! Every function here takes a reference string plus options and returns a
//! [`ToolResult`]. None of them return `Err` or panic across the boundary:
//! failures are folded into an error-flagged result so a tool host can hand
//! the outcome straight back to its caller.
//!
//! ## Which entry point?
//!
//! - [`read_visual`] classifies everything itself: where the bytes come from
//!   and whether they are a document or an image.
//! - `extract_image_from_*` skip content classification and always decode an
//!   image.
//! - `extract_document_page_from_*` always render a document page.
//!
//! The `_from_file` / `_from_url` / `_from_base64` variants trust the caller
//! about the source kind and skip source classification.

use crate::config::VisualConfig;
use crate::error::VisualError;
use crate::output::{assemble, PageInfo, Provenance, ToolResult};
use crate::pipeline::content::{classify_content, detect_image_format, ContentHints, ContentKind};
use crate::pipeline::encode::{
    compress_or_fallback, compress_page, CompressionSettings, EncodedImage, Fallback, OutputFormat,
};
use crate::pipeline::input::{acquire, FetchedPayload};
use crate::pipeline::normalize::normalize;
use crate::pipeline::region::{PixelRect, RegionSpec};
use crate::pipeline::render;
use crate::pipeline::source::{classify_source, SourceKind};
use serde::Deserialize;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Page used when none is given.
pub const DEFAULT_PAGE: u32 = 1;

fn default_page() -> u32 {
    DEFAULT_PAGE
}

// ── Parameters ───────────────────────────────────────────────────────────

/// Arguments for [`read_visual`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReadVisualParams {
    /// File path, `http(s)` URL, data-URI, or bare base64.
    pub source: String,
    /// 1-based page, used only for documents.
    #[serde(default = "default_page")]
    pub page: u32,
    /// Render DPI for documents; config default when absent.
    #[serde(default)]
    pub dpi: Option<u32>,
    #[serde(default)]
    pub region: Option<RegionSpec>,
    #[serde(default, alias = "mimeTypeHint")]
    pub mime_type_hint: Option<String>,
}

impl ReadVisualParams {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            page: DEFAULT_PAGE,
            dpi: None,
            region: None,
            mime_type_hint: None,
        }
    }

    pub fn page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    pub fn dpi(mut self, dpi: u32) -> Self {
        self.dpi = Some(dpi);
        self
    }

    pub fn region(mut self, region: RegionSpec) -> Self {
        self.region = Some(region);
        self
    }

    pub fn mime_type_hint(mut self, hint: impl Into<String>) -> Self {
        self.mime_type_hint = Some(hint.into());
        self
    }
}

/// Arguments for the `extract_image_from_*` family.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ExtractImageParams {
    pub source: String,
    #[serde(default)]
    pub region: Option<RegionSpec>,
    #[serde(default, alias = "mimeTypeHint")]
    pub mime_type_hint: Option<String>,
}

impl ExtractImageParams {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            region: None,
            mime_type_hint: None,
        }
    }

    pub fn region(mut self, region: RegionSpec) -> Self {
        self.region = Some(region);
        self
    }
}

/// Arguments for the `extract_document_page_from_*` family.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ExtractDocumentPageParams {
    pub source: String,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default)]
    pub dpi: Option<u32>,
    #[serde(default)]
    pub region: Option<RegionSpec>,
}

impl ExtractDocumentPageParams {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            page: DEFAULT_PAGE,
            dpi: None,
            region: None,
        }
    }

    pub fn page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    pub fn dpi(mut self, dpi: u32) -> Self {
        self.dpi = Some(dpi);
        self
    }

    pub fn region(mut self, region: RegionSpec) -> Self {
        self.region = Some(region);
        self
    }
}

// ── Unified entry point ──────────────────────────────────────────────────

/// Resolve any reference to a bounded, encoded image.
pub async fn read_visual(config: &VisualConfig, params: ReadVisualParams) -> ToolResult {
    let request = Request {
        source: &params.source,
        forced_source: None,
        forced_content: None,
        page: params.page,
        dpi: params.dpi,
        region: params.region,
        mime_type_hint: params.mime_type_hint.as_deref(),
    };
    finish("read_visual", run(config, request).await)
}

/// Blocking wrapper around [`read_visual`] for non-async callers.
///
/// Creates a fresh Tokio runtime. Do not call from inside an async context.
pub fn read_visual_sync(config: &VisualConfig, params: ReadVisualParams) -> ToolResult {
    match tokio::runtime::Runtime::new() {
        Ok(rt) => rt.block_on(read_visual(config, params)),
        Err(e) => ToolResult::error(&VisualError::Unknown(format!(
            "Failed to create tokio runtime: {e}"
        ))),
    }
}

// ── Image-only entry points ──────────────────────────────────────────────

pub async fn extract_image_from_file(config: &VisualConfig, params: ExtractImageParams) -> ToolResult {
    extract_image(config, params, SourceKind::FilePath).await
}

pub async fn extract_image_from_url(config: &VisualConfig, params: ExtractImageParams) -> ToolResult {
    extract_image(config, params, SourceKind::Url).await
}

pub async fn extract_image_from_base64(config: &VisualConfig, params: ExtractImageParams) -> ToolResult {
    extract_image(config, params, SourceKind::InlineData).await
}

async fn extract_image(config: &VisualConfig, params: ExtractImageParams, kind: SourceKind) -> ToolResult {
    let request = Request {
        source: &params.source,
        forced_source: Some(kind),
        forced_content: Some(ContentKind::Image),
        page: DEFAULT_PAGE,
        dpi: None,
        region: params.region,
        mime_type_hint: params.mime_type_hint.as_deref(),
    };
    finish("extract_image", run(config, request).await)
}

// ── Document-only entry points ───────────────────────────────────────────

pub async fn extract_document_page_from_file(
    config: &VisualConfig,
    params: ExtractDocumentPageParams,
) -> ToolResult {
    extract_document_page(config, params, SourceKind::FilePath).await
}

pub async fn extract_document_page_from_url(
    config: &VisualConfig,
    params: ExtractDocumentPageParams,
) -> ToolResult {
    extract_document_page(config, params, SourceKind::Url).await
}

pub async fn extract_document_page_from_base64(
    config: &VisualConfig,
    params: ExtractDocumentPageParams,
) -> ToolResult {
    extract_document_page(config, params, SourceKind::InlineData).await
}

async fn extract_document_page(
    config: &VisualConfig,
    params: ExtractDocumentPageParams,
    kind: SourceKind,
) -> ToolResult {
    let request = Request {
        source: &params.source,
        forced_source: Some(kind),
        forced_content: Some(ContentKind::Document),
        page: params.page,
        dpi: params.dpi,
        region: params.region,
        mime_type_hint: None,
    };
    finish("extract_document_page", run(config, request).await)
}

// ── Shared pipeline ──────────────────────────────────────────────────────

struct Request<'a> {
    source: &'a str,
    forced_source: Option<SourceKind>,
    forced_content: Option<ContentKind>,
    page: u32,
    dpi: Option<u32>,
    region: Option<RegionSpec>,
    mime_type_hint: Option<&'a str>,
}

/// Output of the CPU-bound tail of the pipeline.
struct Processed {
    encoded: EncodedImage,
    original_width: u32,
    original_height: u32,
    region: Option<PixelRect>,
}

fn finish(tool: &str, result: Result<ToolResult, VisualError>) -> ToolResult {
    result.unwrap_or_else(|e| {
        warn!("{} failed: {}", tool, e);
        ToolResult::error(&e)
    })
}

async fn run(config: &VisualConfig, req: Request<'_>) -> Result<ToolResult, VisualError> {
    let start = Instant::now();

    // ── Step 1: Classify source ──────────────────────────────────────────
    let source = req.forced_source.unwrap_or_else(|| classify_source(req.source));

    // ── Step 2: Acquire bytes ────────────────────────────────────────────
    let payload = acquire(req.source, source, config).await?;
    info!(
        "Acquired {} bytes from {} ({})",
        payload.len(),
        payload.origin,
        source.as_str()
    );

    // ── Step 3: Classify content ─────────────────────────────────────────
    let content = match req.forced_content {
        Some(kind) => kind,
        None => {
            let hints = ContentHints::from_payload(&payload, req.mime_type_hint);
            classify_content(&payload.bytes, &hints, config.sniff_policy)
        }
    };
    debug!("Content classified as {}", content.as_str());

    // ── Step 4: Rasterise / decode, normalize, compress ──────────────────
    let (processed, document) = match content {
        ContentKind::Document => {
            let (processed, info) = process_document(payload, &req, config).await?;
            (processed, Some(info))
        }
        ContentKind::Image => (process_image(payload, req.region, config).await?, None),
    };

    // ── Step 5: Assemble ─────────────────────────────────────────────────
    let provenance = Provenance {
        source,
        content,
        original_width: processed.original_width,
        original_height: processed.original_height,
        region_requested: req.region.is_some(),
        region: processed.region,
        document,
    };
    let result = assemble(&processed.encoded, &provenance, config.large_image_pixels);

    info!(
        "Resolved {} → {}x{} {} ({} bytes) in {}ms",
        content.as_str(),
        processed.encoded.width,
        processed.encoded.height,
        processed.encoded.format_name(),
        processed.encoded.size_bytes(),
        start.elapsed().as_millis()
    );
    Ok(result)
}

async fn process_document(
    payload: FetchedPayload,
    req: &Request<'_>,
    config: &VisualConfig,
) -> Result<(Processed, PageInfo), VisualError> {
    let dpi = config.effective_dpi(req.dpi);
    let rendered = render::render_page(payload.bytes, req.page, dpi, config).await?;
    info!(
        "Rendered page {}/{} at {} DPI",
        rendered.page, rendered.total_pages, rendered.dpi
    );

    let info = PageInfo {
        page: rendered.page,
        total_pages: rendered.total_pages,
        dpi: rendered.dpi,
    };
    let region = req.region;
    let (max_w, max_h) = (config.max_width, config.max_height);
    let settings = CompressionSettings::from(config);

    let processed = tokio::task::spawn_blocking(move || {
        let normalized = normalize(rendered.image, region.as_ref(), max_w, max_h);
        let encoded = compress_page(&normalized.image, &settings)?;
        Ok::<_, VisualError>(Processed {
            encoded,
            original_width: normalized.original_width,
            original_height: normalized.original_height,
            region: normalized.region,
        })
    })
    .await
    .map_err(|e| VisualError::task_failed("Page encode", e))??;

    Ok((processed, info))
}

async fn process_image(
    payload: FetchedPayload,
    region: Option<RegionSpec>,
    config: &VisualConfig,
) -> Result<Processed, VisualError> {
    let (max_w, max_h) = (config.max_width, config.max_height);
    let settings = CompressionSettings::from(config);

    tokio::task::spawn_blocking(move || {
        let bytes = payload.bytes;
        let format = detect_image_format(&bytes).ok_or_else(|| VisualError::DecodeFailure {
            detail: format!("unrecognised image format ({} bytes)", bytes.len()),
        })?;
        let image = image::load_from_memory_with_format(&bytes, format).map_err(|e| {
            VisualError::DecodeFailure {
                detail: e.to_string(),
            }
        })?;
        debug!("Decoded {:?} image {}x{}", format, image.width(), image.height());

        let fallback_dims = (image.width(), image.height());
        let normalized = normalize(image, region.as_ref(), max_w, max_h);
        let encoded = compress_or_fallback(
            &normalized.image,
            OutputFormat::for_source(Some(format)),
            &settings,
            Fallback {
                bytes,
                format,
                width: fallback_dims.0,
                height: fallback_dims.1,
            },
        );
        Ok::<_, VisualError>(Processed {
            encoded,
            original_width: normalized.original_width,
            original_height: normalized.original_height,
            region: normalized.region,
        })
    })
    .await
    .map_err(|e| VisualError::task_failed("Image decode", e))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_accept_camel_case_and_defaults() {
        let p: ReadVisualParams = serde_json::from_str(
            r#"{"source":"a.png","mimeTypeHint":"image/png","region":[0,0,0.5,0.5]}"#,
        )
        .unwrap();
        assert_eq!(p.page, 1);
        assert_eq!(p.dpi, None);
        assert_eq!(p.mime_type_hint.as_deref(), Some("image/png"));
        assert_eq!(p.region, Some(RegionSpec::corners(0.0, 0.0, 0.5, 0.5)));

        let d: ExtractDocumentPageParams =
            serde_json::from_str(r#"{"source":"doc.pdf","page":3,"dpi":300}"#).unwrap();
        assert_eq!((d.page, d.dpi), (3, Some(300)));
    }

    #[test]
    fn builders_set_fields() {
        let p = ReadVisualParams::new("x.pdf")
            .page(2)
            .dpi(200)
            .region(RegionSpec::center(0.5, 0.5, 0.1, 0.1))
            .mime_type_hint("application/pdf");
        assert_eq!(p.page, 2);
        assert_eq!(p.dpi, Some(200));
        assert!(p.region.is_some());
        assert_eq!(p.mime_type_hint.as_deref(), Some("application/pdf"));
    }

    #[tokio::test]
    async fn missing_file_becomes_error_result() {
        let result = read_visual(
            &VisualConfig::default(),
            ReadVisualParams::new("/definitely/not/here.png"),
        )
        .await;
        assert!(result.is_error);
        assert!(result.text().unwrap().contains("does not exist"));
    }

    #[tokio::test]
    async fn url_entry_point_rejects_other_schemes() {
        let result = extract_image_from_url(
            &VisualConfig::default(),
            ExtractImageParams::new("ftp://example.com/a.png"),
        )
        .await;
        assert!(result.is_error);
        assert!(result.text().unwrap().starts_with("Error: Invalid reference"));
    }

    #[tokio::test]
    async fn undecodable_bytes_are_a_decode_failure() {
        let garbage = base64::Engine::encode(
            &base64::engine::general_purpose::STANDARD,
            [0x42u8; 120],
        );
        let result = extract_image_from_base64(&VisualConfig::default(), ExtractImageParams::new(garbage)).await;
        assert!(result.is_error);
        assert!(result.text().unwrap().contains("decode"), "got: {:?}", result.text());
    }

    #[test]
    fn sync_wrapper_runs_outside_runtime() {
        let result = read_visual_sync(&VisualConfig::default(), ReadVisualParams::new("/nope/missing.jpg"));
        assert!(result.is_error);
    }
}
