//! Document rasterisation: render exactly one PDF page to a `DynamicImage`.
//!
//! ## Why spawn_blocking?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which uses
//! thread-local state internally and is not safe to call from async contexts.
//! `tokio::task::spawn_blocking` moves the work onto a dedicated thread pool
//! thread designed for blocking operations, preventing the Tokio worker
//! threads from stalling during CPU-heavy rendering.
//!
//! ## Scale, then cap
//!
//! The page is scaled by `dpi / 72` (PDF user space is 72 units per inch).
//! `max_rendered_pixels` then caps both edges regardless of physical page
//! size, so a 600-DPI render of a poster cannot exhaust memory.
//!
//! The page number is validated only after the document is open, since the
//! page count is not knowable before that.

use crate::config::VisualConfig;
use crate::error::VisualError;
use crate::pipeline::engine;
use image::DynamicImage;
use pdfium_render::prelude::*;
use tracing::{debug, info};

/// PDF user-space units per inch.
pub const POINTS_PER_INCH: f32 = 72.0;

/// One rasterised page and the size of the document it came from.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub image: DynamicImage,
    pub page: u32,
    pub total_pages: u32,
    pub dpi: u32,
}

/// Rasterise page `page` (1-based) of the PDF in `bytes` at `dpi`.
///
/// Runs inside `spawn_blocking` since pdfium operations are CPU-bound.
pub async fn render_page(
    bytes: Vec<u8>,
    page: u32,
    dpi: u32,
    config: &VisualConfig,
) -> Result<RenderedPage, VisualError> {
    let max_pixels = config.max_rendered_pixels;

    tokio::task::spawn_blocking(move || render_page_blocking(&bytes, page, dpi, max_pixels))
        .await
        .map_err(|e| VisualError::task_failed("Render", e))?
}

/// Blocking implementation of page rendering.
fn render_page_blocking(
    bytes: &[u8],
    page: u32,
    dpi: u32,
    max_pixels: u32,
) -> Result<RenderedPage, VisualError> {
    let pdfium = engine::bind()?;

    let document = pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(|e| VisualError::RenderFailure {
            detail: format!("could not open document: {e:?}"),
        })?;

    let pages = document.pages();
    let total_pages = u32::from(pages.len());
    if total_pages == 0 {
        return Err(VisualError::RenderFailure {
            detail: "document has no pages".into(),
        });
    }
    info!("PDF loaded: {} pages", total_pages);

    check_page_bounds(page, total_pages)?;

    let pdf_page = pages
        .get((page - 1) as u16)
        .map_err(|e| VisualError::RenderFailure {
            detail: format!("page {page}: {e:?}"),
        })?;

    let render_config = page_render_config(dpi, max_pixels);

    let bitmap = pdf_page
        .render_with_config(&render_config)
        .map_err(|e| VisualError::RenderFailure {
            detail: format!("page {page}: {e:?}"),
        })?;

    let image = bitmap.as_image();
    debug!(
        "Rendered page {} at {} DPI → {}x{} px",
        page,
        dpi,
        image.width(),
        image.height()
    );

    Ok(RenderedPage {
        image,
        page,
        total_pages,
        dpi,
    })
}

/// Count pages without rendering anything.
pub async fn page_count(bytes: Vec<u8>) -> Result<u32, VisualError> {
    tokio::task::spawn_blocking(move || {
        let pdfium = engine::bind()?;
        let document = pdfium
            .load_pdf_from_byte_slice(&bytes, None)
            .map_err(|e| VisualError::RenderFailure {
                detail: format!("could not open document: {e:?}"),
            })?;
        Ok(u32::from(document.pages().len()))
    })
    .await
    .map_err(|e| VisualError::task_failed("Page count", e))?
}

/// `1 ≤ page ≤ total`, or a `PageOutOfRange` carrying both numbers.
pub fn check_page_bounds(page: u32, total: u32) -> Result<(), VisualError> {
    if page < 1 || page > total {
        return Err(VisualError::PageOutOfRange { page, total });
    }
    Ok(())
}

/// Render settings for a DPI, with both edges capped at `max_pixels`.
fn page_render_config(dpi: u32, max_pixels: u32) -> PdfRenderConfig {
    let cap = max_pixels.min(i32::MAX as u32) as i32;
    PdfRenderConfig::new()
        .scale_page_by_factor(dpi as f32 / POINTS_PER_INCH)
        .set_maximum_width(cap)
        .set_maximum_height(cap)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_zero_is_out_of_range() {
        let err = check_page_bounds(0, 3).unwrap_err();
        assert!(matches!(err, VisualError::PageOutOfRange { page: 0, total: 3 }));
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn page_past_end_is_out_of_range() {
        let err = check_page_bounds(4, 3).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains('4') && msg.contains('3'), "got: {msg}");
    }

    #[test]
    fn pages_inside_range_pass() {
        for p in 1..=3 {
            assert!(check_page_bounds(p, 3).is_ok());
        }
    }

    #[tokio::test]
    async fn garbage_bytes_fail_to_render() {
        if !engine::is_available() {
            println!("SKIP: pdfium library not available");
            return;
        }
        let err = render_page(b"definitely not a pdf".to_vec(), 1, 150, &VisualConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, VisualError::RenderFailure { .. }), "got: {err:?}");
    }
}
