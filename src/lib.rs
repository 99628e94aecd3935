//! # edgequake-visual
//!
//! Resolve a reference to visual content into a small, bounded image a
//! vision model can look at.
//!
//! ## Why this crate?
//!
//! Tool-calling hosts get handed images and documents in every shape: a path
//! on disk, a URL, a data-URI pasted into a chat, a raw base64 blob. Vision
//! models, on the other hand, want one thing: a modest-sized image with a
//! known MIME type. This crate sits in between. It works out what the
//! reference is, fetches it under hard size limits, rasterises one page if
//! it is a PDF, optionally crops to a region of interest, downsizes to a
//! bounding box, and re-encodes the result.
//!
//! ## Pipeline Overview
//!
//! ```text
//! reference
//!  │
//!  ├─ 1. Source    path / URL / data-URI / base64
//!  ├─ 2. Input     read or download with size and domain limits
//!  ├─ 3. Content   document or image (magic bytes first)
//!  ├─ 4. Render    one PDF page via pdfium (spawn_blocking)
//!  ├─ 5. Normalize crop to region, fit into max_width × max_height
//!  ├─ 6. Encode    JPEG / PNG / WebP / GIF / BMP
//!  └─ 7. Output    metadata JSON + base64 image
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_visual::{read_visual, ReadVisualParams, RegionSpec, VisualConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = VisualConfig::default();
//!     let params = ReadVisualParams::new("report.pdf")
//!         .page(2)
//!         .region(RegionSpec::corners(0.0, 0.0, 0.5, 0.5));
//!     let result = read_visual(&config, params).await;
//!     if result.is_error {
//!         eprintln!("{}", result.text().unwrap_or_default());
//!     } else if let Some(meta) = result.metadata() {
//!         println!("{}x{} {}", meta.width, meta.height, meta.mime_type);
//!     }
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `visual-read` binary (clap + anyhow + tracing-subscriber) |
//! | `bundled` | off   | Embeds the pdfium library in the binary via `pdfium-auto` |
//!
//! ```toml
//! edgequake-visual = { version = "0.1", default-features = false }
//! ```
//!
//! Document rendering needs a pdfium shared library at runtime; see
//! [`pipeline::engine`] for where it is looked up and how
//! [`pipeline::engine::prepare_library`] fetches one.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod tools;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{SniffPolicy, VisualConfig, VisualConfigBuilder};
pub use error::VisualError;
pub use output::{ContentPart, ImageMetadata, ToolResult};
pub use pipeline::region::{resolve_region, PixelRect, RegionSpec};
pub use tools::{
    extract_document_page_from_base64, extract_document_page_from_file,
    extract_document_page_from_url, extract_image_from_base64, extract_image_from_file,
    extract_image_from_url, read_visual, read_visual_sync, ExtractDocumentPageParams,
    ExtractImageParams, ReadVisualParams,
};
