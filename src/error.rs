//! Error types for the edgequake-visual library.
//!
//! Every failure the pipeline can hit maps to exactly one [`VisualError`]
//! variant. Internal stages return `Result<_, VisualError>` and propagate with
//! `?`; the public tool entry points in [`crate::tools`] never return the error
//! directly but fold it into an error-flagged [`crate::output::ToolResult`].
//!
//! Compression failures are the one exception: they are recovered inside
//! [`crate::pipeline::encode`] (the uncompressed bytes are sent instead) and
//! never reach this type's callers.
//!
//! Messages are written for the person (or model) reading the tool output:
//! each one names the failure and the value that caused it.

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the edgequake-visual pipeline.
#[derive(Debug, Error)]
pub enum VisualError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The referenced local file is missing.
    #[error("File does not exist: '{path}'\nCheck the path is correct and readable.")]
    NotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'")]
    PermissionDenied { path: PathBuf },

    /// Fetched, read, or decoded payload is larger than `max_payload_bytes`.
    #[error("Payload from {origin} is too large: {size} bytes exceeds the limit of {limit} bytes")]
    SizeExceeded { origin: String, size: u64, limit: u64 },

    /// Inline data is not valid base64, or decodes to nothing.
    #[error("Invalid base64 data: {detail}")]
    InvalidEncoding { detail: String },

    /// The reference is structurally unusable (bad data-URI, bad scheme, …).
    #[error("Invalid reference '{reference}': {reason}")]
    InvalidReference { reference: String, reason: String },

    /// URL host is not on the configured allow-list.
    #[error("Domain '{host}' is not in the list of allowed domains")]
    DomainRejected { host: String },

    /// HTTP request failed or returned a non-success status.
    #[error("Failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Document errors ───────────────────────────────────────────────────
    /// Requested page is outside `[1, total]`.
    #[error("Page {page} is out of range (document has {total} pages)")]
    PageOutOfRange { page: u32, total: u32 },

    /// The document could not be opened or rasterised at all.
    #[error("Failed to render document: {detail}")]
    RenderFailure { detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium or install pdfium system-wide."
    )]
    PdfiumBindingFailed(String),

    // ── Image errors ──────────────────────────────────────────────────────
    /// Payload is not a raster image the decoder understands.
    #[error("Failed to decode image: {detail}")]
    DecodeFailure { detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder or environment validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Any other collaborator failure, carrying its message text.
    #[error("Unexpected error: {0}")]
    Unknown(String),
}

impl VisualError {
    /// Wrap a `spawn_blocking` join failure (panic or cancellation).
    pub(crate) fn task_failed(stage: &str, err: tokio::task::JoinError) -> Self {
        VisualError::Unknown(format!("{stage} task failed: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_mentions_does_not_exist() {
        let e = VisualError::NotFound {
            path: PathBuf::from("/nope/image.png"),
        };
        let msg = e.to_string();
        assert!(msg.contains("does not exist"), "got: {msg}");
        assert!(msg.contains("/nope/image.png"));
    }

    #[test]
    fn page_out_of_range_carries_both_numbers() {
        let e = VisualError::PageOutOfRange { page: 7, total: 3 };
        let msg = e.to_string();
        assert!(msg.contains("out of range"), "got: {msg}");
        assert!(msg.contains('7'));
        assert!(msg.contains('3'));
    }

    #[test]
    fn size_exceeded_display() {
        let e = VisualError::SizeExceeded {
            origin: "file".into(),
            size: 2048,
            limit: 1024,
        };
        let msg = e.to_string();
        assert!(msg.contains("2048"));
        assert!(msg.contains("1024"));
    }

    #[test]
    fn domain_rejected_display() {
        let e = VisualError::DomainRejected {
            host: "evil.example".into(),
        };
        assert!(e.to_string().contains("evil.example"));
    }
}
