//! Input acquisition: turn a classified reference into an owned byte buffer.
//!
//! Three sources, one output type ([`FetchedPayload`]):
//!
//! - **File**: size is checked from metadata *before* reading, so a 4 GB
//!   video passed by mistake is rejected without touching its contents.
//! - **URL**: scheme and allow-list are checked before connecting; the body
//!   is streamed and the running total is compared against the limit, so a
//!   server that lies about (or omits) `Content-Length` still cannot push
//!   more than `max_payload_bytes` into memory. Redirects are re-checked
//!   against the allow-list at every hop.
//! - **Inline**: a `data:` URI or bare base64. The decoded size is estimated
//!   from the encoded length and rejected before decoding.
//!
//! Provenance hints (declared MIME type, file extension / URL suffix) travel
//! with the bytes so [`crate::pipeline::content`] can use them as a fallback.

use crate::config::VisualConfig;
use crate::error::VisualError;
use crate::pipeline::source::{strip_whitespace, SourceKind};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

const MAX_REDIRECTS: usize = 5;

/// Raw bytes plus where they came from.
#[derive(Debug, Clone)]
pub struct FetchedPayload {
    pub bytes: Vec<u8>,
    pub source: SourceKind,
    /// MIME type from a data-URI header or HTTP `Content-Type`, if any.
    pub declared_mime: Option<String>,
    /// Lower-cased extension with leading dot (`.pdf`) from the path or URL.
    pub extension: Option<String>,
    /// Human-readable origin for logs and error messages. Never the payload.
    pub origin: String,
}

impl FetchedPayload {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Fetch the bytes for `reference`, dispatching on its already-decided kind.
pub async fn acquire(
    reference: &str,
    kind: SourceKind,
    config: &VisualConfig,
) -> Result<FetchedPayload, VisualError> {
    match kind {
        SourceKind::FilePath => read_file(reference, config).await,
        SourceKind::Url => download_url(reference, config).await,
        SourceKind::InlineData => decode_inline(reference, config),
    }
}

// ── Local files ──────────────────────────────────────────────────────────

/// Read a local file, validating existence, permissions, and size.
pub async fn read_file(path_str: &str, config: &VisualConfig) -> Result<FetchedPayload, VisualError> {
    let path = PathBuf::from(path_str.trim());

    let meta = tokio::fs::metadata(&path)
        .await
        .map_err(|e| map_metadata_error(&path, e))?;

    if meta.is_dir() {
        return Err(VisualError::InvalidReference {
            reference: path.display().to_string(),
            reason: "path is a directory, not a file".into(),
        });
    }
    if meta.len() > config.max_payload_bytes {
        return Err(VisualError::SizeExceeded {
            origin: format!("file '{}'", path.display()),
            size: meta.len(),
            limit: config.max_payload_bytes,
        });
    }

    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|e| map_read_error(&path, e))?;

    // The file may have grown between stat and read.
    check_size(bytes.len() as u64, config, || format!("file '{}'", path.display()))?;

    debug!("Read {} bytes from {}", bytes.len(), path.display());

    Ok(FetchedPayload {
        bytes,
        source: SourceKind::FilePath,
        declared_mime: None,
        extension: extension_of(&path),
        origin: path.display().to_string(),
    })
}

/// Anything but a permission error means no file lives at `path`. References
/// no rule recognised land here too, often as over-long names.
fn map_metadata_error(path: &Path, e: std::io::Error) -> VisualError {
    let shown = PathBuf::from(abbreviate(&path.to_string_lossy()));
    match e.kind() {
        std::io::ErrorKind::PermissionDenied => VisualError::PermissionDenied { path: shown },
        _ => {
            debug!("Metadata for {} failed: {}", shown.display(), e);
            VisualError::NotFound { path: shown }
        }
    }
}

fn map_read_error(path: &Path, e: std::io::Error) -> VisualError {
    let shown = abbreviate(&path.to_string_lossy());
    match e.kind() {
        std::io::ErrorKind::NotFound => VisualError::NotFound { path: PathBuf::from(shown) },
        std::io::ErrorKind::PermissionDenied => VisualError::PermissionDenied {
            path: PathBuf::from(shown),
        },
        _ => VisualError::Unknown(format!("reading '{shown}': {e}")),
    }
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
}

// ── URLs ─────────────────────────────────────────────────────────────────

/// Validate a URL against scheme and allow-list rules without connecting.
pub fn validate_url(url: &str, config: &VisualConfig) -> Result<reqwest::Url, VisualError> {
    let parsed = reqwest::Url::parse(url.trim()).map_err(|e| VisualError::InvalidReference {
        reference: url.to_string(),
        reason: format!("not a valid URL: {e}"),
    })?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(VisualError::InvalidReference {
            reference: url.to_string(),
            reason: format!("unsupported URL scheme '{}', only http and https are allowed", parsed.scheme()),
        });
    }

    let host = parsed
        .host_str()
        .ok_or_else(|| VisualError::InvalidReference {
            reference: url.to_string(),
            reason: "URL has no host".into(),
        })?;

    if !config.is_domain_allowed(host) {
        return Err(VisualError::DomainRejected {
            host: host.to_string(),
        });
    }

    Ok(parsed)
}

/// Download a URL into memory, enforcing the payload limit while streaming.
pub async fn download_url(url: &str, config: &VisualConfig) -> Result<FetchedPayload, VisualError> {
    let parsed = validate_url(url, config)?;
    info!("Downloading {}", parsed);

    let client = build_client(config).map_err(|e| VisualError::DownloadFailed {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    let response = client
        .get(parsed.clone())
        .send()
        .await
        .map_err(|e| map_reqwest_error(e, url, config))?;

    if !response.status().is_success() {
        return Err(VisualError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    if let Some(len) = response.content_length() {
        check_size(len, config, || format!("URL '{url}'"))?;
    }

    let declared_mime = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or(v).trim().to_ascii_lowercase())
        .filter(|v| !v.is_empty());

    // Use the post-redirect URL for the suffix hint.
    let extension = url_suffix(response.url());

    let capacity = response
        .content_length()
        .unwrap_or(0)
        .min(config.max_payload_bytes) as usize;
    let mut bytes = Vec::with_capacity(capacity);
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| map_reqwest_error(e, url, config))?;
        check_size((bytes.len() + chunk.len()) as u64, config, || format!("URL '{url}'"))?;
        bytes.extend_from_slice(&chunk);
    }

    info!("Downloaded {} bytes from {}", bytes.len(), parsed);

    Ok(FetchedPayload {
        bytes,
        source: SourceKind::Url,
        declared_mime,
        extension,
        origin: url.to_string(),
    })
}

fn build_client(config: &VisualConfig) -> reqwest::Result<reqwest::Client> {
    let policy_config = config.clone();
    let policy = reqwest::redirect::Policy::custom(move |attempt| {
        if attempt.previous().len() >= MAX_REDIRECTS {
            return attempt.error(format!("more than {MAX_REDIRECTS} redirects"));
        }
        let host = attempt.url().host_str().unwrap_or_default().to_string();
        if policy_config.is_domain_allowed(&host) {
            attempt.follow()
        } else {
            attempt.error(format!("redirect to domain '{host}' is not allowed"))
        }
    });

    reqwest::Client::builder()
        .user_agent(concat!("edgequake-visual/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(config.download_timeout_secs))
        .redirect(policy)
        .build()
}

fn map_reqwest_error(e: reqwest::Error, url: &str, config: &VisualConfig) -> VisualError {
    if e.is_timeout() {
        VisualError::DownloadTimeout {
            url: url.to_string(),
            secs: config.download_timeout_secs,
        }
    } else {
        VisualError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        }
    }
}

/// Extension of the last path segment, e.g. `.pdf` for `/papers/a.PDF?x=1`.
fn url_suffix(url: &reqwest::Url) -> Option<String> {
    let last = url.path_segments()?.next_back()?;
    let (_, ext) = last.rsplit_once('.')?;
    if ext.is_empty() {
        return None;
    }
    Some(format!(".{}", ext.to_ascii_lowercase()))
}

// ── Inline data ──────────────────────────────────────────────────────────

/// A parsed `data:` URI header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri<'a> {
    pub mime_type: Option<String>,
    pub payload: &'a str,
}

/// Split `data:<mime>[;params];base64,<payload>`.
///
/// Only base64-encoded data URIs are accepted; percent-encoded ones cannot
/// carry binary image data sensibly and are rejected.
pub fn parse_data_uri(input: &str) -> Result<DataUri<'_>, VisualError> {
    let invalid = |reason: &str| VisualError::InvalidReference {
        reference: abbreviate(input),
        reason: reason.to_string(),
    };

    let rest = input
        .strip_prefix("data:")
        .ok_or_else(|| invalid("data URI must start with 'data:'"))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| invalid("malformed data URI: missing ',' before the payload"))?;

    let mut parts = header.split(';');
    let mime = parts.next().unwrap_or_default().trim().to_ascii_lowercase();
    let is_base64 = parts.any(|p| p.trim().eq_ignore_ascii_case("base64"));
    if !is_base64 {
        return Err(invalid("malformed data URI: only ';base64' payloads are supported"));
    }

    Ok(DataUri {
        mime_type: (!mime.is_empty()).then_some(mime),
        payload,
    })
}

/// Decode a data-URI or bare base64 string.
pub fn decode_inline(data: &str, config: &VisualConfig) -> Result<FetchedPayload, VisualError> {
    let trimmed = data.trim();
    let (declared_mime, payload) = if trimmed.starts_with("data:") {
        let uri = parse_data_uri(trimmed)?;
        (uri.mime_type, uri.payload)
    } else {
        (None, trimmed)
    };

    let compact = strip_whitespace(payload);
    if compact.is_empty() {
        return Err(VisualError::InvalidEncoding {
            detail: "no base64 payload present".into(),
        });
    }

    check_size(decoded_len_estimate(&compact), config, || "inline data".to_string())?;

    let bytes = STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| VisualError::InvalidEncoding {
            detail: e.to_string(),
        })?;

    if bytes.is_empty() {
        return Err(VisualError::InvalidEncoding {
            detail: "payload decoded to zero bytes".into(),
        });
    }
    check_size(bytes.len() as u64, config, || "inline data".to_string())?;

    debug!(
        "Decoded {} chars of inline data → {} bytes",
        compact.len(),
        bytes.len()
    );

    let extension = declared_mime.as_deref().and_then(extension_for_mime);
    Ok(FetchedPayload {
        bytes,
        source: SourceKind::InlineData,
        declared_mime,
        extension,
        origin: format!("inline data ({} chars)", compact.len()),
    })
}

/// Decoded size of a base64 string: 3 bytes per 4 chars, minus padding.
fn decoded_len_estimate(encoded: &str) -> u64 {
    let padding = encoded.bytes().rev().take(2).take_while(|&b| b == b'=').count() as u64;
    ((encoded.len() as u64).div_ceil(4) * 3).saturating_sub(padding)
}

fn extension_for_mime(mime: &str) -> Option<String> {
    let ext = match mime {
        "application/pdf" => ".pdf",
        "image/png" => ".png",
        "image/jpeg" | "image/jpg" => ".jpg",
        "image/gif" => ".gif",
        "image/webp" => ".webp",
        "image/bmp" => ".bmp",
        "image/tiff" => ".tiff",
        _ => return None,
    };
    Some(ext.to_string())
}

// ── Helpers ──────────────────────────────────────────────────────────────

fn check_size(
    size: u64,
    config: &VisualConfig,
    origin: impl FnOnce() -> String,
) -> Result<(), VisualError> {
    if size > config.max_payload_bytes {
        return Err(VisualError::SizeExceeded {
            origin: origin(),
            size,
            limit: config.max_payload_bytes,
        });
    }
    Ok(())
}

/// Shorten long references for error messages (inline payloads can be MBs).
pub(crate) fn abbreviate(reference: &str) -> String {
    const KEEP: usize = 64;
    if reference.len() <= KEEP {
        return reference.to_string();
    }
    let cut = (0..=KEEP)
        .rev()
        .find(|&i| reference.is_char_boundary(i))
        .unwrap_or(0);
    format!("{}… ({} chars)", &reference[..cut], reference.len())
}
