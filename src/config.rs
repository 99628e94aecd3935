//! Configuration for the visual content pipeline.
//!
//! All pipeline behaviour is controlled through [`VisualConfig`], built via
//! [`VisualConfigBuilder`] or loaded from the environment with
//! [`VisualConfig::from_env`]. Every default is a named constant below.
//!
//! Builder setters clamp to the valid range; [`VisualConfigBuilder::build`]
//! rejects anything that still cannot work (a zero output box, an empty
//! payload limit).

use crate::error::VisualError;
use serde::{Deserialize, Serialize};

// ── Defaults ─────────────────────────────────────────────────────────────

/// Largest payload read from disk, downloaded, or decoded inline: 50 MiB.
pub const DEFAULT_MAX_PAYLOAD_BYTES: u64 = 50 * 1024 * 1024;
/// Output images are fitted inside this box unless configured otherwise.
pub const DEFAULT_MAX_WIDTH: u32 = 512;
pub const DEFAULT_MAX_HEIGHT: u32 = 512;
/// Document rasterisation DPI when the caller does not pass one.
pub const DEFAULT_DPI: u32 = 150;
pub const MIN_DPI: u32 = 72;
pub const MAX_DPI: u32 = 600;
/// JPEG quality, 1–100.
pub const DEFAULT_JPEG_QUALITY: u8 = 80;
/// PNG compression level, 0–9.
pub const DEFAULT_PNG_COMPRESSION: u8 = 9;
pub const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 120;
/// Longest edge of a rasterised page, regardless of DPI.
pub const DEFAULT_MAX_RENDERED_PIXELS: u32 = 8000;
/// Original images above this pixel count get a "use a region" note.
pub const DEFAULT_LARGE_IMAGE_PIXELS: u64 = 2_000_000;

/// How much the content classifier trusts extension / MIME hints.
///
/// Magic bytes always win when they say "PDF". The policy only matters when
/// they don't, but a hint does (a `.pdf` name on a non-PDF byte stream).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SniffPolicy {
    /// A `pdf` MIME type or `.pdf` suffix still routes the payload to the
    /// document renderer, so truncated-but-labelled PDFs are attempted.
    #[default]
    HintsMayPromote,
    /// Only the `%PDF-` marker makes a payload a document.
    MagicOnly,
}

impl std::str::FromStr for SniffPolicy {
    type Err = VisualError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hints" | "hints_may_promote" => Ok(SniffPolicy::HintsMayPromote),
            "magic" | "magic_only" => Ok(SniffPolicy::MagicOnly),
            other => Err(VisualError::InvalidConfig(format!(
                "unknown sniff policy '{other}' (expected 'hints' or 'magic')"
            ))),
        }
    }
}

/// Configuration shared by every request.
///
/// Cheap to clone; nothing in it is mutated while a request runs.
///
/// # Example
/// ```rust
/// use edgequake_visual::VisualConfig;
///
/// let config = VisualConfig::builder()
///     .max_dimensions(1024, 768)
///     .jpeg_quality(70)
///     .allowed_domains(["example.com"])
///     .build()
///     .unwrap();
/// assert_eq!(config.max_width, 1024);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisualConfig {
    /// Maximum payload size in bytes. Default: 50 MiB.
    pub max_payload_bytes: u64,

    /// Maximum output width in pixels. Default: 512.
    pub max_width: u32,

    /// Maximum output height in pixels. Default: 512.
    pub max_height: u32,

    /// DPI used for documents when the request does not set one. Range: 72–600.
    pub default_dpi: u32,

    /// JPEG encoder quality (1–100). Default: 80.
    pub jpeg_quality: u8,

    /// PNG compression level (0–9). Default: 9.
    pub png_compression: u8,

    /// Hosts URLs may point at. Empty means unrestricted.
    ///
    /// An entry matches the host itself and any subdomain of it.
    pub allowed_domains: Vec<String>,

    /// HTTP timeout for URL sources in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Safety cap on the longest edge of a rasterised page. Default: 8000.
    ///
    /// A 600-DPI render of an A0 poster would be ~20 000 × 28 000 px; the cap
    /// keeps pdfium's bitmap allocation bounded no matter what DPI was asked.
    pub max_rendered_pixels: u32,

    /// Pixel count above which an unfocused image gets an advisory note.
    pub large_image_pixels: u64,

    /// Whether extension / MIME hints can route a payload to the PDF renderer.
    pub sniff_policy: SniffPolicy,
}

impl Default for VisualConfig {
    fn default() -> Self {
        Self {
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
            max_width: DEFAULT_MAX_WIDTH,
            max_height: DEFAULT_MAX_HEIGHT,
            default_dpi: DEFAULT_DPI,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            png_compression: DEFAULT_PNG_COMPRESSION,
            allowed_domains: Vec::new(),
            download_timeout_secs: DEFAULT_DOWNLOAD_TIMEOUT_SECS,
            max_rendered_pixels: DEFAULT_MAX_RENDERED_PIXELS,
            large_image_pixels: DEFAULT_LARGE_IMAGE_PIXELS,
            sniff_policy: SniffPolicy::default(),
        }
    }
}

impl VisualConfig {
    /// Create a new builder starting from the defaults.
    pub fn builder() -> VisualConfigBuilder {
        VisualConfigBuilder {
            config: Self::default(),
        }
    }

    /// Load configuration from `VISUAL_*` environment variables.
    ///
    /// Unset variables keep their default; set-but-unparseable ones are an
    /// error rather than silently ignored.
    pub fn from_env() -> Result<Self, VisualError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) but reads values through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, VisualError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut b = Self::builder();

        if let Some(v) = parse_var::<u64>(&lookup, "VISUAL_MAX_PAYLOAD_BYTES")? {
            b = b.max_payload_bytes(v);
        }
        if let Some(v) = parse_var::<u32>(&lookup, "VISUAL_MAX_WIDTH")? {
            b.config.max_width = v;
        }
        if let Some(v) = parse_var::<u32>(&lookup, "VISUAL_MAX_HEIGHT")? {
            b.config.max_height = v;
        }
        if let Some(v) = parse_var::<u32>(&lookup, "VISUAL_DEFAULT_DPI")? {
            b = b.default_dpi(v);
        }
        if let Some(v) = parse_var::<u8>(&lookup, "VISUAL_JPEG_QUALITY")? {
            b = b.jpeg_quality(v);
        }
        if let Some(v) = parse_var::<u8>(&lookup, "VISUAL_PNG_COMPRESSION")? {
            b = b.png_compression(v);
        }
        if let Some(v) = lookup("VISUAL_ALLOWED_DOMAINS") {
            b = b.allowed_domains(v.split(',').map(str::trim).filter(|d| !d.is_empty()));
        }
        if let Some(v) = parse_var::<u64>(&lookup, "VISUAL_DOWNLOAD_TIMEOUT")? {
            b = b.download_timeout_secs(v);
        }
        if let Some(v) = parse_var::<u32>(&lookup, "VISUAL_MAX_RENDERED_PIXELS")? {
            b = b.max_rendered_pixels(v);
        }
        if let Some(v) = parse_var::<u64>(&lookup, "VISUAL_LARGE_IMAGE_PIXELS")? {
            b = b.large_image_pixels(v);
        }
        if let Some(v) = lookup("VISUAL_SNIFF_POLICY") {
            b = b.sniff_policy(v.parse()?);
        }

        b.build()
    }

    /// Clamp a caller-supplied DPI into the supported range, falling back to
    /// `default_dpi` when none was given.
    pub fn effective_dpi(&self, requested: Option<u32>) -> u32 {
        requested
            .unwrap_or(self.default_dpi)
            .clamp(MIN_DPI, MAX_DPI)
    }

    /// True when `host` passes the allow-list.
    pub fn is_domain_allowed(&self, host: &str) -> bool {
        if self.allowed_domains.is_empty() {
            return true;
        }
        let host = host.trim_end_matches('.').to_ascii_lowercase();
        self.allowed_domains.iter().any(|allowed| {
            let allowed = allowed.trim().trim_end_matches('.').to_ascii_lowercase();
            host == allowed || host.ends_with(&format!(".{allowed}"))
        })
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>, VisualError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| VisualError::InvalidConfig(format!("{key}='{raw}': {e}"))),
    }
}

/// Builder for [`VisualConfig`].
#[derive(Debug)]
pub struct VisualConfigBuilder {
    config: VisualConfig,
}

impl VisualConfigBuilder {
    pub fn max_payload_bytes(mut self, bytes: u64) -> Self {
        self.config.max_payload_bytes = bytes;
        self
    }

    pub fn max_dimensions(mut self, width: u32, height: u32) -> Self {
        self.config.max_width = width;
        self.config.max_height = height;
        self
    }

    pub fn default_dpi(mut self, dpi: u32) -> Self {
        self.config.default_dpi = dpi.clamp(MIN_DPI, MAX_DPI);
        self
    }

    pub fn jpeg_quality(mut self, quality: u8) -> Self {
        self.config.jpeg_quality = quality.clamp(1, 100);
        self
    }

    pub fn png_compression(mut self, level: u8) -> Self {
        self.config.png_compression = level.min(9);
        self
    }

    pub fn allowed_domains<I, S>(mut self, domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.allowed_domains = domains.into_iter().map(Into::into).collect();
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn large_image_pixels(mut self, px: u64) -> Self {
        self.config.large_image_pixels = px;
        self
    }

    pub fn sniff_policy(mut self, policy: SniffPolicy) -> Self {
        self.config.sniff_policy = policy;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<VisualConfig, VisualError> {
        let c = &self.config;
        if c.max_width == 0 || c.max_height == 0 {
            return Err(VisualError::InvalidConfig(format!(
                "maximum output dimensions must be positive, got {}x{}",
                c.max_width, c.max_height
            )));
        }
        if c.max_payload_bytes == 0 {
            return Err(VisualError::InvalidConfig(
                "max_payload_bytes must be ≥ 1".into(),
            ));
        }
        if c.download_timeout_secs == 0 {
            return Err(VisualError::InvalidConfig(
                "download timeout must be ≥ 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}
