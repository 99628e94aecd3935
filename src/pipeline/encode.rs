//! Compression: `DynamicImage` → encoded bytes in the output format.
//!
//! The output keeps the source's format whenever the image crate can write
//! it, so a PNG screenshot stays lossless and a photo stays a JPEG. Anything
//! else (TIFF, unknown) becomes [`DEFAULT_OUTPUT_FORMAT`].
//!
//! ## Why PNG for document pages?
//! Rendered text has hard edges. JPEG ringing around glyphs makes small print
//! harder to read for a vision model, and the page is already capped at
//! `max_width × max_height`, so the lossless payload stays small.
//!
//! Encoding failures are recoverable: [`compress_or_fallback`] hands back the
//! bytes the caller started with rather than failing the whole request, and
//! [`compress_page`] retries a rendered page with the stock PNG writer.

use crate::config::VisualConfig;
use crate::error::VisualError;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{DynamicImage, ExtendedColorType, ImageEncoder, ImageFormat};
use serde::Serialize;
use std::io::Cursor;
use tracing::{debug, warn};

/// Output format used when the source format is unknown or cannot be written.
pub const DEFAULT_OUTPUT_FORMAT: OutputFormat = OutputFormat::Jpeg;

/// Formats the compressor can write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Jpeg,
    Png,
    WebP,
    Gif,
    Bmp,
}

impl OutputFormat {
    /// Keep `source` if it is writable, else [`DEFAULT_OUTPUT_FORMAT`].
    pub fn for_source(source: Option<ImageFormat>) -> Self {
        match source {
            Some(ImageFormat::Jpeg) => OutputFormat::Jpeg,
            Some(ImageFormat::Png) => OutputFormat::Png,
            Some(ImageFormat::WebP) => OutputFormat::WebP,
            Some(ImageFormat::Gif) => OutputFormat::Gif,
            Some(ImageFormat::Bmp) => OutputFormat::Bmp,
            _ => DEFAULT_OUTPUT_FORMAT,
        }
    }

    pub fn image_format(self) -> ImageFormat {
        match self {
            OutputFormat::Jpeg => ImageFormat::Jpeg,
            OutputFormat::Png => ImageFormat::Png,
            OutputFormat::WebP => ImageFormat::WebP,
            OutputFormat::Gif => ImageFormat::Gif,
            OutputFormat::Bmp => ImageFormat::Bmp,
        }
    }
}

/// Encoder knobs, taken from [`VisualConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionSettings {
    /// 1–100.
    pub jpeg_quality: u8,
    /// 0–9; 0 stores uncompressed.
    pub png_compression: u8,
}

impl Default for CompressionSettings {
    fn default() -> Self {
        Self::from(&VisualConfig::default())
    }
}

impl From<&VisualConfig> for CompressionSettings {
    fn from(config: &VisualConfig) -> Self {
        Self {
            jpeg_quality: config.jpeg_quality,
            png_compression: config.png_compression,
        }
    }
}

impl CompressionSettings {
    fn png_compression_type(&self) -> CompressionType {
        match self.png_compression.min(9) {
            0 => CompressionType::Uncompressed,
            level => CompressionType::Level(level),
        }
    }
}

/// Final image bytes plus what a client needs to display them.
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
}

impl EncodedImage {
    pub fn mime_type(&self) -> &'static str {
        self.format.to_mime_type()
    }

    /// Short lower-case name: `jpeg`, `png`, `webp`, …
    pub fn format_name(&self) -> &'static str {
        format_name(self.format)
    }

    pub fn size_bytes(&self) -> usize {
        self.bytes.len()
    }
}

pub fn format_name(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Jpeg => "jpeg",
        ImageFormat::Png => "png",
        ImageFormat::WebP => "webp",
        ImageFormat::Gif => "gif",
        ImageFormat::Bmp => "bmp",
        ImageFormat::Tiff => "tiff",
        other => other.extensions_str().first().copied().unwrap_or("unknown"),
    }
}

/// Encode `image` as `format`.
pub fn compress(
    image: &DynamicImage,
    format: OutputFormat,
    settings: &CompressionSettings,
) -> Result<EncodedImage, VisualError> {
    let (width, height) = (image.width(), image.height());
    let mut buf = Vec::new();

    let result = match format {
        OutputFormat::Jpeg => {
            // JPEG has no alpha channel.
            let rgb = image.to_rgb8();
            let quality = settings.jpeg_quality.clamp(1, 100);
            JpegEncoder::new_with_quality(&mut buf, quality).encode(
                rgb.as_raw(),
                width,
                height,
                ExtendedColorType::Rgb8,
            )
        }
        OutputFormat::Png => {
            let rgba = image.to_rgba8();
            PngEncoder::new_with_quality(
                &mut buf,
                settings.png_compression_type(),
                FilterType::Adaptive,
            )
            .write_image(rgba.as_raw(), width, height, ExtendedColorType::Rgba8)
        }
        OutputFormat::WebP | OutputFormat::Gif | OutputFormat::Bmp => {
            DynamicImage::ImageRgba8(image.to_rgba8())
                .write_to(&mut Cursor::new(&mut buf), format.image_format())
        }
    };

    result.map_err(|e| VisualError::Unknown(format!("{format:?} encoding failed: {e}")))?;

    debug!(
        "Encoded {}x{} as {:?} → {} bytes",
        width,
        height,
        format,
        buf.len()
    );

    Ok(EncodedImage {
        bytes: buf,
        format: format.image_format(),
        width,
        height,
    })
}

/// Bytes the caller already has, used if compression fails.
#[derive(Debug, Clone)]
pub struct Fallback {
    pub bytes: Vec<u8>,
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
}

/// Like [`compress`], but returns `fallback` unchanged on failure.
pub fn compress_or_fallback(
    image: &DynamicImage,
    format: OutputFormat,
    settings: &CompressionSettings,
    fallback: Fallback,
) -> EncodedImage {
    match compress(image, format, settings) {
        Ok(encoded) => encoded,
        Err(e) => {
            warn!("Compression failed, returning original bytes: {}", e);
            EncodedImage {
                bytes: fallback.bytes,
                format: fallback.format,
                width: fallback.width,
                height: fallback.height,
            }
        }
    }
}

/// Encode a rendered page as PNG.
///
/// A page has no source bytes to fall back to, so a failed encode with the
/// configured settings is retried once with the image crate's defaults.
pub fn compress_page(
    image: &DynamicImage,
    settings: &CompressionSettings,
) -> Result<EncodedImage, VisualError> {
    compress_with_retry(image, |img| compress(img, OutputFormat::Png, settings))
}

fn compress_with_retry(
    image: &DynamicImage,
    primary: impl FnOnce(&DynamicImage) -> Result<EncodedImage, VisualError>,
) -> Result<EncodedImage, VisualError> {
    let err = match primary(image) {
        Ok(encoded) => return Ok(encoded),
        Err(e) => e,
    };
    warn!("Page compression failed, retrying with default PNG settings: {}", err);

    let mut buf = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .map_err(|e| VisualError::Unknown(format!("Png encoding failed: {e}")))?;
    Ok(EncodedImage {
        bytes: buf,
        format: ImageFormat::Png,
        width: image.width(),
        height: image.height(),
    })
}
