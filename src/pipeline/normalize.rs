//! Region crop followed by a downscale-only fit into a bounding box.
//!
//! The crop always comes first so the region is expressed in the
//! coordinates of the image the caller actually sent. Resizing preserves
//! aspect ratio and never enlarges: an image already inside the box comes
//! back untouched.

use crate::pipeline::region::{crop_to_region, PixelRect, RegionSpec};
use image::imageops::FilterType;
use image::DynamicImage;
use tracing::debug;

/// Result of [`normalize`].
#[derive(Debug, Clone)]
pub struct Normalized {
    pub image: DynamicImage,
    /// Dimensions before crop and resize.
    pub original_width: u32,
    pub original_height: u32,
    /// The crop rectangle actually applied, if any.
    pub region: Option<PixelRect>,
}

/// Largest `(w, h)` with the same aspect ratio that fits `max_w × max_h`
/// and does not exceed `(width, height)`.
pub fn fit_within(width: u32, height: u32, max_w: u32, max_h: u32) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (width, height);
    }
    let bound_w = max_w.max(1).min(width);
    let bound_h = max_h.max(1).min(height);
    if bound_w == width && bound_h == height {
        return (width, height);
    }

    let scale = (f64::from(bound_w) / f64::from(width)).min(f64::from(bound_h) / f64::from(height));
    let w = ((f64::from(width) * scale).round() as u32).clamp(1, bound_w);
    let h = ((f64::from(height) * scale).round() as u32).clamp(1, bound_h);
    (w, h)
}

/// Shrink `image` to fit `max_w × max_h`. Never upscales.
pub fn resize_to_fit(image: DynamicImage, max_w: u32, max_h: u32) -> DynamicImage {
    let (w, h) = (image.width(), image.height());
    let (tw, th) = fit_within(w, h, max_w, max_h);
    if (tw, th) == (w, h) {
        return image;
    }
    debug!("Resizing {}x{} → {}x{}", w, h, tw, th);
    image.resize_exact(tw, th, FilterType::Lanczos3)
}

/// Crop to `region` (if any), then fit into `max_w × max_h`.
pub fn normalize(
    image: DynamicImage,
    region: Option<&RegionSpec>,
    max_w: u32,
    max_h: u32,
) -> Normalized {
    let (original_width, original_height) = (image.width(), image.height());

    let (image, applied) = match region {
        Some(spec) => crop_to_region(image, spec),
        None => (image, None),
    };

    Normalized {
        image: resize_to_fit(image, max_w, max_h),
        original_width,
        original_height,
        region: applied,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn gradient(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(w, h, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        }))
    }

    #[test]
    fn fit_keeps_small_images() {
        assert_eq!(fit_within(100, 100, 512, 512), (100, 100));
        assert_eq!(fit_within(512, 512, 512, 512), (512, 512));
    }

    #[test]
    fn fit_preserves_aspect_ratio() {
        assert_eq!(fit_within(2000, 1000, 512, 512), (512, 256));
        assert_eq!(fit_within(1000, 2000, 512, 512), (256, 512));
        assert_eq!(fit_within(1024, 768, 512, 512), (512, 384));
    }

    #[test]
    fn fit_respects_tighter_axis() {
        assert_eq!(fit_within(1000, 1000, 800, 200), (200, 200));
    }

    #[test]
    fn fit_never_collapses_to_zero() {
        let (w, h) = fit_within(10_000, 1, 100, 100);
        assert_eq!((w, h), (100, 1));
    }

    #[test]
    fn normalize_without_region_only_resizes() {
        let out = normalize(gradient(1024, 512), None, 512, 512);
        assert_eq!((out.image.width(), out.image.height()), (512, 256));
        assert_eq!((out.original_width, out.original_height), (1024, 512));
        assert!(out.region.is_none());
    }

    #[test]
    fn normalize_crops_before_resizing() {
        let region = RegionSpec::corners(0.0, 0.0, 0.5, 0.5);
        let out = normalize(gradient(2000, 2000), Some(&region), 512, 512);
        // 1000x1000 crop, then fit into 512.
        assert_eq!((out.image.width(), out.image.height()), (512, 512));
        assert_eq!(out.region.map(|r| (r.width, r.height)), Some((1000, 1000)));
        assert_eq!(out.original_width, 2000);
    }

    #[test]
    fn small_crop_is_not_upscaled() {
        let region = RegionSpec::corners(10.0, 10.0, 60.0, 60.0);
        let out = normalize(gradient(100, 100), Some(&region), 512, 512);
        assert_eq!((out.image.width(), out.image.height()), (50, 50));
    }
}
