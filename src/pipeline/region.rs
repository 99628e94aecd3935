//! Region-of-interest resolution and cropping.
//!
//! A region arrives in one of two shapes, opposite corners or a centre
//! point with half-extents, and its numbers are either fractions of the
//! image size or absolute pixels. The unit decision is made once for the
//! whole region: if all four numbers lie in `[0, 1]` the region is a ratio,
//! otherwise every number is a pixel coordinate. A tiny absolute region such
//! as `(0, 0, 1, 1)` therefore reads as "the whole image"; that is the
//! documented behaviour, not an accident.
//!
//! Resolution always happens against the image as decoded (before any
//! resize), so a caller's coordinates stay stable no matter how small the
//! final output is.

use image::DynamicImage;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

/// A sub-rectangle of the source image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RegionSpec {
    /// Two opposite corners: `(x1, y1)` top-left, `(x2, y2)` bottom-right.
    Corners { x1: f64, y1: f64, x2: f64, y2: f64 },
    /// Centre point and half width / half height.
    Center {
        cx: f64,
        cy: f64,
        #[serde(rename = "halfW")]
        half_w: f64,
        #[serde(rename = "halfH")]
        half_h: f64,
    },
}

/// How the four numbers of a [`RegionSpec`] are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionUnits {
    Ratio,
    Pixels,
}

/// An integer rectangle fully inside the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PixelRect {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

impl RegionSpec {
    pub fn corners(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        RegionSpec::Corners { x1, y1, x2, y2 }
    }

    pub fn center(cx: f64, cy: f64, half_w: f64, half_h: f64) -> Self {
        RegionSpec::Center {
            cx,
            cy,
            half_w,
            half_h,
        }
    }

    fn values(&self) -> [f64; 4] {
        match *self {
            RegionSpec::Corners { x1, y1, x2, y2 } => [x1, y1, x2, y2],
            RegionSpec::Center {
                cx,
                cy,
                half_w,
                half_h,
            } => [cx, cy, half_w, half_h],
        }
    }

    /// Ratio iff every number is within `[0, 1]`.
    pub fn units(&self) -> RegionUnits {
        if self.values().iter().all(|v| (0.0..=1.0).contains(v)) {
            RegionUnits::Ratio
        } else {
            RegionUnits::Pixels
        }
    }

    /// `(left, top, width, height)` in pixels, before clamping.
    fn to_pixel_box(self, img_w: u32, img_h: u32) -> (f64, f64, f64, f64) {
        let (sx, sy) = match self.units() {
            RegionUnits::Ratio => (f64::from(img_w), f64::from(img_h)),
            RegionUnits::Pixels => (1.0, 1.0),
        };
        match self {
            RegionSpec::Corners { x1, y1, x2, y2 } => {
                (x1 * sx, y1 * sy, (x2 - x1) * sx, (y2 - y1) * sy)
            }
            RegionSpec::Center {
                cx,
                cy,
                half_w,
                half_h,
            } => (
                (cx - half_w) * sx,
                (cy - half_h) * sy,
                2.0 * half_w * sx,
                2.0 * half_h * sy,
            ),
        }
    }
}

// Accepts `{x1,y1,x2,y2}`, `{cx,cy,halfW,halfH}` (snake_case too), or a
// bare 4-element array read as corners.
impl<'de> Deserialize<'de> for RegionSpec {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::Error;

        let value = serde_json::Value::deserialize(deserializer)?;
        let num = |v: Option<&serde_json::Value>, name: &str| -> Result<f64, D::Error> {
            v.and_then(serde_json::Value::as_f64)
                .ok_or_else(|| D::Error::custom(format!("region field '{name}' must be a number")))
        };

        if let Some(arr) = value.as_array() {
            if arr.len() != 4 {
                return Err(D::Error::custom(format!(
                    "region array must have 4 numbers [x1, y1, x2, y2], got {}",
                    arr.len()
                )));
            }
            return Ok(RegionSpec::corners(
                num(arr.first(), "x1")?,
                num(arr.get(1), "y1")?,
                num(arr.get(2), "x2")?,
                num(arr.get(3), "y2")?,
            ));
        }

        let obj = value
            .as_object()
            .ok_or_else(|| D::Error::custom("region must be an object or a 4-element array"))?;
        let field = |a: &str, b: &str| obj.get(a).or_else(|| obj.get(b));

        if obj.contains_key("x1") {
            return Ok(RegionSpec::corners(
                num(obj.get("x1"), "x1")?,
                num(obj.get("y1"), "y1")?,
                num(obj.get("x2"), "x2")?,
                num(obj.get("y2"), "y2")?,
            ));
        }
        if obj.contains_key("cx") {
            return Ok(RegionSpec::center(
                num(obj.get("cx"), "cx")?,
                num(obj.get("cy"), "cy")?,
                num(field("halfW", "half_w"), "halfW")?,
                num(field("halfH", "half_h"), "halfH")?,
            ));
        }

        let keys: Vec<&String> = obj.keys().collect();
        Err(D::Error::custom(format!(
            "region must have either x1/y1/x2/y2 or cx/cy/halfW/halfH, got keys: {keys:?}"
        )))
    }
}

/// Resolve `spec` against an image of `img_w × img_h`, clamped to bounds.
///
/// Returns `None` when nothing positive is left after clamping.
pub fn resolve_region(spec: &RegionSpec, img_w: u32, img_h: u32) -> Option<PixelRect> {
    let (mut left, mut top, mut width, mut height) = spec.to_pixel_box(img_w, img_h);
    let (max_w, max_h) = (f64::from(img_w), f64::from(img_h));

    if [left, top, width, height].iter().any(|v| !v.is_finite()) {
        return None;
    }

    if left < 0.0 {
        width += left;
        left = 0.0;
    }
    if top < 0.0 {
        height += top;
        top = 0.0;
    }
    if left + width > max_w {
        width = max_w - left;
    }
    if top + height > max_h {
        height = max_h - top;
    }

    let rect = PixelRect {
        left: left.round() as u32,
        top: top.round() as u32,
        width: width.round().max(0.0) as u32,
        height: height.round().max(0.0) as u32,
    };

    // Rounding can push a sliver past the edge; trim it back.
    let width = rect.width.min(img_w.saturating_sub(rect.left));
    let height = rect.height.min(img_h.saturating_sub(rect.top));
    if width == 0 || height == 0 {
        return None;
    }
    Some(PixelRect {
        width,
        height,
        ..rect
    })
}

/// Crop `image` to `spec`, or return it unchanged if the region is empty.
///
/// Returns the image and the rectangle actually applied.
pub fn crop_to_region(image: DynamicImage, spec: &RegionSpec) -> (DynamicImage, Option<PixelRect>) {
    match resolve_region(spec, image.width(), image.height()) {
        Some(rect) => {
            debug!(
                "Cropping {}x{} → {}x{} at ({}, {}) [{:?}]",
                image.width(),
                image.height(),
                rect.width,
                rect.height,
                rect.left,
                rect.top,
                spec.units()
            );
            let cropped = image.crop_imm(rect.left, rect.top, rect.width, rect.height);
            (cropped, Some(rect))
        }
        None => {
            debug!(
                "Region {:?} is empty inside a {}x{} image; using the full image",
                spec,
                image.width(),
                image.height()
            );
            (image, None)
        }
    }
}
