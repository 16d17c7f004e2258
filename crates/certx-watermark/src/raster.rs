//! Raster image watermarking.
//!
//! The label is drawn onto a transparent overlay the size of the image,
//! once per tiling position, rotated −30° about its own centre. The overlay
//! is then composited onto the decoded pixels and the result re-encoded in
//! the source format.
//!
//! ## Sizing
//!
//! ```text
//! size = round(min(w, h) × 0.05)
//! size = min(size, (w × 0.65 / label_len) × 2.2)
//! size = max(size, 18)
//! ```

use std::io::Cursor;

use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};

use crate::config::Rgb;
use crate::error::WatermarkError;
use crate::glyphs::{LabelFont, LabelMask};

const FONT_RATIO: f32 = 0.05;
const WIDTH_BUDGET: f32 = 0.65;
const CHAR_WIDTH_FACTOR: f32 = 2.2;
const MIN_FONT_PX: f32 = 18.0;

/// Unit vector along the label baseline in y-down image coordinates.
const BASELINE: (f32, f32) = (0.866_025_4, -0.5);
/// Unit vector from the label's top edge towards its bottom edge.
const ASCENDER: (f32, f32) = (0.5, 0.866_025_4);

/// Parameters for stamping one image.
pub(crate) struct RasterStamp<'a> {
    pub text: &'a str,
    pub opacity: f32,
    pub color: Rgb,
    pub positions: &'a [f64],
}

/// Font size in pixels for `text` on an image of `width` × `height`.
pub(crate) fn font_px(width: u32, height: u32, text: &str) -> f32 {
    let base = (width.min(height) as f32 * FONT_RATIO).round();
    let len = text.chars().count().max(1) as f32;
    let bounded = base.min(width as f32 * WIDTH_BUDGET / len * CHAR_WIDTH_FACTOR);
    bounded.max(MIN_FONT_PX)
}

/// Decode `bytes` as `format`, stamp it, and re-encode in the same format.
pub(crate) fn watermark_image(
    bytes: &[u8],
    format: ImageFormat,
    font: &LabelFont,
    stamp: &RasterStamp<'_>,
) -> Result<Vec<u8>, WatermarkError> {
    let decoded = image::load_from_memory_with_format(bytes, format)
        .map_err(|e| WatermarkError::CorruptImage(e.to_string()))?;
    let (width, height) = (decoded.width(), decoded.height());
    if width == 0 || height == 0 {
        return Err(WatermarkError::CorruptImage("image has no pixels".to_string()));
    }

    let mask = font.rasterize(stamp.text, font_px(width, height, stamp.text));
    let overlay = render_overlay(width, height, &mask, stamp);

    let keep_alpha = decoded.color().has_alpha();
    let mut base = decoded.to_rgba8();
    image::imageops::overlay(&mut base, &overlay, 0, 0);

    let composed = if keep_alpha {
        DynamicImage::ImageRgba8(base)
    } else {
        DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(base).to_rgb8())
    };
    let mut out = Cursor::new(Vec::with_capacity(bytes.len()));
    composed
        .write_to(&mut out, format)
        .map_err(|e| WatermarkError::Encode(e.to_string()))?;
    Ok(out.into_inner())
}

/// Draw the rotated label onto a transparent canvas at every position.
fn render_overlay(width: u32, height: u32, mask: &LabelMask, stamp: &RasterStamp<'_>) -> RgbaImage {
    let mut canvas = RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 0]));
    if mask.is_empty() {
        return canvas;
    }

    let half_w = mask.width as f32 / 2.0;
    let half_h = mask.height as f32 / 2.0;
    let reach_x = (half_w * BASELINE.0.abs() + half_h * ASCENDER.0.abs()).ceil();
    let reach_y = (half_w * BASELINE.1.abs() + half_h * ASCENDER.1.abs()).ceil();
    let Rgb { r, g, b } = stamp.color;
    let cx = width as f32 / 2.0;

    for ratio in stamp.positions {
        let cy = height as f32 * (*ratio as f32);
        let x0 = (cx - reach_x).floor().max(0.0) as u32;
        let x1 = ((cx + reach_x).ceil() as i64).clamp(0, i64::from(width)) as u32;
        let y0 = (cy - reach_y).floor().max(0.0) as u32;
        let y1 = ((cy + reach_y).ceil() as i64).clamp(0, i64::from(height)) as u32;

        for py in y0..y1 {
            for px in x0..x1 {
                let dx = px as f32 + 0.5 - cx;
                let dy = py as f32 + 0.5 - cy;
                let u = dx * BASELINE.0 + dy * BASELINE.1 + half_w;
                let v = dx * ASCENDER.0 + dy * ASCENDER.1 + half_h;
                let coverage = mask.at(u.floor() as i64, v.floor() as i64);
                if coverage <= 0.0 {
                    continue;
                }
                let alpha = (coverage * stamp.opacity * 255.0).round().clamp(0.0, 255.0) as u8;
                let pixel = canvas.get_pixel_mut(px, py);
                if alpha > pixel.0[3] {
                    *pixel = Rgba([r, g, b, alpha]);
                }
            }
        }
    }
    canvas
}
