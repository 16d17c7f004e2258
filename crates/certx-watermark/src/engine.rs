//! # Watermark Engine
//!
//! Entry point for the transform. Detects the content format, resolves the
//! label and opacity against the injected [`WatermarkConfig`], and
//! dispatches to the PDF or raster path.

use std::path::Path;

use serde::Serialize;

use crate::config::{effective_opacity, WatermarkConfig};
use crate::error::WatermarkError;
use crate::format::{detect_format, FormatTag};
use crate::glyphs::{CustomFont, LabelFont};
use crate::pdf::{watermark_pdf, PdfStamp};
use crate::raster::{watermark_image, RasterStamp};
use crate::tiling;

/// Result of one transform.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WatermarkOutput {
    /// The transformed bytes (the input unchanged when `watermarked` is false).
    #[serde(skip)]
    pub bytes: Vec<u8>,
    /// The label text actually drawn.
    pub label_used: String,
    /// The detected input format.
    pub format: FormatTag,
    /// Whether diacritics were stripped to fit the glyph set.
    pub used_fallback_glyphs: bool,
    /// Whether a label was drawn at all.
    pub watermarked: bool,
    /// Vertical label positions as fractions of the height.
    pub positions: Vec<f64>,
}

impl WatermarkOutput {
    /// MIME type of the output bytes.
    pub fn mime(&self) -> &'static str {
        self.format.mime()
    }
}

/// Stateless watermark transform with injected configuration.
#[derive(Debug, Clone)]
pub struct WatermarkEngine {
    config: WatermarkConfig,
    font: LabelFont,
}

impl WatermarkEngine {
    /// Build an engine, loading the custom font if one is configured.
    ///
    /// A font that cannot be read or parsed is logged and the built-in
    /// glyph set is used instead.
    pub fn new(config: WatermarkConfig) -> Self {
        let font = match config.font_path.as_deref() {
            Some(path) => load_font(path),
            None => LabelFont::Builtin,
        };
        Self { config, font }
    }

    /// Build an engine with the built-in glyph set regardless of
    /// `config.font_path`.
    pub fn with_builtin_font(config: WatermarkConfig) -> Self {
        Self {
            config,
            font: LabelFont::Builtin,
        }
    }

    /// The injected configuration.
    pub fn config(&self) -> &WatermarkConfig {
        &self.config
    }

    /// Whether a custom font is active.
    pub fn has_custom_font(&self) -> bool {
        matches!(self.font, LabelFont::Custom(_))
    }

    /// Label positions for the configured repeat count and margin.
    pub fn positions(&self) -> Vec<f64> {
        tiling::positions(self.config.repeat, self.config.margin)
    }

    /// Stamp `label` onto `bytes` at `opacity`.
    ///
    /// A blank `label` falls back to the configured text. `opacity` is
    /// clamped to the drawable range. Unsupported formats are returned
    /// unchanged with `watermarked = false`.
    pub fn transform(
        &self,
        bytes: &[u8],
        label: &str,
        opacity: f32,
    ) -> Result<WatermarkOutput, WatermarkError> {
        let format = detect_format(bytes);
        let positions = self.positions();
        let requested = if label.trim().is_empty() {
            self.config.text.as_str()
        } else {
            label
        };

        if format == FormatTag::Unsupported {
            tracing::debug!(len = bytes.len(), "unsupported format, passing through");
            return Ok(WatermarkOutput {
                bytes: bytes.to_vec(),
                label_used: requested.to_string(),
                format,
                used_fallback_glyphs: false,
                watermarked: false,
                positions,
            });
        }

        let image_format = format.image_format();
        let glyphs = match image_format {
            Some(_) => &self.font,
            None => self.font.pdf_glyphs(),
        };
        let (text, used_fallback_glyphs) = glyphs.fit_label(requested)?;
        let opacity = effective_opacity(opacity);
        let rgb = self.config.rgb();

        let stamped = match image_format {
            Some(image_format) => watermark_image(
                bytes,
                image_format,
                glyphs,
                &RasterStamp {
                    text: &text,
                    opacity,
                    color: rgb,
                    positions: &positions,
                },
            )?,
            None => watermark_pdf(
                bytes,
                glyphs,
                &PdfStamp {
                    text: &text,
                    opacity,
                    color: rgb.unit(),
                    positions: &positions,
                },
            )?,
        };

        tracing::debug!(
            format = %format,
            in_len = bytes.len(),
            out_len = stamped.len(),
            used_fallback_glyphs,
            "watermark applied"
        );
        Ok(WatermarkOutput {
            bytes: stamped,
            label_used: text,
            format,
            used_fallback_glyphs,
            watermarked: true,
            positions,
        })
    }

    /// Stamp the configured text at the configured opacity.
    pub fn transform_with_defaults(&self, bytes: &[u8]) -> Result<WatermarkOutput, WatermarkError> {
        self.transform(bytes, &self.config.text, self.config.opacity)
    }
}

impl Default for WatermarkEngine {
    fn default() -> Self {
        Self::with_builtin_font(WatermarkConfig::default())
    }
}

fn load_font(path: &Path) -> LabelFont {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "cannot read watermark font, using built-in glyphs");
            return LabelFont::Builtin;
        }
    };
    match CustomFont::from_bytes(bytes) {
        Ok(font) => {
            if !font.embeddable_in_pdf() {
                tracing::warn!(
                    path = %path.display(),
                    "watermark font has CFF outlines; PDFs will use Helvetica"
                );
            }
            LabelFont::Custom(font)
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "cannot parse watermark font, using built-in glyphs");
            LabelFont::Builtin
        }
    }
}
