//! Glyph sets used to draw the label.
//!
//! Two sets exist:
//!
//! - **Built-in**: printable ASCII. PDFs reference the standard Helvetica
//!   face (no embedding needed); raster images use a 5×7 bitmap face.
//! - **Custom**: a TrueType/OpenType font loaded from
//!   [`crate::WatermarkConfig::font_path`]. PDFs embed it as a Type0 font
//!   (TrueType outlines only); raster images draw anti-aliased outlines.
//!
//! A CFF-flavoured custom font cannot be embedded, so PDFs fall back to
//! Helvetica and [`LabelFont::pdf_glyphs`] reports the built-in set. Fit
//! labels against the set of the path that will draw them.

use std::sync::Arc;

use ab_glyph::{point, Font, FontArc, GlyphId, PxScale, ScaleFont};

use crate::error::WatermarkError;
use crate::label::strip_diacritics;

static BUILTIN: LabelFont = LabelFont::Builtin;

/// The glyph set available to the engine.
#[derive(Clone)]
pub enum LabelFont {
    /// Printable ASCII only.
    Builtin,
    /// A loaded custom font.
    Custom(CustomFont),
}

impl std::fmt::Debug for LabelFont {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Builtin => f.write_str("Builtin"),
            Self::Custom(font) => f
                .debug_struct("Custom")
                .field("bytes", &font.bytes.len())
                .field("truetype_outlines", &font.truetype_outlines)
                .finish(),
        }
    }
}

/// A custom font and its raw bytes (kept for PDF embedding).
#[derive(Clone)]
pub struct CustomFont {
    font: FontArc,
    bytes: Arc<Vec<u8>>,
    truetype_outlines: bool,
}

impl CustomFont {
    /// Parse font bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, ab_glyph::InvalidFont> {
        let font = FontArc::try_from_vec(bytes.clone())?;
        // `glyf` outlines start with 0x00010000 or "true"; CFF fonts with "OTTO".
        let truetype_outlines = bytes.starts_with(&[0x00, 0x01, 0x00, 0x00]) || bytes.starts_with(b"true");
        Ok(Self {
            font,
            bytes: Arc::new(bytes),
            truetype_outlines,
        })
    }

    /// The parsed font.
    pub fn font(&self) -> &FontArc {
        &self.font
    }

    /// The raw font file.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Whether the font can be embedded as a PDF `FontFile2`.
    pub fn embeddable_in_pdf(&self) -> bool {
        self.truetype_outlines
    }

    fn units_per_em(&self) -> f32 {
        self.font.units_per_em().unwrap_or(1000.0)
    }

    /// Horizontal advance of `c` in thousandths of an em.
    pub fn advance_milli_em(&self, c: char) -> f32 {
        let id = self.font.glyph_id(c);
        self.font.h_advance_unscaled(id) * 1000.0 / self.units_per_em()
    }

    /// Glyph id of `c`.
    pub fn glyph_id(&self, c: char) -> GlyphId {
        self.font.glyph_id(c)
    }

    /// Ascent and descent in thousandths of an em.
    pub fn vertical_metrics_milli_em(&self) -> (f32, f32) {
        let scale = 1000.0 / self.units_per_em();
        (
            self.font.ascent_unscaled() * scale,
            self.font.descent_unscaled() * scale,
        )
    }

    fn supports(&self, text: &str) -> bool {
        text.chars()
            .all(|c| c.is_whitespace() || self.font.glyph_id(c).0 != 0)
    }
}

impl LabelFont {
    /// Whether every character of `text` has a glyph.
    pub fn supports(&self, text: &str) -> bool {
        match self {
            Self::Builtin => text.chars().all(|c| (' '..='~').contains(&c)),
            Self::Custom(font) => font.supports(text),
        }
    }

    /// The glyph set the PDF path actually draws with.
    pub fn pdf_glyphs(&self) -> &LabelFont {
        match self {
            Self::Custom(font) if !font.embeddable_in_pdf() => &BUILTIN,
            other => other,
        }
    }

    /// Choose the text actually drawn for `label`.
    ///
    /// Returns the drawable text and whether diacritics had to be stripped.
    pub fn fit_label(&self, label: &str) -> Result<(String, bool), WatermarkError> {
        if self.supports(label) {
            return Ok((label.to_string(), false));
        }
        let stripped = strip_diacritics(label);
        if stripped != label && self.supports(&stripped) {
            tracing::debug!(label, stripped = %stripped, "label stripped of diacritics");
            return Ok((stripped, true));
        }
        Err(WatermarkError::UnrenderableLabel(label.to_string()))
    }

    /// Width of `text` at `size` points, in the PDF path's metrics.
    pub fn pdf_text_width(&self, text: &str, size: f32) -> f32 {
        let milli: f32 = match self {
            Self::Custom(font) if font.embeddable_in_pdf() => {
                text.chars().map(|c| font.advance_milli_em(c)).sum()
            }
            _ => text.chars().map(helvetica_width).sum(),
        };
        milli * size / 1000.0
    }

    /// Rasterize `text` at `px` pixels into a coverage mask.
    pub fn rasterize(&self, text: &str, px: f32) -> LabelMask {
        match self {
            Self::Builtin => rasterize_bitmap(text, px),
            Self::Custom(font) => rasterize_outline(font.font(), text, px),
        }
    }
}

// ─── Coverage Mask ───────────────────────────────────────────────────

/// Per-pixel label coverage in `[0, 1]`, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelMask {
    pub width: u32,
    pub height: u32,
    pub coverage: Vec<f32>,
}

impl LabelMask {
    fn blank(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            coverage: vec![0.0; width as usize * height as usize],
        }
    }

    /// Coverage at `(x, y)`, zero outside the mask.
    pub fn at(&self, x: i64, y: i64) -> f32 {
        if x < 0 || y < 0 || x >= i64::from(self.width) || y >= i64::from(self.height) {
            return 0.0;
        }
        self.coverage[y as usize * self.width as usize + x as usize]
    }

    fn accumulate(&mut self, x: i64, y: i64, value: f32) {
        if x < 0 || y < 0 || x >= i64::from(self.width) || y >= i64::from(self.height) {
            return;
        }
        let cell = &mut self.coverage[y as usize * self.width as usize + x as usize];
        *cell = cell.max(value.clamp(0.0, 1.0));
    }

    /// Whether any pixel is covered.
    pub fn is_empty(&self) -> bool {
        self.coverage.iter().all(|c| *c == 0.0)
    }
}

fn rasterize_outline(font: &FontArc, text: &str, px: f32) -> LabelMask {
    let scaled = font.as_scaled(PxScale::from(px));
    let ascent = scaled.ascent();
    let height = (ascent - scaled.descent()).ceil().max(1.0) as u32;

    let mut caret = 0.0f32;
    let mut glyphs = Vec::with_capacity(text.len());
    for c in text.chars() {
        let mut glyph = scaled.scaled_glyph(c);
        glyph.position = point(caret, ascent);
        caret += scaled.h_advance(glyph.id);
        glyphs.push(glyph);
    }

    let mut mask = LabelMask::blank(caret.ceil().max(1.0) as u32, height);
    for glyph in glyphs {
        if let Some(outlined) = font.outline_glyph(glyph) {
            let bounds = outlined.px_bounds();
            outlined.draw(|gx, gy, c| {
                mask.accumulate(
                    bounds.min.x as i64 + i64::from(gx),
                    bounds.min.y as i64 + i64::from(gy),
                    c,
                );
            });
        }
    }
    mask
}

// ─── Built-in Bitmap Face ────────────────────────────────────────────

/// Cell width in font units (5 columns of ink plus 1 of spacing).
const CELL_W: u32 = 6;
/// Cell height in font units (7 rows of ink plus 1 of spacing).
const CELL_H: u32 = 8;

fn rasterize_bitmap(text: &str, px: f32) -> LabelMask {
    let unit = (px / CELL_H as f32).max(1.0);
    let chars: Vec<char> = text.chars().collect();
    let width = (chars.len() as f32 * CELL_W as f32 * unit).ceil().max(1.0) as u32;
    let height = (CELL_H as f32 * unit).ceil() as u32;
    let mut mask = LabelMask::blank(width, height);

    for y in 0..height {
        let row = (y as f32 / unit) as u32;
        if row >= 7 {
            continue;
        }
        for x in 0..width {
            let u = (x as f32 / unit) as u32;
            let (idx, col) = ((u / CELL_W) as usize, u % CELL_W);
            if col >= 5 {
                continue;
            }
            let Some(&c) = chars.get(idx) else { continue };
            if bitmap_column(c, col) & (1 << row) != 0 {
                mask.accumulate(i64::from(x), i64::from(y), 1.0);
            }
        }
    }
    mask
}

fn bitmap_column(c: char, col: u32) -> u8 {
    let code = c as u32;
    if !(0x20..=0x7E).contains(&code) {
        return 0;
    }
    FONT_5X7[(code - 0x20) as usize][col as usize]
}

/// Column-major 5×7 glyphs for 0x20..=0x7E; bit 0 is the top row.
const FONT_5X7: [[u8; 5]; 95] = [
    [0x00, 0x00, 0x00, 0x00, 0x00], // ' '
    [0x00, 0x00, 0x5F, 0x00, 0x00], // !
    [0x00, 0x07, 0x00, 0x07, 0x00], // "
    [0x14, 0x7F, 0x14, 0x7F, 0x14], // #
    [0x24, 0x2A, 0x7F, 0x2A, 0x12], // $
    [0x23, 0x13, 0x08, 0x64, 0x62], // %
    [0x36, 0x49, 0x55, 0x22, 0x50], // &
    [0x00, 0x05, 0x03, 0x00, 0x00], // '
    [0x00, 0x1C, 0x22, 0x41, 0x00], // (
    [0x00, 0x41, 0x22, 0x1C, 0x00], // )
    [0x14, 0x08, 0x3E, 0x08, 0x14], // *
    [0x08, 0x08, 0x3E, 0x08, 0x08], // +
    [0x00, 0x50, 0x30, 0x00, 0x00], // ,
    [0x08, 0x08, 0x08, 0x08, 0x08], // -
    [0x00, 0x60, 0x60, 0x00, 0x00], // .
    [0x20, 0x10, 0x08, 0x04, 0x02], // /
    [0x3E, 0x51, 0x49, 0x45, 0x3E], // 0
    [0x00, 0x42, 0x7F, 0x40, 0x00], // 1
    [0x42, 0x61, 0x51, 0x49, 0x46], // 2
    [0x21, 0x41, 0x45, 0x4B, 0x31], // 3
    [0x18, 0x14, 0x12, 0x7F, 0x10], // 4
    [0x27, 0x45, 0x45, 0x45, 0x39], // 5
    [0x3C, 0x4A, 0x49, 0x49, 0x30], // 6
    [0x01, 0x71, 0x09, 0x05, 0x03], // 7
    [0x36, 0x49, 0x49, 0x49, 0x36], // 8
    [0x06, 0x49, 0x49, 0x29, 0x1E], // 9
    [0x00, 0x36, 0x36, 0x00, 0x00], // :
    [0x00, 0x56, 0x36, 0x00, 0x00], // ;
    [0x08, 0x14, 0x22, 0x41, 0x00], // <
    [0x14, 0x14, 0x14, 0x14, 0x14], // =
    [0x00, 0x41, 0x22, 0x14, 0x08], // >
    [0x02, 0x01, 0x51, 0x09, 0x06], // ?
    [0x32, 0x49, 0x79, 0x41, 0x3E], // @
    [0x7E, 0x11, 0x11, 0x11, 0x7E], // A
    [0x7F, 0x49, 0x49, 0x49, 0x36], // B
    [0x3E, 0x41, 0x41, 0x41, 0x22], // C
    [0x7F, 0x41, 0x41, 0x22, 0x1C], // D
    [0x7F, 0x49, 0x49, 0x49, 0x41], // E
    [0x7F, 0x09, 0x09, 0x09, 0x01], // F
    [0x3E, 0x41, 0x49, 0x49, 0x7A], // G
    [0x7F, 0x08, 0x08, 0x08, 0x7F], // H
    [0x00, 0x41, 0x7F, 0x41, 0x00], // I
    [0x20, 0x40, 0x41, 0x3F, 0x01], // J
    [0x7F, 0x08, 0x14, 0x22, 0x41], // K
    [0x7F, 0x40, 0x40, 0x40, 0x40], // L
    [0x7F, 0x02, 0x0C, 0x02, 0x7F], // M
    [0x7F, 0x04, 0x08, 0x10, 0x7F], // N
    [0x3E, 0x41, 0x41, 0x41, 0x3E], // O
    [0x7F, 0x09, 0x09, 0x09, 0x06], // P
    [0x3E, 0x41, 0x51, 0x21, 0x5E], // Q
    [0x7F, 0x09, 0x19, 0x29, 0x46], // R
    [0x46, 0x49, 0x49, 0x49, 0x31], // S
    [0x01, 0x01, 0x7F, 0x01, 0x01], // T
    [0x3F, 0x40, 0x40, 0x40, 0x3F], // U
    [0x1F, 0x20, 0x40, 0x20, 0x1F], // V
    [0x3F, 0x40, 0x38, 0x40, 0x3F], // W
    [0x63, 0x14, 0x08, 0x14, 0x63], // X
    [0x07, 0x08, 0x70, 0x08, 0x07], // Y
    [0x61, 0x51, 0x49, 0x45, 0x43], // Z
    [0x00, 0x7F, 0x41, 0x41, 0x00], // [
    [0x02, 0x04, 0x08, 0x10, 0x20], // \
    [0x00, 0x41, 0x41, 0x7F, 0x00], // ]
    [0x04, 0x02, 0x01, 0x02, 0x04], // ^
    [0x40, 0x40, 0x40, 0x40, 0x40], // _
    [0x00, 0x01, 0x02, 0x04, 0x00], // `
    [0x20, 0x54, 0x54, 0x54, 0x78], // a
    [0x7F, 0x48, 0x44, 0x44, 0x38], // b
    [0x38, 0x44, 0x44, 0x44, 0x20], // c
    [0x38, 0x44, 0x44, 0x48, 0x7F], // d
    [0x38, 0x54, 0x54, 0x54, 0x18], // e
    [0x08, 0x7E, 0x09, 0x01, 0x02], // f
    [0x0C, 0x52, 0x52, 0x52, 0x3E], // g
    [0x7F, 0x08, 0x04, 0x04, 0x78], // h
    [0x00, 0x44, 0x7D, 0x40, 0x00], // i
    [0x20, 0x40, 0x44, 0x3D, 0x00], // j
    [0x7F, 0x10, 0x28, 0x44, 0x00], // k
    [0x00, 0x41, 0x7F, 0x40, 0x00], // l
    [0x7C, 0x04, 0x18, 0x04, 0x78], // m
    [0x7C, 0x08, 0x04, 0x04, 0x78], // n
    [0x38, 0x44, 0x44, 0x44, 0x38], // o
    [0x7C, 0x14, 0x14, 0x14, 0x08], // p
    [0x08, 0x14, 0x14, 0x18, 0x7C], // q
    [0x7C, 0x08, 0x04, 0x04, 0x08], // r
    [0x48, 0x54, 0x54, 0x54, 0x20], // s
    [0x04, 0x3F, 0x44, 0x40, 0x20], // t
    [0x3C, 0x40, 0x40, 0x20, 0x7C], // u
    [0x1C, 0x20, 0x40, 0x20, 0x1C], // v
    [0x3C, 0x40, 0x30, 0x40, 0x3C], // w
    [0x44, 0x28, 0x10, 0x28, 0x44], // x
    [0x0C, 0x50, 0x50, 0x50, 0x3C], // y
    [0x44, 0x64, 0x54, 0x4C, 0x44], // z
    [0x00, 0x08, 0x36, 0x41, 0x00], // {
    [0x00, 0x00, 0x7F, 0x00, 0x00], // |
    [0x00, 0x41, 0x36, 0x08, 0x00], // }
    [0x08, 0x04, 0x08, 0x10, 0x08], // ~
];

// ─── Helvetica Metrics ───────────────────────────────────────────────

/// Helvetica advance widths (thousandths of an em) for 0x20..=0x7E under
/// WinAnsiEncoding.
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '../
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, // 0..9
    278, 278, 584, 584, 584, 556, 1015, // :..@
    667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, // A..M
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, // N..Z
    278, 278, 278, 469, 556, 333, // [..`
    556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, // a..m
    556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, // n..z
    334, 260, 334, 584, // {..~
];

fn helvetica_width(c: char) -> f32 {
    let code = c as u32;
    if (0x20..=0x7E).contains(&code) {
        f32::from(HELVETICA_WIDTHS[(code - 0x20) as usize])
    } else {
        // Only reachable for unsupported text, which fit_label rejects first.
        556.0
    }
}
