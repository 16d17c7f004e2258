//! Watermark configuration.
//!
//! Defaults match the published certificates: a light grey
//! `"Issued by CertX"` label at 20% opacity, three repeats, 12% vertical
//! margin. Override via environment variables, a YAML file, or explicit
//! construction.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default label when none is supplied.
pub const DEFAULT_TEXT: &str = "Issued by CertX";
/// Default label opacity.
pub const DEFAULT_OPACITY: f32 = 0.2;
/// Default label colour.
pub const DEFAULT_COLOR: &str = "#bfbfbf";
/// Default number of label repeats per page or image.
pub const DEFAULT_REPEAT: u32 = 3;
/// Default top/bottom margin as a fraction of the height.
pub const DEFAULT_MARGIN: f64 = 0.12;

/// Lowest opacity the engine will draw with. A label at zero opacity would
/// leave raster bytes unchanged and the published hash equal to the
/// original.
pub const MIN_OPACITY: f32 = 0.05;

/// Watermark defaults injected into [`crate::WatermarkEngine`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct WatermarkConfig {
    /// Label drawn when the caller does not supply one.
    pub text: String,
    /// Label opacity in `[0, 1]`.
    pub opacity: f32,
    /// Label colour as `#rgb` or `#rrggbb`.
    pub color: String,
    /// Number of label repeats along the vertical band.
    pub repeat: u32,
    /// Top/bottom margin ratio, clamped to `[0, 0.45]` when used.
    pub margin: f64,
    /// Optional TrueType font widening the glyph set beyond ASCII.
    pub font_path: Option<PathBuf>,
}

impl Default for WatermarkConfig {
    fn default() -> Self {
        Self {
            text: DEFAULT_TEXT.to_string(),
            opacity: DEFAULT_OPACITY,
            color: DEFAULT_COLOR.to_string(),
            repeat: DEFAULT_REPEAT,
            margin: DEFAULT_MARGIN,
            font_path: None,
        }
    }
}

impl WatermarkConfig {
    /// Load configuration from environment variables.
    ///
    /// Variables (all optional):
    /// - `CERTX_WATERMARK_TEXT` (default: `Issued by CertX`)
    /// - `CERTX_WATERMARK_OPACITY` (default: 0.2)
    /// - `CERTX_WATERMARK_COLOR` (default: `#bfbfbf`)
    /// - `CERTX_WATERMARK_REPEAT` (default: 3)
    /// - `CERTX_WATERMARK_MARGIN` (default: 0.12)
    /// - `CERTX_WATERMARK_FONT_PATH` (default: none)
    ///
    /// Unparsable numeric values fall back to their defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            text: std::env::var("CERTX_WATERMARK_TEXT")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(defaults.text),
            opacity: env_parse("CERTX_WATERMARK_OPACITY").unwrap_or(defaults.opacity),
            color: std::env::var("CERTX_WATERMARK_COLOR")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(defaults.color),
            repeat: env_parse("CERTX_WATERMARK_REPEAT").unwrap_or(defaults.repeat),
            margin: env_parse("CERTX_WATERMARK_MARGIN").unwrap_or(defaults.margin),
            font_path: std::env::var_os("CERTX_WATERMARK_FONT_PATH").map(PathBuf::from),
        }
    }

    /// The configured colour, parsed.
    pub fn rgb(&self) -> Rgb {
        Rgb::parse_hex(&self.color)
    }
}

fn env_parse<T: std::str::FromStr>(var: &str) -> Option<T> {
    std::env::var(var).ok().and_then(|s| s.trim().parse().ok())
}

/// Clamp a requested opacity into the drawable range.
pub fn effective_opacity(requested: f32) -> f32 {
    if requested.is_nan() {
        return DEFAULT_OPACITY;
    }
    requested.clamp(MIN_OPACITY, 1.0)
}

/// An 8-bit RGB colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    /// Colour used when the configured value cannot be parsed.
    pub const FALLBACK: Rgb = Rgb { r: 47, g: 47, b: 47 };

    /// Parse `#rgb` or `#rrggbb`. Non-hex characters are ignored; any other
    /// length yields [`Rgb::FALLBACK`].
    pub fn parse_hex(input: &str) -> Self {
        let digits: Vec<u8> = input
            .chars()
            .filter_map(|c| c.to_digit(16))
            .map(|d| d as u8)
            .collect();
        match digits.as_slice() {
            [r, g, b] => Self {
                r: r * 16 + r,
                g: g * 16 + g,
                b: b * 16 + b,
            },
            [r1, r2, g1, g2, b1, b2] => Self {
                r: r1 * 16 + r2,
                g: g1 * 16 + g2,
                b: b1 * 16 + b2,
            },
            _ => Self::FALLBACK,
        }
    }

    /// Components scaled to `[0, 1]` for PDF colour operators.
    pub fn unit(&self) -> [f32; 3] {
        [
            f32::from(self.r) / 255.0,
            f32::from(self.g) / 255.0,
            f32::from(self.b) / 255.0,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_six_digit_hex() {
        assert_eq!(Rgb::parse_hex("#bfbfbf"), Rgb { r: 191, g: 191, b: 191 });
        assert_eq!(Rgb::parse_hex("FF0080"), Rgb { r: 255, g: 0, b: 128 });
    }

    #[test]
    fn parses_three_digit_hex() {
        assert_eq!(Rgb::parse_hex("#f0a"), Rgb { r: 255, g: 0, b: 170 });
    }

    #[test]
    fn unparsable_colour_falls_back() {
        assert_eq!(Rgb::parse_hex(""), Rgb::FALLBACK);
        assert_eq!(Rgb::parse_hex("#12345"), Rgb::FALLBACK);
        assert_eq!(Rgb::parse_hex("grey"), Rgb::FALLBACK);
    }

    #[test]
    fn opacity_is_clamped() {
        assert_eq!(effective_opacity(0.0), MIN_OPACITY);
        assert_eq!(effective_opacity(3.0), 1.0);
        assert_eq!(effective_opacity(0.4), 0.4);
        assert_eq!(effective_opacity(f32::NAN), DEFAULT_OPACITY);
    }

    #[test]
    fn defaults_match_published_style() {
        let cfg = WatermarkConfig::default();
        assert_eq!(cfg.text, "Issued by CertX");
        assert_eq!(cfg.repeat, 3);
        assert!((cfg.margin - 0.12).abs() < f64::EPSILON);
        assert_eq!(cfg.rgb(), Rgb { r: 191, g: 191, b: 191 });
    }

    #[test]
    fn yaml_overrides_merge_with_defaults() {
        let cfg: WatermarkConfig = serde_yaml::from_str("text: Verified\nrepeat: 5\n").unwrap();
        assert_eq!(cfg.text, "Verified");
        assert_eq!(cfg.repeat, 5);
        assert_eq!(cfg.color, DEFAULT_COLOR);
        assert!(cfg.font_path.is_none());
    }
}
