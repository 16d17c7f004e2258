//! # certx-watermark — Watermark Transform Engine
//!
//! Stamps a label onto a certificate document before publication. The
//! stamped bytes are what get hashed into the *published* fingerprint and
//! recorded on the ledger, so the transform must be deterministic for a
//! given input, label, opacity, and configuration.
//!
//! ## Formats
//!
//! | Input | Treatment |
//! |-------|-----------|
//! | PDF | Label drawn as rotated page text on every page (`lopdf`) |
//! | PNG, JPEG, GIF, WebP, BMP, TIFF | Transparent overlay composited onto the pixels (`image`) |
//! | anything else | Passed through unchanged, flagged `watermarked = false` |
//!
//! ## Layout
//!
//! Both paths share one tiling rule ([`tiling::positions`]) so a PDF page
//! and an image of the same proportions carry labels at the same relative
//! heights. Each label is rotated −30° and horizontally centred.
//!
//! ## Glyphs
//!
//! The built-in glyph set covers printable ASCII. A label it cannot render
//! has its diacritics stripped (`"Nguyễn"` → `"Nguyen"`) and the output is
//! flagged `used_fallback_glyphs`. A custom TrueType font configured through
//! [`WatermarkConfig::font_path`] widens the glyph set.
//!
//! ## Crate Policy
//!
//! - Stateless per call; [`WatermarkEngine`] is `Send + Sync` and may be
//!   shared across threads without coordination.
//! - Configuration is injected at construction, never read from globals.
//! - Malformed input is an explicit error, never an empty output.

pub mod config;
pub mod engine;
pub mod error;
pub mod format;
pub mod glyphs;
pub mod label;
pub mod pdf;
pub mod raster;
pub mod tiling;

pub use config::{Rgb, WatermarkConfig};
pub use engine::{WatermarkEngine, WatermarkOutput};
pub use error::WatermarkError;
pub use format::{detect_format, detect_mime, FormatTag};
pub use label::strip_diacritics;
pub use tiling::positions;
