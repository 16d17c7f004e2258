//! Watermark transform errors.
//!
//! Every variant describes a problem with the *content* being stamped.
//! Unsupported formats are not an error: they pass through unchanged.

use thiserror::Error;

/// Errors from [`crate::WatermarkEngine::transform`].
#[derive(Error, Debug)]
pub enum WatermarkError {
    /// The bytes claim to be a PDF but cannot be parsed or lack pages.
    #[error("malformed PDF document: {0}")]
    MalformedDocument(String),

    /// The bytes claim to be a raster image but cannot be decoded.
    #[error("corrupt or unsupported image: {0}")]
    CorruptImage(String),

    /// The label cannot be drawn with the active glyph set, even after
    /// stripping diacritics.
    #[error("label {0:?} contains characters the active glyph set cannot render")]
    UnrenderableLabel(String),

    /// The stamped document could not be serialized.
    #[error("failed to encode watermarked output: {0}")]
    Encode(String),
}

impl From<lopdf::Error> for WatermarkError {
    fn from(err: lopdf::Error) -> Self {
        Self::MalformedDocument(err.to_string())
    }
}
