//! Content format detection.
//!
//! Detection is by magic bytes only; file names and client-declared MIME
//! types are never trusted.

use image::ImageFormat;
use serde::{Deserialize, Serialize};

/// The format the engine recognised in a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatTag {
    Pdf,
    Png,
    Jpeg,
    Gif,
    Webp,
    Bmp,
    Tiff,
    /// Anything else; passed through without a watermark.
    Unsupported,
}

impl FormatTag {
    /// MIME type reported for this format.
    pub fn mime(&self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Gif => "image/gif",
            Self::Webp => "image/webp",
            Self::Bmp => "image/bmp",
            Self::Tiff => "image/tiff",
            Self::Unsupported => "application/octet-stream",
        }
    }

    /// Short lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Png => "png",
            Self::Jpeg => "jpeg",
            Self::Gif => "gif",
            Self::Webp => "webp",
            Self::Bmp => "bmp",
            Self::Tiff => "tiff",
            Self::Unsupported => "unsupported",
        }
    }

    /// Whether this is one of the raster formats.
    pub fn is_raster(&self) -> bool {
        self.image_format().is_some()
    }

    /// The decoder/encoder format for raster tags.
    pub(crate) fn image_format(&self) -> Option<ImageFormat> {
        match self {
            Self::Png => Some(ImageFormat::Png),
            Self::Jpeg => Some(ImageFormat::Jpeg),
            Self::Gif => Some(ImageFormat::Gif),
            Self::Webp => Some(ImageFormat::WebP),
            Self::Bmp => Some(ImageFormat::Bmp),
            Self::Tiff => Some(ImageFormat::Tiff),
            Self::Pdf | Self::Unsupported => None,
        }
    }
}

impl std::fmt::Display for FormatTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recognise the format of `bytes`.
pub fn detect_format(bytes: &[u8]) -> FormatTag {
    if bytes.starts_with(b"%PDF") {
        return FormatTag::Pdf;
    }
    match image::guess_format(bytes) {
        Ok(ImageFormat::Png) => FormatTag::Png,
        Ok(ImageFormat::Jpeg) => FormatTag::Jpeg,
        Ok(ImageFormat::Gif) => FormatTag::Gif,
        Ok(ImageFormat::WebP) => FormatTag::Webp,
        Ok(ImageFormat::Bmp) => FormatTag::Bmp,
        Ok(ImageFormat::Tiff) => FormatTag::Tiff,
        _ => FormatTag::Unsupported,
    }
}

/// MIME type of `bytes`, `application/octet-stream` when unrecognised.
pub fn detect_mime(bytes: &[u8]) -> &'static str {
    detect_format(bytes).mime()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pdf_magic() {
        assert_eq!(detect_format(b"%PDF-1.7\n..."), FormatTag::Pdf);
        assert_eq!(detect_mime(b"%PDF-1.4"), "application/pdf");
    }

    #[test]
    fn png_magic() {
        let png = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
        assert_eq!(detect_format(&png), FormatTag::Png);
        assert!(FormatTag::Png.is_raster());
    }

    #[test]
    fn jpeg_magic() {
        let jpeg = [0xFF, 0xD8, 0xFF, 0xE0, 0, 0x10, b'J', b'F', b'I', b'F'];
        assert_eq!(detect_format(&jpeg), FormatTag::Jpeg);
    }

    #[test]
    fn unknown_bytes_are_unsupported() {
        assert_eq!(detect_format(b"hello world"), FormatTag::Unsupported);
        assert_eq!(detect_format(b""), FormatTag::Unsupported);
        assert_eq!(detect_mime(b"PK\x03\x04"), "application/octet-stream");
        assert!(!FormatTag::Unsupported.is_raster());
        assert!(!FormatTag::Pdf.is_raster());
    }
}
