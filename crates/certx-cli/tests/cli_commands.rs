//! File-level behaviour of the CLI handlers.

use std::io::Cursor;

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

use certx_cli::hash::hash_file;
use certx_cli::watermark::watermark_file;
use certx_core::content_hash;
use certx_watermark::WatermarkConfig;

fn png_bytes() -> Vec<u8> {
    let img = RgbImage::from_fn(200, 120, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 90]));
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut out, ImageFormat::Png)
        .unwrap();
    out.into_inner()
}

#[test]
fn watermark_writes_output_and_reports_hashes() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.png");
    let output = dir.path().join("out.png");
    let bytes = png_bytes();
    std::fs::write(&input, &bytes).unwrap();

    let summary = watermark_file(
        &input,
        &output,
        Some("Nguyễn Văn A"),
        Some(0.4),
        WatermarkConfig::default(),
    )
    .unwrap();

    assert_eq!(summary.format, "png");
    assert!(summary.watermarked);
    assert!(summary.used_fallback_glyphs);
    assert_eq!(summary.label_used, "Nguyen Van A");
    assert_eq!(summary.original_hash, content_hash(&bytes));
    assert_ne!(summary.published_hash, summary.original_hash);
    assert_eq!(hash_file(&output).unwrap(), summary.published_hash);
}

#[test]
fn watermark_defaults_to_configured_text() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.png");
    let output = dir.path().join("out.png");
    std::fs::write(&input, png_bytes()).unwrap();

    let config = WatermarkConfig {
        text: "Sample only".into(),
        opacity: 0.5,
        ..WatermarkConfig::default()
    };
    let summary = watermark_file(&input, &output, None, None, config).unwrap();
    assert_eq!(summary.label_used, "Sample only");
    assert_eq!(summary.opacity, 0.5);
}

#[test]
fn unsupported_input_is_copied_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("notes.txt");
    let output = dir.path().join("notes.out");
    std::fs::write(&input, b"plain text, not a certificate").unwrap();

    let summary =
        watermark_file(&input, &output, None, None, WatermarkConfig::default()).unwrap();
    assert!(!summary.watermarked);
    assert_eq!(summary.format, "unsupported");
    assert_eq!(summary.original_hash, summary.published_hash);
}

#[test]
fn out_of_range_opacity_is_refused_before_reading() {
    let dir = tempfile::tempdir().unwrap();
    let err = watermark_file(
        &dir.path().join("absent.png"),
        &dir.path().join("out.png"),
        None,
        Some(1.5),
        WatermarkConfig::default(),
    )
    .unwrap_err();
    assert!(err.to_string().contains("opacity"));
    assert!(!dir.path().join("out.png").exists());
}
