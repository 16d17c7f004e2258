//! End-to-end properties of the watermark transform across formats.

use std::io::Cursor;

use certx_core::content_hash;
use certx_watermark::{FormatTag, WatermarkConfig, WatermarkEngine, WatermarkError};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use proptest::prelude::*;

fn one_page_pdf(width: i64, height: i64) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let content = Content {
        operations: vec![
            Operation::new("BT", vec![]),
            Operation::new("Td", vec![72.into(), 72.into()]),
            Operation::new("ET", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "MediaBox" => vec![0.into(), 0.into(), width.into(), height.into()],
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    let mut out = Vec::new();
    doc.save_to(&mut out).unwrap();
    out
}

fn encoded_image(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 200]));
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img).write_to(&mut out, format).unwrap();
    out.into_inner()
}

fn engine() -> WatermarkEngine {
    WatermarkEngine::with_builtin_font(WatermarkConfig::default())
}

#[test]
fn pdf_hash_changes_after_watermark() {
    let pdf = one_page_pdf(595, 842);
    let out = engine().transform(&pdf, "Issued by CertX - Nguyen Van A", 0.2).unwrap();
    assert!(out.watermarked);
    assert_eq!(out.format, FormatTag::Pdf);
    assert_eq!(out.mime(), "application/pdf");
    assert_ne!(content_hash(&out.bytes), content_hash(&pdf));
    assert!(Document::load_mem(&out.bytes).is_ok());
}

#[test]
fn png_and_jpeg_hashes_change_and_formats_survive() {
    for format in [ImageFormat::Png, ImageFormat::Jpeg] {
        let original = encoded_image(320, 240, format);
        let out = engine().transform(&original, "Issued by CertX", 0.2).unwrap();
        assert!(out.watermarked);
        assert_ne!(content_hash(&out.bytes), content_hash(&original));
        assert_eq!(image::guess_format(&out.bytes).unwrap(), format);
    }
}

#[test]
fn transform_is_deterministic() {
    let pdf = one_page_pdf(612, 792);
    let png = encoded_image(200, 300, ImageFormat::Png);
    let e = engine();
    assert_eq!(
        e.transform(&pdf, "Label", 0.3).unwrap().bytes,
        e.transform(&pdf, "Label", 0.3).unwrap().bytes
    );
    assert_eq!(
        e.transform(&png, "Label", 0.3).unwrap().bytes,
        e.transform(&png, "Label", 0.3).unwrap().bytes
    );
}

#[test]
fn positions_are_identical_across_formats() {
    let pdf = one_page_pdf(600, 800);
    let png = encoded_image(600, 800, ImageFormat::Png);
    let e = engine();
    let a = e.transform(&pdf, "X", 0.2).unwrap();
    let b = e.transform(&png, "X", 0.2).unwrap();
    assert_eq!(a.positions, b.positions);
    assert_eq!(a.positions.len(), 3);
}

#[test]
fn diacritics_are_stripped_with_builtin_glyphs() {
    let png = encoded_image(400, 400, ImageFormat::Png);
    let out = engine().transform(&png, "Nguyễn Văn Đức", 0.2).unwrap();
    assert!(out.used_fallback_glyphs);
    assert_eq!(out.label_used, "Nguyen Van Duc");

    let out = engine().transform(&png, "Nguyen Van Duc", 0.2).unwrap();
    assert!(!out.used_fallback_glyphs);
}

#[test]
fn unrenderable_label_is_an_error() {
    let pdf = one_page_pdf(595, 842);
    let err = engine().transform(&pdf, "証明書", 0.2).unwrap_err();
    assert!(matches!(err, WatermarkError::UnrenderableLabel(_)));
}

#[test]
fn blank_label_uses_configured_text() {
    let png = encoded_image(100, 100, ImageFormat::Png);
    let out = engine().transform(&png, "   ", 0.2).unwrap();
    assert_eq!(out.label_used, "Issued by CertX");
}

#[test]
fn zero_opacity_still_changes_the_image() {
    let png = encoded_image(300, 300, ImageFormat::Png);
    let out = engine().transform(&png, "Issued by CertX", 0.0).unwrap();
    assert_ne!(out.bytes, png);
}

#[test]
fn malformed_inputs_are_errors() {
    let err = engine().transform(b"%PDF-1.4\ngarbage", "X", 0.2).unwrap_err();
    assert!(matches!(err, WatermarkError::MalformedDocument(_)));

    let mut png = encoded_image(64, 64, ImageFormat::Png);
    png.truncate(40);
    let err = engine().transform(&png, "X", 0.2).unwrap_err();
    assert!(matches!(err, WatermarkError::CorruptImage(_)));
}

#[test]
fn unsupported_content_passes_through_unchanged() {
    let docx = b"PK\x03\x04 word/document.xml".to_vec();
    let out = engine().transform(&docx, "X", 0.2).unwrap();
    assert!(!out.watermarked);
    assert_eq!(out.bytes, docx);
    assert_eq!(content_hash(&out.bytes), content_hash(&docx));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn any_ascii_label_stamps_a_pdf(label in "[ -~]{1,60}") {
        let pdf = one_page_pdf(595, 842);
        let out = engine().transform(&pdf, &label, 0.2).unwrap();
        prop_assert!(out.watermarked);
        prop_assert!(!out.used_fallback_glyphs || label.trim().is_empty());
        prop_assert_ne!(content_hash(&out.bytes), content_hash(&pdf));
    }
}
