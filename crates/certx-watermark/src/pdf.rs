//! PDF watermarking.
//!
//! For every page the label is drawn as rotated text in a content stream
//! appended after the page's own content. The page's existing content is
//! wrapped in `q … Q` first so graphics state it leaves behind (clipping,
//! transforms, colours) cannot leak into the label.
//!
//! ## Sizing
//!
//! ```text
//! size  = min(page_w, page_h) × 0.06
//! width = measure(label, size)
//! if width > 0.8 × page_w:
//!     size = max(16, size × 0.8 × page_w / width)
//! x     = (page_w − width) / 2
//! y_i   = page_h × position_i
//! ```

use std::collections::BTreeMap;

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};

use crate::error::WatermarkError;
use crate::glyphs::{CustomFont, LabelFont};

/// Font size as a fraction of the shorter page side.
const FONT_RATIO: f32 = 0.06;
/// Widest the label may be, as a fraction of the page width.
const MAX_WIDTH_RATIO: f32 = 0.8;
/// Smallest font size the rescale may produce, in points.
const MIN_FONT_SIZE: f32 = 16.0;
/// Label rotation in degrees.
const ROTATION_DEG: f32 = -30.0;

const FONT_RESOURCE: &str = "CertxWmFont";
const GSTATE_RESOURCE: &str = "CertxWmGs";

/// Parent-chain depth limit when resolving inherited page attributes.
const MAX_INHERITANCE_DEPTH: usize = 32;

/// Parameters for stamping one document.
pub(crate) struct PdfStamp<'a> {
    pub text: &'a str,
    pub opacity: f32,
    pub color: [f32; 3],
    pub positions: &'a [f64],
}

/// Stamp every page of `bytes` and return the re-serialized document.
pub(crate) fn watermark_pdf(
    bytes: &[u8],
    font: &LabelFont,
    stamp: &PdfStamp<'_>,
) -> Result<Vec<u8>, WatermarkError> {
    let mut doc = Document::load_mem(bytes)?;
    let pages: Vec<ObjectId> = doc.get_pages().into_values().collect();
    if pages.is_empty() {
        return Err(WatermarkError::MalformedDocument(
            "document has no pages".to_string(),
        ));
    }

    let embedded = match font {
        LabelFont::Custom(custom) if custom.embeddable_in_pdf() => Some(custom),
        _ => None,
    };
    let font_id = match embedded {
        Some(custom) => embed_truetype(&mut doc, custom, stamp.text),
        None => doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        }),
    };
    let gs_id = doc.add_object(dictionary! {
        "Type" => "ExtGState",
        "ca" => Object::Real(stamp.opacity),
        "CA" => Object::Real(stamp.opacity),
    });
    let shown_text = match embedded {
        Some(custom) => {
            let glyphs: Vec<u8> = stamp
                .text
                .chars()
                .flat_map(|c| custom.glyph_id(c).0.to_be_bytes())
                .collect();
            Object::String(glyphs, StringFormat::Hexadecimal)
        }
        None => Object::string_literal(stamp.text),
    };
    let save_id = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));

    for page_id in pages {
        let [llx, lly, urx, ury] = page_box(&doc, page_id)?;
        let (width, height) = (urx - llx, ury - lly);
        if width <= 0.0 || height <= 0.0 {
            return Err(WatermarkError::MalformedDocument(format!(
                "page {page_id:?} has an empty media box"
            )));
        }

        let mut size = width.min(height) * FONT_RATIO;
        let mut text_width = font.pdf_text_width(stamp.text, size);
        let max_width = width * MAX_WIDTH_RATIO;
        if text_width > max_width {
            size = MIN_FONT_SIZE.max(size * max_width / text_width);
            text_width = font.pdf_text_width(stamp.text, size);
        }
        let x = llx + (width - text_width) / 2.0;

        let content = label_content(stamp, &shown_text, size, x, lly, height);
        let encoded = content.encode()?;
        let content_id = doc.add_object(Stream::new(Dictionary::new(), encoded));

        append_contents(&mut doc, page_id, save_id, content_id)?;
        install_resources(&mut doc, page_id, font_id, gs_id)?;
    }

    let mut out = Vec::with_capacity(bytes.len() + 1024);
    doc.save_to(&mut out)
        .map_err(|e| WatermarkError::Encode(e.to_string()))?;
    Ok(out)
}

fn label_content(
    stamp: &PdfStamp<'_>,
    shown_text: &Object,
    size: f32,
    x: f32,
    bottom: f32,
    height: f32,
) -> Content {
    let (sin, cos) = ROTATION_DEG.to_radians().sin_cos();
    let [r, g, b] = stamp.color;

    let mut operations = vec![
        // Close the q opened before the page's own content.
        Operation::new("Q", vec![]),
        Operation::new("q", vec![]),
        Operation::new("gs", vec![Object::Name(GSTATE_RESOURCE.as_bytes().to_vec())]),
        Operation::new("rg", vec![Object::Real(r), Object::Real(g), Object::Real(b)]),
    ];
    for ratio in stamp.positions {
        let y = bottom + height * (*ratio as f32);
        operations.extend([
            Operation::new("BT", vec![]),
            Operation::new(
                "Tf",
                vec![Object::Name(FONT_RESOURCE.as_bytes().to_vec()), Object::Real(size)],
            ),
            Operation::new(
                "Tm",
                vec![
                    Object::Real(cos),
                    Object::Real(sin),
                    Object::Real(-sin),
                    Object::Real(cos),
                    Object::Real(x),
                    Object::Real(y),
                ],
            ),
            Operation::new("Tj", vec![shown_text.clone()]),
            Operation::new("ET", vec![]),
        ]);
    }
    operations.push(Operation::new("Q", vec![]));
    Content { operations }
}

// ─── Page Attributes ─────────────────────────────────────────────────

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Result<&'a Object, WatermarkError> {
    match obj {
        Object::Reference(id) => Ok(doc.get_object(*id)?),
        other => Ok(other),
    }
}

fn number(doc: &Document, obj: &Object) -> Result<f32, WatermarkError> {
    match resolve(doc, obj)? {
        Object::Integer(i) => Ok(*i as f32),
        Object::Real(r) => Ok(*r),
        other => Err(WatermarkError::MalformedDocument(format!(
            "expected a number, found {}",
            other.enum_variant()
        ))),
    }
}

/// Find a page attribute on the page or, failing that, on its ancestors.
fn inherited<'a>(
    doc: &'a Document,
    page_id: ObjectId,
    key: &[u8],
) -> Result<Option<&'a Object>, WatermarkError> {
    let mut current = Some(page_id);
    let mut depth = 0;
    while let Some(id) = current {
        let dict = doc.get_dictionary(id)?;
        if let Ok(obj) = dict.get(key) {
            return Ok(Some(resolve(doc, obj)?));
        }
        current = dict.get(b"Parent").and_then(Object::as_reference).ok();
        depth += 1;
        if depth > MAX_INHERITANCE_DEPTH {
            return Err(WatermarkError::MalformedDocument(
                "page tree too deep or cyclic".to_string(),
            ));
        }
    }
    Ok(None)
}

/// The page's media box as `[llx, lly, urx, ury]`.
fn page_box(doc: &Document, page_id: ObjectId) -> Result<[f32; 4], WatermarkError> {
    let obj = inherited(doc, page_id, b"MediaBox")?.ok_or_else(|| {
        WatermarkError::MalformedDocument(format!("page {page_id:?} has no MediaBox"))
    })?;
    let items = obj.as_array()?;
    if items.len() != 4 {
        return Err(WatermarkError::MalformedDocument(
            "MediaBox must have four entries".to_string(),
        ));
    }
    let mut rect = [0.0f32; 4];
    for (slot, item) in rect.iter_mut().zip(items) {
        *slot = number(doc, item)?;
    }
    // Normalise boxes given with swapped corners.
    Ok([
        rect[0].min(rect[2]),
        rect[1].min(rect[3]),
        rect[0].max(rect[2]),
        rect[1].max(rect[3]),
    ])
}

// ─── Page Mutation ───────────────────────────────────────────────────

fn append_contents(
    doc: &mut Document,
    page_id: ObjectId,
    save_id: ObjectId,
    content_id: ObjectId,
) -> Result<(), WatermarkError> {
    let existing: Vec<Object> = match doc.get_dictionary(page_id)?.get(b"Contents") {
        Err(_) => Vec::new(),
        Ok(Object::Array(items)) => items.clone(),
        Ok(Object::Reference(id)) => match doc.get_object(*id)? {
            Object::Array(items) => items.clone(),
            _ => vec![Object::Reference(*id)],
        },
        Ok(other) => {
            return Err(WatermarkError::MalformedDocument(format!(
                "unexpected page Contents type {}",
                other.enum_variant()
            )))
        }
    };

    let mut contents = Vec::with_capacity(existing.len() + 2);
    contents.push(Object::Reference(save_id));
    contents.extend(existing);
    contents.push(Object::Reference(content_id));
    doc.get_dictionary_mut(page_id)?
        .set("Contents", Object::Array(contents));
    Ok(())
}

/// Give the page its own resource dictionary carrying the label font and
/// graphics state, copying inherited resources so nothing is shadowed.
fn install_resources(
    doc: &mut Document,
    page_id: ObjectId,
    font_id: ObjectId,
    gs_id: ObjectId,
) -> Result<(), WatermarkError> {
    let mut resources = match inherited(doc, page_id, b"Resources")? {
        Some(obj) => obj.as_dict()?.clone(),
        None => Dictionary::new(),
    };
    merge_resource(doc, &mut resources, b"Font", FONT_RESOURCE, font_id)?;
    merge_resource(doc, &mut resources, b"ExtGState", GSTATE_RESOURCE, gs_id)?;
    doc.get_dictionary_mut(page_id)?
        .set("Resources", Object::Dictionary(resources));
    Ok(())
}

fn merge_resource(
    doc: &Document,
    resources: &mut Dictionary,
    category: &[u8],
    name: &str,
    id: ObjectId,
) -> Result<(), WatermarkError> {
    let mut entries = match resources.get(category) {
        Ok(obj) => resolve(doc, obj)?.as_dict()?.clone(),
        Err(_) => Dictionary::new(),
    };
    entries.set(name, Object::Reference(id));
    resources.set(category.to_vec(), Object::Dictionary(entries));
    Ok(())
}

// ─── Font Embedding ──────────────────────────────────────────────────

/// Embed a TrueType font as a Type0 / Identity-H composite font with widths
/// for the glyphs `text` uses.
fn embed_truetype(doc: &mut Document, font: &CustomFont, text: &str) -> ObjectId {
    const BASE_NAME: &str = "CertxLabelFont";

    let mut widths: BTreeMap<u16, i64> = BTreeMap::new();
    for c in text.chars() {
        widths.insert(font.glyph_id(c).0, font.advance_milli_em(c).round() as i64);
    }
    let w_array: Vec<Object> = widths
        .iter()
        .flat_map(|(gid, w)| {
            [
                Object::Integer(i64::from(*gid)),
                Object::Array(vec![Object::Integer(*w)]),
            ]
        })
        .collect();

    let (ascent, descent) = font.vertical_metrics_milli_em();
    let file_id = doc.add_object(Stream::new(
        dictionary! { "Length1" => Object::Integer(font.bytes().len() as i64) },
        font.bytes().to_vec(),
    ));
    let descriptor_id = doc.add_object(dictionary! {
        "Type" => "FontDescriptor",
        "FontName" => BASE_NAME,
        "Flags" => Object::Integer(32),
        "FontBBox" => vec![
            Object::Integer(0),
            Object::Real(descent),
            Object::Integer(1000),
            Object::Real(ascent),
        ],
        "ItalicAngle" => Object::Integer(0),
        "Ascent" => Object::Real(ascent),
        "Descent" => Object::Real(descent),
        "CapHeight" => Object::Real(ascent),
        "StemV" => Object::Integer(80),
        "FontFile2" => file_id,
    });
    let cid_font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "CIDFontType2",
        "BaseFont" => BASE_NAME,
        "CIDSystemInfo" => dictionary! {
            "Registry" => Object::string_literal("Adobe"),
            "Ordering" => Object::string_literal("Identity"),
            "Supplement" => Object::Integer(0),
        },
        "FontDescriptor" => descriptor_id,
        "W" => w_array,
        "CIDToGIDMap" => "Identity",
    });
    doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type0",
        "BaseFont" => BASE_NAME,
        "Encoding" => "Identity-H",
        "DescendantFonts" => vec![Object::Reference(cid_font_id)],
    })
}
