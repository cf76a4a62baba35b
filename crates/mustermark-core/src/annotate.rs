//! Highlight annotations

use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use serde::{Deserialize, Serialize};

use crate::error::MarkError;
use crate::fonts::{number, resolve, resolve_dict};
use crate::geometry::Rect;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct HighlightStyle {
    /// RGB components in the 0-1 range
    pub color: [f32; 3],
    pub opacity: f32,
}

impl Default for HighlightStyle {
    fn default() -> Self {
        Self {
            color: [1.0, 1.0, 0.0],
            opacity: 1.0,
        }
    }
}

impl HighlightStyle {
    /// Build a style from a hex colour string (e.g. "#FFFF00" or "FFFF00")
    pub fn from_hex(color: &str, opacity: f32) -> Result<Self, MarkError> {
        let hex = color.trim_start_matches('#');
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(MarkError::InvalidColor(format!(
                "expected #RRGGBB, got {:?}",
                color
            )));
        }
        if !(0.0..=1.0).contains(&opacity) {
            return Err(MarkError::InvalidColor(format!(
                "opacity must be between 0 and 1, got {}",
                opacity
            )));
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&hex[range], 16)
                .map(|v| v as f32 / 255.0)
                .map_err(|_| MarkError::InvalidColor(format!("invalid hex digits in {:?}", color)))
        };
        Ok(Self {
            color: [channel(0..2)?, channel(2..4)?, channel(4..6)?],
            opacity,
        })
    }
}

/// A highlight annotation read back from a page
#[derive(Debug, Clone, PartialEq)]
pub struct Highlight {
    pub rect: Rect,
    pub contents: Option<String>,
}

/// Encode a PDF text string: literal bytes for ASCII, UTF-16BE with BOM otherwise
fn text_string(text: &str) -> Object {
    if text.is_ascii() {
        Object::String(text.as_bytes().to_vec(), StringFormat::Literal)
    } else {
        let mut bytes = vec![0xFE, 0xFF];
        for unit in text.encode_utf16() {
            bytes.extend_from_slice(&unit.to_be_bytes());
        }
        Object::String(bytes, StringFormat::Hexadecimal)
    }
}

fn decode_text_string(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let units: Vec<u16> = bytes[2..]
            .chunks(2)
            .filter_map(|chunk| {
                if chunk.len() == 2 {
                    Some(u16::from_be_bytes([chunk[0], chunk[1]]))
                } else {
                    None
                }
            })
            .collect();
        return String::from_utf16_lossy(&units);
    }
    match String::from_utf8(bytes.to_vec()) {
        Ok(s) => s,
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

fn pdf_date() -> Object {
    let now = chrono::Utc::now().format("D:%Y%m%d%H%M%SZ").to_string();
    Object::String(now.into_bytes(), StringFormat::Literal)
}

fn rect_array(rect: &Rect) -> Object {
    Object::Array(vec![
        Object::Real(rect.left as f32),
        Object::Real(rect.bottom as f32),
        Object::Real(rect.right as f32),
        Object::Real(rect.top as f32),
    ])
}

/// Appearance stream: the rectangle filled with the colour in multiply mode
fn appearance_stream(doc: &mut Document, rect: &Rect, style: &HighlightStyle) -> ObjectId {
    let [r, g, b] = style.color;
    let content = format!(
        "/GS0 gs {} {} {} rg {} {} {} {} re f",
        r,
        g,
        b,
        rect.left,
        rect.bottom,
        rect.width(),
        rect.height()
    );
    let stream = Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Form",
            "BBox" => rect_array(rect),
            "Resources" => dictionary! {
                "ExtGState" => dictionary! {
                    "GS0" => dictionary! {
                        "Type" => "ExtGState",
                        "BM" => "Multiply",
                        "CA" => Object::Real(style.opacity),
                        "ca" => Object::Real(style.opacity),
                    },
                },
            },
        },
        content.into_bytes(),
    );
    doc.add_object(stream)
}

/// Add a `/Highlight` annotation over `rect` carrying `contents`
pub fn add_highlight_annotation(
    doc: &mut Document,
    page_id: ObjectId,
    rect: &Rect,
    contents: &str,
    style: &HighlightStyle,
) -> Result<ObjectId, MarkError> {
    let [r, g, b] = style.color;
    let appearance_id = appearance_stream(doc, rect, style);

    let mut annot = Dictionary::new();
    annot.set("Type", Object::Name(b"Annot".to_vec()));
    annot.set("Subtype", Object::Name(b"Highlight".to_vec()));
    annot.set("Rect", rect_array(rect));
    // QuadPoints order: upper-left, upper-right, lower-left, lower-right
    annot.set(
        "QuadPoints",
        Object::Array(vec![
            Object::Real(rect.left as f32),
            Object::Real(rect.top as f32),
            Object::Real(rect.right as f32),
            Object::Real(rect.top as f32),
            Object::Real(rect.left as f32),
            Object::Real(rect.bottom as f32),
            Object::Real(rect.right as f32),
            Object::Real(rect.bottom as f32),
        ]),
    );
    annot.set(
        "C",
        Object::Array(vec![Object::Real(r), Object::Real(g), Object::Real(b)]),
    );
    annot.set("CA", Object::Real(style.opacity));
    annot.set("Contents", text_string(contents));
    // Print flag
    annot.set("F", Object::Integer(4));
    annot.set("P", Object::Reference(page_id));
    annot.set("M", pdf_date());
    annot.set("CreationDate", pdf_date());
    annot.set(
        "AP",
        dictionary! { "N" => Object::Reference(appearance_id) },
    );

    let annot_id = doc.add_object(Object::Dictionary(annot));
    add_annotation_to_page(doc, page_id, annot_id)?;
    Ok(annot_id)
}

fn add_annotation_to_page(
    doc: &mut Document,
    page_id: ObjectId,
    annot_id: ObjectId,
) -> Result<(), MarkError> {
    // /Annots may live in its own object
    let indirect = doc
        .get_dictionary(page_id)
        .ok()
        .and_then(|page| page.get(b"Annots").ok())
        .and_then(|annots| annots.as_reference().ok());
    if let Some(array_id) = indirect {
        if let Ok(Object::Array(ref mut arr)) = doc.get_object_mut(array_id) {
            arr.push(Object::Reference(annot_id));
            return Ok(());
        }
    }

    let page = doc
        .get_object_mut(page_id)
        .map_err(|e| MarkError::Document(e.to_string()))?;

    if let Object::Dictionary(ref mut page_dict) = page {
        if let Ok(Object::Array(ref mut arr)) = page_dict.get_mut(b"Annots") {
            arr.push(Object::Reference(annot_id));
        } else {
            page_dict.set("Annots", Object::Array(vec![Object::Reference(annot_id)]));
        }
    }
    Ok(())
}

fn page_annotations(doc: &Document, page_id: ObjectId) -> Vec<&Dictionary> {
    let annots = doc
        .get_dictionary(page_id)
        .ok()
        .and_then(|page| page.get(b"Annots").ok())
        .and_then(|o| resolve(doc, o))
        .and_then(|o| o.as_array().ok());
    annots
        .map(|arr| arr.iter().filter_map(|o| resolve_dict(doc, o)).collect())
        .unwrap_or_default()
}

/// Number of annotations of any kind on a page
pub fn annotation_count(doc: &Document, page_id: ObjectId) -> usize {
    page_annotations(doc, page_id).len()
}

/// Highlight annotations on a page, in `/Annots` order
pub fn highlights(doc: &Document, page_id: ObjectId) -> Vec<Highlight> {
    page_annotations(doc, page_id)
        .into_iter()
        .filter(|annot| {
            matches!(annot.get(b"Subtype"), Ok(Object::Name(n)) if n.as_slice() == b"Highlight")
        })
        .filter_map(|annot| {
            let coords: Vec<f64> = annot
                .get(b"Rect")
                .ok()
                .and_then(|o| o.as_array().ok())?
                .iter()
                .filter_map(number)
                .collect();
            if coords.len() != 4 {
                return None;
            }
            let rect = Rect::from_points(&[(coords[0], coords[1]), (coords[2], coords[3])]);
            let contents = match annot.get(b"Contents") {
                Ok(Object::String(bytes, _)) => Some(decode_text_string(bytes)),
                _ => None,
            };
            Some(Highlight { rect, contents })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_page_doc() -> (Document, ObjectId) {
        let mut doc = Document::with_version("1.7");
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        });
        let pages_id = doc.add_object(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => 1,
        });
        if let Ok(page) = doc.get_object_mut(page_id) {
            if let Ok(dict) = page.as_dict_mut() {
                dict.set("Parent", Object::Reference(pages_id));
            }
        }
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => Object::Reference(pages_id),
        });
        doc.trailer.set("Root", Object::Reference(catalog_id));
        (doc, page_id)
    }

    #[test]
    fn test_style_from_hex() {
        let style = HighlightStyle::from_hex("#FF8000", 0.5).unwrap();
        assert_eq!(style.color, [1.0, 128.0 / 255.0, 0.0]);
        assert_eq!(style.opacity, 0.5);
        assert!(HighlightStyle::from_hex("FFFF00", 1.0).is_ok());
    }

    #[test]
    fn test_style_rejects_bad_input() {
        assert!(matches!(
            HighlightStyle::from_hex("#FFF", 1.0),
            Err(MarkError::InvalidColor(_))
        ));
        assert!(matches!(
            HighlightStyle::from_hex("#GGGGGG", 1.0),
            Err(MarkError::InvalidColor(_))
        ));
        assert!(matches!(
            HighlightStyle::from_hex("#FFFF00", 1.5),
            Err(MarkError::InvalidColor(_))
        ));
    }

    #[test]
    fn test_highlight_is_appended_and_read_back() {
        let (mut doc, page_id) = single_page_doc();
        let rect = Rect::new(72.0, 710.0, 144.0, 698.0);
        add_highlight_annotation(&mut doc, page_id, &rect, "#1{sidABCDEFGH}", &HighlightStyle::default())
            .unwrap();
        add_highlight_annotation(&mut doc, page_id, &rect, "Grüße", &HighlightStyle::default())
            .unwrap();

        let found = highlights(&doc, page_id);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].rect, rect);
        assert_eq!(found[0].contents.as_deref(), Some("#1{sidABCDEFGH}"));
        assert_eq!(found[1].contents.as_deref(), Some("Grüße"));
        assert_eq!(annotation_count(&doc, page_id), 2);
    }

    #[test]
    fn test_highlight_appends_to_indirect_annots_array() {
        let (mut doc, page_id) = single_page_doc();
        let existing = doc.add_object(dictionary! {
            "Type" => "Annot",
            "Subtype" => "Text",
            "Rect" => vec![0.into(), 0.into(), 10.into(), 10.into()],
        });
        let annots_id = doc.add_object(Object::Array(vec![Object::Reference(existing)]));
        doc.get_object_mut(page_id)
            .unwrap()
            .as_dict_mut()
            .unwrap()
            .set("Annots", Object::Reference(annots_id));

        let rect = Rect::new(0.0, 20.0, 20.0, 10.0);
        add_highlight_annotation(&mut doc, page_id, &rect, "x", &HighlightStyle::default()).unwrap();

        assert_eq!(annotation_count(&doc, page_id), 2);
        assert_eq!(highlights(&doc, page_id).len(), 1);
        let page = doc.get_dictionary(page_id).unwrap();
        assert!(matches!(page.get(b"Annots"), Ok(Object::Reference(_))));
    }

    #[test]
    fn test_highlight_round_trips_through_save() {
        let (mut doc, page_id) = single_page_doc();
        let rect = Rect::new(50.0, 620.0, 350.0, 600.0);
        add_highlight_annotation(&mut doc, page_id, &rect, "target", &HighlightStyle::default())
            .unwrap();

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).unwrap();
        let reloaded = Document::load_mem(&buffer).unwrap();
        let reloaded_page = *reloaded.get_pages().get(&1).unwrap();
        let found = highlights(&reloaded, reloaded_page);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].contents.as_deref(), Some("target"));
    }
}
