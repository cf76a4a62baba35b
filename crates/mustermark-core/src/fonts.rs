//! Font metrics and character decoding for text extraction

use std::collections::HashMap;

use lopdf::{Dictionary, Document, Object};

use crate::cmap::parse_to_unicode;

/// Glyph width used when a simple font carries no `/Widths`
const DEFAULT_SIMPLE_WIDTH: f64 = 500.0;
/// Default `/DW` for CID fonts
const DEFAULT_CID_WIDTH: f64 = 1000.0;

/// The subset of a PDF font dictionary needed to place and decode glyphs
#[derive(Debug, Clone, Default)]
pub struct FontInfo {
    two_byte: bool,
    first_char: u32,
    widths: Vec<f64>,
    cid_widths: HashMap<u32, f64>,
    default_width: f64,
    to_unicode: HashMap<u32, String>,
}

/// Follow a reference to the object it points at
pub(crate) fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Object> {
    match obj {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

pub(crate) fn resolve_dict<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Dictionary> {
    resolve(doc, obj).and_then(|o| o.as_dict().ok())
}

pub(crate) fn number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(*r as f64),
        _ => None,
    }
}

fn name_is(dict: &Dictionary, key: &[u8], expected: &[u8]) -> bool {
    matches!(dict.get(key), Ok(Object::Name(name)) if name.as_slice() == expected)
}

impl FontInfo {
    /// Build font information from a `/Font` resource dictionary
    pub fn from_dict(doc: &Document, font: &Dictionary) -> Self {
        let mut info = FontInfo {
            default_width: DEFAULT_SIMPLE_WIDTH,
            to_unicode: read_to_unicode(doc, font),
            ..Default::default()
        };

        if name_is(font, b"Subtype", b"Type0") {
            info.two_byte = true;
            info.default_width = DEFAULT_CID_WIDTH;
            let descendant = font
                .get(b"DescendantFonts")
                .ok()
                .and_then(|o| resolve(doc, o))
                .and_then(|o| o.as_array().ok())
                .and_then(|arr| arr.first())
                .and_then(|o| resolve_dict(doc, o));
            if let Some(cid_font) = descendant {
                if let Some(dw) = cid_font.get(b"DW").ok().and_then(number) {
                    info.default_width = dw;
                }
                if let Some(w) = cid_font
                    .get(b"W")
                    .ok()
                    .and_then(|o| resolve(doc, o))
                    .and_then(|o| o.as_array().ok())
                {
                    info.cid_widths = parse_cid_widths(doc, w);
                }
            }
            return info;
        }

        info.first_char = font
            .get(b"FirstChar")
            .ok()
            .and_then(number)
            .map_or(0, |n| n.max(0.0) as u32);
        if let Some(widths) = font
            .get(b"Widths")
            .ok()
            .and_then(|o| resolve(doc, o))
            .and_then(|o| o.as_array().ok())
        {
            info.widths = widths
                .iter()
                .map(|w| {
                    resolve(doc, w)
                        .and_then(number)
                        .unwrap_or(DEFAULT_SIMPLE_WIDTH)
                })
                .collect();
        }
        info
    }

    /// Width of a glyph in thousandths of text space
    pub fn width(&self, code: u32) -> f64 {
        if self.two_byte {
            return self
                .cid_widths
                .get(&code)
                .copied()
                .unwrap_or(self.default_width);
        }
        code.checked_sub(self.first_char)
            .and_then(|i| self.widths.get(i as usize))
            .copied()
            .filter(|w| *w > 0.0)
            .unwrap_or(self.default_width)
    }

    /// Split a shown string into character codes with their text
    pub fn decode(&self, bytes: &[u8]) -> Vec<(u32, String)> {
        if self.two_byte {
            bytes
                .chunks(2)
                .map(|pair| {
                    let code = pair.iter().fold(0u32, |acc, &b| (acc << 8) | b as u32);
                    let text = self.to_unicode.get(&code).cloned().unwrap_or_else(|| {
                        char::from_u32(code)
                            .map(String::from)
                            .unwrap_or_default()
                    });
                    (code, text)
                })
                .collect()
        } else {
            bytes
                .iter()
                .map(|&b| {
                    let code = b as u32;
                    let text = self
                        .to_unicode
                        .get(&code)
                        .cloned()
                        .unwrap_or_else(|| win_ansi_char(b).to_string());
                    (code, text)
                })
                .collect()
        }
    }

    /// Whether word spacing (`Tw`) applies to this code
    pub fn is_word_space(&self, code: u32) -> bool {
        !self.two_byte && code == 32
    }
}

fn read_to_unicode(doc: &Document, font: &Dictionary) -> HashMap<u32, String> {
    let stream = font
        .get(b"ToUnicode")
        .ok()
        .and_then(|o| resolve(doc, o))
        .and_then(|o| o.as_stream().ok());
    let Some(stream) = stream else {
        return HashMap::new();
    };
    let data = if stream.dict.get(b"Filter").is_ok() {
        match stream.decompressed_content() {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!("Failed to decompress ToUnicode CMap: {}", e);
                return HashMap::new();
            }
        }
    } else {
        stream.content.clone()
    };
    parse_to_unicode(&data)
}

/// Parse a CID font `/W` array: `c [w1 w2 ...]` or `c_first c_last w`
fn parse_cid_widths(doc: &Document, w: &[Object]) -> HashMap<u32, f64> {
    let mut widths = HashMap::new();
    let mut i = 0;
    while i < w.len() {
        let Some(first) = number(&w[i]) else {
            break;
        };
        let first = first.max(0.0) as u32;
        match w.get(i + 1).and_then(|o| resolve(doc, o)) {
            Some(Object::Array(list)) => {
                for (offset, width) in list.iter().enumerate() {
                    let code = u32::try_from(offset)
                        .ok()
                        .and_then(|offset| first.checked_add(offset));
                    let (Some(code), Some(width)) = (code, number(width)) else {
                        continue;
                    };
                    widths.insert(code, width);
                }
                i += 2;
            }
            Some(last) => {
                let (Some(last), Some(width)) = (number(last), w.get(i + 2).and_then(number))
                else {
                    break;
                };
                let last = (last.max(0.0) as u32).min(first.saturating_add(0xFFFF));
                for code in first..=last {
                    widths.insert(code, width);
                }
                i += 3;
            }
            None => break,
        }
    }
    widths
}

/// Single-byte fallback decoding: Latin-1 with the WinAnsi punctuation block
fn win_ansi_char(b: u8) -> char {
    match b {
        0x80 => '€',
        0x85 => '…',
        0x91 => '\u{2018}',
        0x92 => '\u{2019}',
        0x93 => '\u{201C}',
        0x94 => '\u{201D}',
        0x95 => '•',
        0x96 => '–',
        0x97 => '—',
        0x99 => '™',
        _ => b as char,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;

    #[test]
    fn test_simple_font_widths_and_fallback() {
        let doc = Document::with_version("1.7");
        let font = dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "FirstChar" => 65,
            "Widths" => vec![Object::Integer(667), Object::Integer(667)],
        };
        let info = FontInfo::from_dict(&doc, &font);
        assert_eq!(info.width(65), 667.0);
        assert_eq!(info.width(66), 667.0);
        assert_eq!(info.width(67), DEFAULT_SIMPLE_WIDTH);
        assert_eq!(info.width(32), DEFAULT_SIMPLE_WIDTH);
    }

    #[test]
    fn test_simple_font_decodes_latin1() {
        let doc = Document::with_version("1.7");
        let font = dictionary! { "Type" => "Font", "Subtype" => "Type1" };
        let info = FontInfo::from_dict(&doc, &font);
        let decoded: Vec<String> = info
            .decode(b"A\xe4\x96")
            .into_iter()
            .map(|(_, t)| t)
            .collect();
        assert_eq!(decoded, vec!["A", "ä", "–"]);
        assert!(info.is_word_space(32));
    }

    #[test]
    fn test_type0_font_widths() {
        let mut doc = Document::with_version("1.7");
        let cid_font = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "CIDFontType2",
            "DW" => 800,
            "W" => vec![
                Object::Integer(3),
                Object::Array(vec![Object::Integer(250), Object::Integer(300)]),
                Object::Integer(10),
                Object::Integer(12),
                Object::Integer(600),
            ],
        });
        let font = dictionary! {
            "Type" => "Font",
            "Subtype" => "Type0",
            "DescendantFonts" => vec![Object::Reference(cid_font)],
        };
        let info = FontInfo::from_dict(&doc, &font);
        assert_eq!(info.width(3), 250.0);
        assert_eq!(info.width(4), 300.0);
        assert_eq!(info.width(11), 600.0);
        assert_eq!(info.width(99), 800.0);
        assert!(!info.is_word_space(32));

        let decoded = info.decode(&[0x00, 0x41, 0x00, 0x42]);
        assert_eq!(decoded, vec![(0x41, "A".to_string()), (0x42, "B".to_string())]);
    }

    #[test]
    fn test_cid_width_list_stops_at_top_of_code_space() {
        let doc = Document::with_version("1.7");
        let w = vec![
            Object::Integer(u32::MAX as i64),
            Object::Array(vec![Object::Integer(500), Object::Integer(600)]),
        ];
        let widths = parse_cid_widths(&doc, &w);
        assert_eq!(widths.len(), 1);
        assert_eq!(widths.get(&u32::MAX), Some(&500.0));
    }
}
