//! Page text and word extraction
//!
//! Walks a page's content stream, tracks the text and graphics matrices,
//! and emits one positioned glyph per shown character. Glyphs are then
//! grouped into words and lines by whitespace and spacing heuristics.
//!
//! This is not a layout engine: words come out in content-stream order.

use std::collections::HashMap;

use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object, ObjectId};

use crate::fonts::{number, resolve, resolve_dict, FontInfo};
use crate::geometry::{Matrix, Rect, Word};

/// Glyph ascent and descent in em, applied to every font
const ASCENT: f64 = 0.8;
const DESCENT: f64 = -0.2;
/// Horizontal gap (in em) that separates two words
const WORD_GAP: f64 = 0.2;
/// Nesting limit for Form XObjects
const MAX_FORM_DEPTH: usize = 8;

/// A single shown character with its box and baseline origin
#[derive(Debug, Clone, PartialEq)]
pub struct Glyph {
    pub text: String,
    pub rect: Rect,
    pub origin: (f64, f64),
    pub size: f64,
}

/// Words of a page grouped into lines
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageText {
    pub lines: Vec<Vec<Word>>,
}

impl PageText {
    /// Flattened text: words joined by a space, lines by a newline
    pub fn text(&self) -> String {
        self.lines
            .iter()
            .map(|line| {
                line.iter()
                    .map(|w| w.text.as_str())
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn words(&self) -> Vec<Word> {
        self.lines.iter().flatten().cloned().collect()
    }
}

/// Extract the words of one page
pub fn extract_page(doc: &Document, page_id: ObjectId) -> PageText {
    let content = match doc.get_page_content(page_id) {
        Ok(content) => content,
        Err(e) => {
            tracing::warn!("Failed to read content of page {:?}: {}", page_id, e);
            return PageText::default();
        }
    };
    let resources = page_resources(doc, page_id);

    let mut interpreter = Interpreter::new(doc);
    interpreter.run(&content, resources, Matrix::IDENTITY, 0);
    group_words(&interpreter.glyphs)
}

/// Look up `/Resources` on the page or the nearest ancestor
fn page_resources(doc: &Document, page_id: ObjectId) -> Option<&Dictionary> {
    let mut current = doc.get_dictionary(page_id).ok()?;
    loop {
        if let Ok(res) = current.get(b"Resources") {
            return resolve_dict(doc, res);
        }
        let parent = current.get(b"Parent").ok()?.as_reference().ok()?;
        current = doc.get_dictionary(parent).ok()?;
    }
}

#[derive(Debug, Clone, Copy)]
struct TextState {
    char_spacing: f64,
    word_spacing: f64,
    h_scale: f64,
    leading: f64,
    rise: f64,
    size: f64,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            char_spacing: 0.0,
            word_spacing: 0.0,
            h_scale: 1.0,
            leading: 0.0,
            rise: 0.0,
            size: 0.0,
        }
    }
}

#[derive(Debug, Clone)]
struct GraphicsState {
    ctm: Matrix,
    text: TextState,
    font: Option<Vec<u8>>,
}

struct Interpreter<'a> {
    doc: &'a Document,
    glyphs: Vec<Glyph>,
}

impl<'a> Interpreter<'a> {
    fn new(doc: &'a Document) -> Self {
        Self {
            doc,
            glyphs: Vec::new(),
        }
    }

    fn load_fonts(&self, resources: Option<&Dictionary>) -> HashMap<Vec<u8>, FontInfo> {
        let mut fonts = HashMap::new();
        let font_dict = resources
            .and_then(|r| r.get(b"Font").ok())
            .and_then(|o| resolve_dict(self.doc, o));
        if let Some(font_dict) = font_dict {
            for (name, obj) in font_dict.iter() {
                if let Some(font) = resolve_dict(self.doc, obj) {
                    fonts.insert(name.clone(), FontInfo::from_dict(self.doc, font));
                }
            }
        }
        fonts
    }

    fn run(&mut self, content: &[u8], resources: Option<&Dictionary>, ctm: Matrix, depth: usize) {
        let operations = match Content::decode(content) {
            Ok(content) => content.operations,
            Err(e) => {
                tracing::warn!("Skipping undecodable content stream: {}", e);
                return;
            }
        };
        let fonts = self.load_fonts(resources);
        let fallback_font = FontInfo::default();

        let mut state = GraphicsState {
            ctm,
            text: TextState::default(),
            font: None,
        };
        let mut stack: Vec<GraphicsState> = Vec::new();
        let mut tm = Matrix::IDENTITY;
        let mut tlm = Matrix::IDENTITY;

        for op in &operations {
            let nums: Vec<f64> = op.operands.iter().filter_map(number).collect();
            match op.operator.as_str() {
                "q" => stack.push(state.clone()),
                "Q" => {
                    if let Some(saved) = stack.pop() {
                        state = saved;
                    }
                }
                "cm" if nums.len() == 6 => {
                    let m = Matrix::new(nums[0], nums[1], nums[2], nums[3], nums[4], nums[5]);
                    state.ctm = m.then(&state.ctm);
                }
                "BT" => {
                    tm = Matrix::IDENTITY;
                    tlm = Matrix::IDENTITY;
                }
                "Tf" => {
                    if let Some(Object::Name(name)) = op.operands.first() {
                        state.font = Some(name.clone());
                    }
                    if let Some(size) = op.operands.get(1).and_then(number) {
                        state.text.size = size;
                    }
                }
                "Tc" if !nums.is_empty() => state.text.char_spacing = nums[0],
                "Tw" if !nums.is_empty() => state.text.word_spacing = nums[0],
                "Tz" if !nums.is_empty() => state.text.h_scale = nums[0] / 100.0,
                "TL" if !nums.is_empty() => state.text.leading = nums[0],
                "Ts" if !nums.is_empty() => state.text.rise = nums[0],
                "Td" if nums.len() == 2 => {
                    tlm = Matrix::translate(nums[0], nums[1]).then(&tlm);
                    tm = tlm;
                }
                "TD" if nums.len() == 2 => {
                    state.text.leading = -nums[1];
                    tlm = Matrix::translate(nums[0], nums[1]).then(&tlm);
                    tm = tlm;
                }
                "Tm" if nums.len() == 6 => {
                    tlm = Matrix::new(nums[0], nums[1], nums[2], nums[3], nums[4], nums[5]);
                    tm = tlm;
                }
                "T*" => {
                    tlm = Matrix::translate(0.0, -state.text.leading).then(&tlm);
                    tm = tlm;
                }
                "Tj" | "'" | "\"" | "TJ" => {
                    match op.operator.as_str() {
                        "'" => {
                            tlm = Matrix::translate(0.0, -state.text.leading).then(&tlm);
                            tm = tlm;
                        }
                        "\"" if nums.len() >= 2 => {
                            state.text.word_spacing = nums[0];
                            state.text.char_spacing = nums[1];
                            tlm = Matrix::translate(0.0, -state.text.leading).then(&tlm);
                            tm = tlm;
                        }
                        _ => {}
                    }
                    let font = state
                        .font
                        .as_ref()
                        .and_then(|name| fonts.get(name))
                        .unwrap_or(&fallback_font);
                    for operand in &op.operands {
                        self.show(operand, font, &state, &mut tm);
                    }
                }
                "Do" => {
                    if let Some(Object::Name(name)) = op.operands.first() {
                        self.run_form(name, resources, state.ctm, depth);
                    }
                }
                _ => {}
            }
        }
    }

    fn run_form(&mut self, name: &[u8], resources: Option<&Dictionary>, ctm: Matrix, depth: usize) {
        if depth >= MAX_FORM_DEPTH {
            tracing::debug!("Form XObject nesting limit reached");
            return;
        }
        let doc = self.doc;
        let stream = resources
            .and_then(|r| r.get(b"XObject").ok())
            .and_then(|o| resolve_dict(doc, o))
            .and_then(|xobjects| xobjects.get(name).ok())
            .and_then(|o| resolve(doc, o))
            .and_then(|o| o.as_stream().ok());
        let Some(stream) = stream else {
            return;
        };
        if !matches!(stream.dict.get(b"Subtype"), Ok(Object::Name(n)) if n.as_slice() == b"Form") {
            return;
        }

        let content = if stream.dict.get(b"Filter").is_ok() {
            match stream.decompressed_content() {
                Ok(data) => data,
                Err(e) => {
                    tracing::warn!("Failed to decompress form XObject: {}", e);
                    return;
                }
            }
        } else {
            stream.content.clone()
        };

        let form_matrix = stream
            .dict
            .get(b"Matrix")
            .ok()
            .and_then(|o| o.as_array().ok())
            .map(|arr| arr.iter().filter_map(number).collect::<Vec<_>>())
            .filter(|m| m.len() == 6)
            .map_or(Matrix::IDENTITY, |m| {
                Matrix::new(m[0], m[1], m[2], m[3], m[4], m[5])
            });
        let form_resources = stream
            .dict
            .get(b"Resources")
            .ok()
            .and_then(|o| resolve_dict(doc, o))
            .or(resources);

        self.run(&content, form_resources, form_matrix.then(&ctm), depth + 1);
    }

    /// Place the glyphs of a `Tj`/`TJ` operand and advance the text matrix
    fn show(&mut self, operand: &Object, font: &FontInfo, state: &GraphicsState, tm: &mut Matrix) {
        let ts = &state.text;
        match operand {
            Object::String(bytes, _) => {
                for (code, text) in font.decode(bytes) {
                    let w0 = font.width(code) / 1000.0;
                    let trm = Matrix::new(ts.size * ts.h_scale, 0.0, 0.0, ts.size, 0.0, ts.rise)
                        .then(tm)
                        .then(&state.ctm);

                    let corners = [
                        trm.apply(0.0, DESCENT),
                        trm.apply(w0, DESCENT),
                        trm.apply(0.0, ASCENT),
                        trm.apply(w0, ASCENT),
                    ];
                    let origin = trm.apply(0.0, 0.0);
                    let (ux, uy) = trm.apply(0.0, 1.0);
                    let size = ((ux - origin.0).powi(2) + (uy - origin.1).powi(2)).sqrt();

                    self.glyphs.push(Glyph {
                        text,
                        rect: Rect::from_points(&corners),
                        origin,
                        size,
                    });

                    let spacing = if font.is_word_space(code) {
                        ts.char_spacing + ts.word_spacing
                    } else {
                        ts.char_spacing
                    };
                    let tx = (w0 * ts.size + spacing) * ts.h_scale;
                    *tm = Matrix::translate(tx, 0.0).then(tm);
                }
            }
            Object::Array(items) => {
                for item in items {
                    if let Some(adjust) = number(item) {
                        let tx = -adjust / 1000.0 * ts.size * ts.h_scale;
                        *tm = Matrix::translate(tx, 0.0).then(tm);
                    } else {
                        self.show(item, font, state, tm);
                    }
                }
            }
            _ => {}
        }
    }
}

#[derive(Default)]
struct WordBuilder {
    text: String,
    rect: Option<Rect>,
}

impl WordBuilder {
    fn push(&mut self, glyph: &Glyph) {
        self.text.push_str(&glyph.text);
        self.rect = Some(match self.rect {
            Some(rect) => rect.union(&glyph.rect),
            None => glyph.rect,
        });
    }

    fn finish(&mut self, line: &mut Vec<Word>) {
        let text = std::mem::take(&mut self.text);
        if let Some(rect) = self.rect.take() {
            if !text.is_empty() {
                line.push(Word { rect, text });
            }
        }
    }
}

/// Group positioned glyphs into words and lines
pub fn group_words(glyphs: &[Glyph]) -> PageText {
    let mut page = PageText::default();
    let mut line: Vec<Word> = Vec::new();
    let mut word = WordBuilder::default();
    let mut last: Option<&Glyph> = None;

    for glyph in glyphs {
        if let Some(prev) = last {
            let em = prev.size.max(glyph.size).max(f64::EPSILON);
            let baseline_moved = (glyph.origin.1 - prev.origin.1).abs() > em * 0.5;
            let moved_back = glyph.rect.left < prev.rect.left - em;
            if baseline_moved || moved_back {
                word.finish(&mut line);
                if !line.is_empty() {
                    page.lines.push(std::mem::take(&mut line));
                }
            } else if glyph.rect.left - prev.rect.right > em * WORD_GAP {
                word.finish(&mut line);
            }
        }
        last = Some(glyph);

        if glyph.text.trim().is_empty() {
            word.finish(&mut line);
            continue;
        }
        word.push(glyph);
    }

    word.finish(&mut line);
    if !line.is_empty() {
        page.lines.push(line);
    }
    page
}
