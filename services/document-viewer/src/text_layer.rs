//! Text Layer
//!
//! Interprets a page's content stream and produces positioned text runs.
//! One run is emitted per text-showing operator; positions are reported in
//! user space relative to the page's MediaBox origin. Text inside form
//! XObjects is included.

use financeguard_models::{TextRun, IDENTITY_TRANSFORM};
use financeguard_utils::{FinanceGuardError, FinanceGuardResult};
use lopdf::{content::{Content, Operation}, Dictionary, Document, Object, ObjectId, Stream};
use tracing::debug;
use std::collections::HashMap;

type Matrix = [f64; 6];

/// US Letter, used when a page has no usable MediaBox.
pub const DEFAULT_MEDIA_BOX: [f64; 4] = [0.0, 0.0, 612.0, 792.0];

/// Glyph width in thousandths of an em when a font gives none.
const DEFAULT_GLYPH_WIDTH: f64 = 500.0;

/// Guards against cyclic /Parent chains.
const MAX_TREE_DEPTH: usize = 32;

/// Nesting limit for form XObjects drawn from other forms.
const MAX_FORM_DEPTH: usize = 8;

fn multiply(m1: &Matrix, m2: &Matrix) -> Matrix {
    [
        m1[0] * m2[0] + m1[1] * m2[2],
        m1[0] * m2[1] + m1[1] * m2[3],
        m1[2] * m2[0] + m1[3] * m2[2],
        m1[2] * m2[1] + m1[3] * m2[3],
        m1[4] * m2[0] + m1[5] * m2[2] + m2[4],
        m1[4] * m2[1] + m1[5] * m2[3] + m2[5],
    ]
}

fn translation(tx: f64, ty: f64) -> Matrix {
    [1.0, 0.0, 0.0, 1.0, tx, ty]
}

fn number(object: &Object) -> Option<f64> {
    match object {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(f64::from(*r)),
        _ => None,
    }
}

fn numbers<const N: usize>(operands: &[Object]) -> Option<[f64; N]> {
    if operands.len() < N {
        return None;
    }
    let mut values = [0.0; N];
    for (value, operand) in values.iter_mut().zip(operands) {
        *value = number(operand)?;
    }
    Some(values)
}

/// Follows an indirect reference, if any.
fn resolve<'a>(doc: &'a Document, object: &'a Object) -> Option<&'a Object> {
    match object {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

fn resolve_dict<'a>(doc: &'a Document, object: &'a Object) -> Option<&'a Dictionary> {
    match resolve(doc, object)? {
        Object::Dictionary(dict) => Some(dict),
        _ => None,
    }
}

/// Looks up a page attribute, walking up the page tree through /Parent.
fn resolve_inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut current = page_id;
    for _ in 0..MAX_TREE_DEPTH {
        let dict = match doc.get_object(current).ok()? {
            Object::Dictionary(dict) => dict,
            _ => return None,
        };
        if let Ok(value) = dict.get(key) {
            return Some(value);
        }
        match dict.get(b"Parent") {
            Ok(Object::Reference(parent)) => current = *parent,
            _ => return None,
        }
    }
    None
}

/// Page bounds `[x0, y0, x1, y1]`, normalised so x0 <= x1 and y0 <= y1.
pub fn media_box(doc: &Document, page_id: ObjectId) -> [f64; 4] {
    let values = resolve_inherited(doc, page_id, b"MediaBox")
        .and_then(|object| match resolve(doc, object)? {
            Object::Array(items) => numbers::<4>(items),
            _ => None,
        });

    match values {
        Some([x0, y0, x1, y1]) if (x1 - x0).abs() > 0.0 && (y1 - y0).abs() > 0.0 => {
            [x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1)]
        }
        _ => DEFAULT_MEDIA_BOX,
    }
}

/// Extracts the ordered text runs of one page.
pub fn extract_text_runs(doc: &Document, page_id: ObjectId, page: u32) -> FinanceGuardResult<Vec<TextRun>> {
    let page_dict = match doc.get_object(page_id) {
        Ok(Object::Dictionary(dict)) => dict,
        Ok(_) => return Err(FinanceGuardError::page_extraction(page, "page object is not a dictionary")),
        Err(e) => return Err(FinanceGuardError::page_extraction(page, e.to_string())),
    };

    let bytes = page_content(doc, page_id, page_dict, page)?;
    if bytes.is_empty() {
        return Ok(Vec::new());
    }
    let content = Content::decode(&bytes).map_err(|e| {
        FinanceGuardError::page_extraction(page, format!("failed to decode content stream: {}", e))
    })?;

    let resources = resolve_inherited(doc, page_id, b"Resources")
        .and_then(|resources| resolve_dict(doc, resources));

    let [x0, y0, _, _] = media_box(doc, page_id);
    let mut interpreter = Interpreter::new(doc, resources, (x0, y0));
    interpreter.run(&content.operations);
    Ok(interpreter.runs)
}

/// Concatenated content streams of a page.
///
/// A /Contents entry that resolves to neither a stream nor an array of
/// streams is an error; a page without one is blank.
fn page_content(doc: &Document, page_id: ObjectId, page_dict: &Dictionary, page: u32) -> FinanceGuardResult<Vec<u8>> {
    let contents = match page_dict.get(b"Contents") {
        Ok(contents) => contents,
        Err(_) => return Ok(Vec::new()),
    };

    let stream_ids = doc.get_page_contents(page_id);
    if stream_ids.is_empty() {
        return match resolve(doc, contents) {
            Some(Object::Array(items)) if items.is_empty() => Ok(Vec::new()),
            _ => Err(FinanceGuardError::page_extraction(
                page,
                "/Contents does not resolve to a stream",
            )),
        };
    }

    let mut content = Vec::new();
    for id in stream_ids {
        let stream = doc
            .get_object(id)
            .and_then(Object::as_stream)
            .map_err(|e| FinanceGuardError::page_extraction(page, format!("content stream {:?}: {}", id, e)))?;
        let bytes = stream_bytes(stream).map_err(|e| {
            FinanceGuardError::page_extraction(page, format!("failed to decompress content stream: {}", e))
        })?;
        if !content.is_empty() {
            content.push(b' ');
        }
        content.extend_from_slice(&bytes);
    }
    Ok(content)
}

fn stream_bytes(stream: &Stream) -> Result<Vec<u8>, lopdf::Error> {
    if stream.dict.get(b"Filter").is_ok() {
        stream.decompressed_content()
    } else {
        Ok(stream.content.clone())
    }
}

fn sub_dict<'a>(doc: &'a Document, resources: Option<&'a Dictionary>, key: &[u8]) -> Option<&'a Dictionary> {
    resources
        .and_then(|resources| resources.get(key).ok())
        .and_then(|dict| resolve_dict(doc, dict))
}

/// Width table of one font resource.
#[derive(Debug, Clone)]
struct FontMetrics {
    first_char: u32,
    widths: Vec<f64>,
    missing_width: f64,
    /// Composite fonts address glyphs with two-byte codes.
    two_byte: bool,
}

impl FontMetrics {
    fn fallback() -> Self {
        Self {
            first_char: 0,
            widths: Vec::new(),
            missing_width: DEFAULT_GLYPH_WIDTH,
            two_byte: false,
        }
    }

    fn from_dict(doc: &Document, font: &Dictionary) -> Self {
        if matches!(font.get(b"Subtype"), Ok(Object::Name(name)) if name.as_slice() == b"Type0") {
            let default_width = font
                .get(b"DescendantFonts")
                .ok()
                .and_then(|fonts| match resolve(doc, fonts)? {
                    Object::Array(items) => items.first(),
                    _ => None,
                })
                .and_then(|descendant| resolve_dict(doc, descendant))
                .and_then(|descendant| descendant.get(b"DW").ok())
                .and_then(number)
                .unwrap_or(1000.0);
            return Self {
                first_char: 0,
                widths: Vec::new(),
                missing_width: default_width,
                two_byte: true,
            };
        }

        let first_char = font
            .get(b"FirstChar")
            .ok()
            .and_then(number)
            .map(|value| value.max(0.0) as u32)
            .unwrap_or(0);
        let widths: Vec<f64> = font
            .get(b"Widths")
            .ok()
            .and_then(|widths| match resolve(doc, widths)? {
                Object::Array(items) => Some(
                    items
                        .iter()
                        .map(|item| resolve(doc, item).and_then(number).unwrap_or(0.0))
                        .collect(),
                ),
                _ => None,
            })
            .unwrap_or_default();
        let missing_width = font
            .get(b"FontDescriptor")
            .ok()
            .and_then(|descriptor| resolve_dict(doc, descriptor))
            .and_then(|descriptor| descriptor.get(b"MissingWidth").ok())
            .and_then(number)
            .filter(|width| *width > 0.0)
            .unwrap_or(DEFAULT_GLYPH_WIDTH);

        Self {
            first_char,
            widths,
            missing_width,
            two_byte: false,
        }
    }

    fn glyph_width(&self, code: u32) -> f64 {
        code.checked_sub(self.first_char)
            .and_then(|index| self.widths.get(index as usize))
            .copied()
            .unwrap_or(self.missing_width)
    }

    fn codes(&self, bytes: &[u8]) -> Vec<u32> {
        if self.two_byte {
            bytes
                .chunks_exact(2)
                .map(|pair| u32::from(u16::from_be_bytes([pair[0], pair[1]])))
                .collect()
        } else {
            bytes.iter().map(|&b| u32::from(b)).collect()
        }
    }

    fn decode(&self, bytes: &[u8]) -> String {
        if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
            return decode_utf16be(rest);
        }
        if self.two_byte {
            return decode_utf16be(bytes);
        }
        match std::str::from_utf8(bytes) {
            Ok(text) => text.to_string(),
            // Latin-1
            Err(_) => bytes.iter().map(|&b| b as char).collect(),
        }
    }
}

fn decode_utf16be(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect();
    String::from_utf16_lossy(&units)
}

/// Graphics and text state saved by `q` and restored by `Q`.
#[derive(Debug, Clone)]
struct GraphicsState {
    ctm: Matrix,
    font: Option<Vec<u8>>,
    font_size: f64,
    char_spacing: f64,
    word_spacing: f64,
    horizontal_scaling: f64,
    leading: f64,
    rise: f64,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self {
            ctm: IDENTITY_TRANSFORM,
            font: None,
            font_size: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scaling: 1.0,
            leading: 0.0,
            rise: 0.0,
        }
    }
}

enum Segment<'o> {
    Text(&'o [u8]),
    /// TJ adjustment in thousandths of an em.
    Adjust(f64),
}

struct Interpreter<'a> {
    doc: &'a Document,
    font_resources: Option<&'a Dictionary>,
    xobject_resources: Option<&'a Dictionary>,
    fonts: HashMap<Vec<u8>, FontMetrics>,
    form_depth: usize,
    state: GraphicsState,
    saved: Vec<GraphicsState>,
    text_matrix: Matrix,
    line_matrix: Matrix,
    origin: (f64, f64),
    runs: Vec<TextRun>,
}

impl<'a> Interpreter<'a> {
    fn new(doc: &'a Document, resources: Option<&'a Dictionary>, origin: (f64, f64)) -> Self {
        Self {
            doc,
            font_resources: sub_dict(doc, resources, b"Font"),
            xobject_resources: sub_dict(doc, resources, b"XObject"),
            fonts: HashMap::new(),
            form_depth: 0,
            state: GraphicsState::default(),
            saved: Vec::new(),
            text_matrix: IDENTITY_TRANSFORM,
            line_matrix: IDENTITY_TRANSFORM,
            origin,
            runs: Vec::new(),
        }
    }

    fn run(&mut self, operations: &[Operation]) {
        for operation in operations {
            self.apply(&operation.operator, &operation.operands);
        }
    }

    /// Applies one operation. Operations with malformed operands are skipped.
    fn apply(&mut self, operator: &str, operands: &[Object]) {
        match operator {
            "q" => self.saved.push(self.state.clone()),
            "Q" => {
                if let Some(state) = self.saved.pop() {
                    self.state = state;
                }
            }
            "cm" => {
                if let Some(m) = numbers::<6>(operands) {
                    self.state.ctm = multiply(&m, &self.state.ctm);
                }
            }
            "BT" => {
                self.text_matrix = IDENTITY_TRANSFORM;
                self.line_matrix = IDENTITY_TRANSFORM;
            }
            "Tf" => {
                if let [Object::Name(name), size] = operands {
                    if let Some(size) = number(size) {
                        self.state.font = Some(name.clone());
                        self.state.font_size = size;
                    }
                }
            }
            "Td" => {
                if let Some([tx, ty]) = numbers::<2>(operands) {
                    self.move_line(tx, ty);
                }
            }
            "TD" => {
                if let Some([tx, ty]) = numbers::<2>(operands) {
                    self.state.leading = -ty;
                    self.move_line(tx, ty);
                }
            }
            "Tm" => {
                if let Some(m) = numbers::<6>(operands) {
                    self.text_matrix = m;
                    self.line_matrix = m;
                }
            }
            "T*" => self.next_line(),
            "TL" => self.set_param(operands, |state, v| state.leading = v),
            "Tc" => self.set_param(operands, |state, v| state.char_spacing = v),
            "Tw" => self.set_param(operands, |state, v| state.word_spacing = v),
            "Tz" => self.set_param(operands, |state, v| state.horizontal_scaling = v / 100.0),
            "Ts" => self.set_param(operands, |state, v| state.rise = v),
            "Tj" => {
                if let Some(Object::String(bytes, _)) = operands.first() {
                    self.show(&[Segment::Text(bytes)]);
                }
            }
            "'" => {
                self.next_line();
                if let Some(Object::String(bytes, _)) = operands.first() {
                    self.show(&[Segment::Text(bytes)]);
                }
            }
            "\"" => {
                if let [word_spacing, char_spacing, Object::String(bytes, _)] = operands {
                    if let (Some(tw), Some(tc)) = (number(word_spacing), number(char_spacing)) {
                        self.state.word_spacing = tw;
                        self.state.char_spacing = tc;
                    }
                    self.next_line();
                    self.show(&[Segment::Text(bytes)]);
                }
            }
            "TJ" => {
                if let Some(Object::Array(items)) = operands.first() {
                    let segments: Vec<Segment> = items
                        .iter()
                        .filter_map(|item| match item {
                            Object::String(bytes, _) => Some(Segment::Text(bytes)),
                            other => number(other).map(Segment::Adjust),
                        })
                        .collect();
                    self.show(&segments);
                }
            }
            "Do" => {
                if let Some(Object::Name(name)) = operands.first() {
                    self.draw_form(name);
                }
            }
            _ => {}
        }
    }

    /// Interprets a form XObject in place, with its own resources and
    /// matrix. Image XObjects and unreadable forms are skipped.
    fn draw_form(&mut self, name: &[u8]) {
        if self.form_depth >= MAX_FORM_DEPTH {
            debug!(depth = self.form_depth, "Form XObject nesting limit reached");
            return;
        }
        let doc = self.doc;
        let Some(stream) = self
            .xobject_resources
            .and_then(|xobjects| xobjects.get(name).ok())
            .and_then(|xobject| match resolve(doc, xobject)? {
                Object::Stream(stream) => Some(stream),
                _ => None,
            })
        else {
            return;
        };
        if !matches!(stream.dict.get(b"Subtype"), Ok(Object::Name(subtype)) if subtype.as_slice() == b"Form") {
            return;
        }

        let content = match stream_bytes(stream).map(|bytes| Content::decode(&bytes)) {
            Ok(Ok(content)) => content,
            Ok(Err(e)) | Err(e) => {
                debug!(form = %String::from_utf8_lossy(name), error = %e, "Skipping unreadable form XObject");
                return;
            }
        };

        let matrix = stream
            .dict
            .get(b"Matrix")
            .ok()
            .and_then(|matrix| match resolve(doc, matrix)? {
                Object::Array(items) => numbers::<6>(items),
                _ => None,
            })
            .unwrap_or(IDENTITY_TRANSFORM);
        let resources = stream.dict.get(b"Resources").ok().and_then(|r| resolve_dict(doc, r));

        let outer_state = self.state.clone();
        let outer_saved = std::mem::take(&mut self.saved);
        let outer_text = (self.text_matrix, self.line_matrix);
        let outer_resources = (self.font_resources, self.xobject_resources);
        let outer_fonts = std::mem::take(&mut self.fonts);

        self.state.ctm = multiply(&matrix, &self.state.ctm);
        if resources.is_some() {
            self.font_resources = sub_dict(doc, resources, b"Font");
            self.xobject_resources = sub_dict(doc, resources, b"XObject");
        }
        self.form_depth += 1;
        self.run(&content.operations);
        self.form_depth -= 1;

        self.state = outer_state;
        self.saved = outer_saved;
        (self.text_matrix, self.line_matrix) = outer_text;
        (self.font_resources, self.xobject_resources) = outer_resources;
        self.fonts = outer_fonts;
    }

    fn set_param(&mut self, operands: &[Object], set: impl FnOnce(&mut GraphicsState, f64)) {
        if let Some([value]) = numbers::<1>(operands) {
            set(&mut self.state, value);
        }
    }

    fn move_line(&mut self, tx: f64, ty: f64) {
        self.line_matrix = multiply(&translation(tx, ty), &self.line_matrix);
        self.text_matrix = self.line_matrix;
    }

    fn next_line(&mut self) {
        self.move_line(0.0, -self.state.leading);
    }

    fn current_font(&mut self) -> FontMetrics {
        let Some(name) = self.state.font.clone() else {
            return FontMetrics::fallback();
        };
        if let Some(metrics) = self.fonts.get(&name) {
            return metrics.clone();
        }

        let metrics = self
            .font_resources
            .and_then(|fonts| fonts.get(&name).ok())
            .and_then(|font| resolve_dict(self.doc, font))
            .map(|font| FontMetrics::from_dict(self.doc, font))
            .unwrap_or_else(FontMetrics::fallback);
        self.fonts.insert(name, metrics.clone());
        metrics
    }

    fn show(&mut self, segments: &[Segment<'_>]) {
        let font = self.current_font();
        let size = self.state.font_size;
        let scaling = self.state.horizontal_scaling;

        let mut text = String::new();
        let mut advance = 0.0;
        for segment in segments {
            match segment {
                Segment::Text(bytes) => {
                    text.push_str(&font.decode(bytes));
                    for code in font.codes(bytes) {
                        let word_spacing = if !font.two_byte && code == 32 {
                            self.state.word_spacing
                        } else {
                            0.0
                        };
                        advance += (font.glyph_width(code) / 1000.0 * size
                            + self.state.char_spacing
                            + word_spacing)
                            * scaling;
                    }
                }
                Segment::Adjust(amount) => {
                    advance -= amount / 1000.0 * size * scaling;
                    // Large negative kerning separates words
                    if *amount < -100.0 {
                        text.push(' ');
                    }
                }
            }
        }

        let user_matrix = multiply(&self.text_matrix, &self.state.ctm);
        if !text.is_empty() {
            let rendering = multiply(&[size * scaling, 0.0, 0.0, size, 0.0, self.state.rise], &user_matrix);
            let mut transform = rendering;
            transform[4] -= self.origin.0;
            transform[5] -= self.origin.1;
            self.runs.push(TextRun {
                text,
                transform,
                width: (advance * user_matrix[0].hypot(user_matrix[1])).abs(),
                height: rendering[2].hypot(rendering[3]),
            });
        }

        self.text_matrix = multiply(&translation(advance, 0.0), &self.text_matrix);
    }
}
