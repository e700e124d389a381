use std::collections::BTreeMap;

use encoding_rs::{BIG5, UTF_16BE};
use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

use crate::error::ParseError;
use crate::model::{BBox, RawBlock, RawDocument, RawLine, RawPage, RawSpan};

// US Letter, used when neither the page nor its ancestors carry a MediaBox.
const DEFAULT_MEDIA_BOX: [f64; 4] = [0.0, 0.0, 612.0, 792.0];

// Glyph metrics are estimated, not read from the font program.
const GLYPH_ADVANCE_EM: f64 = 0.5;
const ASCENT_EM: f64 = 0.8;
const DESCENT_EM: f64 = 0.2;
const WORD_GAP_EM: f64 = 0.25;

// Nested form XObjects deeper than this are skipped.
const MAX_FORM_DEPTH: usize = 12;

const INFO_KEYS: [(&[u8], &str); 9] = [
    (b"Title", "title"),
    (b"Author", "author"),
    (b"Subject", "subject"),
    (b"Keywords", "keywords"),
    (b"Creator", "creator"),
    (b"Producer", "producer"),
    (b"CreationDate", "creationDate"),
    (b"ModDate", "modDate"),
    (b"Trapped", "trapped"),
];

const FLAG_SUPERSCRIPT: u32 = 1;
const FLAG_ITALIC: u32 = 2;
const FLAG_SERIF: u32 = 4;
const FLAG_MONOSPACE: u32 = 8;
const FLAG_BOLD: u32 = 16;

/// Turns raw document bytes into per-page content trees.
///
/// Implementations must be deterministic: the order of blocks inside a page
/// is the extraction order used for `block_num` and for tie-breaking.
pub trait ContentExtractor {
    fn extract(&self, document_bytes: &[u8]) -> Result<RawDocument, ParseError>;
}

/// [`ContentExtractor`] that walks page content streams with `lopdf`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LopdfExtractor;

impl ContentExtractor for LopdfExtractor {
    fn extract(&self, document_bytes: &[u8]) -> Result<RawDocument, ParseError> {
        let document = Document::load_mem(document_bytes)?;

        let mut pages = Vec::new();
        for (page_no, page_id) in document.get_pages() {
            let page = PageReader::new(&document, page_no, page_id).read()?;
            tracing::debug!(page = page_no, raw_blocks = page.blocks.len(), "read page content");
            pages.push(page);
        }

        Ok(RawDocument {
            pages,
            metadata: read_metadata(&document),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Matrix {
    a: f64,
    b: f64,
    c: f64,
    d: f64,
    e: f64,
    f: f64,
}

impl Matrix {
    const IDENTITY: Self = Self {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    const fn translation(tx: f64, ty: f64) -> Self {
        Self {
            e: tx,
            f: ty,
            ..Self::IDENTITY
        }
    }

    fn from_operands(operands: &[Object]) -> Option<Self> {
        let [a, b, c, d, e, f] = operands else {
            return None;
        };
        Some(Self {
            a: number(a)?,
            b: number(b)?,
            c: number(c)?,
            d: number(d)?,
            e: number(e)?,
            f: number(f)?,
        })
    }

    /// `self` applied first, then `other`.
    fn multiply(&self, other: &Self) -> Self {
        Self {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    fn transform_point(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }

    fn vertical_scale(&self) -> f64 {
        self.c.hypot(self.d)
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct FontInfo<'a> {
    encoding: Option<&'a str>,
    flags: u32,
}

impl<'a> FontInfo<'a> {
    fn new(document: &Document, font: &'a Dictionary) -> Self {
        Self {
            encoding: Some(font.get_font_encoding()),
            flags: font_flags(document, font),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct GraphicsState<'a> {
    ctm: Matrix,
    font: FontInfo<'a>,
    font_size: f64,
    leading: f64,
    rise: f64,
}

impl Default for GraphicsState<'_> {
    fn default() -> Self {
        Self {
            ctm: Matrix::IDENTITY,
            font: FontInfo::default(),
            font_size: 0.0,
            leading: 0.0,
            rise: 0.0,
        }
    }
}

#[derive(Debug)]
struct LineBuilder {
    baseline: f64,
    end_x: f64,
    spans: Vec<RawSpan>,
}

#[derive(Debug, Default)]
struct BlockBuilder {
    bbox: Option<BBox>,
    lines: Vec<LineBuilder>,
}

impl BlockBuilder {
    fn push_span(&mut self, mut span: RawSpan, bbox: BBox, baseline: f64) {
        let tolerance = if span.size > 0.0 { span.size * 0.5 } else { 1.0 };

        match self.lines.last_mut() {
            Some(line) if (line.baseline - baseline).abs() <= tolerance => {
                let ends_blank = line
                    .spans
                    .last()
                    .is_some_and(|last| last.text.ends_with(char::is_whitespace));
                if bbox.x0 - line.end_x > WORD_GAP_EM * span.size
                    && !ends_blank
                    && !span.text.starts_with(char::is_whitespace)
                {
                    span.text.insert(0, ' ');
                }
                line.end_x = line.end_x.max(bbox.x1);
                line.spans.push(span);
            }
            _ => self.lines.push(LineBuilder {
                baseline,
                end_x: bbox.x1,
                spans: vec![span],
            }),
        }

        self.bbox = Some(self.bbox.map_or(bbox, |current| current.union(bbox)));
    }

    fn finish(self) -> Option<RawBlock> {
        if self.lines.is_empty() {
            return None;
        }

        Some(RawBlock::Text {
            bbox: self.bbox.unwrap_or_default(),
            lines: self
                .lines
                .into_iter()
                .map(|line| RawLine { spans: line.spans })
                .collect(),
        })
    }
}

struct PageReader<'a> {
    document: &'a Document,
    page_no: u32,
    page_id: ObjectId,
    left: f64,
    top: f64,
    fonts: BTreeMap<Vec<u8>, FontInfo<'a>>,
    resources: Vec<&'a Dictionary>,
    form_depth: usize,
    state: GraphicsState<'a>,
    saved: Vec<GraphicsState<'a>>,
    text_matrix: Matrix,
    line_matrix: Matrix,
    current: Option<BlockBuilder>,
    blocks: Vec<RawBlock>,
}

impl<'a> PageReader<'a> {
    fn new(document: &'a Document, page_no: u32, page_id: ObjectId) -> Self {
        let [left, _, _, top] = media_box(document, page_id);
        let fonts = document
            .get_page_fonts(page_id)
            .into_iter()
            .map(|(name, font)| (name, FontInfo::new(document, font)))
            .collect();

        let (direct, inherited) = document.get_page_resources(page_id);
        let resources = direct
            .into_iter()
            .chain(
                inherited
                    .into_iter()
                    .filter_map(|id| document.get_dictionary(id).ok()),
            )
            .collect();

        Self {
            document,
            page_no,
            page_id,
            left,
            top,
            fonts,
            resources,
            form_depth: 0,
            state: GraphicsState::default(),
            saved: Vec::new(),
            text_matrix: Matrix::IDENTITY,
            line_matrix: Matrix::IDENTITY,
            current: None,
            blocks: Vec::new(),
        }
    }

    fn read(mut self) -> Result<RawPage, ParseError> {
        let raw_content = self
            .document
            .get_page_content(self.page_id)
            .map_err(|error| self.content_error(&error))?;
        let content = Content::decode(&raw_content).map_err(|error| self.content_error(&error))?;

        self.run(&content);
        self.end_text_object();

        Ok(RawPage {
            blocks: self.blocks,
        })
    }

    fn run(&mut self, content: &Content) {
        for operation in &content.operations {
            self.apply(operation.operator.as_str(), &operation.operands);
        }
    }

    fn content_error(&self, error: &lopdf::Error) -> ParseError {
        ParseError::Content {
            page: self.page_no,
            message: error.to_string(),
        }
    }

    fn apply(&mut self, operator: &str, operands: &[Object]) {
        match operator {
            "q" => self.saved.push(self.state),
            "Q" => {
                if let Some(state) = self.saved.pop() {
                    self.state = state;
                }
            }
            "cm" => {
                if let Some(matrix) = Matrix::from_operands(operands) {
                    self.state.ctm = matrix.multiply(&self.state.ctm);
                }
            }
            "BT" => {
                self.end_text_object();
                self.text_matrix = Matrix::IDENTITY;
                self.line_matrix = Matrix::IDENTITY;
                self.current = Some(BlockBuilder::default());
            }
            "ET" => self.end_text_object(),
            "Tf" => {
                if let Some(name) = operands.first().and_then(|operand| operand.as_name().ok()) {
                    self.state.font = self.fonts.get(name).copied().unwrap_or_default();
                }
                if let Some(size) = operands.get(1).and_then(number) {
                    self.state.font_size = size;
                }
            }
            "TL" => {
                if let Some(leading) = operands.first().and_then(number) {
                    self.state.leading = leading;
                }
            }
            "Ts" => {
                if let Some(rise) = operands.first().and_then(number) {
                    self.state.rise = rise;
                }
            }
            "Td" | "TD" => {
                let offset = match operands {
                    [tx, ty] => number(tx).zip(number(ty)),
                    _ => None,
                };
                if let Some((tx, ty)) = offset {
                    if operator == "TD" {
                        self.state.leading = -ty;
                    }
                    self.move_line(tx, ty);
                }
            }
            "Tm" => {
                if let Some(matrix) = Matrix::from_operands(operands) {
                    self.text_matrix = matrix;
                    self.line_matrix = matrix;
                }
            }
            "T*" => self.next_line(),
            "Tj" | "TJ" => self.show(operands),
            "'" => {
                self.next_line();
                self.show(operands);
            }
            "\"" => {
                self.next_line();
                self.show(operands.get(2..).unwrap_or_default());
            }
            "Do" => self.paint_xobject(operands),
            _ => {}
        }
    }

    fn move_line(&mut self, tx: f64, ty: f64) {
        self.line_matrix = Matrix::translation(tx, ty).multiply(&self.line_matrix);
        self.text_matrix = self.line_matrix;
    }

    fn next_line(&mut self) {
        self.move_line(0.0, -self.state.leading);
    }

    fn end_text_object(&mut self) {
        if let Some(block) = self.current.take().and_then(BlockBuilder::finish) {
            self.blocks.push(block);
        }
    }

    fn to_page_space(&self, (x, y): (f64, f64)) -> (f64, f64) {
        (x - self.left, self.top - y)
    }

    fn show(&mut self, operands: &[Object]) {
        let mut text = String::new();
        let mut adjustment = 0.0;
        collect_text(&mut text, &mut adjustment, self.state.font.encoding, operands);

        let font_size = self.state.font_size;
        let rise = self.state.rise;
        let start_matrix = self.text_matrix.multiply(&self.state.ctm);

        let glyphs = f64::from(u32::try_from(text.chars().count()).unwrap_or(u32::MAX));
        let advance = (glyphs * GLYPH_ADVANCE_EM - adjustment / 1000.0) * font_size;
        self.text_matrix = Matrix::translation(advance, 0.0).multiply(&self.text_matrix);

        if text.is_empty() {
            return;
        }

        let end_matrix = self.text_matrix.multiply(&self.state.ctm);
        let size = font_size * start_matrix.vertical_scale();
        let (start_x, baseline) = self.to_page_space(start_matrix.transform_point(0.0, rise));
        let (end_x, _) = self.to_page_space(end_matrix.transform_point(0.0, rise));

        let bbox = BBox::new(
            start_x.min(end_x),
            baseline - ASCENT_EM * size,
            start_x.max(end_x),
            baseline + DESCENT_EM * size,
        );
        let mut flags = self.state.font.flags;
        if rise > 0.0 {
            flags |= FLAG_SUPERSCRIPT;
        }

        let span = RawSpan { text, size, flags };
        self.current
            .get_or_insert_with(BlockBuilder::default)
            .push_span(span, bbox, baseline);
    }

    fn paint_xobject(&mut self, operands: &[Object]) {
        let Some(name) = operands.first().and_then(|operand| operand.as_name().ok()) else {
            return;
        };
        let Some(stream) = self.find_xobject(name) else {
            tracing::warn!(
                page = self.page_no,
                name = %String::from_utf8_lossy(name),
                "skipping unresolved XObject"
            );
            return;
        };

        let subtype = stream.dict.get(b"Subtype").and_then(Object::as_name).ok();
        let block = match subtype {
            Some(b"Form") => return self.run_form(name, stream),
            Some(b"Image") => RawBlock::Image {
                bbox: self.unit_square_bbox(),
                width: self.dimension(stream, b"Width"),
                height: self.dimension(stream, b"Height"),
            },
            _ => RawBlock::Other {
                bbox: self.unit_square_bbox(),
            },
        };
        self.blocks.push(block);
    }

    /// Runs a form XObject's content in place, under its `/Matrix` and with its
    /// own resources searched before the enclosing ones.
    fn run_form(&mut self, name: &[u8], form: &'a Stream) {
        if self.form_depth >= MAX_FORM_DEPTH {
            tracing::warn!(
                page = self.page_no,
                name = %String::from_utf8_lossy(name),
                "skipping form XObject nested too deeply"
            );
            return;
        }

        let raw_content = form
            .decompressed_content()
            .unwrap_or_else(|_| form.content.clone());
        let content = match Content::decode(&raw_content) {
            Ok(content) => content,
            Err(error) => {
                tracing::warn!(
                    page = self.page_no,
                    name = %String::from_utf8_lossy(name),
                    %error,
                    "skipping undecodable form XObject"
                );
                return;
            }
        };

        let form_matrix = form
            .dict
            .get(b"Matrix")
            .ok()
            .and_then(|object| resolve(self.document, object))
            .and_then(|object| object.as_array().ok())
            .and_then(|items| Matrix::from_operands(items))
            .unwrap_or(Matrix::IDENTITY);
        let form_resources = form
            .dict
            .get(b"Resources")
            .ok()
            .and_then(|object| resolve(self.document, object))
            .and_then(|object| object.as_dict().ok());

        let outer_state = self.state;
        let outer_saved = self.saved.len();
        let outer_text = (self.text_matrix, self.line_matrix);
        let outer_fonts = form_resources.map(|resources| {
            let mut fonts = self.fonts.clone();
            fonts.extend(resource_fonts(self.document, resources));
            self.resources.insert(0, resources);
            std::mem::replace(&mut self.fonts, fonts)
        });

        self.state.ctm = form_matrix.multiply(&self.state.ctm);
        self.form_depth += 1;
        self.run(&content);
        self.end_text_object();
        self.form_depth -= 1;

        if let Some(fonts) = outer_fonts {
            self.fonts = fonts;
            self.resources.remove(0);
        }
        (self.text_matrix, self.line_matrix) = outer_text;
        self.saved.truncate(outer_saved);
        self.state = outer_state;
    }

    fn find_xobject(&self, name: &[u8]) -> Option<&'a Stream> {
        self.resources.iter().copied().find_map(|resources| {
            let xobjects = resources
                .get(b"XObject")
                .ok()
                .and_then(|object| resolve(self.document, object))?
                .as_dict()
                .ok()?;
            resolve(self.document, xobjects.get(name).ok()?)?
                .as_stream()
                .ok()
        })
    }

    fn dimension(&self, stream: &Stream, key: &[u8]) -> Option<u32> {
        let value = resolve(self.document, stream.dict.get(key).ok()?)?
            .as_i64()
            .ok()?;
        u32::try_from(value).ok()
    }

    fn unit_square_bbox(&self) -> BBox {
        let [first, rest @ ..] = [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0), (1.0, 1.0)]
            .map(|(x, y)| self.to_page_space(self.state.ctm.transform_point(x, y)));

        rest.into_iter()
            .fold(BBox::new(first.0, first.1, first.0, first.1), |bbox, (x, y)| {
                bbox.union(BBox::new(x, y, x, y))
            })
    }
}

#[allow(clippy::cast_precision_loss)]
fn number(object: &Object) -> Option<f64> {
    match object {
        Object::Integer(value) => Some(*value as f64),
        Object::Real(value) => Some(f64::from(*value)),
        _ => None,
    }
}

fn resolve<'a>(document: &'a Document, object: &'a Object) -> Option<&'a Object> {
    match object {
        Object::Reference(id) => document.get_object(*id).ok(),
        other => Some(other),
    }
}

fn resource_fonts<'a>(
    document: &'a Document,
    resources: &'a Dictionary,
) -> Vec<(Vec<u8>, FontInfo<'a>)> {
    let Some(fonts) = resources
        .get(b"Font")
        .ok()
        .and_then(|object| resolve(document, object))
        .and_then(|object| object.as_dict().ok())
    else {
        return Vec::new();
    };

    fonts
        .iter()
        .filter_map(|(name, object)| {
            let font = resolve(document, object)?.as_dict().ok()?;
            Some((name.clone(), FontInfo::new(document, font)))
        })
        .collect()
}

fn media_box(document: &Document, page_id: ObjectId) -> [f64; 4] {
    let mut node = document.get_dictionary(page_id).ok();
    // Bounded walk up the page tree; malformed files can loop through Parent.
    for _ in 0..32 {
        let Some(dict) = node else {
            break;
        };
        let rect = dict
            .get(b"MediaBox")
            .ok()
            .and_then(|object| resolve(document, object))
            .and_then(|object| object.as_array().ok())
            .and_then(|items| rect_from_array(document, items));
        if let Some(rect) = rect {
            return rect;
        }
        node = dict
            .get(b"Parent")
            .ok()
            .and_then(|object| resolve(document, object))
            .and_then(|object| object.as_dict().ok());
    }
    DEFAULT_MEDIA_BOX
}

fn rect_from_array(document: &Document, items: &[Object]) -> Option<[f64; 4]> {
    let [x0, y0, x1, y1] = items else {
        return None;
    };
    let value = |object| resolve(document, object).and_then(number);
    let (x0, y0, x1, y1) = (value(x0)?, value(y0)?, value(x1)?, value(y1)?);
    Some([x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1)])
}

fn font_flags(document: &Document, font: &Dictionary) -> u32 {
    let base_font = font
        .get(b"BaseFont")
        .and_then(Object::as_name)
        .map(|name| String::from_utf8_lossy(name).to_ascii_lowercase())
        .unwrap_or_default();
    let descriptor_flags = font
        .get(b"FontDescriptor")
        .ok()
        .and_then(|object| resolve(document, object))
        .and_then(|object| object.as_dict().ok())
        .and_then(|descriptor| descriptor.get(b"Flags").ok())
        .and_then(|object| object.as_i64().ok())
        .unwrap_or(0);

    let mut flags = 0;
    if descriptor_flags & 1 != 0 || base_font.contains("courier") || base_font.contains("mono") {
        flags |= FLAG_MONOSPACE;
    }
    if descriptor_flags & 2 != 0
        || ((base_font.contains("times") || base_font.contains("serif"))
            && !base_font.contains("sans"))
    {
        flags |= FLAG_SERIF;
    }
    if descriptor_flags & 64 != 0 || base_font.contains("italic") || base_font.contains("oblique")
    {
        flags |= FLAG_ITALIC;
    }
    if descriptor_flags & (1 << 18) != 0 || base_font.contains("bold") {
        flags |= FLAG_BOLD;
    }
    flags
}

fn collect_text(text: &mut String, adjustment: &mut f64, encoding: Option<&str>, operands: &[Object]) {
    for operand in operands {
        match operand {
            Object::String(bytes, _) => text.push_str(&decode_pdf_bytes(encoding, bytes)),
            Object::Array(items) => collect_text(text, adjustment, encoding, items),
            Object::Integer(_) | Object::Real(_) => {
                let value = number(operand).unwrap_or(0.0);
                // Large negative kerning in a TJ array is how producers encode word gaps.
                if value < -100.0 && !text.ends_with(' ') {
                    text.push(' ');
                }
                *adjustment += value;
            }
            _ => {}
        }
    }
}

fn read_metadata(document: &Document) -> BTreeMap<String, String> {
    let info = document
        .trailer
        .get(b"Info")
        .ok()
        .and_then(|object| resolve(document, object))
        .and_then(|object| object.as_dict().ok());

    let mut metadata = BTreeMap::new();
    metadata.insert("format".to_string(), format!("PDF {}", document.version));
    for (key, name) in INFO_KEYS {
        let value = info
            .and_then(|info| info.get(key).ok())
            .and_then(|object| resolve(document, object))
            .map(info_value)
            .unwrap_or_default();
        metadata.insert(name.to_string(), value);
    }
    metadata.insert("encryption".to_string(), encryption_label(document));
    metadata
}

/// Describes the security handler, e.g. `Standard V2 R3 128-bit`; empty when
/// the trailer has no `/Encrypt` entry.
fn encryption_label(document: &Document) -> String {
    let Some(encrypt) = document
        .trailer
        .get(b"Encrypt")
        .ok()
        .and_then(|object| resolve(document, object))
        .and_then(|object| object.as_dict().ok())
    else {
        return String::new();
    };

    let integer = |key: &'static [u8]| {
        encrypt
            .get(key)
            .ok()
            .and_then(|object| resolve(document, object))
            .and_then(|object| object.as_i64().ok())
    };
    let handler = encrypt
        .get(b"Filter")
        .and_then(Object::as_name)
        .map_or_else(|_| "Unknown".to_string(), |name| String::from_utf8_lossy(name).into_owned());

    [
        Some(handler),
        integer(b"V".as_slice()).map(|version| format!("V{version}")),
        integer(b"R".as_slice()).map(|revision| format!("R{revision}")),
        integer(b"Length".as_slice()).map(|bits| format!("{bits}-bit")),
    ]
    .into_iter()
    .flatten()
    .collect::<Vec<_>>()
    .join(" ")
}

fn info_value(object: &Object) -> String {
    match object {
        Object::String(bytes, _) => match bytes.strip_prefix(&[0xFE, 0xFF]) {
            Some(utf16) => UTF_16BE.decode_without_bom_handling(utf16).0.into_owned(),
            None => decode_pdf_bytes(None, bytes),
        },
        Object::Name(name) => String::from_utf8_lossy(name).into_owned(),
        Object::Boolean(value) => value.to_string(),
        _ => String::new(),
    }
}

fn looks_decoding_broken(text: &str) -> bool {
    if text.contains("?Identity-H Unimplemented?") {
        return true;
    }

    let total = text.chars().count();
    if total == 0 {
        return false;
    }

    let replacement = text.matches('\u{FFFD}').count();
    let control = text
        .chars()
        .filter(|ch| ch.is_control() && !matches!(ch, '\n' | '\r' | '\t'))
        .count();

    replacement * 8 > total || control * 5 > total
}

fn decode_pdf_bytes(encoding: Option<&str>, bytes: &[u8]) -> String {
    let decoded = Document::decode_text(encoding, bytes);
    if !looks_decoding_broken(&decoded) {
        return decoded;
    }

    let without_bom = bytes
        .strip_prefix(&[0xFE, 0xFF])
        .or_else(|| bytes.strip_prefix(&[0xFF, 0xFE]));
    let hint = encoding.map(str::to_ascii_lowercase).unwrap_or_default();
    let wide = ["utf16", "ucs2", "identity-h", "unicode"]
        .iter()
        .any(|marker| hint.contains(marker));

    if without_bom.is_some() || wide {
        let (utf16, had_errors) =
            UTF_16BE.decode_without_bom_handling(without_bom.unwrap_or(bytes));
        if !had_errors && !utf16.is_empty() {
            return utf16.into_owned();
        }
    }

    if ["big5", "b5", "eten", "cns"]
        .iter()
        .any(|marker| hint.contains(marker))
    {
        let (big5, _, had_errors) = BIG5.decode(bytes);
        if !had_errors && !big5.is_empty() {
            return big5.into_owned();
        }
    }

    String::from_utf8_lossy(bytes).into_owned()
}
