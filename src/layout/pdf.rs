//! PDF layout extraction using lopdf
//!
//! Walks each page content stream and rebuilds blocks, lines and spans with
//! bounding boxes, font names and sizes. Each `BT`..`ET` text object becomes a
//! block, a baseline change starts a new line and a font or size change starts
//! a new span. Glyph widths come from the font `Widths` array when present,
//! otherwise half an em per glyph.
//! Form XObjects are walked in place; image XObjects leave an empty image
//! block.

use std::collections::BTreeMap;
use std::path::Path;

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

use super::{BBox, Block, BlockKind, DocumentLayout, LayoutSource, PageLayout, RawLine, Span};
use crate::error::{Error, Result};

/// Fraction of the font size above the baseline
const ASCENT: f64 = 0.8;
/// Fraction of the font size below the baseline
const DESCENT: f64 = 0.2;
/// Advance for glyphs without metrics, in em
const DEFAULT_GLYPH_WIDTH: f64 = 0.5;
/// A4 portrait, used when a page has no usable MediaBox
const DEFAULT_MEDIA_BOX: [f64; 4] = [0.0, 0.0, 595.0, 842.0];

/// Layout extraction backed by lopdf.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfLayoutExtractor;

impl LayoutSource for PdfLayoutExtractor {
    fn extract_layout(&self, path: &Path) -> Result<DocumentLayout> {
        let doc = Document::load(path).map_err(|e| Error::pdf(path, e))?;
        extract_document(&doc).map_err(|e| Error::pdf(path, e))
    }
}

/// Extract the layout of every page of a loaded document.
pub fn extract_document(doc: &Document) -> std::result::Result<DocumentLayout, lopdf::Error> {
    let mut pages = Vec::new();
    for (number, page_id) in doc.get_pages() {
        pages.push(extract_page(doc, page_id, number)?);
    }
    Ok(DocumentLayout { pages })
}

// ============================================================================
// Geometry helpers shared with table detection
// ============================================================================

/// Affine matrix `[a b c d e f]` as used by PDF operators.
pub(crate) type Matrix = [f64; 6];

pub(crate) const IDENTITY: Matrix = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

/// `m1 × m2`: apply `m1` first, then `m2`.
pub(crate) fn multiply(m1: &Matrix, m2: &Matrix) -> Matrix {
    [
        m1[0] * m2[0] + m1[1] * m2[2],
        m1[0] * m2[1] + m1[1] * m2[3],
        m1[2] * m2[0] + m1[3] * m2[2],
        m1[2] * m2[1] + m1[3] * m2[3],
        m1[4] * m2[0] + m1[5] * m2[2] + m2[4],
        m1[4] * m2[1] + m1[5] * m2[3] + m2[5],
    ]
}

pub(crate) fn apply(m: &Matrix, x: f64, y: f64) -> (f64, f64) {
    (m[0] * x + m[2] * y + m[4], m[1] * x + m[3] * y + m[5])
}

/// Helper to get f64 from Object
pub(crate) fn get_number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(*r as f64),
        _ => None,
    }
}

/// Read `n` numeric operands, `None` if any is missing or not a number.
pub(crate) fn numbers(operands: &[Object], n: usize) -> Option<Vec<f64>> {
    if operands.len() < n {
        return None;
    }
    operands.iter().take(n).map(get_number).collect()
}

/// Page attribute, following the Parent chain for inherited values.
fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut current = doc.get_dictionary(page_id).ok();
    // Guards against cyclic Parent references in damaged files
    for _ in 0..32 {
        let dict = current?;
        if let Ok(obj) = dict.get(key) {
            return Some(resolve(doc, obj));
        }
        current = dict
            .get(b"Parent")
            .ok()
            .and_then(|p| p.as_reference().ok())
            .and_then(|id| doc.get_dictionary(id).ok());
    }
    None
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    doc.dereference(obj).map(|(_, o)| o).unwrap_or(obj)
}

/// Page MediaBox `[x0 y0 x1 y1]`, possibly inherited from a Pages node.
pub(crate) fn media_box(doc: &Document, page_id: ObjectId) -> [f64; 4] {
    inherited(doc, page_id, b"MediaBox")
        .and_then(|o| o.as_array().ok())
        .and_then(|values| numbers(values, 4))
        .map(|v| [v[0].min(v[2]), v[1].min(v[3]), v[0].max(v[2]), v[1].max(v[3])])
        .unwrap_or(DEFAULT_MEDIA_BOX)
}

// ============================================================================
// Fonts
// ============================================================================

/// Name and advance widths of one font resource.
#[derive(Clone)]
struct FontInfo<'a> {
    name: String,
    dict: &'a Dictionary,
    first_char: i64,
    /// Advance widths in em, indexed by `code - first_char`
    widths: Vec<f64>,
    two_byte: bool,
}

impl<'a> FontInfo<'a> {
    fn from_dict(doc: &'a Document, key: &[u8], dict: &'a Dictionary) -> Self {
        let name = dict
            .get(b"BaseFont")
            .ok()
            .and_then(|o| o.as_name().ok())
            .map(|n| strip_subset_prefix(&String::from_utf8_lossy(n)).to_string())
            .unwrap_or_else(|| String::from_utf8_lossy(key).to_string());

        let two_byte = dict
            .get(b"Subtype")
            .ok()
            .and_then(|o| o.as_name().ok())
            .map(|s| s == b"Type0")
            .unwrap_or(false);

        let first_char = dict
            .get(b"FirstChar")
            .ok()
            .and_then(get_number)
            .map(|v| v as i64)
            .unwrap_or(0);

        let widths = dict
            .get(b"Widths")
            .ok()
            .map(|o| resolve(doc, o))
            .and_then(|o| o.as_array().ok())
            .map(|arr| {
                arr.iter()
                    .map(|w| get_number(resolve(doc, w)).unwrap_or(0.0) / 1000.0)
                    .collect()
            })
            .unwrap_or_default();

        Self { name, dict, first_char, widths, two_byte }
    }

    /// Advance of a raw string in em.
    fn advance(&self, bytes: &[u8], decoded: &str) -> f64 {
        if self.two_byte || self.widths.is_empty() {
            return decoded.chars().count() as f64 * DEFAULT_GLYPH_WIDTH;
        }
        bytes
            .iter()
            .map(|&b| {
                let idx = b as i64 - self.first_char;
                if idx >= 0 {
                    self.widths.get(idx as usize).copied().filter(|w| *w > 0.0)
                } else {
                    None
                }
                .unwrap_or(DEFAULT_GLYPH_WIDTH)
            })
            .sum()
    }
}

/// "ABCDEF+Arial-BoldMT" -> "Arial-BoldMT"
fn strip_subset_prefix(name: &str) -> &str {
    match name.split_once('+') {
        Some((prefix, rest)) if prefix.len() == 6 && prefix.chars().all(|c| c.is_ascii_uppercase()) => rest,
        _ => name,
    }
}

/// Decode a string operand, handling encoding
fn decode_string(doc: &Document, font: Option<&FontInfo>, bytes: &[u8]) -> String {
    if let Some(font) = font {
        if let Ok(encoding) = font.dict.get_font_encoding(doc) {
            if let Ok(text) = Document::decode_text(&encoding, bytes) {
                return text;
            }
        }
    }

    // Fallback: try UTF-16BE then Latin-1
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let utf16: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|chunk| u16::from_be_bytes([chunk[0], chunk[1]]))
            .collect();
        return String::from_utf16_lossy(&utf16);
    }

    bytes.iter().map(|&b| b as char).collect()
}

// ============================================================================
// Page walk
// ============================================================================

struct TextState {
    font_key: Vec<u8>,
    font_size: f64,
    leading: f64,
    char_spacing: f64,
    word_spacing: f64,
    tm: Matrix,
    tlm: Matrix,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            font_key: Vec::new(),
            font_size: 12.0,
            leading: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            tm: IDENTITY,
            tlm: IDENTITY,
        }
    }
}

impl TextState {
    fn translate_line(&mut self, tx: f64, ty: f64) {
        self.tlm = multiply(&[1.0, 0.0, 0.0, 1.0, tx, ty], &self.tlm);
        self.tm = self.tlm;
    }

    fn next_line(&mut self) {
        let leading = if self.leading != 0.0 { self.leading } else { self.font_size * 1.2 };
        self.translate_line(0.0, -leading);
    }

    fn advance(&mut self, tx: f64) {
        self.tm = multiply(&[1.0, 0.0, 0.0, 1.0, tx, 0.0], &self.tm);
    }
}

/// Accumulates lines and spans of the current text object.
struct BlockBuilder {
    page_left: f64,
    page_top: f64,
    lines: Vec<RawLine>,
    baseline: Option<f64>,
}

impl BlockBuilder {
    fn new(page_left: f64, page_top: f64) -> Self {
        Self { page_left, page_top, lines: Vec::new(), baseline: None }
    }

    fn push(&mut self, text: String, font: &str, size: f64, start: (f64, f64), end: (f64, f64)) {
        // Flip to a top-left origin
        let x0 = start.0.min(end.0) - self.page_left;
        let x1 = start.0.max(end.0) - self.page_left;
        let baseline = self.page_top - start.1;
        let bbox = BBox::new(x0, baseline - size * ASCENT, x1, baseline + size * DESCENT);

        let same_line = self
            .baseline
            .map(|b| (b - baseline).abs() <= (size * 0.5).max(1.0))
            .unwrap_or(false);
        if !same_line || self.lines.is_empty() {
            self.lines.push(RawLine::default());
            self.baseline = Some(baseline);
        }
        let Some(line) = self.lines.last_mut() else { return };

        match line.spans.last_mut() {
            Some(last) if last.font == font && (last.size - size).abs() < 0.01 => {
                let gap = bbox.x0 - last.bbox.x1;
                if gap > size * 0.25 && !last.text.ends_with(' ') && !text.starts_with(' ') {
                    last.text.push(' ');
                }
                last.text.push_str(&text);
                last.bbox = last.bbox.union(&bbox);
            }
            _ => line.spans.push(Span { text, bbox, font: font.to_string(), size }),
        }
    }

    fn finish(self) -> Option<Block> {
        let lines: Vec<RawLine> = self.lines.into_iter().filter(|l| !l.spans.is_empty()).collect();
        if lines.is_empty() {
            None
        } else {
            Some(Block::text(lines))
        }
    }
}

/// Fonts and XObjects visible to one content stream.
#[derive(Clone)]
struct Resources<'a> {
    fonts: BTreeMap<Vec<u8>, FontInfo<'a>>,
    xobjects: BTreeMap<Vec<u8>, &'a Stream>,
}

impl<'a> Resources<'a> {
    fn for_page(doc: &'a Document, page_id: ObjectId) -> Self {
        let fonts = doc
            .get_page_fonts(page_id)
            .unwrap_or_default()
            .into_iter()
            .map(|(key, dict)| {
                let info = FontInfo::from_dict(doc, &key, dict);
                (key, info)
            })
            .collect();
        let mut resources = Resources { fonts, xobjects: BTreeMap::new() };
        if let Some(dict) = inherited(doc, page_id, b"Resources").and_then(|o| o.as_dict().ok()) {
            resources.add_xobjects(doc, dict);
        }
        resources
    }

    /// Resources of a form XObject. Names it does not define stay visible
    /// from the enclosing stream.
    fn for_form(&self, doc: &'a Document, form: &'a Stream) -> Self {
        let mut resources = self.clone();
        let Some(dict) = form.dict.get(b"Resources").ok().map(|o| resolve(doc, o)).and_then(|o| o.as_dict().ok())
        else {
            return resources;
        };
        if let Some(fonts) = dict.get(b"Font").ok().map(|o| resolve(doc, o)).and_then(|o| o.as_dict().ok()) {
            for (key, obj) in fonts.iter() {
                if let Ok(font) = resolve(doc, obj).as_dict() {
                    resources.fonts.insert(key.clone(), FontInfo::from_dict(doc, key, font));
                }
            }
        }
        resources.add_xobjects(doc, dict);
        resources
    }

    fn add_xobjects(&mut self, doc: &'a Document, resources: &'a Dictionary) {
        let Some(xobjects) = resources.get(b"XObject").ok().map(|o| resolve(doc, o)).and_then(|o| o.as_dict().ok())
        else {
            return;
        };
        for (key, obj) in xobjects.iter() {
            if let Ok(stream) = resolve(doc, obj).as_stream() {
                self.xobjects.insert(key.clone(), stream);
            }
        }
    }
}

fn xobject_subtype(stream: &Stream) -> Option<&[u8]> {
    stream.dict.get(b"Subtype").ok().and_then(|o| o.as_name().ok())
}

fn extract_page(
    doc: &Document,
    page_id: ObjectId,
    number: u32,
) -> std::result::Result<PageLayout, lopdf::Error> {
    let mb = media_box(doc, page_id);
    let width = mb[2] - mb[0];
    let height = mb[3] - mb[1];

    let resources = Resources::for_page(doc, page_id);
    let content = Content::decode(&doc.get_page_content(page_id)?)?;

    let mut walk = PageWalk {
        doc,
        page_left: mb[0],
        page_top: mb[3],
        blocks: Vec::new(),
        ts: TextState::default(),
        builder: None,
    };
    walk.run(&content.operations, &resources, IDENTITY, 0)?;

    if let Some(block) = walk.builder.take().and_then(BlockBuilder::finish) {
        walk.blocks.push(block);
    }

    Ok(PageLayout { number, width, height, blocks: walk.blocks })
}

/// Nesting limit for form XObjects; also stops self-referencing forms
const MAX_FORM_DEPTH: usize = 8;

/// Content-stream interpreter for one page, shared by nested forms.
struct PageWalk<'a> {
    doc: &'a Document,
    page_left: f64,
    page_top: f64,
    blocks: Vec<Block>,
    ts: TextState,
    builder: Option<BlockBuilder>,
}

impl<'a> PageWalk<'a> {
    fn run(
        &mut self,
        operations: &[Operation],
        resources: &Resources<'a>,
        mut ctm: Matrix,
        depth: usize,
    ) -> std::result::Result<(), lopdf::Error> {
        let doc = self.doc;
        let mut ctm_stack: Vec<Matrix> = Vec::new();

        for op in operations {
            let operands = &op.operands;
            let ts = &mut self.ts;
            match op.operator.as_str() {
                "q" => ctm_stack.push(ctm),
                "Q" => ctm = ctm_stack.pop().unwrap_or(ctm),
                "cm" => {
                    if let Some(v) = numbers(operands, 6) {
                        ctm = multiply(&[v[0], v[1], v[2], v[3], v[4], v[5]], &ctm);
                    }
                }
                "Do" => {
                    let Some(name) = operands.first().and_then(|o| o.as_name().ok()) else { continue };
                    let Some(stream) = resources.xobjects.get(name).copied() else { continue };
                    match xobject_subtype(stream) {
                        Some(b"Form") if depth < MAX_FORM_DEPTH => {
                            let matrix = stream
                                .dict
                                .get(b"Matrix")
                                .ok()
                                .and_then(|o| o.as_array().ok())
                                .and_then(|a| numbers(a, 6))
                                .map(|v| [v[0], v[1], v[2], v[3], v[4], v[5]])
                                .unwrap_or(IDENTITY);
                            let data = stream.decompressed_content().unwrap_or_else(|_| stream.content.clone());
                            let form = Content::decode(&data)?;
                            let form_resources = resources.for_form(doc, stream);
                            self.run(&form.operations, &form_resources, multiply(&matrix, &ctm), depth + 1)?;
                        }
                        Some(b"Image") => self.blocks.push(Block { kind: BlockKind::Image, lines: Vec::new() }),
                        _ => {}
                    }
                }
                "BT" => {
                    ts.tm = IDENTITY;
                    ts.tlm = IDENTITY;
                    self.builder = Some(BlockBuilder::new(self.page_left, self.page_top));
                }
                "ET" => {
                    if let Some(block) = self.builder.take().and_then(BlockBuilder::finish) {
                        self.blocks.push(block);
                    }
                }
                "Tf" => {
                    if let Some(name) = operands.first().and_then(|o| o.as_name().ok()) {
                        ts.font_key = name.to_vec();
                    }
                    if let Some(size) = operands.get(1).and_then(get_number) {
                        ts.font_size = size;
                    }
                }
                "TL" => {
                    if let Some(v) = numbers(operands, 1) {
                        ts.leading = v[0];
                    }
                }
                "Tc" => {
                    if let Some(v) = numbers(operands, 1) {
                        ts.char_spacing = v[0];
                    }
                }
                "Tw" => {
                    if let Some(v) = numbers(operands, 1) {
                        ts.word_spacing = v[0];
                    }
                }
                "Td" => {
                    if let Some(v) = numbers(operands, 2) {
                        ts.translate_line(v[0], v[1]);
                    }
                }
                "TD" => {
                    if let Some(v) = numbers(operands, 2) {
                        ts.leading = -v[1];
                        ts.translate_line(v[0], v[1]);
                    }
                }
                "Tm" => {
                    if let Some(v) = numbers(operands, 6) {
                        ts.tlm = [v[0], v[1], v[2], v[3], v[4], v[5]];
                        ts.tm = ts.tlm;
                    }
                }
                "T*" => ts.next_line(),
                "Tj" | "'" | "\"" => {
                    if op.operator == "\"" {
                        if let Some(v) = numbers(operands, 2) {
                            ts.word_spacing = v[0];
                            ts.char_spacing = v[1];
                        }
                    }
                    if op.operator != "Tj" {
                        ts.next_line();
                    }
                    let string = if op.operator == "\"" { operands.get(2) } else { operands.first() };
                    if let (Some(Object::String(bytes, _)), Some(b)) = (string, self.builder.as_mut()) {
                        show_text(doc, &resources.fonts, ts, &ctm, b, &[bytes.as_slice()], &[]);
                    }
                }
                "TJ" => {
                    let Some(b) = self.builder.as_mut() else { continue };
                    let Some(array) = operands.first().and_then(|o| o.as_array().ok()) else { continue };
                    let mut strings: Vec<&[u8]> = Vec::new();
                    let mut kerns: Vec<(usize, f64)> = Vec::new();
                    for item in array {
                        match item {
                            Object::String(bytes, _) => strings.push(bytes.as_slice()),
                            other => {
                                if let Some(k) = get_number(other) {
                                    kerns.push((strings.len(), k));
                                }
                            }
                        }
                    }
                    show_text(doc, &resources.fonts, ts, &ctm, b, &strings, &kerns);
                }
                _ => {}
            }
        }
        Ok(())
    }
}

/// Emit the strings of one show-text operator as a span fragment and advance
/// the text matrix. `kerns` holds `(index, adjustment)` pairs from a `TJ` array,
/// applied before the string at `index`.
fn show_text(
    doc: &Document,
    fonts: &BTreeMap<Vec<u8>, FontInfo>,
    ts: &mut TextState,
    ctm: &Matrix,
    builder: &mut BlockBuilder,
    strings: &[&[u8]],
    kerns: &[(usize, f64)],
) {
    let font = fonts.get(&ts.font_key);
    let font_name = font
        .map(|f| f.name.clone())
        .unwrap_or_else(|| String::from_utf8_lossy(&ts.font_key).to_string());

    let trm = multiply(&ts.tm, ctm);
    let start = apply(&trm, 0.0, 0.0);
    // Vertical scale of the rendering matrix gives the rendered font size
    let size = ts.font_size * (trm[2] * trm[2] + trm[3] * trm[3]).sqrt();

    let mut text = String::new();
    for (i, bytes) in strings.iter().enumerate() {
        for (_, k) in kerns.iter().filter(|(idx, _)| *idx == i) {
            ts.advance(-k / 1000.0 * ts.font_size);
        }
        let decoded = decode_string(doc, font, bytes);
        let em = font
            .map(|f| f.advance(bytes, &decoded))
            .unwrap_or(decoded.chars().count() as f64 * DEFAULT_GLYPH_WIDTH);
        let spaces = decoded.chars().filter(|c| *c == ' ').count() as f64;
        let glyphs = decoded.chars().count() as f64;
        ts.advance(em * ts.font_size + glyphs * ts.char_spacing + spaces * ts.word_spacing);
        text.push_str(&decoded);
    }
    for (_, k) in kerns.iter().filter(|(idx, _)| *idx >= strings.len()) {
        ts.advance(-k / 1000.0 * ts.font_size);
    }

    let end = apply(&multiply(&ts.tm, ctm), 0.0, 0.0);
    if text.is_empty() {
        return;
    }
    builder.push(text, &font_name, size, start, end);
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;

    /// Build a one-page PDF whose content stream is `operations`.
    /// F1 is Helvetica-Bold, F2 is Times-Roman.
    fn build_pdf(operations: Vec<Operation>) -> Document {
        build_pdf_with_xobjects(operations, Vec::new())
    }

    /// Like `build_pdf`, with named XObjects in the page resources.
    fn build_pdf_with_xobjects(operations: Vec<Operation>, xobjects: Vec<(&str, Stream)>) -> Document {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let bold_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "ABCDEF+Helvetica-Bold",
        });
        let roman_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Times-Roman",
        });
        let mut xobject_dict = Dictionary::new();
        for (name, stream) in xobjects {
            let id = doc.add_object(stream);
            xobject_dict.set(name, id);
        }
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! {
                "F1" => bold_id,
                "F2" => roman_id,
            },
            "XObject" => xobject_dict,
        });
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 600.into(), 800.into()],
        });
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        };
        doc.objects.insert(pages_id, Object::Dictionary(pages));
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc
    }

    fn show(font: &str, size: i64, x: i64, y: i64, text: &str) -> Vec<Operation> {
        vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![Object::Name(font.as_bytes().to_vec()), size.into()]),
            Operation::new("Td", vec![x.into(), y.into()]),
            Operation::new("Tj", vec![Object::string_literal(text)]),
            Operation::new("ET", vec![]),
        ]
    }

    #[test]
    fn test_extracts_spans_with_fonts_and_positions() {
        let mut ops = show("F1", 24, 100, 700, "Heading");
        ops.extend(show("F2", 11, 72, 650, "Body text"));
        let layout = extract_document(&build_pdf(ops)).unwrap();

        assert_eq!(layout.pages.len(), 1);
        let page = &layout.pages[0];
        assert_eq!(page.number, 1);
        assert!((page.width - 600.0).abs() < 1e-9);
        assert_eq!(page.blocks.len(), 2);

        let heading = &page.blocks[0].lines[0].spans[0];
        assert_eq!(heading.text, "Heading");
        assert_eq!(heading.font, "Helvetica-Bold");
        assert!((heading.size - 24.0).abs() < 1e-9);
        assert!((heading.bbox.x0 - 100.0).abs() < 1e-9);
        // Baseline at 800 - 700 = 100, top = 100 - 0.8 * 24
        assert!((heading.bbox.y0 - 80.8).abs() < 1e-9);
        assert!(heading.bbox.x1 > heading.bbox.x0);

        let body = &page.blocks[1].lines[0].spans[0];
        assert_eq!(body.text, "Body text");
        assert_eq!(body.font, "Times-Roman");
        assert!(body.bbox.y0 > heading.bbox.y0);
    }

    #[test]
    fn test_baseline_change_starts_new_line() {
        let ops = vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![Object::Name(b"F2".to_vec()), 10.into()]),
            Operation::new("TL", vec![14.into()]),
            Operation::new("Td", vec![72.into(), 700.into()]),
            Operation::new("Tj", vec![Object::string_literal("first")]),
            Operation::new("T*", vec![]),
            Operation::new("Tj", vec![Object::string_literal("second")]),
            Operation::new("ET", vec![]),
        ];
        let layout = extract_document(&build_pdf(ops)).unwrap();
        let block = &layout.pages[0].blocks[0];
        assert_eq!(block.lines.len(), 2);
        assert_eq!(block.lines[0].text(), "first");
        assert_eq!(block.lines[1].text(), "second");
        let gap = block.lines[1].bbox().unwrap().y0 - block.lines[0].bbox().unwrap().y0;
        assert!((gap - 14.0).abs() < 1e-9);
    }

    #[test]
    fn test_font_change_starts_new_span_on_same_line() {
        let ops = vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![Object::Name(b"F1".to_vec()), 12.into()]),
            Operation::new("Td", vec![72.into(), 700.into()]),
            Operation::new("Tj", vec![Object::string_literal("Note:")]),
            Operation::new("Tf", vec![Object::Name(b"F2".to_vec()), 12.into()]),
            Operation::new("Tj", vec![Object::string_literal(" details")]),
            Operation::new("ET", vec![]),
        ];
        let layout = extract_document(&build_pdf(ops)).unwrap();
        let line = &layout.pages[0].blocks[0].lines[0];
        assert_eq!(line.spans.len(), 2);
        assert_eq!(line.spans[0].font, "Helvetica-Bold");
        assert_eq!(line.spans[1].font, "Times-Roman");
        assert!(line.spans[1].bbox.x0 >= line.spans[0].bbox.x1 - 1e-9);
    }

    #[test]
    fn test_text_inside_form_xobject_is_extracted() {
        let form_ops = vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![Object::Name(b"F1".to_vec()), 18.into()]),
            Operation::new("Td", vec![100.into(), 700.into()]),
            Operation::new("Tj", vec![Object::string_literal("Wrapped Title")]),
            Operation::new("ET", vec![]),
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![Object::Name(b"F9".to_vec()), 10.into()]),
            Operation::new("Td", vec![100.into(), 650.into()]),
            Operation::new("Tj", vec![Object::string_literal("form font")]),
            Operation::new("ET", vec![]),
        ];
        let form = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Form",
                "BBox" => vec![0.into(), 0.into(), 600.into(), 800.into()],
                "Matrix" => vec![1.into(), 0.into(), 0.into(), 1.into(), 0.into(), (-100).into()],
                "Resources" => dictionary! {
                    "Font" => dictionary! {
                        "F9" => dictionary! {
                            "Type" => "Font",
                            "Subtype" => "Type1",
                            "BaseFont" => "Courier",
                        },
                    },
                },
            },
            Content { operations: form_ops }.encode().unwrap(),
        );
        let image = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => 1,
                "Height" => 1,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
            },
            vec![0],
        );
        let ops = vec![
            Operation::new("q", vec![]),
            Operation::new("cm", vec![1.into(), 0.into(), 0.into(), 1.into(), 50.into(), 0.into()]),
            Operation::new("Do", vec![Object::Name(b"Fm1".to_vec())]),
            Operation::new("Q", vec![]),
            Operation::new("Do", vec![Object::Name(b"Im1".to_vec())]),
        ];
        let doc = build_pdf_with_xobjects(ops, vec![("Fm1", form), ("Im1", image)]);
        let page = &extract_document(&doc).unwrap().pages[0];

        assert_eq!(page.blocks.len(), 3);
        let title = &page.blocks[0].lines[0].spans[0];
        assert_eq!(title.text, "Wrapped Title");
        assert_eq!(title.font, "Helvetica-Bold");
        // Form matrix moves down 100, page cm moves right 50: origin (150, 600)
        assert!((title.bbox.x0 - 150.0).abs() < 1e-9);
        assert!((title.bbox.y0 - (200.0 - 0.8 * 18.0)).abs() < 1e-9);

        let local = &page.blocks[1].lines[0].spans[0];
        assert_eq!(local.text, "form font");
        assert_eq!(local.font, "Courier");

        assert_eq!(page.blocks[2].kind, BlockKind::Image);
    }

    #[test]
    fn test_strip_subset_prefix() {
        assert_eq!(strip_subset_prefix("ABCDEF+Arial-BoldMT"), "Arial-BoldMT");
        assert_eq!(strip_subset_prefix("Arial+Bold"), "Arial+Bold");
        assert_eq!(strip_subset_prefix("Helvetica"), "Helvetica");
    }

    #[test]
    fn test_matrix_multiply_applies_left_first() {
        let scale = [2.0, 0.0, 0.0, 2.0, 0.0, 0.0];
        let shift = [1.0, 0.0, 0.0, 1.0, 10.0, 5.0];
        let m = multiply(&scale, &shift);
        assert_eq!(apply(&m, 1.0, 1.0), (12.0, 7.0));
    }
}
