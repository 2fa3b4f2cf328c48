//! Per-line layout features: alignment, font style, vertical spacing and
//! table membership.

use serde::Serialize;

use crate::layout::{BBox, BlockKind, DocumentLayout, PageLayout, RawLine};
use crate::utils::{round2, round_even};

/// Tolerance around page edges and centre, in layout units
pub const ALIGNMENT_MARGIN: f64 = 20.0;
/// A line whose centre sits left of this page fraction counts as "left-centered"
const LEFT_CENTERED_LIMIT: f64 = 0.55;

const BOLD_KEYWORDS: &[&str] = &["bold", "bolder", "semibold", "extrabold", "boldmt", "demibold", "black"];
const ITALIC_KEYWORDS: &[&str] = &["italic", "oblique", "it", "slanted"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Alignment {
    Left,
    Right,
    Center,
    LeftCentered,
    Unknown,
}

impl Alignment {
    /// Classify a horizontal extent against the page width.
    pub fn classify(x0: f64, x1: f64, page_width: f64) -> Self {
        let center = (x0 + x1) / 2.0;
        if x0.abs() <= ALIGNMENT_MARGIN {
            Alignment::Left
        } else if (page_width - x1).abs() <= ALIGNMENT_MARGIN {
            Alignment::Right
        } else if (center - page_width / 2.0).abs() <= ALIGNMENT_MARGIN {
            Alignment::Center
        } else if x0 > ALIGNMENT_MARGIN && center < page_width * LEFT_CENTERED_LIMIT {
            Alignment::LeftCentered
        } else {
            Alignment::Unknown
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FontStyle {
    Normal,
    Bold,
    Italic,
    BoldItalic,
}

impl FontStyle {
    /// Infer the style from a font name such as "Arial-BoldItalicMT".
    pub fn from_font_name(font: &str) -> Self {
        let font = font.to_lowercase();
        let bold = BOLD_KEYWORDS.iter().any(|k| font.contains(k));
        let italic = ITALIC_KEYWORDS.iter().any(|k| font.contains(k));
        match (bold, italic) {
            (true, true) => FontStyle::BoldItalic,
            (true, false) => FontStyle::Bold,
            (false, true) => FontStyle::Italic,
            (false, false) => FontStyle::Normal,
        }
    }

    pub fn is_bold(&self) -> bool {
        matches!(self, FontStyle::Bold | FontStyle::BoldItalic)
    }
}

/// A text line outside any table, with the features the heading heuristics use.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedLine {
    /// 1-based page number
    pub page: u32,
    /// Zero-based index within the page, in extraction order
    pub line_no: usize,
    pub text: String,
    pub alignment: Alignment,
    /// Rounded size of the first span
    pub font_size: i64,
    pub style: FontStyle,
    /// Leftmost x, rounded to two decimals
    pub left_distance: f64,
    /// Distance to the vertically preceding line, rounded to two decimals
    pub above_distance: Option<f64>,
    /// Distance to the vertically following line, rounded to two decimals
    pub below_distance: Option<f64>,
}

/// Any text line, table or not, whose font size reached the header threshold.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeaderLine {
    pub page: u32,
    pub line_no: usize,
    pub text: String,
    pub font_size: i64,
    pub left_distance: f64,
}

/// Non-zero integer line gaps of one page.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PageGaps {
    pub above: Vec<i64>,
    pub below: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DocumentFeatures {
    /// Non-table lines, page by page in extraction order
    pub lines: Vec<EnrichedLine>,
    /// Lines at or above the header threshold, in extraction order
    pub header_lines: Vec<HeaderLine>,
    pub page_gaps: Vec<PageGaps>,
}

/// A line that survived table exclusion, waiting for its gap computation.
struct PendingLine {
    line_no: usize,
    text: String,
    alignment: Alignment,
    font_size: i64,
    style: FontStyle,
    left_x: f64,
    center_y: f64,
}

/// Enrich every text line of the document.
///
/// `tables` holds the table boxes per zero-based page position.
/// `header_threshold` is the font-size threshold for header lines; it is
/// checked before table exclusion.
pub fn extract_features(
    layout: &DocumentLayout,
    tables: &[Vec<BBox>],
    header_threshold: i64,
) -> DocumentFeatures {
    let mut features = DocumentFeatures::default();

    for (idx, page) in layout.pages.iter().enumerate() {
        let page_tables = tables.get(idx).map(Vec::as_slice).unwrap_or(&[]);
        let (lines, gaps) = extract_page(page, page_tables, header_threshold, &mut features.header_lines);
        features.lines.extend(lines);
        features.page_gaps.push(gaps);
    }

    tracing::debug!(
        lines = features.lines.len(),
        header_lines = features.header_lines.len(),
        "Extracted line features"
    );
    features
}

fn extract_page(
    page: &PageLayout,
    tables: &[BBox],
    header_threshold: i64,
    header_lines: &mut Vec<HeaderLine>,
) -> (Vec<EnrichedLine>, PageGaps) {
    let mut pending = Vec::new();
    let mut line_no = 0usize;

    let text_lines = page
        .blocks
        .iter()
        .filter(|b| b.kind == BlockKind::Text)
        .flat_map(|b| b.lines.iter());

    for line in text_lines {
        let Some((bbox, first)) = line.bbox().zip(line.spans.first()) else { continue };
        let text = line.text();
        if text.is_empty() {
            continue;
        }

        let font_size = round_even(first.size);
        if font_size >= header_threshold {
            header_lines.push(HeaderLine {
                page: page.number,
                line_no,
                text: text.clone(),
                font_size,
                left_distance: round2(bbox.x0),
            });
        }

        if !in_table(&bbox, tables) {
            pending.push(pending_line(line, bbox, line_no, text, page.width));
        }
        line_no += 1;
    }

    with_gaps(page.number, pending)
}

fn pending_line(line: &RawLine, bbox: BBox, line_no: usize, text: String, page_width: f64) -> PendingLine {
    let first = &line.spans[0];
    PendingLine {
        line_no,
        text,
        alignment: Alignment::classify(bbox.x0, bbox.x1, page_width),
        font_size: round_even(first.size),
        style: FontStyle::from_font_name(&first.font),
        left_x: bbox.x0,
        center_y: bbox.center_y(),
    }
}

fn in_table(bbox: &BBox, tables: &[BBox]) -> bool {
    tables.iter().any(|t| bbox.intersects(t))
}

/// Compute vertical gaps in top-to-bottom order and emit lines back in
/// extraction order.
fn with_gaps(page: u32, pending: Vec<PendingLine>) -> (Vec<EnrichedLine>, PageGaps) {
    let mut order: Vec<usize> = (0..pending.len()).collect();
    order.sort_by(|&a, &b| {
        pending[a]
            .center_y
            .partial_cmp(&pending[b].center_y)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut gaps = PageGaps::default();
    let mut above = vec![None; pending.len()];
    let mut below = vec![None; pending.len()];

    for (pos, &idx) in order.iter().enumerate() {
        let y = pending[idx].center_y;
        if pos > 0 {
            let dist = y - pending[order[pos - 1]].center_y;
            if round_even(dist) != 0 {
                gaps.above.push(round_even(dist));
            }
            above[idx] = nonzero(round2(dist));
        }
        if pos + 1 < order.len() {
            let dist = pending[order[pos + 1]].center_y - y;
            if round_even(dist) != 0 {
                gaps.below.push(round_even(dist));
            }
            below[idx] = nonzero(round2(dist));
        }
    }

    let lines = pending
        .into_iter()
        .enumerate()
        .map(|(idx, p)| EnrichedLine {
            page,
            line_no: p.line_no,
            text: p.text,
            alignment: p.alignment,
            font_size: p.font_size,
            style: p.style,
            left_distance: round2(p.left_x),
            above_distance: above[idx],
            below_distance: below[idx],
        })
        .collect();

    (lines, gaps)
}

fn nonzero(value: f64) -> Option<f64> {
    if value == 0.0 {
        None
    } else {
        Some(value)
    }
}
