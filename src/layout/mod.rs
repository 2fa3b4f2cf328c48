//! Page layout model and the PDF collaborators that produce it
//!
//! Coordinates are page-relative with the origin at the top-left corner,
//! y growing downwards:
//! - `pdf` decodes content streams into blocks, lines and spans
//! - `tables` finds ruled table regions from stroked and filled paths

pub mod pdf;
pub mod tables;

use std::path::Path;

use crate::error::Result;

pub use pdf::PdfLayoutExtractor;
pub use tables::RulingTableDetector;

/// Axis-aligned rectangle `(x0, y0)`-`(x1, y1)` in layout units.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BBox {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl BBox {
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn union(&self, other: &BBox) -> BBox {
        BBox {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    /// Non-empty intersection; boxes that only share an edge do not overlap.
    pub fn intersects(&self, other: &BBox) -> bool {
        self.x1 > other.x0 && self.x0 < other.x1 && self.y1 > other.y0 && self.y0 < other.y1
    }

    pub fn center_x(&self) -> f64 {
        (self.x0 + self.x1) / 2.0
    }

    pub fn center_y(&self) -> f64 {
        (self.y0 + self.y1) / 2.0
    }
}

/// A run of text in a single font and size.
#[derive(Debug, Clone, PartialEq)]
pub struct Span {
    pub text: String,
    pub bbox: BBox,
    /// Font name as embedded in the document, e.g. "Arial-BoldMT"
    pub font: String,
    pub size: f64,
}

/// Spans sharing one visual line.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawLine {
    pub spans: Vec<Span>,
}

impl RawLine {
    pub fn new(spans: Vec<Span>) -> Self {
        Self { spans }
    }

    /// Union of the span boxes, `None` for a line without spans.
    pub fn bbox(&self) -> Option<BBox> {
        let mut spans = self.spans.iter();
        let first = spans.next()?.bbox;
        Some(spans.fold(first, |acc, span| acc.union(&span.bbox)))
    }

    /// Span texts joined with a single space, trimmed.
    pub fn text(&self) -> String {
        self.spans
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
            .trim()
            .to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Text,
    Image,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub kind: BlockKind,
    pub lines: Vec<RawLine>,
}

impl Block {
    pub fn text(lines: Vec<RawLine>) -> Self {
        Self { kind: BlockKind::Text, lines }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageLayout {
    /// 1-based page number
    pub number: u32,
    pub width: f64,
    pub height: f64,
    /// Blocks in extraction order
    pub blocks: Vec<Block>,
}

impl PageLayout {
    /// Every span on the page, text blocks or not.
    pub fn spans(&self) -> impl Iterator<Item = &Span> {
        self.blocks
            .iter()
            .flat_map(|b| b.lines.iter())
            .flat_map(|l| l.spans.iter())
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DocumentLayout {
    pub pages: Vec<PageLayout>,
}

/// Produces per-page blocks/lines/spans for a document on disk.
pub trait LayoutSource {
    fn extract_layout(&self, path: &Path) -> Result<DocumentLayout>;
}

/// Produces per-page table regions for a document on disk.
///
/// The outer vector is indexed by zero-based page position; pages past its
/// end have no tables.
pub trait TableDetector {
    fn detect_tables(&self, path: &Path) -> Result<Vec<Vec<BBox>>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(text: &str, x0: f64, y0: f64, x1: f64, y1: f64) -> Span {
        Span {
            text: text.to_string(),
            bbox: BBox::new(x0, y0, x1, y1),
            font: "Helvetica".to_string(),
            size: 11.0,
        }
    }

    #[test]
    fn test_line_bbox_is_union_of_spans() {
        let line = RawLine::new(vec![
            span("Hello", 72.0, 100.0, 110.0, 112.0),
            span("world", 112.0, 98.0, 150.0, 111.0),
        ]);
        assert_eq!(line.bbox(), Some(BBox::new(72.0, 98.0, 150.0, 112.0)));
        assert_eq!(line.text(), "Hello world");
    }

    #[test]
    fn test_empty_line_has_no_bbox() {
        assert_eq!(RawLine::default().bbox(), None);
        assert_eq!(RawLine::default().text(), "");
    }

    #[test]
    fn test_touching_boxes_do_not_intersect() {
        let a = BBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BBox::new(10.0, 0.0, 20.0, 10.0);
        let c = BBox::new(9.0, 9.0, 20.0, 20.0);
        assert!(!a.intersects(&b));
        assert!(a.intersects(&c));
    }
}
