//! Ruled table detection using lopdf
//!
//! Tables are found from vector graphics alone: stroked or filled path
//! segments are reduced to horizontal and vertical edges, touching edges are
//! grouped, and a group whose rules form more than one cell is reported as one
//! table region. A plain rectangle (page border, callout box, framed title)
//! encloses a single cell and is not a table.

use std::path::Path;

use lopdf::content::Content;
use lopdf::{Document, ObjectId};

use super::pdf::{apply, media_box, multiply, numbers, Matrix, IDENTITY};
use super::{BBox, TableDetector};
use crate::error::{Error, Result};

/// Shorter segments are ignored (underline ticks, bullets)
const MIN_EDGE_LENGTH: f64 = 3.0;
/// Maximum deviation for a segment to count as axis-aligned
const AXIS_TOLERANCE: f64 = 1.0;
/// Distance at which two edges are considered touching
const SNAP_TOLERANCE: f64 = 3.0;
const MIN_EDGES_PER_AXIS: usize = 2;

/// Table detection backed by lopdf path operators.
#[derive(Debug, Clone, Copy, Default)]
pub struct RulingTableDetector;

impl TableDetector for RulingTableDetector {
    fn detect_tables(&self, path: &Path) -> Result<Vec<Vec<BBox>>> {
        let doc = Document::load(path).map_err(|e| Error::pdf(path, e))?;
        detect_document_tables(&doc).map_err(|e| Error::pdf(path, e))
    }
}

/// Table regions for every page of a loaded document, in page order.
pub fn detect_document_tables(doc: &Document) -> std::result::Result<Vec<Vec<BBox>>, lopdf::Error> {
    doc.get_pages()
        .into_values()
        .map(|page_id| page_edges(doc, page_id).map(|edges| group_tables(&edges)))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Orientation {
    Horizontal,
    Vertical,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Edge {
    orientation: Orientation,
    bbox: BBox,
}

impl Edge {
    /// Classify a segment given in top-left page coordinates.
    fn from_segment(a: (f64, f64), b: (f64, f64)) -> Option<Edge> {
        let bbox = BBox::new(a.0.min(b.0), a.1.min(b.1), a.0.max(b.0), a.1.max(b.1));
        let width = bbox.x1 - bbox.x0;
        let height = bbox.y1 - bbox.y0;
        if height <= AXIS_TOLERANCE && width >= MIN_EDGE_LENGTH {
            Some(Edge { orientation: Orientation::Horizontal, bbox })
        } else if width <= AXIS_TOLERANCE && height >= MIN_EDGE_LENGTH {
            Some(Edge { orientation: Orientation::Vertical, bbox })
        } else {
            None
        }
    }

    fn touches(&self, other: &Edge) -> bool {
        self.bbox.x0 - SNAP_TOLERANCE <= other.bbox.x1
            && other.bbox.x0 - SNAP_TOLERANCE <= self.bbox.x1
            && self.bbox.y0 - SNAP_TOLERANCE <= other.bbox.y1
            && other.bbox.y0 - SNAP_TOLERANCE <= self.bbox.y1
    }
}

/// Collect the painted axis-aligned edges of one page.
fn page_edges(doc: &Document, page_id: ObjectId) -> std::result::Result<Vec<Edge>, lopdf::Error> {
    let mb = media_box(doc, page_id);
    let to_page = |ctm: &Matrix, x: f64, y: f64| {
        let (px, py) = apply(ctm, x, y);
        (px - mb[0], mb[3] - py)
    };

    let content = Content::decode(&doc.get_page_content(page_id)?)?;

    let mut ctm = IDENTITY;
    let mut ctm_stack: Vec<Matrix> = Vec::new();
    let mut pending: Vec<((f64, f64), (f64, f64))> = Vec::new();
    let mut subpath_start: Option<(f64, f64)> = None;
    let mut cursor: Option<(f64, f64)> = None;
    let mut edges = Vec::new();

    for op in &content.operations {
        let operands = &op.operands;
        match op.operator.as_str() {
            "q" => ctm_stack.push(ctm),
            "Q" => ctm = ctm_stack.pop().unwrap_or(IDENTITY),
            "cm" => {
                if let Some(v) = numbers(operands, 6) {
                    ctm = multiply(&[v[0], v[1], v[2], v[3], v[4], v[5]], &ctm);
                }
            }
            "m" => {
                if let Some(v) = numbers(operands, 2) {
                    let p = to_page(&ctm, v[0], v[1]);
                    subpath_start = Some(p);
                    cursor = Some(p);
                }
            }
            "l" => {
                if let Some(v) = numbers(operands, 2) {
                    let p = to_page(&ctm, v[0], v[1]);
                    if let Some(from) = cursor {
                        pending.push((from, p));
                    }
                    cursor = Some(p);
                }
            }
            "h" => {
                if let (Some(from), Some(start)) = (cursor, subpath_start) {
                    pending.push((from, start));
                    cursor = Some(start);
                }
            }
            "re" => {
                if let Some(v) = numbers(operands, 4) {
                    let (x, y, w, h) = (v[0], v[1], v[2], v[3]);
                    let corners = [
                        to_page(&ctm, x, y),
                        to_page(&ctm, x + w, y),
                        to_page(&ctm, x + w, y + h),
                        to_page(&ctm, x, y + h),
                    ];
                    let outline = BBox::new(
                        corners.iter().map(|c| c.0).fold(f64::INFINITY, f64::min),
                        corners.iter().map(|c| c.1).fold(f64::INFINITY, f64::min),
                        corners.iter().map(|c| c.0).fold(f64::NEG_INFINITY, f64::max),
                        corners.iter().map(|c| c.1).fold(f64::NEG_INFINITY, f64::max),
                    );
                    // Thin filled rectangles are how many producers draw rules
                    if outline.y1 - outline.y0 <= AXIS_TOLERANCE * 2.0 {
                        let y = outline.center_y();
                        pending.push(((outline.x0, y), (outline.x1, y)));
                    } else if outline.x1 - outline.x0 <= AXIS_TOLERANCE * 2.0 {
                        let x = outline.center_x();
                        pending.push(((x, outline.y0), (x, outline.y1)));
                    } else {
                        for i in 0..4 {
                            pending.push((corners[i], corners[(i + 1) % 4]));
                        }
                    }
                    subpath_start = Some(corners[0]);
                    cursor = Some(corners[0]);
                }
            }
            "S" | "s" | "f" | "F" | "f*" | "B" | "B*" | "b" | "b*" => {
                edges.extend(pending.drain(..).filter_map(|(a, b)| Edge::from_segment(a, b)));
                subpath_start = None;
                cursor = None;
            }
            "n" => {
                pending.clear();
                subpath_start = None;
                cursor = None;
            }
            _ => {}
        }
    }

    Ok(edges)
}

/// Group touching edges and keep the groups that form a grid.
fn group_tables(edges: &[Edge]) -> Vec<BBox> {
    // Union-find over edge indices
    let mut parent: Vec<usize> = (0..edges.len()).collect();
    fn find(parent: &mut [usize], mut i: usize) -> usize {
        while parent[i] != i {
            parent[i] = parent[parent[i]];
            i = parent[i];
        }
        i
    }

    for i in 0..edges.len() {
        for j in (i + 1)..edges.len() {
            if edges[i].touches(&edges[j]) {
                let (a, b) = (find(&mut parent, i), find(&mut parent, j));
                if a != b {
                    parent[b] = a;
                }
            }
        }
    }

    // (root, member indices), in first-seen order
    let mut groups: Vec<(usize, Vec<usize>)> = Vec::new();
    for i in 0..edges.len() {
        let root = find(&mut parent, i);
        match groups.iter_mut().find(|g| g.0 == root) {
            Some(group) => group.1.push(i),
            None => groups.push((root, vec![i])),
        }
    }

    groups
        .into_iter()
        .filter_map(|(_, members)| {
            let group: Vec<&Edge> = members.iter().map(|&i| &edges[i]).collect();
            let rows = distinct_positions(&group, Orientation::Horizontal);
            let columns = distinct_positions(&group, Orientation::Vertical);
            // A lone frame (page border, callout box) is a single cell, not a table
            let is_grid = rows >= MIN_EDGES_PER_AXIS
                && columns >= MIN_EDGES_PER_AXIS
                && (rows > MIN_EDGES_PER_AXIS || columns > MIN_EDGES_PER_AXIS);
            if !is_grid {
                return None;
            }
            group.iter().map(|e| e.bbox).reduce(|a, b| a.union(&b))
        })
        .collect()
}

/// Number of distinct rule positions along one axis; rules closer than the
/// snap tolerance count once.
fn distinct_positions(group: &[&Edge], orientation: Orientation) -> usize {
    let mut positions: Vec<f64> = group
        .iter()
        .filter(|e| e.orientation == orientation)
        .map(|e| match orientation {
            Orientation::Horizontal => e.bbox.center_y(),
            Orientation::Vertical => e.bbox.center_x(),
        })
        .collect();
    positions.sort_by(|a, b| a.total_cmp(b));
    positions.dedup_by(|b, a| (*b - *a).abs() <= SNAP_TOLERANCE);
    positions.len()
}
