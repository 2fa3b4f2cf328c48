//! Heading detection from raw page layout
//!
//! Four stages, all pure functions over one document:
//! 1. `thresholds::font_size_threshold` over every span
//! 2. `features::extract_features` (header lines flagged before table exclusion)
//! 3. `selector::select_candidates` (header route, then styled route)
//! 4. `merger::merge_candidates`
//!
//! Outline metadata (bookmarks) is never consulted.

pub mod features;
pub mod merger;
pub mod selector;
pub mod thresholds;

use serde::Serialize;

use crate::layout::{BBox, DocumentLayout};

pub use features::{Alignment, EnrichedLine, FontStyle};
pub use merger::{heading_levels, MergedHeading};
pub use selector::{Candidate, CandidateSource};
pub use thresholds::DocumentThresholds;

/// Everything heading detection derived for one document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentHeadings {
    pub thresholds: DocumentThresholds,
    pub candidates: Vec<Candidate>,
    pub merged: Vec<MergedHeading>,
}

/// Run the heading stages over one document's layout and table boxes.
pub fn detect_headings(layout: &DocumentLayout, tables: &[Vec<BBox>]) -> DocumentHeadings {
    let font_size_threshold = thresholds::font_size_threshold(layout);
    let features = features::extract_features(layout, tables, font_size_threshold);
    let thresholds = DocumentThresholds::new(font_size_threshold, &features);

    tracing::debug!(
        font_size_threshold,
        body_size = ?thresholds.body_size,
        line_gap = ?thresholds.line_gap,
        "Document thresholds"
    );

    let candidates = selector::select_candidates(&features, &thresholds);
    let merged = merger::merge_candidates(candidates.clone());

    DocumentHeadings { thresholds, candidates, merged }
}
