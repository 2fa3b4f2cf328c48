//! Heading candidate selection.
//!
//! A line is promoted either by size ("header": at or above the font-size
//! threshold, tables included) or by styling ("styled": bold, not smaller than
//! body text, and either set apart from the line above or indented relative to
//! the next line). Candidates are keyed by (page, line_no); the header route
//! wins when both apply.

use std::collections::HashSet;

use serde::Serialize;

use super::features::{Alignment, DocumentFeatures, EnrichedLine, FontStyle};
use super::thresholds::DocumentThresholds;
use crate::utils::{round_even, safe_truncate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CandidateSource {
    Header,
    Styled,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    pub page: u32,
    pub line_no: usize,
    pub text: String,
    pub font_size: i64,
    /// Only styled candidates carry alignment and style
    pub alignment: Option<Alignment>,
    pub style: Option<FontStyle>,
    pub source: CandidateSource,
}

impl Candidate {
    pub fn key(&self) -> (u32, usize) {
        (self.page, self.line_no)
    }
}

/// Promote header lines first, then styled lines not already claimed.
pub fn select_candidates(features: &DocumentFeatures, thresholds: &DocumentThresholds) -> Vec<Candidate> {
    let mut claimed: HashSet<(u32, usize)> = HashSet::new();
    let mut candidates = Vec::new();

    for line in &features.header_lines {
        if !claimed.insert((line.page, line.line_no)) {
            continue;
        }
        candidates.push(Candidate {
            page: line.page,
            line_no: line.line_no,
            text: line.text.clone(),
            font_size: line.font_size,
            alignment: None,
            style: None,
            source: CandidateSource::Header,
        });
    }

    for (i, line) in features.lines.iter().enumerate() {
        if claimed.contains(&(line.page, line.line_no)) {
            continue;
        }
        let next = features.lines.get(i + 1);
        if !is_styled_heading(line, next, thresholds) {
            continue;
        }
        tracing::debug!(page = line.page, line_no = line.line_no, "Styled heading: {}", safe_truncate(&line.text, 60));
        claimed.insert((line.page, line.line_no));
        candidates.push(Candidate {
            page: line.page,
            line_no: line.line_no,
            text: line.text.clone(),
            font_size: line.font_size,
            alignment: Some(line.alignment),
            style: Some(line.style),
            source: CandidateSource::Styled,
        });
    }

    candidates
}

/// Styled-route test for one non-table line. `next` is the following line in
/// extraction order, which may sit on the next page.
pub fn is_styled_heading(line: &EnrichedLine, next: Option<&EnrichedLine>, thresholds: &DocumentThresholds) -> bool {
    if line.alignment == Alignment::Unknown || !line.style.is_bold() {
        return false;
    }

    let Some(body_size) = thresholds.body_size else { return false };
    if line.font_size + 1 < body_size {
        return false;
    }

    let lonely = match (line.above_distance, thresholds.line_gap) {
        (None, _) => true,
        (Some(above), Some(gap)) => round_even(above) > gap,
        (Some(_), None) => false,
    };

    let indented = next
        .map(|n| round_even(line.left_distance) > round_even(n.left_distance))
        .unwrap_or(false);

    lonely || indented
}
