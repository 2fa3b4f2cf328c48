//! Document-wide statistics: font-size header threshold, body font size and
//! the typical line gap.
//!
//! Every statistic is a frequency mode where ties go to the smallest value,
//! never to encounter order.

use std::collections::BTreeMap;

use serde::Serialize;

use super::features::{DocumentFeatures, EnrichedLine, PageGaps};
use crate::layout::DocumentLayout;
use crate::utils::round_even;

/// Values with their counts, most frequent first, ties by ascending value.
pub fn ranked_frequencies<I>(values: I) -> Vec<(i64, usize)>
where
    I: IntoIterator<Item = i64>,
{
    let mut counts: BTreeMap<i64, usize> = BTreeMap::new();
    for v in values {
        *counts.entry(v).or_insert(0) += 1;
    }
    let mut ranked: Vec<(i64, usize)> = counts.into_iter().collect();
    // BTreeMap yields ascending values; a stable sort on count keeps that order for ties
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked
}

/// Most frequent value, smallest value winning ties. `None` for no values.
pub fn mode<I>(values: I) -> Option<i64>
where
    I: IntoIterator<Item = i64>,
{
    ranked_frequencies(values).first().map(|(v, _)| *v)
}

/// Header threshold from the two most frequent sizes and their counts.
///
/// When the runner-up occurs about half as often as the most frequent size,
/// both are treated as body text and the threshold sits above the larger one.
pub fn threshold_from_frequencies(size1: i64, count1: usize, size2: i64, count2: usize) -> i64 {
    if (count2 as f64 - count1 as f64 / 2.0).abs() <= 1.0 {
        size1.max(size2) + 1
    } else {
        size1 + 1
    }
}

/// Font-size threshold over every span of the document.
pub fn font_size_threshold(layout: &DocumentLayout) -> i64 {
    let sizes = layout
        .pages
        .iter()
        .flat_map(|p| p.spans())
        .map(|s| round_even(s.size));
    let ranked = ranked_frequencies(sizes);

    let (size1, count1) = ranked.first().copied().unwrap_or((0, 0));
    let (size2, count2) = ranked.get(1).copied().unwrap_or((0, 0));
    threshold_from_frequencies(size1, count1, size2, count2)
}

/// Most frequent font size among non-table lines.
pub fn body_font_size(lines: &[EnrichedLine]) -> Option<i64> {
    mode(lines.iter().map(|l| l.font_size))
}

/// Mode of the per-page gap modes, each page contributing one value per
/// direction.
pub fn global_line_gap(pages: &[PageGaps]) -> Option<i64> {
    let per_page = pages.iter().flat_map(|p| {
        [mode(p.above.iter().copied()), mode(p.below.iter().copied())]
    });
    mode(per_page.flatten())
}

/// The statistics the heading selector works from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DocumentThresholds {
    /// Lines at or above this rounded size are headers
    pub font_size_threshold: i64,
    /// Most frequent rounded size of non-table lines
    pub body_size: Option<i64>,
    /// Most frequent vertical gap between lines
    pub line_gap: Option<i64>,
}

impl DocumentThresholds {
    pub fn new(font_size_threshold: i64, features: &DocumentFeatures) -> Self {
        Self {
            font_size_threshold,
            body_size: body_font_size(&features.lines),
            line_gap: global_line_gap(&features.page_gaps),
        }
    }
}
