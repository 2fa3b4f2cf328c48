//! Coalescing of consecutive candidate lines into heading blocks.

use serde::Serialize;

use super::features::{Alignment, FontStyle};
use super::selector::Candidate;

/// One or more consecutive candidates sharing size, alignment and style.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedHeading {
    pub page: u32,
    /// Line index of the last merged line
    pub line_no: usize,
    pub text: String,
    pub font_size: i64,
    pub alignment: Option<Alignment>,
    pub style: Option<FontStyle>,
}

impl MergedHeading {
    fn start(candidate: Candidate) -> Self {
        Self {
            page: candidate.page,
            line_no: candidate.line_no,
            text: candidate.text,
            font_size: candidate.font_size,
            alignment: candidate.alignment,
            style: candidate.style,
        }
    }

    fn continues_with(&self, next: &Candidate) -> bool {
        next.page == self.page
            && next.line_no == self.line_no + 1
            && next.font_size == self.font_size
            && next.alignment == self.alignment
            && next.style == self.style
    }
}

/// Sort candidates by (page, line_no) and merge runs greedily left to right.
pub fn merge_candidates(mut candidates: Vec<Candidate>) -> Vec<MergedHeading> {
    candidates.sort_by_key(Candidate::key);

    let mut merged: Vec<MergedHeading> = Vec::new();
    let mut current: Option<MergedHeading> = None;

    for candidate in candidates {
        match current.as_mut() {
            Some(group) if group.continues_with(&candidate) => {
                group.text.push(' ');
                group.text.push_str(&candidate.text);
                group.line_no = candidate.line_no;
            }
            _ => {
                if let Some(done) = current.take() {
                    merged.push(done);
                }
                current = Some(MergedHeading::start(candidate));
            }
        }
    }
    merged.extend(current);

    for heading in &mut merged {
        heading.text = heading.text.trim().to_string();
    }
    merged
}

/// Diagnostic outline level per font size: the largest size is "H1".
///
/// Returned largest size first. Nothing downstream ranks by level.
pub fn heading_levels(headings: &[MergedHeading]) -> Vec<(i64, String)> {
    let mut sizes: Vec<i64> = headings.iter().map(|h| h.font_size).collect();
    sizes.sort_unstable_by(|a, b| b.cmp(a));
    sizes.dedup();
    sizes
        .into_iter()
        .enumerate()
        .map(|(idx, size)| (size, format!("H{}", idx + 1)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headings::selector::CandidateSource;

    fn styled(page: u32, line_no: usize, text: &str, alignment: Alignment) -> Candidate {
        Candidate {
            page,
            line_no,
            text: text.to_string(),
            font_size: 14,
            alignment: Some(alignment),
            style: Some(FontStyle::Bold),
            source: CandidateSource::Styled,
        }
    }

    #[test]
    fn test_adjacent_matching_lines_merge() {
        let merged = merge_candidates(vec![
            styled(2, 4, "A", Alignment::Left),
            styled(2, 5, "B", Alignment::Left),
        ]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].text, "A B");
        assert_eq!(merged[0].line_no, 5);
        assert_eq!(merged[0].page, 2);
    }

    #[test]
    fn test_alignment_mismatch_does_not_merge() {
        let merged = merge_candidates(vec![
            styled(2, 4, "A", Alignment::Left),
            styled(2, 5, "B", Alignment::Center),
        ]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].text, "A");
        assert_eq!(merged[1].text, "B");
    }

    #[test]
    fn test_gap_and_page_break_split_groups() {
        let merged = merge_candidates(vec![
            styled(1, 9, "end of page", Alignment::Left),
            styled(2, 0, "next page", Alignment::Left),
            styled(2, 2, "skipped one", Alignment::Left),
        ]);
        assert_eq!(merged.len(), 3);
    }

    #[test]
    fn test_runs_chain_and_input_is_sorted_first() {
        let merged = merge_candidates(vec![
            styled(3, 2, "three", Alignment::Left),
            styled(3, 0, "one", Alignment::Left),
            styled(3, 1, "two", Alignment::Left),
            styled(3, 7, "alone", Alignment::Left),
        ]);
        let texts: Vec<&str> = merged.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["one two three", "alone"]);
        assert_eq!(merged[0].line_no, 2);
    }

    #[test]
    fn test_header_and_styled_lines_never_merge() {
        let header = Candidate {
            page: 2,
            line_no: 4,
            text: "Big".to_string(),
            font_size: 14,
            alignment: None,
            style: None,
            source: CandidateSource::Header,
        };
        let merged = merge_candidates(vec![header, styled(2, 5, "bold", Alignment::Left)]);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_heading_levels_largest_first() {
        let mut headings = merge_candidates(vec![
            styled(1, 0, "a", Alignment::Left),
            styled(1, 5, "b", Alignment::Left),
        ]);
        headings[1].font_size = 20;
        let levels = heading_levels(&headings);
        assert_eq!(levels, vec![(20, "H1".to_string()), (14, "H2".to_string())]);
    }
}
