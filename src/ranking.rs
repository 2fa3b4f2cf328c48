//! Relevance ranking of detected headings against a persona and a task
//!
//! Each document contributes its page-1 title (the largest page-1 heading)
//! and every heading from page 2 on. Scores blend two similarities:
//! - title: 0.7 × persona + 0.3 × task
//! - other headings: 0.5 × persona + 0.5 × task
//!
//! All scored headings of a batch are pooled and sorted; only the top five are
//! considered, and of those only the ones scoring at least half of the best.

use std::cmp::Ordering;

use serde::Serialize;

use crate::error::Result;
use crate::headings::MergedHeading;
use crate::utils::clean_text;

/// Size of the ranking window
pub const TOP_SECTIONS: usize = 5;
/// Minimum score relative to the best one
pub const MIN_NORMALIZED_SCORE: f64 = 0.5;

const TITLE_PERSONA_WEIGHT: f64 = 0.7;
const SECTION_PERSONA_WEIGHT: f64 = 0.5;

/// Semantic similarity between two texts, in [-1, 1].
pub trait Similarity {
    fn similarity(&self, a: &str, b: &str) -> Result<f32>;
}

/// The two similarity anchors plus the similarity backend, built once per run.
pub struct RankingContext<'a> {
    pub persona: &'a str,
    pub task: &'a str,
    pub similarity: &'a dyn Similarity,
}

impl<'a> RankingContext<'a> {
    pub fn new(persona: &'a str, task: &'a str, similarity: &'a dyn Similarity) -> Self {
        Self { persona, task, similarity }
    }

    fn score(&self, text: &str, persona_weight: f64) -> Result<f64> {
        let persona = self.similarity.similarity(self.persona, text)? as f64;
        let task = self.similarity.similarity(self.task, text)? as f64;
        Ok(persona_weight * persona + (1.0 - persona_weight) * task)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredSection {
    pub document: String,
    pub title: String,
    pub page: u32,
    pub score: f64,
}

/// A section that made it into the output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedSection {
    pub document: String,
    pub title: String,
    pub page: u32,
    /// 1-based position within the top-five window
    pub rank: usize,
    pub score: f64,
    pub normalized: f64,
}

/// First page-1 heading with the largest font size.
fn page_one_title(headings: &[MergedHeading]) -> Option<&MergedHeading> {
    headings.iter().filter(|h| h.page == 1).fold(None, |best, h| match best {
        Some(b) if b.font_size >= h.font_size => Some(b),
        _ => Some(h),
    })
}

/// Score one document's merged headings.
pub fn score_document(
    ctx: &RankingContext<'_>,
    document: &str,
    headings: &[MergedHeading],
) -> Result<Vec<ScoredSection>> {
    let mut scored = Vec::new();

    let title = page_one_title(headings);
    let rest = headings.iter().filter(|h| h.page > 1);
    let weighted = title
        .map(|t| (t, TITLE_PERSONA_WEIGHT))
        .into_iter()
        .chain(rest.map(|h| (h, SECTION_PERSONA_WEIGHT)));

    for (heading, persona_weight) in weighted {
        let text = clean_text(&heading.text);
        let score = ctx.score(&text, persona_weight)?;
        tracing::debug!(document, page = heading.page, score, "Scored heading: {}", text);
        scored.push(ScoredSection {
            document: document.to_string(),
            title: text,
            page: heading.page,
            score,
        });
    }

    Ok(scored)
}

/// Divisor for normalization: the best score, or 1 when there is none or it
/// is exactly zero.
fn score_scale(best: Option<f64>) -> f64 {
    match best {
        None => 1.0,
        Some(best) if best == 0.0 => {
            tracing::warn!("Best section score is 0; normalizing against 1");
            1.0
        }
        Some(best) => best,
    }
}

/// Sort the pooled sections and keep the strong ones from the top window.
pub fn select_sections(mut pooled: Vec<ScoredSection>) -> Vec<RankedSection> {
    // Stable: equal scores keep pooling order
    pooled.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

    let max_score = score_scale(pooled.first().map(|s| s.score));

    pooled
        .into_iter()
        .take(TOP_SECTIONS)
        .enumerate()
        .filter_map(|(idx, section)| {
            let normalized = section.score / max_score;
            (normalized >= MIN_NORMALIZED_SCORE).then(|| RankedSection {
                document: section.document,
                title: section.title,
                page: section.page,
                rank: idx + 1,
                score: section.score,
                normalized,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;

    /// Table-driven similarity; unknown pairs score 0.
    #[derive(Default)]
    struct FakeSimilarity {
        scores: HashMap<(String, String), f32>,
        calls: RefCell<Vec<(String, String)>>,
    }

    impl FakeSimilarity {
        fn with(mut self, a: &str, b: &str, score: f32) -> Self {
            self.scores.insert((a.to_string(), b.to_string()), score);
            self
        }
    }

    impl Similarity for FakeSimilarity {
        fn similarity(&self, a: &str, b: &str) -> Result<f32> {
            self.calls.borrow_mut().push((a.to_string(), b.to_string()));
            Ok(self.scores.get(&(a.to_string(), b.to_string())).copied().unwrap_or(0.0))
        }
    }

    fn heading(page: u32, text: &str, font_size: i64) -> MergedHeading {
        MergedHeading { page, line_no: 0, text: text.to_string(), font_size, alignment: None, style: None }
    }

    fn scored(document: &str, score: f64) -> ScoredSection {
        ScoredSection { document: document.to_string(), title: format!("t{}", score), page: 2, score }
    }

    #[test]
    fn test_title_and_section_weights() {
        let sim = FakeSimilarity::default()
            .with("planner", "Title", 1.0)
            .with("plan a trip", "Title", 0.5)
            .with("planner", "Section", 0.2)
            .with("plan a trip", "Section", 0.6);
        let ctx = RankingContext::new("planner", "plan a trip", &sim);
        let sections = score_document(&ctx, "doc.pdf", &[heading(1, "Title", 24), heading(3, "Section", 14)]).unwrap();

        assert_eq!(sections.len(), 2);
        assert!((sections[0].score - (0.7 * 1.0 + 0.3 * 0.5)).abs() < 1e-6);
        assert!((sections[1].score - (0.5 * 0.2 + 0.5 * 0.6)).abs() < 1e-6);
        assert_eq!(sections[1].page, 3);
        assert_eq!(sections[0].document, "doc.pdf");
    }

    #[test]
    fn test_only_largest_page_one_heading_is_kept() {
        let sim = FakeSimilarity::default();
        let ctx = RankingContext::new("p", "t", &sim);
        let headings = [
            heading(1, "Subtitle", 14),
            heading(1, "Main Title", 24),
            heading(1, "Also 24", 24),
            heading(2, "Intro", 12),
        ];
        let sections = score_document(&ctx, "d", &headings).unwrap();
        let titles: Vec<&str> = sections.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["Main Title", "Intro"]);
    }

    #[test]
    fn test_text_is_cleaned_before_scoring() {
        let sim = FakeSimilarity::default();
        let ctx = RankingContext::new("p", "t", &sim);
        let sections = score_document(&ctx, "d", &[heading(2, " Packing\nTips ", 12)]).unwrap();
        assert_eq!(sections[0].title, "Packing Tips");
        assert!(sim.calls.borrow().iter().all(|(_, b)| b == "Packing Tips"));
    }

    #[test]
    fn test_top_window_and_normalization_gate() {
        let pooled = vec![
            scored("a", 0.9),
            scored("b", 0.85),
            scored("c", 0.4),
            scored("d", 0.3),
            scored("e", 0.2),
        ];
        let sections = select_sections(pooled);
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].rank, 1);
        assert_eq!(sections[1].rank, 2);
        assert!((sections[1].normalized - 0.85 / 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_sixth_score_outside_window() {
        // After sorting the 0.95 entry leads, pushing 0.2 out of the window
        let pooled = vec![
            scored("a", 0.9),
            scored("b", 0.85),
            scored("c", 0.4),
            scored("d", 0.3),
            scored("e", 0.2),
            scored("f", 0.95),
        ];
        let sections = select_sections(pooled);
        let docs: Vec<&str> = sections.iter().map(|s| s.document.as_str()).collect();
        assert_eq!(docs, vec!["f", "a", "b"]);
        assert!(sections.iter().all(|s| s.rank <= TOP_SECTIONS));
    }

    #[test]
    fn test_equal_scores_keep_pooling_order() {
        let pooled = vec![scored("x", 1.0), scored("y", 0.6), scored("low", 0.1), scored("z", 0.6)];
        let sections = select_sections(pooled);
        let ranks: Vec<(&str, usize)> = sections.iter().map(|s| (s.document.as_str(), s.rank)).collect();
        assert_eq!(ranks, vec![("x", 1), ("y", 2), ("z", 3)]);
    }

    #[test]
    fn test_negative_best_score_divides_as_is() {
        // Every similarity negative: ratios above 1 for weaker entries still pass the gate
        let sections = select_sections(vec![scored("a", -0.2), scored("b", -0.3)]);
        assert_eq!(sections.len(), 2);
        assert!((sections[1].normalized - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_zero_best_score_normalizes_against_one() {
        assert_eq!(score_scale(Some(0.0)), 1.0);
        assert_eq!(score_scale(None), 1.0);
        assert_eq!(score_scale(Some(0.8)), 0.8);

        // Ratios stay finite; a zero best score clears nothing
        assert!(select_sections(vec![scored("a", 0.0), scored("b", -0.25)]).is_empty());
    }

    #[test]
    fn test_empty_pool() {
        assert!(select_sections(Vec::new()).is_empty());
    }
}
