//! Batch orchestration
//!
//! A [`RunContext`] is built once per run from the three collaborators and
//! then only read. Documents are processed one after another; each one goes
//! through layout extraction, table detection, heading detection and scoring
//! before the next starts. The pooled scores are selected once at the end.

use std::path::Path;
use std::time::Instant;

use crate::config::InputConfig;
use crate::error::Result;
use crate::headings::{detect_headings, DocumentHeadings};
use crate::layout::{LayoutSource, PdfLayoutExtractor, RulingTableDetector, TableDetector};
use crate::output::{FailedDocument, OutputDocument};
use crate::ranking::{score_document, select_sections, RankingContext, ScoredSection, Similarity};

pub struct RunContext {
    layout: Box<dyn LayoutSource>,
    tables: Box<dyn TableDetector>,
    similarity: Box<dyn Similarity>,
}

impl RunContext {
    pub fn new(
        layout: Box<dyn LayoutSource>,
        tables: Box<dyn TableDetector>,
        similarity: Box<dyn Similarity>,
    ) -> Self {
        Self { layout, tables, similarity }
    }

    /// lopdf layout and table extraction with the given similarity backend.
    pub fn with_pdf(similarity: Box<dyn Similarity>) -> Self {
        Self::new(Box::new(PdfLayoutExtractor), Box::new(RulingTableDetector), similarity)
    }

    /// Heading detection for one PDF. Needs no similarity calls.
    pub fn analyze_document(&self, path: &Path) -> Result<DocumentHeadings> {
        analyze_document(self.layout.as_ref(), self.tables.as_ref(), path)
    }

    /// Rank the headings of every input document.
    ///
    /// With `fail_fast` unset, a document whose layout cannot be read is
    /// logged, recorded in the output metadata and skipped. Similarity
    /// failures always abort the run.
    pub fn run_batch(&self, input: &InputConfig, pdf_dir: &Path, fail_fast: bool) -> Result<OutputDocument> {
        let ctx = RankingContext::new(&input.persona.role, &input.job_to_be_done.task, self.similarity.as_ref());
        let mut pooled: Vec<ScoredSection> = Vec::new();
        let mut failed = Vec::new();

        for filename in input.filenames() {
            let path = pdf_dir.join(filename);
            let start = Instant::now();

            let headings = match self.analyze_document(&path) {
                Ok(headings) => headings,
                Err(e) if !fail_fast => {
                    tracing::warn!("Skipping {}: {}", filename, e);
                    failed.push(FailedDocument { document: filename.to_string(), error: e.to_string() });
                    continue;
                }
                Err(e) => return Err(e),
            };

            let scored = score_document(&ctx, filename, &headings.merged)?;
            tracing::info!(
                "[Rank] {}: {} candidates, {} headings, {} scored ({:.2?})",
                filename,
                headings.candidates.len(),
                headings.merged.len(),
                scored.len(),
                start.elapsed()
            );
            pooled.extend(scored);
        }

        let pooled_len = pooled.len();
        let sections = select_sections(pooled);
        tracing::info!("[Rank] Kept {} of {} pooled sections", sections.len(), pooled_len);

        Ok(OutputDocument::new(input, &sections, failed))
    }
}

/// Layout, tables, then the heading stages.
pub fn analyze_document(
    layout: &dyn LayoutSource,
    tables: &dyn TableDetector,
    path: &Path,
) -> Result<DocumentHeadings> {
    let document = layout.extract_layout(path)?;
    let table_boxes = tables.detect_tables(path)?;
    tracing::debug!(
        "[Headings] {}: {} pages, {} table regions",
        path.display(),
        document.pages.len(),
        table_boxes.iter().map(Vec::len).sum::<usize>()
    );
    Ok(detect_headings(&document, &table_boxes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DocumentRef, JobToBeDone, Persona};
    use crate::error::Error;
    use crate::layout::{BBox, Block, DocumentLayout, PageLayout, RawLine, Span};
    use std::collections::HashMap;
    use std::io;

    /// Layouts keyed by file name; unknown files do not exist.
    struct FakeLayout(HashMap<String, DocumentLayout>);

    impl LayoutSource for FakeLayout {
        fn extract_layout(&self, path: &Path) -> Result<DocumentLayout> {
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
            self.0
                .get(name)
                .cloned()
                .ok_or_else(|| Error::io(path, io::Error::new(io::ErrorKind::NotFound, "no such file")))
        }
    }

    struct NoTables;

    impl TableDetector for NoTables {
        fn detect_tables(&self, _path: &Path) -> Result<Vec<Vec<BBox>>> {
            Ok(Vec::new())
        }
    }

    /// Scores 1.0 when the heading mentions a keyword, 0.1 otherwise.
    struct KeywordSimilarity(&'static str);

    impl Similarity for KeywordSimilarity {
        fn similarity(&self, _anchor: &str, text: &str) -> Result<f32> {
            Ok(if text.to_lowercase().contains(self.0) { 1.0 } else { 0.1 })
        }
    }

    fn line(text: &str, y0: f64, size: f64, font: &str) -> RawLine {
        RawLine::new(vec![Span {
            text: text.to_string(),
            bbox: BBox::new(10.0, y0, 10.0 + 6.0 * text.len() as f64, y0 + size),
            font: font.to_string(),
            size,
        }])
    }

    fn page(number: u32, heading: &str, heading_size: f64) -> PageLayout {
        let mut lines = vec![line(heading, 60.0, heading_size, "Helvetica")];
        lines.extend((0..8).map(|i| line("body text of the page", 100.0 + 14.0 * i as f64, 11.0, "Times-Roman")));
        PageLayout { number, width: 600.0, height: 800.0, blocks: vec![Block::text(lines)] }
    }

    fn document(title: &str, section: &str) -> DocumentLayout {
        DocumentLayout { pages: vec![page(1, title, 24.0), page(2, section, 18.0)] }
    }

    fn input(files: &[&str]) -> InputConfig {
        InputConfig {
            documents: files.iter().map(|f| DocumentRef { filename: f.to_string() }).collect(),
            persona: Persona { role: "Food Contractor".to_string() },
            job_to_be_done: JobToBeDone { task: "Prepare a vegetarian buffet".to_string() },
        }
    }

    fn context(keyword: &'static str) -> RunContext {
        let mut layouts = HashMap::new();
        layouts.insert("dinner.pdf".to_string(), document("Dinner Ideas", "Vegetarian Mains"));
        layouts.insert("lunch.pdf".to_string(), document("Lunch Ideas", "Sandwiches"));
        RunContext::new(Box::new(FakeLayout(layouts)), Box::new(NoTables), Box::new(KeywordSimilarity(keyword)))
    }

    #[test]
    fn test_empty_batch_is_not_an_error() {
        let out = context("x").run_batch(&input(&[]), Path::new("pdf"), true).unwrap();
        assert!(out.extracted_sections.is_empty());
        assert!(out.metadata.input_documents.is_empty());
    }

    #[test]
    fn test_batch_ranks_across_documents() {
        let out = context("vegetarian").run_batch(&input(&["lunch.pdf", "dinner.pdf"]), Path::new("pdf"), true).unwrap();
        let first = &out.extracted_sections[0];
        assert_eq!(first.document, "dinner.pdf");
        assert_eq!(first.section_title, "Vegetarian Mains");
        assert_eq!(first.page_number, 2);
        assert_eq!(first.importance_rank, 1);
        // Every other heading scores 0.1, far below half of the best
        assert_eq!(out.extracted_sections.len(), 1);
        assert_eq!(out.metadata.input_documents, vec!["dinner.pdf"]);
        assert_eq!(out.metadata.persona, "Food Contractor");
    }

    #[test]
    fn test_missing_document_is_isolated() {
        let out = context("ideas").run_batch(&input(&["gone.pdf", "lunch.pdf"]), Path::new("pdf"), false).unwrap();
        assert_eq!(out.metadata.failed_documents.len(), 1);
        assert_eq!(out.metadata.failed_documents[0].document, "gone.pdf");
        assert_eq!(out.extracted_sections[0].section_title, "Lunch Ideas");
    }

    #[test]
    fn test_missing_document_aborts_with_fail_fast() {
        let err = context("ideas").run_batch(&input(&["lunch.pdf", "gone.pdf"]), Path::new("pdf"), true).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }

    #[test]
    fn test_analyze_document_needs_no_similarity() {
        let headings = context("x").analyze_document(Path::new("pdf/dinner.pdf")).unwrap();
        let texts: Vec<&str> = headings.merged.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["Dinner Ideas", "Vegetarian Mains"]);
    }
}
