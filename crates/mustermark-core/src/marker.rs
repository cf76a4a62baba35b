//! Regex-driven highlighting of words in a document

use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::annotate::HighlightStyle;
use crate::document::PdfDocument;
use crate::error::MarkError;
use crate::geometry::Word;
use crate::pattern;

/// Outcome of marking one page
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PageSummary {
    pub page: usize,
    pub matches: Vec<String>,
    pub highlights: usize,
}

/// Outcome of a whole-document marking pass
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MarkSummary {
    pub pattern: String,
    pub pages: Vec<PageSummary>,
}

impl MarkSummary {
    pub fn total_matches(&self) -> usize {
        self.pages.iter().map(|p| p.matches.len()).sum()
    }

    pub fn total_highlights(&self) -> usize {
        self.pages.iter().map(|p| p.highlights).sum()
    }
}

/// Finds pattern matches on every page and highlights the words containing them
///
/// Owns the document for as long as it is being marked. The pattern most
/// recently used by [`Marker::mark_document`] is remembered so that
/// [`Marker::match_words`] can be called without one.
#[derive(Debug)]
pub struct Marker {
    doc: PdfDocument,
    pattern: Option<Regex>,
    style: HighlightStyle,
}

impl Marker {
    pub fn new(doc: PdfDocument) -> Self {
        Self {
            doc,
            pattern: None,
            style: HighlightStyle::default(),
        }
    }

    /// Open a PDF file for marking
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, MarkError> {
        Ok(Self::new(PdfDocument::open(path)?))
    }

    pub fn with_style(mut self, style: HighlightStyle) -> Self {
        self.style = style;
        self
    }

    pub fn document(&self) -> &PdfDocument {
        &self.doc
    }

    pub fn into_document(self) -> PdfDocument {
        self.doc
    }

    /// The pattern remembered from the last `mark_document` run
    pub fn pattern(&self) -> Option<&Regex> {
        self.pattern.as_ref()
    }

    /// Matches of `pattern` (or the remembered pattern) in a page's text
    pub fn match_words(&self, page: usize, pattern: Option<&Regex>) -> Result<Vec<String>, MarkError> {
        let pattern = pattern.or(self.pattern.as_ref()).ok_or(MarkError::NoPattern)?;
        let text = self.doc.page_text(page)?;
        Ok(pattern::find_targets(pattern, &text))
    }

    /// Highlight every word on `page` whose text contains `target`
    ///
    /// Returns the number of highlights added.
    pub fn mark_word(&mut self, page: usize, target: &str) -> Result<usize, MarkError> {
        let words = self.doc.page_words(page)?;
        self.highlight_containing(page, &words, target)
    }

    /// Run [`Marker::mark_word`] for each target in turn
    pub fn mark_page<S: AsRef<str>>(&mut self, page: usize, targets: &[S]) -> Result<usize, MarkError> {
        if targets.is_empty() {
            return Ok(0);
        }
        // Annotations do not alter the page text, so one extraction serves all targets
        let words = self.doc.page_words(page)?;
        let mut added = 0;
        for target in targets {
            added += self.highlight_containing(page, &words, target.as_ref())?;
        }
        Ok(added)
    }

    fn highlight_containing(&mut self, page: usize, words: &[Word], target: &str) -> Result<usize, MarkError> {
        let mut added = 0;
        for word in words.iter().filter(|w| w.text.contains(target)) {
            self.doc.add_highlight(page, &word.rect, target, &self.style)?;
            added += 1;
        }
        tracing::trace!(page, target, added, "Highlighted words");
        Ok(added)
    }

    /// Compile `regex`, remember it, and mark every page with its matches
    pub fn mark_document(&mut self, regex: &str) -> Result<MarkSummary, MarkError> {
        let pattern = pattern::compile(regex)?;
        self.mark_document_with(&pattern)
    }

    /// Mark every page with matches of an already compiled pattern
    pub fn mark_document_with(&mut self, pattern: &Regex) -> Result<MarkSummary, MarkError> {
        self.pattern = Some(pattern.clone());
        tracing::info!(pattern = pattern.as_str(), pages = self.doc.page_count(), "Marking started");

        let mut summary = MarkSummary {
            pattern: pattern.as_str().to_string(),
            pages: Vec::with_capacity(self.doc.page_count()),
        };
        for page in 0..self.doc.page_count() {
            let matches = self.match_words(page, Some(pattern))?;
            let highlights = self.mark_page(page, &matches)?;
            tracing::debug!(page, matches = matches.len(), highlights, "Page marked");
            summary.pages.push(PageSummary {
                page,
                matches,
                highlights,
            });
        }

        tracing::info!(
            matches = summary.total_matches(),
            highlights = summary.total_highlights(),
            "Marking finished"
        );
        Ok(summary)
    }

    /// Write the document, annotations included, to `path`
    ///
    /// The marker stays usable afterwards, so this doubles as a trial save
    /// before an expensive marking pass.
    pub fn save_close<P: AsRef<Path>>(&mut self, path: P) -> Result<(), MarkError> {
        self.doc.save(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_pdf;
    use pretty_assertions::assert_eq;

    const SID_PATTERN: &str = r"#\d+[._]\d+\{sid\w{8}\}";

    fn marker(pages: &[&str]) -> Marker {
        Marker::new(PdfDocument::from_bytes(&sample_pdf(pages)).unwrap())
    }

    #[test]
    fn test_match_words_without_pattern_fails() {
        let m = marker(&["text"]);
        assert!(matches!(m.match_words(0, None), Err(MarkError::NoPattern)));
    }

    #[test]
    fn test_match_words_with_explicit_pattern() {
        let m = marker(&["Report #12.3{sidAB12cd34} end"]);
        let re = pattern::compile(SID_PATTERN).unwrap();
        assert_eq!(m.match_words(0, Some(&re)).unwrap(), vec!["#12.3{sidAB12cd34}"]);
    }

    #[test]
    fn test_match_words_uses_remembered_pattern() {
        let mut m = marker(&["a1 b2", "c3 a4"]);
        m.mark_document(r"a\d").unwrap();
        assert_eq!(m.match_words(1, None).unwrap(), vec!["a4"]);
        let other = pattern::compile(r"[bc]\d").unwrap();
        assert_eq!(m.match_words(1, Some(&other)).unwrap(), vec!["c3"]);
    }

    #[test]
    fn test_mark_page_highlights_word_containing_target() {
        let mut m = marker(&["Report #12.3{sidAB12cd34} end"]);
        let added = m.mark_page(0, &["#12.3{sidAB12cd34}"]).unwrap();
        assert_eq!(added, 1);

        let highlights = m.document().highlights(0).unwrap();
        assert_eq!(highlights.len(), 1);
        assert_eq!(highlights[0].contents.as_deref(), Some("#12.3{sidAB12cd34}"));
        // "Report " occupies 7 glyphs of 6pt from x = 72
        assert!((highlights[0].rect.left - 114.0).abs() < 0.01);
        assert!((highlights[0].rect.right - 222.0).abs() < 0.01);
    }

    #[test]
    fn test_substring_target_hits_every_containing_word() {
        let mut m = marker(&["item1 item12 other 1"]);
        assert_eq!(m.mark_word(0, "1").unwrap(), 3);
    }

    #[test]
    fn test_empty_match_highlights_every_word() {
        let mut m = marker(&["ab cd"]);
        let re = pattern::compile("x*").unwrap();
        let targets = m.match_words(0, Some(&re)).unwrap();
        assert_eq!(targets, vec![""; 6]);
        // Each empty target is contained in both words
        assert_eq!(m.mark_page(0, &targets).unwrap(), 12);
    }

    #[test]
    fn test_mark_page_with_no_targets_is_noop() {
        let mut m = marker(&["anything"]);
        let none: [&str; 0] = [];
        assert_eq!(m.mark_page(0, &none).unwrap(), 0);
        assert_eq!(m.document().total_annotations(), 0);
    }

    #[test]
    fn test_mark_document_reports_per_page() {
        let mut m = marker(&["x #1.2{sidAAAAAAAA}", "nothing here", "#3_4{sidBBBBBBBB} #3_4{sidBBBBBBBB}"]);
        let summary = m.mark_document(SID_PATTERN).unwrap();

        assert_eq!(summary.pages.len(), 3);
        assert_eq!(summary.pages[0].highlights, 1);
        assert_eq!(summary.pages[1], PageSummary { page: 1, matches: vec![], highlights: 0 });
        // The duplicate target highlights both words twice
        assert_eq!(summary.pages[2].matches.len(), 2);
        assert_eq!(summary.pages[2].highlights, 4);
        assert_eq!(summary.total_highlights(), 5);
        assert_eq!(m.document().total_annotations(), 5);
    }

    #[test]
    fn test_mark_document_rejects_bad_regex_before_marking() {
        let mut m = marker(&["#1.2{sidAAAAAAAA}"]);
        assert!(matches!(m.mark_document("#\\d+["), Err(MarkError::Pattern(_))));
        assert!(m.pattern().is_none());
        assert_eq!(m.document().total_annotations(), 0);
    }

    #[test]
    fn test_mark_document_twice_accumulates() {
        let mut m = marker(&["#1.2{sidAAAAAAAA}"]);
        m.mark_document(SID_PATTERN).unwrap();
        let first = m.document().total_annotations();
        m.mark_document(SID_PATTERN).unwrap();
        assert_eq!(m.document().total_annotations(), first * 2);
    }

    #[test]
    fn test_summary_serializes() {
        let mut m = marker(&["#1.2{sidAAAAAAAA}"]);
        let summary = m.mark_document(SID_PATTERN).unwrap();
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["pages"][0]["highlights"], 1);
        assert_eq!(json["pattern"], SID_PATTERN);
    }
}
