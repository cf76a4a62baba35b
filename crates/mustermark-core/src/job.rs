//! End-to-end marking of one file into another

use std::path::PathBuf;

use crate::annotate::HighlightStyle;
use crate::error::MarkError;
use crate::marker::{MarkSummary, Marker};
use crate::pattern::{self, DEFAULT_PATTERN};

/// Highlight every match of `pattern` in `input` and write the result to `output`
#[derive(Debug, Clone, PartialEq)]
pub struct MarkJob {
    pub input: PathBuf,
    pub output: PathBuf,
    pub pattern: String,
    pub style: HighlightStyle,
}

impl MarkJob {
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            pattern: DEFAULT_PATTERN.to_string(),
            style: HighlightStyle::default(),
        }
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = pattern.into();
        self
    }

    pub fn with_style(mut self, style: HighlightStyle) -> Self {
        self.style = style;
        self
    }

    /// Run the job
    ///
    /// The unmodified document is saved to the output first, so an
    /// unwritable destination fails before the marking pass starts.
    pub fn run(&self) -> Result<MarkSummary, MarkError> {
        let pattern = pattern::compile(&self.pattern)?;

        tracing::info!("Opening {}", self.input.display());
        let mut marker = Marker::open(&self.input)?.with_style(self.style);

        tracing::info!("Checking that {} is writable", self.output.display());
        marker.save_close(&self.output)?;

        let summary = marker.mark_document_with(&pattern)?;

        marker.save_close(&self.output)?;
        tracing::info!("Wrote {}", self.output.display());
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::PdfDocument;
    use crate::testing::sample_pdf;
    use std::fs;

    #[test]
    fn test_job_marks_default_pattern() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.pdf");
        let output = dir.path().join("out.pdf");
        fs::write(&input, sample_pdf(&["see #IV.2{sidAB12cd34} here"])).unwrap();

        let summary = MarkJob::new(&input, &output).run().unwrap();
        assert_eq!(summary.total_highlights(), 1);

        let marked = PdfDocument::open(&output).unwrap();
        assert_eq!(marked.highlights(0).unwrap().len(), 1);
    }

    #[test]
    fn test_bad_pattern_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.pdf");
        let output = dir.path().join("out.pdf");
        fs::write(&input, sample_pdf(&["x"])).unwrap();

        let err = MarkJob::new(&input, &output)
            .with_pattern("(")
            .run()
            .unwrap_err();
        assert!(matches!(err, MarkError::Pattern(_)));
        assert!(!output.exists());
    }

    #[test]
    fn test_missing_input_is_open_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = MarkJob::new(dir.path().join("nope.pdf"), dir.path().join("out.pdf"))
            .run()
            .unwrap_err();
        assert!(matches!(err, MarkError::Open { .. }));
    }

    #[test]
    fn test_unwritable_output_is_save_error() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.pdf");
        fs::write(&input, sample_pdf(&["x"])).unwrap();

        let err = MarkJob::new(&input, dir.path().join("no-such-dir").join("out.pdf"))
            .run()
            .unwrap_err();
        assert!(matches!(err, MarkError::Save { .. }));
    }

    #[test]
    fn test_output_equal_to_input_is_save_error() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.pdf");
        fs::write(&input, sample_pdf(&["#1{sidAAAAAAAA}"])).unwrap();
        let before = fs::read(&input).unwrap();

        let err = MarkJob::new(&input, &input).run().unwrap_err();
        assert!(matches!(err, MarkError::Save { .. }));
        assert_eq!(fs::read(&input).unwrap(), before);
    }
}
