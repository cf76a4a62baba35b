//! Regex-driven highlighting of words in PDF documents
//!
//! Text and word positions are extracted from page content streams, matched
//! against a regular expression, and every word containing a match receives
//! a `/Highlight` annotation. Parsing and writing use lopdf.
//!
//! ```no_run
//! use mustermark_core::Marker;
//!
//! # fn example() -> Result<(), mustermark_core::MarkError> {
//! let mut marker = Marker::open("report.pdf")?;
//! marker.save_close("report-marked.pdf")?; // trial save
//! let summary = marker.mark_document(r"#\d+\{sid\w{8}\}")?;
//! marker.save_close("report-marked.pdf")?;
//! println!("{} highlights", summary.total_highlights());
//! # Ok(())
//! # }
//! ```

pub mod annotate;
pub mod cmap;
pub mod document;
pub mod error;
pub mod fonts;
pub mod geometry;
pub mod job;
pub mod marker;
pub mod pattern;
pub mod text;

#[cfg(test)]
mod testing;

pub use annotate::{Highlight, HighlightStyle};
pub use document::PdfDocument;
pub use error::MarkError;
pub use geometry::{Rect, Word};
pub use job::MarkJob;
pub use marker::{MarkSummary, Marker, PageSummary};
pub use pattern::DEFAULT_PATTERN;
