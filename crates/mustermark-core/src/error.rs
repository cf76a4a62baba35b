use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MarkError {
    #[error("Failed to open {}: {reason}", path.display())]
    Open { path: PathBuf, reason: String },

    #[error("Failed to save {}: {reason}", path.display())]
    Save { path: PathBuf, reason: String },

    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Page {index} does not exist (document has {count} pages)")]
    PageOutOfRange { index: usize, count: usize },

    #[error("No pattern has been set")]
    NoPattern,

    #[error("Invalid highlight style: {0}")]
    InvalidColor(String),

    #[error("PDF operation failed: {0}")]
    Document(String),
}

impl MarkError {
    pub(crate) fn open(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        MarkError::Open {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn save(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        MarkError::Save {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
