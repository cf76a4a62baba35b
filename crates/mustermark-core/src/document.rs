//! Opened PDF documents

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use lopdf::ObjectId;

use crate::annotate::{self, Highlight, HighlightStyle};
use crate::error::MarkError;
use crate::geometry::{Rect, Word};
use crate::text::{self, PageText};

/// A PDF loaded fully into memory
///
/// Pages are addressed by 0-based index. Text and words are extracted fresh
/// on every call.
pub struct PdfDocument {
    inner: lopdf::Document,
    page_ids: Vec<ObjectId>,
    /// Canonical path the document was opened from
    source: Option<PathBuf>,
}

impl std::fmt::Debug for PdfDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfDocument")
            .field("page_count", &self.page_ids.len())
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

impl PdfDocument {
    /// Open a PDF file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, MarkError> {
        let path = path.as_ref();
        let source = fs::canonicalize(path).map_err(|e| MarkError::open(path, e))?;
        let inner = lopdf::Document::load(&source).map_err(|e| MarkError::open(path, e))?;

        let mut doc = Self::from_document(inner);
        doc.source = Some(source);
        tracing::debug!("Opened {} ({} pages)", path.display(), doc.page_count());
        Ok(doc)
    }

    /// Parse a PDF held in memory
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MarkError> {
        let inner =
            lopdf::Document::load_mem(bytes).map_err(|e| MarkError::open("<memory>", e))?;
        Ok(Self::from_document(inner))
    }

    fn from_document(inner: lopdf::Document) -> Self {
        let page_ids = inner.get_pages().into_values().collect();
        Self {
            inner,
            page_ids,
            source: None,
        }
    }

    pub fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn inner(&self) -> &lopdf::Document {
        &self.inner
    }

    fn page_id(&self, index: usize) -> Result<ObjectId, MarkError> {
        self.page_ids
            .get(index)
            .copied()
            .ok_or(MarkError::PageOutOfRange {
                index,
                count: self.page_ids.len(),
            })
    }

    pub fn page_layout(&self, index: usize) -> Result<PageText, MarkError> {
        let page_id = self.page_id(index)?;
        Ok(text::extract_page(&self.inner, page_id))
    }

    /// Full text of a page as one string
    pub fn page_text(&self, index: usize) -> Result<String, MarkError> {
        Ok(self.page_layout(index)?.text())
    }

    pub fn page_words(&self, index: usize) -> Result<Vec<Word>, MarkError> {
        Ok(self.page_layout(index)?.words())
    }

    pub fn add_highlight(
        &mut self,
        index: usize,
        rect: &Rect,
        contents: &str,
        style: &HighlightStyle,
    ) -> Result<(), MarkError> {
        let page_id = self.page_id(index)?;
        annotate::add_highlight_annotation(&mut self.inner, page_id, rect, contents, style)?;
        Ok(())
    }

    pub fn highlights(&self, index: usize) -> Result<Vec<Highlight>, MarkError> {
        let page_id = self.page_id(index)?;
        Ok(annotate::highlights(&self.inner, page_id))
    }

    /// Annotations of any kind on a page
    pub fn annotation_count(&self, index: usize) -> Result<usize, MarkError> {
        let page_id = self.page_id(index)?;
        Ok(annotate::annotation_count(&self.inner, page_id))
    }

    pub fn total_annotations(&self) -> usize {
        self.page_ids
            .iter()
            .map(|&id| annotate::annotation_count(&self.inner, id))
            .sum()
    }

    /// Serialize the document, annotations included
    pub fn to_bytes(&mut self) -> Result<Vec<u8>, MarkError> {
        let mut buffer = Vec::new();
        self.inner
            .save_to(&mut buffer)
            .map_err(|e| MarkError::Document(e.to_string()))?;
        Ok(buffer)
    }

    /// Write the document to `path`
    ///
    /// The file is written to a temporary sibling and renamed into place, so
    /// a failed save leaves no new file and an existing file untouched. The
    /// file the document was opened from is refused.
    pub fn save<P: AsRef<Path>>(&mut self, path: P) -> Result<(), MarkError> {
        let path = path.as_ref();

        if let (Some(source), Ok(target)) = (&self.source, fs::canonicalize(path)) {
            if *source == target {
                return Err(MarkError::save(
                    path,
                    "destination is the file the document was opened from",
                ));
            }
        }

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        if path.is_dir() {
            return Err(MarkError::save(path, "destination is a directory"));
        }

        let bytes = self
            .to_bytes()
            .map_err(|e| MarkError::save(path, e))?;

        let existing = existing_permissions(path)?;
        let mut builder = tempfile::Builder::new();
        if let Some(permissions) = new_file_permissions() {
            builder.permissions(permissions);
        }
        let mut tmp = builder
            .tempfile_in(&dir)
            .map_err(|e| MarkError::save(path, e))?;
        if let Some(permissions) = existing {
            tmp.as_file()
                .set_permissions(permissions)
                .map_err(|e| MarkError::save(path, e))?;
        }
        tmp.write_all(&bytes)
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| MarkError::save(path, e))?;
        tmp.persist(path).map_err(|e| MarkError::save(path, e.error))?;

        tracing::debug!("Saved {} ({} bytes)", path.display(), bytes.len());
        Ok(())
    }
}

/// Permissions of an existing destination, which must itself be writable
///
/// Renaming over the destination would otherwise bypass its permissions.
fn existing_permissions(path: &Path) -> Result<Option<fs::Permissions>, MarkError> {
    match fs::metadata(path) {
        Ok(meta) => {
            if meta.permissions().readonly() {
                return Err(MarkError::save(path, "destination is read-only"));
            }
            fs::OpenOptions::new()
                .write(true)
                .open(path)
                .map_err(|e| MarkError::save(path, e))?;
            Ok(Some(meta.permissions()))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(MarkError::save(path, e)),
    }
}

/// Mode for a freshly created output instead of the temp file's `0600`
#[cfg(unix)]
fn new_file_permissions() -> Option<fs::Permissions> {
    use std::os::unix::fs::PermissionsExt;
    // Reduced by the umask when the file is created
    Some(fs::Permissions::from_mode(0o666))
}

#[cfg(not(unix))]
fn new_file_permissions() -> Option<fs::Permissions> {
    None
}
