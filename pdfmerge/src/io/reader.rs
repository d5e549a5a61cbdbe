//! Opening source documents.
//!
//! Source documents are loaded fully into memory on the worker thread.
//! An [`OpenDocument`] is the handle for one loaded source; it is released
//! when it goes out of scope, whichever way the surrounding step exits.
//!
//! # Examples
//!
//! ```no_run
//! use pdfmerge::io::reader::OpenDocument;
//! use std::path::Path;
//!
//! # fn example() -> pdfmerge::Result<()> {
//! let doc = OpenDocument::open(Path::new("input.pdf"))?;
//! println!("{} has {} pages", doc.file_name(), doc.page_count());
//! # Ok(())
//! # }
//! ```

use lopdf::Document;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

use crate::error::{PdfMergeError, Result};

/// A loaded source document.
#[derive(Debug)]
pub struct OpenDocument {
    /// The PDF document.
    pub document: Document,

    /// Path to the source file.
    path: PathBuf,

    /// Number of pages at load time.
    page_count: usize,

    /// Time taken to load the document.
    load_time: Duration,
}

impl OpenDocument {
    /// Open a document for merging.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file does not exist
    /// - The file is not a readable PDF
    /// - The PDF is password protected
    pub fn open(path: &Path) -> Result<Self> {
        let start = Instant::now();
        let document = load_document(path)?;

        if document.is_encrypted() {
            return Err(PdfMergeError::encrypted_pdf(path));
        }

        let page_count = document.get_pages().len();
        let load_time = start.elapsed();
        debug!(path = %path.display(), page_count, ?load_time, "Opened document");

        Ok(Self {
            document,
            path: path.to_path_buf(),
            page_count,
            load_time,
        })
    }

    /// Path of the source file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name for display, falling back to the full path.
    pub fn file_name(&self) -> String {
        display_name(&self.path)
    }

    /// Number of pages the document had when it was opened.
    pub fn page_count(&self) -> usize {
        self.page_count
    }

    /// Time taken to load the document.
    pub fn load_time(&self) -> Duration {
        self.load_time
    }
}

impl Drop for OpenDocument {
    fn drop(&mut self) {
        trace!(path = %self.path.display(), "Closed document");
    }
}

/// Load a PDF without any encryption check.
///
/// Load errors mentioning encryption or passwords are reported as
/// [`PdfMergeError::EncryptedPdf`].
pub fn load_document(path: &Path) -> Result<Document> {
    if !path.exists() {
        return Err(PdfMergeError::file_not_found(path));
    }

    let bytes = std::fs::read(path)
        .map_err(|e| PdfMergeError::failed_to_load_pdf(path, e.to_string()))?;

    Document::load_mem(&bytes).map_err(|e| {
        let err_msg = e.to_string();
        let lowered = err_msg.to_lowercase();
        if lowered.contains("encrypt") || lowered.contains("password") || lowered.contains("decrypt")
        {
            PdfMergeError::encrypted_pdf(path)
        } else {
            PdfMergeError::failed_to_load_pdf(path, err_msg)
        }
    })
}

/// File name of `path` for status messages.
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| path.display().to_string())
}
