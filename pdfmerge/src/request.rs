//! Building an immutable merge request.
//!
//! [`DocumentEntry`] is one row of the document list a user edits: a path,
//! its page count and the selected pages. [`MergeRequest::build`] turns a
//! list of entries plus [`OutputSettings`] into the snapshot handed to a
//! merge job.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::{CompressionLevel, Metadata, OutputSettings, parse_page_selection};
use crate::error::{PdfMergeError, Result};
use crate::io::{OpenDocument, OutputCommitter, TEMP_EXTENSION, display_name};

/// A document in the merge list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentEntry {
    /// Path of the source document.
    pub filepath: PathBuf,
    /// Number of pages in the source document.
    pub page_count: usize,
    /// Zero-based page indices, in merge order.
    pub selected_pages: Vec<usize>,
}

impl DocumentEntry {
    /// Create an entry with every page selected.
    pub fn new(filepath: impl Into<PathBuf>, page_count: usize) -> Self {
        Self {
            filepath: filepath.into(),
            page_count,
            selected_pages: (0..page_count).collect(),
        }
    }

    /// Open `path` to read its page count, selecting all pages.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, unreadable or encrypted.
    pub fn open(path: &Path) -> Result<Self> {
        let document = OpenDocument::open(path)?;
        Ok(Self::new(path, document.page_count()))
    }

    /// Replace the selection with a 1-based selection string like `"1-3,5"`.
    ///
    /// Ranges never expand past this entry's page count.
    pub fn select(&mut self, selection: &str) -> Result<()> {
        self.selected_pages = parse_page_selection(selection, self.page_count)?;
        Ok(())
    }

    /// Builder form of [`DocumentEntry::select`].
    pub fn with_selection(mut self, selection: &str) -> Result<Self> {
        self.select(selection)?;
        Ok(self)
    }

    /// File name for display.
    pub fn file_name(&self) -> String {
        display_name(&self.filepath)
    }
}

/// Pages to take from one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSelection {
    /// Path of the source document.
    pub filepath: PathBuf,
    /// Zero-based page indices, in merge order. Never empty.
    pub selected_pages: Vec<usize>,
}

/// Everything a merge job needs, fixed at submit time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeRequest {
    /// Documents in merge order.
    pub documents: Vec<DocumentSelection>,
    /// Final output path.
    pub output_path: PathBuf,
    /// Compression applied to content streams.
    pub compression_level: CompressionLevel,
    /// Add one outline entry per document.
    pub preserve_bookmarks: bool,
    /// Password for the output, if protection was requested.
    #[serde(skip_serializing)]
    pub password: Option<String>,
    /// Output Info dictionary contents.
    pub metadata: Metadata,
    /// Accepted for compatibility. Has no effect on the output.
    pub color_mode: String,
    /// Accepted for compatibility. Has no effect on the output.
    pub dpi: String,
}

impl MergeRequest {
    /// Build a request from the document list and output settings.
    ///
    /// Out-of-range indices are dropped, and so is any document left with
    /// no pages.
    ///
    /// # Errors
    ///
    /// - [`PdfMergeError::NothingToMerge`] if no pages remain
    /// - [`PdfMergeError::InvalidConfig`] for an empty output path, an
    ///   output path that is also an input, an output path whose temporary
    ///   sibling is itself or one of the inputs, a missing password or
    ///   oversized metadata
    pub fn build(entries: &[DocumentEntry], settings: &OutputSettings) -> Result<Self> {
        if entries.is_empty() {
            return Err(PdfMergeError::NothingToMerge);
        }
        if settings.output_path.as_os_str().is_empty() {
            return Err(PdfMergeError::invalid_config("No output path given"));
        }
        let temp_path = OutputCommitter::temp_path_for(&settings.output_path);
        if temp_path == settings.output_path {
            return Err(PdfMergeError::invalid_config(format!(
                "Output path {} uses the reserved .{TEMP_EXTENSION} extension",
                settings.output_path.display()
            )));
        }

        let output = resolved(&settings.output_path);
        let temp = resolved(&temp_path);
        for entry in entries {
            let input = resolved(&entry.filepath);
            if input == output {
                return Err(PdfMergeError::invalid_config(format!(
                    "Output path {} is also an input",
                    settings.output_path.display()
                )));
            }
            if input == temp {
                return Err(PdfMergeError::invalid_config(format!(
                    "Input {} would be overwritten by the temporary output file",
                    entry.filepath.display()
                )));
            }
        }

        let password = settings.effective_password()?;
        settings.metadata.validate()?;

        let documents: Vec<DocumentSelection> = entries
            .iter()
            .filter_map(|entry| {
                let selected_pages: Vec<usize> = entry
                    .selected_pages
                    .iter()
                    .copied()
                    .filter(|&index| index < entry.page_count)
                    .collect();

                if selected_pages.len() < entry.selected_pages.len() {
                    debug!(
                        file = %entry.file_name(),
                        dropped = entry.selected_pages.len() - selected_pages.len(),
                        "Dropped out-of-range pages"
                    );
                }

                (!selected_pages.is_empty()).then(|| DocumentSelection {
                    filepath: entry.filepath.clone(),
                    selected_pages,
                })
            })
            .collect();

        if documents.is_empty() {
            return Err(PdfMergeError::NothingToMerge);
        }

        Ok(Self {
            documents,
            output_path: settings.output_path.clone(),
            compression_level: settings.compression_level,
            preserve_bookmarks: settings.preserve_bookmarks,
            password,
            metadata: settings.metadata.clone(),
            color_mode: settings.color_mode.clone(),
            dpi: settings.dpi.clone(),
        })
    }

    /// Total number of pages the merge will append.
    pub fn total_pages(&self) -> usize {
        self.documents.iter().map(|d| d.selected_pages.len()).sum()
    }

    /// Check if color mode or DPI were set to something other than the defaults.
    pub fn has_custom_rendering(&self) -> bool {
        self.color_mode != crate::config::DEFAULT_COLOR_MODE || self.dpi != crate::config::DEFAULT_DPI
    }
}

/// Absolute form of `path` for identity checks.
///
/// Existing files are canonicalized. For a file that does not exist yet,
/// the parent directory is canonicalized instead when it exists.
fn resolved(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }

    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    match (absolute.parent(), absolute.file_name()) {
        (Some(parent), Some(name)) => parent
            .canonicalize()
            .map(|parent| parent.join(name))
            .unwrap_or(absolute),
        _ => absolute,
    }
}
