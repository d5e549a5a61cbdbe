//! Atomic output commit.
//!
//! The merged document is never written to its final path directly:
//! - It is saved to a temporary sibling file (`<stem>.pdf_part_tmp`)
//! - The writer handle is flushed, synced and closed
//! - The temporary file is renamed over the target
//!
//! The temporary file lives next to the target so the rename never
//! crosses filesystems. If anything fails, the temporary file is removed
//! and the target is left exactly as it was.
//!
//! # Examples
//!
//! ```no_run
//! use pdfmerge::io::writer::{OutputCommitter, format_file_size};
//! use lopdf::Document;
//! use std::path::Path;
//!
//! # fn example(mut doc: Document) -> pdfmerge::Result<()> {
//! let committer = OutputCommitter::new();
//! let target = Path::new("merged.pdf");
//! let temp = OutputCommitter::temp_path_for(target);
//!
//! if let Err(err) = committer.write_temp(&mut doc, &temp) {
//!     committer.discard(&temp);
//!     return Err(err);
//! }
//! let size = committer.commit(&temp, target)?;
//! println!("Wrote {}", format_file_size(size));
//! # Ok(())
//! # }
//! ```

use lopdf::Document;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{PdfMergeError, Result};

/// Extension given to the temporary output file.
pub const TEMP_EXTENSION: &str = "pdf_part_tmp";

/// Write-to-temporary then rename-into-place.
#[derive(Debug, Clone)]
pub struct OutputCommitter {
    /// Buffer size for writing (in bytes).
    buffer_size: usize,
}

impl OutputCommitter {
    /// Create a committer with the default buffer size.
    pub fn new() -> Self {
        Self { buffer_size: 64 * 1024 }
    }

    /// Create a committer with a custom buffer size.
    pub fn with_buffer_size(buffer_size: usize) -> Self {
        Self {
            buffer_size: buffer_size.max(1),
        }
    }

    /// Temporary path used while writing `target`.
    ///
    /// Always in the same directory as `target`.
    pub fn temp_path_for(target: &Path) -> PathBuf {
        target.with_extension(TEMP_EXTENSION)
    }

    /// Save `doc` to `temp_path` and close the file.
    ///
    /// Missing parent directories are created. The file handle is flushed,
    /// synced and dropped before this returns, so the caller can rename it.
    ///
    /// # Errors
    ///
    /// Returns [`PdfMergeError::FailedToWrite`] if the file cannot be created
    /// or written.
    pub fn write_temp(&self, doc: &mut Document, temp_path: &Path) -> Result<u64> {
        let write_err = |source: std::io::Error| PdfMergeError::FailedToWrite {
            path: temp_path.to_path_buf(),
            source,
        };

        if let Some(parent) = temp_path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(write_err)?;
        }

        let file = File::create(temp_path).map_err(write_err)?;
        let mut writer = BufWriter::with_capacity(self.buffer_size, file);

        doc.save_to(&mut writer)
            .map_err(|e| write_err(std::io::Error::other(e)))?;
        writer.flush().map_err(write_err)?;

        let file = writer
            .into_inner()
            .map_err(|e| write_err(e.into_error()))?;
        file.sync_all().map_err(write_err)?;
        let written = file.metadata().map(|m| m.len()).map_err(write_err)?;
        drop(file);

        debug!(path = %temp_path.display(), bytes = written, "Wrote temporary output");
        Ok(written)
    }

    /// Rename `temp_path` over `target_path` and return the committed size.
    ///
    /// Either the rename succeeds and `temp_path` no longer exists, or it
    /// fails and `target_path` is untouched.
    ///
    /// # Errors
    ///
    /// Returns [`PdfMergeError::FailedToCommit`] if the rename fails.
    pub fn commit(&self, temp_path: &Path, target_path: &Path) -> Result<u64> {
        fs::rename(temp_path, target_path).map_err(|source| PdfMergeError::FailedToCommit {
            temp_path: temp_path.to_path_buf(),
            target_path: target_path.to_path_buf(),
            source,
        })?;

        let size = fs::metadata(target_path)?.len();
        info!(path = %target_path.display(), size = %format_file_size(size), "Committed output");
        Ok(size)
    }

    /// Remove a leftover temporary file.
    ///
    /// Best effort: a failure is logged and reported as `false`, never raised.
    pub fn discard(&self, temp_path: &Path) -> bool {
        if !temp_path.exists() {
            return true;
        }

        match fs::remove_file(temp_path) {
            Ok(()) => {
                info!(path = %temp_path.display(), "Removed temporary output");
                true
            }
            Err(err) => {
                warn!(path = %temp_path.display(), %err, "Could not remove temporary output");
                false
            }
        }
    }
}

impl Default for OutputCommitter {
    fn default() -> Self {
        Self::new()
    }
}

/// Size in megabytes, as reported in completion messages.
pub fn size_in_mb(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}

/// Format file size as human-readable string.
pub fn format_file_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{size} bytes")
    }
}
