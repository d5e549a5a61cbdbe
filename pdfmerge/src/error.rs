//! Error types for pdfmerge.
//!
//! Errors fall into a few broad groups:
//!
//! - **Input errors**: missing files, unreadable or encrypted PDFs
//! - **Request errors**: bad page selections or output settings
//! - **Output errors**: failures while writing or committing the merged file
//! - **Merge failures**: the classified, serializable outcome of an aborted merge
//!
//! [`MergeFailure`] is what crosses the worker boundary when a merge aborts.
//! Everything else stays inside the library as a [`PdfMergeError`].

use serde::{Deserialize, Serialize};
use std::io;
use std::path::PathBuf;

/// Result type alias for pdfmerge operations.
pub type Result<T> = std::result::Result<T, PdfMergeError>;

/// Main error type for pdfmerge operations.
#[derive(Debug, thiserror::Error)]
pub enum PdfMergeError {
    /// Input file was not found.
    #[error("File not found: {}", path.display())]
    FileNotFound {
        /// Path to the file that was not found.
        path: PathBuf,
    },

    /// Failed to load a PDF file.
    #[error("Failed to load PDF: {}\n  Reason: {reason}", path.display())]
    FailedToLoadPdf {
        /// Path to the PDF file.
        path: PathBuf,
        /// Reason for the failure.
        reason: String,
    },

    /// PDF file is encrypted and cannot be merged.
    #[error(
        "PDF is password protected: {}\n  Hint: Remove the password before merging",
        path.display()
    )]
    EncryptedPdf {
        /// Path to the encrypted PDF.
        path: PathBuf,
    },

    /// No document has any selected page left after filtering.
    #[error("No pages selected for merging")]
    NothingToMerge,

    /// A page selection string could not be parsed.
    #[error("Invalid page selection '{selection}': {reason}")]
    InvalidPageSelection {
        /// The selection as written by the user.
        selection: String,
        /// What is wrong with it.
        reason: String,
    },

    /// Invalid output settings.
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// Description of what's wrong with the configuration.
        message: String,
    },

    /// Failed to write the temporary output file.
    #[error("Failed to write output file: {}\n  Reason: {source}", path.display())]
    FailedToWrite {
        /// Path being written to.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// Failed to move the temporary file over the target.
    #[error(
        "Failed to move {} into place at {}\n  Reason: {source}",
        temp_path.display(),
        target_path.display()
    )]
    FailedToCommit {
        /// Temporary file that should have been renamed.
        temp_path: PathBuf,
        /// Final output path.
        target_path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// A single content stream could not be compressed.
    #[error("Failed to compress stream {} {}: {reason}", object_id.0, object_id.1)]
    CompressionFailed {
        /// Object id of the stream.
        object_id: lopdf::ObjectId,
        /// Reason for the failure.
        reason: String,
    },

    /// Password protection could not be applied.
    #[error("Failed to apply encryption: {reason}")]
    EncryptionFailed {
        /// Reason for the failure.
        reason: String,
    },

    /// A merge aborted.
    #[error(transparent)]
    Merge(#[from] MergeFailure),

    /// Settings file could not be parsed or serialized.
    #[error("Invalid settings file: {0}")]
    Settings(#[from] serde_json::Error),

    /// Generic I/O error.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// Error raised by the PDF library.
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),
}

impl PdfMergeError {
    /// Create a FileNotFound error.
    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    /// Create a FailedToLoadPdf error.
    pub fn failed_to_load_pdf(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::FailedToLoadPdf {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an EncryptedPdf error.
    pub fn encrypted_pdf(path: impl Into<PathBuf>) -> Self {
        Self::EncryptedPdf { path: path.into() }
    }

    /// Create an InvalidPageSelection error.
    pub fn invalid_selection(selection: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPageSelection {
            selection: selection.into(),
            reason: reason.into(),
        }
    }

    /// Create an InvalidConfig error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create an EncryptionFailed error.
    pub fn encryption_failed(reason: impl Into<String>) -> Self {
        Self::EncryptionFailed {
            reason: reason.into(),
        }
    }

    /// Check if this error is recoverable (the merge can continue).
    ///
    /// Only per-stream compression defects qualify.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::CompressionFailed { .. })
    }

    /// Check if this error was caused by the request rather than by I/O.
    pub fn is_request_error(&self) -> bool {
        matches!(
            self,
            Self::NothingToMerge | Self::InvalidPageSelection { .. } | Self::InvalidConfig { .. }
        )
    }

    /// Get the process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::FileNotFound { .. } => 2,
            Self::FailedToLoadPdf { .. } => 3,
            Self::EncryptedPdf { .. } => 3,
            Self::NothingToMerge => 1,
            Self::InvalidPageSelection { .. } => 1,
            Self::InvalidConfig { .. } => 1,
            Self::FailedToWrite { .. } => 5,
            Self::FailedToCommit { .. } => 5,
            Self::CompressionFailed { .. } => 6,
            Self::EncryptionFailed { .. } => 6,
            Self::Merge(_) => 6,
            Self::Settings(_) => 1,
            Self::Io(_) => 5,
            Self::Pdf(_) => 3,
        }
    }
}

/// Classification of an aborted merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// A document could not be opened or read, or is password protected.
    AppendFailure,
    /// Password protection could not be applied.
    EncryptionFailure,
    /// Compression failed as a whole.
    CompressionFailure,
    /// Writing or renaming the output failed.
    CommitFailure,
    /// Anything else.
    Unknown,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::AppendFailure => "append_failure",
            Self::EncryptionFailure => "encryption_failure",
            Self::CompressionFailure => "compression_failure",
            Self::CommitFailure => "commit_failure",
            Self::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Terminal description of a merge that did not complete.
///
/// When a merge fails, nothing is written to or modified at `output_path`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("Merge failed ({kind}): {message}")]
pub struct MergeFailure {
    /// Which stage of the merge failed.
    pub kind: FailureKind,
    /// Human readable description.
    pub message: String,
    /// The output path the merge was targeting.
    pub output_path: PathBuf,
}

impl MergeFailure {
    /// Create a new merge failure.
    pub fn new(kind: FailureKind, message: impl Into<String>, output_path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            message: message.into(),
            output_path: output_path.into(),
        }
    }
}
