//! Pre-merge validation of source documents.
//!
//! Each document is checked for:
//! - existence on disk
//! - whether it can be parsed at all
//! - encryption
//! - having at least one page
//!
//! Validation never stops at the first bad file; every problem is
//! collected into a [`ValidationIssue`] so the user can fix them all at once.
//!
//! # Examples
//!
//! ```no_run
//! use pdfmerge::validation::Validator;
//! use pdfmerge::merge::NoProgress;
//! use std::path::PathBuf;
//!
//! let issues = Validator::new().validate(&[PathBuf::from("a.pdf")], &NoProgress);
//! println!("{}", Validator::status_message(&issues));
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{PdfMergeError, Result};
use crate::io::{OpenDocument, display_name};
use crate::merge::ProgressSink;
use crate::task::{ResultSender, TaskAction};

/// What is wrong with a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// The file does not exist.
    FileNotFound,
    /// The file is password protected.
    Encrypted,
    /// The file opened but has no pages.
    NoPages,
    /// The file could not be parsed.
    OpenError,
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::FileNotFound => "file_not_found",
            Self::Encrypted => "encrypted",
            Self::NoPages => "no_pages",
            Self::OpenError => "open_error",
        };
        f.write_str(name)
    }
}

/// A problem found in one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// The document.
    pub filepath: PathBuf,
    /// Problem category.
    pub kind: IssueKind,
    /// Human readable description.
    pub message: String,
}

impl ValidationIssue {
    fn from_error(path: &Path, err: &PdfMergeError) -> Self {
        let kind = match err {
            PdfMergeError::FileNotFound { .. } => IssueKind::FileNotFound,
            PdfMergeError::EncryptedPdf { .. } => IssueKind::Encrypted,
            _ => IssueKind::OpenError,
        };
        Self {
            filepath: path.to_path_buf(),
            kind,
            message: err.to_string(),
        }
    }
}

/// Facts about a document that passed validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentInfo {
    /// Path to the validated file.
    pub path: PathBuf,
    /// Number of pages.
    pub page_count: usize,
    /// Size of the file in bytes.
    pub file_size: u64,
    /// PDF header version.
    pub version: String,
}

/// Document validator.
#[derive(Debug, Clone, Copy, Default)]
pub struct Validator;

impl Validator {
    /// Create a new validator.
    pub fn new() -> Self {
        Self
    }

    /// Check one document.
    ///
    /// # Errors
    ///
    /// Returns the issue that makes the document unusable for merging.
    pub fn check(&self, path: &Path) -> std::result::Result<DocumentInfo, ValidationIssue> {
        let document =
            OpenDocument::open(path).map_err(|err| ValidationIssue::from_error(path, &err))?;

        if document.page_count() == 0 {
            return Err(ValidationIssue {
                filepath: path.to_path_buf(),
                kind: IssueKind::NoPages,
                message: format!("{} has no pages", document.file_name()),
            });
        }

        Ok(DocumentInfo {
            path: path.to_path_buf(),
            page_count: document.page_count(),
            file_size: std::fs::metadata(path).map(|m| m.len()).unwrap_or(0),
            version: document.document.version.clone(),
        })
    }

    /// Check every document, reporting progress as it goes.
    pub fn validate(&self, paths: &[PathBuf], progress: &dyn ProgressSink) -> Vec<ValidationIssue> {
        let total = paths.len();
        let mut issues = Vec::new();

        for (index, path) in paths.iter().enumerate() {
            let name = display_name(path);
            progress.progress(
                &format!("Validating {name} ({}/{total}) ...", index + 1),
                percent(index, total),
            );

            match self.check(path) {
                Ok(info) => debug!(file = %name, pages = info.page_count, "Document OK"),
                Err(issue) => {
                    debug!(file = %name, kind = %issue.kind, "Validation issue");
                    issues.push(issue);
                }
            }
        }

        let message = Self::status_message(&issues);
        info!(documents = total, issues = issues.len(), "{message}");
        progress.progress(&message, 100.0);
        issues
    }

    /// Summary line for a finished validation.
    pub fn status_message(issues: &[ValidationIssue]) -> String {
        if issues.is_empty() {
            "Validation complete. All files OK.".to_string()
        } else {
            format!("Validation complete. {} issue(s) found.", issues.len())
        }
    }

    /// Turn a validation of `paths` into a job for the executor.
    pub fn into_job(
        self,
        paths: Vec<PathBuf>,
    ) -> impl FnOnce(&ResultSender) -> Result<TaskAction> + Send + 'static {
        move |sender| {
            let issues = self.validate(&paths, sender);
            Ok(TaskAction::ValidationComplete { issues })
        }
    }
}

fn percent(done: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    done as f64 / total as f64 * 100.0
}
