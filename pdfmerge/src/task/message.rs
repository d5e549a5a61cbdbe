//! Tagged messages sent from a worker to the controller.
//!
//! Every message is a [`TaskResult`]: either a success carrying a
//! [`TaskAction`] or an error carrying a [`TaskError`]. Serialized as JSON,
//! a progress point looks like
//!
//! ```json
//! {"status":"success","payload":{"action":"progress_update","data":{"message":"...","percent":42.0}}}
//! ```

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::path::PathBuf;

use crate::error::{MergeFailure, PdfMergeError};
use crate::validation::ValidationIssue;

/// Envelope for everything a job reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "payload", rename_all = "snake_case")]
pub enum TaskResult {
    /// A progress point or a successful outcome.
    Success(TaskAction),
    /// A job failed or was rejected.
    Error(TaskError),
}

impl TaskResult {
    /// Shorthand for a progress message.
    pub fn progress(message: impl Into<String>, percent: f64) -> Self {
        Self::Success(TaskAction::ProgressUpdate {
            message: message.into(),
            percent,
        })
    }

    /// Check if this message ends a job (anything but a progress point).
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Success(TaskAction::ProgressUpdate { .. }))
    }

    /// Tag used for routing and logging.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Success(action) => action.tag(),
            Self::Error(error) => error.tag(),
        }
    }
}

/// Successful payloads, keyed by action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "data", rename_all = "snake_case")]
pub enum TaskAction {
    /// Intermediate progress.
    ProgressUpdate {
        /// Status text.
        message: String,
        /// Overall progress, 0-100.
        percent: f64,
    },
    /// A merge committed its output.
    MergeComplete {
        /// Committed output path.
        output_path: PathBuf,
        /// Committed size in megabytes.
        size_mb: f64,
    },
    /// A validation pass finished.
    ValidationComplete {
        /// Problems found, empty when every document is usable.
        issues: Vec<ValidationIssue>,
    },
}

impl TaskAction {
    fn tag(&self) -> &'static str {
        match self {
            Self::ProgressUpdate { .. } => "progress_update",
            Self::MergeComplete { .. } => "merge_complete",
            Self::ValidationComplete { .. } => "validation_complete",
        }
    }
}

/// Error payloads, keyed by kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum TaskError {
    /// An unexpected typed error.
    RuntimeError(String),
    /// The request itself was invalid.
    ValueError(String),
    /// The job panicked.
    GenericException(String),
    /// A merge aborted.
    MergeFailed(MergeFailure),
    /// A job was already running; the submission was rejected.
    Busy(String),
}

impl TaskError {
    /// Map a library error to the kind reported to the controller.
    pub fn classify(err: PdfMergeError) -> Self {
        match err {
            PdfMergeError::Merge(failure) => Self::MergeFailed(failure),
            err if err.is_request_error() => Self::ValueError(err.to_string()),
            err @ PdfMergeError::Settings(_) => Self::ValueError(err.to_string()),
            err => Self::RuntimeError(err.to_string()),
        }
    }

    /// Describe a panic payload caught on the worker thread.
    pub fn from_panic(payload: &(dyn Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "job panicked".to_string()
        };
        Self::GenericException(message)
    }

    fn tag(&self) -> &'static str {
        match self {
            Self::RuntimeError(_) => "runtime_error",
            Self::ValueError(_) => "value_error",
            Self::GenericException(_) => "generic_exception",
            Self::MergeFailed(_) => "merge_failed",
            Self::Busy(_) => "busy",
        }
    }
}

impl std::fmt::Display for TaskError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RuntimeError(msg)
            | Self::ValueError(msg)
            | Self::GenericException(msg)
            | Self::Busy(msg) => f.write_str(msg),
            Self::MergeFailed(failure) => write!(f, "{failure}"),
        }
    }
}
