//! Terminal [`TaskHandler`].
//!
//! Renders task messages for a person at a terminal, or as one JSON line
//! per message for scripts. Remembers how the last job ended so the
//! caller can decide what to do next and which exit code to use.

use std::path::{Path, PathBuf};

use crate::error::FailureKind;
use crate::output::formatter::OutputFormatter;
use crate::output::progress::ProgressBar;
use crate::task::{TaskError, TaskHandler, TaskResult, route};
use crate::validation::{ValidationIssue, Validator};

/// How the last job ended.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    /// A merge committed its output.
    Merged {
        /// Committed output path.
        output_path: PathBuf,
        /// Committed size in megabytes.
        size_mb: f64,
    },
    /// A validation finished.
    Validated {
        /// Problems found.
        issues: Vec<ValidationIssue>,
    },
    /// A job failed or was rejected.
    Failed(TaskError),
}

impl JobOutcome {
    /// Process exit code for this outcome.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Merged { .. } => 0,
            Self::Validated { issues } if issues.is_empty() => 0,
            Self::Validated { .. } => 3,
            Self::Failed(TaskError::MergeFailed(failure)) => match failure.kind {
                FailureKind::AppendFailure => 3,
                FailureKind::CommitFailure => 5,
                _ => 6,
            },
            Self::Failed(_) => 1,
        }
    }
}

/// Handler that writes to stdout.
#[derive(Debug)]
pub struct ConsoleHandler {
    formatter: OutputFormatter,
    progress: ProgressBar,
    json: bool,
    outcome: Option<JobOutcome>,
}

impl ConsoleHandler {
    /// Create a handler printing through `formatter`.
    ///
    /// With `json`, every message is printed as one JSON line and nothing
    /// else is written to stdout.
    pub fn new(formatter: OutputFormatter, json: bool) -> Self {
        let progress = if json || formatter.is_quiet() {
            ProgressBar::disabled()
        } else {
            ProgressBar::new()
        };
        Self {
            formatter,
            progress,
            json,
            outcome: None,
        }
    }

    /// Outcome of the last job, if one has ended since the last take.
    pub fn take_outcome(&mut self) -> Option<JobOutcome> {
        self.outcome.take()
    }

    /// Check if a job has ended and its outcome was not taken yet.
    pub fn has_outcome(&self) -> bool {
        self.outcome.is_some()
    }

    /// The formatter in use.
    pub fn formatter(&self) -> &OutputFormatter {
        &self.formatter
    }
}

impl TaskHandler for ConsoleHandler {
    fn on_message(&mut self, message: &TaskResult) {
        if self.json {
            match serde_json::to_string(message) {
                Ok(line) => println!("{line}"),
                Err(err) => tracing::warn!(%err, "Could not serialize task message"),
            }
        }
        route(self, message);
    }

    fn on_progress(&mut self, message: &str, percent: f64) {
        if self.json {
            return;
        }
        if self.progress.is_enabled() {
            self.progress.update(percent, message);
        } else {
            self.formatter.debug(&format!("[{percent:>5.1}%] {message}"));
        }
    }

    fn on_merge_complete(&mut self, output_path: &Path, size_mb: f64) {
        if !self.json {
            self.progress.finish();
            self.formatter.success(&format!(
                "Merge successful! Output: {} ({size_mb:.2} MB)",
                output_path.display()
            ));
        }
        self.outcome = Some(JobOutcome::Merged {
            output_path: output_path.to_path_buf(),
            size_mb,
        });
    }

    fn on_validation_complete(&mut self, issues: &[ValidationIssue]) {
        if !self.json {
            self.progress.clear();
            for (index, issue) in issues.iter().enumerate() {
                self.formatter.warning(&format!(
                    "{}. {} [{}]: {}",
                    index + 1,
                    issue.filepath.display(),
                    issue.kind,
                    issue.message
                ));
            }
            let summary = Validator::status_message(issues);
            if issues.is_empty() {
                self.formatter.info(&summary);
            } else {
                self.formatter.warning(&summary);
            }
        }
        self.outcome = Some(JobOutcome::Validated {
            issues: issues.to_vec(),
        });
    }

    fn on_error(&mut self, error: &TaskError) {
        if !self.json {
            self.progress.clear();
            match error {
                TaskError::Busy(message) => self.formatter.warning(message),
                TaskError::MergeFailed(failure) => {
                    self.formatter.error(&failure.to_string());
                    self.formatter
                        .info(&format!("{} was not modified", failure.output_path.display()));
                }
                other => self.formatter.error(&other.to_string()),
            }
        }
        // A later rejection must not hide an outcome nobody has taken yet
        if !matches!(error, TaskError::Busy(_)) || self.outcome.is_none() {
            self.outcome = Some(JobOutcome::Failed(error.clone()));
        }
    }

    fn on_idle(&mut self) {
        if !self.json && self.outcome.is_some() {
            self.progress.clear();
        }
    }
}
