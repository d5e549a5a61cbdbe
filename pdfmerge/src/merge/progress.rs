//! Weighted progress for a merge.
//!
//! A merge reports a single 0-100 value built from two phases:
//! appending pages (90% by default) and finalizing (10%). Within the
//! append phase, progress follows whichever of "documents done" and
//! "pages done" is further along. The finalize phase is split evenly
//! across its ordered steps and ends at exactly 100.

use std::fmt;
use std::path::PathBuf;

use crate::error::{PdfMergeError, Result};

/// Default weight of the append phase.
pub const APPEND_WEIGHT: u32 = 90;

/// Default weight of the finalize phase.
pub const FINALIZE_WEIGHT: u32 = 10;

/// Receiver of progress points emitted by a running job.
pub trait ProgressSink {
    /// Report `percent` (0-100) together with a status message.
    fn progress(&self, message: &str, percent: f64);
}

impl<F> ProgressSink for F
where
    F: Fn(&str, f64),
{
    fn progress(&self, message: &str, percent: f64) {
        self(message, percent)
    }
}

/// Sink that drops every progress point.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn progress(&self, _message: &str, _percent: f64) {}
}

/// Ordered steps of the finalize phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FinalizeStep {
    /// Page tree, bookmarks and metadata are written.
    Start,
    /// Content streams are compressed.
    Compress,
    /// Password protection is applied.
    Encrypt,
    /// The temporary file is written.
    Write,
    /// The temporary file is moved over the target.
    Commit,
    /// The output is in place.
    Done,
}

impl FinalizeStep {
    const LAST: u32 = 5;

    fn ordinal(self) -> u32 {
        match self {
            Self::Start => 0,
            Self::Compress => 1,
            Self::Encrypt => 2,
            Self::Write => 3,
            Self::Commit => 4,
            Self::Done => Self::LAST,
        }
    }
}

/// Maps pipeline position onto a single 0-100 scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressAccumulator {
    append_weight: f64,
    finalize_weight: f64,
}

impl ProgressAccumulator {
    /// Create an accumulator with custom weights.
    ///
    /// # Errors
    ///
    /// Returns an error unless the weights add up to 100.
    pub fn new(append_weight: u32, finalize_weight: u32) -> Result<Self> {
        if append_weight + finalize_weight != 100 {
            return Err(PdfMergeError::invalid_config(format!(
                "Progress weights must add up to 100, got {append_weight} + {finalize_weight}"
            )));
        }

        Ok(Self {
            append_weight: f64::from(append_weight),
            finalize_weight: f64::from(finalize_weight),
        })
    }

    /// Weight of the append phase.
    pub fn append_weight(&self) -> f64 {
        self.append_weight
    }

    /// Progress while appending.
    ///
    /// Both counters only ever grow during a merge, so the result never
    /// decreases from one call to the next.
    pub fn appending(
        &self,
        docs_done: usize,
        total_docs: usize,
        pages_done: usize,
        total_pages: usize,
    ) -> f64 {
        let by_docs = fraction(docs_done, total_docs);
        let by_pages = fraction(pages_done, total_pages);
        by_docs.max(by_pages) * self.append_weight
    }

    /// Progress at a finalize step.
    pub fn finalizing(&self, step: FinalizeStep) -> f64 {
        let share = f64::from(step.ordinal()) / f64::from(FinalizeStep::LAST);
        (self.append_weight + share * self.finalize_weight).min(100.0)
    }
}

impl Default for ProgressAccumulator {
    fn default() -> Self {
        Self {
            append_weight: f64::from(APPEND_WEIGHT),
            finalize_weight: f64::from(FINALIZE_WEIGHT),
        }
    }
}

fn fraction(done: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (done.min(total) as f64) / (total as f64)
}

/// Where a merge currently is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelinePhase {
    /// Nothing has been opened yet.
    Starting,
    /// Appending the document at this position in the request.
    Appending(usize),
    /// Writing the page tree, bookmarks and metadata.
    Finalizing,
    /// Compressing content streams.
    Compressing,
    /// Applying password protection.
    Encrypting,
    /// Writing the temporary file.
    Writing,
    /// Renaming the temporary file over the target.
    Committing,
    /// The output is in place.
    Done,
    /// The merge stopped; nothing was committed.
    Aborted(String),
}

impl PipelinePhase {
    /// Check if the phase is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Aborted(_))
    }
}

impl fmt::Display for PipelinePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Starting => f.write_str("starting"),
            Self::Appending(index) => write!(f, "appending document {}", index + 1),
            Self::Finalizing => f.write_str("finalizing"),
            Self::Compressing => f.write_str("compressing"),
            Self::Encrypting => f.write_str("encrypting"),
            Self::Writing => f.write_str("writing"),
            Self::Committing => f.write_str("committing"),
            Self::Done => f.write_str("done"),
            Self::Aborted(reason) => write!(f, "aborted: {reason}"),
        }
    }
}

/// Result of a successful merge.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    /// Where the merged document was committed.
    pub output_path: PathBuf,
    /// Size of the committed file.
    pub final_size_bytes: u64,
    /// Number of pages in the merged document.
    pub total_pages: usize,
}

impl MergeOutcome {
    /// Committed size in megabytes.
    pub fn size_mb(&self) -> f64 {
        crate::io::size_in_mb(self.final_size_bytes)
    }
}
