//! pdfmerge - Merge selected pages of PDF files in the background.
//!
//! This library combines pages from several PDF files into one document
//! on a worker thread, while the calling thread stays free to render
//! progress. It provides:
//!
//! - A single-flight [`TaskExecutor`] and a polled result channel
//! - A merge pipeline with weighted progress and atomic output commit
//! - Optional stream compression, password protection, bookmarks and metadata
//! - Pre-merge validation of source documents
//!
//! # Examples
//!
//! ## Running a merge job
//!
//! ```no_run
//! use pdfmerge::config::OutputSettings;
//! use pdfmerge::merge::MergePipeline;
//! use pdfmerge::output::{ConsoleHandler, OutputFormatter};
//! use pdfmerge::request::{DocumentEntry, MergeRequest};
//! use pdfmerge::task::{TaskDispatchLoop, TaskExecutor, result_channel};
//! use std::path::Path;
//!
//! # async fn example() -> pdfmerge::Result<()> {
//! let entries = vec![
//!     DocumentEntry::open(Path::new("a.pdf"))?.with_selection("1-2")?,
//!     DocumentEntry::open(Path::new("b.pdf"))?,
//! ];
//! let request = MergeRequest::build(&entries, &OutputSettings::new("merged.pdf"))?;
//!
//! let (sender, receiver) = result_channel();
//! let executor = TaskExecutor::new(sender);
//! executor.submit("merge", MergePipeline::new().into_job(request));
//!
//! let handler = ConsoleHandler::new(OutputFormatter::default(), false);
//! let mut dispatch = TaskDispatchLoop::new(receiver, executor, handler);
//! dispatch.run_until(|handler, _| handler.has_outcome()).await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Merging on the current thread
//!
//! ```no_run
//! use pdfmerge::config::OutputSettings;
//! use pdfmerge::merge::{MergePipeline, NoProgress};
//! use pdfmerge::request::{DocumentEntry, MergeRequest};
//!
//! # fn example() -> pdfmerge::Result<()> {
//! let entries = vec![DocumentEntry::new("a.pdf", 3), DocumentEntry::new("b.pdf", 2)];
//! let request = MergeRequest::build(&entries, &OutputSettings::new("merged.pdf"))?;
//! let outcome = MergePipeline::new().run(&request, &NoProgress)?;
//! println!("Wrote {} pages", outcome.total_pages);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod io;
pub mod merge;
pub mod output;
pub mod request;
pub mod task;
pub mod validation;

// Re-export commonly used types
pub use config::{CompressionLevel, OutputSettings};
pub use error::{FailureKind, MergeFailure, PdfMergeError, Result};
pub use merge::{MergeOutcome, MergePipeline};
pub use request::{DocumentEntry, MergeRequest};
pub use task::{TaskDispatchLoop, TaskExecutor, TaskResult};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
