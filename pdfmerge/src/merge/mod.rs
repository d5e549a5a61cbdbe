//! Merging selected pages into one output document.
//!
//! - [`pages`]: page tree assembly
//! - [`bookmarks`] and [`metadata`]: outline and Info dictionary
//! - [`finalize`]: optional compression and encryption
//! - [`progress`]: weighted progress accounting
//! - [`pipeline`]: the job that ties them together

pub mod bookmarks;
pub mod finalize;
pub mod metadata;
pub mod pages;
pub mod pipeline;
pub mod progress;

pub use bookmarks::{BookmarkManager, OutlineEntry};
pub use finalize::{
    CompressionReport, DocumentEncryptor, FlateCompressor, Rc4Encryptor, StreamCompressor,
    compress_streams,
};
pub use metadata::MetadataManager;
pub use pages::{FinishOptions, MergedDocument};
pub use pipeline::MergePipeline;
pub use progress::{
    FinalizeStep, MergeOutcome, NoProgress, PipelinePhase, ProgressAccumulator, ProgressSink,
};
