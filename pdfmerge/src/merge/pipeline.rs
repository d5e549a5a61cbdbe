//! The merge job body.
//!
//! [`MergePipeline::run`] appends the requested pages document by
//! document, finalizes the result (outline, metadata, optional
//! compression and encryption), writes it next to the target and renames
//! it into place. A failure at any point removes the temporary file and
//! leaves the target exactly as it was.

use lopdf::Document;
use std::fmt;
use std::path::Path;
use tracing::{debug, error, info, warn};

use crate::config::CompressionLevel;
use crate::error::{FailureKind, MergeFailure, PdfMergeError, Result};
use crate::io::{OpenDocument, OutputCommitter, display_name};
use crate::merge::finalize::{
    DocumentEncryptor, FlateCompressor, Rc4Encryptor, StreamCompressor, compress_streams,
};
use crate::merge::pages::{FinishOptions, MergedDocument};
use crate::merge::progress::{
    FinalizeStep, MergeOutcome, PipelinePhase, ProgressAccumulator, ProgressSink,
};
use crate::request::MergeRequest;
use crate::task::{ResultSender, TaskAction};

/// An error tagged with the stage it aborted.
struct Abort {
    kind: FailureKind,
    error: PdfMergeError,
}

fn at(kind: FailureKind) -> impl FnOnce(PdfMergeError) -> Abort {
    move |error| Abort { kind, error }
}

/// Runs merge requests.
pub struct MergePipeline {
    accumulator: ProgressAccumulator,
    compressor: Box<dyn StreamCompressor>,
    encryptor: Box<dyn DocumentEncryptor>,
    committer: OutputCommitter,
}

impl MergePipeline {
    /// Create a pipeline with deflate compression and RC4 encryption.
    pub fn new() -> Self {
        Self {
            accumulator: ProgressAccumulator::default(),
            compressor: Box::new(FlateCompressor),
            encryptor: Box::new(Rc4Encryptor),
            committer: OutputCommitter::new(),
        }
    }

    /// Use a different stream compressor.
    pub fn with_compressor(mut self, compressor: impl StreamCompressor + 'static) -> Self {
        self.compressor = Box::new(compressor);
        self
    }

    /// Use a different encryptor.
    pub fn with_encryptor(mut self, encryptor: impl DocumentEncryptor + 'static) -> Self {
        self.encryptor = Box::new(encryptor);
        self
    }

    /// Use different progress weights.
    pub fn with_weights(mut self, accumulator: ProgressAccumulator) -> Self {
        self.accumulator = accumulator;
        self
    }

    /// Use a different output committer.
    pub fn with_committer(mut self, committer: OutputCommitter) -> Self {
        self.committer = committer;
        self
    }

    /// Merge `request`, reporting progress to `progress`.
    ///
    /// # Errors
    ///
    /// Returns a [`MergeFailure`] classifying the stage that failed. Nothing
    /// is created or modified at the request's output path in that case.
    pub fn run(
        &self,
        request: &MergeRequest,
        progress: &dyn ProgressSink,
    ) -> std::result::Result<MergeOutcome, MergeFailure> {
        let target = &request.output_path;
        let temp_path = OutputCommitter::temp_path_for(target);
        let mut phase = PipelinePhase::Starting;
        let mut temp_written = false;

        info!(
            documents = request.documents.len(),
            pages = request.total_pages(),
            output = %target.display(),
            "Starting merge"
        );

        match self.execute(request, &temp_path, progress, &mut phase, &mut temp_written) {
            Ok(outcome) => Ok(outcome),
            Err(Abort { kind, error }) => {
                let phase = PipelinePhase::Aborted(phase.to_string());
                // Only a file this run wrote may be removed
                if temp_written {
                    self.committer.discard(&temp_path);
                }
                error!(%kind, %phase, %error, "Merge aborted");
                Err(MergeFailure::new(kind, error.to_string(), target))
            }
        }
    }

    fn execute(
        &self,
        request: &MergeRequest,
        temp_path: &Path,
        progress: &dyn ProgressSink,
        phase: &mut PipelinePhase,
        temp_written: &mut bool,
    ) -> std::result::Result<MergeOutcome, Abort> {
        let acc = &self.accumulator;
        let total_docs = request.documents.len();
        let total_pages = request.total_pages();

        if total_pages == 0 {
            return Err(Abort {
                kind: FailureKind::Unknown,
                error: PdfMergeError::NothingToMerge,
            });
        }
        if temp_path == request.output_path {
            return Err(Abort {
                kind: FailureKind::Unknown,
                error: PdfMergeError::invalid_config(format!(
                    "Output path {} collides with its temporary file",
                    request.output_path.display()
                )),
            });
        }

        if request.has_custom_rendering() {
            warn!(
                color_mode = %request.color_mode,
                dpi = %request.dpi,
                "Color mode and DPI are not applied to merged output"
            );
        }

        progress.progress("Starting merge process...", 0.0);

        let mut merged = MergedDocument::new();
        let mut pages_done = 0;

        for (index, selection) in request.documents.iter().enumerate() {
            *phase = PipelinePhase::Appending(index);
            let name = display_name(&selection.filepath);
            let current = acc.appending(index, total_docs, pages_done, total_pages);

            progress.progress(
                &format!("Merging {name} ({}/{total_docs})...", index + 1),
                current,
            );
            self.append_one(
                &mut merged,
                &selection.filepath,
                &selection.selected_pages,
                &name,
                progress,
                current,
            )
            .map_err(at(FailureKind::AppendFailure))?;

            pages_done += selection.selected_pages.len();
            progress.progress(
                &format!("Added {} pages from {name}", selection.selected_pages.len()),
                acc.appending(index + 1, total_docs, pages_done, total_pages),
            );
        }

        *phase = PipelinePhase::Finalizing;
        progress.progress(
            "Finalizing and saving merged PDF...",
            acc.finalizing(FinalizeStep::Start),
        );
        let options = FinishOptions {
            bookmarks: request.preserve_bookmarks,
            metadata: request.metadata.clone(),
        };
        let mut document = merged.finish(&options).map_err(at(FailureKind::Unknown))?;

        if request.compression_level.is_enabled() {
            *phase = PipelinePhase::Compressing;
            progress.progress(
                "Compressing content streams...",
                acc.finalizing(FinalizeStep::Compress),
            );
            self.compress(&mut document, request.compression_level);
        }

        if let Some(password) = request.password.as_deref() {
            *phase = PipelinePhase::Encrypting;
            progress.progress(
                "Applying password protection...",
                acc.finalizing(FinalizeStep::Encrypt),
            );
            self.encryptor
                .encrypt(&mut document, password)
                .map_err(at(FailureKind::EncryptionFailure))?;
        }

        *phase = PipelinePhase::Writing;
        progress.progress("Writing output file...", acc.finalizing(FinalizeStep::Write));
        *temp_written = true;
        self.committer
            .write_temp(&mut document, temp_path)
            .map_err(at(FailureKind::CommitFailure))?;
        drop(document);

        *phase = PipelinePhase::Committing;
        progress.progress("Moving output file...", acc.finalizing(FinalizeStep::Commit));
        let final_size_bytes = self
            .committer
            .commit(temp_path, &request.output_path)
            .map_err(at(FailureKind::CommitFailure))?;

        *phase = PipelinePhase::Done;
        let outcome = MergeOutcome {
            output_path: request.output_path.clone(),
            final_size_bytes,
            total_pages,
        };
        progress.progress(
            &format!(
                "Merge successful! Output: {} ({:.2} MB)",
                outcome.output_path.display(),
                outcome.size_mb()
            ),
            acc.finalizing(FinalizeStep::Done),
        );

        Ok(outcome)
    }

    /// Open one source, append its pages and close it again.
    fn append_one(
        &self,
        merged: &mut MergedDocument,
        path: &Path,
        pages: &[usize],
        name: &str,
        progress: &dyn ProgressSink,
        current: f64,
    ) -> Result<()> {
        let mut source = OpenDocument::open(path)?;
        debug!(
            file = %name,
            pages = pages.len(),
            of = source.page_count(),
            loaded_in = ?source.load_time(),
            "Appending"
        );
        progress.progress(&format!("Appending pages from {name}..."), current);
        merged.append(&mut source.document, pages, name)?;
        Ok(())
    }

    fn compress(&self, document: &mut Document, level: CompressionLevel) {
        let report = compress_streams(document, self.compressor.as_ref(), level);
        if report.stopped {
            warn!(
                compressed = report.compressed,
                "Compression stopped early; remaining streams were left as they are"
            );
        } else if report.failed > 0 {
            warn!(
                failed = report.failed,
                compressed = report.compressed,
                "Some streams were left uncompressed"
            );
        }
    }

    /// Turn this pipeline and `request` into a job for the executor.
    pub fn into_job(
        self,
        request: MergeRequest,
    ) -> impl FnOnce(&ResultSender) -> Result<TaskAction> + Send + 'static {
        move |sender| {
            let outcome = self.run(&request, sender)?;
            Ok(TaskAction::MergeComplete {
                size_mb: outcome.size_mb(),
                output_path: outcome.output_path,
            })
        }
    }
}

impl Default for MergePipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MergePipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MergePipeline")
            .field("accumulator", &self.accumulator)
            .field("committer", &self.committer)
            .finish_non_exhaustive()
    }
}
