//! pdfmerge - Merge selected pages of PDF files into a single document.
//!
//! Runs validation and then the merge as background jobs, rendering their
//! progress from a polling dispatch loop.

mod cli;

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::cli::{Cli, InputSpec};
use pdfmerge::config::OutputSettings;
use pdfmerge::error::PdfMergeError;
use pdfmerge::merge::MergePipeline;
use pdfmerge::output::{ConsoleHandler, JobOutcome, OutputFormatter};
use pdfmerge::request::{DocumentEntry, MergeRequest};
use pdfmerge::task::{
    ResultSender, TaskAction, TaskDispatchLoop, TaskError, TaskExecutor, result_channel,
};
use pdfmerge::validation::Validator;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(&cli);

    match run(cli).await {
        Ok(code) => process::exit(code),
        Err(err) => {
            eprintln!("Error: {err:#}");
            process::exit(exit_code(&err));
        }
    }
}

fn init_logging(cli: &Cli) {
    let default_directive = if cli.verbose {
        "pdfmerge=debug"
    } else if cli.quiet {
        "pdfmerge=warn"
    } else {
        "pdfmerge=info"
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_directive.into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();
}

fn exit_code(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<PdfMergeError>()
        .map_or(1, PdfMergeError::exit_code)
}

/// Main application logic. Returns the process exit code.
async fn run(cli: Cli) -> anyhow::Result<i32> {
    let settings = cli.to_settings()?;
    if let Some(ref path) = cli.save_settings {
        settings
            .save(path)
            .with_context(|| format!("Failed to save settings to {}", path.display()))?;
    }

    let inputs = cli.expand_inputs()?;
    let formatter = OutputFormatter::new(cli.quiet || cli.json, cli.verbose);

    if formatter.should_print() {
        formatter.section(&format!("{} v{}", pdfmerge::NAME, pdfmerge::VERSION));
        if let Some(ref path) = cli.save_settings {
            formatter.detail("Settings saved", &path.display().to_string());
        }
    }

    let (sender, receiver) = result_channel();
    let executor = TaskExecutor::new(sender);
    let handler = ConsoleHandler::new(formatter.clone(), cli.json);
    let mut dispatch = TaskDispatchLoop::new(receiver, executor, handler);

    // Validation first
    formatter.info(&format!("Validating {} file(s)...", inputs.len()));
    let paths: Vec<PathBuf> = inputs.iter().map(|input| input.path.clone()).collect();
    let outcome = run_job(&mut dispatch, "validate", Validator::new().into_job(paths)).await;

    match outcome {
        JobOutcome::Validated { ref issues } if issues.is_empty() && !cli.validate_only => {}
        other => return Ok(other.exit_code()),
    }

    let request = build_request(&inputs, &settings)?;
    formatter.info(&format!(
        "Merging {} page(s) from {} document(s)...",
        request.total_pages(),
        request.documents.len()
    ));

    let started = std::time::Instant::now();
    let job = MergePipeline::new().into_job(request);
    let outcome = run_job(&mut dispatch, "merge", job).await;

    if let JobOutcome::Merged { ref output_path, size_mb } = outcome
        && formatter.is_verbose()
    {
        formatter.section("Statistics");
        formatter.detail("Output", &output_path.display().to_string());
        formatter.detail("Size", &format!("{size_mb:.2} MB"));
        formatter.detail("Compression", &settings.compression_level.to_string());
        formatter.detail(
            "Password",
            if settings.password_protect { "Yes" } else { "No" },
        );
        formatter.detail("Time", &format!("{:.2}s", started.elapsed().as_secs_f64()));
    }

    Ok(outcome.exit_code())
}

/// Submit `job` and tick the dispatch loop until its outcome arrives.
async fn run_job<F>(
    dispatch: &mut TaskDispatchLoop<ConsoleHandler>,
    name: &str,
    job: F,
) -> JobOutcome
where
    F: FnOnce(&ResultSender) -> pdfmerge::Result<TaskAction> + Send + 'static,
{
    dispatch.executor().submit(name, job);
    dispatch
        .run_until(|handler, _| handler.has_outcome())
        .await;
    dispatch.executor().wait();
    dispatch.tick();

    dispatch
        .handler_mut()
        .take_outcome()
        .unwrap_or_else(|| {
            JobOutcome::Failed(TaskError::RuntimeError(format!(
                "Task '{name}' ended without a result"
            )))
        })
}

fn build_request(inputs: &[InputSpec], settings: &OutputSettings) -> anyhow::Result<MergeRequest> {
    let mut entries = Vec::with_capacity(inputs.len());
    for input in inputs {
        let mut entry = DocumentEntry::open(&input.path)?;
        if let Some(ref pages) = input.pages {
            entry.select(pages)?;
        }
        tracing::debug!(
            path = %input.path.display(),
            pages = entry.page_count,
            selected = entry.selected_pages.len(),
            "Loaded document entry"
        );
        entries.push(entry);
    }
    Ok(MergeRequest::build(&entries, settings)?)
}
