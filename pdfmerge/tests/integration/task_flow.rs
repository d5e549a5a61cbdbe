//! Jobs running on the executor and observed through the result channel.

use pdfmerge::error::FailureKind;
use pdfmerge::merge::MergePipeline;
use pdfmerge::output::{ConsoleHandler, JobOutcome, OutputFormatter};
use pdfmerge::task::{
    BUSY_MESSAGE, TaskAction, TaskDispatchLoop, TaskError, TaskExecutor, TaskHandler, TaskResult,
    result_channel,
};
use pdfmerge::validation::{IssueKind, ValidationIssue, Validator};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;
use tempfile::TempDir;

use crate::common::{
    assert_monotone, collect_until_terminal, entry, page_labels, plain_settings, request,
    write_encrypted_pdf, write_pdf,
};

const WAIT: Duration = Duration::from_secs(10);

fn percents(messages: &[TaskResult]) -> Vec<f64> {
    messages
        .iter()
        .filter_map(|message| match message {
            TaskResult::Success(TaskAction::ProgressUpdate { percent, .. }) => Some(*percent),
            _ => None,
        })
        .collect()
}

#[test]
fn test_merge_job_posts_one_terminal_message() {
    let dir = TempDir::new().unwrap();
    let doc1 = write_pdf(dir.path(), "doc1", 5);
    let doc2 = write_pdf(dir.path(), "doc2", 3);
    let output = dir.path().join("merged.pdf");
    let request = request(
        &[entry(&doc1, 5, &[0, 1]), entry(&doc2, 3, &[0, 1, 2])],
        &plain_settings(&output),
    );

    let (sender, mut receiver) = result_channel();
    let executor = TaskExecutor::new(sender);
    assert!(executor.submit("merge", MergePipeline::new().into_job(request)));

    let messages = collect_until_terminal(&mut receiver, WAIT);
    executor.wait();

    let terminal: Vec<_> = messages.iter().filter(|m| m.is_terminal()).collect();
    assert_eq!(terminal.len(), 1);
    match terminal[0] {
        TaskResult::Success(TaskAction::MergeComplete { output_path, size_mb }) => {
            assert_eq!(output_path, &output);
            assert!(*size_mb > 0.0);
        }
        other => panic!("unexpected terminal message: {other:?}"),
    }

    let percents = percents(&messages);
    assert_monotone(&percents);
    assert_eq!(percents.last().copied(), Some(100.0));
    assert_eq!(page_labels(&output).len(), 5);
    assert!(receiver.drain().is_empty());
    assert!(!executor.is_running());
}

#[test]
fn test_encrypted_input_posts_merge_failed() {
    let dir = TempDir::new().unwrap();
    let doc1 = write_pdf(dir.path(), "doc1", 5);
    let doc2 = write_encrypted_pdf(dir.path(), "doc2", 3);
    let output = dir.path().join("merged.pdf");
    std::fs::write(&output, b"before").unwrap();
    let request = request(
        &[entry(&doc1, 5, &[0, 1]), entry(&doc2, 3, &[0, 1, 2])],
        &plain_settings(&output),
    );

    let (sender, mut receiver) = result_channel();
    let executor = TaskExecutor::new(sender);
    executor.submit("merge", MergePipeline::new().into_job(request));

    let messages = collect_until_terminal(&mut receiver, WAIT);
    match messages.last() {
        Some(TaskResult::Error(TaskError::MergeFailed(failure))) => {
            assert_eq!(failure.kind, FailureKind::AppendFailure);
            assert_eq!(failure.output_path, output);
        }
        other => panic!("expected merge_failed, got {other:?}"),
    }
    assert_eq!(messages.iter().filter(|m| m.is_terminal()).count(), 1);
    assert_eq!(std::fs::read(&output).unwrap(), b"before");
}

#[test]
fn test_second_submit_while_running_is_rejected() {
    let (sender, mut receiver) = result_channel();
    let executor = TaskExecutor::new(sender);
    let (release_tx, release_rx) = mpsc::channel::<()>();

    let started = executor.submit("long", move |sender| {
        sender.progress("Working...", 10.0);
        release_rx.recv_timeout(WAIT).ok();
        Ok(TaskAction::MergeComplete {
            output_path: PathBuf::from("first.pdf"),
            size_mb: 0.5,
        })
    });
    assert!(started);
    assert!(executor.is_running());

    let second_ran = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
    let flag = second_ran.clone();
    let rejected = executor.submit("second", move |_| {
        flag.store(true, std::sync::atomic::Ordering::SeqCst);
        Ok(TaskAction::ValidationComplete { issues: vec![] })
    });
    assert!(!rejected);

    // The rejection is posted synchronously, behind the first job's progress
    let mut early = receiver.drain();
    while !early.iter().any(|m| matches!(m, TaskResult::Error(TaskError::Busy(_)))) {
        match receiver.recv_timeout(WAIT) {
            Some(message) => early.push(message),
            None => panic!("no busy message"),
        }
    }
    assert!(early.contains(&TaskResult::Error(TaskError::Busy(BUSY_MESSAGE.to_string()))));

    release_tx.send(()).unwrap();
    let rest = collect_until_terminal(&mut receiver, WAIT);
    executor.wait();

    assert!(matches!(
        rest.last(),
        Some(TaskResult::Success(TaskAction::MergeComplete { output_path, .. }))
            if output_path == Path::new("first.pdf")
    ));
    assert!(!second_ran.load(std::sync::atomic::Ordering::SeqCst));
    assert!(!executor.is_running());
}

#[test]
fn test_executor_accepts_next_job_after_failure() {
    let (sender, mut receiver) = result_channel();
    let executor = TaskExecutor::new(sender);

    executor.submit("fails", |_| Err(pdfmerge::PdfMergeError::NothingToMerge));
    let first = collect_until_terminal(&mut receiver, WAIT);
    executor.wait();
    assert!(matches!(first.last(), Some(TaskResult::Error(TaskError::ValueError(_)))));

    assert!(executor.submit("works", |_| Ok(TaskAction::ValidationComplete { issues: vec![] })));
    let second = collect_until_terminal(&mut receiver, WAIT);
    assert!(matches!(
        second.last(),
        Some(TaskResult::Success(TaskAction::ValidationComplete { .. }))
    ));
}

#[test]
fn test_validation_job_reports_issues() {
    let dir = TempDir::new().unwrap();
    let good = write_pdf(dir.path(), "good", 2);
    let locked = write_encrypted_pdf(dir.path(), "locked", 1);
    let missing = dir.path().join("missing.pdf");

    let (sender, mut receiver) = result_channel();
    let executor = TaskExecutor::new(sender);
    executor.submit(
        "validate",
        Validator::new().into_job(vec![good, locked.clone(), missing.clone()]),
    );

    let messages = collect_until_terminal(&mut receiver, WAIT);
    let issues = match messages.last() {
        Some(TaskResult::Success(TaskAction::ValidationComplete { issues })) => issues.clone(),
        other => panic!("expected validation_complete, got {other:?}"),
    };

    assert_eq!(issues.len(), 2);
    assert_eq!(issues[0].filepath, locked);
    assert!(matches!(issues[0].kind, IssueKind::Encrypted | IssueKind::OpenError));
    assert_eq!(issues[1].filepath, missing);
    assert_eq!(issues[1].kind, IssueKind::FileNotFound);

    let messages_text: Vec<String> = messages
        .iter()
        .filter_map(|m| match m {
            TaskResult::Success(TaskAction::ProgressUpdate { message, .. }) => Some(message.clone()),
            _ => None,
        })
        .collect();
    assert!(messages_text.iter().any(|m| m.starts_with("Validating good.pdf (1/3)")));
    assert_eq!(
        messages_text.last().map(String::as_str),
        Some("Validation complete. 2 issue(s) found.")
    );
}

/// Records what the dispatch loop routes.
#[derive(Debug, Default)]
struct Recorder {
    percents: Vec<f64>,
    completed: Vec<PathBuf>,
    errors: Vec<TaskError>,
    issues: Option<Vec<ValidationIssue>>,
    idle_calls: usize,
    panic_on_progress: bool,
}

impl TaskHandler for Recorder {
    fn on_progress(&mut self, _message: &str, percent: f64) {
        if self.panic_on_progress {
            panic!("handler fault");
        }
        self.percents.push(percent);
    }

    fn on_merge_complete(&mut self, output_path: &Path, _size_mb: f64) {
        self.completed.push(output_path.to_path_buf());
    }

    fn on_error(&mut self, error: &TaskError) {
        self.errors.push(error.clone());
    }

    fn on_validation_complete(&mut self, issues: &[ValidationIssue]) {
        self.issues = Some(issues.to_vec());
    }

    fn on_idle(&mut self) {
        self.idle_calls += 1;
    }
}

#[tokio::test]
async fn test_dispatch_loop_routes_merge() {
    let dir = TempDir::new().unwrap();
    let a = write_pdf(dir.path(), "a", 3);
    let output = dir.path().join("merged.pdf");
    let request = request(&[entry(&a, 3, &[2, 1, 0])], &plain_settings(&output));

    let (sender, receiver) = result_channel();
    let executor = TaskExecutor::new(sender);
    let mut dispatch = TaskDispatchLoop::new(receiver, executor, Recorder::default())
        .with_poll_interval(Duration::from_millis(10));

    dispatch
        .executor()
        .submit("merge", MergePipeline::new().into_job(request));
    tokio::time::timeout(
        WAIT,
        dispatch.run_until(|handler, _| !handler.completed.is_empty() || !handler.errors.is_empty()),
    )
    .await
    .expect("merge did not finish");

    let stats = dispatch.stats();
    let recorder = dispatch.into_handler();
    assert_eq!(recorder.completed, vec![output]);
    assert!(recorder.errors.is_empty());
    assert_monotone(&recorder.percents);
    assert_eq!(recorder.percents.last().copied(), Some(100.0));
    assert_eq!(stats.terminal_messages, 1);
}

#[tokio::test]
async fn test_dispatch_loop_survives_handler_panic() {
    let (sender, receiver) = result_channel();
    let executor = TaskExecutor::new(sender);
    let recorder = Recorder {
        panic_on_progress: true,
        ..Default::default()
    };
    let mut dispatch = TaskDispatchLoop::new(receiver, executor, recorder)
        .with_poll_interval(Duration::from_millis(10));

    dispatch.executor().submit("noisy", |sender| {
        sender.progress("one", 10.0);
        sender.progress("two", 20.0);
        Ok(TaskAction::ValidationComplete { issues: vec![] })
    });

    tokio::time::timeout(WAIT, dispatch.run_until(|handler, _| handler.issues.is_some()))
        .await
        .expect("job did not finish");

    assert_eq!(dispatch.stats().handler_panics, 2);
    assert_eq!(dispatch.handler().issues.as_deref(), Some(&[][..]));
}

#[tokio::test]
async fn test_dispatch_loop_refreshes_idle_state() {
    let (sender, receiver) = result_channel();
    let executor = TaskExecutor::new(sender);
    let mut dispatch = TaskDispatchLoop::new(receiver, executor, Recorder::default())
        .with_poll_interval(Duration::from_millis(5));

    tokio::time::timeout(WAIT, dispatch.run_until(|_, stats| stats.ticks >= 3))
        .await
        .expect("loop stalled");

    assert!(dispatch.handler().idle_calls >= 3);
    assert_eq!(dispatch.stats().messages, 0);
}

#[tokio::test]
async fn test_console_handler_records_outcomes() {
    let dir = TempDir::new().unwrap();
    let a = write_pdf(dir.path(), "a", 1);
    let output = dir.path().join("merged.pdf");

    let (sender, receiver) = result_channel();
    let executor = TaskExecutor::new(sender);
    let handler = ConsoleHandler::new(OutputFormatter::quiet(), false);
    let mut dispatch = TaskDispatchLoop::new(receiver, executor, handler)
        .with_poll_interval(Duration::from_millis(10));

    dispatch
        .executor()
        .submit("validate", Validator::new().into_job(vec![a.clone()]));
    tokio::time::timeout(WAIT, dispatch.run_until(|h, _| h.has_outcome()))
        .await
        .expect("validation did not finish");
    dispatch.executor().wait();
    assert_eq!(
        dispatch.handler_mut().take_outcome(),
        Some(JobOutcome::Validated { issues: vec![] })
    );

    let request = request(&[entry(&a, 1, &[0])], &plain_settings(&output));
    dispatch
        .executor()
        .submit("merge", MergePipeline::new().into_job(request));
    tokio::time::timeout(WAIT, dispatch.run_until(|h, _| h.has_outcome()))
        .await
        .expect("merge did not finish");

    let outcome = dispatch.handler_mut().take_outcome().unwrap();
    assert!(matches!(outcome, JobOutcome::Merged { ref output_path, .. } if *output_path == output));
    assert_eq!(outcome.exit_code(), 0);
}
