//! Single-flight background job execution.
//!
//! [`TaskExecutor`] runs at most one job at a time, each on its own named
//! thread. Whatever the job does (returns, fails or panics), exactly one
//! terminal message is posted, and only then is the executor marked idle
//! again. Submitting while a job runs posts a `busy` error instead of
//! starting a second thread.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, info_span, warn};

use crate::error::Result;
use crate::task::channel::ResultSender;
use crate::task::message::{TaskAction, TaskError, TaskResult};

/// Message posted when a submission is rejected.
pub const BUSY_MESSAGE: &str = "A task is already running. Please wait.";

/// A unit of background work.
///
/// Receives the sender for progress reporting and returns the action that
/// describes its success.
pub type Job = Box<dyn FnOnce(&ResultSender) -> Result<TaskAction> + Send + 'static>;

#[derive(Debug, Default)]
struct ExecutorState {
    running: bool,
    current: Option<String>,
    worker: Option<JoinHandle<()>>,
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<ExecutorState>,
    /// Signalled whenever `running` goes back to false.
    idle: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, ExecutorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Runs submitted jobs one at a time.
#[derive(Debug, Clone)]
pub struct TaskExecutor {
    shared: Arc<Shared>,
    sender: ResultSender,
}

impl TaskExecutor {
    /// Create an executor posting to `sender`.
    pub fn new(sender: ResultSender) -> Self {
        Self {
            shared: Arc::new(Shared::default()),
            sender,
        }
    }

    fn lock(&self) -> MutexGuard<'_, ExecutorState> {
        self.shared.lock()
    }

    /// Start `job` on a new worker thread.
    ///
    /// Returns `false` without starting anything if a job is already
    /// running; a `busy` error is posted in that case.
    pub fn submit<F>(&self, name: &str, job: F) -> bool
    where
        F: FnOnce(&ResultSender) -> Result<TaskAction> + Send + 'static,
    {
        self.submit_boxed(name, Box::new(job))
    }

    /// Start an already boxed job. See [`TaskExecutor::submit`].
    pub fn submit_boxed(&self, name: &str, job: Job) -> bool {
        let mut state = self.lock();

        if state.running {
            let current = state.current.clone().unwrap_or_default();
            drop(state);
            warn!(rejected = name, running = %current, "Rejected task submission");
            self.sender
                .post(TaskResult::Error(TaskError::Busy(BUSY_MESSAGE.to_string())));
            return false;
        }

        // The previous worker already cleared the flag, so it is finishing or done
        if let Some(previous) = state.worker.take()
            && previous.join().is_err()
        {
            warn!("Previous worker thread panicked outside its job");
        }

        state.running = true;
        state.current = Some(name.to_string());

        let shared = Arc::clone(&self.shared);
        let sender = self.sender.clone();
        let task_name = name.to_string();

        let spawned = thread::Builder::new()
            .name(format!("pdfmerge-{name}"))
            .spawn(move || {
                let guard = RunningGuard { shared };
                run_job(&task_name, job, &sender, guard);
            });

        match spawned {
            Ok(handle) => {
                state.worker = Some(handle);
                info!(task = name, "Started task");
                true
            }
            Err(err) => {
                state.running = false;
                state.current = None;
                drop(state);
                self.shared.idle.notify_all();
                error!(task = name, %err, "Failed to spawn worker thread");
                self.sender.post(TaskResult::Error(TaskError::RuntimeError(format!(
                    "Failed to start task: {err}"
                ))));
                false
            }
        }
    }

    /// Check if a job is running right now.
    pub fn is_running(&self) -> bool {
        let state = self.lock();
        state.running
            && state
                .worker
                .as_ref()
                .is_some_and(|handle| !handle.is_finished())
    }

    /// Name of the running job, if any.
    pub fn current_task(&self) -> Option<String> {
        let state = self.lock();
        if state.running { state.current.clone() } else { None }
    }

    /// Block until the current worker thread, if any, has exited.
    ///
    /// The worker handle stays in place until the job has posted its
    /// terminal message, so [`TaskExecutor::is_running`] keeps reporting
    /// the job from other threads while this blocks.
    pub fn wait(&self) {
        let mut state = self
            .shared
            .idle
            .wait_while(self.lock(), |state| state.running)
            .unwrap_or_else(PoisonError::into_inner);
        let handle = state.worker.take();
        drop(state);
        if let Some(handle) = handle
            && handle.join().is_err()
        {
            warn!("Worker thread panicked outside its job");
        }
    }
}

/// Clears the running flag when the worker is done with it.
struct RunningGuard {
    shared: Arc<Shared>,
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        let mut state = self.shared.lock();
        state.running = false;
        state.current = None;
        drop(state);
        self.shared.idle.notify_all();
    }
}

fn run_job(name: &str, job: Job, sender: &ResultSender, guard: RunningGuard) {
    let span = info_span!("task", task = %name);
    let _enter = span.enter();

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| job(sender)));

    let message = match outcome {
        Ok(Ok(action)) => {
            debug!("Task succeeded");
            TaskResult::Success(action)
        }
        Ok(Err(err)) => {
            error!(%err, "Task failed");
            TaskResult::Error(TaskError::classify(err))
        }
        Err(payload) => {
            let err = TaskError::from_panic(payload.as_ref());
            error!(%err, "Task panicked");
            TaskResult::Error(err)
        }
    };

    if !sender.post(message) {
        warn!("Result receiver dropped before the task finished");
    }
    // Idle only once the terminal message is queued
    drop(guard);
}
