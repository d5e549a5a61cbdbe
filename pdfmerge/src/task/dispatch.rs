//! Controller-side polling loop.
//!
//! [`TaskDispatchLoop`] drains the result channel on a fixed interval and
//! routes each message to a [`TaskHandler`]. A handler that panics is
//! logged and skipped; the remaining messages and the next tick still run.

use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{error, trace};

use crate::task::channel::ResultReceiver;
use crate::task::executor::TaskExecutor;
use crate::task::message::{TaskAction, TaskError, TaskResult};
use crate::validation::ValidationIssue;

/// Default time between two ticks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Receiver of routed task messages.
///
/// Only [`TaskHandler::on_progress`], [`TaskHandler::on_merge_complete`]
/// and [`TaskHandler::on_error`] are required.
pub trait TaskHandler {
    /// Called for every message. The default routes it with [`route`].
    fn on_message(&mut self, message: &TaskResult) {
        route(self, message);
    }

    /// A job reported progress.
    fn on_progress(&mut self, message: &str, percent: f64);

    /// A merge committed its output.
    fn on_merge_complete(&mut self, output_path: &Path, size_mb: f64);

    /// A validation job finished.
    fn on_validation_complete(&mut self, _issues: &[ValidationIssue]) {}

    /// A job failed or a submission was rejected.
    fn on_error(&mut self, error: &TaskError);

    /// Called after a tick when no job is running.
    fn on_idle(&mut self) {}
}

/// Route `message` to the matching [`TaskHandler`] method.
pub fn route<H: TaskHandler + ?Sized>(handler: &mut H, message: &TaskResult) {
    match message {
        TaskResult::Success(TaskAction::ProgressUpdate { message, percent }) => {
            handler.on_progress(message, *percent)
        }
        TaskResult::Success(TaskAction::MergeComplete {
            output_path,
            size_mb,
        }) => handler.on_merge_complete(output_path, *size_mb),
        TaskResult::Success(TaskAction::ValidationComplete { issues }) => {
            handler.on_validation_complete(issues)
        }
        TaskResult::Error(err) => handler.on_error(err),
    }
}

/// Counters kept across ticks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Ticks run so far.
    pub ticks: u64,
    /// Messages routed to the handler.
    pub messages: u64,
    /// Terminal messages seen.
    pub terminal_messages: u64,
    /// Handler calls that panicked.
    pub handler_panics: u64,
}

/// Drains a [`ResultReceiver`] into a [`TaskHandler`].
#[derive(Debug)]
pub struct TaskDispatchLoop<H> {
    receiver: ResultReceiver,
    executor: TaskExecutor,
    handler: H,
    poll_interval: Duration,
    stats: DispatchStats,
}

impl<H: TaskHandler> TaskDispatchLoop<H> {
    /// Create a loop polling every [`DEFAULT_POLL_INTERVAL`].
    pub fn new(receiver: ResultReceiver, executor: TaskExecutor, handler: H) -> Self {
        Self {
            receiver,
            executor,
            handler,
            poll_interval: DEFAULT_POLL_INTERVAL,
            stats: DispatchStats::default(),
        }
    }

    /// Use a different poll interval.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// The executor whose idle state this loop reports.
    pub fn executor(&self) -> &TaskExecutor {
        &self.executor
    }

    /// The handler.
    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// The handler, mutably.
    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    /// Consume the loop and return the handler.
    pub fn into_handler(self) -> H {
        self.handler
    }

    /// Counters so far.
    pub fn stats(&self) -> DispatchStats {
        self.stats
    }

    /// Run one tick: drain, route, then refresh idle state.
    ///
    /// Never blocks. Returns the number of messages routed.
    pub fn tick(&mut self) -> usize {
        self.stats.ticks += 1;
        let messages = self.receiver.drain();
        let count = messages.len();

        for message in &messages {
            trace!(tag = message.tag(), "Dispatching task message");
            self.stats.messages += 1;
            if message.is_terminal() {
                self.stats.terminal_messages += 1;
            }

            let handler = &mut self.handler;
            if panic::catch_unwind(AssertUnwindSafe(|| handler.on_message(message))).is_err() {
                self.stats.handler_panics += 1;
                error!(tag = message.tag(), "Task handler panicked");
            }
        }

        if !self.executor.is_running() {
            let handler = &mut self.handler;
            if panic::catch_unwind(AssertUnwindSafe(|| handler.on_idle())).is_err() {
                self.stats.handler_panics += 1;
                error!("Idle handler panicked");
            }
        }

        count
    }

    /// Tick on the poll interval until `shutdown` resolves.
    ///
    /// One last tick runs after shutdown so nothing already queued is lost.
    pub async fn run<F>(&mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    self.tick();
                    break;
                }
                _ = interval.tick() => {
                    self.tick();
                }
            }
        }
    }

    /// Tick on the poll interval until `done` returns true after a tick.
    pub async fn run_until<P>(&mut self, mut done: P)
    where
        P: FnMut(&H, &DispatchStats) -> bool,
    {
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            self.tick();
            if done(&self.handler, &self.stats) {
                break;
            }
        }
    }
}
