//! FIFO from worker threads to the controller.
//!
//! The sending half is cloned into each worker; the receiving half stays
//! with the dispatch loop and is only ever drained without blocking.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::time::Duration;
use tracing::trace;

use crate::merge::ProgressSink;
use crate::task::message::TaskResult;

/// Create a connected sender/receiver pair.
pub fn result_channel() -> (ResultSender, ResultReceiver) {
    let (tx, rx) = mpsc::channel();
    (
        ResultSender { tx },
        ResultReceiver {
            rx,
            disconnected: false,
        },
    )
}

/// Producer side. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ResultSender {
    tx: Sender<TaskResult>,
}

impl ResultSender {
    /// Post a message.
    ///
    /// Returns `false` if the receiver is gone; the message is dropped.
    pub fn post(&self, message: TaskResult) -> bool {
        trace!(tag = message.tag(), "Posting task message");
        self.tx.send(message).is_ok()
    }

    /// Post a progress update.
    pub fn progress(&self, message: impl Into<String>, percent: f64) -> bool {
        self.post(TaskResult::progress(message, percent))
    }
}

impl ProgressSink for ResultSender {
    fn progress(&self, message: &str, percent: f64) {
        ResultSender::progress(self, message, percent);
    }
}

/// Consumer side.
#[derive(Debug)]
pub struct ResultReceiver {
    rx: Receiver<TaskResult>,
    disconnected: bool,
}

impl ResultReceiver {
    /// Take every message queued right now, oldest first. Never blocks.
    pub fn drain(&mut self) -> Vec<TaskResult> {
        let mut messages = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(message) => messages.push(message),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.disconnected = true;
                    break;
                }
            }
        }
        messages
    }

    /// Wait up to `timeout` for one message.
    pub fn recv_timeout(&mut self, timeout: Duration) -> Option<TaskResult> {
        match self.rx.recv_timeout(timeout) {
            Ok(message) => Some(message),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => {
                self.disconnected = true;
                None
            }
        }
    }

    /// Check if every sender has been dropped.
    pub fn is_disconnected(&self) -> bool {
        self.disconnected
    }
}
