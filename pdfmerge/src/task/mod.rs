//! Background job execution and result delivery.
//!
//! A [`TaskExecutor`] runs one job at a time on a worker thread. The job
//! reports through a [`ResultSender`]; the controller owns the matching
//! [`ResultReceiver`] and drains it from a [`TaskDispatchLoop`].

pub mod channel;
pub mod dispatch;
pub mod executor;
pub mod message;

pub use channel::{ResultReceiver, ResultSender, result_channel};
pub use dispatch::{DEFAULT_POLL_INTERVAL, DispatchStats, TaskDispatchLoop, TaskHandler, route};
pub use executor::{BUSY_MESSAGE, Job, TaskExecutor};
pub use message::{TaskAction, TaskError, TaskResult};
