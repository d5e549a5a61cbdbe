//! User-facing output for the controller side.
//!
//! - [`formatter`]: status lines with quiet/verbose modes
//! - [`progress`]: a percentage progress bar
//! - [`console`]: a [`TaskHandler`](crate::task::TaskHandler) built on both

pub mod console;
pub mod formatter;
pub mod progress;

pub use console::{ConsoleHandler, JobOutcome};
pub use formatter::{MessageLevel, OutputFormatter};
pub use progress::ProgressBar;
