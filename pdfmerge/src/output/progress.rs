//! Terminal progress bar for task progress.
//!
//! Tasks report progress as a percentage plus a status message, so the bar
//! is driven by `update(percent, message)` rather than item counts.
//!
//! # Examples
//!
//! ```
//! use pdfmerge::output::progress::ProgressBar;
//!
//! let mut bar = ProgressBar::new();
//! bar.update(45.0, "Merging a.pdf (1/2)...");
//! bar.update(100.0, "Merge successful!");
//! bar.finish();
//! ```

use std::io::{self, Write};
use std::time::{Duration, Instant};

const BAR_WIDTH: usize = 40;

/// Progress bar for task progress.
#[derive(Debug)]
pub struct ProgressBar {
    /// Last reported percentage.
    percent: f64,
    /// Last reported status message.
    message: Option<String>,
    /// When the first update arrived.
    start_time: Instant,
    /// Last render time (for rate limiting).
    last_update: Option<Instant>,
    /// Minimum time between renders.
    update_interval: Duration,
    /// Whether the bar is drawn at all.
    enabled: bool,
    /// Whether something is currently drawn on the line.
    visible: bool,
}

impl ProgressBar {
    /// Create a progress bar, drawn only when stdout is a terminal.
    pub fn new() -> Self {
        Self {
            percent: 0.0,
            message: None,
            start_time: Instant::now(),
            last_update: None,
            update_interval: Duration::from_millis(100),
            enabled: Self::is_terminal(),
            visible: false,
        }
    }

    /// Create a progress bar that never draws.
    pub fn disabled() -> Self {
        let mut bar = Self::new();
        bar.enabled = false;
        bar
    }

    fn is_terminal() -> bool {
        use std::io::IsTerminal;
        io::stdout().is_terminal()
    }

    /// Check if the bar draws anything.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Record a progress point and redraw if due.
    ///
    /// Redraws are rate limited, except for the first one and for 100%.
    pub fn update(&mut self, percent: f64, message: &str) {
        if self.last_update.is_none() && !self.visible {
            self.start_time = Instant::now();
        }
        self.percent = percent.clamp(0.0, 100.0);
        self.message = Some(message.to_string());

        let due = self
            .last_update
            .is_none_or(|at| at.elapsed() >= self.update_interval);
        if due || self.percent >= 100.0 {
            self.last_update = Some(Instant::now());
            self.render();
        }
    }

    /// Draw the final state and move to a new line.
    pub fn finish(&mut self) {
        if self.enabled && self.visible {
            self.render();
            println!();
        }
        self.reset();
    }

    /// Erase the bar from the terminal.
    pub fn clear(&mut self) {
        if self.enabled && self.visible {
            print!("\r\x1b[K");
            io::stdout().flush().ok();
        }
        self.reset();
    }

    fn reset(&mut self) {
        self.visible = false;
        self.last_update = None;
        self.percent = 0.0;
        self.message = None;
    }

    fn render(&mut self) {
        if !self.enabled {
            return;
        }
        print!("\r\x1b[K{}", self.render_line());
        io::stdout().flush().ok();
        self.visible = true;
    }

    /// The line as it would be drawn.
    pub fn render_line(&self) -> String {
        let filled = ((self.percent / 100.0) * BAR_WIDTH as f64).round() as usize;
        let filled = filled.min(BAR_WIDTH);
        let arrow = if filled > 0 && filled < BAR_WIDTH { ">" } else { "" };
        let equals = if arrow.is_empty() { filled } else { filled - 1 };

        let bar = format!(
            "[{}{}{}]",
            "=".repeat(equals),
            arrow,
            " ".repeat(BAR_WIDTH - filled)
        );

        let mut parts = vec![
            bar,
            format!("{:>3.0}%", self.percent),
            format_duration(self.start_time.elapsed()),
        ];
        if let Some(ref message) = self.message {
            parts.push(message.clone());
        }
        parts.join(" ")
    }

    /// Last reported percentage.
    pub fn percent(&self) -> f64 {
        self.percent
    }

    /// Last reported message.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Time since the first update.
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}

impl Default for ProgressBar {
    fn default() -> Self {
        Self::new()
    }
}

/// Format a duration as a short human-readable string.
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();

    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    }
}
