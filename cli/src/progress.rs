//! User-facing progress reporting
//!
//! Presentation only: the pipeline stays correct with a silent reporter,
//! and the reporter never writes deployment state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use colored::Colorize;

/// Progress sink for pipeline events
#[derive(Debug)]
pub struct Progress {
    quiet: AtomicBool,
}

impl Progress {
    pub fn new() -> Self {
        Self {
            quiet: AtomicBool::new(false),
        }
    }

    /// A silent reporter, for tests and machine-driven runs
    pub fn silent() -> Self {
        Self {
            quiet: AtomicBool::new(true),
        }
    }

    fn enabled(&self) -> bool {
        !self.quiet.load(Ordering::Relaxed)
    }

    /// Announce a step before it runs
    pub fn step_started(&self, index: usize, total: usize, name: &str, estimate: Duration) {
        if !self.enabled() {
            return;
        }
        let estimate = humanize(estimate);
        println!(
            "{} {} {}",
            format!("[{}/{}]", index, total).bold(),
            name,
            format!("(~{})", estimate).dimmed()
        );
    }

    /// Mark a step complete
    pub fn step_done(&self, name: &str) {
        if self.enabled() {
            println!("  {} {}", "✓".green().bold(), name);
        }
    }

    /// Mark a step skipped (already satisfied)
    pub fn step_skipped(&self, name: &str, reason: &str) {
        if self.enabled() {
            println!("  {} {} ({})", "-".dimmed(), name, reason.dimmed());
        }
    }

    /// Print a warning; warnings never cause a non-zero exit by themselves
    pub fn warn(&self, message: &str) {
        if self.enabled() {
            println!("  {} {}", "warning:".yellow().bold(), message);
        }
    }

    /// Print a fatal error
    pub fn error(&self, message: &str) {
        if self.enabled() {
            eprintln!("{} {}", "error:".red().bold(), message);
        }
    }

    /// Print an informational line
    pub fn info(&self, message: &str) {
        if self.enabled() {
            println!("  {}", message);
        }
    }
}

impl Default for Progress {
    fn default() -> Self {
        Self::new()
    }
}

fn humanize(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 60 {
        format!("{}m", secs.div_ceil(60))
    } else {
        format!("{}s", secs)
    }
}
