//! Progress reporting for a transfer.
//!
//! The fetcher only talks to [`ProgressReporter`]; the binary plugs in
//! [`CliProgress`] for a terminal bar, tests and `--quiet` runs use
//! [`NoopProgress`].

use std::sync::Mutex;

use indicatif::{ProgressBar, ProgressStyle};

pub trait ProgressReporter: Send + Sync {
    /// Transfer started. `total` is the advertised body length, if any.
    fn start(&self, message: &str, total: Option<u64>);

    /// Bytes received so far.
    fn update(&self, current: u64);

    fn finish(&self, message: &str);

    fn finish_with_error(&self, message: &str);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn start(&self, _message: &str, _total: Option<u64>) {}
    fn update(&self, _current: u64) {}
    fn finish(&self, _message: &str) {}
    fn finish_with_error(&self, _message: &str) {}
}

/// Terminal progress bar on stderr.
#[derive(Default)]
pub struct CliProgress {
    bar: Mutex<Option<ProgressBar>>,
}

impl CliProgress {
    pub fn new() -> Self {
        Self::default()
    }

    fn download_bar(total: u64) -> ProgressBar {
        let pb = ProgressBar::new(total);
        if let Ok(style) = ProgressStyle::default_bar().template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})",
        ) {
            pb.set_style(style.progress_chars("█▓░"));
        }
        pb
    }

    fn spinner() -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) =
            ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg} {bytes} ({bytes_per_sec})")
        {
            pb.set_style(style);
        }
        pb
    }

    fn with_bar(&self, f: impl FnOnce(&mut Option<ProgressBar>)) {
        // poisoned only if a draw panicked
        let mut guard = self.bar.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut guard);
    }
}

impl ProgressReporter for CliProgress {
    fn start(&self, message: &str, total: Option<u64>) {
        let pb = match total {
            Some(t) if t > 0 => Self::download_bar(t),
            _ => Self::spinner(),
        };
        pb.set_message(message.to_string());
        self.with_bar(|bar| *bar = Some(pb));
    }

    fn update(&self, current: u64) {
        self.with_bar(|bar| {
            if let Some(pb) = bar {
                pb.set_position(current);
            }
        });
    }

    fn finish(&self, message: &str) {
        self.with_bar(|bar| {
            if let Some(pb) = bar.take() {
                pb.finish_with_message(message.to_string());
            }
        });
    }

    fn finish_with_error(&self, message: &str) {
        self.with_bar(|bar| {
            if let Some(pb) = bar.take() {
                pb.abandon_with_message(message.to_string());
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_progress_does_not_panic() {
        let progress = NoopProgress;
        progress.start("X1", Some(100));
        progress.update(50);
        progress.finish("done");
    }

    #[test]
    fn test_cli_progress_lifecycle() {
        let progress = CliProgress::new();
        progress.update(10);
        progress.start("X1", None);
        progress.update(10);
        progress.finish_with_error("failed");
        assert!(progress.bar.lock().unwrap().is_none());
    }
}
