use indicatif::{HumanBytes, ProgressBar, ProgressStyle};
use reposeer::stats::{Counter, RunStats};
use reposeer::{Error, ProgressReporter};
use std::sync::Mutex;
use std::time::Duration;

const TICK_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";
const TICK_INTERVAL: Duration = Duration::from_millis(80);

/// indicatif progress for the CLI.
///
/// - Catalog load: row bar (spinner when the row count is unknown)
/// - Scan: byte bar sized by the source estimate
pub struct CliReporter {
    bar: Mutex<Option<ProgressBar>>,
}

impl CliReporter {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }

    fn set_bar(&self, pb: ProgressBar) {
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(old) = guard.take() {
                old.finish_and_clear();
            }
            *guard = Some(pb);
        }
    }

    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        if let Ok(guard) = self.bar.lock() {
            if let Some(pb) = guard.as_ref() {
                f(pb);
            }
        }
    }

    fn finish_bar(&self) {
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(pb) = guard.take() {
                pb.finish_and_clear();
            }
        }
    }
}

fn spinner(message: &'static str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars(TICK_CHARS),
    );
    pb.set_message(message);
    pb.enable_steady_tick(TICK_INTERVAL);
    pb
}

fn bar(total: u64, template: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::with_template(template)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("━╸─")
            .tick_chars(TICK_CHARS),
    );
    pb.enable_steady_tick(TICK_INTERVAL);
    pb
}

impl ProgressReporter for CliReporter {
    fn on_catalog_start(&self, total_rows: Option<u64>) {
        let pb = match total_rows {
            Some(total) => bar(
                total,
                "  {spinner:.cyan} Loading catalog [{bar:30.cyan/dim}] {pos}/{len} rows ({eta} remaining)",
            ),
            None => spinner("Loading catalog..."),
        };
        self.set_bar(pb);
    }

    fn on_catalog_progress(&self, rows: u64) {
        self.with_bar(|pb| {
            if pb.length().is_some() {
                pb.set_position(rows);
            } else {
                pb.set_message(format!("Loading catalog... {} rows", rows));
            }
        });
    }

    fn on_catalog_loaded(&self, entries: usize, duration_secs: f64) {
        self.finish_bar();
        eprintln!(
            "  \x1b[32m✓\x1b[0m Catalog loaded: {} entries in {:.2}s",
            entries, duration_secs
        );
    }

    fn on_size_estimate(&self, total_bytes: u64) {
        eprintln!(
            "  \x1b[32m✓\x1b[0m Source holds {}",
            HumanBytes(total_bytes)
        );
        self.set_bar(bar(
            total_bytes,
            "  {spinner:.cyan} Reconciling [{bar:30.cyan/dim}] {bytes}/{total_bytes} ({eta} remaining)",
        ));
    }

    fn on_scan_progress(&self, processed: &Counter) {
        self.with_bar(|pb| pb.set_position(processed.bytes));
    }

    fn on_scan_complete(&self, stats: &RunStats, duration_secs: f64) {
        self.finish_bar();
        eprintln!(
            "  \x1b[32m✓\x1b[0m Scan complete: {} files in {:.2}s",
            stats.processed.count, duration_secs
        );
    }

    fn on_scan_aborted(&self, stats: &RunStats, error: &Error) {
        self.finish_bar();
        let why = if matches!(error, Error::Cancelled) {
            "interrupted"
        } else {
            "failed"
        };
        eprintln!(
            "  \x1b[31m✗\x1b[0m Scan {} after {} files",
            why, stats.processed.count
        );
    }
}
