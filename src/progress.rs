use crate::error::Error;
use crate::stats::{Counter, RunStats};

/// Trait for reporting catalog load and scan progress.
///
/// The CLI implements it with indicatif bars. All methods have default no-op
/// implementations.
pub trait ProgressReporter: Send + Sync {
    fn on_catalog_start(&self, _total_rows: Option<u64>) {}
    fn on_catalog_progress(&self, _rows: u64) {}
    fn on_catalog_loaded(&self, _entries: usize, _duration_secs: f64) {}
    fn on_size_estimate(&self, _total_bytes: u64) {}
    fn on_scan_progress(&self, _processed: &Counter) {}
    fn on_scan_complete(&self, _stats: &RunStats, _duration_secs: f64) {}
    /// Called instead of `on_scan_complete` when the run fails or is cancelled.
    fn on_scan_aborted(&self, _stats: &RunStats, _error: &Error) {}
}

/// No-op progress reporter for silent operation.
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}
