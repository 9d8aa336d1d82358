use chrono::{DateTime, Utc};
use indicatif::HumanBytes;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::Path;
use std::time::Duration;

/// A file count paired with the bytes those files hold.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Counter {
    pub count: u64,
    pub bytes: u64,
}

impl Counter {
    pub fn record(&mut self, bytes: u64) {
        self.count += 1;
        self.bytes += bytes;
    }

    pub fn human(&self) -> String {
        format!("{} ({})", self.count, HumanBytes(self.bytes))
    }
}

/// Run-scoped counters. Only the transfer executor mutates them and they
/// never decrease.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunStats {
    /// Every regular file the walk handed to the executor.
    pub processed: Counter,
    /// Matched files newly materialized in the destination.
    pub added: Counter,
    /// Matched files whose destination already existed.
    pub duplicate: Counter,
    /// Duplicate sources deleted because of remove-duplicates.
    pub removed_sources: u64,
}

impl RunStats {
    pub fn unmatched(&self) -> Counter {
        Counter {
            count: self.processed.count - self.added.count - self.duplicate.count,
            bytes: self.processed.bytes - self.added.bytes - self.duplicate.bytes,
        }
    }
}

/// Everything a finished (or aborted) run reports.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
    pub source_bytes: u64,
    pub stats: RunStats,
    pub reaped_dirs: u64,
    pub dry_run: bool,
}

impl RunReport {
    pub fn new(dry_run: bool) -> Self {
        Self {
            started_at: Utc::now(),
            duration: Duration::ZERO,
            source_bytes: 0,
            stats: RunStats::default(),
            reaped_dirs: 0,
            dry_run,
        }
    }

    /// Name/value pairs in the order they appear in the CSV report.
    pub fn to_print_items(&self) -> Vec<(&'static str, String)> {
        let unmatched = self.stats.unmatched();
        vec![
            ("started_at", self.started_at.to_rfc3339()),
            ("duration_secs", format!("{:.3}", self.duration.as_secs_f64())),
            ("dry_run", self.dry_run.to_string()),
            ("source_bytes", self.source_bytes.to_string()),
            ("processed_count", self.stats.processed.count.to_string()),
            ("processed_bytes", self.stats.processed.bytes.to_string()),
            ("added_count", self.stats.added.count.to_string()),
            ("added_bytes", self.stats.added.bytes.to_string()),
            ("duplicate_count", self.stats.duplicate.count.to_string()),
            ("duplicate_bytes", self.stats.duplicate.bytes.to_string()),
            ("unmatched_count", unmatched.count.to_string()),
            ("unmatched_bytes", unmatched.bytes.to_string()),
            ("removed_sources", self.stats.removed_sources.to_string()),
            ("reaped_dirs", self.reaped_dirs.to_string()),
        ]
    }

    /// Append this report as one CSV row, writing the header when the file is new.
    pub fn write_csv(&self, path: &Path) -> io::Result<()> {
        let file_exists = fs::metadata(path).is_ok();
        let file = OpenOptions::new().append(true).create(true).open(path)?;
        let mut wtr = csv::Writer::from_writer(file);

        let items = self.to_print_items();
        if !file_exists {
            wtr.write_record(items.iter().map(|(name, _)| *name))?;
        }
        wtr.write_record(items.iter().map(|(_, value)| value.as_str()))?;
        wtr.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_unmatched_is_derived() {
        let mut stats = RunStats::default();
        stats.processed.record(3);
        stats.processed.record(2);
        stats.processed.record(7);
        stats.added.record(3);
        stats.duplicate.record(7);

        assert_eq!(stats.unmatched(), Counter { count: 1, bytes: 2 });
        assert_eq!(stats.unmatched().human(), "1 (2 B)");
    }

    #[test]
    fn test_write_csv_appends_with_single_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("report.csv");

        let mut report = RunReport::new(false);
        report.stats.processed.record(3);
        report.write_csv(&path).unwrap();
        report.write_csv(&path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3, "header + 2 rows, got: {}", content);
        assert!(lines[0].starts_with("started_at,duration_secs"));
        assert_eq!(
            lines.iter().filter(|l| l.starts_with("started_at")).count(),
            1
        );
    }
}
