use crate::catalog::CatalogIndex;
use crate::config::RunOptions;
use crate::error::{Error, RunFailure};
use crate::hasher::{ContentHasher, StreamHasher};
use crate::matcher::MatchEngine;
use crate::progress::ProgressReporter;
use crate::reaper::DirectoryReaper;
use crate::scanner::{self, IgnoreSet};
use crate::stats::{Counter, RunReport};
use crate::transfer::{TransferExecutor, TransferMethodRegistry, TransferOp};
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Scan progress is reported roughly this many times per run.
const PROGRESS_STEPS: u64 = 300;

/// One reconciliation of a source tree against a catalog.
///
/// Construction runs preflight and probes the transfer methods, so a
/// `ScanEngine` that exists is ready to run.
pub struct ScanEngine<H: ContentHasher = StreamHasher> {
    options: RunOptions,
    op: TransferOp,
    ignore: IgnoreSet,
    pool: Option<ThreadPool>,
    hasher: H,
    cancel: Arc<AtomicBool>,
}

impl ScanEngine<StreamHasher> {
    pub fn new(options: RunOptions) -> Result<Self, Error> {
        let hasher = StreamHasher::new(options.hash_algorithm);
        Self::with_hasher(options, hasher)
    }
}

impl<H: ContentHasher> ScanEngine<H> {
    pub fn with_hasher(options: RunOptions, hasher: H) -> Result<Self, Error> {
        let ignore = IgnoreSet::new(&options.ignore_patterns)?;
        let options = options.preflight()?;

        // Link probes write into the destination, so a dry run skips them.
        let registry =
            TransferMethodRegistry::probe(&options.source, &options.dest, !options.dry_run)?;
        let op = registry.resolve(options.method)?;

        let pool = if options.hash_jobs > 1 {
            let pool = ThreadPoolBuilder::new()
                .num_threads(options.hash_jobs)
                .thread_name(|i| format!("reposeer-hash-{}", i))
                .build()
                .map_err(|e| Error::InvalidJobs(e.to_string()))?;
            Some(pool)
        } else {
            None
        };

        Ok(Self {
            options,
            op,
            ignore,
            pool,
            hasher,
            cancel: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Options after preflight, with canonical roots.
    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Setting the returned flag stops the run at the next file or directory.
    pub fn cancel_token(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Walk the source tree and reconcile it against `catalog`:
    /// 1. Estimate the source size for progress reporting
    /// 2. Post-order walk; per directory, classify files (size filter, then hash)
    ///    and apply the transfer method in name order
    /// 3. Reap each directory left without content, the source root last
    ///
    /// On error or cancellation the counters gathered so far come back in the
    /// [`RunFailure`].
    pub fn run(
        &self,
        catalog: &CatalogIndex,
        reporter: &dyn ProgressReporter,
    ) -> Result<RunReport, RunFailure> {
        let started = Instant::now();
        let mut report = RunReport::new(self.options.dry_run);

        let mut walk = Walk {
            engine: self,
            matcher: MatchEngine::new(catalog, &self.hasher),
            executor: TransferExecutor::new(
                &self.options.dest,
                self.op,
                self.options.dry_run,
                self.options.remove_duplicates,
            ),
            reaper: DirectoryReaper::new(self.options.remove_empty, self.options.dry_run)
                .protect(&self.options.dest),
            reporter,
            progress_step: 1,
            next_progress: 0,
        };

        let result = self.check_catalog(catalog).and_then(|()| {
            info!("Estimating size of {}", self.options.source.display());
            report.source_bytes = scanner::dir_size(&self.options.source)?;
            reporter.on_size_estimate(report.source_bytes);
            walk.progress_step = (report.source_bytes / PROGRESS_STEPS).max(1);

            info!(
                "Reconciling {} into {} ({}{})",
                self.options.source.display(),
                self.options.dest.display(),
                self.op.method(),
                if self.options.dry_run { ", dry run" } else { "" }
            );
            walk.visit(&self.options.source)
        });

        report.duration = started.elapsed();
        report.stats = *walk.executor.stats();
        report.reaped_dirs = walk.reaper.reaped();

        match result {
            Ok(()) => {
                reporter.on_scan_complete(&report.stats, report.duration.as_secs_f64());
                info!(
                    "Run finished in {:.2}s: {} processed, {} added, {} duplicates",
                    report.duration.as_secs_f64(),
                    report.stats.processed.count,
                    report.stats.added.count,
                    report.stats.duplicate.count
                );
                Ok(report)
            }
            Err(error) => {
                reporter.on_scan_aborted(&report.stats, &error);
                Err(RunFailure { report, error })
            }
        }
    }

    fn check_catalog(&self, catalog: &CatalogIndex) -> Result<(), Error> {
        if catalog.algorithm() != self.options.hash_algorithm {
            return Err(Error::HashMismatch {
                catalog: catalog.algorithm(),
                run: self.options.hash_algorithm,
            });
        }
        Ok(())
    }

    fn check_cancelled(&self) -> Result<(), Error> {
        if self.cancel.load(Ordering::Relaxed) {
            return Err(Error::Cancelled);
        }
        Ok(())
    }
}

/// Mutable state of a single run.
struct Walk<'a, H: ContentHasher> {
    engine: &'a ScanEngine<H>,
    matcher: MatchEngine<'a, H>,
    executor: TransferExecutor,
    reaper: DirectoryReaper,
    reporter: &'a dyn ProgressReporter,
    progress_step: u64,
    next_progress: u64,
}

impl<H: ContentHasher> Walk<'_, H> {
    fn visit(&mut self, dir: &Path) -> Result<(), Error> {
        let engine = self.engine;
        engine.check_cancelled()?;

        let dest = engine.options.dest.as_path();
        let listing = scanner::list_dir(dir, |path| path == dest || engine.ignore.matches(path))?;
        debug!(
            "{}: {} files, {} directories",
            dir.display(),
            listing.files.len(),
            listing.subdirs.len()
        );

        let results =
            self.matcher
                .classify_all(&listing.files, engine.pool.as_ref(), &engine.cancel);
        for (candidate, result) in listing.files.iter().zip(results) {
            engine.check_cancelled()?;
            self.executor.execute(candidate, &result?)?;
            let processed = self.executor.stats().processed;
            self.report_progress(processed);
        }

        for subdir in &listing.subdirs {
            self.visit(subdir)?;
        }

        self.reaper.reap(dir)?;
        Ok(())
    }

    fn report_progress(&mut self, processed: Counter) {
        if processed.bytes >= self.next_progress {
            self.reporter.on_scan_progress(&processed);
            self.next_progress = processed.bytes + self.progress_step;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogEntry;
    use crate::hasher::{hash_bytes, HashAlgorithm};
    use crate::progress::SilentReporter;
    use crate::stats::RunStats;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::tempdir;

    fn catalog_of(algorithm: HashAlgorithm, items: &[(&[u8], &str)]) -> CatalogIndex {
        CatalogIndex::from_entries(
            algorithm,
            items.iter().map(|(content, name)| {
                CatalogEntry::from_raw(
                    algorithm,
                    0,
                    name,
                    content.len() as u64,
                    &hash_bytes(algorithm, content),
                )
                .unwrap()
            }),
        )
    }

    #[derive(Default)]
    struct RecordingReporter {
        estimate: Mutex<Option<u64>>,
        progress: Mutex<Vec<Counter>>,
        completed: Mutex<Option<RunStats>>,
        aborted: Mutex<Option<(RunStats, bool)>>,
    }

    impl ProgressReporter for RecordingReporter {
        fn on_size_estimate(&self, total_bytes: u64) {
            *self.estimate.lock().unwrap() = Some(total_bytes);
        }
        fn on_scan_progress(&self, processed: &Counter) {
            self.progress.lock().unwrap().push(*processed);
        }
        fn on_scan_complete(&self, stats: &RunStats, _duration_secs: f64) {
            *self.completed.lock().unwrap() = Some(*stats);
        }
        fn on_scan_aborted(&self, stats: &RunStats, error: &Error) {
            *self.aborted.lock().unwrap() = Some((*stats, matches!(error, Error::Cancelled)));
        }
    }

    #[test]
    fn test_reporter_sees_estimate_progress_and_completion() {
        let src = tempdir().unwrap();
        let dst = tempdir().unwrap();
        fs::write(src.path().join("a.txt"), "abc").unwrap();
        fs::write(src.path().join("b.txt"), "xy").unwrap();
        let catalog = catalog_of(HashAlgorithm::Md5, &[(b"abc", "a.txt")]);

        let engine = ScanEngine::new(RunOptions::new(src.path(), dst.path())).unwrap();
        let reporter = RecordingReporter::default();
        let report = engine.run(&catalog, &reporter).unwrap();

        assert_eq!(*reporter.estimate.lock().unwrap(), Some(5));
        assert_eq!(report.source_bytes, 5);
        let progress = reporter.progress.lock().unwrap();
        assert!(!progress.is_empty());
        assert!(progress.windows(2).all(|w| w[0].bytes <= w[1].bytes));
        assert_eq!(*reporter.completed.lock().unwrap(), Some(report.stats));
    }

    #[test]
    fn test_cancelled_run_reports_abort_not_completion() {
        let src = tempdir().unwrap();
        let dst = tempdir().unwrap();
        fs::write(src.path().join("a.txt"), "abc").unwrap();
        let catalog = catalog_of(HashAlgorithm::Md5, &[(b"abc", "a.txt")]);

        let engine = ScanEngine::new(RunOptions::new(src.path(), dst.path())).unwrap();
        engine.cancel_token().store(true, Ordering::Relaxed);
        let reporter = RecordingReporter::default();
        let failure = engine.run(&catalog, &reporter).unwrap_err();

        assert!(matches!(failure.error, Error::Cancelled));
        assert_eq!(*reporter.estimate.lock().unwrap(), Some(3), "bar was started");
        assert!(reporter.completed.lock().unwrap().is_none());
        assert_eq!(
            *reporter.aborted.lock().unwrap(),
            Some((RunStats::default(), true))
        );
    }

    #[test]
    fn test_catalog_algorithm_must_match_run() {
        let src = tempdir().unwrap();
        let dst = tempdir().unwrap();
        let catalog = catalog_of(HashAlgorithm::Blake3, &[(b"abc", "a.txt")]);

        let engine = ScanEngine::new(RunOptions::new(src.path(), dst.path())).unwrap();
        let failure = engine.run(&catalog, &SilentReporter).unwrap_err();
        assert!(matches!(failure.error, Error::HashMismatch { .. }));
        assert_eq!(failure.report.stats, RunStats::default());
    }

    #[test]
    fn test_invalid_ignore_pattern_fails_construction() {
        let src = tempdir().unwrap();
        let dst = tempdir().unwrap();
        let options = RunOptions {
            ignore_patterns: vec!["[".to_string()],
            ..RunOptions::new(src.path(), dst.path())
        };
        assert!(matches!(
            ScanEngine::new(options),
            Err(Error::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_parallel_hashing_gives_same_counters() {
        let src = tempdir().unwrap();
        let catalog = catalog_of(
            HashAlgorithm::Md5,
            &[(b"one", "1.txt"), (b"two!", "2.txt"), (b"three", "3.txt")],
        );
        for (i, content) in ["one", "two!", "three", "four", "one"].iter().enumerate() {
            fs::write(src.path().join(format!("f{}", i)), content).unwrap();
        }

        let mut seen = Vec::new();
        for jobs in [1, 4] {
            let dst = tempdir().unwrap();
            let options = RunOptions {
                hash_jobs: jobs,
                dry_run: true,
                ..RunOptions::new(src.path(), dst.path())
            };
            let report = ScanEngine::new(options)
                .unwrap()
                .run(&catalog, &SilentReporter)
                .unwrap();
            seen.push(report.stats);
        }
        assert_eq!(seen[0], seen[1], "hash_jobs must not change results");
        assert_eq!(seen[0].added.count, 3);
        assert_eq!(seen[0].duplicate.count, 1);
    }
}
