use super::TransferOp;
use crate::error::{Error, TransferStep};
use crate::matcher::{MatchResult, ScanCandidate};
use crate::stats::RunStats;
use ahash::AHashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeCategory {
    Added,
    Duplicate,
    Unmatched,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferOutcome {
    pub category: OutcomeCategory,
    pub bytes: u64,
}

/// Applies match results to the destination and owns the run counters.
///
/// Runs on a single thread: the duplicate check depends on what earlier
/// files in the same run already created.
pub struct TransferExecutor {
    dest_root: PathBuf,
    op: TransferOp,
    dry_run: bool,
    remove_duplicates: bool,
    stats: RunStats,
    /// Destinations a dry run pretended to create.
    simulated: AHashSet<PathBuf>,
}

impl TransferExecutor {
    pub fn new(dest_root: &Path, op: TransferOp, dry_run: bool, remove_duplicates: bool) -> Self {
        Self {
            dest_root: dest_root.to_path_buf(),
            op,
            dry_run,
            remove_duplicates,
            stats: RunStats::default(),
            simulated: AHashSet::new(),
        }
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    pub fn into_stats(self) -> RunStats {
        self.stats
    }

    pub fn execute(
        &mut self,
        candidate: &ScanCandidate,
        result: &MatchResult,
    ) -> Result<TransferOutcome, Error> {
        let outcome = match result {
            MatchResult::Unmatched => TransferOutcome {
                category: OutcomeCategory::Unmatched,
                bytes: candidate.size,
            },
            MatchResult::Matched { target, .. } => {
                let dest = self.dest_root.join(target);
                if self.destination_exists(&dest)? {
                    self.handle_duplicate(candidate, &dest)?;
                    self.stats.duplicate.record(candidate.size);
                    TransferOutcome {
                        category: OutcomeCategory::Duplicate,
                        bytes: candidate.size,
                    }
                } else {
                    self.add(candidate, &dest)?;
                    self.stats.added.record(candidate.size);
                    TransferOutcome {
                        category: OutcomeCategory::Added,
                        bytes: candidate.size,
                    }
                }
            }
        };
        self.stats.processed.record(candidate.size);
        Ok(outcome)
    }

    fn destination_exists(&self, dest: &Path) -> Result<bool, Error> {
        if self.dry_run && self.simulated.contains(dest) {
            return Ok(true);
        }
        match fs::symlink_metadata(dest) {
            Ok(meta) if meta.is_dir() => Err(Error::transfer(
                TransferStep::CheckDestination,
                dest,
                io::Error::new(io::ErrorKind::AlreadyExists, "destination is a directory"),
            )),
            Ok(_) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::transfer(TransferStep::CheckDestination, dest, e)),
        }
    }

    fn handle_duplicate(&mut self, candidate: &ScanCandidate, dest: &Path) -> Result<(), Error> {
        debug!(
            "Duplicate: {} already present as {}",
            candidate.path.display(),
            dest.display()
        );
        if !self.remove_duplicates || self.dry_run {
            return Ok(());
        }
        if resolves_to_same_file(&candidate.path, dest) {
            debug!(
                "Keeping {}: destination resolves to it",
                candidate.path.display()
            );
            return Ok(());
        }
        fs::remove_file(&candidate.path)
            .map_err(|e| Error::transfer(TransferStep::RemoveDuplicate, &candidate.path, e))?;
        self.stats.removed_sources += 1;
        info!("Removed duplicate {}", candidate.path.display());
        Ok(())
    }

    fn add(&mut self, candidate: &ScanCandidate, dest: &Path) -> Result<(), Error> {
        if self.dry_run {
            debug!(
                "Dry run: would {} {} -> {}",
                self.op.method(),
                candidate.path.display(),
                dest.display()
            );
            self.simulated.insert(dest.to_path_buf());
            return Ok(());
        }

        if let Some(parent) = dest.parent() {
            // create_dir_all already tolerates existing directories
            fs::create_dir_all(parent)
                .map_err(|e| Error::transfer(TransferStep::CreateDir, parent, e))?;
        }
        self.op.apply(&candidate.path, dest)?;
        debug!(
            "Added {} -> {} ({})",
            candidate.path.display(),
            dest.display(),
            self.op.method()
        );
        Ok(())
    }
}

fn resolves_to_same_file(source: &Path, dest: &Path) -> bool {
    match (fs::canonicalize(source), fs::canonicalize(dest)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transfer::TransferMethod;
    use tempfile::tempdir;

    fn matched(target: &str) -> MatchResult {
        MatchResult::Matched {
            content_hash: "900150983cd24fb0d6963f7d28e17f72".to_string(),
            target: PathBuf::from(target),
        }
    }

    fn write_candidate(path: &Path, content: &str) -> ScanCandidate {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
        ScanCandidate {
            path: path.to_path_buf(),
            size: content.len() as u64,
        }
    }

    #[test]
    fn test_unmatched_only_counts_processed() {
        let src = tempdir().unwrap();
        let dst = tempdir().unwrap();
        let c = write_candidate(&src.path().join("b.txt"), "xy");
        let mut exec =
            TransferExecutor::new(dst.path(), TransferOp::new(TransferMethod::Copy), false, true);

        let outcome = exec.execute(&c, &MatchResult::Unmatched).unwrap();
        assert_eq!(outcome.category, OutcomeCategory::Unmatched);
        assert_eq!(exec.stats().processed.count, 1);
        assert_eq!(exec.stats().added.count, 0);
        assert!(c.path.exists(), "unmatched source must never be removed");
    }

    #[test]
    fn test_add_creates_parent_dirs() {
        let src = tempdir().unwrap();
        let dst = tempdir().unwrap();
        let c = write_candidate(&src.path().join("x").join("a.txt"), "abc");
        let mut exec =
            TransferExecutor::new(dst.path(), TransferOp::new(TransferMethod::Copy), false, false);

        let outcome = exec.execute(&c, &matched("books/deep/a.txt")).unwrap();
        assert_eq!(outcome.category, OutcomeCategory::Added);
        assert_eq!(
            fs::read_to_string(dst.path().join("books/deep/a.txt")).unwrap(),
            "abc"
        );
    }

    #[test]
    fn test_remove_duplicates_never_deletes_added_source() {
        let src = tempdir().unwrap();
        let dst = tempdir().unwrap();
        let c = write_candidate(&src.path().join("a.txt"), "abc");
        let mut exec =
            TransferExecutor::new(dst.path(), TransferOp::new(TransferMethod::Copy), false, true);

        exec.execute(&c, &matched("a.txt")).unwrap();
        assert!(c.path.exists());
        assert_eq!(exec.stats().removed_sources, 0);
    }

    #[test]
    fn test_second_identical_file_in_dry_run_is_duplicate() {
        let src = tempdir().unwrap();
        let dst = tempdir().unwrap();
        let first = write_candidate(&src.path().join("1.txt"), "abc");
        let second = write_candidate(&src.path().join("2.txt"), "abc");
        let mut exec =
            TransferExecutor::new(dst.path(), TransferOp::new(TransferMethod::Copy), true, true);

        let a = exec.execute(&first, &matched("a.txt")).unwrap();
        let b = exec.execute(&second, &matched("a.txt")).unwrap();
        assert_eq!(a.category, OutcomeCategory::Added);
        assert_eq!(b.category, OutcomeCategory::Duplicate);
        assert!(second.path.exists(), "dry run must not remove anything");
        assert_eq!(fs::read_dir(dst.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_directory_at_destination_is_error() {
        let src = tempdir().unwrap();
        let dst = tempdir().unwrap();
        fs::create_dir_all(dst.path().join("a.txt")).unwrap();
        let c = write_candidate(&src.path().join("a.txt"), "abc");
        let mut exec =
            TransferExecutor::new(dst.path(), TransferOp::new(TransferMethod::Copy), false, true);

        let err = exec.execute(&c, &matched("a.txt")).unwrap_err();
        assert!(matches!(
            err,
            Error::Transfer { step: TransferStep::CheckDestination, .. }
        ));
        assert!(c.path.exists());
        assert_eq!(exec.stats().processed.count, 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_remove_duplicates_keeps_source_behind_symlink_destination() {
        let src = tempdir().unwrap();
        let dst = tempdir().unwrap();
        let c = write_candidate(&src.path().join("a.txt"), "abc");
        std::os::unix::fs::symlink(&c.path, dst.path().join("a.txt")).unwrap();
        let mut exec = TransferExecutor::new(
            dst.path(),
            TransferOp::new(TransferMethod::SymLink),
            false,
            true,
        );

        let outcome = exec.execute(&c, &matched("a.txt")).unwrap();
        assert_eq!(outcome.category, OutcomeCategory::Duplicate);
        assert!(c.path.exists(), "deleting would leave a dangling link");
        assert_eq!(exec.stats().removed_sources, 0);
    }
}
