use crate::catalog::CatalogIndex;
use crate::error::{Error, TransferStep};
use crate::hasher::ContentHasher;
use rayon::prelude::*;
use rayon::ThreadPool;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::trace;

/// A regular file found by the walk. Transient: consumed immediately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanCandidate {
    pub path: PathBuf,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchResult {
    Unmatched,
    /// The content is in the catalog. Whether the target already exists is
    /// decided by the executor.
    Matched {
        content_hash: String,
        target: PathBuf,
    },
}

impl MatchResult {
    pub fn is_matched(&self) -> bool {
        matches!(self, MatchResult::Matched { .. })
    }
}

/// Two-stage catalog match:
/// 1. Size pre-filter against the catalog's size set (no I/O beyond stat)
/// 2. Streaming content hash, only for files whose size is in the catalog
pub struct MatchEngine<'a, H: ContentHasher> {
    catalog: &'a CatalogIndex,
    hasher: &'a H,
}

impl<'a, H: ContentHasher> MatchEngine<'a, H> {
    pub fn new(catalog: &'a CatalogIndex, hasher: &'a H) -> Self {
        Self { catalog, hasher }
    }

    pub fn classify(&self, candidate: &ScanCandidate) -> Result<MatchResult, Error> {
        if !self.catalog.contains_size(candidate.size) {
            return Ok(MatchResult::Unmatched);
        }

        let content_hash = self
            .hasher
            .hash_file(&candidate.path)
            .map_err(|e| Error::transfer(TransferStep::Hash, &candidate.path, e))?;

        match self.catalog.lookup(&content_hash) {
            Some(entry) => {
                trace!(
                    "{} matches catalog entry {}",
                    candidate.path.display(),
                    entry.canonical_path.display()
                );
                Ok(MatchResult::Matched {
                    target: entry.canonical_path.clone(),
                    content_hash,
                })
            }
            None => {
                trace!("{}: size collision only", candidate.path.display());
                Ok(MatchResult::Unmatched)
            }
        }
    }

    /// Classify a batch, in input order. With a pool the hashing runs in
    /// parallel; nothing here touches shared mutable state.
    pub fn classify_all(
        &self,
        candidates: &[ScanCandidate],
        pool: Option<&ThreadPool>,
        cancel: &AtomicBool,
    ) -> Vec<Result<MatchResult, Error>> {
        let classify = |candidate: &ScanCandidate| {
            if cancel.load(Ordering::Relaxed) {
                return Err(Error::Cancelled);
            }
            self.classify(candidate)
        };

        match pool {
            Some(pool) => pool.install(|| candidates.par_iter().map(classify).collect()),
            None => candidates.iter().map(classify).collect(),
        }
    }
}
