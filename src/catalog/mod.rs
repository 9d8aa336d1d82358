//! Known-content catalog: content hash → canonical relative path and size.
//!
//! The index is built once by a [`CatalogLoader`] before the scan starts and
//! is read-only afterwards. Duplicate hashes are last-write-wins.

pub mod csv;
pub mod sqlite;

use crate::hasher::HashAlgorithm;
use crate::progress::ProgressReporter;
use ahash::{AHashMap, AHashSet};
use std::io;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::debug;

pub use self::csv::CsvLoader;
pub use self::sqlite::SqliteLoader;

/// Rows between catalog load progress updates.
pub const LOAD_PROGRESS_INTERVAL: u64 = 10_000;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Catalog {} not found", .0.display())]
    NotFound(PathBuf),

    #[error("Error reading catalog {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] ::csv::Error),

    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Malformed catalog row at line {line}: {reason}")]
    MalformedRow { line: u64, reason: String },

    #[error("Invalid content hash '{value}' at line {line}")]
    InvalidHash { line: u64, value: String },

    #[error("Unsafe catalog path '{path}' at line {line}")]
    UnsafePath { line: u64, path: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub content_hash: String,
    pub canonical_path: PathBuf,
    pub size_bytes: u64,
}

impl CatalogEntry {
    /// Validate and normalize a raw catalog row.
    ///
    /// `line` is only used for error reporting.
    pub fn from_raw(
        algorithm: HashAlgorithm,
        line: u64,
        name: &str,
        size_bytes: u64,
        hash: &str,
    ) -> Result<Self, CatalogError> {
        let content_hash = hash.trim().to_ascii_lowercase();
        if !algorithm.is_valid_hex(&content_hash) {
            return Err(CatalogError::InvalidHash {
                line,
                value: hash.to_string(),
            });
        }

        let canonical_path =
            normalize_relative_path(name).ok_or_else(|| CatalogError::UnsafePath {
                line,
                path: name.to_string(),
            })?;

        Ok(Self {
            content_hash,
            canonical_path,
            size_bytes,
        })
    }
}

/// Turn a catalog path into a relative path that stays inside the destination.
///
/// Both `/` and `\` separate components. Returns `None` for empty, absolute,
/// or parent-escaping paths.
pub fn normalize_relative_path(raw: &str) -> Option<PathBuf> {
    let mut normalized = PathBuf::new();
    for part in raw.split(['/', '\\']) {
        if part.is_empty() || part == "." {
            continue;
        }
        let mut components = Path::new(part).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(name)), None) => normalized.push(name),
            _ => return None,
        }
    }
    if raw.starts_with(['/', '\\']) || normalized.as_os_str().is_empty() {
        return None;
    }
    Some(normalized)
}

/// In-memory catalog with a derived set of sizes for the cheap pre-filter.
#[derive(Debug, Default)]
pub struct CatalogIndex {
    algorithm: HashAlgorithm,
    entries: AHashMap<String, CatalogEntry>,
    sizes: AHashSet<u64>,
}

impl CatalogIndex {
    pub fn from_entries<I>(algorithm: HashAlgorithm, entries: I) -> Self
    where
        I: IntoIterator<Item = CatalogEntry>,
    {
        let mut map: AHashMap<String, CatalogEntry> = AHashMap::new();
        let mut replaced = 0usize;
        for entry in entries {
            if map.insert(entry.content_hash.clone(), entry).is_some() {
                replaced += 1;
            }
        }
        if replaced > 0 {
            debug!("{} catalog rows replaced an earlier row with the same hash", replaced);
        }
        let sizes = map.values().map(|e| e.size_bytes).collect();
        Self {
            algorithm,
            entries: map,
            sizes,
        }
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    pub fn lookup(&self, content_hash: &str) -> Option<&CatalogEntry> {
        self.entries.get(content_hash)
    }

    pub fn contains_size(&self, size_bytes: u64) -> bool {
        self.sizes.contains(&size_bytes)
    }

    /// Number of distinct hashes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn distinct_sizes(&self) -> usize {
        self.sizes.len()
    }
}

/// Produces a finished [`CatalogIndex`]. Any failure aborts the load; no
/// partial catalog is ever returned.
pub trait CatalogLoader {
    fn load(&self, reporter: &dyn ProgressReporter) -> Result<CatalogIndex, CatalogError>;
}
