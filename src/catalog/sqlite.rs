use super::{CatalogEntry, CatalogError, CatalogIndex, CatalogLoader, LOAD_PROGRESS_INTERVAL};
use crate::hasher::HashAlgorithm;
use crate::progress::ProgressReporter;
use rusqlite::{Connection, OpenFlags};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, info};

/// The Library Genesis `updated` table layout.
pub const DEFAULT_CATALOG_QUERY: &str =
    "SELECT Filename, Filesize, MD5 FROM updated WHERE Filename != ''";

/// Loads the catalog from a relational database.
///
/// The query must yield three columns: relative name, size in bytes, hash.
#[derive(Debug, Clone)]
pub struct SqliteLoader {
    path: PathBuf,
    query: String,
    algorithm: HashAlgorithm,
}

impl SqliteLoader {
    pub fn new(path: impl Into<PathBuf>, algorithm: HashAlgorithm) -> Self {
        Self {
            path: path.into(),
            query: DEFAULT_CATALOG_QUERY.to_string(),
            algorithm,
        }
    }

    pub fn with_query(mut self, query: &str) -> Self {
        self.query = query.to_string();
        self
    }
}

impl CatalogLoader for SqliteLoader {
    fn load(&self, reporter: &dyn ProgressReporter) -> Result<CatalogIndex, CatalogError> {
        if !self.path.is_file() {
            return Err(CatalogError::NotFound(self.path.clone()));
        }

        let start = Instant::now();
        info!("Loading catalog from database {}", self.path.display());
        let conn = Connection::open_with_flags(&self.path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        reporter.on_catalog_start(None);

        let mut stmt = conn.prepare(&self.query)?;
        let mut rows = stmt.query([])?;
        let mut entries: Vec<CatalogEntry> = Vec::new();
        let mut row_number = 0u64;

        while let Some(row) = rows.next()? {
            row_number += 1;
            let name: String = row.get(0)?;
            let size: i64 = row.get(1)?;
            let hash: String = row.get(2)?;
            let size = u64::try_from(size).map_err(|_| CatalogError::MalformedRow {
                line: row_number,
                reason: format!("negative size {}", size),
            })?;
            entries.push(CatalogEntry::from_raw(
                self.algorithm,
                row_number,
                &name,
                size,
                &hash,
            )?);
            if row_number % LOAD_PROGRESS_INTERVAL == 0 {
                reporter.on_catalog_progress(row_number);
            }
        }

        let index = CatalogIndex::from_entries(self.algorithm, entries);
        let duration = start.elapsed();
        debug!(
            "Catalog loaded in {:.2}s — {} rows, {} entries",
            duration.as_secs_f64(),
            row_number,
            index.len(),
        );
        reporter.on_catalog_loaded(index.len(), duration.as_secs_f64());
        Ok(index)
    }
}
