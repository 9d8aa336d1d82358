use super::{CatalogEntry, CatalogError, CatalogIndex, CatalogLoader, LOAD_PROGRESS_INTERVAL};
use crate::hasher::HashAlgorithm;
use crate::progress::ProgressReporter;
use ::csv::{ReaderBuilder, StringRecord, Trim};
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, info};

/// Loads a `filename,filesize,md5` CSV dump.
///
/// A header row is optional: the first row is treated as a header when its
/// size column does not parse as an integer.
#[derive(Debug, Clone)]
pub struct CsvLoader {
    path: PathBuf,
    algorithm: HashAlgorithm,
}

impl CsvLoader {
    pub fn new(path: impl Into<PathBuf>, algorithm: HashAlgorithm) -> Self {
        Self {
            path: path.into(),
            algorithm,
        }
    }

    fn io_error(&self, source: std::io::Error) -> CatalogError {
        CatalogError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn count_lines(&self) -> Result<u64, CatalogError> {
        let file = File::open(&self.path).map_err(|e| self.io_error(e))?;
        let mut count = 0u64;
        for line in BufReader::new(file).lines() {
            line.map_err(|e| self.io_error(e))?;
            count += 1;
        }
        Ok(count)
    }

    fn parse_record(&self, record: &StringRecord) -> Result<CatalogEntry, CatalogError> {
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        if record.len() < 3 {
            return Err(CatalogError::MalformedRow {
                line,
                reason: format!("expected 3 columns, found {}", record.len()),
            });
        }
        let size = record[1]
            .parse::<u64>()
            .map_err(|e| CatalogError::MalformedRow {
                line,
                reason: format!("invalid size '{}': {}", &record[1], e),
            })?;
        CatalogEntry::from_raw(self.algorithm, line, &record[0], size, &record[2])
    }
}

impl CatalogLoader for CsvLoader {
    fn load(&self, reporter: &dyn ProgressReporter) -> Result<CatalogIndex, CatalogError> {
        if !self.path.is_file() {
            return Err(CatalogError::NotFound(self.path.clone()));
        }

        let start = Instant::now();
        reporter.on_catalog_start(Some(self.count_lines()?));
        info!("Loading catalog from {}", self.path.display());

        let file = fs::File::open(&self.path).map_err(|e| self.io_error(e))?;
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .delimiter(b',')
            .quote(b'"')
            .flexible(true)
            .trim(Trim::Fields)
            .from_reader(file);

        let mut entries: Vec<CatalogEntry> = Vec::new();
        let mut record = StringRecord::new();
        let mut rows = 0u64;

        while reader.read_record(&mut record)? {
            rows += 1;
            if rows == 1 && record.len() >= 2 && record[1].parse::<u64>().is_err() {
                debug!("Skipping CSV header: {:?}", record);
                continue;
            }
            entries.push(self.parse_record(&record)?);
            if rows % LOAD_PROGRESS_INTERVAL == 0 {
                reporter.on_catalog_progress(rows);
            }
        }

        let index = CatalogIndex::from_entries(self.algorithm, entries);
        let duration = start.elapsed();
        debug!(
            "Catalog loaded in {:.2}s — {} rows, {} entries, {} distinct sizes",
            duration.as_secs_f64(),
            rows,
            index.len(),
            index.distinct_sizes(),
        );
        reporter.on_catalog_loaded(index.len(), duration.as_secs_f64());
        Ok(index)
    }
}
