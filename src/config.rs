use crate::catalog::sqlite::DEFAULT_CATALOG_QUERY;
use crate::error::{Error, PathProblem};
use crate::hasher::HashAlgorithm;
use crate::platform;
use crate::transfer::TransferMethod;
use config::{Config, ConfigError, Environment, File as ConfigFile};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const DEFAULT_CONFIG_NAME: &str = "Config";

/// Settings read from `Config.toml` and `REPOSEER_*` variables.
///
/// Method and algorithm stay strings here so that a bad value surfaces as a
/// typed configuration error from [`RunOptions::resolve`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub catalog_csv: Option<String>,
    pub catalog_db: Option<String>,
    pub catalog_query: String,
    pub method: String,
    pub hash_algorithm: String,
    pub ignore_patterns: Vec<String>,
    pub hash_jobs: usize,
    pub report_path: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            catalog_csv: Some("libgen.csv".to_string()),
            catalog_db: None,
            catalog_query: DEFAULT_CATALOG_QUERY.to_string(),
            method: TransferMethod::Copy.name().to_string(),
            hash_algorithm: HashAlgorithm::Md5.to_string(),
            ignore_patterns: Vec::new(),
            hash_jobs: 1,
            report_path: None,
        }
    }
}

impl AppConfig {
    pub fn load(config_name: &str) -> Result<AppConfig, ConfigError> {
        let builder = Config::builder()
            .add_source(ConfigFile::with_name(config_name).required(false))
            .add_source(
                Environment::with_prefix("REPOSEER")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("ignore_patterns"),
            )
            .build()?;
        builder.try_deserialize::<AppConfig>()
    }
}

/// Command-line values that take precedence over [`AppConfig`].
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub method: Option<String>,
    pub hash_algorithm: Option<String>,
    /// Added to the configured patterns, not replacing them.
    pub ignore_patterns: Vec<String>,
    pub hash_jobs: Option<usize>,
    pub dry_run: bool,
    pub remove_empty: bool,
    pub remove_duplicates: bool,
}

/// Validated settings for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    pub source: PathBuf,
    pub dest: PathBuf,
    pub method: TransferMethod,
    pub dry_run: bool,
    pub remove_empty: bool,
    pub remove_duplicates: bool,
    pub hash_algorithm: HashAlgorithm,
    pub ignore_patterns: Vec<String>,
    pub hash_jobs: usize,
}

impl RunOptions {
    /// Copy mode, MD5, one hashing thread, no optional behaviour.
    pub fn new(source: impl Into<PathBuf>, dest: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            dest: dest.into(),
            method: TransferMethod::default(),
            dry_run: false,
            remove_empty: false,
            remove_duplicates: false,
            hash_algorithm: HashAlgorithm::default(),
            ignore_patterns: Vec::new(),
            hash_jobs: 1,
        }
    }

    pub fn resolve(
        source: impl Into<PathBuf>,
        dest: impl Into<PathBuf>,
        config: &AppConfig,
        overrides: &Overrides,
    ) -> Result<Self, Error> {
        let method = overrides
            .method
            .as_deref()
            .unwrap_or(&config.method)
            .parse::<TransferMethod>()?;
        let hash_algorithm = overrides
            .hash_algorithm
            .as_deref()
            .unwrap_or(&config.hash_algorithm)
            .parse::<HashAlgorithm>()?;

        let mut ignore_patterns = config.ignore_patterns.clone();
        ignore_patterns.extend(overrides.ignore_patterns.iter().cloned());

        Ok(Self {
            method,
            dry_run: overrides.dry_run,
            remove_empty: overrides.remove_empty,
            remove_duplicates: overrides.remove_duplicates,
            hash_algorithm,
            ignore_patterns,
            hash_jobs: overrides.hash_jobs.unwrap_or(config.hash_jobs),
            ..RunOptions::new(source, dest)
        })
    }

    /// Whether the run may delete anything below the source root.
    pub fn mutates_source(&self) -> bool {
        self.method.consumes_source() || self.remove_empty || self.remove_duplicates
    }

    /// Check both roots and return a copy with canonical paths.
    ///
    /// Writability is probed with a temporary file, so outside a dry run this
    /// briefly creates files in the destination (and the source when it can
    /// be modified).
    pub fn preflight(&self) -> Result<RunOptions, Error> {
        if self.hash_jobs == 0 {
            return Err(Error::InvalidJobs("must be at least 1".to_string()));
        }

        let source = existing_dir(&self.source)?;
        let dest = existing_dir(&self.dest)?;
        if source == dest {
            return Err(Error::path(dest, PathProblem::SameDirectory));
        }

        fs::read_dir(&source).map_err(|_| Error::path(&source, PathProblem::NotReadable))?;

        if !self.dry_run {
            platform::probe_writable(&dest)
                .map_err(|_| Error::path(&dest, PathProblem::NotWritable))?;
            if self.mutates_source() {
                platform::probe_writable(&source)
                    .map_err(|_| Error::path(&source, PathProblem::NotWritable))?;
            }
        }

        debug!("Preflight passed: {} -> {}", source.display(), dest.display());
        Ok(RunOptions {
            source,
            dest,
            ..self.clone()
        })
    }
}

fn existing_dir(path: &Path) -> Result<PathBuf, Error> {
    let meta = fs::metadata(path).map_err(|_| Error::path(path, PathProblem::NotFound))?;
    if !meta.is_dir() {
        return Err(Error::path(path, PathProblem::NotADirectory));
    }
    fs::canonicalize(path).map_err(|_| Error::path(path, PathProblem::NotFound))
}
