pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod hasher;
pub mod matcher;
pub mod platform;
pub mod progress;
pub mod reaper;
pub mod scanner;
pub mod stats;
pub mod transfer;

pub use catalog::{CatalogError, CatalogIndex, CatalogLoader, CsvLoader, SqliteLoader};
pub use config::{AppConfig, Overrides, RunOptions};
pub use engine::ScanEngine;
pub use error::{Error, RunFailure};
pub use hasher::{ContentHasher, HashAlgorithm, StreamHasher};
pub use matcher::{MatchEngine, MatchResult, ScanCandidate};
pub use progress::{ProgressReporter, SilentReporter};
pub use stats::{Counter, RunReport, RunStats};
pub use transfer::{TransferMethod, TransferMethodRegistry, UnsupportedReason};
