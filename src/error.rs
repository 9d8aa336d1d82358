use crate::catalog::CatalogError;
use crate::hasher::HashAlgorithm;
use crate::stats::RunReport;
use crate::transfer::{TransferMethod, UnsupportedReason};
use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Unknown transfer method '{0}'")]
    UnknownMethod(String),

    #[error("Unknown hash algorithm '{0}'")]
    UnknownHashAlgorithm(String),

    #[error("Invalid ignore pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("Catalog is keyed by {catalog} but the run hashes with {run}")]
    HashMismatch {
        catalog: HashAlgorithm,
        run: HashAlgorithm,
    },

    #[error("Invalid hash worker count: {0}")]
    InvalidJobs(String),

    #[error("{}: {problem}", .path.display())]
    Path { path: PathBuf, problem: PathProblem },

    #[error("Transfer method '{method}' is unsupported: {reason}")]
    UnsupportedMethod {
        method: TransferMethod,
        reason: UnsupportedReason,
    },

    #[error("Transfer method '{method}' is unsupported for {}: {reason}", .path.display())]
    UnsupportedForFile {
        method: TransferMethod,
        reason: UnsupportedReason,
        path: PathBuf,
    },

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("{step} failed for {}: {source}", .path.display())]
    Transfer {
        step: TransferStep,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Run interrupted")]
    Cancelled,
}

impl Error {
    pub fn transfer(step: TransferStep, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::Transfer {
            step,
            path: path.into(),
            source,
        }
    }

    pub fn path(path: impl Into<PathBuf>, problem: PathProblem) -> Self {
        Error::Path {
            path: path.into(),
            problem,
        }
    }

    /// Errors raised before any file is touched.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::Config(_)
                | Error::UnknownMethod(_)
                | Error::UnknownHashAlgorithm(_)
                | Error::InvalidPattern { .. }
                | Error::HashMismatch { .. }
                | Error::InvalidJobs(_)
                | Error::Path { .. }
        )
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Cancelled => 130,
            _ => 1,
        }
    }
}

/// Why a source or destination path failed preflight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathProblem {
    NotFound,
    NotADirectory,
    NotReadable,
    NotWritable,
    SameDirectory,
}

impl PathProblem {
    pub fn code(&self) -> &'static str {
        match self {
            PathProblem::NotFound => "not-found",
            PathProblem::NotADirectory => "not-a-directory",
            PathProblem::NotReadable => "not-readable",
            PathProblem::NotWritable => "not-writable",
            PathProblem::SameDirectory => "same-directory",
        }
    }
}

impl fmt::Display for PathProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// The filesystem step a [`Error::Transfer`] happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStep {
    ReadDir,
    ReadMetadata,
    Hash,
    CheckDestination,
    CreateDir,
    Copy,
    Move,
    HardLink,
    SymLink,
    RemoveDuplicate,
    RemoveDir,
}

impl TransferStep {
    pub fn code(&self) -> &'static str {
        match self {
            TransferStep::ReadDir => "read-dir",
            TransferStep::ReadMetadata => "read-metadata",
            TransferStep::Hash => "hash",
            TransferStep::CheckDestination => "check-destination",
            TransferStep::CreateDir => "create-dir",
            TransferStep::Copy => "copy",
            TransferStep::Move => "move",
            TransferStep::HardLink => "hard-link",
            TransferStep::SymLink => "symlink",
            TransferStep::RemoveDuplicate => "remove-duplicate",
            TransferStep::RemoveDir => "remove-dir",
        }
    }
}

impl fmt::Display for TransferStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A scan that stopped early. Carries whatever the run counted before it stopped.
#[derive(Error, Debug)]
#[error("{error}")]
pub struct RunFailure {
    pub report: RunReport,
    #[source]
    pub error: Error,
}

impl RunFailure {
    pub fn is_cancelled(&self) -> bool {
        matches!(self.error, Error::Cancelled)
    }
}
