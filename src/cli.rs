use clap::Parser;
use reposeer::config::{Overrides, DEFAULT_CONFIG_NAME};
use reposeer::error::{Error, PathProblem};
use reposeer::UnsupportedReason;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "reposeer", version)]
#[command(about = "Sort files into a repository laid out by a content catalog", long_about = None)]
pub struct Cli {
    /// Directory to scan
    pub source: PathBuf,

    /// Repository root; catalog paths are relative to it
    pub dest: PathBuf,

    /// CSV catalog (filename,filesize,md5)
    #[arg(short, long, value_name = "FILE")]
    pub csv: Option<PathBuf>,

    /// SQLite catalog; takes precedence over --csv
    #[arg(long, value_name = "FILE")]
    pub db: Option<PathBuf>,

    /// Query returning name, size and hash columns
    #[arg(long, value_name = "SQL", requires = "db")]
    pub db_query: Option<String>,

    /// copy, move, hardlink or symlink
    #[arg(short, long)]
    pub method: Option<String>,

    /// Report what would happen without touching the filesystem
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Remove source directories left without content
    #[arg(short, long)]
    pub remove_empty: bool,

    /// Delete source files already present in the repository
    #[arg(short = 'd', long)]
    pub remove_duplicates: bool,

    /// md5 or blake3; must match the catalog
    #[arg(long = "hash", value_name = "ALGORITHM")]
    pub hash_algorithm: Option<String>,

    /// Threads used for hashing
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Skip paths matching this glob (repeatable)
    #[arg(short, long = "ignore", value_name = "GLOB")]
    pub ignore: Vec<String>,

    /// Append a CSV run report to this file
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,

    /// Configuration file name, without extension
    #[arg(long, default_value = DEFAULT_CONFIG_NAME)]
    pub config: String,

    /// More console output; repeat for trace
    #[arg(short, long, action = clap::ArgAction::Count, conflicts_with = "quiet")]
    pub verbose: u8,

    /// Only warnings and errors on the console
    #[arg(short, long)]
    pub quiet: bool,
}

impl Cli {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            method: self.method.clone(),
            hash_algorithm: self.hash_algorithm.clone(),
            ignore_patterns: self.ignore.clone(),
            hash_jobs: self.jobs,
            dry_run: self.dry_run,
            remove_empty: self.remove_empty,
            remove_duplicates: self.remove_duplicates,
        }
    }
}

/// A suggestion for errors the user can fix from the command line.
pub fn hint(error: &Error) -> Option<&'static str> {
    match error {
        Error::UnsupportedMethod { reason, .. } | Error::UnsupportedForFile { reason, .. } => {
            Some(match reason {
                UnsupportedReason::NoOsPrimitive => {
                    "this platform has no such link type; use copy or move"
                }
                UnsupportedReason::FilesystemUnsupported => {
                    "the destination filesystem refused a test link; use copy or move"
                }
                UnsupportedReason::InsufficientPrivilege => {
                    "creating links needs more privileges (on Windows enable Developer Mode or run elevated)"
                }
                UnsupportedReason::CrossVolume => {
                    "hard links cannot cross volumes; use symlink, copy or move"
                }
            })
        }
        Error::Path { problem, .. } => Some(match problem {
            PathProblem::NotFound => "check the path exists",
            PathProblem::NotADirectory => "source and destination must be directories",
            PathProblem::NotReadable => "the source directory cannot be listed",
            PathProblem::NotWritable => "the directory is not writable; --dry-run skips this check",
            PathProblem::SameDirectory => "source and destination must differ",
        }),
        Error::HashMismatch { .. } => Some("pass --hash to match the catalog"),
        Error::Cancelled => Some("partial results are shown above"),
        _ => None,
    }
}
