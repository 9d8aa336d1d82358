use crate::error::{Error, TransferStep};
use crate::matcher::ScanCandidate;
use glob::Pattern;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Compiled glob ignore patterns.
#[derive(Debug, Default, Clone)]
pub struct IgnoreSet {
    patterns: Vec<Pattern>,
}

impl IgnoreSet {
    pub fn new(globs: &[String]) -> Result<Self, Error> {
        let patterns = globs
            .iter()
            .map(|glob| {
                Pattern::new(glob).map_err(|source| Error::InvalidPattern {
                    pattern: glob.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    pub fn matches(&self, path: &Path) -> bool {
        self.patterns.iter().any(|pattern| pattern.matches_path(path))
    }
}

/// The direct children of one directory, sorted by name.
#[derive(Debug, Default)]
pub struct DirListing {
    pub files: Vec<ScanCandidate>,
    pub subdirs: Vec<PathBuf>,
}

/// List `dir` without descending.
///
/// Symlinks to files become candidates carrying the target's size; symlinks
/// to directories are not followed. Dangling links and special files are
/// skipped. Paths for which `skip` returns true are left out.
pub fn list_dir<F>(dir: &Path, skip: F) -> Result<DirListing, Error>
where
    F: Fn(&Path) -> bool,
{
    let entries =
        fs::read_dir(dir).map_err(|e| Error::transfer(TransferStep::ReadDir, dir, e))?;

    let mut listing = DirListing::default();
    for entry_result in entries {
        let entry = entry_result.map_err(|e| Error::transfer(TransferStep::ReadDir, dir, e))?;
        let path = entry.path();
        if skip(&path) {
            debug!("Skipping {}", path.display());
            continue;
        }

        let file_type = entry
            .file_type()
            .map_err(|e| Error::transfer(TransferStep::ReadMetadata, &path, e))?;

        if file_type.is_dir() {
            listing.subdirs.push(path);
        } else if file_type.is_file() {
            let size = entry
                .metadata()
                .map_err(|e| Error::transfer(TransferStep::ReadMetadata, &path, e))?
                .len();
            listing.files.push(ScanCandidate { path, size });
        } else if file_type.is_symlink() {
            match fs::metadata(&path) {
                Ok(target) if target.is_file() => {
                    listing.files.push(ScanCandidate {
                        path,
                        size: target.len(),
                    });
                }
                Ok(_) => debug!("Not following directory link {}", path.display()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    warn!("Skipping dangling symlink {}", path.display());
                }
                Err(e) => return Err(Error::transfer(TransferStep::ReadMetadata, &path, e)),
            }
        } else {
            debug!("Skipping special file {}", path.display());
        }
    }

    listing.files.sort_by(|a, b| a.path.cmp(&b.path));
    listing.subdirs.sort();
    Ok(listing)
}

/// Total content bytes below `path`, recursively, counted the way
/// [`list_dir`] reads entries: a symlink to a file counts its target's size,
/// directory links are not followed and dangling links count nothing.
pub fn dir_size(path: &Path) -> Result<u64, Error> {
    let mut total = 0u64;
    for entry in WalkDir::new(path) {
        let entry = entry.map_err(|e| {
            let failed = e.path().unwrap_or(path).to_path_buf();
            Error::transfer(TransferStep::ReadDir, failed, io::Error::from(e))
        })?;
        let file_type = entry.file_type();
        if file_type.is_file() {
            total += entry
                .metadata()
                .map_err(|e| {
                    Error::transfer(
                        TransferStep::ReadMetadata,
                        entry.path(),
                        io::Error::from(e),
                    )
                })?
                .len();
        } else if file_type.is_symlink() {
            match fs::metadata(entry.path()) {
                Ok(target) if target.is_file() => total += target.len(),
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(Error::transfer(
                        TransferStep::ReadMetadata,
                        entry.path(),
                        e,
                    ))
                }
            }
        }
    }
    Ok(total)
}
