use crate::error::{Error, TransferStep};
use crate::scanner;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Removes source directories whose whole subtree holds zero bytes.
///
/// Inactive unless requested, and always inactive during a dry run.
#[derive(Debug)]
pub struct DirectoryReaper {
    active: bool,
    protected: Option<PathBuf>,
    reaped: u64,
}

impl DirectoryReaper {
    pub fn new(remove_empty: bool, dry_run: bool) -> Self {
        Self {
            active: remove_empty && !dry_run,
            protected: None,
            reaped: 0,
        }
    }

    /// Never remove `path` or any directory containing it.
    pub fn protect(mut self, path: &Path) -> Self {
        self.protected = Some(path.to_path_buf());
        self
    }

    pub fn reaped(&self) -> u64 {
        self.reaped
    }

    /// Remove `dir` recursively if it holds no content. Returns whether it was removed.
    pub fn reap(&mut self, dir: &Path) -> Result<bool, Error> {
        if !self.active {
            return Ok(false);
        }
        if let Some(protected) = &self.protected {
            if protected.starts_with(dir) {
                return Ok(false);
            }
        }
        if scanner::dir_size(dir)? != 0 {
            return Ok(false);
        }

        fs::remove_dir_all(dir).map_err(|e| Error::transfer(TransferStep::RemoveDir, dir, e))?;
        self.reaped += 1;
        debug!("Removed empty directory {}", dir.display());
        Ok(true)
    }
}
