//! How a matched file is materialized in the destination repository.

pub mod executor;
pub mod registry;

use crate::error::{Error, TransferStep};
use crate::platform::{self, VolumeId};
use std::fmt;
use std::fs;
use std::io;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

pub use executor::{OutcomeCategory, TransferExecutor, TransferOutcome};
pub use registry::TransferMethodRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TransferMethod {
    #[default]
    Copy,
    Move,
    HardLink,
    SymLink,
}

impl TransferMethod {
    pub const ALL: [TransferMethod; 4] = [
        TransferMethod::Copy,
        TransferMethod::Move,
        TransferMethod::HardLink,
        TransferMethod::SymLink,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            TransferMethod::Copy => "copy",
            TransferMethod::Move => "move",
            TransferMethod::HardLink => "hardlink",
            TransferMethod::SymLink => "symlink",
        }
    }

    /// Whether the method removes the file from the source tree.
    pub fn consumes_source(&self) -> bool {
        matches!(self, TransferMethod::Move)
    }

    fn step(&self) -> TransferStep {
        match self {
            TransferMethod::Copy => TransferStep::Copy,
            TransferMethod::Move => TransferStep::Move,
            TransferMethod::HardLink => TransferStep::HardLink,
            TransferMethod::SymLink => TransferStep::SymLink,
        }
    }
}

impl FromStr for TransferMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "copy" => Ok(TransferMethod::Copy),
            "move" => Ok(TransferMethod::Move),
            "hardlink" | "hard-link" => Ok(TransferMethod::HardLink),
            "symlink" | "soft-link" => Ok(TransferMethod::SymLink),
            _ => Err(Error::UnknownMethod(s.to_string())),
        }
    }
}

impl fmt::Display for TransferMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Why a transfer method cannot be used for this source/destination pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsupportedReason {
    /// The OS has no primitive for this kind of link.
    NoOsPrimitive,
    /// The destination filesystem refused to create the link.
    FilesystemUnsupported,
    /// The process may not create this kind of link.
    InsufficientPrivilege,
    /// Hard links cannot span logical volumes.
    CrossVolume,
}

impl UnsupportedReason {
    pub fn code(&self) -> &'static str {
        match self {
            UnsupportedReason::NoOsPrimitive => "no-os-primitive",
            UnsupportedReason::FilesystemUnsupported => "filesystem-unsupported",
            UnsupportedReason::InsufficientPrivilege => "insufficient-privilege",
            UnsupportedReason::CrossVolume => "cross-volume",
        }
    }
}

impl fmt::Display for UnsupportedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A transfer method that has been checked against the current platform.
///
/// Only [`TransferMethodRegistry::resolve`] hands these out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferOp {
    method: TransferMethod,
    dest_volume: Option<VolumeId>,
}

impl TransferOp {
    pub(crate) fn new(method: TransferMethod) -> Self {
        Self {
            method,
            dest_volume: None,
        }
    }

    /// Hard links check each link target against `volume` before linking.
    pub(crate) fn on_volume(mut self, volume: VolumeId) -> Self {
        self.dest_volume = Some(volume);
        self
    }

    pub fn method(&self) -> TransferMethod {
        self.method
    }

    /// Materialize `source` at `dest`. The parent of `dest` must exist and
    /// `dest` itself must not.
    pub fn apply(&self, source: &Path, dest: &Path) -> Result<(), Error> {
        let result = match self.method {
            TransferMethod::Copy => fs::copy(source, dest).map(drop),
            TransferMethod::Move => move_file(source, dest),
            TransferMethod::HardLink => {
                let target = fs::canonicalize(source)
                    .map_err(|e| Error::transfer(TransferStep::HardLink, source, e))?;
                self.check_link_volume(source, &target)?;
                fs::hard_link(&target, dest)
            }
            TransferMethod::SymLink => fs::canonicalize(source)
                .and_then(|target| platform::symlink_file(&target, dest)),
        };
        result.map_err(|e| Error::transfer(self.method.step(), source, e))
    }

    /// A symlinked source or a mount below the source root can put the link
    /// target on another volume than the roots the registry checked.
    fn check_link_volume(&self, source: &Path, target: &Path) -> Result<(), Error> {
        let Some(dest_volume) = self.dest_volume else {
            return Ok(());
        };
        let target_volume = platform::volume_id(target)
            .map_err(|e| Error::transfer(TransferStep::ReadMetadata, target, e))?;
        if target_volume != dest_volume {
            return Err(Error::UnsupportedForFile {
                method: self.method,
                reason: UnsupportedReason::CrossVolume,
                path: source.to_path_buf(),
            });
        }
        Ok(())
    }
}

/// Rename when possible, otherwise copy the content and drop the source.
///
/// A symlinked source is never renamed: that would move the link, not the
/// content it points at.
fn move_file(source: &Path, dest: &Path) -> io::Result<()> {
    let is_symlink = fs::symlink_metadata(source)?.file_type().is_symlink();
    if !is_symlink {
        match fs::rename(source, dest) {
            Ok(()) => return Ok(()),
            Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
                debug!(
                    "Cross-device move of {}, falling back to copy",
                    source.display()
                );
            }
            Err(e) => return Err(e),
        }
    }
    fs::copy(source, dest)?;
    fs::remove_file(source)
}
