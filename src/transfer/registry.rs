use super::{TransferMethod, TransferOp, UnsupportedReason};
use crate::error::{Error, TransferStep};
use crate::platform::{self, VolumeId};
use std::fs;
use std::io;
use std::path::Path;
use tracing::debug;

type Capability = Result<(), UnsupportedReason>;

/// Capability table for every [`TransferMethod`], probed once per run.
#[derive(Debug, Clone)]
pub struct TransferMethodRegistry {
    capabilities: [(TransferMethod, Capability); 4],
    dest_volume: VolumeId,
}

impl TransferMethodRegistry {
    /// Probe the host for the given source/destination roots.
    ///
    /// With `probe_links` false no test links are written and only the
    /// OS and volume checks run. Dry runs use this so they mutate nothing.
    pub fn probe(source_root: &Path, dest_root: &Path, probe_links: bool) -> Result<Self, Error> {
        Self::probe_with(source_root, dest_root, probe_links, platform::volume_id)
    }

    /// Like [`probe`](Self::probe) with a custom volume resolver.
    pub fn probe_with<F>(
        source_root: &Path,
        dest_root: &Path,
        probe_links: bool,
        volume_of: F,
    ) -> Result<Self, Error>
    where
        F: Fn(&Path) -> io::Result<VolumeId>,
    {
        let source_volume = volume_of(source_root)
            .map_err(|e| Error::transfer(TransferStep::ReadMetadata, source_root, e))?;
        let dest_volume = volume_of(dest_root)
            .map_err(|e| Error::transfer(TransferStep::ReadMetadata, dest_root, e))?;
        let same_volume = source_volume == dest_volume;

        let hard_link = if !platform::HAS_HARD_LINKS {
            Err(UnsupportedReason::NoOsPrimitive)
        } else if !same_volume {
            Err(UnsupportedReason::CrossVolume)
        } else if probe_links {
            probe_link(dest_root, |original, link| fs::hard_link(original, link))
        } else {
            Ok(())
        };

        let sym_link = if !platform::HAS_SYMLINKS {
            Err(UnsupportedReason::NoOsPrimitive)
        } else if probe_links {
            probe_link(dest_root, platform::symlink_file)
        } else {
            Ok(())
        };

        let registry = Self {
            capabilities: [
                (TransferMethod::Copy, Ok(())),
                (TransferMethod::Move, Ok(())),
                (TransferMethod::HardLink, hard_link),
                (TransferMethod::SymLink, sym_link),
            ],
            dest_volume,
        };
        debug!("Transfer capabilities: {:?}", registry.capabilities);
        Ok(registry)
    }

    pub fn capability(&self, method: TransferMethod) -> Capability {
        self.capabilities
            .iter()
            .find(|(m, _)| *m == method)
            .map(|(_, capability)| *capability)
            .unwrap_or(Err(UnsupportedReason::NoOsPrimitive))
    }

    pub fn resolve(&self, method: TransferMethod) -> Result<TransferOp, Error> {
        self.capability(method)
            .map(|()| match method {
                TransferMethod::HardLink => TransferOp::new(method).on_volume(self.dest_volume),
                _ => TransferOp::new(method),
            })
            .map_err(|reason| Error::UnsupportedMethod { method, reason })
    }
}

/// Create a scratch file inside `dir` and try to link it.
fn probe_link<F>(dir: &Path, link: F) -> Capability
where
    F: Fn(&Path, &Path) -> io::Result<()>,
{
    let attempt = || -> io::Result<()> {
        let scratch = tempfile::Builder::new()
            .prefix(".reposeer-probe")
            .tempdir_in(dir)?;
        let original = scratch.path().join("original");
        fs::write(&original, b"probe")?;
        link(&original, &scratch.path().join("link"))
    };

    match attempt() {
        Ok(()) => Ok(()),
        Err(e) if platform::is_privilege_error(&e) => {
            debug!("Link probe in {} denied: {}", dir.display(), e);
            Err(UnsupportedReason::InsufficientPrivilege)
        }
        Err(e) => {
            debug!("Link probe in {} failed: {}", dir.display(), e);
            Err(UnsupportedReason::FilesystemUnsupported)
        }
    }
}
