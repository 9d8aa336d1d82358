#[cfg(target_os = "windows")]
pub mod windows;

use std::io;
use std::path::Path;

/// Identifies the logical volume a path lives on.
pub type VolumeId = u64;

/// Whether the host OS exposes a hard-link primitive at all.
pub const HAS_HARD_LINKS: bool = cfg!(any(unix, windows));

/// Whether the host OS exposes a symbolic-link primitive at all.
pub const HAS_SYMLINKS: bool = cfg!(any(unix, windows));

#[cfg(unix)]
pub fn volume_id(path: &Path) -> io::Result<VolumeId> {
    use std::os::unix::fs::MetadataExt;
    Ok(std::fs::metadata(path)?.dev())
}

#[cfg(target_os = "windows")]
pub fn volume_id(path: &Path) -> io::Result<VolumeId> {
    windows::volume_serial_number(path).map(VolumeId::from)
}

#[cfg(not(any(unix, target_os = "windows")))]
pub fn volume_id(path: &Path) -> io::Result<VolumeId> {
    std::fs::metadata(path).map(|_| 0)
}

#[cfg(unix)]
pub fn symlink_file(original: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(original, link)
}

#[cfg(target_os = "windows")]
pub fn symlink_file(original: &Path, link: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(original, link)
}

#[cfg(not(any(unix, target_os = "windows")))]
pub fn symlink_file(_original: &Path, _link: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "symbolic links are not available on this platform",
    ))
}

/// True when a link attempt failed for lack of privilege rather than
/// filesystem support.
pub fn is_privilege_error(err: &io::Error) -> bool {
    #[cfg(target_os = "windows")]
    {
        if err.raw_os_error() == Some(winapi::shared::winerror::ERROR_PRIVILEGE_NOT_HELD as i32) {
            return true;
        }
    }
    err.kind() == io::ErrorKind::PermissionDenied
}

/// Check that `dir` accepts new files by creating and dropping a temp file.
pub fn probe_writable(dir: &Path) -> io::Result<()> {
    tempfile::Builder::new()
        .prefix(".reposeer-probe")
        .tempfile_in(dir)
        .map(drop)
}
