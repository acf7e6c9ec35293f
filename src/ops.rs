//! One-shot file helpers: each is a single OS call with its failure mapped
//! into [`FileError`].

use std::fs;
use std::path::Path;

use log::{debug, warn};

use crate::error::FileError;
use crate::file::OutputMode;
use crate::output::OutputFile;
use crate::{Resource, Result, Writable};

/// Writes `buf` to a fresh file at `path`, replacing any previous contents.
///
/// Meant for diagnostics only; the file is created with mode `0600`.
///
/// # Examples
///
/// ```rust
/// let dir = tempfile::tempdir().unwrap();
/// let path = dir.path().join("diag.bin");
/// extentfs::dump(&path, b"\x7fELF").unwrap();
/// assert_eq!(std::fs::read(&path).unwrap(), b"\x7fELF");
/// ```
pub fn dump(path: impl AsRef<Path>, buf: &[u8]) -> Result<()> {
    let path = path.as_ref();
    debug!("dumping {} bytes to {}", buf.len(), path.display());
    let mut out = OutputFile::open(path, OutputMode::Truncate, Some(0o600))?;
    let result = out.write(buf, buf.len() as u64);
    out.close_after(result)
}

/// Sets the permission bits of `path`. Does nothing on platforms without
/// unix permissions.
pub fn chmod(path: impl AsRef<Path>, mode: u32) -> Result<()> {
    let path = path.as_ref();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(mode))
            .map_err(|err| FileError::from_io(&path.display().to_string(), "chmod error", &err))?;
    }
    #[cfg(not(unix))]
    let _ = (path, mode);
    Ok(())
}

/// Renames `from` to `to`.
pub fn rename(from: impl AsRef<Path>, to: impl AsRef<Path>) -> Result<()> {
    let from = from.as_ref();
    fs::rename(from, to.as_ref())
        .map_err(|err| FileError::from_io(&from.display().to_string(), "rename error", &err))
}

/// Removes `path`, retrying once after making it writable. Never fails;
/// returns whether the file is gone.
pub fn unlink_noexcept(path: impl AsRef<Path>) -> bool {
    let path = path.as_ref();
    if fs::remove_file(path).is_ok() {
        return true;
    }
    let removed = make_writable(path) && fs::remove_file(path).is_ok();
    if !removed {
        warn!("{}: could not be removed", path.display());
    }
    removed
}

/// Removes `path`, retrying once after making it writable.
pub fn unlink(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if unlink_noexcept(path) {
        return Ok(());
    }
    let err = match fs::symlink_metadata(path) {
        Ok(_) => std::io::Error::from_raw_os_error(libc::EACCES),
        Err(err) => err,
    };
    Err(FileError::from_io(&path.display().to_string(), "unlink error", &err))
}

#[cfg(unix)]
fn make_writable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o666)).is_ok()
}

#[cfg(not(unix))]
fn make_writable(path: &Path) -> bool {
    let Ok(metadata) = fs::metadata(path) else {
        return false;
    };
    let mut permissions = metadata.permissions();
    permissions.set_readonly(false);
    fs::set_permissions(path, permissions).is_ok()
}
