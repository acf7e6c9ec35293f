use std::fs;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::backend::{RawRead, RawResource, RawWrite};

/// How an output file is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// Create the file, truncating it if it already exists.
    #[default]
    Truncate,
    /// Create the file, failing with `AlreadyExists` if it is present.
    CreateNew,
    /// Open an existing file for reading and writing without truncating it.
    Update,
}

/// An operating-system file handle, or the process's standard output.
#[derive(Debug)]
pub enum FileHandle {
    File(fs::File),
    Stdout(io::Stdout),
}

impl FileHandle {
    pub(crate) fn open_read(path: &Path) -> io::Result<Self> {
        fs::File::open(path).map(FileHandle::File)
    }

    pub(crate) fn open_write(
        path: &Path,
        mode: OutputMode,
        permissions: Option<u32>,
    ) -> io::Result<Self> {
        let mut options = fs::OpenOptions::new();
        options.write(true);
        match mode {
            OutputMode::Truncate => options.create(true).truncate(true),
            OutputMode::CreateNew => options.create_new(true),
            OutputMode::Update => options.read(true),
        };
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            if let Some(mode) = permissions {
                options.mode(mode);
            }
        }
        #[cfg(not(unix))]
        let _ = permissions;
        options.open(path).map(FileHandle::File)
    }

    pub(crate) fn stdout() -> Self {
        FileHandle::Stdout(io::stdout())
    }

    /// Opens a second, independent handle to the same file.
    pub(crate) fn try_clone(&self) -> io::Result<fs::File> {
        match self {
            FileHandle::File(file) => file.try_clone(),
            FileHandle::Stdout(_) => Err(io::Error::from_raw_os_error(libc::EBADF)),
        }
    }

    #[cfg(unix)]
    pub(crate) fn raw_fd(&self) -> std::os::unix::io::RawFd {
        use std::os::unix::io::AsRawFd;
        match self {
            FileHandle::File(file) => file.as_raw_fd(),
            FileHandle::Stdout(out) => out.as_raw_fd(),
        }
    }
}

impl RawResource for FileHandle {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match self {
            FileHandle::File(file) => file.seek(pos),
            FileHandle::Stdout(_) => Err(io::Error::from_raw_os_error(libc::ESPIPE)),
        }
    }

    fn raw_size(&mut self) -> io::Result<Option<u64>> {
        match self {
            FileHandle::File(file) => {
                let metadata = file.metadata()?;
                // pipes and devices report a meaningless length
                Ok(metadata.is_file().then(|| metadata.len()))
            }
            FileHandle::Stdout(_) => Ok(None),
        }
    }

    fn is_stdout(&self) -> bool {
        matches!(self, FileHandle::Stdout(_))
    }

    fn close(self) -> io::Result<()> {
        match self {
            FileHandle::File(file) => close_file(file),
            // never close fd 1, it belongs to the process
            FileHandle::Stdout(mut out) => out.flush(),
        }
    }
}

impl RawRead for FileHandle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            FileHandle::File(file) => file.read(buf),
            FileHandle::Stdout(_) => Err(io::Error::from_raw_os_error(libc::EBADF)),
        }
    }
}

impl RawWrite for FileHandle {
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        match self {
            FileHandle::File(file) => file.write_all(buf),
            FileHandle::Stdout(out) => out.write_all(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            FileHandle::File(file) => file.flush(),
            FileHandle::Stdout(out) => out.flush(),
        }
    }
}

/// Closes the descriptor explicitly so a failing `close(2)` is reported
/// instead of being dropped silently.
#[cfg(unix)]
fn close_file(file: fs::File) -> io::Result<()> {
    use std::os::unix::io::IntoRawFd;

    nix::unistd::close(file.into_raw_fd()).map_err(io::Error::from)
}

#[cfg(not(unix))]
fn close_file(file: fs::File) -> io::Result<()> {
    drop(file);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_modes() -> io::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("out.bin");

        let mut handle = FileHandle::open_write(&path, OutputMode::CreateNew, Some(0o644))?;
        handle.write_all(b"hello")?;
        assert_eq!(handle.raw_size()?, Some(5));
        handle.close()?;

        let err = FileHandle::open_write(&path, OutputMode::CreateNew, None).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);

        let mut handle = FileHandle::open_write(&path, OutputMode::Update, None)?;
        assert_eq!(handle.raw_size()?, Some(5));
        handle.close()?;

        let mut handle = FileHandle::open_write(&path, OutputMode::Truncate, None)?;
        assert_eq!(handle.raw_size()?, Some(0));
        handle.close()?;

        Ok(())
    }

    #[test]
    fn test_close_keeps_written_data() -> io::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("closed.bin");

        let mut handle = FileHandle::open_write(&path, OutputMode::Truncate, None)?;
        handle.write_all(b"closed cleanly")?;
        handle.close()?;
        assert_eq!(fs::read(&path)?, b"closed cleanly");

        let handle = FileHandle::open_read(&path)?;
        handle.close()
    }

    #[test]
    fn test_stdout_is_not_seekable() {
        let mut handle = FileHandle::stdout();
        assert!(handle.is_stdout());
        assert!(handle.seek(SeekFrom::Start(0)).is_err());
        assert!(matches!(handle.raw_size(), Ok(None)));
        assert!(handle.try_clone().is_err());
    }

    #[test]
    fn test_read_and_position() -> io::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("in.bin");
        fs::write(&path, b"0123456789")?;

        let mut handle = FileHandle::open_read(&path)?;
        assert_eq!(handle.seek(SeekFrom::Start(4))?, 4);
        let mut buf = [0u8; 3];
        assert_eq!(RawRead::read(&mut handle, &mut buf)?, 3);
        assert_eq!(&buf, b"456");
        assert_eq!(handle.position()?, 7);
        handle.close()
    }
}
