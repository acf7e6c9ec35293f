use std::fs;
use std::io::{Read, Seek};
use std::path::Path;

use log::trace;

use crate::backend::RawRead;
use crate::error::FileError;
use crate::extent::{Extent, ExtentLength, ExtentState, Whence, close_after, report_close_on_drop};
use crate::file::FileHandle;
use crate::size::io_size;
use crate::stream::Stream;
use crate::{Readable, Resource, Result};

/// A readable, windowed resource.
///
/// The length seen at open time is kept as [`Readable::original_size`];
/// reads never go past the end of the current extent, and a seek that
/// would land past it fails.
#[derive(Debug)]
pub struct Input<B: RawRead> {
    state: ExtentState<B>,
    original_length: u64,
}

/// An input backed by an operating-system file handle.
pub type InputFile = Input<FileHandle>;

/// An input backed by any `Read + Seek` stream.
pub type InputStream<R> = Input<Stream<R>>;

impl<B: RawRead> Input<B> {
    /// A closed input.
    pub fn new() -> Self {
        Self {
            state: ExtentState::default(),
            original_length: 0,
        }
    }

    /// Binds `backend`, measuring its size. On failure the backend is
    /// released and nothing is returned.
    fn bind(name: String, mut backend: B) -> Result<Self> {
        let length = match backend.raw_size() {
            Ok(Some(length)) => length,
            Ok(None) => {
                return Err(FileError::io(&name, "cannot determine size", Some(libc::ESPIPE)));
            }
            Err(err) => return Err(FileError::from_io(&name, "cannot query size", &err)),
        };
        Ok(Self {
            state: ExtentState::open(name, backend, length),
            original_length: length,
        })
    }

    /// The current window.
    pub fn extent(&self) -> Extent {
        self.state.extent
    }
}

impl<B: RawRead> Default for Input<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl InputFile {
    /// Opens `path` for reading.
    ///
    /// # Errors
    ///
    /// Returns `FileError::NotFound` if the file does not exist,
    /// `FileError::Io` for any other failure to open or stat it.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let name = path.display().to_string();
        let handle =
            FileHandle::open_read(path).map_err(|err| FileError::from_open(&name, &err, true))?;
        Self::bind(name, handle)
    }

    /// Opens an independent OS handle to the same file.
    pub fn duplicate_handle(&self) -> Result<fs::File> {
        let Some(handle) = self.state.backend.as_ref() else {
            return Err(FileError::io(&self.state.name, "bad dup: file is not open", None));
        };
        handle
            .try_clone()
            .map_err(|err| FileError::from_io(&self.state.name, "dup", &err))
    }

    /// The underlying descriptor, `None` when closed.
    #[cfg(unix)]
    pub fn raw_fd(&self) -> Option<std::os::unix::io::RawFd> {
        self.state.backend.as_ref().map(FileHandle::raw_fd)
    }
}

impl<R: Read + Seek> InputStream<R> {
    /// Wraps `stream`, keeping its current position. The window covers the
    /// whole stream, measured by seeking to its end and back.
    pub fn from_stream(name: impl Into<String>, stream: R) -> Result<Self> {
        Self::bind(name.into(), Stream::new(stream))
    }
}

impl<B: RawRead> Resource for Input<B> {
    fn name(&self) -> &str {
        &self.state.name
    }

    fn is_open(&self) -> bool {
        self.state.is_open()
    }

    /// Seeks within the window; landing past its end is an error since it
    /// means the caller trusts data that was never there. A rejected seek
    /// does not move the cursor.
    fn seek(&mut self, offset: i64, whence: Whence) -> Result<u64> {
        let limit = self.state.extent.length;
        self.state.seek(offset, whence, Some(limit))
    }

    fn tell(&mut self) -> Result<u64> {
        self.state.tell()
    }

    fn size(&mut self) -> Result<u64> {
        Ok(self.state.extent.length)
    }

    fn set_extent(&mut self, offset: u64, length: ExtentLength) -> Result<()> {
        self.state.set_extent(offset, length)
    }

    fn unset_extent(&mut self) -> Result<u64> {
        self.state.unset_extent()
    }

    fn close(&mut self) -> Result<()> {
        self.original_length = 0;
        self.state.close()
    }

    fn close_after<T>(&mut self, result: Result<T>) -> Result<T> {
        close_after(result, || self.close())
    }
}

impl<B: RawRead> Readable for Input<B> {
    fn read(&mut self, buf: &mut [u8], len: u64) -> Result<usize> {
        let wanted = match io_size(len) {
            Some(wanted) if wanted <= buf.len() => wanted,
            _ => return Err(FileError::io(&self.state.name, "bad read", None)),
        };
        let pos = self.state.tell()?;
        let remaining = self.state.extent.length.saturating_sub(pos);
        let wanted = wanted.min(usize::try_from(remaining).unwrap_or(usize::MAX));
        if wanted == 0 {
            return Ok(0);
        }
        let count = self.state.read_raw(&mut buf[..wanted])?;
        trace!("{}: read {count}/{len} at {pos}", self.state.name);
        Ok(count)
    }

    fn original_size(&self) -> u64 {
        self.original_length
    }
}

impl<B: RawRead> Drop for Input<B> {
    fn drop(&mut self) {
        if self.state.is_open() {
            let name = self.state.name.clone();
            report_close_on_drop(&name, self.close());
        }
    }
}
