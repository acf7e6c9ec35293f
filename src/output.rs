use std::io::{self, IsTerminal, Seek, Write};
use std::path::Path;

use log::{debug, trace};

use crate::backend::RawWrite;
use crate::error::FileError;
use crate::extent::{Extent, ExtentLength, ExtentState, Whence, close_after, report_close_on_drop};
use crate::file::{FileHandle, OutputMode};
use crate::size::io_size;
use crate::stream::Stream;
use crate::{Resource, Result, Writable};

/// A writable, windowed resource.
///
/// Besides the window it keeps `bytes_written`, the number of bytes that
/// went through this handle. That counter is the size of record whenever
/// the target cannot be measured (standard output, a pipe, a stream that
/// refuses to seek).
#[derive(Debug)]
pub struct Output<B: RawWrite> {
    state: ExtentState<B>,
    bytes_written: u64,
}

/// An output backed by an operating-system file handle or standard output.
pub type OutputFile = Output<FileHandle>;

/// An output backed by any `Write + Seek` stream.
pub type OutputStream<W> = Output<Stream<W>>;

impl<B: RawWrite> Output<B> {
    /// A closed output.
    pub fn new() -> Self {
        Self {
            state: ExtentState::default(),
            bytes_written: 0,
        }
    }

    fn bind(name: String, mut backend: B) -> Result<Self> {
        let length = match backend.raw_size() {
            Ok(length) => length.unwrap_or(0),
            Err(err) => return Err(FileError::from_io(&name, "cannot query size", &err)),
        };
        Ok(Self {
            state: ExtentState::open(name, backend, length),
            bytes_written: 0,
        })
    }

    /// The current window.
    pub fn extent(&self) -> Extent {
        self.state.extent
    }
}

impl<B: RawWrite> Default for Output<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputFile {
    /// Opens `path` for writing.
    ///
    /// `permissions` applies to a newly created file (unix only).
    ///
    /// # Errors
    ///
    /// Returns `FileError::AlreadyExists` for [`OutputMode::CreateNew`] on an
    /// existing file and `FileError::Io` for any other failure.
    pub fn open(path: impl AsRef<Path>, mode: OutputMode, permissions: Option<u32>) -> Result<Self> {
        let path = path.as_ref();
        let name = path.display().to_string();
        let handle = FileHandle::open_write(path, mode, permissions)
            .map_err(|err| FileError::from_open(&name, &err, false))?;
        Self::bind(name, handle)
    }

    /// Binds to the process's standard output.
    ///
    /// Returns `Ok(None)` when standard output is a terminal and `force` is
    /// not set, so binary data does not end up on someone's screen.
    pub fn stdout(force: bool) -> Result<Option<Self>> {
        if !force && io::stdout().is_terminal() {
            debug!("<stdout>: refusing to write to a terminal");
            return Ok(None);
        }
        Self::bind("<stdout>".to_string(), FileHandle::stdout()).map(Some)
    }

    /// The underlying descriptor, `None` when closed.
    #[cfg(unix)]
    pub fn raw_fd(&self) -> Option<std::os::unix::io::RawFd> {
        self.state.backend.as_ref().map(FileHandle::raw_fd)
    }
}

impl<W: Write + Seek> OutputStream<W> {
    /// Wraps `stream`. Its current length, if it can be measured, becomes
    /// the initial window; the write counter starts at zero.
    pub fn from_stream(name: impl Into<String>, stream: W) -> Result<Self> {
        Self::bind(name.into(), Stream::new(stream))
    }

    /// The wrapped stream, `None` when closed.
    pub fn stream(&self) -> Option<&W> {
        self.state.backend.as_ref().map(Stream::get_ref)
    }

    /// Flushes and hands back the wrapped stream, leaving this output closed.
    ///
    /// # Errors
    ///
    /// Returns `FileError::Io` if the output is closed or the flush fails.
    pub fn into_stream(mut self) -> Result<W> {
        self.state.backend("into_stream")?;
        self.state.flush()?;
        self.bytes_written = 0;
        match self.state.take() {
            Some((_, stream)) => Ok(stream.into_inner()),
            None => Err(FileError::io(&self.state.name, "bad into_stream: file is not open", None)),
        }
    }
}

impl<B: RawWrite> Resource for Output<B> {
    fn name(&self) -> &str {
        &self.state.name
    }

    fn is_open(&self) -> bool {
        self.state.is_open()
    }

    /// Seeks within the window, updating the bookkeeping first: a seek from
    /// the start extends `bytes_written` to the target (the next write lands
    /// there), and `End` is measured from `bytes_written`. The bookkeeping is
    /// kept only if the seek succeeds, and a rejected seek does not move the
    /// cursor.
    fn seek(&mut self, offset: i64, whence: Whence) -> Result<u64> {
        let saved = (self.state.extent, self.bytes_written);
        match whence {
            Whence::Start => {
                if let Ok(target) = u64::try_from(offset) {
                    self.bytes_written = self.bytes_written.max(target);
                }
                self.state.extent.length = self.bytes_written;
            }
            Whence::End => self.state.extent.length = self.bytes_written,
            Whence::Current => {}
        }
        let result = self.state.seek(offset, whence, None);
        if result.is_err() {
            (self.state.extent, self.bytes_written) = saved;
        }
        result
    }

    fn tell(&mut self) -> Result<u64> {
        self.state.tell()
    }

    /// The true size from the OS or stream when it can be measured,
    /// otherwise `bytes_written`. Standard output is always counted.
    fn size(&mut self) -> Result<u64> {
        if !self.state.is_open() {
            return Ok(0);
        }
        if self.state.is_stdout() {
            return Ok(self.bytes_written);
        }
        Ok(self.state.raw_size()?.unwrap_or(self.bytes_written))
    }

    fn set_extent(&mut self, offset: u64, length: ExtentLength) -> Result<()> {
        self.state.set_extent(offset, length)?;
        self.bytes_written = 0;
        Ok(())
    }

    fn unset_extent(&mut self) -> Result<u64> {
        let length = self.state.unset_extent()?;
        self.bytes_written = length;
        Ok(length)
    }

    /// Flushes, then releases the backend. A flush failure is reported even
    /// though the release still happens.
    fn close(&mut self) -> Result<()> {
        let flushed = self.state.flush();
        self.bytes_written = 0;
        let closed = self.state.close();
        flushed.and(closed)
    }

    fn close_after<T>(&mut self, result: Result<T>) -> Result<T> {
        close_after(result, || self.close())
    }
}

impl<B: RawWrite> Writable for Output<B> {
    fn write(&mut self, buf: &[u8], len: u64) -> Result<()> {
        self.state.backend("write")?;
        if len == 0 {
            return Ok(());
        }
        let len_bytes = match io_size(len) {
            Some(len_bytes) if len_bytes <= buf.len() => len_bytes,
            _ => return Err(FileError::io(&self.state.name, "bad write", None)),
        };
        self.state.write_raw(&buf[..len_bytes])?;
        self.bytes_written += len;
        self.state.extent.length = self.state.extent.length.max(self.bytes_written);
        trace!("{}: wrote {len}, {} total", self.state.name, self.bytes_written);
        Ok(())
    }

    /// Does not check that the rewritten region was written before; the
    /// bookkeeping is restored unconditionally.
    fn rewrite(&mut self, buf: &[u8], len: u64) -> Result<()> {
        if self.state.is_stdout() {
            return Err(FileError::Internal(format!(
                "{}: rewrite is not possible on standard output",
                self.state.name
            )));
        }
        let saved_length = self.state.extent.length;
        self.write(buf, len)?;
        self.bytes_written -= len;
        self.state.extent.length = saved_length;
        Ok(())
    }

    fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    fn flush(&mut self) -> Result<()> {
        self.state.flush()
    }
}

impl<B: RawWrite> Drop for Output<B> {
    fn drop(&mut self) {
        if self.state.is_open() {
            let name = self.state.name.clone();
            report_close_on_drop(&name, self.close());
        }
    }
}
