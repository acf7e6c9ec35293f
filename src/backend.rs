//! What a resource needs from whatever it wraps.
//!
//! Both the OS-handle backend ([`FileHandle`](crate::FileHandle)) and the
//! generic stream backend ([`Stream`](crate::Stream)) implement these, so
//! every windowing rule is written once against the traits.

use std::io::{self, SeekFrom};

/// Positioning, sizing and release of a raw resource.
pub trait RawResource {
    /// Moves the raw cursor and returns the new raw position.
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64>;

    /// Returns the raw cursor without moving it.
    fn position(&mut self) -> io::Result<u64> {
        self.seek(SeekFrom::Current(0))
    }

    /// Size of the whole raw resource, or `None` when it cannot be known
    /// (pipes, terminals, streams that refuse to seek).
    fn raw_size(&mut self) -> io::Result<Option<u64>>;

    /// Whether this is the process's standard output.
    fn is_stdout(&self) -> bool {
        false
    }

    /// Releases the resource, reporting any failure of the release itself.
    fn close(self) -> io::Result<()>
    where
        Self: Sized;
}

/// A raw resource bytes can be read from.
pub trait RawRead: RawResource {
    /// One read attempt; `Ok(0)` means end of data.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

/// A raw resource bytes can be written to.
pub trait RawWrite: RawResource {
    /// Writes the whole buffer or fails.
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()>;

    fn flush(&mut self) -> io::Result<()>;
}
