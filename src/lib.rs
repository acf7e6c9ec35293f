//! Windowed file access over OS handles and generic streams.
//!
//! A resource presents a logical file that starts `offset` bytes into the
//! real file or stream and is `length` bytes long. Every position a caller
//! sees through [`Resource::seek`] or [`Resource::tell`] is relative to that
//! window, never to the raw resource. Format parsers and compressors work
//! against the [`Readable`] and [`Writable`] traits and do not care whether
//! the bytes come from a file, standard output or an in-memory stream.
//!
//! # Examples
//!
//! ```rust
//! use std::io::Cursor;
//!
//! use extentfs::{ExtentLength, InputStream, Readable, Resource, Whence};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let data: Vec<u8> = (0..100).collect();
//!     let mut input = InputStream::from_stream("<memory>", Cursor::new(data))?;
//!
//!     input.set_extent(10, ExtentLength::Bytes(50))?;
//!     input.seek(0, Whence::Start)?;
//!
//!     let mut buf = [0u8; 64];
//!     assert_eq!(input.read(&mut buf, 50)?, 50);
//!     assert_eq!(buf[0], 10);
//!     assert_eq!(input.read(&mut buf, 1)?, 0);
//!     assert_eq!(input.original_size(), 100);
//!
//!     Ok(())
//! }
//! ```

use error::FileError;

mod adapter;
pub mod backend;
pub mod error;
mod extent;
mod file;
mod input;
mod ops;
mod output;
pub mod size;
mod stream;

pub use adapter::IoAdapter;
pub use extent::{Extent, ExtentLength, Whence};
pub use file::{FileHandle, OutputMode};
pub use input::{Input, InputFile, InputStream};
pub use ops::{chmod, dump, rename, unlink, unlink_noexcept};
pub use output::{Output, OutputFile, OutputStream};
pub use stream::Stream;

pub type Result<T> = std::result::Result<T, FileError>;

/// Lifecycle, positioning and windowing shared by every resource.
pub trait Resource {
    /// Display name; synthetic for standard output and streams.
    fn name(&self) -> &str;

    /// Whether a backend is attached; false after `close`.
    fn is_open(&self) -> bool;

    /// Moves to `offset` relative to `whence` and returns the new position
    /// within the window.
    ///
    /// # Errors
    ///
    /// `Start` with a negative offset and `End` with a positive one are
    /// rejected with `FileError::Io`, as is any distance larger than
    /// [`size::MAX_IO_SIZE`]. A rejected seek leaves the position unchanged.
    fn seek(&mut self, offset: i64, whence: Whence) -> Result<u64>;

    /// Position within the window.
    fn tell(&mut self) -> Result<u64>;

    /// Size in bytes; 0 once closed.
    fn size(&mut self) -> Result<u64>;

    /// Narrows (or moves) the window without reopening the resource.
    fn set_extent(&mut self, offset: u64, length: ExtentLength) -> Result<()>;

    /// Widens the window back to the whole resource, leaving the cursor at
    /// its end, and returns the new length.
    fn unset_extent(&mut self) -> Result<u64>;

    /// Releases the resource. Closing a closed resource is a no-op.
    fn close(&mut self) -> Result<()>;

    /// Closes the resource once `result` is known.
    ///
    /// If `result` is already a failure, a failing close is swallowed so the
    /// first failure is the one reported; otherwise the close failure is
    /// returned.
    fn close_after<T>(&mut self, result: Result<T>) -> Result<T>
    where
        Self: Sized;
}

/// A resource bytes can be read from.
pub trait Readable: Resource {
    /// Reads up to `len` bytes into `buf` in a single attempt.
    ///
    /// Returns the number of bytes read, 0 at the end of the window. Short
    /// reads are not retried.
    fn read(&mut self, buf: &mut [u8], len: u64) -> Result<usize>;

    /// Reads exactly `len` bytes or fails with `FileError::EndOfInput`.
    fn readx(&mut self, buf: &mut [u8], len: u64) -> Result<usize> {
        let count = self.read(buf, len)?;
        if count as u64 != len {
            return Err(FileError::EndOfInput {
                name: self.name().to_string(),
            });
        }
        Ok(count)
    }

    /// Length of the resource when it was opened, unaffected by extents.
    fn original_size(&self) -> u64;
}

/// A resource bytes can be written to.
pub trait Writable: Resource {
    /// Writes the first `len` bytes of `buf`. A short write is a failure.
    /// Writing 0 bytes does nothing, whatever `buf` is.
    fn write(&mut self, buf: &[u8], len: u64) -> Result<()>;

    /// Overwrites bytes in place: like `write`, but `bytes_written` is left
    /// as it was.
    fn rewrite(&mut self, buf: &[u8], len: u64) -> Result<()>;

    /// Bytes counted through this handle since it was opened or its extent
    /// last changed.
    fn bytes_written(&self) -> u64;

    /// Pushes buffered bytes to the backend. A closed resource has nothing
    /// to flush and succeeds.
    fn flush(&mut self) -> Result<()>;
}

#[cfg(test)]
pub(crate) fn init_test_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn copy_window(input: &mut impl Readable, output: &mut impl Writable) -> Result<u64> {
        let mut buf = [0u8; 7];
        let mut total = 0;
        loop {
            let count = input.read(&mut buf, 7)?;
            if count == 0 {
                return Ok(total);
            }
            output.write(&buf, count as u64)?;
            total += count as u64;
        }
    }

    #[test]
    fn test_variants_share_one_contract() -> Result<()> {
        init_test_logging();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("source.bin");
        let data: Vec<u8> = (0..=255).collect();
        std::fs::write(&path, &data).unwrap();

        let mut from_file = InputFile::open(&path)?;
        let mut from_stream = InputStream::from_stream("<memory>", Cursor::new(data))?;
        for input in [&mut from_file as &mut dyn Readable, &mut from_stream] {
            input.set_extent(100, ExtentLength::Bytes(30))?;
            assert_eq!(input.seek(-30, Whence::End)?, 0);
        }

        let target = dir.path().join("copy.bin");
        let mut to_file = OutputFile::open(&target, OutputMode::Truncate, None)?;
        let mut to_stream = OutputStream::from_stream("<memory>", Cursor::new(Vec::new()))?;
        assert_eq!(copy_window(&mut from_file, &mut to_file)?, 30);
        assert_eq!(copy_window(&mut from_stream, &mut to_stream)?, 30);

        assert_eq!(to_file.size()?, 30);
        assert_eq!(to_stream.size()?, 30);
        to_file.close()?;
        assert_eq!(std::fs::read(&target).unwrap(), to_stream.into_stream()?.into_inner());
        Ok(())
    }

    #[test]
    fn test_drop_closes_open_resources() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dropped.bin");
        {
            let mut output = OutputFile::open(&path, OutputMode::Truncate, None)?;
            output.write(b"kept", 4)?;
        }
        assert_eq!(std::fs::read(&path).unwrap(), b"kept");
        Ok(())
    }
}
