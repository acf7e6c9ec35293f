use std::io::{self, SeekFrom};

use crate::extent::Whence;
use crate::size::MAX_IO_SIZE;
use crate::{Readable, Resource, Writable};

/// Exposes a resource through `std::io::{Read, Write, Seek}`.
///
/// Every call goes through the windowed operations, so positions and the
/// end of data are those of the extent, not of the raw resource.
#[derive(Debug)]
pub struct IoAdapter<'a, T> {
    inner: &'a mut T,
}

impl<'a, T> IoAdapter<'a, T> {
    /// Borrows `inner` for the lifetime of the adapter.
    pub fn new(inner: &'a mut T) -> Self {
        Self { inner }
    }
}

impl<T: Readable> io::Read for IoAdapter<'_, T> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let len = (buf.len() as u64).min(MAX_IO_SIZE);
        Ok(self.inner.read(buf, len)?)
    }
}

impl<T: Writable> io::Write for IoAdapter<'_, T> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let len = (buf.len() as u64).min(MAX_IO_SIZE);
        self.inner.write(buf, len)?;
        Ok(len as usize)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(self.inner.flush()?)
    }
}

impl<T: Resource> io::Seek for IoAdapter<'_, T> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let (offset, whence) = match pos {
            SeekFrom::Start(offset) => {
                let offset = i64::try_from(offset)
                    .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "seek offset too large"))?;
                (offset, Whence::Start)
            }
            SeekFrom::Current(offset) => (offset, Whence::Current),
            SeekFrom::End(offset) => (offset, Whence::End),
        };
        Ok(self.inner.seek(offset, whence)?)
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Read, Seek, Write};

    use super::*;
    use crate::{ExtentLength, InputStream, OutputStream};

    #[test]
    fn test_copy_window() -> io::Result<()> {
        let data: Vec<u8> = (0..64).collect();
        let mut input = InputStream::from_stream("<in>", Cursor::new(data))?;
        input.set_extent(16, ExtentLength::Bytes(8))?;
        Resource::seek(&mut input, 0, Whence::Start)?;

        let mut output = OutputStream::from_stream("<out>", Cursor::new(Vec::new()))?;
        let copied = io::copy(&mut IoAdapter::new(&mut input), &mut IoAdapter::new(&mut output))?;
        assert_eq!(copied, 8);
        assert_eq!(output.bytes_written(), 8);
        assert_eq!(output.into_stream()?.into_inner(), (16..24).collect::<Vec<u8>>());
        Ok(())
    }

    #[test]
    fn test_read_to_end_stops_at_window() -> io::Result<()> {
        let mut input = InputStream::from_stream("<in>", Cursor::new(vec![9u8; 32]))?;
        input.set_extent(4, ExtentLength::Rest)?;
        let mut adapter = IoAdapter::new(&mut input);
        adapter.seek(SeekFrom::Start(0))?;
        let mut contents = Vec::new();
        adapter.read_to_end(&mut contents)?;
        assert_eq!(contents.len(), 28);

        assert_eq!(adapter.seek(SeekFrom::End(-4))?, 24);
        let err = adapter.seek(SeekFrom::End(1)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Other);
        Ok(())
    }

    #[test]
    fn test_write_all() -> io::Result<()> {
        let mut output = OutputStream::from_stream("<out>", Cursor::new(Vec::new()))?;
        IoAdapter::new(&mut output).write_all(b"payload")?;
        assert_eq!(output.bytes_written(), 7);
        Ok(())
    }
}
