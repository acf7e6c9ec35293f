use std::io::{self, Read, Seek, SeekFrom, Write};

use crate::backend::{RawRead, RawResource, RawWrite};

/// Any seekable byte stream used as a raw resource.
///
/// A stream whose `seek` fails (a pipe wrapped in a `Seek` impl that always
/// errors, for instance) is still usable; it just has no known size.
#[derive(Debug)]
pub struct Stream<S> {
    inner: S,
}

impl<S> Stream<S> {
    /// Wraps `inner` without moving its cursor.
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    /// The wrapped stream.
    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    /// Unwraps the stream, leaving its cursor where it is.
    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: Seek> RawResource for Stream<S> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner.seek(pos)
    }

    /// Measures the stream by seeking to its end and back.
    fn raw_size(&mut self) -> io::Result<Option<u64>> {
        let Ok(saved) = self.inner.stream_position() else {
            return Ok(None);
        };
        let Ok(end) = self.inner.seek(SeekFrom::End(0)) else {
            return Ok(None);
        };
        self.inner.seek(SeekFrom::Start(saved))?;
        Ok(Some(end))
    }

    fn close(self) -> io::Result<()> {
        Ok(())
    }
}

impl<S: Read + Seek> RawRead for Stream<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl<S: Write + Seek> RawWrite for Stream<S> {
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.inner.write_all(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
