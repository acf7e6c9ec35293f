//! The logical window a resource presents over its raw file or stream.

use std::io::{self, SeekFrom};

use log::{debug, error, trace};

use crate::Result;
use crate::backend::{RawRead, RawResource, RawWrite};
use crate::error::FileError;
use crate::size::valid_seek_distance;

/// Origin of a seek, relative to the current extent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    /// From the start of the extent.
    Start,
    /// From the current position.
    Current,
    /// From the end of the extent.
    End,
}

impl Whence {
    /// Maps a C-style `SEEK_SET`/`SEEK_CUR`/`SEEK_END` value.
    ///
    /// Any other value is a caller bug and yields [`FileError::Internal`].
    pub fn from_raw(whence: i32) -> Result<Self> {
        match whence {
            libc::SEEK_SET => Ok(Whence::Start),
            libc::SEEK_CUR => Ok(Whence::Current),
            libc::SEEK_END => Ok(Whence::End),
            _ => Err(FileError::Internal(format!("bad seek: whence {whence}"))),
        }
    }
}

/// Length argument of `set_extent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtentLength {
    /// A window of exactly this many bytes.
    Bytes(u64),
    /// Everything from the extent offset to the current end of the resource.
    Rest,
}

/// Start and size of the window, both in raw resource bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Extent {
    pub offset: u64,
    pub length: u64,
}

impl Extent {
    /// A window of `length` bytes starting `offset` bytes into the resource.
    pub fn new(offset: u64, length: u64) -> Self {
        Self { offset, length }
    }

    /// Translates a seek within the window into an absolute raw position.
    ///
    /// `current` yields the raw cursor and is only consulted for
    /// [`Whence::Current`].
    pub(crate) fn raw_target(
        &self,
        name: &str,
        offset: i64,
        whence: Whence,
        current: impl FnOnce() -> Result<u64>,
    ) -> Result<u64> {
        if !valid_seek_distance(offset) {
            return Err(FileError::io(name, "bad seek", None));
        }
        let overflow = || FileError::io(name, "bad seek: offset overflow", None);
        match whence {
            Whence::Start => {
                if offset < 0 {
                    return Err(FileError::io(name, "bad seek: negative offset", None));
                }
                self.offset.checked_add(offset as u64).ok_or_else(overflow)
            }
            Whence::End => {
                if offset > 0 {
                    return Err(FileError::io(name, "bad seek: past end of extent", None));
                }
                let distance = offset.unsigned_abs();
                if distance > self.length {
                    return Err(FileError::io(name, "bad seek: before start of extent", None));
                }
                self.offset
                    .checked_add(self.length - distance)
                    .ok_or_else(overflow)
            }
            // the cursor is already inside the window, no offset to add
            Whence::Current => current()?
                .checked_add_signed(offset)
                .ok_or_else(|| FileError::io(name, "bad seek: before start of file", None)),
        }
    }

    /// Converts a raw position into a position within the window.
    pub(crate) fn logical(&self, name: &str, raw: u64) -> Result<u64> {
        raw.checked_sub(self.offset)
            .ok_or_else(|| FileError::io(name, "position before start of extent", None))
    }

    /// Window length left over when `raw_size` bytes exist and the window
    /// starts at `offset`.
    pub(crate) fn rest_of(name: &str, offset: u64, raw_size: u64) -> Result<u64> {
        raw_size
            .checked_sub(offset)
            .ok_or_else(|| FileError::io(name, "extent starts past end of file", None))
    }
}

/// Name, backend and window of one resource.
///
/// Closed means `backend` is `None` and every other field is zeroed. All
/// raw positions pass through here, so the window arithmetic lives in one
/// place for inputs and outputs alike.
#[derive(Debug)]
pub(crate) struct ExtentState<B> {
    pub(crate) name: String,
    pub(crate) backend: Option<B>,
    pub(crate) extent: Extent,
}

impl<B> Default for ExtentState<B> {
    fn default() -> Self {
        Self {
            name: String::new(),
            backend: None,
            extent: Extent::default(),
        }
    }
}

impl<B: RawResource> ExtentState<B> {
    pub(crate) fn open(name: String, backend: B, length: u64) -> Self {
        debug!("{name}: opened, {length} bytes");
        Self {
            name,
            backend: Some(backend),
            extent: Extent::new(0, length),
        }
    }

    pub(crate) fn is_open(&self) -> bool {
        self.backend.is_some()
    }

    pub(crate) fn is_stdout(&self) -> bool {
        self.backend.as_ref().is_some_and(RawResource::is_stdout)
    }

    pub(crate) fn backend(&mut self, op: &str) -> Result<&mut B> {
        match self.backend.as_mut() {
            Some(backend) => Ok(backend),
            None => Err(FileError::io(&self.name, format!("bad {op}: file is not open"), None)),
        }
    }

    pub(crate) fn fail(&self, context: &str, err: &io::Error) -> FileError {
        FileError::from_io(&self.name, context, err)
    }

    /// Seeks relative to the window and returns the logical position.
    ///
    /// The target is validated before the backend is touched, so a rejected
    /// seek leaves the cursor where it was. `limit` caps the logical
    /// position (inputs pass their length).
    pub(crate) fn seek(&mut self, offset: i64, whence: Whence, limit: Option<u64>) -> Result<u64> {
        let Self {
            name,
            backend,
            extent,
        } = self;
        let name = name.as_str();
        let Some(backend) = backend.as_mut() else {
            return Err(FileError::io(name, "bad seek: file is not open", None));
        };
        let raw = extent.raw_target(name, offset, whence, || {
            backend
                .position()
                .map_err(|err| FileError::from_io(name, "tell error", &err))
        })?;
        let pos = extent.logical(name, raw)?;
        if limit.is_some_and(|limit| pos > limit) {
            return Err(FileError::io(name, "bad seek: beyond end of extent", None));
        }
        let landed = backend
            .seek(SeekFrom::Start(raw))
            .map_err(|err| FileError::from_io(name, "seek error", &err))?;
        trace!("{name}: seek {offset} {whence:?} -> raw {landed}");
        extent.logical(name, landed)
    }

    pub(crate) fn tell(&mut self) -> Result<u64> {
        let raw = self.backend("tell")?.position();
        let raw = raw.map_err(|err| self.fail("tell error", &err))?;
        self.extent.logical(&self.name, raw)
    }

    pub(crate) fn raw_size(&mut self) -> Result<Option<u64>> {
        let size = self.backend("size query")?.raw_size();
        size.map_err(|err| self.fail("cannot query size", &err))
    }

    /// Size of the raw resource, failing when it cannot be determined.
    pub(crate) fn required_raw_size(&mut self) -> Result<u64> {
        self.raw_size()?
            .ok_or_else(|| FileError::io(&self.name, "cannot determine size", Some(libc::ESPIPE)))
    }

    pub(crate) fn set_extent(&mut self, offset: u64, length: ExtentLength) -> Result<()> {
        let length = match length {
            ExtentLength::Bytes(length) => {
                self.backend("set_extent")?;
                length
            }
            ExtentLength::Rest => {
                let raw_size = self.required_raw_size()?;
                Extent::rest_of(&self.name, offset, raw_size)?
            }
        };
        debug!("{}: extent set to {offset}+{length}", self.name);
        self.extent = Extent::new(offset, length);
        Ok(())
    }

    /// Drops the window: the whole raw resource becomes the extent and the
    /// cursor is left at its end.
    pub(crate) fn unset_extent(&mut self) -> Result<u64> {
        let end = self.backend("unset_extent")?.seek(SeekFrom::End(0));
        let end = end.map_err(|err| self.fail("seek error", &err))?;
        debug!("{}: extent unset, {end} bytes", self.name);
        self.extent = Extent::new(0, end);
        Ok(end)
    }

    /// Detaches the backend and zeroes every field.
    pub(crate) fn take(&mut self) -> Option<(String, B)> {
        let backend = self.backend.take()?;
        let name = std::mem::take(&mut self.name);
        self.extent = Extent::default();
        Some((name, backend))
    }

    /// Releases the backend. Closing a closed resource is a no-op.
    pub(crate) fn close(&mut self) -> Result<()> {
        let Some((name, backend)) = self.take() else {
            return Ok(());
        };
        debug!("{name}: closing");
        backend
            .close()
            .map_err(|err| FileError::from_io(&name, "close failed", &err))
    }
}

impl<B: RawRead> ExtentState<B> {
    /// One raw read attempt; interrupted reads are retried.
    pub(crate) fn read_raw(&mut self, buf: &mut [u8]) -> Result<usize> {
        let backend = self.backend("read")?;
        let result = loop {
            match backend.read(buf) {
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                other => break other,
            }
        };
        result.map_err(|err| self.fail("read error", &err))
    }
}

impl<B: RawWrite> ExtentState<B> {
    pub(crate) fn write_raw(&mut self, buf: &[u8]) -> Result<()> {
        let result = self.backend("write")?.write_all(buf);
        result.map_err(|err| self.fail("write error", &err))
    }

    pub(crate) fn flush(&mut self) -> Result<()> {
        let Some(backend) = self.backend.as_mut() else {
            return Ok(());
        };
        let result = backend.flush();
        result.map_err(|err| self.fail("flush failed", &err))
    }
}

/// Teardown policy for a resource dropped while still open.
///
/// `Drop` cannot return the failure. While the thread is unwinding it is
/// swallowed so the original failure stays visible; otherwise it is logged.
pub(crate) fn report_close_on_drop(name: &str, result: Result<()>) {
    let Err(err) = result else {
        return;
    };
    if std::thread::panicking() {
        debug!("{name}: close failed during unwinding: {err}");
    } else {
        error!("{name}: close failed on drop: {err}");
    }
}

/// Closes via `close` once `result` is known. A close failure is returned
/// only if `result` succeeded; otherwise the first failure wins.
pub(crate) fn close_after<T>(
    result: Result<T>,
    close: impl FnOnce() -> Result<()>,
) -> Result<T> {
    match result {
        Ok(value) => {
            close()?;
            Ok(value)
        }
        Err(err) => {
            if let Err(close_err) = close() {
                debug!("suppressed close failure ({close_err}) after: {err}");
            }
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::size::MAX_IO_SIZE;

    #[test]
    fn test_whence_from_raw() -> Result<()> {
        assert_eq!(Whence::from_raw(libc::SEEK_SET)?, Whence::Start);
        assert_eq!(Whence::from_raw(libc::SEEK_CUR)?, Whence::Current);
        assert_eq!(Whence::from_raw(libc::SEEK_END)?, Whence::End);
        assert!(matches!(Whence::from_raw(42), Err(FileError::Internal(_))));
        Ok(())
    }

    #[test]
    fn test_raw_target_is_shifted_by_offset() -> Result<()> {
        let extent = Extent::new(10, 50);
        let at = || Ok(30);
        assert_eq!(extent.raw_target("f", 0, Whence::Start, at)?, 10);
        assert_eq!(extent.raw_target("f", 7, Whence::Start, at)?, 17);
        assert_eq!(extent.raw_target("f", 0, Whence::End, at)?, 60);
        assert_eq!(extent.raw_target("f", -50, Whence::End, at)?, 10);
        assert_eq!(extent.raw_target("f", -3, Whence::Current, at)?, 27);
        Ok(())
    }

    #[test]
    fn test_raw_target_rejects_out_of_window() {
        let extent = Extent::new(10, 50);
        let at = || Ok(5);
        assert!(extent.raw_target("f", -1, Whence::Start, at).is_err());
        assert!(extent.raw_target("f", 1, Whence::End, at).is_err());
        assert!(extent.raw_target("f", -51, Whence::End, at).is_err());
        assert!(extent.raw_target("f", -6, Whence::Current, at).is_err());
        assert!(extent.raw_target("f", MAX_IO_SIZE as i64 + 1, Whence::Current, at).is_err());
    }

    #[test]
    fn test_logical_and_rest() -> Result<()> {
        let extent = Extent::new(10, 50);
        assert_eq!(extent.logical("f", 35)?, 25);
        assert!(extent.logical("f", 9).is_err());
        assert_eq!(Extent::rest_of("f", 10, 100)?, 90);
        assert!(Extent::rest_of("f", 101, 100).is_err());
        Ok(())
    }

    /// Accepts any seek but fails to close.
    struct StuckHandle;

    impl RawResource for StuckHandle {
        fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
            match pos {
                SeekFrom::Start(raw) => Ok(raw),
                _ => Ok(0),
            }
        }

        fn raw_size(&mut self) -> io::Result<Option<u64>> {
            Ok(Some(64))
        }

        fn close(self) -> io::Result<()> {
            Err(io::Error::from_raw_os_error(libc::EIO))
        }
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut state = ExtentState::open("stuck".to_string(), StuckHandle, 64);
        assert!(matches!(state.close(), Err(FileError::Io { code: Some(libc::EIO), .. })));
        assert!(!state.is_open());
        assert_eq!(state.extent, Extent::default());
        assert!(state.name.is_empty());
        assert!(state.close().is_ok());
    }

    #[test]
    fn test_close_after_policy() {
        let mut state = ExtentState::open("stuck".to_string(), StuckHandle, 64);
        let result = close_after(Ok(5), || state.close());
        assert!(matches!(result, Err(FileError::Io { .. })));

        let mut state = ExtentState::open("stuck".to_string(), StuckHandle, 64);
        let first: Result<()> = Err(FileError::end_of_input("stuck"));
        let result = close_after(first, || state.close());
        assert!(matches!(result, Err(FileError::EndOfInput { .. })));
        assert!(!state.is_open());
    }

    #[test]
    fn test_state_seek_and_extent() -> Result<()> {
        let mut state = ExtentState::open("stuck".to_string(), StuckHandle, 64);
        state.set_extent(16, ExtentLength::Rest)?;
        assert_eq!(state.extent, Extent::new(16, 48));
        assert_eq!(state.seek(8, Whence::Start, None)?, 8);
        assert_eq!(state.seek(-8, Whence::End, None)?, 40);
        assert!(state.seek(41, Whence::Start, Some(40)).is_err());
        assert!(state.set_extent(65, ExtentLength::Rest).is_err());
        assert_eq!(state.extent, Extent::new(16, 48));
        Ok(())
    }
}
