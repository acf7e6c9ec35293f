use std::io;

use thiserror::Error;

/// Errors that can occur when working with a windowed file or stream.
///
/// Every variant except [`FileError::Internal`] names the resource it came
/// from, so a front end can report the offending file without extra context.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FileError {
    /// The named file does not exist.
    #[error("{name}: file not found")]
    NotFound { name: String, code: i32 },
    /// The named file exists but was required not to.
    #[error("{name}: file already exists")]
    AlreadyExists { name: String, code: i32 },
    /// An exact read found fewer bytes than it demanded.
    #[error("{name}: premature end of file")]
    EndOfInput { name: String },
    /// A failure reported by the operating system or the underlying stream.
    #[error("{name}: {context}{}", os_suffix(.code))]
    Io {
        name: String,
        context: String,
        code: Option<i32>,
    },
    /// The API was used in a way that can never succeed, e.g. an unknown
    /// `whence` value. Not a runtime condition of the resource.
    #[error("internal error: {0}")]
    Internal(String),
}

fn os_suffix(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!(" ({})", io::Error::from_raw_os_error(*code)),
        None => String::new(),
    }
}

impl FileError {
    pub(crate) fn io(name: &str, context: impl Into<String>, code: Option<i32>) -> Self {
        FileError::Io {
            name: name.to_string(),
            context: context.into(),
            code,
        }
    }

    /// Wraps a lower-level failure, keeping its errno.
    pub(crate) fn from_io(name: &str, context: impl Into<String>, err: &io::Error) -> Self {
        Self::io(name, context, Some(errno_of(err)))
    }

    pub(crate) fn end_of_input(name: &str) -> Self {
        FileError::EndOfInput {
            name: name.to_string(),
        }
    }

    /// Classifies a failed open. Outputs pass `report_not_found = false`:
    /// "not found" is confusing for a file that is about to be created.
    pub(crate) fn from_open(name: &str, err: &io::Error, report_not_found: bool) -> Self {
        let code = errno_of(err);
        match err.kind() {
            io::ErrorKind::NotFound if report_not_found => FileError::NotFound {
                name: name.to_string(),
                code,
            },
            io::ErrorKind::AlreadyExists => FileError::AlreadyExists {
                name: name.to_string(),
                code,
            },
            _ => Self::io(name, "cannot open", Some(code)),
        }
    }

    /// Name of the resource the failure belongs to, if any.
    pub fn name(&self) -> Option<&str> {
        match self {
            FileError::NotFound { name, .. }
            | FileError::AlreadyExists { name, .. }
            | FileError::EndOfInput { name }
            | FileError::Io { name, .. } => Some(name),
            FileError::Internal(_) => None,
        }
    }

    /// The OS-style error code carried by the failure.
    pub fn code(&self) -> Option<i32> {
        match self {
            FileError::NotFound { code, .. } | FileError::AlreadyExists { code, .. } => Some(*code),
            FileError::Io { code, .. } => *code,
            FileError::EndOfInput { .. } | FileError::Internal(_) => None,
        }
    }
}

/// Returns the errno behind `err`. Streams that fail without one are mapped
/// onto the closest classic code.
pub(crate) fn errno_of(err: &io::Error) -> i32 {
    if let Some(code) = err.raw_os_error() {
        return code;
    }
    match err.kind() {
        io::ErrorKind::NotFound => libc::ENOENT,
        io::ErrorKind::AlreadyExists => libc::EEXIST,
        io::ErrorKind::PermissionDenied => libc::EACCES,
        io::ErrorKind::InvalidInput => libc::EINVAL,
        io::ErrorKind::Unsupported => libc::ESPIPE,
        io::ErrorKind::Interrupted => libc::EINTR,
        _ => libc::EIO,
    }
}

impl From<FileError> for io::Error {
    fn from(err: FileError) -> Self {
        let kind = match &err {
            FileError::NotFound { .. } => io::ErrorKind::NotFound,
            FileError::AlreadyExists { .. } => io::ErrorKind::AlreadyExists,
            FileError::EndOfInput { .. } => io::ErrorKind::UnexpectedEof,
            FileError::Io { code: Some(code), .. } => io::Error::from_raw_os_error(*code).kind(),
            FileError::Io { code: None, .. } | FileError::Internal(_) => io::ErrorKind::Other,
        };
        io::Error::new(kind, err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_classification() {
        let missing = io::Error::from_raw_os_error(libc::ENOENT);
        assert_eq!(
            FileError::from_open("a.exe", &missing, true),
            FileError::NotFound {
                name: "a.exe".to_string(),
                code: libc::ENOENT
            }
        );
        let err = FileError::from_open("a.exe", &missing, false);
        assert!(matches!(err, FileError::Io { code: Some(libc::ENOENT), .. }));

        let exists = io::Error::from_raw_os_error(libc::EEXIST);
        assert!(matches!(
            FileError::from_open("a.exe", &exists, false),
            FileError::AlreadyExists { .. }
        ));

        let denied = io::Error::from_raw_os_error(libc::EACCES);
        let err = FileError::from_open("a.exe", &denied, true);
        assert_eq!(err.code(), Some(libc::EACCES));
        assert_eq!(err.name(), Some("a.exe"));
    }

    #[test]
    fn test_stream_errors_get_a_code() {
        let err = io::Error::new(io::ErrorKind::Other, "stream went bad");
        assert_eq!(errno_of(&err), libc::EIO);
        let err = io::Error::new(io::ErrorKind::InvalidInput, "bad position");
        assert_eq!(errno_of(&err), libc::EINVAL);
    }

    #[test]
    fn test_display_names_the_file() {
        let err = FileError::io("out.bin", "write error", Some(libc::ENOSPC));
        let text = err.to_string();
        assert!(text.starts_with("out.bin: write error ("));

        let err = FileError::io("out.bin", "bad seek", None);
        assert_eq!(err.to_string(), "out.bin: bad seek");

        assert_eq!(FileError::end_of_input("in.bin").to_string(), "in.bin: premature end of file");
    }

    #[test]
    fn test_into_io_error() {
        let err: io::Error = FileError::end_of_input("in.bin").into();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);

        let err: io::Error = FileError::Internal("bad whence".to_string()).into();
        assert_eq!(err.kind(), io::ErrorKind::Other);
    }
}
