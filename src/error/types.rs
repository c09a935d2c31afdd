//! Error types
//!
//! A single structured error carries a kind tag, the operation context and
//! the underlying cause. Callers match on [`ErrorKind`], never on text.

use std::error::Error;
use std::fmt;
use std::io;

/// Classification of every failure the file operations can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Input is absolute or resolves outside the base directory
    PathTraversal,
    /// Normalized path exceeds the configured maximum length
    PathTooLong,
    /// Final path segment fails the configured name pattern
    InvalidName,
    FileNotFound,
    PermissionDenied,
    /// Caller-side policy rejection (upload size, forbidden extension)
    UnsupportedOperation,
    /// Any other storage failure
    Unknown,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            ErrorKind::PathTraversal => "path traversal is not allowed",
            ErrorKind::PathTooLong => "path too long",
            ErrorKind::InvalidName => "invalid file or folder name",
            ErrorKind::FileNotFound => "file or folder not found",
            ErrorKind::PermissionDenied => "permission denied",
            ErrorKind::UnsupportedOperation => "unsupported operation",
            ErrorKind::Unknown => "unknown storage error",
        };
        f.write_str(message)
    }
}

/// Error returned by the sanitizer, the file operations and the upload policy.
#[derive(Debug)]
pub struct BrowserError {
    kind: ErrorKind,
    context: String,
    source: Option<Box<dyn Error + Send + Sync>>,
}

impl BrowserError {
    pub fn new(kind: ErrorKind, context: impl Into<String>) -> Self {
        Self {
            kind,
            context: context.into(),
            source: None,
        }
    }

    pub fn with_source<E>(kind: ErrorKind, context: impl Into<String>, source: E) -> Self
    where
        E: Into<Box<dyn Error + Send + Sync>>,
    {
        Self {
            kind,
            context: context.into(),
            source: Some(source.into()),
        }
    }

    /// Wraps an I/O error, re-classifying not-found and permission failures.
    ///
    /// A `BrowserError` carried inside the I/O error (for example raised by a
    /// size-limited reader handed to storage) keeps its own kind.
    pub fn from_io(context: impl Into<String>, error: io::Error) -> Self {
        if error
            .get_ref()
            .is_some_and(|inner| inner.is::<BrowserError>())
        {
            return match error.into_inner().map(|inner| inner.downcast::<BrowserError>()) {
                Some(Ok(inner)) => Self::with_source(inner.kind, context, *inner),
                _ => Self::new(ErrorKind::Unknown, context),
            };
        }

        let kind = match error.kind() {
            io::ErrorKind::NotFound => ErrorKind::FileNotFound,
            io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied,
            _ => ErrorKind::Unknown,
        };
        Self::with_source(kind, context, error)
    }

    /// Wraps an archive error; its I/O variant is classified like [`Self::from_io`].
    pub fn from_zip(context: impl Into<String>, error: zip::result::ZipError) -> Self {
        match error {
            zip::result::ZipError::Io(e) => Self::from_io(context, e),
            other => Self::with_source(ErrorKind::Unknown, context, other),
        }
    }

    /// Adds an outer context, keeping the kind and this error as the cause.
    pub fn wrap(self, context: impl Into<String>) -> Self {
        Self::with_source(self.kind, context, self)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind == kind
    }

    pub fn context(&self) -> &str {
        &self.context
    }
}

impl fmt::Display for BrowserError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(source) => write!(f, "{}: {} ({})", self.context, self.kind, source),
            None => write!(f, "{}: {}", self.context, self.kind),
        }
    }
}

impl Error for BrowserError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn Error + 'static))
    }
}

impl From<BrowserError> for io::Error {
    fn from(error: BrowserError) -> Self {
        io::Error::other(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_errors_are_classified() {
        let not_found = BrowserError::from_io(
            "could not read directory 'docs'",
            io::Error::from(io::ErrorKind::NotFound),
        );
        assert!(not_found.is(ErrorKind::FileNotFound));

        let denied = BrowserError::from_io(
            "could not read directory 'docs'",
            io::Error::from(io::ErrorKind::PermissionDenied),
        );
        assert!(denied.is(ErrorKind::PermissionDenied));

        let other = BrowserError::from_io("write", io::Error::other("disk on fire"));
        assert!(other.is(ErrorKind::Unknown));
    }

    #[test]
    fn test_cause_stays_inspectable() {
        let err = BrowserError::from_io(
            "failed to upload file to 'a.txt'",
            io::Error::new(io::ErrorKind::StorageFull, "no space"),
        );
        let cause = err
            .source()
            .and_then(|s| s.downcast_ref::<io::Error>())
            .unwrap();
        assert_eq!(cause.kind(), io::ErrorKind::StorageFull);
        assert!(err.to_string().starts_with("failed to upload file to 'a.txt'"));
    }

    #[test]
    fn test_kind_survives_io_round_trip() {
        let policy = BrowserError::new(ErrorKind::UnsupportedOperation, "upload exceeds 10 bytes");
        let io_err: io::Error = policy.into();
        let recovered = BrowserError::from_io("failed to upload file", io_err);
        assert!(recovered.is(ErrorKind::UnsupportedOperation));
        assert_eq!(recovered.context(), "failed to upload file");
    }

    #[test]
    fn test_display_without_source() {
        let err = BrowserError::new(ErrorKind::PathTooLong, "path 'aaa' too long (3 > 2)");
        assert_eq!(err.to_string(), "path 'aaa' too long (3 > 2): path too long");
    }
}
