//! Storage error types.

/// Kinds of storage errors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum StorageErrorKind {
    /// Failed to create storage directory
    #[display("Failed to create storage directory: {}", _0)]
    DirectoryCreation(String),
    /// Failed to write file
    #[display("Failed to write file: {}", _0)]
    FileWrite(String),
    /// Failed to read file
    #[display("Failed to read file: {}", _0)]
    FileRead(String),
    /// Failed to remove file
    #[display("Failed to delete file: {}", _0)]
    FileDelete(String),
    /// Permission denied when accessing storage
    #[display("Permission denied: {}", _0)]
    PermissionDenied(String),
    /// The storage medium has no space left
    #[display("Storage full: {}", _0)]
    StorageFull(String),
    /// Path or identity that escapes the storage root or is malformed
    #[display("Invalid storage path: {}", _0)]
    InvalidPath(String),
    /// Memory budget cannot accommodate the payload
    #[display("Capacity exceeded: {} bytes requested, ceiling is {} bytes", requested, ceiling)]
    CapacityExceeded {
        /// Size of the rejected payload
        requested: u64,
        /// Configured resident-byte ceiling
        ceiling: u64,
    },
    /// Payload exceeds the single-file size limit
    #[display("File too large: {} bytes exceeds limit of {} bytes", size, limit)]
    FileTooLarge {
        /// Size of the rejected payload
        size: u64,
        /// Configured limit
        limit: u64,
    },
    /// Stored payload no longer matches its recorded checksum
    #[display("Checksum mismatch: expected {}, got {}", expected, actual)]
    ChecksumMismatch {
        /// Checksum recorded at save time
        expected: String,
        /// Checksum of the bytes read back
        actual: String,
    },
}

/// Storage error with location tracking.
///
/// # Examples
///
/// ```
/// use attache_error::{StorageError, StorageErrorKind};
///
/// let err = StorageError::new(StorageErrorKind::InvalidPath("../etc".to_string()));
/// assert!(format!("{}", err).contains("Invalid storage path"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Storage Error: {} at line {} in {}", kind, line, file)]
pub struct StorageError {
    /// The kind of error that occurred
    pub kind: StorageErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl StorageError {
    /// Create a new storage error with automatic location tracking.
    #[track_caller]
    pub fn new(kind: StorageErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Classify a filesystem failure.
    ///
    /// Permission and disk-space failures keep their own kinds so callers can
    /// tell them apart; everything else is reported under `fallback`.
    #[track_caller]
    pub fn from_io(
        err: &std::io::Error,
        context: impl std::fmt::Display,
        fallback: fn(String) -> StorageErrorKind,
    ) -> Self {
        let detail = format!("{}: {}", context, err);
        let kind = match err.kind() {
            std::io::ErrorKind::PermissionDenied => StorageErrorKind::PermissionDenied(detail),
            std::io::ErrorKind::StorageFull => StorageErrorKind::StorageFull(detail),
            _ => fallback(detail),
        };
        Self::new(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error, ErrorKind};

    #[test]
    fn test_from_io_keeps_medium_failures_distinct() {
        let denied = StorageError::from_io(
            &Error::from(ErrorKind::PermissionDenied),
            "/srv/uploads/a.png",
            StorageErrorKind::FileWrite,
        );
        assert!(matches!(
            denied.kind,
            StorageErrorKind::PermissionDenied(ref detail) if detail.starts_with("/srv/uploads/a.png: ")
        ));

        let full = StorageError::from_io(
            &Error::from(ErrorKind::StorageFull),
            "/srv/uploads/a.png",
            StorageErrorKind::FileWrite,
        );
        assert!(matches!(full.kind, StorageErrorKind::StorageFull(_)));
    }

    #[test]
    fn test_from_io_falls_back_for_other_failures() {
        let other = StorageError::from_io(
            &Error::new(ErrorKind::Other, "device went away"),
            "/srv/uploads",
            StorageErrorKind::DirectoryCreation,
        );
        assert_eq!(
            other.kind,
            StorageErrorKind::DirectoryCreation("/srv/uploads: device went away".to_string())
        );
        assert_eq!(other.file, file!());
    }
}
