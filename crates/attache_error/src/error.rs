//! Top-level error wrapper types.

use crate::{ConfigError, JsonError, StorageError, UploadError};

/// Every error family produced by the attache crates.
///
/// # Examples
///
/// ```
/// use attache_error::{AttacheError, ConfigError};
///
/// let err: AttacheError = ConfigError::new("memory_ceiling must be positive").into();
/// assert!(format!("{}", err).contains("Configuration Error"));
/// ```
#[derive(Debug, derive_more::From, derive_more::Display, derive_more::Error)]
pub enum AttacheErrorKind {
    /// Storage backend error
    #[from(StorageError)]
    Storage(StorageError),
    /// Configuration error
    #[from(ConfigError)]
    Config(ConfigError),
    /// JSON serialization/deserialization error
    #[from(JsonError)]
    Json(JsonError),
    /// Upload pipeline error
    #[from(UploadError)]
    Upload(UploadError),
}

/// Attache error with kind discrimination.
#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("Attache Error: {}", _0)]
pub struct AttacheError(Box<AttacheErrorKind>);

impl AttacheError {
    /// Create a new error from a kind.
    pub fn new(kind: AttacheErrorKind) -> Self {
        Self(Box::new(kind))
    }

    /// Get the error kind.
    pub fn kind(&self) -> &AttacheErrorKind {
        &self.0
    }

    /// Storage error kind, if this is a storage failure.
    pub fn storage_kind(&self) -> Option<&crate::StorageErrorKind> {
        match self.kind() {
            AttacheErrorKind::Storage(e) => Some(&e.kind),
            _ => None,
        }
    }
}

impl<T> From<T> for AttacheError
where
    T: Into<AttacheErrorKind>,
{
    fn from(err: T) -> Self {
        Self::new(err.into())
    }
}

/// Result type for attache operations.
pub type AttacheResult<T> = std::result::Result<T, AttacheError>;
