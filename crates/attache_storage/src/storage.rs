//! Storage trait definition.

use crate::{BackendKind, FetchedFile, SaveOptions, StoredFile};
use attache_error::{AttacheResult, StorageError, StorageErrorKind};

/// Contract shared by every storage backend.
///
/// Absence is never an error: `fetch` returns `None`, `exists` and `delete`
/// return `false`. That includes ids `save` could never have returned, such
/// as `../etc/passwd` or a local side-car name. Errors are reserved for
/// failures of the medium, invalid save paths, and capacity limits.
#[async_trait::async_trait]
pub trait FileStorage: Send + Sync {
    /// Persist `data` and return its description.
    ///
    /// `original_name` is only used to derive the identity and for display;
    /// it is sanitized and never used as a path verbatim. Zero-length payloads
    /// are allowed.
    ///
    /// # Errors
    ///
    /// - `FileTooLarge` when `data` exceeds the backend's single-file limit
    /// - `CapacityExceeded` when the memory backend cannot make room
    /// - `InvalidPath` when `options.path` escapes the storage root
    /// - filesystem failures for the local backend
    async fn save(
        &self,
        data: &[u8],
        original_name: &str,
        mime_type: &str,
        options: SaveOptions,
    ) -> AttacheResult<StoredFile>;

    /// Read a stored payload back, or `None` if `id` is unknown.
    ///
    /// # Errors
    ///
    /// - `ChecksumMismatch` when the bytes no longer match the checksum
    ///   recorded at save time. This is the only way a present payload fails
    ///   to load; missing or unreadable metadata falls back to defaults.
    /// - filesystem failures other than not-found for the local backend
    async fn fetch(&self, id: &str) -> AttacheResult<Option<FetchedFile>>;

    /// Check whether `id` is stored without reading the payload.
    async fn exists(&self, id: &str) -> AttacheResult<bool>;

    /// Remove `id`. Returns `false` if nothing was stored under it.
    async fn delete(&self, id: &str) -> AttacheResult<bool>;

    /// Which backend this is.
    fn kind(&self) -> BackendKind;
}

/// Reject payloads above the single-file limit.
#[track_caller]
pub(crate) fn ensure_within_limit(size: u64, limit: u64) -> AttacheResult<()> {
    if size > limit {
        return Err(StorageError::new(StorageErrorKind::FileTooLarge { size, limit }).into());
    }
    Ok(())
}

/// Join a public prefix and an id into a URL.
pub(crate) fn join_url(base: &str, id: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), id)
}
