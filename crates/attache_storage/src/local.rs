//! Filesystem-backed storage.
//!
//! Payloads live at `<root>/<relative path>/<identity>` and each one has a
//! JSON side-car at `<same path>.meta.json`. The side-car is advisory: when
//! it is missing or unreadable, `fetch` still succeeds with default values.

use crate::storage::{ensure_within_limit, join_url};
use crate::{
    BackendKind, FetchedFile, FileStorage, SaveOptions, StorageSettings, StoredFile,
    generate_identity, sanitize_relative_path,
};
use attache_error::{AttacheResult, JsonError, StorageError, StorageErrorKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Suffix appended to a payload path to name its side-car.
pub const SIDECAR_SUFFIX: &str = ".meta.json";

/// Suffix of the file a payload is written to before it is renamed into place.
///
/// `~` never appears in an identity, so no id can collide with it.
pub const TEMP_SUFFIX: &str = ".tmp~";

/// Content type reported when the side-car does not record one.
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Filesystem storage backend.
///
/// # Example Structure
///
/// ```text
/// ./uploads/
/// ├── photo_1718000000000_3f2a...e1.png
/// ├── photo_1718000000000_3f2a...e1.png.meta.json
/// └── issues/
///     └── 42/
///         ├── log_1718000000123_9b7c...04.txt
///         └── log_1718000000123_9b7c...04.txt.meta.json
/// ```
///
/// The id returned by `save` is the path relative to the root, so ids stay
/// valid if the root directory moves.
#[derive(Debug, Clone)]
pub struct LocalBackend {
    root: PathBuf,
    public_base_url: String,
    max_file_size: u64,
}

/// On-disk side-car contents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Sidecar {
    #[serde(default)]
    original_name: Option<String>,
    #[serde(default)]
    mime_type: Option<String>,
    #[serde(default)]
    size: Option<u64>,
    #[serde(default)]
    checksum: Option<String>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    metadata: Map<String, JsonValue>,
}

impl From<&StoredFile> for Sidecar {
    fn from(file: &StoredFile) -> Self {
        Self {
            original_name: Some(file.original_name().clone()),
            mime_type: Some(file.mime_type().clone()),
            size: Some(*file.size()),
            checksum: Some(file.checksum().clone()),
            created_at: Some(*file.created_at()),
            metadata: file.metadata().clone(),
        }
    }
}

impl LocalBackend {
    /// Create a new filesystem storage backend.
    ///
    /// Creates the root directory (and any parents) if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be created.
    #[tracing::instrument(skip(root, public_base_url))]
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> AttacheResult<Self> {
        let root = root.into();

        std::fs::create_dir_all(&root).map_err(|e| {
            StorageError::from_io(&e, root.display(), StorageErrorKind::DirectoryCreation)
        })?;

        tracing::info!(root = %root.display(), "Created local storage");
        Ok(Self {
            root,
            public_base_url: public_base_url.into(),
            max_file_size: u64::MAX,
        })
    }

    /// Build from resolved settings.
    pub fn from_settings(settings: &StorageSettings) -> AttacheResult<Self> {
        Ok(Self::new(settings.root(), settings.public_base_url().as_str())?
            .with_max_file_size(*settings.max_file_size()))
    }

    /// Set the single-file size limit.
    pub fn with_max_file_size(mut self, limit: u64) -> Self {
        self.max_file_size = limit;
        self
    }

    /// Root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map an id to its payload path, or `None` if `save` could never have
    /// returned it (traversal, side-car and temp names included).
    fn resolve(&self, id: &str) -> Option<(String, PathBuf)> {
        let normalized = match sanitize_relative_path(id) {
            Ok(normalized) => normalized,
            Err(e) => {
                tracing::debug!(id, error = %e, "Id cannot name a stored payload");
                return None;
            }
        };
        if normalized.is_empty()
            || normalized.ends_with(SIDECAR_SUFFIX)
            || normalized.ends_with(TEMP_SUFFIX)
        {
            tracing::debug!(id, "Id names a storage artifact, not a payload");
            return None;
        }
        let path = self.root.join(&normalized);
        Some((normalized, path))
    }

    /// Read and parse the side-car next to `path`, tolerating any failure.
    async fn read_sidecar(path: &Path) -> Option<Sidecar> {
        let sidecar_path = sidecar_path(path);
        let raw = match tokio::fs::read(&sidecar_path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %sidecar_path.display(), "No side-car metadata");
                return None;
            }
            Err(e) => {
                tracing::warn!(path = %sidecar_path.display(), error = %e, "Unreadable side-car metadata");
                return None;
            }
        };

        match serde_json::from_slice(&raw) {
            Ok(sidecar) => Some(sidecar),
            Err(e) => {
                tracing::warn!(path = %sidecar_path.display(), error = %e, "Corrupt side-car metadata");
                None
            }
        }
    }
}

/// Side-car path for a payload path.
fn sidecar_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(SIDECAR_SUFFIX);
    PathBuf::from(name)
}

/// Temporary path a payload is written to before being renamed into place.
fn temp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(TEMP_SUFFIX);
    PathBuf::from(name)
}

/// Last path segment of an id.
fn identity_name(id: &str) -> &str {
    id.rsplit('/').next().unwrap_or(id)
}

#[async_trait::async_trait]
impl FileStorage for LocalBackend {
    #[tracing::instrument(skip(self, data, options), fields(size = data.len(), path = ?options.path))]
    async fn save(
        &self,
        data: &[u8],
        original_name: &str,
        mime_type: &str,
        options: SaveOptions,
    ) -> AttacheResult<StoredFile> {
        ensure_within_limit(data.len() as u64, self.max_file_size)?;

        let SaveOptions { path, metadata } = options;
        let relative_dir = sanitize_relative_path(path.as_deref().unwrap_or_default())?;
        let dir = if relative_dir.is_empty() {
            self.root.clone()
        } else {
            self.root.join(&relative_dir)
        };

        tokio::fs::create_dir_all(&dir).await.map_err(|e| {
            StorageError::from_io(&e, dir.display(), StorageErrorKind::DirectoryCreation)
        })?;

        let identity = generate_identity(original_name);
        let id = if relative_dir.is_empty() {
            identity.clone()
        } else {
            format!("{}/{}", relative_dir, identity)
        };
        let path = dir.join(&identity);

        let file = StoredFile::new(
            id.as_str(),
            original_name,
            mime_type,
            data,
            join_url(&self.public_base_url, &id),
        )
        .with_metadata(metadata);

        // Write to temp file first, then rename for atomicity
        let temp = temp_path(&path);
        if let Err(e) = tokio::fs::write(&temp, data).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(
                StorageError::from_io(&e, temp.display(), StorageErrorKind::FileWrite).into(),
            );
        }
        if let Err(e) = tokio::fs::rename(&temp, &path).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(StorageError::from_io(
                &e,
                format!("rename {} to {}", temp.display(), path.display()),
                StorageErrorKind::FileWrite,
            )
            .into());
        }

        let sidecar_file = sidecar_path(&path);
        let sidecar = serde_json::to_vec_pretty(&Sidecar::from(&file))
            .map_err(|e| JsonError::new(format!("side-car for {}: {}", id, e)))?;
        if let Err(e) = tokio::fs::write(&sidecar_file, sidecar).await {
            // Leave no payload behind whose id was never handed out
            let _ = tokio::fs::remove_file(&path).await;
            return Err(
                StorageError::from_io(&e, sidecar_file.display(), StorageErrorKind::FileWrite).into(),
            );
        }

        tracing::info!(
            id = %id,
            path = %path.display(),
            size = data.len(),
            mime_type,
            "Stored file"
        );

        Ok(file)
    }

    #[tracing::instrument(skip(self))]
    async fn fetch(&self, id: &str) -> AttacheResult<Option<FetchedFile>> {
        let Some((id, path)) = self.resolve(id) else {
            return Ok(None);
        };

        let stat = match tokio::fs::metadata(&path).await {
            Ok(stat) if stat.is_file() => stat,
            Ok(_) => return Ok(None),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(id = %id, "File not found");
                return Ok(None);
            }
            Err(e) => {
                return Err(
                    StorageError::from_io(&e, path.display(), StorageErrorKind::FileRead).into(),
                );
            }
        };

        let data = match tokio::fs::read(&path).await {
            Ok(data) => data,
            // Deleted between the stat and the read
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(
                    StorageError::from_io(&e, path.display(), StorageErrorKind::FileRead).into(),
                );
            }
        };

        let sidecar = Self::read_sidecar(&path).await.unwrap_or_default();
        let created_at = sidecar
            .created_at
            .or_else(|| stat.modified().ok().map(DateTime::<Utc>::from))
            .unwrap_or_else(Utc::now);

        let file = StoredFile::new(
            id.as_str(),
            sidecar
                .original_name
                .unwrap_or_else(|| identity_name(&id).to_string()),
            sidecar
                .mime_type
                .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string()),
            &data,
            join_url(&self.public_base_url, &id),
        )
        .with_created_at(created_at)
        .with_metadata(sidecar.metadata);

        if let Some(expected) = sidecar.checksum
            && &expected != file.checksum()
        {
            tracing::error!(id = %id, expected = %expected, actual = %file.checksum(), "Checksum mismatch");
            return Err(StorageError::new(StorageErrorKind::ChecksumMismatch {
                expected,
                actual: file.checksum().clone(),
            })
            .into());
        }

        tracing::debug!(id = %id, size = data.len(), "Fetched file");
        Ok(Some(FetchedFile { data, file }))
    }

    #[tracing::instrument(skip(self))]
    async fn exists(&self, id: &str) -> AttacheResult<bool> {
        let Some((_, path)) = self.resolve(id) else {
            return Ok(false);
        };
        match tokio::fs::metadata(&path).await {
            Ok(stat) => Ok(stat.is_file()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::from_io(&e, path.display(), StorageErrorKind::FileRead).into()),
        }
    }

    #[tracing::instrument(skip(self))]
    async fn delete(&self, id: &str) -> AttacheResult<bool> {
        let Some((id, path)) = self.resolve(id) else {
            return Ok(false);
        };

        // Directories and other non-files are never payloads
        let is_file = match tokio::fs::metadata(&path).await {
            Ok(stat) => stat.is_file(),
            Err(e) if e.kind() == ErrorKind::NotFound => false,
            Err(e) => {
                return Err(
                    StorageError::from_io(&e, path.display(), StorageErrorKind::FileRead).into(),
                );
            }
        };

        let removed = is_file
            && match tokio::fs::remove_file(&path).await {
                Ok(()) => true,
                Err(e) if e.kind() == ErrorKind::NotFound => false,
                Err(e) => {
                    return Err(StorageError::from_io(
                        &e,
                        path.display(),
                        StorageErrorKind::FileDelete,
                    )
                    .into());
                }
            };

        // Side-car removal is best effort; an orphan is cleaned up either way
        let sidecar_file = sidecar_path(&path);
        if let Err(e) = tokio::fs::remove_file(&sidecar_file).await
            && e.kind() != ErrorKind::NotFound
        {
            tracing::warn!(path = %sidecar_file.display(), error = %e, "Failed to remove side-car");
        }

        if removed {
            tracing::info!(id = %id, path = %path.display(), "Deleted file");
        } else {
            tracing::debug!(id = %id, "Nothing to delete");
        }
        Ok(removed)
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }
}
