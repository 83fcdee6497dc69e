//! Upload orchestration.
//!
//! An [`Uploader`] stores the original payload and, for images and video,
//! hands the bytes to a [`MediaProcessor`] whose derivatives (an optimized
//! rendition and a thumbnail) are stored as independent files that point
//! back at the original through their metadata.

use async_trait::async_trait;
use attache_error::{AttacheResult, UploadError, UploadErrorKind};
use attache_storage::{FileStorage, MediaKind, SaveOptions, StoredFile};
use serde::Serialize;
use serde_json::{Map, Value as JsonValue, json};
use std::sync::Arc;

/// Metadata key naming the derivative role.
pub const DERIVATIVE_KEY: &str = "derivative";
/// Metadata key pointing a derivative at its original.
pub const SOURCE_ID_KEY: &str = "sourceId";
/// Metadata key set on optimized renditions.
pub const OPTIMIZED_KEY: &str = "optimized";

/// A payload waiting to be stored.
///
/// # Example
///
/// ```
/// use attache::Upload;
/// use serde_json::json;
///
/// let upload = Upload::builder()
///     .data(b"\x89PNG...".as_slice())
///     .file_name("photo.png")
///     .mime_type("image/png")
///     .path("issues/42")
///     .metadata_entry("uploadedBy", json!("ana"))
///     .build()
///     .unwrap();
///
/// assert_eq!(upload.file_name(), "photo.png");
/// assert_eq!(upload.path().as_deref(), Some("issues/42"));
/// ```
#[derive(Debug, Clone, PartialEq, derive_builder::Builder, derive_getters::Getters)]
#[builder(
    setter(into),
    build_fn(private, name = "build_internal", validate = "Self::validate")
)]
pub struct Upload {
    /// Raw bytes
    data: Vec<u8>,
    /// Name supplied by the uploader
    file_name: String,
    /// MIME type supplied by the uploader
    mime_type: String,
    /// Relative sub-directory or id prefix
    #[builder(default, setter(into, strip_option))]
    path: Option<String>,
    /// Attributes stored with the original
    #[builder(default)]
    metadata: Map<String, JsonValue>,
}

impl Upload {
    /// Start building an upload.
    pub fn builder() -> UploadBuilder {
        UploadBuilder::default()
    }
}

impl UploadBuilder {
    /// Add a single metadata entry.
    pub fn metadata_entry(&mut self, key: impl Into<String>, value: JsonValue) -> &mut Self {
        self.metadata
            .get_or_insert_with(Map::new)
            .insert(key.into(), value);
        self
    }

    /// Build the upload.
    ///
    /// # Errors
    ///
    /// Returns `Rejected` if data, file name or MIME type is missing or blank.
    pub fn build(&self) -> AttacheResult<Upload> {
        self.build_internal()
            .map_err(|e| UploadError::new(UploadErrorKind::Rejected(e.to_string())).into())
    }

    fn validate(&self) -> Result<(), String> {
        match &self.file_name {
            Some(name) if name.trim().is_empty() => Err("file name is blank".to_string()),
            _ => match &self.mime_type {
                Some(mime) if mime.trim().is_empty() => Err("MIME type is blank".to_string()),
                _ => Ok(()),
            },
        }
    }
}

/// What a derivative is for.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    strum::Display,
    strum::AsRefStr,
    strum::EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DerivativeRole {
    /// Re-encoded rendition for delivery
    Optimized,
    /// Small preview
    Thumbnail,
}

/// Bytes produced by a [`MediaProcessor`] from an original.
#[derive(Debug, Clone, PartialEq, derive_getters::Getters)]
pub struct Derivative {
    /// What the bytes are for
    role: DerivativeRole,
    /// Encoded output
    data: Vec<u8>,
    /// Output MIME type, which may differ from the original's
    mime_type: String,
    /// Attributes of the rendition, e.g. dimensions
    metadata: Map<String, JsonValue>,
}

impl Derivative {
    /// Create a derivative with empty metadata.
    pub fn new(
        role: DerivativeRole,
        data: impl Into<Vec<u8>>,
        mime_type: impl Into<String>,
    ) -> Self {
        Self {
            role,
            data: data.into(),
            mime_type: mime_type.into(),
            metadata: Map::new(),
        }
    }

    /// Add a metadata entry, e.g. output dimensions.
    pub fn with_entry(mut self, key: impl Into<String>, value: JsonValue) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// Boundary to an external transcoder.
///
/// Called only for images and video. Returning an empty list is fine.
#[async_trait]
pub trait MediaProcessor: Send + Sync {
    /// Produce derivatives of `data`.
    ///
    /// # Errors
    ///
    /// Returns error if the media cannot be processed. The uploader keeps
    /// the original in that case.
    async fn process(
        &self,
        kind: MediaKind,
        data: &[u8],
        mime_type: &str,
    ) -> AttacheResult<Vec<Derivative>>;
}

/// Processor that never produces derivatives.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughProcessor;

#[async_trait]
impl MediaProcessor for PassthroughProcessor {
    async fn process(
        &self,
        _kind: MediaKind,
        _data: &[u8],
        _mime_type: &str,
    ) -> AttacheResult<Vec<Derivative>> {
        Ok(Vec::new())
    }
}

/// Everything stored for one upload.
#[derive(Debug, Clone, PartialEq, Serialize, derive_getters::Getters)]
pub struct UploadOutcome {
    /// The payload as uploaded
    original: StoredFile,
    /// Optimized rendition, if one was produced
    optimized: Option<StoredFile>,
    /// Thumbnail, if one was produced
    thumbnail: Option<StoredFile>,
}

impl UploadOutcome {
    fn slot(&mut self, role: DerivativeRole) -> &mut Option<StoredFile> {
        match role {
            DerivativeRole::Optimized => &mut self.optimized,
            DerivativeRole::Thumbnail => &mut self.thumbnail,
        }
    }
}

/// Stores uploads and their derivatives.
pub struct Uploader<P> {
    storage: Arc<dyn FileStorage>,
    processor: P,
}

impl<P: MediaProcessor> Uploader<P> {
    /// Create an uploader over a storage backend.
    pub fn new(storage: Arc<dyn FileStorage>, processor: P) -> Self {
        Self { storage, processor }
    }

    /// Backend the uploader writes to.
    pub fn storage(&self) -> &Arc<dyn FileStorage> {
        &self.storage
    }

    /// Store `upload` and any derivatives of it.
    ///
    /// # Errors
    ///
    /// Storage failures propagate. If a derivative cannot be stored, the
    /// files already stored for this upload are deleted first. Processor
    /// failures do not propagate: the original is returned alone.
    #[tracing::instrument(
        skip(self, upload),
        fields(file_name = %upload.file_name, size = upload.data.len())
    )]
    pub async fn upload(&self, upload: Upload) -> AttacheResult<UploadOutcome> {
        let Upload {
            data,
            file_name,
            mime_type,
            path,
            metadata,
        } = upload;

        let options = SaveOptions {
            path: path.clone(),
            metadata,
        };
        let original = self
            .storage
            .save(&data, &file_name, &mime_type, options)
            .await?;

        let mut outcome = UploadOutcome {
            original,
            optimized: None,
            thumbnail: None,
        };

        let kind = MediaKind::from_mime(&mime_type);
        if !kind.is_transcodable() {
            tracing::debug!(%kind, "Skipping media processing");
            return Ok(outcome);
        }

        let derivatives = match self.processor.process(kind, &data, &mime_type).await {
            Ok(derivatives) => derivatives,
            Err(e) => {
                tracing::warn!(
                    id = %outcome.original.id(),
                    error = %e,
                    "Media processing failed, keeping original only"
                );
                return Ok(outcome);
            }
        };

        for derivative in derivatives {
            let Derivative {
                role,
                data,
                mime_type,
                metadata,
            } = derivative;

            if outcome.slot(role).is_some() {
                tracing::warn!(%role, "Ignoring duplicate derivative");
                continue;
            }

            let mut options = SaveOptions {
                path: path.clone(),
                metadata,
            }
            .with_entry(DERIVATIVE_KEY, json!(role.as_ref()))
            .with_entry(SOURCE_ID_KEY, json!(outcome.original.id()));
            if role == DerivativeRole::Optimized {
                options = options.with_entry(OPTIMIZED_KEY, json!(true));
            }

            let name = derivative_name(&file_name, role, &mime_type);
            let stored = match self.storage.save(&data, &name, &mime_type, options).await {
                Ok(stored) => stored,
                Err(e) => {
                    tracing::warn!(%role, error = %e, "Derivative save failed, rolling back upload");
                    self.discard(&outcome).await;
                    return Err(e);
                }
            };
            tracing::info!(%role, id = %stored.id(), size = *stored.size(), "Stored derivative");
            *outcome.slot(role) = Some(stored);
        }

        Ok(outcome)
    }

    /// Delete everything stored for a failed upload. Best effort: the caller
    /// never received these ids, so a failure here is only logged.
    async fn discard(&self, outcome: &UploadOutcome) {
        let stored = std::iter::once(&outcome.original)
            .chain(outcome.optimized.as_ref())
            .chain(outcome.thumbnail.as_ref());
        for file in stored {
            match self.storage.delete(file.id()).await {
                Ok(_) => tracing::debug!(id = %file.id(), "Discarded partial upload"),
                Err(e) => tracing::warn!(
                    id = %file.id(),
                    error = %e,
                    "Failed to discard partial upload"
                ),
            }
        }
    }
}

/// `photo.png` + thumbnail as `image/webp` becomes `photo_thumbnail.webp`.
fn derivative_name(file_name: &str, role: DerivativeRole, mime_type: &str) -> String {
    let (stem, original_ext) = match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (file_name, None),
    };
    let ext = mime_type
        .split_once('/')
        .map(|(_, subtype)| subtype)
        .filter(|subtype| !subtype.is_empty())
        .or(original_ext);

    match ext {
        Some(ext) => format!("{}_{}.{}", stem, role, ext),
        None => format!("{}_{}", stem, role),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derivative_name_follows_mime() {
        assert_eq!(
            derivative_name("photo.png", DerivativeRole::Thumbnail, "image/webp"),
            "photo_thumbnail.webp"
        );
        assert_eq!(
            derivative_name("clip", DerivativeRole::Optimized, "video/mp4"),
            "clip_optimized.mp4"
        );
        assert_eq!(
            derivative_name("a.gif", DerivativeRole::Optimized, "weird"),
            "a_optimized.gif"
        );
    }

    #[test]
    fn test_blank_name_rejected() {
        let err = Upload::builder()
            .data(b"x".as_slice())
            .file_name("  ")
            .mime_type("text/plain")
            .build()
            .unwrap_err();
        assert!(format!("{}", err).contains("file name is blank"));
    }

    #[test]
    fn test_missing_data_rejected() {
        assert!(
            Upload::builder()
                .file_name("a.txt")
                .mime_type("text/plain")
                .build()
                .is_err()
        );
    }
}
