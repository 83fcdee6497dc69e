//! Stored file value types.

use chrono::{DateTime, Utc};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use sha2::{Digest, Sha256};

/// Description of a stored payload, returned by every storage operation.
///
/// Created once per save and never changed by the backend afterwards.
/// `size` and `checksum` always describe the exact bytes that were saved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Getters, derive_setters::Setters)]
#[serde(rename_all = "camelCase")]
#[setters(prefix = "with_")]
pub struct StoredFile {
    /// Backend-specific identity used for every later lookup
    #[setters(skip)]
    id: String,
    /// Name supplied by the uploader, for display only
    #[setters(skip)]
    original_name: String,
    /// MIME type supplied by the uploader
    #[setters(skip)]
    mime_type: String,
    /// Payload length in bytes
    #[setters(skip)]
    size: u64,
    /// Where an external caller can reach the bytes
    #[setters(into)]
    url: String,
    /// Lowercase hex SHA-256 of the payload
    #[setters(skip)]
    checksum: String,
    /// When the payload was saved
    created_at: DateTime<Utc>,
    /// Caller-supplied attributes persisted alongside the bytes
    metadata: Map<String, JsonValue>,
}

impl StoredFile {
    /// Describe `data` saved under `id`.
    ///
    /// Size and checksum are derived from the payload; `created_at` is now.
    pub fn new(
        id: impl Into<String>,
        original_name: impl Into<String>,
        mime_type: impl Into<String>,
        data: &[u8],
        url: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            original_name: original_name.into(),
            mime_type: mime_type.into(),
            size: data.len() as u64,
            url: url.into(),
            checksum: compute_checksum(data),
            created_at: Utc::now(),
            metadata: Map::new(),
        }
    }
}

/// Compute the lowercase hex SHA-256 of `data`.
pub fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Optional inputs to `save`.
///
/// # Example
///
/// ```
/// use attache_storage::SaveOptions;
/// use serde_json::json;
///
/// let options = SaveOptions::default()
///     .with_path("issues/42")
///     .with_entry("width", json!(640))
///     .with_entry("optimized", json!(true));
///
/// assert_eq!(options.path.as_deref(), Some("issues/42"));
/// assert_eq!(options.metadata.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, derive_setters::Setters)]
#[setters(prefix = "with_", into, strip_option)]
pub struct SaveOptions {
    /// Relative sub-directory (local) or id prefix (memory); root when unset
    pub path: Option<String>,
    /// Free-form attributes persisted alongside the bytes
    pub metadata: Map<String, JsonValue>,
}

impl SaveOptions {
    /// Add a single metadata entry.
    pub fn with_entry(mut self, key: impl Into<String>, value: JsonValue) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// Payload plus description, returned by `fetch`.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedFile {
    /// Bytes exactly as saved
    pub data: Vec<u8>,
    /// Description of the stored payload
    pub file: StoredFile,
}
