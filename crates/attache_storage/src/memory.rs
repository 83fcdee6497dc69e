//! Memory-resident storage with a hard byte budget.
//!
//! Every payload lives in process memory and is lost on restart. The sum of
//! resident payload bytes never exceeds the configured ceiling: when a save
//! would cross it, the oldest entries are evicted first until the new payload
//! fits. Eviction is purely age-based; reads do not refresh an entry.

use crate::storage::{ensure_within_limit, join_url};
use crate::{
    BackendKind, FetchedFile, FileStorage, SaveOptions, StorageSettings, StoredFile,
    generate_identity, sanitize_relative_path,
};
use attache_error::{AttacheResult, StorageError, StorageErrorKind};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::Mutex;

/// Default ceiling on resident payload bytes (100 MiB).
pub const DEFAULT_MEMORY_CEILING: u64 = 100 * 1024 * 1024;

/// Default size at or below which `url` is an inline data URL (10 MiB).
pub const DEFAULT_INLINE_THRESHOLD: u64 = 10 * 1024 * 1024;

/// Eviction order: creation time, then insertion sequence for ties.
type AgeKey = (DateTime<Utc>, u64);

#[derive(Debug)]
struct MemoryRecord {
    file: StoredFile,
    age: AgeKey,
}

/// Tables guarded together so check, evict and insert happen atomically.
#[derive(Debug, Default)]
struct MemoryState {
    blobs: HashMap<String, Vec<u8>>,
    records: HashMap<String, MemoryRecord>,
    by_age: BTreeMap<AgeKey, String>,
    resident_bytes: u64,
    next_sequence: u64,
}

impl MemoryState {
    fn insert(&mut self, file: StoredFile, data: Vec<u8>) {
        let age = (*file.created_at(), self.next_sequence);
        self.next_sequence += 1;

        let id = file.id().clone();
        self.resident_bytes += data.len() as u64;
        self.by_age.insert(age, id.clone());
        self.blobs.insert(id.clone(), data);
        self.records.insert(id, MemoryRecord { file, age });
    }

    /// Remove `id` from every table, returning the bytes released.
    fn remove(&mut self, id: &str) -> Option<u64> {
        let record = self.records.remove(id)?;
        self.by_age.remove(&record.age);
        let released = self
            .blobs
            .remove(id)
            .map(|data| data.len() as u64)
            .unwrap_or_default();
        self.resident_bytes = self.resident_bytes.saturating_sub(released);
        Some(released)
    }

    /// Evict oldest entries until `incoming` more bytes fit under `ceiling`
    /// or nothing is left. Returns the evicted ids and their sizes.
    fn evict_for(&mut self, incoming: u64, ceiling: u64) -> Vec<(String, u64)> {
        let mut evicted = Vec::new();
        while self.resident_bytes + incoming > ceiling {
            let Some(id) = self.by_age.values().next().cloned() else {
                break;
            };
            if let Some(released) = self.remove(&id) {
                tracing::debug!(id = %id, released, "Evicted entry");
                evicted.push((id, released));
            }
        }
        evicted
    }
}

/// In-process storage backend bounded by a resident-byte ceiling.
///
/// One instance should serve the whole process; two instances would each
/// enforce the ceiling independently. Share it behind an `Arc` (see
/// `StorageFactory`).
///
/// # Example
///
/// ```
/// use attache_storage::{FileStorage, MemoryBackend, SaveOptions};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let storage = MemoryBackend::new(1024);
///
/// let first = storage.save(&[0u8; 600], "a.bin", "application/octet-stream", SaveOptions::default()).await?;
/// let second = storage.save(&[1u8; 800], "b.bin", "application/octet-stream", SaveOptions::default()).await?;
///
/// // Both cannot fit under 1 KB; the older one was evicted
/// assert!(!storage.exists(first.id()).await?);
/// assert!(storage.exists(second.id()).await?);
/// assert_eq!(storage.resident_bytes().await, 800);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct MemoryBackend {
    state: Mutex<MemoryState>,
    max_resident_bytes: u64,
    inline_threshold: u64,
    max_file_size: u64,
    public_base_url: String,
}

impl MemoryBackend {
    /// Create an empty backend with the given resident-byte ceiling.
    pub fn new(max_resident_bytes: u64) -> Self {
        tracing::info!(max_resident_bytes, "Created memory storage");
        Self {
            state: Mutex::new(MemoryState::default()),
            max_resident_bytes,
            inline_threshold: DEFAULT_INLINE_THRESHOLD,
            max_file_size: u64::MAX,
            public_base_url: "/uploads".to_string(),
        }
    }

    /// Build from resolved settings.
    pub fn from_settings(settings: &StorageSettings) -> Self {
        Self::new(*settings.memory_ceiling())
            .with_inline_threshold(*settings.inline_threshold())
            .with_max_file_size(*settings.max_file_size())
            .with_public_base_url(settings.public_base_url().as_str())
    }

    /// Set the size at or below which `url` is an inline data URL.
    pub fn with_inline_threshold(mut self, threshold: u64) -> Self {
        self.inline_threshold = threshold;
        self
    }

    /// Set the single-file size limit.
    pub fn with_max_file_size(mut self, limit: u64) -> Self {
        self.max_file_size = limit;
        self
    }

    /// Set the prefix used to build reference URLs for large payloads.
    pub fn with_public_base_url(mut self, url: impl Into<String>) -> Self {
        self.public_base_url = url.into();
        self
    }

    /// Configured ceiling on resident payload bytes.
    pub fn max_resident_bytes(&self) -> u64 {
        self.max_resident_bytes
    }

    /// Payload bytes currently held.
    pub async fn resident_bytes(&self) -> u64 {
        self.state.lock().await.resident_bytes
    }

    /// Number of stored entries.
    pub async fn len(&self) -> usize {
        self.state.lock().await.records.len()
    }

    /// Whether nothing is stored.
    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.records.is_empty()
    }

    /// Description of a stored payload as handed to callers.
    ///
    /// Small payloads carry an inline `data:` URL; large ones carry the
    /// public reference built from the same id, so `url` never introduces a
    /// second identity.
    fn present(&self, file: &StoredFile, data: &[u8]) -> StoredFile {
        if (data.len() as u64) <= self.inline_threshold {
            file.clone().with_url(data_url(file.mime_type(), data))
        } else {
            file.clone()
        }
    }
}

/// Self-describing inline reference: `data:<mime>;base64,<payload>`.
pub fn data_url(mime_type: &str, data: &[u8]) -> String {
    format!("data:{};base64,{}", mime_type, BASE64.encode(data))
}

#[async_trait::async_trait]
impl FileStorage for MemoryBackend {
    #[tracing::instrument(skip(self, data, options), fields(size = data.len()))]
    async fn save(
        &self,
        data: &[u8],
        original_name: &str,
        mime_type: &str,
        options: SaveOptions,
    ) -> AttacheResult<StoredFile> {
        let size = data.len() as u64;
        ensure_within_limit(size, self.max_file_size)?;

        // Nothing could make room, so don't evict anything
        if size > self.max_resident_bytes {
            tracing::warn!(size, ceiling = self.max_resident_bytes, "Payload exceeds memory ceiling");
            return Err(StorageError::new(StorageErrorKind::CapacityExceeded {
                requested: size,
                ceiling: self.max_resident_bytes,
            })
            .into());
        }

        let SaveOptions { path, metadata } = options;
        let prefix = sanitize_relative_path(path.as_deref().unwrap_or_default())?;

        // Check, evict and insert under one lock with no await in between
        let mut state = self.state.lock().await;

        let id = loop {
            let identity = generate_identity(original_name);
            let candidate = if prefix.is_empty() {
                identity
            } else {
                format!("{}/{}", prefix, identity)
            };
            if !state.records.contains_key(&candidate) {
                break candidate;
            }
        };

        let evicted = state.evict_for(size, self.max_resident_bytes);

        let file = StoredFile::new(
            id.as_str(),
            original_name,
            mime_type,
            data,
            join_url(&self.public_base_url, &id),
        )
        .with_metadata(metadata);
        state.insert(file.clone(), data.to_vec());

        let resident_bytes = state.resident_bytes;
        debug_assert!(resident_bytes <= self.max_resident_bytes);
        drop(state);

        if !evicted.is_empty() {
            tracing::info!(
                evicted = evicted.len(),
                released = evicted.iter().map(|(_, size)| size).sum::<u64>(),
                "Evicted oldest entries to make room"
            );
        }
        tracing::info!(
            id = %id,
            size,
            mime_type,
            resident_bytes,
            ceiling = self.max_resident_bytes,
            "Stored file in memory"
        );

        Ok(self.present(&file, data))
    }

    #[tracing::instrument(skip(self))]
    async fn fetch(&self, id: &str) -> AttacheResult<Option<FetchedFile>> {
        let state = self.state.lock().await;
        let (Some(record), Some(data)) = (state.records.get(id), state.blobs.get(id)) else {
            tracing::debug!(id, "File not found");
            return Ok(None);
        };

        let data = data.clone();
        let file = record.file.clone();
        drop(state);

        let file = self.present(&file, &data);
        tracing::debug!(id, size = data.len(), "Fetched file");
        Ok(Some(FetchedFile { data, file }))
    }

    #[tracing::instrument(skip(self))]
    async fn exists(&self, id: &str) -> AttacheResult<bool> {
        Ok(self.state.lock().await.records.contains_key(id))
    }

    #[tracing::instrument(skip(self))]
    async fn delete(&self, id: &str) -> AttacheResult<bool> {
        let mut state = self.state.lock().await;
        match state.remove(id) {
            Some(released) => {
                tracing::info!(id, released, resident_bytes = state.resident_bytes, "Deleted file");
                Ok(true)
            }
            None => {
                tracing::debug!(id, "Nothing to delete");
                Ok(false)
            }
        }
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Memory
    }
}
