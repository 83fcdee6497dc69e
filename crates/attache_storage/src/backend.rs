//! Backend selection and the process-wide factory.

use crate::{
    BackendKind, FetchedFile, FileStorage, LocalBackend, MemoryBackend, SaveOptions,
    StorageSettings, StoredFile,
};
use attache_error::{AttacheError, AttacheResult};
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Every supported backend behind the single storage contract.
#[derive(Debug, derive_more::From)]
pub enum StorageBackend {
    /// Filesystem storage
    Local(LocalBackend),
    /// In-process storage with a byte ceiling
    Memory(MemoryBackend),
}

impl StorageBackend {
    /// Construct the backend named by `settings`.
    ///
    /// # Errors
    ///
    /// Returns error if the local root directory cannot be created.
    pub fn from_settings(settings: &StorageSettings) -> AttacheResult<Self> {
        let backend = match settings.backend() {
            BackendKind::Local => Self::Local(LocalBackend::from_settings(settings)?),
            BackendKind::Memory => Self::Memory(MemoryBackend::from_settings(settings)),
        };
        tracing::info!(backend = %backend.kind(), "Constructed storage backend");
        Ok(backend)
    }

    /// The local backend, if that is what this is.
    pub fn as_local(&self) -> Option<&LocalBackend> {
        match self {
            Self::Local(local) => Some(local),
            Self::Memory(_) => None,
        }
    }

    /// The memory backend, if that is what this is.
    pub fn as_memory(&self) -> Option<&MemoryBackend> {
        match self {
            Self::Memory(memory) => Some(memory),
            Self::Local(_) => None,
        }
    }

    fn inner(&self) -> &dyn FileStorage {
        match self {
            Self::Local(local) => local,
            Self::Memory(memory) => memory,
        }
    }
}

#[async_trait::async_trait]
impl FileStorage for StorageBackend {
    async fn save(
        &self,
        data: &[u8],
        original_name: &str,
        mime_type: &str,
        options: SaveOptions,
    ) -> AttacheResult<StoredFile> {
        self.inner().save(data, original_name, mime_type, options).await
    }

    async fn fetch(&self, id: &str) -> AttacheResult<Option<FetchedFile>> {
        self.inner().fetch(id).await
    }

    async fn exists(&self, id: &str) -> AttacheResult<bool> {
        self.inner().exists(id).await
    }

    async fn delete(&self, id: &str) -> AttacheResult<bool> {
        self.inner().delete(id).await
    }

    fn kind(&self) -> BackendKind {
        self.inner().kind()
    }
}

/// Builds the storage backend once and hands out shared handles to it.
///
/// The application owns one factory for its lifetime; every caller receives
/// a clone of the same `Arc`, so a memory backend's ceiling is enforced once
/// for the whole process. Tests construct their own factories for isolation.
///
/// # Example
///
/// ```
/// use attache_storage::{BackendKind, StorageFactory, StorageSettings};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let settings = StorageSettings::default().with_backend(BackendKind::Memory);
/// let factory = StorageFactory::new(settings);
///
/// let a = factory.get().await?;
/// let b = factory.get().await?;
/// assert!(Arc::ptr_eq(&a, &b));
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct StorageFactory {
    settings: StorageSettings,
    instance: OnceCell<Arc<StorageBackend>>,
}

impl StorageFactory {
    /// Create a factory for the given settings. Nothing is built yet.
    pub fn new(settings: StorageSettings) -> Self {
        Self {
            settings,
            instance: OnceCell::new(),
        }
    }

    /// Settings the backend is (or will be) built from.
    pub fn settings(&self) -> &StorageSettings {
        &self.settings
    }

    /// The shared backend, built on first use.
    ///
    /// # Errors
    ///
    /// Returns the construction error; a later call retries construction.
    pub async fn get(&self) -> AttacheResult<Arc<StorageBackend>> {
        self.instance
            .get_or_try_init(|| async {
                Ok::<_, AttacheError>(Arc::new(StorageBackend::from_settings(&self.settings)?))
            })
            .await
            .cloned()
    }

    /// Whether the backend has been built.
    pub fn is_initialized(&self) -> bool {
        self.instance.initialized()
    }
}
