//! Backend-agnostic attachment storage.
//!
//! This crate persists uploaded attachments (images, video, arbitrary files)
//! behind one async contract, [`FileStorage`], with two backends:
//!
//! - [`LocalBackend`]: payloads on disk, metadata in a JSON side-car
//! - [`MemoryBackend`]: payloads in process memory under a hard byte ceiling,
//!   evicting the oldest entries when a save needs room
//!
//! [`StorageSettings`] resolves which backend to use from config files and
//! the environment, and [`StorageFactory`] builds exactly one instance of it
//! for the process.
//!
//! # Example
//!
//! ```rust
//! use attache_storage::{FileStorage, LocalBackend, SaveOptions};
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let storage = LocalBackend::new("/tmp/store", "/uploads")?;
//!
//! let options = SaveOptions::default().with_entry("width", json!(800));
//! let stored = storage.save(b"...png bytes...", "photo.png", "image/png", options).await?;
//!
//! let fetched = storage.fetch(stored.id()).await?.expect("just saved");
//! assert_eq!(fetched.data, b"...png bytes...");
//!
//! assert!(storage.delete(stored.id()).await?);
//! assert!(!storage.delete(stored.id()).await?);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod identity;
mod local;
mod media_kind;
mod memory;
mod settings;
mod storage;
mod stored_file;

pub use attache_error::{
    AttacheError, AttacheErrorKind, AttacheResult, StorageError, StorageErrorKind,
};
pub use backend::{StorageBackend, StorageFactory};
pub use identity::{
    MAX_BASE_LEN, MAX_EXTENSION_LEN, generate_identity, sanitize_base, sanitize_extension,
    sanitize_relative_path,
};
pub use local::{DEFAULT_MIME_TYPE, LocalBackend, SIDECAR_SUFFIX, TEMP_SUFFIX};
pub use media_kind::MediaKind;
pub use memory::{DEFAULT_INLINE_THRESHOLD, DEFAULT_MEMORY_CEILING, MemoryBackend, data_url};
pub use settings::{
    BackendKind, BackendSource, ENV_OVERRIDES, PLATFORM_SIGNALS, StorageSettings, detect_platform,
};
pub use storage::FileStorage;
pub use stored_file::{FetchedFile, SaveOptions, StoredFile, compute_checksum};
