//! Attache - attachment storage for the issue tracker.
//!
//! Files attached to issues (screenshots, screen recordings, logs) are
//! persisted through one storage contract with a local filesystem backend
//! and a bounded in-memory backend for ephemeral hosts.
//!
//! # Quick Start
//!
//! ```rust
//! use attache::{BackendKind, PassthroughProcessor, StorageFactory, StorageSettings, Upload, Uploader};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let factory = StorageFactory::new(StorageSettings::default().with_backend(BackendKind::Memory));
//! let uploader = Uploader::new(factory.get().await?, PassthroughProcessor);
//!
//! let upload = Upload::builder()
//!     .data(b"2024-01-01 panic at line 7".as_slice())
//!     .file_name("server.log")
//!     .mime_type("text/plain")
//!     .build()?;
//!
//! let outcome = uploader.upload(upload).await?;
//! assert!(outcome.thumbnail().is_none());
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - `attache-error` - Error types
//! - `attache-storage` - Storage contract, backends, settings and factory
//! - `attache` - Upload pipeline, logging setup and the `attache` binary
//!
//! This crate re-exports everything for convenience.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod observability;
mod upload;

pub use observability::{ObservabilityConfig, init_observability};
pub use upload::{
    DERIVATIVE_KEY, Derivative, DerivativeRole, MediaProcessor, OPTIMIZED_KEY,
    PassthroughProcessor, SOURCE_ID_KEY, Upload, UploadBuilder, UploadOutcome, Uploader,
};

// Re-export the error crate
pub use attache_error::*;

// Re-export the storage crate
pub use attache_storage::*;
