//! Error types for the attache storage layer.
//!
//! # Error Hierarchy
//!
//! All errors follow the `ErrorKind` + wrapper struct pattern:
//! - `*ErrorKind` enum defines specific error conditions
//! - `*Error` struct wraps the kind with source location tracking
//! - All constructors use `#[track_caller]` for automatic location capture
//!
//! Absence of a stored object is not an error anywhere in this workspace.
//! Lookups return `Option`/`bool` and reserve errors for real failures.
//!
//! # Examples
//!
//! ```
//! use attache_error::{AttacheResult, StorageError, StorageErrorKind};
//!
//! fn reserve(requested: u64, ceiling: u64) -> AttacheResult<()> {
//!     if requested > ceiling {
//!         Err(StorageError::new(StorageErrorKind::CapacityExceeded { requested, ceiling }))?
//!     }
//!     Ok(())
//! }
//!
//! assert!(reserve(2048, 1024).is_err());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod json;
mod storage;
mod upload;

pub use config::ConfigError;
pub use error::{AttacheError, AttacheErrorKind, AttacheResult};
pub use json::JsonError;
pub use storage::{StorageError, StorageErrorKind};
pub use upload::{UploadError, UploadErrorKind};
