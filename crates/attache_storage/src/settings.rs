//! Storage configuration.
//!
//! Settings are layered the same way as the rest of the workspace config:
//! 1. Bundled defaults (`attache.toml` embedded at build time)
//! 2. User config in home directory (`~/.config/attache/attache.toml`)
//! 3. User config in current directory (`./attache.toml`)
//! 4. `ATTACHE_*` environment variables
//!
//! The backend is chosen by, in order: an explicit `backend` setting, a
//! serverless-platform signal in the environment (implies `memory`), and
//! finally the `local` default.

use crate::memory::{DEFAULT_INLINE_THRESHOLD, DEFAULT_MEMORY_CEILING};
use attache_error::{AttacheError, AttacheResult, ConfigError};
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, File, FileFormat};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, instrument};

/// Bundled default configuration.
const DEFAULT_CONFIG: &str = include_str!("../../../attache.toml");

/// Environment variables that override individual settings.
pub const ENV_OVERRIDES: &[(&str, &str)] = &[
    ("ATTACHE_BACKEND", "backend"),
    ("ATTACHE_ROOT", "root"),
    ("ATTACHE_PUBLIC_BASE_URL", "public_base_url"),
    ("ATTACHE_MAX_FILE_SIZE", "max_file_size"),
    ("ATTACHE_MEMORY_CEILING", "memory_ceiling"),
    ("ATTACHE_INLINE_THRESHOLD", "inline_threshold"),
];

/// Environment variables set by runtimes that have no writable persistent disk.
pub const PLATFORM_SIGNALS: &[&str] = &[
    "VERCEL",
    "AWS_LAMBDA_FUNCTION_NAME",
    "NETLIFY",
    "K_SERVICE",
    "FUNCTION_TARGET",
];

/// Available storage backends.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::EnumIter,
    strum::EnumString,
    derive_more::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum BackendKind {
    /// Payloads on the filesystem with JSON side-cars
    #[display("local")]
    Local,
    /// Payloads in process memory under a byte ceiling
    #[display("memory")]
    Memory,
}

/// Why the configured backend was chosen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase", tag = "reason")]
pub enum BackendSource {
    /// Set in a config file or `ATTACHE_BACKEND`
    Explicit,
    /// Inferred from a serverless platform variable
    Platform {
        /// The environment variable that was detected
        signal: String,
    },
    /// Nothing selected a backend
    Default,
}

/// Settings as read from config sources, before backend resolution.
#[derive(Debug, Clone, Deserialize)]
struct RawSettings {
    #[serde(default)]
    backend: Option<String>,
    #[serde(default = "default_root")]
    root: PathBuf,
    #[serde(default = "default_public_base_url")]
    public_base_url: String,
    #[serde(default = "default_max_file_size")]
    max_file_size: u64,
    #[serde(default = "default_memory_ceiling")]
    memory_ceiling: u64,
    #[serde(default = "default_inline_threshold")]
    inline_threshold: u64,
}

fn default_root() -> PathBuf {
    PathBuf::from("./uploads")
}

fn default_public_base_url() -> String {
    "/uploads".to_string()
}

fn default_max_file_size() -> u64 {
    50 * 1024 * 1024
}

fn default_memory_ceiling() -> u64 {
    DEFAULT_MEMORY_CEILING
}

fn default_inline_threshold() -> u64 {
    DEFAULT_INLINE_THRESHOLD
}

/// Resolved storage settings.
///
/// # Example
///
/// ```
/// use attache_storage::{BackendKind, BackendSource, StorageSettings};
/// use std::collections::HashMap;
///
/// let env = HashMap::from([("VERCEL".to_string(), "1".to_string())]);
/// let settings = StorageSettings::resolve(&env).unwrap();
///
/// assert_eq!(*settings.backend(), BackendKind::Memory);
/// assert_eq!(
///     settings.backend_source(),
///     &BackendSource::Platform { signal: "VERCEL".to_string() }
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Getters, derive_setters::Setters)]
#[setters(prefix = "with_", into)]
pub struct StorageSettings {
    /// Backend to instantiate
    backend: BackendKind,
    /// Why `backend` was chosen
    backend_source: BackendSource,
    /// Local backend root directory
    root: PathBuf,
    /// Prefix that turns an id into a dereferenceable URL
    public_base_url: String,
    /// Largest single payload accepted
    max_file_size: u64,
    /// Memory backend resident-byte ceiling
    memory_ceiling: u64,
    /// Memory backend inline data URL threshold
    inline_threshold: u64,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: BackendKind::Local,
            backend_source: BackendSource::Default,
            root: default_root(),
            public_base_url: default_public_base_url(),
            max_file_size: default_max_file_size(),
            memory_ceiling: default_memory_ceiling(),
            inline_threshold: default_inline_threshold(),
        }
    }
}

impl StorageSettings {
    /// Load settings from every source, using the process environment.
    ///
    /// User config files are optional and silently skipped if not found.
    #[instrument]
    pub fn load() -> AttacheResult<Self> {
        debug!("Loading storage settings: env > current dir > home dir > bundled defaults");

        let mut builder = bundled();

        if let Some(home) = dirs::home_dir() {
            let home_config = home.join(".config/attache/attache.toml");
            builder = builder.add_source(File::from(home_config).required(false));
        }

        builder = builder.add_source(File::with_name("attache").required(false));

        Self::finish(builder, &process_env())
    }

    /// Load settings from a specific file on top of the bundled defaults,
    /// then apply the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> AttacheResult<Self> {
        debug!("Loading storage settings from file");
        let builder = bundled().add_source(File::from(path.as_ref()));
        Self::finish(builder, &process_env())
    }

    /// Resolve settings from the bundled defaults and the given environment
    /// only. No files are consulted, which keeps resolution deterministic.
    #[instrument(skip(env))]
    pub fn resolve(env: &HashMap<String, String>) -> AttacheResult<Self> {
        Self::finish(bundled(), env)
    }

    fn finish(
        mut builder: ConfigBuilder<DefaultState>,
        env: &HashMap<String, String>,
    ) -> AttacheResult<Self> {
        for (var, key) in ENV_OVERRIDES {
            if let Some(value) = env.get(*var).map(|v| v.trim()).filter(|v| !v.is_empty()) {
                debug!(var, key, "Applying environment override");
                builder = builder.set_override(*key, value.to_string()).map_err(|e| {
                    AttacheError::from(ConfigError::new(format!(
                        "Invalid override {}: {}",
                        var, e
                    )))
                })?;
            }
        }

        let raw: RawSettings = builder
            .build()
            .map_err(|e| {
                AttacheError::from(ConfigError::new(format!(
                    "Failed to build storage configuration: {}",
                    e
                )))
            })?
            .try_deserialize()
            .map_err(|e| {
                AttacheError::from(ConfigError::new(format!(
                    "Failed to parse storage configuration: {}",
                    e
                )))
            })?;

        let settings = raw.resolve(env)?;
        settings.validate()?;

        tracing::info!(
            backend = %settings.backend,
            source = ?settings.backend_source,
            "Resolved storage settings"
        );
        Ok(settings)
    }

    /// Check limits and prefixes for values that could never work.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` naming the first invalid setting.
    pub fn validate(&self) -> AttacheResult<()> {
        if self.memory_ceiling == 0 {
            return Err(ConfigError::new("memory_ceiling must be greater than zero").into());
        }
        if self.max_file_size == 0 {
            return Err(ConfigError::new("max_file_size must be greater than zero").into());
        }
        if self.public_base_url.trim().is_empty() {
            return Err(ConfigError::new("public_base_url must not be empty").into());
        }
        if self.backend == BackendKind::Local && self.root.as_os_str().is_empty() {
            return Err(ConfigError::new("root must not be empty for the local backend").into());
        }
        Ok(())
    }
}

impl RawSettings {
    fn resolve(self, env: &HashMap<String, String>) -> AttacheResult<StorageSettings> {
        let explicit = self
            .backend
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty());

        let (backend, backend_source) = match explicit {
            Some(name) => {
                let backend = BackendKind::from_str(name).map_err(|_| {
                    ConfigError::new(format!(
                        "Unknown storage backend '{}' (expected 'local' or 'memory')",
                        name
                    ))
                })?;
                (backend, BackendSource::Explicit)
            }
            None => match detect_platform(env) {
                Some(signal) => (BackendKind::Memory, BackendSource::Platform { signal }),
                None => (BackendKind::Local, BackendSource::Default),
            },
        };

        Ok(StorageSettings {
            backend,
            backend_source,
            root: self.root,
            public_base_url: self.public_base_url,
            max_file_size: self.max_file_size,
            memory_ceiling: self.memory_ceiling,
            inline_threshold: self.inline_threshold,
        })
    }
}

/// Name of the first platform signal present (and non-empty) in `env`.
pub fn detect_platform(env: &HashMap<String, String>) -> Option<String> {
    PLATFORM_SIGNALS
        .iter()
        .find(|var| env.get(**var).is_some_and(|value| !value.trim().is_empty()))
        .map(|var| var.to_string())
}

fn bundled() -> ConfigBuilder<DefaultState> {
    Config::builder().add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
}

fn process_env() -> HashMap<String, String> {
    // Non-unicode variables cannot name or configure anything here
    std::env::vars_os()
        .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
        .collect()
}
