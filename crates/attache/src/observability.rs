//! Tracing subscriber setup for the binary.

use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

/// Logging options.
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    /// Filter used when `RUST_LOG` is unset (e.g. "info", "attache=debug")
    pub log_level: String,
    /// Emit one JSON object per event instead of human-readable lines
    pub json_logs: bool,
}

impl ObservabilityConfig {
    /// Create a configuration with the given default filter.
    pub fn new(log_level: impl Into<String>) -> Self {
        Self {
            log_level: log_level.into(),
            json_logs: false,
        }
    }

    /// Enable JSON-formatted logs.
    pub fn with_json_logs(mut self, enabled: bool) -> Self {
        self.json_logs = enabled;
        self
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self::new("info")
    }
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over `config.log_level` when set.
///
/// # Errors
///
/// Returns error if the filter does not parse or a subscriber is already set.
pub fn init_observability(config: ObservabilityConfig) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.log_level))?;

    let fmt_layer = if config.json_logs {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_level(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_level(true)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}
