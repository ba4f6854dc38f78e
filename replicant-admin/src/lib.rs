//! Ambient runtime configuration and logging setup.
//!
//! Deliberately *not* a full config-file layer: typed environment-variable
//! loading with sane defaults is as far as this goes, with logging wired
//! up separately via `init_tracing`.

use std::time::Duration;

/// Process-wide knobs the Replicant engine's embedder controls:
/// `persistenceInterval` defaults and the persistence root.
#[derive(Clone, Debug, PartialEq)]
pub struct RuntimeConfig {
    /// Root directory under which each namespace gets its own store file
    /// (default: `db/replicants/`).
    pub persistence_root: std::path::PathBuf,
    /// Default `persistenceInterval` for replicants that don't override it.
    pub default_persistence_interval: Duration,
    /// Whether the persistence root is created automatically if absent.
    pub auto_create_persistence_root: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            persistence_root: std::path::PathBuf::from("db/replicants"),
            default_persistence_interval: Duration::from_millis(100),
            auto_create_persistence_root: true,
        }
    }
}

impl RuntimeConfig {
    /// Loads overrides from environment variables, falling back to
    /// [`RuntimeConfig::default`] for anything unset. Never panics — an
    /// unparsable value is logged and ignored, the default is kept.
    ///
    /// - `REPLICANT_PERSISTENCE_ROOT` — directory path.
    /// - `REPLICANT_PERSISTENCE_INTERVAL_MS` — positive integer milliseconds.
    pub fn from_env() -> Self {
        let mut config = RuntimeConfig::default();

        if let Ok(root) = std::env::var("REPLICANT_PERSISTENCE_ROOT") {
            if !root.is_empty() {
                config.persistence_root = std::path::PathBuf::from(root);
            }
        }

        if let Ok(raw) = std::env::var("REPLICANT_PERSISTENCE_INTERVAL_MS") {
            match raw.parse::<u64>() {
                Ok(ms) => config.default_persistence_interval = Duration::from_millis(ms),
                Err(_) => tracing::warn!(
                    target: "replicant",
                    value = %raw,
                    "ignoring unparsable REPLICANT_PERSISTENCE_INTERVAL_MS"
                ),
            }
        }

        config
    }
}

/// Installs a `tracing-subscriber` `fmt` layer driven by `EnvFilter`
/// (`RUST_LOG`). Safe to call more than once; later calls are no-ops if a
/// global subscriber is already installed.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}
