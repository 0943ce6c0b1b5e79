//! Application-level configuration loading for runtime tunables.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "MINDMELD_BACK_CONFIG_PATH";

/// Immutable runtime configuration shared across the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Seconds a word-bomb player has to answer before being eliminated.
    pub turn_timeout: Duration,
    /// How often the write-behind queue is drained.
    pub drain_interval: Duration,
    /// Maximum number of pending writes flushed per drain pass.
    pub drain_batch_size: usize,
    /// Drain attempts before a pending write is dropped.
    pub max_write_retries: u32,
    /// How often the idle sweep runs.
    pub sweep_interval: Duration,
    /// Inactivity span after which a session is abandoned, then evicted.
    pub idle_threshold: Duration,
}

impl AppConfig {
    /// Load the configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let config: Self = raw.into();
                    info!(path = %path.display(), "loaded configuration from file");
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            turn_timeout: Duration::from_secs(20),
            drain_interval: Duration::from_secs(2),
            drain_batch_size: 10,
            max_write_retries: 3,
            sweep_interval: Duration::from_secs(60 * 60),
            idle_threshold: Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// JSON representation of the configuration file. Every field is optional;
/// absent fields keep their defaults.
#[derive(Debug, Deserialize)]
struct RawConfig {
    turn_timeout_secs: Option<u64>,
    drain_interval_secs: Option<u64>,
    drain_batch_size: Option<usize>,
    max_write_retries: Option<u32>,
    sweep_interval_secs: Option<u64>,
    idle_threshold_secs: Option<u64>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = AppConfig::default();
        Self {
            turn_timeout: value
                .turn_timeout_secs
                .map_or(defaults.turn_timeout, Duration::from_secs),
            drain_interval: value
                .drain_interval_secs
                .map_or(defaults.drain_interval, Duration::from_secs),
            drain_batch_size: value.drain_batch_size.unwrap_or(defaults.drain_batch_size),
            max_write_retries: value.max_write_retries.unwrap_or(defaults.max_write_retries),
            sweep_interval: value
                .sweep_interval_secs
                .map_or(defaults.sweep_interval, Duration::from_secs),
            idle_threshold: value
                .idle_threshold_secs
                .map_or(defaults.idle_threshold, Duration::from_secs),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
