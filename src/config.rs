//! Application-level configuration loading.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "CLIMB_BEAT_BACK_CONFIG_PATH";
const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 16;
const DEFAULT_SSE_KEEP_ALIVE_SECS: u64 = 15;

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    event_channel_capacity: usize,
    sse_keep_alive: Duration,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match Self::from_json(&contents) {
                Ok(app_config) => {
                    info!(
                        path = %path.display(),
                        event_channel_capacity = app_config.event_channel_capacity,
                        sse_keep_alive_secs = app_config.sse_keep_alive.as_secs(),
                        "loaded configuration"
                    );
                    app_config
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

    /// Parse a JSON document; omitted keys keep their defaults.
    pub fn from_json(contents: &str) -> serde_json::Result<Self> {
        serde_json::from_str::<RawConfig>(contents).map(Into::into)
    }

    /// Number of events each session hub buffers for slow subscribers.
    pub fn event_channel_capacity(&self) -> usize {
        self.event_channel_capacity
    }

    /// Interval between SSE keep-alive comments.
    pub fn sse_keep_alive(&self) -> Duration {
        self.sse_keep_alive
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
            sse_keep_alive: Duration::from_secs(DEFAULT_SSE_KEEP_ALIVE_SECS),
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    #[serde(default)]
    event_channel_capacity: Option<usize>,
    #[serde(default)]
    sse_keep_alive_secs: Option<u64>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        Self {
            event_channel_capacity: value
                .event_channel_capacity
                .filter(|capacity| *capacity > 0)
                .unwrap_or(DEFAULT_EVENT_CHANNEL_CAPACITY),
            sse_keep_alive: Duration::from_secs(
                value
                    .sse_keep_alive_secs
                    .filter(|secs| *secs > 0)
                    .unwrap_or(DEFAULT_SSE_KEEP_ALIVE_SECS),
            ),
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_keeps_defaults() {
        let config = AppConfig::from_json("{}").unwrap();
        assert_eq!(config.event_channel_capacity(), 16);
        assert_eq!(config.sse_keep_alive(), Duration::from_secs(15));
    }

    #[test]
    fn explicit_values_override_defaults() {
        let config =
            AppConfig::from_json(r#"{"event_channel_capacity": 64, "sse_keep_alive_secs": 5}"#)
                .unwrap();
        assert_eq!(config.event_channel_capacity(), 64);
        assert_eq!(config.sse_keep_alive(), Duration::from_secs(5));
    }

    #[test]
    fn zero_values_fall_back_to_defaults() {
        let config =
            AppConfig::from_json(r#"{"event_channel_capacity": 0, "sse_keep_alive_secs": 0}"#)
                .unwrap();
        assert_eq!(config.event_channel_capacity(), 16);
        assert_eq!(config.sse_keep_alive(), Duration::from_secs(15));
    }

    #[test]
    fn malformed_document_is_an_error() {
        assert!(AppConfig::from_json("[1, 2").is_err());
    }
}
