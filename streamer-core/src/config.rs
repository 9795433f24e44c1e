//! Streamer configuration loading
//!
//! Reads `~/.config/exec-streamer/config.toml`. Every field is optional and
//! falls back to the built-in default.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use streamer_utils::{paths, Result, StreamerError};

use crate::escape::{parse_detach_keys, DEFAULT_DETACH_KEYS};
use crate::resize::{RetryPolicy, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY};

/// Top-level configuration file
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StreamerConfig {
    pub stream: StreamConfig,
    pub resize: ResizeConfig,
    pub logging: LoggingConfig,
}

/// `[stream]` section
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Detach key sequence, e.g. "ctrl-p,ctrl-q"; empty disables detaching
    pub detach_keys: String,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            detach_keys: DEFAULT_DETACH_KEYS.into(),
        }
    }
}

/// `[resize]` section
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ResizeConfig {
    /// Background retries after a failed resize
    pub max_retries: usize,
    /// Delay before each retry, in milliseconds
    pub retry_delay_ms: u64,
}

impl Default for ResizeConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay_ms: DEFAULT_RETRY_DELAY.as_millis() as u64,
        }
    }
}

/// `[logging]` section
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter used when `STREAMER_LOG` is unset
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "warn".into(),
        }
    }
}

impl StreamerConfig {
    /// Parsed detach key bytes
    pub fn detach_keys(&self) -> Result<Vec<u8>> {
        parse_detach_keys(&self.stream.detach_keys)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.resize.max_retries,
            delay: Duration::from_millis(self.resize.retry_delay_ms),
        }
    }
}

/// Load configuration from a specific file
pub fn load_from_path(path: &Path) -> Result<StreamerConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| StreamerError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    let config: StreamerConfig = toml::from_str(&content).map_err(|e| StreamerError::ConfigInvalid {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    // Reject bad detach keys at load time rather than mid-session
    config.detach_keys().map_err(|e| StreamerError::ConfigInvalid {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    Ok(config)
}

/// Load configuration from the default location
///
/// Returns defaults if the config file doesn't exist or can't be used.
pub fn load_config() -> StreamerConfig {
    let path = paths::config_file();

    if !path.exists() {
        tracing::debug!("Config file not found, using defaults");
        return StreamerConfig::default();
    }

    match load_from_path(&path) {
        Ok(config) => {
            tracing::debug!(
                "Loaded config: detach_keys={:?}, max_retries={}, retry_delay_ms={}",
                config.stream.detach_keys,
                config.resize.max_retries,
                config.resize.retry_delay_ms
            );
            config
        }
        Err(e) => {
            tracing::warn!("{}, using defaults", e);
            StreamerConfig::default()
        }
    }
}
