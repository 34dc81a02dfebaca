//! Configuration for proofaday

mod client;
mod daemon;
mod logging;
mod source;

pub use client::{ClientConfig, MAX_TIMEOUT};
pub use daemon::DaemonConfig;
pub use logging::{LogFormat, LogLevel, LoggingConfig};
pub use source::SourceConfig;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application name used for default directories and the user agent
pub const APP_NAME: &str = "proofaday";

/// Config file looked up when `--config` is not given
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Main configuration shared by the daemon and the client
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Daemon configuration
    #[serde(default)]
    pub daemon: DaemonConfig,
    /// Remote source configuration
    #[serde(default)]
    pub source: SourceConfig,
    /// Client configuration
    #[serde(default)]
    pub client: ClientConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file and validate it.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e)
        })?;
        let config: Config = toml::from_str(&content).map_err(|e| {
            anyhow::anyhow!("Failed to parse config file '{}': {}", path.display(), e)
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load an explicitly requested config file, or the default one if it
    /// exists, or fall back to built-in defaults.
    ///
    /// An explicit path that does not exist is an error; a missing default
    /// file is not.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => match default_config_path() {
                Some(path) if path.is_file() => Self::load(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    /// Validate all configuration fields.
    ///
    /// Collects all validation errors and reports them together.
    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        if self.daemon.prefetch == 0 {
            errors.push("daemon.prefetch must be at least 1".to_string());
        }
        if self.daemon.workers == 0 {
            errors.push("daemon.workers must be at least 1".to_string());
        }
        if self.daemon.host.trim().is_empty() {
            errors.push("daemon.host must not be empty".to_string());
        }
        if self.daemon.poll_interval_ms == 0 {
            errors.push("daemon.poll_interval_ms must be positive".to_string());
        }

        if url::Url::parse(&self.source.base_url).is_err() {
            errors.push(format!("source.base_url is not a valid URL: {}", self.source.base_url));
        } else if !self.source.base_url.ends_with('/') {
            errors.push("source.base_url must end with '/'".to_string());
        }
        if self.source.random_page.trim().is_empty() {
            errors.push("source.random_page must not be empty".to_string());
        }
        if self.source.timeout_ms == 0 {
            errors.push("source.timeout_ms must be positive".to_string());
        }

        if !(self.client.timeout_secs.is_finite() && self.client.timeout_secs > 0.0) {
            errors.push("client.timeout_secs must be a positive number".to_string());
        } else if self.client.timeout_secs > MAX_TIMEOUT.as_secs_f64() {
            errors.push(format!(
                "client.timeout_secs must be at most {}",
                MAX_TIMEOUT.as_secs()
            ));
        }
        if self.client.recv_buffer == 0 {
            errors.push("client.recv_buffer must be positive".to_string());
        }

        if self.logging.max_bytes == 0 {
            errors.push("logging.max_bytes must be positive".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            anyhow::bail!("Invalid configuration:\n  - {}", errors.join("\n  - "))
        }
    }
}

/// Default location of the config file (`<config_dir>/proofaday/config.toml`)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_NAME).join(CONFIG_FILE_NAME))
}

/// Default directory for the status file
pub(crate) fn default_status_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join(APP_NAME))
        .unwrap_or_else(|| std::env::temp_dir().join(APP_NAME))
}

/// Default directory for the daemon log
pub(crate) fn default_log_dir() -> PathBuf {
    dirs::state_dir()
        .or_else(dirs::cache_dir)
        .map(|dir| dir.join(APP_NAME))
        .unwrap_or_else(|| std::env::temp_dir().join(APP_NAME))
}
