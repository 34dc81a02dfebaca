//! Daemon configuration

use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

/// Daemon configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Host the UDP listener binds to
    pub host: String,
    /// UDP port (0 = assigned by the OS)
    pub port: u16,
    /// Capacity of the prefetch queue
    pub prefetch: usize,
    /// Maximum number of lines in an accepted proof (0 = unlimited)
    pub line_limit: usize,
    /// Size of the fetch worker pool
    pub workers: usize,
    /// Directory holding the status file
    pub status_dir: PathBuf,
    /// Status file polling interval in milliseconds
    pub poll_interval_ms: u64,
    /// How long `stop` waits for the status file to disappear
    pub stop_timeout_secs: u64,
    /// How long `start --wait` waits for the status file to appear
    pub start_timeout_secs: u64,
    /// How long shutdown waits for the listener and scheduler before aborting them
    pub shutdown_grace_secs: u64,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 0,
            prefetch: 10,
            line_limit: 0,
            workers: 5,
            status_dir: super::default_status_dir(),
            poll_interval_ms: 500,
            stop_timeout_secs: 10,
            start_timeout_secs: 30,
            shutdown_grace_secs: 5,
        }
    }
}

impl DaemonConfig {
    /// Line limit as an option, `None` meaning unlimited
    pub fn line_limit(&self) -> Option<NonZeroUsize> {
        NonZeroUsize::new(self.line_limit)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }

    pub fn start_timeout(&self) -> Duration {
        Duration::from_secs(self.start_timeout_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}
