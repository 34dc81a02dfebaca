//! Client configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Receive buffer for a single reply datagram
pub const DEFAULT_RECV_BUFFER: usize = 4096;

/// Longest accepted reply timeout
pub const MAX_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

/// Client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Seconds to wait for a reply
    pub timeout_secs: f64,
    /// Size of the reply buffer in bytes; longer replies are truncated
    pub recv_buffer: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 3.0,
            recv_buffer: DEFAULT_RECV_BUFFER,
        }
    }
}

impl ClientConfig {
    /// Reply timeout, clamped to [`MAX_TIMEOUT`]
    pub fn timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.timeout_secs).map_or(MAX_TIMEOUT, |t| t.min(MAX_TIMEOUT))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_is_clamped() {
        let config = |timeout_secs| ClientConfig {
            timeout_secs,
            ..ClientConfig::default()
        };

        assert_eq!(config(0.5).timeout(), Duration::from_millis(500));
        assert_eq!(config(1e20).timeout(), MAX_TIMEOUT);
        assert_eq!(config(f64::INFINITY).timeout(), MAX_TIMEOUT);
    }
}
