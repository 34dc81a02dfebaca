//! Remote source configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default user agent for requests to the remote source
pub const DEFAULT_USER_AGENT: &str = concat!("proofaday/", env!("CARGO_PKG_VERSION"));

/// Configuration of the remote proof source
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Base URL that proof identifiers are appended to
    pub base_url: String,
    /// Identifier of the page that redirects to a random proof
    pub random_page: String,
    /// Per-fetch timeout in milliseconds
    pub timeout_ms: u64,
    /// User agent string
    pub user_agent: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://proofwiki.org/wiki/".to_string(),
            random_page: "Special:Random".to_string(),
            timeout_ms: 1000,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl SourceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
