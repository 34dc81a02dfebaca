//! Remote proof source
//!
//! One HTTP GET per proof identifier. The daemon only depends on the
//! [`ProofSource`] trait, so tests can swap in an in-memory source.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::config::SourceConfig;

/// Errors that can occur while fetching a page
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Timeout after {0:?}")]
    Timeout(Duration),
    #[error("Connection failed: {0}")]
    Connection(String),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Failed to build URL for '{name}': {reason}")]
    InvalidUrl { name: String, reason: String },
}

impl FetchError {
    /// Whether a later, independent attempt is likely to succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Connection(_))
    }

    fn classify(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            Self::Timeout(timeout)
        } else if err.is_connect() {
            Self::Connection(err.to_string())
        } else {
            Self::Http(err)
        }
    }
}

/// A remote source of raw proof documents
#[async_trait]
pub trait ProofSource: Send + Sync {
    /// Fetch the raw document for `name`
    async fn fetch(&self, name: &str) -> Result<String, FetchError>;

    /// Identifier that resolves to a random proof
    fn random_name(&self) -> &str;
}

/// ProofWiki over HTTP
pub struct ProofWikiSource {
    http_client: reqwest::Client,
    base_url: Url,
    random_page: String,
    timeout: Duration,
}

impl ProofWikiSource {
    /// Create a new source from configuration
    pub fn new(config: &SourceConfig) -> Result<Self, FetchError> {
        let base_url = Url::parse(&config.base_url).map_err(|e| FetchError::InvalidUrl {
            name: config.base_url.clone(),
            reason: e.to_string(),
        })?;

        let http_client = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(&config.user_agent)
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(Self {
            http_client,
            base_url,
            random_page: config.random_page.clone(),
            timeout: config.timeout(),
        })
    }

    /// URL of the page for `name`
    pub fn page_url(&self, name: &str) -> Result<Url, FetchError> {
        self.base_url.join(name).map_err(|e| FetchError::InvalidUrl {
            name: name.to_string(),
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl ProofSource for ProofWikiSource {
    async fn fetch(&self, name: &str) -> Result<String, FetchError> {
        let url = self.page_url(name)?;
        let start = Instant::now();

        let response = self
            .http_client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| FetchError::classify(e, self.timeout))?;

        // Missing pages come back as 404 with a normal wiki page body; the
        // parser rejects them, so the status is only logged.
        let status = response.status();
        let final_url = response.url().clone();
        let body = response
            .text()
            .await
            .map_err(|e| FetchError::classify(e, self.timeout))?;

        debug!(
            "Fetched {} -> {} ({}, {} bytes in {:?})",
            url,
            final_url,
            status,
            body.len(),
            start.elapsed()
        );
        Ok(body)
    }

    fn random_name(&self) -> &str {
        &self.random_page
    }
}
