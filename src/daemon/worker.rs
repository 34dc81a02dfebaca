//! Fetch Worker
//!
//! Turns one proof identifier into display text: fetch, parse, translate and
//! check the line limit. Every failure collapses into "no record" here and
//! never reaches the scheduler or the listener.

use std::num::NonZeroUsize;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, error, warn};

use crate::proof::{self, ParseError, ProofRecord};
use crate::source::{FetchError, ProofSource};

/// Reasons a fetch produced no record
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("Invalid document: {0}")]
    Invalid(#[from] ParseError),
    #[error("Proof has {lines} lines, limit is {limit}")]
    TooLong { lines: usize, limit: usize },
}

/// Fetches and validates single proofs
#[derive(Clone)]
pub struct FetchWorker {
    source: Arc<dyn ProofSource>,
    line_limit: Option<NonZeroUsize>,
}

impl FetchWorker {
    pub fn new(source: Arc<dyn ProofSource>, line_limit: Option<NonZeroUsize>) -> Self {
        Self { source, line_limit }
    }

    /// Fetch `name`, or a random proof when `name` is `None`.
    ///
    /// Returns the display text, or `None` if anything went wrong.
    pub async fn fetch(&self, name: Option<&str>) -> Option<String> {
        let name = name.unwrap_or_else(|| self.source.random_name());
        match self.try_fetch(name).await {
            Ok(text) => Some(text),
            Err(e) => {
                match &e {
                    WorkerError::Fetch(fetch) if fetch.is_transient() => {
                        debug!("Transient failure fetching '{}': {}", name, e)
                    }
                    WorkerError::Invalid(_) => warn!("Rejected '{}': {}", name, e),
                    WorkerError::TooLong { .. } => debug!("Skipped '{}': {}", name, e),
                    WorkerError::Fetch(_) => error!("Failed to fetch '{}': {}", name, e),
                }
                None
            }
        }
    }

    async fn try_fetch(&self, name: &str) -> Result<String, WorkerError> {
        let html = self.source.fetch(name).await?;
        let record = ProofRecord::from_parsed(proof::parse(&html)?);

        if let Some(limit) = self.line_limit {
            let lines = record.line_count();
            if lines > limit.get() {
                return Err(WorkerError::TooLong {
                    lines,
                    limit: limit.get(),
                });
            }
        }
        Ok(record.to_string())
    }
}
