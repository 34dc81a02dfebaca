//! Client Module
//!
//! Finds the running daemon through its status file and exchanges one
//! request/reply datagram pair with it per query.

pub mod connection;

pub use connection::DaemonClient;

use std::path::Path;
use std::time::Duration;

use thiserror::Error;

use crate::config::ClientConfig;
use crate::daemon::protocol::Message;
use crate::daemon::status::LifecycleError;

/// Errors that can occur when communicating with the daemon
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Daemon not running.")]
    DaemonNotRunning,

    #[error(transparent)]
    Status(#[from] LifecycleError),

    #[error("Server timed out.")]
    Timeout(Duration),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unexpected reply from daemon: {0:?}")]
    InvalidReply(String),
}

/// What to ask the daemon for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    /// Next prefetched proof
    Random,
    /// A specific proof, fetched on demand
    Named(String),
    /// Liveness probe
    Check,
    /// Stop the daemon
    Kill,
}

impl Query {
    pub fn message(&self) -> Message {
        match self {
            Self::Random => Message::random(),
            Self::Named(name) => Message::request(name.as_str()),
            Self::Check => Message::check(),
            Self::Kill => Message::kill(),
        }
    }
}

/// Discover the daemon in `status_dir` and run one query against it
pub async fn query(
    status_dir: &Path,
    config: &ClientConfig,
    query: &Query,
) -> Result<String, ClientError> {
    let client = DaemonClient::discover(status_dir, config).await?;
    client.query(query).await
}

/// Check whether a daemon answers in `status_dir`
pub async fn ping(status_dir: &Path, config: &ClientConfig) -> Result<bool, ClientError> {
    match DaemonClient::discover(status_dir, config).await {
        Ok(client) => match client.check().await {
            Ok(()) => Ok(true),
            Err(ClientError::Timeout(_)) => Ok(false),
            Err(e) => Err(e),
        },
        Err(ClientError::DaemonNotRunning) => Ok(false),
        Err(e) => Err(e),
    }
}
