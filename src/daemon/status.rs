//! Status File
//!
//! A single JSON record in `<status-dir>/.proofaday.status` both marks the
//! daemon as running and tells clients where to find it. The file is created
//! with an exclusive create before anything else happens, so two daemons
//! sharing a status directory can never both start.

use std::fmt;
use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::Instant;

/// Name of the status file inside the status directory
pub const STATUS_FILE_NAME: &str = ".proofaday.status";

/// Default interval for [`StatusFile::wait`]
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Errors managing the daemon's lifecycle
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Status file {} already exists", .0.display())]
    AlreadyExists(PathBuf),
    #[error("Failed to create status file {}: {source}", .path.display())]
    Create { path: PathBuf, source: io::Error },
    #[error("Failed to write status file {}: {source}", .path.display())]
    Write { path: PathBuf, source: io::Error },
    #[error("Failed to remove status file.")]
    Remove { path: PathBuf, source: io::Error },
    #[error("Failed to read status file {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("Corrupt status file {}: {reason}", .path.display())]
    Corrupt { path: PathBuf, reason: String },
    #[error("Daemon already started.")]
    AlreadyRunning,
    #[error("Daemon not running.")]
    NotRunning,
    #[error("No process with PID {0}; removed stale status file.")]
    ProcessNotFound(u32),
    #[error("Failed to signal PID {pid}: {source}")]
    Signal { pid: u32, source: io::Error },
    #[error("Failed to stop daemon.")]
    StopTimeout,
    #[error("Failed to start daemon: {0}")]
    StartFailed(String),
}

/// Identity and address of a running daemon
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub pid: u32,
    pub host: String,
    pub port: u16,
}

impl StatusRecord {
    /// Record for the current process
    pub fn current(host: impl Into<String>, port: u16) -> Self {
        Self {
            pid: std::process::id(),
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for StatusRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pid {} listening on {}:{}", self.pid, self.host, self.port)
    }
}

/// Handle on the status file of one status directory
#[derive(Debug, Clone)]
pub struct StatusFile {
    path: PathBuf,
    poll_interval: Duration,
}

impl StatusFile {
    pub fn new(dir: &Path) -> Self {
        Self {
            path: dir.join(STATUS_FILE_NAME),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Atomically create an empty status file, creating its directory first.
    ///
    /// Fails with [`LifecycleError::AlreadyExists`] if another instance got
    /// there first.
    pub fn touch(&self) -> Result<(), LifecycleError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| LifecycleError::Create {
                path: self.path.clone(),
                source,
            })?;
        }

        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
        {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                Err(LifecycleError::AlreadyExists(self.path.clone()))
            }
            Err(source) => Err(LifecycleError::Create {
                path: self.path.clone(),
                source,
            }),
        }
    }

    /// Persist `record`. On failure the file is removed so a half-started
    /// daemon does not block the next start.
    ///
    /// The record is written to a sibling file and renamed into place, so
    /// readers see either the empty file or the complete record.
    pub fn write(&self, record: &StatusRecord) -> Result<(), LifecycleError> {
        let staging = self.staging_path();
        let result = serde_json::to_vec(record)
            .map_err(io::Error::from)
            .and_then(|json| std::fs::write(&staging, json))
            .and_then(|()| std::fs::rename(&staging, &self.path));

        if let Err(source) = result {
            let _ = std::fs::remove_file(&staging);
            let _ = self.remove();
            return Err(LifecycleError::Write {
                path: self.path.clone(),
                source,
            });
        }
        Ok(())
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(format!(".{}.tmp", std::process::id()));
        PathBuf::from(name)
    }

    /// Read the current record.
    ///
    /// Returns `Ok(None)` if there is no file, or if it was created but the
    /// record has not been written yet.
    pub fn read(&self) -> Result<Option<StatusRecord>, LifecycleError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(LifecycleError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        if content.trim().is_empty() {
            return Ok(None);
        }
        let record: StatusRecord =
            serde_json::from_str(&content).map_err(|e| self.corrupt(e.to_string()))?;

        // 0 and values past i32::MAX address process groups when signalled
        if record.pid == 0 || i32::try_from(record.pid).is_err() {
            return Err(self.corrupt(format!("invalid pid {}", record.pid)));
        }
        Ok(Some(record))
    }

    fn corrupt(&self, reason: String) -> LifecycleError {
        LifecycleError::Corrupt {
            path: self.path.clone(),
            reason,
        }
    }

    /// Delete the status file. A missing file counts as success.
    pub fn remove(&self) -> Result<(), LifecycleError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(LifecycleError::Remove {
                path: self.path.clone(),
                source,
            }),
        }
    }

    /// Remove the file only if it still holds `owner`'s record.
    ///
    /// Returns whether the file was removed.
    pub fn release(&self, owner: &StatusRecord) -> Result<bool, LifecycleError> {
        match self.read()? {
            Some(record) if record == *owner => {
                self.remove()?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Poll until the file's existence equals `exist`.
    ///
    /// Returns whether the condition was met before `timeout` elapsed;
    /// `None` waits forever.
    pub async fn wait(&self, exist: bool, timeout: Option<Duration>) -> bool {
        let deadline = timeout.map(|t| Instant::now() + t);
        loop {
            if self.exists() == exist {
                return true;
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                return false;
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}
