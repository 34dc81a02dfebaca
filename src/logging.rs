//! Log setup for the daemon and the client
//!
//! The daemon writes to `<dir>/proofaday.log` at the level chosen by its `-d`
//! count. The client only logs to stderr, filtered by `PROOFADAY_LOG`.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::{LogFormat, LoggingConfig};

/// Name of the daemon log file
pub const LOG_FILE_NAME: &str = "proofaday.log";

/// Environment variable controlling client-side logging
pub const CLIENT_LOG_ENV: &str = "PROOFADAY_LOG";

/// Install the daemon's file logger.
///
/// Returns `Ok(false)` when logging is disabled or a global subscriber is
/// already installed (several daemons sharing one test process).
pub fn init_daemon(config: &LoggingConfig) -> Result<bool> {
    let Some(level) = config.level else {
        return Ok(false);
    };

    let file = open_log_file(&config.dir, config.max_bytes)?;
    let builder = fmt()
        .with_max_level(level.as_tracing())
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(false)
        .with_thread_names(true);

    let installed = match config.format {
        LogFormat::Text => builder.try_init().is_ok(),
        LogFormat::Json => builder.json().try_init().is_ok(),
    };
    Ok(installed)
}

/// Install the client's stderr logger.
pub fn init_client() {
    let filter = EnvFilter::try_from_env(CLIENT_LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Open the log file for appending, rotating it first if it has grown past
/// `max_bytes`. One previous generation is kept as `proofaday.log.1`.
fn open_log_file(dir: &Path, max_bytes: u64) -> Result<File> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create log directory {}", dir.display()))?;

    let path = dir.join(LOG_FILE_NAME);
    if let Ok(metadata) = std::fs::metadata(&path) {
        if metadata.len() > max_bytes {
            std::fs::rename(&path, rotated_path(&path))
                .with_context(|| format!("Failed to rotate log file {}", path.display()))?;
        }
    }

    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("Failed to open log file {}", path.display()))
}

fn rotated_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".1");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_creates_directory() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("nested").join("logs");

        open_log_file(&dir, 1024).unwrap();
        assert!(dir.join(LOG_FILE_NAME).exists());
    }

    #[test]
    fn test_rotates_oversized_log() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(LOG_FILE_NAME);
        std::fs::write(&path, vec![b'x'; 2048]).unwrap();

        open_log_file(temp_dir.path(), 1024).unwrap();

        let rotated = temp_dir.path().join("proofaday.log.1");
        assert_eq!(std::fs::metadata(&rotated).unwrap().len(), 2048);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 0);
    }

    #[test]
    fn test_keeps_small_log() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(LOG_FILE_NAME);
        std::fs::write(&path, b"hello\n").unwrap();

        open_log_file(temp_dir.path(), 1024).unwrap();

        assert!(!temp_dir.path().join("proofaday.log.1").exists());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello\n");
    }
}
