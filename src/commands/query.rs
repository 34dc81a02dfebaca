use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use crate::cli::ClientCli;
use crate::client::{self, Query};
use crate::config::Config;

/// Ask the daemon for a proof and print it
pub async fn handle_query(cli: ClientCli) -> Result<()> {
    let mut config = Config::load_or_default(cli.config.as_deref())?;
    cli.apply(&mut config);
    config.validate()?;

    let query = cli.query();
    debug!("Sending {:?} to daemon in {}", query, config.daemon.status_dir.display());
    let reply = client::query(&config.daemon.status_dir, &config.client, &query).await?;

    match query {
        Query::Check | Query::Kill => Ok(()),
        // An empty reply means the proof could not be fetched
        Query::Named(_) if reply.is_empty() => Ok(()),
        Query::Named(_) | Query::Random => output(&reply, cli.output.as_deref()),
    }
}

fn output(text: &str, path: Option<&Path>) -> Result<()> {
    match path {
        Some(path) => std::fs::write(path, format!("{}\n", text))
            .with_context(|| format!("Failed to write {}", path.display())),
        None => {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{}", text)?;
            stdout.flush()?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use tempfile::TempDir;

    #[test]
    fn test_output_to_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("proof.txt");

        output("Title\n=====", Some(&path)).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "Title\n=====\n");
    }

    #[tokio::test]
    async fn test_no_daemon() {
        let temp_dir = TempDir::new().unwrap();
        let status_dir = temp_dir.path().to_str().unwrap();
        let cli = ClientCli::try_parse_from(["proofaday", "--status-path", status_dir]).unwrap();

        let err = handle_query(cli).await.unwrap_err();
        assert_eq!(err.to_string(), "Daemon not running.");
    }
}
