//! Command-line interfaces of the `dproofaday` and `proofaday` binaries
//!
//! Flags left unset fall back to the config file, then to built-in defaults.

use std::ffi::OsString;
use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

use crate::client::Query;
use crate::config::{Config, LogLevel};

#[derive(Parser, Debug)]
#[command(name = "dproofaday")]
#[command(about = "Background daemon prefetching proofs from ProofWiki")]
#[command(version)]
pub struct DaemonCli {
    /// Suppress output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Directory holding the status file
    #[arg(long = "status-path", value_name = "DIR", global = true)]
    pub status_path: Option<PathBuf>,

    /// Configuration file path
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: DaemonCommand,
}

#[derive(Subcommand, Debug)]
pub enum DaemonCommand {
    /// Start the daemon in the background
    Start(StartArgs),

    /// Stop the running daemon
    Stop,

    /// Stop the daemon if it is running, then start it again
    Restart(StartArgs),

    /// Show where the daemon is listening
    Status {
        /// Block until a daemon is running
        #[arg(short, long)]
        wait: bool,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct StartArgs {
    /// UDP port to listen on (0 = any free port)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Remove an existing status file first
    #[arg(short, long)]
    pub force: bool,

    /// Skip proofs with more lines than this (0 = no limit)
    #[arg(short = 'l', long)]
    pub line_limit: Option<usize>,

    /// Number of proofs to keep prefetched
    #[arg(short = 'n', long = "num-prefetch-proofs")]
    pub num_prefetch_proofs: Option<usize>,

    /// Enable logging; repeat for more detail
    #[arg(short, long, action = ArgAction::Count)]
    pub debug: u8,

    /// Directory for the log file
    #[arg(long, value_name = "DIR")]
    pub log_path: Option<PathBuf>,

    /// Wait until the daemon is ready
    #[arg(short, long)]
    pub wait: bool,

    /// Run in this process instead of detaching
    #[arg(long, hide = true)]
    pub foreground: bool,
}

impl DaemonCli {
    /// Apply global flags to the loaded configuration
    pub fn apply(&self, config: &mut Config) {
        if let Some(dir) = &self.status_path {
            config.daemon.status_dir = dir.clone();
        }
    }
}

impl StartArgs {
    /// Apply start flags to the loaded configuration
    pub fn apply(&self, config: &mut Config) {
        if let Some(port) = self.port {
            config.daemon.port = port;
        }
        if let Some(limit) = self.line_limit {
            config.daemon.line_limit = limit;
        }
        if let Some(n) = self.num_prefetch_proofs {
            config.daemon.prefetch = n;
        }
        if let Some(level) = LogLevel::from_verbosity(self.debug) {
            config.logging.level = Some(level);
        }
        if let Some(dir) = &self.log_path {
            config.logging.dir = dir.clone();
        }
    }

    /// Arguments re-running `start` in the foreground with the resolved
    /// settings of `config`.
    ///
    /// `--force` is never forwarded; the parent has already dealt with any
    /// existing status file.
    pub fn foreground_args(&self, config: &Config, config_path: Option<&PathBuf>) -> Vec<OsString> {
        let mut args: Vec<OsString> = Vec::new();
        if let Some(path) = config_path {
            args.push("--config".into());
            args.push(path.into());
        }
        args.push("--status-path".into());
        args.push(config.daemon.status_dir.clone().into());

        args.push("start".into());
        args.push("--foreground".into());
        args.push("--port".into());
        args.push(config.daemon.port.to_string().into());
        args.push("--line-limit".into());
        args.push(config.daemon.line_limit.to_string().into());
        args.push("--num-prefetch-proofs".into());
        args.push(config.daemon.prefetch.to_string().into());
        for _ in 0..self.debug {
            args.push("--debug".into());
        }
        args.push("--log-path".into());
        args.push(config.logging.dir.clone().into());
        args
    }
}

#[derive(Parser, Debug)]
#[command(name = "proofaday")]
#[command(about = "Print a proof from ProofWiki")]
#[command(version)]
pub struct ClientCli {
    /// Name of the proof (a random one if omitted)
    pub name: Option<String>,

    /// Seconds to wait for the daemon
    #[arg(short, long, value_name = "SECS")]
    pub timeout: Option<f64>,

    /// Write the proof to FILE instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Directory holding the daemon's status file
    #[arg(long = "status-path", value_name = "DIR")]
    pub status_path: Option<PathBuf>,

    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Only check that the daemon answers
    #[arg(long, conflicts_with_all = ["kill", "name"])]
    pub check: bool,

    /// Ask the daemon to shut down
    #[arg(long, conflicts_with = "name")]
    pub kill: bool,
}

impl ClientCli {
    pub fn query(&self) -> Query {
        if self.check {
            Query::Check
        } else if self.kill {
            Query::Kill
        } else {
            match &self.name {
                Some(name) => Query::Named(name.clone()),
                None => Query::Random,
            }
        }
    }

    pub fn apply(&self, config: &mut Config) {
        if let Some(timeout) = self.timeout {
            config.client.timeout_secs = timeout;
        }
        if let Some(dir) = &self.status_path {
            config.daemon.status_dir = dir.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definitions() {
        DaemonCli::command().debug_assert();
        ClientCli::command().debug_assert();
    }

    #[test]
    fn test_start_flags_override_config() {
        let cli = DaemonCli::try_parse_from([
            "dproofaday",
            "--status-path",
            "/tmp/status",
            "start",
            "-p",
            "5000",
            "-l",
            "40",
            "-n",
            "3",
            "-dd",
            "--wait",
        ])
        .unwrap();
        let mut config = Config::default();
        cli.apply(&mut config);

        let DaemonCommand::Start(args) = cli.command else {
            panic!("expected start");
        };
        args.apply(&mut config);

        assert!(args.wait);
        assert!(!args.foreground);
        assert_eq!(config.daemon.status_dir, PathBuf::from("/tmp/status"));
        assert_eq!(config.daemon.port, 5000);
        assert_eq!(config.daemon.line_limit, 40);
        assert_eq!(config.daemon.prefetch, 3);
        assert_eq!(config.logging.level, Some(LogLevel::Debug));
    }

    #[test]
    fn test_foreground_args_round_trip() {
        let mut config = Config::default();
        config.daemon.status_dir = PathBuf::from("/tmp/status");
        config.daemon.port = 7000;
        config.daemon.prefetch = 4;
        config.logging.dir = PathBuf::from("/tmp/logs");
        let start = StartArgs {
            debug: 1,
            force: true,
            ..StartArgs::default()
        };

        let mut argv: Vec<OsString> = vec!["dproofaday".into()];
        argv.extend(start.foreground_args(&config, None));
        let cli = DaemonCli::try_parse_from(argv).unwrap();

        let mut child_config = Config::default();
        cli.apply(&mut child_config);
        let DaemonCommand::Start(child) = cli.command else {
            panic!("expected start");
        };
        child.apply(&mut child_config);

        assert!(child.foreground);
        assert!(!child.force);
        assert_eq!(child.debug, 1);
        assert_eq!(child_config.daemon.status_dir, config.daemon.status_dir);
        assert_eq!(child_config.daemon.port, 7000);
        assert_eq!(child_config.daemon.prefetch, 4);
        assert_eq!(child_config.logging.dir, config.logging.dir);
    }

    #[test]
    fn test_client_queries() {
        let random = ClientCli::try_parse_from(["proofaday"]).unwrap();
        assert_eq!(random.query(), Query::Random);

        let named =
            ClientCli::try_parse_from(["proofaday", "Euclid's Lemma", "-t", "0.5"]).unwrap();
        assert_eq!(named.query(), Query::Named("Euclid's Lemma".to_string()));
        let mut config = Config::default();
        named.apply(&mut config);
        assert_eq!(config.client.timeout_secs, 0.5);

        let check = ClientCli::try_parse_from(["proofaday", "--check"]).unwrap();
        assert_eq!(check.query(), Query::Check);
        let kill = ClientCli::try_parse_from(["proofaday", "--kill"]).unwrap();
        assert_eq!(kill.query(), Query::Kill);

        assert!(ClientCli::try_parse_from(["proofaday", "Name", "--check"]).is_err());
    }
}
