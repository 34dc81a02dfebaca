//! dproofaday: the proofaday prefetch daemon and its controls

use std::process::ExitCode;

use clap::Parser;
use proofaday::{cli::DaemonCli, commands};

#[tokio::main]
async fn main() -> ExitCode {
    // Logging is set up by the daemon itself once it owns the status file
    let cli = DaemonCli::parse();

    match commands::handle_daemon(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}
