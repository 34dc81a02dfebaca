//! proofaday: print a proof from ProofWiki
//!
//! Talks to a running `dproofaday` daemon.

use std::process::ExitCode;

use clap::Parser;
use proofaday::{cli::ClientCli, commands, logging};

#[tokio::main]
async fn main() -> ExitCode {
    logging::init_client();
    let cli = ClientCli::parse();

    match commands::handle_query(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}
