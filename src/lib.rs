//! proofaday: a proof of the day from ProofWiki
//!
//! A background daemon prefetches proofs into a bounded queue and serves them
//! over a small UDP protocol, featuring:
//! - A fixed-size fetch worker pool that keeps the queue topped up
//! - HTML extraction and LaTeX-to-Unicode translation of proof pages
//! - A status file guaranteeing one daemon per status directory
//! - A client that discovers the daemon through that file

pub mod cli;
pub mod client;
pub mod commands;
pub mod config;
pub mod daemon;
pub mod logging;
pub mod proof;
pub mod source;

pub use config::Config;
