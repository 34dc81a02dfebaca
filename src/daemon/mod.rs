//! Daemon Module
//!
//! Background process that prefetches proofs into a bounded queue and serves
//! them over UDP, so a client request rarely waits on the network.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                    proofaday daemon                     │
//! │                                                         │
//! │  ┌────────────────────┐  spawn   ┌──────────────────┐   │
//! │  │ Prefetch Scheduler │─────────▶│ Fetch Workers    │   │
//! │  │                    │◀─────────│ (fixed pool)     │   │
//! │  └─────────┬──────────┘  result  └──────────────────┘   │
//! │            │ push                                       │
//! │  ┌─────────▼──────────┐                                 │
//! │  │ Prefetch Queue     │◀──── pop (Random)               │
//! │  └────────────────────┘          │                      │
//! │                                  │                      │
//! │  ┌────────────────────┐          │                      │
//! │  │ UDP Server         │──────────┘ ◀─── datagrams       │
//! │  └────────────────────┘                                 │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! Start the daemon:
//! ```bash
//! dproofaday start --wait
//! ```
//!
//! Check status:
//! ```bash
//! dproofaday status
//! ```
//!
//! Stop the daemon:
//! ```bash
//! dproofaday stop
//! ```

pub mod handler;
pub mod lifecycle;
pub mod protocol;
pub mod queue;
pub mod scheduler;
pub mod server;
pub mod status;
pub mod worker;

pub use handler::{Reply, RequestHandler};
pub use lifecycle::Daemon;
pub use protocol::{Action, Message, ProtocolError};
pub use queue::PrefetchQueue;
pub use scheduler::PrefetchScheduler;
pub use server::UdpServer;
pub use status::{LifecycleError, StatusFile, StatusRecord, STATUS_FILE_NAME};
pub use worker::{FetchWorker, WorkerError};
