//! Daemon Lifecycle Management
//!
//! Handles daemon startup, shutdown, and single-instance guarantees.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::logging;
use crate::source::{ProofSource, ProofWikiSource};

use super::handler::RequestHandler;
use super::queue::PrefetchQueue;
use super::scheduler::PrefetchScheduler;
use super::server::UdpServer;
use super::status::{StatusFile, StatusRecord};
use super::worker::FetchWorker;

/// Daemon instance owning the listener, the queue and the scheduler
pub struct Daemon {
    config: Config,
    status: StatusFile,
    record: StatusRecord,
    server: UdpServer,
    handler: Arc<RequestHandler>,
    scheduler: JoinHandle<()>,
    shutdown_tx: broadcast::Sender<()>,
    // Subscribed at startup so a signal sent before `run` is not lost
    shutdown_rx: broadcast::Receiver<()>,
    server_rx: broadcast::Receiver<()>,
}

impl Daemon {
    /// Start the daemon against ProofWiki
    pub async fn start(config: Config) -> Result<Self> {
        let source = ProofWikiSource::new(&config.source).context("Failed to create proof source")?;
        Self::start_with_source(config, Arc::new(source)).await
    }

    /// Start the daemon against any proof source.
    ///
    /// Claims the status file first and publishes the listening address
    /// last. Every step taken before a failure is undone.
    pub async fn start_with_source(config: Config, source: Arc<dyn ProofSource>) -> Result<Self> {
        let status = StatusFile::new(&config.daemon.status_dir)
            .with_poll_interval(config.daemon.poll_interval());
        status.touch()?;

        let server = match UdpServer::bind(&config.daemon.host, config.daemon.port).await {
            Ok(server) => server,
            Err(e) => {
                let _ = status.remove();
                return Err(e);
            }
        };

        if let Err(e) = logging::init_daemon(&config.logging) {
            let _ = status.remove();
            return Err(e.context("Failed to initialize logging"));
        }
        info!("Starting proofaday daemon");

        let queue = Arc::new(PrefetchQueue::new(config.daemon.prefetch));
        let worker = FetchWorker::new(source, config.daemon.line_limit());
        let (shutdown_tx, _) = broadcast::channel(16);

        let scheduler =
            PrefetchScheduler::new(worker.clone(), queue.clone(), config.daemon.workers);
        let scheduler = tokio::spawn(scheduler.run(shutdown_tx.subscribe()));

        let local_addr = server.local_addr();
        let record = StatusRecord::current(local_addr.ip().to_string(), local_addr.port());
        if let Err(e) = status.write(&record) {
            let _ = shutdown_tx.send(());
            scheduler.abort();
            return Err(e.into());
        }

        let handler = Arc::new(RequestHandler::new(worker, queue, shutdown_tx.clone()));
        let shutdown_rx = shutdown_tx.subscribe();
        let server_rx = shutdown_tx.subscribe();

        info!("Daemon initialized");
        info!("Status file: {}", status.path().display());
        info!(
            "Prefetching {} proofs with {} workers (line limit: {})",
            config.daemon.prefetch,
            config.daemon.workers,
            config
                .daemon
                .line_limit()
                .map_or_else(|| "none".to_string(), |l| l.to_string())
        );

        Ok(Self {
            config,
            status,
            record,
            server,
            handler,
            scheduler,
            shutdown_tx,
            shutdown_rx,
            server_rx,
        })
    }

    /// Address the daemon answers on
    pub fn local_addr(&self) -> SocketAddr {
        self.server.local_addr()
    }

    /// Record published in the status file
    pub fn status_record(&self) -> &StatusRecord {
        &self.record
    }

    /// Sender that stops the daemon when signalled
    pub fn shutdown_handle(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }

    /// Run until Ctrl+C, SIGTERM or a kill request, then shut down
    pub async fn run(self) -> Result<()> {
        info!("Daemon running: {}", self.record);

        let Self {
            config,
            status,
            record,
            server,
            handler,
            scheduler,
            shutdown_tx,
            shutdown_rx,
            server_rx,
        } = self;

        let server_handle = tokio::spawn(async move {
            match server.run(handler, server_rx).await {
                Ok(()) => info!("UDP server shut down cleanly"),
                Err(e) => error!("UDP server failed: {}", e),
            }
        });

        // Wait for shutdown signal (Ctrl+C or SIGTERM)
        tokio::select! {
            _ = signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down");
            }
            _ = Self::wait_for_sigterm() => {
                info!("Received SIGTERM, shutting down");
            }
            _ = Self::wait_for_shutdown(shutdown_rx) => {
                info!("Shutdown requested by client");
            }
        }

        // Trigger shutdown
        let _ = shutdown_tx.send(());

        let grace = config.daemon.shutdown_grace();
        Self::join_or_abort("UDP server", server_handle, grace).await;
        Self::join_or_abort("Prefetch scheduler", scheduler, grace).await;

        Self::shutdown(&status, &record)
    }

    /// Release the status file if it still belongs to this instance
    fn shutdown(status: &StatusFile, record: &StatusRecord) -> Result<()> {
        info!("Shutting down daemon");

        if !status.release(record)? {
            warn!(
                "Status file {} no longer belongs to this daemon, leaving it",
                status.path().display()
            );
        }

        info!("Daemon shutdown complete");
        Ok(())
    }

    /// Wait for a task, aborting it if it does not finish in time
    async fn join_or_abort(name: &str, handle: JoinHandle<()>, grace: Duration) {
        let abort = handle.abort_handle();
        if tokio::time::timeout(grace, handle).await.is_err() {
            warn!("{} did not shut down within {:?}, aborting", name, grace);
            abort.abort();
        }
    }

    /// Wait for SIGTERM signal
    #[cfg(unix)]
    async fn wait_for_sigterm() {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to register SIGTERM handler: {}. Falling back to pending future.", e);
                std::future::pending::<()>().await;
            }
        }
    }

    #[cfg(not(unix))]
    async fn wait_for_sigterm() {
        // On non-Unix, just wait forever (Ctrl+C and kill requests still work)
        std::future::pending::<()>().await
    }

    /// Wait for shutdown signal from broadcast channel
    async fn wait_for_shutdown(mut rx: broadcast::Receiver<()>) {
        let _ = rx.recv().await;
    }
}
