//! UDP Server
//!
//! Receives request datagrams and answers each from its own task, so a slow
//! request never holds up the others.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::UdpSocket;
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use super::handler::RequestHandler;
use super::protocol::{Message, MAX_DATAGRAM};

/// UDP listener for client requests
pub struct UdpServer {
    socket: Arc<UdpSocket>,
    local_addr: SocketAddr,
}

impl UdpServer {
    /// Bind the listener. Port 0 lets the OS pick a free port.
    pub async fn bind(host: &str, port: u16) -> Result<Self> {
        let socket = UdpSocket::bind((host, port))
            .await
            .with_context(|| format!("Failed to bind UDP socket on {}:{}", host, port))?;
        let local_addr = socket.local_addr().context("Failed to read bound address")?;

        Ok(Self {
            socket: Arc::new(socket),
            local_addr,
        })
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serve requests until the shutdown signal fires.
    ///
    /// Then waits for outstanding requests; the caller aborts this future
    /// (and with it every request task) if that takes too long.
    pub async fn run(
        self,
        handler: Arc<RequestHandler>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<()> {
        info!("UDP server listening on: {}", self.local_addr);

        let mut tasks: JoinSet<()> = JoinSet::new();
        let mut buf = vec![0u8; MAX_DATAGRAM];

        loop {
            tokio::select! {
                received = self.socket.recv_from(&mut buf) => {
                    match received {
                        Ok((len, peer)) => {
                            let socket = self.socket.clone();
                            let handler = handler.clone();
                            let data = buf[..len].to_vec();
                            tasks.spawn(handle_datagram(socket, handler, data, peer));
                        }
                        // ICMP errors from earlier replies surface here on some
                        // platforms; the socket itself is still usable.
                        Err(e) => warn!("Receive error: {}", e),
                    }
                }
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    log_task_result(joined);
                }
                _ = shutdown.recv() => {
                    info!("UDP server shutting down");
                    break;
                }
            }
        }

        if !tasks.is_empty() {
            debug!("Waiting for {} outstanding requests", tasks.len());
        }
        while let Some(joined) = tasks.join_next().await {
            log_task_result(joined);
        }
        Ok(())
    }
}

/// Decode, handle and answer a single datagram
async fn handle_datagram(
    socket: Arc<UdpSocket>,
    handler: Arc<RequestHandler>,
    data: Vec<u8>,
    peer: SocketAddr,
) {
    let message = match Message::decode(&data) {
        Ok(message) => message,
        Err(e) => {
            warn!("Dropping datagram from {}: {}", peer, e);
            return;
        }
    };
    debug!("Received {} from {}", message.action, peer);

    let reply = handler.handle(message).await;
    if let Err(e) = socket.send_to(reply.text.as_bytes(), peer).await {
        warn!("Failed to reply to {}: {}", peer, e);
    }

    // Only once the ack is on the wire
    if reply.shutdown {
        handler.trigger_shutdown();
    }
}

fn log_task_result(result: Result<(), tokio::task::JoinError>) {
    if let Err(e) = result {
        if e.is_panic() {
            error!("Request task panicked: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::daemon::queue::PrefetchQueue;
    use crate::daemon::worker::FetchWorker;
    use crate::source::test_util::MemorySource;
    use std::time::Duration;

    type ServerHandle = tokio::task::JoinHandle<Result<()>>;

    async fn start_server() -> (SocketAddr, broadcast::Sender<()>, ServerHandle) {
        let server = UdpServer::bind("127.0.0.1", 0).await.unwrap();
        let addr = server.local_addr();
        let (shutdown_tx, shutdown_rx) = broadcast::channel(4);
        let worker = FetchWorker::new(Arc::new(MemorySource::default()), None);
        let queue = Arc::new(PrefetchQueue::new(1));
        let handler = Arc::new(RequestHandler::new(worker, queue, shutdown_tx.clone()));
        let handle = tokio::spawn(server.run(handler, shutdown_rx));
        (addr, shutdown_tx, handle)
    }

    #[tokio::test]
    async fn test_bind_assigns_port() {
        let server = UdpServer::bind("127.0.0.1", 0).await.unwrap();
        assert_ne!(server.local_addr().port(), 0);
    }

    #[tokio::test]
    async fn test_check_and_garbage() {
        let (addr, shutdown_tx, handle) = start_server().await;
        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let mut buf = [0u8; 64];

        // Undecodable datagrams get no reply
        client.send_to(&[42, b'x'], addr).await.unwrap();
        let reply = client.recv_from(&mut buf);
        let silent = tokio::time::timeout(Duration::from_millis(200), reply).await;
        assert!(silent.is_err());

        client.send_to(&Message::check().encode(), addr).await.unwrap();
        let (len, _) = tokio::time::timeout(Duration::from_secs(2), client.recv_from(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(len, 0);

        shutdown_tx.send(()).unwrap();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_kill_stops_server() {
        let (addr, shutdown_tx, handle) = start_server().await;
        let mut shutdown_rx = shutdown_tx.subscribe();
        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let mut buf = [0u8; 64];

        client.send_to(&Message::kill().encode(), addr).await.unwrap();
        let (len, _) = tokio::time::timeout(Duration::from_secs(2), client.recv_from(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(len, 0);

        tokio::time::timeout(Duration::from_secs(2), shutdown_rx.recv())
            .await
            .unwrap()
            .unwrap();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }
}
