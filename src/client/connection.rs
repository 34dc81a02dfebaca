//! Client Connection
//!
//! Sends a request datagram from an ephemeral socket and waits for the reply.

use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::time::Instant;
use tracing::debug;

use crate::config::ClientConfig;
use crate::daemon::protocol::Message;
use crate::daemon::status::StatusFile;

use super::{ClientError, Query};

/// Client for one daemon address
#[derive(Debug, Clone)]
pub struct DaemonClient {
    addr: SocketAddr,
    timeout: Duration,
    recv_buffer: usize,
}

impl DaemonClient {
    pub fn new(addr: SocketAddr, config: &ClientConfig) -> Self {
        Self {
            addr,
            timeout: config.timeout(),
            recv_buffer: config.recv_buffer.max(1),
        }
    }

    /// Locate the daemon through the status file in `status_dir`
    pub async fn discover(status_dir: &Path, config: &ClientConfig) -> Result<Self, ClientError> {
        let status = StatusFile::new(status_dir);
        let record = status.read()?.ok_or(ClientError::DaemonNotRunning)?;
        debug!("Found daemon: {}", record);

        let addr = tokio::net::lookup_host((record.host.as_str(), record.port))
            .await?
            .next()
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("no address for {}:{}", record.host, record.port),
                )
            })?;
        Ok(Self::new(addr, config))
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Send a message and wait for its reply.
    ///
    /// Replies longer than the receive buffer are truncated.
    pub async fn send(&self, message: &Message) -> Result<String, ClientError> {
        let local: SocketAddr = if self.addr.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(local).await?;
        socket.send_to(&message.encode(), self.addr).await?;
        debug!("Sent {} to {}", message.action, self.addr);

        let mut buf = vec![0u8; self.recv_buffer];
        let deadline = Instant::now()
            .checked_add(self.timeout)
            .ok_or(ClientError::Timeout(self.timeout))?;
        loop {
            match tokio::time::timeout_at(deadline, socket.recv_from(&mut buf)).await {
                Err(_) => return Err(ClientError::Timeout(self.timeout)),
                Ok(Ok((len, peer))) => {
                    debug!("Received {} bytes from {}", len, peer);
                    return Ok(String::from_utf8_lossy(&buf[..len]).into_owned());
                }
                // Some platforms report an ICMP "port unreachable" for the
                // request as a receive error; keep waiting until the deadline.
                Ok(Err(e))
                    if matches!(
                        e.kind(),
                        io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionRefused
                    ) =>
                {
                    debug!("Ignoring receive error: {}", e);
                }
                Ok(Err(e)) => return Err(e.into()),
            }
        }
    }

    pub async fn query(&self, query: &Query) -> Result<String, ClientError> {
        self.send(&query.message()).await
    }

    /// Next prefetched proof
    pub async fn random(&self) -> Result<String, ClientError> {
        self.query(&Query::Random).await
    }

    /// A named proof; empty if it could not be fetched
    pub async fn named(&self, name: &str) -> Result<String, ClientError> {
        self.query(&Query::Named(name.to_string())).await
    }

    pub async fn check(&self) -> Result<(), ClientError> {
        self.expect_ack(&Query::Check).await
    }

    pub async fn kill(&self) -> Result<(), ClientError> {
        self.expect_ack(&Query::Kill).await
    }

    async fn expect_ack(&self, query: &Query) -> Result<(), ClientError> {
        let reply = self.query(query).await?;
        if reply.is_empty() {
            Ok(())
        } else {
            Err(ClientError::InvalidReply(reply))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::daemon::status::StatusRecord;
    use tempfile::TempDir;

    fn fast_config() -> ClientConfig {
        ClientConfig {
            timeout_secs: 0.3,
            ..ClientConfig::default()
        }
    }

    /// Answer every datagram with `reply`
    async fn reply_server(reply: &'static [u8]) -> SocketAddr {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        tokio::spawn(async move {
            let mut buf = [0u8; 1024];
            while let Ok((_, peer)) = socket.recv_from(&mut buf).await {
                let _ = socket.send_to(reply, peer).await;
            }
        });
        addr
    }

    #[tokio::test]
    async fn test_discover_without_status_file() {
        let temp_dir = TempDir::new().unwrap();
        let result = DaemonClient::discover(temp_dir.path(), &fast_config()).await;
        assert!(matches!(result, Err(ClientError::DaemonNotRunning)));
    }

    #[tokio::test]
    async fn test_discover_corrupt_status_file() {
        let temp_dir = TempDir::new().unwrap();
        let status = StatusFile::new(temp_dir.path());
        std::fs::write(status.path(), "garbage").unwrap();

        let result = DaemonClient::discover(temp_dir.path(), &fast_config()).await;
        assert!(matches!(result, Err(ClientError::Status(_))));
    }

    #[tokio::test]
    async fn test_discover_reads_address() {
        let temp_dir = TempDir::new().unwrap();
        let status = StatusFile::new(temp_dir.path());
        status.touch().unwrap();
        status.write(&StatusRecord::current("127.0.0.1", 4567)).unwrap();

        let client = DaemonClient::discover(temp_dir.path(), &fast_config()).await.unwrap();
        assert_eq!(client.addr(), "127.0.0.1:4567".parse().unwrap());
    }

    #[tokio::test]
    async fn test_timeout_on_silent_port() {
        // Bind and drop to get a port nobody answers on
        let addr = {
            let socket = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
            socket.local_addr().unwrap()
        };
        let client = DaemonClient::new(addr, &fast_config());

        let start = std::time::Instant::now();
        let result = client.random().await;
        assert!(matches!(result, Err(ClientError::Timeout(_))));
        assert!(start.elapsed() >= Duration::from_millis(250));
    }

    #[tokio::test]
    async fn test_huge_timeout_does_not_panic() {
        let addr = reply_server(b"proof").await;
        let config = ClientConfig {
            timeout_secs: 1e20,
            ..ClientConfig::default()
        };
        let client = DaemonClient::new(addr, &config);

        assert_eq!(client.random().await.unwrap(), "proof");
    }

    #[tokio::test]
    async fn test_reply_truncated_to_buffer() {
        let addr = reply_server(b"abcdefgh").await;
        let config = ClientConfig {
            recv_buffer: 4,
            ..fast_config()
        };
        let client = DaemonClient::new(addr, &config);

        assert_eq!(client.random().await.unwrap(), "abcd");
    }

    #[tokio::test]
    async fn test_ack_must_be_empty() {
        let addr = reply_server(b"surprise").await;
        let client = DaemonClient::new(addr, &fast_config());
        assert!(matches!(client.check().await, Err(ClientError::InvalidReply(_))));

        let addr = reply_server(b"").await;
        let client = DaemonClient::new(addr, &fast_config());
        client.check().await.unwrap();
    }
}
