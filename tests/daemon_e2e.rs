//! End-to-end tests for the proofaday daemon
//!
//! Each test runs a real daemon on a localhost UDP port against an in-memory
//! proof source, and talks to it through the regular client.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use proofaday::{
    client::{ping, ClientError, DaemonClient},
    config::{ClientConfig, Config},
    daemon::{Daemon, LifecycleError, StatusFile},
    source::{FetchError, ProofSource},
};
use tempfile::TempDir;

const RANDOM: &str = "Special:Random";

fn page(title: &str, theorem: &str, proof: &str) -> String {
    format!(
        r#"<html><body>
<h1 id="firstHeading">{title}</h1>
<div id="bodyContent">
<h2><span id="Theorem">Theorem</span></h2>
<p>{theorem}</p>
<h2><span id="Proof">Proof</span></h2>
<p>{proof}</p>
<p>$\blacksquare$</p>
</div>
</body></html>"#
    )
}

/// What the wiki serves for a page that does not exist
fn missing_page(title: &str) -> String {
    format!(
        r#"<html><body>
<h1 id="firstHeading">{title}</h1>
<div id="bodyContent">
<p>There is currently no text in this page.</p>
</div>
</body></html>"#
    )
}

/// Numbered random proofs plus a fixed set of named pages
#[derive(Default)]
struct FakeWiki {
    served: AtomicUsize,
    named: HashMap<String, String>,
}

impl FakeWiki {
    fn with_page(mut self, name: &str, body: String) -> Self {
        self.named.insert(name.to_string(), body);
        self
    }
}

#[async_trait]
impl ProofSource for FakeWiki {
    async fn fetch(&self, name: &str) -> Result<String, FetchError> {
        if name == RANDOM {
            let n = self.served.fetch_add(1, Ordering::SeqCst);
            return Ok(page(&format!("Proof {n}"), "Let $n \\in \\N$.", "Induction on $n$."));
        }
        self.named
            .get(name)
            .cloned()
            .ok_or_else(|| FetchError::Connection(format!("no page {name}")))
    }

    fn random_name(&self) -> &str {
        RANDOM
    }
}

fn test_config(dir: &Path) -> Config {
    let mut config = Config::default();
    config.daemon.host = "127.0.0.1".to_string();
    config.daemon.port = 0;
    config.daemon.prefetch = 3;
    config.daemon.status_dir = dir.to_path_buf();
    config.daemon.poll_interval_ms = 20;
    config.daemon.shutdown_grace_secs = 1;
    config.client.timeout_secs = 5.0;
    config.logging.dir = dir.join("logs");
    config
}

async fn start(config: &Config, source: FakeWiki) -> Daemon {
    Daemon::start_with_source(config.clone(), Arc::new(source))
        .await
        .expect("daemon failed to start")
}

async fn stop(daemon: Daemon) {
    let shutdown = daemon.shutdown_handle();
    let run = tokio::spawn(daemon.run());
    shutdown.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(10), run)
        .await
        .expect("daemon did not stop")
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_random_proofs_are_distinct() {
    let temp_dir = TempDir::new().unwrap();
    let config = test_config(temp_dir.path());
    let daemon = start(&config, FakeWiki::default()).await;
    let shutdown = daemon.shutdown_handle();
    let run = tokio::spawn(daemon.run());

    let client = DaemonClient::discover(temp_dir.path(), &config.client)
        .await
        .unwrap();
    client.check().await.unwrap();
    assert!(ping(temp_dir.path(), &config.client).await.unwrap());

    let mut seen = HashSet::new();
    for _ in 0..3 {
        let proof = client.random().await.unwrap();
        assert!(proof.starts_with("Proof "), "unexpected reply: {proof}");
        assert!(proof.contains("Let n ∈ ℕ."));
        assert!(proof.contains("\n\nProof:\nInduction on n.■"));
        seen.insert(proof);
    }
    assert_eq!(seen.len(), 3);

    shutdown.send(()).unwrap();
    run.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_named_requests() {
    let temp_dir = TempDir::new().unwrap();
    let config = test_config(temp_dir.path());
    let source = FakeWiki::default()
        .with_page(
            "Triangle Inequality",
            page(
                "Triangle Inequality",
                "$\\size {x + y} \\le \\size x + \\size y$",
                "Square both sides.",
            ),
        )
        .with_page("NonexistentPage123", missing_page("NonexistentPage123"));
    let daemon = start(&config, source).await;
    let shutdown = daemon.shutdown_handle();
    let run = tokio::spawn(daemon.run());

    let client = DaemonClient::discover(temp_dir.path(), &config.client)
        .await
        .unwrap();

    let proof = client.named("Triangle Inequality").await.unwrap();
    assert!(proof.starts_with("Triangle Inequality\n===================\n"));
    assert!(proof.contains("|x + y| ≤ |x| + |y|"));

    // Pages without a theorem and proof get an empty reply
    assert_eq!(client.named("NonexistentPage123").await.unwrap(), "");

    // So do names the source cannot fetch at all
    assert_eq!(client.named("No Such Proof").await.unwrap(), "");

    // The daemon keeps serving afterwards
    client.check().await.unwrap();

    shutdown.send(()).unwrap();
    run.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_timeout_without_listener() {
    // Bind and drop to get a port nobody answers on
    let addr = {
        let socket = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        socket.local_addr().unwrap()
    };
    let config = ClientConfig {
        timeout_secs: 0.5,
        ..ClientConfig::default()
    };
    let client = DaemonClient::new(addr, &config);

    let err = client.random().await.unwrap_err();
    assert!(matches!(err, ClientError::Timeout(_)));
    assert_eq!(err.to_string(), "Server timed out.");
}

#[tokio::test]
async fn test_single_instance_per_status_dir() {
    let temp_dir = TempDir::new().unwrap();
    let config = test_config(temp_dir.path());
    let status = StatusFile::new(temp_dir.path());

    let first = start(&config, FakeWiki::default()).await;

    let err = Daemon::start_with_source(config.clone(), Arc::new(FakeWiki::default()))
        .await
        .err()
        .expect("second daemon started");
    assert!(matches!(
        err.downcast_ref::<LifecycleError>(),
        Some(LifecycleError::AlreadyExists(_))
    ));
    assert_eq!(status.read().unwrap().as_ref(), Some(first.status_record()));

    // Forcing: drop the old file, then start again
    status.remove().unwrap();
    let second = start(&config, FakeWiki::default()).await;
    assert_ne!(first.local_addr(), second.local_addr());
    assert_eq!(status.read().unwrap().as_ref(), Some(second.status_record()));

    // The first daemon must not remove the second one's record
    stop(first).await;
    assert_eq!(status.read().unwrap().as_ref(), Some(second.status_record()));

    stop(second).await;
    assert!(!status.exists());
}

#[tokio::test]
async fn test_kill_request() {
    let temp_dir = TempDir::new().unwrap();
    let config = test_config(temp_dir.path());
    let daemon = start(&config, FakeWiki::default()).await;
    let run = tokio::spawn(daemon.run());

    let client = DaemonClient::discover(temp_dir.path(), &config.client)
        .await
        .unwrap();
    client.kill().await.unwrap();

    tokio::time::timeout(Duration::from_secs(10), run)
        .await
        .expect("daemon did not stop")
        .unwrap()
        .unwrap();
    assert!(!StatusFile::new(temp_dir.path()).exists());
    assert!(!ping(temp_dir.path(), &config.client).await.unwrap());

    let err = DaemonClient::discover(temp_dir.path(), &config.client)
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::DaemonNotRunning));
}
