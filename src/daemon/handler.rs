//! Request Handler
//!
//! Maps each decoded message to the text sent back to its sender.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::broadcast;
use tracing::{debug, info};

use super::protocol::{Action, Message};
use super::queue::PrefetchQueue;
use super::worker::FetchWorker;

/// Reply to one datagram
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reply {
    /// Text sent back; empty means "no result" or "acknowledged"
    pub text: String,
    /// Shut the daemon down once the reply has been sent
    pub shutdown: bool,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            shutdown: false,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    fn shutdown() -> Self {
        Self {
            text: String::new(),
            shutdown: true,
        }
    }
}

/// Request handler shared by all datagram tasks
pub struct RequestHandler {
    worker: FetchWorker,
    queue: Arc<PrefetchQueue>,
    shutdown_tx: broadcast::Sender<()>,
}

impl RequestHandler {
    pub fn new(
        worker: FetchWorker,
        queue: Arc<PrefetchQueue>,
        shutdown_tx: broadcast::Sender<()>,
    ) -> Self {
        Self {
            worker,
            queue,
            shutdown_tx,
        }
    }

    /// Handle one message
    pub async fn handle(&self, message: Message) -> Reply {
        match message.action {
            Action::Check => Reply::empty(),
            Action::Request => self.handle_request(&message.payload).await,
            Action::Random => self.handle_random().await,
            Action::Kill => {
                info!("Shutdown requested by client");
                Reply::shutdown()
            }
        }
    }

    /// Signal every daemon component to stop
    pub fn trigger_shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    // ============ Proof Handlers ============

    async fn handle_request(&self, name: &str) -> Reply {
        let start = Instant::now();
        match self.worker.fetch(Some(name)).await {
            Some(text) => {
                debug!("Served '{}' in {:?}", name, start.elapsed());
                Reply::text(text)
            }
            None => {
                debug!("No proof for '{}'", name);
                Reply::empty()
            }
        }
    }

    async fn handle_random(&self) -> Reply {
        let start = Instant::now();
        let text = self.queue.pop().await;
        debug!(
            "Served random proof after {:?} ({} left in queue)",
            start.elapsed(),
            self.queue.len()
        );
        Reply::text(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::test_util::{proof_page, MemorySource};

    fn handler(
        source: MemorySource,
    ) -> (RequestHandler, Arc<PrefetchQueue>, broadcast::Receiver<()>) {
        let queue = Arc::new(PrefetchQueue::new(2));
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let worker = FetchWorker::new(Arc::new(source), None);
        (RequestHandler::new(worker, queue.clone(), shutdown_tx), queue, shutdown_rx)
    }

    #[tokio::test]
    async fn test_check_leaves_queue_alone() {
        let (handler, queue, _rx) = handler(MemorySource::default());
        queue.push("queued".to_string()).await;

        assert_eq!(handler.handle(Message::check()).await, Reply::empty());
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test]
    async fn test_random_pops_queue() {
        let (handler, queue, _rx) = handler(MemorySource::default());
        queue.push("first".to_string()).await;
        queue.push("second".to_string()).await;

        assert_eq!(handler.handle(Message::random()).await.text, "first");
        assert_eq!(handler.handle(Message::random()).await.text, "second");
    }

    #[tokio::test]
    async fn test_request_bypasses_queue() {
        let source = MemorySource::default().with_page(
            "One is Odd",
            proof_page("One is Odd", "$1$ is odd.", "$1 = 2 \\cdot 0 + 1$."),
        );
        let (handler, queue, _rx) = handler(source);
        queue.push("queued".to_string()).await;

        let reply = handler.handle(Message::request("One is Odd")).await;
        assert!(reply.text.starts_with("One is Odd\n"));
        assert!(!reply.shutdown);
        assert_eq!(queue.len(), 1);

        let missing = handler.handle(Message::request("No Such Proof")).await;
        assert_eq!(missing, Reply::empty());
    }

    #[tokio::test]
    async fn test_kill_acks_then_shuts_down() {
        let (handler, _queue, mut rx) = handler(MemorySource::default());

        let reply = handler.handle(Message::kill()).await;
        assert_eq!(reply.text, "");
        assert!(reply.shutdown);
        assert!(rx.try_recv().is_err());

        handler.trigger_shutdown();
        assert!(rx.try_recv().is_ok());
    }
}
