//! Prefetch Scheduler
//!
//! Keeps the prefetch queue topped up. Each round it tops the in-flight set
//! up to the free queue space, waits for the first fetch to finish, and moves
//! every finished result into the queue.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, Semaphore};
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, trace};

use super::queue::PrefetchQueue;
use super::worker::FetchWorker;

/// Pause after a failed fetch before its slot is handed back
const FAILURE_BACKOFF: Duration = Duration::from_millis(100);

/// Background task filling the prefetch queue through a bounded worker pool
pub struct PrefetchScheduler {
    worker: FetchWorker,
    queue: Arc<PrefetchQueue>,
    permits: Arc<Semaphore>,
    workers: usize,
}

impl PrefetchScheduler {
    pub fn new(worker: FetchWorker, queue: Arc<PrefetchQueue>, workers: usize) -> Self {
        let workers = workers.max(1);
        Self {
            worker,
            queue,
            permits: Arc::new(Semaphore::new(workers)),
            workers,
        }
    }

    /// Number of fetches to submit given the current in-flight count.
    ///
    /// Never zero while nothing is in flight, so the loop always has a
    /// completion to wait for.
    fn demand(&self, in_flight: usize) -> usize {
        let need = self
            .queue
            .capacity()
            .saturating_sub(self.queue.len() + in_flight);
        if in_flight == 0 {
            need.max(1)
        } else {
            need
        }
    }

    fn submit(&self, in_flight: &mut JoinSet<Option<String>>) {
        let worker = self.worker.clone();
        let permits = self.permits.clone();
        in_flight.spawn(async move {
            let permit = permits.acquire_owned().await.ok()?;
            let result = worker.fetch(None).await;
            drop(permit);
            if result.is_none() {
                tokio::time::sleep(FAILURE_BACKOFF).await;
            }
            result
        });
    }

    /// Run until the shutdown signal fires, then drain in-flight fetches
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            "Prefetch scheduler started (capacity {}, {} workers)",
            self.queue.capacity(),
            self.workers
        );
        let mut in_flight: JoinSet<Option<String>> = JoinSet::new();

        'rounds: loop {
            let need = self.demand(in_flight.len());
            for _ in 0..need {
                self.submit(&mut in_flight);
            }
            trace!(
                "Submitted {} fetches ({} in flight, {} queued)",
                need,
                in_flight.len(),
                self.queue.len()
            );

            let first = tokio::select! {
                _ = shutdown.recv() => break 'rounds,
                Some(result) = in_flight.join_next() => result,
                else => break 'rounds,
            };

            let mut finished = vec![first];
            while let Some(result) = in_flight.try_join_next() {
                finished.push(result);
            }

            for result in finished {
                let Some(text) = Self::record(result) else {
                    continue;
                };
                tokio::select! {
                    _ = self.queue.push(text) => {}
                    _ = shutdown.recv() => break 'rounds,
                }
                debug!("Queued proof ({}/{})", self.queue.len(), self.queue.capacity());
            }
        }

        info!("Prefetch scheduler stopping, draining {} fetches", in_flight.len());
        while let Some(result) = in_flight.join_next().await {
            if Self::record(result).is_some() {
                trace!("Discarded proof fetched during shutdown");
            }
        }
        info!("Prefetch scheduler stopped");
    }

    fn record(result: Result<Option<String>, JoinError>) -> Option<String> {
        match result {
            Ok(text) => text,
            Err(e) if e.is_panic() => {
                error!("Prefetch task panicked: {}", e);
                None
            }
            Err(_) => None,
        }
    }
}
