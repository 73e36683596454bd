//! Bounded worker pool for call handling.
//!
//! This module defines the [`WorkerPool`] struct, which manages the set of
//! worker tasks that process [`WorkRequest`]s. Work is distributed
//! round-robin over bounded channels, and the pool supports coordinated
//! shutdown via a shared [`CancellationToken`].
//!
//! Each worker listens on its own bounded [`mpsc::Receiver`] and handles one
//! call at a time, start to finish. Calls beyond the pool's capacity queue
//! on the workers' channels; queue depth is bounded, so a flood of calls
//! backpressures the transport instead of growing memory.

use crate::server::streaming::request::WorkRequest;
use core::time::Duration;
use eigenlink_core::Error;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::{
    sync::{mpsc, oneshot},
    time::timeout,
};
use tokio_util::sync::CancellationToken;

/// How long to wait for each worker to acknowledge shutdown.
const SHUTDOWN_ACK_TIMEOUT: Duration = Duration::from_secs(3);

/// A cooperative pool of worker tasks that process [`WorkRequest`]s.
pub struct WorkerPool {
    workers: Vec<mpsc::Sender<WorkRequest>>,
    next_worker: AtomicUsize,
    shutdown_token: CancellationToken,
}

impl WorkerPool {
    /// Constructs a new [`WorkerPool`] from initialized worker channels and
    /// a shared cancellation token.
    pub const fn new(
        workers: Vec<mpsc::Sender<WorkRequest>>,
        shutdown_token: CancellationToken,
    ) -> Self {
        Self {
            workers,
            next_worker: AtomicUsize::new(0),
            shutdown_token,
        }
    }

    /// Returns the index of the next worker to receive work (round-robin).
    ///
    /// Uses a relaxed atomic increment to minimize contention.
    fn next_worker_index(&self) -> usize {
        self.next_worker.fetch_add(1, Ordering::Relaxed) % self.workers.len()
    }

    /// Sends a [`WorkRequest`] to the next worker in the pool, waiting for
    /// channel capacity if that worker is busy.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The service is shutting down (`shutdown_token` was cancelled).
    /// - The worker's channel is closed.
    pub async fn send_to_next_worker(&self, request: WorkRequest) -> Result<(), Error> {
        if self.shutdown_token.is_cancelled() {
            return Err(Error::ServiceShutdown);
        }

        let worker_idx = self.next_worker_index();
        let worker = &self.workers[worker_idx];

        match worker.send(request).await {
            Ok(()) => Ok(()),
            Err(_) => Err(Error::Channel {
                context: format!("worker {worker_idx} channel closed"),
            }),
        }
    }

    /// Gracefully shuts down all workers in the pool.
    ///
    /// - Cancels the shared [`CancellationToken`], refusing new calls and
    ///   aborting in-flight streams.
    /// - Sends a [`WorkRequest::Shutdown`] to each worker.
    /// - Waits up to [`SHUTDOWN_ACK_TIMEOUT`] per worker for
    ///   acknowledgements.
    pub async fn shutdown(&self) -> Result<(), Error> {
        tracing::debug!("cancelling in-flight work via shutdown token");
        self.shutdown_token.cancel();

        tracing::debug!("notifying all workers to shut down");
        let mut shutdown_handles = Vec::with_capacity(self.workers.len());

        for (i, worker) in self.workers.iter().enumerate() {
            let (tx, rx) = oneshot::channel();
            if let Err(e) = worker.send(WorkRequest::Shutdown { response: tx }).await {
                tracing::error!("failed to send shutdown to worker {i}: {e}");
            } else {
                shutdown_handles.push((i, rx));
            }
        }

        let ack_futures = shutdown_handles.into_iter().map(|(i, rx)| async move {
            match timeout(SHUTDOWN_ACK_TIMEOUT, rx).await {
                Ok(Ok(())) => {
                    tracing::trace!("worker {i} shutdown acknowledged");
                }
                Ok(Err(e)) => {
                    tracing::error!("worker {i} returned error: {e}");
                }
                Err(_) => {
                    tracing::warn!("worker {i} shutdown timed out");
                }
            }
        });

        futures::future::join_all(ack_futures).await;

        tracing::info!("worker pool shutdown complete");
        Ok(())
    }
}
