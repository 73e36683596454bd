use crate::server::backend::NumericBackend;
use crate::server::streaming::{processor::handle_call, request::WorkRequest};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Worker task responsible for processing [`WorkRequest`] messages.
///
/// Each worker handles one call at a time: it reassembles the call's inbound
/// chunk stream, dispatches the operation to the shared numeric backend, and
/// streams the response chunks back. The worker listens on its bounded MPSC
/// channel until a shutdown signal is received.
///
/// This function is designed to be spawned as a Tokio task.
pub async fn worker_loop(
    worker_id: usize,
    mut rx: mpsc::Receiver<WorkRequest>,
    backend: Arc<dyn NumericBackend>,
    chunk_bytes: usize,
    shutdown: CancellationToken,
) {
    tracing::trace!("worker {worker_id} started");

    while let Some(work) = rx.recv().await {
        match work {
            WorkRequest::Vectors(task) => {
                handle_call(worker_id, task, backend.as_ref(), chunk_bytes, &shutdown).await;
            }
            WorkRequest::Matrices(task) => {
                handle_call(worker_id, task, backend.as_ref(), chunk_bytes, &shutdown).await;
            }
            WorkRequest::Shutdown { response } => {
                tracing::debug!("worker {worker_id} received shutdown signal");

                if response.send(()).is_err() {
                    tracing::error!("worker {worker_id} failed to acknowledge shutdown");
                }
                break;
            }
        }
    }

    tracing::trace!("worker {worker_id} stopped");
}
