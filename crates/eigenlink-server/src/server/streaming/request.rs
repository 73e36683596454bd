use eigenlink_core::proto::{Matrix, Vector};
use eigenlink_core::{CallMetadata, ChunkMessage, Error, Operation};
use tokio::sync::{mpsc, oneshot};
use tonic::metadata::MetadataMap;
use tonic::{Status, Streaming};

/// One inbound call, handed from the gRPC handler to a worker.
///
/// The worker owns the inbound stream for the duration of the call. It
/// reports back on two channels: `header_tx` carries either the outbound
/// metadata headers (computation succeeded, chunks follow) or the call-fatal
/// error, and `chunk_tx` carries the response chunk messages once headers
/// are out.
pub struct CallTask<M: ChunkMessage> {
    /// The operation the RPC requested.
    pub op: Operation,
    /// Declared array and chunk counts, parsed from the request headers.
    pub metadata: CallMetadata,
    /// The client's chunk message stream.
    pub inbound: Streaming<M>,
    /// Resolves the pending RPC: outbound headers on success, the error
    /// otherwise.
    pub header_tx: oneshot::Sender<Result<MetadataMap, Error>>,
    /// Carries response chunks to the client stream.
    pub chunk_tx: mpsc::Sender<Result<M, Status>>,
}

/// A message sent from the pool to an individual worker task.
///
/// [`WorkRequest`]s are sent over bounded channels and consumed by the
/// worker's main loop. The two call variants exist because vector and matrix
/// calls carry different chunk message types.
pub enum WorkRequest {
    /// Handle one call over vector chunks.
    Vectors(CallTask<Vector>),

    /// Handle one call over matrix chunks.
    Matrices(CallTask<Matrix>),

    /// Request the worker to shut down gracefully.
    ///
    /// - `response`: One-shot channel for acknowledging that the worker has
    ///   completed its shutdown routine.
    Shutdown { response: oneshot::Sender<()> },
}
