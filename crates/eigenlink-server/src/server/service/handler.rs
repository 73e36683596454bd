//! gRPC service implementation for chunked array operations.
//!
//! This module defines [`ArrayOpsService`], the concrete implementation of
//! the [`ArrayOps`] gRPC service. Every streaming RPC follows the same
//! shape: parse the call's metadata headers, hand the inbound stream to a
//! pool worker, and resolve the RPC once the worker reports either the
//! outbound headers or a call-fatal error.
//!
//! ## Responsibilities
//!
//! - Spawn and manage the bounded worker pool.
//! - Parse and bound-check inbound call metadata before any payload flows.
//! - Route vector and matrix calls to the per-call processor.
//! - Surface structured errors as `tonic::Status` and support graceful
//!   shutdown.

use crate::server::{
    backend::{DenseBackend, NumericBackend},
    config::ServerConfig,
    pool::{manager::WorkerPool, worker::worker_loop},
    streaming::request::{CallTask, WorkRequest},
};
use core::pin::Pin;
use eigenlink_core::proto::array_ops_server::ArrayOps;
use eigenlink_core::proto::{HelloReply, HelloRequest, Matrix, Vector};
use eigenlink_core::{CallMetadata, ChunkMessage, Error, Operation};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio_stream::{Stream, wrappers::ReceiverStream};
use tokio_util::sync::CancellationToken;
use tonic::{Request, Response, Status, Streaming};

/// Boxed response stream carrying one call's outbound chunks.
type ServiceStream<M> = Pin<Box<dyn Stream<Item = Result<M, Status>> + Send>>;

/// gRPC service streaming chunked vector and matrix operations.
///
/// The service itself holds no per-call state: every call's reassembly
/// session lives on the worker handling it and dies with the call.
#[derive(Clone)]
pub struct ArrayOpsService {
    config: ServerConfig,
    worker_pool: Arc<WorkerPool>,
}

impl ArrayOpsService {
    /// Creates a new `ArrayOpsService` and spawns the worker pool.
    ///
    /// Each worker owns a bounded request channel of capacity 1, so at most
    /// one call queues behind the one a worker is processing; further calls
    /// wait in `send_to_next_worker`. The numeric backend is shared by all
    /// workers; it is pure, so sharing is free.
    pub fn new(config: ServerConfig) -> Self {
        let backend: Arc<dyn NumericBackend> = Arc::new(DenseBackend);
        let shutdown_token = CancellationToken::new();
        let mut workers = Vec::with_capacity(config.num_workers);

        for worker_id in 0..config.num_workers {
            let (tx, rx) = mpsc::channel(1);
            workers.push(tx);

            tokio::spawn(worker_loop(
                worker_id,
                rx,
                Arc::clone(&backend),
                config.chunk_bytes,
                shutdown_token.clone(),
            ));
        }

        let worker_pool = WorkerPool::new(workers, shutdown_token);

        Self {
            config,
            worker_pool: Arc::new(worker_pool),
        }
    }

    /// Initiates a graceful shutdown of the worker pool.
    ///
    /// In-flight calls are aborted with a transport failure, and the
    /// shutdown blocks until each worker acknowledges termination or times
    /// out.
    pub async fn shutdown(&self) -> Result<(), Error> {
        self.worker_pool.shutdown().await
    }

    /// Shared path of every streaming RPC.
    ///
    /// `wrap` lifts the typed [`CallTask`] into the pool's [`WorkRequest`];
    /// the variant constructors (`WorkRequest::Vectors`,
    /// `WorkRequest::Matrices`) are passed directly.
    async fn run_call<M: ChunkMessage>(
        &self,
        op: Operation,
        req: Request<Streaming<M>>,
        wrap: fn(CallTask<M>) -> WorkRequest,
    ) -> Result<Response<ServiceStream<M>>, Status> {
        let metadata = CallMetadata::from_headers(M::KIND, req.metadata())?;
        tracing::info!(
            op = %op,
            kind = %M::KIND,
            arrays = metadata.array_count(),
            chunks = metadata.total_chunks(),
            "call received"
        );

        // Bound the memory one call can pin before reading any payload.
        if metadata.total_chunks() > self.config.max_call_chunks {
            return Err(Error::Protocol {
                detail: format!(
                    "call declares {} chunks, exceeding the limit of {}",
                    metadata.total_chunks(),
                    self.config.max_call_chunks
                ),
            }
            .into());
        }

        let (header_tx, header_rx) = oneshot::channel();
        let (chunk_tx, chunk_rx) = mpsc::channel(self.config.stream_buffer_size);

        self.worker_pool
            .send_to_next_worker(wrap(CallTask {
                op,
                metadata,
                inbound: req.into_inner(),
                header_tx,
                chunk_tx,
            }))
            .await?;

        // The worker resolves the headers only once the result is computed;
        // a client-streaming call has to finish before the response starts
        // anyway.
        let headers = match header_rx.await {
            Ok(Ok(headers)) => headers,
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => {
                return Err(Error::Channel {
                    context: "worker dropped the call before responding".to_string(),
                }
                .into());
            }
        };

        let mut response: Response<ServiceStream<M>> =
            Response::new(Box::pin(ReceiverStream::new(chunk_rx)));
        *response.metadata_mut() = headers;
        Ok(response)
    }
}

#[tonic::async_trait]
impl ArrayOps for ArrayOpsService {
    type FlipVectorStream = ServiceStream<Vector>;
    type AddVectorsStream = ServiceStream<Vector>;
    type MultiplyVectorsStream = ServiceStream<Vector>;
    type AddMatricesStream = ServiceStream<Matrix>;
    type MultiplyMatricesStream = ServiceStream<Matrix>;

    /// Connectivity check.
    async fn say_hello(
        &self,
        req: Request<HelloRequest>,
    ) -> Result<Response<HelloReply>, Status> {
        let name = &req.get_ref().name;
        tracing::info!("greeting requested by {name}");
        Ok(Response::new(HelloReply {
            message: format!("Hello, {name}!"),
        }))
    }

    async fn flip_vector(
        &self,
        req: Request<Streaming<Vector>>,
    ) -> Result<Response<Self::FlipVectorStream>, Status> {
        self.run_call(Operation::Flip, req, WorkRequest::Vectors)
            .await
    }

    async fn add_vectors(
        &self,
        req: Request<Streaming<Vector>>,
    ) -> Result<Response<Self::AddVectorsStream>, Status> {
        self.run_call(Operation::Add, req, WorkRequest::Vectors)
            .await
    }

    async fn multiply_vectors(
        &self,
        req: Request<Streaming<Vector>>,
    ) -> Result<Response<Self::MultiplyVectorsStream>, Status> {
        self.run_call(Operation::Multiply, req, WorkRequest::Vectors)
            .await
    }

    async fn add_matrices(
        &self,
        req: Request<Streaming<Matrix>>,
    ) -> Result<Response<Self::AddMatricesStream>, Status> {
        self.run_call(Operation::Add, req, WorkRequest::Matrices)
            .await
    }

    async fn multiply_matrices(
        &self,
        req: Request<Streaming<Matrix>>,
    ) -> Result<Response<Self::MultiplyMatricesStream>, Status> {
        self.run_call(Operation::Multiply, req, WorkRequest::Matrices)
            .await
    }
}
