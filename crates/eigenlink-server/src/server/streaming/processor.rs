//! Per-call processing pipeline, run entirely on one worker.
//!
//! A call moves through three strictly sequential phases: reassemble every
//! declared array from the inbound stream, dispatch the validated operands
//! to the numeric backend, and plan and emit the response chunks. The
//! response headers are resolved only after computation succeeds, so a
//! failing call terminates with a structured error and never a partial
//! result.

use crate::server::backend::NumericBackend;
use crate::server::dispatch::dispatch;
use crate::server::streaming::request::CallTask;
use eigenlink_core::{
    CallMetadata, CallPlan, ChunkMessage, LogicalArray, Operation, Result, TransportError,
    collect_arrays,
};
use futures::Stream;
use tokio_util::sync::CancellationToken;
use tonic::Status;
use tonic::metadata::MetadataMap;

/// Runs one call to completion on the current worker.
///
/// Cancellation of `shutdown` mid-call aborts the call with a transport
/// failure; the client sees `cancelled`, never a short result. If the
/// client disconnects while chunks are being sent, the worker drops the
/// remainder and moves on.
pub async fn handle_call<M: ChunkMessage>(
    worker_id: usize,
    task: CallTask<M>,
    backend: &dyn NumericBackend,
    chunk_bytes: usize,
    shutdown: &CancellationToken,
) {
    let CallTask {
        op,
        metadata,
        mut inbound,
        header_tx,
        chunk_tx,
    } = task;

    let outcome = tokio::select! {
        () = shutdown.cancelled() => Err(TransportError::Cancelled {
            detail: "service is shutting down".to_string(),
        }
        .into()),
        outcome = compute(op, &metadata, &mut inbound, backend, chunk_bytes) => outcome,
    };

    match outcome {
        Ok((headers, results, plan)) => {
            if header_tx.send(Ok(headers)).is_err() {
                tracing::debug!("worker {worker_id} exiting before headers were consumed");
                return;
            }
            for msg in plan.messages::<M>(&results) {
                if chunk_tx.send(Ok(msg)).await.is_err() {
                    tracing::debug!("worker {worker_id} client went away mid-response");
                    return;
                }
            }
        }
        Err(e) => {
            tracing::debug!("worker {worker_id} call failed: {e}");
            // Best effort: the handler may already have given up on the
            // call.
            let _ = header_tx.send(Err(e));
        }
    }
}

/// Reassembles, validates, computes, and plans the response for one call.
///
/// Split from [`handle_call`] so the pipeline can be driven from any chunk
/// stream, not just a live `tonic::Streaming`.
async fn compute<M, S>(
    op: Operation,
    metadata: &CallMetadata,
    inbound: &mut S,
    backend: &dyn NumericBackend,
    chunk_bytes: usize,
) -> Result<(MetadataMap, Vec<LogicalArray>, CallPlan)>
where
    M: ChunkMessage,
    S: Stream<Item = core::result::Result<M, Status>> + Unpin,
{
    let arrays = collect_arrays(metadata, inbound).await?;
    let results = dispatch(op, M::KIND, arrays, backend)?;
    let plan = CallPlan::for_arrays(M::KIND, &results, chunk_bytes)?;

    let mut headers = MetadataMap::new();
    plan.metadata().insert_into(&mut headers)?;
    Ok((headers, results, plan))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::backend::DenseBackend;
    use eigenlink_core::proto;
    use eigenlink_core::{ArrayKind, DType, Error, Shape};
    use futures::stream;

    fn inbound_call(
        arrays: &[LogicalArray],
        chunk_bytes: usize,
    ) -> (
        CallMetadata,
        stream::Iter<std::vec::IntoIter<core::result::Result<proto::Vector, Status>>>,
    ) {
        let plan = CallPlan::for_arrays(ArrayKind::Vectors, arrays, chunk_bytes).unwrap();
        let messages: Vec<_> = plan.messages::<proto::Vector>(arrays).map(Ok).collect();
        (plan.metadata(), stream::iter(messages))
    }

    #[tokio::test]
    async fn add_call_flows_end_to_end() {
        let operands = vec![
            LogicalArray::from_f64(Shape::Vector(4), &[1.0, 2.0, 3.0, 4.0]).unwrap(),
            LogicalArray::from_f64(Shape::Vector(4), &[5.0, 4.0, 2.0, 0.0]).unwrap(),
        ];
        // A 16-byte budget forces two chunks per operand.
        let (metadata, mut inbound) = inbound_call(&operands, 16);

        let (headers, results, plan) = compute::<proto::Vector, _>(
            Operation::Add,
            &metadata,
            &mut inbound,
            &DenseBackend,
            16,
        )
        .await
        .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].to_f64().unwrap(), [6.0, 6.0, 5.0, 4.0]);
        assert_eq!(headers.get("full-vectors").unwrap(), "1");
        assert_eq!(headers.get("vec1-messages").unwrap(), "2");

        // The response chunks reproduce the result buffer in order.
        let chunks: Vec<proto::Vector> = plan.messages(&results).collect();
        assert_eq!(chunks.len(), 2);
        let mut bytes = Vec::new();
        for chunk in &chunks {
            assert_eq!(chunk.vector_size, 4);
            bytes.extend_from_slice(&chunk.vector_as_chunk);
        }
        assert_eq!(bytes, results[0].data().as_ref());
    }

    #[tokio::test]
    async fn dot_call_returns_a_scalar_vector() {
        let operands = vec![
            LogicalArray::from_f64(Shape::Vector(4), &[1.0, 2.0, 3.0, 4.0]).unwrap(),
            LogicalArray::from_f64(Shape::Vector(4), &[5.0, 4.0, 2.0, 0.0]).unwrap(),
        ];
        let (metadata, mut inbound) = inbound_call(&operands, 1024);

        let (headers, results, _plan) = compute::<proto::Vector, _>(
            Operation::Multiply,
            &metadata,
            &mut inbound,
            &DenseBackend,
            1024,
        )
        .await
        .unwrap();

        assert_eq!(results[0].shape(), Shape::Vector(1));
        assert_eq!(results[0].to_f64().unwrap(), [19.0]);
        assert_eq!(headers.get("vec1-messages").unwrap(), "1");
    }

    #[tokio::test]
    async fn mixed_dtypes_fail_before_any_arithmetic() {
        let metadata = CallMetadata::new(ArrayKind::Vectors, vec![1, 1]);
        let mut inbound = stream::iter(vec![
            Ok(proto::Vector::from_parts(
                DType::Float64,
                Shape::Vector(1),
                bytes::Bytes::from(1.0f64.to_le_bytes().to_vec()),
            )),
            Ok(proto::Vector::from_parts(
                DType::Int32,
                Shape::Vector(1),
                bytes::Bytes::from(1i32.to_le_bytes().to_vec()),
            )),
        ]);

        let err = compute::<proto::Vector, _>(
            Operation::Add,
            &metadata,
            &mut inbound,
            &DenseBackend,
            1024,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { array_index: 1, .. }));
    }

    #[tokio::test]
    async fn truncated_call_is_a_transport_failure() {
        let metadata = CallMetadata::new(ArrayKind::Vectors, vec![2]);
        let mut inbound = stream::iter(vec![Ok(proto::Vector::from_parts(
            DType::Float64,
            Shape::Vector(4),
            bytes::Bytes::from([1.0f64, 2.0].iter().flat_map(|v| v.to_le_bytes()).collect::<Vec<u8>>()),
        ))]);

        let err = compute::<proto::Vector, _>(
            Operation::Add,
            &metadata,
            &mut inbound,
            &DenseBackend,
            1024,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Transport(TransportError::Truncated { .. })));
    }
}
