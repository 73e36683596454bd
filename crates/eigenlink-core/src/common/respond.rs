//! Outbound call planning: chunk plans, metadata, and the message sequence.
//!
//! [`CallPlan`] mirrors the reassembly side for one or more result arrays:
//! it computes a [`ChunkPlan`] per array, derives the call's metadata header
//! entries, and emits the chunk messages as a single-pass lazy iterator in
//! array-major, chunk-minor order. The metadata must reach the peer before
//! the first message; the server applies it as initial response metadata.
//!
//! Chunk payloads are `Bytes` slices of each array's element buffer, so
//! emitting a message never copies element data.

use crate::common::chunk::ChunkPlan;
use crate::common::error::{Error, Result};
use crate::common::metadata::CallMetadata;
use crate::common::types::{ArrayKind, ChunkMessage, LogicalArray};

/// The chunking of one call's outbound arrays.
#[derive(Debug, Clone)]
pub struct CallPlan {
    kind: ArrayKind,
    plans: Vec<ChunkPlan>,
}

impl CallPlan {
    /// Plans the transmission of `arrays` under a `chunk_bytes` payload
    /// budget. Every array must belong to the `kind` family.
    pub fn for_arrays(
        kind: ArrayKind,
        arrays: &[LogicalArray],
        chunk_bytes: usize,
    ) -> Result<Self> {
        let mut plans = Vec::with_capacity(arrays.len());
        for array in arrays {
            if array.shape().kind() != kind {
                return Err(Error::Protocol {
                    detail: format!(
                        "cannot stream a {} as one of the call's {kind}",
                        array.shape()
                    ),
                });
            }
            plans.push(ChunkPlan::for_array(
                array.element_count(),
                array.dtype().width(),
                chunk_bytes,
            )?);
        }
        Ok(Self { kind, plans })
    }

    /// The metadata header entries announcing this plan.
    pub fn metadata(&self) -> CallMetadata {
        CallMetadata::for_plans(self.kind, &self.plans)
    }

    /// Chunk messages summed over all arrays.
    pub fn total_chunks(&self) -> usize {
        self.plans.iter().map(ChunkPlan::chunk_count).sum()
    }

    /// Emits the chunk messages of the call: arrays in call order, each
    /// array's chunks in offset order. Every message carries the element
    /// type tag and the array's full declared shape; the payload is the
    /// chunk's element range sliced out of the flattened buffer.
    ///
    /// `arrays` must be the slice the plan was computed for.
    pub fn messages<'a, M: ChunkMessage>(
        &'a self,
        arrays: &'a [LogicalArray],
    ) -> impl Iterator<Item = M> + 'a {
        arrays.iter().zip(&self.plans).flat_map(|(array, plan)| {
            let width = array.dtype().width();
            plan.ranges().map(move |range| {
                let payload = array.data().slice(range.start * width..range.end * width);
                M::from_parts(array.dtype(), array.shape(), payload)
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::proto;
    use crate::common::reassemble::collect_arrays;
    use crate::common::types::{DType, Shape};
    use futures::stream;

    #[test]
    fn five_element_vector_declares_three_chunks() {
        // Budget of 16 bytes holds two f64 elements per chunk.
        let array =
            LogicalArray::from_f64(Shape::Vector(5), &[1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        let plan = CallPlan::for_arrays(ArrayKind::Vectors, core::slice::from_ref(&array), 16)
            .unwrap();

        assert_eq!(plan.total_chunks(), 3);
        let metadata = plan.metadata();
        assert_eq!(metadata.array_count(), 1);
        assert_eq!(metadata.chunks_for(0), 3);

        let messages: Vec<proto::Vector> =
            plan.messages(core::slice::from_ref(&array)).collect();
        assert_eq!(messages.len(), 3);
        // Every chunk is tagged with the dtype and full declared shape.
        for msg in &messages {
            assert_eq!(msg.data_type, DType::Float64.tag());
            assert_eq!(msg.vector_size, 5);
        }
        assert_eq!(messages[0].vector_as_chunk.len(), 16);
        assert_eq!(messages[1].vector_as_chunk.len(), 16);
        assert_eq!(messages[2].vector_as_chunk.len(), 8);
    }

    #[test]
    fn kind_mismatch_is_rejected() {
        let matrix =
            LogicalArray::from_f64(Shape::Matrix { rows: 1, cols: 2 }, &[1.0, 2.0]).unwrap();
        assert!(matches!(
            CallPlan::for_arrays(ArrayKind::Vectors, core::slice::from_ref(&matrix), 64),
            Err(Error::Protocol { .. })
        ));
    }

    #[tokio::test]
    async fn planned_vector_call_round_trips() {
        let arrays = vec![
            LogicalArray::from_f64(Shape::Vector(5), &[1.0, 2.0, 3.0, 4.0, 5.0]).unwrap(),
            LogicalArray::from_f64(Shape::Vector(3), &[-1.0, 0.5, 9.0]).unwrap(),
        ];
        let plan = CallPlan::for_arrays(ArrayKind::Vectors, &arrays, 16).unwrap();
        let metadata = plan.metadata();

        let mut inbound = stream::iter(
            plan.messages::<proto::Vector>(&arrays)
                .map(Ok)
                .collect::<Vec<_>>(),
        );
        let rebuilt = collect_arrays::<proto::Vector, _>(&metadata, &mut inbound)
            .await
            .unwrap();

        assert_eq!(rebuilt, arrays);
    }

    #[tokio::test]
    async fn planned_matrix_call_round_trips() {
        let shape = Shape::Matrix { rows: 3, cols: 4 };
        let values: Vec<i32> = (0..12).collect();
        let arrays = vec![LogicalArray::from_i32(shape, &values).unwrap()];
        // Budget of 9 bytes holds two i32 elements per chunk: 6 chunks.
        let plan = CallPlan::for_arrays(ArrayKind::Matrices, &arrays, 9).unwrap();
        assert_eq!(plan.total_chunks(), 6);

        let metadata = plan.metadata();
        let mut inbound = stream::iter(
            plan.messages::<proto::Matrix>(&arrays)
                .map(Ok)
                .collect::<Vec<_>>(),
        );
        let rebuilt = collect_arrays::<proto::Matrix, _>(&metadata, &mut inbound)
            .await
            .unwrap();

        assert_eq!(rebuilt, arrays);
        assert_eq!(rebuilt[0].to_i32().unwrap(), values);
    }

    #[tokio::test]
    async fn round_trip_across_budgets() {
        // Any budget of at least one element width must reproduce the
        // original buffer exactly.
        let values: Vec<f64> = (0..37).map(|i| i as f64 * 0.5).collect();
        let array = LogicalArray::from_f64(Shape::Vector(37), &values).unwrap();

        for chunk_bytes in [8, 9, 16, 24, 64, 512] {
            let plan = CallPlan::for_arrays(
                ArrayKind::Vectors,
                core::slice::from_ref(&array),
                chunk_bytes,
            )
            .unwrap();
            let metadata = plan.metadata();
            let mut inbound = stream::iter(
                plan.messages::<proto::Vector>(core::slice::from_ref(&array))
                    .map(Ok)
                    .collect::<Vec<_>>(),
            );
            let rebuilt = collect_arrays::<proto::Vector, _>(&metadata, &mut inbound)
                .await
                .unwrap();
            assert_eq!(rebuilt[0], array, "chunk_bytes={chunk_bytes}");
        }
    }
}
