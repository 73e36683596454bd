//! Reassembly of declared arrays from an inbound chunk stream.
//!
//! [`StreamSession`] is the per-call reassembly state machine: it walks the
//! declared arrays outer-to-inner, consuming exactly the declared number of
//! chunk messages per array and concatenating their payloads into one
//! contiguous buffer. It is synchronous and transport-free, which keeps the
//! sequencing contract unit-testable; [`collect_arrays`] drives it from any
//! message stream (`tonic::Streaming` included) and translates stream
//! exhaustion and transport errors into [`TransportError`]s.
//!
//! A session is exclusively owned by the worker handling its call and is
//! dropped when the call ends, whatever the outcome.

use crate::common::error::{Error, Result, ShapeError, TransportError};
use crate::common::metadata::CallMetadata;
use crate::common::types::{ChunkMessage, DType, LogicalArray, Shape};
use bytes::BytesMut;
use futures::{Stream, StreamExt};
use tonic::Status;

/// Per-call reassembly state.
///
/// Chunk `k` of an array is always its `k`-th contiguous slice, and array
/// `i + 1` is never started before array `i` is fully consumed; the session
/// enforces both by construction. The element type established by the first
/// array binds every later array in the call.
#[derive(Debug)]
pub struct StreamSession {
    chunks_per_array: Vec<usize>,
    array_index: usize,
    chunk_index: usize,
    received_chunks: usize,
    established: Option<DType>,
    current: Option<InProgress>,
    completed: Vec<LogicalArray>,
}

/// The array currently being accumulated. Exists exactly between an array's
/// first chunk and its last.
#[derive(Debug)]
struct InProgress {
    dtype: DType,
    shape: Shape,
    buffer: BytesMut,
}

impl StreamSession {
    pub fn new(metadata: &CallMetadata) -> Self {
        let chunks_per_array: Vec<usize> = (0..metadata.array_count())
            .map(|i| metadata.chunks_for(i))
            .collect();
        let array_count = chunks_per_array.len();
        Self {
            chunks_per_array,
            array_index: 0,
            chunk_index: 0,
            received_chunks: 0,
            established: None,
            current: None,
            completed: Vec::with_capacity(array_count),
        }
    }

    /// Whether every declared array has been fully reassembled.
    pub fn is_complete(&self) -> bool {
        self.array_index == self.chunks_per_array.len()
    }

    /// Declared chunk count summed over all arrays.
    pub fn expected_chunks(&self) -> usize {
        self.chunks_per_array.iter().sum()
    }

    /// Chunk messages accepted so far.
    pub const fn received_chunks(&self) -> usize {
        self.received_chunks
    }

    /// Feeds the next chunk message, in arrival order.
    pub fn accept<M: ChunkMessage>(&mut self, msg: M) -> Result<()> {
        if self.is_complete() {
            return Err(Error::Protocol {
                detail: "chunk arrived after all declared arrays were completed".to_string(),
            });
        }

        // The in-progress state is taken out for the duration of the chunk
        // and only put back if the array is still incomplete.
        let mut current = match self.current.take() {
            Some(state) => state,
            None => self.begin_array(&msg)?,
        };

        let payload = msg.into_payload();
        if payload.len() % current.dtype.width() != 0 {
            return Err(Error::Protocol {
                detail: format!(
                    "array {} chunk {} carries {} bytes, not a whole number of {}-byte elements",
                    self.array_index,
                    self.chunk_index,
                    payload.len(),
                    current.dtype.width()
                ),
            });
        }

        current.buffer.extend_from_slice(&payload);
        self.chunk_index += 1;
        self.received_chunks += 1;

        if self.chunk_index == self.chunks_per_array[self.array_index] {
            self.finish_array(current)?;
        } else {
            self.current = Some(current);
        }
        Ok(())
    }

    /// Starts a new array from its first chunk, enforcing the call-wide
    /// element type and a non-empty declared shape.
    fn begin_array<M: ChunkMessage>(&mut self, msg: &M) -> Result<InProgress> {
        let dtype = msg.dtype()?;
        match self.established {
            Some(established) if established != dtype => {
                return Err(Error::TypeMismatch {
                    array_index: self.array_index,
                    established,
                    found: dtype,
                });
            }
            Some(_) => {}
            None => self.established = Some(dtype),
        }

        let shape = msg.declared_shape();
        if shape.element_count() == 0 {
            return Err(Error::Protocol {
                detail: format!("array {} declares empty shape {shape}", self.array_index),
            });
        }

        Ok(InProgress {
            dtype,
            shape,
            buffer: BytesMut::new(),
        })
    }

    /// Verifies the accumulated buffer against the declared shape and closes
    /// out the current array.
    fn finish_array(&mut self, current: InProgress) -> Result<()> {
        let observed_elements = current.buffer.len() / current.dtype.width();
        if observed_elements != current.shape.element_count() {
            return Err(ShapeError::Assembly {
                array_index: self.array_index,
                declared: current.shape,
                observed_elements,
            }
            .into());
        }

        let data = current.buffer.freeze();
        self.completed
            .push(LogicalArray::new(current.dtype, current.shape, data)?);

        self.array_index += 1;
        self.chunk_index = 0;
        Ok(())
    }

    /// Consumes the session, yielding the reassembled arrays in call order.
    pub fn finish(self) -> Result<Vec<LogicalArray>> {
        if !self.is_complete() {
            return Err(TransportError::Truncated {
                expected_chunks: self.expected_chunks(),
                received_chunks: self.received_chunks,
            }
            .into());
        }
        Ok(self.completed)
    }
}

/// Reassembles every array a call's metadata declares from its message
/// stream.
///
/// Reads are strictly sequential: each message is awaited in turn until the
/// declared total is consumed, the transport errs, or the stream ends early.
/// The latter two surface as [`TransportError`]s so callers can tell a
/// transport fault apart from a malformed but complete call.
pub async fn collect_arrays<M, S>(
    metadata: &CallMetadata,
    stream: &mut S,
) -> Result<Vec<LogicalArray>>
where
    M: ChunkMessage,
    S: Stream<Item = core::result::Result<M, Status>> + Unpin,
{
    let mut session = StreamSession::new(metadata);

    while !session.is_complete() {
        match stream.next().await {
            Some(Ok(msg)) => session.accept(msg)?,
            Some(Err(status)) => {
                return Err(TransportError::Cancelled {
                    detail: status.message().to_string(),
                }
                .into());
            }
            None => {
                return Err(TransportError::Truncated {
                    expected_chunks: session.expected_chunks(),
                    received_chunks: session.received_chunks(),
                }
                .into());
            }
        }
    }

    session.finish()
}
