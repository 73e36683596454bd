//! Error types for the array streaming service.
//!
//! This module defines the central `Error` enum covering every way a call can
//! fail, and implements `From<Error>` for `tonic::Status` so errors propagate
//! to gRPC clients with appropriate status codes.
//!
//! All variants are call-fatal: no partial result is ever returned, and none
//! are retried internally. The validation variants (`Protocol`,
//! `TypeMismatch`, `Shape`, `OperandCount`) are deterministic for a given
//! input stream and are surfaced before any arithmetic runs. `Transport`
//! depends on external I/O and maps to a distinct set of status codes so
//! callers can decide whether a retry makes sense.

use crate::common::types::{ArrayKind, DType, Operation, Shape};
use tonic::Status;

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for the array streaming service.
#[derive(Clone, thiserror::Error, Debug, PartialEq, Eq)]
pub enum Error {
    /// The chunk byte budget cannot hold even one element.
    #[error(
        "chunk budget of {chunk_bytes} bytes cannot hold a single {element_width}-byte element"
    )]
    Configuration {
        chunk_bytes: usize,
        element_width: usize,
    },

    /// The peer violated the wire contract (missing or malformed header
    /// entries, a chunk for an undeclared array, a ragged payload, ...).
    #[error("protocol violation: {detail}")]
    Protocol { detail: String },

    /// An array declared an element type different from the one established
    /// earlier in the same call.
    #[error(
        "array {array_index} has element type {found}, but this call already established {established}"
    )]
    TypeMismatch {
        array_index: usize,
        established: DType,
        found: DType,
    },

    /// A shape disagreement, either between a declared shape and the
    /// reassembled buffer or between operand shapes.
    #[error(transparent)]
    Shape(#[from] ShapeError),

    /// Wrong number of operands for the requested operation.
    #[error("{op} over {kind} expects {expected} operand(s), got {found}")]
    OperandCount {
        op: Operation,
        kind: ArrayKind,
        expected: usize,
        found: usize,
    },

    /// The underlying transport failed or was cancelled mid-call.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Internal channel send/receive failure between tasks or workers.
    #[error("channel error: {context}")]
    Channel { context: String },

    /// The service is in the process of shutting down.
    #[error("service is shutting down")]
    ServiceShutdown,

    /// The numeric backend rejected pre-validated operands. Should not occur.
    #[error("computation failed: {detail}")]
    Computation { detail: String },
}

/// Shape disagreements, with enough context to diagnose without string
/// parsing.
#[derive(Clone, thiserror::Error, Debug, PartialEq, Eq)]
pub enum ShapeError {
    /// A buffer does not hold the number of elements its shape declares.
    #[error("buffer holds {observed_elements} element(s), but shape {declared} declares {}", declared.element_count())]
    Buffer {
        declared: Shape,
        observed_elements: usize,
    },

    /// A reassembled array's element count disagrees with its declared shape.
    #[error(
        "array {array_index} reassembled to {observed_elements} element(s), but its declared shape {declared} requires {}", declared.element_count()
    )]
    Assembly {
        array_index: usize,
        declared: Shape,
        observed_elements: usize,
    },

    /// Operand shapes are incompatible for the requested operation.
    #[error("{op} over {kind} cannot combine shapes {left} and {right}")]
    Operands {
        op: Operation,
        kind: ArrayKind,
        left: Shape,
        right: Shape,
    },

    /// Matrix multiplication is restricted to square operands.
    #[error("matrix multiplication requires square operands, got {rows}x{cols}")]
    NotSquare { rows: usize, cols: usize },
}

/// Transport-level failures, distinguishable from validation errors.
#[derive(Clone, thiserror::Error, Debug, PartialEq, Eq)]
pub enum TransportError {
    /// The stream ended before the declared chunk count was consumed.
    #[error("stream ended after {received_chunks} of {expected_chunks} declared chunk(s)")]
    Truncated {
        expected_chunks: usize,
        received_chunks: usize,
    },

    /// The transport signalled an error or cancellation mid-stream.
    #[error("stream cancelled: {detail}")]
    Cancelled { detail: String },
}

impl From<Error> for Status {
    fn from(err: Error) -> Self {
        match err {
            Error::Configuration { .. } => Status::internal(err.to_string()),
            Error::Protocol { .. }
            | Error::TypeMismatch { .. }
            | Error::Shape(_)
            | Error::OperandCount { .. } => Status::invalid_argument(err.to_string()),
            Error::Transport(TransportError::Truncated { .. }) => Status::aborted(err.to_string()),
            Error::Transport(TransportError::Cancelled { .. }) => {
                Status::cancelled(err.to_string())
            }
            Error::Channel { .. } | Error::Computation { .. } => Status::internal(err.to_string()),
            Error::ServiceShutdown => Status::unavailable(err.to_string()),
        }
    }
}
