//! Shared protocol definitions for the `eigenlink` array streaming service.
//!
//! The `common` module defines everything client and server must agree on:
//! the wire messages, the array data model, chunk planning, metadata header
//! handling, stream reassembly, and the error taxonomy.
//!
//! ## Submodules
//!
//! - [`error`] - Centralized error type used throughout call handling.
//! - [`types`] - Element types, shapes, and the [`LogicalArray`] buffer.
//! - [`chunk`] - Splits one array's element buffer into bounded chunks.
//! - [`metadata`] - Builds and parses the per-call metadata header map.
//! - [`reassemble`] - Reconstructs declared arrays from an inbound stream.
//! - [`respond`] - Plans and emits the outbound chunk message sequence.
//!
//! [`LogicalArray`]: types::LogicalArray

pub mod chunk;
pub mod error;
pub mod metadata;
pub mod reassemble;
pub mod respond;
pub mod types;

pub use chunk::ChunkPlan;
pub use error::{Error, Result, ShapeError, TransportError};
pub use metadata::CallMetadata;
pub use reassemble::{StreamSession, collect_arrays};
pub use respond::CallPlan;
pub use types::{ArrayKind, ChunkMessage, DType, LogicalArray, Operation, Shape};

/// gRPC service and message definitions generated from
/// `proto/eigenlink.proto`.
pub mod proto {
    tonic::include_proto!("eigenlink");
    pub const FILE_DESCRIPTOR_SET: &[u8] =
        tonic::include_file_descriptor_set!("eigenlink_descriptor");
}
