//! Per-call streaming pipeline.
//!
//! ## Structure
//!
//! - [`processor`] - reassemble, compute, and stream one call.
//! - [`request`] - call task and worker request types.

pub mod processor;
pub mod request;
