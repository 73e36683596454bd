//! Bounded worker pool for call processing.
//!
//! ## Structure
//!
//! - [`manager`] - round-robin dispatch and graceful shutdown.
//! - [`worker`] - per-worker event loop.

pub mod manager;
pub mod worker;
