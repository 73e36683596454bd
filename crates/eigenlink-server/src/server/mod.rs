//! Server internals: configuration, numeric dispatch, worker pool, and the
//! gRPC service surface.
//!
//! ## Structure
//!
//! - [`backend`] - numeric kernels over decoded arrays.
//! - [`config`] - CLI/env configuration and validation.
//! - [`dispatch`] - operand validation and operation routing.
//! - [`pool`] - bounded worker pool and per-worker event loop.
//! - [`service`] - gRPC service entry point (`ArrayOpsService`).
//! - [`streaming`] - per-call request types and the call processor.
//! - [`telemetry`] - tracing subscriber setup.

pub mod backend;
pub mod config;
pub mod dispatch;
pub mod pool;
pub mod service;
pub mod streaming;
pub mod telemetry;
