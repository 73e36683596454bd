//! Generates the gRPC bindings for `proto/eigenlink.proto`.
//!
//! The chunk payload fields (`Vector.vector_as_chunk` and
//! `Matrix.matrix_as_chunk`) are explicitly mapped to `bytes::Bytes` instead
//! of the default `Vec<u8>`. Chunk payloads are sliced out of a single
//! contiguous element buffer on the send side, and `Bytes` lets those slices
//! (and the decoded inbound payloads) move through the pipeline without
//! copying.
//!
//! A file descriptor set is also emitted so the server can register gRPC
//! reflection.

use std::env;
use std::path::PathBuf;

fn main() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    let descriptor_path = out_dir.join("eigenlink_descriptor.bin");

    let mut config = tonic_prost_build::Config::new();

    // Ensure packed element buffers are treated as `Bytes`, not `Vec<u8>`
    config
        .bytes([
            ".eigenlink.Vector.vector_as_chunk",
            ".eigenlink.Matrix.matrix_as_chunk",
        ])
        .file_descriptor_set_path(&descriptor_path);

    tonic_prost_build::configure()
        .compile_with_config(config, &["proto/eigenlink.proto"], &["proto"])
        .unwrap();
}
