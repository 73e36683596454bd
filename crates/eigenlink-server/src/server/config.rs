use anyhow::bail;
use clap::Parser;
use eigenlink_core::DType;

/// Runtime configuration for the `eigenlink-server` binary.
///
/// These settings control the concurrency, buffering, and chunking behavior
/// of the array streaming service. All values are parsed from CLI arguments
/// or environment variables, with defaults suitable for a single-node
/// deployment.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "eigenlink-server",
    version,
    about = "A gRPC service for streaming chunked vector and matrix operations"
)]
pub struct CliArgs {
    /// Number of workers handling calls concurrently.
    ///
    /// Each inbound call is processed start-to-finish by a single worker;
    /// calls beyond this capacity queue on the workers' bounded channels.
    ///
    /// Environment variable: `NUM_WORKERS`
    #[arg(long, env = "NUM_WORKERS", default_value_t = 10)]
    pub num_workers: usize,

    /// Maximum payload bytes per chunk message, inbound and outbound.
    ///
    /// Response arrays larger than this are split into multiple messages.
    /// The default stays comfortably under gRPC's 4 MiB message limit. Must
    /// hold at least one element of the widest supported type.
    ///
    /// Environment variable: `CHUNK_BYTES`
    #[arg(long, env = "CHUNK_BYTES", default_value_t = 2 * 1024 * 1024)]
    pub chunk_bytes: usize,

    /// Maximum chunk messages a single call may declare, summed over its
    /// arrays.
    ///
    /// Enforced against the call's metadata before any payload is read, to
    /// bound the memory one call can pin.
    ///
    /// Environment variable: `MAX_CALL_CHUNKS`
    #[arg(long, env = "MAX_CALL_CHUNKS", default_value_t = 4096)]
    pub max_call_chunks: usize,

    /// Capacity of the response buffer between worker and gRPC stream.
    ///
    /// This affects how many response chunks can be buffered before the
    /// worker must wait for the client to consume more data. Lower values
    /// increase backpressure responsiveness; higher values enable deeper
    /// pipelining.
    ///
    /// Environment variable: `STREAM_BUFFER_SIZE`
    #[arg(long, env = "STREAM_BUFFER_SIZE", default_value_t = 8)]
    pub stream_buffer_size: usize,

    /// Address to listen on (TCP or Unix socket path; use --uds for Unix socket).
    ///
    /// Example: "0.0.0.0:50051" or "/tmp/eigenlink.sock"
    ///
    /// Environment variable: `SERVER_ADDR`
    #[arg(long, env = "SERVER_ADDR", default_value_t = String::from("0.0.0.0:50051"))]
    pub server_addr: String,

    /// Listen on a Unix socket instead of TCP. If set, `SERVER_ADDR` must be a file path.
    #[arg(short, long, default_value_t = false)]
    pub uds: bool,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub num_workers: usize,
    pub chunk_bytes: usize,
    pub max_call_chunks: usize,
    pub stream_buffer_size: usize,
    pub server_addr: String,
    pub uds: bool,
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.num_workers == 0 {
            bail!("NUM_WORKERS must be greater than 0");
        }

        // The chunk planner fails any call whose budget cannot hold one
        // element; catch that misconfiguration at startup instead.
        if args.chunk_bytes < DType::MAX_WIDTH {
            bail!(
                "CHUNK_BYTES ({}) cannot hold a single {}-byte element",
                args.chunk_bytes,
                DType::MAX_WIDTH
            );
        }

        if args.max_call_chunks == 0 {
            bail!("MAX_CALL_CHUNKS must be greater than 0");
        }

        if args.stream_buffer_size == 0 {
            bail!("STREAM_BUFFER_SIZE must be greater than 0");
        }

        Ok(Self {
            num_workers: args.num_workers,
            chunk_bytes: args.chunk_bytes,
            max_call_chunks: args.max_call_chunks,
            stream_buffer_size: args.stream_buffer_size,
            server_addr: args.server_addr,
            uds: args.uds,
        })
    }
}
