//! Tracing subscriber setup.
//!
//! Spans and events are printed to the console via `tracing_subscriber::fmt`.
//! The filter is taken from `RUST_LOG` when set and defaults to `info`.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

pub fn init_telemetry() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_thread_ids(true)
                .with_line_number(true)
                .with_target(false)
                .with_file(true)
                .pretty(),
        )
        .try_init()?;
    Ok(())
}
