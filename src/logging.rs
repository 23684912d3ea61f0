//! Logging setup.
//!
//! Diagnostics go through `tracing` to stderr so they never interleave with
//! the progress lines and stage summaries on stdout. The level is controlled
//! via the `PHOTARK_LOG` environment variable:
//! - `PHOTARK_LOG=debug` for verbose output
//! - `PHOTARK_LOG=info` for standard output (default)
//! - `PHOTARK_LOG=warn` for warnings and errors only

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub fn init() {
    let env_filter =
        EnvFilter::try_from_env("PHOTARK_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}
