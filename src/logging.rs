//! Tracing subscriber setup for the command-line tool.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Installs a stderr fmt subscriber. `RUST_LOG` wins over `level` when set
/// and valid.
pub fn init_tracing(level: &str) {
    let filter = std::env::var("RUST_LOG")
        .ok()
        .and_then(|_| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(level));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init();
}
