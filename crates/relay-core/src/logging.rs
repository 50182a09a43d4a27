//! Structured logging with `tracing`.
//!
//! Log context (identity, connection ID) travels on spans and event fields
//! rather than in formatted strings, so the output stays filterable.

use tracing_subscriber::EnvFilter;

/// Build the level filter. `RUST_LOG` takes precedence over `level`.
pub fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Initialize the global tracing subscriber with stderr output.
///
/// Call once at application startup. Subsequent calls are no-ops.
///
/// # Arguments
///
/// * `level` - Minimum log level to display, e.g. `"info"`.
pub fn init_subscriber(level: &str) {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter(level))
        .with_target(true)
        .with_writer(std::io::stderr)
        .compact();

    // set_global_default is a no-op if already set
    let _ = subscriber.try_init();
}
