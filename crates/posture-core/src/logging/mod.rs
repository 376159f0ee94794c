//! `tracing` subscriber setup.
//!
//! The server logs through `tracing` macros with structured fields
//! (`conn_id`, `role`, `posture`, ...). The binary installs one of the
//! subscribers below at startup. Tests capture events with
//! `test_utils::capture_logs`, built under `cfg(test)` or the `test-utils`
//! feature.

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

use tracing_subscriber::EnvFilter;

/// Build the filter: `RUST_LOG` wins over the configured level.
fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Initialize the global subscriber with compact human-readable stderr output.
///
/// Subsequent calls are no-ops.
pub fn init_subscriber(level: &str) {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter(level))
        .with_target(true)
        .with_writer(std::io::stderr)
        .compact();

    // try_init fails if a global subscriber is already set
    let _ = subscriber.try_init();
}

/// Initialize the global subscriber with one JSON object per line on stderr.
///
/// Subsequent calls are no-ops.
pub fn init_json_subscriber(level: &str) {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter(level))
        .with_target(true)
        .with_writer(std::io::stderr)
        .json()
        .with_current_span(true);

    let _ = subscriber.try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_subscriber_does_not_panic() {
        // Multiple calls should be safe (no-op after first)
        init_subscriber("warn");
        init_subscriber("debug");
        init_json_subscriber("info");
    }
}
