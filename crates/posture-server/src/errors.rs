//! Server error types.

use thiserror::Error;

/// Failures that stop the server from starting or serving.
///
/// Per-frame and per-connection problems never surface here; they are
/// answered on the socket or logged by the connection's supervisor.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listening socket could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address that was requested.
        addr: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Other socket I/O.
    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The global metrics recorder could not be installed.
    #[error("failed to install metrics recorder: {0}")]
    Metrics(String),
}
