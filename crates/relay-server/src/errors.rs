//! Server startup errors.

use thiserror::Error;

/// Errors raised while bringing the server up.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listen address could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address that was requested.
        addr: String,
        /// Underlying socket error.
        #[source]
        source: std::io::Error,
    },
    /// The bound listener could not report its local address.
    #[error("failed to read local address: {0}")]
    LocalAddr(#[source] std::io::Error),
}
