//! Errors raised while hosting the HTTP server.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

/// Failures that stop the API server.
#[derive(Debug, Error)]
pub enum ApiServerError {
    /// The listener could not be bound.
    #[error("failed to bind api listener")]
    Bind {
        /// Address that was requested.
        addr: SocketAddr,
        /// Underlying IO error.
        source: io::Error,
    },
    /// The server loop terminated with an error.
    #[error("api server terminated unexpectedly")]
    Serve {
        /// Underlying IO error.
        source: io::Error,
    },
}
