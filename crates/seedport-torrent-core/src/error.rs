//! Error types for torrent core services.

use std::error::Error;

use thiserror::Error;

use crate::model::TorrentId;

/// Primary error type for torrent operations.
#[derive(Debug, Error)]
pub enum TorrentError {
    /// The daemon could not be reached or refused to establish a session.
    #[error("torrent daemon unavailable")]
    Unavailable {
        /// Operation identifier.
        operation: &'static str,
        /// Underlying failure.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// The daemon answered with a non-success result string.
    #[error("torrent daemon rejected the request")]
    Daemon {
        /// Operation identifier.
        operation: &'static str,
        /// Result string reported verbatim by the daemon.
        result: String,
    },
    /// Torrent was not found.
    #[error("torrent not found")]
    NotFound {
        /// Missing torrent identifier.
        torrent_id: TorrentId,
    },
    /// Caller-supplied input was rejected before reaching the daemon.
    #[error("invalid torrent input")]
    InvalidInput {
        /// Input field that failed validation.
        field: &'static str,
        /// Machine-readable reason for the failure.
        reason: &'static str,
    },
    /// The daemon answered but the payload could not be interpreted.
    #[error("torrent operation failed")]
    OperationFailed {
        /// Operation identifier.
        operation: &'static str,
        /// Torrent identifier when available.
        torrent_id: Option<TorrentId>,
        /// Underlying failure.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
}

/// Convenience alias for torrent operation results.
pub type TorrentResult<T> = Result<T, TorrentError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn torrent_error_messages_are_constant() {
        let cases = [
            (
                TorrentError::Unavailable {
                    operation: "list",
                    source: Box::new(io::Error::other("refused")),
                },
                "torrent daemon unavailable",
            ),
            (
                TorrentError::Daemon {
                    operation: "add",
                    result: "duplicate torrent".to_string(),
                },
                "torrent daemon rejected the request",
            ),
            (TorrentError::NotFound { torrent_id: 7 }, "torrent not found"),
            (
                TorrentError::InvalidInput {
                    field: "magnet",
                    reason: "missing_scheme",
                },
                "invalid torrent input",
            ),
        ];
        for (err, message) in cases {
            assert_eq!(err.to_string(), message);
        }
    }

    #[test]
    fn operation_failed_exposes_source() {
        let err = TorrentError::OperationFailed {
            operation: "files",
            torrent_id: Some(3),
            source: Box::new(io::Error::other("decode")),
        };
        assert!(err.source().is_some());
    }
}
