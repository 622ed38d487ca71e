//! Error types for control-protocol calls.

use thiserror::Error;

/// Result alias for control-protocol operations.
pub type RpcResult<T> = Result<T, RpcError>;

/// Failures raised while talking to the daemon.
#[derive(Debug, Error)]
pub enum RpcError {
    /// The HTTP client could not be constructed.
    #[error("failed to build control-protocol client")]
    ClientBuild {
        /// Underlying client error.
        #[source]
        source: reqwest::Error,
    },
    /// The credential probe did not produce a rejection carrying a credential.
    #[error("daemon unreachable during session handshake")]
    HandshakeUnavailable {
        /// Endpoint that was probed.
        endpoint: String,
        /// Status returned by the probe, when one arrived.
        status: Option<u16>,
        /// Transport failure, when no response arrived.
        #[source]
        source: Option<reqwest::Error>,
    },
    /// The daemon rejected the credential twice in a row.
    #[error("daemon rejected session credential")]
    CredentialRejected {
        /// Control method being invoked.
        method: &'static str,
    },
    /// The request could not be delivered or the response not received.
    #[error("control-protocol transport failure")]
    Transport {
        /// Control method being invoked.
        method: &'static str,
        /// Underlying transport error.
        #[source]
        source: reqwest::Error,
    },
    /// The daemon answered with an unexpected HTTP status.
    #[error("control-protocol call returned unexpected status")]
    Status {
        /// Control method being invoked.
        method: &'static str,
        /// HTTP status code.
        status: u16,
    },
    /// The response body was not a valid envelope.
    #[error("control-protocol response could not be decoded")]
    Decode {
        /// Control method being invoked.
        method: &'static str,
        /// Underlying decode error.
        #[source]
        source: reqwest::Error,
    },
    /// The response arguments did not match the expected shape.
    #[error("control-protocol arguments had an unexpected shape")]
    Payload {
        /// Control method being invoked.
        method: &'static str,
        /// Underlying serde error.
        #[source]
        source: serde_json::Error,
    },
    /// The daemon reported a non-success result string.
    #[error("daemon reported a failure result")]
    Daemon {
        /// Control method being invoked.
        method: &'static str,
        /// Result string reported verbatim by the daemon.
        result: String,
    },
}

impl RpcError {
    /// Whether the failure means the daemon cannot currently be used at all.
    #[must_use]
    pub const fn is_unavailable(&self) -> bool {
        matches!(
            self,
            Self::HandshakeUnavailable { .. }
                | Self::CredentialRejected { .. }
                | Self::Transport { .. }
                | Self::Status { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn availability_classification() {
        assert!(
            RpcError::CredentialRejected {
                method: "torrent-get"
            }
            .is_unavailable()
        );
        assert!(
            RpcError::HandshakeUnavailable {
                endpoint: "http://localhost:9091".to_string(),
                status: Some(500),
                source: None,
            }
            .is_unavailable()
        );
        assert!(
            !RpcError::Daemon {
                method: "torrent-add",
                result: "duplicate torrent".to_string(),
            }
            .is_unavailable()
        );
    }

    #[test]
    fn messages_are_constant() {
        let err = RpcError::Status {
            method: "torrent-get",
            status: 500,
        };
        assert_eq!(
            err.to_string(),
            "control-protocol call returned unexpected status"
        );
    }
}
