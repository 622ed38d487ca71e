//! # Design
//!
//! - Centralize bootstrap errors behind one type returned from `main`.
//! - Keep messages constant; the failing step travels in `operation`.

use thiserror::Error;

/// Result alias for application operations.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration could not be loaded.
    #[error("configuration operation failed")]
    Config {
        /// Operation identifier.
        operation: &'static str,
        /// Source configuration error.
        source: seedport_config::ConfigError,
    },
    /// Telemetry could not be initialised.
    #[error("telemetry operation failed")]
    Telemetry {
        /// Operation identifier.
        operation: &'static str,
        /// Source telemetry error.
        source: seedport_telemetry::TelemetryError,
    },
    /// The daemon client could not be constructed.
    #[error("daemon client operation failed")]
    Rpc {
        /// Operation identifier.
        operation: &'static str,
        /// Source control-protocol error.
        source: seedport_rpc::RpcError,
    },
    /// The HTTP listener failed.
    #[error("api server operation failed")]
    ApiServer {
        /// Operation identifier.
        operation: &'static str,
        /// Source API server error.
        source: seedport_api::ApiServerError,
    },
}

impl AppError {
    pub(crate) const fn config(
        operation: &'static str,
        source: seedport_config::ConfigError,
    ) -> Self {
        Self::Config { operation, source }
    }

    pub(crate) const fn telemetry(
        operation: &'static str,
        source: seedport_telemetry::TelemetryError,
    ) -> Self {
        Self::Telemetry { operation, source }
    }

    pub(crate) const fn rpc(operation: &'static str, source: seedport_rpc::RpcError) -> Self {
        Self::Rpc { operation, source }
    }

    pub(crate) const fn api_server(
        operation: &'static str,
        source: seedport_api::ApiServerError,
    ) -> Self {
        Self::ApiServer { operation, source }
    }
}
