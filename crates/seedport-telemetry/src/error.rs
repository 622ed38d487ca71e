//! Error types for telemetry operations.

use prometheus::Error as PrometheusError;
use thiserror::Error;

/// Result alias for telemetry operations.
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Errors raised while installing the subscriber or driving the metrics registry.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// A global subscriber was already installed, or installation failed.
    #[error("failed to install tracing subscriber")]
    SubscriberInstall {
        /// Underlying subscriber error.
        #[source]
        source: tracing_subscriber::util::TryInitError,
    },
    /// A collector could not be built or registered.
    #[error("failed to register metrics collector")]
    MetricsRegister {
        /// Metric name tied to the failure.
        name: &'static str,
        /// Underlying Prometheus error.
        #[source]
        source: PrometheusError,
    },
    /// The registry could not be rendered in text exposition format.
    #[error("failed to render metrics")]
    MetricsRender {
        /// Underlying Prometheus error.
        #[source]
        source: PrometheusError,
    },
    /// Rendered exposition text was not UTF-8.
    #[error("rendered metrics were not valid utf-8")]
    MetricsUtf8 {
        /// Underlying conversion error.
        #[source]
        source: std::string::FromUtf8Error,
    },
}
