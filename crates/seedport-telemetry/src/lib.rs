#![forbid(unsafe_code)]
#![warn(
    unused,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]

//! Telemetry primitives shared across the Seedport workspace.
//!
//! Layout: `init.rs` (subscriber setup and build metadata), `context.rs`
//! (process span and request context), `layers.rs` (request-id middleware), `metrics.rs`
//! (Prometheus registry), `error.rs` (error type).

pub mod context;
pub mod error;
pub mod init;
pub mod layers;
pub mod metrics;

pub use context::{
    ProcessSpan, RequestContext, current_request, current_request_id, with_request_context,
};
pub use error::{Result, TelemetryError};
pub use init::{DEFAULT_LOG_LEVEL, LogFormat, LoggingConfig, build_sha, init_logging};
pub use layers::{REQUEST_ID_HEADER, request_id_layers};
pub use metrics::{Metrics, MetricsSnapshot};
