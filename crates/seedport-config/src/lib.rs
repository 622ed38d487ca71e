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

//! Environment-driven configuration for the export service.
//!
//! Layout: `model.rs` (typed settings), `loader.rs` (environment parsing and
//! validation), `defaults.rs` (fallback values), `error.rs` (error taxonomy).

pub mod defaults;
pub mod error;
pub mod loader;
pub mod model;

pub use error::{ConfigError, ConfigResult};
pub use model::{
    AppConfig, CompressionPolicy, DaemonSettings, EvictionSettings, ExportSettings, LogFormat,
    LoggingSettings,
};
