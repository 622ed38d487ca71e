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

//! HTTP surface of the export service.
//!
//! Layout: `state.rs` (shared handles), `models.rs` (request and response
//! bodies), `error.rs` (server errors), `http/` (router, middleware and
//! handlers).

pub mod error;
pub mod http;
pub mod models;
pub mod state;

pub use error::ApiServerError;
pub use http::router::ApiServer;
pub use state::{ApiState, TorrentHandles};
