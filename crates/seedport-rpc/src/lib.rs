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

//! Client for the download daemon's JSON control protocol.
//!
//! Layout: `session.rs` (credential handshake and raw calls), `adapter.rs`
//! (typed torrent queries and commands), `wire.rs` (daemon payload shapes),
//! `error.rs` (error taxonomy).

pub mod adapter;
pub mod error;
pub mod session;
mod wire;

pub use adapter::{AdmissionDefaults, RpcTorrentService};
pub use error::{RpcError, RpcResult};
pub use session::{SESSION_HEADER, SessionClient};
