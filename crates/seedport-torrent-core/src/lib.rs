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

//! Daemon-agnostic torrent interfaces and DTOs.
//!
//! The download daemon stays the authority on transfer state; everything in
//! this crate is a read-only projection of what it reports, plus the small set
//! of lifecycle commands the service forwards to it.

pub mod error;
pub mod model;
pub mod service;

pub use error::{TorrentError, TorrentResult};
pub use model::{
    AddedTorrent, FileEntry, FilePriority, MAX_METAINFO_BYTES, TorrentId, TorrentSource,
    TorrentStatus, TorrentSummary, timestamp_from_epoch,
};
pub use service::{TorrentInspector, TorrentWorkflow};
