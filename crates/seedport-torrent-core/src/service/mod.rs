//! Query and workflow traits implemented by daemon adapters.

use async_trait::async_trait;

use crate::error::TorrentResult;
use crate::model::{AddedTorrent, FileEntry, TorrentId, TorrentSource, TorrentSummary};

/// Read-only view over the daemon's torrent state.
#[async_trait]
pub trait TorrentInspector: Send + Sync {
    /// List every torrent the daemon knows about.
    async fn list(&self) -> TorrentResult<Vec<TorrentSummary>>;

    /// Fetch a single torrent, failing with `NotFound` when the id is unknown.
    async fn get(&self, id: TorrentId) -> TorrentResult<TorrentSummary>;

    /// Fetch the file manifest of a torrent.
    async fn files(&self, id: TorrentId) -> TorrentResult<Vec<FileEntry>>;
}

/// Lifecycle commands forwarded to the daemon.
#[async_trait]
pub trait TorrentWorkflow: Send + Sync {
    /// Admit a torrent; a duplicate reports the existing one.
    async fn add(&self, source: TorrentSource) -> TorrentResult<AddedTorrent>;

    /// Remove a torrent, optionally deleting its payload.
    async fn remove(&self, id: TorrentId, delete_data: bool) -> TorrentResult<()>;

    /// Resume transfer.
    async fn start(&self, id: TorrentId) -> TorrentResult<()>;

    /// Pause transfer.
    async fn stop(&self, id: TorrentId) -> TorrentResult<()>;
}
