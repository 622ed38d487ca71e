//! In-memory stand-in for the download daemon.

use std::collections::BTreeMap;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use seedport_torrent_core::{
    AddedTorrent, FileEntry, TorrentError, TorrentId, TorrentInspector, TorrentResult,
    TorrentSource, TorrentStatus, TorrentSummary, TorrentWorkflow,
};

/// Build a summary with sensible defaults for the fields tests rarely care about.
#[must_use]
pub fn summary(
    id: TorrentId,
    name: &str,
    download_dir: impl Into<PathBuf>,
    percent_done: f64,
    is_finished: bool,
) -> TorrentSummary {
    TorrentSummary {
        id,
        name: name.to_string(),
        hash: format!("{id:040x}"),
        total_size: 0,
        percent_done,
        status: if is_finished {
            TorrentStatus::Seeding
        } else {
            TorrentStatus::Downloading
        },
        rate_download: 0,
        rate_upload: 0,
        upload_ratio: 0.0,
        peers_connected: 0,
        seeders: 0,
        leechers: 0,
        eta_secs: None,
        download_dir: download_dir.into(),
        is_finished,
        size_when_done: 0,
        left_until_done: 0,
        added_at: None,
        activity_at: None,
        done_at: None,
    }
}

/// Command recorded by [`StubDaemon`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedCommand {
    /// A torrent was admitted.
    Add(TorrentSource),
    /// A torrent was removed.
    Remove {
        /// Target torrent.
        id: TorrentId,
        /// Whether payload deletion was requested.
        delete_data: bool,
    },
    /// A torrent was resumed.
    Start(TorrentId),
    /// A torrent was paused.
    Stop(TorrentId),
}

#[derive(Default)]
struct StubState {
    torrents: BTreeMap<TorrentId, TorrentSummary>,
    files: BTreeMap<TorrentId, Vec<FileEntry>>,
    commands: Vec<RecordedCommand>,
    unavailable: bool,
    next_result: Option<String>,
}

/// Cloneable in-memory daemon implementing both torrent traits.
#[derive(Clone, Default)]
pub struct StubDaemon {
    state: Arc<Mutex<StubState>>,
}

impl StubDaemon {
    /// Empty daemon.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a torrent and its manifest.
    #[must_use]
    pub fn with_torrent(self, torrent: TorrentSummary, files: Vec<FileEntry>) -> Self {
        {
            let mut state = self.lock();
            state.files.insert(torrent.id, files);
            state.torrents.insert(torrent.id, torrent);
        }
        self
    }

    /// Make every call fail as if the daemon were unreachable.
    #[must_use]
    pub fn unavailable(self) -> Self {
        self.lock().unavailable = true;
        self
    }

    /// Make the next command fail with the given daemon result string.
    pub fn reject_next(&self, result: &str) {
        self.lock().next_result = Some(result.to_string());
    }

    /// Commands received so far.
    #[must_use]
    pub fn commands(&self) -> Vec<RecordedCommand> {
        self.lock().commands.clone()
    }

    fn lock(&self) -> MutexGuard<'_, StubState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn guard(&self, operation: &'static str) -> TorrentResult<MutexGuard<'_, StubState>> {
        let mut state = self.lock();
        if state.unavailable {
            return Err(TorrentError::Unavailable {
                operation,
                source: Box::new(io::Error::from(io::ErrorKind::ConnectionRefused)),
            });
        }
        if let Some(result) = state.next_result.take() {
            return Err(TorrentError::Daemon { operation, result });
        }
        Ok(state)
    }
}

#[async_trait]
impl TorrentInspector for StubDaemon {
    async fn list(&self) -> TorrentResult<Vec<TorrentSummary>> {
        Ok(self.guard("list")?.torrents.values().cloned().collect())
    }

    async fn get(&self, id: TorrentId) -> TorrentResult<TorrentSummary> {
        self.guard("get")?
            .torrents
            .get(&id)
            .cloned()
            .ok_or(TorrentError::NotFound { torrent_id: id })
    }

    async fn files(&self, id: TorrentId) -> TorrentResult<Vec<FileEntry>> {
        self.guard("files")?
            .files
            .get(&id)
            .cloned()
            .ok_or(TorrentError::NotFound { torrent_id: id })
    }
}

#[async_trait]
impl TorrentWorkflow for StubDaemon {
    async fn add(&self, source: TorrentSource) -> TorrentResult<AddedTorrent> {
        let mut state = self.guard("add")?;
        let id = state.torrents.keys().next_back().map_or(1, |last| last + 1);
        state.commands.push(RecordedCommand::Add(source));
        Ok(AddedTorrent {
            id,
            name: format!("torrent-{id}"),
            hash: format!("{id:040x}"),
            duplicate: false,
        })
    }

    async fn remove(&self, id: TorrentId, delete_data: bool) -> TorrentResult<()> {
        let mut state = self.guard("remove")?;
        state.torrents.remove(&id);
        state.files.remove(&id);
        state
            .commands
            .push(RecordedCommand::Remove { id, delete_data });
        Ok(())
    }

    async fn start(&self, id: TorrentId) -> TorrentResult<()> {
        self.guard("start")?.commands.push(RecordedCommand::Start(id));
        Ok(())
    }

    async fn stop(&self, id: TorrentId) -> TorrentResult<()> {
        self.guard("stop")?.commands.push(RecordedCommand::Stop(id));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stub_serves_registered_torrents() -> anyhow::Result<()> {
        let daemon = StubDaemon::new().with_torrent(summary(1, "Show", "/data", 1.0, true), Vec::new());
        assert_eq!(daemon.list().await?.len(), 1);
        assert!(matches!(
            daemon.get(2).await,
            Err(TorrentError::NotFound { torrent_id: 2 })
        ));

        daemon.reject_next("duplicate torrent");
        assert!(matches!(daemon.stop(1).await, Err(TorrentError::Daemon { .. })));
        daemon.stop(1).await?;
        assert_eq!(daemon.commands(), vec![RecordedCommand::Stop(1)]);
        Ok(())
    }

    #[tokio::test]
    async fn unavailable_stub_fails_every_call() {
        let daemon = StubDaemon::new().unavailable();
        assert!(matches!(
            daemon.list().await,
            Err(TorrentError::Unavailable { .. })
        ));
    }
}
