//! Typed torrent queries and commands layered over [`SessionClient`].

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use seedport_torrent_core::{
    AddedTorrent, FileEntry, TorrentError, TorrentId, TorrentInspector, TorrentResult,
    TorrentSource, TorrentSummary, TorrentWorkflow,
};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::error::RpcError;
use crate::session::SessionClient;
use crate::wire::{FILE_FIELDS, SUMMARY_FIELDS, TorrentList, WireAdded, WireManifest, WireTorrent};

/// Options applied to every admission.
#[derive(Debug, Clone)]
pub struct AdmissionDefaults {
    /// Directory the daemon should write new payloads into.
    pub download_dir: PathBuf,
    /// Per-torrent peer cap.
    pub peer_limit: u32,
    /// Daemon bandwidth priority (`-1` low, `0` normal, `1` high).
    pub bandwidth_priority: i8,
}

impl AdmissionDefaults {
    /// Defaults for a given content root: unpaused, 200 peers, high priority.
    #[must_use]
    pub fn for_content_root(download_dir: impl Into<PathBuf>) -> Self {
        Self {
            download_dir: download_dir.into(),
            peer_limit: 200,
            bandwidth_priority: 1,
        }
    }
}

/// [`TorrentInspector`] and [`TorrentWorkflow`] backed by the daemon's control protocol.
#[derive(Clone)]
pub struct RpcTorrentService {
    session: Arc<SessionClient>,
    admission: AdmissionDefaults,
}

impl RpcTorrentService {
    /// Wrap a session client.
    #[must_use]
    pub const fn new(session: Arc<SessionClient>, admission: AdmissionDefaults) -> Self {
        Self { session, admission }
    }

    async fn fetch<T>(
        &self,
        operation: &'static str,
        ids: Option<TorrentId>,
        fields: &[&str],
    ) -> TorrentResult<Vec<T>>
    where
        T: DeserializeOwned,
    {
        let mut arguments = json!({ "fields": fields });
        if let Some(id) = ids {
            arguments["ids"] = json!([id]);
        }
        let payload = self
            .session
            .call("torrent-get", arguments)
            .await
            .map_err(|err| map_rpc_error(operation, ids, err))?;
        let list: TorrentList<T> = parse(operation, ids, payload)?;
        Ok(list.torrents)
    }

    async fn command(
        &self,
        operation: &'static str,
        method: &'static str,
        id: TorrentId,
        extra: Option<(&str, Value)>,
    ) -> TorrentResult<()> {
        let mut arguments = json!({ "ids": [id] });
        if let Some((key, value)) = extra {
            arguments[key] = value;
        }
        self.session
            .call(method, arguments)
            .await
            .map(|_| ())
            .map_err(|err| map_rpc_error(operation, Some(id), err))
    }
}

#[async_trait]
impl TorrentInspector for RpcTorrentService {
    async fn list(&self) -> TorrentResult<Vec<TorrentSummary>> {
        let torrents: Vec<WireTorrent> = self.fetch("list", None, SUMMARY_FIELDS).await?;
        Ok(torrents.into_iter().map(TorrentSummary::from).collect())
    }

    async fn get(&self, id: TorrentId) -> TorrentResult<TorrentSummary> {
        let torrents: Vec<WireTorrent> = self.fetch("get", Some(id), SUMMARY_FIELDS).await?;
        torrents
            .into_iter()
            .next()
            .map(TorrentSummary::from)
            .ok_or(TorrentError::NotFound { torrent_id: id })
    }

    async fn files(&self, id: TorrentId) -> TorrentResult<Vec<FileEntry>> {
        let manifests: Vec<WireManifest> = self.fetch("files", Some(id), FILE_FIELDS).await?;
        manifests
            .into_iter()
            .next()
            .map(WireManifest::into_entries)
            .ok_or(TorrentError::NotFound { torrent_id: id })
    }
}

#[async_trait]
impl TorrentWorkflow for RpcTorrentService {
    async fn add(&self, source: TorrentSource) -> TorrentResult<AddedTorrent> {
        let mut arguments = json!({
            "download-dir": self.admission.download_dir.to_string_lossy(),
            "paused": false,
            "peer-limit": self.admission.peer_limit,
            "bandwidth-priority": self.admission.bandwidth_priority,
        });
        let from_metainfo = matches!(source, TorrentSource::Metainfo { .. });
        match source {
            TorrentSource::Magnet { uri } => arguments["filename"] = Value::String(uri),
            TorrentSource::Metainfo { bytes } => {
                arguments["metainfo"] = Value::String(STANDARD.encode(bytes));
            }
        }

        let mut payload = self
            .session
            .call("torrent-add", arguments)
            .await
            .map_err(|err| map_rpc_error("add", None, err))?;
        let admitted = payload.get_mut("torrent-added").map(Value::take);
        let (entry, duplicate) = match admitted {
            Some(entry) => (entry, false),
            None => (
                payload
                    .get_mut("torrent-duplicate")
                    .map(Value::take)
                    .unwrap_or(Value::Null),
                true,
            ),
        };
        let added: WireAdded = parse("add", None, entry)?;
        let added = added.into_added(duplicate);
        info!(
            torrent_id = added.id,
            name = %added.name,
            duplicate,
            "torrent admitted"
        );

        // Metainfo admissions can land queued; nudge the daemon to begin.
        if from_metainfo && !duplicate {
            if let Err(err) = self.start(added.id).await {
                warn!(torrent_id = added.id, error = %err, "failed to start admitted torrent");
            }
        }
        Ok(added)
    }

    async fn remove(&self, id: TorrentId, delete_data: bool) -> TorrentResult<()> {
        self.command(
            "remove",
            "torrent-remove",
            id,
            Some(("delete-local-data", Value::Bool(delete_data))),
        )
        .await?;
        info!(torrent_id = id, delete_data, "torrent removed");
        Ok(())
    }

    async fn start(&self, id: TorrentId) -> TorrentResult<()> {
        self.command("start", "torrent-start", id, None).await
    }

    async fn stop(&self, id: TorrentId) -> TorrentResult<()> {
        self.command("stop", "torrent-stop", id, None).await
    }
}

fn parse<T>(operation: &'static str, id: Option<TorrentId>, payload: Value) -> TorrentResult<T>
where
    T: DeserializeOwned,
{
    serde_json::from_value(payload).map_err(|source| TorrentError::OperationFailed {
        operation,
        torrent_id: id,
        source: Box::new(source),
    })
}

fn map_rpc_error(operation: &'static str, id: Option<TorrentId>, err: RpcError) -> TorrentError {
    match err {
        RpcError::Daemon { result, .. } => TorrentError::Daemon { operation, result },
        err if err.is_unavailable() => TorrentError::Unavailable {
            operation,
            source: Box::new(err),
        },
        err => TorrentError::OperationFailed {
            operation,
            torrent_id: id,
            source: Box::new(err),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SESSION_HEADER;
    use anyhow::Result;
    use httpmock::prelude::*;
    use seedport_config::DaemonSettings;
    use seedport_torrent_core::TorrentStatus;
    use std::time::Duration;
    use url::Url;

    const RPC_PATH: &str = "/transmission/rpc";

    fn service_for(server: &MockServer) -> Result<RpcTorrentService> {
        server.mock(|when, then| {
            when.method(POST)
                .path(RPC_PATH)
                .header_missing(SESSION_HEADER);
            then.status(409).header(SESSION_HEADER, "token");
        });
        let settings = DaemonSettings {
            rpc_url: Url::parse(&server.url(RPC_PATH))?,
            username: None,
            password: None,
            timeout: Duration::from_secs(5),
            state_dir: None,
        };
        Ok(RpcTorrentService::new(
            Arc::new(SessionClient::new(&settings)?),
            AdmissionDefaults::for_content_root("/data"),
        ))
    }

    #[tokio::test]
    async fn list_maps_summaries() -> Result<()> {
        let server = MockServer::start_async().await;
        let service = service_for(&server)?;
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path(RPC_PATH)
                .header(SESSION_HEADER, "token")
                .body_includes("torrent-get")
                .body_includes("hashString");
            then.status(200).json_body(serde_json::json!({
                "result": "success",
                "arguments": {"torrents": [
                    {"id": 1, "name": "Show", "status": 6, "percentDone": 1.0, "isFinished": true, "downloadDir": "/data"},
                    {"id": 2, "name": "Film", "status": 4, "percentDone": 0.25, "downloadDir": "/data"}
                ]}
            }));
        });

        let torrents = service.list().await?;
        assert_eq!(torrents.len(), 2);
        assert_eq!(torrents[0].status, TorrentStatus::Seeding);
        assert!(torrents[0].is_exportable(0.9));
        assert!(!torrents[1].is_exportable(0.9));
        mock.assert();
        Ok(())
    }

    #[tokio::test]
    async fn get_unknown_torrent_is_not_found() -> Result<()> {
        let server = MockServer::start_async().await;
        let service = service_for(&server)?;
        server.mock(|when, then| {
            when.method(POST)
                .path(RPC_PATH)
                .header(SESSION_HEADER, "token");
            then.status(200)
                .json_body(serde_json::json!({"result": "success", "arguments": {"torrents": []}}));
        });

        let result = service.get(99).await;
        assert!(matches!(
            result,
            Err(TorrentError::NotFound { torrent_id: 99 })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn files_request_only_manifest_fields() -> Result<()> {
        let server = MockServer::start_async().await;
        let service = service_for(&server)?;
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path(RPC_PATH)
                .header(SESSION_HEADER, "token")
                .body_includes("fileStats")
                .body_excludes("hashString");
            then.status(200).json_body(serde_json::json!({
                "result": "success",
                "arguments": {"torrents": [{
                    "id": 1,
                    "files": [{"name": "Show/a.mkv", "length": 10, "bytesCompleted": 5}],
                    "fileStats": [{"bytesCompleted": 5, "wanted": true, "priority": 0}]
                }]}
            }));
        });

        let files = service.files(1).await?;
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name, "Show/a.mkv");
        assert!((files[0].progress() - 0.5).abs() < f64::EPSILON);
        mock.assert();
        Ok(())
    }

    #[tokio::test]
    async fn add_magnet_reports_duplicates() -> Result<()> {
        let server = MockServer::start_async().await;
        let service = service_for(&server)?;
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path(RPC_PATH)
                .header(SESSION_HEADER, "token")
                .body_includes("torrent-add")
                .body_includes("magnet:?xt=urn:btih:abc")
                .body_includes("\"peer-limit\":200");
            then.status(200).json_body(serde_json::json!({
                "result": "success",
                "arguments": {"torrent-duplicate": {"id": 5, "name": "Show", "hashString": "abc"}}
            }));
        });

        let added = service
            .add(TorrentSource::magnet("magnet:?xt=urn:btih:abc")?)
            .await?;
        assert_eq!(added.id, 5);
        assert!(added.duplicate);
        mock.assert();
        Ok(())
    }

    #[tokio::test]
    async fn add_metainfo_encodes_payload_and_starts_torrent() -> Result<()> {
        let server = MockServer::start_async().await;
        let service = service_for(&server)?;
        let add = server.mock(|when, then| {
            when.method(POST)
                .path(RPC_PATH)
                .header(SESSION_HEADER, "token")
                .body_includes("torrent-add")
                .body_includes("ZDQ6aW5mb2Vl");
            then.status(200).json_body(serde_json::json!({
                "result": "success",
                "arguments": {"torrent-added": {"id": 9, "name": "Film", "hashString": "def"}}
            }));
        });
        let start = server.mock(|when, then| {
            when.method(POST)
                .path(RPC_PATH)
                .header(SESSION_HEADER, "token")
                .body_includes("torrent-start");
            then.status(200)
                .json_body(serde_json::json!({"result": "success", "arguments": {}}));
        });

        let added = service
            .add(TorrentSource::metainfo(b"d4:infoee".to_vec())?)
            .await?;
        assert_eq!(added.id, 9);
        assert!(!added.duplicate);
        add.assert();
        start.assert();
        Ok(())
    }

    #[tokio::test]
    async fn daemon_rejection_surfaces_result_string() -> Result<()> {
        let server = MockServer::start_async().await;
        let service = service_for(&server)?;
        server.mock(|when, then| {
            when.method(POST)
                .path(RPC_PATH)
                .header(SESSION_HEADER, "token");
            then.status(200)
                .json_body(serde_json::json!({"result": "invalid or corrupt torrent file"}));
        });

        let result = service.remove(3, true).await;
        match result {
            Err(TorrentError::Daemon { operation, result }) => {
                assert_eq!(operation, "remove");
                assert_eq!(result, "invalid or corrupt torrent file");
            }
            other => panic!("unexpected result: {other:?}"),
        }
        Ok(())
    }

    #[tokio::test]
    async fn remove_forwards_delete_flag() -> Result<()> {
        let server = MockServer::start_async().await;
        let service = service_for(&server)?;
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path(RPC_PATH)
                .header(SESSION_HEADER, "token")
                .body_includes("torrent-remove")
                .body_includes("\"delete-local-data\":true");
            then.status(200)
                .json_body(serde_json::json!({"result": "success", "arguments": {}}));
        });

        service.remove(3, true).await?;
        mock.assert();
        Ok(())
    }
}
