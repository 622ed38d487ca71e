//! Request and response bodies.

use seedport_config::CompressionPolicy;
use seedport_fsops::{DiskUsageSample, EvictionReport};
use seedport_torrent_core::FileEntry;
use serde::{Deserialize, Serialize};

/// RFC 9457 problem document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProblemDetails {
    /// Problem type URI.
    #[serde(rename = "type")]
    pub kind: String,
    /// Short summary of the problem type.
    pub title: String,
    /// HTTP status code.
    pub status: u16,
    /// Occurrence-specific explanation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Parameters that failed validation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invalid_params: Option<Vec<ProblemInvalidParam>>,
}

/// Invalid parameter pointer surfaced alongside a [`ProblemDetails`] payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProblemInvalidParam {
    /// JSON pointer to the offending field.
    pub pointer: String,
    /// Why the value was rejected.
    pub message: String,
}

/// Body of `POST /v1/torrents`; exactly one source must be present.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AddTorrentRequest {
    /// Magnet URI.
    pub magnet: Option<String>,
    /// Base64-encoded `.torrent` metainfo.
    pub metainfo: Option<String>,
}

/// Lifecycle action requested for a torrent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TorrentAction {
    /// Stop transferring.
    Pause,
    /// Resume transferring.
    Resume,
}

/// Body of `POST /v1/torrents/{id}/action`.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct TorrentActionRequest {
    /// Requested action.
    pub action: TorrentAction,
}

/// Query of `DELETE /v1/torrents/{id}`.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct DeleteQuery {
    /// Also delete downloaded payload.
    #[serde(default)]
    pub delete_data: bool,
}

/// Query of the export routes.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ExportQuery {
    /// Overrides the configured archive compression.
    pub compression: Option<CompressionPolicy>,
}

/// One manifest entry with its derived progress.
#[derive(Debug, Clone, Serialize)]
pub struct FileView {
    /// Manifest entry as reported by the daemon.
    #[serde(flatten)]
    pub entry: FileEntry,
    /// Downloaded fraction of this file.
    pub progress: f64,
}

impl From<FileEntry> for FileView {
    fn from(entry: FileEntry) -> Self {
        Self {
            progress: entry.progress(),
            entry,
        }
    }
}

/// Body of `GET /health`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always `ok` when the process is serving.
    pub status: &'static str,
    /// Build identifier.
    pub build: String,
}

/// Body of `GET /v1/storage`.
#[derive(Debug, Clone, Serialize)]
pub struct StorageResponse {
    /// Fresh usage sample of the content root.
    #[serde(flatten)]
    pub usage: DiskUsageSample,
    /// Usage above which payload is evicted.
    pub threshold_percent: f64,
}

/// Body of `POST /v1/cleanup`.
#[derive(Debug, Clone, Serialize)]
pub struct CleanupResponse {
    /// Usage after the run, when it could be sampled.
    pub usage_percent: Option<f64>,
    /// What the run did.
    pub report: EvictionReport,
}
