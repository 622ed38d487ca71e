//! Core torrent domain types and DTOs shared across the workspace.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{TorrentError, TorrentResult};

/// Identifier the daemon assigns to a torrent.
pub type TorrentId = i64;

/// Largest `.torrent` payload accepted for admission (10 MiB).
pub const MAX_METAINFO_BYTES: usize = 10 * 1024 * 1024;

/// Lifecycle state reported by the daemon.
///
/// Unrecognised codes map to [`TorrentStatus::Unknown`] so a daemon upgrade
/// that introduces new states does not break listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TorrentStatus {
    /// Torrent is paused.
    Stopped,
    /// Queued for a data check.
    CheckWait,
    /// Verifying local data.
    Checking,
    /// Queued for download.
    DownloadWait,
    /// Actively downloading.
    Downloading,
    /// Queued for seeding.
    SeedWait,
    /// Actively seeding.
    Seeding,
    /// Code not recognised by this build.
    Unknown,
}

impl TorrentStatus {
    /// Map the daemon's numeric status code.
    #[must_use]
    pub const fn from_code(code: i64) -> Self {
        match code {
            0 => Self::Stopped,
            1 => Self::CheckWait,
            2 => Self::Checking,
            3 => Self::DownloadWait,
            4 => Self::Downloading,
            5 => Self::SeedWait,
            6 => Self::Seeding,
            _ => Self::Unknown,
        }
    }

    /// Kebab-case identifier used on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::CheckWait => "check-wait",
            Self::Checking => "checking",
            Self::DownloadWait => "download-wait",
            Self::Downloading => "downloading",
            Self::SeedWait => "seed-wait",
            Self::Seeding => "seeding",
            Self::Unknown => "unknown",
        }
    }
}

/// Read-only projection of a torrent as reported by the daemon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TorrentSummary {
    /// Daemon-assigned identifier.
    pub id: TorrentId,
    /// Display name; also the top-level entry under `download_dir`.
    pub name: String,
    /// Info-hash as a hex string.
    pub hash: String,
    /// Total payload size in bytes.
    pub total_size: u64,
    /// Completion fraction in `0.0..=1.0`.
    pub percent_done: f64,
    /// Lifecycle state.
    pub status: TorrentStatus,
    /// Download rate in bytes per second.
    pub rate_download: u64,
    /// Upload rate in bytes per second.
    pub rate_upload: u64,
    /// Share ratio; negative values reported by the daemon are clamped to zero.
    pub upload_ratio: f64,
    /// Connected peers.
    pub peers_connected: u32,
    /// Peers we are downloading from.
    pub seeders: u32,
    /// Peers we are uploading to.
    pub leechers: u32,
    /// Seconds until completion, absent when the daemon cannot estimate.
    pub eta_secs: Option<u64>,
    /// Content root directory the daemon writes this torrent into.
    pub download_dir: PathBuf,
    /// Whether the daemon considers the torrent finished.
    pub is_finished: bool,
    /// Bytes wanted once selection is applied.
    pub size_when_done: u64,
    /// Bytes still missing.
    pub left_until_done: u64,
    /// Admission time.
    pub added_at: Option<DateTime<Utc>>,
    /// Last transfer activity.
    pub activity_at: Option<DateTime<Utc>>,
    /// Time the download completed.
    pub done_at: Option<DateTime<Utc>>,
}

impl TorrentSummary {
    /// Whether content may be exported given the configured minimum completion.
    #[must_use]
    pub fn is_exportable(&self, min_completion: f64) -> bool {
        self.is_finished || self.percent_done >= min_completion
    }

    /// Whether the torrent has reached its completion target.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.is_finished || self.percent_done >= 1.0
    }

    /// Absolute location of the torrent's payload on disk.
    #[must_use]
    pub fn content_path(&self) -> PathBuf {
        self.download_dir.join(&self.name)
    }
}

/// Daemon-side file priority.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilePriority {
    /// Low priority.
    Low,
    /// Default priority.
    #[default]
    Normal,
    /// High priority.
    High,
}

impl FilePriority {
    /// Map the daemon's numeric priority; anything out of range is treated as normal.
    #[must_use]
    pub const fn from_code(code: i64) -> Self {
        match code {
            -1 => Self::Low,
            1 => Self::High,
            _ => Self::Normal,
        }
    }
}

/// One entry of a torrent's file manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Position in the manifest.
    pub index: u32,
    /// Path relative to the torrent's download directory.
    pub name: String,
    /// File length in bytes.
    pub length: u64,
    /// Bytes written so far; never exceeds `length`.
    pub bytes_completed: u64,
    /// Whether the file is selected for download.
    pub wanted: bool,
    /// Download priority.
    pub priority: FilePriority,
}

impl FileEntry {
    /// Build an entry, clamping `bytes_completed` to `length`.
    #[must_use]
    pub fn new(
        index: u32,
        name: impl Into<String>,
        length: u64,
        bytes_completed: u64,
        wanted: bool,
        priority: FilePriority,
    ) -> Self {
        Self {
            index,
            name: name.into(),
            length,
            bytes_completed: bytes_completed.min(length),
            wanted,
            priority,
        }
    }

    /// Completion fraction, zero for empty files.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn progress(&self) -> f64 {
        if self.length == 0 {
            0.0
        } else {
            self.bytes_completed as f64 / self.length as f64
        }
    }

    /// Whether every byte of the file is on disk.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.bytes_completed >= self.length
    }
}

/// How a torrent should be handed to the daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TorrentSource {
    /// Magnet URI resolved by the daemon.
    Magnet {
        /// Magnet URI.
        uri: String,
    },
    /// Raw `.torrent` metainfo.
    Metainfo {
        /// Bencoded payload.
        bytes: Vec<u8>,
    },
}

impl TorrentSource {
    /// Validate and wrap a magnet URI.
    ///
    /// # Errors
    ///
    /// Returns [`TorrentError::InvalidInput`] when the value is not a magnet URI.
    pub fn magnet(uri: impl Into<String>) -> TorrentResult<Self> {
        let uri = uri.into();
        let trimmed = uri.trim();
        if !trimmed.starts_with("magnet:") {
            return Err(TorrentError::InvalidInput {
                field: "magnet",
                reason: "missing_scheme",
            });
        }
        Ok(Self::Magnet {
            uri: trimmed.to_string(),
        })
    }

    /// Validate and wrap metainfo bytes.
    ///
    /// # Errors
    ///
    /// Returns [`TorrentError::InvalidInput`] when the payload is empty or too large.
    pub fn metainfo(bytes: impl Into<Vec<u8>>) -> TorrentResult<Self> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(TorrentError::InvalidInput {
                field: "metainfo",
                reason: "empty",
            });
        }
        if bytes.len() > MAX_METAINFO_BYTES {
            return Err(TorrentError::InvalidInput {
                field: "metainfo",
                reason: "too_large",
            });
        }
        Ok(Self::Metainfo { bytes })
    }
}

/// Outcome of an admission request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddedTorrent {
    /// Identifier of the admitted (or already present) torrent.
    pub id: TorrentId,
    /// Display name.
    pub name: String,
    /// Info-hash.
    pub hash: String,
    /// True when the daemon already knew the torrent.
    pub duplicate: bool,
}

/// Convert a daemon epoch timestamp, treating zero and negative values as absent.
#[must_use]
pub fn timestamp_from_epoch(seconds: i64) -> Option<DateTime<Utc>> {
    if seconds <= 0 {
        None
    } else {
        DateTime::from_timestamp(seconds, 0)
    }
}
