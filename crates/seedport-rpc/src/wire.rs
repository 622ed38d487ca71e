//! Daemon payload shapes and their conversion into domain models.

use std::path::PathBuf;

use seedport_torrent_core::{
    AddedTorrent, FileEntry, FilePriority, TorrentStatus, TorrentSummary, timestamp_from_epoch,
};
use serde::Deserialize;

/// Fields requested for summaries; the manifest fields are left out on purpose.
pub(crate) const SUMMARY_FIELDS: &[&str] = &[
    "id",
    "name",
    "hashString",
    "totalSize",
    "percentDone",
    "status",
    "rateDownload",
    "rateUpload",
    "uploadRatio",
    "eta",
    "downloadDir",
    "isFinished",
    "addedDate",
    "activityDate",
    "doneDate",
    "peersConnected",
    "peersGettingFromUs",
    "peersSendingToUs",
    "sizeWhenDone",
    "leftUntilDone",
];

/// Fields requested for file manifests.
pub(crate) const FILE_FIELDS: &[&str] = &["id", "files", "fileStats"];

#[derive(Debug, Deserialize)]
pub(crate) struct TorrentList<T> {
    #[serde(default = "Vec::new")]
    pub(crate) torrents: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireTorrent {
    id: i64,
    #[serde(default)]
    name: String,
    #[serde(default)]
    hash_string: String,
    #[serde(default)]
    total_size: i64,
    #[serde(default)]
    percent_done: f64,
    #[serde(default = "negative")]
    status: i64,
    #[serde(default)]
    rate_download: i64,
    #[serde(default)]
    rate_upload: i64,
    #[serde(default)]
    upload_ratio: f64,
    #[serde(default = "negative")]
    eta: i64,
    #[serde(default)]
    download_dir: String,
    #[serde(default)]
    is_finished: bool,
    #[serde(default)]
    added_date: i64,
    #[serde(default)]
    activity_date: i64,
    #[serde(default)]
    done_date: i64,
    #[serde(default)]
    peers_connected: i64,
    #[serde(default)]
    peers_getting_from_us: i64,
    #[serde(default)]
    peers_sending_to_us: i64,
    #[serde(default)]
    size_when_done: Option<i64>,
    #[serde(default)]
    left_until_done: i64,
}

const fn negative() -> i64 {
    -1
}

impl From<WireTorrent> for TorrentSummary {
    fn from(wire: WireTorrent) -> Self {
        let total_size = non_negative(wire.total_size);
        Self {
            id: wire.id,
            name: wire.name,
            hash: wire.hash_string,
            total_size,
            percent_done: wire.percent_done.clamp(0.0, 1.0),
            status: TorrentStatus::from_code(wire.status),
            rate_download: non_negative(wire.rate_download),
            rate_upload: non_negative(wire.rate_upload),
            upload_ratio: wire.upload_ratio.max(0.0),
            peers_connected: count(wire.peers_connected),
            seeders: count(wire.peers_sending_to_us),
            leechers: count(wire.peers_getting_from_us),
            eta_secs: u64::try_from(wire.eta).ok(),
            download_dir: PathBuf::from(wire.download_dir),
            is_finished: wire.is_finished,
            size_when_done: wire.size_when_done.map_or(total_size, non_negative),
            left_until_done: non_negative(wire.left_until_done),
            added_at: timestamp_from_epoch(wire.added_date),
            activity_at: timestamp_from_epoch(wire.activity_date),
            done_at: timestamp_from_epoch(wire.done_date),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireManifest {
    #[serde(default)]
    files: Vec<WireFile>,
    #[serde(default)]
    file_stats: Vec<WireFileStat>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireFile {
    name: String,
    #[serde(default)]
    length: i64,
    #[serde(default)]
    bytes_completed: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireFileStat {
    #[serde(default)]
    bytes_completed: i64,
    #[serde(default = "wanted_default")]
    wanted: bool,
    #[serde(default)]
    priority: i64,
}

const fn wanted_default() -> bool {
    true
}

impl WireManifest {
    pub(crate) fn into_entries(self) -> Vec<FileEntry> {
        let Self { files, file_stats } = self;
        files
            .into_iter()
            .enumerate()
            .map(|(position, file)| {
                let stat = file_stats.get(position);
                let completed = stat.map_or(file.bytes_completed, |stat| stat.bytes_completed);
                FileEntry::new(
                    u32::try_from(position).unwrap_or(u32::MAX),
                    file.name,
                    non_negative(file.length),
                    non_negative(completed),
                    stat.is_none_or(|stat| stat.wanted),
                    stat.map_or(FilePriority::Normal, |stat| {
                        FilePriority::from_code(stat.priority)
                    }),
                )
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireAdded {
    id: i64,
    #[serde(default)]
    name: String,
    #[serde(default)]
    hash_string: String,
}

impl WireAdded {
    pub(crate) fn into_added(self, duplicate: bool) -> AddedTorrent {
        AddedTorrent {
            id: self.id,
            name: self.name,
            hash: self.hash_string,
            duplicate,
        }
    }
}

fn non_negative(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

fn count(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}
