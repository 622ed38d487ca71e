//! Browse and export handlers.
//!
//! # Design
//! - Every filesystem access goes through the configured [`seedport_fsops::Sandbox`].
//! - Exports are gated on the torrent's completion; single files are also
//!   exportable once they are fully downloaded.
//! - Directory exports stream a zip through an in-memory pipe. The writer task
//!   owns every file handle and stops as soon as the response body is dropped.

use std::path::{Component, Path};
use std::sync::Arc;

use axum::{
    Json,
    body::Body,
    extract::{Path as AxumPath, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::Response,
};
use seedport_config::CompressionPolicy;
use seedport_fsops::{
    ExportTarget, FsOpsError, Listing, archive_file_name, browse, open_file, safe_file_name,
    stream_archive,
};
use seedport_telemetry::current_request_id;
use seedport_torrent_core::{TorrentId, TorrentSummary};
use tokio_util::io::ReaderStream;
use tracing::{info, warn};

use crate::http::constants::{ARCHIVE_PIPE_BYTES, FILE_CHUNK_BYTES};
use crate::http::errors::ApiError;
use crate::models::ExportQuery;
use crate::state::ApiState;

pub(crate) async fn browse_root(
    state: State<Arc<ApiState>>,
    AxumPath(id): AxumPath<TorrentId>,
) -> Result<Json<Listing>, ApiError> {
    browse_at(state, id, String::new()).await
}

pub(crate) async fn browse_path(
    state: State<Arc<ApiState>>,
    AxumPath((id, path)): AxumPath<(TorrentId, String)>,
) -> Result<Json<Listing>, ApiError> {
    browse_at(state, id, path).await
}

async fn browse_at(
    State(state): State<Arc<ApiState>>,
    id: TorrentId,
    sub_path: String,
) -> Result<Json<Listing>, ApiError> {
    let torrent = state.torrents.inspector().get(id).await?;
    let target = resolve(&state, &torrent, &sub_path).await?;
    let listing = browse(&target).await.map_err(|err| fs_error(&state, err))?;
    Ok(Json(listing))
}

pub(crate) async fn export_root(
    state: State<Arc<ApiState>>,
    AxumPath(id): AxumPath<TorrentId>,
    query: Query<ExportQuery>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    export_at(state, id, String::new(), query, headers).await
}

pub(crate) async fn export_path(
    state: State<Arc<ApiState>>,
    AxumPath((id, path)): AxumPath<(TorrentId, String)>,
    query: Query<ExportQuery>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    export_at(state, id, path, query, headers).await
}

async fn export_at(
    State(state): State<Arc<ApiState>>,
    id: TorrentId,
    sub_path: String,
    Query(query): Query<ExportQuery>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let torrent = state.torrents.inspector().get(id).await?;
    if !torrent.is_exportable(state.export.min_completion) {
        state.telemetry.inc_export("torrent", "incomplete");
        return Err(ApiError::incomplete(format!(
            "torrent is {:.0}% complete; export requires {:.0}%",
            torrent.percent_done * 100.0,
            state.export.min_completion * 100.0
        )));
    }

    let target = resolve(&state, &torrent, &sub_path).await?;
    if target.is_dir {
        let compression = query.compression.unwrap_or(state.export.compression);
        let root_name = target
            .path
            .file_name()
            .map_or_else(|| torrent.name.clone(), |name| name.to_string_lossy().into_owned());
        archive_response(&state, target, &root_name, compression)
    } else {
        file_response(&state, &target.path, range_header(&headers)).await
    }
}

/// Stream one manifest entry, allowed once the file itself is complete.
pub(crate) async fn file_content(
    State(state): State<Arc<ApiState>>,
    AxumPath((id, index)): AxumPath<(TorrentId, u32)>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let inspector = state.torrents.inspector();
    let torrent = inspector.get(id).await?;
    let files = inspector.files(id).await?;
    let entry = files
        .iter()
        .find(|entry| entry.index == index)
        .ok_or_else(|| ApiError::not_found(format!("file {index} not found")))?;

    if !entry.is_complete() && !torrent.is_exportable(state.export.min_completion) {
        state.telemetry.inc_export("file", "incomplete");
        return Err(ApiError::incomplete(format!(
            "file is {:.0}% complete",
            entry.progress() * 100.0
        )));
    }

    let Some(sub_path) = manifest_sub_path(&torrent.name, &entry.name) else {
        state.telemetry.inc_sandbox_denial();
        warn!(
            security = true,
            torrent_id = id,
            entry = %entry.name,
            "manifest entry outside torrent root"
        );
        return Err(ApiError::forbidden("path escapes its content root"));
    };
    let target = resolve(&state, &torrent, &sub_path).await?;
    if target.is_dir {
        return Err(ApiError::bad_request("manifest entry is a directory"));
    }
    file_response(&state, &target.path, range_header(&headers)).await
}

async fn resolve(
    state: &ApiState,
    torrent: &TorrentSummary,
    sub_path: &str,
) -> Result<ExportTarget, ApiError> {
    state
        .sandbox
        .resolve(&torrent.download_dir, &torrent.name, sub_path)
        .await
        .map_err(|err| fs_error(state, err))
}

fn fs_error(state: &ApiState, err: FsOpsError) -> ApiError {
    if matches!(err, FsOpsError::AccessDenied { .. }) {
        state.telemetry.inc_sandbox_denial();
    }
    ApiError::from(err)
}

fn range_header(headers: &HeaderMap) -> Option<&str> {
    headers.get(header::RANGE).and_then(|value| value.to_str().ok())
}

/// Manifest names are relative to the download directory and start with the
/// torrent name for multi-file torrents.
fn manifest_sub_path(torrent_name: &str, entry_name: &str) -> Option<String> {
    let entry = Path::new(entry_name);
    if entry == Path::new(torrent_name) {
        return Some(String::new());
    }
    let rest = entry.strip_prefix(torrent_name).ok()?;
    rest.components()
        .all(|component| matches!(component, Component::Normal(_)))
        .then(|| rest.to_string_lossy().into_owned())
}

async fn file_response(
    state: &ApiState,
    path: &Path,
    range: Option<&str>,
) -> Result<Response, ApiError> {
    let payload = open_file(path, range)
        .await
        .map_err(|err| fs_error(state, err))?;
    let name = path
        .file_name()
        .map(|name| safe_file_name(&name.to_string_lossy()))
        .unwrap_or_default();

    let mut builder = Response::builder()
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .header(header::ACCEPT_RANGES, "bytes")
        .header(header::CONTENT_LENGTH, payload.content_length())
        .header(header::CONTENT_DISPOSITION, attachment(&name)?);
    let outcome = if let Some(range) = payload.range {
        builder = builder
            .status(StatusCode::PARTIAL_CONTENT)
            .header(header::CONTENT_RANGE, range.content_range(payload.size));
        "partial"
    } else {
        builder = builder.status(StatusCode::OK);
        "full"
    };
    state.telemetry.inc_export("file", outcome);

    let stream = ReaderStream::with_capacity(payload.reader, FILE_CHUNK_BYTES);
    builder.body(Body::from_stream(stream)).map_err(|err| {
        warn!(error = %err, "failed to build file response");
        ApiError::internal("failed to build file response")
    })
}

fn archive_response(
    state: &ApiState,
    target: ExportTarget,
    root_name: &str,
    compression: CompressionPolicy,
) -> Result<Response, ApiError> {
    let disposition = attachment(&archive_file_name(root_name))?;
    let (writer, reader) = tokio::io::duplex(ARCHIVE_PIPE_BYTES);
    let metrics = state.telemetry.clone();
    let root_name = root_name.to_string();
    let request_id = current_request_id().unwrap_or_default();

    tokio::spawn(async move {
        let result = stream_archive(&target.path, &root_name, writer, compression).await;
        let outcome = match result {
            Ok(summary) => {
                info!(
                    request_id = %request_id,
                    archive = %root_name,
                    entries = summary.entries,
                    bytes = summary.bytes,
                    skipped = summary.skipped.len(),
                    "archive export finished"
                );
                "completed"
            }
            Err(FsOpsError::SinkClosed { .. }) => {
                info!(
                    request_id = %request_id,
                    archive = %root_name,
                    "client disconnected during archive export"
                );
                "aborted"
            }
            Err(err) => {
                warn!(
                    request_id = %request_id,
                    archive = %root_name,
                    error = %err,
                    "archive export failed"
                );
                "failed"
            }
        };
        metrics.inc_export("archive", outcome);
    });

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/zip")
        .header(header::CONTENT_DISPOSITION, disposition)
        .body(Body::from_stream(ReaderStream::with_capacity(
            reader,
            ARCHIVE_PIPE_BYTES,
        )))
        .map_err(|err| {
            warn!(error = %err, "failed to build archive response");
            ApiError::internal("failed to build archive response")
        })
}

fn attachment(file_name: &str) -> Result<HeaderValue, ApiError> {
    HeaderValue::from_str(&format!("attachment; filename=\"{file_name}\""))
        .map_err(|_| ApiError::internal("download name is not a valid header value"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_entries_map_into_the_torrent_root() {
        assert_eq!(manifest_sub_path("Movie.mkv", "Movie.mkv"), Some(String::new()));
        assert_eq!(
            manifest_sub_path("Show", "Show/season1/e01.mkv"),
            Some("season1/e01.mkv".to_string())
        );
        assert_eq!(manifest_sub_path("Show", "Other/e01.mkv"), None);
        assert_eq!(manifest_sub_path("Show", "Show/../etc/passwd"), None);
    }
}
