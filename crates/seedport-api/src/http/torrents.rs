//! Torrent control handlers: listing, admission, removal and lifecycle actions.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path as AxumPath, Query, State},
    http::StatusCode,
};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use seedport_torrent_core::{AddedTorrent, TorrentId, TorrentSource, TorrentSummary};
use tracing::info;

use crate::http::errors::ApiError;
use crate::models::{
    AddTorrentRequest, DeleteQuery, FileView, TorrentAction, TorrentActionRequest,
};
use crate::state::ApiState;

pub(crate) async fn list_torrents(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<Vec<TorrentSummary>>, ApiError> {
    let torrents = state.torrents.inspector().list().await?;
    Ok(Json(torrents))
}

pub(crate) async fn get_torrent(
    State(state): State<Arc<ApiState>>,
    AxumPath(id): AxumPath<TorrentId>,
) -> Result<Json<TorrentSummary>, ApiError> {
    Ok(Json(state.torrents.inspector().get(id).await?))
}

pub(crate) async fn list_files(
    State(state): State<Arc<ApiState>>,
    AxumPath(id): AxumPath<TorrentId>,
) -> Result<Json<Vec<FileView>>, ApiError> {
    let files = state.torrents.inspector().files(id).await?;
    Ok(Json(files.into_iter().map(FileView::from).collect()))
}

/// Admit a magnet or metainfo; duplicates answer `200` with the existing torrent.
pub(crate) async fn add_torrent(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<AddTorrentRequest>,
) -> Result<(StatusCode, Json<AddedTorrent>), ApiError> {
    let source = source_from_request(request)?;
    let kind = match &source {
        TorrentSource::Magnet { .. } => "magnet",
        TorrentSource::Metainfo { .. } => "metainfo",
    };
    let added = state.torrents.workflow().add(source).await?;
    info!(
        torrent_id = added.id,
        torrent_name = %added.name,
        duplicate = added.duplicate,
        kind,
        "torrent admission requested"
    );
    let status = if added.duplicate {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(added)))
}

fn source_from_request(request: AddTorrentRequest) -> Result<TorrentSource, ApiError> {
    match (request.magnet, request.metainfo) {
        (Some(magnet), None) => Ok(TorrentSource::magnet(magnet)?),
        (None, Some(encoded)) => {
            let bytes = STANDARD.decode(encoded.trim()).map_err(|_| {
                ApiError::bad_request("metainfo must be base64 encoded")
                    .with_invalid_param("/metainfo", "invalid_base64")
            })?;
            Ok(TorrentSource::metainfo(bytes)?)
        }
        (Some(_), Some(_)) => Err(ApiError::bad_request(
            "provide either magnet or metainfo, not both",
        )),
        (None, None) => Err(ApiError::bad_request("magnet or metainfo is required")),
    }
}

/// Remove a torrent and let the eviction scheduler reclaim what it left behind.
pub(crate) async fn delete_torrent(
    State(state): State<Arc<ApiState>>,
    AxumPath(id): AxumPath<TorrentId>,
    Query(query): Query<DeleteQuery>,
) -> Result<StatusCode, ApiError> {
    state
        .torrents
        .workflow()
        .remove(id, query.delete_data)
        .await?;
    info!(torrent_id = id, delete_data = query.delete_data, "torrent removed");
    state.eviction.nudge();
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn torrent_action(
    State(state): State<Arc<ApiState>>,
    AxumPath(id): AxumPath<TorrentId>,
    Json(request): Json<TorrentActionRequest>,
) -> Result<StatusCode, ApiError> {
    let workflow = state.torrents.workflow();
    match request.action {
        TorrentAction::Pause => workflow.stop(id).await?,
        TorrentAction::Resume => workflow.start(id).await?,
    }
    info!(torrent_id = id, action = ?request.action, "torrent action applied");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_needs_exactly_one_source() {
        let both = AddTorrentRequest {
            magnet: Some("magnet:?xt=urn:btih:abc".to_string()),
            metainfo: Some("ZGF0YQ==".to_string()),
        };
        assert!(source_from_request(both).is_err());
        assert!(source_from_request(AddTorrentRequest::default()).is_err());
    }

    #[test]
    fn metainfo_is_decoded() -> anyhow::Result<()> {
        let request = AddTorrentRequest {
            magnet: None,
            metainfo: Some("ZDQ6aW5mb2Vl".to_string()),
        };
        let source = source_from_request(request).map_err(|err| anyhow::anyhow!("{err:?}"))?;
        assert_eq!(
            source,
            TorrentSource::Metainfo {
                bytes: b"d4:infoee".to_vec()
            }
        );
        Ok(())
    }

    #[test]
    fn invalid_base64_is_rejected() {
        let request = AddTorrentRequest {
            magnet: None,
            metainfo: Some("not base64!".to_string()),
        };
        let err = source_from_request(request).err();
        assert_eq!(err.map(|err| err.status()), Some(StatusCode::BAD_REQUEST));
    }
}
