//! Health, metrics and storage endpoints.

use std::sync::Arc;

use axum::{Json, extract::State, http::header::CONTENT_TYPE, response::IntoResponse};
use seedport_telemetry::build_sha;
use tracing::{error, info};

use crate::http::constants::PROMETHEUS_TEXT;
use crate::http::errors::ApiError;
use crate::models::{CleanupResponse, HealthResponse, StorageResponse};
use crate::state::ApiState;

/// Liveness only; never touches the daemon.
pub(crate) async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        build: build_sha().to_string(),
    })
}

/// Prometheus text exposition of the process registry.
pub(crate) async fn metrics(
    State(state): State<Arc<ApiState>>,
) -> Result<impl IntoResponse, ApiError> {
    let body = state.telemetry.render().map_err(|err| {
        error!(error = %err, "metrics exposition failed");
        ApiError::internal("metrics unavailable")
    })?;
    Ok(([(CONTENT_TYPE, PROMETHEUS_TEXT)], body))
}

pub(crate) async fn storage(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<StorageResponse>, ApiError> {
    let usage = state.eviction.storage_usage()?;
    Ok(Json(StorageResponse {
        usage,
        threshold_percent: state.eviction.policy().threshold_percent,
    }))
}

/// Run the eviction policy now and report the resulting usage.
pub(crate) async fn cleanup(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<CleanupResponse>, ApiError> {
    info!("cleanup requested");
    let report = state.eviction.trigger().await?;
    Ok(Json(CleanupResponse {
        usage_percent: report.usage_after,
        report,
    }))
}
