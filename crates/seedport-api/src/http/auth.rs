//! API key middleware for `/v1` routes.

use std::sync::Arc;

use axum::{extract::State, http::Request, middleware::Next, response::Response};
use tracing::warn;

use crate::http::constants::HEADER_API_KEY;
use crate::http::errors::ApiError;
use crate::state::ApiState;

/// Reject requests whose `x-seedport-api-key` does not match the configured key.
///
/// Open when no key is configured.
pub(crate) async fn require_api_key(
    State(state): State<Arc<ApiState>>,
    req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(expected) = state.api_key.as_deref() else {
        return Ok(next.run(req).await);
    };

    let presented = req
        .headers()
        .get(HEADER_API_KEY)
        .ok_or_else(|| ApiError::unauthorized("missing API key header"))?
        .to_str()
        .map_err(|_| ApiError::bad_request("API key header must be valid UTF-8"))?;

    if !constant_time_eq(presented.trim().as_bytes(), expected.as_bytes()) {
        warn!(route = %req.uri().path(), "rejected request with invalid API key");
        return Err(ApiError::unauthorized("invalid API key"));
    }
    Ok(next.run(req).await)
}

fn constant_time_eq(left: &[u8], right: &[u8]) -> bool {
    if left.len() != right.len() {
        return false;
    }
    left.iter()
        .zip(right)
        .fold(0_u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}
