//! RFC9457-style API error wrapper and domain error mapping.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header::CONTENT_RANGE},
    response::{IntoResponse, Response},
};
use seedport_fsops::{FsOpsError, unsatisfied_range};
use seedport_torrent_core::TorrentError;
use tracing::{error, warn};

use crate::http::constants::{
    PROBLEM_BAD_REQUEST, PROBLEM_DAEMON_REJECTED, PROBLEM_FORBIDDEN, PROBLEM_INCOMPLETE,
    PROBLEM_INTERNAL, PROBLEM_NOT_FOUND, PROBLEM_RANGE_NOT_SATISFIABLE,
    PROBLEM_SERVICE_UNAVAILABLE, PROBLEM_UNAUTHORIZED,
};
use crate::models::{ProblemDetails, ProblemInvalidParam};

/// Structured API error with optional RFC9457 fields.
#[derive(Debug)]
pub(crate) struct ApiError {
    status: StatusCode,
    kind: &'static str,
    title: &'static str,
    detail: Option<String>,
    invalid_params: Option<Vec<ProblemInvalidParam>>,
    content_range: Option<String>,
}

impl ApiError {
    const fn new(status: StatusCode, kind: &'static str, title: &'static str) -> Self {
        Self {
            status,
            kind,
            title,
            detail: None,
            invalid_params: None,
            content_range: None,
        }
    }

    pub(crate) fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub(crate) fn with_invalid_param(mut self, pointer: &str, message: &str) -> Self {
        self.invalid_params
            .get_or_insert_with(Vec::new)
            .push(ProblemInvalidParam {
                pointer: pointer.to_string(),
                message: message.to_string(),
            });
        self
    }

    pub(crate) fn internal(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            PROBLEM_INTERNAL,
            "internal server error",
        )
        .with_detail(message)
    }

    pub(crate) fn unauthorized(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            PROBLEM_UNAUTHORIZED,
            "authentication required",
        )
        .with_detail(detail)
    }

    pub(crate) fn forbidden(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, PROBLEM_FORBIDDEN, "forbidden").with_detail(detail)
    }

    pub(crate) fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, PROBLEM_BAD_REQUEST, "bad request").with_detail(detail)
    }

    pub(crate) fn not_found(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            PROBLEM_NOT_FOUND,
            "resource not found",
        )
        .with_detail(detail)
    }

    pub(crate) fn incomplete(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::CONFLICT,
            PROBLEM_INCOMPLETE,
            "content not ready for export",
        )
        .with_detail(detail)
    }

    pub(crate) fn daemon_rejected(result: impl Into<String>) -> Self {
        Self::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            PROBLEM_DAEMON_REJECTED,
            "daemon rejected the request",
        )
        .with_detail(result)
    }

    pub(crate) fn range_not_satisfiable(size: u64) -> Self {
        let mut err = Self::new(
            StatusCode::RANGE_NOT_SATISFIABLE,
            PROBLEM_RANGE_NOT_SATISFIABLE,
            "range not satisfiable",
        )
        .with_detail(format!("file is {size} bytes"));
        err.content_range = Some(unsatisfied_range(size));
        err
    }

    pub(crate) fn service_unavailable(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            PROBLEM_SERVICE_UNAVAILABLE,
            "service unavailable",
        )
        .with_detail(detail)
    }

    #[cfg(test)]
    pub(crate) const fn status(&self) -> StatusCode {
        self.status
    }

    #[cfg(test)]
    pub(crate) fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }
}

impl From<TorrentError> for ApiError {
    fn from(err: TorrentError) -> Self {
        match err {
            TorrentError::NotFound { torrent_id } => {
                Self::not_found(format!("torrent {torrent_id} not found"))
            }
            TorrentError::Daemon { operation, result } => {
                warn!(operation, result = %result, "daemon rejected request");
                Self::daemon_rejected(result)
            }
            TorrentError::InvalidInput { field, reason } => {
                Self::bad_request("invalid torrent input")
                    .with_invalid_param(&format!("/{field}"), reason)
            }
            TorrentError::Unavailable { operation, source } => {
                error!(operation, error = %source, "torrent daemon unavailable");
                Self::service_unavailable("torrent daemon is unavailable")
            }
            err @ TorrentError::OperationFailed { .. } => {
                error!(error = %err, "torrent operation failed");
                Self::internal("torrent operation failed")
            }
        }
    }
}

impl From<FsOpsError> for ApiError {
    fn from(err: FsOpsError) -> Self {
        match err {
            FsOpsError::NotFound { .. } => Self::not_found("path not found"),
            FsOpsError::AccessDenied { .. } => Self::forbidden("path escapes its content root"),
            FsOpsError::RangeNotSatisfiable { size, .. } => Self::range_not_satisfiable(size),
            FsOpsError::InvalidInput { field, reason, .. } => {
                Self::bad_request("invalid path").with_invalid_param(&format!("/{field}"), reason)
            }
            err => {
                error!(error = %err, "filesystem operation failed");
                Self::internal("filesystem operation failed")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ProblemDetails {
            kind: self.kind.to_string(),
            title: self.title.to_string(),
            status: self.status.as_u16(),
            detail: self.detail,
            invalid_params: self.invalid_params,
        };
        let mut response = (self.status, Json(body)).into_response();
        if let Some(range) = self
            .content_range
            .and_then(|value| HeaderValue::from_str(&value).ok())
        {
            response.headers_mut().insert(CONTENT_RANGE, range);
        }
        response
    }
}
