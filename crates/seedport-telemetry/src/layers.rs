//! Request-id middleware for the HTTP stack.

use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};

/// Header carrying the per-request identifier.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Layers that assign a UUID to requests lacking [`REQUEST_ID_HEADER`] and echo it on the response.
///
/// Apply the set layer outside the propagate layer: propagation copies whatever header the
/// request carries when it reaches it, so the id must already be assigned.
#[must_use]
pub fn request_id_layers() -> (SetRequestIdLayer<MakeRequestUuid>, PropagateRequestIdLayer) {
    (
        SetRequestIdLayer::x_request_id(MakeRequestUuid),
        PropagateRequestIdLayer::x_request_id(),
    )
}
