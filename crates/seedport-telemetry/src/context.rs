//! Request-scoped context and the process-wide span.
//!
//! The request id and matched route live in task-local storage for the
//! duration of a handler, so any code on that task can tag its logs without
//! threading identifiers through every call.

use std::future::Future;
use std::sync::Arc;

use tracing::span::EnteredSpan;

use crate::init::build_sha;

/// Keeps the `app` span entered; every event on this thread nests under it.
#[must_use = "the span is exited when the guard is dropped"]
pub struct ProcessSpan {
    _entered: EnteredSpan,
}

impl ProcessSpan {
    /// Enter a span tagged with the component name and build SHA.
    pub fn enter(component: &str) -> Self {
        let span = tracing::info_span!("app", component, build_sha = %build_sha());
        Self {
            _entered: span.entered(),
        }
    }
}

/// Identifiers of the request currently being served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    request_id: Arc<str>,
    route: Arc<str>,
}

impl RequestContext {
    /// Build a context from a request id and matched route template.
    pub fn new(request_id: impl Into<Arc<str>>, route: impl Into<Arc<str>>) -> Self {
        Self {
            request_id: request_id.into(),
            route: route.into(),
        }
    }

    /// Value of the `x-request-id` header; empty when the request carried none.
    #[must_use]
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Matched route template, e.g. `/v1/torrents/{id}/export`.
    #[must_use]
    pub fn route(&self) -> &str {
        &self.route
    }
}

tokio::task_local! {
    static ACTIVE_REQUEST: RequestContext;
}

/// Context of the request being served on this task, if any.
#[must_use]
pub fn current_request() -> Option<RequestContext> {
    ACTIVE_REQUEST.try_with(Clone::clone).ok()
}

/// Shorthand for the active request id.
#[must_use]
pub fn current_request_id() -> Option<String> {
    ACTIVE_REQUEST
        .try_with(|ctx| ctx.request_id().to_owned())
        .ok()
}

/// Poll `fut` with `context` visible through [`current_request`].
pub async fn with_request_context<Fut, T>(context: RequestContext, fut: Fut) -> T
where
    Fut: Future<Output = T>,
{
    ACTIVE_REQUEST.scope(context, fut).await
}
