//! Request metrics middleware.
//!
//! Counts every response by matched route and status, and runs the handler
//! inside the request context so logs emitted while serving carry the request
//! id and route.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context as TaskContext, Poll};
use std::time::Instant;

use axum::extract::MatchedPath;
use axum::http::Request;
use axum::response::Response;
use seedport_telemetry::{Metrics, RequestContext, with_request_context};
use tower::{Layer, Service};
use tracing::debug;

use crate::http::constants::HEADER_REQUEST_ID;

/// Layer producing [`RequestMetricsService`].
#[derive(Clone)]
pub(crate) struct RequestMetricsLayer {
    metrics: Metrics,
}

impl RequestMetricsLayer {
    pub(crate) const fn new(metrics: Metrics) -> Self {
        Self { metrics }
    }
}

impl<S> Layer<S> for RequestMetricsLayer {
    type Service = RequestMetricsService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestMetricsService {
            inner,
            metrics: self.metrics.clone(),
        }
    }
}

#[derive(Clone)]
pub(crate) struct RequestMetricsService<S> {
    inner: S,
    metrics: Metrics,
}

impl<S, B> Service<Request<B>> for RequestMetricsService<S>
where
    S: Service<Request<B>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Send,
    B: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Response, S::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut TaskContext<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<B>) -> Self::Future {
        // Unmatched requests are grouped so arbitrary paths cannot grow label cardinality.
        let route = req
            .extensions()
            .get::<MatchedPath>()
            .map_or_else(|| "unmatched".to_string(), |matched| matched.as_str().to_string());
        let request_id = req
            .headers()
            .get(HEADER_REQUEST_ID)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();
        let context = RequestContext::new(request_id, route.as_str());
        let metrics = self.metrics.clone();
        let started = Instant::now();
        let response = self.inner.call(req);

        Box::pin(with_request_context(context, async move {
            let response = response.await?;
            let status = response.status().as_u16();
            metrics.inc_http_request(&route, status);
            debug!(
                route = %route,
                status,
                elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
                "request served"
            );
            Ok(response)
        }))
    }
}
