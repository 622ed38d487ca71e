//! Router construction and server host for the API.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    http::{HeaderName, Method, Request, header::CONTENT_TYPE, header::RANGE},
    middleware,
    routing::{get, post},
};
use seedport_telemetry::{build_sha, request_id_layers};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::Span;

use crate::error::ApiServerError;
use crate::http::auth::require_api_key;
use crate::http::constants::{HEADER_API_KEY, HEADER_REQUEST_ID};
use crate::http::content::{browse_path, browse_root, export_path, export_root, file_content};
use crate::http::health::{cleanup, health, metrics, storage};
use crate::http::telemetry::RequestMetricsLayer;
use crate::http::torrents::{
    add_torrent, delete_torrent, get_torrent, list_files, list_torrents, torrent_action,
};
use crate::state::ApiState;

/// Axum router wrapper hosting the export API.
pub struct ApiServer {
    router: Router,
}

impl ApiServer {
    /// Build the router around shared handler state.
    #[must_use]
    pub fn new(state: ApiState) -> Self {
        let state = Arc::new(state);
        let cors_layer = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
            .allow_headers([
                CONTENT_TYPE,
                RANGE,
                HeaderName::from_static(HEADER_API_KEY),
            ]);
        let trace_layer = TraceLayer::new_for_http()
            .make_span_with(|request: &Request<_>| {
                let request_id = request
                    .headers()
                    .get(HEADER_REQUEST_ID)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("");
                tracing::info_span!(
                    "http.request",
                    method = %request.method(),
                    route = %request.uri().path(),
                    request_id = %request_id,
                    build_sha = %build_sha(),
                    status_code = tracing::field::Empty,
                    latency_ms = tracing::field::Empty
                )
            })
            .on_request(|_request: &Request<_>, _span: &Span| {})
            .on_response(
                |response: &axum::response::Response, latency: Duration, span: &Span| {
                    span.record("status_code", response.status().as_u16());
                    span.record(
                        "latency_ms",
                        u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                    );
                },
            );
        let (set_request_id, propagate_request_id) = request_id_layers();
        let layered = ServiceBuilder::new()
            .layer(set_request_id)
            .layer(propagate_request_id)
            .layer(trace_layer)
            .layer(RequestMetricsLayer::new(state.telemetry.clone()));

        let router = Self::public_routes()
            .merge(Self::v1_routes(&state))
            .layer(cors_layer)
            .route_layer(layered)
            .with_state(state);
        Self { router }
    }

    fn public_routes() -> Router<Arc<ApiState>> {
        Router::new()
            .route("/health", get(health))
            .route("/metrics", get(metrics))
    }

    fn v1_routes(state: &Arc<ApiState>) -> Router<Arc<ApiState>> {
        let require_api = middleware::from_fn_with_state(state.clone(), require_api_key);

        Router::new()
            .route("/v1/torrents", get(list_torrents).post(add_torrent))
            .route("/v1/torrents/{id}", get(get_torrent).delete(delete_torrent))
            .route("/v1/torrents/{id}/action", post(torrent_action))
            .route("/v1/torrents/{id}/files", get(list_files))
            .route("/v1/torrents/{id}/files/{index}/content", get(file_content))
            .route("/v1/torrents/{id}/browse", get(browse_root))
            .route("/v1/torrents/{id}/browse/{*path}", get(browse_path))
            .route("/v1/torrents/{id}/export", get(export_root))
            .route("/v1/torrents/{id}/export/{*path}", get(export_path))
            .route("/v1/storage", get(storage))
            .route("/v1/cleanup", post(cleanup))
            .route_layer(require_api)
    }

    /// Serve until `shutdown` resolves.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener fails to bind or the server terminates unexpectedly.
    pub async fn serve<F>(self, addr: SocketAddr, shutdown: F) -> Result<(), ApiServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ApiServerError::Bind { addr, source })?;
        tracing::info!(%addr, "api listening");
        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|source| ApiServerError::Serve { source })
    }

    /// Router, for embedding or in-process testing.
    #[must_use]
    pub fn router(&self) -> &Router {
        &self.router
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::TorrentHandles;
    use anyhow::{Context, Result};
    use axum::body::{Body, to_bytes};
    use axum::http::{StatusCode, header};
    use axum::response::Response;
    use seedport_config::{CompressionPolicy, EvictionSettings, ExportSettings};
    use seedport_fsops::{EvictionPolicy, EvictionService, Sandbox, StatvfsProbe};
    use seedport_telemetry::Metrics;
    use seedport_test_support::fixtures::{ContentTree, DAY, sample_bytes};
    use seedport_test_support::mocks::{RecordedCommand, StubDaemon, summary};
    use seedport_torrent_core::{FileEntry, FilePriority};
    use serde_json::Value;
    use std::collections::BTreeMap;
    use std::io::{Cursor, Read};
    use tower::ServiceExt;

    struct Harness {
        tree: ContentTree,
        daemon: StubDaemon,
        metrics: Metrics,
        server: ApiServer,
        payload: Vec<u8>,
    }

    fn harness(api_key: Option<&str>) -> Result<Harness> {
        let tree = ContentTree::new()?;
        let payload = sample_bytes(1_000, 11);
        tree.write("content/Show/season1/e01.mkv", &payload)?;
        tree.write("content/Show/notes.txt", b"notes")?;
        tree.write("content/Partial/half.bin", &sample_bytes(64, 3))?;
        tree.write("content/Partial/done.bin", b"complete")?;
        tree.write("secret.txt", b"outside")?;

        let daemon = StubDaemon::new()
            .with_torrent(
                summary(1, "Show", tree.path("content"), 1.0, true),
                vec![
                    FileEntry::new(0, "Show/season1/e01.mkv", 1_000, 1_000, true, FilePriority::Normal),
                    FileEntry::new(1, "Show/notes.txt", 5, 5, true, FilePriority::Normal),
                ],
            )
            .with_torrent(
                summary(2, "Partial", tree.path("content"), 0.5, false),
                vec![
                    FileEntry::new(0, "Partial/half.bin", 128, 64, true, FilePriority::Normal),
                    FileEntry::new(1, "Partial/done.bin", 8, 8, true, FilePriority::Normal),
                ],
            );
        let metrics = Metrics::new()?;
        let settings = EvictionSettings {
            threshold_percent: 100.0,
            retention: DAY * 7,
            interval: Duration::from_secs(1_800),
            artifact_grace: DAY,
        };
        let eviction = EvictionService::new(
            EvictionPolicy::new(tree.path("content"), &settings),
            Arc::new(StatvfsProbe),
            Arc::new(daemon.clone()),
            metrics.clone(),
        );
        let state = ApiState::new(
            TorrentHandles::new(Arc::new(daemon.clone()), Arc::new(daemon.clone())),
            Sandbox::new(tree.path("content")),
            eviction,
            metrics.clone(),
            ExportSettings {
                min_completion: 0.9,
                compression: CompressionPolicy::Store,
            },
            api_key.map(str::to_string),
        );
        Ok(Harness {
            tree,
            daemon,
            metrics,
            server: ApiServer::new(state),
            payload,
        })
    }

    impl Harness {
        async fn send(&self, request: Request<Body>) -> Result<Response> {
            Ok(self.server.router().clone().oneshot(request).await?)
        }

        async fn get(&self, uri: &str) -> Result<Response> {
            self.send(Request::get(uri).body(Body::empty())?).await
        }
    }

    async fn body_bytes(response: Response) -> Result<Vec<u8>> {
        Ok(to_bytes(response.into_body(), usize::MAX).await?.to_vec())
    }

    async fn body_json(response: Response) -> Result<Value> {
        Ok(serde_json::from_slice(&body_bytes(response).await?)?)
    }

    fn header_str<'a>(response: &'a Response, name: header::HeaderName) -> Option<&'a str> {
        response.headers().get(name).and_then(|value| value.to_str().ok())
    }

    #[tokio::test]
    async fn health_is_public_and_daemon_free() -> Result<()> {
        let harness = harness(Some("k3y"))?;
        let response = harness.get("/health").await?;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(HEADER_REQUEST_ID));
        let body = body_json(response).await?;
        assert_eq!(body["status"], "ok");
        Ok(())
    }

    #[tokio::test]
    async fn request_ids_are_generated_or_echoed() -> Result<()> {
        let harness = harness(None)?;

        let generated = harness.get("/health").await?;
        let id = generated
            .headers()
            .get(HEADER_REQUEST_ID)
            .and_then(|value| value.to_str().ok())
            .context("generated request id")?;
        assert!(!id.is_empty());

        let request = Request::get("/health")
            .header(HEADER_REQUEST_ID, "caller-7")
            .body(Body::empty())?;
        let echoed = harness.send(request).await?;
        assert_eq!(
            echoed
                .headers()
                .get(HEADER_REQUEST_ID)
                .and_then(|value| value.to_str().ok()),
            Some("caller-7")
        );
        Ok(())
    }

    #[tokio::test]
    async fn api_key_guards_v1_routes() -> Result<()> {
        let harness = harness(Some("k3y"))?;
        assert_eq!(
            harness.get("/v1/torrents").await?.status(),
            StatusCode::UNAUTHORIZED
        );
        let request = Request::get("/v1/torrents")
            .header(HEADER_API_KEY, "wrong")
            .body(Body::empty())?;
        assert_eq!(harness.send(request).await?.status(), StatusCode::UNAUTHORIZED);

        let request = Request::get("/v1/torrents")
            .header(HEADER_API_KEY, "k3y")
            .body(Body::empty())?;
        let response = harness.send(request).await?;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await?.as_array().map(Vec::len), Some(2));
        Ok(())
    }

    #[tokio::test]
    async fn torrent_lookup_maps_daemon_errors() -> Result<()> {
        let harness = harness(None)?;
        let response = harness.get("/v1/torrents/1").await?;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await?["name"], "Show");

        let response = harness.get("/v1/torrents/99").await?;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            header_str(&response, header::CONTENT_TYPE),
            Some("application/json")
        );

        let files = body_json(harness.get("/v1/torrents/2/files").await?).await?;
        assert_eq!(files[0]["progress"], 0.5);
        Ok(())
    }

    #[tokio::test]
    async fn unavailable_daemon_is_service_unavailable() -> Result<()> {
        let harness = harness(None)?;
        // Clones share state, so the router's handle goes down too.
        let _down = harness.daemon.clone().unavailable();
        let response = harness.get("/v1/torrents").await?;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        Ok(())
    }

    #[tokio::test]
    async fn admission_and_removal_reach_the_daemon() -> Result<()> {
        let harness = harness(None)?;
        let request = Request::post("/v1/torrents")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"magnet":"magnet:?xt=urn:btih:abc"}"#))?;
        let response = harness.send(request).await?;
        assert_eq!(response.status(), StatusCode::CREATED);

        harness.daemon.reject_next("duplicate torrent");
        let request = Request::post("/v1/torrents")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"magnet":"magnet:?xt=urn:btih:abc"}"#))?;
        let response = harness.send(request).await?;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body_json(response).await?["detail"], "duplicate torrent");

        let request = Request::post("/v1/torrents/1/action")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"action":"pause"}"#))?;
        assert_eq!(harness.send(request).await?.status(), StatusCode::NO_CONTENT);

        let request = Request::delete("/v1/torrents/1?delete_data=true").body(Body::empty())?;
        assert_eq!(harness.send(request).await?.status(), StatusCode::NO_CONTENT);

        let commands = harness.daemon.commands();
        assert!(matches!(commands.first(), Some(RecordedCommand::Add(_))));
        assert!(commands.contains(&RecordedCommand::Stop(1)));
        assert!(commands.contains(&RecordedCommand::Remove {
            id: 1,
            delete_data: true
        }));
        Ok(())
    }

    #[tokio::test]
    async fn browse_lists_and_denies_traversal() -> Result<()> {
        let harness = harness(None)?;
        let listing = body_json(harness.get("/v1/torrents/1/browse").await?).await?;
        assert_eq!(listing["type"], "directory");
        assert_eq!(listing["entries"][0]["name"], "season1");
        assert_eq!(listing["entries"][1]["name"], "notes.txt");

        let file = body_json(harness.get("/v1/torrents/1/browse/season1/e01.mkv").await?).await?;
        assert_eq!(file["type"], "file");

        let response = harness
            .get("/v1/torrents/1/browse/..%2F..%2Fsecret.txt")
            .await?;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(harness.metrics.snapshot().sandbox_denials_total, 1);

        let response = harness.get("/v1/torrents/1/browse/missing").await?;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        Ok(())
    }

    #[tokio::test]
    async fn export_is_gated_on_completion() -> Result<()> {
        let harness = harness(None)?;
        let response = harness.get("/v1/torrents/2/export").await?;
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(
            body_json(response).await?["type"],
            "https://seedport.dev/problems/incomplete"
        );

        // A finished file of an incomplete torrent is still served.
        let response = harness.get("/v1/torrents/2/files/1/content").await?;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_bytes(response).await?, b"complete".to_vec());
        let response = harness.get("/v1/torrents/2/files/0/content").await?;
        assert_eq!(response.status(), StatusCode::CONFLICT);
        Ok(())
    }

    #[tokio::test]
    async fn ranged_export_returns_partial_content() -> Result<()> {
        let harness = harness(None)?;
        let request = Request::get("/v1/torrents/1/export/season1/e01.mkv")
            .header(RANGE, "bytes=100-199")
            .body(Body::empty())?;
        let response = harness.send(request).await?;
        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(
            header_str(&response, header::CONTENT_RANGE),
            Some("bytes 100-199/1000")
        );
        assert_eq!(header_str(&response, header::CONTENT_LENGTH), Some("100"));
        let body = body_bytes(response).await?;
        assert_eq!(body, harness.payload[100..200].to_vec());

        let request = Request::get("/v1/torrents/1/files/0/content")
            .header(RANGE, "bytes=2000-")
            .body(Body::empty())?;
        let response = harness.send(request).await?;
        assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
        assert_eq!(
            header_str(&response, header::CONTENT_RANGE),
            Some("bytes */1000")
        );

        let response = harness.get("/v1/torrents/1/files/0/content").await?;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_bytes(response).await?, harness.payload);
        Ok(())
    }

    #[tokio::test]
    async fn directory_export_streams_a_zip() -> Result<()> {
        let harness = harness(None)?;
        let response = harness.get("/v1/torrents/1/export?compression=deflate").await?;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(header_str(&response, header::CONTENT_TYPE), Some("application/zip"));
        assert_eq!(
            header_str(&response, header::CONTENT_DISPOSITION),
            Some("attachment; filename=\"Show.zip\"")
        );

        let bytes = body_bytes(response).await?;
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
        let mut files = BTreeMap::new();
        for index in 0..archive.len() {
            let mut entry = archive.by_index(index)?;
            let mut contents = Vec::new();
            entry.read_to_end(&mut contents)?;
            files.insert(entry.name().to_string(), contents);
        }
        assert_eq!(files.get("Show/season1/e01.mkv"), Some(&harness.payload));
        assert_eq!(files.get("Show/notes.txt").map(Vec::as_slice), Some(&b"notes"[..]));
        Ok(())
    }

    #[tokio::test]
    async fn storage_and_cleanup_report_usage() -> Result<()> {
        let harness = harness(None)?;
        let storage = body_json(harness.get("/v1/storage").await?).await?;
        assert!(storage["usage_percent"].is_number());
        assert_eq!(storage["threshold_percent"], 100.0);

        let request = Request::post("/v1/cleanup").body(Body::empty())?;
        let response = harness.send(request).await?;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await?;
        assert!(body["usage_percent"].is_number());
        assert_eq!(body["report"]["evicted_files"].as_array().map(Vec::len), Some(0));
        assert!(harness.tree.path("content/Show/notes.txt").exists());
        Ok(())
    }

    #[tokio::test]
    async fn metrics_count_requests_by_route() -> Result<()> {
        let harness = harness(None)?;
        harness.get("/v1/torrents/1").await?;
        let response = harness.get("/metrics").await?;
        assert_eq!(response.status(), StatusCode::OK);
        let text = String::from_utf8(body_bytes(response).await?).context("metrics utf8")?;
        assert!(text.contains("route=\"/v1/torrents/{id}\""));
        Ok(())
    }
}
