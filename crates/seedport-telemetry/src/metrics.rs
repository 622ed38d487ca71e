//! Prometheus-backed metrics registry and snapshot helpers.
//!
//! # Design
//! - Encapsulates collector registration to keep the public API small.
//! - Handles are cheap to clone and shared between the HTTP surface and the eviction loop.

use std::sync::Arc;

use prometheus::{
    Encoder, Gauge, IntCounter, IntCounterVec, Opts, Registry, TextEncoder, core::Collector,
};
use serde::Serialize;

use crate::error::{Result, TelemetryError};

/// Prometheus-backed metrics registry shared across services.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    http_requests_total: IntCounterVec,
    exports_total: IntCounterVec,
    sandbox_denials_total: IntCounter,
    eviction_runs_total: IntCounterVec,
    evicted_files_total: IntCounter,
    evicted_bytes_total: IntCounter,
    disk_usage_percent: Gauge,
}

/// Snapshot of selected counters and gauges for health reporting.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// Sandbox violations rejected since start-up.
    pub sandbox_denials_total: u64,
    /// Payload files removed by eviction since start-up.
    pub evicted_files_total: u64,
    /// Payload bytes removed by eviction since start-up.
    pub evicted_bytes_total: u64,
    /// Usage percentage observed at the end of the latest eviction run.
    pub disk_usage_percent: f64,
}

impl Metrics {
    /// Construct a new metrics registry with the standard collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be
    /// built or registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let http_requests_total = register(
            &registry,
            "http_requests_total",
            IntCounterVec::new(
                Opts::new("http_requests_total", "Total HTTP requests received"),
                &["route", "code"],
            ),
        )?;
        let exports_total = register(
            &registry,
            "exports_total",
            IntCounterVec::new(
                Opts::new("exports_total", "Content exports by kind and outcome"),
                &["kind", "outcome"],
            ),
        )?;
        let sandbox_denials_total = register(
            &registry,
            "sandbox_denials_total",
            IntCounter::with_opts(Opts::new(
                "sandbox_denials_total",
                "Requests rejected for escaping the content root",
            )),
        )?;
        let eviction_runs_total = register(
            &registry,
            "eviction_runs_total",
            IntCounterVec::new(
                Opts::new("eviction_runs_total", "Eviction runs by outcome"),
                &["outcome"],
            ),
        )?;
        let evicted_files_total = register(
            &registry,
            "evicted_files_total",
            IntCounter::with_opts(Opts::new(
                "evicted_files_total",
                "Payload files deleted by eviction",
            )),
        )?;
        let evicted_bytes_total = register(
            &registry,
            "evicted_bytes_total",
            IntCounter::with_opts(Opts::new(
                "evicted_bytes_total",
                "Payload bytes deleted by eviction",
            )),
        )?;
        let disk_usage_percent = register(
            &registry,
            "disk_usage_percent",
            Gauge::with_opts(Opts::new(
                "disk_usage_percent",
                "Content root usage after the latest eviction run",
            )),
        )?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                http_requests_total,
                exports_total,
                sandbox_denials_total,
                eviction_runs_total,
                evicted_files_total,
                evicted_bytes_total,
                disk_usage_percent,
            }),
        })
    }

    /// Increment the HTTP request counter for the given route and status code.
    pub fn inc_http_request(&self, route: &str, status: u16) {
        self.inner
            .http_requests_total
            .with_label_values(&[route, &status.to_string()])
            .inc();
    }

    /// Record an export attempt (`archive`, `file`, `range`) and its outcome.
    pub fn inc_export(&self, kind: &str, outcome: &str) {
        self.inner
            .exports_total
            .with_label_values(&[kind, outcome])
            .inc();
    }

    /// Increment the sandbox denial counter.
    pub fn inc_sandbox_denial(&self) {
        self.inner.sandbox_denials_total.inc();
    }

    /// Record the outcome of one eviction run along with what it removed.
    ///
    /// The usage gauge keeps its previous value when the run could not sample the disk.
    pub fn observe_eviction(
        &self,
        outcome: &str,
        files: u64,
        bytes: u64,
        usage_percent: Option<f64>,
    ) {
        self.inner
            .eviction_runs_total
            .with_label_values(&[outcome])
            .inc();
        self.inner.evicted_files_total.inc_by(files);
        self.inner.evicted_bytes_total.inc_by(bytes);
        if let Some(percent) = usage_percent {
            self.inner.disk_usage_percent.set(percent);
        }
    }

    /// Render the metrics registry using the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be encoded or if the encoded
    /// buffer is not valid UTF-8.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|source| TelemetryError::MetricsRender { source })?;
        String::from_utf8(buffer).map_err(|source| TelemetryError::MetricsUtf8 { source })
    }

    /// Take a point-in-time snapshot of the most relevant counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            sandbox_denials_total: self.inner.sandbox_denials_total.get(),
            evicted_files_total: self.inner.evicted_files_total.get(),
            evicted_bytes_total: self.inner.evicted_bytes_total.get(),
            disk_usage_percent: self.inner.disk_usage_percent.get(),
        }
    }
}

fn register<C>(
    registry: &Registry,
    name: &'static str,
    collector: prometheus::Result<C>,
) -> Result<C>
where
    C: Collector + Clone + 'static,
{
    let collector = collector.map_err(|source| TelemetryError::MetricsRegister { name, source })?;
    registry
        .register(Box::new(collector.clone()))
        .map_err(|source| TelemetryError::MetricsRegister { name, source })?;
    Ok(collector)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_includes_recorded_series() -> Result<()> {
        let metrics = Metrics::new()?;
        metrics.inc_http_request("/v1/torrents", 200);
        metrics.inc_export("archive", "completed");
        metrics.inc_sandbox_denial();
        metrics.observe_eviction("ok", 2, 2_048, Some(87.5));

        let rendered = metrics.render()?;
        assert!(rendered.contains("http_requests_total"));
        assert!(rendered.contains("route=\"/v1/torrents\""));
        assert!(rendered.contains("exports_total"));
        assert!(rendered.contains("kind=\"archive\""));
        assert!(rendered.contains("eviction_runs_total"));
        assert!(rendered.contains("disk_usage_percent 87.5"));
        Ok(())
    }

    #[test]
    fn snapshot_tracks_counters() -> anyhow::Result<()> {
        let metrics = Metrics::new()?;
        metrics.inc_sandbox_denial();
        metrics.inc_sandbox_denial();
        metrics.observe_eviction("ok", 1, 10, Some(91.0));
        metrics.observe_eviction("ok", 3, 30, Some(80.0));
        metrics.observe_eviction("degraded", 0, 0, None);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.sandbox_denials_total, 2);
        assert_eq!(snapshot.evicted_files_total, 4);
        assert_eq!(snapshot.evicted_bytes_total, 40);
        assert!((snapshot.disk_usage_percent - 80.0).abs() < f64::EPSILON);

        let json = serde_json::to_value(&snapshot)?;
        assert_eq!(json["evicted_files_total"], 4);
        Ok(())
    }
}
