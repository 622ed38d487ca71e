//! Scheduling for eviction runs.
//!
//! Runs are serialised: a trigger that arrives while another run is in progress
//! waits for it and then performs its own pass. Policy execution happens on the
//! blocking pool so request handling never waits on a directory walk.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use seedport_telemetry::Metrics;
use seedport_torrent_core::TorrentInspector;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::policy::{EvictionPolicy, EvictionReport};
use super::probe::{DiskProbe, DiskUsageSample};
use crate::error::{FsOpsError, FsOpsResult};

/// Owns the eviction policy and decides when it runs.
#[derive(Clone)]
pub struct EvictionService {
    policy: Arc<EvictionPolicy>,
    probe: Arc<dyn DiskProbe>,
    inspector: Arc<dyn TorrentInspector>,
    metrics: Metrics,
    run_lock: Arc<Mutex<()>>,
    wake: Arc<Notify>,
}

impl EvictionService {
    /// Build a service; nothing runs until [`Self::trigger`], [`Self::nudge`] or [`Self::spawn`].
    #[must_use]
    pub fn new(
        policy: EvictionPolicy,
        probe: Arc<dyn DiskProbe>,
        inspector: Arc<dyn TorrentInspector>,
        metrics: Metrics,
    ) -> Self {
        Self {
            policy: Arc::new(policy),
            probe,
            inspector,
            metrics,
            run_lock: Arc::new(Mutex::new(())),
            wake: Arc::new(Notify::new()),
        }
    }

    /// Policy this service executes.
    #[must_use]
    pub fn policy(&self) -> &EvictionPolicy {
        &self.policy
    }

    /// Current usage of the filesystem holding the content root.
    ///
    /// # Errors
    ///
    /// Returns [`FsOpsError::Probe`] when statistics cannot be read.
    pub fn storage_usage(&self) -> FsOpsResult<DiskUsageSample> {
        self.probe.sample(&self.policy.content_root)
    }

    /// Run the policy now and return what it did.
    ///
    /// # Errors
    ///
    /// Returns [`FsOpsError::Join`] if the blocking task panics. Step failures
    /// are reported inside the [`EvictionReport`] instead.
    pub async fn trigger(&self) -> FsOpsResult<EvictionReport> {
        let _running = self.run_lock.lock().await;
        let protected = self.protected_paths().await;

        let policy = Arc::clone(&self.policy);
        let probe = Arc::clone(&self.probe);
        let report = tokio::task::spawn_blocking(move || {
            policy.run(probe.as_ref(), protected.as_deref(), SystemTime::now())
        })
        .await
        .map_err(|source| FsOpsError::Join {
            operation: "eviction.run",
            source,
        })?;

        self.metrics.observe_eviction(
            report.outcome(),
            u64::try_from(report.evicted_files.len()).unwrap_or(u64::MAX),
            report.evicted_bytes,
            report.usage_after,
        );
        Ok(report)
    }

    /// Request a run soon without waiting for it, e.g. after content removal.
    ///
    /// Has an effect only while [`Self::spawn`]'s loop is running; repeated
    /// nudges before the loop wakes collapse into one run.
    pub fn nudge(&self) {
        self.wake.notify_one();
    }

    /// Start the timer loop. The first run happens immediately.
    pub fn spawn<F>(&self, interval: Duration, shutdown: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let service = self.clone();
        tokio::spawn(async move {
            tokio::pin!(shutdown);
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(interval_secs = interval.as_secs(), "eviction scheduler started");
            loop {
                tokio::select! {
                    () = &mut shutdown => break,
                    _ = ticker.tick() => service.run_logged("timer").await,
                    () = service.wake.notified() => service.run_logged("removal").await,
                }
            }
            info!("eviction scheduler stopped");
        })
    }

    async fn run_logged(&self, trigger: &'static str) {
        match self.trigger().await {
            Ok(report) => debug!(trigger, outcome = report.outcome(), "eviction run complete"),
            Err(err) => warn!(trigger, error = %err, "eviction run failed"),
        }
    }

    /// Content paths of torrents still short of their completion target.
    async fn protected_paths(&self) -> Option<Vec<PathBuf>> {
        match self.inspector.list().await {
            Ok(torrents) => Some(
                torrents
                    .iter()
                    .filter(|torrent| !torrent.is_complete())
                    .map(seedport_torrent_core::TorrentSummary::content_path)
                    .collect(),
            ),
            Err(err) => {
                warn!(error = %err, "failed to list torrents for eviction");
                None
            }
        }
    }
}
