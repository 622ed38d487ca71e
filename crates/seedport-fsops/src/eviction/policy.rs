//! The three ordered eviction steps.
//!
//! Every step tolerates files disappearing underneath it, and a failing step is
//! recorded in the report without preventing the later ones from running.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use globset::Glob;
use seedport_config::EvictionSettings;
use serde::Serialize;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::probe::DiskProbe;
use crate::error::FsOpsError;

/// Transient daemon files to clear: direct children of `dir` whose name matches `pattern`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactRule {
    /// Directory scanned (not recursively).
    pub dir: PathBuf,
    /// Glob matched against file names, e.g. `*.resume`.
    pub pattern: String,
}

impl ArtifactRule {
    /// Build a rule.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, pattern: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            pattern: pattern.into(),
        }
    }
}

/// What one eviction run did.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EvictionReport {
    /// Artifact files removed in step one.
    pub artifacts_removed: usize,
    /// Empty directories removed.
    pub directories_removed: usize,
    /// Payload files removed by escalation, oldest first.
    pub evicted_files: Vec<PathBuf>,
    /// Bytes freed by escalation.
    pub evicted_bytes: u64,
    /// Usage observed before escalation was considered.
    pub usage_before: Option<f64>,
    /// Usage at the end of the run.
    pub usage_after: Option<f64>,
    /// Whether usage exceeded the threshold.
    pub escalated: bool,
    /// Escalation was needed but skipped because in-progress content was unknown.
    pub escalation_skipped: bool,
    /// Failures encountered by individual steps.
    pub errors: Vec<String>,
}

impl EvictionReport {
    /// Metric label for the run.
    #[must_use]
    pub fn outcome(&self) -> &'static str {
        if self.errors.is_empty() && !self.escalation_skipped {
            "ok"
        } else {
            "degraded"
        }
    }

    fn record(&mut self, step: &'static str, err: &FsOpsError) {
        warn!(step, error = %err, "eviction step failed");
        self.errors.push(format!("{step}: {err}"));
    }
}

/// Deletion policy over the content root.
#[derive(Debug, Clone)]
pub struct EvictionPolicy {
    /// Root holding torrent payload.
    pub content_root: PathBuf,
    /// Transient daemon artifacts cleared in step one.
    pub artifacts: Vec<ArtifactRule>,
    /// Minimum age before an artifact is removed.
    pub artifact_grace: Duration,
    /// Minimum age before payload may be evicted.
    pub retention: Duration,
    /// Usage percentage above which payload is evicted.
    pub threshold_percent: f64,
}

impl EvictionPolicy {
    /// Policy over `content_root` using configured thresholds and no artifact rules.
    #[must_use]
    pub fn new(content_root: impl Into<PathBuf>, settings: &EvictionSettings) -> Self {
        Self {
            content_root: content_root.into(),
            artifacts: Vec::new(),
            artifact_grace: settings.artifact_grace,
            retention: settings.retention,
            threshold_percent: settings.threshold_percent,
        }
    }

    /// Add an artifact rule.
    #[must_use]
    pub fn with_artifact(mut self, rule: ArtifactRule) -> Self {
        self.artifacts.push(rule);
        self
    }

    /// Execute one run.
    ///
    /// `protected` lists the content paths of torrents that have not reached
    /// their completion target; `None` means that set is unknown, in which
    /// case payload is never evicted.
    pub fn run(
        &self,
        probe: &dyn DiskProbe,
        protected: Option<&[PathBuf]>,
        now: SystemTime,
    ) -> EvictionReport {
        let mut report = EvictionReport::default();
        let protected: Option<Vec<PathBuf>> =
            protected.map(|paths| paths.iter().map(|path| canonical_or_same(path)).collect());

        for rule in &self.artifacts {
            match self.clear_artifacts(rule, now) {
                Ok(removed) => report.artifacts_removed += removed,
                Err(err) => report.record("artifacts", &err),
            }
        }

        report.directories_removed += self.prune_empty_dirs(protected.as_deref());

        match probe.sample(&self.content_root) {
            Ok(sample) => {
                report.usage_before = Some(sample.usage_percent);
                report.usage_after = Some(sample.usage_percent);
                if sample.usage_percent > self.threshold_percent {
                    report.escalated = true;
                    match protected.as_deref() {
                        Some(protected) => {
                            self.escalate(probe, protected, now, &mut report);
                            report.directories_removed += self.prune_empty_dirs(Some(protected));
                        }
                        None => {
                            warn!(
                                usage_percent = sample.usage_percent,
                                "torrent states unavailable; payload eviction skipped"
                            );
                            report.escalation_skipped = true;
                        }
                    }
                }
            }
            Err(err) => report.record("probe", &err),
        }

        match probe.sample(&self.content_root) {
            Ok(sample) => report.usage_after = Some(sample.usage_percent),
            Err(err) => report.record("probe", &err),
        }
        info!(
            usage_percent = report.usage_after,
            threshold_percent = self.threshold_percent,
            artifacts_removed = report.artifacts_removed,
            directories_removed = report.directories_removed,
            evicted_files = report.evicted_files.len(),
            evicted_bytes = report.evicted_bytes,
            "eviction run finished"
        );
        report
    }

    fn clear_artifacts(&self, rule: &ArtifactRule, now: SystemTime) -> Result<usize, FsOpsError> {
        let matcher = Glob::new(&rule.pattern)
            .map_err(|source| FsOpsError::Glob {
                operation: "eviction.artifact_glob",
                pattern: rule.pattern.clone(),
                source,
            })?
            .compile_matcher();

        let mut removed = 0;
        for entry in WalkDir::new(&rule.dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(Result::ok)
        {
            if !entry.file_type().is_file() || !matcher.is_match(entry.file_name()) {
                continue;
            }
            let Some(age) = age_of(entry.path(), now) else {
                continue;
            };
            if age <= self.artifact_grace {
                continue;
            }
            if self::removed(entry.path(), fs::remove_file(entry.path()))? {
                debug!(path = %entry.path().display(), "removed daemon artifact");
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Remove empty directories bottom-up, never the root or anything protected.
    fn prune_empty_dirs(&self, protected: Option<&[PathBuf]>) -> usize {
        let mut removed = 0;
        for entry in WalkDir::new(&self.content_root)
            .min_depth(1)
            .follow_links(false)
            .contents_first(true)
            .into_iter()
            .filter_map(Result::ok)
        {
            if !entry.file_type().is_dir() {
                continue;
            }
            let path = entry.path();
            if is_protected(&canonical_or_same(path), protected) {
                continue;
            }
            // Fails when not empty or already gone; both mean there is nothing to prune.
            if fs::remove_dir(path).is_ok() {
                debug!(path = %path.display(), "removed empty directory");
                removed += 1;
            }
        }
        removed
    }

    fn escalate(
        &self,
        probe: &dyn DiskProbe,
        protected: &[PathBuf],
        now: SystemTime,
        report: &mut EvictionReport,
    ) {
        let root = canonical_or_same(&self.content_root);
        let mut candidates: Vec<(SystemTime, PathBuf, u64)> = WalkDir::new(&root)
            .min_depth(1)
            .follow_links(false)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| !is_protected(entry.path(), Some(protected)))
            .filter_map(|entry| {
                let metadata = entry.metadata().ok()?;
                let modified = metadata.modified().ok()?;
                let age = now.duration_since(modified).unwrap_or_default();
                (age > self.retention).then(|| (modified, entry.into_path(), metadata.len()))
            })
            .collect();
        candidates.sort();

        for (_, path, size) in candidates {
            match removed(&path, fs::remove_file(&path)) {
                Ok(true) => {
                    info!(path = %path.display(), bytes = size, "evicted payload");
                    report.evicted_files.push(path);
                    report.evicted_bytes += size;
                }
                Ok(false) => continue,
                Err(err) => {
                    report.record("escalation", &err);
                    continue;
                }
            }
            match probe.sample(&self.content_root) {
                Ok(sample) if sample.usage_percent <= self.threshold_percent => return,
                Ok(_) => {}
                Err(err) => {
                    report.record("probe", &err);
                    return;
                }
            }
        }
        warn!("eviction candidates exhausted above threshold");
    }
}

fn is_protected(path: &Path, protected: Option<&[PathBuf]>) -> bool {
    protected.is_some_and(|paths| paths.iter().any(|root| path.starts_with(root)))
}

fn canonical_or_same(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

fn age_of(path: &Path, now: SystemTime) -> Option<Duration> {
    let modified = fs::symlink_metadata(path).ok()?.modified().ok()?;
    Some(now.duration_since(modified).unwrap_or_default())
}

/// Interpret a removal of `path`: `Ok(false)` when it was already gone.
fn removed(path: &Path, outcome: io::Result<()>) -> Result<bool, FsOpsError> {
    match outcome {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(FsOpsError::io("eviction.remove", path, err)),
    }
}
