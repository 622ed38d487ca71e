//! Filesystem usage sampling for the eviction policy.

use std::path::Path;

use serde::Serialize;

use crate::error::{FsOpsError, FsOpsResult};

/// Point-in-time usage of the filesystem holding a path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DiskUsageSample {
    /// Filesystem capacity in bytes.
    pub total_bytes: u64,
    /// Bytes in use.
    pub used_bytes: u64,
    /// Bytes available to unprivileged writers.
    pub free_bytes: u64,
    /// `used / (used + free)` as a percentage, matching what `df` reports.
    pub usage_percent: f64,
}

impl DiskUsageSample {
    /// Build a sample from raw byte counts.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn new(total_bytes: u64, used_bytes: u64, free_bytes: u64) -> Self {
        let visible = used_bytes.saturating_add(free_bytes);
        let usage_percent = if visible == 0 {
            0.0
        } else {
            used_bytes as f64 / visible as f64 * 100.0
        };
        Self {
            total_bytes,
            used_bytes,
            free_bytes,
            usage_percent,
        }
    }
}

/// Source of disk usage figures.
pub trait DiskProbe: Send + Sync {
    /// Sample usage of the filesystem holding `path`.
    ///
    /// # Errors
    ///
    /// Returns [`FsOpsError::Probe`] when statistics cannot be read.
    fn sample(&self, path: &Path) -> FsOpsResult<DiskUsageSample>;
}

/// Probe backed by `statvfs(3)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StatvfsProbe;

impl DiskProbe for StatvfsProbe {
    fn sample(&self, path: &Path) -> FsOpsResult<DiskUsageSample> {
        let stats = nix::sys::statvfs::statvfs(path).map_err(|source| FsOpsError::Probe {
            path: path.to_path_buf(),
            source,
        })?;
        let fragment = widen(stats.fragment_size());
        let total = widen(stats.blocks()).saturating_mul(fragment);
        let free = widen(stats.blocks_free()).saturating_mul(fragment);
        let available = widen(stats.blocks_available()).saturating_mul(fragment);
        Ok(DiskUsageSample::new(
            total,
            total.saturating_sub(free),
            available,
        ))
    }
}

fn widen<T: Into<u64>>(value: T) -> u64 {
    value.into()
}
