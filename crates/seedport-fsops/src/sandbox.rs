//! Path resolution guard for everything served from the content root.
//!
//! # Design
//! - A lexical pass rejects absolute paths and `..` climbs before touching the
//!   filesystem, so traversal attempts are reported as denials even when the
//!   target does not exist.
//! - Both the torrent root and the target are then canonicalised, which resolves
//!   symlinks; the target must equal the root or sit beneath it component-wise.
//! - Denials are logged as security events, distinct from ordinary misses.

use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use tokio::fs;
use tracing::warn;

use crate::error::{FsOpsError, FsOpsResult};

/// A validated location inside a torrent's content directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportTarget {
    /// Canonical absolute path of the target.
    pub path: PathBuf,
    /// Canonical absolute path of the torrent root the target lives under.
    pub root: PathBuf,
    /// Whether the target is a directory.
    pub is_dir: bool,
    /// Size in bytes (zero for directories).
    pub size: u64,
    /// Last modification time, when the filesystem reports one.
    pub modified: Option<DateTime<Utc>>,
}

impl ExportTarget {
    /// Path of the target relative to the torrent root.
    #[must_use]
    pub fn relative(&self) -> &Path {
        self.path.strip_prefix(&self.root).unwrap_or(Path::new(""))
    }
}

/// Resolve `sub_path` under `content_root/torrent_name`, refusing anything that escapes.
///
/// # Errors
///
/// - [`FsOpsError::AccessDenied`] when the request escapes the torrent root.
/// - [`FsOpsError::NotFound`] when the root or the target does not exist.
pub async fn resolve(
    content_root: &Path,
    torrent_name: &str,
    sub_path: &str,
) -> FsOpsResult<ExportTarget> {
    let requested = content_root.join(torrent_name).join(sub_path);
    if !is_single_component(torrent_name) || !stays_within(Path::new(sub_path)) {
        return Err(deny(requested, content_root.join(torrent_name)));
    }

    let root_input = content_root.join(torrent_name);
    let root = fs::canonicalize(&root_input)
        .await
        .map_err(|err| FsOpsError::io("sandbox.canonicalize_root", &root_input, err))?;
    let target = fs::canonicalize(&requested)
        .await
        .map_err(|err| FsOpsError::io("sandbox.canonicalize_target", &requested, err))?;

    if !target.starts_with(&root) {
        return Err(deny(requested, root));
    }

    let metadata = fs::metadata(&target)
        .await
        .map_err(|err| FsOpsError::io("sandbox.metadata", &target, err))?;
    Ok(ExportTarget {
        is_dir: metadata.is_dir(),
        size: if metadata.is_dir() { 0 } else { metadata.len() },
        modified: metadata.modified().ok().map(system_time_to_utc),
        path: target,
        root,
    })
}

/// Sandbox bound to the configured content root.
///
/// The daemon reports each torrent's download directory; this additionally
/// refuses directories that resolve outside the root the service was configured with.
#[derive(Debug, Clone)]
pub struct Sandbox {
    content_root: PathBuf,
}

impl Sandbox {
    /// Bind to a content root.
    #[must_use]
    pub fn new(content_root: impl Into<PathBuf>) -> Self {
        Self {
            content_root: content_root.into(),
        }
    }

    /// Configured content root.
    #[must_use]
    pub fn content_root(&self) -> &Path {
        &self.content_root
    }

    /// Resolve a path inside a torrent whose payload lives in `download_dir`.
    ///
    /// # Errors
    ///
    /// Same as [`resolve`], plus [`FsOpsError::AccessDenied`] when `download_dir`
    /// lies outside the configured content root.
    pub async fn resolve(
        &self,
        download_dir: &Path,
        torrent_name: &str,
        sub_path: &str,
    ) -> FsOpsResult<ExportTarget> {
        let root = fs::canonicalize(&self.content_root).await.map_err(|err| {
            FsOpsError::io("sandbox.canonicalize_content_root", &self.content_root, err)
        })?;
        let dir = fs::canonicalize(download_dir).await.map_err(|err| {
            FsOpsError::io("sandbox.canonicalize_download_dir", download_dir, err)
        })?;
        if !dir.starts_with(&root) {
            return Err(deny(download_dir.to_path_buf(), root));
        }
        resolve(&dir, torrent_name, sub_path).await
    }
}

fn is_single_component(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// Lexical check: relative, and never climbs above its starting point.
fn stays_within(sub_path: &Path) -> bool {
    let mut depth: usize = 0;
    for component in sub_path.components() {
        match component {
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
            Component::ParentDir => match depth.checked_sub(1) {
                Some(next) => depth = next,
                None => return false,
            },
            Component::RootDir | Component::Prefix(_) => return false,
        }
    }
    true
}

fn deny(path: PathBuf, root: PathBuf) -> FsOpsError {
    warn!(
        security = true,
        path = %path.display(),
        root = %root.display(),
        "rejected path outside content root"
    );
    FsOpsError::AccessDenied { path, root }
}

pub(crate) fn system_time_to_utc(time: SystemTime) -> DateTime<Utc> {
    DateTime::<Utc>::from(time)
}
