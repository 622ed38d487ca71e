//! Directory listings and single-file descriptors for sandboxed targets.
//!
//! # Design
//! - Operates only on an [`ExportTarget`] already validated by the sandbox.
//! - Symlinked entries are listed under their target's kind only when the target
//!   stays inside the torrent root; escaping links are omitted.
//! - Entries that vanish while the listing is built are skipped.
//! - Sorted output: directories first, then files, each by name.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::fs;
use tracing::{debug, warn};

use crate::error::{FsOpsError, FsOpsResult};
use crate::sandbox::{ExportTarget, system_time_to_utc};

/// Kind of a listed entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// A directory.
    Directory,
    /// A regular file.
    File,
}

/// One child of a listed directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryEntry {
    /// File name.
    pub name: String,
    /// Entry kind.
    pub kind: EntryKind,
    /// Size in bytes (zero for directories).
    pub size: u64,
    /// Last modification time.
    pub modified: Option<DateTime<Utc>>,
    /// Lowercase extension without the dot, for files that have one.
    pub extension: Option<String>,
    /// Path relative to the torrent root, `/`-separated.
    pub relative_path: String,
}

/// Descriptor returned when the target is a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileDescriptor {
    /// File name.
    pub name: String,
    /// Size in bytes.
    pub size: u64,
    /// Last modification time.
    pub modified: Option<DateTime<Utc>>,
    /// Lowercase extension without the dot.
    pub extension: Option<String>,
    /// Path relative to the torrent root, `/`-separated.
    pub relative_path: String,
}

/// Result of browsing a sandboxed target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Listing {
    /// The target is a directory.
    Directory {
        /// Path relative to the torrent root.
        relative_path: String,
        /// Sorted children.
        entries: Vec<DirectoryEntry>,
    },
    /// The target is a single file.
    File {
        /// File details.
        file: FileDescriptor,
    },
}

/// List a directory target or describe a file target.
///
/// # Errors
///
/// Returns [`FsOpsError::NotFound`] when the target vanished, or
/// [`FsOpsError::Io`] when the directory cannot be read.
pub async fn browse(target: &ExportTarget) -> FsOpsResult<Listing> {
    let relative = slash_path(target.relative());
    if !target.is_dir {
        let name = file_name(&target.path);
        return Ok(Listing::File {
            file: FileDescriptor {
                extension: extension_of(&name),
                name,
                size: target.size,
                modified: target.modified,
                relative_path: relative,
            },
        });
    }

    let mut reader = fs::read_dir(&target.path)
        .await
        .map_err(|err| FsOpsError::io("browse.read_dir", &target.path, err))?;
    let mut entries = Vec::new();
    while let Some(entry) = reader
        .next_entry()
        .await
        .map_err(|err| FsOpsError::io("browse.next_entry", &target.path, err))?
    {
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();
        let Some(metadata) = contained_metadata(&path, &target.root).await else {
            continue;
        };
        let kind = if metadata.is_dir() {
            EntryKind::Directory
        } else if metadata.is_file() {
            EntryKind::File
        } else {
            continue;
        };
        let relative_path = if relative.is_empty() {
            name.clone()
        } else {
            format!("{relative}/{name}")
        };
        entries.push(DirectoryEntry {
            extension: (kind == EntryKind::File)
                .then(|| extension_of(&name))
                .flatten(),
            size: if kind == EntryKind::File {
                metadata.len()
            } else {
                0
            },
            modified: metadata.modified().ok().map(system_time_to_utc),
            name,
            kind,
            relative_path,
        });
    }

    entries.sort_by(|a, b| a.kind.cmp(&b.kind).then_with(|| a.name.cmp(&b.name)));
    Ok(Listing::Directory {
        relative_path: relative,
        entries,
    })
}

/// Metadata of `path`, following symlinks only when they stay inside `root`.
async fn contained_metadata(path: &Path, root: &Path) -> Option<std::fs::Metadata> {
    let link = match fs::symlink_metadata(path).await {
        Ok(metadata) => metadata,
        Err(err) => {
            debug!(path = %path.display(), error = %err, "entry vanished during listing");
            return None;
        }
    };
    if !link.file_type().is_symlink() {
        return Some(link);
    }
    match fs::canonicalize(path).await {
        Ok(resolved) if resolved.starts_with(root) => fs::metadata(&resolved).await.ok(),
        Ok(resolved) => {
            warn!(
                security = true,
                path = %path.display(),
                target = %resolved.display(),
                "omitting symlink that escapes the torrent root"
            );
            None
        }
        Err(_) => None,
    }
}

pub(crate) fn slash_path(path: &Path) -> String {
    path.components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn extension_of(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
}
