//! Streaming zip builder for directory exports.
//!
//! # Design
//! - Entries are written straight into the caller's sink using data descriptors,
//!   so the archive never needs to be seekable or buffered as a whole.
//! - At most one file is open at a time and its bytes pass through a fixed-size
//!   chunk buffer.
//! - Entries that vanish while the walk is in progress are skipped and recorded.
//!   A sink that stops accepting bytes ends the build immediately.

use std::path::{Path, PathBuf};

use async_zip::base::write::ZipFileWriter;
use async_zip::error::ZipError;
use async_zip::{Compression, ZipEntryBuilder};
use seedport_config::CompressionPolicy;
use tokio::fs::File;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::compat::FuturesAsyncWriteCompatExt;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::browse::slash_path;
use crate::error::{FsOpsError, FsOpsResult};
use crate::range::copy_chunks;

/// Outcome of a completed archive build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveSummary {
    /// Entries written, directories included.
    pub entries: usize,
    /// File payload bytes written (before compression).
    pub bytes: u64,
    /// Paths that disappeared or could not be read and were left out.
    pub skipped: Vec<PathBuf>,
}

/// `name` with anything outside `[A-Za-z0-9.- ]` replaced by `_`, safe for `Content-Disposition`.
#[must_use]
pub fn safe_file_name(name: &str) -> String {
    name.trim()
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-' | ' ') {
                ch
            } else {
                '_'
            }
        })
        .collect()
}

/// Download name for an archive of `name`.
#[must_use]
pub fn archive_file_name(name: &str) -> String {
    let cleaned = safe_file_name(name);
    if cleaned.is_empty() {
        "export.zip".to_string()
    } else {
        format!("{cleaned}.zip")
    }
}

#[derive(Debug)]
enum WalkItem {
    Directory { name: String },
    File { path: PathBuf, name: String },
    Skipped(PathBuf),
}

/// Write a zip of `root` into `sink`, with every entry nested under `archive_root_name/`.
///
/// The sink is shut down once the central directory has been written.
///
/// # Errors
///
/// - [`FsOpsError::NotFound`] when `root` itself is gone.
/// - [`FsOpsError::SinkClosed`] when the sink stops accepting bytes.
/// - [`FsOpsError::Io`] when an open file fails mid-read.
/// - [`FsOpsError::Archive`] on zip framing failures.
pub async fn stream_archive<W>(
    root: &Path,
    archive_root_name: &str,
    sink: W,
    compression: CompressionPolicy,
) -> FsOpsResult<ArchiveSummary>
where
    W: AsyncWrite + Unpin,
{
    let items = collect_entries(root.to_path_buf(), archive_root_name.to_string()).await?;
    let method = match compression {
        CompressionPolicy::Store => Compression::Stored,
        CompressionPolicy::Deflate => Compression::Deflate,
    };

    let mut writer = ZipFileWriter::with_tokio(sink);
    let mut summary = ArchiveSummary::default();
    for item in items {
        match item {
            WalkItem::Skipped(path) => summary.skipped.push(path),
            WalkItem::Directory { name } => {
                let entry = ZipEntryBuilder::new(format!("{name}/").into(), Compression::Stored);
                writer
                    .write_entry_whole(entry, &[])
                    .await
                    .map_err(|err| zip_error("archive.write_directory", err))?;
                summary.entries += 1;
            }
            WalkItem::File { path, name } => {
                let file = match File::open(&path).await {
                    Ok(file) => file,
                    Err(err) => {
                        warn!(
                            path = %path.display(),
                            error = %err,
                            "skipping unreadable archive entry"
                        );
                        summary.skipped.push(path);
                        continue;
                    }
                };
                let entry = ZipEntryBuilder::new(name.into(), method);
                let mut stream = writer
                    .write_entry_stream(entry)
                    .await
                    .map_err(|err| zip_error("archive.open_entry", err))?
                    .compat_write();
                summary.bytes += copy_chunks(file, &mut stream, "archive.copy_entry", &path).await?;
                stream
                    .into_inner()
                    .close()
                    .await
                    .map_err(|err| zip_error("archive.close_entry", err))?;
                summary.entries += 1;
            }
        }
    }

    let mut sink = writer
        .close()
        .await
        .map_err(|err| zip_error("archive.finish", err))?
        .into_inner();
    sink.shutdown()
        .await
        .map_err(|source| FsOpsError::SinkClosed {
            operation: "archive.shutdown",
            source,
        })?;

    for path in &summary.skipped {
        warn!(path = %path.display(), "archive entry skipped");
    }
    debug!(
        entries = summary.entries,
        bytes = summary.bytes,
        skipped = summary.skipped.len(),
        "archive complete"
    );
    Ok(summary)
}

/// Upstream IO failures inside the zip writer are writes into the sink.
fn zip_error(operation: &'static str, err: ZipError) -> FsOpsError {
    match err {
        ZipError::UpstreamReadError(source) => FsOpsError::SinkClosed { operation, source },
        source => FsOpsError::Archive { operation, source },
    }
}

async fn collect_entries(root: PathBuf, archive_root_name: String) -> FsOpsResult<Vec<WalkItem>> {
    tokio::task::spawn_blocking(move || walk(&root, &archive_root_name))
        .await
        .map_err(|source| FsOpsError::Join {
            operation: "archive.walk",
            source,
        })?
}

fn walk(root: &Path, archive_root_name: &str) -> FsOpsResult<Vec<WalkItem>> {
    let canonical_root = std::fs::canonicalize(root)
        .map_err(|err| FsOpsError::io("archive.canonicalize", root, err))?;
    let mut items = Vec::new();
    for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                let path = err.path().map_or_else(|| root.to_path_buf(), Path::to_path_buf);
                if err.depth() == 0 {
                    return Err(match err.into_io_error() {
                        Some(source) => FsOpsError::io("archive.walk", path, source),
                        None => FsOpsError::NotFound { path },
                    });
                }
                items.push(WalkItem::Skipped(path));
                continue;
            }
        };

        let path = entry.path().to_path_buf();
        let relative = path.strip_prefix(root).unwrap_or(Path::new(""));
        let name = if relative.as_os_str().is_empty() {
            archive_root_name.to_string()
        } else {
            format!("{archive_root_name}/{}", slash_path(relative))
        };

        let file_type = entry.file_type();
        if file_type.is_dir() {
            items.push(WalkItem::Directory { name });
        } else if file_type.is_file() {
            items.push(WalkItem::File { path, name });
        } else if file_type.is_symlink() {
            match std::fs::canonicalize(&path) {
                Ok(resolved) if resolved.starts_with(&canonical_root) && resolved.is_file() => {
                    items.push(WalkItem::File { path, name });
                }
                Ok(resolved) if !resolved.starts_with(&canonical_root) => {
                    warn!(
                        security = true,
                        path = %path.display(),
                        target = %resolved.display(),
                        "symlink escapes content root; excluded from archive"
                    );
                    items.push(WalkItem::Skipped(path));
                }
                _ => items.push(WalkItem::Skipped(path)),
            }
        }
    }
    Ok(items)
}
