//! Range-aware file serving.
//!
//! # Design
//! - A single `bytes=` range per request; anything else is unsatisfiable rather
//!   than silently served in full.
//! - The returned payload is a seeked file capped with `take`, so reads never run
//!   past the range end and nothing is buffered beyond the caller's chunk size.
//! - The file handle lives inside the payload and is released when it is dropped.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeekExt, AsyncWrite, AsyncWriteExt, Take};

use crate::error::{FsOpsError, FsOpsResult};

/// Inclusive byte range within a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    /// First byte served.
    pub start: u64,
    /// Last byte served (inclusive).
    pub end: u64,
}

impl ByteRange {
    /// Parse a `Range` header against a file of `size` bytes.
    ///
    /// Accepts `bytes=start-end`, `bytes=start-` (to end of file) and
    /// `bytes=-suffix` (last `suffix` bytes).
    ///
    /// # Errors
    ///
    /// Returns [`FsOpsError::RangeNotSatisfiable`] for malformed headers, multiple
    /// ranges, and ranges outside `0 <= start <= end < size`.
    pub fn parse(header: &str, size: u64) -> FsOpsResult<Self> {
        let unsatisfiable = || FsOpsError::RangeNotSatisfiable {
            size,
            header: header.to_string(),
        };
        let spec = header
            .trim()
            .strip_prefix("bytes=")
            .ok_or_else(unsatisfiable)?
            .trim();
        if spec.contains(',') || size == 0 {
            return Err(unsatisfiable());
        }
        let (start, end) = spec.split_once('-').ok_or_else(unsatisfiable)?;
        let (start, end) = (start.trim(), end.trim());

        let (start, end) = if start.is_empty() {
            let suffix: u64 = end.parse().map_err(|_| unsatisfiable())?;
            if suffix == 0 {
                return Err(unsatisfiable());
            }
            (size.saturating_sub(suffix), size - 1)
        } else {
            let start: u64 = start.parse().map_err(|_| unsatisfiable())?;
            let end: u64 = if end.is_empty() {
                size - 1
            } else {
                end.parse().map_err(|_| unsatisfiable())?
            };
            (start, end)
        };

        if start > end || end >= size {
            return Err(unsatisfiable());
        }
        Ok(Self { start, end })
    }

    /// Number of bytes covered.
    #[must_use]
    pub const fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Always false; a parsed range covers at least one byte.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        false
    }

    /// `Content-Range` value for a file of `size` bytes.
    #[must_use]
    pub fn content_range(&self, size: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, size)
    }
}

/// `Content-Range` value for an unsatisfiable request.
#[must_use]
pub fn unsatisfied_range(size: u64) -> String {
    format!("bytes */{size}")
}

/// An opened file positioned and capped for serving.
#[derive(Debug)]
pub struct FilePayload {
    /// Path being served.
    pub path: PathBuf,
    /// Total file size.
    pub size: u64,
    /// Range being served; `None` means the whole file.
    pub range: Option<ByteRange>,
    /// Reader positioned at the first byte, yielding exactly [`Self::content_length`] bytes.
    pub reader: Take<File>,
}

impl FilePayload {
    /// Bytes the reader will yield.
    #[must_use]
    pub fn content_length(&self) -> u64 {
        self.range.map_or(self.size, |range| range.len())
    }

    /// Stream the payload into `sink`, returning the number of bytes written.
    ///
    /// # Errors
    ///
    /// Returns [`FsOpsError::Io`] on read failures and [`FsOpsError::SinkClosed`]
    /// when the sink stops accepting bytes.
    pub async fn write_to<W>(self, sink: &mut W) -> FsOpsResult<u64>
    where
        W: AsyncWrite + Unpin,
    {
        copy_chunks(self.reader, sink, "range.write_to", &self.path).await
    }
}

/// Open `path` for serving, honouring an optional `Range` header.
///
/// # Errors
///
/// - [`FsOpsError::NotFound`] when the file vanished.
/// - [`FsOpsError::RangeNotSatisfiable`] when the header cannot be honoured.
/// - [`FsOpsError::InvalidInput`] when `path` is a directory.
pub async fn open_file(path: &Path, range_header: Option<&str>) -> FsOpsResult<FilePayload> {
    let mut file = File::open(path)
        .await
        .map_err(|err| FsOpsError::io("range.open", path, err))?;
    let metadata = file
        .metadata()
        .await
        .map_err(|err| FsOpsError::io("range.metadata", path, err))?;
    if metadata.is_dir() {
        return Err(FsOpsError::InvalidInput {
            field: "path",
            reason: "is_directory",
            value: Some(path.display().to_string()),
        });
    }
    let size = metadata.len();

    let range = range_header
        .map(|header| ByteRange::parse(header, size))
        .transpose()?;
    let length = match range {
        Some(range) => {
            file.seek(SeekFrom::Start(range.start))
                .await
                .map_err(|err| FsOpsError::io("range.seek", path, err))?;
            range.len()
        }
        None => size,
    };

    Ok(FilePayload {
        path: path.to_path_buf(),
        size,
        range,
        reader: file.take(length),
    })
}

const CHUNK: usize = 64 * 1024;

/// Copy in fixed chunks, telling read failures apart from sink failures.
pub(crate) async fn copy_chunks<R, W>(
    mut reader: R,
    sink: &mut W,
    operation: &'static str,
    path: &Path,
) -> FsOpsResult<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buffer = vec![0_u8; CHUNK];
    let mut written = 0_u64;
    loop {
        let read = reader
            .read(&mut buffer)
            .await
            .map_err(|err| FsOpsError::io(operation, path, err))?;
        if read == 0 {
            break;
        }
        sink.write_all(&buffer[..read])
            .await
            .map_err(|source| FsOpsError::SinkClosed { operation, source })?;
        written += read as u64;
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use seedport_test_support::fixtures::{ContentTree, sample_bytes};

    fn parse(header: &str, size: u64) -> Option<ByteRange> {
        ByteRange::parse(header, size).ok()
    }

    #[test]
    fn parses_supported_forms() {
        assert_eq!(
            parse("bytes=100-199", 1000),
            Some(ByteRange { start: 100, end: 199 })
        );
        assert_eq!(
            parse("bytes=900-", 1000),
            Some(ByteRange { start: 900, end: 999 })
        );
        assert_eq!(
            parse("bytes=-100", 1000),
            Some(ByteRange { start: 900, end: 999 })
        );
        assert_eq!(
            parse("bytes=-5000", 1000),
            Some(ByteRange { start: 0, end: 999 })
        );
        assert_eq!(
            parse(" bytes=0-0 ", 1),
            Some(ByteRange { start: 0, end: 0 })
        );
    }

    #[test]
    fn rejects_unsatisfiable_forms() {
        for header in [
            "bytes=200-100",
            "bytes=0-1000",
            "bytes=1000-",
            "bytes=0-1,5-6",
            "bytes=-0",
            "bytes=abc-",
            "items=0-1",
            "bytes=",
        ] {
            assert!(
                matches!(
                    ByteRange::parse(header, 1000),
                    Err(FsOpsError::RangeNotSatisfiable { size: 1000, .. })
                ),
                "{header} should be unsatisfiable"
            );
        }
        assert!(ByteRange::parse("bytes=0-", 0).is_err());
    }

    #[test]
    fn content_range_formats() {
        let range = ByteRange { start: 100, end: 199 };
        assert_eq!(range.len(), 100);
        assert_eq!(range.content_range(1000), "bytes 100-199/1000");
        assert_eq!(unsatisfied_range(1000), "bytes */1000");
    }

    #[tokio::test]
    async fn ranged_read_yields_exact_slice() -> Result<()> {
        let tree = ContentTree::new()?;
        let payload = sample_bytes(1000, 3);
        let path = tree.write("Show/file.bin", &payload)?;

        let file = open_file(&path, Some("bytes=100-199")).await?;
        assert_eq!(file.content_length(), 100);
        assert_eq!(
            file.range.map(|range| range.content_range(file.size)),
            Some("bytes 100-199/1000".to_string())
        );
        let mut sink = Vec::new();
        let written = file.write_to(&mut sink).await?;
        assert_eq!(written, 100);
        assert_eq!(sink, payload[100..200].to_vec());
        Ok(())
    }

    #[tokio::test]
    async fn whole_file_without_range() -> Result<()> {
        let tree = ContentTree::new()?;
        let payload = sample_bytes(4096, 9);
        let path = tree.write("Show/file.bin", &payload)?;

        let file = open_file(&path, None).await?;
        assert!(file.range.is_none());
        assert_eq!(file.content_length(), 4096);
        let mut sink = Vec::new();
        file.write_to(&mut sink).await?;
        assert_eq!(sink, payload);
        Ok(())
    }

    #[tokio::test]
    async fn missing_file_is_not_found() -> Result<()> {
        let tree = ContentTree::new()?;
        let result = open_file(&tree.path("gone.bin"), None).await;
        assert!(matches!(result, Err(FsOpsError::NotFound { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn out_of_bounds_range_is_rejected() -> Result<()> {
        let tree = ContentTree::new()?;
        let path = tree.write("Show/file.bin", &sample_bytes(10, 1))?;
        let result = open_file(&path, Some("bytes=5-10")).await;
        assert!(matches!(
            result,
            Err(FsOpsError::RangeNotSatisfiable { size: 10, .. })
        ));
        Ok(())
    }
}
