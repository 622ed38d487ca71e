//! # Design
//!
//! - Structured, constant-message errors for sandbox, streaming and eviction paths.
//! - Capture operation context (paths, fields) so failures are reproducible in tests.
//! - "Not found" is its own variant because callers routinely treat it as a skip.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for filesystem operations.
pub type FsOpsResult<T> = Result<T, FsOpsError>;

/// Errors produced by filesystem operations.
#[derive(Debug, Error)]
pub enum FsOpsError {
    /// The requested location does not exist (or vanished).
    #[error("path not found")]
    NotFound {
        /// Path that could not be found.
        path: PathBuf,
    },
    /// The requested location resolves outside its permitted root.
    #[error("path escapes its content root")]
    AccessDenied {
        /// Path as requested (not canonicalised when it failed lexically).
        path: PathBuf,
        /// Root the path had to stay within.
        root: PathBuf,
    },
    /// The requested byte range cannot be served.
    #[error("requested range not satisfiable")]
    RangeNotSatisfiable {
        /// Size of the file being served.
        size: u64,
        /// Range header as received.
        header: String,
    },
    /// IO failures while interacting with the filesystem.
    #[error("fsops io failure")]
    Io {
        /// Operation that triggered the IO failure.
        operation: &'static str,
        /// Path involved in the IO failure.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// The output sink stopped accepting bytes (usually a client disconnect).
    #[error("output sink closed")]
    SinkClosed {
        /// Operation that was writing.
        operation: &'static str,
        /// Underlying IO error.
        source: io::Error,
    },
    /// Zip framing failures.
    #[error("fsops archive failure")]
    Archive {
        /// Operation that triggered the archive failure.
        operation: &'static str,
        /// Underlying zip error.
        source: async_zip::error::ZipError,
    },
    /// Globset compilation failures.
    #[error("fsops glob failure")]
    Glob {
        /// Operation that triggered the glob failure.
        operation: &'static str,
        /// Glob pattern that failed to compile.
        pattern: String,
        /// Underlying globset error.
        source: globset::Error,
    },
    /// Filesystem statistics could not be read.
    #[error("fsops disk probe failure")]
    Probe {
        /// Path that was probed.
        path: PathBuf,
        /// Underlying nix error.
        source: nix::Error,
    },
    /// A blocking task panicked or was cancelled.
    #[error("fsops background task failed")]
    Join {
        /// Operation that was running.
        operation: &'static str,
        /// Underlying join error.
        source: tokio::task::JoinError,
    },
    /// Input validation failures.
    #[error("fsops invalid input")]
    InvalidInput {
        /// Field that failed validation.
        field: &'static str,
        /// Static reason for the failure.
        reason: &'static str,
        /// Offending value when available.
        value: Option<String>,
    },
}

impl FsOpsError {
    /// Wrap an IO error, folding `NotFound` into its dedicated variant.
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        let path = path.into();
        if source.kind() == io::ErrorKind::NotFound {
            Self::NotFound { path }
        } else {
            Self::Io {
                operation,
                path,
                source,
            }
        }
    }

    /// Whether the failure means the target no longer exists.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn io_folds_not_found() {
        let err = FsOpsError::io(
            "sandbox.canonicalize",
            "/missing",
            io::Error::from(io::ErrorKind::NotFound),
        );
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "path not found");

        let err = FsOpsError::io(
            "sandbox.canonicalize",
            "/denied",
            io::Error::from(io::ErrorKind::PermissionDenied),
        );
        assert!(!err.is_not_found());
        assert!(err.source().is_some());
    }
}
