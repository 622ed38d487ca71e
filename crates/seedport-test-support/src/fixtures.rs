//! Content-tree fixtures with controllable file ages.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result};
use tempfile::TempDir;

/// One day, for readable ages in eviction tests.
pub const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Temporary directory tree that is removed on drop.
pub struct ContentTree {
    dir: TempDir,
}

impl ContentTree {
    /// Create an empty tree.
    ///
    /// # Errors
    ///
    /// Returns an error when the temporary directory cannot be created.
    pub fn new() -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("seedport-content-")
            .tempdir()
            .context("failed to create content tree")?;
        Ok(Self { dir })
    }

    /// Root of the tree.
    #[must_use]
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Absolute path of a relative entry.
    #[must_use]
    pub fn path(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }

    /// Create a directory (and its parents).
    ///
    /// # Errors
    ///
    /// Returns an error when the directory cannot be created.
    pub fn mkdir(&self, relative: &str) -> Result<PathBuf> {
        let path = self.path(relative);
        fs::create_dir_all(&path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        Ok(path)
    }

    /// Write a file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be written.
    pub fn write(&self, relative: &str, contents: &[u8]) -> Result<PathBuf> {
        let path = self.path(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        fs::write(&path, contents).with_context(|| format!("failed to write {}", path.display()))?;
        Ok(path)
    }

    /// Write a file and backdate its modification time by `age`.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be written or its time adjusted.
    pub fn write_aged(&self, relative: &str, contents: &[u8], age: Duration) -> Result<PathBuf> {
        let path = self.write(relative, contents)?;
        set_age(&path, age)?;
        Ok(path)
    }
}

/// Backdate a file's modification time by `age`.
///
/// # Errors
///
/// Returns an error when the file cannot be opened or its time adjusted.
pub fn set_age(path: &Path, age: Duration) -> Result<()> {
    let modified = SystemTime::now()
        .checked_sub(age)
        .context("age exceeds the representable time range")?;
    File::options()
        .write(true)
        .open(path)
        .and_then(|file| file.set_modified(modified))
        .with_context(|| format!("failed to set mtime on {}", path.display()))
}

/// Deterministic, non-repeating-looking payload of `len` bytes.
#[must_use]
pub fn sample_bytes(len: usize, seed: u8) -> Vec<u8> {
    (0..len)
        .map(|index| {
            let index = u8::try_from(index % 251).unwrap_or(0);
            index.wrapping_mul(31).wrapping_add(seed)
        })
        .collect()
}
