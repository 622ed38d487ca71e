//! Typed configuration models.
//!
//! # Design
//! - Pure data carriers built once at start-up by the loader.
//! - Keeps parsing and validation in `loader.rs`.

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ConfigError;

/// Immutable configuration snapshot for the whole process.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Address the HTTP surface binds to.
    pub bind_addr: SocketAddr,
    /// How to reach the download daemon.
    pub daemon: DaemonSettings,
    /// Directory under which the daemon stores torrent payloads.
    pub content_root: PathBuf,
    /// Storage eviction policy knobs.
    pub eviction: EvictionSettings,
    /// Export gating and archive defaults.
    pub export: ExportSettings,
    /// Shared key required on versioned routes when set.
    pub api_key: Option<String>,
    /// Logging preferences.
    pub logging: LoggingSettings,
}

/// Connection settings for the daemon's control protocol.
#[derive(Clone)]
pub struct DaemonSettings {
    /// Control-protocol endpoint.
    pub rpc_url: Url,
    /// Optional basic-auth username presented to the daemon.
    pub username: Option<String>,
    /// Optional basic-auth password presented to the daemon.
    pub password: Option<String>,
    /// Per-call timeout.
    pub timeout: Duration,
    /// Daemon bookkeeping directory (contains `resume/` and `torrents/`).
    pub state_dir: Option<PathBuf>,
}

impl fmt::Debug for DaemonSettings {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("DaemonSettings")
            .field("rpc_url", &self.rpc_url.as_str())
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .field("state_dir", &self.state_dir)
            .finish()
    }
}

/// Storage eviction policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvictionSettings {
    /// Usage percentage above which payload deletion escalates.
    pub threshold_percent: f64,
    /// Payload younger than this is never evicted.
    pub retention: Duration,
    /// Period of the eviction timer.
    pub interval: Duration,
    /// Transient daemon artifacts older than this are removed.
    pub artifact_grace: Duration,
}

/// Export gating and archive defaults.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExportSettings {
    /// Completion fraction (0..=1) required before an unfinished torrent can be exported.
    pub min_completion: f64,
    /// Compression used for directory archives unless the caller overrides it.
    pub compression: CompressionPolicy,
}

/// Logging preferences.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    /// Level directive used when `RUST_LOG` is not set.
    pub level: String,
    /// Explicit output format; `None` lets the build profile decide.
    pub format: Option<LogFormat>,
}

/// Output format for structured logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per event.
    Json,
    /// Human-readable output.
    Pretty,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" | "text" => Ok(Self::Pretty),
            _ => Err(ConfigError::invalid(
                "SEEDPORT_LOG_FORMAT",
                "unknown_format",
                value,
            )),
        }
    }
}

/// Trade-off between CPU and bytes on the wire for directory archives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionPolicy {
    /// Entries are stored verbatim; suits already-compressed media.
    #[default]
    Store,
    /// Entries are deflated; suits text-heavy content.
    Deflate,
}

impl CompressionPolicy {
    /// Render the policy as its lowercase identifier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Store => "store",
            Self::Deflate => "deflate",
        }
    }
}

impl FromStr for CompressionPolicy {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "store" | "stored" | "none" => Ok(Self::Store),
            "deflate" | "fast" => Ok(Self::Deflate),
            _ => Err(ConfigError::invalid(
                "SEEDPORT_COMPRESSION",
                "unknown_policy",
                value,
            )),
        }
    }
}
