//! Default values applied when an environment variable is absent.
//!
//! # Design
//! - Keep every fallback in one place so documentation and behaviour stay aligned.
//! - Time-based defaults are expressed in the unit of their environment variable.

/// Address the HTTP surface binds to.
pub const BIND_ADDR: &str = "0.0.0.0:3000";
/// Control-protocol endpoint of the download daemon.
pub const RPC_URL: &str = "http://localhost:9091/transmission/rpc";
/// Per-call timeout for control-protocol requests, in seconds.
pub const RPC_TIMEOUT_SECS: u64 = 15;
/// Directory the daemon writes payloads into.
pub const CONTENT_ROOT: &str = "/mnt/downloads";
/// Disk usage percentage above which payload eviction escalates.
pub const EVICTION_THRESHOLD_PERCENT: f64 = 90.0;
/// Payload younger than this many days is never evicted.
pub const EVICTION_RETENTION_DAYS: u64 = 7;
/// Period of the eviction timer, in seconds.
pub const EVICTION_INTERVAL_SECS: u64 = 30 * 60;
/// Transient daemon artifacts older than this many hours are removed.
pub const ARTIFACT_GRACE_HOURS: u64 = 24;
/// Completion fraction a torrent needs before it can be exported.
pub const EXPORT_MIN_COMPLETION: f64 = 0.90;
/// Logging level used when neither `RUST_LOG` nor the override is set.
pub const LOG_LEVEL: &str = "info";
