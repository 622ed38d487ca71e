#![forbid(unsafe_code)]
#![warn(
    unused,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]

//! Filesystem side of the export service.
//!
//! Every path that reaches the filesystem goes through [`sandbox`] first. The
//! content tree is shared with the download daemon, so every operation here
//! treats "no longer present" as an expected outcome.
//!
//! Layout: `sandbox.rs` (path resolution guard), `browse.rs` (listings),
//! `range.rs` (byte-range file serving), `archive.rs` (streaming zip builder),
//! `eviction/` (disk probe, deletion policy and scheduler), `error.rs`.

pub mod archive;
pub mod browse;
pub mod error;
pub mod eviction;
pub mod range;
pub mod sandbox;

pub use archive::{ArchiveSummary, archive_file_name, safe_file_name, stream_archive};
pub use browse::{DirectoryEntry, EntryKind, FileDescriptor, Listing, browse};
pub use error::{FsOpsError, FsOpsResult};
pub use eviction::{
    ArtifactRule, DiskProbe, DiskUsageSample, EvictionPolicy, EvictionReport, EvictionService,
    StatvfsProbe,
};
pub use range::{ByteRange, FilePayload, open_file, unsatisfied_range};
pub use sandbox::{ExportTarget, Sandbox, resolve};
