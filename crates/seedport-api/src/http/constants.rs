//! Shared HTTP constants (headers, problem URIs, streaming sizes).

pub(crate) const HEADER_API_KEY: &str = "x-seedport-api-key";
pub(crate) const HEADER_REQUEST_ID: &str = seedport_telemetry::REQUEST_ID_HEADER;

pub(crate) const PROMETHEUS_TEXT: &str = "text/plain; version=0.0.4";

pub(crate) const PROBLEM_INTERNAL: &str = "https://seedport.dev/problems/internal";
pub(crate) const PROBLEM_UNAUTHORIZED: &str = "https://seedport.dev/problems/unauthorized";
pub(crate) const PROBLEM_FORBIDDEN: &str = "https://seedport.dev/problems/forbidden";
pub(crate) const PROBLEM_BAD_REQUEST: &str = "https://seedport.dev/problems/bad-request";
pub(crate) const PROBLEM_NOT_FOUND: &str = "https://seedport.dev/problems/not-found";
pub(crate) const PROBLEM_INCOMPLETE: &str = "https://seedport.dev/problems/incomplete";
pub(crate) const PROBLEM_DAEMON_REJECTED: &str = "https://seedport.dev/problems/daemon-rejected";
pub(crate) const PROBLEM_RANGE_NOT_SATISFIABLE: &str =
    "https://seedport.dev/problems/range-not-satisfiable";
pub(crate) const PROBLEM_SERVICE_UNAVAILABLE: &str =
    "https://seedport.dev/problems/service-unavailable";

/// Size of the in-memory pipe between the archive writer and the response body.
pub(crate) const ARCHIVE_PIPE_BYTES: usize = 64 * 1024;
/// Chunk size used when streaming files into response bodies.
pub(crate) const FILE_CHUNK_BYTES: usize = 64 * 1024;
