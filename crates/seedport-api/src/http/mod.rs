//! HTTP surface modules (router, middleware, handlers).

/// API key middleware.
pub mod auth;
/// Shared constants and header names.
pub mod constants;
/// Browse, export and per-file content handlers.
pub mod content;
/// Problem response helpers and error types.
pub mod errors;
/// Health, metrics, storage and cleanup endpoints.
pub mod health;
/// Router construction and server host.
pub mod router;
/// Metrics middleware for HTTP requests.
pub mod telemetry;
/// Torrent control handlers.
pub mod torrents;
