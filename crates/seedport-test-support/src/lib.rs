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

//! Shared test helpers used across the workspace.
//! Layout: fixtures.rs (content trees with controllable ages), mocks.rs (in-memory daemon stub).

pub mod fixtures;
pub mod mocks;
