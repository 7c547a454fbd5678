//! contrib-ingest crate
//!
//! Rate-limited ingestion and caching of repository contribution activity. The crate turns
//! commits, pull requests, reviews, and issues fetched from a remote source API into a
//! uniform stream of [`model::ContributionEvent`] values.
//!
//! # Module Organization
//!
//! - [`retry`]: failure classification and bounded retry with backoff
//! - [`cache`]: key-derived, TTL-governed storage with file or database backends
//! - [`source`]: the remote source capability and its GitHub REST implementation
//! - [`collector`]: per repository/period orchestration and record normalization
//! - [`model`]: shared record, period, and repository types
//! - [`commands`]: command-line front end

/// Result type alias using `ohno::AppError` as the default error type.
pub type Result<T, E = ohno::AppError> = core::result::Result<T, E>;

#[macro_use]
pub mod logging;

pub mod cache;
pub mod clock;
pub mod collector;
pub mod commands;
pub mod config;
pub mod model;
mod path_utils;
pub mod retry;
pub mod source;

pub use commands::{Host, run};
