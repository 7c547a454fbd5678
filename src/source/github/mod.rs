//! GitHub REST implementation of [`crate::source::SourceCapability`].

mod client;
mod source;
mod wire;

pub use client::PAGE_SIZE;
pub use source::{DEFAULT_BASE_URL, GitHubOptions, GitHubSource};
