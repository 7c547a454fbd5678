use crate::Result;
use chrono::{DateTime, Utc};
use core::fmt::Debug;

/// A serialized value together with its lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEntry {
    pub value: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Outcome of reading a key from a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Missing,

    /// Something is stored but cannot be trusted; the reason is for logging.
    Corrupt(String),

    Found(StoredEntry),
}

/// Physical storage behind a [`super::Cache`].
///
/// Backends only move bytes; expiry and deserialization are decided by the cache.
pub trait CacheStore: Debug + Send + Sync {
    fn read(&self, key: &str) -> Result<Lookup>;

    /// Insert or replace.
    fn write(&self, key: &str, entry: &StoredEntry) -> Result<()>;

    /// Missing keys are not an error.
    fn remove(&self, key: &str) -> Result<()>;

    /// Remove every entry whose key starts with `prefix`, or everything. Returns how many went.
    fn clear(&self, prefix: Option<&str>) -> Result<usize>;
}
