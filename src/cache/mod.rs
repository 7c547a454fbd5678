//! TTL-governed storage of collected results.
//!
//! A [`Cache`] wraps exactly one [`CacheStore`] backend:
//!
//! - [`FileStore`]: `<key>.value.json` holding the serialized value, plus `<key>.meta.json` holding
//!   `created_at` / `expires_at`
//! - [`DatabaseStore`]: a single `cache_entries(key, value, created_at, expires_at)` table,
//!   written with upserts
//!
//! Keys come from [`CacheKey`], which produces the same string for the same inputs regardless
//! of the order extra parameters were supplied in.

mod db_store;
mod file_store;
mod key;
mod store;
mod ttl_cache;

pub use db_store::DatabaseStore;
pub use file_store::FileStore;
pub use key::CacheKey;
pub use store::{CacheStore, Lookup, StoredEntry};
pub use ttl_cache::{Cache, CacheBackend, DATABASE_FILE_NAME};
