use super::db_store::DatabaseStore;
use super::file_store::FileStore;
use super::key::CacheKey;
use super::store::{CacheStore, Lookup, StoredEntry};
use crate::Result;
use crate::clock::{self, SharedClock};
use crate::logging::{self, SharedLogger};
use crate::model::RepoName;
use chrono::{DateTime, Utc};
use core::fmt::{self, Debug, Formatter};
use core::time::Duration;
use log::Level;
use ohno::{IntoAppError, bail};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;
use strum::Display;

const LOG_TARGET: &str = "     cache";

/// File name of the database inside the cache directory.
pub const DATABASE_FILE_NAME: &str = "cache.db";

/// Where cache entries physically live.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CacheBackend {
    /// A value file and a metadata sidecar per key
    #[default]
    Files,

    /// One row per key in an embedded database
    Database,
}

/// Key-derived storage of serializable results with per-entry expiry.
///
/// A read that finds an expired or unreadable entry deletes it and reports a miss. The backend
/// is chosen once at construction; write failures are returned to the caller.
pub struct Cache {
    store: Box<dyn CacheStore>,
    default_ttl: Duration,
    clock: SharedClock,
    logger: SharedLogger,
}

impl Debug for Cache {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("store", &self.store)
            .field("default_ttl", &self.default_ttl)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl Cache {
    /// Open a cache of the given backend kind rooted at `dir`.
    pub fn open(backend: CacheBackend, dir: impl AsRef<Path>, default_ttl: Duration) -> Result<Self> {
        let dir = dir.as_ref();
        let store: Box<dyn CacheStore> = match backend {
            CacheBackend::Files => Box::new(FileStore::new(dir)),
            CacheBackend::Database => Box::new(DatabaseStore::open(dir.join(DATABASE_FILE_NAME))?),
        };

        Self::with_store(store, default_ttl)
    }

    pub fn with_store(store: Box<dyn CacheStore>, default_ttl: Duration) -> Result<Self> {
        if default_ttl.is_zero() {
            bail!("cache TTL must be greater than zero");
        }

        Ok(Self {
            store,
            default_ttl,
            clock: clock::system(),
            logger: logging::global(),
        })
    }

    #[must_use]
    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_logger(mut self, logger: SharedLogger) -> Self {
        self.logger = logger;
        self
    }

    #[must_use]
    pub const fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Derive a key from a prefix, an optional repository, an optional date range, and extra
    /// named parameters. See [`CacheKey`] for the layout.
    #[must_use]
    pub fn derive_key(
        prefix: &str,
        repository: Option<&RepoName>,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        extra: &[(&str, &dyn fmt::Display)],
    ) -> String {
        let mut key = CacheKey::new(prefix);

        if let Some(repository) = repository {
            key = key.repository(repository);
        }

        if let Some(start) = start {
            key = key.start(start);
        }

        if let Some(end) = end {
            key = key.end(end);
        }

        for (name, value) in extra {
            key = key.param(*name, value);
        }

        key.build()
    }

    /// Fetch and deserialize the value stored under `key`.
    ///
    /// Returns `None` when the key is absent, expired, or unreadable. Expired and unreadable
    /// entries are deleted on the way out.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let entry = match self.store.read(key) {
            Ok(Lookup::Found(entry)) => entry,
            Ok(Lookup::Missing) => {
                emit!(self.logger, Level::Debug, "Cache miss for '{key}'");
                return None;
            }
            Ok(Lookup::Corrupt(reason)) => {
                emit!(self.logger, Level::Debug, "Discarding corrupt cache entry '{key}': {reason}");
                self.discard(key);
                return None;
            }
            Err(e) => {
                emit!(self.logger, Level::Warn, "Could not read cache entry '{key}': {e:#}");
                return None;
            }
        };

        let now = self.clock.now();
        if now > entry.expires_at {
            emit!(
                self.logger,
                Level::Debug,
                "Cache expired for '{key}' (expired at {})",
                entry.expires_at.to_rfc3339()
            );
            self.discard(key);
            return None;
        }

        match serde_json::from_str(&entry.value) {
            Ok(value) => {
                emit!(self.logger, Level::Debug, "Cache hit for '{key}'");
                Some(value)
            }
            Err(e) => {
                emit!(self.logger, Level::Debug, "Discarding undecodable cache entry '{key}': {e}");
                self.discard(key);
                None
            }
        }
    }

    /// Store `value` under `key`, expiring after `ttl` (or the default TTL).
    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: Option<Duration>) -> Result<()> {
        let ttl = ttl.unwrap_or(self.default_ttl);
        if ttl.is_zero() {
            bail!("cache TTL for '{key}' must be greater than zero");
        }

        let created_at = self.clock.now();
        let expires_at = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| created_at.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        #[cfg(debug_assertions)]
        let serialized = serde_json::to_string_pretty(value);
        #[cfg(not(debug_assertions))]
        let serialized = serde_json::to_string(value);

        let entry = StoredEntry {
            value: serialized.into_app_err_with(|| format!("unable to serialize cache entry '{key}'"))?,
            created_at,
            expires_at,
        };

        self.store.write(key, &entry)?;
        emit!(self.logger, Level::Debug, "Cached '{key}' until {}", expires_at.to_rfc3339());
        Ok(())
    }

    pub fn delete(&self, key: &str) -> Result<()> {
        self.store.remove(key)
    }

    /// Remove all entries, or only those whose key starts with `prefix`.
    pub fn clear(&self, prefix: Option<&str>) -> Result<usize> {
        let removed = self.store.clear(prefix)?;
        match prefix {
            Some(prefix) => emit!(self.logger, Level::Info, "Removed {removed} cache entries starting with '{prefix}'"),
            None => emit!(self.logger, Level::Info, "Removed {removed} cache entries"),
        }
        Ok(removed)
    }

    fn discard(&self, key: &str) {
        if let Err(e) = self.store.remove(key) {
            emit!(self.logger, Level::Warn, "Could not delete cache entry '{key}': {e:#}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::logging::CapturingLogger;
    use std::fs;
    use std::sync::Arc;

    fn start() -> DateTime<Utc> {
        DateTime::from_timestamp(1_704_067_200, 0).unwrap()
    }

    fn open(backend: CacheBackend, dir: &Path, clock: &Arc<ManualClock>) -> Cache {
        Cache::open(backend, dir, Duration::from_secs(3600))
            .unwrap()
            .with_clock(Arc::clone(clock) as SharedClock)
    }

    #[test]
    fn test_derive_key_matches_builder() {
        let repo = RepoName::parse("octo/hello").unwrap();
        let start = DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z").unwrap().with_timezone(&Utc);
        let end = DateTime::parse_from_rfc3339("2024-01-31T23:59:59Z").unwrap().with_timezone(&Utc);

        assert_eq!(
            Cache::derive_key("contributions", Some(&repo), Some(start), Some(end), &[]),
            "contributions_octo_hello_20240101_20240131"
        );
        assert_eq!(Cache::derive_key("repos", None, None, None, &[]), "repos");
    }

    #[test]
    fn test_derive_key_appends_sorted_extras() {
        let repo = RepoName::parse("octo/hello").unwrap();

        let key = Cache::derive_key("pulls", Some(&repo), None, None, &[("state", &"all"), ("page", &2)]);
        assert_eq!(key, "pulls_octo_hello_page_2_state_all");
        assert_eq!(key, CacheKey::new("pulls").repository(&repo).param("page", 2).param("state", "all").build());
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn test_zero_ttl_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let _ = Cache::open(CacheBackend::Files, tmp.path(), Duration::ZERO).unwrap_err();

        let cache = Cache::open(CacheBackend::Files, tmp.path(), Duration::from_secs(1)).unwrap();
        let _ = cache.set("k", &1, Some(Duration::ZERO)).unwrap_err();
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn test_entry_valid_up_to_and_including_expiry() {
        let tmp = tempfile::tempdir().unwrap();
        let clock = ManualClock::new(start());
        let cache = open(CacheBackend::Files, tmp.path(), &clock);

        cache.set("k", &vec![1, 2, 3], Some(Duration::from_secs(60))).unwrap();

        clock.advance(chrono::Duration::seconds(60));
        assert_eq!(cache.get::<Vec<i32>>("k"), Some(vec![1, 2, 3]));

        clock.advance(chrono::Duration::seconds(1));
        assert_eq!(cache.get::<Vec<i32>>("k"), None);
        assert!(!tmp.path().join("k.value.json").exists());
        assert!(!tmp.path().join("k.meta.json").exists());
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn test_default_ttl_applies() {
        let tmp = tempfile::tempdir().unwrap();
        let clock = ManualClock::new(start());
        let cache = open(CacheBackend::Database, tmp.path(), &clock);

        cache.set("k", "value", None).unwrap();
        clock.advance(chrono::Duration::minutes(59));
        assert_eq!(cache.get::<String>("k").as_deref(), Some("value"));
        clock.advance(chrono::Duration::minutes(2));
        assert_eq!(cache.get::<String>("k"), None);
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn test_undecodable_value_is_discarded() {
        let tmp = tempfile::tempdir().unwrap();
        let clock = ManualClock::new(start());
        let cache = open(CacheBackend::Files, tmp.path(), &clock);

        cache.set("k", "text", None).unwrap();
        assert_eq!(cache.get::<u64>("k"), None);
        assert!(!tmp.path().join("k.value.json").exists());
        assert_eq!(cache.get::<String>("k"), None);
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn test_corrupt_metadata_is_discarded() {
        let tmp = tempfile::tempdir().unwrap();
        let clock = ManualClock::new(start());
        let capture = CapturingLogger::new();
        let cache = open(CacheBackend::Files, tmp.path(), &clock).with_logger(capture.clone());

        cache.set("k", &42, None).unwrap();
        fs::write(tmp.path().join("k.meta.json"), "garbage").unwrap();

        assert_eq!(cache.get::<i32>("k"), None);
        assert!(!tmp.path().join("k.value.json").exists());
        assert!(
            capture
                .messages_at(Level::Debug)
                .iter()
                .any(|m| m.contains("Discarding corrupt cache entry 'k'"))
        );
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn test_write_failure_propagates() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("not-a-dir");
        fs::write(&blocker, "file in the way").unwrap();

        let cache = Cache::open(CacheBackend::Files, &blocker, Duration::from_secs(60)).unwrap();
        let _ = cache.set("k", &1, None).unwrap_err();
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn test_delete_and_clear() {
        let tmp = tempfile::tempdir().unwrap();
        let clock = ManualClock::new(start());
        let cache = open(CacheBackend::Files, tmp.path(), &clock);

        cache.set("contributions_a", &1, None).unwrap();
        cache.set("contributions_b", &2, None).unwrap();
        cache.set("other", &3, None).unwrap();

        cache.delete("contributions_a").unwrap();
        cache.delete("contributions_a").unwrap();
        assert_eq!(cache.get::<i32>("contributions_a"), None);

        assert_eq!(cache.clear(Some("contributions")).unwrap(), 1);
        assert_eq!(cache.get::<i32>("other"), Some(3));
        assert_eq!(cache.clear(None).unwrap(), 1);
        assert_eq!(cache.get::<i32>("other"), None);
    }
}
