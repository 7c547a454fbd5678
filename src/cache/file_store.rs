use super::store::{CacheStore, Lookup, StoredEntry};
use crate::Result;
use crate::path_utils::sanitize_path_component;
use chrono::{DateTime, Utc};
use ohno::IntoAppError;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

const VALUE_SUFFIX: &str = ".value.json";
const META_SUFFIX: &str = ".meta.json";

#[derive(Debug, Serialize, Deserialize)]
struct EntryMeta {
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

/// Stores each key as `<key>.value.json` plus a `<key>.meta.json` sidecar holding its lifetime.
///
/// Keys are percent-encoded into file names, and the two suffixes never overlap, so every key
/// owns its own pair of files.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn value_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}{VALUE_SUFFIX}", sanitize_path_component(key)))
    }

    fn meta_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}{META_SUFFIX}", sanitize_path_component(key)))
    }
}

impl CacheStore for FileStore {
    fn read(&self, key: &str) -> Result<Lookup> {
        let meta_text = match read_optional(&self.meta_path(key))? {
            Some(text) => text,
            None if self.value_path(key).exists() => return Ok(Lookup::Corrupt("metadata file is missing".to_string())),
            None => return Ok(Lookup::Missing),
        };

        let meta: EntryMeta = match serde_json::from_str(&meta_text) {
            Ok(meta) => meta,
            Err(e) => return Ok(Lookup::Corrupt(format!("unreadable metadata: {e}"))),
        };

        let Some(value) = read_optional(&self.value_path(key))? else {
            return Ok(Lookup::Corrupt("value file is missing".to_string()));
        };

        Ok(Lookup::Found(StoredEntry {
            value,
            created_at: meta.created_at,
            expires_at: meta.expires_at,
        }))
    }

    fn write(&self, key: &str, entry: &StoredEntry) -> Result<()> {
        fs::create_dir_all(&self.dir).into_app_err_with(|| format!("unable to create cache directory '{}'", self.dir.display()))?;

        let value_path = self.value_path(key);
        fs::write(&value_path, &entry.value).into_app_err_with(|| format!("unable to write cache file '{}'", value_path.display()))?;

        let meta = EntryMeta {
            created_at: entry.created_at,
            expires_at: entry.expires_at,
        };

        let meta_path = self.meta_path(key);
        let file = File::create(&meta_path).into_app_err_with(|| format!("unable to create cache file '{}'", meta_path.display()))?;
        let mut writer = BufWriter::new(file);

        #[cfg(debug_assertions)]
        let result = serde_json::to_writer_pretty(&mut writer, &meta);
        #[cfg(not(debug_assertions))]
        let result = serde_json::to_writer(&mut writer, &meta);

        result.into_app_err_with(|| format!("unable to write cache file '{}'", meta_path.display()))?;
        writer
            .flush()
            .into_app_err_with(|| format!("unable to flush cache file '{}'", meta_path.display()))
    }

    fn remove(&self, key: &str) -> Result<()> {
        remove_optional(&self.meta_path(key))?;
        remove_optional(&self.value_path(key))
    }

    fn clear(&self, prefix: Option<&str>) -> Result<usize> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e).into_app_err_with(|| format!("unable to list cache directory '{}'", self.dir.display())),
        };

        let prefix = prefix.map(sanitize_path_component);
        let mut removed = 0;

        for entry in entries {
            let entry = entry.into_app_err_with(|| format!("unable to list cache directory '{}'", self.dir.display()))?;
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };

            let (stem, is_meta) = if let Some(stem) = file_name.strip_suffix(META_SUFFIX) {
                (stem, true)
            } else if let Some(stem) = file_name.strip_suffix(VALUE_SUFFIX) {
                (stem, false)
            } else {
                continue;
            };

            if prefix.as_deref().is_some_and(|p| !stem.starts_with(p)) {
                continue;
            }

            remove_optional(&entry.path())?;
            if is_meta {
                removed += 1;
            }
        }

        Ok(removed)
    }
}

fn read_optional(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).into_app_err_with(|| format!("unable to read cache file '{}'", path.display())),
    }
}

fn remove_optional(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).into_app_err_with(|| format!("unable to remove cache file '{}'", path.display())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(value: &str) -> StoredEntry {
        StoredEntry {
            value: value.to_string(),
            created_at: DateTime::from_timestamp(1_704_067_200, 0).unwrap(),
            expires_at: DateTime::from_timestamp(1_704_070_800, 0).unwrap(),
        }
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn test_write_creates_value_and_sidecar() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStore::new(tmp.path().join("cache"));

        store.write("contributions_octo_hello", &entry("[1,2]")).unwrap();

        let dir = tmp.path().join("cache");
        assert_eq!(fs::read_to_string(dir.join("contributions_octo_hello.value.json")).unwrap(), "[1,2]");
        let meta = fs::read_to_string(dir.join("contributions_octo_hello.meta.json")).unwrap();
        assert!(meta.contains("created_at"));
        assert!(meta.contains("expires_at"));

        assert_eq!(store.read("contributions_octo_hello").unwrap(), Lookup::Found(entry("[1,2]")));
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn test_missing_and_corrupt_entries() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStore::new(tmp.path());

        assert_eq!(store.read("absent").unwrap(), Lookup::Missing);

        fs::write(tmp.path().join("garbled.value.json"), "[]").unwrap();
        fs::write(tmp.path().join("garbled.meta.json"), "{ not json").unwrap();
        assert!(matches!(store.read("garbled").unwrap(), Lookup::Corrupt(_)));

        fs::write(tmp.path().join("orphan.value.json"), "[]").unwrap();
        assert!(matches!(store.read("orphan").unwrap(), Lookup::Corrupt(_)));

        store.write("halved", &entry("1")).unwrap();
        fs::remove_file(tmp.path().join("halved.value.json")).unwrap();
        assert!(matches!(store.read("halved").unwrap(), Lookup::Corrupt(_)));
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn test_keys_are_sanitized() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStore::new(tmp.path());

        store.write("../escape/attempt", &entry("1")).unwrap();
        assert!(tmp.path().join("%2E.%2Fescape%2Fattempt.value.json").exists());
        assert!(matches!(store.read("../escape/attempt").unwrap(), Lookup::Found(_)));
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn test_similar_keys_do_not_share_files() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStore::new(tmp.path());

        store.write("x", &entry("1")).unwrap();
        store.write("x.meta", &entry("2")).unwrap();
        store.write("a/b", &entry("3")).unwrap();
        store.write("a_b", &entry("4")).unwrap();

        assert_eq!(store.read("x").unwrap(), Lookup::Found(entry("1")));
        assert_eq!(store.read("x.meta").unwrap(), Lookup::Found(entry("2")));
        assert_eq!(store.read("a/b").unwrap(), Lookup::Found(entry("3")));
        assert_eq!(store.read("a_b").unwrap(), Lookup::Found(entry("4")));

        store.remove("x").unwrap();
        assert_eq!(store.read("x.meta").unwrap(), Lookup::Found(entry("2")));
        assert_eq!(store.clear(Some("a/")).unwrap(), 1);
        assert_eq!(store.read("a_b").unwrap(), Lookup::Found(entry("4")));
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn test_clear_with_and_without_prefix() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStore::new(tmp.path());

        store.write("contributions_a", &entry("1")).unwrap();
        store.write("contributions_b", &entry("2")).unwrap();
        store.write("members_a", &entry("3")).unwrap();
        fs::write(tmp.path().join("notes.txt"), "keep").unwrap();

        assert_eq!(store.clear(Some("contributions")).unwrap(), 2);
        assert_eq!(store.read("contributions_a").unwrap(), Lookup::Missing);
        assert!(matches!(store.read("members_a").unwrap(), Lookup::Found(_)));

        assert_eq!(store.clear(None).unwrap(), 1);
        assert_eq!(store.read("members_a").unwrap(), Lookup::Missing);
        assert!(tmp.path().join("notes.txt").exists());
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn test_clear_missing_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStore::new(tmp.path().join("never-created"));
        assert_eq!(store.clear(None).unwrap(), 0);
    }
}
