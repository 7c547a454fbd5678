use super::store::{CacheStore, Lookup, StoredEntry};
use crate::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use ohno::IntoAppError;
use rusqlite::{Connection, OptionalExtension, params};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS cache_entries (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL,
        created_at TEXT NOT NULL,
        expires_at TEXT NOT NULL
    );
";

/// Stores every key as a row of a single `SQLite` table.
#[derive(Debug)]
pub struct DatabaseStore {
    path: PathBuf,
    conn: Mutex<Connection>,
}

impl DatabaseStore {
    /// Open (creating if needed) the database file at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).into_app_err_with(|| format!("unable to create cache directory '{}'", parent.display()))?;
        }

        let conn = Connection::open(&path).into_app_err_with(|| format!("unable to open cache database '{}'", path.display()))?;
        conn.execute_batch(SCHEMA)
            .into_app_err_with(|| format!("unable to initialize cache database '{}'", path.display()))?;

        Ok(Self {
            path,
            conn: Mutex::new(conn),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> rusqlite::Result<T>) -> rusqlite::Result<T> {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        f(&conn)
    }
}

impl CacheStore for DatabaseStore {
    fn read(&self, key: &str) -> Result<Lookup> {
        let row = self
            .with_conn(|conn| {
                conn.query_row(
                    "SELECT value, created_at, expires_at FROM cache_entries WHERE key = ?1",
                    params![key],
                    |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?)),
                )
                .optional()
            })
            .into_app_err_with(|| format!("unable to read cache entry '{key}'"))?;

        let Some((value, created_at, expires_at)) = row else {
            return Ok(Lookup::Missing);
        };

        let (Some(created_at), Some(expires_at)) = (parse_timestamp(&created_at), parse_timestamp(&expires_at)) else {
            return Ok(Lookup::Corrupt(format!("unreadable timestamps '{created_at}' / '{expires_at}'")));
        };

        Ok(Lookup::Found(StoredEntry {
            value,
            created_at,
            expires_at,
        }))
    }

    fn write(&self, key: &str, entry: &StoredEntry) -> Result<()> {
        let _ = self
            .with_conn(|conn| {
                conn.execute(
                    "INSERT INTO cache_entries (key, value, created_at, expires_at) VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT(key) DO UPDATE SET
                        value = excluded.value,
                        created_at = excluded.created_at,
                        expires_at = excluded.expires_at",
                    params![key, entry.value, format_timestamp(entry.created_at), format_timestamp(entry.expires_at)],
                )
            })
            .into_app_err_with(|| format!("unable to write cache entry '{key}'"))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let _ = self
            .with_conn(|conn| conn.execute("DELETE FROM cache_entries WHERE key = ?1", params![key]))
            .into_app_err_with(|| format!("unable to remove cache entry '{key}'"))?;
        Ok(())
    }

    fn clear(&self, prefix: Option<&str>) -> Result<usize> {
        self.with_conn(|conn| match prefix {
            Some(prefix) => conn.execute(
                "DELETE FROM cache_entries WHERE substr(key, 1, length(?1)) = ?1",
                params![prefix],
            ),
            None => conn.execute("DELETE FROM cache_entries", []),
        })
        .into_app_err("unable to clear cache database")
    }
}

fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text).ok().map(|at| at.with_timezone(&Utc))
}
