//! SQLite persistence for cached symbol directories.
//!
//! One row per exchange key holds the whole directory as JSON together with
//! the time it was fetched. Writes replace the row, so a crash mid-refresh
//! leaves the previous entry intact.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use besst_common::error::{Error, Result, ResultExt};

use super::cache::{CachedSymbolSet, SymbolStore};

// ============================================================================
// Database Schema
// ============================================================================

const CREATE_TABLES_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS symbol_cache (
    exchange_key TEXT PRIMARY KEY,
    symbols_json TEXT NOT NULL,
    fetched_at TEXT NOT NULL
);
"#;

fn storage_err(e: rusqlite::Error) -> Error {
    Error::Storage(e.to_string())
}

// ============================================================================
// SQLite Symbol Store
// ============================================================================

/// Symbol store backed by a local SQLite file.
pub struct SqliteSymbolStore {
    /// `rusqlite::Connection` is not Sync; every access goes through the lock
    db: Arc<Mutex<Connection>>,
}

impl SqliteSymbolStore {
    /// Open (or create) the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create database directory")?;
        }

        let conn = Connection::open(path)
            .map_err(storage_err)
            .context("Failed to open symbol cache database")?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(storage_err)
            .context("Failed to set database pragmas")?;

        let store = Self::with_connection(conn)?;
        info!(db_path = %path.display(), "Initialized symbol cache storage");
        Ok(store)
    }

    /// Open a private in-memory database.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(storage_err)?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(CREATE_TABLES_SQL)
            .map_err(storage_err)
            .context("Failed to create database tables")?;

        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
        })
    }
}

#[async_trait]
impl SymbolStore for SqliteSymbolStore {
    async fn get(&self, exchange_key: &str) -> Result<Option<CachedSymbolSet>> {
        let db = self.db.lock().await;

        let result: rusqlite::Result<(String, String)> = db.query_row(
            "SELECT symbols_json, fetched_at FROM symbol_cache WHERE exchange_key = ?1",
            params![exchange_key],
            |row| Ok((row.get(0)?, row.get(1)?)),
        );

        match result {
            Ok((json, fetched_at)) => {
                let fetched_at = DateTime::parse_from_rfc3339(&fetched_at)
                    .map_err(|e| Error::Storage(format!("Bad fetched_at '{}': {}", fetched_at, e)))?
                    .with_timezone(&Utc);
                let symbols = serde_json::from_str(&json).context("Corrupt cached symbol list")?;
                Ok(Some(CachedSymbolSet {
                    symbols,
                    fetched_at,
                }))
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(storage_err(e)),
        }
    }

    async fn put(&self, exchange_key: &str, set: &CachedSymbolSet) -> Result<()> {
        let json = serde_json::to_string(&set.symbols)?;
        let db = self.db.lock().await;

        db.execute(
            "INSERT OR REPLACE INTO symbol_cache (exchange_key, symbols_json, fetched_at)
             VALUES (?1, ?2, ?3)",
            params![exchange_key, json, set.fetched_at.to_rfc3339()],
        )
        .map_err(storage_err)?;

        debug!(exchange_key, count = set.symbols.len(), "Saved symbol directory");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::SymbolRecord;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn sample_set(fetched_at: DateTime<Utc>) -> CachedSymbolSet {
        CachedSymbolSet {
            symbols: vec![
                SymbolRecord::new("JPM")
                    .with_name("JPMorgan Chase")
                    .with_industry("Banks—Diversified"),
                SymbolRecord::new("AWK").with_industry("Utilities—Regulated Water"),
            ],
            fetched_at,
        }
    }

    #[tokio::test]
    async fn test_missing_key_is_none() {
        let store = SqliteSymbolStore::in_memory().unwrap();
        assert!(store.get("US").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_replaces_previous_entry() {
        let store = SqliteSymbolStore::in_memory().unwrap();
        let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap();
        let t1 = t0 + chrono::Duration::hours(30);

        store.put("US", &sample_set(t0)).await.unwrap();
        let mut newer = sample_set(t1);
        newer.symbols.truncate(1);
        store.put("US", &newer).await.unwrap();

        let loaded = store.get("US").await.unwrap().unwrap();
        assert_eq!(loaded.fetched_at, t1);
        assert_eq!(loaded.symbols.len(), 1);
        assert_eq!(loaded.symbols[0].name(), "JPMorgan Chase");
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("cache.db");
        let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap();

        {
            let store = SqliteSymbolStore::open(&path).unwrap();
            store.put("US", &sample_set(t0)).await.unwrap();
        }

        let store = SqliteSymbolStore::open(&path).unwrap();
        let loaded = store.get("US").await.unwrap().unwrap();
        assert_eq!(loaded, sample_set(t0));
        assert!(store.get("L").await.unwrap().is_none());
    }
}
