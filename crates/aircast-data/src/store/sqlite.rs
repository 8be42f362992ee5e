//! SQLite-backed blob store.

use super::BlobStore;
use crate::error::{DataError, Result};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::Mutex;

/// SQLite store for model artifacts and encoding mappings.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

/// Store statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    /// Number of stored artifacts
    pub artifacts: usize,
    /// Total payload size in bytes
    pub total_bytes: usize,
}

impl SqliteStore {
    /// Open (or create) a store at `path`.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| DataError::Store("sqlite connection lock poisoned".to_string()))
    }

    fn initialize_schema(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS artifacts (
                key TEXT PRIMARY KEY,
                data BLOB NOT NULL,
                stored_at TEXT NOT NULL
            )",
            [],
        )?;
        Ok(())
    }

    /// Get store statistics.
    pub fn stats(&self) -> Result<StoreStats> {
        let conn = self.lock()?;
        let (artifacts, total_bytes): (i64, i64) = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(LENGTH(data)), 0) FROM artifacts",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(StoreStats {
            artifacts: artifacts as usize,
            total_bytes: total_bytes as usize,
        })
    }
}

impl BlobStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Vec<u8>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT data FROM artifacts WHERE key = ?1",
            params![key],
            |row| row.get::<_, Vec<u8>>(0),
        )
        .optional()?
        .ok_or_else(|| DataError::NotFound {
            key: key.to_string(),
        })
    }

    fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO artifacts (key, data, stored_at) VALUES (?1, ?2, ?3)",
            params![key, bytes, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn rename(&self, from: &str, to: &str) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let exists: Option<i64> = tx
            .query_row(
                "SELECT 1 FROM artifacts WHERE key = ?1",
                params![from],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_none() {
            return Err(DataError::NotFound {
                key: from.to_string(),
            });
        }
        tx.execute("DELETE FROM artifacts WHERE key = ?1", params![to])?;
        tx.execute(
            "UPDATE artifacts SET key = ?2 WHERE key = ?1",
            params![from, to],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT key FROM artifacts ORDER BY key ASC")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut keys = Vec::new();
        for key in rows {
            keys.push(key?);
        }
        Ok(keys)
    }

    fn contains(&self, key: &str) -> Result<bool> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM artifacts WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_round_trip() {
        let store = SqliteStore::in_memory().unwrap();
        store.put("models/hourly", b"payload").unwrap();
        assert_eq!(store.get("models/hourly").unwrap(), b"payload");
        assert!(store.contains("models/hourly").unwrap());

        let stats = store.stats().unwrap();
        assert_eq!(stats.artifacts, 1);
        assert_eq!(stats.total_bytes, 7);
    }

    #[test]
    fn test_put_overwrites() {
        let store = SqliteStore::in_memory().unwrap();
        store.put("k", b"old").unwrap();
        store.put("k", b"new").unwrap();
        assert_eq!(store.get("k").unwrap(), b"new");
        assert_eq!(store.stats().unwrap().artifacts, 1);
    }

    #[test]
    fn test_rename_replaces_target() {
        let store = SqliteStore::in_memory().unwrap();
        store.put("a", b"1").unwrap();
        store.put("b", b"2").unwrap();
        store.rename("a", "b").unwrap();
        assert_eq!(store.get("b").unwrap(), b"1");
        assert_eq!(store.keys().unwrap(), vec!["b".to_string()]);
        assert!(matches!(store.rename("a", "c"), Err(DataError::NotFound { .. })));
    }

    #[test]
    fn test_file_backed_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("artifacts.db");
        {
            let store = SqliteStore::new(&path).unwrap();
            store.put("mapping", b"{}").unwrap();
        }
        let reopened = SqliteStore::new(&path).unwrap();
        assert_eq!(reopened.get("mapping").unwrap(), b"{}");
    }
}
