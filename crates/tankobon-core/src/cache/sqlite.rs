//! SQLite-backed persistent cache.

use super::traits::{CacheBackend, CacheConfig, CacheStats, NamespaceStats};
use crate::error::{Result, TankobonError};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::debug;

/// SQLite-based cache backend.
///
/// All namespaces share one database file. Thread-safe via an internal mutex
/// on the connection; a write is a single `INSERT OR REPLACE`, so a reader
/// never observes a partially written value.
pub struct SqliteCache {
    conn: Arc<Mutex<Connection>>,
    config: CacheConfig,
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

impl SqliteCache {
    /// Create a new cache at the specified database path.
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        Self::with_config(db_path, CacheConfig::default())
    }

    /// Create a new cache with custom configuration.
    pub fn with_config(db_path: impl AsRef<Path>, config: CacheConfig) -> Result<Self> {
        let db_path = db_path.as_ref();

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| TankobonError::Io {
                message: format!("Failed to create cache directory: {}", e),
                path: Some(parent.to_path_buf()),
                source: Some(e),
            })?;
        }

        let conn = Connection::open(db_path).map_err(|e| TankobonError::Database {
            message: format!("Failed to open cache database: {}", e),
            source: Some(e),
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(|e| TankobonError::Database {
                message: format!("Failed to set pragmas: {}", e),
                source: Some(e),
            })?;

        let cache = Self {
            conn: Arc::new(Mutex::new(conn)),
            config,
        };
        cache.init_schema()?;
        Ok(cache)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| TankobonError::Database {
            message: format!("Failed to lock database: {}", e),
            source: None,
        })
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS cache_entries (
                namespace TEXT NOT NULL,
                key TEXT NOT NULL,
                value BLOB NOT NULL,
                cached_at INTEGER NOT NULL,
                expires_at INTEGER NOT NULL,
                size_bytes INTEGER NOT NULL,
                last_accessed INTEGER NOT NULL,
                PRIMARY KEY (namespace, key)
            );

            CREATE INDEX IF NOT EXISTS idx_cache_expires
                ON cache_entries(expires_at);

            CREATE INDEX IF NOT EXISTS idx_cache_accessed
                ON cache_entries(last_accessed);
            "#,
        )
        .map_err(|e| TankobonError::Database {
            message: format!("Failed to initialize cache schema: {}", e),
            source: Some(e),
        })
    }

    /// Evict least recently accessed entries until the cache fits in
    /// `max_bytes`. Returns the number of entries evicted.
    pub fn evict_to_size(&self, max_bytes: u64) -> Result<usize> {
        let conn = self.lock()?;
        Self::evict_locked(&conn, max_bytes)
    }

    fn evict_locked(conn: &Connection, max_bytes: u64) -> Result<usize> {
        let current_size: i64 = conn
            .query_row(
                "SELECT COALESCE(SUM(size_bytes), 0) FROM cache_entries",
                [],
                |row| row.get(0),
            )
            .unwrap_or(0);

        if (current_size as u64) <= max_bytes {
            return Ok(0);
        }
        let excess = current_size as u64 - max_bytes;

        let mut stmt = conn
            .prepare(
                "SELECT namespace, key, size_bytes FROM cache_entries ORDER BY last_accessed ASC",
            )
            .map_err(|e| TankobonError::Database {
                message: format!("Failed to prepare eviction query: {}", e),
                source: Some(e),
            })?;

        let entries: Vec<(String, String, i64)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
            .map_err(|e| TankobonError::Database {
                message: format!("Failed to query for eviction: {}", e),
                source: Some(e),
            })?
            .filter_map(|r| r.ok())
            .collect();
        drop(stmt);

        let mut evicted_bytes = 0u64;
        let mut evicted_count = 0;
        for (namespace, key, size) in entries {
            if evicted_bytes >= excess {
                break;
            }
            conn.execute(
                "DELETE FROM cache_entries WHERE namespace = ?1 AND key = ?2",
                params![namespace, key],
            )
            .ok();
            evicted_bytes += size as u64;
            evicted_count += 1;
        }

        debug!("Evicted {} cache entries ({} bytes)", evicted_count, evicted_bytes);
        Ok(evicted_count)
    }
}

impl CacheBackend for SqliteCache {
    fn get(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>> {
        let conn = self.lock()?;
        let now = now_millis();

        let value: Option<Vec<u8>> = conn
            .query_row(
                r#"
                SELECT value FROM cache_entries
                WHERE namespace = ?1 AND key = ?2 AND expires_at > ?3
                "#,
                params![namespace, key, now],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| TankobonError::Database {
                message: format!("Failed to query cache entry: {}", e),
                source: Some(e),
            })?;

        if value.is_some() {
            let _ = conn.execute(
                "UPDATE cache_entries SET last_accessed = ?1 WHERE namespace = ?2 AND key = ?3",
                params![now, namespace, key],
            );
        }

        Ok(value)
    }

    fn set(&self, namespace: &str, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        let conn = self.lock()?;
        let now = now_millis();
        let expires_at = now.saturating_add(ttl.as_millis().min(i64::MAX as u128) as i64);

        conn.execute(
            r#"
            INSERT OR REPLACE INTO cache_entries
            (namespace, key, value, cached_at, expires_at, size_bytes, last_accessed)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?4)
            "#,
            params![namespace, key, value, now, expires_at, value.len() as i64],
        )
        .map_err(|e| TankobonError::Database {
            message: format!("Failed to set cache entry: {}", e),
            source: Some(e),
        })?;

        if self.config.enable_eviction && self.config.max_size_bytes > 0 {
            let _ = Self::evict_locked(&conn, self.config.max_size_bytes);
        }

        Ok(())
    }

    fn invalidate(&self, namespace: &str, key: &str) -> Result<bool> {
        let conn = self.lock()?;
        let deleted = conn
            .execute(
                "DELETE FROM cache_entries WHERE namespace = ?1 AND key = ?2",
                params![namespace, key],
            )
            .map_err(|e| TankobonError::Database {
                message: format!("Failed to invalidate cache entry: {}", e),
                source: Some(e),
            })?;
        Ok(deleted > 0)
    }

    fn invalidate_namespace(&self, namespace: &str) -> Result<usize> {
        let conn = self.lock()?;
        let deleted = conn
            .execute(
                "DELETE FROM cache_entries WHERE namespace = ?1",
                params![namespace],
            )
            .map_err(|e| TankobonError::Database {
                message: format!("Failed to invalidate namespace: {}", e),
                source: Some(e),
            })?;

        debug!("Invalidated {} entries from namespace '{}'", deleted, namespace);
        Ok(deleted)
    }

    fn get_stats(&self) -> Result<CacheStats> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                r#"
                SELECT namespace, COUNT(*), COALESCE(SUM(size_bytes), 0)
                FROM cache_entries
                WHERE expires_at > ?1
                GROUP BY namespace
                ORDER BY namespace
                "#,
            )
            .map_err(|e| TankobonError::Database {
                message: format!("Failed to prepare stats query: {}", e),
                source: Some(e),
            })?;

        let namespaces: Vec<NamespaceStats> = stmt
            .query_map(params![now_millis()], |row| {
                let entry_count: i64 = row.get(1)?;
                let total_size_bytes: i64 = row.get(2)?;
                Ok(NamespaceStats {
                    namespace: row.get(0)?,
                    entry_count: entry_count as usize,
                    total_size_bytes: total_size_bytes as u64,
                })
            })
            .map_err(|e| TankobonError::Database {
                message: format!("Failed to query namespace stats: {}", e),
                source: Some(e),
            })?
            .filter_map(|r| r.ok())
            .collect();

        Ok(CacheStats {
            total_entries: namespaces.iter().map(|n| n.entry_count).sum(),
            total_size_bytes: namespaces.iter().map(|n| n.total_size_bytes).sum(),
            max_size_bytes: self.config.max_size_bytes,
            namespaces,
        })
    }

    fn cleanup_expired(&self) -> Result<usize> {
        let conn = self.lock()?;
        let deleted = conn
            .execute(
                "DELETE FROM cache_entries WHERE expires_at <= ?1",
                params![now_millis()],
            )
            .map_err(|e| TankobonError::Database {
                message: format!("Failed to cleanup expired entries: {}", e),
                source: Some(e),
            })?;

        if deleted > 0 {
            debug!("Cleaned up {} expired cache entries", deleted);
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const HOUR: Duration = Duration::from_secs(3600);

    fn create_test_cache() -> (TempDir, SqliteCache) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test_cache.sqlite");
        let cache = SqliteCache::new(&db_path).unwrap();
        (temp_dir, cache)
    }

    #[test]
    fn test_set_and_get() {
        let (_temp, cache) = create_test_cache();
        cache.set("names", "one piece", b"anilist:30013", HOUR).unwrap();

        let value = cache.get("names", "one piece").unwrap();
        assert_eq!(value.as_deref(), Some(&b"anilist:30013"[..]));
        assert!(cache.get("names", "naruto").unwrap().is_none());
    }

    #[test]
    fn test_zero_ttl_is_expired() {
        let (_temp, cache) = create_test_cache();
        cache.set("names", "stale", b"x", Duration::ZERO).unwrap();
        assert!(cache.get("names", "stale").unwrap().is_none());
    }

    #[test]
    fn test_set_replaces_existing_value() {
        let (_temp, cache) = create_test_cache();
        cache.set("names", "berserk", b"old", HOUR).unwrap();
        cache.set("names", "berserk", b"new", HOUR).unwrap();
        assert_eq!(cache.get("names", "berserk").unwrap().unwrap(), b"new");
    }

    #[test]
    fn test_invalidate() {
        let (_temp, cache) = create_test_cache();
        cache.set("names", "a", b"1", HOUR).unwrap();
        cache.set("names", "b", b"2", HOUR).unwrap();

        assert!(cache.invalidate("names", "a").unwrap());
        assert!(!cache.invalidate("names", "a").unwrap());
        assert!(cache.get("names", "a").unwrap().is_none());
        assert!(cache.get("names", "b").unwrap().is_some());
    }

    #[test]
    fn test_invalidate_namespace_and_isolation() {
        let (_temp, cache) = create_test_cache();
        cache.set("names", "shared", b"name", HOUR).unwrap();
        cache.set("names", "other", b"name", HOUR).unwrap();
        cache.set("records", "shared", b"record", HOUR).unwrap();

        assert_eq!(cache.invalidate_namespace("names").unwrap(), 2);
        assert!(cache.get("names", "shared").unwrap().is_none());
        assert_eq!(cache.get("records", "shared").unwrap().unwrap(), b"record");
    }

    #[test]
    fn test_stats() {
        let (_temp, cache) = create_test_cache();
        cache.set("names", "a", b"12345", HOUR).unwrap();
        cache.set("names", "b", b"67890", HOUR).unwrap();
        cache.set("records", "a", b"abcde", HOUR).unwrap();

        let stats = cache.get_stats().unwrap();
        assert_eq!(stats.total_entries, 3);
        assert_eq!(stats.total_size_bytes, 15);
        assert_eq!(stats.namespaces.len(), 2);
        assert_eq!(stats.namespaces[0].namespace, "names");
        assert_eq!(stats.namespaces[0].entry_count, 2);
    }

    #[test]
    fn test_cleanup_expired() {
        let (_temp, cache) = create_test_cache();
        cache.set("failures", "old1", b"true", Duration::ZERO).unwrap();
        cache.set("failures", "old2", b"true", Duration::ZERO).unwrap();
        cache.set("failures", "new", b"true", HOUR).unwrap();

        assert_eq!(cache.cleanup_expired().unwrap(), 2);
        assert!(cache.get("failures", "new").unwrap().is_some());
    }

    #[test]
    fn test_lru_eviction() {
        let temp_dir = TempDir::new().unwrap();
        let cache = SqliteCache::with_config(
            temp_dir.path().join("small.sqlite"),
            CacheConfig {
                max_size_bytes: 10,
                enable_eviction: true,
            },
        )
        .unwrap();

        cache.set("records", "first", b"12345", HOUR).unwrap();
        std::thread::sleep(Duration::from_millis(5));
        cache.set("records", "second", b"12345", HOUR).unwrap();
        std::thread::sleep(Duration::from_millis(5));
        cache.set("records", "third", b"12345", HOUR).unwrap();

        assert!(cache.get("records", "first").unwrap().is_none());
        assert!(cache.get("records", "third").unwrap().is_some());
    }

    #[test]
    fn test_values_survive_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("persist.sqlite");
        {
            let cache = SqliteCache::new(&path).unwrap();
            cache.set("records", "anilist:1", b"{}", HOUR).unwrap();
        }
        let cache = SqliteCache::new(&path).unwrap();
        assert!(cache.get("records", "anilist:1").unwrap().is_some());
    }
}
