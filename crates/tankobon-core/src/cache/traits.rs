//! Cache backend trait and types.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for cache behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CacheConfig {
    /// Maximum cache size in bytes (0 = unlimited).
    pub max_size_bytes: u64,
    /// Whether to enable LRU eviction when max size is reached.
    pub enable_eviction: bool,
}

impl CacheConfig {
    /// Default maximum cache size (256 MB).
    pub const DEFAULT_MAX_SIZE_BYTES: u64 = 268_435_456;
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size_bytes: CacheConfig::DEFAULT_MAX_SIZE_BYTES,
            enable_eviction: true,
        }
    }
}

/// Statistics for one namespace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamespaceStats {
    pub namespace: String,
    pub entry_count: usize,
    pub total_size_bytes: u64,
}

/// Cache statistics across all namespaces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    /// Total number of entries across all namespaces.
    pub total_entries: usize,
    /// Total size of all cached data in bytes.
    pub total_size_bytes: u64,
    /// Maximum allowed size in bytes (0 = unlimited).
    pub max_size_bytes: u64,
    /// Per-namespace statistics, ordered by namespace.
    pub namespaces: Vec<NamespaceStats>,
}

/// Generic cache backend trait.
///
/// Provides namespace-isolated byte storage with TTL support. Operations
/// are synchronous to match rusqlite's API; every implementation must be
/// safe to share between tasks.
pub trait CacheBackend: Send + Sync {
    /// Get cached data by key.
    ///
    /// Returns `None` if the key doesn't exist or has expired.
    fn get(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>>;

    /// Set cached data with TTL, replacing any existing entry.
    fn set(&self, namespace: &str, key: &str, value: &[u8], ttl: Duration) -> Result<()>;

    /// Delete a key. Returns whether an entry was removed.
    fn invalidate(&self, namespace: &str, key: &str) -> Result<bool>;

    /// Delete every key in a namespace. Returns the number removed.
    fn invalidate_namespace(&self, namespace: &str) -> Result<usize>;

    /// Get overall cache statistics.
    fn get_stats(&self) -> Result<CacheStats>;

    /// Remove expired entries. Returns the number removed.
    fn cleanup_expired(&self) -> Result<usize>;
}
