//! In-process cache backend built on mini-moka.

use super::traits::{CacheBackend, CacheStats, NamespaceStats};
use crate::config::ResolverConfig;
use crate::error::{Result, TankobonError};
use mini_moka::sync::Cache;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

#[derive(Clone)]
struct MemoryEntry {
    value: Vec<u8>,
    expires_at: Instant,
}

/// Cache backend that lives for the process lifetime.
///
/// Each namespace gets its own bounded mini-moka cache. Entries carry their
/// own expiry because TTLs differ per entry (a no-match sentinel expires long
/// before a real binding).
pub struct MemoryCache {
    namespaces: RwLock<HashMap<String, Cache<String, MemoryEntry>>>,
    capacity: u64,
    capacities: HashMap<String, u64>,
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(ResolverConfig::MEMORY_CACHE_CAPACITY)
    }
}

impl MemoryCache {
    /// Create a cache holding at most `capacity` entries per namespace.
    pub fn new(capacity: u64) -> Self {
        Self {
            namespaces: RwLock::new(HashMap::new()),
            capacity,
            capacities: HashMap::new(),
        }
    }

    /// Override the entry limit for one namespace.
    pub fn with_namespace_capacity(mut self, namespace: &str, capacity: u64) -> Self {
        self.capacities.insert(namespace.to_string(), capacity);
        self
    }

    /// Entry limit applied to `namespace`.
    pub fn capacity_for(&self, namespace: &str) -> u64 {
        self.capacities
            .get(namespace)
            .copied()
            .unwrap_or(self.capacity)
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, Cache<String, MemoryEntry>>>> {
        self.namespaces.read().map_err(|e| TankobonError::Other(format!(
            "Memory cache lock poisoned: {}",
            e
        )))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, Cache<String, MemoryEntry>>>> {
        self.namespaces.write().map_err(|e| TankobonError::Other(format!(
            "Memory cache lock poisoned: {}",
            e
        )))
    }

    fn namespace(&self, namespace: &str) -> Result<Cache<String, MemoryEntry>> {
        if let Some(cache) = self.read()?.get(namespace) {
            return Ok(cache.clone());
        }
        let mut namespaces = self.write()?;
        Ok(namespaces
            .entry(namespace.to_string())
            .or_insert_with(|| Cache::builder().max_capacity(self.capacity_for(namespace)).build())
            .clone())
    }

    fn live_entries(cache: &Cache<String, MemoryEntry>) -> (usize, u64) {
        let now = Instant::now();
        cache
            .iter()
            .filter(|entry| entry.value().expires_at > now)
            .fold((0, 0), |(count, size), entry| {
                (count + 1, size + entry.value().value.len() as u64)
            })
    }
}

impl CacheBackend for MemoryCache {
    fn get(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>> {
        let cache = match self.read()?.get(namespace) {
            Some(cache) => cache.clone(),
            None => return Ok(None),
        };

        let key = key.to_string();
        match cache.get(&key) {
            Some(entry) if entry.expires_at > Instant::now() => Ok(Some(entry.value)),
            Some(_) => {
                cache.invalidate(&key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn set(&self, namespace: &str, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        let now = Instant::now();
        let expires_at = now.checked_add(ttl).unwrap_or(now + ResolverConfig::RECORD_TTL);
        self.namespace(namespace)?.insert(
            key.to_string(),
            MemoryEntry {
                value: value.to_vec(),
                expires_at,
            },
        );
        Ok(())
    }

    fn invalidate(&self, namespace: &str, key: &str) -> Result<bool> {
        let cache = match self.read()?.get(namespace) {
            Some(cache) => cache.clone(),
            None => return Ok(false),
        };
        let key = key.to_string();
        let existed = cache.contains_key(&key);
        cache.invalidate(&key);
        Ok(existed)
    }

    fn invalidate_namespace(&self, namespace: &str) -> Result<usize> {
        let removed = self.write()?.remove(namespace);
        Ok(removed
            .map(|cache| Self::live_entries(&cache).0)
            .unwrap_or(0))
    }

    fn get_stats(&self) -> Result<CacheStats> {
        let namespaces = self.read()?;
        let mut stats: Vec<NamespaceStats> = namespaces
            .iter()
            .map(|(name, cache)| {
                let (entry_count, total_size_bytes) = Self::live_entries(cache);
                NamespaceStats {
                    namespace: name.clone(),
                    entry_count,
                    total_size_bytes,
                }
            })
            .collect();
        stats.sort_by(|a, b| a.namespace.cmp(&b.namespace));

        Ok(CacheStats {
            total_entries: stats.iter().map(|n| n.entry_count).sum(),
            total_size_bytes: stats.iter().map(|n| n.total_size_bytes).sum(),
            max_size_bytes: 0,
            namespaces: stats,
        })
    }

    fn cleanup_expired(&self) -> Result<usize> {
        let now = Instant::now();
        let mut removed = 0;
        for cache in self.read()?.values() {
            let expired: Vec<String> = cache
                .iter()
                .filter(|entry| entry.value().expires_at <= now)
                .map(|entry| entry.key().clone())
                .collect();
            for key in expired {
                cache.invalidate(&key);
                removed += 1;
            }
        }
        Ok(removed)
    }
}
