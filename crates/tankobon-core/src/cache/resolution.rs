//! The three resolution caches: name bindings, records and failures.

use super::memory::MemoryCache;
use super::traits::CacheBackend;
use crate::catalog::{CanonicalRecord, RecordId};
use crate::config::ResolverConfig;
use crate::error::{Result, TankobonError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Typed view over one namespace of a cache backend.
///
/// Values are stored as JSON. A value that no longer deserializes is treated
/// as absent and removed.
pub struct TypedCache<V> {
    backend: Arc<dyn CacheBackend>,
    namespace: &'static str,
    ttl: Duration,
    _value: PhantomData<fn() -> V>,
}

impl<V: Serialize + DeserializeOwned> TypedCache<V> {
    pub fn new(backend: Arc<dyn CacheBackend>, namespace: &'static str, ttl: Duration) -> Self {
        Self {
            backend,
            namespace,
            ttl,
            _value: PhantomData,
        }
    }

    pub fn get(&self, key: &str) -> Result<Option<V>> {
        let Some(bytes) = self.backend.get(self.namespace, key)? else {
            return Ok(None);
        };
        match serde_json::from_slice(&bytes) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                debug!(
                    "Dropping unreadable {} entry '{}': {}",
                    self.namespace, key, e
                );
                self.backend.invalidate(self.namespace, key)?;
                Ok(None)
            }
        }
    }

    pub fn set(&self, key: &str, value: &V) -> Result<()> {
        self.set_with_ttl(key, value, self.ttl)
    }

    pub fn set_with_ttl(&self, key: &str, value: &V, ttl: Duration) -> Result<()> {
        let bytes = serde_json::to_vec(value).map_err(|e| TankobonError::Json {
            message: format!("Failed to encode {} entry '{}': {}", self.namespace, key, e),
            source: Some(e),
        })?;
        self.backend.set(self.namespace, key, &bytes, ttl)
    }

    pub fn delete(&self, key: &str) -> Result<bool> {
        self.backend.invalidate(self.namespace, key)
    }

    pub fn clear(&self) -> Result<usize> {
        self.backend.invalidate_namespace(self.namespace)
    }
}

/// A name binding: either a record identifier or an explicit "no match".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Binding {
    Bound(RecordId),
    NoMatch,
}

/// Name → id, id → record and name → failed caches sharing one backend.
///
/// Names are expected to be normalized by the caller. Records outlive
/// bindings so that a dangling binding is the exception, not the rule.
pub struct ResolutionCache {
    names: TypedCache<Binding>,
    records: TypedCache<CanonicalRecord>,
    failures: TypedCache<bool>,
}

impl ResolutionCache {
    pub const NAMES_NAMESPACE: &'static str = "resolver.names";
    pub const RECORDS_NAMESPACE: &'static str = "resolver.records";
    pub const FAILURES_NAMESPACE: &'static str = "resolver.failures";

    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self {
            names: TypedCache::new(
                backend.clone(),
                Self::NAMES_NAMESPACE,
                ResolverConfig::BINDING_TTL,
            ),
            records: TypedCache::new(
                backend.clone(),
                Self::RECORDS_NAMESPACE,
                ResolverConfig::RECORD_TTL,
            ),
            failures: TypedCache::new(
                backend,
                Self::FAILURES_NAMESPACE,
                ResolverConfig::FAILURE_TTL,
            ),
        }
    }

    pub fn binding(&self, name: &str) -> Result<Option<Binding>> {
        self.names.get(name)
    }

    pub fn bind(&self, name: &str, id: &RecordId) -> Result<()> {
        self.names.set(name, &Binding::Bound(id.clone()))?;
        // A successful binding supersedes an earlier exhausted search.
        self.failures.delete(name)?;
        Ok(())
    }

    /// Record the sentinel "no match" entry for a name.
    pub fn mark_no_match(&self, name: &str) -> Result<()> {
        self.names
            .set_with_ttl(name, &Binding::NoMatch, ResolverConfig::NO_MATCH_TTL)
    }

    pub fn unbind(&self, name: &str) -> Result<bool> {
        self.names.delete(name)
    }

    pub fn record(&self, id: &RecordId) -> Result<Option<CanonicalRecord>> {
        self.records.get(&id.to_string())
    }

    pub fn put_record(&self, record: &CanonicalRecord) -> Result<()> {
        self.records.set(&record.id.to_string(), record)
    }

    pub fn is_failed(&self, name: &str) -> Result<bool> {
        Ok(self.failures.get(name)?.unwrap_or(false))
    }

    pub fn mark_failed(&self, name: &str) -> Result<()> {
        self.failures.set(name, &true)
    }

    /// Drop every cached outcome for a name so the next resolution searches
    /// again. Returns whether anything was removed.
    pub fn forget(&self, name: &str) -> Result<bool> {
        let unbound = self.names.delete(name)?;
        let unfailed = self.failures.delete(name)?;
        Ok(unbound || unfailed)
    }

    /// In-process backend sized so records outlive the bindings that point
    /// at them.
    pub fn memory_backend() -> MemoryCache {
        MemoryCache::new(ResolverConfig::MEMORY_CACHE_CAPACITY).with_namespace_capacity(
            Self::RECORDS_NAMESPACE,
            ResolverConfig::MEMORY_RECORD_CAPACITY,
        )
    }

    /// Remove every entry of all three caches.
    pub fn clear(&self) -> Result<usize> {
        Ok(self.names.clear()? + self.records.clear()? + self.failures.clear()?)
    }
}
