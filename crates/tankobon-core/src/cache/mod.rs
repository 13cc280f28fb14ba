//! Cache layer for resolution results.
//!
//! Backends store namespaced bytes with a TTL:
//! - `SqliteCache` persists across runs in one database file
//! - `MemoryCache` lives for the process
//!
//! `ResolutionCache` puts the name, record and failure caches on top of
//! whichever backend the caller injects.

mod memory;
mod resolution;
mod sqlite;
mod traits;

pub use memory::MemoryCache;
pub use resolution::{Binding, ResolutionCache, TypedCache};
pub use sqlite::SqliteCache;
pub use traits::{CacheBackend, CacheConfig, CacheStats, NamespaceStats};
