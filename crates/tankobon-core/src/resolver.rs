//! Turns a free-text series name into a canonical record.
//!
//! Resolution order for a name:
//! 1. The name cache (a sentinel fails fast, a dangling binding is dropped)
//! 2. The primary catalog: exact title, then alternate titles, then fuzzy
//! 3. Shorter queries when the catalog returned nothing at all
//! 4. The secondary catalog with the original query
//!
//! Successful results are cached under every alias that was tried, so
//! "Foo Bar Vol 3" and "Foo Bar" end up bound to the same record.

use crate::cache::{Binding, ResolutionCache};
use crate::catalog::{CanonicalRecord, CatalogClient, DynCatalogClient, RecordId};
use crate::config::ResolverConfig;
use crate::error::{Result, TankobonError};
use crate::fuzzy::closest_match;
use crate::metadata::fill_record_gaps;
use crate::naming::{normalize_name, relax_query};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome of a cache lookup for one normalized name.
enum Lookup {
    Hit(CanonicalRecord),
    NoMatch,
    Miss,
}

/// Resolves series names against the configured catalogs.
pub struct MetadataResolver {
    primary: DynCatalogClient,
    secondary: Option<DynCatalogClient>,
    cache: Arc<ResolutionCache>,
    relaxation_limit: u32,
}

impl MetadataResolver {
    pub fn new(primary: DynCatalogClient, cache: Arc<ResolutionCache>) -> Self {
        Self {
            primary,
            secondary: None,
            cache,
            relaxation_limit: ResolverConfig::DEFAULT_RELAXATION_LIMIT,
        }
    }

    /// Add a catalog consulted only after the primary is exhausted.
    pub fn with_secondary(mut self, secondary: DynCatalogClient) -> Self {
        self.secondary = Some(secondary);
        self
    }

    /// Maximum number of primary-catalog attempts, counting the original
    /// query. Values below 1 are treated as 1.
    pub fn with_relaxation_limit(mut self, limit: u32) -> Self {
        self.relaxation_limit = limit.max(1);
        self
    }

    pub fn cache(&self) -> &Arc<ResolutionCache> {
        &self.cache
    }

    /// Resolve a series name to its canonical record.
    pub async fn resolve(&self, name: &str) -> Result<CanonicalRecord> {
        let key = normalize_name(name);
        if key.is_empty() {
            return Err(TankobonError::Validation {
                field: "name".to_string(),
                message: "Series name is empty".to_string(),
            });
        }

        match self.lookup(&key) {
            Lookup::Hit(record) => {
                debug!("Resolved '{}' from cache as {}", name, record.id);
                return Ok(record);
            }
            Lookup::NoMatch => {
                debug!("'{}' is cached as having no match", name);
                return Err(self.not_found(name));
            }
            Lookup::Miss => {}
        }

        let mut aliases = vec![key.clone()];
        let mut query = key.clone();
        let mut found: Option<CanonicalRecord> = None;
        let mut fresh = true;
        // Whether any catalog answered at all, even with nothing.
        let mut answered = false;
        let mut attempt = 0;

        while attempt < self.relaxation_limit {
            attempt += 1;

            let cached = if attempt == 1 {
                Lookup::Miss
            } else {
                self.lookup(&query)
            };

            match cached {
                Lookup::Hit(record) => {
                    debug!("Relaxed query '{}' already bound to {}", query, record.id);
                    found = Some(record);
                    fresh = false;
                    break;
                }
                Lookup::NoMatch => debug!("Relaxed query '{}' is cached as no-match", query),
                Lookup::Miss => {
                    let candidates = self.search(self.primary.as_ref(), &query).await;
                    answered |= candidates.is_some();
                    if let Some(record) = candidates.and_then(|c| pick_candidate(&query, &c)) {
                        found = Some(record);
                        break;
                    }
                }
            }

            match relax_query(&query) {
                Some(shorter) => {
                    debug!("No results for '{}', retrying with '{}'", query, shorter);
                    aliases.push(shorter.clone());
                    query = shorter;
                }
                None => break,
            }
        }

        let record = match found {
            Some(mut record) => {
                if fresh && record.description.is_empty() {
                    if let Some(extra) = self.search_secondary(&key, &mut answered).await {
                        debug!("Filling gaps of {} from {}", record.id, extra.id);
                        fill_record_gaps(&mut record, &extra);
                    }
                }
                record
            }
            None => match self.search_secondary(&key, &mut answered).await {
                Some(record) => record,
                None if answered => {
                    self.remember_failure(&key);
                    info!("No catalog match for '{}'", name);
                    return Err(self.not_found(name));
                }
                None => {
                    // Outage, not an answer: leave the name open for the next try.
                    warn!("No catalog reachable while resolving '{}'", name);
                    return Err(self.not_found(name));
                }
            },
        };

        self.remember(&aliases, &record);
        info!("Resolved '{}' as {} ({})", name, record.id, record.display_name());
        Ok(record)
    }

    /// Fetch a record by identifier, consulting the record cache first.
    pub async fn resolve_by_id(&self, id: &RecordId) -> Result<CanonicalRecord> {
        match self.cache.record(id) {
            Ok(Some(record)) => return Ok(record),
            Ok(None) => {}
            Err(e) => warn!("Failed to read cached record {}: {}", id, e),
        }

        let client = std::iter::once(&self.primary)
            .chain(self.secondary.iter())
            .find(|c| c.catalog() == id.catalog)
            .ok_or_else(|| TankobonError::Validation {
                field: "id".to_string(),
                message: format!("No catalog configured for {}", id.catalog),
            })?;

        let record = client.get_by_id(&id.value).await?;
        if let Err(e) = self.cache.put_record(&record) {
            warn!("Failed to cache record {}: {}", record.id, e);
        }
        Ok(record)
    }

    /// Search the primary catalog directly, caching every returned record.
    pub async fn search_catalog(&self, query: &str) -> Result<Vec<CanonicalRecord>> {
        let records = self.primary.search_by_name(query).await?;
        self.cache_records(&records);
        Ok(records)
    }

    /// Forget the cached outcome for a name.
    pub fn forget(&self, name: &str) -> Result<bool> {
        self.cache.forget(&normalize_name(name))
    }

    fn lookup(&self, key: &str) -> Lookup {
        let id = match self.cache.binding(key) {
            Ok(Some(Binding::Bound(id))) => id,
            Ok(Some(Binding::NoMatch)) => return Lookup::NoMatch,
            Ok(None) => return Lookup::Miss,
            Err(e) => {
                warn!("Failed to read name cache for '{}': {}", key, e);
                return Lookup::Miss;
            }
        };

        match self.cache.record(&id) {
            Ok(Some(record)) => Lookup::Hit(record),
            Ok(None) => {
                debug!("Binding '{}' -> {} has no record, dropping it", key, id);
                if let Err(e) = self.cache.unbind(key) {
                    warn!("Failed to drop stale binding '{}': {}", key, e);
                }
                Lookup::Miss
            }
            Err(e) => {
                warn!("Failed to read cached record {}: {}", id, e);
                Lookup::Miss
            }
        }
    }

    /// Query a catalog, absorbing transport and parse failures. `None` means
    /// the catalog could not be queried.
    async fn search(&self, client: &dyn CatalogClient, query: &str) -> Option<Vec<CanonicalRecord>> {
        match client.search_by_name(query).await {
            Ok(records) => {
                self.cache_records(&records);
                Some(records)
            }
            Err(e) => {
                warn!("{} search for '{}' failed: {}", client.catalog(), query, e);
                None
            }
        }
    }

    async fn search_secondary(&self, query: &str, answered: &mut bool) -> Option<CanonicalRecord> {
        let secondary = self.secondary.as_ref()?;
        let candidates = self.search(secondary.as_ref(), query).await;
        *answered |= candidates.is_some();
        pick_candidate(query, &candidates?)
    }

    fn cache_records(&self, records: &[CanonicalRecord]) {
        for record in records {
            if let Err(e) = self.cache.put_record(record) {
                warn!("Failed to cache record {}: {}", record.id, e);
            }
        }
    }

    fn remember(&self, aliases: &[String], record: &CanonicalRecord) {
        if let Err(e) = self.cache.put_record(record) {
            warn!("Failed to cache record {}: {}", record.id, e);
            return;
        }
        for alias in aliases {
            if let Err(e) = self.cache.bind(alias, &record.id) {
                warn!("Failed to bind '{}' to {}: {}", alias, record.id, e);
            }
        }
    }

    fn remember_failure(&self, key: &str) {
        if let Err(e) = self.cache.mark_no_match(key) {
            warn!("Failed to cache no-match for '{}': {}", key, e);
        }
        if let Err(e) = self.cache.mark_failed(key) {
            warn!("Failed to cache failure for '{}': {}", key, e);
        }
    }

    fn not_found(&self, name: &str) -> TankobonError {
        let catalogs: Vec<&str> = std::iter::once(&self.primary)
            .chain(self.secondary.iter())
            .map(|c| c.catalog().as_str())
            .collect();
        TankobonError::not_found(name, catalogs.join(", "))
    }
}

/// Choose the best candidate for a query: exact display name, then an
/// alternate title, then the closest display name by edit distance.
fn pick_candidate(query: &str, candidates: &[CanonicalRecord]) -> Option<CanonicalRecord> {
    let query = normalize_name(query);

    if let Some(exact) = candidates
        .iter()
        .find(|c| normalize_name(c.display_name()) == query)
    {
        return Some(exact.clone());
    }

    if let Some(alternate) = candidates.iter().find(|c| {
        c.synonyms
            .iter()
            .chain([&c.title.romaji, &c.title.english, &c.title.native])
            .any(|t| !t.is_empty() && normalize_name(t) == query)
    }) {
        return Some(alternate.clone());
    }

    closest_match(&query, candidates, |c| c.display_name()).cloned()
}
