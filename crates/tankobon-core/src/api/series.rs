//! Metadata resolution and stored-series methods on TankobonApi.

use crate::catalog::{CanonicalRecord, RecordId};
use crate::error::{Result, TankobonError};
use crate::metadata::SeriesRecord;
use crate::store::MetadataStore;
use crate::TankobonApi;

impl TankobonApi {
    // ========================================
    // Resolution
    // ========================================

    /// Resolve a free-text series name to its canonical record.
    pub async fn resolve_series(&self, name: &str) -> Result<CanonicalRecord> {
        self.state.resolver.resolve(name).await
    }

    /// Fetch a canonical record by identifier, e.g. `anilist:30013`.
    pub async fn resolve_record(&self, id: &str) -> Result<CanonicalRecord> {
        let id = RecordId::parse(id).ok_or_else(|| TankobonError::Validation {
            field: "id".to_string(),
            message: format!("Not a record identifier: {}", id),
        })?;
        self.state.resolver.resolve_by_id(&id).await
    }

    /// Drop the cached no-match and failure state for a name so the next
    /// resolve queries the catalogs again.
    pub fn forget_resolution(&self, name: &str) -> Result<bool> {
        self.state.resolver.forget(name)
    }

    /// Search the primary catalog directly, without binding any name.
    pub async fn search_catalog(&self, query: &str) -> Result<Vec<CanonicalRecord>> {
        self.state.resolver.search_catalog(query).await
    }

    // ========================================
    // Stored Series
    // ========================================

    /// A stored series by its source-local id.
    pub fn get_series(&self, local_id: &str) -> Result<Option<SeriesRecord>> {
        self.state.db_store.get_series_by_id(local_id)
    }

    /// A stored series whose title or synonyms contain `name`.
    pub fn find_series(&self, name: &str) -> Result<Option<SeriesRecord>> {
        self.state.db_store.find_series_by_name(name)
    }

    /// Every stored series, ordered by title.
    pub fn list_series(&self) -> Result<Vec<SeriesRecord>> {
        self.state.db_store.list_series()
    }

    /// Remove a series from both stores.
    pub fn delete_series(&self, local_id: &str) -> Result<bool> {
        let from_db = self.state.db_store.delete_series(local_id)?;
        let from_json = self.state.json_store.delete_series(local_id)?;
        Ok(from_db || from_json)
    }
}
