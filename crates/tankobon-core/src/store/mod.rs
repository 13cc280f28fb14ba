//! Persistence of per-series metadata.
//!
//! Two backends implement [`MetadataStore`]: the normalized SQLite schema
//! and a JSON file per series. The download pipeline writes both and reads
//! them in that order when catalog resolution fails.

mod json;
mod sqlite;

pub use json::JsonMetadataStore;
pub use sqlite::SqliteMetadataStore;

use crate::error::Result;
use crate::metadata::SeriesRecord;
use std::sync::Arc;

/// Storage for [`SeriesRecord`]s.
pub trait MetadataStore: Send + Sync {
    /// Insert or fully replace a series, keyed by title.
    fn save_series(&self, record: &SeriesRecord) -> Result<()>;

    /// Case-insensitive substring match on title or synonyms.
    fn find_series_by_name(&self, name: &str) -> Result<Option<SeriesRecord>>;

    /// Look up a series by its source-local identifier.
    fn get_series_by_id(&self, id: &str) -> Result<Option<SeriesRecord>>;

    /// Remove a series. Returns whether anything was deleted.
    fn delete_series(&self, id: &str) -> Result<bool>;

    /// Every stored series, ordered by title.
    fn list_series(&self) -> Result<Vec<SeriesRecord>>;
}

/// Shared handle to a metadata store.
pub type DynMetadataStore = Arc<dyn MetadataStore>;
