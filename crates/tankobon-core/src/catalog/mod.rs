//! Upstream catalog clients.
//!
//! Each client queries one catalog backend and returns records already
//! converted to [`CanonicalRecord`]. Clients are stateless apart from their
//! HTTP connection pool; caching belongs to the resolver.

mod anilist;
pub(crate) mod mangadex;
mod types;

pub use anilist::AniListClient;
pub use mangadex::MangaDexCatalog;
pub use types::{
    CanonicalRecord, CatalogId, CoverImage, FuzzyDate, PublicationFormat, RecordId,
    SeriesStatus, StaffCredit, Tag, Title,
};

use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// A searchable catalog of series metadata.
#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// Which catalog this client talks to.
    fn catalog(&self) -> CatalogId;

    /// Search the catalog by free text, best matches first.
    async fn search_by_name(&self, query: &str) -> Result<Vec<CanonicalRecord>>;

    /// Fetch one record by its catalog-local identifier.
    async fn get_by_id(&self, id: &str) -> Result<CanonicalRecord>;
}

/// Shared handle to a catalog client.
pub type DynCatalogClient = Arc<dyn CatalogClient>;
