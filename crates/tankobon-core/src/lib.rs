//! Tankobon Core - headless library for manga metadata resolution and
//! chapter archiving.
//!
//! The crate resolves free-text series names against public catalogs
//! (AniList first, MangaDex as a fallback), caches the results, keeps the
//! merged metadata in a local store, and downloads chapters into CBZ
//! archives or plain page directories. It can be used programmatically
//! without any HTTP/RPC layer.
//!
//! # Example
//!
//! ```rust,ignore
//! use tankobon_core::TankobonApi;
//!
//! #[tokio::main]
//! async fn main() -> tankobon_core::Result<()> {
//!     let api = TankobonApi::new("/path/to/library").await?;
//!
//!     let record = api.resolve_series("Kaiju No. 8").await?;
//!     println!("Resolved to {}", record.id);
//!
//!     let found = api.search_series("Kaiju No. 8").await?;
//!     let chapters = api.list_chapters(&found[0].id, None).await?;
//!     let path = api.download_chapter(&found[0].id, &chapters[0].id, None).await?;
//!     println!("Saved {}", path.display());
//!
//!     Ok(())
//! }
//! ```

pub mod archive;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod download;
pub mod error;
pub mod fs;
pub mod fuzzy;
pub mod metadata;
pub mod naming;
pub mod network;
pub mod resolver;
pub mod source;
pub mod store;

mod api;

// Re-export commonly used types
pub use cache::{CacheBackend, CacheConfig, CacheStats, MemoryCache, ResolutionCache, SqliteCache};
pub use catalog::{CanonicalRecord, CatalogClient, CatalogId, RecordId};
pub use config::{OutputFormat, Settings};
pub use download::{DownloadOrchestrator, HistoryEntry, ProgressCallback};
pub use error::{Result, TankobonError};
pub use metadata::{SeriesMetadata, SeriesRecord};
pub use resolver::MetadataResolver;
pub use source::{Chapter, LocalSeries, Page, SourceProvider};
pub use store::MetadataStore;

pub use api::TankobonApiBuilder;

use api::ApiState;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Main API struct for tankobon operations.
///
/// Owns the resolver, the metadata stores, the source provider and the
/// download pipeline for one library root. Series returned by
/// [`search_series`](TankobonApi::search_series) are kept in a registry so
/// later calls can refer to them by id.
pub struct TankobonApi {
    /// Library root (settings, caches, stores, downloads).
    root: PathBuf,
    state: Arc<ApiState>,
}

impl TankobonApi {
    /// Create a builder for TankobonApi.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let api = TankobonApi::builder("./library")
    ///     .auto_create_dirs(true)
    ///     .with_secondary_catalog(false)
    ///     .build()
    ///     .await?;
    /// ```
    pub fn builder(root: impl Into<PathBuf>) -> TankobonApiBuilder {
        TankobonApiBuilder::new(root)
    }

    /// Create an API over `root` with the default collaborators, creating
    /// the directory layout if needed.
    pub async fn new(root: impl Into<PathBuf>) -> Result<Self> {
        Self::builder(root).auto_create_dirs(true).build().await
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}
