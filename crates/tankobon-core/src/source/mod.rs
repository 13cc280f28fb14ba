//! Chapter sources.
//!
//! A [`SourceProvider`] finds series, lists their chapters in a stable order
//! and turns a chapter into page URLs. Downloading the pages is left to the
//! download pipeline.

mod mangadex;
mod model;

pub use mangadex::MangaDexProvider;
pub use model::{extension_of, sort_chapters, Chapter, LocalSeries, Page};

use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// A site or API chapters can be downloaded from.
#[async_trait]
pub trait SourceProvider: Send + Sync {
    /// Stable identifier, used in history keys and stored records.
    fn id(&self) -> &str;

    /// Human-readable name, available to chapter name templates.
    fn name(&self) -> &str;

    async fn search(&self, query: &str) -> Result<Vec<Arc<LocalSeries>>>;

    /// List chapters sorted with [`sort_chapters`] and store them on the
    /// series.
    async fn chapters_of(&self, series: &Arc<LocalSeries>) -> Result<Vec<Chapter>>;

    /// Page URLs of a chapter, in reading order.
    async fn pages_of(&self, chapter: &Chapter) -> Result<Vec<Page>>;
}

/// Shared handle to a source provider.
pub type DynSourceProvider = Arc<dyn SourceProvider>;
