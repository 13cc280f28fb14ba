//! State shared by every API call.

use crate::cache::CacheBackend;
use crate::config::Settings;
use crate::download::{DownloadOrchestrator, HistoryStore};
use crate::error::Result;
use crate::resolver::MetadataResolver;
use crate::source::{DynSourceProvider, LocalSeries};
use crate::store::{DynMetadataStore, MetadataStore};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

pub(crate) struct ApiState {
    pub(crate) settings: Settings,
    pub(crate) cache_backend: Arc<dyn CacheBackend>,
    pub(crate) resolver: Arc<MetadataResolver>,
    pub(crate) db_store: DynMetadataStore,
    pub(crate) json_store: DynMetadataStore,
    pub(crate) source: DynSourceProvider,
    pub(crate) orchestrator: DownloadOrchestrator,
    pub(crate) history: Arc<HistoryStore>,
    /// Series handed out by searches, keyed by source-local id.
    pub(crate) series: RwLock<HashMap<String, Arc<LocalSeries>>>,
}

impl ApiState {
    pub(crate) async fn register(&self, series: Arc<LocalSeries>) -> Arc<LocalSeries> {
        let mut registry = self.series.write().await;
        // Keep the existing instance so its populated and cover flags
        // survive repeated searches.
        registry
            .entry(series.id.clone())
            .or_insert(series)
            .clone()
    }

    /// A series by id: the registry first, then the stores.
    pub(crate) async fn lookup(&self, series_id: &str) -> Result<Option<Arc<LocalSeries>>> {
        if let Some(series) = self.series.read().await.get(series_id) {
            return Ok(Some(series.clone()));
        }

        for store in [&self.db_store, &self.json_store] {
            if let Some(record) = store.get_series_by_id(series_id)? {
                let series = LocalSeries::from_record(record).into_shared();
                return Ok(Some(self.register(series).await));
            }
        }
        Ok(None)
    }
}
