//! Builder for configuring TankobonApi initialization.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::api::ApiState;
use crate::cache::{CacheBackend, ResolutionCache, SqliteCache};
use crate::catalog::{AniListClient, DynCatalogClient, MangaDexCatalog};
use crate::config::{NetworkConfig, PathsConfig, Settings};
use crate::download::{DownloadOrchestrator, HistoryStore};
use crate::error::{Result, TankobonError};
use crate::fs::{DynFilesystem, OsFilesystem};
use crate::network::{DynPageFetcher, HttpClient};
use crate::resolver::MetadataResolver;
use crate::source::{DynSourceProvider, MangaDexProvider, SourceProvider};
use crate::store::{DynMetadataStore, JsonMetadataStore, SqliteMetadataStore};
use crate::TankobonApi;

/// Builder for configuring TankobonApi initialization.
///
/// Every collaborator has a production default; the `with_*` methods
/// replace one, which is how tests run the whole pipeline offline.
///
/// # Example
///
/// ```rust,ignore
/// use tankobon_core::TankobonApi;
///
/// let api = TankobonApi::builder("./library")
///     .auto_create_dirs(true)
///     .build()
///     .await?;
/// ```
pub struct TankobonApiBuilder {
    root: PathBuf,
    auto_create_dirs: bool,
    settings: Option<Settings>,
    catalog: Option<DynCatalogClient>,
    secondary_catalog: Option<DynCatalogClient>,
    secondary_enabled: Option<bool>,
    source: Option<DynSourceProvider>,
    page_fetcher: Option<DynPageFetcher>,
    filesystem: Option<DynFilesystem>,
    cache_backend: Option<Arc<dyn CacheBackend>>,
    staging_root: Option<PathBuf>,
}

impl TankobonApiBuilder {
    /// Create a new builder with the library root directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            auto_create_dirs: false,
            settings: None,
            catalog: None,
            secondary_catalog: None,
            secondary_enabled: None,
            source: None,
            page_fetcher: None,
            filesystem: None,
            cache_backend: None,
            staging_root: None,
        }
    }

    /// Auto-create required directories if they don't exist.
    ///
    /// When enabled, the builder will create the root plus:
    /// - `cache/`
    /// - `metadata/`
    /// - `downloads/`
    ///
    /// Default: `false` (the root must exist)
    pub fn auto_create_dirs(mut self, enable: bool) -> Self {
        self.auto_create_dirs = enable;
        self
    }

    /// Use these settings instead of reading `settings.json`.
    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Replace the primary catalog (AniList by default).
    pub fn with_catalog(mut self, catalog: DynCatalogClient) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Enable or disable the secondary catalog, overriding
    /// `use_secondary_catalog` from the settings.
    pub fn with_secondary_catalog(mut self, enable: bool) -> Self {
        self.secondary_enabled = Some(enable);
        self
    }

    /// Replace the secondary catalog (MangaDex by default).
    pub fn with_secondary_catalog_client(mut self, catalog: DynCatalogClient) -> Self {
        self.secondary_catalog = Some(catalog);
        self
    }

    /// Replace the chapter source (MangaDex by default).
    pub fn with_source(mut self, source: DynSourceProvider) -> Self {
        self.source = Some(source);
        self
    }

    /// Replace the fetcher used for pages and covers.
    pub fn with_page_fetcher(mut self, fetcher: DynPageFetcher) -> Self {
        self.page_fetcher = Some(fetcher);
        self
    }

    /// Replace the filesystem used for downloads.
    pub fn with_filesystem(mut self, filesystem: DynFilesystem) -> Self {
        self.filesystem = Some(filesystem);
        self
    }

    /// Replace the resolution cache backend (SQLite under `cache/` by
    /// default).
    pub fn with_cache_backend(mut self, backend: Arc<dyn CacheBackend>) -> Self {
        self.cache_backend = Some(backend);
        self
    }

    /// Directory for archive staging areas (the system temp dir by default).
    pub fn with_staging_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.staging_root = Some(root.into());
        self
    }

    /// Create the required directory structure.
    fn create_directory_structure(root: &Path) -> Result<()> {
        let dirs = [
            root.to_path_buf(),
            root.join(PathsConfig::CACHE_DIR_NAME),
            root.join(PathsConfig::METADATA_DIR_NAME),
            root.join(PathsConfig::DOWNLOADS_DIR_NAME),
        ];

        for dir in &dirs {
            if !dir.exists() {
                std::fs::create_dir_all(dir).map_err(|e| TankobonError::Io {
                    message: format!("Failed to create directory: {}", dir.display()),
                    path: Some(dir.clone()),
                    source: Some(e),
                })?;
            }
        }

        Ok(())
    }

    fn open_cache_backend(root: &Path) -> Arc<dyn CacheBackend> {
        let db_path = root
            .join(PathsConfig::CACHE_DIR_NAME)
            .join(PathsConfig::CACHE_DB_FILENAME);

        match SqliteCache::new(&db_path) {
            Ok(cache) => {
                let cache = Arc::new(cache);
                let cleanup = cache.clone();
                tokio::task::spawn_blocking(move || match cleanup.cleanup_expired() {
                    Ok(0) => {}
                    Ok(removed) => tracing::debug!("Removed {} expired cache entries", removed),
                    Err(e) => tracing::warn!("Cache cleanup failed: {}", e),
                });
                cache as Arc<dyn CacheBackend>
            }
            Err(e) => {
                // Resolution still works, it just forgets everything on exit.
                tracing::warn!(
                    "Failed to open resolution cache at {}, using memory: {}",
                    db_path.display(),
                    e
                );
                Arc::new(ResolutionCache::memory_backend())
            }
        }
    }

    /// Build the TankobonApi instance.
    pub async fn build(self) -> Result<TankobonApi> {
        if self.auto_create_dirs {
            Self::create_directory_structure(&self.root)?;
        } else if !self.root.exists() {
            return Err(TankobonError::Config {
                message: format!("Library root does not exist: {}", self.root.display()),
            });
        }

        let settings = match self.settings {
            Some(settings) => {
                settings.validate()?;
                settings
            }
            None => Settings::load(&self.root.join(PathsConfig::SETTINGS_FILENAME))?,
        };

        let http = HttpClient::new()?;

        let cache_backend = match self.cache_backend {
            Some(backend) => backend,
            None => Self::open_cache_backend(&self.root),
        };
        let resolution_cache = Arc::new(ResolutionCache::new(cache_backend.clone()));

        let primary: DynCatalogClient = match self.catalog {
            Some(catalog) => catalog,
            None => Arc::new(AniListClient::new(http.clone())),
        };
        let mut resolver = MetadataResolver::new(primary, resolution_cache)
            .with_relaxation_limit(settings.relaxation_limit);
        if self.secondary_enabled.unwrap_or(settings.use_secondary_catalog) {
            let secondary: DynCatalogClient = match self.secondary_catalog {
                Some(catalog) => catalog,
                None => Arc::new(MangaDexCatalog::new(http.clone())),
            };
            resolver = resolver.with_secondary(secondary);
        }
        let resolver = Arc::new(resolver);

        let db_store: DynMetadataStore = Arc::new(SqliteMetadataStore::new(
            self.root.join(PathsConfig::DATABASE_FILENAME),
        )?);
        let json_store: DynMetadataStore = Arc::new(JsonMetadataStore::new(&self.root));

        let source: DynSourceProvider = match self.source {
            Some(source) => source,
            None => Arc::new(MangaDexProvider::new(http).with_language(settings.language.clone())),
        };
        let page_fetcher: DynPageFetcher = match self.page_fetcher {
            Some(fetcher) => fetcher,
            None => Arc::new(HttpClient::with_timeout(NetworkConfig::DOWNLOAD_REQUEST_TIMEOUT)?),
        };
        let filesystem: DynFilesystem = match self.filesystem {
            Some(filesystem) => filesystem,
            None => Arc::new(OsFilesystem),
        };

        let history = Arc::new(HistoryStore::new(self.root.join(PathsConfig::HISTORY_FILENAME)));

        let mut orchestrator = DownloadOrchestrator::new(
            settings.clone(),
            self.root.join(PathsConfig::DOWNLOADS_DIR_NAME),
            source.clone(),
            page_fetcher,
            filesystem,
        )
        .with_resolver(resolver.clone())
        .with_store(db_store.clone())
        .with_store(json_store.clone())
        .with_history(history.clone());
        if let Some(staging_root) = self.staging_root {
            orchestrator = orchestrator.with_staging_root(staging_root);
        }

        tracing::info!(
            "Library at {} ready (source: {}, format: {})",
            self.root.display(),
            source.name(),
            settings.format.as_str()
        );

        let state = Arc::new(ApiState {
            settings,
            cache_backend,
            resolver,
            db_store,
            json_store,
            source,
            orchestrator,
            history,
            series: RwLock::new(HashMap::new()),
        });

        Ok(TankobonApi {
            root: self.root,
            state,
        })
    }
}
