//! Sequencing of a single chapter download.

use super::{
    format_size, Acquisition, AcquisitionRequest, ChapterLayout, CoverDownloader, HistoryEntry,
    HistoryStore, PageAcquisition, ProgressCallback,
};
use crate::archive::{assembler_for, DynArchiveAssembler};
use crate::config::{PathsConfig, Settings};
use crate::error::{Result, TankobonError};
use crate::fs::DynFilesystem;
use crate::metadata::{merge_record, SeriesJson, SeriesRecord};
use crate::network::DynPageFetcher;
use crate::resolver::MetadataResolver;
use crate::source::{Chapter, DynSourceProvider, LocalSeries};
use crate::store::DynMetadataStore;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Downloads chapters end to end.
///
/// Page failures and archive failures fail the chapter. Metadata, sidecar
/// and cover failures are logged and the chapter still succeeds. The
/// history write is detached and never reported to the caller.
pub struct DownloadOrchestrator {
    settings: Settings,
    layout: ChapterLayout,
    source: DynSourceProvider,
    acquisition: PageAcquisition,
    assembler: DynArchiveAssembler,
    cover: CoverDownloader,
    fs: DynFilesystem,
    resolver: Option<Arc<MetadataResolver>>,
    /// Written in order after population; read in order as a fallback.
    stores: Vec<DynMetadataStore>,
    history: Option<Arc<HistoryStore>>,
}

impl DownloadOrchestrator {
    pub fn new(
        settings: Settings,
        downloads_dir: impl Into<PathBuf>,
        source: DynSourceProvider,
        fetcher: DynPageFetcher,
        fs: DynFilesystem,
    ) -> Self {
        let layout = ChapterLayout::new(downloads_dir, &settings);
        let acquisition = PageAcquisition::new(fetcher.clone(), fs.clone())
            .with_concurrency(settings.parallel_downloads);
        let assembler = assembler_for(settings.format, fs.clone(), settings.comic_info_xml);
        let cover = CoverDownloader::new(fetcher, fs.clone());

        Self {
            settings,
            layout,
            source,
            acquisition,
            assembler,
            cover,
            fs,
            resolver: None,
            stores: Vec::new(),
            history: None,
        }
    }

    pub fn with_resolver(mut self, resolver: Arc<MetadataResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Add a metadata store. Stores are consulted in the order added.
    pub fn with_store(mut self, store: DynMetadataStore) -> Self {
        self.stores.push(store);
        self
    }

    pub fn with_history(mut self, history: Arc<HistoryStore>) -> Self {
        self.history = Some(history);
        self
    }

    /// Parent directory for archive staging areas.
    pub fn with_staging_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.acquisition = self.acquisition.with_staging_root(root);
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn layout(&self) -> &ChapterLayout {
        &self.layout
    }

    pub fn source(&self) -> &DynSourceProvider {
        &self.source
    }

    /// Where a chapter's artifact is (or will be) written.
    pub fn chapter_path(&self, chapter: &Chapter) -> Result<PathBuf> {
        let series = chapter.series()?;
        Ok(self.layout.chapter_path(chapter, &series))
    }

    /// Download one chapter and return the artifact path.
    pub async fn download_chapter(
        &self,
        chapter: &Chapter,
        progress: ProgressCallback,
    ) -> Result<PathBuf> {
        let series = chapter.series()?;
        let target = self.layout.chapter_path(chapter, &series);
        let redownload = self.settings.redownload_existing;

        if !redownload && self.fs.exists(&target) {
            debug!("'{}' already downloaded at {}", chapter.name, target.display());
            return Ok(target);
        }

        progress("Getting pages");
        let pages = self.source.pages_of(chapter).await?;
        if pages.is_empty() {
            return Err(TankobonError::DownloadFailed {
                url: chapter.url.clone(),
                message: format!("No pages found for '{}'", chapter.name),
            });
        }

        let request = AcquisitionRequest {
            chapter: chapter.clone(),
            pages,
            target,
            format: self.settings.format,
            redownload,
        };
        let staged = match self.acquisition.download_pages(request, progress.clone()).await? {
            Acquisition::Skipped(path) => return Ok(path),
            Acquisition::Staged(staged) => staged,
        };

        // The cover URL usually comes from the catalog, so population goes
        // first; the sidecar and the cover are then independent.
        let series_dir = self.layout.series_dir(&series);
        if self.settings.fetch_metadata {
            if let Err(e) = self.populate(&series, &progress).await {
                warn!("Metadata for '{}' not updated: {}", series.name, e);
            }
        }
        let (sidecar_result, cover_result) = tokio::join!(
            async {
                if self.settings.write_series_json {
                    self.write_series_json(&series, &series_dir)
                } else {
                    Ok(())
                }
            },
            self.fetch_cover(&series, &series_dir, &progress),
        );
        if let Err(e) = sidecar_result {
            warn!("{} not written for '{}': {}", PathsConfig::SERIES_JSON_FILENAME, series.name, e);
        }
        if let Err(e) = cover_result {
            warn!("Cover for '{}' not downloaded: {}", series.name, e);
        }

        progress(&format!(
            "Converting {} pages to {} {}",
            staged.pages.len(),
            self.settings.format.as_str(),
            format_size(staged.total_bytes())
        ));
        let staging_dir = staged.staging_dir.clone();
        let cleanup = staging_dir != staged.target;
        let assembler = self.assembler.clone();
        let saved = tokio::task::spawn_blocking(move || assembler.save(staged))
            .await
            .map_err(|e| TankobonError::Archive {
                message: format!("Archive task failed: {}", e),
            })
            .and_then(|result| result);

        if cleanup {
            if let Err(e) = self.fs.remove_all(&staging_dir) {
                warn!("Failed to clean up {}: {}", staging_dir.display(), e);
            }
        }
        let path = saved?;

        if self.settings.save_history {
            self.record_history(&series, chapter);
        }

        info!("Downloaded '{}' to {}", chapter.name, path.display());
        progress("Downloaded");
        Ok(path)
    }

    /// Resolve and merge catalog metadata into the series, once per process.
    ///
    /// When resolution fails the stores are tried in order for a previously
    /// saved copy.
    pub async fn populate(&self, series: &Arc<LocalSeries>, progress: &ProgressCallback) -> Result<()> {
        if series.is_populated() {
            return Ok(());
        }
        let Some(resolver) = &self.resolver else {
            return Ok(());
        };

        progress("Getting metadata...");
        match resolver.resolve(&series.name).await {
            Ok(record) => {
                series.update_metadata(|metadata| merge_record(&record, metadata));
                series.bind_record(record);
                series.mark_populated();
                self.save_to_stores(series);
                Ok(())
            }
            Err(e) => {
                warn!("Could not resolve '{}': {}", series.name, e);
                match self.load_from_stores(series) {
                    Some(saved) => {
                        debug!("Using stored metadata for '{}'", series.name);
                        series.update_metadata(|metadata| *metadata = saved.metadata);
                        series.mark_populated();
                        Ok(())
                    }
                    None => Err(e),
                }
            }
        }
    }

    fn save_to_stores(&self, series: &LocalSeries) {
        let record = series.to_record();
        for store in &self.stores {
            if let Err(e) = store.save_series(&record) {
                warn!("Failed to save metadata for '{}': {}", series.name, e);
            }
        }
    }

    fn load_from_stores(&self, series: &LocalSeries) -> Option<SeriesRecord> {
        self.stores.iter().find_map(|store| match store.get_series_by_id(&series.id) {
            Ok(found) => found,
            Err(e) => {
                warn!("Failed to read stored metadata for '{}': {}", series.name, e);
                None
            }
        })
    }

    fn write_series_json(&self, series: &LocalSeries, series_dir: &Path) -> Result<()> {
        let sidecar = SeriesJson::from_series(&series.name, &series.metadata(), series.chapter_count());
        let contents = serde_json::to_vec_pretty(&sidecar)?;
        self.fs.create_dir_all(series_dir)?;
        self.fs
            .write_file(&series_dir.join(PathsConfig::SERIES_JSON_FILENAME), &contents)
    }

    async fn fetch_cover(
        &self,
        series: &LocalSeries,
        series_dir: &Path,
        progress: &ProgressCallback,
    ) -> Result<()> {
        if !self.settings.download_cover {
            return Ok(());
        }
        self.cover.download(series, series_dir, false, progress).await?;
        Ok(())
    }

    fn record_history(&self, series: &LocalSeries, chapter: &Chapter) {
        let Some(history) = self.history.clone() else {
            return;
        };
        let entry = HistoryEntry::new(series, chapter);

        // Detached: the caller never waits on history.
        tokio::task::spawn_blocking(move || {
            if let Err(e) = history.record(entry) {
                warn!("Failed to save download history: {}", e);
            }
        });
    }
}
