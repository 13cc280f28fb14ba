//! Source search and chapter download methods on TankobonApi.

use crate::download::{no_progress, HistoryEntry, ProgressCallback};
use crate::error::{Result, TankobonError};
use crate::metadata::SeriesRecord;
use crate::source::{Chapter, LocalSeries, SourceProvider};
use crate::TankobonApi;
use std::path::PathBuf;
use std::sync::Arc;

impl TankobonApi {
    // ========================================
    // Source
    // ========================================

    /// Search the chapter source. Results are remembered so their ids can
    /// be passed to [`list_chapters`](Self::list_chapters) and
    /// [`download_chapter`](Self::download_chapter).
    pub async fn search_series(&self, query: &str) -> Result<Vec<SeriesRecord>> {
        let found = self.state.source.search(query).await?;
        let mut records = Vec::with_capacity(found.len());
        for series in found {
            let series = self.state.register(series).await;
            records.push(series.to_record());
        }
        Ok(records)
    }

    async fn series_or_not_found(&self, series_id: &str) -> Result<Arc<LocalSeries>> {
        self.state
            .lookup(series_id)
            .await?
            .ok_or_else(|| TankobonError::not_found(series_id, self.state.source.name()))
    }

    /// Chapters of a series in download order, optionally filtered by a
    /// case-insensitive substring of the chapter name.
    pub async fn list_chapters(&self, series_id: &str, query: Option<&str>) -> Result<Vec<Chapter>> {
        let series = self.series_or_not_found(series_id).await?;
        let chapters = self.state.source.chapters_of(&series).await?;

        let Some(query) = query.map(str::trim).filter(|q| !q.is_empty()) else {
            return Ok(chapters);
        };
        let query = query.to_lowercase();
        Ok(chapters
            .into_iter()
            .filter(|c| c.name.to_lowercase().contains(&query))
            .collect())
    }

    /// Download one chapter and return the artifact path.
    ///
    /// The chapter list is fetched when the series has not been listed in
    /// this process yet.
    pub async fn download_chapter(
        &self,
        series_id: &str,
        chapter_id: &str,
        progress: Option<ProgressCallback>,
    ) -> Result<PathBuf> {
        let series = self.series_or_not_found(series_id).await?;

        let chapter = match series.find_chapter(chapter_id) {
            Some(chapter) => chapter,
            None => {
                self.state.source.chapters_of(&series).await?;
                series
                    .find_chapter(chapter_id)
                    .ok_or_else(|| TankobonError::not_found(chapter_id, self.state.source.name()))?
            }
        };

        self.state
            .orchestrator
            .download_chapter(&chapter, progress.unwrap_or_else(no_progress))
            .await
    }

    /// Last downloaded chapter of every series, most recent first.
    pub fn download_history(&self) -> Result<Vec<HistoryEntry>> {
        self.state.history.entries()
    }
}
