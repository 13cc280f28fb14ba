//! Last downloaded chapter per series, kept in `history.json`.

use crate::error::Result;
use crate::metadata::{atomic_read_json, atomic_write_json};
use crate::source::{Chapter, LocalSeries};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub series_id: String,
    pub series_name: String,
    pub source_id: String,
    pub chapter_id: String,
    pub chapter_name: String,
    pub chapter_index: u32,
    pub chapter_url: String,
    pub chapters_count: usize,
    pub downloaded_at: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn new(series: &LocalSeries, chapter: &Chapter) -> Self {
        Self {
            series_id: series.id.clone(),
            series_name: series.name.clone(),
            source_id: series.source_id.clone(),
            chapter_id: chapter.id.clone(),
            chapter_name: chapter.name.clone(),
            chapter_index: chapter.index,
            chapter_url: chapter.url.clone(),
            chapters_count: series.chapter_count(),
            downloaded_at: Utc::now(),
        }
    }

    /// Map key: `<source>:<series id>`.
    pub fn key(&self) -> String {
        format!("{}:{}", self.source_id, self.series_id)
    }
}

type HistoryMap = BTreeMap<String, HistoryEntry>;

/// Download history backed by a single JSON file.
///
/// Writers within the process are serialized so concurrent chapter
/// downloads do not lose each other's entries.
pub struct HistoryStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<HistoryMap> {
        Ok(atomic_read_json(&self.path)?.unwrap_or_default())
    }

    /// Insert or replace the entry for the entry's series.
    pub fn record(&self, entry: HistoryEntry) -> Result<()> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut entries = self.load()?;
        debug!("Recording history for {}: {}", entry.key(), entry.chapter_name);
        entries.insert(entry.key(), entry);
        atomic_write_json(&self.path, &entries, false)
    }

    pub fn get(&self, source_id: &str, series_id: &str) -> Result<Option<HistoryEntry>> {
        Ok(self.load()?.remove(&format!("{}:{}", source_id, series_id)))
    }

    /// Every entry, most recent download first.
    pub fn entries(&self) -> Result<Vec<HistoryEntry>> {
        let mut entries: Vec<_> = self.load()?.into_values().collect();
        entries.sort_by(|a, b| b.downloaded_at.cmp(&a.downloaded_at));
        Ok(entries)
    }
}
