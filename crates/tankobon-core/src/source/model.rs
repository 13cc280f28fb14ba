//! Series, chapters and pages as handed out by source providers.

use crate::catalog::CanonicalRecord;
use crate::error::{Result, TankobonError};
use crate::metadata::{SeriesMetadata, SeriesRecord};
use serde::Serialize;
use std::cmp::Ordering;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

/// Extension assumed when a page URL carries none.
const DEFAULT_PAGE_EXTENSION: &str = "jpg";

/// A series the user is downloading from one source.
///
/// Identity fields are immutable; metadata, the bound catalog record and the
/// chapter list sit behind locks because concurrent chapter downloads of the
/// same series share one instance. The `populated` and `cover_downloaded`
/// flags only live for the process.
#[derive(Debug)]
pub struct LocalSeries {
    pub id: String,
    pub name: String,
    pub url: String,
    pub source_id: String,
    pub source_name: String,
    metadata: RwLock<SeriesMetadata>,
    record: RwLock<Option<CanonicalRecord>>,
    chapters: RwLock<Vec<Chapter>>,
    populated: AtomicBool,
    cover_downloaded: AtomicBool,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl LocalSeries {
    pub fn new(id: impl Into<String>, name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            url: url.into(),
            source_id: String::new(),
            source_name: String::new(),
            metadata: RwLock::new(SeriesMetadata::default()),
            record: RwLock::new(None),
            chapters: RwLock::new(Vec::new()),
            populated: AtomicBool::new(false),
            cover_downloaded: AtomicBool::new(false),
        }
    }

    pub fn with_source(mut self, source_id: impl Into<String>, source_name: impl Into<String>) -> Self {
        self.source_id = source_id.into();
        self.source_name = source_name.into();
        self
    }

    pub fn with_metadata(self, metadata: SeriesMetadata) -> Self {
        *write(&self.metadata) = metadata;
        self
    }

    /// Rebuild a series from its persisted form.
    pub fn from_record(record: SeriesRecord) -> Self {
        Self::new(record.id, record.title, record.url)
            .with_source(record.source_id, record.source_name)
            .with_metadata(record.metadata)
    }

    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Snapshot of the current metadata.
    pub fn metadata(&self) -> SeriesMetadata {
        read(&self.metadata).clone()
    }

    pub fn update_metadata<R>(&self, f: impl FnOnce(&mut SeriesMetadata) -> R) -> R {
        f(&mut write(&self.metadata))
    }

    pub fn bound_record(&self) -> Option<CanonicalRecord> {
        read(&self.record).clone()
    }

    pub fn bind_record(&self, record: CanonicalRecord) {
        *write(&self.record) = Some(record);
    }

    pub fn chapters(&self) -> Vec<Chapter> {
        read(&self.chapters).clone()
    }

    pub fn set_chapters(&self, chapters: Vec<Chapter>) {
        *write(&self.chapters) = chapters;
    }

    pub fn chapter_count(&self) -> usize {
        read(&self.chapters).len()
    }

    pub fn find_chapter(&self, id: &str) -> Option<Chapter> {
        read(&self.chapters).iter().find(|c| c.id == id).cloned()
    }

    pub fn is_populated(&self) -> bool {
        self.populated.load(AtomicOrdering::Acquire)
    }

    pub fn mark_populated(&self) {
        self.populated.store(true, AtomicOrdering::Release);
    }

    /// Claim the cover download for this process.
    ///
    /// Returns `true` for exactly one caller until [`release_cover`] is
    /// called after a failed attempt.
    ///
    /// [`release_cover`]: LocalSeries::release_cover
    pub fn claim_cover(&self) -> bool {
        !self.cover_downloaded.swap(true, AtomicOrdering::AcqRel)
    }

    pub fn release_cover(&self) {
        self.cover_downloaded.store(false, AtomicOrdering::Release);
    }

    /// The persisted form of this series.
    pub fn to_record(&self) -> SeriesRecord {
        SeriesRecord {
            id: self.id.clone(),
            title: self.name.clone(),
            url: self.url.clone(),
            source_id: self.source_id.clone(),
            source_name: self.source_name.clone(),
            metadata: self.metadata(),
        }
    }
}

/// One chapter of a series.
///
/// Holds a weak back-reference to its series; the series owns the chapter
/// list, not the other way round.
#[derive(Debug, Clone, Serialize)]
pub struct Chapter {
    pub id: String,
    pub name: String,
    pub url: String,
    /// Position within the source listing, used for file naming.
    pub index: u32,
    /// Volume label, empty when the chapter has none.
    pub volume: String,
    #[serde(skip)]
    series: Weak<LocalSeries>,
}

impl Chapter {
    pub fn new(
        series: &Arc<LocalSeries>,
        id: impl Into<String>,
        name: impl Into<String>,
        index: u32,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            url: String::new(),
            index,
            volume: String::new(),
            series: Arc::downgrade(series),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_volume(mut self, volume: impl Into<String>) -> Self {
        self.volume = volume.into();
        self
    }

    /// The owning series, if it is still alive.
    pub fn series(&self) -> Result<Arc<LocalSeries>> {
        self.series.upgrade().ok_or_else(|| TankobonError::Validation {
            field: "chapter".to_string(),
            message: format!("Series of chapter '{}' is no longer loaded", self.name),
        })
    }
}

/// A remote page of a chapter, not yet downloaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page {
    pub url: String,
    /// 1-based position within the chapter.
    pub index: usize,
    /// Lowercase extension without the dot.
    pub extension: String,
    /// Known once the page has been downloaded.
    pub size: Option<u64>,
}

impl Page {
    pub fn new(url: impl Into<String>, index: usize) -> Self {
        let url = url.into();
        let extension = extension_of(&url).unwrap_or_else(|| DEFAULT_PAGE_EXTENSION.to_string());
        Self {
            url,
            index,
            extension,
            size: None,
        }
    }
}

/// Extension of the last path segment of a URL, ignoring query and fragment.
pub fn extension_of(url: &str) -> Option<String> {
    let path = match url::Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url.split(['?', '#']).next().unwrap_or_default().to_string(),
    };
    let file = path.rsplit('/').next()?;
    let (stem, ext) = file.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Sort chapters by volume label, chapters without a volume last, then by
/// index.
pub fn sort_chapters(chapters: &mut [Chapter]) {
    chapters.sort_by(|a, b| {
        let by_volume = match (a.volume.is_empty(), b.volume.is_empty()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => a.volume.cmp(&b.volume),
        };
        by_volume.then(a.index.cmp(&b.index))
    });
}
