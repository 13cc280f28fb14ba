//! One JSON file per series under `<root>/metadata/`.

use super::MetadataStore;
use crate::config::PathsConfig;
use crate::error::{Result, TankobonError};
use crate::metadata::{atomic_read_json, atomic_write_json, SeriesRecord};
use crate::naming::sanitize_filename;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// File-per-series [`MetadataStore`], used as a fallback when the database
/// is unavailable or has no entry.
pub struct JsonMetadataStore {
    dir: PathBuf,
}

impl JsonMetadataStore {
    /// Store files under `<root>/metadata/`.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            dir: root.as_ref().join(PathsConfig::METADATA_DIR_NAME),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", sanitize_filename(id)))
    }

    /// Every readable record in the directory. Unparseable files are skipped.
    fn scan(&self) -> Result<Vec<SeriesRecord>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(TankobonError::io_with_path(e, &self.dir)),
        };

        let mut records = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match atomic_read_json::<SeriesRecord>(&path) {
                Ok(Some(record)) => records.push(record),
                Ok(None) => {}
                Err(e) => warn!("Skipping unreadable metadata file {}: {}", path.display(), e),
            }
        }
        records.sort_by(|a, b| a.title.to_lowercase().cmp(&b.title.to_lowercase()));
        Ok(records)
    }
}

impl MetadataStore for JsonMetadataStore {
    fn save_series(&self, record: &SeriesRecord) -> Result<()> {
        let path = self.path_for(&record.id);
        atomic_write_json(&path, record, false)?;
        debug!("Wrote metadata for '{}' to {}", record.title, path.display());
        Ok(())
    }

    fn find_series_by_name(&self, name: &str) -> Result<Option<SeriesRecord>> {
        let needle = name.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(None);
        }
        Ok(self.scan()?.into_iter().find(|record| {
            record.title.to_lowercase().contains(&needle)
                || record
                    .metadata
                    .synonyms
                    .iter()
                    .any(|s| s.to_lowercase().contains(&needle))
        }))
    }

    fn get_series_by_id(&self, id: &str) -> Result<Option<SeriesRecord>> {
        atomic_read_json(&self.path_for(id))
    }

    fn delete_series(&self, id: &str) -> Result<bool> {
        let path = self.path_for(id);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(TankobonError::io_with_path(e, path)),
        }
    }

    fn list_series(&self) -> Result<Vec<SeriesRecord>> {
        self.scan()
    }
}
