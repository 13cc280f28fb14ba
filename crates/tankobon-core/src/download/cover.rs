//! Series cover download.

use super::ProgressCallback;
use crate::config::PathsConfig;
use crate::error::Result;
use crate::fs::DynFilesystem;
use crate::network::DynPageFetcher;
use crate::source::{extension_of, LocalSeries};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub struct CoverDownloader {
    fetcher: DynPageFetcher,
    fs: DynFilesystem,
}

impl CoverDownloader {
    pub fn new(fetcher: DynPageFetcher, fs: DynFilesystem) -> Self {
        Self { fetcher, fs }
    }

    /// Download the largest known cover into `dir` as `cover.<ext>`.
    ///
    /// Runs at most once per series per process. Returns the written path,
    /// or `None` when there was nothing to do.
    pub async fn download(
        &self,
        series: &LocalSeries,
        dir: &Path,
        overwrite: bool,
        progress: &ProgressCallback,
    ) -> Result<Option<PathBuf>> {
        let metadata = series.metadata();
        let Some(url) = metadata.cover.best_url() else {
            warn!("No cover known for '{}'", series.name);
            return Ok(None);
        };
        if !series.claim_cover() {
            return Ok(None);
        }

        let extension = extension_of(url).unwrap_or_else(|| "jpg".to_string());
        let path = dir.join(format!("{}.{}", PathsConfig::COVER_BASENAME, extension));
        if !overwrite && self.fs.exists(&path) {
            return Ok(None);
        }

        progress("Downloading cover");
        let written = async {
            let contents = self.fetcher.fetch(url).await?;
            self.fs.create_dir_all(dir)?;
            self.fs.write_file(&path, &contents)
        }
        .await;

        if let Err(e) = written {
            // Let a later chapter try again.
            series.release_cover();
            return Err(e);
        }

        info!("Cover for '{}' saved to {}", series.name, path.display());
        Ok(Some(path))
    }
}
