//! Where a chapter ends up on disk.

use crate::config::{OutputFormat, Settings};
use crate::naming::sanitize_filename;
use crate::source::{Chapter, LocalSeries};
use std::path::{Path, PathBuf};

/// Resolves series directories and chapter artifact paths under a downloads
/// root according to the naming settings.
#[derive(Debug, Clone)]
pub struct ChapterLayout {
    downloads_dir: PathBuf,
    format: OutputFormat,
    template: String,
    create_series_dir: bool,
    create_volume_dir: bool,
}

impl ChapterLayout {
    pub fn new(downloads_dir: impl Into<PathBuf>, settings: &Settings) -> Self {
        Self {
            downloads_dir: downloads_dir.into(),
            format: settings.format,
            template: settings.chapter_name_template.clone(),
            create_series_dir: settings.create_series_dir,
            create_volume_dir: settings.create_volume_dir,
        }
    }

    pub fn downloads_dir(&self) -> &Path {
        &self.downloads_dir
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn series_dir(&self, series: &LocalSeries) -> PathBuf {
        if self.create_series_dir {
            self.downloads_dir.join(sanitize_filename(&series.name))
        } else {
            self.downloads_dir.clone()
        }
    }

    /// Expand the chapter name template.
    ///
    /// Recognized variables: `{manga}`, `{chapter}`, `{index}`,
    /// `{padded-index}`, `{chapters-count}`, `{volume}` and `{source}`.
    pub fn formatted_name(&self, chapter: &Chapter, series: &LocalSeries) -> String {
        let replacements = [
            ("{manga}", series.name.clone()),
            ("{chapter}", chapter.name.clone()),
            ("{index}", chapter.index.to_string()),
            ("{padded-index}", format!("{:04}", chapter.index)),
            ("{chapters-count}", series.chapter_count().to_string()),
            ("{volume}", chapter.volume.clone()),
            ("{source}", series.source_name.clone()),
        ];

        replacements
            .iter()
            .fold(self.template.clone(), |name, (variable, value)| {
                name.replace(variable, value)
            })
    }

    /// Sanitized artifact name, with the format's extension if it has one.
    pub fn file_name(&self, chapter: &Chapter, series: &LocalSeries) -> String {
        let name = sanitize_filename(&self.formatted_name(chapter, series));
        match self.format.extension() {
            Some(ext) => format!("{}.{}", name, ext),
            None => name,
        }
    }

    pub fn chapter_path(&self, chapter: &Chapter, series: &LocalSeries) -> PathBuf {
        let mut dir = self.series_dir(series);
        if self.create_volume_dir && !chapter.volume.is_empty() {
            dir = dir.join(sanitize_filename(&chapter.volume));
        }
        dir.join(self.file_name(chapter, series))
    }
}
