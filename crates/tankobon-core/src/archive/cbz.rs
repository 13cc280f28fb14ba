//! CBZ output: an uncompressed zip of the pages plus `ComicInfo.xml`.

use super::comic_info::ComicInfo;
use super::{ArchiveAssembler, StagedChapter};
use crate::config::{OutputFormat, PathsConfig};
use crate::error::{Result, TankobonError};
use crate::fs::DynFilesystem;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

pub struct CbzAssembler {
    fs: DynFilesystem,
    comic_info: bool,
}

impl CbzAssembler {
    pub fn new(fs: DynFilesystem) -> Self {
        Self {
            fs,
            comic_info: true,
        }
    }

    pub fn with_comic_info(mut self, enabled: bool) -> Self {
        self.comic_info = enabled;
        self
    }

    /// Build the archive in memory. Pages are stored, not deflated, since
    /// images do not compress further.
    fn build(&self, staged: &StagedChapter) -> Result<Vec<u8>> {
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        let mut zip = ZipWriter::new(Cursor::new(Vec::with_capacity(
            staged.total_bytes() as usize + 4096,
        )));

        let mut pages: Vec<_> = staged.pages.iter().collect();
        pages.sort_by_key(|p| p.index);
        for page in pages {
            zip.start_file(page.file_name.as_str(), options)?;
            zip.write_all(&page.contents)
                .map_err(|e| TankobonError::Archive {
                    message: format!("Failed to add {} to archive: {}", page.file_name, e),
                })?;
        }

        if self.comic_info {
            match self.comic_info_xml(staged) {
                Ok(xml) => {
                    zip.start_file(PathsConfig::COMIC_INFO_FILENAME, options)?;
                    zip.write_all(xml.as_bytes())
                        .map_err(|e| TankobonError::Archive {
                            message: format!("Failed to add ComicInfo.xml: {}", e),
                        })?;
                }
                Err(e) => warn!("Skipping ComicInfo.xml for '{}': {}", staged.chapter.name, e),
            }
        }

        Ok(zip.finish()?.into_inner())
    }

    fn comic_info_xml(&self, staged: &StagedChapter) -> Result<String> {
        let series = staged.chapter.series()?;
        ComicInfo::new(
            &staged.chapter,
            &series.name,
            &series.metadata(),
            staged.pages.len(),
        )
        .to_xml()
    }

    fn write_to(&self, staged: StagedChapter, target: PathBuf) -> Result<PathBuf> {
        let archive = self.build(&staged)?;
        drop(staged);

        if let Some(parent) = target.parent() {
            self.fs.create_dir_all(parent)?;
        }
        // A previous plain download of the same chapter leaves a directory.
        if self.fs.exists(&target) && self.fs.list_dir(&target).is_ok() {
            self.fs.remove_all(&target)?;
        }
        self.fs.write_file(&target, &archive)?;

        debug!("Wrote {} ({} bytes)", target.display(), archive.len());
        Ok(target)
    }
}

impl ArchiveAssembler for CbzAssembler {
    fn format(&self) -> OutputFormat {
        OutputFormat::Cbz
    }

    fn save(&self, staged: StagedChapter) -> Result<PathBuf> {
        let target = staged.target.clone();
        self.write_to(staged, target)
    }

    fn save_temp(&self, staged: StagedChapter, scratch_dir: &Path) -> Result<PathBuf> {
        let target = scratch_dir.join(staged.artifact_name());
        self.write_to(staged, target)
    }
}
