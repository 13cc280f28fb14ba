//! Plain output: the chapter is a directory of page images.

use super::{ArchiveAssembler, StagedChapter};
use crate::config::OutputFormat;
use crate::error::Result;
use crate::fs::DynFilesystem;
use std::path::{Path, PathBuf};
use tracing::debug;

pub struct PlainAssembler {
    fs: DynFilesystem,
}

impl PlainAssembler {
    pub fn new(fs: DynFilesystem) -> Self {
        Self { fs }
    }

    /// Write every page not already present in `dir`.
    fn write_pages(&self, staged: &StagedChapter, dir: &Path) -> Result<()> {
        self.fs.create_dir_all(dir)?;
        for page in &staged.pages {
            let path = dir.join(&page.file_name);
            if !self.fs.exists(&path) {
                self.fs.write_file(&path, &page.contents)?;
            }
        }
        Ok(())
    }
}

impl ArchiveAssembler for PlainAssembler {
    fn format(&self) -> OutputFormat {
        OutputFormat::Plain
    }

    fn save(&self, staged: StagedChapter) -> Result<PathBuf> {
        // Acquisition stages plain chapters in their final directory.
        if staged.staging_dir != staged.target {
            self.write_pages(&staged, &staged.target)?;
        }
        debug!("Chapter '{}' saved to {}", staged.chapter.name, staged.target.display());
        Ok(staged.target)
    }

    fn save_temp(&self, staged: StagedChapter, scratch_dir: &Path) -> Result<PathBuf> {
        let dir = scratch_dir.join(staged.artifact_name());
        self.write_pages(&staged, &dir)?;
        Ok(dir)
    }
}
