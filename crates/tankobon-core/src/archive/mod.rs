//! Turning staged pages into the final chapter artifact.

mod cbz;
mod comic_info;
mod plain;

pub use cbz::CbzAssembler;
pub use comic_info::ComicInfo;
pub use plain::PlainAssembler;

use crate::config::OutputFormat;
use crate::error::Result;
use crate::fs::DynFilesystem;
use crate::source::Chapter;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// One downloaded page, held in memory until the artifact is written.
#[derive(Debug, Clone)]
pub struct StagedPage {
    pub index: usize,
    /// File name inside the staging area and the artifact.
    pub file_name: String,
    pub contents: Bytes,
}

/// A chapter whose pages are all downloaded.
#[derive(Debug, Clone)]
pub struct StagedChapter {
    pub chapter: Chapter,
    /// Pages in index order.
    pub pages: Vec<StagedPage>,
    /// Where the pages were written during acquisition.
    pub staging_dir: PathBuf,
    /// Final artifact location.
    pub target: PathBuf,
}

impl StagedChapter {
    pub fn total_bytes(&self) -> u64 {
        self.pages.iter().map(|p| p.contents.len() as u64).sum()
    }

    /// Artifact file name, taken from the target path.
    pub fn artifact_name(&self) -> String {
        self.target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.chapter.name.clone())
    }
}

/// Builds chapter artifacts of one output format.
///
/// Both operations consume the staged chapter, releasing the page buffers
/// once the artifact is written.
pub trait ArchiveAssembler: Send + Sync {
    fn format(&self) -> OutputFormat;

    /// Write the artifact to `staged.target`.
    fn save(&self, staged: StagedChapter) -> Result<PathBuf>;

    /// Write the artifact into `scratch_dir` instead of its final location.
    fn save_temp(&self, staged: StagedChapter, scratch_dir: &Path) -> Result<PathBuf>;
}

/// Shared handle to an assembler.
pub type DynArchiveAssembler = Arc<dyn ArchiveAssembler>;

/// The assembler for an output format.
pub fn assembler_for(format: OutputFormat, fs: DynFilesystem, comic_info: bool) -> DynArchiveAssembler {
    match format {
        OutputFormat::Cbz => Arc::new(CbzAssembler::new(fs).with_comic_info(comic_info)),
        OutputFormat::Plain => Arc::new(PlainAssembler::new(fs)),
    }
}
