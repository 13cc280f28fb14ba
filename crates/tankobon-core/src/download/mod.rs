//! Chapter download pipeline.
//!
//! [`DownloadOrchestrator::download_chapter`] is the single entry point:
//! page acquisition, then metadata population and cover download side by
//! side, then archive assembly, then a detached history write.

mod cover;
mod history;
mod orchestrator;
mod pages;
mod paths;

pub use cover::CoverDownloader;
pub use history::{HistoryEntry, HistoryStore};
pub use orchestrator::DownloadOrchestrator;
pub use pages::{Acquisition, AcquisitionRequest, PageAcquisition};
pub use paths::ChapterLayout;

use std::sync::Arc;

/// Receives human-readable status lines. Purely observational.
pub type ProgressCallback = Arc<dyn Fn(&str) + Send + Sync + 'static>;

/// A progress callback that discards everything.
pub fn no_progress() -> ProgressCallback {
    Arc::new(|_: &str| {})
}

/// Format bytes as a human-readable string.
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 bytes");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.00 MB");
    }
}
