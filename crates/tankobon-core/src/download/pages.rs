//! Bounded-concurrency page downloads.
//!
//! Every page runs in its own task behind a semaphore. A failed page never
//! cancels its siblings; failures are collected and the one with the lowest
//! page index is reported once all tasks have finished.

use super::{format_size, ProgressCallback};
use crate::archive::{StagedChapter, StagedPage};
use crate::config::{DownloadConfig, OutputFormat};
use crate::error::{Result, TankobonError};
use crate::fs::DynFilesystem;
use crate::naming::pad_index;
use crate::network::DynPageFetcher;
use crate::source::{Chapter, Page};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// What [`PageAcquisition::download_pages`] should fetch and where.
#[derive(Debug, Clone)]
pub struct AcquisitionRequest {
    pub chapter: Chapter,
    pub pages: Vec<Page>,
    /// Final artifact path of the chapter.
    pub target: PathBuf,
    pub format: OutputFormat,
    pub redownload: bool,
}

/// Outcome of a page acquisition.
#[derive(Debug)]
pub enum Acquisition {
    /// The artifact already exists and redownloading was not requested.
    Skipped(PathBuf),
    Staged(StagedChapter),
}

/// Downloads a chapter's pages into a staging area.
pub struct PageAcquisition {
    fetcher: DynPageFetcher,
    fs: DynFilesystem,
    concurrency: usize,
    staging_root: PathBuf,
}

impl PageAcquisition {
    pub fn new(fetcher: DynPageFetcher, fs: DynFilesystem) -> Self {
        Self {
            fetcher,
            fs,
            concurrency: DownloadConfig::DEFAULT_PARALLEL_DOWNLOADS,
            staging_root: std::env::temp_dir(),
        }
    }

    /// Maximum number of pages in flight (at least 1).
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Parent directory of archive staging areas.
    pub fn with_staging_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.staging_root = root.into();
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    fn staging_dir(&self, request: &AcquisitionRequest) -> PathBuf {
        if request.format.stages_in_temp() {
            self.staging_root.join(format!(
                "{}-{}",
                DownloadConfig::STAGING_PREFIX,
                uuid::Uuid::new_v4()
            ))
        } else {
            request.target.clone()
        }
    }

    pub async fn download_pages(
        &self,
        request: AcquisitionRequest,
        progress: ProgressCallback,
    ) -> Result<Acquisition> {
        if !request.redownload && self.fs.exists(&request.target) {
            debug!("{} already exists, skipping", request.target.display());
            return Ok(Acquisition::Skipped(request.target));
        }

        let staging_dir = self.staging_dir(&request);
        self.fs.create_dir_all(&staging_dir)?;

        let total = request.pages.len();
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let downloaded_bytes = Arc::new(AtomicU64::new(0));
        let completed = Arc::new(AtomicUsize::new(0));
        let mut tasks = JoinSet::new();

        for page in &request.pages {
            let semaphore = semaphore.clone();
            let fetcher = self.fetcher.clone();
            let fs = self.fs.clone();
            let progress = progress.clone();
            let downloaded_bytes = downloaded_bytes.clone();
            let completed = completed.clone();
            let chapter_name = request.chapter.name.clone();
            let index = page.index;
            let url = page.url.clone();
            let file_name = format!("{}.{}", pad_index(page.index, total), page.extension);
            let path = staging_dir.join(&file_name);

            tasks.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|_| (index, TankobonError::Other("Page semaphore closed".into())))?;

                let contents = fetcher.fetch(&url).await.map_err(|e| (index, e))?;
                fs.write_file(&path, &contents).map_err(|e| (index, e))?;

                let bytes = downloaded_bytes.fetch_add(contents.len() as u64, Ordering::Relaxed)
                    + contents.len() as u64;
                let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                progress(&format!(
                    "Downloading {}: {} [{}/{}]",
                    chapter_name,
                    format_size(bytes),
                    done,
                    total
                ));

                Ok::<_, (usize, TankobonError)>(StagedPage {
                    index,
                    file_name,
                    contents,
                })
            });
        }

        let mut pages = Vec::with_capacity(total);
        let mut failures: Vec<(usize, TankobonError)> = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(page)) => pages.push(page),
                Ok(Err(failure)) => failures.push(failure),
                Err(e) => failures.push((
                    usize::MAX,
                    TankobonError::Other(format!("Page task aborted: {}", e)),
                )),
            }
        }

        if !failures.is_empty() {
            failures.sort_by_key(|(index, _)| *index);
            let failed = failures.len();
            let (first_index, first) = failures.swap_remove(0);
            warn!(
                "{} of {} pages failed for '{}', first was page {}: {}",
                failed, total, request.chapter.name, first_index, first
            );

            // A half-filled target would pass the exists check on the next run.
            if let Err(e) = self.fs.remove_all(&staging_dir) {
                warn!("Failed to clean up {}: {}", staging_dir.display(), e);
            }

            return Err(TankobonError::PageDownload {
                chapter: request.chapter.name,
                failed,
                total,
                first: Box::new(first),
            });
        }

        pages.sort_by_key(|p| p.index);
        debug!(
            "Staged {} pages ({}) for '{}' in {}",
            pages.len(),
            format_size(downloaded_bytes.load(Ordering::Relaxed)),
            request.chapter.name,
            staging_dir.display()
        );

        Ok(Acquisition::Staged(StagedChapter {
            chapter: request.chapter,
            pages,
            staging_dir,
            target: request.target,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::{Filesystem, MemoryFilesystem};
    use crate::network::PageFetcher;
    use crate::source::LocalSeries;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::collections::HashSet;
    use std::path::Path;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Serves `page-<n>` for `https://cdn/<n>.jpg`, finishing later pages
    /// first and failing the indices in `failing`.
    struct MockFetcher {
        failing: Mutex<HashSet<usize>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl MockFetcher {
        fn new(failing: &[usize]) -> Arc<Self> {
            Arc::new(Self {
                failing: Mutex::new(failing.iter().copied().collect()),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            })
        }

        fn heal(&self) {
            self.failing.lock().unwrap().clear();
        }
    }

    #[async_trait]
    impl PageFetcher for MockFetcher {
        async fn fetch(&self, url: &str) -> Result<Bytes> {
            let index: usize = url
                .trim_start_matches("https://cdn/")
                .trim_end_matches(".jpg")
                .parse()
                .unwrap();

            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5 * (10 - index as u64))).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.failing.lock().unwrap().contains(&index) {
                return Err(TankobonError::DownloadFailed {
                    url: url.to_string(),
                    message: "HTTP 503".to_string(),
                });
            }
            Ok(Bytes::from(format!("page-{}", index)))
        }
    }

    fn request(series: &Arc<LocalSeries>, format: OutputFormat, count: usize) -> AcquisitionRequest {
        AcquisitionRequest {
            chapter: Chapter::new(series, "c1", "Chapter 1", 1),
            pages: (1..=count)
                .map(|i| Page::new(format!("https://cdn/{}.jpg", i), i))
                .collect(),
            target: PathBuf::from("/library/Series/Chapter 1.cbz"),
            format,
            redownload: false,
        }
    }

    fn quiet() -> ProgressCallback {
        Arc::new(|_: &str| {})
    }

    fn staged(result: Acquisition) -> StagedChapter {
        match result {
            Acquisition::Staged(staged) => staged,
            Acquisition::Skipped(path) => panic!("unexpected skip of {}", path.display()),
        }
    }

    #[tokio::test]
    async fn test_pages_keep_index_order() {
        let fs = Arc::new(MemoryFilesystem::new());
        let fetcher = MockFetcher::new(&[]);
        let acquisition = PageAcquisition::new(fetcher.clone(), fs.clone())
            .with_concurrency(3)
            .with_staging_root("/tmp");
        let series = LocalSeries::new("s", "Series", "").into_shared();

        let result = acquisition
            .download_pages(request(&series, OutputFormat::Cbz, 9), quiet())
            .await
            .unwrap();
        let staged = staged(result);

        let names: Vec<&str> = staged.pages.iter().map(|p| p.file_name.as_str()).collect();
        assert_eq!(names, vec!["1.jpg", "2.jpg", "3.jpg", "4.jpg", "5.jpg", "6.jpg", "7.jpg", "8.jpg", "9.jpg"]);
        assert_eq!(staged.pages[0].contents, Bytes::from("page-1"));
        assert!(staged.staging_dir.starts_with("/tmp"));
        assert!(fs.exists(&staged.staging_dir.join("9.jpg")));
        assert!(fetcher.max_in_flight.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_failure_reports_lowest_index_and_retry_succeeds() {
        let fs = Arc::new(MemoryFilesystem::new());
        let fetcher = MockFetcher::new(&[7, 4]);
        let acquisition = PageAcquisition::new(fetcher.clone(), fs.clone()).with_concurrency(4);
        let series = LocalSeries::new("s", "Series", "").into_shared();

        let err = acquisition
            .download_pages(request(&series, OutputFormat::Plain, 8), quiet())
            .await
            .unwrap_err();
        match err {
            TankobonError::PageDownload {
                failed,
                total,
                first,
                ..
            } => {
                assert_eq!(failed, 2);
                assert_eq!(total, 8);
                assert!(first.to_string().contains("https://cdn/4.jpg"));
            }
            other => panic!("unexpected error: {}", other),
        }
        assert!(!fs.exists(Path::new("/library/Series/Chapter 1.cbz")));

        fetcher.heal();
        let staged = staged(
            acquisition
                .download_pages(request(&series, OutputFormat::Plain, 8), quiet())
                .await
                .unwrap(),
        );
        assert_eq!(staged.pages.len(), 8);
        assert_eq!(staged.staging_dir, staged.target);
    }

    #[tokio::test]
    async fn test_existing_target_is_skipped_unless_forced() {
        let fs = Arc::new(MemoryFilesystem::new());
        let fetcher = MockFetcher::new(&[]);
        let acquisition = PageAcquisition::new(fetcher.clone(), fs.clone());
        let series = LocalSeries::new("s", "Series", "").into_shared();
        fs.write_file(Path::new("/library/Series/Chapter 1.cbz"), b"done")
            .unwrap();

        let result = acquisition
            .download_pages(request(&series, OutputFormat::Cbz, 2), quiet())
            .await
            .unwrap();
        assert!(matches!(result, Acquisition::Skipped(_)));
        assert_eq!(fetcher.max_in_flight.load(Ordering::SeqCst), 0);

        let mut forced = request(&series, OutputFormat::Cbz, 2);
        forced.redownload = true;
        let result = acquisition.download_pages(forced, quiet()).await.unwrap();
        assert!(matches!(result, Acquisition::Staged(_)));
    }

    #[tokio::test]
    async fn test_progress_reports_every_page() {
        let fs = Arc::new(MemoryFilesystem::new());
        let acquisition = PageAcquisition::new(MockFetcher::new(&[]), fs);
        let series = LocalSeries::new("s", "Series", "").into_shared();
        let messages = Arc::new(Mutex::new(Vec::new()));
        let sink = messages.clone();
        let progress: ProgressCallback = Arc::new(move |m: &str| sink.lock().unwrap().push(m.to_string()));

        acquisition
            .download_pages(request(&series, OutputFormat::Cbz, 3), progress)
            .await
            .unwrap();

        let messages = messages.lock().unwrap();
        assert_eq!(messages.len(), 3);
        assert!(messages.iter().any(|m| m.ends_with("[3/3]")));
        assert!(messages[0].starts_with("Downloading Chapter 1:"));
    }
}
