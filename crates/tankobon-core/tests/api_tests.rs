//! Integration tests for the TankobonApi public interface.
//!
//! Every external service is replaced with an in-process mock; the library
//! root is a temp dir so stores, caches and downloads hit the real disk.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::io::Read;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tankobon_core::catalog::Title;
use tankobon_core::network::PageFetcher;
use tankobon_core::{
    CanonicalRecord, CatalogClient, CatalogId, Chapter, LocalSeries, OutputFormat, Page,
    ProgressCallback, RecordId, Result, Settings, SourceProvider, TankobonApi, TankobonError,
};
use tempfile::TempDir;

// ========================================
// Mocks
// ========================================

#[derive(Default)]
struct MockCatalog {
    results: HashMap<String, Vec<CanonicalRecord>>,
    calls: AtomicUsize,
}

impl MockCatalog {
    fn with(mut self, query: &str, records: Vec<CanonicalRecord>) -> Self {
        self.results.insert(query.to_string(), records);
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CatalogClient for MockCatalog {
    fn catalog(&self) -> CatalogId {
        CatalogId::AniList
    }

    async fn search_by_name(&self, query: &str) -> Result<Vec<CanonicalRecord>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.results.get(query).cloned().unwrap_or_default())
    }

    async fn get_by_id(&self, id: &str) -> Result<CanonicalRecord> {
        self.results
            .values()
            .flatten()
            .find(|r| r.id.value == id)
            .cloned()
            .ok_or_else(|| TankobonError::not_found(id, "anilist"))
    }
}

struct MockSource {
    chapter_count: u32,
    pages_per_chapter: usize,
}

#[async_trait]
impl SourceProvider for MockSource {
    fn id(&self) -> &str {
        "mock"
    }

    fn name(&self) -> &str {
        "Mock"
    }

    async fn search(&self, query: &str) -> Result<Vec<Arc<LocalSeries>>> {
        if !query.to_lowercase().contains("piece") {
            return Ok(Vec::new());
        }
        Ok(vec![LocalSeries::new("op", "One Piece", "https://mock/op")
            .with_source("mock", "Mock")
            .into_shared()])
    }

    async fn chapters_of(&self, series: &Arc<LocalSeries>) -> Result<Vec<Chapter>> {
        let chapters: Vec<_> = (1..=self.chapter_count)
            .map(|i| {
                Chapter::new(series, format!("c{}", i), format!("Chapter {}", i), i)
                    .with_url(format!("https://mock/chapter/c{}", i))
            })
            .collect();
        series.set_chapters(chapters.clone());
        Ok(chapters)
    }

    async fn pages_of(&self, chapter: &Chapter) -> Result<Vec<Page>> {
        Ok((1..=self.pages_per_chapter)
            .map(|i| Page::new(format!("https://img.mock/{}/{}.png", chapter.id, i), i))
            .collect())
    }
}

#[derive(Default)]
struct MockFetcher {
    failing: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

#[async_trait]
impl PageFetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(2)).await;
        if self.failing.lock().unwrap().iter().any(|u| u == url) {
            return Err(TankobonError::DownloadFailed {
                url: url.to_string(),
                message: "HTTP 503".to_string(),
            });
        }
        Ok(Bytes::from(format!("image:{}", url)))
    }
}

fn one_piece() -> CanonicalRecord {
    let mut record = CanonicalRecord::new(
        RecordId::new(CatalogId::AniList, "30013"),
        Title {
            english: "One Piece".to_string(),
            ..Default::default()
        },
    );
    record.description = "Gol D. Roger was known as the Pirate King.".to_string();
    record.genres = vec!["Action".to_string(), "Adventure".to_string()];
    record.synonyms = vec!["Wan Pīsu".to_string()];
    record.cover.large = "https://img.mock/cover/op.jpg".to_string();
    record
}

struct TestEnv {
    _temp_dir: TempDir,
    api: TankobonApi,
    catalog: Arc<MockCatalog>,
    fetcher: Arc<MockFetcher>,
}

async fn create_test_env(settings: Settings) -> TestEnv {
    let temp_dir = TempDir::new().unwrap();
    let catalog = Arc::new(
        MockCatalog::default()
            .with("one piece", vec![one_piece()])
            .with("naruto", Vec::new()),
    );
    let fetcher = Arc::new(MockFetcher::default());

    let api = TankobonApi::builder(temp_dir.path().join("library"))
        .auto_create_dirs(true)
        .with_settings(settings)
        .with_catalog(catalog.clone())
        .with_secondary_catalog(false)
        .with_source(Arc::new(MockSource {
            chapter_count: 3,
            pages_per_chapter: 5,
        }))
        .with_page_fetcher(fetcher.clone())
        .with_staging_root(temp_dir.path().join("staging"))
        .build()
        .await
        .unwrap();

    TestEnv {
        _temp_dir: temp_dir,
        api,
        catalog,
        fetcher,
    }
}

// ========================================
// Construction
// ========================================

#[tokio::test]
async fn test_api_creation_fails_for_nonexistent_path() {
    let result = TankobonApi::builder("/nonexistent/path/that/does/not/exist")
        .build()
        .await;
    assert!(matches!(result, Err(TankobonError::Config { .. })));
}

#[tokio::test]
async fn test_api_creates_directory_layout() {
    let env = create_test_env(Settings::default()).await;
    let root = env.api.root();

    assert!(root.join("cache").is_dir());
    assert!(root.join("metadata").is_dir());
    assert!(env.api.downloads_dir().is_dir());
    assert!(root.join("tankobon.sqlite").exists());
}

#[tokio::test]
async fn test_settings_are_read_from_root() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(
        temp_dir.path().join("settings.json"),
        r#"{"format": "plain", "parallel_downloads": 2}"#,
    )
    .unwrap();

    let api = TankobonApi::builder(temp_dir.path())
        .with_catalog(Arc::new(MockCatalog::default()))
        .build()
        .await
        .unwrap();

    assert_eq!(api.get_settings().format, OutputFormat::Plain);
    assert_eq!(api.get_settings().parallel_downloads, 2);
    assert!(api.get_settings().download_cover);
}

#[tokio::test]
async fn test_invalid_settings_are_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let settings = Settings {
        parallel_downloads: 0,
        ..Settings::default()
    };

    let result = TankobonApi::builder(temp_dir.path())
        .with_settings(settings)
        .build()
        .await;
    assert!(matches!(result, Err(TankobonError::Validation { .. })));
}

// ========================================
// Resolution
// ========================================

#[tokio::test]
async fn test_resolve_series_is_cached() {
    let env = create_test_env(Settings::default()).await;

    let first = env.api.resolve_series("One Piece").await.unwrap();
    let second = env.api.resolve_series("  one PIECE ").await.unwrap();

    assert_eq!(first.id, RecordId::new(CatalogId::AniList, "30013"));
    assert_eq!(first, second);
    assert_eq!(env.catalog.calls(), 1);

    let by_id = env.api.resolve_record("anilist:30013").await.unwrap();
    assert_eq!(by_id.id, first.id);
}

#[tokio::test]
async fn test_unresolvable_name_fails_fast_until_forgotten() {
    let env = create_test_env(Settings::default()).await;

    let err = env.api.resolve_series("Naruto").await.unwrap_err();
    assert!(err.is_not_found());
    let calls = env.catalog.calls();

    assert!(env.api.resolve_series("Naruto").await.is_err());
    assert_eq!(env.catalog.calls(), calls);

    assert!(env.api.forget_resolution("Naruto").unwrap());
    assert!(env.api.resolve_series("Naruto").await.is_err());
    assert!(env.catalog.calls() > calls);
}

#[tokio::test]
async fn test_cache_stats_reflect_resolutions() {
    let env = create_test_env(Settings::default()).await;
    env.api.resolve_series("One Piece").await.unwrap();

    let stats = env.api.cache_stats().unwrap();
    assert!(stats.total_entries >= 2);

    assert!(env.api.clear_resolution_cache().unwrap() >= 2);
    assert_eq!(env.api.cache_stats().unwrap().total_entries, 0);
}

#[tokio::test]
async fn test_resolve_record_rejects_malformed_id() {
    let env = create_test_env(Settings::default()).await;
    let err = env.api.resolve_record("30013").await.unwrap_err();
    assert!(matches!(err, TankobonError::Validation { .. }));
}

// ========================================
// Downloads
// ========================================

#[tokio::test]
async fn test_search_list_and_download_chapter() {
    let env = create_test_env(Settings::default()).await;

    let found = env.api.search_series("one piece").await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, "op");

    let chapters = env.api.list_chapters("op", None).await.unwrap();
    assert_eq!(chapters.len(), 3);
    let filtered = env.api.list_chapters("op", Some("chapter 2")).await.unwrap();
    assert_eq!(filtered.len(), 1);

    let messages = Arc::new(Mutex::new(Vec::new()));
    let sink = messages.clone();
    let progress: ProgressCallback = Arc::new(move |m: &str| sink.lock().unwrap().push(m.to_string()));

    let path = env
        .api
        .download_chapter("op", "c2", Some(progress))
        .await
        .unwrap();

    let series_dir = env.api.downloads_dir().join("One Piece");
    assert_eq!(path, series_dir.join("[0002] Chapter 2.cbz"));

    let file = std::fs::File::open(&path).unwrap();
    let mut archive = zip::ZipArchive::new(file).unwrap();
    let names: Vec<_> = (0..archive.len())
        .map(|i| archive.by_index(i).unwrap().name().to_string())
        .collect();
    assert_eq!(names, vec!["1.png", "2.png", "3.png", "4.png", "5.png", "ComicInfo.xml"]);

    let mut xml = String::new();
    archive
        .by_name("ComicInfo.xml")
        .unwrap()
        .read_to_string(&mut xml)
        .unwrap();
    assert!(xml.contains("<Series>One Piece</Series>"));
    assert!(xml.contains("<Genre>Action,Adventure</Genre>"));

    assert!(series_dir.join("series.json").exists());
    assert!(series_dir.join("cover.jpg").exists());

    let messages = messages.lock().unwrap();
    assert_eq!(messages.first().map(String::as_str), Some("Getting pages"));
    assert_eq!(messages.last().map(String::as_str), Some("Downloaded"));
}

#[tokio::test]
async fn test_downloaded_metadata_is_stored() {
    let env = create_test_env(Settings::default()).await;
    env.api.search_series("one piece").await.unwrap();
    env.api.download_chapter("op", "c1", None).await.unwrap();

    let stored = env.api.get_series("op").unwrap().unwrap();
    assert_eq!(stored.title, "One Piece");
    assert_eq!(stored.metadata.genres, vec!["Action", "Adventure"]);

    let by_synonym = env.api.find_series("pīsu").unwrap().unwrap();
    assert_eq!(by_synonym.id, "op");
    assert_eq!(env.api.list_series().unwrap().len(), 1);

    assert!(env.api.root().join("metadata").join("op.json").exists());

    assert!(env.api.delete_series("op").unwrap());
    assert!(env.api.get_series("op").unwrap().is_none());
    assert!(!env.api.root().join("metadata").join("op.json").exists());
}

#[tokio::test]
async fn test_second_download_is_skipped() {
    let env = create_test_env(Settings::default()).await;
    env.api.search_series("one piece").await.unwrap();

    let first = env.api.download_chapter("op", "c1", None).await.unwrap();
    let calls = env.fetcher.calls.load(Ordering::SeqCst);
    let second = env.api.download_chapter("op", "c1", None).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(env.fetcher.calls.load(Ordering::SeqCst), calls);
}

#[tokio::test]
async fn test_page_failure_leaves_no_artifact() {
    let env = create_test_env(Settings::default()).await;
    env.fetcher
        .failing
        .lock()
        .unwrap()
        .push("https://img.mock/c1/4.png".to_string());
    env.api.search_series("one piece").await.unwrap();

    let err = env.api.download_chapter("op", "c1", None).await.unwrap_err();
    match err {
        TankobonError::PageDownload { failed, total, .. } => {
            assert_eq!(failed, 1);
            assert_eq!(total, 5);
        }
        other => panic!("unexpected error: {}", other),
    }

    let target = env.api.downloads_dir().join("One Piece").join("[0001] Chapter 1.cbz");
    assert!(!target.exists());

    // Healing the page lets a retry succeed.
    env.fetcher.failing.lock().unwrap().clear();
    let path = env.api.download_chapter("op", "c1", None).await.unwrap();
    assert_eq!(path, target);
}

#[tokio::test]
async fn test_plain_output_and_volume_layout() {
    let settings = Settings {
        format: OutputFormat::Plain,
        chapter_name_template: "{manga} {padded-index}".to_string(),
        download_cover: false,
        ..Settings::default()
    };
    let env = create_test_env(settings).await;
    env.api.search_series("one piece").await.unwrap();

    let path = env.api.download_chapter("op", "c3", None).await.unwrap();
    assert_eq!(path, env.api.downloads_dir().join("One Piece").join("One Piece 0003"));

    let mut pages: Vec<_> = std::fs::read_dir(&path)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    pages.sort();
    assert_eq!(pages, vec!["1.png", "2.png", "3.png", "4.png", "5.png"]);
}

#[tokio::test]
async fn test_unknown_series_and_chapter() {
    let env = create_test_env(Settings::default()).await;

    let err = env.api.list_chapters("missing", None).await.unwrap_err();
    assert!(err.is_not_found());

    env.api.search_series("one piece").await.unwrap();
    let err = env.api.download_chapter("op", "c99", None).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_concurrent_chapters_of_one_series() {
    let env = create_test_env(Settings::default()).await;
    env.api.search_series("one piece").await.unwrap();
    env.api.list_chapters("op", None).await.unwrap();

    let (a, b, c) = tokio::join!(
        env.api.download_chapter("op", "c1", None),
        env.api.download_chapter("op", "c2", None),
        env.api.download_chapter("op", "c3", None),
    );
    for result in [a, b, c] {
        assert!(result.unwrap().exists());
    }

    // One cover fetch at most, plus every page.
    let calls = env.fetcher.calls.load(Ordering::SeqCst);
    assert_eq!(calls, 3 * 5 + 1);
}

#[tokio::test]
async fn test_history_records_last_chapter() {
    let env = create_test_env(Settings::default()).await;
    env.api.search_series("one piece").await.unwrap();
    env.api.download_chapter("op", "c1", None).await.unwrap();

    let mut history = Vec::new();
    for _ in 0..50 {
        history = env.api.download_history().unwrap();
        if !history.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    assert_eq!(history.len(), 1);
    assert_eq!(history[0].series_name, "One Piece");
    assert!(env.api.root().join("history.json").exists());
}
