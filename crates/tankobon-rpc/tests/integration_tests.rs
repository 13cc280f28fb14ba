//! Integration tests for the tankobon-rpc JSON-RPC server.
//!
//! Most tests mount the router over a library wired to in-process mocks; the
//! last one spawns the real binary and talks to it over its printed port.

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tankobon_core::catalog::Title;
use tankobon_core::network::PageFetcher;
use tankobon_core::{
    CanonicalRecord, CatalogClient, CatalogId, Chapter, LocalSeries, Page, RecordId, Result,
    Settings, SourceProvider, TankobonApi, TankobonError,
};
use tempfile::TempDir;
use tokio::io::AsyncBufReadExt;

// =============================================================================
// Mocks
// =============================================================================

#[derive(Default)]
struct MockCatalog {
    calls: AtomicUsize,
}

#[async_trait]
impl CatalogClient for MockCatalog {
    fn catalog(&self) -> CatalogId {
        CatalogId::AniList
    }

    async fn search_by_name(&self, query: &str) -> Result<Vec<CanonicalRecord>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if query == "berserk" {
            return Ok(vec![berserk()]);
        }
        Ok(Vec::new())
    }

    async fn get_by_id(&self, id: &str) -> Result<CanonicalRecord> {
        if id == "30002" {
            return Ok(berserk());
        }
        Err(TankobonError::not_found(id, "anilist"))
    }
}

struct MockSource;

#[async_trait]
impl SourceProvider for MockSource {
    fn id(&self) -> &str {
        "mock"
    }

    fn name(&self) -> &str {
        "Mock"
    }

    async fn search(&self, query: &str) -> Result<Vec<Arc<LocalSeries>>> {
        if !query.to_lowercase().contains("berserk") {
            return Ok(Vec::new());
        }
        Ok(vec![LocalSeries::new("bk", "Berserk", "https://mock/bk")
            .with_source("mock", "Mock")
            .into_shared()])
    }

    async fn chapters_of(&self, series: &Arc<LocalSeries>) -> Result<Vec<Chapter>> {
        let chapters = vec![
            Chapter::new(series, "a1", "The Black Swordsman", 1),
            Chapter::new(series, "a2", "The Brand", 2),
        ];
        series.set_chapters(chapters.clone());
        Ok(chapters)
    }

    async fn pages_of(&self, chapter: &Chapter) -> Result<Vec<Page>> {
        Ok((1..=2)
            .map(|i| Page::new(format!("https://img.mock/{}/{}.jpg", chapter.id, i), i))
            .collect())
    }
}

struct MockFetcher;

#[async_trait]
impl PageFetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes> {
        Ok(Bytes::from(format!("image:{}", url)))
    }
}

fn berserk() -> CanonicalRecord {
    let mut record = CanonicalRecord::new(
        RecordId::new(CatalogId::AniList, "30002"),
        Title {
            english: "Berserk".to_string(),
            ..Default::default()
        },
    );
    record.genres = vec!["Action".to_string(), "Horror".to_string()];
    record
}

struct TestServer {
    _temp_dir: TempDir,
    port: u16,
    catalog: Arc<MockCatalog>,
}

/// Start the router over a mocked library on an ephemeral port.
async fn start_test_server() -> TestServer {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let catalog = Arc::new(MockCatalog::default());

    let api = TankobonApi::builder(temp_dir.path().join("library"))
        .auto_create_dirs(true)
        .with_settings(Settings::default())
        .with_catalog(catalog.clone())
        .with_secondary_catalog(false)
        .with_source(Arc::new(MockSource))
        .with_page_fetcher(Arc::new(MockFetcher))
        .with_staging_root(temp_dir.path().join("staging"))
        .build()
        .await
        .unwrap();

    let addr = tankobon_rpc::start_server(api, "127.0.0.1", 0).await.unwrap();
    assert!(wait_for_server(addr.port(), 5).await);

    TestServer {
        _temp_dir: temp_dir,
        port: addr.port(),
        catalog,
    }
}

// =============================================================================
// Client helpers
// =============================================================================

/// Make an RPC call to the server.
async fn rpc_call(port: u16, method: &str, params: Value) -> std::result::Result<Value, String> {
    let json = rpc_call_raw(port, method, params).await?;
    if let Some(error) = json.get("error") {
        return Err(error.to_string());
    }
    Ok(json.get("result").cloned().unwrap_or(Value::Null))
}

/// Make an RPC call and return the full JSON-RPC payload.
async fn rpc_call_raw(port: u16, method: &str, params: Value) -> std::result::Result<Value, String> {
    let client = reqwest::Client::new();
    let response = client
        .post(format!("http://127.0.0.1:{}/rpc", port))
        .json(&json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        }))
        .timeout(Duration::from_secs(10))
        .send()
        .await
        .map_err(|e| e.to_string())?;

    response.json::<Value>().await.map_err(|e| e.to_string())
}

/// Check health endpoint.
async fn check_health(port: u16) -> bool {
    let client = reqwest::Client::new();
    if let Ok(response) = client
        .get(format!("http://127.0.0.1:{}/health", port))
        .timeout(Duration::from_secs(5))
        .send()
        .await
    {
        if let Ok(json) = response.json::<Value>().await {
            return json.get("status").and_then(|v| v.as_str()) == Some("ok");
        }
    }
    false
}

/// Wait for server to be ready.
async fn wait_for_server(port: u16, timeout_secs: u64) -> bool {
    let start = std::time::Instant::now();
    while start.elapsed() < Duration::from_secs(timeout_secs) {
        if check_health(port).await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    false
}

fn error_code(payload: &Value) -> Option<i64> {
    payload.get("error")?.get("code")?.as_i64()
}

// =============================================================================
// Protocol
// =============================================================================

#[tokio::test]
async fn test_health_check_method() {
    let server = start_test_server().await;

    let result = rpc_call(server.port, "health_check", json!({})).await.unwrap();
    assert_eq!(result["status"], "ok");
}

#[tokio::test]
async fn test_unknown_method() {
    let server = start_test_server().await;

    let payload = rpc_call_raw(server.port, "launch_rocket", json!({})).await.unwrap();
    assert_eq!(error_code(&payload), Some(-32601));
    assert_eq!(payload["id"], 1);
}

#[tokio::test]
async fn test_missing_param_is_rejected() {
    let server = start_test_server().await;

    let payload = rpc_call_raw(server.port, "resolve_series", json!({})).await.unwrap();
    assert_eq!(error_code(&payload), Some(-32005));
    assert!(payload["error"]["message"].as_str().unwrap().contains("name"));
}

// =============================================================================
// Resolution
// =============================================================================

#[tokio::test]
async fn test_resolve_series_and_cache() {
    let server = start_test_server().await;

    let record = rpc_call(server.port, "resolve_series", json!({"name": "Berserk"}))
        .await
        .unwrap();
    assert_eq!(record["id"]["catalog"], "anilist");
    assert_eq!(record["id"]["value"], "30002");
    assert_eq!(record["title"]["english"], "Berserk");

    rpc_call(server.port, "resolve_series", json!({"name": "Berserk"}))
        .await
        .unwrap();
    assert_eq!(server.catalog.calls.load(Ordering::SeqCst), 1);

    let stats = rpc_call(server.port, "cache_stats", json!({})).await.unwrap();
    assert!(stats["total_entries"].as_u64().unwrap() >= 1);
}

#[tokio::test]
async fn test_resolve_unknown_series_is_not_found() {
    let server = start_test_server().await;

    let payload = rpc_call_raw(server.port, "resolve_series", json!({"name": "Naruto"}))
        .await
        .unwrap();
    assert_eq!(error_code(&payload), Some(-32002));

    let forgotten = rpc_call(server.port, "forget_resolution", json!({"name": "Naruto"}))
        .await
        .unwrap();
    assert_eq!(forgotten["forgotten"], true);
}

#[tokio::test]
async fn test_resolve_record_by_id() {
    let server = start_test_server().await;

    let record = rpc_call(server.port, "resolve_record", json!({"id": "anilist:30002"}))
        .await
        .unwrap();
    assert_eq!(record["title"]["english"], "Berserk");

    let payload = rpc_call_raw(server.port, "resolve_record", json!({"id": "30002"}))
        .await
        .unwrap();
    assert_eq!(error_code(&payload), Some(-32005));
}

// =============================================================================
// Downloads
// =============================================================================

#[tokio::test]
async fn test_search_list_and_download() {
    let server = start_test_server().await;

    let found = rpc_call(server.port, "search_series", json!({"query": "berserk"}))
        .await
        .unwrap();
    assert_eq!(found[0]["id"], "bk");

    let chapters = rpc_call(
        server.port,
        "list_chapters",
        json!({"seriesId": "bk", "query": "brand"}),
    )
    .await
    .unwrap();
    let chapters = chapters.as_array().unwrap();
    assert_eq!(chapters.len(), 1);
    assert_eq!(chapters[0]["id"], "a2");

    let downloaded = rpc_call(
        server.port,
        "download_chapter",
        json!({"series_id": "bk", "chapter_id": "a2"}),
    )
    .await
    .unwrap();
    assert_eq!(downloaded["success"], true);
    let path = PathBuf::from(downloaded["path"].as_str().unwrap());
    assert!(path.is_file());
    assert_eq!(path.extension().and_then(|e| e.to_str()), Some("cbz"));

    let stored = rpc_call(server.port, "get_series", json!({"localId": "bk"}))
        .await
        .unwrap();
    assert_eq!(stored["title"], "Berserk");
    assert_eq!(stored["metadata"]["genres"], json!(["Action", "Horror"]));

    let listed = rpc_call(server.port, "list_series", json!({})).await.unwrap();
    assert_eq!(listed.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_download_unknown_chapter() {
    let server = start_test_server().await;
    rpc_call(server.port, "search_series", json!({"query": "berserk"}))
        .await
        .unwrap();

    let payload = rpc_call_raw(
        server.port,
        "download_chapter",
        json!({"series_id": "bk", "chapter_id": "a99"}),
    )
    .await
    .unwrap();
    assert_eq!(error_code(&payload), Some(-32002));
}

#[tokio::test]
async fn test_get_settings() {
    let server = start_test_server().await;

    let settings = rpc_call(server.port, "get_settings", json!({})).await.unwrap();
    assert_eq!(settings["format"], json!(Settings::default().format));
    assert_eq!(settings["parallel_downloads"], 4);
}

// =============================================================================
// Binary
// =============================================================================

struct RpcServerHandle {
    child: tokio::process::Child,
    port: u16,
}

impl Drop for RpcServerHandle {
    fn drop(&mut self) {
        let _ = self.child.start_kill();
    }
}

/// Start the RPC binary and wait until `/health` is ready.
async fn start_rpc_binary(root: &std::path::Path) -> std::result::Result<RpcServerHandle, String> {
    let binary = PathBuf::from(env!("CARGO_BIN_EXE_tankobon-rpc"));

    let mut child = tokio::process::Command::new(&binary)
        .arg("--host")
        .arg("127.0.0.1")
        .arg("--port")
        .arg("0")
        .arg("--root")
        .arg(root)
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| format!("failed to spawn tankobon-rpc: {e}"))?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| "failed to capture stdout".to_string())?;
    let mut lines = tokio::io::BufReader::new(stdout).lines();

    let mut discovered_port: Option<u16> = None;
    let deadline = tokio::time::Instant::now() + Duration::from_secs(20);
    while tokio::time::Instant::now() < deadline {
        match tokio::time::timeout(Duration::from_millis(250), lines.next_line()).await {
            Ok(Ok(Some(line))) => {
                if let Some(value) = line.strip_prefix("RPC_PORT=") {
                    let parsed = value
                        .trim()
                        .parse::<u16>()
                        .map_err(|e| format!("invalid RPC_PORT value '{value}': {e}"))?;
                    discovered_port = Some(parsed);
                    break;
                }
            }
            Ok(Ok(None)) => break,
            Ok(Err(err)) => return Err(format!("failed to read tankobon-rpc stdout: {err}")),
            Err(_) => continue,
        }
    }

    let port =
        discovered_port.ok_or_else(|| "RPC_PORT line not emitted by tankobon-rpc".to_string())?;
    if !wait_for_server(port, 15).await {
        return Err(format!("tankobon-rpc failed health check on port {port}"));
    }

    Ok(RpcServerHandle { child, port })
}

#[tokio::test]
async fn test_binary_prints_port_and_serves() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("library");

    let server = start_rpc_binary(&root).await.unwrap();
    assert!(root.join("downloads").is_dir());

    let listed = rpc_call(server.port, "list_series", json!({})).await.unwrap();
    assert_eq!(listed, json!([]));

    let history = rpc_call(server.port, "download_history", json!({})).await.unwrap();
    assert_eq!(history, json!([]));
}
