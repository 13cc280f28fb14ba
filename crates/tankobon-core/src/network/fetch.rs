//! Fetching raw bytes for pages and covers.

use crate::network::client::HttpClient;
use crate::Result;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;

/// Downloads the body behind a URL.
///
/// Page acquisition and cover download depend on this trait instead of the
/// HTTP client so tests can control latency and failures.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Bytes>;
}

/// Shared handle to a fetcher.
pub type DynPageFetcher = Arc<dyn PageFetcher>;

#[async_trait]
impl PageFetcher for HttpClient {
    async fn fetch(&self, url: &str) -> Result<Bytes> {
        self.get_bytes(url).await
    }
}
