//! HTTP client shared by catalog clients, source providers and page fetches.
//!
//! Wraps reqwest with:
//! - A default timeout and user agent
//! - Status checking that turns non-success responses into errors
//! - Retries with backoff for transient failures

use crate::config::{AppConfig, NetworkConfig};
use crate::network::retry::{retry_async, RetryConfig};
use crate::{Result, TankobonError};
use bytes::Bytes;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

/// HTTP client with status checking and retries.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    retry: RetryConfig,
}

impl HttpClient {
    /// Create a new HTTP client with default configuration.
    pub fn new() -> Result<Self> {
        Self::with_timeout(NetworkConfig::REQUEST_TIMEOUT)
    }

    /// Create a new HTTP client with a custom request timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(AppConfig::USER_AGENT)
            .build()
            .map_err(|e| TankobonError::Network {
                message: format!("Failed to create HTTP client: {}", e),
                cause: None,
            })?;

        Ok(Self {
            client,
            retry: RetryConfig::new()
                .with_max_attempts(NetworkConfig::MAX_RETRIES)
                .with_base_delay(NetworkConfig::RETRY_BASE_DELAY),
        })
    }

    /// Replace the retry policy.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Get a reference to the underlying reqwest client.
    pub fn inner(&self) -> &Client {
        &self.client
    }

    /// GET a URL and return the whole body, retrying transient failures.
    pub async fn get_bytes(&self, url: &str) -> Result<Bytes> {
        let (result, stats) = retry_async(
            &self.retry,
            || async {
                let response = self.send_get(url).await?;
                response.bytes().await.map_err(|e| TankobonError::Network {
                    message: format!("Failed to read body of {}: {}", url, e),
                    cause: None,
                })
            },
            |e: &TankobonError| e.is_retryable(),
        )
        .await;

        if stats.attempts > 1 {
            debug!("GET {} finished after {} attempts", url, stats.attempts);
        }
        result
    }

    /// GET a URL and decode a JSON body.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let body = self.get_bytes(url).await?;
        serde_json::from_slice(&body).map_err(|e| TankobonError::Json {
            message: format!("Failed to parse response from {}: {}", url, e),
            source: Some(e),
        })
    }

    /// POST a JSON body and decode a JSON response.
    pub async fn post_json<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<T> {
        let (result, _) = retry_async(
            &self.retry,
            || async {
                let response = self
                    .client
                    .post(url)
                    .json(body)
                    .send()
                    .await
                    .map_err(|e| TankobonError::Network {
                        message: format!("POST {} failed: {}", url, e),
                        cause: extract_domain(url).into(),
                    })?;
                let response = check_status(response, url)?;
                response.bytes().await.map_err(|e| TankobonError::Network {
                    message: format!("Failed to read body of {}: {}", url, e),
                    cause: None,
                })
            },
            |e: &TankobonError| e.is_retryable(),
        )
        .await;

        let body = result?;
        serde_json::from_slice(&body).map_err(|e| TankobonError::Json {
            message: format!("Failed to parse response from {}: {}", url, e),
            source: Some(e),
        })
    }

    async fn send_get(&self, url: &str) -> Result<Response> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TankobonError::Timeout(NetworkConfig::REQUEST_TIMEOUT)
                } else {
                    TankobonError::Network {
                        message: format!("GET {} failed: {}", url, e),
                        cause: extract_domain(url).into(),
                    }
                }
            })?;
        check_status(response, url)
    }

    /// Check if an HTTP status code indicates a retryable error.
    pub fn is_retryable_status(status: StatusCode) -> bool {
        matches!(status.as_u16(), 408 | 429 | 500 | 502 | 503 | 504)
    }
}

fn check_status(response: Response, url: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    Err(TankobonError::DownloadFailed {
        url: url.to_string(),
        message: format!("Download failed with status {}", status),
    })
}

/// Extract domain from a URL.
pub fn extract_domain(url: &str) -> Option<String> {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_string()))
}
