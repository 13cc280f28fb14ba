//! Network plumbing: the shared HTTP client, retries, and byte fetching.

mod client;
mod fetch;
mod retry;

pub use client::{extract_domain, HttpClient};
pub use fetch::{DynPageFetcher, PageFetcher};
pub use retry::{retry_async, RetryConfig, RetryStats};
