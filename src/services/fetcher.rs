// src/services/fetcher.rs

//! Concurrent page fetcher.
//!
//! Fetches every configured source through one shared HTTP client, bounded
//! by `fetcher.max_concurrent`. Transient failures (429/5xx, timeouts,
//! connection errors) are retried per source with increasing backoff; a
//! source that still fails is reported as a failure payload and never
//! aborts the remaining fetches.

use std::time::Duration;

use futures::stream::{self, StreamExt};
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;

use crate::config::FetcherConfig;
use crate::error::Result;
use crate::models::{PageSnapshot, WatchSource};
use crate::utils::http;

/// HTTP statuses worth retrying: rate limiting and transient server errors.
const TRANSIENT_STATUS: [u16; 5] = [429, 500, 502, 503, 504];

/// One source that could not be fetched.
#[derive(Debug, Clone)]
pub struct FetchFailure {
    pub source: WatchSource,
    pub error: String,
}

/// Result of fetching one source.
pub type SnapshotResult = std::result::Result<PageSnapshot, FetchFailure>;

/// Error of a single fetch attempt, classified for the retry loop.
#[derive(Debug)]
struct AttemptError {
    message: String,
    transient: bool,
}

/// Service for fetching watched pages.
pub struct PageFetcher {
    config: FetcherConfig,
    client: Client,
}

impl PageFetcher {
    /// Create a new fetcher with the given configuration.
    pub fn new(config: &FetcherConfig) -> Result<Self> {
        let client = http::create_client(config)?;
        Ok(Self {
            config: config.clone(),
            client,
        })
    }

    /// Fetch all sources concurrently, bounded by `max_concurrent`.
    ///
    /// Returns one result per input source, in completion order.
    pub async fn fetch_all(&self, sources: &[WatchSource]) -> Vec<SnapshotResult> {
        let concurrency = self.config.max_concurrent.max(1);

        stream::iter(sources)
            .map(|source| async move {
                self.fetch_source(source).await.map_err(|error| {
                    log::warn!("Fetch failed for {} ({}): {}", source.label, source.url, error);
                    FetchFailure {
                        source: source.clone(),
                        error,
                    }
                })
            })
            .buffer_unordered(concurrency)
            .collect()
            .await
    }

    /// Fetch one source, retrying transient failures with increasing backoff.
    async fn fetch_source(&self, source: &WatchSource) -> std::result::Result<PageSnapshot, String> {
        let retry = &self.config.retry;
        let mut delay = Duration::from_millis(retry.initial_backoff_ms);
        let mut attempt: u32 = 0;

        loop {
            match self.try_fetch(source).await {
                Ok(snapshot) => return Ok(snapshot),
                Err(e) if e.transient && attempt < retry.max_retries => {
                    attempt += 1;
                    log::debug!(
                        "Transient failure for {} (attempt {}/{}): {}. Retrying in {:?}",
                        source.url,
                        attempt,
                        retry.max_retries,
                        e.message,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    delay = Duration::from_secs_f64(
                        delay.as_secs_f64() * retry.backoff_multiplier,
                    );
                }
                Err(e) => return Err(e.message),
            }
        }
    }

    /// One GET attempt, classified as transient or terminal on failure.
    async fn try_fetch(&self, source: &WatchSource) -> std::result::Result<PageSnapshot, AttemptError> {
        let response = self
            .client
            .get(&source.url)
            .send()
            .await
            .map_err(classify_request_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(AttemptError {
                message: format!("HTTP status {status}"),
                transient: TRANSIENT_STATUS.contains(&status.as_u16()),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_ascii_lowercase();

        let body = response.text().await.map_err(classify_request_error)?;
        let feed_hint = looks_like_feed(&content_type, &body);

        Ok(PageSnapshot {
            source: source.clone(),
            body,
            feed_hint,
        })
    }
}

/// Timeouts and connection-level errors are transient; everything else
/// (invalid body decode, redirect loops) is terminal.
fn classify_request_error(error: reqwest::Error) -> AttemptError {
    AttemptError {
        transient: error.is_timeout() || error.is_connect(),
        message: error.to_string(),
    }
}

/// Detect feed payloads from the Content-Type header or leading bytes.
fn looks_like_feed(content_type: &str, body: &str) -> bool {
    if content_type.contains("xml") || content_type.contains("rss") || content_type.contains("atom")
    {
        return true;
    }
    let head = body.trim_start_matches('\u{feff}').trim_start();
    head.starts_with("<?xml") || head.starts_with("<rss") || head.starts_with("<feed")
}
