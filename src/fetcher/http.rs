//! Authenticated HTTP client for the open platform API
//!
//! Retries transport failures, 429 and 5xx responses with exponential backoff.
//! This is the only place retries happen; callers see one final outcome.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

use super::report::{ReportRequest, TOP_USER_ENDPOINT};
use super::shared_resources::global_http_client;
use super::{FetcherError, FetcherResult, ReportFetcher};
use crate::metrics::{record_retry_backoff, HttpRequestMetrics};
use crate::scheduler::config::{calculate_backoff, MAX_RETRIES};

/// Public API host
pub const DEFAULT_BASE_URL: &str = "https://open.feishu.cn";

/// Longest error body kept in [`FetcherError::Status`]
const MAX_ERROR_BODY_LEN: usize = 512;

/// HTTP client bound to one API host
#[derive(Debug, Clone)]
pub struct FeishuHttpClient {
    client: Arc<Client>,
    base_url: String,
    max_retries: u32,
}

impl FeishuHttpClient {
    /// Create a client on the shared connection pool
    ///
    /// # Arguments
    /// * `base_url` - API host (e.g., "<https://open.feishu.cn>")
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(global_http_client(), base_url)
    }

    /// Create a client on a caller-supplied `reqwest::Client`
    pub fn with_client(client: Arc<Client>, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            max_retries: MAX_RETRIES,
        }
    }

    /// Set maximum number of retries
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// API host
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Full URL for an endpoint path
    pub fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    /// Authenticated GET returning the raw body
    pub async fn get_bytes(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
        token: &str,
    ) -> FetcherResult<Vec<u8>> {
        let url = self.url(endpoint);
        debug!("Making GET request to: {} with {} params", url, params.len());

        let response = self
            .send_with_retry(endpoint, || {
                self.client.get(&url).query(params).bearer_auth(token)
            })
            .await?;
        Ok(response.bytes().await?.to_vec())
    }

    /// Unauthenticated JSON POST with typed response
    pub async fn post_json<B, T>(&self, endpoint: &str, body: &B) -> FetcherResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(endpoint);
        debug!("Making POST request to: {}", url);

        let response = self
            .send_with_retry(endpoint, || self.client.post(&url).json(body))
            .await?;
        response.json::<T>().await.map_err(|e| {
            FetcherError::InvalidResponse(format!("Failed to deserialize response: {e}"))
        })
    }

    /// Send a request, rebuilding it for every attempt
    ///
    /// Retries on:
    /// - Network errors (timeout, connection refused)
    /// - 5xx server errors
    /// - 429 rate limit errors
    ///
    /// Other 4xx responses are returned immediately.
    async fn send_with_retry<F>(&self, endpoint: &str, build: F) -> FetcherResult<Response>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            let metrics = HttpRequestMetrics::start(endpoint, attempt + 1);

            let response = match build().send().await {
                Ok(resp) => resp,
                Err(e) => {
                    metrics.record_network_error();
                    warn!(
                        "Network error on attempt {}/{}: {}",
                        attempt + 1,
                        self.max_retries + 1,
                        e
                    );
                    last_error = Some(FetcherError::Http(e));
                    if attempt < self.max_retries {
                        self.backoff(attempt).await;
                        continue;
                    }
                    break;
                }
            };

            let status = response.status();
            metrics.record_complete(status.as_u16());

            if status.as_u16() == 429 {
                warn!(
                    "Rate limit error (429) on attempt {}/{}",
                    attempt + 1,
                    self.max_retries + 1
                );
                last_error = Some(FetcherError::RateLimitExceeded);
                if attempt < self.max_retries {
                    self.backoff(attempt).await;
                    continue;
                }
                break;
            }

            if status.is_server_error() {
                warn!(
                    "Server error {} on attempt {}/{}",
                    status,
                    attempt + 1,
                    self.max_retries + 1
                );
                last_error = Some(FetcherError::ServerError(status.as_u16()));
                if attempt < self.max_retries {
                    self.backoff(attempt).await;
                    continue;
                }
                break;
            }

            if !status.is_success() {
                let mut body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());
                truncate_at_char_boundary(&mut body, MAX_ERROR_BODY_LEN);
                return Err(FetcherError::Status {
                    status: status.as_u16(),
                    body,
                });
            }

            debug!("Request succeeded on attempt {}", attempt + 1);
            return Ok(response);
        }

        Err(last_error.unwrap_or_else(|| {
            FetcherError::InvalidResponse("All retries exhausted".to_string())
        }))
    }

    async fn backoff(&self, attempt: u32) {
        let backoff = calculate_backoff(attempt);
        record_retry_backoff(backoff, attempt + 1);
        debug!("Retrying after {:?}", backoff);
        tokio::time::sleep(backoff).await;
    }
}

#[async_trait]
impl ReportFetcher for FeishuHttpClient {
    async fn fetch(&self, request: &ReportRequest, token: &str) -> FetcherResult<Vec<u8>> {
        self.get_bytes(TOP_USER_ENDPOINT, &request.query_params(), token)
            .await
    }
}

fn truncate_at_char_boundary(text: &mut String, max_len: usize) {
    if text.len() <= max_len {
        return;
    }
    let mut cut = max_len;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    text.truncate(cut);
}
