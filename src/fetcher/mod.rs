//! Remote report fetching and credential acquisition
//!
//! The collector only depends on the two traits defined here. The HTTP
//! implementations live in [`http`] and [`credential`]; tests and embedders can
//! substitute their own.

use async_trait::async_trait;

pub mod credential;
pub mod http;
pub mod report;
pub mod shared_resources;

pub use credential::{StaticTokenProvider, TenantTokenProvider};
pub use http::FeishuHttpClient;
pub use report::{RawReportPage, RawTopUser, ReportRequest};

/// Fetcher errors
#[derive(Debug, thiserror::Error)]
pub enum FetcherError {
    /// Transport-level failure (connect, timeout, body read)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success status that is not retried
    #[error("unexpected status {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body, possibly truncated
        body: String,
    },

    /// Rate limit still exceeded after all retries
    #[error("rate limit exceeded")]
    RateLimitExceeded,

    /// Server error still returned after all retries
    #[error("server error {0}")]
    ServerError(u16),

    /// Invalid request or response
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Result type for fetcher operations
pub type FetcherResult<T> = Result<T, FetcherError>;

/// Credential acquisition errors
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    /// Token endpoint could not be reached
    #[error("token request failed: {0}")]
    Request(#[from] FetcherError),

    /// Token endpoint rejected the application credentials
    #[error("token request rejected with code {code}: {msg}")]
    Rejected {
        /// API error code
        code: i64,
        /// API error message
        msg: String,
    },
}

/// Source of the access token injected into every report request
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Return a valid access token, refreshing it if needed
    async fn access_token(&self) -> Result<String, CredentialError>;
}

/// Performs one authenticated report request
///
/// Implementations must be callable concurrently from every worker.
#[async_trait]
pub trait ReportFetcher: Send + Sync {
    /// Fetch the raw response body for `request`
    ///
    /// # Arguments
    /// * `request` - Window bounds and paging parameters
    /// * `token` - Opaque access token
    async fn fetch(&self, request: &ReportRequest, token: &str) -> FetcherResult<Vec<u8>>;
}
