//! Scheduler and HTTP retry configuration constants

use std::time::Duration;

/// Default number of concurrent workers.
/// Ten workers keep a one-page-per-day backfill busy without flooding the API.
pub const DEFAULT_POOL_SIZE: usize = 10;

/// Default outbound request budget per second.
/// The reporting API allows a handful of calls per second per tenant.
pub const DEFAULT_RATE_LIMIT_PER_SECOND: usize = 5;

/// Length of the rolling window the rate budget applies to.
pub const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(1);

/// Maximum number of retries the HTTP client makes for one request.
/// Retries belong to the HTTP layer; the collector itself fetches each window once.
pub const MAX_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds.
pub const INITIAL_BACKOFF_MS: u64 = 500;

/// Maximum backoff delay in milliseconds.
pub const MAX_BACKOFF_MS: u64 = 8_000;

/// Calculate exponential backoff delay
pub fn calculate_backoff(retry_count: u32) -> Duration {
    let delay_ms = INITIAL_BACKOFF_MS.saturating_mul(2u64.saturating_pow(retry_count));
    let delay_ms = delay_ms.min(MAX_BACKOFF_MS);
    Duration::from_millis(delay_ms)
}
