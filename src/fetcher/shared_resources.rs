//! Connection pool shared by every [`FeishuHttpClient`](super::FeishuHttpClient)
//!
//! The token provider and the report fetcher talk to the same host, so they
//! share one `reqwest::Client` and its keep-alive connections.

use once_cell::sync::Lazy;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = concat!("usage-report-collector/", env!("CARGO_PKG_VERSION"));

static SHARED_CLIENT: Lazy<Arc<Client>> = Lazy::new(|| {
    let client = Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(REQUEST_TIMEOUT)
        .user_agent(USER_AGENT)
        .build()
        .unwrap_or_else(|e| {
            warn!(error = %e, "HTTP client settings rejected, using defaults");
            Client::new()
        });
    Arc::new(client)
});

/// Handle to the shared client
pub fn global_http_client() -> Arc<Client> {
    SHARED_CLIENT.clone()
}
