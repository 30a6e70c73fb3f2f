//! Tenant access token acquisition with in-memory caching

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info};

use super::http::FeishuHttpClient;
use super::{CredentialError, CredentialProvider};
use crate::config::AppCredentials;

/// Internal-app tenant token endpoint
pub const TENANT_TOKEN_ENDPOINT: &str = "/open-apis/auth/v3/tenant_access_token/internal/";

/// Refresh this long before the server-side expiry.
const REFRESH_MARGIN: Duration = Duration::from_secs(300);

#[derive(Serialize)]
struct TokenRequest<'a> {
    app_id: &'a str,
    app_secret: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    code: i64,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    tenant_access_token: String,
    /// Lifetime in seconds
    #[serde(default)]
    expire: u64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    refresh_at: Instant,
}

impl CachedToken {
    fn new(token: String, lifetime: Duration, now: Instant) -> Self {
        Self {
            token,
            refresh_at: now + lifetime.saturating_sub(REFRESH_MARGIN),
        }
    }

    fn is_fresh(&self, now: Instant) -> bool {
        now < self.refresh_at
    }
}

/// Fetches and caches a tenant access token for one application
pub struct TenantTokenProvider {
    http: FeishuHttpClient,
    credentials: AppCredentials,
    cached: Mutex<Option<CachedToken>>,
}

impl TenantTokenProvider {
    /// Create a provider for `credentials` talking to `http`'s host
    pub fn new(http: FeishuHttpClient, credentials: AppCredentials) -> Self {
        Self {
            http,
            credentials,
            cached: Mutex::new(None),
        }
    }

    async fn request_token(&self) -> Result<(String, Duration), CredentialError> {
        let request = TokenRequest {
            app_id: &self.credentials.app_id,
            app_secret: &self.credentials.app_secret,
        };
        let response: TokenResponse = self
            .http
            .post_json(TENANT_TOKEN_ENDPOINT, &request)
            .await?;

        if response.code != 0 || response.tenant_access_token.is_empty() {
            return Err(CredentialError::Rejected {
                code: response.code,
                msg: response.msg,
            });
        }
        Ok((
            response.tenant_access_token,
            Duration::from_secs(response.expire),
        ))
    }
}

#[async_trait]
impl CredentialProvider for TenantTokenProvider {
    async fn access_token(&self) -> Result<String, CredentialError> {
        // Held across the refresh so concurrent callers share one request.
        let mut cached = self.cached.lock().await;
        let now = Instant::now();
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(now)) {
            debug!("Using cached tenant access token");
            return Ok(token.token.clone());
        }

        let (token, lifetime) = self.request_token().await?;
        info!(
            app_id = %self.credentials.app_id,
            expires_in_secs = lifetime.as_secs(),
            "Obtained tenant access token"
        );
        *cached = Some(CachedToken::new(token.clone(), lifetime, Instant::now()));
        Ok(token)
    }
}

/// Fixed token, for pre-issued tokens and tests
#[derive(Debug, Clone)]
pub struct StaticTokenProvider(String);

impl StaticTokenProvider {
    /// Wrap an existing token
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl CredentialProvider for StaticTokenProvider {
    async fn access_token(&self) -> Result<String, CredentialError> {
        Ok(self.0.clone())
    }
}
