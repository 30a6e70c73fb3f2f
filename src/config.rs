//! Run configuration passed explicitly into a collection run

use crate::scheduler::config::{DEFAULT_POOL_SIZE, DEFAULT_RATE_LIMIT_PER_SECOND};
use serde::{Deserialize, Serialize};

/// Page size the reporting API accepts at most.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Most daily windows one run may collect (about a century).
pub const MAX_WINDOWS_TO_COLLECT: i64 = 36_500;

/// Default page size (one page per window).
pub const DEFAULT_PAGE_SIZE: u32 = MAX_PAGE_SIZE;

/// Default sort order: by meeting duration, descending.
pub const DEFAULT_ORDER_BY: u8 = 2;

/// Configuration errors, raised before any I/O happens
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Worker count must be positive
    #[error("pool size must be at least 1, got {0}")]
    InvalidPoolSize(usize),

    /// Rate budget must be positive
    #[error("rate limit must be at least 1 request per second, got {0}")]
    InvalidRateLimit(usize),

    /// Window count outside 0..=MAX_WINDOWS_TO_COLLECT
    #[error("number of windows to collect must be between 0 and {MAX_WINDOWS_TO_COLLECT}, got {0}")]
    InvalidWindowCount(i64),

    /// Page size outside 1..=MAX_PAGE_SIZE
    #[error("page size must be between 1 and {MAX_PAGE_SIZE}, got {0}")]
    InvalidPageSize(u32),

    /// Missing application credential field
    #[error("missing credential: {0}")]
    MissingCredential(&'static str),
}

/// Settings for one collection run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectorConfig {
    /// How many daily windows to collect, counting back from yesterday
    pub number_of_windows_to_collect: i64,
    /// Number of concurrent workers
    pub pool_size: usize,
    /// Outbound request budget per second
    pub rate_limit_per_second: usize,
    /// Records requested per window
    pub page_size: u32,
    /// API sort order code
    pub order_by: u8,
}

impl CollectorConfig {
    /// Create a configuration with default pool, rate and paging settings
    pub fn new(number_of_windows_to_collect: i64) -> Self {
        Self {
            number_of_windows_to_collect,
            pool_size: DEFAULT_POOL_SIZE,
            rate_limit_per_second: DEFAULT_RATE_LIMIT_PER_SECOND,
            page_size: DEFAULT_PAGE_SIZE,
            order_by: DEFAULT_ORDER_BY,
        }
    }

    /// Set the worker count
    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    /// Set the per-second request budget
    pub fn with_rate_limit_per_second(mut self, rate: usize) -> Self {
        self.rate_limit_per_second = rate;
        self
    }

    /// Set the page size requested per window
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Set the API sort order
    pub fn with_order_by(mut self, order_by: u8) -> Self {
        self.order_by = order_by;
        self
    }

    /// Validate every field
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0..=MAX_WINDOWS_TO_COLLECT).contains(&self.number_of_windows_to_collect) {
            return Err(ConfigError::InvalidWindowCount(
                self.number_of_windows_to_collect,
            ));
        }
        if self.pool_size == 0 {
            return Err(ConfigError::InvalidPoolSize(self.pool_size));
        }
        if self.rate_limit_per_second == 0 {
            return Err(ConfigError::InvalidRateLimit(self.rate_limit_per_second));
        }
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(ConfigError::InvalidPageSize(self.page_size));
        }
        Ok(())
    }
}

/// Application credentials used to obtain a tenant access token
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppCredentials {
    /// Application id
    pub app_id: String,
    /// Application secret
    pub app_secret: String,
}

impl AppCredentials {
    /// Create credentials, rejecting blank fields
    pub fn new(
        app_id: impl Into<String>,
        app_secret: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let app_id = app_id.into();
        let app_secret = app_secret.into();
        if app_id.trim().is_empty() {
            return Err(ConfigError::MissingCredential("app_id"));
        }
        if app_secret.trim().is_empty() {
            return Err(ConfigError::MissingCredential("app_secret"));
        }
        Ok(Self { app_id, app_secret })
    }
}

// Keep the secret out of logs.
impl std::fmt::Debug for AppCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppCredentials")
            .field("app_id", &self.app_id)
            .field("app_secret", &"***")
            .finish()
    }
}
