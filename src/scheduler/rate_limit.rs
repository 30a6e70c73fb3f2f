//! Rolling-window request admission
//!
//! Each admission takes one semaphore permit and holds it for the full window,
//! so no more than `max_requests` admissions can land in any window-length span.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::sleep;

use crate::config::ConfigError;
use crate::metrics::RateLimiterMetrics;
use crate::scheduler::config::RATE_LIMIT_WINDOW;
use crate::shutdown::ShutdownCoordinator;

/// Request-based rate limiter shared by all workers
#[derive(Debug, Clone)]
pub struct RateLimiter {
    semaphore: Arc<Semaphore>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    /// Create a limiter admitting `max_requests` per `window`
    ///
    /// # Arguments
    /// * `max_requests` - Maximum admissions per window, must be positive
    /// * `window` - Rolling window length
    pub fn new(max_requests: usize, window: Duration) -> Result<Self, ConfigError> {
        if max_requests == 0 {
            return Err(ConfigError::InvalidRateLimit(max_requests));
        }
        Ok(Self {
            semaphore: Arc::new(Semaphore::new(max_requests)),
            max_requests,
            window,
        })
    }

    /// Create a limiter admitting `max_requests` per second
    pub fn per_second(max_requests: usize) -> Result<Self, ConfigError> {
        Self::new(max_requests, RATE_LIMIT_WINDOW)
    }

    /// Admission budget per window
    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    /// Admissions still available in the current window
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Wait for an admission slot
    ///
    /// Returns [`RateLimitError::Cancelled`] as soon as shutdown is requested,
    /// whether before or while waiting.
    pub async fn admit(&self, shutdown: &ShutdownCoordinator) -> Result<(), RateLimitError> {
        if shutdown.is_cancelled() {
            return Err(RateLimitError::Cancelled);
        }

        let mut metrics = RateLimiterMetrics::new();
        metrics.start_acquire();

        let permit = tokio::select! {
            biased;
            _ = shutdown.cancelled() => return Err(RateLimitError::Cancelled),
            permit = self.semaphore.clone().acquire_owned() => {
                permit.map_err(|e| RateLimitError::AcquireError(e.to_string()))?
            }
        };

        metrics.record_acquired();
        metrics.update_available_permits(self.available());

        // The permit returns to the pool once the window has elapsed.
        let window = self.window;
        tokio::spawn(async move {
            sleep(window).await;
            drop(permit);
        });

        Ok(())
    }
}

/// Rate limiter errors
#[derive(Debug, thiserror::Error)]
pub enum RateLimitError {
    /// Shutdown requested while waiting
    #[error("cancelled while waiting for a rate limit slot")]
    Cancelled,

    /// Failed to acquire permits
    #[error("failed to acquire rate limit permits: {0}")]
    AcquireError(String),
}
