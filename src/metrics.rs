//! Observability metrics for collection runs
//!
//! Everything is recorded through the `metrics` facade and costs nothing
//! until a recorder is installed. [`init_metrics`] installs a Prometheus
//! exporter with a scrape endpoint.

use chrono::{DateTime, Utc};
use metrics::{
    counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit,
};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Series names
pub mod names {
    /// HTTP attempts, labelled by endpoint, status and attempt number
    pub const HTTP_REQUESTS: &str = "usage_collector_http_requests_total";
    /// 429 responses
    pub const HTTP_RATE_LIMITED: &str = "usage_collector_http_429_total";
    /// Retries scheduled by the HTTP client
    pub const HTTP_RETRIES: &str = "usage_collector_http_retries_total";
    /// Latency of one HTTP attempt
    pub const HTTP_DURATION: &str = "usage_collector_http_request_seconds";
    /// Sleep before a retry
    pub const RETRY_BACKOFF: &str = "usage_collector_retry_backoff_seconds";
    /// Admissions granted by the rate limiter
    pub const ADMISSIONS: &str = "usage_collector_rate_limit_admissions_total";
    /// Admissions left in the current window
    pub const ADMISSIONS_AVAILABLE: &str = "usage_collector_rate_limit_available";
    /// Time a worker waited for an admission
    pub const ADMISSION_WAIT: &str = "usage_collector_rate_limit_wait_seconds";
    /// Windows stored successfully
    pub const WINDOWS_COLLECTED: &str = "usage_collector_windows_collected_total";
    /// Windows that failed, labelled by stage
    pub const WINDOWS_FAILED: &str = "usage_collector_windows_failed_total";
    /// Records handed to the sink
    pub const RECORDS_SAVED: &str = "usage_collector_records_saved_total";
    /// Fetch to save latency of one window
    pub const WINDOW_DURATION: &str = "usage_collector_window_seconds";
}

static INSTALLED: AtomicBool = AtomicBool::new(false);

static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// Install the Prometheus exporter listening on `addr`
///
/// Later calls are no-ops.
pub fn init_metrics(addr: SocketAddr) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    if INSTALLED.swap(true, Ordering::SeqCst) {
        debug!("Metrics exporter already installed");
        return Ok(());
    }

    if let Err(e) = PrometheusBuilder::new().with_http_listener(addr).install() {
        INSTALLED.store(false, Ordering::SeqCst);
        return Err(format!("Failed to install Prometheus exporter on {addr}: {e}").into());
    }

    use names::*;
    for (name, help) in [
        (HTTP_REQUESTS, "HTTP attempts made to the report API"),
        (HTTP_RATE_LIMITED, "429 responses received"),
        (HTTP_RETRIES, "Retries scheduled after a failed attempt"),
        (ADMISSIONS, "Rate limiter admissions granted"),
        (WINDOWS_COLLECTED, "Windows fetched and stored"),
        (WINDOWS_FAILED, "Windows whose fetch, decode or save failed"),
        (RECORDS_SAVED, "Report records handed to the sink"),
    ] {
        describe_counter!(name, Unit::Count, help);
    }
    for (name, help) in [
        (HTTP_DURATION, "Duration of one HTTP attempt"),
        (RETRY_BACKOFF, "Backoff slept before a retry"),
        (ADMISSION_WAIT, "Time spent waiting for a rate limit admission"),
        (WINDOW_DURATION, "Time from fetch start to stored records for one window"),
    ] {
        describe_histogram!(name, Unit::Seconds, help);
    }
    describe_gauge!(
        ADMISSIONS_AVAILABLE,
        Unit::Count,
        "Admissions left in the current rate window"
    );

    info!(%addr, "Prometheus exporter listening");
    Ok(())
}

/// Next request id, used to correlate attempt log lines
pub fn generate_correlation_id() -> String {
    format!("req-{:08x}", NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed))
}

/// Timing and outcome of one HTTP attempt
pub struct HttpRequestMetrics {
    endpoint: String,
    attempt: u32,
    correlation_id: String,
    started: Instant,
}

impl HttpRequestMetrics {
    /// Start timing attempt number `attempt` (1-based) against `endpoint`
    pub fn start(endpoint: impl Into<String>, attempt: u32) -> Self {
        let endpoint = endpoint.into();
        let correlation_id = generate_correlation_id();
        debug!(%correlation_id, %endpoint, attempt, "HTTP attempt started");
        Self {
            endpoint,
            attempt,
            correlation_id,
            started: Instant::now(),
        }
    }

    fn finish(&self, status: String) -> Duration {
        let elapsed = self.started.elapsed();
        counter!(
            names::HTTP_REQUESTS,
            "endpoint" => self.endpoint.clone(),
            "status" => status,
            "attempt" => self.attempt.to_string(),
        )
        .increment(1);
        histogram!(names::HTTP_DURATION, "endpoint" => self.endpoint.clone())
            .record(elapsed.as_secs_f64());
        elapsed
    }

    /// Record a response with `status_code`
    pub fn record_complete(&self, status_code: u16) {
        let elapsed = self.finish(status_code.to_string());

        if status_code == 429 {
            counter!(names::HTTP_RATE_LIMITED, "endpoint" => self.endpoint.clone()).increment(1);
            warn!(
                correlation_id = %self.correlation_id,
                endpoint = %self.endpoint,
                attempt = self.attempt,
                elapsed_ms = elapsed.as_millis(),
                "Rate limited by server"
            );
            return;
        }

        debug!(
            correlation_id = %self.correlation_id,
            status = status_code,
            elapsed_ms = elapsed.as_millis(),
            "HTTP attempt finished"
        );
    }

    /// Record a transport failure with no response
    pub fn record_network_error(&self) {
        let elapsed = self.finish("network_error".to_string());
        warn!(
            correlation_id = %self.correlation_id,
            endpoint = %self.endpoint,
            attempt = self.attempt,
            elapsed_ms = elapsed.as_millis(),
            "HTTP attempt failed without a response"
        );
    }

    /// Id attached to this attempt's log lines
    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }
}

/// Record the sleep before retry number `attempt`
pub fn record_retry_backoff(backoff: Duration, attempt: u32) {
    let attempt = attempt.to_string();
    counter!(names::HTTP_RETRIES, "attempt" => attempt.clone()).increment(1);
    histogram!(names::RETRY_BACKOFF, "attempt" => attempt).record(backoff.as_secs_f64());
}

/// Wait time of one rate limiter admission
#[derive(Default)]
pub struct RateLimiterMetrics {
    waiting_since: Option<Instant>,
}

impl RateLimiterMetrics {
    /// Nothing measured yet
    pub fn new() -> Self {
        Self::default()
    }

    /// Admission requested
    pub fn start_acquire(&mut self) {
        self.waiting_since = Some(Instant::now());
    }

    /// Admission granted
    pub fn record_acquired(&mut self) {
        let Some(since) = self.waiting_since.take() else {
            return;
        };
        let waited = since.elapsed();
        histogram!(names::ADMISSION_WAIT).record(waited.as_secs_f64());
        counter!(names::ADMISSIONS).increment(1);
        if waited > Duration::from_millis(100) {
            debug!(waited_ms = waited.as_millis(), "Admission granted after waiting");
        }
    }

    /// Publish the admissions still available
    pub fn update_available_permits(&self, available: usize) {
        gauge!(names::ADMISSIONS_AVAILABLE).set(available as f64);
    }
}

/// Outcome of one collection window
pub struct WindowMetrics {
    window_start: DateTime<Utc>,
    started: Instant,
}

impl WindowMetrics {
    /// Start timing the window beginning at `window_start`
    pub fn start(window_start: DateTime<Utc>) -> Self {
        Self {
            window_start,
            started: Instant::now(),
        }
    }

    /// Window stored `records` records
    pub fn record_success(&self, records: usize) {
        let elapsed = self.started.elapsed();
        counter!(names::WINDOWS_COLLECTED).increment(1);
        counter!(names::RECORDS_SAVED).increment(records as u64);
        histogram!(names::WINDOW_DURATION).record(elapsed.as_secs_f64());
        debug!(
            window_start = %self.window_start,
            records,
            elapsed_ms = elapsed.as_millis(),
            "Window collected"
        );
    }

    /// Window failed at `stage`
    pub fn record_failure(&self, stage: &'static str) {
        counter!(names::WINDOWS_FAILED, "stage" => stage).increment(1);
        debug!(
            window_start = %self.window_start,
            stage,
            elapsed_ms = self.started.elapsed().as_millis(),
            "Window failed"
        );
    }
}
