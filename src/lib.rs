//! # Usage Report Collector Library
//!
//! Collects daily meeting usage reports ("top users") from the open platform
//! reporting API and stores them, one page per day, with bounded concurrency
//! and a shared request budget.
//!
//! ## Features
//!
//! - **Daily Windows**: Splits "the last N days" into contiguous, UTC-aligned day windows
//! - **Bounded Concurrency**: Fixed worker pool fed through a bounded queue
//! - **Rate Limiting**: One rolling per-second request budget shared by every worker
//! - **First Error Wins**: One failed window fails the run, sibling windows still finish
//! - **Progress Reporting**: Monotonic `0.0..=1.0` progress stream for the caller
//! - **Cancellation**: Cooperative shutdown through a shared coordinator
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use usage_report_collector::collector::Collector;
//! use usage_report_collector::config::{AppCredentials, CollectorConfig};
//! use usage_report_collector::fetcher::{FeishuHttpClient, TenantTokenProvider};
//! use usage_report_collector::output::CsvRecordSink;
//! use usage_report_collector::shutdown::ShutdownCoordinator;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let http = FeishuHttpClient::new("https://open.feishu.cn");
//! let credentials = AppCredentials::new("cli_xxx", "secret")?;
//! let collector = Collector::new(
//!     Arc::new(TenantTokenProvider::new(http.clone(), credentials)),
//!     Arc::new(http),
//!     Arc::new(CsvRecordSink::new("./reports")),
//! );
//!
//! let (progress, mut updates) = tokio::sync::mpsc::unbounded_channel();
//! tokio::spawn(async move {
//!     while let Some(value) = updates.recv().await {
//!         println!("{:.0}%", value * 100.0);
//!     }
//! });
//!
//! collector
//!     .execute(&CollectorConfig::new(30), &progress, ShutdownCoordinator::shared())
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`window`] - Daily window partitioning
//! - [`scheduler`] - Worker pool and rate limiter
//! - [`fetcher`] - Credential provider and report fetcher
//! - [`output`] - Record sinks (CSV, memory)
//! - [`collector`] - Run orchestration and progress reporting
//! - [`shutdown`] - Cancellation signal

#![warn(missing_docs)]
#![warn(clippy::all)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// CLI command implementations
pub mod cli;

/// Collection run orchestration
pub mod collector;

/// Run configuration
pub mod config;

/// Credential and report fetching
pub mod fetcher;

/// Observability metrics
pub mod metrics;

/// Record sinks
pub mod output;

/// Worker pool and rate limiting
pub mod scheduler;

/// Cancellation coordination shared across modules
pub mod shutdown;

/// Daily time windows
pub mod window;

pub use collector::{CollectError, Collector};
pub use config::CollectorConfig;
pub use window::TimeWindow;

/// One user's meeting usage within a window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRecord {
    /// Start of the window this entry was collected for
    pub start_time: DateTime<Utc>,
    /// User id
    pub user_id: String,
    /// Display name
    pub name: String,
    /// User type code
    pub user_type: i32,
    /// Meetings attended
    pub meeting_count: u64,
    /// Total meeting time in seconds
    pub meeting_duration_secs: u64,
    /// Meetings organized
    pub organized_meeting_count: u64,
}

impl UsageRecord {
    /// Validate record integrity
    pub fn validate(&self) -> Result<(), String> {
        if self.user_id.is_empty() {
            return Err("User id cannot be empty".to_string());
        }
        if self.organized_meeting_count > self.meeting_count {
            return Err(format!(
                "Organized meetings ({}) cannot exceed attended meetings ({})",
                self.organized_meeting_count, self.meeting_count
            ));
        }
        Ok(())
    }
}
