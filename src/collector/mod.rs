//! Collection run orchestration
//!
//! A run walks through a fixed sequence:
//!
//! 1. **Credential**: obtain an access token from the [`CredentialProvider`]
//! 2. **Pre-clear**: remove results of earlier runs from the [`RecordSink`]
//! 3. **Dispatch**: submit one task per [`TimeWindow`], newest first, to the
//!    [`WorkerScheduler`]
//! 4. **Drain**: wait for every task and surface the first failure
//!
//! Progress is reported to a [`ProgressSink`] as a non-decreasing value in
//! `0.0..=1.0`.
//!
//! [`CredentialProvider`]: crate::fetcher::CredentialProvider
//! [`RecordSink`]: crate::output::RecordSink
//! [`TimeWindow`]: crate::window::TimeWindow
//! [`WorkerScheduler`]: crate::scheduler::WorkerScheduler
//!
//! # Error Handling
//!
//! Every failure is a [`CollectError`]. Per-window errors carry the window
//! start and keep the underlying error as their source.

use chrono::{DateTime, Utc};

use crate::config::ConfigError;
use crate::fetcher::{CredentialError, FetcherError};
use crate::output::OutputError;
use crate::scheduler::SchedulerError;

pub mod executor;
pub mod progress;

pub use executor::Collector;
pub use progress::{ProgressFn, ProgressReporter, ProgressSink, RunState};

/// Collection errors
#[derive(Debug, thiserror::Error)]
pub enum CollectError {
    /// Invalid run configuration
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// Access token could not be obtained
    #[error("failed to acquire credential: {0}")]
    Credential(#[from] CredentialError),

    /// Prior results could not be removed
    #[error("failed to clear prior results: {0}")]
    PreClear(#[source] OutputError),

    /// Report request failed
    #[error("fetch failed for window starting {window_start}: {source}")]
    Fetch {
        /// Start of the failed window
        window_start: DateTime<Utc>,
        /// Underlying fetch error
        #[source]
        source: FetcherError,
    },

    /// Response body was not a valid report
    #[error("invalid report for window starting {window_start}: {source}")]
    Decode {
        /// Start of the failed window
        window_start: DateTime<Utc>,
        /// Underlying decode error
        #[source]
        source: serde_json::Error,
    },

    /// API answered with a non-zero code
    #[error("report API error for window starting {window_start}: code {code}: {msg}")]
    Api {
        /// Start of the failed window
        window_start: DateTime<Utc>,
        /// API error code
        code: i64,
        /// API error message
        msg: String,
    },

    /// Records could not be stored
    #[error("failed to save records for window starting {window_start}: {source}")]
    Sink {
        /// Start of the failed window
        window_start: DateTime<Utc>,
        /// Underlying sink error
        #[source]
        source: OutputError,
    },

    /// Worker pool failure not caused by a task
    #[error("scheduler error: {0}")]
    Scheduler(String),

    /// Run was cancelled
    #[error("collection cancelled")]
    Cancelled,
}

impl CollectError {
    /// Start of the window this error belongs to, if any
    pub fn window_start(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Fetch { window_start, .. }
            | Self::Decode { window_start, .. }
            | Self::Api { window_start, .. }
            | Self::Sink { window_start, .. } => Some(*window_start),
            _ => None,
        }
    }

    /// Short label of the failing stage, used as a metrics tag
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Credential(_) => "credential",
            Self::PreClear(_) => "pre_clear",
            Self::Fetch { .. } => "fetch",
            Self::Decode { .. } => "decode",
            Self::Api { .. } => "api",
            Self::Sink { .. } => "sink",
            Self::Scheduler(_) => "scheduler",
            Self::Cancelled => "cancelled",
        }
    }
}

impl From<SchedulerError<CollectError>> for CollectError {
    fn from(err: SchedulerError<CollectError>) -> Self {
        match err {
            SchedulerError::Task(e) => e,
            SchedulerError::Cancelled => CollectError::Cancelled,
            other => CollectError::Scheduler(other.to_string()),
        }
    }
}
