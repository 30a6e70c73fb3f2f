//! Record sinks
//!
//! A [`RecordSink`] receives one batch per collected window and must accept
//! concurrent calls for different windows. Batches for different windows never
//! share keys, so implementations need no cross-window coordination.

use async_trait::async_trait;

use crate::UsageRecord;

pub mod csv;
pub mod memory;

pub use self::csv::CsvRecordSink;
pub use self::memory::MemoryRecordSink;

/// Output errors
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// CSV encode/decode error
    #[error("CSV error: {0}")]
    CsvError(#[from] ::csv::Error),

    /// Stored row could not be turned back into a record
    #[error("invalid stored record: {0}")]
    InvalidRecord(String),

    /// Background write task failed
    #[error("write task failed: {0}")]
    TaskFailed(String),

    /// Sink refused the batch
    #[error("sink rejected batch: {0}")]
    Rejected(String),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Persistence collaborator for normalized records
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Persist one window's records as a single write
    async fn save_records(&self, records: Vec<UsageRecord>) -> OutputResult<()>;

    /// Remove results of earlier runs; called once before any window is dispatched
    async fn clear(&self) -> OutputResult<()>;
}
