//! In-memory sink

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Mutex;

use super::{OutputError, OutputResult, RecordSink};
use crate::UsageRecord;

/// Keeps every saved batch in memory
#[derive(Debug, Default)]
pub struct MemoryRecordSink {
    batches: Mutex<Vec<Vec<UsageRecord>>>,
}

impl MemoryRecordSink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Every saved batch, in save order
    pub fn batches(&self) -> Vec<Vec<UsageRecord>> {
        self.lock().map(|b| b.clone()).unwrap_or_default()
    }

    /// All saved records, flattened
    pub fn records(&self) -> Vec<UsageRecord> {
        self.batches().into_iter().flatten().collect()
    }

    /// Records tagged with `window_start`
    pub fn records_for(&self, window_start: DateTime<Utc>) -> Vec<UsageRecord> {
        self.records()
            .into_iter()
            .filter(|r| r.start_time == window_start)
            .collect()
    }

    /// Number of saved batches
    pub fn batch_count(&self) -> usize {
        self.lock().map(|b| b.len()).unwrap_or(0)
    }

    fn lock(&self) -> OutputResult<std::sync::MutexGuard<'_, Vec<Vec<UsageRecord>>>> {
        self.batches
            .lock()
            .map_err(|_| OutputError::TaskFailed("memory sink lock poisoned".to_string()))
    }
}

#[async_trait]
impl RecordSink for MemoryRecordSink {
    async fn save_records(&self, records: Vec<UsageRecord>) -> OutputResult<()> {
        self.lock()?.push(records);
        Ok(())
    }

    async fn clear(&self) -> OutputResult<()> {
        self.lock()?.clear();
        Ok(())
    }
}
