//! CSV sink writing one file per window

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use csv::{ReaderBuilder, WriterBuilder};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::{OutputError, OutputResult, RecordSink};
use crate::UsageRecord;

const DEFAULT_BUFFER_SIZE: usize = 8192; // 8KB buffer

/// File name prefix of every file this sink owns
pub const FILE_PREFIX: &str = "top_users_";

/// CSV row for one usage record
#[derive(Debug, Serialize, Deserialize)]
struct UsageRow {
    start_time: String,
    user_id: String,
    name: String,
    user_type: i32,
    meeting_count: u64,
    meeting_duration_secs: u64,
    organized_meeting_count: u64,
}

impl From<&UsageRecord> for UsageRow {
    fn from(record: &UsageRecord) -> Self {
        Self {
            start_time: record.start_time.to_rfc3339(),
            user_id: record.user_id.clone(),
            name: record.name.clone(),
            user_type: record.user_type,
            meeting_count: record.meeting_count,
            meeting_duration_secs: record.meeting_duration_secs,
            organized_meeting_count: record.organized_meeting_count,
        }
    }
}

impl TryFrom<UsageRow> for UsageRecord {
    type Error = OutputError;

    fn try_from(row: UsageRow) -> Result<Self, Self::Error> {
        let start_time = DateTime::parse_from_rfc3339(&row.start_time)
            .map_err(|e| OutputError::InvalidRecord(format!("bad start_time: {e}")))?
            .with_timezone(&Utc);
        let record = Self {
            start_time,
            user_id: row.user_id,
            name: row.name,
            user_type: row.user_type,
            meeting_count: row.meeting_count,
            meeting_duration_secs: row.meeting_duration_secs,
            organized_meeting_count: row.organized_meeting_count,
        };
        record.validate().map_err(OutputError::InvalidRecord)?;
        Ok(record)
    }
}

/// Writes each window's records to `<dir>/top_users_<YYYY-MM-DD>.csv`
///
/// A save replaces the file for that day, so re-collecting a window is
/// idempotent and concurrent saves for different windows touch different files.
#[derive(Debug, Clone)]
pub struct CsvRecordSink {
    dir: PathBuf,
}

impl CsvRecordSink {
    /// Create a sink rooted at `dir` (created on first write)
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Output directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File holding the window starting on `day`
    pub fn path_for(&self, day: NaiveDate) -> PathBuf {
        self.dir
            .join(format!("{FILE_PREFIX}{}.csv", day.format("%Y-%m-%d")))
    }

    /// Every file this sink has written, sorted by name
    pub fn files(&self) -> OutputResult<Vec<PathBuf>> {
        owned_files(&self.dir)
    }
}

#[async_trait]
impl RecordSink for CsvRecordSink {
    async fn save_records(&self, records: Vec<UsageRecord>) -> OutputResult<()> {
        if records.is_empty() {
            debug!("Empty batch, nothing to write");
            return Ok(());
        }

        let mut by_day: BTreeMap<NaiveDate, Vec<UsageRecord>> = BTreeMap::new();
        for record in records {
            by_day
                .entry(record.start_time.date_naive())
                .or_default()
                .push(record);
        }

        let files: Vec<(PathBuf, Vec<UsageRecord>)> = by_day
            .into_iter()
            .map(|(day, records)| (self.path_for(day), records))
            .collect();

        tokio::task::spawn_blocking(move || -> OutputResult<()> {
            for (path, records) in files {
                write_file(&path, &records)?;
            }
            Ok(())
        })
        .await
        .map_err(|e| OutputError::TaskFailed(e.to_string()))?
    }

    async fn clear(&self) -> OutputResult<()> {
        let dir = self.dir.clone();
        let removed = tokio::task::spawn_blocking(move || -> OutputResult<usize> {
            let files = owned_files(&dir)?;
            for path in &files {
                fs::remove_file(path)?;
            }
            Ok(files.len())
        })
        .await
        .map_err(|e| OutputError::TaskFailed(e.to_string()))??;

        info!(dir = %self.dir.display(), removed, "Cleared previous report files");
        Ok(())
    }
}

/// Write `records` to `path` through a temporary file and rename
fn write_file(path: &Path, records: &[UsageRecord]) -> OutputResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let tmp_path = path.with_extension("csv.tmp");
    let file = File::create(&tmp_path)?;
    let buf_writer = BufWriter::with_capacity(DEFAULT_BUFFER_SIZE, file);
    let mut writer = WriterBuilder::new().from_writer(buf_writer);

    for record in records {
        writer.serialize(UsageRow::from(record))?;
    }

    let mut buf_writer = writer
        .into_inner()
        .map_err(|e| OutputError::IoError(std::io::Error::other(e.to_string())))?;
    buf_writer.flush()?;
    let file = buf_writer
        .into_inner()
        .map_err(|e| OutputError::IoError(std::io::Error::other(e.to_string())))?;
    file.sync_all()?;

    fs::rename(&tmp_path, path)?;
    debug!(path = %path.display(), records = records.len(), "CSV file written");
    Ok(())
}

/// Read back every record stored in one CSV file
pub fn read_records<P: AsRef<Path>>(path: P) -> OutputResult<Vec<UsageRecord>> {
    let mut reader = ReaderBuilder::new().from_path(path)?;
    reader
        .deserialize::<UsageRow>()
        .map(|row| UsageRecord::try_from(row?))
        .collect()
}

fn owned_files(dir: &Path) -> OutputResult<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let owned = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with(FILE_PREFIX) && name.ends_with(".csv"));
        if owned && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
