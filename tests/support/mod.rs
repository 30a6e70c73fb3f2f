//! Fakes shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use usage_report_collector::collector::ProgressFn;
use usage_report_collector::fetcher::{
    CredentialError, CredentialProvider, FetcherError, FetcherResult, ReportFetcher,
    ReportRequest,
};
use usage_report_collector::output::{OutputError, OutputResult, RecordSink};
use usage_report_collector::UsageRecord;

/// Fixed "now" used by most tests: 2024-03-10 10:00 UTC
pub fn anchor() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 10, 10, 0, 0).unwrap()
}

/// Report body with one user whose id encodes the request start
pub fn report_body(start_time: i64) -> Vec<u8> {
    format!(
        r#"{{"code":0,"msg":"success","data":{{"top_user_report":[
            {{"id":"ou_{start_time}","name":"Ann","user_type":1,"meeting_count":"4","meeting_duration":"3600","organized_meeting_count":"1"}},
            {{"id":"ou_{start_time}_b","name":"Bob","user_type":1,"meeting_count":2,"meeting_duration":900,"organized_meeting_count":0}}
        ]}}}}"#
    )
    .into_bytes()
}

/// Scriptable report fetcher
#[derive(Default)]
pub struct FakeFetcher {
    requests: Mutex<Vec<ReportRequest>>,
    failing: Mutex<HashSet<i64>>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call sleeps for `delay` before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Requests starting at `start` fail with a server error
    pub fn fail_window(self, start: DateTime<Utc>) -> Self {
        self.failing.lock().unwrap().insert(start.timestamp());
        self
    }

    pub fn requests(&self) -> Vec<ReportRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReportFetcher for FakeFetcher {
    async fn fetch(&self, request: &ReportRequest, _token: &str) -> FetcherResult<Vec<u8>> {
        self.requests.lock().unwrap().push(request.clone());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.lock().unwrap().contains(&request.start_time) {
            return Err(FetcherError::ServerError(503));
        }
        Ok(report_body(request.start_time))
    }
}

/// Credential provider that always rejects
pub struct RejectingCredentials;

#[async_trait]
impl CredentialProvider for RejectingCredentials {
    async fn access_token(&self) -> Result<String, CredentialError> {
        Err(CredentialError::Rejected {
            code: 10014,
            msg: "app secret invalid".into(),
        })
    }
}

/// Sink that fails either every save or the pre-run clear
pub struct BrokenSink {
    pub fail_clear: bool,
}

#[async_trait]
impl RecordSink for BrokenSink {
    async fn save_records(&self, _records: Vec<UsageRecord>) -> OutputResult<()> {
        Err(OutputError::Rejected("disk full".into()))
    }

    async fn clear(&self) -> OutputResult<()> {
        if self.fail_clear {
            return Err(OutputError::Rejected("read-only".into()));
        }
        Ok(())
    }
}

/// Progress sink collecting every value
pub fn recording_progress() -> (ProgressFn<impl Fn(f32) + Send + Sync>, Arc<Mutex<Vec<f32>>>) {
    let values = Arc::new(Mutex::new(Vec::new()));
    let sink = {
        let values = values.clone();
        ProgressFn(move |p| values.lock().unwrap().push(p))
    };
    (sink, values)
}

/// Assert a progress stream never decreases and ends at exactly 1
pub fn assert_monotonic_to_one(values: &[f32]) {
    assert!(!values.is_empty());
    for pair in values.windows(2) {
        assert!(pair[0] <= pair[1], "progress went backwards: {values:?}");
    }
    assert_eq!(*values.last().unwrap(), 1.0, "progress did not end at 1: {values:?}");
}

/// Assert a failed run's progress stream never decreases and stays below 1
pub fn assert_monotonic_below_one(values: &[f32]) {
    for pair in values.windows(2) {
        assert!(pair[0] <= pair[1], "progress went backwards: {values:?}");
    }
    assert!(
        values.iter().all(|v| *v < 1.0),
        "failed run reported completion: {values:?}"
    );
}
