//! Top-user report request parameters and response decoding

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};

use crate::window::TimeWindow;
use crate::UsageRecord;

/// Report endpoint path
pub const TOP_USER_ENDPOINT: &str = "/open-apis/vc/v1/reports/get_top_user";

/// Parameters of one report request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRequest {
    /// Window start (Unix seconds)
    pub start_time: i64,
    /// Window end (Unix seconds)
    pub end_time: i64,
    /// Maximum number of entries
    pub limit: u32,
    /// Sort order code
    pub order_by: u8,
}

impl ReportRequest {
    /// Build the request covering `window`
    pub fn for_window(window: &TimeWindow, limit: u32, order_by: u8) -> Self {
        Self {
            start_time: window.start.timestamp(),
            end_time: window.end.timestamp(),
            limit,
            order_by,
        }
    }

    /// Query string pairs in the order the API documents them
    pub fn query_params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("start_time", self.start_time.to_string()),
            ("end_time", self.end_time.to_string()),
            ("limit", self.limit.to_string()),
            ("order_by", self.order_by.to_string()),
        ]
    }
}

/// Decoded response envelope for one window
#[derive(Debug, Clone, Deserialize)]
pub struct RawReportPage {
    /// API status code, 0 on success
    pub code: i64,
    /// API status message
    #[serde(default)]
    pub msg: String,
    /// Report payload, absent on error
    #[serde(default)]
    pub data: Option<RawReportData>,
}

/// Payload of a report response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawReportData {
    /// Ranked user entries
    #[serde(default)]
    pub top_user_report: Vec<RawTopUser>,
}

/// One ranked user entry as returned by the API
#[derive(Debug, Clone, Deserialize)]
pub struct RawTopUser {
    /// User id
    pub id: String,
    /// Display name
    #[serde(default)]
    pub name: String,
    /// User type code
    #[serde(default)]
    pub user_type: i32,
    /// Meetings attended
    #[serde(default, deserialize_with = "lenient_u64")]
    pub meeting_count: u64,
    /// Total meeting time in seconds
    #[serde(default, deserialize_with = "lenient_u64")]
    pub meeting_duration: u64,
    /// Meetings organized
    #[serde(default, deserialize_with = "lenient_u64")]
    pub organized_meeting_count: u64,
}

impl RawReportPage {
    /// Decode a response body
    pub fn decode(body: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(body)
    }

    /// Whether the API reported success
    pub fn is_success(&self) -> bool {
        self.code == 0
    }

    /// Normalize every entry, tagging it with `window_start`
    pub fn into_records(self, window_start: DateTime<Utc>) -> Vec<UsageRecord> {
        self.data
            .unwrap_or_default()
            .top_user_report
            .into_iter()
            .map(|user| UsageRecord {
                start_time: window_start,
                user_id: user.id,
                name: user.name,
                user_type: user.user_type,
                meeting_count: user.meeting_count,
                meeting_duration_secs: user.meeting_duration,
                organized_meeting_count: user.organized_meeting_count,
            })
            .collect()
    }
}

// The API encodes 64-bit counters as strings; accept plain numbers too.
fn lenient_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(u64),
        Text(String),
    }

    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => Ok(n),
        NumberOrString::Text(s) if s.trim().is_empty() => Ok(0),
        NumberOrString::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}
