//! Daily collection windows
//!
//! Windows are half-open `[start, end)` UTC day spans counted back from an
//! anchor. The anchor is truncated to midnight first, so any run on the same
//! calendar day produces the same boundaries.

use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Half-open time interval covered by one report request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeWindow {
    /// Inclusive start
    pub start: DateTime<Utc>,
    /// Exclusive end
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Create a window, returning `None` unless `start < end`
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Option<Self> {
        (start < end).then_some(Self { start, end })
    }

    /// Window length
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Whether `instant` falls inside the window
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {})",
            self.start.format("%Y-%m-%d"),
            self.end.format("%Y-%m-%d")
        )
    }
}

/// Truncate an instant to UTC midnight
pub fn truncate_to_day(instant: DateTime<Utc>) -> DateTime<Utc> {
    instant
        .date_naive()
        .and_time(NaiveTime::MIN)
        .and_utc()
}

/// Iterator over day-long windows, newest first
#[derive(Debug, Clone)]
pub struct DailyWindows {
    next_end: DateTime<Utc>,
    remaining: usize,
}

impl DailyWindows {
    /// Windows covering the `number_of_windows` days before `anchor`'s day
    ///
    /// A non-positive count yields no windows. The count is capped at the
    /// number of whole days chrono can represent before the anchor.
    pub fn new(number_of_windows: i64, anchor: DateTime<Utc>) -> Self {
        let next_end = truncate_to_day(anchor);
        let representable = (next_end - DateTime::<Utc>::MIN_UTC).num_days();
        Self {
            next_end,
            remaining: usize::try_from(number_of_windows.min(representable)).unwrap_or(0),
        }
    }
}

impl Iterator for DailyWindows {
    type Item = TimeWindow;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let end = self.next_end;
        let Some(start) = end.checked_sub_signed(Duration::days(1)) else {
            self.remaining = 0;
            return None;
        };
        self.next_end = start;
        self.remaining -= 1;
        Some(TimeWindow { start, end })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for DailyWindows {}

/// Collect the windows for `number_of_windows` days before `anchor`
pub fn partition(number_of_windows: i64, anchor: DateTime<Utc>) -> Vec<TimeWindow> {
    DailyWindows::new(number_of_windows, anchor).collect()
}
