//! Unit tests for daily window partitioning

use chrono::{Duration, TimeZone, Utc};
use usage_report_collector::window::{partition, truncate_to_day, DailyWindows};

#[test]
fn test_windows_are_contiguous_day_long_and_descending() {
    let anchor = Utc.with_ymd_and_hms(2024, 3, 2, 18, 5, 0).unwrap();
    let windows = partition(30, anchor);

    assert_eq!(windows.len(), 30);
    assert_eq!(windows[0].end, truncate_to_day(anchor));
    for window in &windows {
        assert_eq!(window.duration(), Duration::days(1));
        assert!(window.start < window.end);
    }
    for pair in windows.windows(2) {
        assert_eq!(pair[1].end, pair[0].start, "windows must be contiguous");
        assert!(pair[1].start < pair[0].start, "windows must descend");
    }
}

#[test]
fn test_crosses_month_and_leap_day() {
    let anchor = Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap();
    let starts: Vec<String> = partition(3, anchor)
        .iter()
        .map(|w| w.start.format("%Y-%m-%d").to_string())
        .collect();
    assert_eq!(starts, vec!["2024-03-01", "2024-02-29", "2024-02-28"]);
}

#[test]
fn test_same_calendar_day_is_idempotent() {
    let morning = Utc.with_ymd_and_hms(2024, 7, 4, 0, 0, 1).unwrap();
    let night = Utc.with_ymd_and_hms(2024, 7, 4, 23, 59, 59).unwrap();
    assert_eq!(partition(7, morning), partition(7, night));
}

#[test]
fn test_exact_size_iterator() {
    let anchor = Utc.with_ymd_and_hms(2024, 7, 4, 12, 0, 0).unwrap();
    let mut windows = DailyWindows::new(4, anchor);
    assert_eq!(windows.len(), 4);
    windows.next();
    assert_eq!(windows.len(), 3);
    assert_eq!(DailyWindows::new(0, anchor).len(), 0);
    assert_eq!(DailyWindows::new(-3, anchor).len(), 0);
}

#[test]
fn test_window_contains_half_open() {
    let anchor = Utc.with_ymd_and_hms(2024, 7, 4, 12, 0, 0).unwrap();
    let window = partition(1, anchor)[0];
    assert!(window.contains(window.start));
    assert!(!window.contains(window.end));
    assert_eq!(window.to_string(), "[2024-07-03, 2024-07-04)");
}
