//! Unit tests for report request building and response decoding

use chrono::{TimeZone, Utc};
use usage_report_collector::fetcher::{RawReportPage, ReportRequest};
use usage_report_collector::window::TimeWindow;

#[test]
fn test_request_for_window() {
    let window = TimeWindow::new(
        Utc.with_ymd_and_hms(2021, 11, 1, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2021, 11, 2, 0, 0, 0).unwrap(),
    )
    .unwrap();

    let request = ReportRequest::for_window(&window, 100, 2);
    assert_eq!(request.start_time, 1635724800);
    assert_eq!(request.end_time, 1635811200);
    assert_eq!(
        request.query_params(),
        vec![
            ("start_time", "1635724800".to_string()),
            ("end_time", "1635811200".to_string()),
            ("limit", "100".to_string()),
            ("order_by", "2".to_string()),
        ]
    );
}

#[test]
fn test_decode_top_user_report() {
    let body = br#"{
        "code": 0,
        "msg": "success",
        "data": {
            "top_user_report": [
                {
                    "id": "ou_3ec3f6a28a0d08c45d895276e8e5e19b",
                    "name": "name",
                    "user_type": 1,
                    "meeting_count": "100",
                    "meeting_duration": "3000",
                    "organized_meeting_count": "20",
                    "department": "dep",
                    "city": "city"
                }
            ]
        }
    }"#;

    let page = RawReportPage::decode(body).unwrap();
    assert!(page.is_success());

    let start = Utc.with_ymd_and_hms(2021, 11, 1, 0, 0, 0).unwrap();
    let records = page.into_records(start);
    assert_eq!(records.len(), 1);

    let record = &records[0];
    assert_eq!(record.start_time, start);
    assert_eq!(record.user_id, "ou_3ec3f6a28a0d08c45d895276e8e5e19b");
    assert_eq!(record.user_type, 1);
    assert_eq!(record.meeting_count, 100);
    assert_eq!(record.meeting_duration_secs, 3000);
    assert_eq!(record.organized_meeting_count, 20);
    assert!(record.validate().is_ok());
}

#[test]
fn test_decode_error_envelope() {
    let page =
        RawReportPage::decode(br#"{"code":99991663,"msg":"Invalid access token"}"#).unwrap();
    assert!(!page.is_success());
    assert_eq!(page.code, 99991663);
    assert!(page.into_records(Utc::now()).is_empty());
}

#[test]
fn test_decode_empty_report() {
    let page = RawReportPage::decode(br#"{"code":0,"msg":"success","data":{}}"#).unwrap();
    assert!(page.is_success());
    assert!(page.into_records(Utc::now()).is_empty());
}

#[test]
fn test_decode_rejects_invalid_json() {
    assert!(RawReportPage::decode(b"not json").is_err());
    assert!(RawReportPage::decode(br#"{"msg":"missing code"}"#).is_err());
}
