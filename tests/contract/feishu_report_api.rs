//! Contract tests for the open platform token and report endpoints
//!
//! These run against the real API and need `FEISHU_APP_ID` and
//! `FEISHU_APP_SECRET` in the environment.

use usage_report_collector::config::AppCredentials;
use usage_report_collector::fetcher::{
    CredentialError, CredentialProvider, FeishuHttpClient, RawReportPage, ReportFetcher,
    ReportRequest, TenantTokenProvider,
};
use usage_report_collector::window::partition;

fn live_provider() -> (FeishuHttpClient, TenantTokenProvider) {
    let app_id = std::env::var("FEISHU_APP_ID").expect("FEISHU_APP_ID not set");
    let app_secret = std::env::var("FEISHU_APP_SECRET").expect("FEISHU_APP_SECRET not set");
    let base_url = std::env::var("FEISHU_BASE_URL")
        .unwrap_or_else(|_| usage_report_collector::fetcher::http::DEFAULT_BASE_URL.to_string());

    let http = FeishuHttpClient::new(base_url);
    let credentials = AppCredentials::new(app_id, app_secret).unwrap();
    (http.clone(), TenantTokenProvider::new(http, credentials))
}

/// Token endpoint issues a token and the provider caches it
#[tokio::test]
#[ignore] // Requires network access and credentials
async fn test_tenant_token_is_cached() {
    let (_, provider) = live_provider();

    let first = provider.access_token().await.unwrap();
    let second = provider.access_token().await.unwrap();
    assert!(!first.is_empty());
    assert_eq!(first, second);
}

/// Bad credentials are rejected with an API code, not a transport error
#[tokio::test]
#[ignore] // Requires network access
async fn test_invalid_credentials_rejected() {
    let http = FeishuHttpClient::new(usage_report_collector::fetcher::http::DEFAULT_BASE_URL);
    let provider = TenantTokenProvider::new(
        http,
        AppCredentials::new("cli_invalid", "invalid").unwrap(),
    );

    let result = provider.access_token().await;
    assert!(matches!(result, Err(CredentialError::Rejected { .. })));
}

/// Report endpoint answers with a decodable envelope for yesterday
#[tokio::test]
#[ignore] // Requires network access and credentials
async fn test_top_user_report_schema() {
    let (http, provider) = live_provider();
    let token = provider.access_token().await.unwrap();

    let window = partition(1, chrono::Utc::now())[0];
    let request = ReportRequest::for_window(&window, 100, 2);
    let body = http.fetch(&request, &token).await.unwrap();

    let page = RawReportPage::decode(&body).unwrap();
    assert!(page.is_success(), "API error {}: {}", page.code, page.msg);
    for record in page.into_records(window.start) {
        assert!(record.validate().is_ok());
    }
}
