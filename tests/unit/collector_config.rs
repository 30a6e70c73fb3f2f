//! Unit tests for run configuration

use usage_report_collector::config::{AppCredentials, CollectorConfig, ConfigError};
use usage_report_collector::scheduler::config::{
    calculate_backoff, DEFAULT_POOL_SIZE, DEFAULT_RATE_LIMIT_PER_SECOND, MAX_BACKOFF_MS,
};

#[test]
fn test_defaults() {
    let config = CollectorConfig::new(30);
    assert_eq!(config.pool_size, DEFAULT_POOL_SIZE);
    assert_eq!(config.rate_limit_per_second, DEFAULT_RATE_LIMIT_PER_SECOND);
    assert_eq!(config.page_size, 100);
    assert_eq!(config.order_by, 2);
    assert!(config.validate().is_ok());
}

#[test]
fn test_validation_errors() {
    assert_eq!(
        CollectorConfig::new(-1).validate(),
        Err(ConfigError::InvalidWindowCount(-1))
    );
    assert_eq!(
        CollectorConfig::new(1).with_pool_size(0).validate(),
        Err(ConfigError::InvalidPoolSize(0))
    );
    assert_eq!(
        CollectorConfig::new(1).with_rate_limit_per_second(0).validate(),
        Err(ConfigError::InvalidRateLimit(0))
    );
    assert_eq!(
        CollectorConfig::new(1).with_page_size(101).validate(),
        Err(ConfigError::InvalidPageSize(101))
    );
    assert!(CollectorConfig::new(0).validate().is_ok());
}

#[test]
fn test_credentials() {
    assert_eq!(
        AppCredentials::new(" ", "secret").unwrap_err(),
        ConfigError::MissingCredential("app_id")
    );
    assert_eq!(
        AppCredentials::new("cli_a", "").unwrap_err(),
        ConfigError::MissingCredential("app_secret")
    );

    let credentials = AppCredentials::new("cli_a", "very-secret").unwrap();
    let debug = format!("{credentials:?}");
    assert!(debug.contains("cli_a"));
    assert!(!debug.contains("very-secret"));
}

#[test]
fn test_backoff_is_capped() {
    assert!(calculate_backoff(1) > calculate_backoff(0));
    assert_eq!(calculate_backoff(30).as_millis() as u64, MAX_BACKOFF_MS);
}
