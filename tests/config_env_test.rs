//! Integration tests for loading configuration from the environment.

use std::time::Duration;

use mechanic_scraper::config::{Config, ConfigError, StorageBackend};
use serial_test::serial;

const VARS: &[&str] = &[
    "FORUM_LISTING_URL",
    "LISTING_FIRST_PAGE",
    "LISTING_LAST_PAGE",
    "LISTING_CONCURRENCY",
    "DISCUSSION_CONCURRENCY",
    "UNIT_TIMEOUT_SECS",
    "DISCUSSION_DELAY_MS",
    "COMMENT_PAGE_DELAY_MS",
    "STORAGE_BACKEND",
    "CORPUS_KEY",
    "S3_BUCKET",
    "CONTEXT_WINDOW",
];

fn clear_env() {
    for var in VARS {
        std::env::remove_var(var);
    }
}

#[test]
#[serial]
fn test_defaults_match_production_crawl() {
    clear_env();

    let config = Config::from_env().expect("Defaults should load");

    assert_eq!(
        config.listing_url,
        "https://forums.edmunds.com/discussions/tagged/x/repairs-maintenance/"
    );
    assert_eq!(config.listing_pages(), 1..=419);
    assert_eq!(config.listing_concurrency, 20);
    assert_eq!(config.discussion_concurrency, 400);
    assert_eq!(config.unit_timeout, Duration::from_secs(86_400));
    assert_eq!(config.discussion_delay, Duration::from_secs(7));
    assert_eq!(config.comment_page_delay, Duration::from_secs(5));
    assert_eq!(config.storage_backend, StorageBackend::Local);
    assert_eq!(config.corpus_key, "mechanic-forums/edmunds_forum.json");
    assert_eq!(config.context_window, 50);
    config.validate().expect("Defaults should be valid");
}

#[test]
#[serial]
fn test_overrides_are_applied() {
    clear_env();
    std::env::set_var("FORUM_LISTING_URL", "https://forum.example.com/discussions");
    std::env::set_var("LISTING_FIRST_PAGE", "3");
    std::env::set_var("LISTING_LAST_PAGE", "5");
    std::env::set_var("DISCUSSION_DELAY_MS", "0");
    std::env::set_var("STORAGE_BACKEND", "s3");
    std::env::set_var("S3_BUCKET", "corpora");

    let config = Config::from_env().expect("Overrides should load");
    clear_env();

    assert_eq!(config.listing_pages(), 3..=5);
    assert_eq!(
        config.listing_page_url(4),
        "https://forum.example.com/discussions/p4"
    );
    assert!(config.discussion_delay.is_zero());
    assert_eq!(config.storage_backend, StorageBackend::S3);
    assert_eq!(config.s3_bucket.as_deref(), Some("corpora"));
    config.validate().expect("Overrides should be valid");
}

#[test]
#[serial]
fn test_malformed_number_is_rejected() {
    clear_env();
    std::env::set_var("LISTING_CONCURRENCY", "twenty");

    let result = Config::from_env();
    clear_env();

    assert!(matches!(result, Err(ConfigError::ParseInt { ref name, .. }) if name == "LISTING_CONCURRENCY"));
}

#[test]
#[serial]
fn test_s3_backend_without_bucket_fails_validation() {
    clear_env();
    std::env::set_var("STORAGE_BACKEND", "s3");

    let config = Config::from_env().expect("Backend should parse");
    clear_env();

    assert!(matches!(
        config.validate(),
        Err(ConfigError::MissingEnvVar(ref name)) if name == "S3_BUCKET"
    ));
}
