//! Integration tests for configuration loader
//!
//! Tests the end-to-end behavior of loading configuration from files.

use std::io::Write;

use backstop_domain::{Environment, ErrorKind, JitterMode};
use backstop_infra::config;
use tempfile::NamedTempFile;

#[test]
fn test_load_config_from_json_file() {
    let json_content = r#"{
        "base_url": "https://api.example.com/v1",
        "timeout_ms": 2500,
        "retry": {
            "max_retries": 5,
            "base_delay_ms": 250,
            "retryable_kinds": ["NETWORK_ERROR", "INTERNAL_SERVER"],
            "jitter": "decorrelated"
        },
        "session": { "refresh_token_endpoint": "/session/renew" },
        "offline": { "max_queue_age_ms": 60000 }
    }"#;

    let mut temp_file = NamedTempFile::new().expect("Failed to create temp file");
    temp_file.write_all(json_content.as_bytes()).expect("Failed to write to temp file");

    let path = temp_file.path().with_extension("json");
    std::fs::copy(temp_file.path(), &path).expect("Failed to copy file");

    let config = config::load_from_file(Some(path.clone())).expect("JSON config should load");

    assert_eq!(config.base_url, "https://api.example.com/v1");
    assert_eq!(config.timeout_ms, 2500);
    assert_eq!(config.retry.max_retries, 5);
    assert_eq!(config.retry.base_delay_ms, 250);
    assert_eq!(config.retry.jitter, JitterMode::Decorrelated);
    assert!(config.retry.retryable_kinds.contains(&ErrorKind::NetworkError));
    assert!(!config.retry.retryable_kinds.contains(&ErrorKind::Timeout));
    assert_eq!(config.session.refresh_token_endpoint, "/session/renew");
    assert_eq!(config.offline.max_queue_age_ms, 60_000);

    std::fs::remove_file(path).ok();
}

#[test]
fn test_load_config_from_toml_file() {
    let toml_content = r#"
base_url = "https://api.example.com"
identity_header = "X-Account-Id"

[probe]
health_path = "/health"
interval_ms = 5000

[logging]
environment = "production"
level = "warn"
remote_endpoint = "https://logs.example.com/errors"
"#;

    let mut temp_file = NamedTempFile::new().expect("Failed to create temp file");
    temp_file.write_all(toml_content.as_bytes()).expect("Failed to write to temp file");

    let path = temp_file.path().with_extension("toml");
    std::fs::copy(temp_file.path(), &path).expect("Failed to copy file");

    let config = config::load_from_file(Some(path.clone())).expect("TOML config should load");

    assert_eq!(config.identity_header, "X-Account-Id");
    assert_eq!(config.probe.health_path.as_deref(), Some("/health"));
    assert_eq!(config.probe.interval_ms, 5000);
    assert_eq!(config.logging.environment, Environment::Production);
    assert_eq!(config.logging.remote_endpoint.as_deref(), Some("https://logs.example.com/errors"));
    // untouched sections keep their defaults
    assert_eq!(config.retry.max_retries, 3);

    std::fs::remove_file(path).ok();
}

#[test]
fn test_load_config_invalid_json() {
    let mut temp_file = NamedTempFile::new().expect("Failed to create temp file");
    temp_file.write_all(b"{ invalid json }").expect("Failed to write to temp file");

    let path = temp_file.path().with_extension("json");
    std::fs::copy(temp_file.path(), &path).expect("Failed to copy file");

    assert!(config::load_from_file(Some(path.clone())).is_err(), "Invalid JSON should fail to load");

    std::fs::remove_file(path).ok();
}

#[test]
fn test_load_config_rejects_invalid_values() {
    let mut temp_file = NamedTempFile::new().expect("Failed to create temp file");
    temp_file
        .write_all(br#"{"base_url": "https://api.example.com", "retry": {"max_retries": 99}}"#)
        .expect("Failed to write to temp file");

    let path = temp_file.path().with_extension("json");
    std::fs::copy(temp_file.path(), &path).expect("Failed to copy file");

    assert!(config::load_from_file(Some(path.clone())).is_err());

    std::fs::remove_file(path).ok();
}
