//! Tests for configuration validation and loading

use std::collections::HashMap;
use std::time::Duration;

use txn_engine::config::{EngineConfig, ENV_PREFIX};

fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (format!("{ENV_PREFIX}{k}"), (*v).to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

#[test]
fn test_defaults_match_reference_deployment() {
    let cfg = EngineConfig::default();
    assert_eq!(cfg.main_workers, 5);
    assert_eq!(cfg.retry_workers, 2);
    assert_eq!(cfg.max_retry, 3);
    assert_eq!(cfg.retry_delay(), Duration::from_millis(5000));
    assert_eq!(cfg.shutdown_grace(), Duration::from_millis(2000));
    assert!(cfg.validate().is_ok());
}

#[test]
fn test_zero_main_workers_rejected() {
    let cfg = EngineConfig::new().with_main_workers(0);
    assert!(cfg.validate().is_err());
}

#[test]
fn test_zero_retry_workers_needs_zero_retries() {
    assert!(EngineConfig::new().with_retry_workers(0).validate().is_err());
    assert!(EngineConfig::new()
        .with_retry_workers(0)
        .with_max_retry(0)
        .validate()
        .is_ok());
}

#[test]
fn test_tiny_stack_rejected() {
    let cfg = EngineConfig::new().with_thread_stack_size(4096);
    assert!(cfg.validate().is_err());
}

#[test]
fn test_json_partial_uses_defaults() {
    let cfg = EngineConfig::from_json_str(r#"{"main_workers": 8, "retry_delay_ms": 250}"#).unwrap();
    assert_eq!(cfg.main_workers, 8);
    assert_eq!(cfg.retry_delay_ms, 250);
    assert_eq!(cfg.retry_workers, 2);
}

#[test]
fn test_json_invalid_values_rejected() {
    let err = EngineConfig::from_json_str(r#"{"main_workers": 0}"#).unwrap_err();
    assert!(err.contains("main_workers"));
    assert!(EngineConfig::from_json_str("not json").is_err());
}

#[test]
fn test_lookup_overrides() {
    let cfg =
        EngineConfig::from_lookup(lookup(&[("MAX_RETRY", "5"), ("RETRY_WORKERS", " 3 ")])).unwrap();
    assert_eq!(cfg.max_retry, 5);
    assert_eq!(cfg.retry_workers, 3);
    assert_eq!(cfg.main_workers, 5);
}

#[test]
fn test_lookup_bad_number_names_variable() {
    let err = EngineConfig::from_lookup(lookup(&[("MAIN_WORKERS", "many")])).unwrap_err();
    assert!(err.contains("TXN_ENGINE_MAIN_WORKERS"));
}
