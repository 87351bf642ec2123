//! Tests for configuration validation and loading

use std::collections::HashMap;
use std::time::Duration;

use prometheus_tryon_render::config::SchedulerConfig;

fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

#[test]
fn test_defaults() {
    let config = SchedulerConfig::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.max_concurrent_renders, 3);
    assert_eq!(config.eviction_grace(), Duration::from_secs(5));
    assert!((config.failure_rate - 0.05).abs() < f64::EPSILON);
    assert!(config.stage_timeout().is_none());
}

#[test]
fn test_invalid_max_concurrent_renders() {
    let config = SchedulerConfig::default().with_max_concurrent_renders(0);
    assert!(config.validate().is_err());
}

#[test]
fn test_invalid_failure_rate() {
    assert!(SchedulerConfig::default().with_failure_rate(1.5).validate().is_err());
    assert!(SchedulerConfig::default().with_failure_rate(-0.1).validate().is_err());
    assert!(SchedulerConfig::default().with_failure_rate(1.0).validate().is_ok());
}

#[test]
fn test_invalid_time_scale_and_timeout() {
    assert!(SchedulerConfig::default().with_time_scale(f64::NAN).validate().is_err());
    assert!(SchedulerConfig::default().with_stage_timeout_ms(Some(0)).validate().is_err());
    assert!(SchedulerConfig::default().with_time_scale(0.0).validate().is_ok());
}

#[test]
fn test_partial_json_keeps_defaults() {
    let config = SchedulerConfig::from_json_str(
        r#"{"max_concurrent_renders": 8, "stage_timeout_ms": 30000}"#,
    )
    .unwrap();
    assert_eq!(config.max_concurrent_renders, 8);
    assert_eq!(config.stage_timeout(), Some(Duration::from_secs(30)));
    assert_eq!(config.eviction_grace_ms, 5_000);
}

#[test]
fn test_json_validation_error() {
    let err = SchedulerConfig::from_json_str(r#"{"event_buffer": 0}"#).unwrap_err();
    assert!(err.contains("event_buffer"), "{err}");
    assert!(SchedulerConfig::from_json_str("{").unwrap_err().starts_with("parse error"));
}

#[test]
fn test_env_lookup_overrides() {
    let config = SchedulerConfig::from_lookup(lookup(&[
        ("TRYON_MAX_CONCURRENT_RENDERS", "5"),
        ("TRYON_FAILURE_RATE", " 0.25 "),
        ("TRYON_TIME_SCALE", "0.01"),
        ("TRYON_STAGE_TIMEOUT_MS", "1500"),
    ]))
    .unwrap();
    assert_eq!(config.max_concurrent_renders, 5);
    assert!((config.failure_rate - 0.25).abs() < f64::EPSILON);
    assert!((config.time_scale - 0.01).abs() < f64::EPSILON);
    assert_eq!(config.stage_timeout_ms, Some(1_500));
    assert_eq!(config.event_buffer, 256);
}

#[test]
fn test_env_lookup_reports_bad_variable() {
    let err = SchedulerConfig::from_lookup(lookup(&[("TRYON_EVICTION_GRACE_MS", "soon")]))
        .unwrap_err();
    assert!(err.contains("TRYON_EVICTION_GRACE_MS"), "{err}");

    let err = SchedulerConfig::from_lookup(lookup(&[("TRYON_STAGE_JITTER", "2.0")])).unwrap_err();
    assert!(err.contains("stage_jitter"), "{err}");
}
