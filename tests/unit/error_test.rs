//! Tests for error types

use prometheus_tryon_render::core::{JobId, RenderError};

#[test]
fn test_compatibility_error() {
    let err = RenderError::Compatibility {
        product_id: "gown-2".to_string(),
        avatar_type: "kids".to_string(),
    };
    assert_eq!(
        format!("{}", err),
        "product `gown-2` is not compatible with avatar type `kids`"
    );
}

#[test]
fn test_not_found_error() {
    let id = JobId::new();
    assert_eq!(format!("{}", RenderError::NotFound(id)), format!("job not found: {id}"));
}

#[test]
fn test_pipeline_failure_error() {
    let err = RenderError::PipelineFailure("stage `Final Rendering` failed: oom".to_string());
    assert_eq!(
        format!("{}", err),
        "pipeline failure: stage `Final Rendering` failed: oom"
    );
}

#[test]
fn test_config_error_into_anyhow() {
    let err: anyhow::Error = RenderError::Config("event_buffer must be greater than 0".into()).into();
    assert!(err.to_string().starts_with("invalid configuration"));
    assert!(err.downcast_ref::<RenderError>().is_some());
}
