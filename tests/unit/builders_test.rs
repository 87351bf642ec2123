//! Tests for builder modules

use std::sync::Arc;

use prometheus_tryon_render::builders::SchedulerBuilder;
use prometheus_tryon_render::config::SchedulerConfig;
use prometheus_tryon_render::core::{DenyListGate, RenderError, RenderRequest};
use prometheus_tryon_render::runtime::TokioSpawner;
use prometheus_tryon_render::util::{FixedRandomSource, ManualClock};

#[tokio::test]
async fn test_builder_rejects_invalid_config() {
    let result = SchedulerBuilder::new(SchedulerConfig::default().with_max_concurrent_renders(0))
        .build_on_current_runtime();
    assert!(matches!(result, Err(RenderError::Config(_))));
}

#[test]
fn test_build_outside_runtime_fails() {
    let result = SchedulerBuilder::new(SchedulerConfig::default()).build_on_current_runtime();
    assert!(matches!(result, Err(RenderError::Config(msg)) if msg.contains("no tokio runtime")));
}

#[tokio::test]
async fn test_builder_wires_collaborators() {
    let clock = Arc::new(ManualClock::new(42_000));
    let scheduler = SchedulerBuilder::new(SchedulerConfig::default().with_max_concurrent_renders(1))
        .with_gate(DenyListGate::new().deny_pair("heels", "kids"))
        .with_clock(clock)
        .with_random(Arc::new(FixedRandomSource(0.5)))
        .build(TokioSpawner::current().unwrap())
        .unwrap();

    let id = scheduler
        .submit(RenderRequest::new("avatar-3", "adult", vec!["heels".into()]))
        .unwrap();
    assert_eq!(scheduler.get_job(id).unwrap().submitted_at_ms, 42_000);
    assert!(scheduler
        .submit(RenderRequest::new("avatar-3", "kids", vec!["heels".into()]))
        .is_err());
    assert_eq!(scheduler.config().max_concurrent_renders, 1);
}

#[tokio::test]
async fn test_build_from_env_with_shared_gate() {
    use prometheus_tryon_render::builders::build_from_env;
    use prometheus_tryon_render::core::{AllowAllGate, CompatibilityGate};

    let gate: Arc<dyn CompatibilityGate> = Arc::new(AllowAllGate);
    let scheduler = build_from_env(gate).unwrap();
    assert!(scheduler.config().validate().is_ok());
    prometheus_tryon_render::util::init_tracing();
}
