//! Tests for tokio spawner utilities and the API handlers

use std::sync::Arc;

use prometheus_tryon_render::builders::SchedulerBuilder;
use prometheus_tryon_render::config::SchedulerConfig;
use prometheus_tryon_render::core::{JobStatus, RenderError, RenderRequest, Spawn};
use prometheus_tryon_render::runtime::api;
use prometheus_tryon_render::runtime::{JobStatusResponse, SubmitBatchRequest, TokioSpawner};
use prometheus_tryon_render::util::FixedRandomSource;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_tokio_spawner_spawn() {
    let spawner = TokioSpawner::new(tokio::runtime::Handle::current());

    let (tx, rx) = tokio::sync::oneshot::channel();
    spawner.spawn(async move {
        tx.send(123).unwrap();
    });

    let result = rx.await.expect("oneshot result");
    assert_eq!(result, 123);
}

#[tokio::test(start_paused = true)]
async fn test_api_submit_status_and_cancel() {
    let scheduler = SchedulerBuilder::new(SchedulerConfig::default().with_max_concurrent_renders(1))
        .with_random(Arc::new(FixedRandomSource(0.5)))
        .build_on_current_runtime()
        .unwrap();

    let created = api::submit_job(
        &scheduler,
        RenderRequest::new("avatar-1", "slim", vec!["a".into(), "b".into()]),
    )
    .unwrap();
    assert_eq!(created.status, JobStatus::Rendering);
    assert_eq!(created.estimated_duration_secs, 6);

    let batch = api::submit_batch(
        &scheduler,
        &SubmitBatchRequest {
            avatar_id: "avatar-1".into(),
            avatar_type: "slim".into(),
            combinations: vec![vec!["c".into()], vec![]],
        },
    );
    assert_eq!(batch.job_ids.len(), 1);
    assert_eq!(batch.skipped, 1);

    let queued = api::job_status(&scheduler, batch.job_ids[0]).unwrap();
    assert_eq!(queued.status, JobStatus::Queued);
    assert!(queued.current_stage.is_none());

    let health = api::health(&scheduler);
    assert!(health.ok);
    assert_eq!((health.active_renders, health.queue_depth), (1, 1));

    assert_eq!(api::cancel_job(&scheduler, batch.job_ids[0]), Ok(true));
    assert_eq!(api::cancel_job(&scheduler, batch.job_ids[0]), Ok(false));
    assert_eq!(api::queue_stats(&scheduler).cancelled, 1);
}

#[tokio::test(start_paused = true)]
async fn test_api_status_serializes_stage_label() {
    let scheduler = SchedulerBuilder::new(SchedulerConfig::default())
        .with_random(Arc::new(FixedRandomSource(0.5)))
        .build_on_current_runtime()
        .unwrap();
    let created = api::submit_job(
        &scheduler,
        RenderRequest::new("avatar-1", "slim", vec!["a".into()]),
    )
    .unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(700)).await;
    let status: JobStatusResponse = api::job_status(&scheduler, created.job_id).unwrap();
    assert_eq!(status.current_stage.as_deref(), Some("Scene Setup"));

    let json = serde_json::to_value(&status).unwrap();
    assert_eq!(json["status"], "rendering");
    assert_eq!(json["progress"], 12.5);

    let unknown = prometheus_tryon_render::core::JobId::new();
    assert_eq!(
        api::job_status(&scheduler, unknown),
        Err(RenderError::NotFound(unknown))
    );
}

#[tokio::test(start_paused = true)]
async fn test_api_result_and_performance_history() {
    let scheduler = SchedulerBuilder::new(
        SchedulerConfig::default()
            .with_max_concurrent_renders(1)
            .with_failure_rate(0.0),
    )
    .with_random(Arc::new(FixedRandomSource(0.5)))
    .build_on_current_runtime()
    .unwrap();
    let mut results = scheduler.subscribe_render_results();

    let done = api::submit_job(&scheduler, RenderRequest::new("avatar-1", "slim", vec!["a".into()]))
        .unwrap()
        .job_id;
    let dropped = api::submit_job(&scheduler, RenderRequest::new("avatar-1", "slim", vec!["b".into()]))
        .unwrap()
        .job_id;
    assert_eq!(api::job_result(&scheduler, done), Err(RenderError::NotFound(done)));
    assert_eq!(api::cancel_job(&scheduler, dropped), Ok(true));

    while results.recv().await.map(|e| e.job_id) != Some(done) {}

    let result = api::job_result(&scheduler, done).unwrap();
    assert_eq!(result.job_id, done);
    assert_eq!(
        api::job_result(&scheduler, dropped),
        Err(RenderError::NotFound(dropped))
    );

    let history = api::performance_history(&scheduler);
    let ids: Vec<_> = history.iter().map(|r| r.job_id).collect();
    assert_eq!(ids, vec![dropped, done]);
    assert_eq!(history[0].status, JobStatus::Cancelled);
    assert!(history[1].success);
}
