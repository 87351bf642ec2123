//! Benchmarks for the render scheduler.
//!
//! Benchmarks cover:
//! - Dispatch queue operations (push/pop with mixed priorities)
//! - Admission throughput with all slots busy
//! - End-to-end rendering with simulated stages scaled to zero

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use std::sync::Arc;

use prometheus_tryon_render::builders::SchedulerBuilder;
use prometheus_tryon_render::config::SchedulerConfig;
use prometheus_tryon_render::core::{JobId, RenderJob, RenderRequest};
use prometheus_tryon_render::infra::{InMemoryJobQueue, QueueEntry};
use prometheus_tryon_render::util::FixedRandomSource;

use tokio::runtime::Runtime;

// ============================================================================
// Helper Functions
// ============================================================================

fn build_job(i: u64) -> RenderJob {
    let request = RenderRequest::new("bench-avatar", "slim", vec![format!("sku-{}", i % 50)]);
    let request = if i % 3 == 0 { request.batch() } else { request };
    RenderJob::queued(JobId::new(), request, u128::from(i / 4))
}

fn build_request(i: u64) -> RenderRequest {
    RenderRequest::new(
        format!("avatar-{}", i % 10),
        "slim",
        vec![format!("shirt-{i}"), format!("jeans-{i}")],
    )
}

// ============================================================================
// Queue Benchmarks
// ============================================================================

fn bench_queue_push_pop(c: &mut Criterion) {
    let mut group = c.benchmark_group("queue_push_pop");

    for size in [100u64, 1_000, 10_000] {
        let jobs: Vec<_> = (0..size).map(build_job).collect();
        group.throughput(Throughput::Elements(size));
        group.bench_with_input(BenchmarkId::from_parameter(size), &jobs, |b, jobs| {
            b.iter(|| {
                let mut q = InMemoryJobQueue::new();
                for (seq, job) in (0u64..).zip(jobs) {
                    q.push(QueueEntry::for_job(job, seq));
                }
                while let Some(entry) = q.pop() {
                    black_box(entry);
                }
            });
        });
    }
    group.finish();
}

fn bench_queue_remove(c: &mut Criterion) {
    let mut group = c.benchmark_group("queue_remove");

    for size in [100u64, 1_000] {
        let jobs: Vec<_> = (0..size).map(build_job).collect();
        group.bench_with_input(BenchmarkId::from_parameter(size), &jobs, |b, jobs| {
            b.iter(|| {
                let mut q = InMemoryJobQueue::new();
                for (seq, job) in (0u64..).zip(jobs) {
                    q.push(QueueEntry::for_job(job, seq));
                }
                // Cancel every other job.
                for job in jobs.iter().step_by(2) {
                    q.remove(&job.id);
                }
                black_box(q.len());
            });
        });
    }
    group.finish();
}

// ============================================================================
// Scheduler Benchmarks
// ============================================================================

fn bench_submit_saturated(c: &mut Criterion) {
    let rt = Runtime::new().expect("tokio runtime");
    let mut group = c.benchmark_group("submit_saturated");

    for size in [100u64, 1_000] {
        group.throughput(Throughput::Elements(size));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                let _guard = rt.enter();
                // Stages never finish within the iteration, so only admission is measured.
                let scheduler = SchedulerBuilder::new(SchedulerConfig::default())
                    .with_random(Arc::new(FixedRandomSource(0.5)))
                    .build_on_current_runtime()
                    .expect("scheduler");
                for i in 0..size {
                    black_box(scheduler.submit(build_request(i)).expect("submit"));
                }
                black_box(scheduler.queue_depth());
            });
        });
    }
    group.finish();
}

fn bench_render_end_to_end(c: &mut Criterion) {
    let rt = Runtime::new().expect("tokio runtime");
    let mut group = c.benchmark_group("render_end_to_end");
    group.sample_size(20);

    for jobs in [10u64, 50] {
        group.throughput(Throughput::Elements(jobs));
        group.bench_with_input(BenchmarkId::from_parameter(jobs), &jobs, |b, &jobs| {
            b.to_async(&rt).iter(|| async move {
                let config = SchedulerConfig::default()
                    .with_failure_rate(0.0)
                    .with_time_scale(0.0);
                let scheduler = SchedulerBuilder::new(config)
                    .with_random(Arc::new(FixedRandomSource(0.5)))
                    .build_on_current_runtime()
                    .expect("scheduler");
                let mut results = scheduler.subscribe_render_results();
                for i in 0..jobs {
                    scheduler.submit(build_request(i)).expect("submit");
                }
                for _ in 0..jobs {
                    black_box(results.recv().await);
                }
            });
        });
    }
    group.finish();
}

criterion_group!(queue_benches, bench_queue_push_pop, bench_queue_remove);
criterion_group!(scheduler_benches, bench_submit_saturated, bench_render_end_to_end);
criterion_main!(queue_benches, scheduler_benches);
