//! Render scheduler: admission, dispatch, cancellation, and bookkeeping.
//!
//! Jobs are admitted by [`RenderScheduler::submit`], wait in a priority/FIFO
//! queue, and are dispatched while fewer than `max_concurrent_renders` render
//! slots are held. Slot accounting is a lock-free `AtomicU32` reserved with a
//! CAS loop, so concurrent dispatch passes can never overshoot the cap. Each
//! dispatched job runs on its own spawned task; when it finishes, the slot is
//! released and another dispatch pass backfills it.
//!
//! Lock order is queue, then jobs, then metrics. No lock is held across an
//! await point.

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use futures::FutureExt;
use parking_lot::Mutex;

use crate::config::SchedulerConfig;
use crate::core::compat::CompatibilityGate;
use crate::core::events::{EventNotifier, EventSubscription, JobUpdated, RenderCompleted};
use crate::core::job::{JobId, JobStatus, JobView, RenderJob, RenderRequest};
use crate::core::metrics::{MetricsStore, PerformanceRecord, QueueStats, RenderResult};
use crate::core::pipeline::{PipelineExecutor, PipelineObserver, RunOutcome, Stage};
use crate::core::RenderError;
use crate::infra::{InMemoryJobQueue, InMemoryJobStore, QueueEntry};
use crate::util::Clock;

/// Abstraction for spawning pipeline runs and timers on a runtime.
pub trait Spawn {
    /// Spawn a detached task.
    fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static;
}

/// Handle to the scheduler. Cheap to clone; all clones share state.
pub struct RenderScheduler<S> {
    inner: Arc<SchedulerInner<S>>,
}

impl<S> Clone for RenderScheduler<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct SchedulerInner<S> {
    config: SchedulerConfig,
    /// Render slots held by running pipelines.
    active_renders: AtomicU32,
    next_seq: AtomicU64,
    queue: Mutex<InMemoryJobQueue>,
    jobs: Mutex<InMemoryJobStore>,
    metrics: Mutex<MetricsStore>,
    notifier: EventNotifier,
    gate: Arc<dyn CompatibilityGate>,
    clock: Arc<dyn Clock>,
    pipeline: PipelineExecutor,
    spawner: S,
}

impl<S> RenderScheduler<S>
where
    S: Spawn + Clone + Send + Sync + 'static,
{
    /// Assemble a scheduler from already-built parts. Prefer
    /// [`crate::builders::SchedulerBuilder`], which validates the config.
    #[must_use]
    pub fn new(
        config: SchedulerConfig,
        gate: Arc<dyn CompatibilityGate>,
        clock: Arc<dyn Clock>,
        pipeline: PipelineExecutor,
        spawner: S,
    ) -> Self {
        let notifier = EventNotifier::new(config.event_buffer);
        Self {
            inner: Arc::new(SchedulerInner {
                config,
                active_renders: AtomicU32::new(0),
                next_seq: AtomicU64::new(0),
                queue: Mutex::new(InMemoryJobQueue::new()),
                jobs: Mutex::new(InMemoryJobStore::new()),
                metrics: Mutex::new(MetricsStore::new()),
                notifier,
                gate,
                clock,
                pipeline,
                spawner,
            }),
        }
    }

    /// Validate, check compatibility, and enqueue a render job.
    ///
    /// Returns as soon as the job is queued; rendering happens in the
    /// background.
    ///
    /// # Errors
    ///
    /// [`RenderError::InvalidRequest`] for malformed requests and
    /// [`RenderError::Compatibility`] if any product is rejected for the
    /// avatar type. Neither creates a job.
    pub fn submit(&self, request: RenderRequest) -> Result<JobId, RenderError> {
        request.validate()?;
        if let Some(product_id) = request
            .product_ids
            .iter()
            .find(|p| !self.inner.gate.is_compatible(p, &request.avatar_type))
        {
            tracing::warn!(
                product_id = %product_id,
                avatar_type = %request.avatar_type,
                "submission rejected: incompatible product"
            );
            return Err(RenderError::Compatibility {
                product_id: product_id.clone(),
                avatar_type: request.avatar_type.clone(),
            });
        }

        let job_id = JobId::new();
        let job = RenderJob::queued(job_id, request, self.inner.clock.now_ms());
        let seq = self.inner.next_seq.fetch_add(1, Ordering::AcqRel);
        {
            let mut queue = self.inner.queue.lock();
            let mut jobs = self.inner.jobs.lock();
            queue.push(QueueEntry::for_job(&job, seq));
            jobs.insert(job.clone());
        }
        tracing::info!(
            job_id = %job_id,
            priority = job.priority,
            items = job.item_count(),
            estimated_secs = job.estimated_duration_secs,
            "render job queued"
        );

        self.inner.notifier.job_updated(job);
        self.inner.dispatch();
        Ok(job_id)
    }

    /// Submit one batch job per non-empty combination.
    ///
    /// Failures are isolated: a rejected combination is logged and skipped,
    /// and already-submitted jobs are kept. Returns the ids that were queued.
    pub fn submit_batch(
        &self,
        avatar_id: &str,
        avatar_type: &str,
        combinations: &[Vec<String>],
    ) -> Vec<JobId> {
        let mut job_ids = Vec::with_capacity(combinations.len());
        for (index, products) in combinations.iter().enumerate() {
            if products.is_empty() {
                tracing::debug!(index, "skipping empty batch combination");
                continue;
            }
            let request = RenderRequest::new(avatar_id, avatar_type, products.clone()).batch();
            match self.submit(request) {
                Ok(job_id) => job_ids.push(job_id),
                Err(err) => tracing::warn!(index, error = %err, "batch combination skipped"),
            }
        }
        tracing::info!(
            submitted = job_ids.len(),
            requested = combinations.len(),
            "batch submitted"
        );
        job_ids
    }

    /// Submit a new job with the same payload as `job_id`. The new job gets
    /// a fresh id; the original is left untouched.
    ///
    /// # Errors
    ///
    /// [`RenderError::NotFound`] if the source job was evicted or never
    /// existed, otherwise the same errors as [`RenderScheduler::submit`].
    pub fn resubmit(&self, job_id: JobId) -> Result<JobId, RenderError> {
        let source = self.get_job(job_id)?;
        let new_id = self.submit(source.to_request())?;
        tracing::info!(source = %job_id, job_id = %new_id, "job resubmitted");
        Ok(new_id)
    }

    /// Start queued jobs while render slots are free.
    pub fn dispatch(&self) {
        self.inner.dispatch();
    }

    /// Cancel a job. Returns false if it is unknown or already terminal.
    ///
    /// A queued job is withdrawn immediately. A rendering job is marked
    /// cancelled at once, but its pipeline only stops, and its slot is only
    /// freed, at the next stage boundary.
    pub fn cancel(&self, job_id: JobId) -> bool {
        self.inner.cancel(job_id)
    }

    /// Snapshot of a job still in the job store.
    ///
    /// # Errors
    ///
    /// [`RenderError::NotFound`] for unknown or evicted jobs.
    pub fn get_job(&self, job_id: JobId) -> Result<JobView, RenderError> {
        self.inner
            .jobs
            .lock()
            .get(&job_id)
            .ok_or(RenderError::NotFound(job_id))
    }

    /// Stored result of a completed job.
    ///
    /// # Errors
    ///
    /// [`RenderError::NotFound`] unless the job completed successfully.
    pub fn get_result(&self, job_id: JobId) -> Result<Arc<RenderResult>, RenderError> {
        self.inner
            .metrics
            .lock()
            .result(&job_id)
            .ok_or(RenderError::NotFound(job_id))
    }

    /// Aggregate counts, average render time, and success rate.
    #[must_use]
    pub fn get_queue_stats(&self) -> QueueStats {
        let counts = self.inner.jobs.lock().counts();
        let active = self.inner.active_renders.load(Ordering::Acquire);
        self.inner.metrics.lock().queue_stats(counts, active)
    }

    /// Every performance record written so far.
    #[must_use]
    pub fn get_performance_history(&self) -> HashMap<JobId, PerformanceRecord> {
        self.inner.metrics.lock().performance_history()
    }

    /// Attach to job-update events from now on.
    #[must_use]
    pub fn subscribe_job_updates(&self) -> EventSubscription<JobUpdated> {
        self.inner.notifier.subscribe_job_updates()
    }

    /// Attach to terminal-outcome events from now on.
    #[must_use]
    pub fn subscribe_render_results(&self) -> EventSubscription<RenderCompleted> {
        self.inner.notifier.subscribe_render_results()
    }

    /// Render slots currently held.
    #[must_use]
    pub fn active_renders(&self) -> u32 {
        self.inner.active_renders.load(Ordering::Acquire)
    }

    /// Jobs waiting for a slot.
    #[must_use]
    pub fn queue_depth(&self) -> usize {
        self.inner.queue.lock().len()
    }

    /// Effective configuration.
    #[must_use]
    pub fn config(&self) -> &SchedulerConfig {
        &self.inner.config
    }
}

impl<S> SchedulerInner<S>
where
    S: Spawn + Clone + Send + Sync + 'static,
{
    /// Try to reserve a render slot atomically using a CAS loop.
    fn try_reserve_slot(&self) -> bool {
        let max = self.config.max_concurrent_renders;
        let mut current = self.active_renders.load(Ordering::Acquire);
        loop {
            if current >= max {
                return false;
            }
            match self.active_renders.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    fn release_slot(&self) {
        let previous = self.active_renders.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(previous > 0, "render slot released twice");
        tracing::debug!(active = previous - 1, "released render slot");
    }

    fn dispatch(self: &Arc<Self>) {
        loop {
            if !self.try_reserve_slot() {
                tracing::debug!("all render slots busy");
                return;
            }

            // Pop and transition under the queue lock so start order is pop order.
            let started = {
                let mut queue = self.queue.lock();
                let mut jobs = self.jobs.lock();
                let mut started = None;
                while let Some(entry) = queue.pop() {
                    let now = self.clock.now_ms();
                    let snapshot = jobs
                        .update(&entry.job_id, |job| job.start(now).then(|| job.clone()))
                        .flatten();
                    if snapshot.is_some() {
                        started = snapshot;
                        break;
                    }
                }
                started
            };

            let Some(job) = started else {
                self.release_slot();
                tracing::debug!("queue empty, nothing to dispatch");
                return;
            };

            tracing::info!(
                job_id = %job.id,
                active = self.active_renders.load(Ordering::Acquire),
                "render started"
            );
            self.notifier.job_updated(job.clone());
            self.spawn_run(job);
        }
    }

    fn spawn_run(self: &Arc<Self>, job: RenderJob) {
        let inner = Arc::clone(self);
        self.spawner.spawn(async move {
            let job_id = job.id;
            // A panicking stage must still fail the job and free its slot.
            let outcome = AssertUnwindSafe(inner.pipeline.run(job, &*inner))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| {
                    let message = panic_message(panic.as_ref());
                    tracing::error!(job_id = %job_id, "pipeline panicked: {message}");
                    RunOutcome::Failed(RenderError::PipelineFailure(format!(
                        "pipeline panicked: {message}"
                    )))
                });
            inner.on_run_finished(job_id, outcome);
        });
    }

    fn on_run_finished(self: &Arc<Self>, job_id: JobId, outcome: RunOutcome) {
        let now = self.clock.now_ms();
        let finished = {
            let mut jobs = self.jobs.lock();
            jobs.update(&job_id, |job| {
                let transitioned = match outcome {
                    RunOutcome::Completed(result) if job.status == JobStatus::Rendering => {
                        job.advance(Stage::PostProcessing, 100.0);
                        job.result_ref = Some(result.id);
                        job.finish(JobStatus::Completed, now);
                        self.metrics.lock().insert_result(result);
                        true
                    }
                    RunOutcome::Failed(err) if job.status == JobStatus::Rendering => {
                        job.error_message = Some(err.to_string());
                        job.finish(JobStatus::Failed, now)
                    }
                    RunOutcome::Cancelled if job.status == JobStatus::Rendering => {
                        job.finish(JobStatus::Cancelled, now)
                    }
                    _ => false,
                };
                self.metrics
                    .lock()
                    .upsert_record(PerformanceRecord::for_job(job, now));
                (job.clone(), transitioned)
            })
        };

        match finished {
            Some((job, transitioned)) => {
                match job.status {
                    JobStatus::Completed => tracing::info!(job_id = %job_id, "render completed"),
                    JobStatus::Failed => tracing::warn!(
                        job_id = %job_id,
                        error = job.error_message.as_deref().unwrap_or_default(),
                        "render failed"
                    ),
                    status => tracing::info!(job_id = %job_id, %status, "render run stopped"),
                }
                if transitioned {
                    self.notifier.job_updated(job.clone());
                }
                self.publish_terminal(&job);
                self.schedule_eviction(job_id);
            }
            None => tracing::warn!(job_id = %job_id, "finished job missing from store"),
        }

        self.release_slot();
        self.dispatch();
    }

    fn cancel(self: &Arc<Self>, job_id: JobId) -> bool {
        let now = self.clock.now_ms();
        let cancelled = {
            let mut queue = self.queue.lock();
            let mut jobs = self.jobs.lock();
            let cancelled = jobs
                .update(&job_id, |job| {
                    let was_queued = job.status == JobStatus::Queued;
                    job.finish(JobStatus::Cancelled, now)
                        .then(|| (job.clone(), was_queued))
                })
                .flatten();
            if let Some((job, true)) = &cancelled {
                queue.remove(&job_id);
                self.metrics
                    .lock()
                    .upsert_record(PerformanceRecord::for_job(job, now));
            }
            cancelled
        };

        let Some((job, was_queued)) = cancelled else {
            tracing::debug!(job_id = %job_id, "cancel ignored: unknown or terminal job");
            return false;
        };

        tracing::info!(job_id = %job_id, was_queued, "job cancelled");
        self.notifier.job_updated(job.clone());
        // A rendering job is finalized when its pipeline stops.
        if was_queued {
            self.publish_terminal(&job);
            self.schedule_eviction(job_id);
        }
        true
    }

    fn publish_terminal(&self, job: &RenderJob) {
        self.notifier.render_completed(RenderCompleted {
            job_id: job.id,
            status: job.status,
            result_ref: job.result_ref,
            error_message: job.error_message.clone(),
            completed_at_ms: job.completed_at_ms.unwrap_or_default(),
        });
    }

    fn schedule_eviction(self: &Arc<Self>, job_id: JobId) {
        let grace = self.config.eviction_grace();
        let inner: Weak<Self> = Arc::downgrade(self);
        self.spawner.spawn(async move {
            tokio::time::sleep(grace).await;
            let Some(inner) = inner.upgrade() else {
                return;
            };
            let mut jobs = inner.jobs.lock();
            if jobs.update(&job_id, |job| job.status.is_terminal()) == Some(true) {
                jobs.remove(&job_id);
                tracing::debug!(job_id = %job_id, "evicted terminal job");
            }
        });
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

impl<S> PipelineObserver for SchedulerInner<S>
where
    S: Send + Sync,
{
    fn is_rendering(&self, job_id: JobId) -> bool {
        self.jobs
            .lock()
            .update(&job_id, |job| job.status == JobStatus::Rendering)
            .unwrap_or(false)
    }

    fn stage_finished(&self, job_id: JobId, stage: Stage, progress: f64) -> bool {
        let snapshot = self
            .jobs
            .lock()
            .update(&job_id, |job| job.advance(stage, progress).then(|| job.clone()))
            .flatten();
        match snapshot {
            Some(job) => {
                tracing::debug!(job_id = %job_id, %stage, progress, "stage finished");
                self.notifier.job_updated(job);
                true
            }
            None => false,
        }
    }
}
