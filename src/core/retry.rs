//! Bounded retry with exponential backoff, layered above the scheduler.
//!
//! The scheduler never restarts a job in place. A retry is a brand new job
//! with the same payload and a fresh id.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::events::{EventSubscription, RenderCompleted};
use crate::core::job::{JobId, JobStatus, RenderRequest};
use crate::core::scheduler::{RenderScheduler, Spawn};
use crate::core::RenderError;

/// Retry behavior for failed renders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts including the first submission.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles for each later one.
    pub base_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
        }
    }
}

impl RetryPolicy {
    /// Delay after the `attempt`-th failure: `base * 2^(attempt - 1)`.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
        Duration::from_millis(self.base_delay_ms.saturating_mul(factor))
    }
}

/// Final state of a retried submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryOutcome {
    /// Id of the last job submitted.
    pub job_id: JobId,
    /// Number of jobs submitted.
    pub attempts: u32,
    /// Terminal status of the last job.
    pub status: JobStatus,
    /// Failure reason of the last job, if it failed.
    pub error_message: Option<String>,
}

/// Submit `request` and resubmit it as a new job after each failure, until
/// it completes, is cancelled, or `policy.max_attempts` is reached.
///
/// # Errors
///
/// Submission errors are returned unchanged and never retried. If the event
/// feed closes while waiting, a [`RenderError::PipelineFailure`] is returned.
pub async fn submit_with_retry<S>(
    scheduler: &RenderScheduler<S>,
    request: RenderRequest,
    policy: &RetryPolicy,
) -> Result<RetryOutcome, RenderError>
where
    S: Spawn + Clone + Send + Sync + 'static,
{
    let mut results = scheduler.subscribe_render_results();
    let mut attempts = 1;
    let mut job_id = scheduler.submit(request.clone())?;

    loop {
        let event = wait_for_terminal(scheduler, &mut results, job_id)
            .await
            .ok_or_else(|| RenderError::PipelineFailure("render event feed closed".into()))?;

        if event.status != JobStatus::Failed || attempts >= policy.max_attempts.max(1) {
            return Ok(RetryOutcome {
                job_id,
                attempts,
                status: event.status,
                error_message: event.error_message,
            });
        }

        let delay = policy.delay_for_attempt(attempts);
        tracing::warn!(
            job_id = %job_id,
            attempts,
            ?delay,
            error = event.error_message.as_deref().unwrap_or_default(),
            "render failed, retrying as a new job"
        );
        tokio::time::sleep(delay).await;
        attempts += 1;
        job_id = scheduler.submit(request.clone())?;
    }
}

async fn wait_for_terminal<S>(
    scheduler: &RenderScheduler<S>,
    results: &mut EventSubscription<RenderCompleted>,
    job_id: JobId,
) -> Option<RenderCompleted>
where
    S: Spawn + Clone + Send + Sync + 'static,
{
    loop {
        let missed = results.missed();
        let event = results.recv().await?;
        if event.job_id == job_id {
            return Some(event);
        }
        // Our event may have been dropped while lagging.
        if results.missed() != missed {
            if let Some(settled) = settled_outcome(scheduler, job_id) {
                return Some(settled);
            }
        }
    }
}

/// Terminal outcome of `job_id` rebuilt from scheduler state, if it has one.
///
/// The job store is checked first. Once the job has been evicted, its
/// performance record is used instead; that path cannot recover the error
/// message.
fn settled_outcome<S>(scheduler: &RenderScheduler<S>, job_id: JobId) -> Option<RenderCompleted>
where
    S: Spawn + Clone + Send + Sync + 'static,
{
    match scheduler.get_job(job_id) {
        Ok(job) if job.status.is_terminal() => Some(RenderCompleted {
            job_id,
            status: job.status,
            result_ref: job.result_ref,
            error_message: job.error_message,
            completed_at_ms: job.completed_at_ms.unwrap_or_default(),
        }),
        Ok(_) => None,
        Err(_) => {
            let record = scheduler.get_performance_history().remove(&job_id)?;
            Some(RenderCompleted {
                job_id,
                status: record.status,
                result_ref: scheduler.get_result(job_id).ok().map(|r| r.id),
                error_message: None,
                completed_at_ms: record.recorded_at_ms,
            })
        }
    }
}
