//! API-facing request/response models and thin handlers over the scheduler.
//!
//! These map one-to-one onto an HTTP surface (`POST /jobs`,
//! `POST /jobs/batch`, `GET /jobs/{id}`, `GET /jobs/{id}/result`,
//! `DELETE /jobs/{id}`, `GET /stats`, `GET /performance`, `GET /health`)
//! without binding a web framework.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::{
    JobId, JobStatus, PerformanceRecord, QueueStats, RenderError, RenderJob, RenderRequest,
    RenderResult, RenderScheduler, ResultId, Spawn,
};

/// Batch submission payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitBatchRequest {
    /// Avatar reference.
    pub avatar_id: String,
    /// Avatar body type.
    pub avatar_type: String,
    /// One product list per job.
    pub combinations: Vec<Vec<String>>,
}

/// Response returned right after a job is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobCreatedResponse {
    /// Job identifier.
    pub job_id: JobId,
    /// Status at the time of the response.
    pub status: JobStatus,
    /// Estimated render time in seconds.
    pub estimated_duration_secs: u32,
    /// Submission time (ms since epoch).
    pub submitted_at_ms: u128,
}

/// Batch submission response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSubmitResponse {
    /// Ids of the jobs that were queued.
    pub job_ids: Vec<JobId>,
    /// Combinations that were empty or rejected.
    pub skipped: usize,
}

/// Job status response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatusResponse {
    /// Job identifier.
    pub job_id: JobId,
    /// Current status.
    pub status: JobStatus,
    /// Percent complete.
    pub progress: f64,
    /// Label of the last finished stage.
    pub current_stage: Option<String>,
    /// Failure reason.
    pub error_message: Option<String>,
    /// Stored result, once completed.
    pub result_ref: Option<ResultId>,
    /// Submission time (ms since epoch).
    pub submitted_at_ms: u128,
    /// Render start time.
    pub started_at_ms: Option<u128>,
    /// Terminal time.
    pub completed_at_ms: Option<u128>,
}

impl From<&RenderJob> for JobStatusResponse {
    fn from(job: &RenderJob) -> Self {
        Self {
            job_id: job.id,
            status: job.status,
            progress: job.progress,
            current_stage: job.current_stage.map(|s| s.label().to_owned()),
            error_message: job.error_message.clone(),
            result_ref: job.result_ref,
            submitted_at_ms: job.submitted_at_ms,
            started_at_ms: job.started_at_ms,
            completed_at_ms: job.completed_at_ms,
        }
    }
}

/// Health response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Health {
    /// Healthy flag.
    pub ok: bool,
    /// Render slots held.
    pub active_renders: u32,
    /// Configured slot limit.
    pub max_concurrent_renders: u32,
    /// Jobs waiting for a slot.
    pub queue_depth: usize,
}

/// Handle `POST /jobs`.
///
/// # Errors
///
/// Validation and compatibility errors from [`RenderScheduler::submit`].
pub fn submit_job<S>(
    scheduler: &RenderScheduler<S>,
    request: RenderRequest,
) -> Result<JobCreatedResponse, RenderError>
where
    S: Spawn + Clone + Send + Sync + 'static,
{
    let job_id = scheduler.submit(request)?;
    let job = scheduler.get_job(job_id)?;
    Ok(JobCreatedResponse {
        job_id,
        status: job.status,
        estimated_duration_secs: job.estimated_duration_secs,
        submitted_at_ms: job.submitted_at_ms,
    })
}

/// Handle `POST /jobs/batch`.
pub fn submit_batch<S>(scheduler: &RenderScheduler<S>, request: &SubmitBatchRequest) -> BatchSubmitResponse
where
    S: Spawn + Clone + Send + Sync + 'static,
{
    let job_ids = scheduler.submit_batch(&request.avatar_id, &request.avatar_type, &request.combinations);
    BatchSubmitResponse {
        skipped: request.combinations.len().saturating_sub(job_ids.len()),
        job_ids,
    }
}

/// Handle `GET /jobs/{id}`.
///
/// # Errors
///
/// [`RenderError::NotFound`] for unknown or evicted jobs.
pub fn job_status<S>(scheduler: &RenderScheduler<S>, job_id: JobId) -> Result<JobStatusResponse, RenderError>
where
    S: Spawn + Clone + Send + Sync + 'static,
{
    scheduler.get_job(job_id).map(|job| JobStatusResponse::from(&job))
}

/// Handle `GET /jobs/{id}/result`.
///
/// # Errors
///
/// [`RenderError::NotFound`] unless the job completed successfully.
pub fn job_result<S>(scheduler: &RenderScheduler<S>, job_id: JobId) -> Result<Arc<RenderResult>, RenderError>
where
    S: Spawn + Clone + Send + Sync + 'static,
{
    scheduler.get_result(job_id)
}

/// Handle `DELETE /jobs/{id}`.
///
/// # Errors
///
/// [`RenderError::NotFound`] when the job is unknown; cancelling a job that
/// is already terminal is reported as `Ok(false)`.
pub fn cancel_job<S>(scheduler: &RenderScheduler<S>, job_id: JobId) -> Result<bool, RenderError>
where
    S: Spawn + Clone + Send + Sync + 'static,
{
    if scheduler.cancel(job_id) {
        return Ok(true);
    }
    scheduler.get_job(job_id).map(|_| false)
}

/// Handle `GET /stats`.
pub fn queue_stats<S>(scheduler: &RenderScheduler<S>) -> QueueStats
where
    S: Spawn + Clone + Send + Sync + 'static,
{
    scheduler.get_queue_stats()
}

/// Handle `GET /performance`. Records are ordered oldest first.
pub fn performance_history<S>(scheduler: &RenderScheduler<S>) -> Vec<PerformanceRecord>
where
    S: Spawn + Clone + Send + Sync + 'static,
{
    let mut records: Vec<_> = scheduler.get_performance_history().into_values().collect();
    records.sort_by_key(|r| r.recorded_at_ms);
    records
}

/// Handle `GET /health`.
pub fn health<S>(scheduler: &RenderScheduler<S>) -> Health
where
    S: Spawn + Clone + Send + Sync + 'static,
{
    Health {
        ok: true,
        active_renders: scheduler.active_renders(),
        max_concurrent_renders: scheduler.config().max_concurrent_renders,
        queue_depth: scheduler.queue_depth(),
    }
}
