//! Result index and per-job performance records.
//!
//! Results are write-once and outlive the job's eviction from the job store.
//! Performance records are upserted on every terminal outcome, and
//! [`QueueStats`] is derived from both on demand.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::job::{JobId, JobStatus, RenderJob, ResultId};

/// Size of the placeholder artifact attached to every result.
pub const PLACEHOLDER_ARTIFACT_BYTES: usize = 4096;
/// Resolution recorded when the job did not request one.
pub const DEFAULT_RESOLUTION: (u32, u32) = (1024, 1024);

/// Quality tier derived from the number of composed items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityLabel {
    /// Up to two items.
    Ultra,
    /// Up to four items.
    High,
    /// Up to six items.
    Medium,
    /// More than six items.
    Low,
}

impl QualityLabel {
    /// Tier for a composition of `item_count` products.
    #[must_use]
    pub const fn for_item_count(item_count: usize) -> Self {
        match item_count {
            0..=2 => Self::Ultra,
            3..=4 => Self::High,
            5..=6 => Self::Medium,
            _ => Self::Low,
        }
    }

    /// Lowercase label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ultra => "ultra",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

/// Scene complexity score: ten points per item.
#[must_use]
pub fn scene_complexity(item_count: usize) -> u32 {
    u32::try_from(item_count).map_or(u32::MAX, |n| n.saturating_mul(10))
}

/// Metadata attached to a render result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderMetadata {
    /// Time from start of rendering to result creation.
    pub render_duration_ms: u64,
    /// Number of composed products.
    pub item_count: usize,
    /// Ten points per item.
    pub scene_complexity: u32,
    /// Quality tier.
    pub quality: QualityLabel,
    /// Output resolution.
    pub resolution: (u32, u32),
    /// Lighting preset used.
    pub lighting: String,
    /// Renderer identifier.
    pub renderer: String,
    /// Artifact encoding.
    pub format: String,
}

impl RenderMetadata {
    /// Derive metadata for a finished job.
    #[must_use]
    pub fn for_job(job: &RenderJob, render_duration_ms: u64) -> Self {
        let item_count = job.item_count();
        Self {
            render_duration_ms,
            item_count,
            scene_complexity: scene_complexity(item_count),
            quality: QualityLabel::for_item_count(item_count),
            resolution: job.params.resolution().unwrap_or(DEFAULT_RESOLUTION),
            lighting: job
                .params
                .lighting()
                .map_or("studio", |l| l.as_str())
                .to_owned(),
            renderer: "simulated".into(),
            format: "png".into(),
        }
    }
}

/// Output of a successful pipeline run. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderResult {
    /// Result identifier.
    pub id: ResultId,
    /// Job that produced it.
    pub job_id: JobId,
    /// Opaque placeholder image payload.
    pub artifact: Vec<u8>,
    /// Derived render metadata.
    pub metadata: RenderMetadata,
    /// Creation time (ms since epoch).
    pub created_at_ms: u128,
    /// Always true for stored results.
    pub success: bool,
}

impl RenderResult {
    /// Build the result for a job that finished rendering.
    #[must_use]
    pub fn for_job(job: &RenderJob, created_at_ms: u128) -> Self {
        let started = job.started_at_ms.unwrap_or(job.submitted_at_ms);
        let duration = u64::try_from(created_at_ms.saturating_sub(started)).unwrap_or(u64::MAX);
        Self {
            id: ResultId::new(),
            job_id: job.id,
            artifact: vec![0u8; PLACEHOLDER_ARTIFACT_BYTES],
            metadata: RenderMetadata::for_job(job, duration),
            created_at_ms,
            success: true,
        }
    }
}

/// Per-job performance sample.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerformanceRecord {
    /// Job identifier.
    pub job_id: JobId,
    /// Time spent rendering; zero for jobs cancelled while queued.
    pub render_duration_ms: u64,
    /// True only for completed jobs.
    pub success: bool,
    /// Terminal status the record describes.
    pub status: JobStatus,
    /// Number of composed products.
    pub item_count: usize,
    /// Scene complexity score.
    pub complexity_score: u32,
    /// Avatar body type.
    pub avatar_type: String,
    /// Time the record was written.
    pub recorded_at_ms: u128,
}

impl PerformanceRecord {
    /// Record for a job that has reached a terminal status.
    #[must_use]
    pub fn for_job(job: &RenderJob, recorded_at_ms: u128) -> Self {
        let duration = match (job.started_at_ms, job.completed_at_ms) {
            (Some(start), Some(end)) => u64::try_from(end.saturating_sub(start)).unwrap_or(u64::MAX),
            _ => 0,
        };
        Self {
            job_id: job.id,
            render_duration_ms: duration,
            success: job.status == JobStatus::Completed,
            status: job.status,
            item_count: job.item_count(),
            complexity_score: scene_complexity(job.item_count()),
            avatar_type: job.avatar_type.clone(),
            recorded_at_ms,
        }
    }
}

/// Job counts by status over the active job store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    /// Waiting for a slot.
    pub queued: usize,
    /// Currently rendering.
    pub rendering: usize,
    /// Completed, not yet evicted.
    pub completed: usize,
    /// Failed, not yet evicted.
    pub failed: usize,
    /// Cancelled, not yet evicted.
    pub cancelled: usize,
}

impl StatusCounts {
    /// Count one job in `status`.
    pub fn add(&mut self, status: JobStatus) {
        match status {
            JobStatus::Queued => self.queued += 1,
            JobStatus::Rendering => self.rendering += 1,
            JobStatus::Completed => self.completed += 1,
            JobStatus::Failed => self.failed += 1,
            JobStatus::Cancelled => self.cancelled += 1,
        }
    }
}

/// Aggregate queue statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueStats {
    /// Jobs waiting for a slot.
    pub queued: usize,
    /// Jobs rendering.
    pub rendering: usize,
    /// Completed jobs still in the job store.
    pub completed: usize,
    /// Failed jobs still in the job store.
    pub failed: usize,
    /// Cancelled jobs still in the job store.
    pub cancelled: usize,
    /// Results stored over the process lifetime.
    pub total_results: usize,
    /// Render slots currently held, including cancelled runs finishing a stage.
    pub active_slots: u32,
    /// Mean duration of successful renders; zero before the first success.
    pub average_render_time_ms: f64,
    /// Successes over finished attempts; `1.0` before any attempt finishes.
    pub success_rate: f64,
}

/// Process-lifetime store of results and performance records.
#[derive(Debug, Default)]
pub struct MetricsStore {
    results: HashMap<JobId, Arc<RenderResult>>,
    performance: HashMap<JobId, PerformanceRecord>,
}

impl MetricsStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a result. Returns false, leaving the original untouched, if
    /// the job already has one.
    pub fn insert_result(&mut self, result: RenderResult) -> bool {
        if self.results.contains_key(&result.job_id) {
            tracing::warn!(job_id = %result.job_id, "duplicate render result ignored");
            return false;
        }
        self.results.insert(result.job_id, Arc::new(result));
        true
    }

    /// Result for a job, if it completed.
    #[must_use]
    pub fn result(&self, job_id: &JobId) -> Option<Arc<RenderResult>> {
        self.results.get(job_id).cloned()
    }

    /// Insert or replace the performance record for a job.
    pub fn upsert_record(&mut self, record: PerformanceRecord) {
        self.performance.insert(record.job_id, record);
    }

    /// Copy of every performance record.
    #[must_use]
    pub fn performance_history(&self) -> HashMap<JobId, PerformanceRecord> {
        self.performance.clone()
    }

    /// Number of stored results.
    #[must_use]
    pub fn result_count(&self) -> usize {
        self.results.len()
    }

    /// Combine live status counts with stored outcomes.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn queue_stats(&self, counts: StatusCounts, active_slots: u32) -> QueueStats {
        let mut successes = 0u64;
        let mut failures = 0u64;
        let mut total_success_ms = 0u64;
        for record in self.performance.values() {
            match record.status {
                JobStatus::Completed => {
                    successes += 1;
                    total_success_ms = total_success_ms.saturating_add(record.render_duration_ms);
                }
                JobStatus::Failed => failures += 1,
                _ => {}
            }
        }

        let average_render_time_ms = if successes == 0 {
            0.0
        } else {
            total_success_ms as f64 / successes as f64
        };
        let attempts = successes + failures;
        let success_rate = if attempts == 0 {
            1.0
        } else {
            successes as f64 / attempts as f64
        };

        QueueStats {
            queued: counts.queued,
            rendering: counts.rendering,
            completed: counts.completed,
            failed: counts.failed,
            cancelled: counts.cancelled,
            total_results: self.results.len(),
            active_slots,
            average_render_time_ms,
            success_rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::job::RenderRequest;

    fn finished_job(items: usize, status: JobStatus, start: u128, end: u128) -> RenderJob {
        let request = RenderRequest::new(
            "avatar-1",
            "athletic",
            (0..items).map(|i| format!("sku-{i}")).collect(),
        );
        let mut job = RenderJob::queued(JobId::new(), request, start);
        job.start(start);
        job.finish(status, end);
        job
    }

    #[test]
    fn test_quality_tiers() {
        assert_eq!(QualityLabel::for_item_count(1), QualityLabel::Ultra);
        assert_eq!(QualityLabel::for_item_count(2), QualityLabel::Ultra);
        assert_eq!(QualityLabel::for_item_count(3), QualityLabel::High);
        assert_eq!(QualityLabel::for_item_count(4), QualityLabel::High);
        assert_eq!(QualityLabel::for_item_count(6), QualityLabel::Medium);
        assert_eq!(QualityLabel::for_item_count(7), QualityLabel::Low);
    }

    #[test]
    fn test_result_metadata() {
        let job = finished_job(3, JobStatus::Completed, 1_000, 7_000);
        let result = RenderResult::for_job(&job, 7_000);
        assert_eq!(result.metadata.scene_complexity, 30);
        assert_eq!(result.metadata.quality, QualityLabel::High);
        assert_eq!(result.metadata.render_duration_ms, 6_000);
        assert_eq!(result.metadata.resolution, DEFAULT_RESOLUTION);
        assert_eq!(result.metadata.lighting, "studio");
        assert_eq!(result.artifact.len(), PLACEHOLDER_ARTIFACT_BYTES);
        assert!(result.success);
    }

    #[test]
    fn test_results_are_write_once() {
        let mut store = MetricsStore::new();
        let job = finished_job(1, JobStatus::Completed, 0, 10);
        let first = RenderResult::for_job(&job, 10);
        let first_id = first.id;
        assert!(store.insert_result(first));
        assert!(!store.insert_result(RenderResult::for_job(&job, 20)));
        assert_eq!(store.result(&job.id).unwrap().id, first_id);
        assert_eq!(store.result_count(), 1);
    }

    #[test]
    fn test_empty_stats_convention() {
        let stats = MetricsStore::new().queue_stats(StatusCounts::default(), 0);
        assert!((stats.success_rate - 1.0).abs() < f64::EPSILON);
        assert!(stats.average_render_time_ms.abs() < f64::EPSILON);
    }

    #[test]
    fn test_stats_ignore_cancellations() {
        let mut store = MetricsStore::new();
        for job in [
            finished_job(1, JobStatus::Completed, 0, 4_000),
            finished_job(2, JobStatus::Completed, 0, 6_000),
            finished_job(2, JobStatus::Failed, 0, 3_000),
            finished_job(2, JobStatus::Cancelled, 0, 1_000),
        ] {
            store.upsert_record(PerformanceRecord::for_job(&job, 0));
        }
        let stats = store.queue_stats(StatusCounts::default(), 0);
        assert!((stats.average_render_time_ms - 5_000.0).abs() < f64::EPSILON);
        assert!((stats.success_rate - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_upsert_replaces_record() {
        let mut store = MetricsStore::new();
        let mut job = finished_job(1, JobStatus::Cancelled, 0, 0);
        store.upsert_record(PerformanceRecord::for_job(&job, 1));
        job.status = JobStatus::Failed;
        store.upsert_record(PerformanceRecord::for_job(&job, 2));
        let history = store.performance_history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[&job.id].status, JobStatus::Failed);
    }
}
