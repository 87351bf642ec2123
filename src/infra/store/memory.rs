//! In-memory job store: an arena of jobs addressed by id.

use std::collections::HashMap;

use crate::core::job::{JobId, RenderJob};
use crate::core::metrics::StatusCounts;

/// Authoritative record set for jobs that have not been evicted.
///
/// Callers get clones; mutation goes through [`InMemoryJobStore::update`]
/// while the owning lock is held.
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    jobs: HashMap<JobId, RenderJob>,
}

impl InMemoryJobStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new job. Ids are unique, so an existing entry is a bug.
    pub fn insert(&mut self, job: RenderJob) {
        let previous = self.jobs.insert(job.id, job);
        debug_assert!(previous.is_none(), "job id reused");
    }

    /// Snapshot of a job.
    #[must_use]
    pub fn get(&self, job_id: &JobId) -> Option<RenderJob> {
        self.jobs.get(job_id).cloned()
    }

    /// Apply `f` to a job in place and return its output.
    pub fn update<R>(&mut self, job_id: &JobId, f: impl FnOnce(&mut RenderJob) -> R) -> Option<R> {
        self.jobs.get_mut(job_id).map(f)
    }

    /// Evict a job.
    pub fn remove(&mut self, job_id: &JobId) -> Option<RenderJob> {
        self.jobs.remove(job_id)
    }

    /// Count jobs by status.
    #[must_use]
    pub fn counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for job in self.jobs.values() {
            counts.add(job.status);
        }
        counts
    }

    /// Number of stored jobs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}
