//! In-memory dispatch queue ordered by priority, then submission time.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::core::job::{JobId, RenderJob};

/// Dispatch key for one queued job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueEntry {
    /// Job to dispatch.
    pub job_id: JobId,
    /// Lower values dispatch first.
    pub priority: u8,
    /// Submission time (ms since epoch).
    pub submitted_at_ms: u128,
    /// Submission sequence number; breaks ties within the same millisecond.
    pub seq: u64,
}

impl QueueEntry {
    /// Dispatch key for a job submitted as the `seq`-th request.
    #[must_use]
    pub const fn for_job(job: &RenderJob, seq: u64) -> Self {
        Self {
            job_id: job.id,
            priority: job.priority,
            submitted_at_ms: job.submitted_at_ms,
            seq,
        }
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Max-heap: the entry that should dispatch first compares greatest.
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.submitted_at_ms.cmp(&self.submitted_at_ms))
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Unbounded queue of jobs waiting for a render slot.
/// O(log n) push and pop; removal rebuilds the heap.
#[derive(Debug, Default)]
pub struct InMemoryJobQueue {
    entries: BinaryHeap<QueueEntry>,
}

impl InMemoryJobQueue {
    /// Empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a job.
    pub fn push(&mut self, entry: QueueEntry) {
        self.entries.push(entry);
    }

    /// Take the next job to dispatch.
    pub fn pop(&mut self) -> Option<QueueEntry> {
        self.entries.pop()
    }

    /// Next job to dispatch, without removing it.
    #[must_use]
    pub fn peek(&self) -> Option<&QueueEntry> {
        self.entries.peek()
    }

    /// Drop a job from the queue. Returns whether it was present.
    pub fn remove(&mut self, job_id: &JobId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.job_id != *job_id);
        self.entries.len() != before
    }

    /// Number of waiting jobs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no job is waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
