//! Publish/subscribe feeds for job updates and render outcomes.
//!
//! Each feed is a bounded `tokio::sync::broadcast` channel. Publishing never
//! blocks: a subscriber that falls more than `event_buffer` events behind
//! loses the oldest ones and is told how many it missed. Subscribers only see
//! events published after they attach.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};

use crate::core::job::{JobId, JobStatus, JobView, ResultId};

/// Any change to a job's status, progress, or stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobUpdated {
    /// Snapshot taken right after the change.
    pub job: JobView,
}

/// A job reached a terminal status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderCompleted {
    /// Job identifier.
    pub job_id: JobId,
    /// Terminal status.
    pub status: JobStatus,
    /// Stored result, for completed jobs.
    pub result_ref: Option<ResultId>,
    /// Failure reason, for failed jobs.
    pub error_message: Option<String>,
    /// Time the terminal status was reached.
    pub completed_at_ms: u128,
}

/// Receiving end of one feed.
#[derive(Debug)]
pub struct EventSubscription<T> {
    rx: broadcast::Receiver<T>,
    missed: u64,
}

impl<T: Clone> EventSubscription<T> {
    /// Wait for the next event. Lag is skipped over; returns `None` once the
    /// notifier has been dropped and the buffer is drained.
    pub async fn recv(&mut self) -> Option<T> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => {
                    self.missed += skipped;
                    tracing::warn!("event subscriber lagged, skipped {skipped} events");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Next buffered event without waiting.
    pub fn try_recv(&mut self) -> Option<T> {
        loop {
            match self.rx.try_recv() {
                Ok(event) => return Some(event),
                Err(TryRecvError::Lagged(skipped)) => self.missed += skipped,
                Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
            }
        }
    }

    /// Total events dropped because this subscriber fell behind.
    #[must_use]
    pub const fn missed(&self) -> u64 {
        self.missed
    }
}

/// Fan-out of scheduler events to any number of observers.
#[derive(Debug, Clone)]
pub struct EventNotifier {
    job_updates: broadcast::Sender<JobUpdated>,
    render_results: broadcast::Sender<RenderCompleted>,
}

impl EventNotifier {
    /// Create both feeds with a per-subscriber buffer of `capacity` events.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (job_updates, _) = broadcast::channel(capacity.max(1));
        let (render_results, _) = broadcast::channel(capacity.max(1));
        Self {
            job_updates,
            render_results,
        }
    }

    /// Attach to the job-update feed.
    #[must_use]
    pub fn subscribe_job_updates(&self) -> EventSubscription<JobUpdated> {
        EventSubscription {
            rx: self.job_updates.subscribe(),
            missed: 0,
        }
    }

    /// Attach to the render-outcome feed.
    #[must_use]
    pub fn subscribe_render_results(&self) -> EventSubscription<RenderCompleted> {
        EventSubscription {
            rx: self.render_results.subscribe(),
            missed: 0,
        }
    }

    /// Publish a job snapshot. No subscribers is not an error.
    pub fn job_updated(&self, job: JobView) {
        let _ = self.job_updates.send(JobUpdated { job });
    }

    /// Publish a terminal outcome.
    pub fn render_completed(&self, event: RenderCompleted) {
        tracing::debug!(job_id = %event.job_id, status = %event.status, "render completed event");
        let _ = self.render_results.send(event);
    }
}
