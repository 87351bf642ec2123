//! Time sources used for job timestamps.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time in milliseconds since the Unix epoch.
#[must_use]
pub fn now_ms() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}

/// Source of millisecond timestamps for job lifecycle fields.
///
/// Implementations must never go backwards; the scheduler relies on this for
/// `submitted_at <= started_at <= completed_at`.
pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn now_ms(&self) -> u128;
}

/// Wall-clock anchored clock that advances with the tokio timer.
///
/// The epoch is sampled once at construction; later readings add the
/// elapsed [`tokio::time::Instant`] delta. Readings are therefore monotonic
/// and follow paused/advanced time inside tokio tests.
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    epoch_ms: u128,
    origin: tokio::time::Instant,
}

impl MonotonicClock {
    /// Create a clock anchored at the current wall-clock time.
    #[must_use]
    pub fn new() -> Self {
        Self {
            epoch_ms: now_ms(),
            origin: tokio::time::Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> u128 {
        self.epoch_ms + self.origin.elapsed().as_millis()
    }
}

/// Manually driven clock for deterministic tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    /// Create a clock starting at `start_ms`.
    #[must_use]
    pub const fn new(start_ms: u64) -> Self {
        Self {
            now: AtomicU64::new(start_ms),
        }
    }

    /// Move the clock forward by `delta_ms`.
    pub fn advance(&self, delta_ms: u64) {
        self.now.fetch_add(delta_ms, Ordering::AcqRel);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u128 {
        u128::from(self.now.load(Ordering::Acquire))
    }
}
