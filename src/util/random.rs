//! Injectable random sources for stage jitter and failure injection.

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Source of uniform samples in `[0, 1)`.
pub trait RandomSource: Send + Sync {
    /// Draw the next sample.
    fn next_f64(&self) -> f64;
}

/// `StdRng`-backed source; seed it for reproducible runs.
pub struct StdRandomSource {
    rng: Mutex<StdRng>,
}

impl StdRandomSource {
    /// Seed from the operating system.
    #[must_use]
    pub fn from_os_rng() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    /// Deterministic source for a given seed.
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl RandomSource for StdRandomSource {
    fn next_f64(&self) -> f64 {
        self.rng.lock().random::<f64>()
    }
}

/// Always returns the same sample. `0.5` yields zero jitter.
#[derive(Debug, Clone, Copy)]
pub struct FixedRandomSource(pub f64);

impl RandomSource for FixedRandomSource {
    fn next_f64(&self) -> f64 {
        self.0
    }
}
