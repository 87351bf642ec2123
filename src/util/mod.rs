//! Shared utilities: time, randomness, and telemetry.

pub mod clock;
pub mod random;
pub mod telemetry;

pub use clock::*;
pub use random::*;
pub use telemetry::*;
