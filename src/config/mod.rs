//! Configuration models for the scheduler, pipeline timing, and event buffers.

pub mod scheduler;

pub use scheduler::SchedulerConfig;
