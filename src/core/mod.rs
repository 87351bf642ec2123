//! Scheduling core: job model, pipeline, dispatcher, metrics, and events.

pub mod compat;
pub mod error;
pub mod events;
pub mod job;
pub mod metrics;
pub mod pipeline;
pub mod retry;
pub mod scheduler;

pub use compat::{AllowAllGate, CompatibilityGate, DenyListGate};
pub use error::{AppResult, RenderError};
pub use events::{EventNotifier, EventSubscription, JobUpdated, RenderCompleted};
pub use job::{
    JobId, JobStatus, JobView, RenderJob, RenderParam, RenderParams, RenderRequest, ResultId,
};
pub use metrics::{
    MetricsStore, PerformanceRecord, QualityLabel, QueueStats, RenderMetadata, RenderResult,
};
pub use pipeline::{
    PipelineExecutor, PipelineObserver, RunOutcome, SimulatedStageRunner, Stage, StageRunner,
    StageTiming,
};
pub use retry::{submit_with_retry, RetryOutcome, RetryPolicy};
pub use scheduler::{RenderScheduler, Spawn};
