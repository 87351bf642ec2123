//! Eight-stage simulated render pipeline.
//!
//! The executor walks [`Stage::ALL`] for one job. Each stage's work is
//! delegated to a [`StageRunner`]; the default [`SimulatedStageRunner`] only
//! sleeps for the planned duration. Stage boundaries are the only points at
//! which the executor touches shared job state, through the
//! [`PipelineObserver`] the scheduler supplies, and the only points at which
//! a cancellation is noticed.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::SchedulerConfig;
use crate::core::job::{JobId, JobView};
use crate::core::metrics::RenderResult;
use crate::core::RenderError;
use crate::util::{Clock, RandomSource};

/// Progress added by each finished stage.
pub const STAGE_PROGRESS_STEP: f64 = 12.5;

/// One phase of the render pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Scene graph and camera setup.
    SceneSetup,
    /// Avatar mesh load.
    AvatarLoading,
    /// Garment asset load.
    ProductLoading,
    /// Cloth simulation.
    PhysicsSimulation,
    /// Material and texture pass.
    MaterialRendering,
    /// Light rig placement.
    LightingSetup,
    /// Final frame render.
    FinalRendering,
    /// Compositing and encoding.
    PostProcessing,
}

impl Stage {
    /// All stages in execution order.
    pub const ALL: [Self; 8] = [
        Self::SceneSetup,
        Self::AvatarLoading,
        Self::ProductLoading,
        Self::PhysicsSimulation,
        Self::MaterialRendering,
        Self::LightingSetup,
        Self::FinalRendering,
        Self::PostProcessing,
    ];

    /// Human-readable label shown to clients.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::SceneSetup => "Scene Setup",
            Self::AvatarLoading => "Avatar Loading",
            Self::ProductLoading => "Product Loading",
            Self::PhysicsSimulation => "Physics Simulation",
            Self::MaterialRendering => "Material Rendering",
            Self::LightingSetup => "Lighting Setup",
            Self::FinalRendering => "Final Rendering",
            Self::PostProcessing => "Post-processing",
        }
    }

    /// Progress once this stage has finished.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn progress_after(self) -> f64 {
        let position = Self::ALL.iter().position(|s| *s == self).unwrap_or(0) + 1;
        position as f64 * STAGE_PROGRESS_STEP
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Performs the work of a single stage.
#[async_trait]
pub trait StageRunner: Send + Sync {
    /// Run `stage` for `job`; `planned` is the simulated duration.
    ///
    /// An `Err` ends the run as a pipeline failure carrying the message.
    async fn run_stage(&self, job: &JobView, stage: Stage, planned: Duration) -> Result<(), String>;
}

/// Sleeps on the tokio timer for the planned duration.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulatedStageRunner;

#[async_trait]
impl StageRunner for SimulatedStageRunner {
    async fn run_stage(&self, _job: &JobView, _stage: Stage, planned: Duration) -> Result<(), String> {
        tokio::time::sleep(planned).await;
        Ok(())
    }
}

/// Scheduler-side hooks the executor calls at stage boundaries.
pub trait PipelineObserver: Send + Sync {
    /// Whether the job is still `Rendering`.
    fn is_rendering(&self, job_id: JobId) -> bool;
    /// Record a finished stage. Returns false if the job is no longer
    /// `Rendering`, in which case the run must stop.
    fn stage_finished(&self, job_id: JobId, stage: Stage, progress: f64) -> bool;
}

/// How one pipeline run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// All stages finished.
    Completed(RenderResult),
    /// A stage failed, timed out, or a failure was injected.
    Failed(RenderError),
    /// Cancellation was observed at a stage boundary.
    Cancelled,
}

/// Per-stage duration model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StageTiming {
    /// Maximum relative jitter, `0.3` for ±30%.
    pub jitter: f64,
    /// Lower bound on the job estimate, in milliseconds.
    pub min_estimated_ms: u64,
    /// Multiplier applied to every planned duration.
    pub time_scale: f64,
}

impl StageTiming {
    /// Timing model from scheduler configuration.
    #[must_use]
    pub const fn from_config(config: &SchedulerConfig) -> Self {
        Self {
            jitter: config.stage_jitter,
            min_estimated_ms: config.min_estimated_duration_ms,
            time_scale: config.time_scale,
        }
    }

    /// Planned duration of one stage for a job estimated at
    /// `estimated_secs`, given a uniform `sample` in `[0, 1)`.
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn plan(&self, estimated_secs: u32, sample: f64) -> Duration {
        let estimated_ms = (f64::from(estimated_secs) * 1000.0).max(self.min_estimated_ms as f64);
        let base_ms = estimated_ms / Stage::ALL.len() as f64;
        let factor = self.jitter.mul_add(2.0f64.mul_add(sample.clamp(0.0, 1.0), -1.0), 1.0);
        let micros = (base_ms * factor.max(0.0) * self.time_scale * 1000.0).max(0.0);
        Duration::from_micros(micros.round() as u64)
    }
}

/// Runs the stage sequence for one job at a time; cheap to clone.
#[derive(Clone)]
pub struct PipelineExecutor {
    runner: Arc<dyn StageRunner>,
    random: Arc<dyn RandomSource>,
    clock: Arc<dyn Clock>,
    timing: StageTiming,
    failure_rate: f64,
    stage_timeout: Option<Duration>,
}

impl PipelineExecutor {
    /// Assemble an executor from configuration and injected collaborators.
    #[must_use]
    pub fn new(
        config: &SchedulerConfig,
        runner: Arc<dyn StageRunner>,
        random: Arc<dyn RandomSource>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            runner,
            random,
            clock,
            timing: StageTiming::from_config(config),
            failure_rate: config.failure_rate,
            stage_timeout: config.stage_timeout(),
        }
    }

    /// Execute every stage for `job`, reporting through `observer`.
    pub async fn run(&self, job: JobView, observer: &dyn PipelineObserver) -> RunOutcome {
        if !observer.is_rendering(job.id) {
            return RunOutcome::Cancelled;
        }

        for stage in Stage::ALL {
            if stage == Stage::PostProcessing && self.failure_injected() {
                tracing::warn!(job_id = %job.id, "injected failure before {stage}");
                return RunOutcome::Failed(RenderError::PipelineFailure(format!(
                    "injected failure before {stage}"
                )));
            }

            let planned = self.timing.plan(job.estimated_duration_secs, self.random.next_f64());
            tracing::debug!(job_id = %job.id, %stage, ?planned, "stage started");

            if let Err(message) = self.run_stage(&job, stage, planned).await {
                tracing::warn!(job_id = %job.id, %stage, "stage failed: {message}");
                return RunOutcome::Failed(RenderError::PipelineFailure(message));
            }

            if !observer.stage_finished(job.id, stage, stage.progress_after()) {
                tracing::info!(job_id = %job.id, %stage, "cancellation observed at stage boundary");
                return RunOutcome::Cancelled;
            }
        }

        RunOutcome::Completed(RenderResult::for_job(&job, self.clock.now_ms()))
    }

    async fn run_stage(&self, job: &JobView, stage: Stage, planned: Duration) -> Result<(), String> {
        let work = self.runner.run_stage(job, stage, planned);
        let result = match self.stage_timeout {
            Some(limit) => tokio::time::timeout(limit, work).await.map_err(|_| {
                format!("stage `{stage}` timed out after {}ms", limit.as_millis())
            })?,
            None => work.await,
        };
        result.map_err(|e| format!("stage `{stage}` failed: {e}"))
    }

    fn failure_injected(&self) -> bool {
        self.failure_rate > 0.0 && self.random.next_f64() < self.failure_rate
    }
}
