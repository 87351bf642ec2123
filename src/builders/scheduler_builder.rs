//! Composition root: wires configuration and collaborators into a scheduler.

use std::sync::Arc;

use anyhow::Context;

use crate::config::SchedulerConfig;
use crate::core::{
    AllowAllGate, AppResult, CompatibilityGate, PipelineExecutor, RenderError, RenderScheduler,
    SimulatedStageRunner, Spawn, StageRunner,
};
use crate::runtime::TokioSpawner;
use crate::util::{init_tracing, Clock, MonotonicClock, RandomSource, StdRandomSource};

/// Builder for [`RenderScheduler`].
///
/// Unset collaborators fall back to production defaults: every product is
/// compatible, time comes from [`MonotonicClock`], randomness from an
/// OS-seeded [`StdRandomSource`], and stages are simulated sleeps.
pub struct SchedulerBuilder {
    config: SchedulerConfig,
    gate: Option<Arc<dyn CompatibilityGate>>,
    clock: Option<Arc<dyn Clock>>,
    random: Option<Arc<dyn RandomSource>>,
    runner: Option<Arc<dyn StageRunner>>,
}

impl SchedulerBuilder {
    /// Start from a configuration.
    #[must_use]
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            gate: None,
            clock: None,
            random: None,
            runner: None,
        }
    }

    /// Compatibility gate consulted on every submission.
    #[must_use]
    pub fn with_gate(mut self, gate: impl CompatibilityGate + 'static) -> Self {
        self.gate = Some(Arc::new(gate));
        self
    }

    /// Shared compatibility gate.
    #[must_use]
    pub fn with_shared_gate(mut self, gate: Arc<dyn CompatibilityGate>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Time source for job timestamps.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Random source for stage jitter and failure injection.
    #[must_use]
    pub fn with_random(mut self, random: Arc<dyn RandomSource>) -> Self {
        self.random = Some(random);
        self
    }

    /// Stage implementation.
    #[must_use]
    pub fn with_stage_runner(mut self, runner: Arc<dyn StageRunner>) -> Self {
        self.runner = Some(runner);
        self
    }

    /// Validate the configuration and build a scheduler on `spawner`.
    ///
    /// # Errors
    ///
    /// [`RenderError::Config`] if the configuration is invalid.
    pub fn build<S>(self, spawner: S) -> Result<RenderScheduler<S>, RenderError>
    where
        S: Spawn + Clone + Send + Sync + 'static,
    {
        self.config.validate().map_err(RenderError::Config)?;

        let clock = self.clock.unwrap_or_else(|| Arc::new(MonotonicClock::new()));
        let random = self
            .random
            .unwrap_or_else(|| Arc::new(StdRandomSource::from_os_rng()));
        let runner = self.runner.unwrap_or_else(|| Arc::new(SimulatedStageRunner));
        let gate = self.gate.unwrap_or_else(|| Arc::new(AllowAllGate));

        let pipeline = PipelineExecutor::new(&self.config, runner, random, Arc::clone(&clock));
        tracing::info!(
            max_concurrent_renders = self.config.max_concurrent_renders,
            failure_rate = self.config.failure_rate,
            "render scheduler built"
        );
        Ok(RenderScheduler::new(self.config, gate, clock, pipeline, spawner))
    }

    /// Build on the tokio runtime the caller is running in.
    ///
    /// # Errors
    ///
    /// [`RenderError::Config`] if the configuration is invalid or no tokio
    /// runtime is active.
    pub fn build_on_current_runtime(self) -> Result<RenderScheduler<TokioSpawner>, RenderError> {
        let spawner = TokioSpawner::current()
            .map_err(|e| RenderError::Config(format!("no tokio runtime: {e}")))?;
        self.build(spawner)
    }
}

/// Load configuration from the environment and build a scheduler on the
/// current tokio runtime. Installs the default tracing subscriber unless one
/// is already set.
///
/// # Errors
///
/// Fails with context if the environment is invalid or no runtime is active.
pub fn build_from_env(gate: Arc<dyn CompatibilityGate>) -> AppResult<RenderScheduler<TokioSpawner>> {
    init_tracing();
    let config = SchedulerConfig::from_env()
        .map_err(anyhow::Error::msg)
        .context("loading scheduler configuration from environment")?;
    let scheduler = SchedulerBuilder::new(config)
        .with_shared_gate(gate)
        .build_on_current_runtime()
        .context("building render scheduler")?;
    Ok(scheduler)
}
