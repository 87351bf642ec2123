//! Scheduler configuration: concurrency cap, timing model, and eviction.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root scheduler configuration.
///
/// Every field has a default, so a partial JSON document or an empty
/// environment yields a working configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Maximum jobs rendering at once.
    pub max_concurrent_renders: u32,
    /// Delay before a terminal job leaves the job store, in milliseconds.
    pub eviction_grace_ms: u64,
    /// Probability of an injected pipeline failure per run, in `[0, 1]`.
    pub failure_rate: f64,
    /// Maximum relative jitter applied to each stage duration, in `[0, 1]`.
    pub stage_jitter: f64,
    /// Floor applied to a job's estimated duration when planning stages.
    pub min_estimated_duration_ms: u64,
    /// Multiplier applied to simulated stage durations. `1.0` is real time.
    pub time_scale: f64,
    /// Per-channel event buffer; lagging subscribers lose the oldest events.
    pub event_buffer: usize,
    /// Optional upper bound on a single stage.
    pub stage_timeout_ms: Option<u64>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_renders: 3,
            eviction_grace_ms: 5_000,
            failure_rate: 0.05,
            stage_jitter: 0.3,
            min_estimated_duration_ms: 1_000,
            time_scale: 1.0,
            event_buffer: 256,
            stage_timeout_ms: None,
        }
    }
}

impl SchedulerConfig {
    /// Set the concurrency cap.
    #[must_use]
    pub const fn with_max_concurrent_renders(mut self, max: u32) -> Self {
        self.max_concurrent_renders = max;
        self
    }

    /// Set the injected failure probability.
    #[must_use]
    pub const fn with_failure_rate(mut self, rate: f64) -> Self {
        self.failure_rate = rate;
        self
    }

    /// Set the eviction grace delay.
    #[must_use]
    pub const fn with_eviction_grace_ms(mut self, ms: u64) -> Self {
        self.eviction_grace_ms = ms;
        self
    }

    /// Set the simulated time multiplier.
    #[must_use]
    pub const fn with_time_scale(mut self, scale: f64) -> Self {
        self.time_scale = scale;
        self
    }

    /// Set the per-stage timeout.
    #[must_use]
    pub const fn with_stage_timeout_ms(mut self, ms: Option<u64>) -> Self {
        self.stage_timeout_ms = ms;
        self
    }

    /// Grace delay as a [`Duration`].
    #[must_use]
    pub const fn eviction_grace(&self) -> Duration {
        Duration::from_millis(self.eviction_grace_ms)
    }

    /// Stage timeout as a [`Duration`].
    #[must_use]
    pub fn stage_timeout(&self) -> Option<Duration> {
        self.stage_timeout_ms.map(Duration::from_millis)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_concurrent_renders == 0 {
            return Err("max_concurrent_renders must be greater than 0".into());
        }
        if !(0.0..=1.0).contains(&self.failure_rate) {
            return Err("failure_rate must be within [0, 1]".into());
        }
        if !(0.0..=1.0).contains(&self.stage_jitter) {
            return Err("stage_jitter must be within [0, 1]".into());
        }
        if self.min_estimated_duration_ms == 0 {
            return Err("min_estimated_duration_ms must be greater than 0".into());
        }
        if !self.time_scale.is_finite() || self.time_scale < 0.0 {
            return Err("time_scale must be a finite non-negative number".into());
        }
        if self.event_buffer == 0 {
            return Err("event_buffer must be greater than 0".into());
        }
        if self.stage_timeout_ms == Some(0) {
            return Err("stage_timeout_ms must be greater than 0 when set".into());
        }
        Ok(())
    }

    /// Parse configuration from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// Returns a parse or validation message.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load configuration from `TRYON_*` environment variables, reading a
    /// `.env` file first when present. Unset variables keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns a message naming the variable that failed to parse, or the
    /// validation failure.
    pub fn from_env() -> Result<Self, String> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Same as [`SchedulerConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parse<T: std::str::FromStr>(key: &str, raw: Option<String>) -> Result<Option<T>, String> {
            raw.map(|v| {
                v.trim()
                    .parse::<T>()
                    .map_err(|_| format!("{key}: cannot parse `{v}`"))
            })
            .transpose()
        }

        let mut cfg = Self::default();
        if let Some(v) = parse("TRYON_MAX_CONCURRENT_RENDERS", lookup("TRYON_MAX_CONCURRENT_RENDERS"))? {
            cfg.max_concurrent_renders = v;
        }
        if let Some(v) = parse("TRYON_EVICTION_GRACE_MS", lookup("TRYON_EVICTION_GRACE_MS"))? {
            cfg.eviction_grace_ms = v;
        }
        if let Some(v) = parse("TRYON_FAILURE_RATE", lookup("TRYON_FAILURE_RATE"))? {
            cfg.failure_rate = v;
        }
        if let Some(v) = parse("TRYON_STAGE_JITTER", lookup("TRYON_STAGE_JITTER"))? {
            cfg.stage_jitter = v;
        }
        if let Some(v) = parse("TRYON_MIN_ESTIMATED_DURATION_MS", lookup("TRYON_MIN_ESTIMATED_DURATION_MS"))? {
            cfg.min_estimated_duration_ms = v;
        }
        if let Some(v) = parse("TRYON_TIME_SCALE", lookup("TRYON_TIME_SCALE"))? {
            cfg.time_scale = v;
        }
        if let Some(v) = parse("TRYON_EVENT_BUFFER", lookup("TRYON_EVENT_BUFFER"))? {
            cfg.event_buffer = v;
        }
        if let Some(v) = parse("TRYON_STAGE_TIMEOUT_MS", lookup("TRYON_STAGE_TIMEOUT_MS"))? {
            cfg.stage_timeout_ms = Some(v);
        }
        cfg.validate()?;
        Ok(cfg)
    }
}
