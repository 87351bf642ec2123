//! Render job model and its lifecycle state machine.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::pipeline::Stage;
use crate::core::RenderError;

/// Priority assigned to interactive submissions. Lower values dispatch first.
pub const PRIORITY_INTERACTIVE: u8 = 1;
/// Priority assigned to batch submissions.
pub const PRIORITY_BATCH: u8 = 5;

/// Unique job identifier generated at submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    /// Generate a fresh random id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Identifier of a stored render result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultId(Uuid);

impl ResultId {
    /// Generate a fresh random id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ResultId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ResultId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Status of a job in the render lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting for a render slot.
    Queued,
    /// Owned by a running pipeline.
    Rendering,
    /// Finished with a stored result.
    Completed,
    /// Finished with an error message.
    Failed,
    /// Cancelled by a client.
    Cancelled,
}

impl JobStatus {
    /// Whether no further transition is possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Lowercase label used in logs and API responses.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Rendering => "rendering",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scene background requested by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackgroundKind {
    /// Plain studio backdrop.
    Studio,
    /// Transparent background.
    Transparent,
    /// Outdoor environment map.
    Outdoor,
}

/// Lighting preset requested by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LightingPreset {
    /// Soft three-point studio lighting.
    Studio,
    /// Daylight.
    Natural,
    /// High-contrast evening lighting.
    Evening,
}

impl LightingPreset {
    /// Lowercase label recorded in result metadata.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Studio => "studio",
            Self::Natural => "natural",
            Self::Evening => "evening",
        }
    }
}

/// One recognized render customization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RenderParam {
    /// Output resolution in pixels.
    Resolution {
        /// Width in pixels.
        width: u32,
        /// Height in pixels.
        height: u32,
    },
    /// Scene background.
    Background {
        /// Selected background.
        value: BackgroundKind,
    },
    /// Lighting preset.
    Lighting {
        /// Selected preset.
        value: LightingPreset,
    },
    /// Named avatar pose.
    Pose {
        /// Pose name.
        value: String,
    },
}

/// Customizations attached to a submission. Later entries override earlier ones.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RenderParams(pub Vec<RenderParam>);

impl RenderParams {
    /// Requested resolution, if any.
    #[must_use]
    pub fn resolution(&self) -> Option<(u32, u32)> {
        self.0.iter().rev().find_map(|p| match p {
            RenderParam::Resolution { width, height } => Some((*width, *height)),
            _ => None,
        })
    }

    /// Requested lighting preset, if any.
    #[must_use]
    pub fn lighting(&self) -> Option<LightingPreset> {
        self.0.iter().rev().find_map(|p| match p {
            RenderParam::Lighting { value } => Some(*value),
            _ => None,
        })
    }

    fn validate(&self) -> Result<(), RenderError> {
        for param in &self.0 {
            match param {
                RenderParam::Resolution { width, height } if *width == 0 || *height == 0 => {
                    return Err(RenderError::InvalidRequest(
                        "resolution must be non-zero".into(),
                    ));
                }
                RenderParam::Pose { value } if value.trim().is_empty() => {
                    return Err(RenderError::InvalidRequest("pose must not be blank".into()));
                }
                _ => {}
            }
        }
        Ok(())
    }
}

/// A composition request: one avatar plus one or more products.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderRequest {
    /// Avatar reference.
    pub avatar_id: String,
    /// Avatar body type, checked against each product.
    pub avatar_type: String,
    /// Products to render on the avatar.
    pub product_ids: Vec<String>,
    /// Batch submissions get a lower dispatch priority and a shorter estimate.
    pub is_batch: bool,
    /// Optional customizations.
    #[serde(default)]
    pub params: RenderParams,
}

impl RenderRequest {
    /// Interactive request without customizations.
    pub fn new(
        avatar_id: impl Into<String>,
        avatar_type: impl Into<String>,
        product_ids: Vec<String>,
    ) -> Self {
        Self {
            avatar_id: avatar_id.into(),
            avatar_type: avatar_type.into(),
            product_ids,
            is_batch: false,
            params: RenderParams::default(),
        }
    }

    /// Mark this request as part of a batch.
    #[must_use]
    pub const fn batch(mut self) -> Self {
        self.is_batch = true;
        self
    }

    /// Attach customizations.
    #[must_use]
    pub fn with_params(mut self, params: RenderParams) -> Self {
        self.params = params;
        self
    }

    /// Reject structurally malformed requests.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::InvalidRequest`] for a blank avatar, an empty
    /// product list, a blank product id, or an out-of-range parameter.
    pub fn validate(&self) -> Result<(), RenderError> {
        if self.avatar_id.trim().is_empty() {
            return Err(RenderError::InvalidRequest("avatar id must not be blank".into()));
        }
        if self.product_ids.is_empty() {
            return Err(RenderError::InvalidRequest(
                "at least one product is required".into(),
            ));
        }
        if self.product_ids.iter().any(|p| p.trim().is_empty()) {
            return Err(RenderError::InvalidRequest(
                "product ids must not be blank".into(),
            ));
        }
        self.params.validate()
    }

    /// Estimated render time: `round((4 + 0.8 * items) * (0.7 if batch))` seconds.
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn estimated_duration_secs(&self) -> u32 {
        let base = 0.8f64.mul_add(self.product_ids.len() as f64, 4.0);
        let factor = if self.is_batch { 0.7 } else { 1.0 };
        (base * factor).round() as u32
    }

    /// Dispatch priority for this request.
    #[must_use]
    pub const fn priority(&self) -> u8 {
        if self.is_batch {
            PRIORITY_BATCH
        } else {
            PRIORITY_INTERACTIVE
        }
    }
}

/// Authoritative record of one render job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderJob {
    /// Job identifier.
    pub id: JobId,
    /// Avatar reference.
    pub avatar_id: String,
    /// Avatar body type.
    pub avatar_type: String,
    /// Products composed onto the avatar.
    pub product_ids: Vec<String>,
    /// Submitted through a batch.
    pub is_batch: bool,
    /// Customizations.
    pub params: RenderParams,
    /// Dispatch priority, lower first.
    pub priority: u8,
    /// Submission time (ms since epoch).
    pub submitted_at_ms: u128,
    /// Estimated render duration in seconds.
    pub estimated_duration_secs: u32,
    /// Lifecycle status.
    pub status: JobStatus,
    /// Time the job entered `Rendering`.
    pub started_at_ms: Option<u128>,
    /// Time the job reached a terminal status.
    pub completed_at_ms: Option<u128>,
    /// Percent complete, 0 to 100.
    pub progress: f64,
    /// Last finished pipeline stage.
    pub current_stage: Option<Stage>,
    /// Failure reason for `Failed` jobs.
    pub error_message: Option<String>,
    /// Stored result for `Completed` jobs.
    pub result_ref: Option<ResultId>,
}

/// Copy-on-read snapshot handed out by queries and events.
pub type JobView = RenderJob;

impl RenderJob {
    /// Build a queued job from a validated request.
    #[must_use]
    pub fn queued(id: JobId, request: RenderRequest, submitted_at_ms: u128) -> Self {
        let priority = request.priority();
        let estimated_duration_secs = request.estimated_duration_secs();
        Self {
            id,
            avatar_id: request.avatar_id,
            avatar_type: request.avatar_type,
            product_ids: request.product_ids,
            is_batch: request.is_batch,
            params: request.params,
            priority,
            submitted_at_ms,
            estimated_duration_secs,
            status: JobStatus::Queued,
            started_at_ms: None,
            completed_at_ms: None,
            progress: 0.0,
            current_stage: None,
            error_message: None,
            result_ref: None,
        }
    }

    /// Number of products in the composition.
    #[must_use]
    pub fn item_count(&self) -> usize {
        self.product_ids.len()
    }

    /// The request this job was created from, for resubmission.
    #[must_use]
    pub fn to_request(&self) -> RenderRequest {
        RenderRequest {
            avatar_id: self.avatar_id.clone(),
            avatar_type: self.avatar_type.clone(),
            product_ids: self.product_ids.clone(),
            is_batch: self.is_batch,
            params: self.params.clone(),
        }
    }

    /// `Queued -> Rendering`. Returns false if the job is not queued.
    pub fn start(&mut self, now_ms: u128) -> bool {
        if self.status != JobStatus::Queued {
            return false;
        }
        self.status = JobStatus::Rendering;
        self.started_at_ms = Some(now_ms.max(self.submitted_at_ms));
        true
    }

    /// Record a finished stage. Progress only moves forward and only while rendering.
    pub fn advance(&mut self, stage: Stage, progress: f64) -> bool {
        if self.status != JobStatus::Rendering {
            return false;
        }
        self.progress = self.progress.max(progress.clamp(0.0, 100.0));
        self.current_stage = Some(stage);
        true
    }

    /// Move to a terminal status. Returns false if already terminal.
    pub fn finish(&mut self, status: JobStatus, now_ms: u128) -> bool {
        debug_assert!(status.is_terminal());
        if self.status.is_terminal() || !status.is_terminal() {
            return false;
        }
        let floor = self.started_at_ms.unwrap_or(self.submitted_at_ms);
        self.status = status;
        self.completed_at_ms = Some(now_ms.max(floor));
        true
    }
}
