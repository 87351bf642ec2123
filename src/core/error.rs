//! Error types for scheduler operations.

use thiserror::Error;

use crate::core::job::JobId;

/// Errors produced by scheduler components.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    /// A product cannot be rendered on the requested avatar type.
    #[error("product `{product_id}` is not compatible with avatar type `{avatar_type}`")]
    Compatibility {
        /// Rejected product.
        product_id: String,
        /// Avatar type it was checked against.
        avatar_type: String,
    },
    /// No job with this id is known to the scheduler.
    #[error("job not found: {0}")]
    NotFound(JobId),
    /// Malformed submission or batch entry.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// A pipeline stage failed or a failure was injected.
    #[error("pipeline failure: {0}")]
    PipelineFailure(String),
    /// Configuration rejected at build time.
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
