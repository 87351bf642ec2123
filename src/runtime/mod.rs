//! Runtime adapters and the request/response API surface.

pub mod api;
pub mod tokio_spawner;

pub use api::{
    BatchSubmitResponse, Health, JobCreatedResponse, JobStatusResponse, SubmitBatchRequest,
};
pub use tokio_spawner::TokioSpawner;
