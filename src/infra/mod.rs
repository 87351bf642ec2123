//! Infrastructure adapters for the dispatch queue and job store.

pub mod queue;
pub mod store;

pub use queue::{InMemoryJobQueue, QueueEntry};
pub use store::InMemoryJobStore;
