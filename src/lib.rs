//! # Prometheus Try-On Render
//!
//! Asynchronous render job scheduler for a virtual try-on service.
//!
//! Clients submit composition requests (one avatar plus one or more
//! products). Each request becomes a job that waits in a priority/FIFO queue
//! until one of a fixed number of render slots is free, then runs through an
//! eight-stage simulated pipeline that reports progress after every stage.
//!
//! ## Key Features
//!
//! - **Admission Control**: Requests are validated and checked against a
//!   product/avatar compatibility gate before a job is created
//! - **Bounded Concurrency**: At most `max_concurrent_renders` jobs render at
//!   once; slots are reserved lock-free and backfilled as runs finish
//! - **Priority Dispatch**: Interactive jobs before batch jobs, FIFO within a
//!   priority
//! - **Progress Events**: Job updates and terminal outcomes fan out to any
//!   number of subscribers
//! - **Results & Metrics**: Completed renders are stored write-once; every
//!   terminal job leaves a performance record behind
//! - **Grace Eviction**: Terminal jobs stay queryable for a short grace period
//!
//! ```rust,ignore
//! use prometheus_tryon_render::builders::SchedulerBuilder;
//! use prometheus_tryon_render::config::SchedulerConfig;
//! use prometheus_tryon_render::core::{JobStatus, RenderRequest};
//!
//! let scheduler = SchedulerBuilder::new(SchedulerConfig::default())
//!     .build_on_current_runtime()?;
//! let mut results = scheduler.subscribe_render_results();
//!
//! let job_id = scheduler.submit(RenderRequest::new("avatar-1", "slim", vec!["shirt-9".into()]))?;
//! while let Some(event) = results.recv().await {
//!     if event.job_id == job_id {
//!         assert!(event.status.is_terminal());
//!         break;
//!     }
//! }
//! ```
//!
//! For complete scenarios, see `tests/scheduler_test.rs`.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Builders to construct a scheduler from configuration.
pub mod builders;
/// Configuration model and loaders.
pub mod config;
/// Job model, pipeline, scheduler, metrics, and events.
pub mod core;
/// In-memory queue and job store.
pub mod infra;
/// Runtime adapters and API surface.
pub mod runtime;
/// Shared utilities: clocks, randomness, tracing setup.
pub mod util;
