//! Drover Engine - the reconciliation pipeline
//!
//! This crate turns intent into scheduler calls:
//! - **diff**: streams the four-way set difference between the intended
//!   and observed deployment sets
//! - **rectify**: consumes diff streams concurrently and drives a
//!   `RectificationClient`
//! - **update**: mutates the GDM under optimistic concurrency, retrying
//!   version conflicts
//! - **client**: the contract a downstream cluster scheduler adapter
//!   implements, plus an in-memory dummy for tests

pub mod error;
pub mod client;
pub mod diff;
pub mod rectify;
pub mod update;

pub use error::{ClientError, EngineError, RectifyOp, Result, SchedulerError};
pub use client::{CreatedRequest, DeployedTask, DummyRectificationClient, RectificationClient};
pub use diff::{ArtifactNamer, DiffSet, DiffStreams, PairStreams, default_namer, diff, label};
pub use rectify::{
    DEFAULT_WORKERS, DiffResolution, Rectifier, ResolutionVerb, compute_request_id, resolve,
};
pub use update::{MAX_UPDATE_ATTEMPTS, update, update_state};
