//! Error types for the reconciliation engine

use std::fmt;

use thiserror::Error;

use drover_core::{CoreError, DeploymentId};
use drover_store::StoreError;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EngineError {
    #[error("invalid deploy ID ({0})")]
    InvalidDeployId(String),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Why a scheduler call failed, as reported by an adapter. Adapters keep
/// their transport details behind this message.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct SchedulerError {
    message: String,
}

impl SchedulerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// The scheduler operation a rectification worker was attempting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RectifyOp {
    CreateRequest,
    Deploy,
    Delete,
}

impl fmt::Display for RectifyOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RectifyOp::CreateRequest => "create-request",
            RectifyOp::Deploy => "deploy",
            RectifyOp::Delete => "delete",
        };
        write!(f, "{s}")
    }
}

/// A failed rectification action, tagged with the deployment it concerns.
/// Reported on the resolution stream; never fatal to the pass.
#[derive(Debug, Error)]
#[error("{op} failed for {id}: {source}")]
pub struct ClientError {
    pub op: RectifyOp,
    pub id: DeploymentId,
    #[source]
    pub source: SchedulerError,
}

impl ClientError {
    pub fn new(op: RectifyOp, id: DeploymentId, source: SchedulerError) -> Self {
        Self { op, id, source }
    }
}
