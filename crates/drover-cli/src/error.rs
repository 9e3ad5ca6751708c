//! CLI error types with exit code handling
//!
//! Errors arriving from the core crates are folded into a small set of
//! operator-facing kinds, each with its own exit code so scripts can tell
//! a parse failure from a lost optimistic-concurrency race.

use miette::Diagnostic;
use thiserror::Error;

use drover_core::CoreError;
use drover_engine::EngineError;
use drover_store::StoreError;

use crate::exit_codes;

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    /// A source identity or manifest id did not parse
    #[error("{message}")]
    #[diagnostic(code(drover::cli::parse))]
    Parse { message: String },

    /// The request contradicts the GDM invariants
    #[error("{message}")]
    #[diagnostic(code(drover::cli::validation))]
    Validation { message: String },

    /// The state store is missing, corrupt, or unwritable
    #[error("{message}")]
    #[diagnostic(code(drover::cli::state))]
    State { message: String },

    /// Concurrent updates exhausted the retry budget
    #[error("{message}")]
    #[diagnostic(code(drover::cli::conflict), help("another operator is writing the GDM; re-run the update"))]
    Conflict { message: String },

    /// Internal error (runtime, unexpected failure)
    #[error("Internal error: {message}")]
    #[diagnostic(code(drover::cli::internal))]
    Internal { message: String },
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Parse { .. } => exit_codes::PARSE_ERROR,
            CliError::Validation { .. } => exit_codes::VALIDATION_ERROR,
            CliError::State { .. } => exit_codes::STATE_ERROR,
            CliError::Conflict { .. } => exit_codes::CONFLICT_ERROR,
            CliError::Internal { .. } => exit_codes::ERROR,
        }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn state(message: impl Into<String>) -> Self {
        Self::State {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match &err {
            CoreError::MissingRepo { .. }
            | CoreError::MissingVersion { .. }
            | CoreError::IncludesVersion { .. }
            | CoreError::AmbiguousName { .. }
            | CoreError::Version(_) => Self::parse(err.to_string()),
            CoreError::UnknownCluster(_)
            | CoreError::DuplicateManifest(_)
            | CoreError::InvalidManifest(_)
            | CoreError::InvalidState(_) => Self::validation(err.to_string()),
            CoreError::Yaml(_) => Self::state(err.to_string()),
        }
    }
}

impl From<StoreError> for CliError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ConcurrentUpdate { .. } => Self::Conflict {
                message: err.to_string(),
            },
            StoreError::Core(core) => core.into(),
            other => Self::state(other.to_string()),
        }
    }
}

impl From<EngineError> for CliError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::InvalidDeployId(_) => Self::validation(err.to_string()),
            EngineError::Core(core) => core.into(),
            EngineError::Store(store) => store.into(),
            other => Self::internal(other.to_string()),
        }
    }
}
