//! Error types for the state store

use thiserror::Error;

use drover_core::CoreError;

/// Result type for store operations
pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Core(#[from] CoreError),

    /// The in-store version advanced since this manager last read. The
    /// only error the update loop retries.
    #[error("concurrent update: state version advanced from {read} to {store}")]
    ConcurrentUpdate { read: u64, store: u64 },

    #[error("state store at {path} is not initialized\nHint: run `drover init` first")]
    NotInitialized { path: String },

    #[error("state store at {path} is already initialized")]
    AlreadyInitialized { path: String },

    #[error("storage error: {0}")]
    Storage(String),
}

impl StoreError {
    pub fn is_concurrent_update(&self) -> bool {
        matches!(self, StoreError::ConcurrentUpdate { .. })
    }
}
