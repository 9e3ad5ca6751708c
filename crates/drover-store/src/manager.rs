//! The StateManager contract

use async_trait::async_trait;

use drover_core::{State, User};

use crate::error::Result;

/// Boundary to the GDM store.
///
/// A manager hands out whole-state copies and persists whole-state
/// replacements. Writes are optimistic: `write_state` fails with
/// `StoreError::ConcurrentUpdate` when the in-store version has advanced
/// since this manager's last `read_state`, and callers are expected to
/// re-read and retry. Every write records the acting `user` for audit.
///
/// Implementations must be safe for concurrent use.
#[async_trait]
pub trait StateManager: Send + Sync {
    async fn read_state(&self) -> Result<State>;

    async fn write_state(&self, state: &State, user: &User) -> Result<()>;
}
