//! In-memory state manager for testing
//!
//! Keeps the whole GDM behind a lock, with the same optimistic-
//! concurrency behavior as the disk store, plus knobs tests use: read and
//! write counts, the recorded audit trail, and injection of synthetic
//! conflicts or hard write failures.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;

use drover_core::{State, User};

use crate::error::{Result, StoreError};
use crate::manager::StateManager;

#[derive(Default)]
struct Inner {
    state: State,
    version: u64,
}

/// Shared in-memory store. `Clone` shares the same handle; use
/// [`MemoryStateManager::handle`] for an independent reader/writer over
/// the same store (as a second process would be).
#[derive(Clone, Default)]
pub struct MemoryStateManager {
    inner: Arc<RwLock<Inner>>,
    last_read: Arc<Mutex<u64>>,
    reads: Arc<AtomicUsize>,
    writes: Arc<AtomicUsize>,
    audit: Arc<Mutex<Vec<(u64, User)>>>,
    conflicts_to_inject: Arc<Mutex<u32>>,
    fail_next_write: Arc<Mutex<Option<String>>>,
}

impl MemoryStateManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: State) -> Self {
        let manager = Self::new();
        manager.inner.write().unwrap().state = state;
        manager
    }

    /// A second client of the same store, with its own read cursor.
    pub fn handle(&self) -> Self {
        let version = self.inner.read().unwrap().version;
        Self {
            inner: self.inner.clone(),
            last_read: Arc::new(Mutex::new(version)),
            reads: self.reads.clone(),
            writes: self.writes.clone(),
            audit: self.audit.clone(),
            conflicts_to_inject: self.conflicts_to_inject.clone(),
            fail_next_write: self.fail_next_write.clone(),
        }
    }

    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn version(&self) -> u64 {
        self.inner.read().unwrap().version
    }

    /// Users recorded by successful writes, in order.
    pub fn audit_trail(&self) -> Vec<(u64, User)> {
        self.audit.lock().unwrap().clone()
    }

    /// Make the next `n` writes fail with `ConcurrentUpdate` regardless of
    /// versions, to exercise retry loops.
    pub fn inject_conflicts(&self, n: u32) {
        *self.conflicts_to_inject.lock().unwrap() = n;
    }

    /// Make the next write fail hard with a storage error.
    pub fn fail_next_write(&self, message: impl Into<String>) {
        *self.fail_next_write.lock().unwrap() = Some(message.into());
    }
}

#[async_trait]
impl StateManager for MemoryStateManager {
    async fn read_state(&self) -> Result<State> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let inner = self.inner.read().unwrap();
        *self.last_read.lock().unwrap() = inner.version;
        Ok(inner.state.clone())
    }

    async fn write_state(&self, state: &State, user: &User) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);

        if let Some(message) = self.fail_next_write.lock().unwrap().take() {
            return Err(StoreError::Storage(message));
        }

        let last_read = *self.last_read.lock().unwrap();
        {
            let mut pending = self.conflicts_to_inject.lock().unwrap();
            if *pending > 0 {
                *pending -= 1;
                return Err(StoreError::ConcurrentUpdate {
                    read: last_read,
                    store: last_read + 1,
                });
            }
        }

        let mut inner = self.inner.write().unwrap();
        if inner.version != last_read {
            return Err(StoreError::ConcurrentUpdate {
                read: last_read,
                store: inner.version,
            });
        }
        inner.state = state.clone();
        inner.version += 1;
        *self.last_read.lock().unwrap() = inner.version;
        self.audit.lock().unwrap().push((inner.version, user.clone()));
        Ok(())
    }
}
