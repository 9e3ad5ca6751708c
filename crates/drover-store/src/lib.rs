//! Drover Store - persistence for the Global Deployment Manifest
//!
//! This crate provides:
//! - **StateManager**: the contract the update loop writes through, with
//!   optimistic-concurrency semantics
//! - **DiskStateManager**: the on-disk YAML store (`defs.yaml` plus one
//!   file per manifest) with whole-state atomic writes and an audit log
//! - **MemoryStateManager**: an in-memory driver for tests, with operation
//!   counts and error injection

pub mod error;
pub mod manager;
pub mod disk;
pub mod memory;

pub use error::{Result, StoreError};
pub use manager::StateManager;
pub use disk::DiskStateManager;
pub use memory::MemoryStateManager;
