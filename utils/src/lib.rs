//! Shared infrastructure utilities for Rollback.
//!
//! This crate provides cross-cutting utilities that the store and engine both need
//! but that don't belong in the domain-pure `rollback-types` crate:
//!
//! - **`atomic_write`**: Crash-safe file persistence (temp + rename)
//! - **`diff`**: Unified diff patches and stats

pub mod atomic_write;
pub mod diff;

pub use atomic_write::{
    AtomicWriteOptions, FileSyncPolicy, PersistMode, TEMP_PREFIX, atomic_write,
    atomic_write_with_options, remove_stale_temp_files,
};
pub use diff::{DiffStats, diff_stats, pending_patch, unified_patch};
