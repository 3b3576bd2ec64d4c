//! Table Cache - An in-memory TTL cache backed by a remote table store
//!
//! Values live in a local map with lazy expiration and are reconciled with a
//! partition of a remote key-value table when `synchronize` is called.

pub mod cache;
pub mod config;
pub mod error;

pub use cache::{CacheService, Flatten, FlatMap, MemoryTableStore, MergeMode, SyncReport, TableStore};
pub use config::CacheConfig;
pub use error::{CacheError, Result};
