//! Cache Service Module
//!
//! Public facade pairing a [`LocalStore`] with a [`SyncEngine`].

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::cache::{Flatten, LocalStore, MergeMode, RowCodec, SyncEngine, SyncReport, TableStore};
use crate::config::CacheConfig;
use crate::error::Result;

// == Cache Service ==
/// Key-value cache persisted to a remote table on demand.
///
/// Local operations never touch the remote table. Only
/// [`synchronize`](Self::synchronize) does, and only when called.
///
/// A service has a single owner. Sharing one across tasks requires an
/// external lock, and at most one synchronization may run at a time.
#[derive(Debug)]
pub struct CacheService {
    store: LocalStore,
    engine: SyncEngine,
    config: CacheConfig,
}

impl CacheService {
    // == Constructor ==
    /// Creates an empty cache bound to `config.table_name` and `config.partition_key`.
    ///
    /// # Arguments
    /// * `remote` - Client for the remote table store
    /// * `config` - Table, partition and default expiration settings
    pub fn new(remote: Arc<dyn TableStore>, config: CacheConfig) -> Result<Self> {
        config.validate()?;

        let codec = RowCodec::new(config.partition_key.clone());
        let engine = SyncEngine::new(remote, codec, config.table_name.clone());

        Ok(Self {
            store: LocalStore::new(config.default_expiration),
            engine,
            config,
        })
    }

    /// Creates a cache with the default table, partition and no default expiration.
    pub fn with_defaults(remote: Arc<dyn TableStore>) -> Result<Self> {
        Self::new(remote, CacheConfig::default())
    }

    /// Returns whether `key` holds a live value, evicting it if expired.
    pub fn has(&mut self, key: &str) -> bool {
        self.store.has(key)
    }

    /// Returns the value for `key`, or `NotFound` if it is absent or expired.
    pub fn get(&mut self, key: &str) -> Result<&dyn Flatten> {
        self.store.get(key)
    }

    /// Stores `value` with the configured default expiration.
    pub fn set<V: Flatten + 'static>(&mut self, key: impl Into<String>, value: V) {
        self.store.set(key, value);
    }

    /// Stores `value` expiring after `expiration`, or never when None.
    pub fn set_with_expiration<V: Flatten + 'static>(
        &mut self,
        key: impl Into<String>,
        value: V,
        expiration: Option<Duration>,
    ) {
        self.store.set_with_expiration(key, value, expiration);
    }

    pub fn expire(&mut self, key: &str) {
        self.store.expire(key);
    }

    pub fn clear(&mut self) {
        self.store.clear();
    }

    // == Synchronize ==
    /// Reconciles the local store with the remote partition.
    ///
    /// Not transactional: on error, both sides may hold a partially
    /// synchronized state. Run the pass again to converge.
    pub async fn synchronize(&mut self, mode: MergeMode) -> Result<SyncReport> {
        self.synchronize_with_cancel(mode, &CancellationToken::new()).await
    }

    /// Like [`synchronize`](Self::synchronize), stopping with `Cancelled` once
    /// `cancel` fires. Completed steps are kept.
    pub async fn synchronize_with_cancel(
        &mut self,
        mode: MergeMode,
        cancel: &CancellationToken,
    ) -> Result<SyncReport> {
        self.engine.run(&mut self.store, mode, cancel).await
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}
