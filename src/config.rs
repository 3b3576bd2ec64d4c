//! Configuration Module
//!
//! Handles loading and managing cache configuration from environment variables.

use std::env;
use std::time::Duration;

use crate::error::{CacheError, Result};

/// Table used when none is configured.
pub const DEFAULT_TABLE_NAME: &str = "CacheServiceData";

/// Partition shared by every row of a cache instance when none is configured.
pub const DEFAULT_PARTITION_KEY: &str = "CacheService::PK";

/// `Expiration` column value for entries that never expire.
pub const EXPIRATION_NULL_SENTINEL: &str = "CacheService::Expiration::NULL";

/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Name of the remote table holding the cache rows
    pub table_name: String,
    /// Partition key namespacing this cache inside the table
    pub partition_key: String,
    /// Expiration applied by `set` when no explicit one is given, None = never
    pub default_expiration: Option<Duration>,
}

impl CacheConfig {
    /// Creates a new CacheConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_TABLE_NAME` - Remote table name (default: CacheServiceData)
    /// - `CACHE_PARTITION_KEY` - Partition key (default: CacheService::PK)
    /// - `CACHE_DEFAULT_EXPIRATION` - Default expiration in seconds, 0 = never (default: never)
    pub fn from_env() -> Self {
        Self {
            table_name: env::var("CACHE_TABLE_NAME")
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| DEFAULT_TABLE_NAME.to_string()),
            partition_key: env::var("CACHE_PARTITION_KEY")
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| DEFAULT_PARTITION_KEY.to_string()),
            default_expiration: env::var("CACHE_DEFAULT_EXPIRATION")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
        }
    }

    pub fn with_table_name(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = table_name.into();
        self
    }

    pub fn with_partition_key(mut self, partition_key: impl Into<String>) -> Self {
        self.partition_key = partition_key.into();
        self
    }

    pub fn with_default_expiration(mut self, expiration: Option<Duration>) -> Self {
        self.default_expiration = expiration;
        self
    }

    // == Validate ==
    /// Rejects configurations the remote table cannot address.
    pub fn validate(&self) -> Result<()> {
        if self.table_name.trim().is_empty() {
            return Err(CacheError::InvalidConfig(
                "table name cannot be empty".to_string(),
            ));
        }
        if self.partition_key.is_empty() {
            return Err(CacheError::InvalidConfig(
                "partition key cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            table_name: DEFAULT_TABLE_NAME.to_string(),
            partition_key: DEFAULT_PARTITION_KEY.to_string(),
            default_expiration: None,
        }
    }
}
