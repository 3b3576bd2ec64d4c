//! Remote Table Module
//!
//! The narrow contract the cache needs from a remote row store.

use std::collections::BTreeMap;
use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Column carrying the entry expiration.
pub const EXPIRATION_COLUMN: &str = "Expiration";
/// Column name reserved for the partition key.
pub const PARTITION_KEY_COLUMN: &str = "PartitionKey";
/// Column name reserved for the row key.
pub const ROW_KEY_COLUMN: &str = "RowKey";

/// Column names a flattened value may not use.
pub const RESERVED_COLUMNS: [&str; 3] = [EXPIRATION_COLUMN, PARTITION_KEY_COLUMN, ROW_KEY_COLUMN];

#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("Table not found: {0}")]
    TableNotFound(String),
    #[error("Row already exists: {partition_key}/{row_key}")]
    Conflict {
        partition_key: String,
        row_key: String,
    },
    #[error("Remote backend error: {0}")]
    Backend(String),
}

// == Table Row ==
/// One row of the remote table.
///
/// `None` column values model nulls, which the remote store can hold but
/// the cache never writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRow {
    pub partition_key: String,
    pub row_key: String,
    pub columns: BTreeMap<String, Option<String>>,
}

impl TableRow {
    pub fn new(partition_key: impl Into<String>, row_key: impl Into<String>) -> Self {
        Self {
            partition_key: partition_key.into(),
            row_key: row_key.into(),
            columns: BTreeMap::new(),
        }
    }

    /// Adds a non-null column, builder style.
    pub fn with_column(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.columns.insert(name.into(), Some(value.into()));
        self
    }

    /// Value of a non-null column.
    pub fn column(&self, name: &str) -> Option<&str> {
        self.columns.get(name).and_then(|v| v.as_deref())
    }
}

/// Lazily paged sequence of rows. Each call to `query_all` starts a fresh pass.
pub type RowStream<'a> = Pin<Box<dyn Stream<Item = Result<TableRow, RemoteError>> + Send + 'a>>;

// == Table Store ==
/// Remote row store consumed by the sync engine.
///
/// Retry, backoff and authentication live behind this trait; errors are
/// handed back to the caller of `synchronize` unchanged.
#[async_trait]
pub trait TableStore: Send + Sync {
    /// Creates the table if it does not exist. Safe to call repeatedly.
    async fn ensure_table(&self, table: &str) -> Result<(), RemoteError>;

    /// Every row of the table, across all partitions, paged internally.
    fn query_all<'a>(&'a self, table: &'a str) -> RowStream<'a>;

    /// Create-or-replace.
    async fn upsert(&self, table: &str, row: TableRow) -> Result<(), RemoteError>;

    /// Create-only. An existing row yields [`RemoteError::Conflict`].
    async fn insert(&self, table: &str, row: TableRow) -> Result<(), RemoteError>;

    /// Removes a row. Missing rows are not an error.
    async fn delete(&self, table: &str, partition_key: &str, row_key: &str)
        -> Result<(), RemoteError>;
}
