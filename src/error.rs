//! Error types for the table cache
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

use crate::cache::RemoteError;

// == Cache Error Enum ==
/// Unified error type for the table cache.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Key absent, or expired at the time of the lookup
    #[error("Cache item with key \"{0}\" not found")]
    NotFound(String),

    /// Remote row is missing its `Expiration` column
    #[error("Malformed row \"{row_key}\": missing Expiration column")]
    MalformedRow { row_key: String },

    /// Remote row belongs to another partition
    #[error("Partition key mismatch for row \"{row_key}\": expected \"{expected}\", found \"{found}\"")]
    PartitionMismatch {
        row_key: String,
        expected: String,
        found: String,
    },

    /// Expiration column could not be parsed as a timestamp
    #[error("Malformed expiration timestamp \"{value}\" for row \"{row_key}\"")]
    MalformedTimestamp {
        row_key: String,
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    /// Flattened value uses a column name reserved by the row schema
    #[error("Value for key \"{key}\" uses reserved column \"{column}\"")]
    ReservedColumn { key: String, column: String },

    /// Flattened value has a column with an empty name
    #[error("Value for key \"{key}\" has a column with an empty name")]
    EmptyColumnName { key: String },

    /// Value could not be flattened into string columns
    #[error("Value cannot be flattened: {0}")]
    Unflattenable(String),

    /// Insert-only write hit a row that should have been deleted first
    #[error("Row \"{key}\" still exists in the remote table after the delete phase")]
    InsertConflict { key: String },

    /// Synchronization was cancelled before it completed
    #[error("Synchronization cancelled")]
    Cancelled,

    /// Configuration rejected at construction
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Remote table failure, passed through unmodified
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

// == Result Type Alias ==
/// Convenience Result type for the table cache.
pub type Result<T> = std::result::Result<T, CacheError>;
