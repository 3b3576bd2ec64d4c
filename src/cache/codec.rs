//! Row Codec Module
//!
//! Translates between cache entries and remote table rows.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};

use crate::cache::remote::{EXPIRATION_COLUMN, RESERVED_COLUMNS};
use crate::cache::{max_expiration, CacheEntry, FlatMap, TableRow};
use crate::config::EXPIRATION_NULL_SENTINEL;
use crate::error::{CacheError, Result};

// == Row Codec ==
/// Encodes entries into rows of one partition and decodes them back.
#[derive(Debug, Clone)]
pub struct RowCodec {
    partition_key: String,
}

impl RowCodec {
    pub fn new(partition_key: impl Into<String>) -> Self {
        Self {
            partition_key: partition_key.into(),
        }
    }

    pub fn partition_key(&self) -> &str {
        &self.partition_key
    }

    // == Encode ==
    /// Builds the row for `key`.
    ///
    /// Columns with an empty name, or named after a reserved row field,
    /// are rejected. Expirations past [`max_expiration`] are written as it.
    pub fn encode(&self, key: &str, entry: &CacheEntry) -> Result<TableRow> {
        let expiration = match entry.expires_at {
            Some(at) => format_expiration(at),
            None => EXPIRATION_NULL_SENTINEL.to_string(),
        };

        let mut row = TableRow::new(&self.partition_key, key).with_column(EXPIRATION_COLUMN, expiration);

        for (name, value) in entry.flatten() {
            if name.is_empty() {
                return Err(CacheError::EmptyColumnName {
                    key: key.to_string(),
                });
            }
            if RESERVED_COLUMNS.contains(&name.as_str()) {
                return Err(CacheError::ReservedColumn {
                    key: key.to_string(),
                    column: name,
                });
            }
            row.columns.insert(name, Some(value));
        }

        Ok(row)
    }

    // == Decode ==
    /// Rebuilds `(key, entry)` from a row. The value comes back as a [`FlatMap`].
    pub fn decode(&self, row: TableRow) -> Result<(String, CacheEntry)> {
        let Some(expiration) = row.column(EXPIRATION_COLUMN).map(str::to_string) else {
            return Err(CacheError::MalformedRow {
                row_key: row.row_key,
            });
        };

        if row.partition_key != self.partition_key {
            return Err(CacheError::PartitionMismatch {
                row_key: row.row_key,
                expected: self.partition_key.clone(),
                found: row.partition_key,
            });
        }

        let expires_at = if expiration == EXPIRATION_NULL_SENTINEL {
            None
        } else {
            let parsed = parse_expiration(&expiration).map_err(|source| CacheError::MalformedTimestamp {
                row_key: row.row_key.clone(),
                value: expiration.clone(),
                source,
            })?;
            Some(parsed)
        };

        let value: FlatMap = row
            .columns
            .into_iter()
            .filter(|(name, _)| !RESERVED_COLUMNS.contains(&name.as_str()))
            .filter_map(|(name, value)| value.map(|v| (name, v)))
            .collect();

        Ok((row.row_key, CacheEntry::with_expires_at(Box::new(value), expires_at)))
    }
}

// == Timestamp Format ==
/// RFC 3339 with nanosecond precision, so expirations survive a round trip exactly.
pub fn format_expiration(at: DateTime<Utc>) -> String {
    at.min(max_expiration()).to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Parses an RFC 3339 timestamp, falling back to an offset-less form read as UTC.
pub fn parse_expiration(value: &str) -> std::result::Result<DateTime<Utc>, chrono::ParseError> {
    let value = value.trim();
    match DateTime::parse_from_rfc3339(value) {
        Ok(dt) => Ok(dt.with_timezone(&Utc)),
        Err(err) => NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|naive| naive.and_utc())
            .map_err(|_| err),
    }
}
