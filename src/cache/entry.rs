//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with expiration support.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use crate::cache::{FlatMap, Flatten};

// == Cache Entry ==
/// Represents a single cache entry with its value and absolute expiration.
#[derive(Debug)]
pub struct CacheEntry {
    /// The stored value
    pub value: Box<dyn Flatten>,
    /// Absolute expiration instant, None = no expiration
    pub expires_at: Option<DateTime<Utc>>,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new cache entry expiring `expiration` from now.
    ///
    /// # Arguments
    /// * `value` - The value to store
    /// * `expiration` - Optional relative expiration
    pub fn new(value: Box<dyn Flatten>, expiration: Option<Duration>) -> Self {
        let expires_at = expiration.map(|d| expiration_from(Utc::now(), d));
        Self { value, expires_at }
    }

    /// Creates an entry with an already absolute expiration.
    pub fn with_expires_at(value: Box<dyn Flatten>, expires_at: Option<DateTime<Utc>>) -> Self {
        Self { value, expires_at }
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// Boundary condition: an entry is expired once the current time is
    /// greater than or equal to the expiration time.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Same as [`is_expired`](Self::is_expired) against a fixed instant.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires) => now >= expires,
            None => false,
        }
    }

    // == Time To Live ==
    /// Returns remaining time before expiration, or None if no expiration is set.
    ///
    /// # Returns
    /// - `Some(Duration::ZERO)` if the entry has expired
    /// - `Some(remaining)` if the entry has an expiration that hasn't elapsed
    /// - `None` if the entry never expires
    pub fn ttl_remaining(&self) -> Option<Duration> {
        self.expires_at.map(|expires| {
            (expires - Utc::now()).to_std().unwrap_or(Duration::ZERO)
        })
    }

    /// Flattened form of the stored value.
    pub fn flatten(&self) -> FlatMap {
        self.value.flatten()
    }
}

// == Utility Functions ==
/// Unix seconds of 9999-12-31T23:59:59Z, the last second with a four-digit year.
const MAX_EXPIRATION_SECS: i64 = 253_402_300_799;

/// Latest expiration an entry can carry: `9999-12-31T23:59:59.999999999Z`.
///
/// Later instants format with an expanded year that RFC 3339 readers reject.
pub fn max_expiration() -> DateTime<Utc> {
    DateTime::from_timestamp(MAX_EXPIRATION_SECS, 999_999_999).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Adds a relative expiration to `now`, saturating at [`max_expiration`].
pub fn expiration_from(now: DateTime<Utc>, expiration: Duration) -> DateTime<Utc> {
    let ceiling = max_expiration();
    TimeDelta::from_std(expiration)
        .ok()
        .and_then(|delta| now.checked_add_signed(delta))
        .map_or(ceiling, |at| at.min(ceiling))
}
