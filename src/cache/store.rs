//! Local Store Module
//!
//! In-memory key to entry mapping with lazy expiration.

use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use tracing::debug;

use crate::cache::{CacheEntry, Flatten};
use crate::error::{CacheError, Result};

// == Local Store ==
/// In-memory cache storage with lazy expiration.
///
/// Not internally synchronized. Callers sharing a store across tasks wrap it
/// in a lock, the same way they would any other `&mut` API.
#[derive(Debug, Default)]
pub struct LocalStore {
    /// Key-value storage
    entries: HashMap<String, CacheEntry>,
    /// Expiration used by `set` when none is given
    default_expiration: Option<Duration>,
}

impl LocalStore {
    // == Constructor ==
    /// Creates an empty LocalStore.
    ///
    /// # Arguments
    /// * `default_expiration` - Expiration applied by [`set`](Self::set), None = never
    pub fn new(default_expiration: Option<Duration>) -> Self {
        Self {
            entries: HashMap::new(),
            default_expiration,
        }
    }

    // == Has ==
    /// Returns whether a live entry exists for `key`.
    ///
    /// An entry whose expiration is at or before the current time is evicted
    /// as a side effect and reported as absent.
    pub fn has(&mut self, key: &str) -> bool {
        let expired = match self.entries.get(key) {
            None => return false,
            Some(entry) => entry.is_expired_at(Utc::now()),
        };

        if expired {
            self.entries.remove(key);
            debug!(key, "evicted expired entry");
            return false;
        }

        true
    }

    // == Get ==
    /// Retrieves the value stored under `key`.
    ///
    /// The value stays owned by the store.
    pub fn get(&mut self, key: &str) -> Result<&dyn Flatten> {
        if !self.has(key) {
            return Err(CacheError::NotFound(key.to_string()));
        }

        self.entries
            .get(key)
            .map(|entry| entry.value.as_ref())
            .ok_or_else(|| CacheError::NotFound(key.to_string()))
    }

    // == Set ==
    /// Stores a value with the configured default expiration.
    pub fn set<V: Flatten + 'static>(&mut self, key: impl Into<String>, value: V) {
        self.set_with_expiration(key, value, self.default_expiration);
    }

    /// Stores a value, overwriting any existing entry.
    ///
    /// # Arguments
    /// * `key` - The key to store
    /// * `value` - The value to store
    /// * `expiration` - Relative expiration from now, None = never expires
    pub fn set_with_expiration<V: Flatten + 'static>(
        &mut self,
        key: impl Into<String>,
        value: V,
        expiration: Option<Duration>,
    ) {
        self.insert_entry(key.into(), CacheEntry::new(Box::new(value), expiration));
    }

    /// Stores a fully built entry, overwriting any existing one.
    pub fn insert_entry(&mut self, key: String, entry: CacheEntry) {
        self.entries.insert(key, entry);
    }

    // == Expire ==
    /// Removes `key`. Absent keys are ignored.
    pub fn expire(&mut self, key: &str) {
        self.entries.remove(key);
    }

    // == Clear ==
    /// Removes every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    // == Evict Expired ==
    /// Removes all expired entries from the store.
    ///
    /// Returns the number of entries removed.
    pub fn evict_expired(&mut self) -> usize {
        let now = Utc::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired_at(now));
        before - self.entries.len()
    }

    /// Iterates over every physically present entry, expired or not.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &CacheEntry)> {
        self.entries.iter()
    }

    // == Length ==
    /// Returns the number of physically present entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn default_expiration(&self) -> Option<Duration> {
        self.default_expiration
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::FlatMap;
    use chrono::TimeDelta;

    fn flat(pairs: &[(&str, &str)]) -> FlatMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_store_new() {
        let store = LocalStore::new(None);
        assert_eq!(store.len(), 0);
        assert!(store.is_empty());
    }

    #[test]
    fn test_store_set_and_get() {
        let mut store = LocalStore::new(None);

        store.set("key1", flat(&[("x", "1")]));
        let value = store.get("key1").unwrap();

        assert_eq!(value.flatten(), flat(&[("x", "1")]));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_store_get_nonexistent() {
        let mut store = LocalStore::new(None);

        assert!(!store.has("nonexistent"));
        let result = store.get("nonexistent");
        assert!(matches!(result, Err(CacheError::NotFound(key)) if key == "nonexistent"));
    }

    #[test]
    fn test_store_expire() {
        let mut store = LocalStore::new(None);

        store.set("key1", flat(&[("x", "1")]));
        store.expire("key1");

        assert!(store.is_empty());
        assert!(matches!(store.get("key1"), Err(CacheError::NotFound(_))));

        // Expiring again is a no-op
        store.expire("key1");
        assert!(store.is_empty());
    }

    #[test]
    fn test_store_overwrite() {
        let mut store = LocalStore::new(None);

        store.set_with_expiration("key1", flat(&[("x", "1")]), Some(Duration::from_secs(60)));
        store.set("key1", flat(&[("y", "2")]));

        let value = store.get("key1").unwrap().flatten();
        assert_eq!(value, flat(&[("y", "2")]));
        assert_eq!(store.len(), 1);
        // Overwrite replaces the expiration too
        assert!(store.iter().all(|(_, e)| e.expires_at.is_none()));
    }

    #[test]
    fn test_store_default_expiration() {
        let mut store = LocalStore::new(Some(Duration::from_secs(3600)));

        store.set("key1", flat(&[("x", "1")]));
        store.set_with_expiration("key2", flat(&[("x", "1")]), None);

        let entries: HashMap<&str, &CacheEntry> =
            store.iter().map(|(k, e)| (k.as_str(), e)).collect();
        assert!(entries["key1"].expires_at.is_some());
        assert!(entries["key2"].expires_at.is_none());
    }

    #[test]
    fn test_store_lazy_eviction_on_has() {
        let mut store = LocalStore::new(None);
        let past = Utc::now() - TimeDelta::seconds(1);
        store.insert_entry(
            "old".to_string(),
            CacheEntry::with_expires_at(Box::new(flat(&[("x", "1")])), Some(past)),
        );

        // Physically present until accessed
        assert_eq!(store.len(), 1);
        assert!(!store.has("old"));
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn test_store_boundary_counts_as_expired() {
        let mut store = LocalStore::new(None);
        let now = Utc::now();
        store.insert_entry(
            "edge".to_string(),
            CacheEntry::with_expires_at(Box::new(flat(&[])), Some(now)),
        );

        assert!(matches!(store.get("edge"), Err(CacheError::NotFound(_))));
    }

    #[test]
    fn test_store_zero_expiration_is_immediately_absent() {
        let mut store = LocalStore::new(None);
        store.set_with_expiration("key1", flat(&[("x", "1")]), Some(Duration::ZERO));

        assert!(!store.has("key1"));
    }

    #[test]
    fn test_store_clear() {
        let mut store = LocalStore::new(None);
        store.set("a", flat(&[("x", "1")]));
        store.set("b", flat(&[("y", "2")]));

        store.clear();
        assert!(store.is_empty());
        store.clear();
        assert!(store.is_empty());
    }

    #[test]
    fn test_store_evict_expired() {
        let mut store = LocalStore::new(None);
        let past = Utc::now() - TimeDelta::seconds(1);

        store.insert_entry(
            "old".to_string(),
            CacheEntry::with_expires_at(Box::new(flat(&[])), Some(past)),
        );
        store.set_with_expiration("fresh", flat(&[]), Some(Duration::from_secs(10)));
        store.set("forever", flat(&[]));

        let removed = store.evict_expired();
        assert_eq!(removed, 1);
        assert_eq!(store.len(), 2);
        assert!(store.has("fresh"));
        assert!(store.has("forever"));
    }
}
