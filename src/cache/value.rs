//! Cache Value Module
//!
//! Defines the flattening contract every cached value implements.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Debug;

use serde::Serialize;
use serde_json::Value;

use crate::error::{CacheError, Result};

/// Flat column-name to column-value mapping, the wire form of a cached value.
pub type FlatMap = HashMap<String, String>;

// == Flatten ==
/// Conversion of a value into flat string columns.
///
/// Every type stored in the cache implements this. The conversion must be
/// deterministic: flattening the same value twice yields equal maps. Column
/// names must be non-empty and must not collide with the reserved row fields,
/// otherwise encoding the entry fails. Values
/// pulled back from the remote table are always materialized as [`FlatMap`],
/// so richer types are rebuilt by the caller from the flattened form.
pub trait Flatten: Debug + Send + Sync {
    fn flatten(&self) -> FlatMap;
}

impl Flatten for HashMap<String, String> {
    fn flatten(&self) -> FlatMap {
        self.clone()
    }
}

impl Flatten for BTreeMap<String, String> {
    fn flatten(&self) -> FlatMap {
        self.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }
}

// == Serde Flattening ==
/// Flattens any serializable struct through its serde representation.
///
/// Top-level fields become columns. Strings are written verbatim, other
/// scalars and nested values as their JSON text. Null fields are omitted.
///
/// Intended as a building block for `Flatten` impls on plain data types.
/// A derived `Serialize` on a struct with named fields always yields an
/// object, so the only error left is a failing custom field serializer:
///
/// ```ignore
/// impl Flatten for Session {
///     fn flatten(&self) -> FlatMap {
///         flatten_serialize(self).expect("Session derives Serialize with named fields")
///     }
/// }
/// ```
pub fn flatten_serialize<T: Serialize>(value: &T) -> Result<FlatMap> {
    let json = serde_json::to_value(value).map_err(|e| CacheError::Unflattenable(e.to_string()))?;

    let fields = match json {
        Value::Object(fields) => fields,
        other => {
            return Err(CacheError::Unflattenable(format!(
                "expected a struct or map, got {}",
                other
            )))
        }
    };

    let flat = fields
        .into_iter()
        .filter_map(|(name, field)| match field {
            Value::Null => None,
            Value::String(s) => Some((name, s)),
            other => Some((name, other.to_string())),
        })
        .collect();

    Ok(flat)
}
