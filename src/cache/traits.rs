//! Core traits for the caching system.

use serde::{de::DeserializeOwned, Serialize};

/// Trait for values stored in a cached item list.
///
/// The identity returned by `cache_key` is the only deduplication key: two
/// values with the same identity never coexist in one cache entry.
pub trait Cacheable: Clone + Send + Sync + Serialize + DeserializeOwned {
  /// Unique identifier for this value within its list (e.g. the record id).
  fn cache_key(&self) -> &str;
}
