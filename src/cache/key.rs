//! Cache keys.

use std::fmt;

/// Something that can be turned into a stable cache key.
///
/// Implementors decide what goes into the fingerprint. Two values that should
/// share a cache entry must produce the same `cache_hash`.
pub trait QueryKey {
  /// Stable, fixed-length fingerprint used as the storage key.
  fn cache_hash(&self) -> String;

  /// Human readable description, stored alongside the entry for debugging.
  fn description(&self) -> String;
}

/// A resolved cache key: the fingerprint plus its description.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
  hash: String,
  description: String,
}

impl CacheKey {
  pub fn new(query: &impl QueryKey) -> Self {
    Self {
      hash: query.cache_hash(),
      description: query.description(),
    }
  }

  pub fn as_str(&self) -> &str {
    &self.hash
  }

  pub fn description(&self) -> &str {
    &self.description
  }
}

impl fmt::Display for CacheKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let short: String = self.hash.chars().take(12).collect();
    write!(f, "{} ({})", self.description, short)
  }
}
