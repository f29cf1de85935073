//! Error taxonomy shared by the fetch, merge and read paths.

use std::time::Duration;

/// Errors raised by the cache storage backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
  #[error("sqlite error: {0}")]
  Sqlite(#[from] rusqlite::Error),
  #[error("failed to (de)serialize cache value: {0}")]
  Serde(#[from] serde_json::Error),
  #[error("cache lock poisoned")]
  Poisoned,
  #[error("failed to create cache directory {path}: {source}")]
  Io {
    path: String,
    #[source]
    source: std::io::Error,
  },
}

/// Errors raised while refreshing or reading cached resources.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
  /// Unknown resource kind or malformed query parameters. Raised before any I/O.
  #[error("configuration error: {0}")]
  Configuration(String),
  /// A page request failed. Pages merged before the failure stay committed.
  #[error("request to {endpoint} failed: {message}")]
  Transport { endpoint: String, message: String },
  /// The blocking reader gave up waiting for the key to be populated.
  #[error("no cached data after waiting {waited:?}")]
  CacheTimeout { waited: Duration },
  #[error(transparent)]
  Store(#[from] StoreError),
}

impl SyncError {
  pub fn transport(endpoint: impl Into<String>, message: impl std::fmt::Display) -> Self {
    Self::Transport {
      endpoint: endpoint.into(),
      message: message.to_string(),
    }
  }
}
