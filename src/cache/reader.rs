//! Blocking reader for consumers that must never touch the network.

use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::key::CacheKey;
use super::storage::CacheRead;
use crate::error::SyncError;

/// Default number of polls before giving up, whatever the wait budget.
pub const DEFAULT_MAX_POLLS: u32 = 1000;

/// Polls the store until an entry appears or the wait budget runs out.
pub struct CacheReader<S> {
  store: Arc<S>,
  poll_interval: Duration,
  max_polls: u32,
}

impl<S: CacheRead> CacheReader<S> {
  pub fn new(store: Arc<S>, poll_interval: Duration) -> Self {
    Self {
      store,
      poll_interval,
      max_polls: DEFAULT_MAX_POLLS,
    }
  }

  pub fn with_max_polls(mut self, max_polls: u32) -> Self {
    self.max_polls = max_polls.max(1);
    self
  }

  /// Read the entry at `key` without waiting.
  pub fn read<T: DeserializeOwned>(&self, key: &CacheKey) -> Result<Option<Vec<T>>, SyncError> {
    Ok(self.store.get(key)?)
  }

  /// Read the entry at `key`, waiting up to `max_wait` for a refresh to
  /// populate it.
  pub async fn read_blocking<T: DeserializeOwned>(
    &self,
    key: &CacheKey,
    max_wait: Duration,
  ) -> Result<Vec<T>, SyncError> {
    let started = Instant::now();
    let mut polls = 0u32;

    loop {
      if let Some(items) = self.read(key)? {
        debug!(key = %key, polls, "cache hit");
        return Ok(items);
      }

      polls += 1;
      let waited = started.elapsed();
      if waited >= max_wait || polls >= self.max_polls {
        warn!(key = %key, polls, ?waited, "gave up waiting for cache");
        return Err(SyncError::CacheTimeout { waited });
      }

      debug!(key = %key, polls, "nothing cached yet");
      tokio::time::sleep(self.poll_interval.min(max_wait - waited)).await;
    }
  }
}
