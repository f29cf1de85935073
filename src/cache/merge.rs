//! Incremental merge of freshly formatted items into a cached list.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::key::CacheKey;
use super::storage::CacheStore;
use super::traits::Cacheable;
use crate::error::StoreError;

/// Ordered list of items indexed by identity.
///
/// Items keep the position where their identity was first seen. Upserting an
/// identity that is already present replaces the item in place.
#[derive(Debug, Clone)]
pub struct ItemIndex<T> {
  items: Vec<T>,
  positions: HashMap<String, usize>,
}

impl<T: Cacheable> ItemIndex<T> {
  pub fn new() -> Self {
    Self {
      items: Vec::new(),
      positions: HashMap::new(),
    }
  }

  /// Build an index from a list that may contain duplicates. Later items win.
  pub fn from_items(items: impl IntoIterator<Item = T>) -> Self {
    let mut index = Self::new();
    for item in items {
      index.upsert(item);
    }
    index
  }

  /// Insert or replace an item. Returns `true` when the identity is new.
  pub fn upsert(&mut self, item: T) -> bool {
    match self.positions.get(item.cache_key()) {
      Some(&pos) => {
        self.items[pos] = item;
        false
      }
      None => {
        self.positions.insert(item.cache_key().to_string(), self.items.len());
        self.items.push(item);
        true
      }
    }
  }

  /// Keep only items whose identity is in `live`. Returns how many were removed.
  pub fn retain_live(&mut self, live: &HashSet<String>) -> usize {
    let before = self.items.len();
    self.items.retain(|item| live.contains(item.cache_key()));
    self.positions = self
      .items
      .iter()
      .enumerate()
      .map(|(pos, item)| (item.cache_key().to_string(), pos))
      .collect();
    before - self.items.len()
  }

  #[cfg(test)]
  pub fn get(&self, key: &str) -> Option<&T> {
    self.positions.get(key).map(|&pos| &self.items[pos])
  }

  #[cfg(test)]
  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn into_items(self) -> Vec<T> {
    self.items
  }
}

impl<T: Cacheable> Default for ItemIndex<T> {
  fn default() -> Self {
    Self::new()
  }
}

/// Merge `new_items` over `previous`: one item per identity, newest wins.
#[allow(dead_code)]
pub fn merge_items<T: Cacheable>(previous: Vec<T>, new_items: Vec<T>) -> Vec<T> {
  let mut index = ItemIndex::from_items(previous);
  for item in new_items {
    index.upsert(item);
  }
  index.into_items()
}

/// Counters reported by a page merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
  pub added: usize,
  pub replaced: usize,
  pub total: usize,
}

/// Applies page merges and the final prune to a cache entry.
pub struct MergeEngine<S> {
  store: Arc<S>,
}

impl<S: CacheStore> MergeEngine<S> {
  pub fn new(store: Arc<S>) -> Self {
    Self { store }
  }

  /// Merge one page worth of items into the entry at `key`.
  ///
  /// Never removes an identity, so an interrupted refresh leaves the entry
  /// incomplete but never corrupted.
  pub fn merge_and_store<T: Cacheable>(
    &self,
    key: &CacheKey,
    new_items: Vec<T>,
  ) -> Result<MergeStats, StoreError> {
    let mut stats = MergeStats::default();

    let merged = self.store.update(key, |previous: Option<Vec<T>>| {
      let mut index = ItemIndex::from_items(previous.unwrap_or_default());
      for item in new_items {
        if index.upsert(item) {
          stats.added += 1;
        } else {
          stats.replaced += 1;
        }
      }
      index.into_items()
    })?;

    stats.total = merged.len();
    Ok(stats)
  }

  /// Remove items whose identity is not in `live`. Only valid once every page
  /// of a refresh has been merged.
  pub fn prune<T: Cacheable>(
    &self,
    key: &CacheKey,
    live: &HashSet<String>,
  ) -> Result<usize, StoreError> {
    let mut removed = 0;

    self.store.update(key, |previous: Option<Vec<T>>| {
      let mut index = ItemIndex::from_items(previous.unwrap_or_default());
      removed = index.retain_live(live);
      index.into_items()
    })?;

    Ok(removed)
  }
}
