//! Refresh coordination: debounce, page-by-page merge and the final prune.

use futures::TryStreamExt;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

use crate::cache::{CacheKey, CacheStore, MergeEngine};
use crate::error::SyncError;
use crate::productive::cache::ProductiveQueryKey;
use crate::productive::client::ResourceApi;
use crate::productive::fetch::{Page, Paginator, DEFAULT_PAGE_SIZE};
use crate::productive::format::FormatContext;
use crate::productive::relationships::{referenced_identities, resolve_record, IncludedIndex};
use crate::productive::resources::{validate_params, QueryParams, ResourceKind};
use crate::productive::types::{DisplayItem, Record};

const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
  /// Another refresh of the same kind ran within the update interval
  Skipped,
  Completed(RefreshSummary),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshSummary {
  pub pages: u32,
  /// Distinct primary records seen across all pages
  pub records: usize,
  /// Items in the entry after the prune
  pub items: usize,
  pub pruned: usize,
}

/// Runs refreshes of cached listings against a [`ResourceApi`].
pub struct Synchronizer<A, S> {
  api: Arc<A>,
  store: Arc<S>,
  merge: MergeEngine<S>,
  ctx: FormatContext,
  update_interval: Duration,
  page_size: u32,
}

impl<A: ResourceApi, S: CacheStore> Synchronizer<A, S> {
  pub fn new(api: Arc<A>, store: Arc<S>, ctx: FormatContext) -> Self {
    Self {
      api,
      merge: MergeEngine::new(store.clone()),
      store,
      ctx,
      update_interval: DEFAULT_UPDATE_INTERVAL,
      page_size: DEFAULT_PAGE_SIZE,
    }
  }

  pub fn with_update_interval(mut self, interval: Duration) -> Self {
    self.update_interval = interval;
    self
  }

  pub fn with_page_size(mut self, page_size: u32) -> Self {
    self.page_size = page_size;
    self
  }

  /// Refresh the entry for `kind` and `params` unless a refresh of the same
  /// kind started less than one update interval ago.
  ///
  /// The debounce marker stays set when the refresh fails, so a broken
  /// remote is not hammered by every caller.
  pub async fn maybe_refresh(
    &self,
    kind: ResourceKind,
    params: &QueryParams,
  ) -> Result<RefreshOutcome, SyncError> {
    validate_params(params)?;

    let marker = ProductiveQueryKey::last_update(kind);
    if !self.store.claim(&marker, self.update_interval)? {
      info!(%kind, "refreshed recently, skipping");
      return Ok(RefreshOutcome::Skipped);
    }

    let key = ProductiveQueryKey::items(kind, params);
    info!(cache_key = %key, "refreshing");
    let started = Instant::now();

    match self.refresh(kind, params, &key).await {
      Ok(summary) => {
        info!(
          cache_key = %key,
          pages = summary.pages,
          items = summary.items,
          pruned = summary.pruned,
          elapsed_ms = started.elapsed().as_millis() as u64,
          "refresh complete"
        );
        Ok(RefreshOutcome::Completed(summary))
      }
      Err(e) => {
        error!(cache_key = %key, error = %e, "refresh failed");
        Err(e)
      }
    }
  }

  async fn refresh(
    &self,
    kind: ResourceKind,
    params: &QueryParams,
    key: &CacheKey,
  ) -> Result<RefreshSummary, SyncError> {
    let formatter = kind.formatter();
    let mut state = RefreshState::default();
    let mut summary = RefreshSummary::default();

    let pages = Paginator::new(self.api.as_ref(), kind, params.clone(), self.page_size).pages();
    let mut pages = std::pin::pin!(pages);

    while let Some(page) = pages.try_next().await? {
      let number = page.number;
      let items: Vec<DisplayItem> = state
        .absorb(page)
        .iter()
        .map(|record| formatter(record, &self.ctx))
        .collect();

      let stats = self.merge.merge_and_store(key, items)?;
      debug!(
        cache_key = %key,
        page = number,
        added = stats.added,
        replaced = stats.replaced,
        total = stats.total,
        "merged page"
      );
      summary.pages = number;
    }

    // Every page is in, so anything not seen this run is gone remotely
    let live = state.live_ids();
    summary.records = live.len();
    summary.pruned = self.merge.prune::<DisplayItem>(key, &live)?;
    summary.items = self
      .store
      .get::<Vec<DisplayItem>>(key)?
      .map(|items| items.len())
      .unwrap_or_default();

    Ok(summary)
  }
}

struct TrackedRecord {
  raw: Record,
  resolved: Record,
}

/// Primary records and included data accumulated over one refresh.
#[derive(Default)]
struct RefreshState {
  records: Vec<TrackedRecord>,
  positions: HashMap<String, usize>,
  included: IncludedIndex,
}

impl RefreshState {
  /// Take in a page and return the resolved records whose display form may
  /// have changed: the page's own records, plus earlier records that
  /// reference included data this page added or changed.
  fn absorb(&mut self, page: Page) -> Vec<Record> {
    let changed = self.included.extend(page.included);

    let mut dirty = BTreeSet::new();
    if !changed.is_empty() {
      for (pos, tracked) in self.records.iter().enumerate() {
        if referenced_identities(&tracked.resolved)
          .iter()
          .any(|id| changed.contains(id))
        {
          dirty.insert(pos);
        }
      }
    }

    for record in page.records {
      let pos = match self.positions.get(&record.id) {
        Some(&pos) => {
          self.records[pos].raw = record;
          pos
        }
        None => {
          let pos = self.records.len();
          self.positions.insert(record.id.clone(), pos);
          self.records.push(TrackedRecord {
            resolved: record.clone(),
            raw: record,
          });
          pos
        }
      };
      dirty.insert(pos);
    }

    dirty
      .into_iter()
      .map(|pos| {
        let tracked = &mut self.records[pos];
        tracked.resolved = resolve_record(&tracked.raw, &self.included);
        tracked.resolved.clone()
      })
      .collect()
  }

  fn live_ids(&self) -> HashSet<String> {
    self.positions.keys().cloned().collect()
  }
}
