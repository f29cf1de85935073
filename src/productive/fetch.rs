//! Page-by-page listing of a resource collection.

use futures::{stream, Stream, TryStreamExt};
use tracing::debug;

use crate::error::SyncError;

use super::client::ResourceApi;
use super::resources::{QueryParams, ResourceKind, PAGE_NUMBER_PARAM, PAGE_SIZE_PARAM};
use super::types::Record;

pub const DEFAULT_PAGE_SIZE: u32 = 200;

/// One fetched page: primary records plus the included side-table.
#[derive(Debug, Clone)]
pub struct Page {
  pub number: u32,
  pub total_pages: u32,
  pub records: Vec<Record>,
  pub included: Vec<Record>,
}

impl Page {
  pub fn is_last(&self) -> bool {
    self.number >= self.total_pages
  }
}

/// Everything a full pagination produced.
#[derive(Debug, Clone, Default)]
pub struct FetchedCollection {
  pub records: Vec<Record>,
  pub included: Vec<Record>,
  pub total_pages: u32,
}

/// Walks the pages of one listing in strict ascending order.
pub struct Paginator<'a, A: ?Sized> {
  api: &'a A,
  kind: ResourceKind,
  params: QueryParams,
  page_size: u32,
}

impl<'a, A: ResourceApi + ?Sized> Paginator<'a, A> {
  pub fn new(api: &'a A, kind: ResourceKind, params: QueryParams, page_size: u32) -> Self {
    Self {
      api,
      kind,
      params,
      page_size: page_size.max(1),
    }
  }

  fn page_params(&self, number: u32) -> QueryParams {
    let mut params = self.params.clone();
    params.insert(PAGE_SIZE_PARAM.to_string(), self.page_size.to_string());
    params.insert(PAGE_NUMBER_PARAM.to_string(), number.to_string());
    params
  }

  /// Fetch a single page.
  pub async fn fetch_page(&self, number: u32) -> Result<Page, SyncError> {
    let response = self.api.list(self.kind, &self.page_params(number)).await?;
    let total_pages = response.total_pages();

    debug!(
      kind = %self.kind,
      page = number,
      total_pages,
      records = response.data.len(),
      included = response.included.len(),
      "fetched page"
    );

    Ok(Page {
      number,
      total_pages,
      records: response.data.into_iter().map(Record::from).collect(),
      included: response.included.into_iter().map(Record::from).collect(),
    })
  }

  /// Stream pages one at a time. The next request is only sent once the
  /// caller polls for it, so each page can be merged before the next arrives.
  /// The stream ends after the last page or the first error.
  pub fn pages(self) -> impl Stream<Item = Result<Page, SyncError>> + 'a
  where
    A: 'a,
  {
    stream::try_unfold((self, Some(1u32)), |(paginator, next)| paginator.step(next))
  }

  async fn step(self, next: Option<u32>) -> Result<Option<(Page, (Self, Option<u32>))>, SyncError> {
    let Some(number) = next else {
      return Ok(None);
    };

    let page = self.fetch_page(number).await?;
    let next = if page.is_last() { None } else { Some(number + 1) };
    Ok(Some((page, (self, next))))
  }

  /// Fetch every page and accumulate records and included entries.
  #[allow(dead_code)]
  pub async fn fetch_all(self) -> Result<FetchedCollection, SyncError>
  where
    A: 'a,
  {
    self
      .pages()
      .try_fold(FetchedCollection::default(), |mut all, page| async move {
        all.total_pages = page.total_pages;
        all.records.extend(page.records);
        all.included.extend(page.included);
        Ok::<_, SyncError>(all)
      })
      .await
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::productive::testing::{page_json, project_json, task_json, FakeApi};

  #[tokio::test]
  async fn test_fetch_all_walks_pages_in_order() {
    let api = FakeApi::new(vec![
      page_json(3, vec![task_json("1", "A", "10")], vec![project_json("10", "7")]),
      page_json(3, vec![task_json("2", "B", "10")], vec![]),
      page_json(3, vec![task_json("3", "C", "11")], vec![project_json("11", "7")]),
    ]);

    let all = Paginator::new(&api, ResourceKind::Tasks, ResourceKind::Tasks.default_params(), 1)
      .fetch_all()
      .await
      .unwrap();

    assert_eq!(all.total_pages, 3);
    assert_eq!(
      all.records.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(),
      vec!["1", "2", "3"]
    );
    assert_eq!(all.included.len(), 2);

    let calls = api.calls();
    assert_eq!(
      calls
        .iter()
        .map(|p| p[PAGE_NUMBER_PARAM].as_str())
        .collect::<Vec<_>>(),
      vec!["1", "2", "3"]
    );
    // filters travel with every page, not only the first
    assert!(calls.iter().all(|p| p["sort"] == "-updated_at" && p[PAGE_SIZE_PARAM] == "1"));
  }

  #[tokio::test]
  async fn test_single_page_when_meta_missing() {
    let api = FakeApi::new(vec![serde_json::json!({"data": [task_json("1", "A", "10")]})]);

    let all = Paginator::new(&api, ResourceKind::Tasks, QueryParams::new(), DEFAULT_PAGE_SIZE)
      .fetch_all()
      .await
      .unwrap();

    assert_eq!(all.records.len(), 1);
    assert_eq!(api.call_count(), 1);
  }

  #[tokio::test]
  async fn test_stream_stops_on_failed_page() {
    let api = FakeApi::new(vec![
      page_json(3, vec![task_json("1", "A", "10")], vec![]),
      page_json(3, vec![task_json("2", "B", "10")], vec![]),
      page_json(3, vec![task_json("3", "C", "10")], vec![]),
    ])
    .failing_on(2);

    let pages = Paginator::new(&api, ResourceKind::Tasks, QueryParams::new(), 1).pages();
    let mut pages = std::pin::pin!(pages);

    let first = pages.try_next().await.unwrap().unwrap();
    assert_eq!(first.number, 1);
    assert!(matches!(
      pages.try_next().await,
      Err(SyncError::Transport { .. })
    ));
    assert_eq!(api.call_count(), 2);
  }
}
