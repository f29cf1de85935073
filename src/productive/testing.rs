//! In-memory `ResourceApi` and JSON builders for tests.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::error::SyncError;

use super::api_types::ApiListResponse;
use super::client::ResourceApi;
use super::resources::{QueryParams, ResourceKind, PAGE_NUMBER_PARAM};

/// Serves canned pages; page `n` is `pages[n - 1]`.
pub struct FakeApi {
  pages: Vec<Value>,
  fail_on: Option<u32>,
  delay: Duration,
  calls: Mutex<Vec<QueryParams>>,
  in_flight: AtomicUsize,
  max_in_flight: AtomicUsize,
}

impl FakeApi {
  pub fn new(pages: Vec<Value>) -> Self {
    Self {
      pages,
      fail_on: None,
      delay: Duration::ZERO,
      calls: Mutex::new(Vec::new()),
      in_flight: AtomicUsize::new(0),
      max_in_flight: AtomicUsize::new(0),
    }
  }

  /// Make the request for `page` fail with a transport error.
  pub fn failing_on(mut self, page: u32) -> Self {
    self.fail_on = Some(page);
    self
  }

  pub fn with_delay(mut self, delay: Duration) -> Self {
    self.delay = delay;
    self
  }

  pub fn calls(&self) -> Vec<QueryParams> {
    self.calls.lock().unwrap().clone()
  }

  pub fn call_count(&self) -> usize {
    self.calls.lock().unwrap().len()
  }

  /// Highest number of requests that were running at the same time.
  pub fn max_in_flight(&self) -> usize {
    self.max_in_flight.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl ResourceApi for FakeApi {
  async fn list(
    &self,
    kind: ResourceKind,
    params: &QueryParams,
  ) -> Result<ApiListResponse, SyncError> {
    self.calls.lock().unwrap().push(params.clone());
    let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    self.max_in_flight.fetch_max(running, Ordering::SeqCst);

    if !self.delay.is_zero() {
      tokio::time::sleep(self.delay).await;
    }
    self.in_flight.fetch_sub(1, Ordering::SeqCst);

    let number: u32 = params
      .get(PAGE_NUMBER_PARAM)
      .and_then(|n| n.parse().ok())
      .unwrap_or(1);

    if self.fail_on == Some(number) {
      return Err(SyncError::transport(kind.as_str(), "connection reset"));
    }

    let page = self
      .pages
      .get(number as usize - 1)
      .cloned()
      .unwrap_or_else(|| json!({"data": []}));
    Ok(serde_json::from_value(page).unwrap())
  }
}

pub fn page_json(total_pages: u32, data: Vec<Value>, included: Vec<Value>) -> Value {
  json!({
    "data": data,
    "included": included,
    "meta": {"total_pages": total_pages}
  })
}

pub fn task_json(id: &str, title: &str, project_id: &str) -> Value {
  json!({
    "id": id,
    "type": "tasks",
    "attributes": {"title": title, "task_number": id, "worked_time": 30, "initial_estimate": 120},
    "relationships": {
      "project": {"data": {"type": "projects", "id": project_id}},
      "workflow_status": {"data": {"type": "workflow_statuses", "id": "1"}},
      "assignee": {"data": null}
    }
  })
}

pub fn project_json(id: &str, company_id: &str) -> Value {
  json!({
    "id": id,
    "type": "projects",
    "attributes": {"name": format!("Project {id}"), "project_number": id},
    "relationships": {"company": {"data": {"type": "companies", "id": company_id}}}
  })
}

pub fn company_json(id: &str, code: &str) -> Value {
  json!({
    "id": id,
    "type": "companies",
    "attributes": {"name": format!("Company {id}"), "company_code": code}
  })
}
