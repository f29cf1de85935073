use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use crate::config::ApiConfig;
use crate::error::SyncError;

use super::api_types::{ApiCreateRequest, ApiCreateResponse, ApiListResponse, ApiNewResource};
use super::resources::{QueryParams, ResourceKind};

const JSON_API: &str = "application/vnd.api+json";

/// List endpoint of the remote API. The paginator only depends on this.
#[async_trait]
pub trait ResourceApi: Send + Sync {
  /// Fetch one page of `kind`. `params` already carries the page number and size.
  async fn list(
    &self,
    kind: ResourceKind,
    params: &QueryParams,
  ) -> Result<ApiListResponse, SyncError>;
}

/// Ids created by [`ProductiveClient::start_timer`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StartedTimer {
  pub time_entry_id: String,
  pub timer_id: String,
}

/// Productive API client
#[derive(Clone)]
pub struct ProductiveClient {
  http: reqwest::Client,
  base_url: Url,
}

impl ProductiveClient {
  pub fn new(config: &ApiConfig, token: &str) -> Result<Self, SyncError> {
    let mut base = config.url.clone();
    if !base.ends_with('/') {
      base.push('/');
    }
    let base_url = Url::parse(&base)
      .map_err(|e| SyncError::Configuration(format!("invalid API url '{}': {}", config.url, e)))?;

    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_API));
    headers.insert("X-Auth-Token", header_value("auth token", token)?);
    headers.insert("X-Organization-Id", header_value("organization id", &config.org_id)?);

    let http = reqwest::Client::builder()
      .default_headers(headers)
      .timeout(Duration::from_secs(config.timeout_secs))
      .build()
      .map_err(|e| SyncError::Configuration(format!("failed to build HTTP client: {}", e)))?;

    Ok(Self { http, base_url })
  }

  fn endpoint(&self, path: &str) -> Result<Url, SyncError> {
    self
      .base_url
      .join(path)
      .map_err(|e| SyncError::Configuration(format!("invalid endpoint '{}': {}", path, e)))
  }

  async fn send<T: DeserializeOwned>(
    &self,
    request: reqwest::RequestBuilder,
    endpoint: &str,
  ) -> Result<T, SyncError> {
    let response = request
      .send()
      .await
      .map_err(|e| SyncError::transport(endpoint, e))?;

    let status = response.status();
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      return Err(SyncError::transport(
        endpoint,
        format!("HTTP {}: {}", status, truncate(&body, 300)),
      ));
    }

    response
      .json::<T>()
      .await
      .map_err(|e| SyncError::transport(endpoint, format!("invalid response body: {}", e)))
  }

  async fn create<B: Serialize>(&self, path: &str, body: &B) -> Result<ApiCreateResponse, SyncError> {
    let url = self.endpoint(path)?;
    // .json() would force application/json over the JSON:API media type
    let body = serde_json::to_vec(body)
      .map_err(|e| SyncError::transport(url.as_str(), format!("invalid request body: {}", e)))?;

    debug!(endpoint = %url, "POST");
    let request = self
      .http
      .post(url.clone())
      .header(CONTENT_TYPE, JSON_API)
      .body(body);
    self.send(request, url.as_str()).await
  }

  /// Create a time entry for `date` and start a timer on it.
  pub async fn start_timer(
    &self,
    person_id: &str,
    service_id: &str,
    task_id: Option<&str>,
    date: NaiveDate,
  ) -> Result<StartedTimer, SyncError> {
    let mut entry = ApiNewResource::new("time_entries")
      .attribute("date", date.format("%Y-%m-%d").to_string())
      .relationship("person", "people", person_id)
      .relationship("service", "services", service_id);
    if let Some(task_id) = task_id {
      entry = entry.relationship("task", "tasks", task_id);
    }

    let created = self
      .create("time_entries", &ApiCreateRequest { data: entry })
      .await?;
    let time_entry_id = created.data.id;
    info!(%time_entry_id, service_id, ?task_id, "created time entry");

    let timer = ApiNewResource::new("timers").relationship("time_entry", "time_entries", &time_entry_id);
    let created = self.create("timers", &ApiCreateRequest { data: timer }).await?;
    info!(timer_id = %created.data.id, %time_entry_id, "started timer");

    Ok(StartedTimer {
      time_entry_id,
      timer_id: created.data.id,
    })
  }
}

#[async_trait]
impl ResourceApi for ProductiveClient {
  async fn list(
    &self,
    kind: ResourceKind,
    params: &QueryParams,
  ) -> Result<ApiListResponse, SyncError> {
    let mut url = self.endpoint(kind.as_str())?;
    url.query_pairs_mut().extend_pairs(params.iter());

    debug!(endpoint = %url, "GET");
    self.send(self.http.get(url.clone()), url.as_str()).await
  }
}

fn header_value(what: &str, value: &str) -> Result<HeaderValue, SyncError> {
  HeaderValue::from_str(value)
    .map_err(|_| SyncError::Configuration(format!("{} contains invalid characters", what)))
}

fn truncate(s: &str, max: usize) -> &str {
  match s.char_indices().nth(max) {
    Some((idx, _)) => &s[..idx],
    None => s,
  }
}
