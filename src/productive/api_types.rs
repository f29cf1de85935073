//! Serde-deserializable types matching Productive API (JSON:API) responses.
//!
//! These types are separate from domain types so that the loose wire format
//! (null linkage, to-many linkage, missing sections) never leaks into records.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use super::types::{Record, RelationshipRef, ResourceIdentifier};

// ============================================================================
// List endpoint response
// ============================================================================

#[derive(Debug, Deserialize, Default)]
pub struct ApiListResponse {
  #[serde(default)]
  pub data: Vec<ApiResource>,
  #[serde(default)]
  pub included: Vec<ApiResource>,
  #[serde(default)]
  pub meta: ApiMeta,
}

#[derive(Debug, Deserialize, Default)]
pub struct ApiMeta {
  #[serde(default)]
  pub total_pages: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct ApiResource {
  #[serde(rename = "type")]
  pub kind: String,
  pub id: String,
  #[serde(default)]
  pub attributes: Map<String, Value>,
  #[serde(default)]
  pub relationships: BTreeMap<String, ApiRelationship>,
}

#[derive(Debug, Deserialize, Default)]
pub struct ApiRelationship {
  #[serde(default)]
  pub data: Option<ApiLinkage>,
}

/// Relationship linkage: to-one object or to-many array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ApiLinkage {
  One(ApiIdentifier),
  Many(Vec<ApiIdentifier>),
}

/// Resource identifier as sent on the wire. Either half may be missing.
#[derive(Debug, Deserialize)]
pub struct ApiIdentifier {
  #[serde(rename = "type", default)]
  pub kind: Option<String>,
  #[serde(default, deserialize_with = "deserialize_id")]
  pub id: Option<String>,
}

/// Ids are strings in the API, but tolerate numbers.
fn deserialize_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
  D: serde::Deserializer<'de>,
{
  let value: Option<Value> = Option::deserialize(deserializer)?;
  Ok(match value {
    Some(Value::String(s)) if !s.is_empty() => Some(s),
    Some(Value::Number(n)) => Some(n.to_string()),
    _ => None,
  })
}

// ============================================================================
// Write payloads (time tracking)
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ApiCreateRequest {
  pub data: ApiNewResource,
}

#[derive(Debug, Serialize)]
pub struct ApiNewResource {
  #[serde(rename = "type")]
  pub kind: String,
  #[serde(skip_serializing_if = "Map::is_empty")]
  pub attributes: Map<String, Value>,
  pub relationships: BTreeMap<String, ApiNewRelationship>,
}

#[derive(Debug, Serialize)]
pub struct ApiNewRelationship {
  pub data: ResourceIdentifier,
}

#[derive(Debug, Deserialize)]
pub struct ApiCreateResponse {
  pub data: ApiResource,
}

// ============================================================================
// Conversions to domain types
// ============================================================================

impl From<ApiResource> for Record {
  fn from(resource: ApiResource) -> Self {
    let relationships = resource
      .relationships
      .into_iter()
      .filter_map(|(name, rel)| match rel.data {
        Some(ApiLinkage::One(ApiIdentifier {
          kind: Some(kind),
          id: Some(id),
        })) => Some((name, RelationshipRef::unresolved(kind, id))),
        // null, to-many and malformed linkage carry nothing to resolve
        _ => None,
      })
      .collect();

    Record {
      kind: resource.kind,
      id: resource.id,
      attributes: resource.attributes,
      relationships,
    }
  }
}

impl ApiListResponse {
  /// Total page count, treating a missing or zero count as one page.
  pub fn total_pages(&self) -> u32 {
    self.meta.total_pages.unwrap_or(1).max(1)
  }
}

impl ApiNewResource {
  pub fn new(kind: &str) -> Self {
    Self {
      kind: kind.to_string(),
      attributes: Map::new(),
      relationships: BTreeMap::new(),
    }
  }

  pub fn attribute(mut self, name: &str, value: impl Into<Value>) -> Self {
    self.attributes.insert(name.to_string(), value.into());
    self
  }

  pub fn relationship(mut self, name: &str, kind: &str, id: &str) -> Self {
    self.relationships.insert(
      name.to_string(),
      ApiNewRelationship {
        data: ResourceIdentifier::new(kind, id),
      },
    );
    self
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_parse_list_response() {
    let body = json!({
      "data": [{
        "id": "1",
        "type": "tasks",
        "attributes": {"title": "Write docs"},
        "relationships": {
          "project": {"data": {"type": "projects", "id": "10"}},
          "assignee": {"data": null},
          "subscribers": {"data": [{"type": "people", "id": "3"}]},
          "creator": {"meta": {"included": false}},
          "broken": {"data": {"type": "people"}},
          "numeric": {"data": {"type": "people", "id": 5}}
        }
      }],
      "included": [{"id": "10", "type": "projects", "attributes": {"name": "Site"}}],
      "meta": {"current_page": 1, "total_pages": 3, "total_count": 412}
    });

    let response: ApiListResponse = serde_json::from_value(body).unwrap();
    assert_eq!(response.total_pages(), 3);
    assert_eq!(response.included.len(), 1);

    let record = Record::from(response.data.into_iter().next().unwrap());
    assert_eq!(record.kind, "tasks");
    assert_eq!(record.attr_str("title"), Some("Write docs"));
    assert_eq!(
      record.relationships.keys().collect::<Vec<_>>(),
      vec!["numeric", "project"]
    );
    assert_eq!(
      record.relationships["project"],
      RelationshipRef::unresolved("projects", "10")
    );
    assert_eq!(
      record.relationships["numeric"],
      RelationshipRef::unresolved("people", "5")
    );
  }

  #[test]
  fn test_missing_meta_means_single_page() {
    let response: ApiListResponse = serde_json::from_value(json!({"data": []})).unwrap();
    assert_eq!(response.total_pages(), 1);

    let response: ApiListResponse =
      serde_json::from_value(json!({"data": [], "meta": {"total_pages": 0}})).unwrap();
    assert_eq!(response.total_pages(), 1);
  }

  #[test]
  fn test_create_request_shape() {
    let request = ApiCreateRequest {
      data: ApiNewResource::new("timers").relationship("time_entry", "time_entries", "99"),
    };

    assert_eq!(
      serde_json::to_value(&request).unwrap(),
      json!({
        "data": {
          "type": "timers",
          "relationships": {"time_entry": {"data": {"type": "time_entries", "id": "99"}}}
        }
      })
    );
  }
}
