use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::cache::Cacheable;

/// `(type, id)` pair identifying a remote record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceIdentifier {
  #[serde(rename = "type")]
  pub kind: String,
  pub id: String,
}

impl ResourceIdentifier {
  pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
    Self {
      kind: kind.into(),
      id: id.into(),
    }
  }
}

/// A relationship slot on a record.
///
/// Serializes as the embedded record once resolved, or as JSON:API linkage
/// (`{"data": {"type", "id"}}`) while it is still a bare reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RelationshipRef {
  Resolved(Box<Record>),
  Unresolved { data: ResourceIdentifier },
}

impl RelationshipRef {
  pub fn unresolved(kind: impl Into<String>, id: impl Into<String>) -> Self {
    Self::Unresolved {
      data: ResourceIdentifier::new(kind, id),
    }
  }

  pub fn resolved(&self) -> Option<&Record> {
    match self {
      Self::Resolved(record) => Some(record),
      Self::Unresolved { .. } => None,
    }
  }

  /// Identity of the referenced record, resolved or not.
  pub fn identifier(&self) -> ResourceIdentifier {
    match self {
      Self::Resolved(record) => record.identifier(),
      Self::Unresolved { data } => data.clone(),
    }
  }
}

/// A primary or included record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
  #[serde(rename = "type")]
  pub kind: String,
  pub id: String,
  #[serde(default)]
  pub attributes: Map<String, Value>,
  #[serde(default)]
  pub relationships: BTreeMap<String, RelationshipRef>,
}

impl Record {
  #[cfg(test)]
  pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
    Self {
      kind: kind.into(),
      id: id.into(),
      attributes: Map::new(),
      relationships: BTreeMap::new(),
    }
  }

  #[cfg(test)]
  pub fn with_attr(mut self, name: &str, value: impl Into<Value>) -> Self {
    self.attributes.insert(name.to_string(), value.into());
    self
  }

  #[cfg(test)]
  pub fn with_relationship(mut self, name: &str, relationship: RelationshipRef) -> Self {
    self.relationships.insert(name.to_string(), relationship);
    self
  }

  pub fn identifier(&self) -> ResourceIdentifier {
    ResourceIdentifier::new(self.kind.clone(), self.id.clone())
  }

  /// String attribute; `None` when missing, null, or empty.
  #[cfg(test)]
  pub fn attr_str(&self, name: &str) -> Option<&str> {
    self
      .attributes
      .get(name)
      .and_then(Value::as_str)
      .filter(|s| !s.is_empty())
  }

  /// Integer attribute. Accepts numbers and numeric strings.
  pub fn attr_i64(&self, name: &str) -> Option<i64> {
    match self.attributes.get(name)? {
      Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
      Value::String(s) => s.trim().parse().ok(),
      _ => None,
    }
  }

  /// Attribute rendered as text, whatever its JSON type.
  pub fn attr_text(&self, name: &str) -> Option<String> {
    match self.attributes.get(name)? {
      Value::Null => None,
      Value::String(s) if s.is_empty() => None,
      Value::String(s) => Some(s.clone()),
      other => Some(other.to_string()),
    }
  }

  pub fn is_null_attr(&self, name: &str) -> bool {
    self.attributes.get(name).map_or(true, Value::is_null)
  }

  /// The related record, if the relationship is present and resolved.
  pub fn related(&self, name: &str) -> Option<&Record> {
    self.relationships.get(name).and_then(RelationshipRef::resolved)
  }
}

/// Formatted projection of a record, as served to readers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayItem {
  pub title: String,
  pub subtitle: String,
  /// Always the source record id.
  pub uid: String,
  pub arg: String,
  #[serde(rename = "match")]
  pub match_text: String,
  #[serde(default)]
  pub variables: Map<String, Value>,
}

impl Cacheable for DisplayItem {
  fn cache_key(&self) -> &str {
    &self.uid
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_relationship_serializes_by_state() {
    let unresolved = RelationshipRef::unresolved("companies", "7");
    assert_eq!(
      serde_json::to_value(&unresolved).unwrap(),
      json!({"data": {"type": "companies", "id": "7"}})
    );

    let resolved = RelationshipRef::Resolved(Box::new(
      Record::new("companies", "7").with_attr("name", "Acme"),
    ));
    assert_eq!(
      serde_json::to_value(&resolved).unwrap(),
      json!({"type": "companies", "id": "7", "attributes": {"name": "Acme"}, "relationships": {}})
    );
  }

  #[test]
  fn test_relationship_deserializes_both_shapes() {
    let unresolved: RelationshipRef =
      serde_json::from_value(json!({"data": {"type": "people", "id": "1"}})).unwrap();
    assert_eq!(unresolved, RelationshipRef::unresolved("people", "1"));

    let resolved: RelationshipRef =
      serde_json::from_value(json!({"type": "people", "id": "1"})).unwrap();
    assert_eq!(resolved.resolved().map(|r| r.id.as_str()), Some("1"));
  }

  #[test]
  fn test_attr_accessors() {
    let record = Record::new("tasks", "1")
      .with_attr("title", "Fix it")
      .with_attr("empty", "")
      .with_attr("worked_time", 90)
      .with_attr("number", "42")
      .with_attr("closed_at", Value::Null);

    assert_eq!(record.attr_str("title"), Some("Fix it"));
    assert_eq!(record.attr_str("empty"), None);
    assert_eq!(record.attr_i64("worked_time"), Some(90));
    assert_eq!(record.attr_i64("number"), Some(42));
    assert_eq!(record.attr_text("number").as_deref(), Some("42"));
    assert!(record.is_null_attr("closed_at"));
    assert!(record.is_null_attr("missing"));
  }

  #[test]
  fn test_display_item_uses_match_field_name() {
    let item = DisplayItem {
      title: "t".into(),
      subtitle: "s".into(),
      uid: "1".into(),
      arg: "a".into(),
      match_text: "1 t s".into(),
      variables: Map::new(),
    };
    let value = serde_json::to_value(&item).unwrap();
    assert_eq!(value["match"], "1 t s");
    assert_eq!(item.cache_key(), "1");
  }
}
