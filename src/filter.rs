//! Read-mode filtering of cached items.

use serde_json::Value;

use crate::productive::types::DisplayItem;

const COMPANY_POINTERS: &[&str] = &[
  "/relationships/company/id",
  "/relationships/company/data/id",
  "/relationships/deal/relationships/company/id",
  "/relationships/deal/relationships/company/data/id",
];

#[derive(Debug, Clone, Default)]
pub struct ItemFilter {
  pub company_id: Option<String>,
  /// Keep only items attached to a deal that has not been closed
  pub open_deals_only: bool,
}

impl ItemFilter {
  pub fn is_empty(&self) -> bool {
    self.company_id.is_none() && !self.open_deals_only
  }

  pub fn matches(&self, item: &DisplayItem) -> bool {
    let variables = Value::Object(item.variables.clone());

    if let Some(company_id) = &self.company_id {
      let matches_company = COMPANY_POINTERS
        .iter()
        .filter_map(|pointer| variables.pointer(pointer))
        .any(|id| id_matches(id, company_id));
      if !matches_company {
        return false;
      }
    }

    if self.open_deals_only && !has_open_deal(&variables) {
      return false;
    }

    true
  }

  pub fn apply(&self, items: Vec<DisplayItem>) -> Vec<DisplayItem> {
    if self.is_empty() {
      return items;
    }
    items.into_iter().filter(|item| self.matches(item)).collect()
  }
}

fn id_matches(value: &Value, expected: &str) -> bool {
  match value {
    Value::String(s) => s == expected,
    Value::Number(n) => n.to_string() == expected,
    _ => false,
  }
}

fn has_open_deal(variables: &Value) -> bool {
  let Some(Value::Object(attributes)) = variables.pointer("/relationships/deal/attributes") else {
    return false;
  };
  attributes.get("closed_at").map_or(true, Value::is_null)
}
