//! Resource kinds known to the synchronizer.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::SyncError;

/// Query parameters for a list request, e.g. `filter[status] = 1`.
///
/// Sorted by name so fingerprints do not depend on insertion order.
pub type QueryParams = BTreeMap<String, String>;

pub const PAGE_SIZE_PARAM: &str = "page[size]";
pub const PAGE_NUMBER_PARAM: &str = "page[number]";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
  Companies,
  Deals,
  People,
  Projects,
  Services,
  Tasks,
}

impl ResourceKind {
  pub const ALL: [ResourceKind; 6] = [
    Self::Companies,
    Self::Deals,
    Self::People,
    Self::Projects,
    Self::Services,
    Self::Tasks,
  ];

  /// JSON:API type name, also the URL path segment.
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Companies => "companies",
      Self::Deals => "deals",
      Self::People => "people",
      Self::Projects => "projects",
      Self::Services => "services",
      Self::Tasks => "tasks",
    }
  }

  /// Filters applied when listing this kind from the command line.
  pub fn default_params(self) -> QueryParams {
    let pairs: &[(&str, &str)] = match self {
      Self::Companies => &[("filter[status]", "1")],
      Self::Deals => &[("filter[sales_status_id]", "1,2,3")],
      Self::People => &[("filter[status]", "1")],
      Self::Projects => &[],
      Self::Services => &[
        ("filter[budget_status]", "1"),
        ("filter[time_tracking_enabled]", "true"),
      ],
      Self::Tasks => &[("sort", "-updated_at")],
    };

    pairs
      .iter()
      .map(|(k, v)| (k.to_string(), v.to_string()))
      .collect()
  }
}

impl fmt::Display for ResourceKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for ResourceKind {
  type Err = SyncError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let wanted = s.trim().to_lowercase();
    Self::ALL
      .into_iter()
      .find(|kind| kind.as_str() == wanted)
      .ok_or_else(|| {
        let known: Vec<&str> = Self::ALL.iter().map(|k| k.as_str()).collect();
        SyncError::Configuration(format!(
          "unknown resource kind '{}' (expected one of: {})",
          s,
          known.join(", ")
        ))
      })
  }
}

/// Reject parameters the fetcher owns.
pub fn validate_params(params: &QueryParams) -> Result<(), SyncError> {
  for name in [PAGE_SIZE_PARAM, PAGE_NUMBER_PARAM] {
    if params.contains_key(name) {
      return Err(SyncError::Configuration(format!(
        "'{}' is managed by the paginator and cannot be set",
        name
      )));
    }
  }

  if let Some(name) = params.keys().find(|name| name.trim().is_empty()) {
    return Err(SyncError::Configuration(format!(
      "invalid query parameter name '{}'",
      name
    )));
  }

  Ok(())
}
