//! Cache keys for Productive resources.

use sha2::{Digest, Sha256};

use crate::cache::{CacheKey, QueryKey};

use super::resources::{QueryParams, ResourceKind};

#[derive(Clone, Debug)]
pub enum ProductiveQueryKey {
  /// Formatted items for one kind and parameter set
  Items {
    kind: ResourceKind,
    params: QueryParams,
  },
  /// Debounce marker, shared by every parameter set of a kind
  LastUpdate { kind: ResourceKind },
}

impl ProductiveQueryKey {
  pub fn items(kind: ResourceKind, params: &QueryParams) -> CacheKey {
    CacheKey::new(&Self::Items {
      kind,
      params: params.clone(),
    })
  }

  pub fn last_update(kind: ResourceKind) -> CacheKey {
    CacheKey::new(&Self::LastUpdate { kind })
  }
}

impl QueryKey for ProductiveQueryKey {
  fn cache_hash(&self) -> String {
    let input = match self {
      // QueryParams is ordered, so the JSON encoding is canonical
      Self::Items { kind, params } => format!(
        "items:{}:{}",
        kind,
        serde_json::to_string(params).unwrap_or_default()
      ),
      Self::LastUpdate { kind } => format!("last_update:{}", kind),
    };

    // SHA256 hash for stable, fixed-length keys
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
  }

  fn description(&self) -> String {
    match self {
      Self::Items { kind, params } if params.is_empty() => format!("{}", kind),
      Self::Items { kind, params } => {
        let pairs: Vec<String> = params.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        format!("{}?{}", kind, pairs.join("&"))
      }
      Self::LastUpdate { kind } => format!("last update of {}", kind),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn params(pairs: &[(&str, &str)]) -> QueryParams {
    pairs
      .iter()
      .map(|(k, v)| (k.to_string(), v.to_string()))
      .collect()
  }

  #[test]
  fn test_same_kind_and_params_collapse() {
    let a = ProductiveQueryKey::items(
      ResourceKind::Tasks,
      &params(&[("sort", "-updated_at"), ("filter[status]", "1")]),
    );
    let b = ProductiveQueryKey::items(
      ResourceKind::Tasks,
      &params(&[("filter[status]", "1"), ("sort", "-updated_at")]),
    );
    assert_eq!(a, b);
    assert_eq!(a.as_str().len(), 64);
  }

  #[test]
  fn test_any_difference_changes_key() {
    let base = ProductiveQueryKey::items(ResourceKind::Tasks, &params(&[("sort", "-updated_at")]));

    let other_value =
      ProductiveQueryKey::items(ResourceKind::Tasks, &params(&[("sort", "updated_at")]));
    let other_kind =
      ProductiveQueryKey::items(ResourceKind::Projects, &params(&[("sort", "-updated_at")]));
    let no_params = ProductiveQueryKey::items(ResourceKind::Tasks, &QueryParams::new());

    assert_ne!(base, other_value);
    assert_ne!(base, other_kind);
    assert_ne!(base, no_params);
  }

  #[test]
  fn test_marker_key_is_distinct_from_items() {
    let marker = ProductiveQueryKey::last_update(ResourceKind::Tasks);
    let items = ProductiveQueryKey::items(ResourceKind::Tasks, &QueryParams::new());
    assert_ne!(marker.as_str(), items.as_str());
    assert_eq!(marker.description(), "last update of tasks");
  }

  #[test]
  fn test_description_lists_params() {
    let key = ProductiveQueryKey::items(ResourceKind::Deals, &ResourceKind::Deals.default_params());
    assert_eq!(key.description(), "deals?filter[sales_status_id]=1,2,3");
  }
}
