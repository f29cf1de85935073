//! Resolution of relationship references against the included side-table.

use std::collections::{HashMap, HashSet};

use super::types::{Record, RelationshipRef, ResourceIdentifier};

/// Relationships resolved one hop further when their owner is itself the
/// target of a resolved relationship: task → project → company and
/// service → deal → company.
const TRANSITIVE: &[(&str, &str)] = &[("projects", "company"), ("deals", "company")];

/// Included records keyed by identity. Later copies of a record replace
/// earlier ones.
#[derive(Debug, Clone, Default)]
pub struct IncludedIndex {
  records: HashMap<ResourceIdentifier, Record>,
}

impl IncludedIndex {
  #[cfg(test)]
  pub fn from_records(records: impl IntoIterator<Item = Record>) -> Self {
    let mut index = Self::default();
    index.extend(records);
    index
  }

  /// Add records to the index. Returns the identities that were added or
  /// whose content changed.
  ///
  /// A later copy of an identity replaces the earlier one, so a record that
  /// reappears on a later page resolves to its most recent state.
  pub fn extend(&mut self, records: impl IntoIterator<Item = Record>) -> HashSet<ResourceIdentifier> {
    let mut changed = HashSet::new();
    for record in records {
      let id = record.identifier();
      if self.records.get(&id) != Some(&record) {
        changed.insert(id.clone());
        self.records.insert(id, record);
      }
    }
    changed
  }

  pub fn get(&self, id: &ResourceIdentifier) -> Option<&Record> {
    self.records.get(id)
  }

  #[cfg(test)]
  pub fn len(&self) -> usize {
    self.records.len()
  }
}

/// Resolve the relationships of every record. See [`resolve_record`].
#[allow(dead_code)]
pub fn resolve(records: &[Record], included: &IncludedIndex) -> Vec<Record> {
  records
    .iter()
    .map(|record| resolve_record(record, included))
    .collect()
}

/// Return a copy of `record` with each bare reference replaced by the matching
/// included record. References with no match stay as they are.
pub fn resolve_record(record: &Record, included: &IncludedIndex) -> Record {
  let mut resolved = record.clone();

  for relationship in resolved.relationships.values_mut() {
    let next = match relationship {
      RelationshipRef::Unresolved { data } => included
        .get(data)
        .map(|related| with_transitive(related.clone(), included)),
      RelationshipRef::Resolved(related) => Some(with_transitive((**related).clone(), included)),
    };

    if let Some(related) = next {
      *relationship = RelationshipRef::Resolved(Box::new(related));
    }
  }

  resolved
}

/// Resolve the second hop of a related record, if its kind has one.
fn with_transitive(mut related: Record, included: &IncludedIndex) -> Record {
  for (kind, name) in TRANSITIVE {
    if related.kind != *kind {
      continue;
    }

    let target = match related.relationships.get(*name) {
      Some(RelationshipRef::Unresolved { data }) => included.get(data).cloned(),
      _ => None,
    };

    if let Some(target) = target {
      related
        .relationships
        .insert(name.to_string(), RelationshipRef::Resolved(Box::new(target)));
    }
  }
  related
}

/// Identities a record's resolution depends on: every first-hop reference
/// and, for resolved projects and deals, their company reference.
pub fn referenced_identities(record: &Record) -> Vec<ResourceIdentifier> {
  let mut ids = Vec::new();
  for relationship in record.relationships.values() {
    ids.push(relationship.identifier());

    if let RelationshipRef::Resolved(related) = relationship {
      for (kind, name) in TRANSITIVE {
        if related.kind != *kind {
          continue;
        }
        if let Some(hop) = related.relationships.get(*name) {
          ids.push(hop.identifier());
        }
      }
    }
  }
  ids
}
