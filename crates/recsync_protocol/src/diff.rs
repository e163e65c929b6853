//! Identifier/revision maps and the download diff.

use crate::record::{RecordId, Revision};
use std::collections::BTreeMap;

/// Mapping from record id to its current revision.
///
/// Ids are unique. Iteration is sorted by id so diffs are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdRevisionMap {
    entries: BTreeMap<RecordId, Revision>,
}

impl IdRevisionMap {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the revision for an id.
    ///
    /// Returns the previous revision, if any.
    pub fn insert(&mut self, id: RecordId, revision: Revision) -> Option<Revision> {
        self.entries.insert(id, revision)
    }

    /// Returns the revision recorded for an id.
    pub fn get(&self, id: &RecordId) -> Option<&Revision> {
        self.entries.get(id)
    }

    /// Returns true if the id is present.
    pub fn contains(&self, id: &RecordId) -> bool {
        self.entries.contains_key(id)
    }

    /// Number of ids.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the map holds no ids.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates entries in id order.
    pub fn iter(&self) -> impl Iterator<Item = (&RecordId, &Revision)> {
        self.entries.iter()
    }
}

impl FromIterator<(RecordId, Revision)> for IdRevisionMap {
    fn from_iter<I: IntoIterator<Item = (RecordId, Revision)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Computes which remote records a client must download.
///
/// An id is selected when it is absent locally or when its local revision
/// token differs from the remote one. Revisions are compared for equality
/// only; a differing token means "changed", whichever side is newer.
pub fn ids_to_download(remote: &IdRevisionMap, local: &IdRevisionMap) -> Vec<RecordId> {
    remote
        .iter()
        .filter(|(id, remote_rev)| local.get(id) != Some(*remote_rev))
        .map(|(id, _)| id.clone())
        .collect()
}
