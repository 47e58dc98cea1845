//! Immutable, catalog-ordered view of every capability's status.
//!
//! The aggregator rebuilds a fresh `Snapshot` after each status transition and
//! hands clones to listeners. Entries share the catalog's `CapabilityInfo`
//! through `Arc`, so cloning a snapshot never copies descriptor text.

use crate::catalog::{CapabilityId, CapabilityInfo, CapabilityStatus};
use serde::Serialize;
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
/// One capability and its status at the time the snapshot was taken.
pub struct SnapshotEntry {
    #[serde(flatten)]
    pub capability: Arc<CapabilityInfo>,
    pub status: CapabilityStatus,
}

impl SnapshotEntry {
    pub fn id(&self) -> &CapabilityId {
        &self.capability.id
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    revision: u64,
    entries: Arc<[SnapshotEntry]>,
}

impl Snapshot {
    pub(crate) fn new(revision: u64, entries: Vec<SnapshotEntry>) -> Self {
        Self {
            revision,
            entries: entries.into(),
        }
    }

    /// Snapshot of an empty catalog.
    pub fn empty() -> Self {
        Self::new(0, Vec::new())
    }

    /// Number of status transitions folded into this snapshot.
    ///
    /// The initial all-pending snapshot is revision 0; every emitted update
    /// increments it by one.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn entries(&self) -> &[SnapshotEntry] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SnapshotEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: &CapabilityId) -> Option<&SnapshotEntry> {
        self.entries.iter().find(|entry| entry.id() == id)
    }

    pub fn status(&self, id: &CapabilityId) -> Option<CapabilityStatus> {
        self.get(id).map(|entry| entry.status)
    }

    pub fn count(&self, status: CapabilityStatus) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.status == status)
            .count()
    }

    pub fn pending_count(&self) -> usize {
        self.count(CapabilityStatus::Pending)
    }

    /// True once no entry is `Pending`. Vacuously true for an empty catalog.
    pub fn is_settled(&self) -> bool {
        self.pending_count() == 0
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Snapshot::empty()
    }
}

impl<'a> IntoIterator for &'a Snapshot {
    type Item = &'a SnapshotEntry;
    type IntoIter = std::slice::Iter<'a, SnapshotEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, status: CapabilityStatus) -> SnapshotEntry {
        SnapshotEntry {
            capability: Arc::new(CapabilityInfo {
                id: CapabilityId::from(id),
                name: id.to_uppercase(),
                description: "fixture".to_string(),
                reference_url: None,
            }),
            status,
        }
    }

    #[test]
    fn counts_and_lookup() {
        let snapshot = Snapshot::new(
            2,
            vec![
                entry("a", CapabilityStatus::Supported),
                entry("b", CapabilityStatus::Pending),
                entry("c", CapabilityStatus::Unsupported),
            ],
        );
        assert_eq!(snapshot.revision(), 2);
        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot.pending_count(), 1);
        assert_eq!(snapshot.count(CapabilityStatus::Supported), 1);
        assert!(!snapshot.is_settled());
        assert_eq!(
            snapshot.status(&CapabilityId::from("c")),
            Some(CapabilityStatus::Unsupported)
        );
        assert_eq!(snapshot.status(&CapabilityId::from("z")), None);
    }

    #[test]
    fn empty_snapshot_is_settled() {
        let snapshot = Snapshot::empty();
        assert!(snapshot.is_empty());
        assert!(snapshot.is_settled());
    }

    #[test]
    fn serializes_flat_entries() {
        let snapshot = Snapshot::new(1, vec![entry("x", CapabilityStatus::Supported)]);
        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value["revision"], 1);
        let first = &value["entries"][0];
        assert_eq!(first["id"], "x");
        assert_eq!(first["name"], "X");
        assert_eq!(first["status"], "supported");
        assert!(first["reference_url"].is_null());
    }
}
