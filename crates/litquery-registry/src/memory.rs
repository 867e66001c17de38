//! In-memory snapshot source.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use litquery_compiler::{ProvenanceSnapshot, SnapshotKey, SnapshotSource, SourceError};
use parking_lot::RwLock;
use tracing::debug;

use crate::error::RegistryResult;

/// A keyed map of snapshot versions.
///
/// Each key holds its versions ordered by `captured_at`; a fetch returns
/// the latest version captured at or before `as_of`.
#[derive(Debug, Default)]
pub struct InMemorySnapshotSource {
    snapshots: RwLock<HashMap<SnapshotKey, Vec<Arc<ProvenanceSnapshot>>>>,
}

impl InMemorySnapshotSource {
    /// Creates an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a source holding the given snapshots.
    pub fn from_snapshots(
        snapshots: impl IntoIterator<Item = ProvenanceSnapshot>,
    ) -> RegistryResult<Self> {
        let source = Self::new();
        for snapshot in snapshots {
            source.insert(snapshot)?;
        }
        Ok(source)
    }

    /// Validates and stores a snapshot.
    ///
    /// A snapshot with the same key and version replaces the stored one.
    pub fn insert(&self, snapshot: ProvenanceSnapshot) -> RegistryResult<()> {
        snapshot.validate()?;
        let key = snapshot.key();
        let version = snapshot.version;

        let mut snapshots = self.snapshots.write();
        let versions = snapshots.entry(key.clone()).or_default();
        versions.retain(|existing| existing.version != version);
        versions.push(Arc::new(snapshot));
        versions.sort_by(|a, b| {
            a.captured_at
                .cmp(&b.captured_at)
                .then(a.version.cmp(&b.version))
        });
        debug!(snapshot = %key, version, versions = versions.len(), "snapshot stored");
        Ok(())
    }

    /// Removes every version stored for `key`. Returns whether any existed.
    pub fn remove(&self, key: &SnapshotKey) -> bool {
        self.snapshots.write().remove(key).is_some()
    }

    /// Returns the most recently captured version for `key`.
    pub fn latest(&self, key: &SnapshotKey) -> Option<Arc<ProvenanceSnapshot>> {
        self.snapshots
            .read()
            .get(key)
            .and_then(|versions| versions.last().cloned())
    }

    /// Returns the number of versions stored for `key`.
    pub fn versions(&self, key: &SnapshotKey) -> usize {
        self.snapshots.read().get(key).map_or(0, Vec::len)
    }

    /// Returns all keys, sorted.
    pub fn keys(&self) -> Vec<SnapshotKey> {
        let mut keys: Vec<SnapshotKey> = self.snapshots.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Returns the number of keys.
    pub fn len(&self) -> usize {
        self.snapshots.read().len()
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SnapshotSource for InMemorySnapshotSource {
    fn fetch(
        &self,
        key: &SnapshotKey,
        as_of: DateTime<Utc>,
    ) -> Result<Arc<ProvenanceSnapshot>, SourceError> {
        self.snapshots
            .read()
            .get(key)
            .and_then(|versions| {
                versions
                    .iter()
                    .rev()
                    .find(|snapshot| snapshot.captured_at <= as_of)
                    .cloned()
            })
            .ok_or_else(|| SourceError::NotFound(key.clone()))
    }
}
