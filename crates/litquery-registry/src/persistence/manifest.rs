//! Manifest file for a directory of snapshot documents.

use chrono::{DateTime, Utc};
use litquery_compiler::SnapshotKey;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use crate::error::{RegistryError, RegistryResult};

/// Current manifest format version.
pub const MANIFEST_FORMAT: u32 = 1;

/// Index of the snapshot files under a store root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotManifest {
    /// Manifest format version.
    pub format: u32,
    /// Last time the manifest was written.
    pub written_at: DateTime<Utc>,
    /// Version of the tooling that wrote it.
    pub writer_version: String,
    /// One entry per stored snapshot.
    pub snapshots: Vec<ManifestEntry>,
}

/// Entry for a single stored snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Key the snapshot is stored under.
    pub key: SnapshotKey,
    /// Snapshot version.
    pub version: u64,
    /// Capture instant of the snapshot.
    pub captured_at: DateTime<Utc>,
    /// File path relative to the store root, `/`-separated.
    pub file: String,
    /// Hex SHA-256 of the file bytes.
    pub sha256: String,
    /// File size in bytes.
    pub size_bytes: u64,
}

impl Default for SnapshotManifest {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotManifest {
    /// Creates an empty manifest.
    pub fn new() -> Self {
        Self {
            format: MANIFEST_FORMAT,
            written_at: Utc::now(),
            writer_version: env!("CARGO_PKG_VERSION").to_string(),
            snapshots: Vec::new(),
        }
    }

    /// Returns the number of entries.
    pub fn count(&self) -> usize {
        self.snapshots.len()
    }

    /// Returns the total size of all stored files.
    pub fn total_size_bytes(&self) -> u64 {
        self.snapshots.iter().map(|e| e.size_bytes).sum()
    }

    /// Finds the entry for a key.
    pub fn get(&self, key: &SnapshotKey) -> Option<&ManifestEntry> {
        self.snapshots.iter().find(|e| e.key == *key)
    }

    /// Adds an entry, replacing any entry with the same key.
    pub fn upsert(&mut self, entry: ManifestEntry) {
        match self.snapshots.iter_mut().find(|e| e.key == entry.key) {
            Some(existing) => *existing = entry,
            None => {
                self.snapshots.push(entry);
                self.snapshots.sort_by(|a, b| a.key.cmp(&b.key));
            }
        }
    }

    /// Removes the entry for a key. Returns whether one existed.
    pub fn remove(&mut self, key: &SnapshotKey) -> bool {
        let before = self.snapshots.len();
        self.snapshots.retain(|e| e.key != *key);
        self.snapshots.len() != before
    }

    /// Saves the manifest as JSON, stamping `written_at`.
    ///
    /// The document is written to a sibling temp file and renamed over the
    /// target, so readers see either the old manifest or the new one.
    pub fn save<P: AsRef<Path>>(&mut self, path: P) -> RegistryResult<()> {
        let path = path.as_ref();
        self.written_at = Utc::now();

        let tmp = path.with_extension("json.tmp");
        let file = File::create(&tmp).map_err(|e| RegistryError::io_error(&tmp, e))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)
            .map_err(|e| RegistryError::Manifest(e.to_string()))?;
        writer
            .flush()
            .map_err(|e| RegistryError::io_error(&tmp, e))?;
        drop(writer);
        std::fs::rename(&tmp, path).map_err(|e| RegistryError::io_error(path, e))?;
        Ok(())
    }

    /// Loads a manifest from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> RegistryResult<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| RegistryError::io_error(path, e))?;
        let manifest: Self = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| RegistryError::Manifest(e.to_string()))?;
        if manifest.format != MANIFEST_FORMAT {
            return Err(RegistryError::Manifest(format!(
                "unsupported manifest format {}",
                manifest.format
            )));
        }
        Ok(manifest)
    }
}

impl std::fmt::Display for SnapshotManifest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Snapshot Manifest")?;
        writeln!(f, "  Written:         {}", self.written_at)?;
        writeln!(f, "  Writer:          {}", self.writer_version)?;
        writeln!(f, "  Snapshots:       {}", self.count())?;
        write!(f, "  Total Size:      {} KB", self.total_size_bytes() / 1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn entry(provenance: &str, version: u64) -> ManifestEntry {
        ManifestEntry {
            key: SnapshotKey::new(provenance, "harvest", "search"),
            version,
            captured_at: Utc::now(),
            file: format!("{provenance}/harvest/search.json"),
            sha256: "00".repeat(32),
            size_bytes: 2048,
        }
    }

    #[test]
    fn test_upsert_replaces_by_key() {
        let mut manifest = SnapshotManifest::new();
        manifest.upsert(entry("crossref", 1));
        manifest.upsert(entry("arxiv", 1));
        manifest.upsert(entry("crossref", 2));

        assert_eq!(manifest.count(), 2);
        assert_eq!(manifest.snapshots[0].key.provenance, "arxiv");
        let key = SnapshotKey::new("crossref", "harvest", "search");
        assert_eq!(manifest.get(&key).unwrap().version, 2);
        assert_eq!(manifest.total_size_bytes(), 4096);
    }

    #[test]
    fn test_remove() {
        let mut manifest = SnapshotManifest::new();
        manifest.upsert(entry("crossref", 1));
        let key = SnapshotKey::new("crossref", "harvest", "search");
        assert!(manifest.remove(&key));
        assert!(!manifest.remove(&key));
        assert_eq!(manifest.count(), 0);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("manifest.json");

        let mut manifest = SnapshotManifest::new();
        manifest.upsert(entry("crossref", 3));
        manifest.save(&path).unwrap();

        let loaded = SnapshotManifest::load(&path).unwrap();
        assert_eq!(loaded, manifest);
        assert!(!dir.path().join("manifest.json.tmp").exists());
    }

    #[test]
    fn test_unknown_format_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("manifest.json");

        let mut manifest = SnapshotManifest::new();
        manifest.format = 99;
        manifest.save(&path).unwrap();

        assert!(matches!(
            SnapshotManifest::load(&path),
            Err(RegistryError::Manifest(_))
        ));
    }

    #[test]
    fn test_display() {
        let mut manifest = SnapshotManifest::new();
        manifest.upsert(entry("crossref", 1));
        assert!(manifest.to_string().contains("Snapshots:       1"));
    }
}
