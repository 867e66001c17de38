//! Snapshot documents on disk.
//!
//! A store root holds one JSON document per snapshot key plus a manifest:
//!
//! ```text
//! <root>/
//! ├── manifest.json                      index with SHA-256 checksums
//! └── <provenance>/<task_type>/<operation>.json
//! ```
//!
//! Every load re-hashes the document and compares it with the manifest
//! entry. A mismatch is reported as corruption, never silently loaded.
//!
//! # Example
//!
//! ```ignore
//! use litquery_registry::FileSnapshotStore;
//!
//! let store = FileSnapshotStore::open("/var/lib/litquery/snapshots")?;
//! store.save(&snapshot)?;
//!
//! let loaded = store.load(&snapshot.key())?;
//! assert_eq!(loaded.version, snapshot.version);
//! ```

mod manifest;

pub use manifest::{ManifestEntry, SnapshotManifest, MANIFEST_FORMAT};

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use litquery_compiler::{
    ProvenanceSnapshot, SnapshotError, SnapshotKey, SnapshotSource, SourceError,
};
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::error::{RegistryError, RegistryResult};

/// Manifest file name under the store root.
pub const MANIFEST_FILE: &str = "manifest.json";

/// A directory of snapshot documents indexed by a checksummed manifest.
///
/// The store keeps the latest snapshot per key. Fetching with an `as_of`
/// earlier than the stored snapshot's capture instant is `NotFound`.
#[derive(Debug)]
pub struct FileSnapshotStore {
    root: PathBuf,
    manifest: RwLock<SnapshotManifest>,
}

impl FileSnapshotStore {
    /// Opens a store, creating the root directory if needed.
    ///
    /// An existing manifest is loaded; otherwise the store starts empty and
    /// the manifest is written on the first save.
    pub fn open<P: AsRef<Path>>(root: P) -> RegistryResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).map_err(|e| RegistryError::io_error(&root, e))?;

        let manifest_path = root.join(MANIFEST_FILE);
        let manifest = if manifest_path.exists() {
            SnapshotManifest::load(&manifest_path)?
        } else {
            SnapshotManifest::new()
        };
        debug!(root = %root.display(), snapshots = manifest.count(), "opened snapshot store");

        Ok(Self {
            root,
            manifest: RwLock::new(manifest),
        })
    }

    /// Returns the store root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns a copy of the manifest.
    pub fn manifest(&self) -> SnapshotManifest {
        self.manifest.read().clone()
    }

    /// Returns the document path for a key.
    pub fn path_for(&self, key: &SnapshotKey) -> RegistryResult<PathBuf> {
        Ok(self.root.join(relative_path(key)?))
    }

    /// Validates and writes a snapshot, then records it in the manifest.
    ///
    /// Returns the manifest entry that was written.
    pub fn save(&self, snapshot: &ProvenanceSnapshot) -> RegistryResult<ManifestEntry> {
        snapshot.validate()?;
        let key = snapshot.key();
        let relative = relative_path(&key)?;
        let path = self.root.join(&relative);

        let document = snapshot.to_json_pretty()?;
        let bytes = document.as_bytes();

        let mut manifest = self.manifest.write();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| RegistryError::io_error(parent, e))?;
        }
        write_atomic(&path, bytes)?;

        let entry = ManifestEntry {
            key: key.clone(),
            version: snapshot.version,
            captured_at: snapshot.captured_at,
            file: relative
                .iter()
                .map(|part| part.to_string_lossy())
                .collect::<Vec<_>>()
                .join("/"),
            sha256: checksum(bytes),
            size_bytes: bytes.len() as u64,
        };

        manifest.upsert(entry.clone());
        manifest.save(self.root.join(MANIFEST_FILE))?;
        info!(
            snapshot = %key,
            version = snapshot.version,
            bytes = entry.size_bytes,
            "snapshot saved"
        );
        Ok(entry)
    }

    /// Loads and verifies the snapshot stored for `key`.
    pub fn load(&self, key: &SnapshotKey) -> RegistryResult<ProvenanceSnapshot> {
        let entry = self
            .manifest
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| RegistryError::NotInManifest(key.clone()))?;
        let path = self.root.join(&entry.file);

        let bytes = fs::read(&path).map_err(|e| RegistryError::io_error(&path, e))?;
        let actual = checksum(&bytes);
        if actual != entry.sha256 {
            return Err(RegistryError::ChecksumMismatch {
                path,
                expected: entry.sha256,
                actual,
            });
        }

        let text = String::from_utf8(bytes)
            .map_err(|e| SnapshotError::Parse(format!("{}: {}", path.display(), e)))?;
        let snapshot = ProvenanceSnapshot::from_json(&text)?;
        debug!(snapshot = %key, version = snapshot.version, "snapshot loaded from disk");
        Ok(snapshot)
    }

    /// Deletes the document for `key` and drops it from the manifest.
    ///
    /// Returns whether the key was stored.
    pub fn remove(&self, key: &SnapshotKey) -> RegistryResult<bool> {
        let mut manifest = self.manifest.write();
        let Some(entry) = manifest.get(key).cloned() else {
            return Ok(false);
        };
        let path = self.root.join(&entry.file);
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(RegistryError::io_error(&path, e)),
        }
        manifest.remove(key);
        manifest.save(self.root.join(MANIFEST_FILE))?;
        info!(snapshot = %key, "snapshot removed");
        Ok(true)
    }

    /// Returns the stored keys in manifest order.
    pub fn keys(&self) -> Vec<SnapshotKey> {
        self.manifest
            .read()
            .snapshots
            .iter()
            .map(|e| e.key.clone())
            .collect()
    }
}

impl SnapshotSource for FileSnapshotStore {
    fn fetch(
        &self,
        key: &SnapshotKey,
        as_of: DateTime<Utc>,
    ) -> Result<Arc<ProvenanceSnapshot>, SourceError> {
        let snapshot = self.load(key).map_err(|e| e.into_source_error(key))?;
        if snapshot.captured_at > as_of {
            return Err(SourceError::NotFound(key.clone()));
        }
        Ok(Arc::new(snapshot))
    }
}

/// Computes the hex SHA-256 of a document.
fn checksum(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// `<provenance>/<task_type>/<operation>.json`, rejecting components that
/// would escape the root.
fn relative_path(key: &SnapshotKey) -> RegistryResult<PathBuf> {
    for part in [&key.provenance, &key.task_type, &key.operation] {
        let bad = part.is_empty()
            || part == "."
            || part == ".."
            || part.contains(['/', '\\', '\0']);
        if bad {
            return Err(RegistryError::InvalidKey(part.clone()));
        }
    }
    Ok(PathBuf::from(&key.provenance)
        .join(&key.task_type)
        .join(format!("{}.json", key.operation)))
}

fn write_atomic(path: &Path, bytes: &[u8]) -> RegistryResult<()> {
    let tmp = path.with_extension("json.tmp");
    let mut file = fs::File::create(&tmp).map_err(|e| RegistryError::io_error(&tmp, e))?;
    file.write_all(bytes)
        .and_then(|()| file.sync_all())
        .map_err(|e| RegistryError::io_error(&tmp, e))?;
    drop(file);
    fs::rename(&tmp, path).map_err(|e| RegistryError::io_error(path, e))
}
