//! Error types for the registry crate.

use litquery_compiler::{SnapshotError, SnapshotKey, SourceError};

#[cfg(feature = "persistence")]
use std::path::PathBuf;

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Errors that can occur while loading, caching or storing snapshots.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// The wrapped source could not produce a snapshot.
    #[error("failed to load snapshot {key}: {source}")]
    Source {
        /// Key that was requested.
        key: SnapshotKey,
        /// Underlying source failure.
        #[source]
        source: SourceError,
    },

    /// A snapshot document failed validation.
    #[error("invalid snapshot: {0}")]
    Snapshot(#[from] SnapshotError),

    /// A key component cannot be used as a storage path segment.
    #[error("invalid snapshot key component '{0}'")]
    InvalidKey(String),

    /// I/O error during persistence operations.
    #[cfg(feature = "persistence")]
    #[error("I/O error at {path}: {source}")]
    Io {
        /// File or directory involved.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Manifest (de)serialization error.
    #[cfg(feature = "persistence")]
    #[error("manifest error: {0}")]
    Manifest(String),

    /// The manifest has no entry for the key.
    #[cfg(feature = "persistence")]
    #[error("no manifest entry for {0}")]
    NotInManifest(SnapshotKey),

    /// Stored bytes do not match the manifest checksum.
    #[cfg(feature = "persistence")]
    #[error("checksum mismatch for {path}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// Snapshot file.
        path: PathBuf,
        /// Checksum recorded in the manifest.
        expected: String,
        /// Checksum of the bytes on disk.
        actual: String,
    },
}

impl RegistryError {
    /// Creates an I/O error.
    #[cfg(feature = "persistence")]
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Maps this error onto the compiler's [`SourceError`] for `key`.
    ///
    /// Missing data becomes `NotFound`, unreadable storage becomes
    /// `Unavailable` and everything else is `Invalid`.
    pub fn into_source_error(self, key: &SnapshotKey) -> SourceError {
        match self {
            Self::Source { source, .. } => source,
            #[cfg(feature = "persistence")]
            Self::NotInManifest(_) => SourceError::NotFound(key.clone()),
            #[cfg(feature = "persistence")]
            Self::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound => {
                SourceError::NotFound(key.clone())
            }
            #[cfg(feature = "persistence")]
            Self::Io { path, source } => {
                SourceError::Unavailable(format!("{}: {}", path.display(), source))
            }
            other => SourceError::Invalid(other.to_string()),
        }
    }
}
