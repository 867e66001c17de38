//! The snapshot boundary between the compiler and the registry.
//!
//! The compiler never talks to the registry service directly. It asks a
//! [`SnapshotSource`] for an immutable [`ProvenanceSnapshot`] and threads that
//! snapshot through every pipeline stage.
//!
//! Implementations live elsewhere (see the `litquery-registry` crate for an
//! in-memory map, a file store and an LRU/TTL cache wrapper). A minimal
//! source looks like this:
//!
//! ```rust
//! use std::sync::Arc;
//! use chrono::{DateTime, Utc};
//! use litquery_compiler::{ProvenanceSnapshot, SnapshotKey, SnapshotSource, SourceError};
//!
//! struct Fixed(Arc<ProvenanceSnapshot>);
//!
//! impl SnapshotSource for Fixed {
//!     fn fetch(
//!         &self,
//!         key: &SnapshotKey,
//!         _as_of: DateTime<Utc>,
//!     ) -> Result<Arc<ProvenanceSnapshot>, SourceError> {
//!         if *key == self.0.key() {
//!             Ok(Arc::clone(&self.0))
//!         } else {
//!             Err(SourceError::NotFound(key.clone()))
//!         }
//!     }
//! }
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::snapshot::ProvenanceSnapshot;

/// Identifies one snapshot: provenance code, task type and operation code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SnapshotKey {
    /// Provenance (provider) code, e.g. `crossref`.
    pub provenance: String,
    /// Task type, e.g. `harvest`.
    pub task_type: String,
    /// Operation code, e.g. `search`.
    pub operation: String,
}

impl SnapshotKey {
    /// Creates a key.
    pub fn new(
        provenance: impl Into<String>,
        task_type: impl Into<String>,
        operation: impl Into<String>,
    ) -> Self {
        Self {
            provenance: provenance.into(),
            task_type: task_type.into(),
            operation: operation.into(),
        }
    }
}

impl fmt::Display for SnapshotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.provenance, self.task_type, self.operation)
    }
}

/// Failures of a [`SnapshotSource`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// No snapshot exists for the key.
    #[error("no snapshot for {0}")]
    NotFound(SnapshotKey),

    /// The backing service or storage cannot be reached.
    #[error("source unavailable: {0}")]
    Unavailable(String),

    /// The backing call did not finish in time.
    #[error("source timed out after {0:?}")]
    Timeout(Duration),

    /// The stored snapshot is corrupt or fails validation.
    #[error("invalid snapshot: {0}")]
    Invalid(String),
}

impl SourceError {
    /// Returns true for failures that may clear up on retry.
    ///
    /// `NotFound` and `Invalid` describe the registry's actual state and are
    /// not transient.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout(_))
    }
}

/// Something that can produce provenance snapshots.
///
/// Implementations must be safe to call from many compiles at once and must
/// return complete snapshots only; a snapshot handed out is never mutated.
pub trait SnapshotSource: Send + Sync {
    /// Fetches the snapshot for `key` as of the given instant.
    fn fetch(
        &self,
        key: &SnapshotKey,
        as_of: DateTime<Utc>,
    ) -> Result<Arc<ProvenanceSnapshot>, SourceError>;
}

impl<S: SnapshotSource + ?Sized> SnapshotSource for Arc<S> {
    fn fetch(
        &self,
        key: &SnapshotKey,
        as_of: DateTime<Utc>,
    ) -> Result<Arc<ProvenanceSnapshot>, SourceError> {
        (**self).fetch(key, as_of)
    }
}

impl<S: SnapshotSource + ?Sized> SnapshotSource for &S {
    fn fetch(
        &self,
        key: &SnapshotKey,
        as_of: DateTime<Utc>,
    ) -> Result<Arc<ProvenanceSnapshot>, SourceError> {
        (**self).fetch(key, as_of)
    }
}
