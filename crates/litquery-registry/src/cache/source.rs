//! A caching wrapper around any snapshot source.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use litquery_compiler::{ProvenanceSnapshot, SnapshotKey, SnapshotSource, SourceError};
use tracing::{debug, info, warn};

use super::{CacheStats, SnapshotCache};
use crate::config::CacheConfig;
use crate::error::{RegistryError, RegistryResult};

/// Serves snapshots from a [`SnapshotCache`], falling back to a wrapped
/// source on a miss or an expired entry.
///
/// A cached snapshot is only served for reads whose `as_of` is at or after
/// its `captured_at`; earlier reads go straight to the wrapped source. A
/// fetched snapshot never replaces a cached one with a higher version.
///
/// With `serve_stale_on_error`, an expired entry is returned when the source
/// fails with a transient error (`Unavailable` or `Timeout`). `NotFound` and
/// `Invalid` always propagate.
///
/// # Example
///
/// ```rust
/// use chrono::Utc;
/// use litquery_compiler::{ProvenanceSnapshot, SnapshotSource};
/// use litquery_registry::{CacheConfig, CachingSnapshotSource, InMemorySnapshotSource};
///
/// let registry = InMemorySnapshotSource::new();
/// registry
///     .insert(ProvenanceSnapshot::new(1, "crossref", "harvest", "search", 1, Utc::now()))
///     .unwrap();
///
/// let cached = CachingSnapshotSource::new(registry, CacheConfig::default());
/// let key = litquery_compiler::SnapshotKey::new("crossref", "harvest", "search");
/// cached.fetch(&key, Utc::now()).unwrap();
/// cached.fetch(&key, Utc::now()).unwrap();
///
/// let stats = cached.stats();
/// assert_eq!((stats.misses, stats.hits), (1, 1));
/// ```
pub struct CachingSnapshotSource<S> {
    inner: S,
    cache: SnapshotCache,
    serve_stale_on_error: bool,
}

impl<S: SnapshotSource> CachingSnapshotSource<S> {
    /// Wraps `inner` with a cache built from `config`.
    pub fn new(inner: S, config: CacheConfig) -> Self {
        Self {
            inner,
            cache: SnapshotCache::new(&config),
            serve_stale_on_error: config.serve_stale_on_error,
        }
    }

    /// Returns the wrapped source.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Returns the cache.
    pub fn cache(&self) -> &SnapshotCache {
        &self.cache
    }

    /// Reloads `key` from the wrapped source and swaps it into the cache,
    /// whatever the cached version.
    pub fn refresh(&self, key: &SnapshotKey) -> RegistryResult<Arc<ProvenanceSnapshot>> {
        match self.inner.fetch(key, Utc::now()) {
            Ok(snapshot) => {
                self.cache.insert(Arc::clone(&snapshot));
                self.cache.record(|s| s.refreshes += 1);
                info!(snapshot = %key, version = snapshot.version, "snapshot refreshed");
                Ok(snapshot)
            }
            Err(source) => {
                self.cache.record(|s| s.loader_failures += 1);
                warn!(snapshot = %key, error = %source, "snapshot refresh failed");
                Err(RegistryError::Source {
                    key: key.clone(),
                    source,
                })
            }
        }
    }

    /// Refreshes every key and returns how many loaded.
    pub fn warm(&self, keys: &[SnapshotKey]) -> usize {
        keys.iter().filter(|key| self.refresh(key).is_ok()).count()
    }

    /// Drops the cached entry for `key`. Returns whether one existed.
    pub fn invalidate(&self, key: &SnapshotKey) -> bool {
        let removed = self.cache.remove(key).is_some();
        if removed {
            debug!(snapshot = %key, "snapshot invalidated");
        }
        removed
    }

    /// Drops every cached entry.
    pub fn invalidate_all(&self) {
        self.cache.clear();
    }

    /// Returns cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

impl<S: SnapshotSource> SnapshotSource for CachingSnapshotSource<S> {
    fn fetch(
        &self,
        key: &SnapshotKey,
        as_of: DateTime<Utc>,
    ) -> Result<Arc<ProvenanceSnapshot>, SourceError> {
        let usable = self
            .cache
            .lookup(key)
            .filter(|cached| cached.snapshot.captured_at <= as_of);

        match &usable {
            Some(cached) if cached.fresh => {
                self.cache.record(|s| s.hits += 1);
                debug!(snapshot = %key, version = cached.snapshot.version, "snapshot cache hit");
                return Ok(Arc::clone(&cached.snapshot));
            }
            Some(_) => {
                self.cache.record(|s| s.expired += 1);
                debug!(snapshot = %key, "snapshot cache entry expired");
            }
            None => {
                self.cache.record(|s| s.misses += 1);
                debug!(snapshot = %key, "snapshot cache miss");
            }
        }

        match self.inner.fetch(key, as_of) {
            Ok(snapshot) => {
                self.cache.insert_if_newer(Arc::clone(&snapshot));
                Ok(snapshot)
            }
            Err(err) => {
                self.cache.record(|s| s.loader_failures += 1);
                match usable {
                    Some(stale) if self.serve_stale_on_error && err.is_transient() => {
                        self.cache.record(|s| s.stale_served += 1);
                        warn!(
                            snapshot = %key,
                            version = stale.snapshot.version,
                            age_ms = stale.age.as_millis() as u64,
                            error = %err,
                            "serving stale snapshot"
                        );
                        Ok(stale.snapshot)
                    }
                    _ => {
                        warn!(snapshot = %key, error = %err, "snapshot loader failed");
                        Err(err)
                    }
                }
            }
        }
    }
}

impl<S> std::fmt::Debug for CachingSnapshotSource<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachingSnapshotSource")
            .field("cache", &self.cache)
            .field("serve_stale_on_error", &self.serve_stale_on_error)
            .finish()
    }
}
