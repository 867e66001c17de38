//! LRU + TTL cache of provenance snapshots.
//!
//! Entries hold `Arc<ProvenanceSnapshot>`. Replacing an entry swaps the
//! `Arc` under the write lock, so a reader either gets the old snapshot or
//! the new one, never a mix. Readers keep their `Arc` alive after a swap.
//!
//! [`CachingSnapshotSource`] puts a cache in front of any
//! [`SnapshotSource`](litquery_compiler::SnapshotSource).

mod source;
mod stats;

pub use source::CachingSnapshotSource;
pub use stats::CacheStats;

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use litquery_compiler::{ProvenanceSnapshot, SnapshotKey};
use lru::LruCache;
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::config::CacheConfig;

#[derive(Debug, Clone)]
struct CacheEntry {
    snapshot: Arc<ProvenanceSnapshot>,
    stored_at: Instant,
}

impl CacheEntry {
    fn new(snapshot: Arc<ProvenanceSnapshot>) -> Self {
        Self {
            snapshot,
            stored_at: Instant::now(),
        }
    }

    fn is_expired(&self, ttl: Duration) -> bool {
        self.stored_at.elapsed() >= ttl
    }
}

/// A snapshot found in the cache, fresh or not.
#[derive(Debug, Clone)]
pub struct CachedSnapshot {
    /// The cached snapshot.
    pub snapshot: Arc<ProvenanceSnapshot>,
    /// Time since the entry was stored.
    pub age: Duration,
    /// False once the entry has outlived the TTL.
    pub fresh: bool,
}

/// Thread-safe LRU cache with TTL expiration for provenance snapshots.
///
/// # Example
///
/// ```rust
/// use chrono::Utc;
/// use litquery_compiler::ProvenanceSnapshot;
/// use litquery_registry::{CacheConfig, SnapshotCache};
/// use std::sync::Arc;
///
/// let cache = SnapshotCache::new(&CacheConfig::default());
/// let snapshot = Arc::new(ProvenanceSnapshot::new(1, "crossref", "harvest", "search", 3, Utc::now()));
/// cache.insert(Arc::clone(&snapshot));
///
/// let cached = cache.get(&snapshot.key()).unwrap();
/// assert_eq!(cached.version, 3);
/// ```
pub struct SnapshotCache {
    inner: RwLock<LruCache<SnapshotKey, CacheEntry>>,
    ttl: Duration,
    stats: RwLock<CacheStats>,
}

impl SnapshotCache {
    /// Creates a cache from a configuration.
    pub fn new(config: &CacheConfig) -> Self {
        Self::with_capacity(config.max_entries, config.ttl)
    }

    /// Creates a cache with custom capacity and TTL.
    pub fn with_capacity(max_entries: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: RwLock::new(LruCache::new(capacity)),
            ttl,
            stats: RwLock::new(CacheStats::default()),
        }
    }

    /// Returns the freshness window.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Looks up an entry, fresh or expired, and promotes it to most recently
    /// used. Does not touch the statistics.
    pub fn lookup(&self, key: &SnapshotKey) -> Option<CachedSnapshot> {
        let mut cache = self.inner.write();
        let entry = cache.get(key)?;
        Some(CachedSnapshot {
            snapshot: Arc::clone(&entry.snapshot),
            age: entry.stored_at.elapsed(),
            fresh: !entry.is_expired(self.ttl),
        })
    }

    /// Returns the snapshot if a fresh entry exists, counting a hit or miss.
    ///
    /// An expired entry is dropped.
    pub fn get(&self, key: &SnapshotKey) -> Option<Arc<ProvenanceSnapshot>> {
        let mut cache = self.inner.write();
        let state = cache
            .get(key)
            .map(|entry| (entry.is_expired(self.ttl), Arc::clone(&entry.snapshot)));
        let found = match state {
            Some((true, _)) => {
                cache.pop(key);
                self.record(|s| s.expired += 1);
                None
            }
            Some((false, snapshot)) => {
                self.record(|s| s.hits += 1);
                Some(snapshot)
            }
            None => {
                self.record(|s| s.misses += 1);
                None
            }
        };
        debug!(snapshot = %key, hit = found.is_some(), "snapshot cache lookup");
        found
    }

    /// Stores a snapshot under its own key, replacing any existing entry.
    ///
    /// Returns the snapshot that was replaced.
    pub fn insert(&self, snapshot: Arc<ProvenanceSnapshot>) -> Option<Arc<ProvenanceSnapshot>> {
        let key = snapshot.key();
        let mut cache = self.inner.write();
        let previous = cache.pop(&key).map(|entry| entry.snapshot);
        self.store(&mut cache, key, snapshot, previous.as_deref());
        previous
    }

    /// Stores a snapshot unless the cache already holds a higher version.
    ///
    /// Returns whether the snapshot was stored.
    pub fn insert_if_newer(&self, snapshot: Arc<ProvenanceSnapshot>) -> bool {
        let key = snapshot.key();
        let mut cache = self.inner.write();
        let previous = match cache.peek(&key) {
            Some(entry) if entry.snapshot.version > snapshot.version => {
                debug!(
                    snapshot = %key,
                    cached = entry.snapshot.version,
                    offered = snapshot.version,
                    "kept newer cached snapshot"
                );
                return false;
            }
            Some(entry) => Some(Arc::clone(&entry.snapshot)),
            None => None,
        };
        self.store(&mut cache, key, snapshot, previous.as_deref());
        true
    }

    fn store(
        &self,
        cache: &mut LruCache<SnapshotKey, CacheEntry>,
        key: SnapshotKey,
        snapshot: Arc<ProvenanceSnapshot>,
        previous: Option<&ProvenanceSnapshot>,
    ) {
        match previous {
            Some(old) if old.version != snapshot.version => info!(
                snapshot = %key,
                old_version = old.version,
                new_version = snapshot.version,
                "snapshot swapped"
            ),
            Some(_) => debug!(snapshot = %key, version = snapshot.version, "snapshot restamped"),
            None => debug!(snapshot = %key, version = snapshot.version, "snapshot cached"),
        }

        if let Some((evicted, _)) = cache.push(key.clone(), CacheEntry::new(snapshot)) {
            if evicted != key {
                debug!(evicted = %evicted, "snapshot evicted");
                self.record(|s| s.evictions += 1);
            }
        }
    }

    /// Removes an entry, returning its snapshot.
    pub fn remove(&self, key: &SnapshotKey) -> Option<Arc<ProvenanceSnapshot>> {
        self.inner.write().pop(key).map(|entry| entry.snapshot)
    }

    /// Checks if a key is cached, without affecting LRU order or expiry.
    pub fn contains(&self, key: &SnapshotKey) -> bool {
        self.inner.read().contains(key)
    }

    /// Returns the number of entries, expired ones included.
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// Returns true if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clears all entries. Statistics are kept.
    pub fn clear(&self) {
        self.inner.write().clear();
    }

    /// Removes expired entries and returns how many were dropped.
    pub fn cleanup_expired(&self) -> usize {
        let mut cache = self.inner.write();
        let expired: Vec<SnapshotKey> = cache
            .iter()
            .filter(|(_, entry)| entry.is_expired(self.ttl))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            cache.pop(key);
        }
        expired.len()
    }

    /// Returns a copy of the statistics.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.read().clone();
        stats.entries = self.len();
        stats
    }

    /// Resets the statistics.
    pub fn reset_stats(&self) {
        *self.stats.write() = CacheStats::default();
    }

    pub(crate) fn record(&self, update: impl FnOnce(&mut CacheStats)) {
        update(&mut self.stats.write());
    }
}

impl std::fmt::Debug for SnapshotCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotCache")
            .field("entries", &self.len())
            .field("ttl", &self.ttl)
            .finish()
    }
}
