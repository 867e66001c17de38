//! Configuration for the snapshot cache.

use std::time::Duration;

/// Configuration for [`SnapshotCache`](crate::SnapshotCache).
///
/// # Example
///
/// ```rust
/// use litquery_registry::CacheConfig;
/// use std::time::Duration;
///
/// let config = CacheConfig::builder()
///     .with_max_entries(64)
///     .with_ttl(Duration::from_secs(60))
///     .with_serve_stale_on_error(true)
///     .build();
/// assert_eq!(config.max_entries, 64);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum number of cached snapshots. Zero is treated as one.
    pub max_entries: usize,
    /// How long a cached snapshot counts as fresh.
    pub ttl: Duration,
    /// Serve an expired entry when the wrapped source fails transiently.
    pub serve_stale_on_error: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 1024,
            ttl: Duration::from_secs(300),
            serve_stale_on_error: false,
        }
    }
}

impl CacheConfig {
    /// Creates a new builder starting from the defaults.
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::default()
    }
}

/// Builder for [`CacheConfig`].
#[derive(Debug, Clone, Default)]
pub struct CacheConfigBuilder {
    config: CacheConfig,
}

impl CacheConfigBuilder {
    /// Sets the maximum number of cached snapshots.
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.config.max_entries = max_entries;
        self
    }

    /// Sets the freshness window.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.config.ttl = ttl;
        self
    }

    /// Enables or disables stale serving on transient source failures.
    pub fn with_serve_stale_on_error(mut self, serve_stale: bool) -> Self {
        self.config.serve_stale_on_error = serve_stale;
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> CacheConfig {
        self.config
    }
}
