//! Counters for the snapshot cache.

/// Statistics about snapshot cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Fetches answered from a fresh entry.
    pub hits: u64,
    /// Fetches with no usable entry.
    pub misses: u64,
    /// Fetches that found an expired entry and went to the source.
    pub expired: u64,
    /// Entries pushed out by the capacity bound.
    pub evictions: u64,
    /// Explicit refreshes that replaced an entry.
    pub refreshes: u64,
    /// Expired entries served because the source failed.
    pub stale_served: u64,
    /// Source failures seen by the cache.
    pub loader_failures: u64,
    /// Entries currently held.
    pub entries: usize,
}

impl CacheStats {
    /// Returns the hit rate as a percentage of all lookups.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses + self.expired;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

impl std::fmt::Display for CacheStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Snapshot Cache Statistics:")?;
        writeln!(f, "  Entries:         {}", self.entries)?;
        writeln!(f, "  Hits:            {}", self.hits)?;
        writeln!(f, "  Misses:          {}", self.misses)?;
        writeln!(f, "  Expired:         {}", self.expired)?;
        writeln!(f, "  Hit rate:        {:.1}%", self.hit_rate())?;
        writeln!(f, "  Evictions:       {}", self.evictions)?;
        writeln!(f, "  Refreshes:       {}", self.refreshes)?;
        writeln!(f, "  Stale served:    {}", self.stale_served)?;
        write!(f, "  Loader failures: {}", self.loader_failures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate() {
        assert_eq!(CacheStats::default().hit_rate(), 0.0);
        let stats = CacheStats {
            hits: 3,
            misses: 1,
            ..Default::default()
        };
        assert_eq!(stats.hit_rate(), 75.0);
    }

    #[test]
    fn test_display_lists_counters() {
        let stats = CacheStats {
            stale_served: 2,
            ..Default::default()
        };
        let text = stats.to_string();
        assert!(text.starts_with("Snapshot Cache Statistics:"));
        assert!(text.contains("Stale served:    2"));
    }
}
