//! Cache Statistics Module
//!
//! Tracks lookups, evictions and byte usage of the response cache.

// == Cache Stats ==
/// Snapshot of cache activity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups that found a resident entry
    pub hits: u64,
    /// Lookups that found nothing
    pub misses: u64,
    /// Entries removed to make room for new ones
    pub evictions: u64,
    /// Entries currently resident
    pub resident_entries: usize,
    /// Bytes currently charged against the capacity
    pub used_bytes: u64,
}

impl CacheStats {
    // == Constructor ==
    /// Creates zeroed statistics.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Returns hits / (hits + misses), or 0.0 before any lookup.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    // == Record Hit ==
    /// Counts a lookup that found a resident entry.
    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    // == Record Miss ==
    /// Counts a lookup that found nothing.
    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    // == Record Eviction ==
    /// Counts one entry evicted from the tail.
    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }
}
