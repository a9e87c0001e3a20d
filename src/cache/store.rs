//! Cache Store Module
//!
//! Byte-bounded response cache combining a HashMap index with LRU ordering.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use crate::cache::{CacheEntry, CacheStats, LruTracker};
use crate::error::{ProxyError, Result};

/// Cache handle shared by every connection worker.
///
/// The single mutex serializes all `get`/`put` calls. No I/O ever happens
/// while it is held.
pub type SharedCache = Arc<Mutex<CacheStore>>;

// == Cache Store ==
/// Response cache with a fixed byte budget and strict LRU eviction.
#[derive(Debug)]
pub struct CacheStore {
    /// URL -> entry index
    entries: HashMap<String, CacheEntry>,
    /// Recency order over the keys of `entries`
    lru: LruTracker,
    stats: CacheStats,
    /// Byte budget, fixed at construction
    capacity_bytes: u64,
    /// Sum of `size` over resident entries
    used_bytes: u64,
}

impl CacheStore {
    // == Constructor ==
    /// Creates an empty store holding at most `capacity_bytes` of responses.
    ///
    /// # Arguments
    /// * `capacity_bytes` - Byte budget shared by all resident entries
    pub fn new(capacity_bytes: u64) -> Self {
        Self {
            entries: HashMap::new(),
            lru: LruTracker::new(),
            stats: CacheStats::new(),
            capacity_bytes,
            used_bytes: 0,
        }
    }

    // == Shared ==
    /// Creates an empty store wrapped for sharing across workers.
    pub fn shared(capacity_bytes: u64) -> SharedCache {
        Arc::new(Mutex::new(Self::new(capacity_bytes)))
    }

    // == Get ==
    /// Looks up `url`, promoting it to most recently used on a hit.
    ///
    /// The returned entry shares its body with the resident one.
    ///
    /// # Arguments
    /// * `url` - Request target exactly as the client sent it
    pub fn get(&mut self, url: &str) -> Option<CacheEntry> {
        match self.entries.get(url) {
            Some(entry) => {
                // Clone first; promotion needs `self.lru` mutably
                let entry = entry.clone();
                self.lru.touch(url);
                self.stats.record_hit();
                Some(entry)
            }
            None => {
                self.stats.record_miss();
                None
            }
        }
    }

    // == Put ==
    /// Admits `entry` at the most recently used position.
    ///
    /// A resident entry for the same URL is replaced. Least recently used
    /// entries are evicted until the new one fits; their URLs are returned.
    /// An entry larger than the whole capacity is rejected with
    /// [`ProxyError::OversizedEntry`] and leaves the store untouched.
    ///
    /// # Arguments
    /// * `entry` - Complete origin response keyed by its request target
    pub fn put(&mut self, entry: CacheEntry) -> Result<Vec<String>> {
        // Reject before touching anything
        let size = entry.size();
        if size > self.capacity_bytes {
            return Err(ProxyError::OversizedEntry {
                url: entry.url().to_string(),
                size,
                capacity: self.capacity_bytes,
            });
        }

        // Replacement: drop the old occupant and its bytes
        let url = entry.url().to_string();
        if let Some(previous) = self.entries.remove(&url) {
            self.used_bytes -= previous.size();
            self.lru.remove(&url);
        }

        // Evict from the tail until the new entry fits
        let mut evicted = Vec::new();
        while self.used_bytes + size > self.capacity_bytes {
            let Some(victim) = self.lru.evict_oldest() else {
                unreachable!(
                    "recency list empty with {} bytes still accounted",
                    self.used_bytes
                );
            };
            if let Some(removed) = self.entries.remove(&victim) {
                self.used_bytes -= removed.size();
            }
            self.stats.record_eviction();
            debug!(url = %victim, "evicted least recently used entry");
            evicted.push(victim);
        }

        // Admit at the head
        self.used_bytes += size;
        self.lru.touch(&url);
        self.entries.insert(url, entry);

        Ok(evicted)
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            resident_entries: self.entries.len(),
            used_bytes: self.used_bytes,
            ..self.stats.clone()
        }
    }

    // == Order ==
    /// Resident URLs from most to least recently used.
    pub fn order(&self) -> Vec<String> {
        let mut order = Vec::with_capacity(self.lru.len());
        order.extend(self.lru.iter().map(str::to_string));
        order
    }

    // == Contains ==
    /// True if `url` is resident. Does not affect recency.
    pub fn contains(&self, url: &str) -> bool {
        self.entries.contains_key(url)
    }

    // == Capacity ==
    /// Byte budget fixed at construction.
    pub fn capacity_bytes(&self) -> u64 {
        self.capacity_bytes
    }

    // == Used Bytes ==
    /// Sum of the sizes of all resident entries.
    pub fn used_bytes(&self) -> u64 {
        self.used_bytes
    }

    // == Length ==
    /// Number of resident entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    // == Is Empty ==
    pub fn is_empty(&self) -> bool {
        self.lru.is_empty()
    }
}
