//! Cache Module
//!
//! Provides the byte-bounded, thread-safe LRU response cache.

mod entry;
mod lru;
mod stats;
mod store;


// Re-export public types
pub use entry::CacheEntry;
pub use lru::LruTracker;
pub use stats::CacheStats;
pub use store::{CacheStore, SharedCache};
