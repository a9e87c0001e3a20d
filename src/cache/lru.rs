//! LRU Tracker Module
//!
//! Keeps cached URLs ordered by recency of use.

use std::collections::VecDeque;

// == LRU Tracker ==
/// Recency order of resident URLs.
///
/// - Front = most recently used (head)
/// - Back = least recently used (tail, next eviction victim)
#[derive(Debug, Default)]
pub struct LruTracker {
    order: VecDeque<String>,
}

impl LruTracker {
    // == Constructor ==
    /// Creates an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    // == Touch ==
    /// Moves `url` to the head, inserting it if it is not tracked yet.
    ///
    /// A URL already at the head is left in place.
    pub fn touch(&mut self, url: &str) {
        match self.position(url) {
            Some(0) => {}
            Some(idx) => {
                if let Some(existing) = self.order.remove(idx) {
                    self.order.push_front(existing);
                }
            }
            None => self.order.push_front(url.to_string()),
        }
    }

    // == Remove ==
    /// Stops tracking `url`. Returns false if it was not tracked.
    pub fn remove(&mut self, url: &str) -> bool {
        match self.position(url) {
            Some(idx) => self.order.remove(idx).is_some(),
            None => false,
        }
    }

    // == Evict Oldest ==
    /// Removes and returns the tail URL.
    pub fn evict_oldest(&mut self) -> Option<String> {
        self.order.pop_back()
    }

    // == Iter ==
    /// URLs from most to least recently used.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    // == Length ==
    /// Number of tracked URLs.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    // == Is Empty ==
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    fn position(&self, url: &str) -> Option<usize> {
        self.order.iter().position(|u| u == url)
    }
}
