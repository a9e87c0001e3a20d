//! Caching Proxy - A forward HTTP proxy with an LRU response cache
//!
//! Whole responses are cached by request URL in a byte-bounded store
//! shared by one worker per client connection.

pub mod cache;
pub mod config;
pub mod error;
pub mod http;
pub mod proxy;

pub use cache::{CacheEntry, CacheStore, SharedCache};
pub use config::Config;
pub use error::{ProxyError, Result};
pub use proxy::{ProxyServer, RequestPipeline};
