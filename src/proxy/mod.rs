//! Proxy Module
//!
//! The forward proxy itself: listener, per-connection pipeline, origin
//! fetching and request logging.

pub mod origin;
pub mod pipeline;
pub mod record;
pub mod server;

pub use origin::OriginFetcher;
pub use pipeline::{write_all_draining, RequestPipeline, REQUEST_BUFFER_SIZE};
pub use record::{CacheStatus, RequestRecord};
pub use server::{ProxyServer, Spawn, TokioSpawner};
