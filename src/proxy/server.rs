//! Proxy Server
//!
//! Accept loop that hands every connection to its own worker.

use std::future::Future;
use std::net::SocketAddr;

use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::cache::{CacheStore, SharedCache};
use crate::config::Config;
use crate::error::{ProxyError, Result};
use crate::proxy::pipeline::RequestPipeline;

// == Spawn ==
/// Runs connection workers.
///
/// The accept loop only depends on this trait, so the scheduling policy
/// (one task per connection, a bounded pool, ...) can change without
/// touching the cache or the pipeline.
pub trait Spawn {
    fn spawn<F>(&self, worker: F)
    where
        F: Future<Output = ()> + Send + 'static;
}

/// One unbounded tokio task per connection.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSpawner;

impl Spawn for TokioSpawner {
    fn spawn<F>(&self, worker: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(worker);
    }
}

// == Proxy Server ==
/// Bound listener plus the shared pipeline every worker runs.
pub struct ProxyServer<S = TokioSpawner> {
    listener: TcpListener,
    pipeline: RequestPipeline,
    spawner: S,
}

impl ProxyServer<TokioSpawner> {
    /// Binds the listener and creates an empty cache from `config`.
    pub async fn bind(config: &Config) -> Result<Self> {
        Self::bind_with(config, TokioSpawner).await
    }
}

impl<S: Spawn> ProxyServer<S> {
    /// Like [`ProxyServer::bind`] with a custom worker spawner.
    pub async fn bind_with(config: &Config, spawner: S) -> Result<Self> {
        let listener = TcpListener::bind(config.listen_addr())
            .await
            .map_err(ProxyError::Listener)?;

        Ok(Self {
            listener,
            pipeline: RequestPipeline::new(CacheStore::shared(config.capacity_bytes)),
            spawner,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener.local_addr().map_err(ProxyError::Listener)
    }

    /// Handle to the cache shared by all workers.
    pub fn cache(&self) -> SharedCache {
        self.pipeline.cache().clone()
    }

    // == Run ==
    /// Accepts connections until `shutdown` resolves.
    ///
    /// Returns an error if accepting fails or a worker hits a fatal
    /// condition such as [`ProxyError::OversizedEntry`]. Connection-scoped
    /// failures are logged and never stop the loop.
    pub async fn run<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let (fatal_tx, mut fatal_rx) = mpsc::unbounded_channel::<ProxyError>();
        tokio::pin!(shutdown);

        let outcome = loop {
            tokio::select! {
                _ = &mut shutdown => break Ok(()),
                Some(err) = fatal_rx.recv() => break Err(err),
                accepted = self.listener.accept() => {
                    let (stream, client) = match accepted {
                        Ok(connection) => connection,
                        Err(err) => break Err(ProxyError::Listener(err)),
                    };

                    let pipeline = self.pipeline.clone();
                    let fatal_tx = fatal_tx.clone();
                    self.spawner.spawn(async move {
                        match pipeline.handle(stream, client).await {
                            Ok(_) => {}
                            Err(err) if err.is_fatal() => {
                                error!(client = %client, "{}", err);
                                let _ = fatal_tx.send(err);
                            }
                            Err(err) => warn!(client = %client, "request failed: {}", err),
                        }
                    });
                }
            }
        };

        let stats = self.pipeline.cache().lock().await.stats();
        info!(
            hits = stats.hits,
            misses = stats.misses,
            evictions = stats.evictions,
            resident_entries = stats.resident_entries,
            used_bytes = stats.used_bytes,
            "Cache statistics: hit rate {:.1}%",
            stats.hit_rate() * 100.0
        );

        outcome
    }
}
