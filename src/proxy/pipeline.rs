//! Request Pipeline
//!
//! Per-connection worker: read request, consult the cache, fetch from the
//! origin on a miss, and relay the response bytes to the client.

use std::io;
use std::net::SocketAddr;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::Instant;
use tracing::debug;

use crate::cache::{CacheEntry, SharedCache};
use crate::error::{ProxyError, Result};
use crate::http::RequestHead;
use crate::proxy::origin::OriginFetcher;
use crate::proxy::record::{CacheStatus, RequestRecord};

/// Bytes read from the client in the single request read.
pub const REQUEST_BUFFER_SIZE: usize = 2048;

/// Response chosen for a request, plus the outcome of caching it.
struct Resolved {
    entry: CacheEntry,
    status: CacheStatus,
    admission: Result<()>,
}

// == Request Pipeline ==
/// Handles one client connection from first read to close.
///
/// Cloning is cheap; every clone shares the same cache.
#[derive(Debug, Clone)]
pub struct RequestPipeline {
    cache: SharedCache,
    fetcher: OriginFetcher,
}

impl RequestPipeline {
    pub fn new(cache: SharedCache) -> Self {
        Self {
            cache,
            fetcher: OriginFetcher::new(),
        }
    }

    pub fn cache(&self) -> &SharedCache {
        &self.cache
    }

    // == Handle ==
    /// Serves one request on `stream` and closes it.
    ///
    /// Returns `Ok(None)` when the client closed without sending anything.
    /// Origin and request failures are reported to the client with an
    /// error status before being returned. A response too large for the
    /// cache is still delivered, then reported as
    /// [`ProxyError::OversizedEntry`].
    pub async fn handle<S>(&self, mut stream: S, client: SocketAddr) -> Result<Option<RequestRecord>>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let started = Instant::now();

        let mut buf = vec![0u8; REQUEST_BUFFER_SIZE];
        let n = stream.read(&mut buf).await.map_err(ProxyError::ClientIo)?;
        if n == 0 {
            debug!(client = %client, "client closed without sending a request");
            return Ok(None);
        }

        let resolved = match self.resolve(&buf[..n]).await {
            Ok(resolved) => resolved,
            Err(err) => {
                if let Some(response) = err.to_response() {
                    // Best effort; the original error is what gets reported.
                    let _ = write_all_draining(&mut stream, &response).await;
                }
                let _ = stream.shutdown().await;
                return Err(err);
            }
        };

        write_all_draining(&mut stream, resolved.entry.body()).await?;
        // Every byte has been handed to the socket already.
        let _ = stream.shutdown().await;

        let record = RequestRecord {
            client,
            url: resolved.entry.url().to_string(),
            status: resolved.status,
            content_length: resolved.entry.declared_content_length(),
            latency: started.elapsed(),
        };
        record.emit();

        resolved.admission?;
        Ok(Some(record))
    }

    /// Looks the request up in the cache, fetching and storing it on a miss.
    async fn resolve(&self, raw: &[u8]) -> Result<Resolved> {
        let head = RequestHead::parse(raw)?;
        let url = head.target.clone();

        let cached = self.cache.lock().await.get(&url);
        if let Some(entry) = cached {
            return Ok(Resolved {
                entry,
                status: CacheStatus::Hit,
                admission: Ok(()),
            });
        }

        if head.method != "GET" {
            debug!(method = %head.method, url = %url, "re-issuing request as GET");
        }
        let response = self.fetcher.fetch(&head).await?;
        let entry = CacheEntry::new(url, response);

        let admission = self.cache.lock().await.put(entry.clone()).map(|evicted| {
            if !evicted.is_empty() {
                debug!(url = %entry.url(), evicted = evicted.len(), "made room for new entry");
            }
        });

        Ok(Resolved {
            entry,
            status: CacheStatus::Miss,
            admission,
        })
    }
}

// == Write Draining ==
/// Writes all of `bytes`, continuing with the unsent tail after every
/// partial write.
pub async fn write_all_draining<W>(writer: &mut W, bytes: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut sent = 0;
    while sent < bytes.len() {
        let n = writer
            .write(&bytes[sent..])
            .await
            .map_err(ProxyError::ClientIo)?;
        if n == 0 {
            return Err(ProxyError::ClientIo(io::ErrorKind::WriteZero.into()));
        }
        sent += n;
    }

    writer.flush().await.map_err(ProxyError::ClientIo)
}
