//! Origin Fetcher
//!
//! Re-issues a client's request to the origin server and collects the
//! complete response.

use std::net::SocketAddr;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::{lookup_host, TcpStream};
use tracing::debug;

use crate::error::{ProxyError, Result};
use crate::http::{origin_path, split_host_port, RequestHead};

/// Size of each read from the origin connection (128 KiB).
pub const RESPONSE_CHUNK_SIZE: usize = 1 << 17;

// == Origin Fetcher ==
/// Fetches whole responses from the origin named by a request's Host header.
#[derive(Debug, Clone, Copy, Default)]
pub struct OriginFetcher;

impl OriginFetcher {
    pub fn new() -> Self {
        Self
    }

    // == Fetch ==
    /// Sends `GET <path> HTTP/1.1` followed by the client's original header
    /// block, then reads until the origin closes the connection.
    ///
    /// The method is always `GET`, whatever the client sent.
    pub async fn fetch(&self, request: &RequestHead) -> Result<Bytes> {
        let host = request.host().ok_or(ProxyError::MissingHostHeader)?;
        let (host, port) = split_host_port(host)?;
        let path = origin_path(&request.target);

        let mut stream = connect(&host, port).await?;

        let header_block = request.header_block();
        let request_line = format!("GET {path} HTTP/1.1\r\n");
        let mut outbound = BytesMut::with_capacity(request_line.len() + header_block.len());
        outbound.extend_from_slice(request_line.as_bytes());
        outbound.extend_from_slice(header_block);

        stream
            .write_all(&outbound)
            .await
            .map_err(ProxyError::OriginIo)?;

        let response = read_to_close(&mut stream).await?;
        debug!(host = %host, port, bytes = response.len(), "origin closed connection");

        // The response is complete at this point; a failed close changes nothing.
        let _ = stream.shutdown().await;

        Ok(response)
    }
}

/// Connects to the first resolved address of `host:port` that accepts.
async fn connect(host: &str, port: u16) -> Result<TcpStream> {
    let unreachable = || ProxyError::OriginUnreachable {
        host: host.to_string(),
        port,
    };

    let candidates = lookup_host((host, port)).await.map_err(|err| {
        debug!(host, port, error = %err, "origin address resolution failed");
        unreachable()
    })?;

    connect_first(candidates).await.ok_or_else(unreachable)
}

/// Tries `candidates` in order and returns the first connection that succeeds.
async fn connect_first<I>(candidates: I) -> Option<TcpStream>
where
    I: IntoIterator<Item = SocketAddr>,
{
    for addr in candidates {
        match TcpStream::connect(addr).await {
            Ok(stream) => return Some(stream),
            Err(err) => debug!(%addr, error = %err, "origin connect attempt failed"),
        }
    }

    None
}

// == Read To Close ==
/// Accumulates everything `reader` yields until a zero-length read.
pub async fn read_to_close<R>(reader: &mut R) -> Result<Bytes>
where
    R: AsyncRead + Unpin,
{
    let mut response = BytesMut::new();
    let mut chunk = vec![0u8; RESPONSE_CHUNK_SIZE];

    loop {
        let n = reader.read(&mut chunk).await.map_err(ProxyError::OriginIo)?;
        if n == 0 {
            break;
        }
        response.extend_from_slice(&chunk[..n]);
    }

    Ok(response.freeze())
}
