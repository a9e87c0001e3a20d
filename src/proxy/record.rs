//! Request Record
//!
//! The single log line emitted for every completed request.

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use tracing::info;

/// Whether a response came from the cache or from the origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
        }
    }
}

impl fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// == Request Record ==
/// Outcome of one proxied request.
#[derive(Debug, Clone)]
pub struct RequestRecord {
    pub client: SocketAddr,
    pub url: String,
    pub status: CacheStatus,
    /// Content-Length declared by the origin, if it could be parsed
    pub content_length: Option<u64>,
    /// Wall-clock time from first read to connection close
    pub latency: Duration,
}

impl RequestRecord {
    pub fn latency_ms(&self) -> u64 {
        u64::try_from(self.latency.as_millis()).unwrap_or(u64::MAX)
    }

    // == Emit ==
    /// Logs the record as one structured `info` event.
    pub fn emit(&self) {
        info!(
            client = %self.client,
            url = %self.url,
            cache = self.status.as_str(),
            content_length = self.content_length,
            latency_ms = self.latency_ms(),
            "{}",
            self
        );
    }
}

impl fmt::Display for RequestRecord {
    /// `client | url | HIT | content-length | latency-ms`, with `-` for an
    /// unknown content length.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} | {} | {} | ", self.client, self.url, self.status)?;
        match self.content_length {
            Some(length) => write!(f, "{length}")?,
            None => f.write_str("-")?,
        }
        write!(f, " | {}", self.latency_ms())
    }
}
