//! Cache Entry Module
//!
//! Defines the immutable value stored for each cached URL.

use bytes::Bytes;
use tracing::warn;

use crate::http::content_length;

// == Cache Entry ==
/// A complete origin response cached under its request URL.
///
/// Entries are built once and never mutated; `Clone` is cheap because the
/// body is a shared [`Bytes`] buffer.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Cache key, the request target exactly as the client sent it
    url: String,
    /// Status line, headers and payload exactly as received
    body: Bytes,
    /// Byte length of `body`, charged against the cache budget
    size: u64,
    /// Content-Length declared by the origin, informational only
    declared_content_length: Option<u64>,
}

impl CacheEntry {
    // == Constructor ==
    /// Builds an entry from a URL and the origin's raw response bytes.
    ///
    /// A missing or unparseable `Content-Length` is logged and recorded as
    /// `None`; the entry itself is still valid and servable.
    pub fn new(url: impl Into<String>, body: impl Into<Bytes>) -> Self {
        let url = url.into();
        let body = body.into();

        let declared_content_length = match content_length(&body) {
            Ok(length) => Some(length),
            Err(err) => {
                warn!(url = %url, "{}", err);
                None
            }
        };

        Self {
            size: body.len() as u64,
            url,
            body,
            declared_content_length,
        }
    }

    /// Cache key of this entry.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Raw response bytes.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Number of bytes this entry occupies in the cache.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn declared_content_length(&self) -> Option<u64> {
        self.declared_content_length
    }
}
