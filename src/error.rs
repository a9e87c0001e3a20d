//! Error types for the caching proxy
//!
//! Provides unified error handling using thiserror.

use std::io;

use thiserror::Error;

// == Proxy Error Enum ==
/// Unified error type for the proxy.
///
/// Variants split into two classes (see [`ProxyError::is_fatal`]):
/// process-fatal conditions that stop the listener, and connection-scoped
/// failures that only end the worker serving one client.
#[derive(Error, Debug)]
pub enum ProxyError {
    /// A single response can never fit in the configured cache
    #[error("Response for {url} ({size} bytes) exceeds maximum cache size ({capacity} bytes)")]
    OversizedEntry { url: String, size: u64, capacity: u64 },

    /// Client request could not be tokenized
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    /// Client request carries no Host header
    #[error("Request has no Host header")]
    MissingHostHeader,

    /// No resolved address for the origin accepted a connection
    #[error("Failed to connect to origin {host}:{port}")]
    OriginUnreachable { host: String, port: u16 },

    /// Send or receive against the origin failed
    #[error("Origin I/O error: {0}")]
    OriginIo(#[source] io::Error),

    /// Origin response has no usable Content-Length header
    #[error("Malformed origin response: {0}")]
    MalformedOriginResponse(String),

    /// Reading from or writing to the client failed
    #[error("Client I/O error: {0}")]
    ClientIo(#[source] io::Error),

    /// Bind/listen/accept on the proxy socket failed
    #[error("Listener error: {0}")]
    Listener(#[source] io::Error),
}

impl ProxyError {
    // == Is Fatal ==
    /// Returns true if the error must stop the whole proxy rather than
    /// a single connection.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ProxyError::OversizedEntry { .. } | ProxyError::Listener(_)
        )
    }

    // == Status ==
    /// HTTP status reported to the client when a request fails before any
    /// response bytes were sent. `None` means nothing should be written.
    pub fn status(&self) -> Option<(u16, &'static str)> {
        match self {
            ProxyError::MalformedRequest(_) | ProxyError::MissingHostHeader => {
                Some((400, "Bad Request"))
            }
            ProxyError::OriginUnreachable { .. }
            | ProxyError::OriginIo(_)
            | ProxyError::MalformedOriginResponse(_) => Some((502, "Bad Gateway")),
            ProxyError::OversizedEntry { .. }
            | ProxyError::ClientIo(_)
            | ProxyError::Listener(_) => None,
        }
    }

    // == Error Response ==
    /// Renders a minimal close-delimited HTTP response describing the error.
    pub fn to_response(&self) -> Option<Vec<u8>> {
        let (code, reason) = self.status()?;
        let message = self.to_string();

        Some(
            format!(
                "HTTP/1.1 {code} {reason}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{message}",
                message.len()
            )
            .into_bytes(),
        )
    }
}

// == Result Type Alias ==
/// Convenience Result type for the proxy.
pub type Result<T> = std::result::Result<T, ProxyError>;
