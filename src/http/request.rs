//! Request Head Module
//!
//! Tokenizes the request line and header lines sent by a client.

use bytes::Bytes;

use crate::error::{ProxyError, Result};

/// Port assumed when the Host header carries none.
pub const DEFAULT_HTTP_PORT: u16 = 80;

const CRLF: &[u8] = b"\r\n";

// == Request Head ==
/// Parsed request line plus headers of a client request.
#[derive(Debug, Clone)]
pub struct RequestHead {
    /// Request method token, e.g. `GET`
    pub method: String,
    /// Request target exactly as sent; this is the cache key
    pub target: String,
    /// Protocol token, e.g. `HTTP/1.1`
    pub version: String,
    /// Header name/value pairs in arrival order, trimmed
    headers: Vec<(String, String)>,
    /// Everything after the request line, forwarded to the origin untouched
    header_block: Bytes,
}

impl RequestHead {
    // == Parse ==
    /// Tokenizes raw request bytes.
    ///
    /// The request line must be CRLF-terminated and hold exactly three
    /// whitespace-separated tokens, and must be valid UTF-8 because the
    /// target becomes a `String` cache key. Header lines are split on the
    /// first `:`; lines without one are skipped.
    pub fn parse(raw: &[u8]) -> Result<Self> {
        let line_end = find(raw, CRLF).ok_or_else(|| {
            ProxyError::MalformedRequest("request line is not terminated by CRLF".to_string())
        })?;

        let line = std::str::from_utf8(&raw[..line_end]).map_err(|_| {
            ProxyError::MalformedRequest("request line is not valid UTF-8".to_string())
        })?;

        let mut tokens = line.split_whitespace();
        let (method, target, version) = match (tokens.next(), tokens.next(), tokens.next()) {
            (Some(method), Some(target), Some(version)) if tokens.next().is_none() => {
                (method, target, version)
            }
            _ => {
                return Err(ProxyError::MalformedRequest(format!(
                    "expected `METHOD TARGET VERSION`, got {line:?}"
                )))
            }
        };

        if !version.starts_with("HTTP/") {
            return Err(ProxyError::MalformedRequest(format!(
                "unsupported protocol {version:?}"
            )));
        }

        let header_block = Bytes::copy_from_slice(&raw[line_end + CRLF.len()..]);
        let headers = String::from_utf8_lossy(&header_block)
            .split("\r\n")
            .take_while(|line| !line.is_empty())
            .filter_map(|line| line.split_once(':'))
            .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
            .collect();

        Ok(Self {
            method: method.to_string(),
            target: target.to_string(),
            version: version.to_string(),
            headers,
            header_block,
        })
    }

    // == Header Lookup ==
    /// Returns the first header value whose name matches case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Value of the Host header, if any.
    pub fn host(&self) -> Option<&str> {
        self.header("Host")
    }

    /// Header lines (and anything after them) as received.
    pub fn header_block(&self) -> &Bytes {
        &self.header_block
    }
}

// == Host Splitting ==
/// Splits a Host header value into host name and port.
///
/// Accepts `name`, `name:port` and bracketed IPv6 literals such as
/// `[::1]:8080`. Without a port, [`DEFAULT_HTTP_PORT`] is used.
pub fn split_host_port(host: &str) -> Result<(String, u16)> {
    let host = host.trim();
    if host.is_empty() {
        return Err(ProxyError::MalformedRequest("empty Host header".to_string()));
    }

    if let Some(rest) = host.strip_prefix('[') {
        let (addr, tail) = rest.split_once(']').ok_or_else(|| {
            ProxyError::MalformedRequest(format!("unterminated IPv6 literal in {host:?}"))
        })?;
        let port = match tail.strip_prefix(':') {
            Some(port) => parse_port(port)?,
            None if tail.is_empty() => DEFAULT_HTTP_PORT,
            None => {
                return Err(ProxyError::MalformedRequest(format!(
                    "unexpected text after IPv6 literal in {host:?}"
                )))
            }
        };
        return Ok((addr.to_string(), port));
    }

    match host.rsplit_once(':') {
        Some((name, port)) => Ok((name.to_string(), parse_port(port)?)),
        None => Ok((host.to_string(), DEFAULT_HTTP_PORT)),
    }
}

fn parse_port(port: &str) -> Result<u16> {
    port.parse()
        .map_err(|_| ProxyError::MalformedRequest(format!("invalid port {port:?}")))
}

// == Origin Path ==
/// Derives the path+query to put on the re-issued request line.
///
/// Absolute-form targets (`http://host:port/path?q`) lose their scheme and
/// authority; origin-form targets (`/path`) are kept. An empty path is `/`.
pub fn origin_path(target: &str) -> String {
    if target.starts_with('/') {
        return target.to_string();
    }

    let rest = match target.find("://") {
        Some(idx) => &target[idx + 3..],
        None => target,
    };

    match rest.find(|c: char| c == '/' || c == '?') {
        Some(idx) if rest[idx..].starts_with('/') => rest[idx..].to_string(),
        Some(idx) => format!("/{}", &rest[idx..]),
        None => "/".to_string(),
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
