//! Response Header Module
//!
//! Extracts the declared Content-Length from a raw origin response.

use crate::error::{ProxyError, Result};

const HEAD_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Parses the `Content-Length` header out of a raw HTTP response.
///
/// Only the response head (status line and headers, up to the first blank
/// line) is searched, so payload bytes can never be mistaken for a header.
pub fn content_length(response: &[u8]) -> Result<u64> {
    let head_end = response
        .windows(HEAD_TERMINATOR.len())
        .position(|window| window == HEAD_TERMINATOR)
        .unwrap_or(response.len());
    let head = String::from_utf8_lossy(&response[..head_end]);

    let value = head
        .split("\r\n")
        .skip(1)
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("Content-Length"))
        .map(|(_, value)| value.trim())
        .ok_or_else(|| {
            ProxyError::MalformedOriginResponse("missing Content-Length header".to_string())
        })?;

    value.parse().map_err(|_| {
        ProxyError::MalformedOriginResponse(format!("invalid Content-Length {value:?}"))
    })
}
