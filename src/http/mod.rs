//! HTTP Module
//!
//! Minimal HTTP/1.x tokenization needed by the proxy: the client's request
//! head and the origin response's Content-Length header.

mod request;
mod response;

pub use request::{origin_path, split_host_port, RequestHead, DEFAULT_HTTP_PORT};
pub use response::content_length;
