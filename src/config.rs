//! Configuration Module
//!
//! Handles loading proxy configuration from the command line and environment variables.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use clap::Parser;

/// Proxy configuration parameters.
///
/// The cache capacity is required; everything else has a sensible default.
#[derive(Debug, Clone, Parser)]
#[command(name = "caching_proxy", version, about)]
pub struct Config {
    /// Total cache capacity in bytes
    #[arg(
        value_name = "CAPACITY_BYTES",
        env = "CACHE_CAPACITY",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub capacity_bytes: u64,

    /// Address to listen on
    #[arg(long, env = "PROXY_HOST", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub host: IpAddr,

    /// Port to listen on (0 picks any free port)
    #[arg(short, long, env = "PROXY_PORT", default_value_t = 0)]
    pub port: u16,
}

impl Config {
    /// Creates a config with the given capacity and default listen address.
    pub fn new(capacity_bytes: u64) -> Self {
        Self {
            capacity_bytes,
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 0,
        }
    }

    /// Socket address the listener binds to.
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}
