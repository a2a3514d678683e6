//! Listener configuration.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ListenConfig {
    /// Interface to bind (default: all IPv4 interfaces)
    #[serde(default = "default_interface")]
    pub interface: IpAddr,
    pub port: u16,
    /// Upper bound on how long `stop` waits for in-flight requests
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
    /// Largest inbound request body accepted before answering 413
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl ListenConfig {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.interface, self.port)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            interface: default_interface(),
            port: 8080,
            shutdown_timeout_secs: default_shutdown_timeout(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

fn default_interface() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_shutdown_timeout() -> u64 {
    30
}

fn default_max_body_bytes() -> usize {
    10 * 1024 * 1024
}
