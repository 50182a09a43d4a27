//! Server configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the relay server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// How long `/poll` waits for a message before answering empty.
    pub poll_timeout_secs: u64,
    /// Frames buffered per live connection before new ones are dropped.
    pub outbound_queue_capacity: usize,
    /// Keepalive ping interval for live connections.
    pub ping_interval_secs: u64,
    /// Max WebSocket message size in bytes.
    pub max_message_size: usize,
    /// Directory served under `/static`, if any.
    pub static_dir: Option<PathBuf>,
}

impl ServerConfig {
    /// Poll timeout as a `Duration`.
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout_secs)
    }

    /// Ping interval as a `Duration`, never shorter than one second.
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs.max(1))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            poll_timeout_secs: 30,
            outbound_queue_capacity: 256,
            ping_interval_secs: 30,
            max_message_size: 64 * 1024,
            static_dir: None,
        }
    }
}
