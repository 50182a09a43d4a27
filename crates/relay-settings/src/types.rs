//! Settings types.

use serde::{Deserialize, Serialize};

/// Root settings document (`~/.relay/settings.json`).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelaySettings {
    /// Network and delivery settings.
    pub server: ServerSettings,
    /// Log output settings.
    pub logging: LoggingSettings,
}

/// Network and delivery settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// How long a poll waits for a message before returning empty.
    pub poll_timeout_secs: u64,
    /// Interval between keepalive pings on live connections.
    pub ping_interval_secs: u64,
    /// Outbound frames buffered per live connection.
    pub outbound_queue_capacity: usize,
    /// Largest accepted WebSocket message in bytes.
    pub max_message_size: usize,
    /// Directory served under `/static`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub static_dir: Option<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            poll_timeout_secs: 30,
            ping_interval_secs: 30,
            outbound_queue_capacity: 256,
            max_message_size: 64 * 1024,
            static_dir: None,
        }
    }
}

/// Log output settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// `tracing` filter directive used when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}
