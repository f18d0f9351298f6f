//! Listener and relay settings.

use std::time::Duration;

use assistant_core::constants::DEFAULT_PORT;
use serde::{Deserialize, Serialize};

/// Network listener settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Listen port shared by the producer, consumer and preview routes.
    pub port: u16,
    /// Largest accepted WebSocket message in bytes.
    pub max_message_size: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            max_message_size: 16 * 1024 * 1024,
        }
    }
}

/// Request relaying settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelaySettings {
    /// How long a consumer waits for the producer's answer, in milliseconds.
    /// Zero waits until the producer answers or disconnects.
    pub request_timeout_ms: u64,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            request_timeout_ms: 30_000,
        }
    }
}

impl RelaySettings {
    /// Request deadline, `None` when waiting is unbounded.
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_ms > 0).then(|| Duration::from_millis(self.request_timeout_ms))
    }
}
