//! Server configuration.

use std::time::Duration;

use assistant_settings::AssistantSettings;

/// Configuration for the relay server.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Max WebSocket message size in bytes.
    pub max_message_size: usize,
    /// How long a consumer request may wait for the producer. `None` waits
    /// until the producer answers or disconnects.
    pub request_timeout: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            max_message_size: 16 * 1024 * 1024, // 16 MB
            request_timeout: Some(Duration::from_secs(30)),
        }
    }
}

impl ServerConfig {
    /// Derive the listener configuration from loaded settings.
    pub fn from_settings(settings: &AssistantSettings) -> Self {
        Self {
            host: settings.server.host.clone(),
            port: settings.server.port,
            max_message_size: settings.server.max_message_size,
            request_timeout: settings.relay.request_timeout(),
        }
    }

    /// `host:port` string for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
