//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase")]` and `#[serde(default)]`
//! so a partial JSON file only needs the keys it changes.

mod logging;
mod server;

pub use logging::*;
pub use server::*;

use serde::{Deserialize, Serialize};

/// Root settings type for the assistant.
///
/// ```json
/// {
///   "server": { "port": 2345 },
///   "relay": { "requestTimeoutMs": 10000 },
///   "logging": { "level": "debug" }
/// }
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AssistantSettings {
    /// Listener settings.
    pub server: ServerSettings,
    /// Request relaying behavior.
    pub relay: RelaySettings,
    /// Log output settings.
    pub logging: LoggingSettings,
}

impl AssistantSettings {
    /// Reject combinations that cannot be served.
    pub fn validate(&self) -> crate::Result<()> {
        if self.server.host.trim().is_empty() {
            return Err(crate::SettingsError::Unservable {
                field: "server.host",
                problem: "is empty",
            });
        }
        if self.server.max_message_size == 0 {
            return Err(crate::SettingsError::Unservable {
                field: "server.maxMessageSize",
                problem: "must be non-zero",
            });
        }
        Ok(())
    }
}
