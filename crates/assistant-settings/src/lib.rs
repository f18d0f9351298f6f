//! # assistant-settings
//!
//! Configuration with layered sources for the Moblin assistant relay.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`AssistantSettings::default()`]
//! 2. **User file**: `~/.moblin-assistant/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `ASSISTANT_*` overrides (highest priority)
//!
//! Command-line flags are applied by the binary on top of the result.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings_from_path, settings_path};
pub use types::*;
