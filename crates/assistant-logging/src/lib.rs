//! # assistant-logging
//!
//! Structured logging with `tracing` for the Moblin assistant relay.
//!
//! `RUST_LOG` wins over the configured level. Output is either
//! human-readable text or one JSON object per line.

#![deny(unsafe_code)]

use assistant_settings::LoggingSettings;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};

/// Errors raised while installing the global subscriber.
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    /// The configured level is not a valid filter directive.
    #[error("invalid log filter: {0}")]
    InvalidFilter(#[from] ParseError),
    /// A global subscriber was already installed.
    #[error("logging already initialized: {0}")]
    AlreadyInitialized(#[from] TryInitError),
}

/// Build the filter, preferring `RUST_LOG` when it is set and valid.
pub fn build_filter(level: &str) -> Result<EnvFilter, LoggingError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    parse_filter(level)
}

/// Parse a filter directive such as `info` or `assistant_server=debug,info`.
pub fn parse_filter(directives: &str) -> Result<EnvFilter, LoggingError> {
    Ok(EnvFilter::builder().parse(directives)?)
}

/// Install the global subscriber. Call once at startup.
pub fn init_logging(settings: &LoggingSettings) -> Result<(), LoggingError> {
    let filter = build_filter(&settings.level)?;

    let json_layer = settings
        .json
        .then(|| tracing_subscriber::fmt::layer().json().with_target(true));
    let text_layer = (!settings.json).then(|| tracing_subscriber::fmt::layer().with_target(true));

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .try_init()?;

    tracing::debug!(level = %settings.level, json = settings.json, "logging initialized");
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_levels_parse() {
        for level in ["trace", "debug", "info", "warn", "error"] {
            assert!(parse_filter(level).is_ok(), "failed for {level}");
        }
    }

    #[test]
    fn module_directives_parse() {
        assert!(parse_filter("assistant_server=debug,info").is_ok());
    }

    #[test]
    fn garbage_directive_is_rejected() {
        let err = parse_filter("assistant=notalevel").unwrap_err();
        assert!(err.to_string().contains("invalid log filter"));
    }
}
