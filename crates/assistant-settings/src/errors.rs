//! Why a settings load failed, named by the layer that rejected it.

use std::path::PathBuf;

use thiserror::Error;

/// A settings load failure.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The settings file exists but could not be read.
    #[error("cannot read {}: {source}", path.display())]
    Unreadable {
        /// File being read.
        path: PathBuf,
        /// Underlying I/O failure.
        source: std::io::Error,
    },

    /// The settings file is not JSON, or a key holds the wrong type.
    #[error("{} is not a valid settings file: {source}", path.display())]
    Malformed {
        /// File being parsed.
        path: PathBuf,
        /// Parser failure.
        source: serde_json::Error,
    },

    /// An `ASSISTANT_*` variable holds a value the relay cannot use.
    #[error("{var}={value:?} rejected, expected {expected}")]
    BadOverride {
        /// Environment variable name.
        var: &'static str,
        /// Raw value found in the environment.
        value: String,
        /// Accepted form.
        expected: String,
    },

    /// The merged settings describe a relay that cannot be served.
    #[error("{field} {problem}")]
    Unservable {
        /// Settings key, in file notation.
        field: &'static str,
        /// What is wrong with it.
        problem: &'static str,
    },
}

/// Result type for settings operations.
pub type Result<T> = std::result::Result<T, SettingsError>;
