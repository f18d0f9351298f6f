//! Relay error taxonomy.

use std::time::Duration;

use crate::ids::RequestId;

/// Convenience alias for relay operations.
pub type Result<T> = std::result::Result<T, RelayError>;

/// Failures surfaced by the relay core.
///
/// Authentication failure is not represented here: a wrong proof is a
/// protocol outcome reported back to the producer, not an error.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// No producer is attached and identified, or it went away mid-request.
    #[error("producer unavailable: {0}")]
    ProducerUnavailable(String),

    /// The producer did not answer within the configured deadline.
    #[error("timeout after {0:?}")]
    Timeout(Duration),

    /// A response referenced an id nobody is waiting for.
    #[error("unknown correlation id: {0}")]
    UnknownCorrelationId(RequestId),

    /// Top-level envelope key not understood by this relay.
    #[error("unrecognized message kind: {0}")]
    UnrecognizedMessageKind(String),

    /// Envelope was not valid JSON or lacked required fields.
    #[error("malformed message: {0}")]
    MalformedMessage(String),

    /// Preview payload was not valid base64.
    #[error("invalid preview payload: {0}")]
    InvalidPreview(#[from] base64::DecodeError),
}

impl RelayError {
    /// Short classification string for logging and consumer error replies.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::ProducerUnavailable(_) => "producer_unavailable",
            Self::Timeout(_) => "timeout",
            Self::UnknownCorrelationId(_) => "unknown_correlation_id",
            Self::UnrecognizedMessageKind(_) => "unrecognized_message_kind",
            Self::MalformedMessage(_) => "malformed_message",
            Self::InvalidPreview(_) => "invalid_preview",
        }
    }
}

impl From<serde_json::Error> for RelayError {
    fn from(err: serde_json::Error) -> Self {
        Self::MalformedMessage(err.to_string())
    }
}
