//! The relay core: one producer, many consumers, many preview viewers.
//!
//! [`Relay`] owns the shared structures and routes each producer message by
//! kind. The transport layer only moves text frames in and out.

pub mod consumer;
pub mod correlator;
pub mod log_sink;
pub mod preview;
pub mod producer;

use std::sync::Arc;
use std::time::Duration;

use assistant_core::protocol::{IdentifyResult, ProducerEvent, ProducerMessage};
use assistant_core::{ProducerConnectionId, RelayError};
use bytes::Bytes;
use secrecy::SecretString;
use tracing::{debug, info, warn};

use self::consumer::ConsumerSession;
use self::correlator::RequestCorrelator;
use self::log_sink::{LogSink, TracingLogSink};
use self::preview::{PreviewBroadcaster, PreviewSubscription};
use self::producer::{ProducerAttachment, ProducerLink, ProducerSession};

/// Point-in-time view of the relay for health reporting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RelayStatus {
    /// A producer socket is attached.
    pub producer_connected: bool,
    /// The attached producer has identified.
    pub producer_identified: bool,
    /// Requests awaiting a producer response.
    pub pending_requests: usize,
    /// Subscribed preview viewers.
    pub preview_subscribers: usize,
}

/// Shared relay state.
pub struct Relay {
    producer: Arc<ProducerSession>,
    correlator: Arc<RequestCorrelator>,
    preview: Arc<PreviewBroadcaster>,
    log_sink: Arc<dyn LogSink>,
}

impl Relay {
    /// Create a relay that authenticates producers with `password`.
    pub fn new(password: SecretString) -> Self {
        let correlator = Arc::new(RequestCorrelator::new());
        let producer = Arc::new(ProducerSession::new(password, Arc::clone(&correlator)));
        let link: Arc<dyn ProducerLink> = producer.clone();
        let preview = Arc::new(PreviewBroadcaster::new(link, Arc::clone(&correlator)));
        Self {
            producer,
            correlator,
            preview,
            log_sink: Arc::new(TracingLogSink),
        }
    }

    /// Replace the producer log destination.
    #[must_use]
    pub fn with_log_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.log_sink = sink;
        self
    }

    /// Accept a new producer socket, replacing any current one.
    pub fn attach_producer(&self) -> Result<ProducerAttachment, RelayError> {
        let attachment = self.producer.attach()?;
        if let Some(old) = &attachment.superseded {
            self.preview.producer_lost(old);
        }
        Ok(attachment)
    }

    /// Tear down `conn_id` if it is still the current producer.
    ///
    /// Teardown of a connection that was already replaced is a no-op.
    pub fn detach_producer(&self, conn_id: &ProducerConnectionId) {
        if self.producer.detach(conn_id) {
            self.preview.producer_lost(conn_id);
        }
    }

    /// Stop relaying. The producer is released along with its requests, and
    /// preview viewers see their streams end.
    pub fn close(&self) {
        if let Some(conn_id) = self.producer.detach_current() {
            info!(conn_id = %conn_id, "producer released for shutdown");
            self.preview.producer_lost(&conn_id);
        }
        self.preview.close();
    }

    /// Dispatch one text frame from producer `conn_id`.
    pub fn handle_producer_text(&self, conn_id: &ProducerConnectionId, text: &str) {
        let entries = match ProducerMessage::decode_envelope(text) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(conn_id = %conn_id, error = %e, "malformed producer message");
                return;
            }
        };

        for entry in entries {
            match entry {
                Ok(message) => self.dispatch(conn_id, message),
                Err(RelayError::UnrecognizedMessageKind(kind)) => {
                    warn!(conn_id = %conn_id, kind, "unrecognized producer message kind");
                }
                Err(e) => warn!(conn_id = %conn_id, error = %e, "dropping producer message"),
            }
        }
    }

    fn dispatch(&self, conn_id: &ProducerConnectionId, message: ProducerMessage) {
        if let ProducerMessage::Identify(body) = message {
            match self.producer.identify(conn_id, &body.authentication) {
                Some(IdentifyResult::Ok {}) => {
                    info!(conn_id = %conn_id, "producer identified");
                    self.preview.producer_ready(conn_id);
                }
                Some(IdentifyResult::WrongPassword {}) => {
                    warn!(conn_id = %conn_id, "producer sent wrong password");
                }
                Some(IdentifyResult::AlreadyIdentified {}) => {}
                None => debug!(conn_id = %conn_id, "identify from stale producer ignored"),
            }
            return;
        }

        if !self.producer.is_identified(conn_id) {
            debug!(conn_id = %conn_id, kind = message.kind(), "ignoring message from unidentified producer");
            return;
        }

        match message {
            ProducerMessage::Event(body) => {
                for event in body.events() {
                    match event {
                        ProducerEvent::Log(entry) => self.log_sink.log(&entry),
                        ProducerEvent::Other(kind) => debug!(kind, "ignoring producer event"),
                    }
                }
            }
            ProducerMessage::Response(body) => {
                let id = body.id;
                if !self.correlator.fulfill(id, body.payload) {
                    debug!(error = %RelayError::UnknownCorrelationId(id), "discarding response");
                }
            }
            ProducerMessage::Preview(payload) => match payload.decode() {
                Ok(frame) => {
                    let _ = self.preview.publish(Bytes::from(frame));
                }
                Err(e) => warn!(conn_id = %conn_id, error = %e, "dropping preview frame"),
            },
            ProducerMessage::Identify(_) => {}
        }
    }

    /// Request path for one consumer connection.
    pub fn consumer(&self, timeout: Option<Duration>) -> ConsumerSession {
        let link: Arc<dyn ProducerLink> = self.producer.clone();
        ConsumerSession::new(link, Arc::clone(&self.correlator), timeout)
    }

    /// Register a preview viewer.
    pub fn subscribe_preview(&self) -> PreviewSubscription {
        self.preview.subscribe()
    }

    /// Snapshot for `/health`.
    pub fn status(&self) -> RelayStatus {
        RelayStatus {
            producer_connected: self.producer.is_connected(),
            producer_identified: self.producer.is_ready(),
            pending_requests: self.correlator.pending_count(),
            preview_subscribers: self.preview.subscriber_count(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
