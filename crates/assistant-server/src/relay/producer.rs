//! The single producer connection: authentication state and outbound path.
//!
//! At most one producer is current. Attaching a new one replaces the old
//! state outright: the old outbound sender is dropped, which ends its writer
//! task and closes that socket. Anything still arriving from the old socket
//! carries a stale [`ProducerConnectionId`] and is ignored.
//!
//! Requests in flight belong to whichever producer is current. They are
//! failed under the same lock that swaps the producer out, so a teardown can
//! never reach requests already forwarded to its successor.

use std::sync::Arc;

use assistant_core::proof::{random_nonce, verify_proof};
use assistant_core::protocol::{Authentication, IdentifyResult, RelayMessage};
use assistant_core::{ProducerConnectionId, RelayError, RequestId};
use parking_lot::Mutex;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::correlator::RequestCorrelator;

/// Write access to the producer, as seen by the broadcaster and consumers.
pub trait ProducerLink: Send + Sync {
    /// Queue `{"request":{"id":…,"data":…}}` for the producer.
    ///
    /// Returns the connection the request was queued on.
    fn send_request(&self, id: RequestId, data: Value) -> Result<ProducerConnectionId, RelayError>;
}

struct AttachedProducer {
    conn_id: ProducerConnectionId,
    auth: Authentication,
    identified: bool,
    outbound: mpsc::UnboundedSender<String>,
}

/// What the transport needs to drive a freshly attached producer socket.
pub struct ProducerAttachment {
    /// Id of the new connection.
    pub conn_id: ProducerConnectionId,
    /// Text frames to write to the socket, starting with `hello`.
    pub outbound: mpsc::UnboundedReceiver<String>,
    /// The connection this one replaced, if any.
    pub superseded: Option<ProducerConnectionId>,
}

/// Authentication state machine and sole write path to the producer.
pub struct ProducerSession {
    password: SecretString,
    correlator: Arc<RequestCorrelator>,
    current: Mutex<Option<AttachedProducer>>,
}

impl ProducerSession {
    /// Create a session that accepts proofs derived from `password`.
    ///
    /// Losing the current producer fails every waiter in `correlator`.
    pub fn new(password: SecretString, correlator: Arc<RequestCorrelator>) -> Self {
        Self {
            password,
            correlator,
            current: Mutex::new(None),
        }
    }

    /// Accept a new producer connection and queue its `hello`.
    pub fn attach(&self) -> Result<ProducerAttachment, RelayError> {
        let conn_id = ProducerConnectionId::new();
        let auth = Authentication {
            challenge: random_nonce(),
            salt: random_nonce(),
        };
        let hello = RelayMessage::hello(auth.challenge.clone(), auth.salt.clone()).to_text()?;

        let (tx, rx) = mpsc::unbounded_channel();
        // receiver is alive, send cannot fail
        let _ = tx.send(hello);

        let mut current = self.current.lock();
        let superseded = current
            .replace(AttachedProducer {
                conn_id: conn_id.clone(),
                auth,
                identified: false,
                outbound: tx,
            })
            .map(|p| p.conn_id);
        if let Some(old) = &superseded {
            let failed = self.correlator.fail_all();
            info!(conn_id = %conn_id, superseded = %old, failed, "producer connection superseded");
        }
        drop(current);

        Ok(ProducerAttachment {
            conn_id,
            outbound: rx,
            superseded,
        })
    }

    /// Forget `conn_id` if it is still current. Returns whether it was.
    ///
    /// A stale id changes nothing, including the successor's pending requests.
    pub fn detach(&self, conn_id: &ProducerConnectionId) -> bool {
        let mut current = self.current.lock();
        if !current.as_ref().is_some_and(|p| &p.conn_id == conn_id) {
            return false;
        }
        *current = None;
        self.release(conn_id);
        true
    }

    /// Forget whichever producer is current.
    pub fn detach_current(&self) -> Option<ProducerConnectionId> {
        let mut current = self.current.lock();
        let conn_id = current.take()?.conn_id;
        self.release(&conn_id);
        Some(conn_id)
    }

    // caller holds `current`
    fn release(&self, conn_id: &ProducerConnectionId) {
        let failed = self.correlator.fail_all();
        if failed > 0 {
            info!(conn_id = %conn_id, failed, "pending requests failed after producer loss");
        }
    }

    /// Handle an `identify` from `conn_id` and queue the `identified` reply.
    ///
    /// Returns `None` when `conn_id` is no longer current.
    pub fn identify(&self, conn_id: &ProducerConnectionId, proof: &str) -> Option<IdentifyResult> {
        let mut current = self.current.lock();
        let producer = current.as_mut().filter(|p| &p.conn_id == conn_id)?;

        let result = if producer.identified {
            IdentifyResult::AlreadyIdentified {}
        } else if verify_proof(
            proof,
            self.password.expose_secret(),
            &producer.auth.salt,
            &producer.auth.challenge,
        ) {
            producer.identified = true;
            IdentifyResult::Ok {}
        } else {
            IdentifyResult::WrongPassword {}
        };
        debug!(conn_id = %conn_id, ?result, "identify handled");

        match (RelayMessage::Identified { result }).to_text() {
            Ok(text) => {
                let _ = producer.outbound.send(text);
            }
            Err(e) => debug!(error = %e, "failed to encode identified reply"),
        }
        Some(result)
    }

    /// Whether `conn_id` is current and has identified.
    pub fn is_identified(&self, conn_id: &ProducerConnectionId) -> bool {
        self.current
            .lock()
            .as_ref()
            .is_some_and(|p| &p.conn_id == conn_id && p.identified)
    }

    /// Whether any producer is attached.
    pub fn is_connected(&self) -> bool {
        self.current.lock().is_some()
    }

    /// Whether the attached producer, if any, has identified.
    pub fn is_ready(&self) -> bool {
        self.current.lock().as_ref().is_some_and(|p| p.identified)
    }

    /// Challenge and salt issued to `conn_id`.
    pub fn authentication(&self, conn_id: &ProducerConnectionId) -> Option<Authentication> {
        self.current
            .lock()
            .as_ref()
            .filter(|p| &p.conn_id == conn_id)
            .map(|p| p.auth.clone())
    }
}

impl ProducerLink for ProducerSession {
    fn send_request(&self, id: RequestId, data: Value) -> Result<ProducerConnectionId, RelayError> {
        let text = RelayMessage::Request { id, data }.to_text()?;
        let current = self.current.lock();
        let producer = current
            .as_ref()
            .ok_or_else(|| RelayError::ProducerUnavailable("no producer attached".into()))?;
        if !producer.identified {
            return Err(RelayError::ProducerUnavailable("producer not identified".into()));
        }
        producer
            .outbound
            .send(text)
            .map_err(|_| RelayError::ProducerUnavailable("producer connection closed".into()))?;
        Ok(producer.conn_id.clone())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
