//! One consumer's request path: allocate, forward, await.

use std::sync::Arc;
use std::time::Duration;

use assistant_core::RelayError;
use serde_json::Value;
use tracing::debug;

use super::correlator::RequestCorrelator;
use super::producer::ProducerLink;

/// Issues requests to the producer on behalf of one consumer.
///
/// Requests are expected to be issued one at a time per connection, but the
/// session itself holds no per-request state.
pub struct ConsumerSession {
    link: Arc<dyn ProducerLink>,
    correlator: Arc<RequestCorrelator>,
    timeout: Option<Duration>,
}

impl ConsumerSession {
    /// `timeout` of `None` waits until the producer answers or disconnects.
    pub fn new(
        link: Arc<dyn ProducerLink>,
        correlator: Arc<RequestCorrelator>,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            link,
            correlator,
            timeout,
        }
    }

    /// Forward `data` and return the producer's whole response object.
    ///
    /// Dropping the returned future releases the pending slot.
    pub async fn request(&self, data: Value) -> Result<Value, RelayError> {
        let id = self.correlator.allocate_id();
        let pending = self.correlator.register(id);
        let conn_id = self.link.send_request(id, data)?;
        debug!(request_id = %id, conn_id = %conn_id, "request forwarded to producer");
        pending.wait_timeout(self.timeout).await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
