//! `/health` endpoint.

use serde::Serialize;
use std::time::Instant;

use crate::relay::RelayStatus;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Always `"ok"` when the server is running.
    pub status: String,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// A producer socket is attached.
    pub producer_connected: bool,
    /// The attached producer has identified.
    pub producer_identified: bool,
    /// Consumer requests awaiting a producer response.
    pub pending_requests: usize,
    /// Subscribed preview viewers.
    pub preview_subscribers: usize,
}

/// Build a health response from live relay state.
pub fn health_check(start_time: Instant, relay: RelayStatus) -> HealthResponse {
    HealthResponse {
        status: "ok".into(),
        uptime_secs: start_time.elapsed().as_secs(),
        producer_connected: relay.producer_connected,
        producer_identified: relay.producer_identified,
        pending_requests: relay.pending_requests,
        preview_subscribers: relay.preview_subscribers,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idle() -> RelayStatus {
        RelayStatus {
            producer_connected: false,
            producer_identified: false,
            pending_requests: 0,
            preview_subscribers: 0,
        }
    }

    #[test]
    fn status_is_ok() {
        let resp = health_check(Instant::now(), idle());
        assert_eq!(resp.status, "ok");
        assert!(resp.uptime_secs < 2);
    }

    #[test]
    fn uptime_increases() {
        let start = Instant::now()
            .checked_sub(std::time::Duration::from_secs(60))
            .unwrap();
        let resp = health_check(start, idle());
        assert!(resp.uptime_secs >= 59);
    }

    #[test]
    fn serialization_is_camel_case() {
        let status = RelayStatus {
            producer_connected: true,
            producer_identified: true,
            pending_requests: 2,
            preview_subscribers: 1,
        };
        let parsed = serde_json::to_value(health_check(Instant::now(), status)).unwrap();
        assert_eq!(parsed["status"], "ok");
        assert_eq!(parsed["producerConnected"], true);
        assert_eq!(parsed["producerIdentified"], true);
        assert_eq!(parsed["pendingRequests"], 2);
        assert_eq!(parsed["previewSubscribers"], 1);
        assert!(parsed["uptimeSecs"].is_number());
    }
}
