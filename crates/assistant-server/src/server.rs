//! `RelayServer`: axum HTTP + WebSocket transport for the relay.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Router;
use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::health::{self, HealthResponse};
use crate::preview::preview_response;
use crate::relay::Relay;
use crate::websocket::consumer::run_consumer_session;
use crate::websocket::producer::run_producer_session;

/// Shared state accessible from axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Relay core.
    pub relay: Arc<Relay>,
    /// Listener configuration.
    pub config: Arc<ServerConfig>,
    /// Cancelled once the server stops.
    pub shutdown: CancellationToken,
    /// When the server started.
    pub start_time: Instant,
}

/// The relay server.
pub struct RelayServer {
    config: Arc<ServerConfig>,
    relay: Arc<Relay>,
    stop: CancellationToken,
    start_time: Instant,
}

impl RelayServer {
    /// Create a new server around `relay`.
    pub fn new(config: ServerConfig, relay: Arc<Relay>) -> Self {
        Self {
            config: Arc::new(config),
            relay,
            stop: CancellationToken::new(),
            start_time: Instant::now(),
        }
    }

    /// Build the axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            relay: self.relay.clone(),
            config: self.config.clone(),
            shutdown: self.stop.clone(),
            start_time: self.start_time,
        };

        Router::new()
            .route("/", get(producer_handler))
            .route("/client", get(consumer_handler))
            .route("/preview", get(preview_handler))
            .route("/health", get(health_handler))
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// Bind and serve in the background until shutdown is requested.
    pub async fn listen(&self) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
        let listener = tokio::net::TcpListener::bind(self.config.bind_addr()).await?;
        let local_addr = listener.local_addr()?;
        info!(addr = %local_addr, "relay listening");

        let router = self.router();
        let token = self.stop.clone();
        let handle = tokio::spawn(async move {
            let serve = axum::serve(listener, router)
                .with_graceful_shutdown(async move { token.cancelled().await });
            if let Err(e) = serve.await {
                warn!(error = %e, "server exited with error");
            }
        });

        Ok((local_addr, handle))
    }

    /// The relay core.
    pub fn relay(&self) -> &Arc<Relay> {
        &self.relay
    }

    /// Begin shutting down. Idempotent.
    ///
    /// The relay closes first, so consumers waiting on the producer get a
    /// `producer_unavailable` reply and preview streams end. Cancelling the
    /// token then stops the listener and every session loop.
    pub fn shutdown(&self) {
        if self.stop.is_cancelled() {
            return;
        }
        info!("relay shutting down");
        self.relay.close();
        self.stop.cancel();
    }

    /// Whether [`shutdown`](Self::shutdown) has been called.
    pub fn is_shutting_down(&self) -> bool {
        self.stop.is_cancelled()
    }

    /// Shut down and wait up to `grace` for `listener` to drain.
    pub async fn stop(&self, listener: JoinHandle<()>, grace: Duration) {
        self.shutdown();
        if tokio::time::timeout(grace, listener).await.is_err() {
            warn!(?grace, "listener still draining after grace period");
        }
    }

    /// The server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// GET / (producer)
async fn producer_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let token = state.shutdown.clone();
    ws.max_message_size(state.config.max_message_size)
        .on_upgrade(move |socket| run_producer_session(socket, state.relay, token))
}

/// GET /client (consumer)
async fn consumer_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let token = state.shutdown.clone();
    let timeout = state.config.request_timeout;
    ws.max_message_size(state.config.max_message_size)
        .on_upgrade(move |socket| run_consumer_session(socket, state.relay, timeout, token))
}

/// GET /preview
async fn preview_handler(State(state): State<AppState>) -> impl IntoResponse {
    preview_response(state.relay.subscribe_preview(), state.shutdown.clone())
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health::health_check(state.start_time, state.relay.status()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use secrecy::SecretString;
    use tower::ServiceExt;

    fn make_server() -> RelayServer {
        let relay = Arc::new(Relay::new(SecretString::from("secret")));
        RelayServer::new(ServerConfig::default(), relay)
    }

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let server = make_server();
        let app = server.router();

        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let body = axum::body::to_bytes(resp.into_body(), 10_000)
            .await
            .unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed["status"], "ok");
        assert_eq!(parsed["producerConnected"], false);
        assert_eq!(parsed["previewSubscribers"], 0);
    }

    #[tokio::test]
    async fn preview_sets_multipart_content_type() {
        let server = make_server();
        let app = server.router();

        let req = Request::builder()
            .uri("/preview")
            .body(Body::empty())
            .unwrap();

        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers()[axum::http::header::CONTENT_TYPE],
            "multipart/x-mixed-replace; boundary=image-boundary"
        );
        assert_eq!(server.relay().status().preview_subscribers, 1);
        drop(resp);
        assert_eq!(server.relay().status().preview_subscribers, 0);
    }

    #[tokio::test]
    async fn producer_route_requires_upgrade() {
        let server = make_server();
        let app = server.router();

        let req = Request::builder().uri("/").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert!(resp.status().is_client_error());
    }

    #[tokio::test]
    async fn unknown_route_returns_404() {
        let server = make_server();
        let app = server.router();

        let req = Request::builder()
            .uri("/nonexistent")
            .body(Body::empty())
            .unwrap();

        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn shutdown_releases_producer_once() {
        let server = make_server();
        let _attached = server.relay().attach_producer().unwrap();
        assert!(!server.is_shutting_down());

        server.shutdown();
        assert!(server.is_shutting_down());
        assert!(!server.relay().status().producer_connected);

        let _again = server.relay().attach_producer().unwrap();
        server.shutdown();
        assert!(server.relay().status().producer_connected);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_gives_up_on_a_stuck_listener() {
        let server = make_server();
        let stuck = tokio::spawn(std::future::pending::<()>());
        server.stop(stuck, Duration::from_millis(50)).await;
        assert!(server.is_shutting_down());
    }
}
