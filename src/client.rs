//! One-shot consumer connection used by the CLI commands.

use anyhow::{Context, Result, bail};
use assistant_core::protocol::{ConsumerMessage, ConsumerReply};
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::debug;

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// A consumer connected to a running relay.
pub struct RelayClient {
    ws: WsStream,
}

impl RelayClient {
    /// Connect to the relay's `/client` endpoint.
    pub async fn connect(host: &str, port: u16) -> Result<Self> {
        let url = format!("ws://{host}:{port}/client");
        let (ws, _) = connect_async(&url)
            .await
            .with_context(|| format!("failed to connect to {url}"))?;
        debug!(url, "connected to relay");
        Ok(Self { ws })
    }

    /// Send one request and return the producer's whole response object.
    pub async fn request(&mut self, data: Value) -> Result<Value> {
        let text = ConsumerMessage::Request { data }.to_text()?;
        self.ws
            .send(Message::Text(text.into()))
            .await
            .context("failed to send request")?;

        while let Some(msg) = self.ws.next().await {
            match msg.context("relay connection failed")? {
                Message::Text(text) => return reply_payload(text.as_str()),
                Message::Close(_) => break,
                _ => {}
            }
        }
        bail!("relay closed the connection before replying")
    }

    /// Close the connection.
    pub async fn close(mut self) {
        let _ = self.ws.close(None).await;
    }
}

fn reply_payload(text: &str) -> Result<Value> {
    let reply: ConsumerReply = serde_json::from_str(text).context("malformed reply from relay")?;
    match reply {
        ConsumerReply::Response { data } => Ok(data),
        ConsumerReply::Error { data } => bail!("{} ({})", data.message, data.kind),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn response_reply_yields_payload() {
        let text = json!({"type": "response", "data": {"id": 1, "result": {"ok": {}}}}).to_string();
        assert_eq!(
            reply_payload(&text).unwrap(),
            json!({"id": 1, "result": {"ok": {}}})
        );
    }

    #[test]
    fn error_reply_is_error() {
        let text = json!({
            "type": "error",
            "data": {"kind": "producer_unavailable", "message": "producer unavailable: no producer attached"}
        })
        .to_string();
        let err = reply_payload(&text).unwrap_err();
        assert_eq!(
            err.to_string(),
            "producer unavailable: no producer attached (producer_unavailable)"
        );
    }

    #[test]
    fn garbage_reply_is_error() {
        assert!(reply_payload("nope").is_err());
    }
}
