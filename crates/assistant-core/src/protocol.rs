//! Wire envelopes for the producer and consumer protocols.
//!
//! Both protocols carry JSON text frames. Producer envelopes are a single
//! object whose top-level key names the message kind. Consumer envelopes use a
//! `type` discriminator alongside a `data` payload.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::constants::API_VERSION;
use crate::errors::{RelayError, Result};
use crate::ids::RequestId;

// ─────────────────────────────────────────────────────────────────────────────
// Relay → producer
// ─────────────────────────────────────────────────────────────────────────────

/// Challenge and salt handed to the producer in `hello`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authentication {
    /// Per-connection challenge nonce.
    pub challenge: String,
    /// Per-connection salt nonce.
    pub salt: String,
}

/// Outcome of an `identify` attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IdentifyResult {
    /// Proof accepted.
    Ok {},
    /// Proof did not match.
    WrongPassword {},
    /// Producer was already identified on this connection.
    AlreadyIdentified {},
}

/// Messages the relay writes to the producer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum RelayMessage {
    /// First message on every producer connection.
    Hello {
        /// Protocol version.
        api_version: String,
        /// Challenge/salt pair for this connection.
        authentication: Authentication,
    },
    /// Reply to `identify`.
    Identified {
        /// Identification outcome.
        result: IdentifyResult,
    },
    /// A correlated request the producer must answer with `response`.
    Request {
        /// Correlation id echoed back in the response.
        id: RequestId,
        /// Opaque request payload.
        data: Value,
    },
}

impl RelayMessage {
    /// `hello` for a freshly generated challenge and salt.
    pub fn hello(challenge: impl Into<String>, salt: impl Into<String>) -> Self {
        Self::Hello {
            api_version: API_VERSION.to_owned(),
            authentication: Authentication {
                challenge: challenge.into(),
                salt: salt.into(),
            },
        }
    }

    /// Serialize to a text frame.
    pub fn to_text(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Payload asking the producer to start emitting preview frames.
pub fn start_preview() -> Value {
    json!({ "startPreview": {} })
}

/// Payload asking the producer to stop emitting preview frames.
pub fn stop_preview() -> Value {
    json!({ "stopPreview": {} })
}

// ─────────────────────────────────────────────────────────────────────────────
// Producer → relay
// ─────────────────────────────────────────────────────────────────────────────

/// Body of an `identify` message.
#[derive(Clone, Debug, Deserialize)]
pub struct IdentifyBody {
    /// Proof computed by the producer.
    pub authentication: String,
}

/// Body of an `event` message.
#[derive(Clone, Debug, Deserialize)]
pub struct EventBody {
    /// Sub-kind keyed event data.
    pub data: Map<String, Value>,
}

/// One sub-event carried inside an `event` message.
#[derive(Clone, Debug, PartialEq)]
pub enum ProducerEvent {
    /// A log line from the producer.
    Log(String),
    /// A sub-kind this relay does not act on.
    Other(String),
}

impl EventBody {
    /// Sub-events in envelope order.
    pub fn events(&self) -> Vec<ProducerEvent> {
        self.data
            .iter()
            .map(|(kind, body)| {
                match (kind.as_str(), body.get("entry").and_then(Value::as_str)) {
                    ("log", Some(entry)) => ProducerEvent::Log(entry.to_owned()),
                    _ => ProducerEvent::Other(kind.clone()),
                }
            })
            .collect()
    }
}

/// Body of a `response` message.
#[derive(Clone, Debug, PartialEq)]
pub struct ResponseBody {
    /// Correlation id of the request being answered.
    pub id: RequestId,
    /// The whole response object, including `id`, forwarded verbatim.
    pub payload: Value,
}

/// Base64 JPEG carried by a `preview` message.
///
/// Producers send either the bare string or an object wrapping it under
/// `preview`.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum PreviewPayload {
    /// `{"preview": "<b64>"}`
    Bare(String),
    /// `{"preview": {"preview": "<b64>"}}`
    Wrapped {
        /// Base64 image.
        preview: String,
    },
}

impl PreviewPayload {
    /// Decode the image bytes.
    pub fn decode(&self) -> Result<Vec<u8>> {
        let encoded = match self {
            Self::Bare(s) | Self::Wrapped { preview: s } => s,
        };
        Ok(STANDARD.decode(encoded)?)
    }
}

/// A decoded producer message.
#[derive(Clone, Debug)]
pub enum ProducerMessage {
    /// Proof submission.
    Identify(IdentifyBody),
    /// Asynchronous event(s).
    Event(EventBody),
    /// Answer to a correlated request.
    Response(ResponseBody),
    /// One preview frame.
    Preview(PreviewPayload),
}

impl ProducerMessage {
    /// Decode every top-level entry of a producer envelope.
    ///
    /// Entries come back in wire order. The outer `Err` means the frame was
    /// not a JSON object at all. Each entry is decoded independently so one
    /// bad entry does not hide the others.
    pub fn decode_envelope(text: &str) -> Result<Vec<Result<Self>>> {
        let envelope: Map<String, Value> = serde_json::from_str(text)?;
        Ok(envelope
            .into_iter()
            .map(|(kind, body)| Self::decode_entry(&kind, body))
            .collect())
    }

    fn decode_entry(kind: &str, body: Value) -> Result<Self> {
        match kind {
            "identify" => Ok(Self::Identify(serde_json::from_value(body)?)),
            "event" => Ok(Self::Event(serde_json::from_value(body)?)),
            "response" => {
                let id = body
                    .get("id")
                    .and_then(Value::as_u64)
                    .map(RequestId::new)
                    .ok_or_else(|| RelayError::MalformedMessage("response without id".into()))?;
                Ok(Self::Response(ResponseBody { id, payload: body }))
            }
            "preview" => Ok(Self::Preview(serde_json::from_value(body)?)),
            other => Err(RelayError::UnrecognizedMessageKind(other.to_owned())),
        }
    }

    /// Envelope key of this message.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Identify(_) => "identify",
            Self::Event(_) => "event",
            Self::Response(_) => "response",
            Self::Preview(_) => "preview",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Consumer protocol
// ─────────────────────────────────────────────────────────────────────────────

/// Messages a consumer sends to the relay.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ConsumerMessage {
    /// Forward `data` to the producer and wait for its answer.
    Request {
        /// Opaque request payload.
        #[serde(default)]
        data: Value,
    },
}

impl ConsumerMessage {
    /// Parse a consumer text frame.
    ///
    /// A well-formed frame whose `type` is not understood yields
    /// [`RelayError::UnrecognizedMessageKind`].
    pub fn parse(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        match value.get("type").and_then(Value::as_str) {
            Some("request") => Ok(serde_json::from_value(value)?),
            Some(other) => Err(RelayError::UnrecognizedMessageKind(other.to_owned())),
            None => Err(RelayError::MalformedMessage("missing type".into())),
        }
    }

    /// Serialize to a text frame.
    pub fn to_text(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Failure details sent to a consumer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReply {
    /// Stable classification, see [`RelayError::error_kind`].
    pub kind: String,
    /// Human-readable description.
    pub message: String,
}

/// Messages the relay sends to a consumer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ConsumerReply {
    /// The producer's whole response object.
    Response {
        /// Response object, including its `id`.
        data: Value,
    },
    /// The request could not be completed.
    Error {
        /// Failure details.
        data: ErrorReply,
    },
}

impl ConsumerReply {
    /// Serialize to a text frame.
    pub fn to_text(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl From<&RelayError> for ConsumerReply {
    fn from(err: &RelayError) -> Self {
        Self::Error {
            data: ErrorReply {
                kind: err.error_kind().to_owned(),
                message: err.to_string(),
            },
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn as_value(msg: &RelayMessage) -> Value {
        serde_json::from_str(&msg.to_text().unwrap()).unwrap()
    }

    #[test]
    fn hello_wire_shape() {
        let msg = RelayMessage::hello("abc", "def");
        assert_eq!(
            as_value(&msg),
            json!({"hello": {"apiVersion": "0.1", "authentication": {"challenge": "abc", "salt": "def"}}})
        );
    }

    #[test]
    fn identified_wire_shapes() {
        let cases = [
            (IdentifyResult::Ok {}, json!({"identified": {"result": {"ok": {}}}})),
            (
                IdentifyResult::WrongPassword {},
                json!({"identified": {"result": {"wrongPassword": {}}}}),
            ),
            (
                IdentifyResult::AlreadyIdentified {},
                json!({"identified": {"result": {"alreadyIdentified": {}}}}),
            ),
        ];
        for (result, expected) in cases {
            assert_eq!(as_value(&RelayMessage::Identified { result }), expected);
        }
    }

    #[test]
    fn request_wire_shape() {
        let msg = RelayMessage::Request {
            id: RequestId::new(1),
            data: json!({"getSettings": {}}),
        };
        assert_eq!(
            as_value(&msg),
            json!({"request": {"id": 1, "data": {"getSettings": {}}}})
        );
    }

    #[test]
    fn decode_identify() {
        let items =
            ProducerMessage::decode_envelope(r#"{"identify":{"authentication":"proof"}}"#).unwrap();
        assert_eq!(items.len(), 1);
        match items.into_iter().next().unwrap().unwrap() {
            ProducerMessage::Identify(body) => assert_eq!(body.authentication, "proof"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn decode_response_keeps_whole_object() {
        let text = r#"{"response":{"id":1,"data":{"getSettings":{"data":{"scenes":[]}}}}}"#;
        let items = ProducerMessage::decode_envelope(text).unwrap();
        match items.into_iter().next().unwrap().unwrap() {
            ProducerMessage::Response(body) => {
                assert_eq!(body.id, RequestId::new(1));
                assert_eq!(
                    body.payload,
                    json!({"id": 1, "data": {"getSettings": {"data": {"scenes": []}}}})
                );
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn response_without_id_is_malformed() {
        let items = ProducerMessage::decode_envelope(r#"{"response":{"data":{}}}"#).unwrap();
        let err = items.into_iter().next().unwrap().unwrap_err();
        assert_eq!(err.error_kind(), "malformed_message");
    }

    #[test]
    fn unknown_kind_is_reported_per_entry() {
        let items = ProducerMessage::decode_envelope(r#"{"telemetry":{}}"#).unwrap();
        let err = items.into_iter().next().unwrap().unwrap_err();
        assert!(matches!(err, RelayError::UnrecognizedMessageKind(ref k) if k == "telemetry"));
    }

    #[test]
    fn entries_keep_wire_order() {
        let text = r#"{"response":{"id":7},"identify":{"authentication":"p"},"event":{"data":{}}}"#;
        let kinds: Vec<&str> = ProducerMessage::decode_envelope(text)
            .unwrap()
            .iter()
            .map(|item| item.as_ref().unwrap().kind())
            .collect();
        assert_eq!(kinds, vec!["response", "identify", "event"]);
    }

    #[test]
    fn event_sub_kinds_keep_wire_order() {
        let text = r#"{"event":{"data":{"status":{},"log":{"entry":"a"}}}}"#;
        let items = ProducerMessage::decode_envelope(text).unwrap();
        let ProducerMessage::Event(body) = items.into_iter().next().unwrap().unwrap() else {
            panic!("expected event");
        };
        assert_eq!(
            body.events(),
            vec![ProducerEvent::Other("status".into()), ProducerEvent::Log("a".into())]
        );
    }

    #[test]
    fn non_object_frame_is_malformed() {
        let err = ProducerMessage::decode_envelope("[1,2]").unwrap_err();
        assert_eq!(err.error_kind(), "malformed_message");
    }

    #[test]
    fn event_sub_kinds() {
        let text = r#"{"event":{"data":{"log":{"entry":"hello"},"battery":{"level":3}}}}"#;
        let items = ProducerMessage::decode_envelope(text).unwrap();
        let ProducerMessage::Event(body) = items.into_iter().next().unwrap().unwrap() else {
            panic!("expected event");
        };
        let events = body.events();
        assert!(events.contains(&ProducerEvent::Log("hello".into())));
        assert!(events.contains(&ProducerEvent::Other("battery".into())));
    }

    #[test]
    fn preview_accepts_bare_and_wrapped_forms() {
        let encoded = STANDARD.encode([0xff, 0xd8, 0xff]);
        let bare = format!(r#"{{"preview":"{encoded}"}}"#);
        let wrapped = format!(r#"{{"preview":{{"preview":"{encoded}"}}}}"#);
        for text in [bare, wrapped] {
            let items = ProducerMessage::decode_envelope(&text).unwrap();
            let ProducerMessage::Preview(payload) = items.into_iter().next().unwrap().unwrap() else {
                panic!("expected preview");
            };
            assert_eq!(payload.decode().unwrap(), vec![0xff, 0xd8, 0xff]);
        }
    }

    #[test]
    fn preview_with_bad_base64_fails_decode() {
        let payload = PreviewPayload::Bare("not base64!".into());
        assert_eq!(payload.decode().unwrap_err().error_kind(), "invalid_preview");
    }

    #[test]
    fn consumer_request_parses() {
        let msg = ConsumerMessage::parse(r#"{"type":"request","data":{"getSettings":{}}}"#).unwrap();
        assert_eq!(
            msg,
            ConsumerMessage::Request {
                data: json!({"getSettings": {}})
            }
        );
    }

    #[test]
    fn consumer_unknown_type_is_unrecognized() {
        let err = ConsumerMessage::parse(r#"{"type":"subscribe"}"#).unwrap_err();
        assert_eq!(err.error_kind(), "unrecognized_message_kind");
    }

    #[test]
    fn consumer_missing_type_is_malformed() {
        let err = ConsumerMessage::parse(r#"{"data":1}"#).unwrap_err();
        assert_eq!(err.error_kind(), "malformed_message");
    }

    #[test]
    fn consumer_reply_shapes() {
        let reply = ConsumerReply::Response {
            data: json!({"id": 1, "data": {}}),
        };
        let value: Value = serde_json::from_str(&reply.to_text().unwrap()).unwrap();
        assert_eq!(value, json!({"type": "response", "data": {"id": 1, "data": {}}}));

        let err = RelayError::ProducerUnavailable("producer disconnected".into());
        let value: Value =
            serde_json::from_str(&ConsumerReply::from(&err).to_text().unwrap()).unwrap();
        assert_eq!(value["type"], "error");
        assert_eq!(value["data"]["kind"], "producer_unavailable");
    }

    #[test]
    fn preview_control_payloads() {
        assert_eq!(start_preview(), json!({"startPreview": {}}));
        assert_eq!(stop_preview(), json!({"stopPreview": {}}));
    }
}
