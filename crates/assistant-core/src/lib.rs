//! # assistant-core
//!
//! Shared vocabulary for the Moblin assistant relay.
//!
//! - **Protocol**: producer-facing and consumer-facing JSON envelopes
//! - **Proof**: challenge/salt-bound password proof used by the producer handshake
//! - **IDs**: `RequestId` correlation ids plus branded connection/subscriber ids
//! - **Errors**: `RelayError` hierarchy via `thiserror`

#![deny(unsafe_code)]

pub mod constants;
pub mod errors;
pub mod ids;
pub mod proof;
pub mod protocol;

pub use errors::{RelayError, Result};
pub use ids::{ConsumerId, ProducerConnectionId, RequestId, SubscriberId};
